//! Canonical simplification.

use crate::expr::Expr;
use crate::poly::Poly;

/// Bring an expression into canonical form.
///
/// The result is a sum of monomials, highest growth first, with like terms
/// combined, integral powers expanded within a fixed term budget and
/// base-2 logarithms of products split. Shapes without a polynomial reading
/// stay as opaque atoms. `simplify(&simplify(e)) == simplify(e)`.
pub fn simplify(expr: &Expr) -> Expr {
    Poly::from_expr(expr).to_expr()
}

impl Expr {
    pub fn simplify(&self) -> Expr {
        simplify(self)
    }

    /// The exact value when the expression simplifies to a constant.
    pub fn constant_value(&self) -> Option<crate::Rational> {
        Poly::from_expr(self).constant_value()
    }

    /// Whether `self` and `other` simplify to the same canonical form.
    pub fn equivalent(&self, other: &Expr) -> bool {
        Poly::from_expr(self) == Poly::from_expr(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn n() -> Expr {
        Expr::var("n")
    }

    #[test]
    fn combines_like_terms() {
        let e = n() + Expr::int(2) * n() - Expr::int(3);
        assert_eq!(simplify(&e), Expr::Add(vec![Expr::Mul(vec![Expr::int(3), n()]), Expr::int(-3)]));
    }

    #[test]
    fn expands_integral_powers() {
        let e = Expr::powi(n() + Expr::one(), 2);
        let expected = Expr::Add(vec![
            Expr::powi(n(), 2),
            Expr::Mul(vec![Expr::int(2), n()]),
            Expr::one(),
        ]);
        assert_eq!(simplify(&e), expected);
    }

    #[test]
    fn inverts_single_terms() {
        let e = (n() * n()) / n();
        assert_eq!(simplify(&e), n());
        let half = n() / Expr::int(2);
        assert_eq!(simplify(&half), Expr::Mul(vec![Expr::ratio(1, 2), n()]));
    }

    #[test]
    fn splits_logarithms_of_products() {
        let e = Expr::log(Expr::int(8) * Expr::powi(n(), 2));
        let expected = Expr::Add(vec![
            Expr::Mul(vec![Expr::int(2), Expr::log(n())]),
            Expr::int(3),
        ]);
        assert_eq!(simplify(&e), expected);
        assert_eq!(simplify(&Expr::log(n() / Expr::int(2))), Expr::Add(vec![Expr::log(n()), Expr::int(-1)]));
    }

    #[test]
    fn two_to_the_log_is_the_argument() {
        let e = Expr::pow(Expr::int(2), Expr::log(n()));
        assert_eq!(simplify(&e), n());
        let e = Expr::pow(Expr::int(2), Expr::int(3) * Expr::log(n()));
        assert_eq!(simplify(&e), Expr::powi(n(), 3));
    }

    #[test]
    fn exponentials_pull_out_integer_offsets() {
        let e = Expr::pow(Expr::int(2), n() + Expr::one());
        assert_eq!(
            simplify(&e),
            Expr::Mul(vec![Expr::int(2), Expr::pow(Expr::int(2), n())])
        );
    }

    #[test]
    fn multi_term_denominators_stay_atoms() {
        let e = Expr::one() / (n() + Expr::one());
        assert_eq!(simplify(&e), Expr::powi(Expr::Add(vec![n(), Expr::one()]), -1));
    }

    #[test]
    fn is_idempotent_on_mixed_shapes() {
        let e = Expr::int(3) * n() * Expr::log(n())
            + Expr::pow(Expr::int(2), n() / Expr::int(2))
            + Expr::sum_over(Expr::var("i"), "i", Expr::one(), n())
            + Expr::one() / (n() + Expr::int(2))
            + Expr::Cost(4) * Expr::prob("p");
        let once = simplify(&e);
        assert_eq!(simplify(&once), once);
    }

    #[test]
    fn constants_fold() {
        let e = Expr::ratio(1, 2) + Expr::ratio(1, 3) * Expr::int(3);
        assert_eq!(e.constant_value(), Some(crate::Rational::new(3.into(), 2.into())));
        assert!(Expr::int(0).equivalent(&(n() - n())));
    }
}
