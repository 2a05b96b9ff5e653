use super::*;
use pretty_assertions::assert_eq;

fn n() -> Expr {
    Expr::var("n")
}

fn int(v: i64) -> Rational {
    Rational::from_integer(BigInt::from(v))
}

#[test]
fn like_terms_cancel() {
    let p = Poly::atom(n(), 1).add(&Poly::atom(n(), 1).scale(&int(-1)));
    assert!(p.is_zero());
    assert_eq!(p.constant_value(), Some(int(0)));
}

#[test]
fn product_merges_exponents() {
    let p = Poly::atom(n(), 2).mul(&Poly::atom(n(), -1));
    assert_eq!(p, Poly::atom(n(), 1));
    let q = Poly::atom(n(), 1).mul(&Poly::atom(n(), -1));
    assert_eq!(q.constant_value(), Some(int(1)));
}

#[test]
fn binomial_expansion() {
    let base = Poly::atom(n(), 1).add(&Poly::one());
    let cube = base.pow(3);
    let coeffs: Vec<Rational> = cube.terms().map(|(_, c)| c.clone()).collect();
    assert_eq!(cube.len(), 4);
    assert!(coeffs.iter().all(|c| [int(1), int(3)].contains(c)));
    assert_eq!(cube.constant_term(), int(1));
}

#[test]
fn large_powers_stay_atoms() {
    let e = Expr::powi(Expr::var("a") + Expr::var("b") + Expr::var("c"), 9);
    let p = Poly::from_expr(&e);
    assert_eq!(p.len(), 1);
    let (monomial, _) = p.single_term().unwrap();
    assert_eq!(monomial[0].1, 9);
}

#[test]
fn exact_binary_logarithms() {
    assert_eq!(exact_log2(&int(1)), Some(0));
    assert_eq!(exact_log2(&int(1024)), Some(10));
    assert_eq!(exact_log2(&Rational::new(BigInt::from(1), BigInt::from(8))), Some(-3));
    assert_eq!(exact_log2(&int(12)), None);
    assert_eq!(exact_log2(&int(-4)), None);
}

#[test]
fn summation_atoms_keep_simplified_bounds() {
    let sum = Expr::sum_over(Expr::var("i") + Expr::var("i"), "i", Expr::one(), n() + Expr::zero());
    let p = Poly::from_expr(&sum);
    let (monomial, _) = p.single_term().unwrap();
    assert_eq!(
        monomial[0].0,
        Expr::sum_over(Expr::Mul(vec![Expr::int(2), Expr::var("i")]), "i", Expr::one(), n())
    );
}
