use super::*;
use pretty_assertions::assert_eq;

fn n() -> Expr {
    Expr::var("n")
}

#[test]
fn numbers_and_fractions() {
    assert_eq!(to_latex(&Expr::int(-4)), "-4");
    assert_eq!(to_latex(&Expr::ratio(3, 4)), "\\frac{3}{4}");
    assert_eq!(to_latex(&Expr::ratio(-1, 2)), "-\\frac{1}{2}");
}

#[test]
fn names_keep_their_case_and_subscripts() {
    assert_eq!(to_latex(&Expr::var("N")), "N");
    assert_eq!(to_latex(&Expr::prob("p_1")), "p_{1}");
    assert_eq!(to_latex(&Expr::Cost(12)), "C_{12}");
    assert_eq!(to_latex(&Expr::Opaque(7)), "\\tau_{7}");
}

#[test]
fn canonical_quadratic() {
    let e = (Expr::ratio(1, 2) * Expr::powi(n(), 2) - Expr::ratio(1, 2) * n()).simplify();
    assert_eq!(to_latex(&e), "\\frac{n^{2}}{2} - \\frac{n}{2}");
}

#[test]
fn products_with_logs_and_groups() {
    let e = Expr::int(3) * n() * Expr::log(n());
    assert_eq!(to_latex(&e), "3 n \\log_{2}(n)");
    let e = Expr::Cost(2) * (n() + Expr::one());
    assert_eq!(to_latex(&e), "C_{2} \\left(n + 1\\right)");
}

#[test]
fn negative_powers_become_fractions() {
    let e = Expr::one() / (n() + Expr::one());
    assert_eq!(to_latex(&e), "\\frac{1}{\\left(n + 1\\right)}");
    let e = Expr::int(-3) * Expr::powi(n(), -2);
    assert_eq!(to_latex(&e), "-\\frac{3}{n^{2}}");
}

#[test]
fn applications_and_powers() {
    assert_eq!(to_latex(&Expr::apply("p", vec![Expr::var("i")])), "p(i)");
    assert_eq!(
        to_latex(&Expr::pow(Expr::int(2), n() / Expr::int(2))),
        "2^{\\frac{n}{2}}"
    );
    assert_eq!(
        to_latex(&Expr::pow(Expr::int(2), n() / Expr::int(2)).simplify()),
        "2^{\\frac{n}{2}}"
    );
}

#[test]
fn nested_summation() {
    let e = Expr::sum(
        Expr::one(),
        vec![
            Bound::new("i", Expr::one(), n() - Expr::one()),
            Bound::new("j", Expr::one(), n() - Expr::var("i")),
        ],
    );
    assert_eq!(
        to_latex(&e),
        "\\sum_{i=1}^{n - 1} \\sum_{j=1}^{n - i} 1"
    );
}
