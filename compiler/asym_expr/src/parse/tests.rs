use super::*;
use crate::simplify;
use pretty_assertions::assert_eq;

fn n() -> Expr {
    Expr::var("n")
}

fn parse_simplified(source: &str) -> Expr {
    simplify(&parse_markup(source).unwrap())
}

#[test]
fn polynomial_with_fractions() {
    assert_eq!(
        parse_simplified("\\frac{n^{2}}{2} - \\frac{n}{2}"),
        simplify(&(Expr::ratio(1, 2) * Expr::powi(n(), 2) - Expr::ratio(1, 2) * n()))
    );
}

#[test]
fn implicit_and_explicit_products() {
    let expected = simplify(&(Expr::int(3) * n() * Expr::log(n())));
    assert_eq!(parse_simplified("3 n \\log_{2}(n)"), expected);
    assert_eq!(parse_simplified("3 \\cdot n \\cdot \\log n"), expected);
    assert_eq!(parse_simplified("3*n*\\lg(n)"), expected);
}

#[test]
fn grouping_commands_are_ignored() {
    assert_eq!(
        parse_simplified("C_{2} \\left(n + 1\\right)"),
        simplify(&(Expr::Cost(2) * (n() + Expr::one())))
    );
    assert_eq!(
        parse_simplified("\\big( n \\big)^{2} \\,+\\; 1"),
        simplify(&(Expr::powi(n(), 2) + Expr::one()))
    );
}

#[test]
fn cost_units_placeholders_and_subscripts() {
    assert_eq!(parse_markup("C_{12}").unwrap(), Expr::Cost(12));
    assert_eq!(parse_markup("\\tau_{7}").unwrap(), Expr::Opaque(7));
    assert_eq!(parse_markup("p_{1}").unwrap(), Expr::var("p_1"));
    assert_eq!(parse_markup("lo_{idx}").unwrap(), Expr::var("lo_idx"));
}

#[test]
fn applications_need_adjacent_parentheses() {
    assert_eq!(
        parse_markup("p(i)").unwrap(),
        Expr::apply("p", vec![Expr::var("i")])
    );
    assert_eq!(
        parse_markup("p (i)").unwrap(),
        Expr::Mul(vec![Expr::var("p"), Expr::var("i")])
    );
}

#[test]
fn constants_become_symbols() {
    assert_eq!(
        parse_markup_with_constants("p n", &["p"]).unwrap(),
        Expr::Mul(vec![Expr::prob("p"), n()])
    );
}

#[test]
fn logarithm_variants() {
    assert_eq!(parse_markup("\\log n").unwrap(), Expr::log(n()));
    assert_eq!(parse_markup("\\ln(n)").unwrap(), Expr::log(n()));
    assert_eq!(parse_markup("\\log^{2} n").unwrap(), Expr::powi(Expr::log(n()), 2));
    assert_eq!(
        parse_markup("\\log_{10} n").unwrap(),
        Expr::log(n()) / Expr::log(Expr::int(10))
    );
    assert_eq!(parse_simplified("\\log_{2}\\left(n^{3}\\right)"), simplify(&(Expr::int(3) * Expr::log(n()))));
}

#[test]
fn roots_and_decimals() {
    assert_eq!(
        parse_markup("\\sqrt{n}").unwrap(),
        Expr::pow(n(), Expr::powi(Expr::int(2), -1))
    );
    assert_eq!(parse_markup("2.5").unwrap(), Expr::ratio(5, 2));
}

#[test]
fn nested_summation_round_trips() {
    let source = "\\sum_{i=1}^{n - 1} \\sum_{j=1}^{n - i} 1";
    let parsed = parse_markup(source).unwrap();
    assert_eq!(simplify(&parsed).to_string(), simplify(&parse_markup(&parsed.to_string()).unwrap()).to_string());
    let Expr::Sum(_, bounds) = &parsed else {
        panic!("expected a summation, got {parsed:?}");
    };
    assert_eq!(bounds[0].var, "i");
}

#[test]
fn reports_errors_with_offsets() {
    let err = parse_markup("n + ").unwrap_err();
    assert_eq!(
        err.kind,
        ParseErrorKind::UnexpectedEnd {
            expected: "an expression"
        }
    );
    let err = parse_markup("\\foo{n}").unwrap_err();
    assert_eq!(
        err.kind,
        ParseErrorKind::UnknownCommand {
            name: "foo".to_owned()
        }
    );
    assert_eq!(err.offset, 0);
    assert_eq!(parse_markup("n # 2").unwrap_err().kind, ParseErrorKind::InvalidCharacter);
    assert_eq!(
        parse_markup("(n").unwrap_err().to_string(),
        "unexpected end of input, expected `)` at offset 2"
    );
}
