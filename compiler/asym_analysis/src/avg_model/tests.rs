use super::*;
use pretty_assertions::assert_eq;

fn config(mode: ProbabilityMode, predicates: &[(&str, &str)]) -> AvgModelConfig {
    AvgModelConfig {
        mode,
        predicates: predicates
            .iter()
            .map(|(k, v)| ((*k).to_owned(), ProbabilitySource::Text((*v).to_owned())))
            .collect(),
    }
}

#[test]
fn exact_then_normalized_then_substring() {
    let mut model = AvgModel::new(&config(
        ProbabilityMode::Uniform,
        &[("A[i] = x", "1/n"), ("i<n", "3/4")],
    ));
    assert_eq!(model.get_probability("A[i] = x", None), "1/n");
    assert_eq!(model.get_probability("i < n", None), "3/4");
    assert_eq!(model.get_probability("A[i] = x and found", None), "1/n");
    assert_eq!(model.get_probability("j > 0", None), "1/2");
}

#[test]
fn exact_matcher_ignores_spacing_variants() {
    let mut model = AvgModel::with_matcher(
        &config(ProbabilityMode::Uniform, &[("i<n", "3/4")]),
        Box::new(ExactMatcher),
    );
    assert_eq!(model.get_probability("i < n", None), "1/2");
    assert_eq!(model.get_probability("i<n", None), "3/4");
}

#[test]
fn symbolic_mode_cycles_and_reuses_symbols() {
    let mut model = AvgModel::new(&config(ProbabilityMode::Symbolic, &[]));
    assert_eq!(model.get_probability("a > b", None), "p");
    assert_eq!(model.get_probability("c > d", None), "q");
    assert_eq!(model.get_probability("a > b", None), "p");
    assert_eq!(model.get_probability("A[i] = x", Some("i")), "r(i)");
    for k in 0..5 {
        model.get_probability(&format!("x{k} > 0"), None);
    }
    assert_eq!(model.get_probability("last", None), "p_1");
    assert_eq!(model.allocated().len(), 9);
}

#[test]
fn probability_strings_are_classified_by_shape() {
    assert_eq!(ProbabilityValue::classify("1"), ProbabilityValue::Integer(1));
    assert_eq!(ProbabilityValue::classify(" 1/3 "), ProbabilityValue::Rational(1, 3));
    assert_eq!(ProbabilityValue::classify("0.25"), ProbabilityValue::Rational(25, 100));
    assert_eq!(ProbabilityValue::classify("q"), ProbabilityValue::Symbol("q".to_owned()));
    assert_eq!(
        ProbabilityValue::classify("p(i)"),
        ProbabilityValue::Applied("p".to_owned(), vec!["i".to_owned()])
    );
    assert_eq!(
        ProbabilityValue::classify("1/n"),
        ProbabilityValue::Markup("1/n".to_owned())
    );
}

#[test]
fn probability_expressions() {
    let mut model = AvgModel::new(&config(
        ProbabilityMode::Uniform,
        &[("found", "0.25"), ("A[i] = x", "1/n"), ("hit", "p(i)")],
    ));
    assert_eq!(model.get_probability_expr("found", None), Expr::ratio(1, 4));
    assert_eq!(
        model.get_probability_expr("A[i] = x", None).simplify(),
        Expr::powi(Expr::var("n"), -1)
    );
    assert_eq!(
        model.get_probability_expr("hit", None),
        Expr::apply("p", vec![Expr::var("i")])
    );
    assert_eq!(model.get_probability_expr("other", None), Expr::ratio(1, 2));
}

#[test]
fn has_symbols_reflects_mode_and_values() {
    assert!(!AvgModel::new(&config(ProbabilityMode::Uniform, &[("a", "1/3")])).has_symbols());
    assert!(AvgModel::new(&config(ProbabilityMode::Uniform, &[("a", "q")])).has_symbols());
    assert!(AvgModel::new(&config(ProbabilityMode::Symbolic, &[])).has_symbols());
}

#[test]
fn config_deserializes_numbers_and_strings() {
    let config: AvgModelConfig = serde_json::from_value(serde_json::json!({
        "mode": "symbolic",
        "predicates": {"A[i] = x": 0.5, "i < n": "1/n"}
    }))
    .unwrap();
    assert_eq!(config.mode, ProbabilityMode::Symbolic);
    let mut model = AvgModel::new(&config);
    assert_eq!(model.get_probability_expr("A[i] = x", None), Expr::ratio(1, 2));
}
