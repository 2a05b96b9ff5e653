use super::*;
use asym_analysis::ProbabilityMode;
use pretty_assertions::assert_eq;

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| (*s).to_owned()).collect()
}

#[test]
fn defaults() {
    assert_eq!(parse_analyze_options(&[]), AnalyzeOptions::default());
    assert_eq!(AnalyzeOptions::default().mode, Mode::Worst);
}

#[test]
fn every_option() {
    let options = parse_analyze_options(&args(&[
        "--mode=all",
        "--avg-model=model.json",
        "--method=iteration",
        "--pretty",
    ]));
    assert_eq!(
        options,
        AnalyzeOptions {
            mode: Mode::All,
            avg_model: Some(PathBuf::from("model.json")),
            method: Some(Method::Iteration),
            pretty: true,
        }
    );
}

#[test]
fn unknown_values_keep_the_default() {
    let options = parse_analyze_options(&args(&["--mode=typical", "--method=guess", "--fast"]));
    assert_eq!(options, AnalyzeOptions::default());
}

#[test]
fn source_text_is_analysed() {
    let source = r#"{"type": "ProcDef", "name": "F", "params": ["n"], "body": [
        {"type": "For", "var": "i", "start": 1, "end": "n", "pos": {"line": 1, "column": 1},
         "body": [{"type": "Assign", "target": "x", "value": "i", "pos": {"line": 2, "column": 3}}]}
    ]}"#;
    let result = analyze_source(source, Mode::Worst, None, None).unwrap();
    assert!(result.ok);
    assert_eq!(result.totals.big_o, "O(n)");
}

#[test]
fn average_model_is_passed_through() {
    let source = r#"{"type": "ProcDef", "name": "F", "params": ["n"], "body": [
        {"type": "If", "test": {"type": "Binary", "op": ">", "left": "n", "right": 0},
         "pos": {"line": 1, "column": 1},
         "consequent": {"type": "Assign", "target": "x", "value": 1, "pos": {"line": 2, "column": 3}}}
    ]}"#;
    let model: AvgModelConfig = serde_json::from_str(r#"{"mode": "symbolic"}"#).unwrap();
    let result = analyze_source(source, Mode::Avg, Some(model), None).unwrap();
    let info = result.totals.avg_model_info.unwrap();
    assert_eq!(info.mode, ProbabilityMode::Symbolic);
}

#[test]
fn malformed_json_is_an_error() {
    assert!(analyze_source("{", Mode::Worst, None, None).is_err());
}
