use asym_expr::{parse_markup, simplify};
use asym_ir::{program_from_json, Program};
use serde_json::{json, Value};

use super::*;
use crate::avg_model::{AvgModelConfig, ProbabilityMode};
use crate::classes::{big_o, dominant_term_of};
use pretty_assertions::assert_eq;

fn n() -> Expr {
    Expr::var("n")
}

fn at(line: u32, mut stmt: Value) -> Value {
    stmt["pos"] = json!({"line": line, "column": 1});
    stmt
}

fn bin(op: &str, left: Value, right: Value) -> Value {
    json!({"type": "Binary", "op": op, "left": left, "right": right})
}

fn assign(line: u32, target: &str, value: Value) -> Value {
    at(line, json!({"type": "Assign", "target": target, "value": value}))
}

fn procedure(name: &str, params: &[&str], body: Value) -> Value {
    json!({"type": "ProcDef", "name": name, "params": params, "body": body})
}

fn program(procs: Vec<Value>) -> Program {
    let lowered = program_from_json(&json!({"type": "Program", "body": procs}));
    assert!(lowered.errors.is_empty(), "{:?}", lowered.errors);
    lowered.program
}

fn run(program: &Program, index: usize, case: Case) -> CaseOutcome {
    let avg = (case == Case::Avg).then(|| AvgModel::new(&AvgModelConfig::default()));
    IterativeAnalyzer::for_procedure(program, case, &program.procs[index], avg).run()
}

fn row(outcome: &CaseOutcome, line: u32) -> &CostRow {
    outcome.rows.iter().find(|r| r.line == line).unwrap()
}

fn assert_growth(outcome: &CaseOutcome, expected: &Expr) {
    let term = dominant_term_of(&outcome.unit).unwrap();
    assert!(term.equivalent(expected), "got {term}, expected {expected}");
}

#[test]
fn for_header_counts_the_range() {
    let p = program(vec![procedure("F", &["n"], json!([
        at(1, json!({"type": "For", "var": "i", "start": 1, "end": "n",
                     "body": [assign(2, "x", json!(0))]}))
    ]))]);
    let outcome = run(&p, 0, Case::Worst);
    assert_eq!(row(&outcome, 1).kind, RowKind::For);
    assert_eq!(row(&outcome, 1).count, n());
    assert_eq!(row(&outcome, 2).count, n());
    assert_eq!(outcome.totals.big_o, "O(n)");
    assert_eq!(outcome.totals.recurrence, None);
}

#[test]
fn triangular_nest_keeps_indices_out_of_totals() {
    let p = program(vec![procedure("F", &["n"], json!([
        at(1, json!({"type": "For", "var": "i", "start": 1, "end": bin("-", json!("n"), json!(1)),
                     "body": [at(2, json!({"type": "For", "var": "j", "start": 1,
                                           "end": bin("-", json!("n"), json!("i")),
                                           "body": [assign(3, "x", json!("j"))]}))]}))
    ]))]);
    let outcome = run(&p, 0, Case::Worst);
    let expected = Expr::ratio(1, 2) * Expr::powi(n(), 2) - Expr::ratio(1, 2) * n();
    assert!(row(&outcome, 3).count.equivalent(&expected));
    for total in [&outcome.totals.t_open, outcome.totals.t_polynomial.as_ref().unwrap()] {
        let parsed = parse_markup(total).unwrap();
        assert_eq!(parsed.free_vars().into_iter().collect::<Vec<_>>(), vec!["n".to_owned()], "{total}");
    }
    assert!(!outcome.unit.contains_var("i"));
    assert!(!outcome.unit.contains_var("j"));
    assert_growth(&outcome, &Expr::powi(n(), 2));
}

fn branchy() -> Program {
    program(vec![procedure("F", &["n", "x"], json!([
        at(1, json!({"type": "If", "test": bin(">", json!("x"), json!(0)),
                     "consequent": [at(2, json!({"type": "For", "var": "i", "start": 1, "end": "n",
                                                 "body": [assign(3, "y", json!("i"))]}))],
                     "alternate": [assign(4, "y", json!(0))]}))
    ]))])
}

#[test]
fn worst_and_best_choose_opposite_branches() {
    let p = branchy();
    let worst = run(&p, 0, Case::Worst);
    assert_eq!(row(&worst, 3).count, n());
    assert!(row(&worst, 4).count.is_zero());
    assert_eq!(row(&worst, 4).note, "branch not taken in the worst case");
    assert_eq!(worst.totals.big_o, "O(n)");

    let best = run(&p, 0, Case::Best);
    assert!(row(&best, 3).count.is_zero());
    assert_eq!(row(&best, 4).count, Expr::one());
    assert_eq!(best.totals.big_o, "O(1)");
}

#[test]
fn average_case_weights_both_branches() {
    let p = branchy();
    let avg = run(&p, 0, Case::Avg);
    let runs = row(&avg, 3).expected_runs.clone().unwrap();
    assert!(runs.equivalent(&(Expr::ratio(1, 2) * n())), "got {runs}");
    assert!(row(&avg, 4).expected_runs.as_ref().unwrap().equivalent(&Expr::ratio(1, 2)));
    assert_eq!(avg.totals.a_of_n, avg.totals.t_polynomial);
    assert_eq!(avg.totals.avg_model_info.as_ref().unwrap().mode, ProbabilityMode::Uniform);
    assert_growth(&avg, &n());
}

#[test]
fn strided_loops_divide_the_count() {
    let p = program(vec![procedure("F", &["n"], json!([
        at(1, json!({"type": "For", "var": "i", "start": 1, "end": "n", "step": 2,
                     "body": [assign(2, "x", json!(0))]}))
    ]))]);
    let outcome = run(&p, 0, Case::Worst);
    assert!(row(&outcome, 2).count.equivalent(&(n() / Expr::int(2))));
}

#[test]
fn local_definitions_feed_loop_bounds() {
    let p = program(vec![procedure("F", &["n"], json!([
        assign(1, "m", bin("*", json!("n"), json!("n"))),
        at(2, json!({"type": "For", "var": "i", "start": 1, "end": "m",
                     "body": [assign(3, "x", json!(0))]}))
    ]))]);
    let outcome = run(&p, 0, Case::Worst);
    assert!(row(&outcome, 3).count.equivalent(&Expr::powi(n(), 2)));
}

#[test]
fn doubling_while_is_logarithmic() {
    let p = program(vec![procedure("F", &["n"], json!([
        assign(1, "i", json!(1)),
        at(2, json!({"type": "While", "test": bin("<", json!("i"), json!("n")),
                     "body": [assign(3, "i", bin("*", json!("i"), json!(2)))]}))
    ]))]);
    let outcome = run(&p, 0, Case::Worst);
    assert!(row(&outcome, 2).count.equivalent(&Expr::log(n())), "got {}", row(&outcome, 2).count);
    assert!(row(&outcome, 3).count.equivalent(&Expr::log(n())));
    assert_growth(&outcome, &Expr::log(n()));
}

#[test]
fn halving_down_to_zero_counts_the_last_step() {
    let p = program(vec![procedure("F", &["n"], json!([
        at(1, json!({"type": "While", "test": bin(">", json!("n"), json!(0)),
                     "body": [assign(2, "n", bin("div", json!("n"), json!(2)))]}))
    ]))]);
    let outcome = run(&p, 0, Case::Worst);
    assert!(row(&outcome, 1).count.equivalent(&(Expr::log(n()) + Expr::one())));
}

fn binary_search() -> Program {
    let element = json!({"type": "Index", "target": "A", "index": "mid"});
    program(vec![procedure("Search", &["A", "n", "x"], json!([
        assign(1, "lo", json!(1)),
        assign(2, "hi", json!("n")),
        at(3, json!({"type": "While", "test": bin("<=", json!("lo"), json!("hi")), "body": [
            assign(4, "mid", bin("div", bin("+", json!("lo"), json!("hi")), json!(2))),
            at(5, json!({"type": "If", "test": bin("=", element.clone(), json!("x")),
                         "consequent": at(6, json!({"type": "Return", "value": "mid"})),
                         "alternate": at(7, json!({"type": "If", "test": bin("<", element, json!("x")),
                             "consequent": assign(8, "lo", bin("+", json!("mid"), json!(1))),
                             "alternate": assign(9, "hi", bin("-", json!("mid"), json!(1)))}))}))
        ]})),
        at(10, json!({"type": "Return", "value": 0}))
    ]))])
}

#[test]
fn converging_pointers_halve_the_range() {
    let p = binary_search();
    let worst = run(&p, 0, Case::Worst);
    let header = &row(&worst, 3).count;
    assert!(header.equivalent(&(Expr::log(n()) + Expr::one())), "got {header}");
    // The early exit is not taken in the worst case.
    assert!(row(&worst, 6).count.is_zero());
    assert_growth(&worst, &Expr::log(n()));

    let best = run(&p, 0, Case::Best);
    assert_eq!(row(&best, 3).count, Expr::one());
    assert_eq!(best.totals.big_o, "O(1)");
}

#[test]
fn unrecognised_loops_get_a_bounded_placeholder() {
    let p = program(vec![procedure("F", &["A", "n", "x"], json!([
        assign(1, "i", json!(1)),
        at(2, json!({"type": "While",
                     "test": bin("!=", json!({"type": "Index", "target": "A", "index": "i"}), json!("x")),
                     "body": [assign(3, "i", bin("+", json!("i"), json!(1)))]}))
    ]))]);
    let outcome = run(&p, 0, Case::Worst);
    assert_eq!(row(&outcome, 2).count, Expr::Opaque(2));
    assert!(!outcome.unit.has_placeholders());
    assert!(!outcome.totals.t_open.contains("tau"));
    assert!(outcome.totals.symbols.contains_key("\\tau_{2}"));
    assert!(outcome.totals.procedure.iter().any(|s| s.contains("bounded by n")));
    assert_eq!(outcome.totals.big_o, "O(n)");
    assert_eq!(outcome.totals.big_omega, "\\Omega(1)");
    assert_eq!(outcome.totals.big_theta, "\\Theta(?)");
}

#[test]
fn best_case_data_dependent_while_fails_its_first_test() {
    let p = program(vec![procedure("F", &["A", "n", "x"], json!([
        assign(1, "i", json!(1)),
        at(2, json!({"type": "While",
                     "test": bin("and", bin("<=", json!("i"), json!("n")),
                                 bin("!=", json!({"type": "Index", "target": "A", "index": "i"}), json!("x"))),
                     "body": [assign(3, "i", bin("+", json!("i"), json!(1)))]}))
    ]))]);
    let best = run(&p, 0, Case::Best);
    assert_eq!(row(&best, 2).count, Expr::one());
    assert!(row(&best, 2).note.contains("fails on the first test"), "{}", row(&best, 2).note);
    assert!(row(&best, 3).count.is_zero());
    assert_eq!(best.totals.big_theta, "\\Theta(1)");

    let worst = run(&p, 0, Case::Worst);
    assert!(row(&worst, 2).count.equivalent(&n()));
}

#[test]
fn repeated_subtree_replays_its_rows() {
    // The same loop, position included, emitted twice.
    let repeated = at(1, json!({"type": "For", "var": "i", "start": 1, "end": "n",
                                "body": [assign(2, "x", json!(0))]}));
    let p = program(vec![procedure("F", &["n"], json!([repeated.clone(), repeated]))]);
    let outcome = run(&p, 0, Case::Worst);
    assert_eq!(outcome.rows.len(), 4);
    assert_eq!(outcome.rows[2..], outcome.rows[..2]);
    assert!(simplify(&outcome.unit).equivalent(&(Expr::int(4) * n())));
}

#[test]
fn rebound_locals_are_not_replayed() {
    let repeated = at(2, json!({"type": "For", "var": "i", "start": 1, "end": "k",
                                "body": [assign(3, "c", json!(1))]}));
    let p = program(vec![procedure("F", &["n"], json!([
        assign(1, "k", json!("n")),
        repeated.clone(),
        assign(4, "k", json!(1)),
        repeated
    ]))]);
    let outcome = run(&p, 0, Case::Worst);
    let expected = [Expr::one(), n(), n(), Expr::one(), Expr::one(), Expr::one()];
    assert_eq!(outcome.rows.len(), expected.len());
    for (row, count) in outcome.rows.iter().zip(&expected) {
        assert!(row.count.equivalent(count), "line {}: {} vs {count}", row.line, row.count);
    }
}

#[test]
fn calls_are_costed_through_summaries() {
    let p = program(vec![
        procedure("Inner", &["m"], json!([
            at(2, json!({"type": "For", "var": "i", "start": 1, "end": "m",
                         "body": [assign(3, "x", json!(0))]}))
        ])),
        procedure("Outer", &["n"], json!([
            at(6, json!({"type": "For", "var": "j", "start": 1, "end": "n",
                         "body": [at(7, json!({"type": "Call", "name": "Inner", "args": ["n"]}))]}))
        ])),
    ]);
    let outcome = run(&p, 1, Case::Worst);
    let call = row(&outcome, 7);
    assert_eq!(call.kind, RowKind::Call);
    assert!(call.count.equivalent(&(Expr::int(2) * Expr::powi(n(), 2))), "got {}", call.count);
    assert!(outcome.totals.procedure.iter().any(|s| s.starts_with("Inner costs")));
    assert_growth(&outcome, &Expr::powi(n(), 2));
}

#[test]
fn unknown_procedures_cost_one_unit() {
    let p = program(vec![procedure("F", &["n"], json!([
        at(1, json!({"type": "Call", "name": "print", "args": ["n"]}))
    ]))]);
    let outcome = run(&p, 0, Case::Worst);
    assert_eq!(row(&outcome, 1).count, Expr::one());
    assert!(row(&outcome, 1).note.contains("one unit"));
}

#[test]
fn self_calls_become_a_recurrence() {
    let p = program(vec![procedure("Fact", &["n"], json!([
        at(1, json!({"type": "If", "test": bin("<=", json!("n"), json!(0)),
                     "consequent": at(2, json!({"type": "Return", "value": 1})),
                     "alternate": at(3, json!({"type": "Return", "value":
                        bin("*", json!("n"), json!({"type": "Call", "name": "Fact",
                                                    "args": [bin("-", json!("n"), json!(1))]}))}))}))
    ]))]);
    let outcome = run(&p, 0, Case::Worst);
    let call = outcome
        .rows
        .iter()
        .find(|r| r.kind == RowKind::Call)
        .unwrap();
    assert_eq!(call.count, Expr::apply(RECURRENCE_SYMBOL, vec![simplify(&(n() - Expr::one()))]));
    let recurrence = outcome.totals.recurrence.as_ref().unwrap();
    assert_eq!(recurrence.a, 1);
    assert_eq!(recurrence.n0, 0);
    assert!(outcome.totals.t_polynomial.is_some());
    assert_eq!(outcome.totals.big_theta, "\\Theta(n)");
    assert_eq!(outcome.totals.big_o, big_o(&n()));
}
