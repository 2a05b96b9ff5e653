use asym_ir::program_from_json;
use serde_json::json;

use super::*;
use pretty_assertions::assert_eq;

fn n() -> Expr {
    Expr::var("n")
}

fn t(arg: Expr) -> Expr {
    Expr::apply(RECURRENCE_SYMBOL, vec![arg])
}

fn frame() -> RecursionFrame {
    RecursionFrame {
        name: "F".to_owned(),
        shape: Some(SizeParam::Single("n".to_owned())),
        size_var: "n".to_owned(),
        n0: 1,
        problems: Vec::new(),
        params: vec!["n".to_owned()],
    }
}

fn solve_auto(t_unit: &Expr) -> Solution {
    solve(&frame(), t_unit, None, &mut SummationCloser::new())
}

fn merge_sort_program() -> Program {
    program_from_json(&json!({"type": "Program", "body": [
        {"type": "ProcDef", "name": "MergeSort", "params": ["A", "p", "r"], "body": [
            {"type": "If", "pos": {"line": 2, "column": 1},
             "test": {"type": "Binary", "op": "<", "left": "p", "right": "r"},
             "consequent": [
                {"type": "Assign", "target": "q",
                 "value": {"type": "Binary", "op": "div",
                           "left": {"type": "Binary", "op": "+", "left": "p", "right": "r"},
                           "right": 2}},
                {"type": "Call", "name": "MergeSort", "args": ["A", "p", "q"]},
                {"type": "Call", "name": "MergeSort",
                 "args": ["A", {"type": "Binary", "op": "+", "left": "q", "right": 1}, "r"]}
             ]}
        ]}
    ]}))
    .program
}

#[test]
fn index_pairs_become_a_range_size() {
    let program = merge_sort_program();
    let frame = RecursionFrame::detect(&program, &program.procs[0]).unwrap();
    assert_eq!(
        frame.shape,
        Some(SizeParam::Range {
            lo: "p".to_owned(),
            hi: "r".to_owned()
        })
    );
    assert_eq!(frame.size_var, "n");
    assert!(frame.problems.is_empty());

    let q = (Expr::var("p") + Expr::var("r")) / Expr::int(2);
    let left = [None, Some(Expr::var("p")), Some(q.clone())];
    let right = [None, Some(q + Expr::one()), Some(Expr::var("r"))];
    let (reduction, arg) = frame.reduce(&left).unwrap();
    assert_eq!(reduction, Reduction::Divide { by: Expr::int(2) });
    assert!(arg.equivalent(&(n() / Expr::int(2))));
    assert_eq!(frame.reduce(&right).unwrap().0, reduction);
}

#[test]
fn no_self_calls_means_no_frame() {
    let program = program_from_json(&json!({"type": "Program", "body": [
        {"type": "ProcDef", "name": "Swap", "params": ["a", "b"], "body": [
            {"type": "Assign", "target": "t", "value": "a"}
        ]}
    ]}))
    .program;
    assert!(RecursionFrame::detect(&program, &program.procs[0]).is_none());
}

#[test]
fn base_case_guard_sets_the_threshold() {
    let program = program_from_json(&json!({"type": "Program", "body": [
        {"type": "ProcDef", "name": "Fact", "params": ["n"], "body": [
            {"type": "If", "test": {"type": "Binary", "op": "<=", "left": "n", "right": 0},
             "consequent": {"type": "Return", "value": 1},
             "alternate": {"type": "Return", "value":
                {"type": "Binary", "op": "*", "left": "n",
                 "right": {"type": "Call", "name": "Fact",
                           "args": [{"type": "Binary", "op": "-", "left": "n", "right": 1}]}}}}
        ]}
    ]}))
    .program;
    let frame = RecursionFrame::detect(&program, &program.procs[0]).unwrap();
    assert_eq!(frame.shape, Some(SizeParam::Single("n".to_owned())));
    assert_eq!(frame.n0, 0);
}

#[test]
fn call_sizes_normalise() {
    let (r, _) = normalize(&(n() / Expr::int(2) + Expr::ratio(1, 2)), "n").unwrap();
    assert_eq!(r, Reduction::Divide { by: Expr::int(2) });
    let (r, arg) = normalize(&(n() - Expr::int(2)), "n").unwrap();
    assert_eq!(r, Reduction::Subtract { by: Expr::int(2) });
    assert!(arg.equivalent(&(n() - Expr::int(2))));
    assert!(normalize(&n(), "n").is_err());
    assert!(normalize(&Expr::powi(n(), 2), "n").is_err());
}

#[test]
fn balanced_divide_and_conquer_is_master_case_two() {
    let t_unit = Expr::int(2) * t(n() / Expr::int(2)) + Expr::int(3) * n() + Expr::int(4);
    let solution = solve_auto(&t_unit);
    assert!(solution.recurrence.applicable);
    assert_eq!(solution.recurrence.a, 2);
    assert_eq!(solution.recurrence.b, Expr::int(2));
    assert!(solution.master.applicable);
    assert_eq!(solution.master.method, Method::Master);
    assert_eq!(solution.master.case, Some(2));
    assert_eq!(solution.master.log_b_a, Some(Expr::one()));
    assert!(solution.upper.unwrap().equivalent(&(n() * Expr::log(n()))));
}

#[test]
fn halving_with_constant_work_is_logarithmic() {
    let solution = solve_auto(&(t(n() / Expr::int(2)) + Expr::int(3)));
    assert_eq!(solution.master.case, Some(2));
    assert!(solution.upper.unwrap().equivalent(&Expr::log(n())));
}

#[test]
fn leaf_and_root_dominated_cases() {
    let leaves = solve_auto(&(Expr::int(4) * t(n() / Expr::int(2)) + n()));
    assert_eq!(leaves.master.case, Some(1));
    assert!(leaves.upper.unwrap().equivalent(&Expr::powi(n(), 2)));

    let root = solve_auto(&(Expr::int(2) * t(n() / Expr::int(2)) + Expr::powi(n(), 2)));
    assert_eq!(root.master.case, Some(3));
    assert!(root.upper.unwrap().equivalent(&Expr::powi(n(), 2)));
    assert!(root.master.steps.iter().any(|s| s.starts_with("regularity")));
}

#[test]
fn iteration_can_be_requested() {
    let t_unit = Expr::int(2) * t(n() / Expr::int(2)) + n();
    let solution = solve(&frame(), &t_unit, Some(Method::Iteration), &mut SummationCloser::new());
    assert_eq!(solution.master.method, Method::Iteration);
    assert!(!solution.master.applicable);
    assert_eq!(solution.master.case, None);
    assert!(solution.upper.unwrap().equivalent(&(n() * Expr::log(n()))));
}

#[test]
fn linear_unrolling_gives_a_closed_form() {
    let solution = solve_auto(&(t(n() - Expr::one()) + n()));
    assert_eq!(solution.master.method, Method::Iteration);
    let exact = solution.exact.unwrap();
    // Σ_{k=1}^{n} k + T(1)
    let expected = Expr::ratio(1, 2) * Expr::powi(n(), 2) + Expr::ratio(1, 2) * n() + Expr::one();
    assert!(exact.equivalent(&expected), "got {exact}");
    assert!(solution.upper.unwrap().equivalent(&Expr::powi(n(), 2)));
}

#[test]
fn branching_subtraction_is_exponential() {
    let solution = solve_auto(&(Expr::int(2) * t(n() - Expr::one()) + Expr::one()));
    assert!(solution.upper.unwrap().equivalent(&Expr::pow(Expr::int(2), n())));
}

#[test]
fn mixed_reductions_only_give_bounds() {
    let t_unit = t(n() - Expr::one()) + t(n() - Expr::int(2)) + Expr::one();
    let solution = solve_auto(&t_unit);
    assert!(!solution.recurrence.applicable);
    assert_eq!(solution.recurrence.reductions.len(), 2);
    assert_eq!(solution.master.result, "\\Theta(?)");
    let (upper, lower) = (solution.upper.unwrap(), solution.lower.unwrap());
    assert!(upper.growth() > lower.growth());
}

#[test]
fn calls_inside_loops_are_not_solved() {
    let solution = solve_auto(&(n() * t(n() - Expr::one()) + Expr::one()));
    assert!(!solution.recurrence.applicable);
    assert!(solution.upper.is_none());
    assert!(solution.recurrence.notes.contains("enclosing loop"));
}
