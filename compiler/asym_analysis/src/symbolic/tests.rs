use asym_expr::simplify;
use asym_ir::program_from_json;
use pretty_assertions::assert_eq;
use serde_json::json;

use super::*;

fn value_of(program: &Program, index: usize) -> ExprId {
    let main = program.main.unwrap();
    let StmtKind::Block { stmts } = &program.stmt(main).kind else {
        panic!("expected a block");
    };
    let StmtKind::Assign { value, .. } = &program.stmt(stmts[index]).kind else {
        panic!("expected an assignment");
    };
    *value
}

#[test]
fn arithmetic_and_builtins() {
    let lowered = program_from_json(&json!([
        {"type": "Assign", "target": "a",
         "value": {"type": "Binary", "op": "div",
                   "left": {"type": "Binary", "op": "+", "left": "p", "right": "r"},
                   "right": 2}},
        {"type": "Assign", "target": "b",
         "value": {"type": "Call", "name": "length", "args": ["A"]}},
        {"type": "Assign", "target": "c",
         "value": {"type": "Binary", "op": "mod", "left": "i", "right": 2}},
        {"type": "Assign", "target": "d",
         "value": {"type": "Index", "target": "A", "index": "i"}}
    ]));
    let program = lowered.program;
    let defs = Definitions::default();
    let a = to_symbolic(&program, value_of(&program, 0), &defs).unwrap();
    assert!(a.equivalent(&((Expr::var("p") + Expr::var("r")) / Expr::int(2))));
    assert_eq!(to_symbolic(&program, value_of(&program, 1), &defs), Some(Expr::var("n")));
    assert_eq!(to_symbolic(&program, value_of(&program, 2), &defs), None);
    assert_eq!(to_symbolic(&program, value_of(&program, 3), &defs), None);
}

#[test]
fn single_assignments_chain() {
    let lowered = program_from_json(&json!([
        {"type": "Assign", "target": "q",
         "value": {"type": "Binary", "op": "/",
                   "left": {"type": "Binary", "op": "+", "left": "p", "right": "r"},
                   "right": 2}},
        {"type": "Assign", "target": "m",
         "value": {"type": "Binary", "op": "-", "left": "q", "right": "p"}},
        {"type": "Assign", "target": "i", "value": 0},
        {"type": "Assign", "target": "i",
         "value": {"type": "Binary", "op": "+", "left": "i", "right": 1}}
    ]));
    let program = lowered.program;
    let defs = definitions(&program, program.main.unwrap());
    let expected = simplify(&((Expr::var("r") - Expr::var("p")) / Expr::int(2)));
    assert!(defs["m"].equivalent(&expected));
    assert!(!defs.contains_key("i"));
}
