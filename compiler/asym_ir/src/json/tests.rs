use super::*;
use pretty_assertions::assert_eq;
use serde_json::json;

fn lower_ok(value: &Value) -> Program {
    let lowered = program_from_json(value);
    assert!(lowered.is_ok(), "unexpected errors: {:?}", lowered.errors);
    lowered.program
}

#[test]
fn lowers_for_loop_with_positions() {
    let program = lower_ok(&json!({
        "type": "Program",
        "body": [{
            "type": "For",
            "var": "i",
            "start": {"type": "Literal", "value": 1},
            "end": {"type": "Identifier", "name": "n"},
            "body": {"type": "Block", "body": [{
                "type": "Assign",
                "target": {"type": "Identifier", "name": "x"},
                "value": {"type": "number", "value": 0},
                "pos": {"line": 2, "column": 5}
            }]},
            "pos": {"line": 1, "column": 1}
        }]
    }));

    let main = program.main.expect("main block");
    let StmtKind::Block { stmts } = &program.stmt(main).kind else {
        panic!("expected block");
    };
    let for_id = stmts[0];
    assert_eq!(program.stmt(for_id).pos, Some(Pos::new(1, 1)));
    match &program.stmt(for_id).kind {
        StmtKind::For {
            var, end, downto, ..
        } => {
            assert_eq!(var, "i");
            assert!(!downto);
            assert_eq!(program.render_expr(*end), "n");
        }
        other => panic!("expected For, got {other:?}"),
    }
}

#[test]
fn lowers_procedures_and_params() {
    let program = lower_ok(&json!({
        "type": "Program",
        "body": [{
            "type": "ProcDef",
            "name": "f",
            "params": ["A", {"type": "Identifier", "name": "n"}],
            "body": [{"type": "Return", "value": null}]
        }]
    }));
    assert_eq!(program.procs.len(), 1);
    assert_eq!(program.procs[0].params, vec!["A".to_owned(), "n".to_owned()]);
    assert!(program.main.is_none());
}

#[test]
fn unknown_statement_is_localized_and_siblings_survive() {
    let lowered = program_from_json(&json!({
        "type": "Program",
        "body": [
            {"type": "Goto", "label": "L", "pos": {"line": 3, "column": 2}},
            {"type": "Assign",
             "target": {"type": "Identifier", "name": "x"},
             "value": {"type": "Literal", "value": 1}}
        ]
    }));
    assert_eq!(
        lowered.errors,
        vec![AstError {
            kind: AstErrorKind::UnknownNode {
                found: "Goto".to_owned()
            },
            pos: Some(Pos::new(3, 2)),
        }]
    );
    let main = lowered.program.main.expect("main block");
    let StmtKind::Block { stmts } = &lowered.program.stmt(main).kind else {
        panic!("expected block");
    };
    assert_eq!(lowered.program.stmt(stmts[0]).kind, StmtKind::Invalid);
    assert!(matches!(
        lowered.program.stmt(stmts[1]).kind,
        StmtKind::Assign { .. }
    ));
}

#[test]
fn missing_field_is_reported() {
    let lowered = program_from_json(&json!({
        "type": "While",
        "body": {"type": "Block", "body": []},
        "pos": {"line": 4, "column": 1}
    }));
    assert_eq!(lowered.errors.len(), 1);
    assert_eq!(
        lowered.errors[0].to_string(),
        "`While` node is missing required field `test` at 4:1"
    );
}

#[test]
fn unknown_operator_is_reported() {
    let lowered = program_from_json(&json!({
        "type": "Assign",
        "target": "x",
        "value": {"type": "Binary", "op": "<<<", "left": 1, "right": 2}
    }));
    assert_eq!(
        lowered.errors[0].kind,
        AstErrorKind::UnknownOperator {
            op: "<<<".to_owned()
        }
    );
}

#[test]
fn call_statement_and_call_expression() {
    let program = lower_ok(&json!([
        {"type": "Call", "name": "swap", "args": ["A", "i", "j"]},
        {"type": "Assign", "target": "y",
         "value": {"type": "Call", "name": "f", "args": [
             {"type": "Binary", "op": "div", "left": "n", "right": 2}
         ]}}
    ]));
    let main = program.main.expect("main block");
    let StmtKind::Block { stmts } = &program.stmt(main).kind else {
        panic!("expected block");
    };
    assert!(matches!(&program.stmt(stmts[0]).kind, StmtKind::Call { name, args } if name == "swap" && args.len() == 3));
    let StmtKind::Assign { value, .. } = &program.stmt(stmts[1]).kind else {
        panic!("expected assign");
    };
    assert_eq!(program.render_expr(*value), "f(n div 2)");
}

#[test]
fn statements_without_positions_get_distinct_lines() {
    let program = lower_ok(&json!([
        {"type": "Assign", "target": "x", "value": 0, "pos": {"line": 3, "column": 1}},
        {"type": "Assign", "target": "y", "value": 0},
        {"type": "For", "var": "i", "start": 1, "end": "n",
         "body": [{"type": "Assign", "target": "z", "value": "i"}]}
    ]));
    let main = program.main.expect("main block");
    let StmtKind::Block { stmts } = &program.stmt(main).kind else {
        panic!("expected block");
    };
    let lines: Vec<u32> = stmts.iter().map(|s| program.line_of(*s)).collect();
    assert_eq!(lines, vec![3, 4, 5]);
    let StmtKind::For { body, .. } = &program.stmt(stmts[2]).kind else {
        panic!("expected for");
    };
    let StmtKind::Block { stmts: inner } = &program.stmt(*body).kind else {
        panic!("expected block");
    };
    assert_eq!(program.line_of(inner[0]), 6);
}
