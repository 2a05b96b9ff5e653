use crate::ast::{BinaryOp, ExprKind, Literal, Program};
use pretty_assertions::assert_eq;

fn ident(program: &mut Program, name: &str) -> crate::ExprId {
    program.arena.alloc_expr(ExprKind::Ident(name.into()), None)
}

fn binary(
    program: &mut Program,
    op: BinaryOp,
    left: crate::ExprId,
    right: crate::ExprId,
) -> crate::ExprId {
    program
        .arena
        .alloc_expr(ExprKind::Binary { op, left, right }, None)
}

#[test]
fn renders_indexed_equality() {
    let mut program = Program::default();
    let a = ident(&mut program, "A");
    let i = ident(&mut program, "i");
    let x = ident(&mut program, "x");
    let index = program
        .arena
        .alloc_expr(ExprKind::Index { target: a, index: i }, None);
    let test = binary(&mut program, BinaryOp::Eq, index, x);
    assert_eq!(program.render_expr(test), "A[i] = x");
}

#[test]
fn parenthesizes_by_precedence() {
    let mut program = Program::default();
    let lo = ident(&mut program, "lo");
    let hi = ident(&mut program, "hi");
    let two = program
        .arena
        .alloc_expr(ExprKind::Literal(Literal::Int(2)), None);
    let sum = binary(&mut program, BinaryOp::Add, lo, hi);
    let mid = binary(&mut program, BinaryOp::IntDiv, sum, two);
    assert_eq!(program.render_expr(mid), "(lo + hi) div 2");
}

#[test]
fn right_associated_subtraction_keeps_parens() {
    let mut program = Program::default();
    let a = ident(&mut program, "a");
    let b = ident(&mut program, "b");
    let c = ident(&mut program, "c");
    let inner = binary(&mut program, BinaryOp::Sub, b, c);
    let outer = binary(&mut program, BinaryOp::Sub, a, inner);
    assert_eq!(program.render_expr(outer), "a - (b - c)");
}

#[test]
fn renders_calls() {
    let mut program = Program::default();
    let n = ident(&mut program, "n");
    let two = program
        .arena
        .alloc_expr(ExprKind::Literal(Literal::Int(2)), None);
    let half = binary(&mut program, BinaryOp::Div, n, two);
    let call = program.arena.alloc_expr(
        ExprKind::Call {
            name: "f".into(),
            args: vec![half, n],
        },
        None,
    );
    assert_eq!(program.render_expr(call), "f(n / 2, n)");
}
