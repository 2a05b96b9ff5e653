use super::*;
use pretty_assertions::assert_eq;

#[test]
fn arena_allocates_sequential_ids() {
    let mut arena = AstArena::new();
    let a = arena.alloc_expr(ExprKind::Ident("n".into()), None);
    let b = arena.alloc_expr(ExprKind::Literal(Literal::Int(1)), Some(Pos::new(2, 5)));
    assert_eq!(a.raw(), 0);
    assert_eq!(b.raw(), 1);
    assert_eq!(arena.expr(b).pos, Some(Pos::new(2, 5)));
    assert_eq!(arena.expr_count(), 2);
}

#[test]
fn operator_symbols_parse_back() {
    for op in [
        BinaryOp::Add,
        BinaryOp::Sub,
        BinaryOp::Mul,
        BinaryOp::Div,
        BinaryOp::IntDiv,
        BinaryOp::Mod,
        BinaryOp::Pow,
        BinaryOp::Eq,
        BinaryOp::NotEq,
        BinaryOp::Lt,
        BinaryOp::LtEq,
        BinaryOp::Gt,
        BinaryOp::GtEq,
        BinaryOp::And,
        BinaryOp::Or,
    ] {
        assert_eq!(BinaryOp::from_symbol(op.as_symbol()), Some(op));
    }
}

#[test]
fn comparison_negation_and_flip() {
    assert_eq!(BinaryOp::Lt.negated(), Some(BinaryOp::GtEq));
    assert_eq!(BinaryOp::Add.negated(), None);
    assert_eq!(BinaryOp::LtEq.flipped(), BinaryOp::GtEq);
    assert_eq!(BinaryOp::Eq.flipped(), BinaryOp::Eq);
}

#[test]
fn program_line_of_defaults_to_zero_before_numbering() {
    let mut program = Program::default();
    let s = program
        .arena
        .alloc_stmt(StmtKind::Return { value: None }, None);
    let t = program
        .arena
        .alloc_stmt(StmtKind::Return { value: None }, Some(Pos::new(7, 1)));
    assert_eq!(program.line_of(s), 0);
    assert_eq!(program.line_of(t), 7);
}

#[test]
fn unplaced_statements_are_numbered_after_the_last_line() {
    let mut program = Program::default();
    let first = program
        .arena
        .alloc_stmt(StmtKind::Return { value: None }, None);
    let placed = program
        .arena
        .alloc_stmt(StmtKind::Return { value: None }, Some(Pos::new(7, 1)));
    let second = program
        .arena
        .alloc_stmt(StmtKind::Return { value: None }, None);
    let block = program.arena.alloc_stmt(
        StmtKind::Block {
            stmts: vec![first, placed, second],
        },
        None,
    );
    program.main = Some(block);
    program.number_unplaced();
    assert_eq!(program.line_of(first), 8);
    assert_eq!(program.line_of(placed), 7);
    assert_eq!(program.line_of(second), 9);
    assert_eq!(program.line_of(block), 0);
}
