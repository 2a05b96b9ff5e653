//! Read-only traversal helpers over a [`Program`].
//!
//! The analyzers need a handful of whole-subtree questions ("does this body
//! return early?", "which variables does it assign?", "where are the calls
//! to `f`?"). They are answered here with plain pre-order walks.

use crate::ast::{ExprId, ExprKind, Program, StmtId, StmtKind};

/// Direct child statements of `id`, in source order.
pub fn child_stmts(program: &Program, id: StmtId) -> Vec<StmtId> {
    match &program.stmt(id).kind {
        StmtKind::If {
            consequent,
            alternate,
            ..
        } => {
            let mut out = vec![*consequent];
            out.extend(alternate.iter().copied());
            out
        }
        StmtKind::For { body, .. }
        | StmtKind::While { body, .. }
        | StmtKind::Repeat { body, .. } => vec![*body],
        StmtKind::Block { stmts } => stmts.clone(),
        StmtKind::Assign { .. }
        | StmtKind::Call { .. }
        | StmtKind::Return { .. }
        | StmtKind::Invalid => Vec::new(),
    }
}

/// Visit `root` and every statement below it in pre-order.
pub fn for_each_stmt(program: &Program, root: StmtId, f: &mut impl FnMut(StmtId)) {
    f(root);
    for child in child_stmts(program, root) {
        for_each_stmt(program, child, f);
    }
}

/// Expressions owned directly by a statement (not by its children).
pub fn stmt_exprs(program: &Program, id: StmtId) -> Vec<ExprId> {
    match &program.stmt(id).kind {
        StmtKind::Assign { target, value } => vec![*target, *value],
        StmtKind::If { test, .. } | StmtKind::While { test, .. } | StmtKind::Repeat { test, .. } => {
            vec![*test]
        }
        StmtKind::For {
            start, end, step, ..
        } => {
            let mut out = vec![*start, *end];
            out.extend(step.iter().copied());
            out
        }
        StmtKind::Call { args, .. } => args.clone(),
        StmtKind::Return { value } => value.iter().copied().collect(),
        StmtKind::Block { .. } | StmtKind::Invalid => Vec::new(),
    }
}

/// Visit `root` and every sub-expression in pre-order.
pub fn for_each_expr(program: &Program, root: ExprId, f: &mut impl FnMut(ExprId)) {
    f(root);
    match &program.expr(root).kind {
        ExprKind::Binary { left, right, .. } => {
            for_each_expr(program, *left, f);
            for_each_expr(program, *right, f);
        }
        ExprKind::Index { target, index } => {
            for_each_expr(program, *target, f);
            for_each_expr(program, *index, f);
        }
        ExprKind::Call { args, .. } => {
            for arg in args {
                for_each_expr(program, *arg, f);
            }
        }
        ExprKind::Ident(_) | ExprKind::Literal(_) | ExprKind::Invalid => {}
    }
}

/// Whether any statement under `root` is a `Return`.
pub fn contains_return(program: &Program, root: StmtId) -> bool {
    let mut found = false;
    for_each_stmt(program, root, &mut |id| {
        if matches!(program.stmt(id).kind, StmtKind::Return { .. }) {
            found = true;
        }
    });
    found
}

/// Names of plain variables assigned anywhere under `root`.
pub fn assigned_vars(program: &Program, root: StmtId) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for_each_stmt(program, root, &mut |id| {
        if let StmtKind::Assign { target, .. } = &program.stmt(id).kind {
            if let ExprKind::Ident(name) = &program.expr(*target).kind {
                if !out.contains(name) {
                    out.push(name.clone());
                }
            }
        }
    });
    out
}

/// Identifier names referenced by an expression, in first-seen order.
pub fn referenced_idents(program: &Program, root: ExprId) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for_each_expr(program, root, &mut |id| {
        if let ExprKind::Ident(name) = &program.expr(id).kind {
            if !out.contains(name) {
                out.push(name.clone());
            }
        }
    });
    out
}

/// A call site found by [`calls_to`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallSite {
    /// Statement containing the call.
    pub stmt: StmtId,
    pub args: Vec<ExprId>,
}

/// Every call to `name` under `root`, whether a call statement or a call
/// expression nested in another statement.
pub fn calls_to(program: &Program, root: StmtId, name: &str) -> Vec<CallSite> {
    let mut out = Vec::new();
    for_each_stmt(program, root, &mut |id| {
        if let StmtKind::Call { name: callee, args } = &program.stmt(id).kind {
            if callee == name {
                out.push(CallSite {
                    stmt: id,
                    args: args.clone(),
                });
            }
        }
        for expr in stmt_exprs(program, id) {
            for_each_expr(program, expr, &mut |e| {
                if let ExprKind::Call { name: callee, args } = &program.expr(e).kind {
                    if callee == name {
                        out.push(CallSite {
                            stmt: id,
                            args: args.clone(),
                        });
                    }
                }
            });
        }
    });
    out
}

/// Call expressions nested inside the expressions of one statement.
pub fn nested_calls(program: &Program, id: StmtId) -> Vec<(String, Vec<ExprId>)> {
    let mut out = Vec::new();
    for expr in stmt_exprs(program, id) {
        for_each_expr(program, expr, &mut |e| {
            if let ExprKind::Call { name, args } = &program.expr(e).kind {
                out.push((name.clone(), args.clone()));
            }
        });
    }
    out
}
