//! Reading AST expressions as symbolic values.
//!
//! Loop bounds, `while` conditions and call arguments are pseudocode
//! expressions. The analyzers need them as [`Expr`]s over the program's
//! variables, with simple local definitions (`q <- (p + r) div 2`) already
//! substituted. Anything that has no arithmetic reading (array elements,
//! comparisons, `mod`) yields `None`.

use asym_expr::{Expr, Rational};
use asym_ir::{walk, BinaryOp, ExprId, ExprKind, Literal, Program, StmtId, StmtKind};
use rustc_hash::FxHashMap;

/// Variable name to its current symbolic value.
pub(crate) type Definitions = FxHashMap<String, Expr>;

/// Builtins that measure their argument; the result is the input size.
const LENGTH_FUNCTIONS: &[&str] = &["length", "len", "size", "count"];

pub(crate) fn to_symbolic(program: &Program, id: ExprId, defs: &Definitions) -> Option<Expr> {
    match &program.expr(id).kind {
        ExprKind::Ident(name) => Some(
            defs.get(name)
                .cloned()
                .unwrap_or_else(|| Expr::var(name.clone())),
        ),
        ExprKind::Literal(Literal::Int(v)) => Some(Expr::int(*v)),
        ExprKind::Literal(Literal::Float(bits)) => {
            Rational::from_float(f64::from_bits(*bits)).map(Expr::Num)
        }
        ExprKind::Literal(_) => None,
        ExprKind::Binary { op, left, right } => {
            let l = to_symbolic(program, *left, defs)?;
            let r = to_symbolic(program, *right, defs)?;
            match op {
                BinaryOp::Add => Some(l + r),
                BinaryOp::Sub => Some(l - r),
                BinaryOp::Mul => Some(l * r),
                // Floors are dropped; they never change the growth.
                BinaryOp::Div | BinaryOp::IntDiv => Some(l / r),
                BinaryOp::Pow => Some(Expr::pow(l, r)),
                _ => None,
            }
        }
        ExprKind::Call { name, args } => {
            let name = name.to_ascii_lowercase();
            match (name.as_str(), args.as_slice()) {
                (f, [_]) if LENGTH_FUNCTIONS.contains(&f) => Some(Expr::var("n")),
                ("floor" | "ceil" | "ceiling", [a]) => to_symbolic(program, *a, defs),
                ("sqrt", [a]) => Some(Expr::pow(
                    to_symbolic(program, *a, defs)?,
                    Expr::ratio(1, 2),
                )),
                ("log" | "lg" | "log2", [a]) => Some(Expr::log(to_symbolic(program, *a, defs)?)),
                _ => None,
            }
        }
        ExprKind::Index { .. } | ExprKind::Invalid => None,
    }
}

/// Single-assignment definitions under `root`, in program order.
///
/// Only variables assigned exactly once (and never used as a `for` index)
/// are defined; self-referencing updates such as `i <- i + 1` are not.
pub(crate) fn definitions(program: &Program, root: StmtId) -> Definitions {
    let mut counts: FxHashMap<&str, usize> = FxHashMap::default();
    let mut order = Vec::new();
    walk::for_each_stmt(program, root, &mut |id| match &program.stmt(id).kind {
        StmtKind::Assign { target, value } => {
            if let ExprKind::Ident(name) = &program.expr(*target).kind {
                *counts.entry(name.as_str()).or_default() += 1;
                order.push((name.as_str(), *value));
            }
        }
        StmtKind::For { var, .. } => {
            *counts.entry(var.as_str()).or_default() += 2;
        }
        _ => {}
    });

    let mut defs = Definitions::default();
    for (name, value) in order {
        if counts.get(name) != Some(&1) {
            continue;
        }
        if let Some(sym) = to_symbolic(program, value, &defs) {
            if !sym.contains_var(name) {
                defs.insert(name.to_owned(), sym);
            }
        }
    }
    defs
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests;
