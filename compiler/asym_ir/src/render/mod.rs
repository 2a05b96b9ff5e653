//! Pseudocode rendering of expressions.
//!
//! The analysis engine only sees boolean tests through their rendered text
//! (the probability model is keyed by it), so rendering is canonical:
//! single spaces around binary operators, parentheses only where precedence
//! requires them, `A[i]` for indexing and `f(a, b)` for calls.

use std::fmt;

use crate::ast::{ExprId, ExprKind, Literal, Program};

/// `Display` adapter for an expression inside a program.
pub struct ExprDisplay<'a> {
    program: &'a Program,
    id: ExprId,
}

impl<'a> ExprDisplay<'a> {
    pub fn new(program: &'a Program, id: ExprId) -> Self {
        ExprDisplay { program, id }
    }
}

impl Program {
    /// Render an expression as pseudocode text.
    pub fn render_expr(&self, id: ExprId) -> String {
        ExprDisplay::new(self, id).to_string()
    }
}

impl fmt::Display for ExprDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_expr(self.program, self.id, 0, f)
    }
}

fn write_expr(
    program: &Program,
    id: ExprId,
    parent_prec: u8,
    f: &mut fmt::Formatter<'_>,
) -> fmt::Result {
    match &program.expr(id).kind {
        ExprKind::Ident(name) => write!(f, "{name}"),
        ExprKind::Literal(lit) => write_literal(lit, f),
        ExprKind::Binary { op, left, right } => {
            let prec = op.precedence();
            let parens = prec < parent_prec;
            if parens {
                write!(f, "(")?;
            }
            write_expr(program, *left, prec, f)?;
            write!(f, " {} ", op.as_symbol())?;
            // Right operand binds one level tighter so `a - (b - c)` keeps its parens.
            write_expr(program, *right, prec + 1, f)?;
            if parens {
                write!(f, ")")?;
            }
            Ok(())
        }
        ExprKind::Index { target, index } => {
            write_expr(program, *target, u8::MAX, f)?;
            write!(f, "[")?;
            write_expr(program, *index, 0, f)?;
            write!(f, "]")
        }
        ExprKind::Call { name, args } => {
            write!(f, "{name}(")?;
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write_expr(program, *arg, 0, f)?;
            }
            write!(f, ")")
        }
        ExprKind::Invalid => write!(f, "<invalid>"),
    }
}

fn write_literal(lit: &Literal, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match lit {
        Literal::Int(v) => write!(f, "{v}"),
        Literal::Float(bits) => write!(f, "{}", f64::from_bits(*bits)),
        Literal::Bool(b) => write!(f, "{b}"),
        Literal::Str(s) => write!(f, "\"{s}\""),
    }
}

#[cfg(test)]
mod tests;
