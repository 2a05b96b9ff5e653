//! Asym IR - pseudocode syntax trees for cost analysis.
//!
//! This crate contains the strict, closed AST that the analysis engine
//! consumes:
//! - Source positions (`Pos`)
//! - Flat statement and expression nodes addressed by `StmtId` / `ExprId`
//! - Procedures and whole programs
//! - The adapter that turns the external parser's loose JSON dictionaries
//!   into this representation (`program_from_json`)
//! - Pseudocode rendering of expressions, used as predicate keys
//!
//! # Design Philosophy
//!
//! - **Flatten Everything**: no `Box<Stmt>`, children are `StmtId(u32)` /
//!   `ExprId(u32)` indices into one arena per program
//! - **Closed Vocabulary**: one variant per node kind; anything the adapter
//!   does not recognize becomes an `Invalid` node plus an [`AstError`]
//! - **Translate Once**: the loose external shape is only ever inspected in
//!   [`json`], never by the analyzers

pub mod ast;
pub mod json;
mod render;
pub mod walk;

pub use ast::{
    AstArena, BinaryOp, Expr, ExprId, ExprKind, Literal, Pos, ProcDef, Program, Stmt, StmtId,
    StmtKind,
};
pub use json::{program_from_json, AstError, AstErrorKind, Lowered};
pub use render::ExprDisplay;
