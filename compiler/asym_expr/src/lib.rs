//! Asym Expr - symbolic arithmetic for cost formulas.
//!
//! - [`Expr`]: immutable expression trees over exact rationals
//! - [`Poly`]: the canonical sum-of-monomials normal form
//! - [`simplify`]: `Expr -> Poly -> Expr`, idempotent and total
//! - [`to_latex`]: math markup rendering
//! - [`GrowthKey`]: asymptotic ordering of monomials
//! - [`parse_markup`]: reads rendered markup back into an [`Expr`]
//!
//! Nothing here fails on unsupported shapes. Anything without a polynomial
//! reading is carried through as an opaque atom, so callers always get a
//! valid (if less reduced) expression back.

mod expr;
mod growth;
mod parse;
mod poly;
mod render;
mod simplify;

pub use expr::{Bound, Expr, Rational};
pub use parse::{parse_markup, parse_markup_with_constants, ParseError, ParseErrorKind};
pub use poly::{exact_log2, Monomial, Poly};
pub use render::to_latex;
pub use growth::{dominant_term, growth_key, GrowthKey};
pub use simplify::simplify;
