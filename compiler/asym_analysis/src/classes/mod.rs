//! Asymptotic classes of closed totals.
//!
//! The dominant term of a total is its highest-growth monomial with the
//! coefficient and every constant-growth factor (probability symbols,
//! `log 3`, ...) stripped, so `\frac{n^{2}}{2} - \frac{n}{2}` reduces to
//! `n^{2}` and a constant total reduces to `1`.

use std::fmt;

use asym_expr::{dominant_term, growth_key, parse_markup_with_constants, simplify, Expr, ParseError, Poly};

#[derive(Clone, Debug, PartialEq)]
pub enum ClassError {
    /// The total still carries per-line cost units.
    CostUnit { label: String },
    /// The total still carries an unresolved iteration placeholder.
    Placeholder { label: String },
    /// The markup could not be read.
    Parse(ParseError),
}

impl fmt::Display for ClassError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassError::CostUnit { label } => {
                write!(f, "total still contains cost unit `{label}`")
            }
            ClassError::Placeholder { label } => {
                write!(f, "total still contains iteration placeholder `{label}`")
            }
            ClassError::Parse(err) => write!(f, "cannot read total: {err}"),
        }
    }
}

impl std::error::Error for ClassError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ClassError::Parse(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ParseError> for ClassError {
    fn from(err: ParseError) -> Self {
        ClassError::Parse(err)
    }
}

/// Read a rendered total and return its dominant term.
///
/// `constants` lists names that are probability symbols rather than
/// variables.
pub fn extract_dominant_term(markup: &str, constants: &[&str]) -> Result<Expr, ClassError> {
    let expr = parse_markup_with_constants(markup, constants)?;
    dominant_term_of(&expr)
}

/// The dominant term of a closed total.
pub fn dominant_term_of(expr: &Expr) -> Result<Expr, ClassError> {
    let mut unresolved = None;
    expr.visit(&mut |e| {
        if unresolved.is_none() {
            unresolved = match e {
                Expr::Cost(_) => Some(ClassError::CostUnit { label: e.to_string() }),
                Expr::Opaque(_) => Some(ClassError::Placeholder { label: e.to_string() }),
                _ => None,
            };
        }
    });
    if let Some(err) = unresolved {
        return Err(err);
    }

    let estimated = expr.rewrite(&mut |e| matches!(e, Expr::Sum(..)).then(|| e.sum_upper_estimate()));
    let Some((monomial, _)) = dominant_term(&Poly::from_expr(&simplify(&estimated))) else {
        return Ok(Expr::one());
    };
    let factors: Vec<Expr> = monomial
        .into_iter()
        .filter(|(atom, k)| !growth_key(&vec![(atom.clone(), *k)]).is_constant())
        .map(|(atom, k)| if k == 1 { atom } else { Expr::powi(atom, k) })
        .collect();
    Ok(simplify(&Expr::mul_all(factors)))
}

pub fn big_o(term: &Expr) -> String {
    format!("O({term})")
}

pub fn big_omega(term: &Expr) -> String {
    format!("\\Omega({term})")
}

pub fn big_theta(term: &Expr) -> String {
    format!("\\Theta({term})")
}

pub fn calculate_big_o(total: &Expr) -> Result<String, ClassError> {
    dominant_term_of(total).map(|t| big_o(&t))
}

pub fn calculate_big_omega(total: &Expr) -> Result<String, ClassError> {
    dominant_term_of(total).map(|t| big_omega(&t))
}

pub fn calculate_big_theta(total: &Expr) -> Result<String, ClassError> {
    dominant_term_of(total).map(|t| big_theta(&t))
}
