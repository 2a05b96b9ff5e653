//! Result records.
//!
//! Everything here serializes to the plain-JSON shape callers consume:
//! expressions are written as math markup, field names follow the
//! external contract (`byLine`, `T_open`, `expectedRuns`, ...).

use std::collections::BTreeMap;
use std::fmt;

use asym_expr::Expr;
use serde::{Serialize, Serializer};

use crate::avg_model::ProbabilityMode;
use crate::options::Method;

fn latex<S: Serializer>(expr: &Expr, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&expr.to_string())
}

fn latex_opt<S: Serializer>(expr: &Option<Expr>, serializer: S) -> Result<S::Ok, S::Error> {
    match expr {
        Some(e) => serializer.serialize_some(&e.to_string()),
        None => serializer.serialize_none(),
    }
}

/// Statement kind of a cost row.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RowKind {
    Assign,
    If,
    For,
    While,
    Repeat,
    Call,
    Return,
    Block,
}

impl RowKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RowKind::Assign => "assign",
            RowKind::If => "if",
            RowKind::For => "for",
            RowKind::While => "while",
            RowKind::Repeat => "repeat",
            RowKind::Call => "call",
            RowKind::Return => "return",
            RowKind::Block => "block",
        }
    }
}

/// One line of the cost table.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CostRow {
    pub line: u32,
    pub kind: RowKind,
    /// Cost-unit label, `C_{line}`.
    pub ck: String,
    /// Execution count as composed from the enclosing loops, before closing.
    #[serde(serialize_with = "latex")]
    pub count_raw: Expr,
    /// Closed and simplified execution count.
    #[serde(serialize_with = "latex")]
    pub count: Expr,
    /// Average case only: the count weighted by branch probabilities.
    #[serde(rename = "expectedRuns", serialize_with = "latex_opt")]
    pub expected_runs: Option<Expr>,
    pub note: String,
}

impl CostRow {
    /// The count that enters the total.
    pub fn effective_count(&self) -> &Expr {
        self.expected_runs.as_ref().unwrap_or(&self.count)
    }
}

/// How a recursive call shrinks its input.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Reduction {
    /// `T(n / by)`
    Divide {
        #[serde(serialize_with = "latex")]
        by: Expr,
    },
    /// `T(n - by)`
    Subtract {
        #[serde(serialize_with = "latex")]
        by: Expr,
    },
}

impl Reduction {
    /// The argument `n / b` or `n - c` in terms of `size`.
    pub fn apply_to(&self, size: &Expr) -> Expr {
        match self {
            Reduction::Divide { by } => (size.clone() / by.clone()).simplify(),
            Reduction::Subtract { by } => (size.clone() - by.clone()).simplify(),
        }
    }
}

/// `T(n) = a T(n/b) + f(n)` as extracted from a procedure body.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RecurrenceSpec {
    /// Number of recursive calls per invocation.
    pub a: u32,
    /// Division factor; `1` for subtractive recurrences.
    #[serde(serialize_with = "latex")]
    pub b: Expr,
    /// Non-recursive work.
    #[serde(serialize_with = "latex")]
    pub f: Expr,
    /// Base-case threshold.
    pub n0: i64,
    pub applicable: bool,
    pub notes: String,
    pub reductions: Vec<Reduction>,
    /// The relation as markup, `T(n) = ...`.
    pub relation: String,
}

/// Outcome of solving a recurrence.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MasterResult {
    /// Whether the Master Theorem itself applied.
    pub applicable: bool,
    /// Method that produced `result`.
    pub method: Method,
    /// Master Theorem case, when it applied.
    pub case: Option<u8>,
    /// `log_b a`, for divisive recurrences.
    #[serde(serialize_with = "latex_opt")]
    pub log_b_a: Option<Expr>,
    pub steps: Vec<String>,
    /// `\Theta(...)`, or the bounds when no tight class was derived.
    pub result: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AvgModelInfo {
    pub mode: ProbabilityMode,
    pub note: String,
}

/// Summary of one analysis pass.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Totals {
    #[serde(rename = "T_open")]
    pub t_open: String,
    #[serde(rename = "T_polynomial")]
    pub t_polynomial: Option<String>,
    pub big_o: String,
    pub big_omega: String,
    pub big_theta: String,
    pub recurrence: Option<RecurrenceSpec>,
    pub master: Option<MasterResult>,
    pub avg_model_info: Option<AvgModelInfo>,
    #[serde(rename = "A_of_n")]
    pub a_of_n: Option<String>,
    /// Derivation trail, in order.
    pub procedure: Vec<String>,
    /// Every symbol appearing in the table or totals, with its meaning.
    pub symbols: BTreeMap<String, String>,
}

/// A localized error in the result's `errors` list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AnalysisError {
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub message: String,
}

impl AnalysisError {
    pub fn new(message: impl Into<String>) -> Self {
        AnalysisError {
            line: None,
            column: None,
            message: message.into(),
        }
    }
}

impl From<&asym_ir::AstError> for AnalysisError {
    fn from(err: &asym_ir::AstError) -> Self {
        AnalysisError {
            line: err.pos.map(|p| p.line),
            column: err.pos.map(|p| p.column),
            message: err.kind.to_string(),
        }
    }
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.line, self.column) {
            (Some(line), Some(column)) => write!(f, "{line}:{column}: {}", self.message),
            (Some(line), None) => write!(f, "{line}: {}", self.message),
            _ => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for AnalysisError {}

/// Best or average case in `all` mode.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CaseReport {
    /// Structurally identical to the worst case.
    SameAsWorst,
    Distinct {
        #[serde(rename = "byLine")]
        by_line: Vec<CostRow>,
        totals: Box<Totals>,
    },
}

impl CaseReport {
    pub fn is_same_as_worst(&self) -> bool {
        matches!(self, CaseReport::SameAsWorst)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CaseComparison {
    pub best: CaseReport,
    pub avg: CaseReport,
}

/// What `analyze` returns.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub ok: bool,
    #[serde(rename = "byLine")]
    pub by_line: Vec<CostRow>,
    pub totals: Totals,
    pub errors: Vec<AnalysisError>,
    /// Present in `all` mode: the worst case is in `byLine`/`totals`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cases: Option<CaseComparison>,
}

impl AnalysisResult {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
