//! Asym Analysis - line-by-line cost derivation for pseudocode.
//!
//! Takes the AST produced by the external pseudocode parser and derives,
//! for the worst, best and average case:
//! - a cost table with one row per executed line (`C_k` times its count)
//! - the open total `T(n) = Σ C_k · count_k`
//! - the closed unit-cost polynomial and its `O`, `Ω`, `Θ` classes
//! - for recursive procedures, the recurrence and its solution
//!
//! # Pipeline
//!
//! ```text
//! JSON ──program_from_json──▶ Program ──IterativeAnalyzer──▶ rows
//!                                              │
//!                           SummationCloser ◀──┤ (Σ in each count)
//!                           RecursionFrame  ◀──┘ (T(...) atoms)
//!                                              │
//!                                              ▼
//!                                    Totals + AnalysisResult
//! ```
//!
//! Nothing here returns `Err` to the caller: structural problems and
//! internal faults end up in [`AnalysisResult::errors`] with `ok = false`.

mod avg_model;
mod base;
mod classes;
mod iterative;
mod options;
mod polish;
mod recursive;
mod result;
mod stack;
mod summation;
mod symbolic;

use std::panic::{catch_unwind, AssertUnwindSafe};

use asym_ir::{program_from_json, walk, ProcDef, Program};
use serde_json::Value;

pub use avg_model::{
    AllocatedSymbol, AvgModel, AvgModelConfig, ExactMatcher, PredicateMatcher, ProbabilityMode,
    ProbabilitySource, ProbabilityValue, SubstringMatcher,
};
pub use base::{bindings_digest, BaseAnalyzer, MemoKey, Multiplier, NodeKey, Placeholder};
pub use classes::{
    big_o, big_omega, big_theta, calculate_big_o, calculate_big_omega, calculate_big_theta,
    dominant_term_of, extract_dominant_term, ClassError,
};
pub use iterative::{CaseOutcome, IterativeAnalyzer};
pub use options::{AnalysisOptions, Case, Method, Mode};
pub use polish::{analyze_with_polisher, ExprPolisher, PolishError, MAX_POLISH_ATTEMPTS, POLISH_TIMEOUT};
pub use recursive::{RecursionFrame, SizeParam, Solution, RECURRENCE_SYMBOL};
pub use result::{
    AnalysisError, AnalysisResult, AvgModelInfo, CaseComparison, CaseReport, CostRow,
    MasterResult, RecurrenceSpec, Reduction, RowKind, Totals,
};
pub use summation::SummationCloser;

/// Message of the error recorded when a pass panics.
const INTERNAL_FAILURE: &str = "internal analysis failure";

/// Analyse a parser AST.
///
/// `avg_model` only matters for the average case; without it every
/// unconfigured predicate holds with probability `1/2`.
pub fn analyze(
    ast: &Value,
    mode: Mode,
    avg_model: Option<&AvgModelConfig>,
    preferred_method: Option<Method>,
) -> AnalysisResult {
    let options = AnalysisOptions {
        mode,
        avg_model: avg_model.cloned(),
        preferred_method,
    };
    analyze_with_options(ast, &options)
}

/// [`analyze`] with the options bundled.
pub fn analyze_with_options(ast: &Value, options: &AnalysisOptions) -> AnalysisResult {
    let lowered = program_from_json(ast);
    for err in &lowered.errors {
        tracing::warn!(error = %err, "structural error in input");
    }
    let mut result = analyze_program(&lowered.program, options);
    if !lowered.errors.is_empty() {
        let mut errors: Vec<AnalysisError> = lowered.errors.iter().map(AnalysisError::from).collect();
        errors.append(&mut result.errors);
        result.errors = errors;
        result.ok = false;
    }
    result
}

/// Analyse an already translated program.
pub fn analyze_program(program: &Program, options: &AnalysisOptions) -> AnalysisResult {
    let entry = entry_procedure(program);
    tracing::debug!(
        mode = ?options.mode,
        entry = entry.map_or("<main>", |p| p.name.as_str()),
        procedures = program.procs.len(),
        "analysis started"
    );

    let Some(case) = options.mode.case() else {
        return analyze_all(program, entry, options);
    };
    match run_case(program, entry, case, options) {
        Ok(outcome) => AnalysisResult {
            ok: true,
            by_line: outcome.rows,
            totals: outcome.totals,
            errors: Vec::new(),
            cases: None,
        },
        Err(err) => AnalysisResult {
            ok: false,
            errors: vec![err],
            ..AnalysisResult::default()
        },
    }
}

/// All three cases on independent analyzers. Best and average collapse to
/// [`CaseReport::SameAsWorst`] when their totals match the worst case.
fn analyze_all(program: &Program, entry: Option<&ProcDef>, options: &AnalysisOptions) -> AnalysisResult {
    let (worst, (best, avg)) = rayon::join(
        || run_case(program, entry, Case::Worst, options),
        || {
            rayon::join(
                || run_case(program, entry, Case::Best, options),
                || run_case(program, entry, Case::Avg, options),
            )
        },
    );

    let mut errors = Vec::new();
    let worst = match worst {
        Ok(outcome) => Some(outcome),
        Err(err) => {
            errors.push(err);
            None
        }
    };
    let mut report = |case: Case, outcome: Result<CaseOutcome, AnalysisError>| match outcome {
        Ok(outcome) if worst.as_ref().is_some_and(|w| same_as_worst(w, &outcome)) => {
            tracing::debug!(%case, "same as worst case");
            CaseReport::SameAsWorst
        }
        Ok(outcome) => CaseReport::Distinct {
            by_line: outcome.rows,
            totals: Box::new(outcome.totals),
        },
        Err(err) => {
            errors.push(AnalysisError::new(format!("{case} case: {}", err.message)));
            CaseReport::Distinct {
                by_line: Vec::new(),
                totals: Box::default(),
            }
        }
    };
    let cases = CaseComparison {
        best: report(Case::Best, best),
        avg: report(Case::Avg, avg),
    };

    let (by_line, totals) = worst.map(|w| (w.rows, w.totals)).unwrap_or_default();
    AnalysisResult {
        ok: errors.is_empty(),
        by_line,
        totals,
        errors,
        cases: Some(cases),
    }
}

fn same_as_worst(worst: &CaseOutcome, other: &CaseOutcome) -> bool {
    other.unit == worst.unit && other.totals.t_open == worst.totals.t_open
}

/// One pass on a fresh analyzer. A panic anywhere inside becomes an
/// [`AnalysisError`].
fn run_case(
    program: &Program,
    entry: Option<&ProcDef>,
    case: Case,
    options: &AnalysisOptions,
) -> Result<CaseOutcome, AnalysisError> {
    let pass = AssertUnwindSafe(|| {
        let avg = (case == Case::Avg).then(|| match &options.avg_model {
            Some(config) => AvgModel::new(config),
            None => AvgModel::new(&AvgModelConfig::default()),
        });
        let mut analyzer = match entry {
            Some(proc_def) => IterativeAnalyzer::for_procedure(program, case, proc_def, avg),
            None => IterativeAnalyzer::new(program, case, avg),
        };
        analyzer.set_preferred_method(options.preferred_method);
        analyzer.run()
    });
    catch_unwind(pass).map_err(|_| {
        tracing::error!(%case, "analysis pass panicked");
        AnalysisError::new(INTERNAL_FAILURE)
    })
}

/// The procedure whose cost is reported.
///
/// A procedure named `main` wins, then top-level statements, then the first
/// procedure no other procedure calls. `None` means the top-level block.
fn entry_procedure(program: &Program) -> Option<&ProcDef> {
    if let Some(main) = program.proc_named("main") {
        return Some(main);
    }
    if program.main.is_some() {
        return None;
    }
    let called_by_another = |candidate: &ProcDef| {
        program.procs.iter().any(|caller| {
            caller.name != candidate.name && !walk::calls_to(program, caller.body, &candidate.name).is_empty()
        })
    };
    program
        .procs
        .iter()
        .find(|p| !called_by_another(p))
        .or_else(|| program.procs.first())
}
