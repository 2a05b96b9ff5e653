//! Optional prettifying of closed totals.
//!
//! An [`ExprPolisher`] is an external, best-effort rewriter for markup the
//! engine already derived. Its output is only accepted when it parses and
//! is equivalent to the original; on every other outcome the engine's own
//! rendering stays. No implementation ships here.

use std::fmt;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use asym_expr::parse_markup;
use serde_json::Value;

use crate::options::AnalysisOptions;
use crate::result::{AnalysisResult, CaseReport, Totals};

/// Attempts per expression before giving up.
pub const MAX_POLISH_ATTEMPTS: u32 = 2;

/// How long one attempt may take.
pub const POLISH_TIMEOUT: Duration = Duration::from_secs(10);

/// External rewriter for rendered totals.
pub trait ExprPolisher: Send + Sync {
    fn polish(&self, markup: &str) -> Result<String, PolishError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PolishError {
    /// The polisher could not be reached or refused the request.
    Unavailable(String),
    /// No answer within [`POLISH_TIMEOUT`].
    Timeout,
    /// The answer does not parse.
    Unparseable(String),
    /// The answer parses but is not the same expression.
    NotEquivalent(String),
}

impl fmt::Display for PolishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolishError::Unavailable(reason) => write!(f, "polisher unavailable: {reason}"),
            PolishError::Timeout => write!(f, "polisher timed out after {}s", POLISH_TIMEOUT.as_secs()),
            PolishError::Unparseable(markup) => write!(f, "polished markup `{markup}` does not parse"),
            PolishError::NotEquivalent(markup) => {
                write!(f, "polished markup `{markup}` is not equivalent")
            }
        }
    }
}

impl std::error::Error for PolishError {}

/// [`crate::analyze_with_options`], then try to polish `T_polynomial` and
/// `A_of_n` of every reported case.
pub fn analyze_with_polisher(
    ast: &Value,
    options: &AnalysisOptions,
    polisher: Arc<dyn ExprPolisher>,
) -> AnalysisResult {
    let mut result = crate::analyze_with_options(ast, options);
    polish_totals(&polisher, &mut result.totals);
    if let Some(cases) = &mut result.cases {
        for report in [&mut cases.best, &mut cases.avg] {
            if let CaseReport::Distinct { totals, .. } = report {
                polish_totals(&polisher, totals);
            }
        }
    }
    result
}

fn polish_totals(polisher: &Arc<dyn ExprPolisher>, totals: &mut Totals) {
    for field in [&mut totals.t_polynomial, &mut totals.a_of_n] {
        if let Some(markup) = field {
            if let Some(polished) = polish_markup(polisher, markup) {
                *markup = polished;
            }
        }
    }
}

/// The first acceptable rewrite of `markup`, if any.
fn polish_markup(polisher: &Arc<dyn ExprPolisher>, markup: &str) -> Option<String> {
    let original = parse_markup(markup).ok()?;
    for attempt in 1..=MAX_POLISH_ATTEMPTS {
        let outcome = polish_once(polisher, markup).and_then(|candidate| {
            let parsed =
                parse_markup(&candidate).map_err(|_| PolishError::Unparseable(candidate.clone()))?;
            if parsed.equivalent(&original) {
                Ok(candidate)
            } else {
                Err(PolishError::NotEquivalent(candidate))
            }
        });
        match outcome {
            Ok(candidate) => {
                tracing::debug!(attempt, from = markup, to = %candidate, "polished");
                return Some(candidate);
            }
            Err(err) => tracing::debug!(attempt, error = %err, "polish attempt rejected"),
        }
    }
    None
}

/// One call on a worker thread, abandoned after [`POLISH_TIMEOUT`].
fn polish_once(polisher: &Arc<dyn ExprPolisher>, markup: &str) -> Result<String, PolishError> {
    let (tx, rx) = mpsc::channel();
    let polisher = Arc::clone(polisher);
    let markup = markup.to_owned();
    thread::spawn(move || {
        let _ = tx.send(polisher.polish(&markup));
    });
    match rx.recv_timeout(POLISH_TIMEOUT) {
        Ok(answer) => answer,
        Err(mpsc::RecvTimeoutError::Timeout) => Err(PolishError::Timeout),
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            Err(PolishError::Unavailable("polisher panicked".to_owned()))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::options::Mode;

    /// Replies from a fixed script, one entry per call.
    struct Scripted {
        replies: Vec<Result<String, PolishError>>,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(replies: Vec<Result<String, PolishError>>) -> Arc<Self> {
            Arc::new(Scripted {
                replies,
                calls: AtomicU32::new(0),
            })
        }
    }

    impl ExprPolisher for Scripted {
        fn polish(&self, _markup: &str) -> Result<String, PolishError> {
            let k = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
            self.replies
                .get(k)
                .cloned()
                .unwrap_or_else(|| Err(PolishError::Unavailable("script exhausted".to_owned())))
        }
    }

    fn as_dyn(p: &Arc<Scripted>) -> Arc<dyn ExprPolisher> {
        Arc::clone(p) as Arc<dyn ExprPolisher>
    }

    #[test]
    fn equivalent_rewrite_is_accepted() {
        let p = Scripted::new(vec![Ok("\\frac{n^{2} - n}{2}".to_owned())]);
        let out = polish_markup(&as_dyn(&p), "\\frac{n^{2}}{2} - \\frac{n}{2}");
        assert_eq!(out.as_deref(), Some("\\frac{n^{2} - n}{2}"));
    }

    #[test]
    fn wrong_answers_are_retried_then_dropped() {
        let p = Scripted::new(vec![Ok("n^{3}".to_owned()), Ok("\\frac{".to_owned())]);
        let out = polish_markup(&as_dyn(&p), "n^{2} + n");
        assert_eq!(out, None);
        assert_eq!(p.calls.load(Ordering::SeqCst), MAX_POLISH_ATTEMPTS);
    }

    #[test]
    fn failure_then_success() {
        let p = Scripted::new(vec![
            Err(PolishError::Unavailable("busy".to_owned())),
            Ok("n + 1".to_owned()),
        ]);
        assert_eq!(polish_markup(&as_dyn(&p), "1 + n").as_deref(), Some("n + 1"));
    }

    #[test]
    fn unavailable_polisher_keeps_the_result() {
        let ast = json!({
            "type": "ProcDef",
            "name": "Loop",
            "params": ["n"],
            "body": {"type": "Block", "body": [{
                "type": "For", "var": "i", "pos": {"line": 1, "column": 1},
                "start": {"type": "Literal", "value": 1},
                "end": {"type": "Identifier", "name": "n"},
                "body": {"type": "Block", "body": [{
                    "type": "Assign", "pos": {"line": 2, "column": 5},
                    "target": {"type": "Identifier", "name": "x"},
                    "value": {"type": "Identifier", "name": "i"}
                }]}
            }]}
        });
        let options = AnalysisOptions {
            mode: Mode::Worst,
            ..AnalysisOptions::default()
        };
        let plain = crate::analyze_with_options(&ast, &options);
        let p = Scripted::new(Vec::new());
        let polished = analyze_with_polisher(&ast, &options, as_dyn(&p));
        assert_eq!(polished, plain);
        assert_eq!(p.calls.load(Ordering::SeqCst), MAX_POLISH_ATTEMPTS);
    }
}
