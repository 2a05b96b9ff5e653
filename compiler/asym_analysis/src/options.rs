//! Analysis configuration.

use std::fmt;

use serde::Serialize;

use crate::avg_model::AvgModelConfig;

/// Which case(s) to analyse.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Worst,
    Best,
    Avg,
    /// All three cases, with best/average collapsed when equal to worst.
    All,
}

impl Mode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "worst" => Some(Mode::Worst),
            "best" => Some(Mode::Best),
            "avg" | "average" => Some(Mode::Avg),
            "all" => Some(Mode::All),
            _ => None,
        }
    }

    /// The single case this mode runs, `None` for [`Mode::All`].
    pub fn case(self) -> Option<Case> {
        match self {
            Mode::Worst => Some(Case::Worst),
            Mode::Best => Some(Case::Best),
            Mode::Avg => Some(Case::Avg),
            Mode::All => None,
        }
    }
}

/// One analysis pass. An analyzer instance only ever runs one case.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Case {
    Worst,
    Best,
    Avg,
}

impl Case {
    pub fn as_str(self) -> &'static str {
        match self {
            Case::Worst => "worst",
            Case::Best => "best",
            Case::Avg => "avg",
        }
    }
}

impl fmt::Display for Case {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How recurrences are solved.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Master,
    Iteration,
}

impl Method {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "master" => Some(Method::Master),
            "iteration" | "unrolling" => Some(Method::Iteration),
            _ => None,
        }
    }
}

/// Options for [`crate::analyze_with_options`].
#[derive(Clone, Debug, Default)]
pub struct AnalysisOptions {
    pub mode: Mode,
    /// Probability model for the average case; uniform when absent.
    pub avg_model: Option<AvgModelConfig>,
    /// `None` picks the Master Theorem when it applies, iteration otherwise.
    pub preferred_method: Option<Method>,
}
