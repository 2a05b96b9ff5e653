//! Branch probabilities for the average case.
//!
//! An [`AvgModel`] answers "how likely is this predicate to hold?" for the
//! rendered test of an `if`. Configured predicates are looked up through a
//! [`PredicateMatcher`]; anything unmatched gets `1/2` (uniform mode) or a
//! fresh symbol `p`, `q`, `r`, ... (symbolic mode). Symbols are allocated
//! once per predicate and owned by the model instance, so two analyses never
//! share a counter.

use std::collections::BTreeMap;
use std::fmt;

use asym_expr::{parse_markup, Expr};
use serde::{Deserialize, Serialize};

/// What unmatched predicates evaluate to.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbabilityMode {
    #[default]
    Uniform,
    Symbolic,
}

impl ProbabilityMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ProbabilityMode::Uniform => "uniform",
            ProbabilityMode::Symbolic => "symbolic",
        }
    }
}

/// A configured probability, written either as a JSON number or a string.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ProbabilitySource {
    Number(f64),
    Text(String),
}

impl ProbabilitySource {
    fn as_text(&self) -> String {
        match self {
            ProbabilitySource::Number(v) => v.to_string(),
            ProbabilitySource::Text(s) => s.clone(),
        }
    }
}

/// `{ "mode": "uniform" | "symbolic", "predicates": { pred: prob } }`
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct AvgModelConfig {
    #[serde(default)]
    pub mode: ProbabilityMode,
    #[serde(default)]
    pub predicates: BTreeMap<String, ProbabilitySource>,
}

/// Strategy for finding a configured predicate that matches a rendered test.
pub trait PredicateMatcher: fmt::Debug + Send + Sync {
    /// Index into `keys` of the matching predicate, if any.
    fn find(&self, keys: &[String], predicate: &str) -> Option<usize>;
}

/// Exact string equality only.
#[derive(Copy, Clone, Debug, Default)]
pub struct ExactMatcher;

impl PredicateMatcher for ExactMatcher {
    fn find(&self, keys: &[String], predicate: &str) -> Option<usize> {
        keys.iter().position(|k| k == predicate)
    }
}

/// Exact match, then whitespace-insensitive equality, then containment in
/// either direction.
///
/// Containment can pick up an unrelated predicate that happens to share
/// text (`i < n` inside `j < n - 1`); the first configured key in sorted
/// order wins.
#[derive(Copy, Clone, Debug, Default)]
pub struct SubstringMatcher;

fn normalize(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

impl PredicateMatcher for SubstringMatcher {
    fn find(&self, keys: &[String], predicate: &str) -> Option<usize> {
        if let Some(i) = ExactMatcher.find(keys, predicate) {
            return Some(i);
        }
        let wanted = normalize(predicate);
        if wanted.is_empty() {
            return None;
        }
        let normalized: Vec<String> = keys.iter().map(|k| normalize(k)).collect();
        normalized.iter().position(|k| *k == wanted).or_else(|| {
            normalized
                .iter()
                .position(|k| !k.is_empty() && (k.contains(&wanted) || wanted.contains(k.as_str())))
        })
    }
}

/// A probability string classified by shape before conversion.
#[derive(Clone, Debug, PartialEq)]
pub enum ProbabilityValue {
    Integer(i64),
    /// `a/b` or a decimal such as `0.25`.
    Rational(i64, i64),
    Symbol(String),
    /// `p(i)`, `f(n, 2)`.
    Applied(String, Vec<String>),
    /// Anything else, read as markup (`1/n`, `\frac{1}{n}`).
    Markup(String),
}

fn is_name(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_unsigned_int(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

impl ProbabilityValue {
    /// Classify by inspection; nothing is parsed speculatively.
    pub fn classify(text: &str) -> Self {
        let s = text.trim();
        let unsigned = s.strip_prefix('-').unwrap_or(s);
        let sign = if unsigned.len() == s.len() { 1 } else { -1 };

        if is_unsigned_int(unsigned) {
            if let Ok(v) = unsigned.parse::<i64>() {
                return ProbabilityValue::Integer(sign * v);
            }
        }
        if let Some((num, den)) = unsigned.split_once('/') {
            let (num, den) = (num.trim(), den.trim());
            if is_unsigned_int(num) && is_unsigned_int(den) {
                if let (Ok(n), Ok(d)) = (num.parse::<i64>(), den.parse::<i64>()) {
                    if d != 0 {
                        return ProbabilityValue::Rational(sign * n, d);
                    }
                }
            }
        }
        if let Some((whole, frac)) = unsigned.split_once('.') {
            if (whole.is_empty() || is_unsigned_int(whole)) && is_unsigned_int(frac) && frac.len() <= 9 {
                let scale = 10i64.pow(u32::try_from(frac.len()).unwrap_or(9));
                let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().unwrap_or(0) };
                let frac: i64 = frac.parse().unwrap_or(0);
                return ProbabilityValue::Rational(sign * (whole * scale + frac), scale);
            }
        }
        if sign == 1 && is_name(s) {
            return ProbabilityValue::Symbol(s.to_owned());
        }
        if let Some((name, rest)) = s.split_once('(') {
            if is_name(name) {
                if let Some(inner) = rest.strip_suffix(')') {
                    if !inner.contains(['(', ')']) {
                        let args = inner
                            .split(',')
                            .map(|a| a.trim().to_owned())
                            .filter(|a| !a.is_empty())
                            .collect();
                        return ProbabilityValue::Applied(name.to_owned(), args);
                    }
                }
            }
        }
        ProbabilityValue::Markup(s.to_owned())
    }

    /// Symbolic form. Names become probability symbols; arguments of
    /// applied functions stay ordinary variables.
    pub fn to_expr(&self) -> Option<Expr> {
        match self {
            ProbabilityValue::Integer(v) => Some(Expr::int(*v)),
            ProbabilityValue::Rational(n, d) => Some(Expr::ratio(*n, *d)),
            ProbabilityValue::Symbol(name) => Some(Expr::prob(name.clone())),
            ProbabilityValue::Applied(name, args) => {
                let args = args
                    .iter()
                    .map(|a| parse_markup(a).ok())
                    .collect::<Option<Vec<_>>>()?;
                Some(Expr::apply(name.clone(), args))
            }
            ProbabilityValue::Markup(text) => parse_markup(text).ok(),
        }
    }

    fn is_numeric(&self) -> bool {
        match self {
            ProbabilityValue::Integer(_) | ProbabilityValue::Rational(..) => true,
            ProbabilityValue::Symbol(_) | ProbabilityValue::Applied(..) => false,
            ProbabilityValue::Markup(_) => self
                .to_expr()
                .is_some_and(|e| e.free_vars().is_empty() && !e.any(&|n| matches!(n, Expr::Prob(_)))),
        }
    }
}

const SYMBOL_NAMES: [&str; 8] = ["p", "q", "r", "s", "t", "u", "v", "w"];

/// A symbol handed out for an unmatched predicate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllocatedSymbol {
    pub name: String,
    pub predicate: String,
}

#[derive(Debug)]
pub struct AvgModel {
    mode: ProbabilityMode,
    keys: Vec<String>,
    values: Vec<String>,
    matcher: Box<dyn PredicateMatcher>,
    allocated: Vec<AllocatedSymbol>,
}

impl AvgModel {
    pub fn new(config: &AvgModelConfig) -> Self {
        Self::with_matcher(config, Box::new(SubstringMatcher))
    }

    pub fn with_matcher(config: &AvgModelConfig, matcher: Box<dyn PredicateMatcher>) -> Self {
        let (keys, values): (Vec<String>, Vec<String>) = config
            .predicates
            .iter()
            .map(|(k, v)| (k.clone(), v.as_text()))
            .unzip();
        AvgModel {
            mode: config.mode,
            keys,
            values,
            matcher,
            allocated: Vec::new(),
        }
    }

    pub fn mode(&self) -> ProbabilityMode {
        self.mode
    }

    /// Probability of `predicate` in string form.
    ///
    /// `loop_var` is the innermost loop variable the predicate depends on;
    /// in symbolic mode it turns the symbol into `p(i)`.
    pub fn get_probability(&mut self, predicate: &str, loop_var: Option<&str>) -> String {
        if let Some(i) = self.matcher.find(&self.keys, predicate) {
            tracing::trace!(predicate, key = %self.keys[i], "predicate matched");
            return self.values[i].clone();
        }
        match self.mode {
            ProbabilityMode::Uniform => "1/2".to_owned(),
            ProbabilityMode::Symbolic => {
                let name = self.symbol_for(predicate);
                match loop_var {
                    Some(var) => format!("{name}({var})"),
                    None => name,
                }
            }
        }
    }

    /// Probability of `predicate` as an expression.
    pub fn get_probability_expr(&mut self, predicate: &str, loop_var: Option<&str>) -> Expr {
        let text = self.get_probability(predicate, loop_var);
        let value = ProbabilityValue::classify(&text);
        value.to_expr().unwrap_or_else(|| {
            tracing::warn!(predicate, probability = %text, "unreadable probability, using 1/2");
            Expr::ratio(1, 2)
        })
    }

    /// Whether average-case results will contain symbols.
    pub fn has_symbols(&self) -> bool {
        self.mode == ProbabilityMode::Symbolic
            || self
                .values
                .iter()
                .any(|v| !ProbabilityValue::classify(v).is_numeric())
    }

    /// Symbols allocated so far, in allocation order.
    pub fn allocated(&self) -> &[AllocatedSymbol] {
        &self.allocated
    }

    /// Names that must be read as constants when re-parsing rendered output.
    pub fn symbol_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.allocated.iter().map(|s| s.name.clone()).collect();
        for value in &self.values {
            match ProbabilityValue::classify(value) {
                ProbabilityValue::Symbol(name) | ProbabilityValue::Applied(name, _) => {
                    names.push(name);
                }
                _ => {}
            }
        }
        names.sort();
        names.dedup();
        names
    }

    fn symbol_for(&mut self, predicate: &str) -> String {
        if let Some(existing) = self.allocated.iter().find(|s| s.predicate == predicate) {
            return existing.name.clone();
        }
        let k = self.allocated.len();
        let base = SYMBOL_NAMES[k % SYMBOL_NAMES.len()];
        let round = k / SYMBOL_NAMES.len();
        let name = if round == 0 {
            base.to_owned()
        } else {
            format!("{base}_{round}")
        };
        tracing::debug!(predicate, symbol = %name, "allocated probability symbol");
        self.allocated.push(AllocatedSymbol {
            name: name.clone(),
            predicate: predicate.to_owned(),
        });
        name
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests;
