//! From a finished cost table to [`Totals`].
//!
//! Counts are resolved before they enter the totals: iteration placeholders
//! fall back to the size variable, range recursions are rewritten into the
//! range length, locals that escaped symbolic tracking are replaced by the
//! size variable, and sums the closer left open are replaced by an upper
//! estimate. The resulting totals mention only parameters.
//!
//! The first two fallbacks only bound the count from above. When either
//! was needed, `Ω` is taken from the rows whose counts are exact and `Θ` is
//! only reported when both bounds agree.

use std::collections::BTreeSet;

use asym_expr::{simplify, Expr};
use asym_ir::{walk, StmtId, StmtKind};

use super::IterativeAnalyzer;
use crate::avg_model::ProbabilityMode;
use crate::classes::{big_o, big_omega, big_theta, dominant_term_of};
use crate::options::Case;
use crate::recursive::{self, RECURRENCE_SYMBOL};
use crate::result::{AvgModelInfo, CostRow, Totals};

/// Everything one pass produced.
#[derive(Clone, Debug)]
pub struct CaseOutcome {
    pub rows: Vec<CostRow>,
    pub totals: Totals,
    /// Unit-cost total over the size variable; the solved growth term for
    /// recursive procedures.
    pub unit: Expr,
    /// Size variable and its value over the parameters, when the size
    /// variable is not itself a parameter.
    pub size: Option<(String, Expr)>,
}

impl IterativeAnalyzer<'_> {
    pub(super) fn finish(&mut self, root: Option<StmtId>) -> CaseOutcome {
        let leakable = root.map(|r| self.leakable(r)).unwrap_or_default();
        let size_var = self.size_var();
        let n = Expr::var(size_var.clone());

        let mut leaked: BTreeSet<String> = BTreeSet::new();
        for row in self.base.rows() {
            leaked.extend(
                row.effective_count()
                    .free_vars()
                    .into_iter()
                    .filter(|v| leakable.contains(v)),
            );
        }
        let placeholders = self.base.placeholders().to_vec();
        for p in &placeholders {
            self.base.log_step(format!(
                "{} ({}) is bounded by {size_var}",
                Expr::Opaque(p.line),
                p.reason
            ));
        }
        for var in &leaked {
            self.base
                .log_step(format!("{var} could not be tracked and is bounded by {size_var}"));
        }

        let mut estimated: Vec<Expr> = Vec::new();
        let mut loose_sums = false;
        for row in self.base.rows() {
            // Outermost sums only; inner ones are part of their estimate.
            self.bounded(row.effective_count(), &n, &leaked).rewrite(&mut |e| {
                let sum = matches!(e, Expr::Sum(..));
                if sum && !estimated.contains(e) {
                    estimated.push(e.clone());
                }
                sum.then(|| e.clone())
            });
        }
        for sum in &estimated {
            let (estimate, increasing) = sum.sum_estimate();
            loose_sums |= !increasing;
            self.base
                .log_step(format!("{sum} has no closed form and is bounded by {estimate}"));
        }

        let t_open = self
            .base
            .build_t_open(|count| self.resolve(count, &n, &leaked));
        let t_unit = simplify(&t_open.with_unit_costs());
        // Unit-cost total over the rows whose counts needed no upper bound.
        let exact_rows: Vec<Expr> = self
            .base
            .rows()
            .iter()
            .map(CostRow::effective_count)
            .filter(|count| !count.is_zero() && !needs_bound(count, &leaked))
            .map(|count| self.resolve(count, &n, &leaked))
            .collect();
        let t_lower = simplify(&Expr::add_all(exact_rows));
        let upper_only = loose_sums
            || self
                .base
                .rows()
                .iter()
                .any(|row| needs_bound(row.effective_count(), &leaked));
        let mut totals = Totals {
            t_open: t_open.to_string(),
            ..Totals::default()
        };

        let recursive = t_unit.any(&|e| matches!(e, Expr::Apply(name, _) if name == RECURRENCE_SYMBOL));
        let unit = match (&self.frame, recursive) {
            (Some(frame), true) => {
                let solution = recursive::solve(frame, &t_unit, self.preferred_method, self.base.closer());
                self.base
                    .log_step(format!("recurrence {}", solution.recurrence.relation));
                totals.t_polynomial = solution.exact.as_ref().map(ToString::to_string);
                totals.big_o = solution.upper.as_ref().map_or_else(|| "O(?)".to_owned(), big_o);
                let lower = solution.lower.as_ref().filter(|_| !upper_only);
                totals.big_omega = lower.map_or_else(|| "\\Omega(?)".to_owned(), big_omega);
                totals.big_theta = match (&solution.upper, lower) {
                    (Some(u), Some(l)) if u.growth() == l.growth() => big_theta(u),
                    _ => "\\Theta(?)".to_owned(),
                };
                let unit = solution
                    .upper
                    .clone()
                    .or_else(|| solution.exact.clone())
                    .unwrap_or_else(|| t_unit.clone());
                totals.recurrence = Some(solution.recurrence);
                totals.master = Some(solution.master);
                unit
            }
            _ => {
                if self.frame.is_some() {
                    self.base
                        .log_step("no recursive call survives in this case; costed iteratively");
                }
                totals.t_polynomial = Some(t_unit.to_string());
                match dominant_term_of(&t_unit) {
                    Ok(term) if upper_only => {
                        totals.big_o = big_o(&term);
                        let lower = dominant_term_of(&t_lower).ok().filter(|_| !t_lower.is_zero());
                        totals.big_omega = lower.as_ref().map_or_else(|| "\\Omega(?)".to_owned(), big_omega);
                        totals.big_theta = match lower {
                            Some(l) if l.growth() == term.growth() => big_theta(&term),
                            _ => "\\Theta(?)".to_owned(),
                        };
                        self.base
                            .log_step(format!("{} is an upper bound only", totals.big_o));
                    }
                    Ok(term) => {
                        totals.big_o = big_o(&term);
                        totals.big_omega = big_omega(&term);
                        totals.big_theta = big_theta(&term);
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "no asymptotic class");
                        totals.big_o = "O(?)".to_owned();
                        totals.big_omega = "\\Omega(?)".to_owned();
                        totals.big_theta = "\\Theta(?)".to_owned();
                    }
                }
                t_unit.clone()
            }
        };

        if self.base.case() == Case::Avg {
            let mode = self.base.avg.as_ref().map_or(ProbabilityMode::Uniform, |a| a.mode());
            let note = match mode {
                ProbabilityMode::Uniform => "unconfigured predicates hold with probability 1/2",
                ProbabilityMode::Symbolic => "unconfigured predicates get a probability symbol",
            };
            totals.avg_model_info = Some(AvgModelInfo {
                mode,
                note: note.to_owned(),
            });
            totals.a_of_n.clone_from(&totals.t_polynomial);
        }

        let rows = std::mem::take(self.base.rows_mut());
        for row in &rows {
            totals.symbols.insert(
                row.ck.clone(),
                format!("cost of one execution of line {} ({})", row.line, row.kind.as_str()),
            );
        }
        for p in &placeholders {
            totals.symbols.insert(
                Expr::Opaque(p.line).to_string(),
                format!("iterations of the loop at line {}: {}", p.line, p.reason),
            );
        }
        if let Some(avg) = &self.base.avg {
            for symbol in avg.allocated() {
                totals.symbols.insert(
                    symbol.name.clone(),
                    format!("probability that {} holds", symbol.predicate),
                );
            }
        }
        if t_unit.contains_var(&size_var) || unit.contains_var(&size_var) {
            totals.symbols.insert(size_var.clone(), "input size".to_owned());
        }
        if recursive {
            totals.symbols.insert(
                RECURRENCE_SYMBOL.to_owned(),
                format!("running time on an input of size {size_var}"),
            );
        }
        totals.procedure = self.base.take_trail();

        let size = self
            .frame
            .as_ref()
            .filter(|f| !self.is_param(&f.size_var))
            .and_then(|f| f.size_in_params())
            .map(|s| (size_var, s));
        CaseOutcome {
            rows,
            totals,
            unit,
            size,
        }
    }

    /// `count` with placeholders, range recursions and leaked locals
    /// resolved; open sums are kept.
    fn bounded(&self, count: &Expr, n: &Expr, leaked: &BTreeSet<String>) -> Expr {
        let mut e = count.rewrite(&mut |x| matches!(x, Expr::Opaque(_)).then(|| n.clone()));
        if let Some(frame) = &self.frame {
            e = frame.to_size_var(&e);
        }
        for var in e.free_vars().intersection(leaked) {
            e = e.subst(var, n);
        }
        simplify(&e)
    }

    /// [`Self::bounded`] with every open sum replaced by its estimate.
    fn resolve(&self, count: &Expr, n: &Expr, leaked: &BTreeSet<String>) -> Expr {
        let e = self.bounded(count, n, leaked);
        simplify(&e.rewrite(&mut |x| matches!(x, Expr::Sum(..)).then(|| x.sum_upper_estimate())))
    }


    /// Variables whose value is local to the body: assigned names and
    /// loop indices that are not parameters.
    fn leakable(&self, root: StmtId) -> BTreeSet<String> {
        let mut out: BTreeSet<String> = walk::assigned_vars(self.program, root).into_iter().collect();
        walk::for_each_stmt(self.program, root, &mut |id| {
            if let StmtKind::For { var, .. } = &self.program.stmt(id).kind {
                out.insert(var.clone());
            }
        });
        out.retain(|v| !self.is_param(v));
        out
    }

    /// The variable totals are expressed in.
    fn size_var(&self) -> String {
        if let Some(frame) = self.frame.as_ref().filter(|f| f.shape.is_some()) {
            return frame.size_var.clone();
        }
        let Some(proc_def) = self.proc_def else {
            return "n".to_owned();
        };
        if proc_def.params.iter().any(|p| p == "n") {
            return "n".to_owned();
        }
        let free: BTreeSet<String> = self
            .base
            .rows()
            .iter()
            .flat_map(|r| r.effective_count().free_vars())
            .collect();
        proc_def
            .params
            .iter()
            .find(|p| free.contains(*p))
            .cloned()
            .unwrap_or_else(|| "n".to_owned())
    }
}

/// Whether `count` holds a placeholder or a leaked local.
fn needs_bound(count: &Expr, leaked: &BTreeSet<String>) -> bool {
    count.has_placeholders() || count.free_vars().iter().any(|v| leaked.contains(v))
}
