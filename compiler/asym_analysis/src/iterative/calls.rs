//! Call sites.
//!
//! A call to another procedure of the program costs that procedure's
//! summary, its unit-cost total in terms of its own parameters, with the
//! actual arguments substituted. Summaries are computed once per pass by a
//! child analyzer and cached. Self-calls become `T(arg)` atoms.

use asym_expr::{simplify, Expr};
use asym_ir::{walk, ExprId, StmtId};
use rustc_hash::FxHashMap;

use super::IterativeAnalyzer;
use crate::recursive::RECURRENCE_SYMBOL;
use crate::result::RowKind;

/// Cost of one call to a procedure, over its parameters.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Summary {
    pub params: Vec<String>,
    pub cost: Expr,
}

impl IterativeAnalyzer<'_> {
    pub(super) fn visit_call(&mut self, line: u32, name: &str, args: &[ExprId]) {
        let (cost, note) = self.call_cost(line, name, args);
        self.base.add_row(line, RowKind::Call, cost, note);
    }

    /// Extra rows for calls to program procedures nested inside the
    /// expressions of `id`. Builtins are part of the statement's own cost.
    pub(super) fn nested_call_rows(&mut self, id: StmtId, line: u32) {
        for (name, args) in walk::nested_calls(self.program, id) {
            if self.is_procedure(&name) {
                let (cost, note) = self.call_cost(line, &name, &args);
                self.base.add_row(line, RowKind::Call, cost, note);
            }
        }
    }

    fn is_procedure(&self, name: &str) -> bool {
        self.program.proc_named(name).is_some()
    }

    fn call_cost(&mut self, line: u32, name: &str, args: &[ExprId]) -> (Expr, String) {
        if self.proc_def.is_some_and(|p| p.name == name) {
            return self.recursive_call_cost(args);
        }
        if !self.is_procedure(name) {
            return (Expr::one(), format!("{name} is not defined here, costed as one unit"));
        }
        let Some(summary) = self.summary(name) else {
            return (Expr::one(), format!("call cycle through {name}, costed as one unit"));
        };

        let mut actuals: FxHashMap<&str, Expr> = FxHashMap::default();
        for (k, param) in summary.params.iter().enumerate() {
            if !summary.cost.contains_var(param) {
                continue;
            }
            let value = match args.get(k).and_then(|a| self.to_sym(*a)) {
                Some(value) => value,
                None => self
                    .base
                    .placeholder(line, format!("argument {param} of {name} is not symbolic")),
            };
            actuals.insert(param.as_str(), value);
        }
        let cost = summary.cost.rewrite(&mut |e| match e {
            Expr::Var(v) => actuals.get(v.as_str()).cloned(),
            _ => None,
        });
        (simplify(&cost), format!("cost of {name}"))
    }

    fn recursive_call_cost(&mut self, args: &[ExprId]) -> (Expr, String) {
        let actuals: Vec<Option<Expr>> = args.iter().map(|a| self.to_sym(*a)).collect();
        let Some(frame) = self.frame.as_mut() else {
            return (Expr::one(), "recursive call without a frame".to_owned());
        };
        match frame.reduce(&actuals) {
            Ok((_, arg)) => {
                let call = Expr::apply(RECURRENCE_SYMBOL, vec![arg]);
                let note = format!("recursive call {call}");
                (call, note)
            }
            Err(problem) => {
                tracing::warn!(procedure = %frame.name, problem = %problem, "recursive call not reducible");
                frame.problems.push(problem.clone());
                (Expr::one(), problem)
            }
        }
    }

    /// Summary of `name`, computing it on first use. `None` on a call cycle.
    fn summary(&mut self, name: &str) -> Option<Summary> {
        if let Some(summary) = self.summaries.get(name) {
            return Some(summary.clone());
        }
        if self.in_progress.iter().any(|p| p == name) {
            return None;
        }
        let program = self.program;
        let proc_def = program.proc_named(name)?;

        let mut child = IterativeAnalyzer::for_procedure(program, self.base.case(), proc_def, self.base.avg.take());
        child.preferred_method = self.preferred_method;
        child.summaries = std::mem::take(&mut self.summaries);
        child.in_progress.clone_from(&self.in_progress);
        child.in_progress.push(name.to_owned());
        let outcome = child.run();
        self.base.avg = child.base.avg.take();
        self.summaries = std::mem::take(&mut child.summaries);

        let cost = match &outcome.size {
            Some((var, size)) => outcome.unit.subst(var, size),
            None => outcome.unit.clone(),
        };
        let summary = Summary {
            params: proc_def.params.clone(),
            cost: simplify(&cost),
        };
        self.base
            .log_step(format!("{name} costs {} per call", summary.cost));
        self.summaries.insert(name.to_owned(), summary.clone());
        Some(summary)
    }
}
