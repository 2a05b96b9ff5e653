//! Statement visitors.
//!
//! [`IterativeAnalyzer`] walks one procedure (or the top-level block) and
//! produces one cost row per executed line. Loops contribute multipliers,
//! branches are chosen per case, and calls are costed through summaries of
//! the callee. Self-calls are left as `T(...)` atoms for the recurrence
//! solver.
//!
//! - `mod.rs`: dispatch, assignments, `if` and `for`
//! - `loops.rs`: `while`/`repeat` iteration counts
//! - `calls.rs`: call sites and procedure summaries
//! - `totals.rs`: turning the finished table into [`Totals`](crate::Totals)

mod calls;
mod loops;
mod totals;

use std::cmp::Ordering;
use std::collections::BTreeMap;

use asym_expr::{simplify, Bound, Expr, Poly};
use asym_ir::{walk, ExprId, ExprKind, ProcDef, Program, StmtId, StmtKind};
use num_traits::{One, Signed, ToPrimitive, Zero};
use rustc_hash::FxHashMap;

use crate::avg_model::AvgModel;
use crate::base::{bindings_digest, BaseAnalyzer, Multiplier};
use crate::options::{Case, Method};
use crate::recursive::{RecursionFrame, RECURRENCE_SYMBOL};
use crate::result::{CostRow, RowKind};
use crate::stack::ensure_sufficient_stack;
use crate::symbolic::{to_symbolic, Definitions};

use calls::Summary;
pub use totals::CaseOutcome;

/// Value every free variable takes when two branch costs tie on growth.
const TIE_BREAK_SIZE: f64 = 64.0;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Branch {
    Consequent,
    Alternate,
}

pub struct IterativeAnalyzer<'p> {
    pub(crate) base: BaseAnalyzer<'p>,
    program: &'p Program,
    /// `None` for top-level statements.
    proc_def: Option<&'p ProcDef>,
    frame: Option<RecursionFrame>,
    /// Symbolic values of locals at the current point.
    locals: Definitions,
    /// Enclosing `for` indices, outermost first.
    loop_vars: Vec<String>,
    preferred_method: Option<Method>,
    summaries: FxHashMap<String, Summary>,
    /// Procedures on the current summary chain.
    in_progress: Vec<String>,
}

impl<'p> IterativeAnalyzer<'p> {
    /// Analyzer for the program's top-level statements.
    pub fn new(program: &'p Program, case: Case, avg: Option<AvgModel>) -> Self {
        IterativeAnalyzer {
            base: BaseAnalyzer::new(program, case, avg),
            program,
            proc_def: None,
            frame: None,
            locals: Definitions::default(),
            loop_vars: Vec::new(),
            preferred_method: None,
            summaries: FxHashMap::default(),
            in_progress: Vec::new(),
        }
    }

    /// Analyzer for the body of `proc_def`.
    pub fn for_procedure(
        program: &'p Program,
        case: Case,
        proc_def: &'p ProcDef,
        avg: Option<AvgModel>,
    ) -> Self {
        let mut analyzer = Self::new(program, case, avg);
        analyzer.frame = RecursionFrame::detect(program, proc_def);
        analyzer.proc_def = Some(proc_def);
        analyzer.in_progress.push(proc_def.name.clone());
        analyzer
    }

    pub fn set_preferred_method(&mut self, method: Option<Method>) {
        self.preferred_method = method;
    }

    /// Visit the whole body and build the totals.
    pub fn run(&mut self) -> CaseOutcome {
        let root = match self.proc_def {
            Some(proc_def) => Some(proc_def.body),
            None => self.program.main,
        };
        let _span = tracing::debug_span!(
            "procedure",
            name = self.proc_def.map_or("<main>", |p| p.name.as_str()),
            case = %self.base.case()
        )
        .entered();
        if let Some(root) = root {
            self.visit(root);
        }
        self.finish(root)
    }

    fn to_sym(&self, id: ExprId) -> Option<Expr> {
        to_symbolic(self.program, id, &self.locals)
    }

    fn is_param(&self, name: &str) -> bool {
        self.proc_def
            .is_some_and(|p| p.params.iter().any(|param| param == name))
    }

    fn forget_assigned(&mut self, root: StmtId) {
        for var in walk::assigned_vars(self.program, root) {
            self.locals.remove(&var);
        }
    }

    /// Run `f` with `multipliers` pushed on the loop context; they are popped
    /// again however `f` returns.
    fn within(&mut self, multipliers: impl IntoIterator<Item = Multiplier>, f: impl FnOnce(&mut Self)) {
        let depth = self.base.multipliers().len();
        for m in multipliers {
            self.base.push_multiplier(m);
        }
        f(self);
        while self.base.multipliers().len() > depth {
            self.base.pop_multiplier();
        }
    }

    pub(crate) fn visit(&mut self, id: StmtId) {
        ensure_sufficient_stack(|| self.visit_stmt(id));
    }

    fn visit_stmt(&mut self, id: StmtId) {
        let program = self.program;
        let stmt = program.stmt(id);
        let key = BaseAnalyzer::is_cacheable(&stmt.kind).then(|| {
            let bindings = bindings_digest(program, id, |name| self.locals.get(name).map(ToString::to_string));
            self.base.memo_key(id, bindings)
        });
        if let Some(key) = &key {
            if let Some(rows) = self.base.memo_get(key) {
                let rows = rows.to_vec();
                tracing::debug!(kind = stmt.kind.name(), line = program.line_of(id), "memo hit");
                self.base.rows_mut().extend(rows);
                self.forget_assigned(id);
                return;
            }
        }

        let mark = self.base.rows().len();
        let line = program.line_of(id);
        match &stmt.kind {
            StmtKind::Assign { target, value } => self.visit_assign(id, line, *target, *value),
            StmtKind::Return { .. } => {
                self.base.add_row(line, RowKind::Return, Expr::one(), "");
                self.nested_call_rows(id, line);
            }
            StmtKind::Call { name, args } => self.visit_call(line, name, args),
            StmtKind::Block { stmts } => {
                for s in stmts {
                    self.visit(*s);
                }
            }
            StmtKind::If {
                test,
                consequent,
                alternate,
            } => self.visit_if(line, *test, *consequent, *alternate),
            StmtKind::For {
                var,
                start,
                end,
                step,
                downto,
                body,
            } => self.visit_for(line, var, *start, *end, *step, *downto, *body),
            StmtKind::While { test, body } => self.visit_while(line, *test, *body),
            StmtKind::Repeat { body, test } => self.visit_repeat(line, *body, *test),
            StmtKind::Invalid => {}
        }

        if let Some(key) = key {
            let rows = self.base.rows()[mark..].to_vec();
            self.base.memo_set(key, rows);
        }
    }

    fn visit_assign(&mut self, id: StmtId, line: u32, target: ExprId, value: ExprId) {
        self.base.add_row(line, RowKind::Assign, Expr::one(), "");
        self.nested_call_rows(id, line);
        if let ExprKind::Ident(name) = &self.program.expr(target).kind {
            if self.loop_vars.contains(name) {
                return;
            }
            match self.to_sym(value).filter(|e| !e.contains_var(name)) {
                Some(sym) => {
                    self.locals.insert(name.clone(), simplify(&sym));
                }
                None => {
                    self.locals.remove(name);
                }
            }
        }
    }

    // Branches

    fn visit_if(&mut self, line: u32, test: ExprId, consequent: StmtId, alternate: Option<StmtId>) {
        self.base.add_row(line, RowKind::If, Expr::one(), "");
        let case = self.base.case();
        let forced = self.forced_branch(case, consequent, alternate);
        let saved = self.locals.clone();
        match (case, forced) {
            (Case::Avg, None) => self.visit_if_weighted(line, test, consequent, alternate),
            _ => self.visit_if_choosing(case, forced, line, consequent, alternate),
        }
        self.locals = saved;
        self.forget_assigned(consequent);
        if let Some(alternate) = alternate {
            self.forget_assigned(alternate);
        }
    }

    /// A branch the case has to take regardless of cost.
    fn forced_branch(&self, case: Case, consequent: StmtId, alternate: Option<StmtId>) -> Option<Branch> {
        let program = self.program;
        // The branch holding the recursion is the one that runs at scale.
        if let (Some(_), Some(proc_def)) = (&self.frame, self.proc_def) {
            let recurses = |s: StmtId| !walk::calls_to(program, s, &proc_def.name).is_empty();
            let (c, a) = (recurses(consequent), alternate.is_some_and(recurses));
            if c != a {
                return Some(if c { Branch::Consequent } else { Branch::Alternate });
            }
        }
        if case != Case::Avg && self.base.in_loop() {
            let (c, a) = (
                walk::contains_return(program, consequent),
                alternate.is_some_and(|s| walk::contains_return(program, s)),
            );
            if c != a {
                let returning = if c { Branch::Consequent } else { Branch::Alternate };
                let staying = if c { Branch::Alternate } else { Branch::Consequent };
                return Some(if case == Case::Best { returning } else { staying });
            }
        }
        None
    }

    fn visit_if_choosing(
        &mut self,
        case: Case,
        forced: Option<Branch>,
        line: u32,
        consequent: StmtId,
        alternate: Option<StmtId>,
    ) {
        let saved = self.locals.clone();
        let mark = self.base.rows().len();
        self.visit(consequent);
        let mut then_rows = self.base.rows_mut().split_off(mark);
        self.locals = saved;
        let mut else_rows = match alternate {
            Some(alternate) => {
                self.visit(alternate);
                self.base.rows_mut().split_off(mark)
            }
            None => Vec::new(),
        };

        let take_then = match forced {
            Some(branch) => branch == Branch::Consequent,
            None => {
                let order = compare_branch_costs(&branch_total(&then_rows), &branch_total(&else_rows));
                match case {
                    Case::Best => order != Ordering::Greater,
                    _ => order != Ordering::Less,
                }
            }
        };
        let dropped = if take_then { &mut else_rows } else { &mut then_rows };
        for row in dropped.iter_mut() {
            row.count = Expr::zero();
            row.expected_runs = row.expected_runs.as_ref().map(|_| Expr::zero());
            row.note = format!("branch not taken in the {case} case");
        }
        self.base.log_step(format!(
            "line {line}: the {case} case takes the {} branch",
            if take_then { "then" } else { "else" }
        ));
        let rows = self.base.rows_mut();
        rows.extend(then_rows);
        rows.extend(else_rows);
    }

    fn visit_if_weighted(&mut self, line: u32, test: ExprId, consequent: StmtId, alternate: Option<StmtId>) {
        let predicate = self.program.render_expr(test);
        let referenced = walk::referenced_idents(self.program, test);
        let loop_var = self
            .loop_vars
            .iter()
            .rev()
            .find(|v| referenced.contains(v))
            .cloned();
        let p = match self.base.avg.as_mut() {
            Some(avg) => avg.get_probability_expr(&predicate, loop_var.as_deref()),
            None => Expr::ratio(1, 2),
        };
        self.base
            .log_step(format!("line {line}: P({predicate}) = {p}"));

        let saved = self.locals.clone();
        self.within([Multiplier::Prob(p.clone())], |this| this.visit(consequent));
        self.locals = saved;
        if let Some(alternate) = alternate {
            let q = simplify(&(Expr::one() - p));
            self.within([Multiplier::Prob(q)], |this| this.visit(alternate));
        }
    }

    // Counted loops

    #[expect(clippy::too_many_arguments, reason = "mirrors the fields of a for statement")]
    fn visit_for(
        &mut self,
        line: u32,
        var: &str,
        start: ExprId,
        end: ExprId,
        step: Option<ExprId>,
        downto: bool,
        body: StmtId,
    ) {
        let mut notes: Vec<String> = Vec::new();
        let mut downward = downto;
        let mut stride = None;
        if let Some(step) = step {
            match self.to_sym(step).and_then(|s| s.constant_value()) {
                Some(s) if s.is_zero() => notes.push("zero step ignored".to_owned()),
                Some(s) => {
                    let magnitude = s.abs();
                    if s.is_negative() {
                        downward = true;
                    }
                    if !magnitude.is_one() {
                        stride = Some(Expr::Num(magnitude.recip()));
                    }
                }
                None => notes.push("non-constant step ignored".to_owned()),
            }
        }
        let (first, last) = if downward { (end, start) } else { (start, end) };
        let lower = match self.to_sym(first) {
            Some(e) => e,
            None => {
                notes.push(format!("lower bound of {var} unknown, taken as 1"));
                Expr::one()
            }
        };
        let mut upper = match self.to_sym(last) {
            Some(e) => e,
            None => self
                .base
                .placeholder(line, format!("bound of {var} is not symbolic")),
        };
        if self.base.case() == Case::Best && walk::contains_return(self.program, body) {
            upper = lower.clone();
            notes.push("exits during the first iteration".to_owned());
        }

        self.locals.remove(var);
        self.forget_assigned(body);
        let bound = Bound::new(var, lower, upper);
        self.base.log_step(format!(
            "line {line}: for {var} contributes \\sum_{{{var}={}}}^{{{}}}",
            bound.lower, bound.upper
        ));
        let mut multipliers = vec![Multiplier::Sum(bound)];
        multipliers.extend(stride.map(Multiplier::Factor));
        self.loop_vars.push(var.to_owned());
        let note = notes.join("; ");
        self.within(multipliers, |this| {
            this.base.add_row(line, RowKind::For, Expr::one(), note);
            this.visit(body);
        });
        self.loop_vars.pop();
        self.locals.remove(var);
        self.forget_assigned(body);
    }
}

/// Unit-cost sum of a branch's rows.
fn branch_total(rows: &[CostRow]) -> Expr {
    simplify(&Expr::add_all(rows.iter().map(|r| r.count.clone()).collect()))
}

/// Order two branch costs: recursive calls first, then growth, then the
/// value at a moderate input size.
fn compare_branch_costs(a: &Expr, b: &Expr) -> Ordering {
    recursion_weight(a)
        .total_cmp(&recursion_weight(b))
        .then_with(|| a.growth().cmp(&b.growth()))
        .then_with(|| numeric_size(a).total_cmp(&numeric_size(b)))
}

fn recursion_weight(e: &Expr) -> f64 {
    Poly::from_expr(e)
        .terms()
        .filter(|(m, _)| {
            m.iter()
                .any(|(atom, _)| matches!(atom, Expr::Apply(name, _) if name == RECURRENCE_SYMBOL))
        })
        .filter_map(|(_, c)| c.to_f64())
        .sum()
}

fn numeric_size(e: &Expr) -> f64 {
    let flat = e.rewrite(&mut |x| matches!(x, Expr::Apply(..) | Expr::Opaque(_)).then(Expr::one));
    let mut env: BTreeMap<String, f64> = BTreeMap::new();
    flat.visit(&mut |x| match x {
        Expr::Var(v) => {
            env.insert(v.clone(), TIE_BREAK_SIZE);
        }
        Expr::Prob(p) => {
            env.insert(p.clone(), 0.5);
        }
        _ => {}
    });
    flat.eval(&env).unwrap_or(0.0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests;
