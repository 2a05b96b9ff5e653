//! Recurrence extraction and solving for self-recursive procedures.
//!
//! The iterative pass costs a self-call as the applied symbol `T(arg)`, with
//! `arg` already normalised to `n / b` or `n - c` in the procedure's size
//! variable. What is left for this module is reading the unit-cost total
//! `T(n) = Σ coeff · T(arg) + f(n)` back out of that expression and solving
//! it, either by the Master Theorem or by unrolling.
//!
//! # Size parameters
//!
//! A procedure's input size is the single parameter that changes between
//! the recursive calls (`Fib(n - 1)`), or, for `(lo, hi)` index pairs, the
//! range length `hi - lo + 1` (merge sort, binary search). In the range case
//! every expression is rewritten through `hi := n + lo - 1`, which makes the
//! midpoint `(lo + hi) / 2` collapse into `n / 2`.

use asym_expr::{simplify, Expr, Poly, Rational};
use asym_ir::{walk, BinaryOp, ExprKind, Literal, ProcDef, Program, StmtKind};
use num_traits::{One, Signed, ToPrimitive, Zero};

use crate::classes::dominant_term_of;
use crate::options::Method;
use crate::result::{MasterResult, RecurrenceSpec, Reduction};
use crate::summation::SummationCloser;
use crate::symbolic::{definitions, to_symbolic};

/// Name of the recurrence function symbol.
pub const RECURRENCE_SYMBOL: &str = "T";

const EPSILON: f64 = 1e-9;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SizeParam {
    Single(String),
    Range { lo: String, hi: String },
}

/// What the analyzer knows about the recursion of the procedure it is in.
#[derive(Clone, Debug)]
pub struct RecursionFrame {
    pub name: String,
    /// `None` when no parameter shape could be recognised.
    pub shape: Option<SizeParam>,
    pub size_var: String,
    /// Largest input handled by the base case.
    pub n0: i64,
    /// Reasons the recurrence cannot be solved, gathered while costing.
    pub problems: Vec<String>,
    params: Vec<String>,
}

impl RecursionFrame {
    /// Inspect `proc_def` for self-calls. `None` when it has none.
    pub fn detect(program: &Program, proc_def: &ProcDef) -> Option<Self> {
        let calls = walk::calls_to(program, proc_def.body, &proc_def.name);
        if calls.is_empty() {
            return None;
        }
        let defs = definitions(program, proc_def.body);
        let mut changed: Vec<usize> = Vec::new();
        for call in &calls {
            for (k, param) in proc_def.params.iter().enumerate() {
                let unchanged = call
                    .args
                    .get(k)
                    .and_then(|a| to_symbolic(program, *a, &defs))
                    .is_some_and(|e| e == Expr::var(param.clone()));
                if !unchanged && !changed.contains(&k) {
                    changed.push(k);
                }
            }
        }
        changed.sort_unstable();

        let params = proc_def.params.clone();
        let shape = match changed.as_slice() {
            [k] => Some(SizeParam::Single(params[*k].clone())),
            [lo, hi] => Some(SizeParam::Range {
                lo: params[*lo].clone(),
                hi: params[*hi].clone(),
            }),
            _ => None,
        };
        let size_var = match &shape {
            Some(SizeParam::Single(s)) => s.clone(),
            _ if params.iter().any(|p| p == "n") => "m".to_owned(),
            _ => "n".to_owned(),
        };
        let mut problems = Vec::new();
        if shape.is_none() {
            problems.push(format!(
                "cannot tell which parameter of {} shrinks between calls",
                proc_def.name
            ));
            tracing::warn!(procedure = %proc_def.name, "unrecognised recursion shape");
        }
        let n0 = match &shape {
            Some(SizeParam::Single(s)) => base_case_threshold(program, proc_def, s),
            _ => 1,
        };
        tracing::debug!(procedure = %proc_def.name, ?shape, calls = calls.len(), n0, "recursion detected");
        Some(RecursionFrame {
            name: proc_def.name.clone(),
            shape,
            size_var,
            n0,
            problems,
            params,
        })
    }

    /// Input size in terms of the procedure's own parameters.
    pub fn size_in_params(&self) -> Option<Expr> {
        match self.shape.as_ref()? {
            SizeParam::Single(s) => Some(Expr::var(s.clone())),
            SizeParam::Range { lo, hi } => Some(simplify(
                &(Expr::var(hi.clone()) - Expr::var(lo.clone()) + Expr::one()),
            )),
        }
    }

    /// Rewrite an expression over the parameters into the size variable.
    pub fn to_size_var(&self, expr: &Expr) -> Expr {
        match &self.shape {
            Some(SizeParam::Range { lo, hi }) => {
                let hi_value = Expr::var(self.size_var.clone()) + Expr::var(lo.clone()) - Expr::one();
                simplify(&expr.subst(hi, &hi_value))
            }
            _ => expr.clone(),
        }
    }

    /// The normalised `T` argument of a self-call with the given symbolic
    /// arguments.
    pub fn reduce(&self, args: &[Option<Expr>]) -> Result<(Reduction, Expr), String> {
        let shape = self
            .shape
            .as_ref()
            .ok_or_else(|| "unsupported recursion shape".to_owned())?;
        let arg = |name: &str| {
            self.params
                .iter()
                .position(|p| p == name)
                .and_then(|k| args.get(k).cloned().flatten())
                .ok_or_else(|| format!("argument for {name} is not symbolic"))
        };
        let size = match shape {
            SizeParam::Single(s) => arg(s)?,
            SizeParam::Range { lo, hi } => arg(hi)? - arg(lo)? + Expr::one(),
        };
        normalize(&self.to_size_var(&size), &self.size_var)
    }
}

/// Classify a call size, linear in `var`, as `n / b` or `n - c`.
pub(crate) fn normalize(size: &Expr, var: &str) -> Result<(Reduction, Expr), String> {
    let size = simplify(size);
    let n = Expr::var(var);
    let mut slope = Rational::zero();
    let mut offset = Rational::zero();
    for (monomial, coeff) in Poly::from_expr(&size).terms() {
        match monomial.as_slice() {
            [] => offset = coeff.clone(),
            [(atom, 1)] if *atom == n => slope = coeff.clone(),
            _ => return Err(format!("call size {size} is not linear in {var}")),
        }
    }
    let reduction = if slope.is_one() && offset.is_negative() {
        Reduction::Subtract { by: Expr::Num(-offset) }
    } else if slope.is_positive() && slope < Rational::one() {
        // Offsets such as the `+ 1/2` of an odd midpoint do not change the growth.
        Reduction::Divide { by: Expr::Num(slope.recip()) }
    } else {
        return Err(format!("call size {size} does not shrink"));
    };
    let arg = reduction.apply_to(&n);
    Ok((reduction, arg))
}

/// Constant compared against `param` in the first guard of the body.
fn base_case_threshold(program: &Program, proc_def: &ProcDef, param: &str) -> i64 {
    let mut found = None;
    walk::for_each_stmt(program, proc_def.body, &mut |id| {
        if found.is_some() {
            return;
        }
        let StmtKind::If { test, .. } = &program.stmt(id).kind else {
            return;
        };
        let ExprKind::Binary { op, left, right } = &program.expr(*test).kind else {
            return;
        };
        let (op, other) = match (&program.expr(*left).kind, &program.expr(*right).kind) {
            (ExprKind::Ident(name), _) if name == param => (*op, *right),
            (_, ExprKind::Ident(name)) if name == param => (op.flipped(), *left),
            _ => return,
        };
        if let ExprKind::Literal(Literal::Int(k)) = program.expr(other).kind {
            found = match op {
                BinaryOp::Lt => Some(k - 1),
                BinaryOp::LtEq | BinaryOp::Eq => Some(k),
                _ => None,
            };
        }
    });
    found.unwrap_or(1)
}

/// A solved (or rejected) recurrence.
#[derive(Clone, Debug)]
pub struct Solution {
    pub recurrence: RecurrenceSpec,
    pub master: MasterResult,
    /// Upper and lower growth terms; `None` when nothing could be derived.
    pub upper: Option<Expr>,
    pub lower: Option<Expr>,
    /// Closed form of `T(n)` when unrolling produced one.
    pub exact: Option<Expr>,
}

/// Solve `T(n) = t_unit`, where `t_unit` is the unit-cost body total.
pub fn solve(
    frame: &RecursionFrame,
    t_unit: &Expr,
    preferred: Option<Method>,
    closer: &mut SummationCloser,
) -> Solution {
    let n = Expr::var(frame.size_var.clone());
    let relation = format!("T({n}) = {t_unit}");
    let mut problems = frame.problems.clone();

    let mut work = Poly::zero();
    let mut calls: Vec<(Expr, Rational)> = Vec::new();
    for (monomial, coeff) in Poly::from_expr(t_unit).terms() {
        let is_call = |atom: &Expr| matches!(atom, Expr::Apply(name, _) if name == RECURRENCE_SYMBOL);
        if !monomial.iter().any(|(atom, _)| is_call(atom)) {
            work = work.add(&monomial_poly(monomial).scale(coeff));
            continue;
        }
        match monomial.as_slice() {
            [(Expr::Apply(_, args), 1)] if args.len() == 1 => calls.push((args[0].clone(), coeff.clone())),
            _ => problems.push(format!(
                "recursive call is repeated by an enclosing loop: {}",
                monomial_poly(monomial).scale(coeff).to_expr()
            )),
        }
    }
    let f = simplify(&work.to_expr());

    let weight: Rational = calls.iter().map(|(_, c)| c.clone()).sum();
    let a = if weight.is_integer() && weight.is_positive() {
        weight.to_integer().to_u32().unwrap_or(0)
    } else {
        problems.push(format!("recursive calls have non-integral weight {weight}"));
        0
    };

    let mut reductions: Vec<Reduction> = Vec::new();
    for (arg, _) in &calls {
        match normalize(arg, &frame.size_var) {
            Ok((reduction, _)) if !reductions.contains(&reduction) => reductions.push(reduction),
            Ok(_) => {}
            Err(problem) => problems.push(problem),
        }
    }
    reductions.sort();

    if !problems.is_empty() || reductions.is_empty() || a == 0 {
        for problem in &problems {
            tracing::warn!(procedure = %frame.name, problem = %problem, "recurrence not solvable");
        }
        return unsolved(frame, a, f, reductions, relation, problems);
    }

    let outcomes: Vec<Solved> = reductions
        .iter()
        .map(|r| solve_one(a, r, &f, &n, frame.n0, preferred, closer))
        .collect();

    let spec = |applicable: bool, notes: String| RecurrenceSpec {
        a,
        b: match reductions.as_slice() {
            [Reduction::Divide { by }] => by.clone(),
            _ => Expr::one(),
        },
        f: f.clone(),
        n0: frame.n0,
        applicable,
        notes,
        reductions: reductions.clone(),
        relation: relation.clone(),
    };

    match outcomes.as_slice() {
        [one] => {
            tracing::debug!(procedure = %frame.name, method = ?one.method, case = ?one.case, "recurrence solved");
            let master_applicable = one.method == Method::Master;
            Solution {
                recurrence: spec(true, one.notes.clone()),
                master: MasterResult {
                    applicable: master_applicable,
                    method: one.method,
                    case: one.case,
                    log_b_a: one.log_b_a.clone(),
                    steps: one.steps.clone(),
                    result: crate::classes::big_theta(&one.term),
                },
                upper: Some(one.term.clone()),
                lower: Some(one.term.clone()),
                exact: one.exact.clone(),
            }
        }
        many => {
            // Each call shape on its own brackets the real cost.
            let by_growth = |x: &&Solved, y: &&Solved| x.term.growth().cmp(&y.term.growth());
            let upper = many.iter().max_by(by_growth).map(|s| s.term.clone());
            let lower = many.iter().min_by(by_growth).map(|s| s.term.clone());
            let tight = match (&upper, &lower) {
                (Some(u), Some(l)) => u.growth() == l.growth(),
                _ => false,
            };
            let mut steps: Vec<String> = many
                .iter()
                .zip(&reductions)
                .map(|(s, r)| format!("with every call on {}: {}", r.apply_to(&n), crate::classes::big_theta(&s.term)))
                .collect();
            steps.push("calls shrink the input differently; only bounds follow".to_owned());
            let result = match (&upper, tight) {
                (Some(u), true) => crate::classes::big_theta(u),
                _ => "\\Theta(?)".to_owned(),
            };
            Solution {
                recurrence: spec(false, "non-uniform reduction".to_owned()),
                master: MasterResult {
                    applicable: false,
                    method: Method::Iteration,
                    case: None,
                    log_b_a: None,
                    steps,
                    result,
                },
                upper,
                lower,
                exact: None,
            }
        }
    }
}

fn monomial_poly(monomial: &asym_expr::Monomial) -> Poly {
    monomial
        .iter()
        .fold(Poly::one(), |acc, (atom, k)| acc.mul(&Poly::atom(atom.clone(), *k)))
}

fn unsolved(
    frame: &RecursionFrame,
    a: u32,
    f: Expr,
    reductions: Vec<Reduction>,
    relation: String,
    problems: Vec<String>,
) -> Solution {
    let notes = if problems.is_empty() {
        "no recursive call reduces the input".to_owned()
    } else {
        problems.join("; ")
    };
    Solution {
        recurrence: RecurrenceSpec {
            a,
            b: Expr::one(),
            f,
            n0: frame.n0,
            applicable: false,
            notes: notes.clone(),
            reductions,
            relation,
        },
        master: MasterResult {
            applicable: false,
            method: Method::Iteration,
            case: None,
            log_b_a: None,
            steps: vec![notes],
            result: "\\Theta(?)".to_owned(),
        },
        upper: None,
        lower: None,
        exact: None,
    }
}

struct Solved {
    method: Method,
    case: Option<u8>,
    log_b_a: Option<Expr>,
    steps: Vec<String>,
    notes: String,
    term: Expr,
    exact: Option<Expr>,
}

fn solve_one(
    a: u32,
    reduction: &Reduction,
    f: &Expr,
    n: &Expr,
    n0: i64,
    preferred: Option<Method>,
    closer: &mut SummationCloser,
) -> Solved {
    match reduction {
        Reduction::Divide { by } => {
            let b = by.as_rational().and_then(ToPrimitive::to_f64).unwrap_or(1.0);
            let polynomial = f.growth().exp_base <= 1.0 + EPSILON;
            if preferred != Some(Method::Iteration) && b > 1.0 && polynomial {
                master(a, by, b, f, n)
            } else {
                let why = if preferred == Some(Method::Iteration) {
                    "iteration method requested"
                } else {
                    "f(n) is not polynomially bounded"
                };
                unroll_divide(a, by, b, f, n, why)
            }
        }
        Reduction::Subtract { by } => unroll_subtract(a, by, f, n, n0, closer),
    }
}

fn dominant(f: &Expr) -> Expr {
    dominant_term_of(f).unwrap_or_else(|_| f.clone())
}

/// `n^{log_b a} · log^k n` for integral or fractional `k`.
fn critical_term(n: &Expr, log_b_a: &Expr, log_power: f64) -> Expr {
    let mut term = Expr::pow(n.clone(), log_b_a.clone());
    if log_power > EPSILON {
        term = term * log_power_of(n, log_power);
    }
    simplify(&term)
}

#[expect(clippy::cast_possible_truncation, reason = "checked integral and small")]
fn log_power_of(n: &Expr, k: f64) -> Expr {
    if (k - k.round()).abs() < EPSILON && k.abs() < 64.0 {
        Expr::powi(Expr::log(n.clone()), k.round() as i64)
    } else {
        Expr::pow(
            Expr::log(n.clone()),
            Rational::from_float(k).map_or_else(Expr::one, Expr::Num),
        )
    }
}

fn master(a: u32, by: &Expr, b: f64, f: &Expr, n: &Expr) -> Solved {
    let log_b_a = simplify(&(Expr::log(Expr::int(i64::from(a))) / Expr::log(by.clone())));
    let critical = f64::from(a).log2() / b.log2();
    let growth = f.growth();
    let d = growth.degree;
    let mut steps = vec![
        format!("a = {a}, b = {by}, f({n}) = {f}"),
        format!("\\log_{{{by}}} {a} = {log_b_a}, so n^{{\\log_b a}} = {}", simplify(&Expr::pow(n.clone(), log_b_a.clone()))),
    ];
    let (case, term) = if d < critical - EPSILON {
        steps.push(format!(
            "f({n}) = O(n^{{{log_b_a} - \\epsilon}}): case 1, the leaves dominate"
        ));
        (1, critical_term(n, &log_b_a, 0.0))
    } else if (d - critical).abs() < EPSILON {
        let k = growth.log_power;
        let term = critical_term(n, &log_b_a, k + 1.0);
        steps.push(format!(
            "f({n}) = \\Theta(n^{{{log_b_a}}} \\log^{{{k}}} n): case 2, every level costs the same"
        ));
        (2, term)
    } else {
        let ratio = f64::from(a) / b.powf(d);
        steps.push(format!(
            "f({n}) = \\Omega(n^{{{log_b_a} + \\epsilon}}): case 3, the root dominates"
        ));
        steps.push(format!(
            "regularity: a f(n/b) = {ratio:.4} f(n) \\le c f(n) with c = {ratio:.4} < 1"
        ));
        (3, dominant(f))
    };
    steps.push(format!("T({n}) = {}", crate::classes::big_theta(&term)));
    Solved {
        method: Method::Master,
        case: Some(case),
        log_b_a: Some(log_b_a),
        steps,
        notes: format!("master theorem case {case}"),
        term,
        exact: None,
    }
}

fn unroll_divide(a: u32, by: &Expr, b: f64, f: &Expr, n: &Expr, why: &str) -> Solved {
    let growth = f.growth();
    let mut steps = vec![
        why.to_owned(),
        format!("T({n}) = \\sum_{{i=0}}^{{\\log_{{{by}}} {n}}} {a}^{{i}} f({n}/{by}^{{i}})"),
    ];
    let log_b_a = simplify(&(Expr::log(Expr::int(i64::from(a))) / Expr::log(by.clone())));
    let term = if growth.exp_base > 1.0 + EPSILON || b <= 1.0 {
        steps.push("the top level dominates".to_owned());
        dominant(f)
    } else {
        let ratio = f64::from(a) / b.powf(growth.degree);
        steps.push(format!("level ratio a / b^{{d}} = {ratio:.4}"));
        if ratio < 1.0 - EPSILON {
            steps.push("decreasing geometric series: the root dominates".to_owned());
            dominant(f)
        } else if (ratio - 1.0).abs() < EPSILON {
            steps.push("every level costs the same, over \\log n levels".to_owned());
            simplify(&(dominant(f) * Expr::log(n.clone())))
        } else {
            steps.push("increasing geometric series: the leaves dominate".to_owned());
            critical_term(n, &log_b_a, 0.0)
        }
    };
    steps.push(format!("T({n}) = {}", crate::classes::big_theta(&term)));
    Solved {
        method: Method::Iteration,
        case: None,
        log_b_a: Some(log_b_a),
        steps,
        notes: "solved by unrolling".to_owned(),
        term,
        exact: None,
    }
}

fn unroll_subtract(a: u32, by: &Expr, f: &Expr, n: &Expr, n0: i64, closer: &mut SummationCloser) -> Solved {
    let Expr::Var(size) = n else {
        return Solved {
            method: Method::Iteration,
            case: None,
            log_b_a: None,
            steps: Vec::new(),
            notes: String::new(),
            term: n.clone(),
            exact: None,
        };
    };
    let index = if size == "k" { "j" } else { "k" };
    let levels = simplify(&(n.clone() / by.clone()));
    let mut steps = vec![
        "subtractive recurrence: the master theorem needs T(n/b)".to_owned(),
        format!("T({n}) = {a} T({n} - {by}) + f({n}), unrolled over {levels} levels"),
    ];
    if a == 1 {
        let summand = f.subst(size, &(by.clone() * Expr::var(index)));
        let sum = closer.close_single(&summand, index, &Expr::one(), &levels);
        let exact = simplify(&(sum + Expr::int(n0.max(1))));
        steps.push(format!(
            "T({n}) = \\sum_{{{index}=1}}^{{{levels}}} f({by} {index}) + T({n0}) = {exact}"
        ));
        let term = dominant(&exact);
        steps.push(format!("T({n}) = {}", crate::classes::big_theta(&term)));
        Solved {
            method: Method::Iteration,
            case: None,
            log_b_a: None,
            steps,
            notes: "linear unrolling".to_owned(),
            term,
            exact: Some(exact),
        }
    } else {
        let term = simplify(&Expr::pow(Expr::int(i64::from(a)), levels));
        steps.push(format!(
            "each level multiplies the calls by {a}, and the geometric growth absorbs f"
        ));
        steps.push(format!("T({n}) = {}", crate::classes::big_theta(&term)));
        Solved {
            method: Method::Iteration,
            case: None,
            log_b_a: None,
            steps,
            notes: "exponential unrolling".to_owned(),
            term,
            exact: None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests;
