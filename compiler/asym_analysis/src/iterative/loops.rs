//! Iteration counts of `while` and `repeat` loops.
//!
//! A condition-controlled loop is classified by how its control variable
//! moves relative to the condition:
//!
//! | update            | condition     | iterations                 |
//! |-------------------|---------------|----------------------------|
//! | `i <- i + c`      | `i < B`       | `(B - i₀) / c`             |
//! | `i <- i - c`      | `i > B`       | `(i₀ - B) / c`             |
//! | `i <- i * c`      | `i < B`       | `log(B / i₀) / log c`      |
//! | `i <- i / c`      | `i > B`       | `log(i₀ / B) / log c`      |
//! | `lo`/`hi` from `(lo + hi) / 2` | `lo ≤ hi` | `log(hi₀ - lo₀ + 1) + 1` |
//! | `lo++` / `hi--`   | `lo < hi`     | `hi₀ - lo₀`                |
//!
//! Inclusive comparisons add the final iteration. `i * i ≤ B` counts up to
//! `√B`. Anything else gets an iteration placeholder.

use asym_expr::{simplify, Expr, Poly, Rational};
use asym_ir::{walk, BinaryOp, ExprId, ExprKind, StmtId, StmtKind};
use num_traits::{One, Signed, Zero};

use super::IterativeAnalyzer;
use crate::base::Multiplier;
use crate::options::Case;
use crate::result::RowKind;
use crate::symbolic::{definitions, to_symbolic, Definitions};

/// One `left op right` conjunct of the continuation condition.
#[derive(Copy, Clone, Debug)]
struct Comparison {
    op: BinaryOp,
    left: ExprId,
    right: ExprId,
}

/// How the control variable changes per iteration.
#[derive(Clone, Debug, PartialEq)]
enum Step {
    Add(Expr),
    Sub(Expr),
    Mul(Rational),
    Div(Rational),
}

struct LoopShape {
    iterations: Expr,
    description: String,
}

/// Assignment to a plain variable inside a loop body.
struct Update {
    var: String,
    value: ExprId,
    /// Runs on every iteration (not under a branch or inner loop).
    unconditional: bool,
}

impl IterativeAnalyzer<'_> {
    pub(super) fn visit_while(&mut self, line: u32, test: ExprId, body: StmtId) {
        self.visit_conditional_loop(line, RowKind::While, test, body, false);
    }

    pub(super) fn visit_repeat(&mut self, line: u32, body: StmtId, test: ExprId) {
        self.visit_conditional_loop(line, RowKind::Repeat, test, body, true);
    }

    fn visit_conditional_loop(&mut self, line: u32, kind: RowKind, test: ExprId, body: StmtId, until: bool) {
        if let Some(note) = self.fails_first_test(line, test, until) {
            // One test; a `repeat` body still runs once.
            let runs = if until { Expr::one() } else { Expr::zero() };
            self.forget_assigned(body);
            self.base.add_row(line, kind, Expr::one(), note);
            self.within([Multiplier::Factor(runs)], |this| this.visit(body));
            self.forget_assigned(body);
            return;
        }
        let (iterations, note) = self.loop_iterations(line, test, body, until);
        self.forget_assigned(body);
        self.within([Multiplier::Factor(iterations)], |this| {
            this.base.add_row(line, kind, Expr::one(), note);
            this.visit(body);
        });
        self.forget_assigned(body);
    }

    /// In the best case, a continuation that reads the data (`A[i] > key`)
    /// is taken to fail on the first test.
    fn fails_first_test(&mut self, line: u32, test: ExprId, until: bool) -> Option<String> {
        if self.base.case() != Case::Best {
            return None;
        }
        let data_dependent = continuation(self.program, test, until)
            .into_iter()
            .find(|c| self.to_sym(c.left).is_none() || self.to_sym(c.right).is_none())?;
        let note = format!(
            "`{} {} {}` fails on the first test",
            self.program.render_expr(data_dependent.left),
            data_dependent.op.as_symbol(),
            self.program.render_expr(data_dependent.right)
        );
        self.base.log_step(format!("line {line}: best case {note}"));
        Some(note)
    }

    fn loop_iterations(&mut self, line: u32, test: ExprId, body: StmtId, until: bool) -> (Expr, String) {
        if self.base.case() == Case::Best && walk::contains_return(self.program, body) {
            let note = "exits during the first iteration".to_owned();
            self.base.log_step(format!("line {line}: best case {note}"));
            return (Expr::one(), note);
        }
        match self.classify_loop(test, body, until) {
            Some(LoopShape {
                iterations,
                description,
            }) => {
                self.base
                    .log_step(format!("line {line}: {description}, {iterations} iterations"));
                (iterations, description)
            }
            None => {
                let predicate = self.program.render_expr(test);
                let reason = format!("iteration count of `{predicate}` not recognised");
                (self.base.placeholder(line, reason.clone()), reason)
            }
        }
    }

    fn classify_loop(&self, test: ExprId, body: StmtId, until: bool) -> Option<LoopShape> {
        let comparisons = continuation(self.program, test, until);
        let updates = updates_in(self.program, body);
        let body_defs = definitions(self.program, body);
        comparisons
            .iter()
            .find_map(|c| self.two_pointer(*c, &updates, &body_defs))
            .or_else(|| {
                comparisons
                    .iter()
                    .find_map(|c| self.single_variable(*c, &updates, &body_defs))
            })
    }

    /// Value of `var` before the loop.
    fn initial(&self, var: &str) -> Option<Expr> {
        if let Some(value) = self.locals.get(var) {
            return Some(value.clone());
        }
        self.is_param(var).then(|| Expr::var(var))
    }

    fn two_pointer(&self, cmp: Comparison, updates: &[Update], defs: &Definitions) -> Option<LoopShape> {
        let program = self.program;
        let (ExprKind::Ident(a), ExprKind::Ident(b)) =
            (&program.expr(cmp.left).kind, &program.expr(cmp.right).kind)
        else {
            return None;
        };
        // Orient as `low op high` with op `<` or `≤`.
        let (low, high, inclusive) = match cmp.op {
            BinaryOp::Lt => (a, b, false),
            BinaryOp::LtEq => (a, b, true),
            BinaryOp::Gt => (b, a, false),
            BinaryOp::GtEq => (b, a, true),
            _ => return None,
        };
        let moves = |v: &str| updates.iter().filter(|u| u.var == v).collect::<Vec<_>>();
        let (low_updates, high_updates) = (moves(low), moves(high));
        if low_updates.is_empty() || high_updates.is_empty() {
            return None;
        }
        let low0 = self.initial(low).unwrap_or_else(Expr::one);
        let high0 = self.initial(high).unwrap_or_else(|| Expr::var("n"));

        let midpoint = |u: &&Update| {
            to_symbolic(program, u.value, defs).is_some_and(|v| {
                let poly = Poly::from_expr(&simplify(&v));
                let half = Rational::new(1.into(), 2.into());
                let coeff = |name: &str| {
                    poly.terms()
                        .find(|(m, _)| m.as_slice() == [(Expr::var(name), 1)])
                        .map(|(_, c)| c.clone())
                };
                coeff(low) == Some(half.clone()) && coeff(high) == Some(half)
            })
        };
        if low_updates.iter().chain(&high_updates).any(midpoint) {
            let span = simplify(&(high0 - low0 + Expr::one()));
            return Some(LoopShape {
                iterations: simplify(&(Expr::log(span) + Expr::one())),
                description: format!("{low} and {high} converge on a midpoint, halving the range"),
            });
        }

        let inward = |u: &&Update, sign: i32| {
            step_of(program, u, defs).is_some_and(|s| match (s, sign) {
                (Step::Add(c), 1) | (Step::Sub(c), -1) => is_positive_constant(&c),
                _ => false,
            })
        };
        let low_in = low_updates.iter().any(|u| inward(u, 1));
        let high_in = high_updates.iter().any(|u| inward(u, -1));
        if !low_in && !high_in {
            return None;
        }
        let mut span = high0 - low0;
        if inclusive {
            span = span + Expr::one();
        }
        let both = low_updates.iter().any(|u| u.unconditional && inward(u, 1))
            && high_updates.iter().any(|u| u.unconditional && inward(u, -1));
        if both {
            span = span / Expr::int(2);
        }
        Some(LoopShape {
            iterations: simplify(&span),
            description: format!("{low} and {high} move toward each other"),
        })
    }

    fn single_variable(&self, cmp: Comparison, updates: &[Update], defs: &Definitions) -> Option<LoopShape> {
        let program = self.program;
        let updated = |id: ExprId| match &program.expr(id).kind {
            ExprKind::Ident(v) => updates.iter().any(|u| &u.var == v).then(|| (v.clone(), false)),
            // `i * i` compared against a bound
            ExprKind::Binary {
                op: BinaryOp::Mul,
                left,
                right,
            } => match (&program.expr(*left).kind, &program.expr(*right).kind) {
                (ExprKind::Ident(x), ExprKind::Ident(y)) if x == y && updates.iter().any(|u| &u.var == x) => {
                    Some((x.clone(), true))
                }
                _ => None,
            },
            _ => None,
        };
        let (var, squared, op, bound) = if let Some((v, sq)) = updated(cmp.left) {
            (v, sq, cmp.op, cmp.right)
        } else if let Some((v, sq)) = updated(cmp.right) {
            (v, sq, cmp.op.flipped(), cmp.left)
        } else {
            return None;
        };
        let update = updates.iter().find(|u| u.var == var)?;
        let step = step_of(program, update, defs)?;
        let mut limit = self.to_sym(bound)?;
        if limit.contains_var(&var) {
            return None;
        }
        if squared {
            limit = Expr::pow(limit, Expr::ratio(1, 2));
        }

        let increasing = matches!(step, Step::Add(_) | Step::Mul(_));
        let init = match self.initial(&var) {
            Some(v) => v,
            None if increasing => Expr::one(),
            None => Expr::var(var.clone()),
        };
        let inclusive = matches!(op, BinaryOp::LtEq | BinaryOp::GtEq);
        let extra = if inclusive { Expr::one() } else { Expr::zero() };
        let (iterations, description) = match (&step, op) {
            (Step::Add(c), BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::NotEq) => (
                (limit - init) / c.clone() + extra,
                format!("{var} grows by {c} per iteration"),
            ),
            (Step::Sub(c), BinaryOp::Gt | BinaryOp::GtEq | BinaryOp::NotEq) => (
                (init - limit) / c.clone() + extra,
                format!("{var} shrinks by {c} per iteration"),
            ),
            (Step::Mul(k), BinaryOp::Lt | BinaryOp::LtEq) => (
                Expr::log(limit / init) / Expr::log(Expr::Num(k.clone())) + extra,
                format!("{var} is multiplied by {k} per iteration"),
            ),
            (Step::Div(k), BinaryOp::Gt | BinaryOp::GtEq | BinaryOp::NotEq) => {
                let k_log = Expr::log(Expr::Num(k.clone()));
                let reaches_zero = limit.constant_value().is_some_and(|b| !b.is_positive());
                let count = if reaches_zero {
                    // Integer division keeps going until the value hits zero.
                    Expr::log(init) / k_log + Expr::one()
                } else {
                    Expr::log(init / limit) / k_log + extra
                };
                (count, format!("{var} is divided by {k} per iteration"))
            }
            _ => return None,
        };
        Some(LoopShape {
            iterations: simplify(&iterations),
            description,
        })
    }
}

/// Comparisons that must all hold for the loop to continue.
fn continuation(program: &asym_ir::Program, test: ExprId, until: bool) -> Vec<Comparison> {
    let mut out = Vec::new();
    collect_continuation(program, test, until, &mut out);
    out
}

fn collect_continuation(program: &asym_ir::Program, id: ExprId, negate: bool, out: &mut Vec<Comparison>) {
    let ExprKind::Binary { op, left, right } = &program.expr(id).kind else {
        return;
    };
    match (op, negate) {
        // `while a and b` continues while both hold; `until a or b` while neither does.
        (BinaryOp::And, false) | (BinaryOp::Or, true) => {
            collect_continuation(program, *left, negate, out);
            collect_continuation(program, *right, negate, out);
        }
        (op, false) if op.is_comparison() => out.push(Comparison {
            op: *op,
            left: *left,
            right: *right,
        }),
        (op, true) => {
            if let Some(op) = op.negated() {
                out.push(Comparison {
                    op,
                    left: *left,
                    right: *right,
                });
            }
        }
        _ => {}
    }
}

fn updates_in(program: &asym_ir::Program, body: StmtId) -> Vec<Update> {
    let mut out = Vec::new();
    collect_updates(program, body, true, &mut out);
    out
}

fn collect_updates(program: &asym_ir::Program, id: StmtId, unconditional: bool, out: &mut Vec<Update>) {
    match &program.stmt(id).kind {
        StmtKind::Assign { target, value } => {
            if let ExprKind::Ident(var) = &program.expr(*target).kind {
                out.push(Update {
                    var: var.clone(),
                    value: *value,
                    unconditional,
                });
            }
        }
        StmtKind::Block { stmts } => {
            for s in stmts {
                collect_updates(program, *s, unconditional, out);
            }
        }
        _ => {
            for child in walk::child_stmts(program, id) {
                collect_updates(program, child, false, out);
            }
        }
    }
}

/// The per-iteration change an update applies to its own variable.
fn step_of(program: &asym_ir::Program, update: &Update, defs: &Definitions) -> Option<Step> {
    let var = Expr::var(update.var.clone());
    // Later definitions of the variable itself must not be substituted.
    let mut defs = defs.clone();
    defs.remove(&update.var);
    let value = simplify(&to_symbolic(program, update.value, &defs)?);
    let delta = simplify(&(value.clone() - var.clone()));
    if !delta.contains_var(&update.var) {
        return match delta.constant_value() {
            Some(c) if c.is_zero() => None,
            Some(c) if c.is_negative() => Some(Step::Sub(Expr::Num(-c))),
            _ => Some(Step::Add(delta)),
        };
    }
    let poly = Poly::from_expr(&value);
    let (monomial, k) = poly.single_term()?;
    if monomial.as_slice() != [(var, 1)] {
        return None;
    }
    if *k > Rational::one() {
        Some(Step::Mul(k.clone()))
    } else if k.is_positive() && *k < Rational::one() {
        Some(Step::Div(k.recip()))
    } else {
        None
    }
}

fn is_positive_constant(e: &Expr) -> bool {
    e.constant_value().is_some_and(|c| c.is_positive())
}
