//! Symbolic expressions.
//!
//! [`Expr`] is an immutable tree over exact rational constants, named
//! variables (the algorithm's parameters and loop-bound variables),
//! probability symbols, per-line cost units, iteration placeholders, applied
//! functions (`p(i)`, `T(n/2)`), sums, products, powers, base-2 logarithms
//! and formal (unclosed) summations.
//!
//! Construction never simplifies; call [`Expr::simplify`] for the canonical
//! form.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops;

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};

/// Exact coefficient type.
pub type Rational = BigRational;

/// Upper limit on the number of integer points a formal sum is evaluated
/// over numerically.
const MAX_EVAL_POINTS: i64 = 1_000_000;

/// One `(variable, lower, upper)` index of a formal summation.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct Bound {
    pub var: String,
    pub lower: Expr,
    pub upper: Expr,
}

impl Bound {
    pub fn new(var: impl Into<String>, lower: Expr, upper: Expr) -> Self {
        Bound {
            var: var.into(),
            lower,
            upper,
        }
    }
}

/// A symbolic value.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub enum Expr {
    Num(Rational),
    /// Free or bound variable, name kept exactly as the caller spelled it.
    Var(String),
    /// Symbolic probability (`p`, `q`, ...).
    Prob(String),
    /// Cost unit of one source line, rendered `C_{k}`.
    Cost(u32),
    /// Iteration-count placeholder for an unclassified loop, rendered `\tau_{k}`.
    Opaque(u32),
    /// Applied function symbol such as `p(i)` or `T(n/2)`.
    Apply(String, Vec<Expr>),
    Add(Vec<Expr>),
    Mul(Vec<Expr>),
    Pow(Box<Expr>, Box<Expr>),
    /// Base-2 logarithm.
    Log(Box<Expr>),
    /// Formal summation; bounds are listed outermost first.
    Sum(Box<Expr>, Vec<Bound>),
}

// Construction

impl Expr {
    pub fn int(value: i64) -> Self {
        Expr::Num(Rational::from_integer(BigInt::from(value)))
    }

    /// `numer / denom`; a zero denominator yields zero.
    pub fn ratio(numer: i64, denom: i64) -> Self {
        if denom == 0 {
            return Expr::zero();
        }
        Expr::Num(Rational::new(BigInt::from(numer), BigInt::from(denom)))
    }

    pub fn zero() -> Self {
        Expr::Num(Rational::zero())
    }

    pub fn one() -> Self {
        Expr::Num(Rational::one())
    }

    pub fn var(name: impl Into<String>) -> Self {
        Expr::Var(name.into())
    }

    pub fn prob(name: impl Into<String>) -> Self {
        Expr::Prob(name.into())
    }

    pub fn apply(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Apply(name.into(), args)
    }

    pub fn log(arg: Expr) -> Self {
        Expr::Log(Box::new(arg))
    }

    pub fn pow(base: Expr, exponent: Expr) -> Self {
        Expr::Pow(Box::new(base), Box::new(exponent))
    }

    pub fn powi(base: Expr, exponent: i64) -> Self {
        Expr::pow(base, Expr::int(exponent))
    }

    pub fn sum(body: Expr, bounds: Vec<Bound>) -> Self {
        if bounds.is_empty() {
            return body;
        }
        Expr::Sum(Box::new(body), bounds)
    }

    /// `Σ_{var=lower}^{upper} body`
    pub fn sum_over(body: Expr, var: impl Into<String>, lower: Expr, upper: Expr) -> Self {
        Expr::sum(body, vec![Bound::new(var, lower, upper)])
    }

    /// Sum of terms; an empty list is zero and a single term is returned as is.
    pub fn add_all(mut terms: Vec<Expr>) -> Self {
        match terms.len() {
            0 => Expr::zero(),
            1 => terms.swap_remove(0),
            _ => Expr::Add(terms),
        }
    }

    /// Product of factors; an empty list is one and a single factor is returned as is.
    pub fn mul_all(mut factors: Vec<Expr>) -> Self {
        match factors.len() {
            0 => Expr::one(),
            1 => factors.swap_remove(0),
            _ => Expr::Mul(factors),
        }
    }
}

// Queries

impl Expr {
    pub fn as_rational(&self) -> Option<&Rational> {
        match self {
            Expr::Num(r) => Some(r),
            _ => None,
        }
    }

    /// The value as `i64` when this is an integral constant.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Expr::Num(r) if r.is_integer() => r.to_integer().to_i64(),
            _ => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, Expr::Num(r) if r.is_zero())
    }

    pub fn is_one(&self) -> bool {
        matches!(self, Expr::Num(r) if r.is_one())
    }

    /// Whether the expression is a negative constant or a product led by one.
    pub fn is_negative_term(&self) -> bool {
        match self {
            Expr::Num(r) => r.is_negative(),
            Expr::Mul(factors) => factors.first().is_some_and(Expr::is_negative_term),
            _ => false,
        }
    }

    /// Whether `pred` holds for this node or any node below it.
    pub fn any(&self, pred: &impl Fn(&Expr) -> bool) -> bool {
        if pred(self) {
            return true;
        }
        match self {
            Expr::Num(_) | Expr::Var(_) | Expr::Prob(_) | Expr::Cost(_) | Expr::Opaque(_) => false,
            Expr::Apply(_, args) | Expr::Add(args) | Expr::Mul(args) => {
                args.iter().any(|a| a.any(pred))
            }
            Expr::Pow(b, e) => b.any(pred) || e.any(pred),
            Expr::Log(a) => a.any(pred),
            Expr::Sum(body, bounds) => {
                body.any(pred)
                    || bounds
                        .iter()
                        .any(|b| b.lower.any(pred) || b.upper.any(pred))
            }
        }
    }

    pub fn has_cost_units(&self) -> bool {
        self.any(&|e| matches!(e, Expr::Cost(_)))
    }

    pub fn has_placeholders(&self) -> bool {
        self.any(&|e| matches!(e, Expr::Opaque(_)))
    }

    pub fn has_unclosed_sums(&self) -> bool {
        self.any(&|e| matches!(e, Expr::Sum(..)))
    }

    /// Variables occurring free (not bound by an enclosing summation).
    pub fn free_vars(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        collect_free_vars(self, &mut Vec::new(), &mut out);
        out
    }

    pub fn contains_var(&self, name: &str) -> bool {
        self.free_vars().contains(name)
    }

    /// Placeholder indices occurring anywhere in the expression.
    pub fn placeholders(&self) -> BTreeSet<u32> {
        let mut out = BTreeSet::new();
        self.visit(&mut |e| {
            if let Expr::Opaque(k) = e {
                out.insert(*k);
            }
        });
        out
    }

    /// Pre-order visit of every node.
    pub fn visit(&self, f: &mut impl FnMut(&Expr)) {
        f(self);
        match self {
            Expr::Num(_) | Expr::Var(_) | Expr::Prob(_) | Expr::Cost(_) | Expr::Opaque(_) => {}
            Expr::Apply(_, args) | Expr::Add(args) | Expr::Mul(args) => {
                for a in args {
                    a.visit(f);
                }
            }
            Expr::Pow(b, e) => {
                b.visit(f);
                e.visit(f);
            }
            Expr::Log(a) => a.visit(f),
            Expr::Sum(body, bounds) => {
                for b in bounds {
                    b.lower.visit(f);
                    b.upper.visit(f);
                }
                body.visit(f);
            }
        }
    }
}

fn collect_free_vars(expr: &Expr, bound: &mut Vec<String>, out: &mut BTreeSet<String>) {
    match expr {
        Expr::Var(name) => {
            if !bound.contains(name) {
                out.insert(name.clone());
            }
        }
        Expr::Num(_) | Expr::Prob(_) | Expr::Cost(_) | Expr::Opaque(_) => {}
        Expr::Apply(_, args) | Expr::Add(args) | Expr::Mul(args) => {
            for a in args {
                collect_free_vars(a, bound, out);
            }
        }
        Expr::Pow(b, e) => {
            collect_free_vars(b, bound, out);
            collect_free_vars(e, bound, out);
        }
        Expr::Log(a) => collect_free_vars(a, bound, out),
        Expr::Sum(body, bounds) => {
            let depth = bound.len();
            for b in bounds {
                collect_free_vars(&b.lower, bound, out);
                collect_free_vars(&b.upper, bound, out);
                bound.push(b.var.clone());
            }
            collect_free_vars(body, bound, out);
            bound.truncate(depth);
        }
    }
}

// Rewriting

impl Expr {
    /// Top-down rewrite: wherever `f` returns a replacement it is used as is,
    /// otherwise the node is rebuilt from rewritten children.
    pub fn rewrite(&self, f: &mut impl FnMut(&Expr) -> Option<Expr>) -> Expr {
        if let Some(replacement) = f(self) {
            return replacement;
        }
        match self {
            Expr::Num(_) | Expr::Var(_) | Expr::Prob(_) | Expr::Cost(_) | Expr::Opaque(_) => {
                self.clone()
            }
            Expr::Apply(name, args) => {
                Expr::Apply(name.clone(), args.iter().map(|a| a.rewrite(f)).collect())
            }
            Expr::Add(terms) => Expr::Add(terms.iter().map(|a| a.rewrite(f)).collect()),
            Expr::Mul(factors) => Expr::Mul(factors.iter().map(|a| a.rewrite(f)).collect()),
            Expr::Pow(b, e) => Expr::pow(b.rewrite(f), e.rewrite(f)),
            Expr::Log(a) => Expr::log(a.rewrite(f)),
            Expr::Sum(body, bounds) => Expr::Sum(
                Box::new(body.rewrite(f)),
                bounds
                    .iter()
                    .map(|b| Bound::new(b.var.clone(), b.lower.rewrite(f), b.upper.rewrite(f)))
                    .collect(),
            ),
        }
    }

    /// Replace free occurrences of variable `name` with `value`.
    ///
    /// A summation that binds `name` shadows it from that index inwards.
    pub fn subst(&self, name: &str, value: &Expr) -> Expr {
        match self {
            Expr::Var(v) if v == name => value.clone(),
            Expr::Num(_) | Expr::Var(_) | Expr::Prob(_) | Expr::Cost(_) | Expr::Opaque(_) => {
                self.clone()
            }
            Expr::Apply(f, args) => {
                Expr::Apply(f.clone(), args.iter().map(|a| a.subst(name, value)).collect())
            }
            Expr::Add(terms) => Expr::Add(terms.iter().map(|a| a.subst(name, value)).collect()),
            Expr::Mul(factors) => {
                Expr::Mul(factors.iter().map(|a| a.subst(name, value)).collect())
            }
            Expr::Pow(b, e) => Expr::pow(b.subst(name, value), e.subst(name, value)),
            Expr::Log(a) => Expr::log(a.subst(name, value)),
            Expr::Sum(body, bounds) => {
                let mut shadowed = false;
                let mut new_bounds = Vec::with_capacity(bounds.len());
                for b in bounds {
                    if shadowed {
                        new_bounds.push(b.clone());
                        continue;
                    }
                    new_bounds.push(Bound::new(
                        b.var.clone(),
                        b.lower.subst(name, value),
                        b.upper.subst(name, value),
                    ));
                    shadowed = b.var == name;
                }
                let body = if shadowed {
                    (**body).clone()
                } else {
                    body.subst(name, value)
                };
                Expr::Sum(Box::new(body), new_bounds)
            }
        }
    }

    /// Replace every cost unit `C_k` with one.
    pub fn with_unit_costs(&self) -> Expr {
        self.rewrite(&mut |e| matches!(e, Expr::Cost(_)).then(Expr::one))
    }
}

// Numeric evaluation

impl Expr {
    /// Evaluate numerically. Variables and probabilities are looked up in
    /// `env`, cost units count as one, formal sums are iterated. Returns
    /// `None` for placeholders, applied functions, unbound names, or sums
    /// too large to iterate.
    pub fn eval(&self, env: &BTreeMap<String, f64>) -> Option<f64> {
        match self {
            Expr::Num(r) => r.to_f64(),
            Expr::Var(name) | Expr::Prob(name) => env.get(name).copied(),
            Expr::Cost(_) => Some(1.0),
            Expr::Opaque(_) | Expr::Apply(..) => None,
            Expr::Add(terms) => terms.iter().try_fold(0.0, |acc, t| Some(acc + t.eval(env)?)),
            Expr::Mul(factors) => factors
                .iter()
                .try_fold(1.0, |acc, t| Some(acc * t.eval(env)?)),
            Expr::Pow(b, e) => Some(b.eval(env)?.powf(e.eval(env)?)),
            Expr::Log(a) => Some(a.eval(env)?.log2()),
            Expr::Sum(body, bounds) => eval_sum(body, bounds, env),
        }
    }
}

fn eval_sum(body: &Expr, bounds: &[Bound], env: &BTreeMap<String, f64>) -> Option<f64> {
    let Some((first, rest)) = bounds.split_first() else {
        return body.eval(env);
    };
    let lower = first.lower.eval(env)?.ceil();
    let upper = first.upper.eval(env)?.floor();
    if upper < lower {
        return Some(0.0);
    }
    #[expect(
        clippy::cast_possible_truncation,
        reason = "bounds are checked against MAX_EVAL_POINTS"
    )]
    let (lo, hi) = (lower as i64, upper as i64);
    if hi - lo > MAX_EVAL_POINTS {
        return None;
    }
    let mut inner = env.clone();
    let mut total = 0.0;
    for v in lo..=hi {
        #[expect(clippy::cast_precision_loss, reason = "loop indices are small")]
        inner.insert(first.var.clone(), v as f64);
        total += eval_sum(body, rest, &inner)?;
    }
    Some(total)
}

// Operators

impl ops::Add for Expr {
    type Output = Expr;

    fn add(self, rhs: Expr) -> Expr {
        match self {
            Expr::Add(mut terms) => {
                terms.push(rhs);
                Expr::Add(terms)
            }
            lhs => Expr::Add(vec![lhs, rhs]),
        }
    }
}

impl ops::Sub for Expr {
    type Output = Expr;

    fn sub(self, rhs: Expr) -> Expr {
        self + (-rhs)
    }
}

impl ops::Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        match self {
            Expr::Num(r) => Expr::Num(-r),
            other => Expr::Mul(vec![Expr::int(-1), other]),
        }
    }
}

impl ops::Mul for Expr {
    type Output = Expr;

    fn mul(self, rhs: Expr) -> Expr {
        match self {
            Expr::Mul(mut factors) => {
                factors.push(rhs);
                Expr::Mul(factors)
            }
            lhs => Expr::Mul(vec![lhs, rhs]),
        }
    }
}

impl ops::Div for Expr {
    type Output = Expr;

    fn div(self, rhs: Expr) -> Expr {
        self * Expr::powi(rhs, -1)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::render::to_latex(self))
    }
}
