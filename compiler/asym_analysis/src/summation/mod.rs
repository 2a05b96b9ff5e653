//! Closing formal summations.
//!
//! A loop nest becomes a formal sum `Σ_{i=lo}^{hi} Σ_{j=lo'}^{hi'} body`
//! whose inner bounds may mention outer index variables. Closing always
//! works innermost first: the closed inner sum is a polynomial in the
//! outer index, which then becomes the body of the next sum out. Closing
//! the other way round leaves the outer index stranded inside the inner
//! bound.
//!
//! Per summand term the closer knows:
//! - index-free terms: `c · (hi - lo + 1)`
//! - powers of the index `i^k`: Faulhaber's formula `S_k(hi) - S_k(lo - 1)`
//! - geometric terms `c^{a i + b}`
//!
//! Anything else stays behind as a (smaller) unclosed sum.

use asym_expr::{simplify, Bound, Expr, Poly, Rational};
use num_bigint::BigInt;
use num_traits::{One, Signed, ToPrimitive, Zero};

use crate::stack::ensure_sufficient_stack;

/// Constant ranges up to this many points are expanded term by term.
const MAX_EXPANDED_RANGE: i64 = 32;

/// Highest index power closed with Faulhaber's formula.
const MAX_FAULHABER_POWER: i64 = 16;

/// Closes summations and records each closing step.
#[derive(Debug, Default)]
pub struct SummationCloser {
    steps: Vec<String>,
}

impl SummationCloser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Steps recorded so far, in the order they were taken.
    pub fn steps(&self) -> &[String] {
        &self.steps
    }

    pub fn take_steps(&mut self) -> Vec<String> {
        std::mem::take(&mut self.steps)
    }

    /// Close every summation inside `expr` and simplify the result.
    pub fn close(&mut self, expr: &Expr) -> Expr {
        if !expr.has_unclosed_sums() {
            return simplify(expr);
        }
        let closed = expr.rewrite(&mut |e| match e {
            Expr::Sum(body, bounds) => Some(self.close_sum(body, bounds)),
            _ => None,
        });
        simplify(&closed)
    }

    /// Close `Σ body` over `bounds` (outermost first), innermost bound first.
    pub fn close_sum(&mut self, body: &Expr, bounds: &[Bound]) -> Expr {
        ensure_sufficient_stack(|| {
            let mut acc = self.close(body);
            for bound in bounds.iter().rev() {
                let lower = self.close(&bound.lower);
                let upper = self.close(&bound.upper);
                acc = self.close_single(&acc, &bound.var, &lower, &upper);
            }
            acc
        })
    }

    /// Close `Σ_{var=lower}^{upper} body` for a body without nested sums.
    pub fn close_single(&mut self, body: &Expr, var: &str, lower: &Expr, upper: &Expr) -> Expr {
        let body = simplify(body);
        let span = simplify(&(upper.clone() - lower.clone() + Expr::one()));
        let formal = Expr::sum_over(body.clone(), var, lower.clone(), upper.clone());

        if let Some(points) = span.constant_value() {
            if !points.is_positive() {
                self.record("empty range", &formal, &Expr::zero());
                return Expr::zero();
            }
        }
        if !body.contains_var(var) {
            let result = simplify(&(body.clone() * span));
            self.record("constant summand", &formal, &result);
            return result;
        }
        if let (Some(lo), Some(hi)) = (lower.as_integer(), upper.as_integer()) {
            if hi - lo < MAX_EXPANDED_RANGE {
                let terms = (lo..=hi).map(|k| body.subst(var, &Expr::int(k))).collect();
                let result = simplify(&Expr::add_all(terms));
                self.record("expanded finite range", &formal, &result);
                return result;
            }
        }

        let mut closed = Poly::zero();
        let mut remainder = Poly::zero();
        let mut rules: Vec<&'static str> = Vec::new();
        for (monomial, coeff) in Poly::from_expr(&body).terms() {
            let (dependent, independent): (Vec<_>, Vec<_>) =
                monomial.iter().cloned().partition(|(atom, _)| atom.contains_var(var));
            let outside = Expr::Num(coeff.clone()) * monomial_expr(independent);
            let inside = match dependent.as_slice() {
                [] => Some(("constant summand", span.clone())),
                [(Expr::Var(v), k)] if v == var && (1..=MAX_FAULHABER_POWER).contains(k) => {
                    Some((power_rule(*k), power_sum(*k, lower, upper)))
                }
                [(Expr::Pow(base, exp), 1)] => match base.as_rational() {
                    Some(c) => geometric_sum(c, exp, var, lower, upper).map(|s| ("geometric series", s)),
                    None => None,
                },
                _ => None,
            };
            match inside {
                Some((rule, sum)) => {
                    if !rules.contains(&rule) {
                        rules.push(rule);
                    }
                    closed = closed.add(&Poly::from_expr(&(outside * sum)));
                }
                None => {
                    remainder = remainder.add(&Poly::from_expr(
                        &(outside * monomial_expr(dependent)),
                    ));
                }
            }
        }

        let mut result = closed.to_expr();
        if !remainder.is_zero() {
            tracing::debug!(var, summand = %remainder.to_expr(), "summand left unclosed");
            let open = Expr::sum_over(remainder.to_expr(), var, lower.clone(), upper.clone());
            result = simplify(&(result + open));
        }
        if !rules.is_empty() {
            self.record(&rules.join(", "), &formal, &result);
        }
        result
    }

    fn record(&mut self, rule: &str, formal: &Expr, result: &Expr) {
        tracing::debug!(rule, sum = %formal, closed = %result, "closed summation");
        self.steps.push(format!("{rule}: {formal} = {result}"));
    }
}

fn monomial_expr(factors: Vec<(Expr, i64)>) -> Expr {
    Expr::mul_all(
        factors
            .into_iter()
            .map(|(atom, k)| if k == 1 { atom } else { Expr::powi(atom, k) })
            .collect(),
    )
}

fn power_rule(k: i64) -> &'static str {
    match k {
        1 => "arithmetic series",
        2 => "sum of squares",
        3 => "sum of cubes",
        _ => "Faulhaber's formula",
    }
}

/// `Σ_{i=lower}^{upper} i^k = S_k(upper) - S_k(lower - 1)`.
fn power_sum(k: i64, lower: &Expr, upper: &Expr) -> Expr {
    let below = simplify(&(lower.clone() - Expr::one()));
    if below.is_zero() {
        return faulhaber(k, upper);
    }
    faulhaber(k, upper) - faulhaber(k, &below)
}

/// `S_k(m) = Σ_{i=1}^{m} i^k = 1/(k+1) Σ_{j=0}^{k} C(k+1, j) B_j m^{k+1-j}`
/// with `B_1 = +1/2`.
pub(crate) fn faulhaber(k: i64, m: &Expr) -> Expr {
    let bernoulli = bernoulli_numbers(k);
    let k1 = BigInt::from(k + 1);
    let terms = (0..=k)
        .filter_map(|j| {
            let b = bernoulli.get(usize::try_from(j).ok()?)?;
            if b.is_zero() {
                return None;
            }
            let coeff = Rational::from_integer(num_integer::binomial(k1.clone(), BigInt::from(j)))
                * b
                / Rational::from_integer(k1.clone());
            Some(Expr::Num(coeff) * Expr::powi(m.clone(), k + 1 - j))
        })
        .collect();
    Expr::add_all(terms)
}

/// `B_0 ..= B_k`, using the `B_1 = +1/2` convention.
fn bernoulli_numbers(k: i64) -> Vec<Rational> {
    let mut out: Vec<Rational> = vec![Rational::one()];
    for m in 1..=k {
        let m1 = BigInt::from(m + 1);
        let mut acc = Rational::zero();
        for (j, b) in out.iter().enumerate() {
            acc += Rational::from_integer(num_integer::binomial(m1.clone(), BigInt::from(j))) * b;
        }
        out.push(-acc / Rational::from_integer(m1));
    }
    if let Some(b1) = out.get_mut(1) {
        *b1 = -b1.clone();
    }
    out
}

/// `Σ_{i=lower}^{upper} c^{a i + b}` for integral `a`.
fn geometric_sum(c: &Rational, exp: &Expr, var: &str, lower: &Expr, upper: &Expr) -> Option<Expr> {
    let pe = Poly::from_expr(exp);
    let index = vec![(Expr::var(var), 1)];
    let mut slope = None;
    let mut offset = Poly::zero();
    for (monomial, coeff) in pe.terms() {
        if *monomial == index {
            slope = Some(coeff.clone());
        } else if monomial.iter().any(|(atom, _)| atom.contains_var(var)) {
            return None;
        } else {
            offset = offset.add(&Poly::from_expr(&(Expr::Num(coeff.clone()) * monomial_expr(monomial.clone()))));
        }
    }
    let slope = slope?;
    if !slope.is_integer() {
        return None;
    }
    let a = slope.to_integer().to_i64()?;
    let ratio = Expr::pow(Expr::Num(c.clone()), Expr::int(a)).constant_value()?;
    if ratio.is_one() {
        return None;
    }
    let base = || Expr::Num(c.clone());
    let first = Expr::pow(base(), Expr::int(a) * lower.clone() + offset.to_expr());
    let count = upper.clone() - lower.clone() + Expr::one();
    let growth = Expr::pow(Expr::Num(ratio.clone()), count) - Expr::one();
    let scale = Expr::Num((ratio - Rational::one()).recip());
    Some(simplify(&(scale * first * growth)))
}
