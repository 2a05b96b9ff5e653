//! Asymptotic ordering of monomials.
//!
//! Every monomial gets a [`GrowthKey`] `(exponential base, degree, log power)`
//! compared lexicographically, so `2^n ≻ n^3 ≻ n^2 log n ≻ n^2 ≻ n ≻ log n ≻ 1`.
//! Only free variables contribute; probability symbols, cost units, applied
//! functions and unclosed sums count as constants.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use num_traits::{Signed, ToPrimitive};

use crate::expr::{Bound, Expr, Rational};
use crate::poly::{Monomial, Poly};

#[derive(Clone, Copy, Debug)]
pub struct GrowthKey {
    pub exp_base: f64,
    pub degree: f64,
    pub log_power: f64,
}

impl GrowthKey {
    pub const CONSTANT: GrowthKey = GrowthKey {
        exp_base: 1.0,
        degree: 0.0,
        log_power: 0.0,
    };

    pub fn is_constant(&self) -> bool {
        self.cmp(&GrowthKey::CONSTANT) == Ordering::Equal
    }

    /// `n^d` as a key.
    pub fn polynomial(degree: f64) -> Self {
        GrowthKey {
            degree,
            ..GrowthKey::CONSTANT
        }
    }

    fn raise(self, k: f64) -> Self {
        GrowthKey {
            exp_base: self.exp_base.powf(k),
            degree: self.degree * k,
            log_power: self.log_power * k,
        }
    }

    fn times(self, other: GrowthKey) -> Self {
        GrowthKey {
            exp_base: self.exp_base * other.exp_base,
            degree: self.degree + other.degree,
            log_power: self.log_power + other.log_power,
        }
    }
}

const EPSILON: f64 = 1e-9;

fn cmp_f64(a: f64, b: f64) -> Ordering {
    if (a - b).abs() < EPSILON {
        Ordering::Equal
    } else {
        a.total_cmp(&b)
    }
}

impl Ord for GrowthKey {
    fn cmp(&self, other: &Self) -> Ordering {
        cmp_f64(self.exp_base, other.exp_base)
            .then_with(|| cmp_f64(self.degree, other.degree))
            .then_with(|| cmp_f64(self.log_power, other.log_power))
    }
}

impl PartialOrd for GrowthKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for GrowthKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for GrowthKey {}

fn rational_f64(r: &Rational) -> f64 {
    r.to_f64().unwrap_or(0.0)
}

/// Growth of a single monomial.
pub fn growth_key(monomial: &Monomial) -> GrowthKey {
    monomial
        .iter()
        .fold(GrowthKey::CONSTANT, |acc, (atom, k)| {
            #[expect(clippy::cast_precision_loss, reason = "exponents are small")]
            let k = *k as f64;
            acc.times(atom_growth(atom).raise(k))
        })
}

fn atom_growth(atom: &Expr) -> GrowthKey {
    match atom {
        Expr::Var(_) => GrowthKey::polynomial(1.0),
        Expr::Log(arg) => {
            if arg.free_vars().is_empty() {
                GrowthKey::CONSTANT
            } else {
                GrowthKey {
                    log_power: 1.0,
                    ..GrowthKey::CONSTANT
                }
            }
        }
        Expr::Pow(base, exp) => match base.as_rational() {
            Some(c) if c.is_positive() => exponential_growth(c, exp),
            Some(_) => GrowthKey::CONSTANT,
            // Constant exponents such as 1/2 or log2(3).
            None => exp
                .eval(&BTreeMap::new())
                .map_or(GrowthKey::CONSTANT, |k| expr_growth(base).raise(k)),
        },
        // Multi-term atoms such as (n + 1) kept under a power.
        Expr::Add(_) | Expr::Mul(_) => expr_growth(atom),
        Expr::Sum(..) => expr_growth(&atom.sum_upper_estimate()),
        _ => GrowthKey::CONSTANT,
    }
}

/// `c^e`: the base of the exponential is `c` raised to the coefficient of
/// the linear part of `e`. Sub-linear exponents (`c^{log n}`) collapse to a
/// polynomial degree.
fn exponential_growth(c: &Rational, exp: &Expr) -> GrowthKey {
    let pe = Poly::from_expr(exp);
    let Some((monomial, coeff)) = dominant_term(&pe) else {
        return GrowthKey::CONSTANT;
    };
    let key = growth_key(&monomial);
    let base = rational_f64(c);
    if key.is_constant() {
        return GrowthKey::CONSTANT;
    }
    if cmp_f64(key.degree, 0.0) == Ordering::Equal
        && cmp_f64(key.exp_base, 1.0) == Ordering::Equal
        && cmp_f64(key.log_power, 1.0) == Ordering::Equal
    {
        return GrowthKey::polynomial(rational_f64(&coeff) * base.log2());
    }
    GrowthKey {
        exp_base: base.powf(rational_f64(&coeff)),
        ..GrowthKey::CONSTANT
    }
}

fn expr_growth(expr: &Expr) -> GrowthKey {
    dominant_term(&Poly::from_expr(expr)).map_or(GrowthKey::CONSTANT, |(m, _)| growth_key(&m))
}

/// The highest-growth term of a polynomial with its coefficient.
///
/// Ties keep the term that comes first in canonical order. Returns `None`
/// for the zero polynomial.
pub fn dominant_term(poly: &Poly) -> Option<(Monomial, Rational)> {
    let mut best: Option<(GrowthKey, &Monomial, &Rational)> = None;
    for (monomial, coeff) in poly.terms() {
        let key = growth_key(monomial);
        let better = match &best {
            None => true,
            Some((best_key, _, _)) => key > *best_key,
        };
        if better {
            best = Some((key, monomial, coeff));
        }
    }
    best.map(|(_, m, c)| (m.clone(), c.clone()))
}

impl Expr {
    /// Growth of the dominant term.
    pub fn growth(&self) -> GrowthKey {
        expr_growth(self)
    }

    /// Upper estimate of a formal summation: the number of index points
    /// times the body at whichever end of every range grows faster. Other
    /// expressions are returned unchanged.
    pub fn sum_upper_estimate(&self) -> Expr {
        self.sum_estimate().0
    }

    /// [`Expr::sum_upper_estimate`], plus whether every range was taken at
    /// its upper end. When it was, the body grows with the index and the
    /// estimate is within a constant factor of the sum for polynomial and
    /// logarithmic bodies.
    pub fn sum_estimate(&self) -> (Expr, bool) {
        let Expr::Sum(body, bounds) = self else {
            return (self.clone(), true);
        };
        let (mut estimate, mut increasing) = body.sum_estimate();
        for Bound { var, lower, upper } in bounds.iter().rev() {
            let span = upper.clone() - lower.clone() + Expr::one();
            let at_upper = crate::simplify(&estimate.subst(var, upper));
            let at_lower = crate::simplify(&estimate.subst(var, lower));
            let end = if at_lower.growth() > at_upper.growth() {
                increasing = false;
                at_lower
            } else {
                at_upper
            };
            estimate = span * end;
        }
        (crate::simplify(&estimate), increasing)
    }
}
