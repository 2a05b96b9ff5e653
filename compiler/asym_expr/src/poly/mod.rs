//! Canonical polynomial normal form.
//!
//! A [`Poly`] is a finite sum of terms `c · a₁^k₁ · … · aₘ^kₘ` where `c` is an
//! exact rational, every `aᵢ` is an *atom* (an [`Expr`] that is not itself a
//! sum, product or integral power: variables, symbols, logarithms, applied
//! functions, unclosed sums, non-integral powers) and every `kᵢ` is a
//! non-zero integer. Terms are kept in a `BTreeMap` keyed by monomial, so
//! like terms combine on insertion and two equal polynomials always have the
//! same representation.
//!
//! Conversion from [`Expr`] is total: anything without a polynomial reading
//! becomes an atom. This is what makes simplification degrade instead of
//! fail.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use num_bigint::BigInt;
use num_traits::{One, Signed, ToPrimitive, Zero};

use crate::expr::{Bound, Expr, Rational};

/// Sorted atom/exponent pairs; exponents are never zero.
pub type Monomial = Vec<(Expr, i64)>;

/// Largest number of terms an integral power is allowed to expand into.
const MAX_EXPANDED_TERMS: usize = 256;

/// Canonical sum of rational-coefficient monomials.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Poly {
    terms: BTreeMap<Monomial, Rational>,
}

impl Poly {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn one() -> Self {
        Self::constant(Rational::one())
    }

    pub fn constant(c: Rational) -> Self {
        let mut p = Self::zero();
        p.add_term(Vec::new(), c);
        p
    }

    /// `atom^exp` as a single-term polynomial.
    pub fn atom(atom: Expr, exp: i64) -> Self {
        if exp == 0 {
            return Self::one();
        }
        let mut p = Self::zero();
        p.add_term(vec![(atom, exp)], Rational::one());
        p
    }

    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn terms(&self) -> impl Iterator<Item = (&Monomial, &Rational)> {
        self.terms.iter()
    }

    /// The value when the polynomial has no atoms at all.
    pub fn constant_value(&self) -> Option<Rational> {
        match self.terms.len() {
            0 => Some(Rational::zero()),
            1 => self
                .terms
                .iter()
                .next()
                .filter(|(m, _)| m.is_empty())
                .map(|(_, c)| c.clone()),
            _ => None,
        }
    }

    /// Coefficient of the atom-free term.
    pub fn constant_term(&self) -> Rational {
        self.terms
            .get(&Vec::new())
            .cloned()
            .unwrap_or_else(Rational::zero)
    }

    pub fn single_term(&self) -> Option<(&Monomial, &Rational)> {
        if self.terms.len() == 1 {
            self.terms.iter().next()
        } else {
            None
        }
    }

    fn add_term(&mut self, monomial: Monomial, coeff: Rational) {
        if coeff.is_zero() {
            return;
        }
        let entry = self.terms.entry(monomial).or_insert_with(Rational::zero);
        *entry += coeff;
        if entry.is_zero() {
            self.terms.retain(|_, c| !c.is_zero());
        }
    }

    #[must_use]
    pub fn add(&self, other: &Poly) -> Poly {
        let mut out = self.clone();
        for (m, c) in &other.terms {
            out.add_term(m.clone(), c.clone());
        }
        out
    }

    #[must_use]
    pub fn sub(&self, other: &Poly) -> Poly {
        self.add(&other.scale(&-Rational::one()))
    }

    #[must_use]
    pub fn scale(&self, factor: &Rational) -> Poly {
        let mut out = Poly::zero();
        for (m, c) in &self.terms {
            out.add_term(m.clone(), c * factor);
        }
        out
    }

    #[must_use]
    pub fn mul(&self, other: &Poly) -> Poly {
        let mut out = Poly::zero();
        for (ma, ca) in &self.terms {
            for (mb, cb) in &other.terms {
                out.add_term(mul_monomials(ma, mb), ca * cb);
            }
        }
        out
    }

    /// Non-negative integral power by repeated multiplication.
    #[must_use]
    pub fn pow(&self, k: u32) -> Poly {
        let mut out = Poly::one();
        for _ in 0..k {
            out = out.mul(self);
        }
        out
    }

    /// Whether `self^k` stays within the expansion budget.
    fn can_expand(&self, k: u32) -> bool {
        if self.terms.len() <= 1 {
            return true;
        }
        let mut estimate: usize = 1;
        for _ in 0..k {
            estimate = estimate.saturating_mul(self.terms.len());
            if estimate > MAX_EXPANDED_TERMS {
                return false;
            }
        }
        true
    }

    /// Rebuild an expression, highest-growth terms first.
    pub fn to_expr(&self) -> Expr {
        let mut terms: Vec<(&Monomial, &Rational)> = self.terms.iter().collect();
        terms.sort_by(|(ma, _), (mb, _)| {
            (Reverse(display_rank(ma)), *ma).cmp(&(Reverse(display_rank(mb)), *mb))
        });
        Expr::add_all(
            terms
                .into_iter()
                .map(|(m, c)| term_to_expr(m, c))
                .collect(),
        )
    }

    /// Convert an expression into normal form.
    pub fn from_expr(expr: &Expr) -> Poly {
        match expr {
            Expr::Num(r) => Poly::constant(r.clone()),
            Expr::Var(_) | Expr::Prob(_) | Expr::Cost(_) | Expr::Opaque(_) => {
                Poly::atom(expr.clone(), 1)
            }
            Expr::Apply(name, args) => Poly::atom(
                Expr::Apply(name.clone(), args.iter().map(crate::simplify).collect()),
                1,
            ),
            Expr::Add(terms) => terms
                .iter()
                .fold(Poly::zero(), |acc, t| acc.add(&Poly::from_expr(t))),
            Expr::Mul(factors) => factors
                .iter()
                .fold(Poly::one(), |acc, f| acc.mul(&Poly::from_expr(f))),
            Expr::Pow(base, exp) => pow_poly(base, exp),
            Expr::Log(arg) => log_poly(&crate::simplify(arg)),
            Expr::Sum(body, bounds) => Poly::atom(
                Expr::Sum(
                    Box::new(crate::simplify(body)),
                    bounds
                        .iter()
                        .map(|b| {
                            Bound::new(
                                b.var.clone(),
                                crate::simplify(&b.lower),
                                crate::simplify(&b.upper),
                            )
                        })
                        .collect(),
                ),
                1,
            ),
        }
    }
}

fn mul_monomials(a: &Monomial, b: &Monomial) -> Monomial {
    let mut merged: BTreeMap<Expr, i64> = a.iter().cloned().collect();
    for (atom, exp) in b {
        *merged.entry(atom.clone()).or_insert(0) += exp;
    }
    merged.into_iter().filter(|(_, e)| *e != 0).collect()
}

fn term_to_expr(monomial: &Monomial, coeff: &Rational) -> Expr {
    let mut factors: Vec<Expr> = Vec::with_capacity(monomial.len() + 1);
    if !coeff.is_one() || monomial.is_empty() {
        factors.push(Expr::Num(coeff.clone()));
    }
    for (atom, exp) in monomial {
        if *exp == 1 {
            factors.push(atom.clone());
        } else {
            factors.push(Expr::powi(atom.clone(), *exp));
        }
    }
    Expr::mul_all(factors)
}

/// Ordering key used only for presentation: exponential, then polynomial,
/// then logarithmic weight of the free variables in a monomial.
fn display_rank(monomial: &Monomial) -> (i64, i64, i64) {
    let mut exp = 0;
    let mut degree = 0;
    let mut logs = 0;
    for (atom, k) in monomial {
        match atom {
            Expr::Var(_) => degree += k,
            Expr::Log(arg) if !arg.free_vars().is_empty() => logs += k,
            Expr::Pow(base, e) if base.as_rational().is_some() && !e.free_vars().is_empty() => {
                exp += k;
            }
            _ => {}
        }
    }
    (exp, degree, logs)
}

// Powers

fn pow_poly(base: &Expr, exp: &Expr) -> Poly {
    let exp = crate::simplify(exp);
    let base = crate::simplify(base);

    if let Some(k) = exp.as_integer() {
        return integral_power(&base, k);
    }
    if let Expr::Num(c) = &base {
        return exponential(c, &exp);
    }
    Poly::atom(Expr::pow(base, exp), 1)
}

fn integral_power(base: &Expr, k: i64) -> Poly {
    if k == 0 {
        return Poly::one();
    }
    let pb = Poly::from_expr(base);
    if k > 0 {
        if let Ok(k32) = u32::try_from(k) {
            if pb.can_expand(k32) {
                return pb.pow(k32);
            }
        }
        return Poly::atom(base.clone(), k);
    }

    // Negative power: invert a single term, otherwise keep the base as an atom.
    let Some((monomial, coeff)) = pb.single_term() else {
        if pb.is_zero() {
            return Poly::atom(Expr::powi(Expr::zero(), k), 1);
        }
        return Poly::atom(base.clone(), k);
    };
    let mut out = Poly::constant(rational_powi(coeff, k));
    for (atom, e) in monomial {
        let new_exp = e * k;
        let factor = match atom {
            Expr::Add(_) if new_exp > 0 => integral_power(atom, new_exp),
            _ => Poly::atom(atom.clone(), new_exp),
        };
        out = out.mul(&factor);
    }
    out
}

/// `c^exp` for a constant base and non-integral exponent.
fn exponential(c: &Rational, exp: &Expr) -> Poly {
    if c.is_zero() || c.is_one() {
        return Poly::constant(c.clone());
    }
    let pe = Poly::from_expr(exp);
    let k0 = pe.constant_term();
    let (scale, rest) = if k0.is_integer() {
        let k = k0.to_integer().to_i64().unwrap_or(0);
        (rational_powi(c, k), pe.sub(&Poly::constant(Rational::from_integer(BigInt::from(k)))))
    } else {
        (Rational::one(), pe)
    };

    if rest.is_zero() {
        return Poly::constant(scale);
    }

    // 2^{m log x} = x^m
    if c == &Rational::from_integer(BigInt::from(2)) {
        if let Some((monomial, m)) = rest.single_term() {
            if let ([(Expr::Log(x), 1)], true) = (monomial.as_slice(), m.is_integer()) {
                if let Some(m) = m.to_integer().to_i64() {
                    return integral_power(x, m).scale(&scale);
                }
            }
        }
    }

    Poly::atom(Expr::pow(Expr::Num(c.clone()), rest.to_expr()), 1).scale(&scale)
}

pub(crate) fn rational_powi(r: &Rational, k: i64) -> Rational {
    if k < 0 {
        if r.is_zero() {
            return Rational::zero();
        }
        return rational_powi(&r.recip(), -k);
    }
    let mut out = Rational::one();
    for _ in 0..k {
        out *= r;
    }
    out
}

// Logarithms

fn log_poly(arg: &Expr) -> Poly {
    let pa = Poly::from_expr(arg);
    let Some((monomial, coeff)) = pa.single_term() else {
        return Poly::atom(Expr::log(arg.clone()), 1);
    };
    if !coeff.is_positive() {
        return Poly::atom(Expr::log(arg.clone()), 1);
    }
    let mut out = log_constant(coeff);
    for (atom, k) in monomial {
        let log_atom = match atom {
            Expr::Pow(base, e) => match base.as_rational() {
                Some(c) if c.is_positive() => Poly::from_expr(e).mul(&log_constant(c)),
                _ => Poly::atom(Expr::log(atom.clone()), 1),
            },
            _ => Poly::atom(Expr::log(atom.clone()), 1),
        };
        out = out.add(&log_atom.scale(&Rational::from_integer(BigInt::from(*k))));
    }
    out
}

/// `log₂ c` exactly when `c` is a power of two, else an opaque `log₂ c` atom.
fn log_constant(c: &Rational) -> Poly {
    if c.is_one() {
        return Poly::zero();
    }
    match exact_log2(c) {
        Some(k) => Poly::constant(Rational::from_integer(BigInt::from(k))),
        None => Poly::atom(Expr::log(Expr::Num(c.clone())), 1),
    }
}

/// `k` with `2^k = c`, for positive rationals.
pub fn exact_log2(c: &Rational) -> Option<i64> {
    if !c.is_positive() {
        return None;
    }
    let numer = c.numer();
    let denom = c.denom();
    if denom.is_one() {
        power_of_two(numer)
    } else if numer.is_one() {
        power_of_two(denom).map(|k| -k)
    } else {
        None
    }
}

fn power_of_two(n: &BigInt) -> Option<i64> {
    let bits = n.bits();
    if bits == 0 || !n.is_positive() {
        return None;
    }
    let candidate = BigInt::one() << (bits - 1);
    if &candidate == n {
        i64::try_from(bits - 1).ok()
    } else {
        None
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests;
