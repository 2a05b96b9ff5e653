//! Math markup rendering.
//!
//! Output is the LaTeX subset that [`crate::parse_markup`] reads back:
//! products are written by juxtaposition, function application has no
//! space before the parenthesis, grouping uses `\left( … \right)`.

use num_traits::{One, Signed};

use crate::expr::{Bound, Expr, Rational};

pub fn to_latex(expr: &Expr) -> String {
    let mut out = String::new();
    write_expr(expr, &mut out);
    out
}

fn write_expr(expr: &Expr, out: &mut String) {
    match expr {
        Expr::Num(r) => write_rational(r, out),
        Expr::Var(name) | Expr::Prob(name) => write_name(name, out),
        Expr::Cost(k) => {
            out.push_str("C_{");
            out.push_str(&k.to_string());
            out.push('}');
        }
        Expr::Opaque(k) => {
            out.push_str("\\tau_{");
            out.push_str(&k.to_string());
            out.push('}');
        }
        Expr::Apply(name, args) => {
            write_name(name, out);
            out.push('(');
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_expr(arg, out);
            }
            out.push(')');
        }
        Expr::Add(terms) => write_sum(terms, out),
        Expr::Mul(factors) => write_product(factors, out),
        Expr::Pow(_, exp) if exp.is_negative_term() => write_product(std::slice::from_ref(expr), out),
        Expr::Pow(base, exp) => write_power(base, exp, out),
        Expr::Log(arg) => {
            out.push_str("\\log_{2}(");
            write_expr(arg, out);
            out.push(')');
        }
        Expr::Sum(body, bounds) => write_summation(body, bounds, out),
    }
}

fn write_rational(r: &Rational, out: &mut String) {
    if r.is_integer() {
        out.push_str(&r.numer().to_string());
        return;
    }
    if r.is_negative() {
        out.push('-');
    }
    out.push_str("\\frac{");
    out.push_str(&r.numer().abs().to_string());
    out.push_str("}{");
    out.push_str(&r.denom().to_string());
    out.push('}');
}

/// `p_1` renders as `p_{1}`; the parser joins the subscript back on.
fn write_name(name: &str, out: &mut String) {
    match name.split_once('_') {
        Some((base, sub)) if !base.is_empty() && !sub.is_empty() => {
            out.push_str(base);
            out.push_str("_{");
            out.push_str(sub);
            out.push('}');
        }
        _ => out.push_str(name),
    }
}

fn write_sum(terms: &[Expr], out: &mut String) {
    for (i, term) in terms.iter().enumerate() {
        if i == 0 {
            write_expr(term, out);
        } else if term.is_negative_term() {
            out.push_str(" - ");
            write_expr(&negate(term), out);
        } else {
            out.push_str(" + ");
            write_expr(term, out);
        }
    }
}

fn negate(term: &Expr) -> Expr {
    match term {
        Expr::Num(r) => Expr::Num(-r),
        Expr::Mul(factors) => {
            let mut negated = Vec::with_capacity(factors.len() + 1);
            negated.push(Expr::int(-1));
            negated.extend(factors.iter().cloned());
            Expr::Mul(negated)
        }
        other => -other.clone(),
    }
}

/// Products collect every numeric factor into one coefficient and move
/// negative powers below a fraction bar.
fn write_product(factors: &[Expr], out: &mut String) {
    let mut coeff = Rational::one();
    let mut numer: Vec<String> = Vec::new();
    let mut denom: Vec<String> = Vec::new();

    for factor in factors {
        match factor {
            Expr::Num(r) => coeff *= r,
            Expr::Pow(base, exp) if exp.is_negative_term() => {
                let mut s = String::new();
                let positive = negate(exp);
                if positive.is_one() {
                    write_factor(base, &mut s);
                } else {
                    write_power(base, &positive, &mut s);
                }
                denom.push(s);
            }
            other => {
                let mut s = String::new();
                write_factor(other, &mut s);
                numer.push(s);
            }
        }
    }

    if coeff.is_negative() {
        out.push('-');
        coeff = -coeff;
    }
    if !coeff.numer().is_one() {
        numer.insert(0, coeff.numer().to_string());
    }
    if !coeff.denom().is_one() {
        denom.insert(0, coeff.denom().to_string());
    }

    let numer = if numer.is_empty() {
        "1".to_owned()
    } else {
        numer.join(" ")
    };
    if denom.is_empty() {
        out.push_str(&numer);
    } else {
        out.push_str("\\frac{");
        out.push_str(&numer);
        out.push_str("}{");
        out.push_str(&denom.join(" "));
        out.push('}');
    }
}

fn needs_group(expr: &Expr) -> bool {
    match expr {
        Expr::Add(_) | Expr::Sum(..) => true,
        Expr::Num(r) => r.is_negative(),
        _ => false,
    }
}

fn write_factor(expr: &Expr, out: &mut String) {
    if needs_group(expr) {
        write_group(expr, out);
    } else {
        write_expr(expr, out);
    }
}

fn write_group(expr: &Expr, out: &mut String) {
    out.push_str("\\left(");
    write_expr(expr, out);
    out.push_str("\\right)");
}

fn write_power(base: &Expr, exp: &Expr, out: &mut String) {
    let grouped = match base {
        Expr::Num(r) => r.is_negative() || !r.is_integer(),
        Expr::Var(_) | Expr::Prob(_) | Expr::Cost(_) | Expr::Opaque(_) | Expr::Apply(..) => false,
        _ => true,
    };
    if grouped {
        write_group(base, out);
    } else {
        write_expr(base, out);
    }
    out.push_str("^{");
    write_expr(exp, out);
    out.push('}');
}

fn write_summation(body: &Expr, bounds: &[Bound], out: &mut String) {
    for bound in bounds {
        out.push_str("\\sum_{");
        write_name(&bound.var, out);
        out.push('=');
        write_expr(&bound.lower, out);
        out.push_str("}^{");
        write_expr(&bound.upper, out);
        out.push_str("} ");
    }
    write_factor(body, out);
}

#[cfg(test)]
mod tests;
