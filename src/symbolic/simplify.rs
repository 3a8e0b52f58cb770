//! Simplification, polynomial normalization, and equivalence checking.
//!
//! Two equality notions live here:
//!
//! * **Polynomial normalization** — exact, used to canonicalize solvable
//!   forms and to pretty results like `2x + 3x` → `5*x`.
//! * **Numeric sampling** ([`equivalent`]) — evaluates both expressions at
//!   fixed sample points. Verification uses this because it never re-trusts
//!   the forward symbolic path: a wrong antiderivative disagrees with its
//!   integrand numerically no matter how the algebra went wrong.

use super::Expr;
use std::collections::HashMap;

/// Sample points for numeric equivalence. Chosen away from 0 and ±1 where
/// many wrong expressions coincidentally agree, and irrational-ish so
/// periodic functions do not line up by accident.
const SAMPLE_POINTS: [f64; 7] = [-2.71, -1.37, -0.53, 0.49, 1.31, 2.17, 3.89];

/// Relative tolerance for numeric comparisons.
const REL_TOL: f64 = 1e-8;

/// Round away float noise: 12 decimal places, `-0.0` normalized to `0.0`.
pub fn round_clean(v: f64) -> f64 {
    let r = (v * 1e12).round() / 1e12;
    if r == 0.0 {
        0.0
    } else {
        r
    }
}

/// Coefficients of `expr` as a polynomial in `var`, lowest degree first.
///
/// `None` when the expression is not a polynomial in `var` (other
/// variables, function calls, division by a non-constant, fractional or
/// large exponents).
pub fn poly_coefficients(expr: &Expr, var: &str) -> Option<Vec<f64>> {
    const MAX_DEGREE: usize = 16;
    let coeffs = match expr {
        Expr::Num(c) => vec![*c],
        Expr::Var(name) => {
            if name == var {
                vec![0.0, 1.0]
            } else {
                return None;
            }
        }
        Expr::Add(a, b) => add_coeffs(
            &poly_coefficients(a, var)?,
            &poly_coefficients(b, var)?,
            1.0,
        ),
        Expr::Sub(a, b) => add_coeffs(
            &poly_coefficients(a, var)?,
            &poly_coefficients(b, var)?,
            -1.0,
        ),
        Expr::Neg(a) => poly_coefficients(a, var)?.iter().map(|c| -c).collect(),
        Expr::Mul(a, b) => convolve(&poly_coefficients(a, var)?, &poly_coefficients(b, var)?),
        Expr::Div(a, b) => {
            let denom = poly_coefficients(b, var)?;
            let denom = trim(denom);
            if denom.len() != 1 || denom[0] == 0.0 {
                return None;
            }
            poly_coefficients(a, var)?
                .iter()
                .map(|c| c / denom[0])
                .collect()
        }
        Expr::Pow(base, exponent) => {
            let n = match &**exponent {
                Expr::Num(n) if n.fract() == 0.0 && *n >= 0.0 && *n <= MAX_DEGREE as f64 => {
                    *n as usize
                }
                _ => return None,
            };
            let base = poly_coefficients(base, var)?;
            let mut acc = vec![1.0];
            for _ in 0..n {
                acc = convolve(&acc, &base);
            }
            acc
        }
        Expr::Call(..) => return None,
    };
    if coeffs.len() > MAX_DEGREE + 1 {
        return None;
    }
    Some(trim(coeffs))
}

fn add_coeffs(a: &[f64], b: &[f64], sign: f64) -> Vec<f64> {
    let mut out = vec![0.0; a.len().max(b.len())];
    for (i, c) in a.iter().enumerate() {
        out[i] += c;
    }
    for (i, c) in b.iter().enumerate() {
        out[i] += sign * c;
    }
    out
}

fn convolve(a: &[f64], b: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, x) in a.iter().enumerate() {
        for (j, y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}

fn trim(mut coeffs: Vec<f64>) -> Vec<f64> {
    while coeffs.len() > 1 && coeffs.last().is_some_and(|c| c.abs() < 1e-12) {
        coeffs.pop();
    }
    coeffs
}

/// Rebuild a polynomial expression from coefficients, highest degree first.
pub fn expr_from_coefficients(coeffs: &[f64], var: &str) -> Expr {
    let mut acc: Option<Expr> = None;
    for (degree, &c) in coeffs.iter().enumerate().rev() {
        let c = round_clean(c);
        if c == 0.0 {
            continue;
        }
        let magnitude = monomial(c.abs(), degree, var);
        acc = Some(match acc {
            None => {
                if c < 0.0 {
                    Expr::neg(magnitude)
                } else {
                    magnitude
                }
            }
            Some(prev) => {
                if c < 0.0 {
                    Expr::sub(prev, magnitude)
                } else {
                    Expr::add(prev, magnitude)
                }
            }
        });
    }
    acc.unwrap_or(Expr::Num(0.0))
}

fn monomial(c: f64, degree: usize, var: &str) -> Expr {
    let power = match degree {
        0 => return Expr::num(c),
        1 => Expr::var(var),
        d => Expr::pow(Expr::var(var), Expr::num(d as f64)),
    };
    if (c - 1.0).abs() < 1e-12 {
        power
    } else {
        Expr::mul(Expr::num(c), power)
    }
}

/// Simplify an expression.
///
/// Single-variable polynomials are normalized to canonical descending form;
/// constant expressions fold to a number; everything else gets recursive
/// identity/constant folding.
pub fn simplify(expr: &Expr) -> Expr {
    let vars = expr.free_variables();
    if vars.is_empty() {
        if let Some(v) = expr.eval(&HashMap::new()) {
            return Expr::num(round_clean(v));
        }
    }
    if vars.len() == 1 {
        let var = vars.iter().next().expect("one variable");
        if let Some(coeffs) = poly_coefficients(expr, var) {
            return expr_from_coefficients(&coeffs, var);
        }
    }
    fold(expr)
}

fn fold(expr: &Expr) -> Expr {
    match expr {
        Expr::Num(_) | Expr::Var(_) => expr.clone(),
        Expr::Add(a, b) => match (fold(a), fold(b)) {
            (Expr::Num(x), Expr::Num(y)) => Expr::num(round_clean(x + y)),
            (Expr::Num(z), rhs) if z == 0.0 => rhs,
            (lhs, Expr::Num(z)) if z == 0.0 => lhs,
            (lhs, rhs) => Expr::add(lhs, rhs),
        },
        Expr::Sub(a, b) => match (fold(a), fold(b)) {
            (Expr::Num(x), Expr::Num(y)) => Expr::num(round_clean(x - y)),
            (lhs, Expr::Num(z)) if z == 0.0 => lhs,
            (Expr::Num(z), rhs) if z == 0.0 => Expr::neg(rhs),
            (lhs, rhs) => Expr::sub(lhs, rhs),
        },
        Expr::Mul(a, b) => match (fold(a), fold(b)) {
            (Expr::Num(x), Expr::Num(y)) => Expr::num(round_clean(x * y)),
            (Expr::Num(z), _) | (_, Expr::Num(z)) if z == 0.0 => Expr::num(0.0),
            (Expr::Num(one), rhs) if one == 1.0 => rhs,
            (lhs, Expr::Num(one)) if one == 1.0 => lhs,
            (lhs, rhs) => Expr::mul(lhs, rhs),
        },
        Expr::Div(a, b) => match (fold(a), fold(b)) {
            (Expr::Num(x), Expr::Num(y)) if y != 0.0 => Expr::num(round_clean(x / y)),
            (lhs, Expr::Num(one)) if one == 1.0 => lhs,
            (Expr::Num(z), rhs) if z == 0.0 && !matches!(rhs, Expr::Num(_)) => Expr::num(0.0),
            (lhs, rhs) => Expr::div(lhs, rhs),
        },
        Expr::Pow(a, b) => match (fold(a), fold(b)) {
            (Expr::Num(x), Expr::Num(y)) => {
                let v = x.powf(y);
                if v.is_finite() {
                    Expr::num(round_clean(v))
                } else {
                    Expr::pow(Expr::num(x), Expr::num(y))
                }
            }
            (lhs, Expr::Num(one)) if one == 1.0 => lhs,
            (_, Expr::Num(z)) if z == 0.0 => Expr::num(1.0),
            (lhs, rhs) => Expr::pow(lhs, rhs),
        },
        Expr::Neg(a) => match fold(a) {
            Expr::Num(x) => Expr::num(round_clean(-x)),
            Expr::Neg(inner) => *inner,
            inner => Expr::neg(inner),
        },
        Expr::Call(func, a) => {
            let inner = fold(a);
            if let Expr::Num(_) = inner {
                let candidate = Expr::call(*func, inner.clone());
                if let Some(v) = candidate.eval(&HashMap::new()) {
                    return Expr::num(round_clean(v));
                }
                return candidate;
            }
            Expr::call(*func, inner)
        }
    }
}

/// Whether two expressions agree numerically at the sample points.
///
/// Each variable gets a distinct offset from the shared sample value so
/// symmetric mistakes (swapped variables) are caught. Points where either
/// side is undefined are skipped; at least three comparable points are
/// required before claiming equivalence.
pub fn equivalent(a: &Expr, b: &Expr) -> bool {
    if a == b {
        return true;
    }
    let mut vars = a.free_variables();
    vars.extend(b.free_variables());
    let vars: Vec<String> = vars.into_iter().collect();

    if vars.is_empty() {
        return match (a.eval(&HashMap::new()), b.eval(&HashMap::new())) {
            (Some(x), Some(y)) => close(x, y),
            _ => false,
        };
    }

    let mut compared = 0;
    for (trial, s) in SAMPLE_POINTS.iter().enumerate() {
        let bindings: HashMap<String, f64> = vars
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), s + 0.37 * (i as f64 + trial as f64 * 0.11)))
            .collect();
        match (a.eval(&bindings), b.eval(&bindings)) {
            (Some(x), Some(y)) => {
                if !close(x, y) {
                    return false;
                }
                compared += 1;
            }
            _ => continue,
        }
    }
    compared >= 3
}

/// Whether the expression is numerically zero at the sample points.
pub fn is_zero(expr: &Expr) -> bool {
    equivalent(expr, &Expr::num(0.0))
}

fn close(x: f64, y: f64) -> bool {
    (x - y).abs() <= REL_TOL * (1.0 + x.abs().max(y.abs()))
}
