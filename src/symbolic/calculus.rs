//! Symbolic differentiation and power-rule integration.
//!
//! Differentiation is total over [`Expr`]; integration is partial and
//! returns `None` as soon as the integrand falls outside the supported
//! rules (polynomials, constant multiples, `1/x`, and `sin`/`cos`/`exp` of
//! the bare variable). A partial integrator is preferable to a wrong one:
//! the solving stage reports an honest domain failure instead of emitting
//! an unverifiable antiderivative.

use super::{Expr, Func};

/// Differentiate `expr` with respect to `var`.
///
/// The result is structurally correct but unreduced; callers pass it
/// through [`super::simplify`] or compare via [`super::equivalent`].
pub fn differentiate(expr: &Expr, var: &str) -> Expr {
    match expr {
        Expr::Num(_) => Expr::num(0.0),
        Expr::Var(name) => {
            if name == var {
                Expr::num(1.0)
            } else {
                Expr::num(0.0)
            }
        }
        Expr::Add(a, b) => Expr::add(differentiate(a, var), differentiate(b, var)),
        Expr::Sub(a, b) => Expr::sub(differentiate(a, var), differentiate(b, var)),
        Expr::Mul(a, b) => Expr::add(
            Expr::mul(differentiate(a, var), (**b).clone()),
            Expr::mul((**a).clone(), differentiate(b, var)),
        ),
        Expr::Div(a, b) => Expr::div(
            Expr::sub(
                Expr::mul(differentiate(a, var), (**b).clone()),
                Expr::mul((**a).clone(), differentiate(b, var)),
            ),
            Expr::pow((**b).clone(), Expr::num(2.0)),
        ),
        Expr::Pow(base, exponent) => match (&**base, &**exponent) {
            // power rule with chain: (u^n)' = n * u^(n-1) * u'
            (_, Expr::Num(n)) => Expr::mul(
                Expr::mul(
                    Expr::num(*n),
                    Expr::pow((**base).clone(), Expr::num(n - 1.0)),
                ),
                differentiate(base, var),
            ),
            // exponential with constant base: (a^u)' = a^u * ln(a) * u'
            (Expr::Num(a), _) => Expr::mul(
                Expr::mul(
                    expr.clone(),
                    Expr::num(a.abs().max(f64::MIN_POSITIVE).ln()),
                ),
                differentiate(exponent, var),
            ),
            // general f^g via logarithmic differentiation
            _ => Expr::mul(
                expr.clone(),
                Expr::add(
                    Expr::mul(
                        differentiate(exponent, var),
                        Expr::call(Func::Ln, (**base).clone()),
                    ),
                    Expr::div(
                        Expr::mul((**exponent).clone(), differentiate(base, var)),
                        (**base).clone(),
                    ),
                ),
            ),
        },
        Expr::Neg(a) => Expr::neg(differentiate(a, var)),
        Expr::Call(func, arg) => {
            let inner = differentiate(arg, var);
            let outer = match func {
                Func::Sin => Expr::call(Func::Cos, (**arg).clone()),
                Func::Cos => Expr::neg(Expr::call(Func::Sin, (**arg).clone())),
                Func::Exp => Expr::call(Func::Exp, (**arg).clone()),
                Func::Ln => Expr::div(Expr::num(1.0), (**arg).clone()),
                Func::Sqrt => Expr::div(
                    Expr::num(1.0),
                    Expr::mul(Expr::num(2.0), Expr::call(Func::Sqrt, (**arg).clone())),
                ),
            };
            Expr::mul(outer, inner)
        }
    }
}

/// Integrate `expr` with respect to `var`, without the additive constant.
///
/// `None` when the integrand is outside the supported rules.
pub fn integrate(expr: &Expr, var: &str) -> Option<Expr> {
    // anything constant with respect to var integrates to itself times var
    if !expr.contains_var(var) {
        return Some(Expr::mul(expr.clone(), Expr::var(var)));
    }
    match expr {
        Expr::Var(name) if name == var => Some(Expr::div(
            Expr::pow(Expr::var(var), Expr::num(2.0)),
            Expr::num(2.0),
        )),
        Expr::Add(a, b) => Some(Expr::add(integrate(a, var)?, integrate(b, var)?)),
        Expr::Sub(a, b) => Some(Expr::sub(integrate(a, var)?, integrate(b, var)?)),
        Expr::Neg(a) => Some(Expr::neg(integrate(a, var)?)),
        Expr::Mul(a, b) => {
            if !a.contains_var(var) {
                Some(Expr::mul((**a).clone(), integrate(b, var)?))
            } else if !b.contains_var(var) {
                Some(Expr::mul(integrate(a, var)?, (**b).clone()))
            } else {
                None
            }
        }
        Expr::Div(a, b) => {
            if !b.contains_var(var) {
                Some(Expr::div(integrate(a, var)?, (**b).clone()))
            } else if !a.contains_var(var) && matches!(&**b, Expr::Var(name) if name == var) {
                // c/x → c*ln(x)
                Some(Expr::mul(
                    (**a).clone(),
                    Expr::call(Func::Ln, Expr::var(var)),
                ))
            } else {
                None
            }
        }
        Expr::Pow(base, exponent) => match (&**base, &**exponent) {
            (Expr::Var(name), Expr::Num(n)) if name == var => {
                if (*n + 1.0).abs() < 1e-12 {
                    Some(Expr::call(Func::Ln, Expr::var(var)))
                } else {
                    Some(Expr::div(
                        Expr::pow(Expr::var(var), Expr::num(n + 1.0)),
                        Expr::num(n + 1.0),
                    ))
                }
            }
            _ => None,
        },
        Expr::Call(func, arg) => match (func, &**arg) {
            (Func::Sin, Expr::Var(name)) if name == var => {
                Some(Expr::neg(Expr::call(Func::Cos, Expr::var(var))))
            }
            (Func::Cos, Expr::Var(name)) if name == var => {
                Some(Expr::call(Func::Sin, Expr::var(var)))
            }
            (Func::Exp, Expr::Var(name)) if name == var => {
                Some(Expr::call(Func::Exp, Expr::var(var)))
            }
            _ => None,
        },
        _ => None,
    }
}
