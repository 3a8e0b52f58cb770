//! Minimal symbolic algebra engine backing the deterministic solvers.
//!
//! This is deliberately not a computer-algebra system: it covers exactly
//! what the solving strategies need — parsing free-form expression text,
//! differentiation, power-rule integration, polynomial normalization, root
//! finding up to quadratics, and numeric-sampling equivalence checks used by
//! verification.
//!
//! ## Data Flow
//!
//! ```text
//! text ──▶ parse ──▶ Expr ──▶ calculus / solve ──▶ Expr / roots
//!                      │
//!                      └─▶ simplify / equivalent (verification)
//! ```

pub mod calculus;
pub mod parse;
pub mod simplify;
pub mod solve;

pub use calculus::{differentiate, integrate};
pub use parse::{parse_expression, ParseError};
pub use simplify::{equivalent, is_zero, poly_coefficients, round_clean, simplify};
pub use solve::{solve_equation, solve_polynomial};

use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Unary functions the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Func {
    Sin,
    Cos,
    Exp,
    Ln,
    Sqrt,
}

impl Func {
    pub fn name(self) -> &'static str {
        match self {
            Func::Sin => "sin",
            Func::Cos => "cos",
            Func::Exp => "exp",
            Func::Ln => "ln",
            Func::Sqrt => "sqrt",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sin" => Some(Func::Sin),
            "cos" => Some(Func::Cos),
            "exp" => Some(Func::Exp),
            "ln" | "log" => Some(Func::Ln),
            "sqrt" => Some(Func::Sqrt),
            _ => None,
        }
    }
}

/// A symbolic expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Num(f64),
    Var(String),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Pow(Box<Expr>, Box<Expr>),
    Neg(Box<Expr>),
    Call(Func, Box<Expr>),
}

impl Expr {
    pub fn num(v: f64) -> Self {
        Expr::Num(v)
    }

    pub fn var(name: impl Into<String>) -> Self {
        Expr::Var(name.into())
    }

    pub fn add(a: Expr, b: Expr) -> Self {
        Expr::Add(Box::new(a), Box::new(b))
    }

    pub fn sub(a: Expr, b: Expr) -> Self {
        Expr::Sub(Box::new(a), Box::new(b))
    }

    pub fn mul(a: Expr, b: Expr) -> Self {
        Expr::Mul(Box::new(a), Box::new(b))
    }

    pub fn div(a: Expr, b: Expr) -> Self {
        Expr::Div(Box::new(a), Box::new(b))
    }

    pub fn pow(a: Expr, b: Expr) -> Self {
        Expr::Pow(Box::new(a), Box::new(b))
    }

    pub fn neg(a: Expr) -> Self {
        Expr::Neg(Box::new(a))
    }

    pub fn call(f: Func, a: Expr) -> Self {
        Expr::Call(f, Box::new(a))
    }

    /// All variable names appearing in the expression, sorted.
    pub fn free_variables(&self) -> BTreeSet<String> {
        let mut vars = BTreeSet::new();
        self.collect_variables(&mut vars);
        vars
    }

    fn collect_variables(&self, vars: &mut BTreeSet<String>) {
        match self {
            Expr::Num(_) => {}
            Expr::Var(name) => {
                vars.insert(name.clone());
            }
            Expr::Add(a, b) | Expr::Sub(a, b) | Expr::Mul(a, b) | Expr::Div(a, b)
            | Expr::Pow(a, b) => {
                a.collect_variables(vars);
                b.collect_variables(vars);
            }
            Expr::Neg(a) | Expr::Call(_, a) => a.collect_variables(vars),
        }
    }

    /// Whether `var` occurs anywhere in the expression.
    pub fn contains_var(&self, var: &str) -> bool {
        match self {
            Expr::Num(_) => false,
            Expr::Var(name) => name == var,
            Expr::Add(a, b) | Expr::Sub(a, b) | Expr::Mul(a, b) | Expr::Div(a, b)
            | Expr::Pow(a, b) => a.contains_var(var) || b.contains_var(var),
            Expr::Neg(a) | Expr::Call(_, a) => a.contains_var(var),
        }
    }

    /// Evaluate numerically with the given variable bindings.
    ///
    /// `None` when a variable is unbound or the value is undefined at the
    /// point (division by zero, log of a non-positive number, …).
    pub fn eval(&self, bindings: &HashMap<String, f64>) -> Option<f64> {
        let v = match self {
            Expr::Num(v) => *v,
            Expr::Var(name) => *bindings.get(name)?,
            Expr::Add(a, b) => a.eval(bindings)? + b.eval(bindings)?,
            Expr::Sub(a, b) => a.eval(bindings)? - b.eval(bindings)?,
            Expr::Mul(a, b) => a.eval(bindings)? * b.eval(bindings)?,
            Expr::Div(a, b) => {
                let denom = b.eval(bindings)?;
                if denom == 0.0 {
                    return None;
                }
                a.eval(bindings)? / denom
            }
            Expr::Pow(a, b) => a.eval(bindings)?.powf(b.eval(bindings)?),
            Expr::Neg(a) => -a.eval(bindings)?,
            Expr::Call(f, a) => {
                let arg = a.eval(bindings)?;
                match f {
                    Func::Sin => arg.sin(),
                    Func::Cos => arg.cos(),
                    Func::Exp => arg.exp(),
                    Func::Ln => {
                        if arg <= 0.0 {
                            return None;
                        }
                        arg.ln()
                    }
                    Func::Sqrt => {
                        if arg < 0.0 {
                            return None;
                        }
                        arg.sqrt()
                    }
                }
            }
        };
        v.is_finite().then_some(v)
    }
}

// ── Display ──────────────────────────────────────────────────────────────

// Operator precedence for parenthesization: additive 1, multiplicative 2,
// power 3, atoms 4. Power is right-associative.
const PREC_ADD: u8 = 1;
const PREC_MUL: u8 = 2;
const PREC_POW: u8 = 3;
const PREC_ATOM: u8 = 4;

fn fmt_num(n: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let rounded = n.round();
    if (n - rounded).abs() < 1e-9 && rounded.abs() < 1e15 {
        // +0.0 so "-0" never prints
        write!(f, "{}", rounded + 0.0)
    } else {
        write!(f, "{n}")
    }
}

impl Expr {
    fn fmt_prec(&self, f: &mut fmt::Formatter<'_>, parent: u8) -> fmt::Result {
        let prec = match self {
            Expr::Num(n) if *n < 0.0 => PREC_MUL,
            Expr::Num(_) | Expr::Var(_) | Expr::Call(..) => PREC_ATOM,
            Expr::Add(..) | Expr::Sub(..) => PREC_ADD,
            Expr::Mul(..) | Expr::Div(..) | Expr::Neg(..) => PREC_MUL,
            Expr::Pow(..) => PREC_POW,
        };
        let parens = prec < parent;
        if parens {
            f.write_str("(")?;
        }
        match self {
            Expr::Num(n) => fmt_num(*n, f)?,
            Expr::Var(name) => f.write_str(name)?,
            Expr::Add(a, b) => {
                a.fmt_prec(f, PREC_ADD)?;
                f.write_str(" + ")?;
                b.fmt_prec(f, PREC_ADD)?;
            }
            Expr::Sub(a, b) => {
                a.fmt_prec(f, PREC_ADD)?;
                f.write_str(" - ")?;
                b.fmt_prec(f, PREC_MUL)?;
            }
            Expr::Mul(a, b) => {
                a.fmt_prec(f, PREC_MUL)?;
                f.write_str("*")?;
                b.fmt_prec(f, PREC_POW)?;
            }
            Expr::Div(a, b) => {
                a.fmt_prec(f, PREC_MUL)?;
                f.write_str("/")?;
                b.fmt_prec(f, PREC_POW)?;
            }
            Expr::Pow(a, b) => {
                a.fmt_prec(f, PREC_ATOM)?;
                f.write_str("^")?;
                b.fmt_prec(f, PREC_POW)?;
            }
            Expr::Neg(a) => {
                f.write_str("-")?;
                a.fmt_prec(f, PREC_POW)?;
            }
            Expr::Call(func, a) => {
                f.write_str(func.name())?;
                f.write_str("(")?;
                a.fmt_prec(f, 0)?;
                f.write_str(")")?;
            }
        }
        if parens {
            f.write_str(")")?;
        }
        Ok(())
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_prec(f, 0)
    }
}
