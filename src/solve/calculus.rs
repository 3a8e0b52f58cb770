//! Integral and derivative solving.
//!
//! Both paths verify independently of the forward computation: an
//! antiderivative is differentiated back and compared symbolically against
//! the integrand, a derivative is compared against central finite
//! differences of the original expression.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::equation::math_prefix;
use crate::error::SolveError;
use crate::model::{ParsedProblem, Solution, SolutionStep, SolutionValue};
use crate::symbolic::{
    differentiate, equivalent, integrate, parse_expression, simplify, Expr,
};

const FD_STEP: f64 = 1e-5;
const FD_TOL: f64 = 1e-6;
const FD_POINTS: [f64; 5] = [-1.9, -0.7, 0.4, 1.3, 2.6];

/// Text after an integral marker: `∫ x^2 dx`, `integrate x^2`, etc.
static RE_INTEGRAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:∫|\bintegral of\b|\bintegrate\b|\bantiderivative of\b)\s*(.+)").unwrap()
});

/// Text after a derivative marker: `d/dx of x^2`, `derivative of x^2`.
static RE_DERIVATIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:\bd\s*/\s*d([a-z])\b(?:\s+of\b)?|\bderivative of\b|\bdifferentiate\b)\s*(.+)")
        .unwrap()
});

/// Trailing differential: `dx`, `d x`, optionally after a comma.
static RE_TRAILING_DIFFERENTIAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[,\s]\s*d\s*([a-z])\s*[.?!]?\s*$").unwrap());

/// Trailing "with respect to x" phrase.
static RE_WITH_RESPECT_TO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[,\s]\s*with respect to\s+([a-z])\s*[.?!]?\s*$").unwrap());

/// Pull the operand text and (when stated) the variable out of raw text.
fn operand_and_var(rest: &str) -> (String, Option<String>) {
    let mut text = rest.to_string();
    let mut var = None;
    if let Some(caps) = RE_WITH_RESPECT_TO.captures(&text) {
        var = Some(caps[1].to_ascii_lowercase());
        text.truncate(caps.get(0).map(|m| m.start()).unwrap_or(text.len()));
    }
    if let Some(caps) = RE_TRAILING_DIFFERENTIAL.captures(&text) {
        var = var.or_else(|| Some(caps[1].to_ascii_lowercase()));
        text.truncate(caps.get(0).map(|m| m.start()).unwrap_or(text.len()));
    }
    (math_prefix(&text), var)
}

/// The variable of differentiation/integration, in priority order: stated in
/// the notation, a `solve_for` ask, `x` when free, else the first free
/// variable, else `x`.
fn pick_variable(problem: &ParsedProblem, stated: Option<String>, expr: &Expr) -> String {
    if let Some(v) = stated {
        return v;
    }
    for ask in &problem.asks {
        if let Some(v) = ask.strip_prefix("solve_for:") {
            let v = v.trim();
            if !v.is_empty() {
                return v.to_string();
            }
        }
    }
    let vars = expr.free_variables();
    if vars.contains("x") || vars.is_empty() {
        return "x".to_string();
    }
    vars.into_iter().next().unwrap_or_else(|| "x".to_string())
}

fn parse_operand(statement: &str, re: &Regex) -> Result<(Expr, String, Option<String>), SolveError> {
    for line in statement.lines() {
        let Some(caps) = re.captures(line) else {
            continue;
        };
        let rest = caps
            .get(caps.len() - 1)
            .map(|m| m.as_str())
            .unwrap_or_default();
        let stated = caps.get(1).filter(|_| caps.len() > 2).map(|m| m.as_str().to_ascii_lowercase());
        let (text, var) = operand_and_var(rest);
        if text.is_empty() {
            continue;
        }
        let expr = parse_expression(&text)?;
        return Ok((expr, text, stated.or(var)));
    }
    Err(SolveError::NoExpression)
}

/// Solve an `integral`-category problem.
pub(crate) fn solve_integral(problem: &ParsedProblem) -> Result<Solution, SolveError> {
    let (integrand, text, stated) = parse_operand(&problem.statement, &RE_INTEGRAL)?;
    let var = pick_variable(problem, stated, &integrand);

    let anti = integrate(&integrand, &var).ok_or_else(|| SolveError::Unsupported {
        detail: format!("no antiderivative rule applies to {text}"),
    })?;

    let verified = equivalent(&differentiate(&anti, &var), &integrand);
    debug!(%var, antiderivative = %anti, verified, "integral solved");

    let steps = vec![
        SolutionStep::new(
            1,
            "State the integral",
            Some(format!("∫ {text} d{var}")),
            format!("Integrating with respect to {var}."),
        ),
        SolutionStep::new(
            2,
            "Apply the integration rules term by term",
            Some(format!("{anti} + C")),
            "Power rule for monomials; standard antiderivatives otherwise.",
        ),
        SolutionStep::new(
            3,
            "Verify by differentiating",
            Some(format!("d/d{var}({anti}) = {text}")),
            if verified {
                "Differentiating the result reproduces the integrand."
            } else {
                "Differentiation check did not confirm the result."
            },
        ),
    ];

    Ok(Solution {
        result: SolutionValue::Text(format!("{anti} + C")),
        steps,
        confidence: 0.95,
        method: "integrate".to_string(),
        verified,
    })
}

/// Solve a `derivative`-category problem.
pub(crate) fn solve_derivative(problem: &ParsedProblem) -> Result<Solution, SolveError> {
    let (expr, text, stated) = parse_operand(&problem.statement, &RE_DERIVATIVE)?;
    let var = pick_variable(problem, stated, &expr);

    let derivative = simplify(&differentiate(&expr, &var));
    let verified = check_against_finite_differences(&expr, &derivative, &var);
    debug!(%var, derivative = %derivative, verified, "derivative solved");

    let steps = vec![
        SolutionStep::new(
            1,
            "State the derivative",
            Some(format!("d/d{var}({text})")),
            format!("Differentiating with respect to {var}."),
        ),
        SolutionStep::new(
            2,
            "Apply the differentiation rules",
            Some(derivative.to_string()),
            "Sum, product, chain, and power rules as the expression requires.",
        ),
        SolutionStep::new(
            3,
            "Verify numerically",
            None,
            if verified {
                "The result matches central finite differences at sample points."
            } else {
                "Numeric spot-check did not confirm the result."
            },
        ),
    ];

    Ok(Solution {
        result: SolutionValue::Text(derivative.to_string()),
        steps,
        confidence: 0.95,
        method: "differentiate".to_string(),
        verified,
    })
}

/// Compare a symbolic derivative against `(f(x+h) - f(x-h)) / 2h` at fixed
/// sample points. Requires a single-variable expression; anything else is
/// reported unverified rather than guessed at.
fn check_against_finite_differences(expr: &Expr, derivative: &Expr, var: &str) -> bool {
    let mut vars = expr.free_variables();
    vars.extend(derivative.free_variables());
    if vars.iter().any(|v| v != var) {
        return false;
    }

    let mut checked = 0;
    for point in FD_POINTS {
        let at = |x: f64| expr.eval(&HashMap::from([(var.to_string(), x)]));
        let (Some(hi), Some(lo)) = (at(point + FD_STEP), at(point - FD_STEP)) else {
            continue;
        };
        let Some(symbolic) = derivative.eval(&HashMap::from([(var.to_string(), point)])) else {
            continue;
        };
        let numeric = (hi - lo) / (2.0 * FD_STEP);
        let scale = symbolic.abs().max(numeric.abs()).max(1.0);
        if (symbolic - numeric).abs() > FD_TOL * scale {
            return false;
        }
        checked += 1;
    }
    checked >= 3
}
