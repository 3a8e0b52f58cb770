//! Equation solving: extract `lhs = rhs` from the statement, solve
//! symbolically, verify each root by substitution.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::error::SolveError;
use crate::model::{ParsedProblem, Solution, SolutionStep, SolutionValue};
use crate::symbolic::{parse_expression, simplify, solve_equation, Expr};

const VERIFY_TOL: f64 = 1e-10;

/// Multi-letter alphabetic word that is not a function name: prose, not math.
static RE_PROSE_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z]{2,}$").unwrap());

fn is_prose(token: &str) -> bool {
    // "x:" in "Solve for x: …" is a label, not part of the equation
    if token.ends_with(':') {
        return true;
    }
    let bare = token.trim_matches(|c: char| !c.is_ascii_alphanumeric());
    RE_PROSE_WORD.is_match(bare)
        && !matches!(
            bare.to_ascii_lowercase().as_str(),
            "sin" | "cos" | "exp" | "ln" | "sqrt" | "pi"
        )
}

/// First `lhs = rhs` pair in the statement that parses on both sides.
///
/// Surrounding prose is trimmed off: in `"Solve x^2 + 2x + 1 = 0 for x."`
/// the left side keeps only the trailing math tokens and the right side only
/// the leading ones.
pub(crate) fn find_equation(statement: &str) -> Option<(Expr, Expr, String, String)> {
    for line in statement.lines() {
        let Some((raw_lhs, raw_rhs)) = split_equation(line) else {
            continue;
        };
        let lhs_text = math_suffix(raw_lhs);
        let rhs_text = math_prefix(raw_rhs);
        if lhs_text.is_empty() || rhs_text.is_empty() {
            continue;
        }
        let (Ok(lhs), Ok(rhs)) = (parse_expression(&lhs_text), parse_expression(&rhs_text))
        else {
            debug!(line, "equation candidate failed to parse, skipping");
            continue;
        };
        return Some((lhs, rhs, lhs_text, rhs_text));
    }
    None
}

/// Split a line at its single `=`, rejecting relational operators.
fn split_equation(line: &str) -> Option<(&str, &str)> {
    let pos = line.find('=')?;
    let before = line[..pos].trim_end();
    let after = line[pos + 1..].trim_start();
    if before.is_empty()
        || after.is_empty()
        || before.ends_with(['<', '>', '!', '='])
        || after.starts_with('=')
    {
        return None;
    }
    Some((before, after))
}

/// The trailing run of non-prose tokens ("Solve x^2 + 2x + 1" → "x^2 + 2x + 1").
pub(crate) fn math_suffix(text: &str) -> String {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let start = tokens
        .iter()
        .rposition(|t| is_prose(t))
        .map_or(0, |i| i + 1);
    tokens[start..].join(" ")
}

/// The leading run of non-prose tokens ("0 for x." → "0").
pub(crate) fn math_prefix(text: &str) -> String {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let end = tokens.iter().position(|t| is_prose(t)).unwrap_or(tokens.len());
    tokens[..end]
        .join(" ")
        .trim_end_matches(['.', ',', '?', '!', ';'])
        .trim_end()
        .to_string()
}

/// The variable to solve for: an explicit `solve_for:<v>` ask wins, then a
/// literal `x` if present, then the alphabetically first free variable.
pub(crate) fn pick_variable(problem: &ParsedProblem, lhs: &Expr, rhs: &Expr) -> Option<String> {
    for ask in &problem.asks {
        if let Some(var) = ask.strip_prefix("solve_for:") {
            let var = var.trim();
            if !var.is_empty() {
                return Some(var.to_string());
            }
        }
    }
    let mut vars = lhs.free_variables();
    vars.extend(rhs.free_variables());
    if vars.contains("x") {
        return Some("x".to_string());
    }
    vars.into_iter().next()
}

/// Solve an `equation`-category problem.
pub(crate) fn solve(problem: &ParsedProblem) -> Result<Solution, SolveError> {
    let (lhs, rhs, lhs_text, rhs_text) =
        find_equation(&problem.statement).ok_or(SolveError::NoEquation)?;
    let var = pick_variable(problem, &lhs, &rhs).ok_or(SolveError::NoVariable)?;

    let standard = simplify(&Expr::sub(lhs.clone(), rhs.clone()));
    let roots = solve_equation(&lhs, &rhs, &var)?;

    let verified = !roots.is_empty() && roots.iter().all(|r| check_root(&lhs, &rhs, &var, *r));
    debug!(%var, roots = ?roots, verified, "equation solved");

    let roots_text = if roots.is_empty() {
        "no real solutions".to_string()
    } else {
        roots
            .iter()
            .map(|r| format!("{var} = {r}"))
            .collect::<Vec<_>>()
            .join(", ")
    };

    let steps = vec![
        SolutionStep::new(
            1,
            "State the equation",
            Some(format!("{lhs_text} = {rhs_text}")),
            format!("Solving for {var}."),
        ),
        SolutionStep::new(
            2,
            "Rearrange into standard form",
            Some(format!("{standard} = 0")),
            "Move every term to the left-hand side.",
        ),
        SolutionStep::new(
            3,
            "Solve",
            Some(roots_text.clone()),
            if verified {
                "Each root was checked by substitution into the original equation."
            } else if roots.is_empty() {
                "The discriminant is negative; there are no real roots."
            } else {
                "Substitution check did not confirm every root."
            },
        ),
    ];

    Ok(Solution {
        result: SolutionValue::Numbers(roots),
        steps,
        confidence: 0.9,
        method: "solve_equation".to_string(),
        verified,
    })
}

fn check_root(lhs: &Expr, rhs: &Expr, var: &str, root: f64) -> bool {
    let bindings = HashMap::from([(var.to_string(), root)]);
    match (lhs.eval(&bindings), rhs.eval(&bindings)) {
        (Some(a), Some(b)) => {
            let scale = a.abs().max(b.abs()).max(1.0);
            (a - b).abs() <= VERIFY_TOL * scale
        }
        _ => false,
    }
}
