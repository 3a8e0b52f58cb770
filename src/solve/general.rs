//! Strategies for categories without a dedicated symbolic path: systems and
//! word problems get honest placeholders, `other` problems get a best-effort
//! expression simplification.

use tracing::debug;

use super::equation::{math_prefix, math_suffix};
use crate::error::SolveError;
use crate::model::{ParsedProblem, Solution, SolutionStep, SolutionValue};
use crate::symbolic::{parse_expression, simplify, Expr};

/// Placeholder for `system`-category problems.
pub(crate) fn solve_system(problem: &ParsedProblem) -> Solution {
    Solution {
        result: SolutionValue::Text(
            "Systems of equations are not solved automatically yet.".to_string(),
        ),
        steps: vec![SolutionStep::new(
            1,
            "Identify the system of equations",
            None,
            format!(
                "The problem states a system: {}. Solve the equations simultaneously by substitution or elimination.",
                problem.statement.trim()
            ),
        )],
        confidence: 0.5,
        method: "solve_system".to_string(),
        verified: false,
    }
}

/// Placeholder for `word_problem`-category problems.
pub(crate) fn solve_word_problem(problem: &ParsedProblem) -> Solution {
    Solution {
        result: SolutionValue::Text(
            "This word problem requires multi-step reasoning beyond the automated strategies."
                .to_string(),
        ),
        steps: vec![SolutionStep::new(
            1,
            "Restate the problem",
            None,
            format!(
                "{} — translate the narrative into equations, then solve them.",
                problem.statement.trim()
            ),
        )],
        confidence: 0.3,
        method: "word_analysis".to_string(),
        verified: false,
    }
}

/// `other`-category problems: find an expression in the statement and
/// simplify it. Plain arithmetic ("What is 2 + 2?") lands here.
pub(crate) fn solve_other(problem: &ParsedProblem) -> Result<Solution, SolveError> {
    let Some((expr, text)) = extract_expression(&problem.statement) else {
        return Ok(passthrough(problem));
    };

    let simplified = simplify(&expr);
    debug!(input = %text, output = %simplified, "simplified expression");

    let result = match simplified {
        Expr::Num(n) => SolutionValue::Number(n),
        ref other => SolutionValue::Text(other.to_string()),
    };

    Ok(Solution {
        result,
        steps: vec![
            SolutionStep::new(
                1,
                "Extract the expression",
                Some(text),
                "Taken from the problem statement.",
            ),
            SolutionStep::new(
                2,
                "Simplify",
                Some(simplified.to_string()),
                "Combine like terms and fold constants.",
            ),
        ],
        confidence: 0.7,
        method: "simplify".to_string(),
        verified: true,
    })
}

/// First run of math tokens in the statement that parses as an expression.
fn extract_expression(statement: &str) -> Option<(Expr, String)> {
    for line in statement.lines() {
        // trim prose off both ends, keep the math run in the middle
        let candidate = math_prefix(&math_suffix(line));
        if candidate.is_empty() {
            continue;
        }
        if let Ok(expr) = parse_expression(&candidate) {
            return Some((expr, candidate));
        }
    }
    None
}

/// Nothing recognizable: echo the statement back at low confidence instead
/// of failing the run.
fn passthrough(problem: &ParsedProblem) -> Solution {
    Solution {
        result: SolutionValue::Text(problem.statement.trim().to_string()),
        steps: vec![SolutionStep::new(
            1,
            "No automated strategy applies",
            None,
            "The statement contains no expression the solver recognizes; returning it unchanged.",
        )],
        confidence: 0.2,
        method: "passthrough".to_string(),
        verified: false,
    }
}
