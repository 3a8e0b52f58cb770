//! Solving Stage: dispatch a [`ParsedProblem`] to a category strategy.
//!
//! The stage never fails a pipeline run over mathematics. Every strategy
//! either produces a real solution or a typed [`SolveError`], and the
//! dispatcher converts the latter into a zero-confidence error solution so
//! the caller always persists *something* auditable. Only infrastructure
//! failures (handled upstream in [`crate::process`]) are fatal.

use tracing::{debug, info};

use crate::client::ChatClient;
use crate::config::PipelineConfig;
use crate::error::SolveError;
use crate::model::{ParsedProblem, ProblemCategory, Solution, SolutionStep, SolutionValue};

pub(crate) mod calculus;
pub(crate) mod equation;
pub(crate) mod general;
pub(crate) mod mcq;
pub(crate) mod words;

/// Solve a structured problem with the strategy its category selects.
///
/// `reasoning` is only called for multiple-choice problems; the symbolic
/// strategies run entirely locally.
pub async fn solve(
    problem: &ParsedProblem,
    reasoning: &dyn ChatClient,
    config: &PipelineConfig,
) -> Solution {
    info!(category = ?problem.category, "solving problem");

    let outcome = match problem.category {
        ProblemCategory::Equation => equation::solve(problem),
        ProblemCategory::Integral => calculus::solve_integral(problem),
        ProblemCategory::Derivative => calculus::solve_derivative(problem),
        ProblemCategory::System => Ok(general::solve_system(problem)),
        ProblemCategory::WordProblem => Ok(general::solve_word_problem(problem)),
        ProblemCategory::MultipleChoice => mcq::solve(problem, reasoning, config).await,
        ProblemCategory::Other => general::solve_other(problem),
    };

    match outcome {
        Ok(solution) => {
            debug!(
                method = %solution.method,
                confidence = solution.confidence,
                verified = solution.verified,
                "solution produced"
            );
            solution
        }
        Err(e) => {
            info!(error = %e, "solver strategy failed, emitting error solution");
            error_solution(&e)
        }
    }
}

/// Zero-confidence solution recording a domain-level failure.
fn error_solution(error: &SolveError) -> Solution {
    Solution {
        result: SolutionValue::Text(format!("Error: {error}")),
        steps: vec![SolutionStep::new(
            1,
            "Solving failed",
            None,
            error.to_string(),
        )],
        confidence: 0.0,
        method: "error".to_string(),
        verified: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ChatRequest, ClientError};
    use futures::future::BoxFuture;
    use std::collections::BTreeSet;

    struct Unreachable;

    impl ChatClient for Unreachable {
        fn chat(&self, _request: ChatRequest) -> BoxFuture<'_, Result<String, ClientError>> {
            Box::pin(async { panic!("local strategies must not call the reasoning client") })
        }

        fn name(&self) -> &str {
            "unreachable"
        }
    }

    fn problem(category: ProblemCategory, statement: &str) -> ParsedProblem {
        ParsedProblem {
            category,
            statement: statement.to_string(),
            asks: Vec::new(),
            options: Vec::new(),
            variables: BTreeSet::new(),
        }
    }

    #[tokio::test]
    async fn equation_dispatch_is_local() {
        let p = problem(ProblemCategory::Equation, "x^2 - 4 = 0");
        let s = solve(&p, &Unreachable, &PipelineConfig::default()).await;
        assert_eq!(s.result, SolutionValue::Numbers(vec![-2.0, 2.0]));
        assert_eq!(s.method, "solve_equation");
    }

    #[tokio::test]
    async fn domain_failure_becomes_error_solution() {
        let p = problem(ProblemCategory::Equation, "there is no equation here");
        let s = solve(&p, &Unreachable, &PipelineConfig::default()).await;
        assert_eq!(s.method, "error");
        assert!((s.confidence - 0.0).abs() < f64::EPSILON);
        assert!(!s.verified);
        assert_eq!(s.steps.len(), 1);
        match s.result {
            SolutionValue::Text(text) => assert!(text.starts_with("Error:"), "got: {text}"),
            other => panic!("expected text result, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn mcq_without_options_is_an_error_solution() {
        let p = problem(ProblemCategory::MultipleChoice, "Pick one.");
        let s = solve(&p, &Unreachable, &PipelineConfig::default()).await;
        assert_eq!(s.method, "error");
        match s.result {
            SolutionValue::Text(text) => assert!(text.contains("no options"), "got: {text}"),
            other => panic!("expected text result, got {other:?}"),
        }
    }
}
