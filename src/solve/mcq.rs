//! Multiple-choice solving.
//!
//! Three branches in priority order:
//!
//! 1. **Numeral literacy** — the statement spells a number out in words
//!    ("sixty-three thousand and forty") and an option carries the matching
//!    numeral. Solved deterministically, no model call.
//! 2. **Triangle height/base** — a geometry question the general prompt
//!    handles poorly; uses a dedicated two-line `ANSWER:`/`REASONING:`
//!    contract with a perpendicular-segment heuristic as the net.
//! 3. **General reasoning** — one strict-JSON reasoning-model call; any
//!    failure degrades to the first option at low confidence rather than
//!    erroring out.
//!
//! Every branch produces a [`McqOutcome`]; the only domain error is an empty
//! option list, which the structuring stage's invariant should have ruled
//! out already.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::client::{ChatClient, ChatRequest};
use crate::config::PipelineConfig;
use crate::error::SolveError;
use crate::model::{
    option_body, option_letter, McqOutcome, ParsedProblem, Solution, SolutionStep, SolutionValue,
};
use crate::prompts;
use crate::solve::words::find_spelled_number;

/// Triangle label such as `triangle ABD`.
static RE_TRIANGLE_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)triangle\s+([A-Z]{3})\b").unwrap());

/// First JSON object in a reply, fences and surrounding chatter tolerated.
static RE_JSON_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

pub(crate) async fn solve(
    problem: &ParsedProblem,
    reasoning: &dyn ChatClient,
    config: &PipelineConfig,
) -> Result<Solution, SolveError> {
    if problem.options.is_empty() {
        return Err(SolveError::NoOptions);
    }

    if let Some(target) = find_spelled_number(&problem.statement) {
        if let Some(solution) = match_numeral(problem, target) {
            return Ok(solution);
        }
        debug!(target, "spelled number has no matching option, deferring to reasoning model");
    }

    if is_triangle_height_question(&problem.statement) {
        return Ok(solve_geometry(problem, reasoning, config).await);
    }

    Ok(solve_general(problem, reasoning, config).await)
}

// ── Branch 1: numeral literacy ───────────────────────────────────────────

/// Digits of an option body with grouping separators removed: the longest
/// contiguous digit run in `"63,040"` or `"63 040"` is `63040`.
fn option_numeral(option: &str) -> Option<i64> {
    let compact: String = option_body(option)
        .chars()
        .filter(|c| *c != ',' && *c != ' ')
        .collect();
    let mut best: &str = "";
    let mut start = None;
    for (i, c) in compact.char_indices() {
        if c.is_ascii_digit() {
            start.get_or_insert(i);
        } else if let Some(s) = start.take() {
            if i - s > best.len() {
                best = &compact[s..i];
            }
        }
    }
    if let Some(s) = start {
        if compact.len() - s > best.len() {
            best = &compact[s..];
        }
    }
    best.parse().ok()
}

fn match_numeral(problem: &ParsedProblem, target: i64) -> Option<Solution> {
    let matches: Vec<&String> = problem
        .options
        .iter()
        .filter(|opt| option_numeral(opt) == Some(target))
        .collect();
    let chosen = *matches.first()?;
    if matches.len() > 1 {
        warn!(target, count = matches.len(), "multiple options match the spelled number, taking the first");
    }

    let steps = vec![
        SolutionStep::new(
            1,
            "Read the number written in words",
            Some(target.to_string()),
            "The statement spells the target number out in words.",
        ),
        SolutionStep::new(
            2,
            "Match it against the options",
            Some(chosen.clone()),
            format!("Option {} carries the numeral {target}.", option_letter(chosen).unwrap_or_default()),
        ),
    ];

    Some(Solution {
        result: SolutionValue::MultipleChoice(McqOutcome::new(
            chosen.clone(),
            problem.options.clone(),
            format!("The words in the question name the number {target}, which matches this option exactly."),
        )),
        steps,
        confidence: 0.9,
        method: "mcq_numeral".to_string(),
        verified: true,
    })
}

// ── Branch 2: triangle height/base ───────────────────────────────────────

fn is_triangle_height_question(statement: &str) -> bool {
    let lower = statement.to_ascii_lowercase();
    lower.contains("triangle") && (lower.contains("height") || lower.contains("base"))
}

async fn solve_geometry(
    problem: &ParsedProblem,
    reasoning: &dyn ChatClient,
    config: &PipelineConfig,
) -> Solution {
    let request = ChatRequest {
        system: None,
        user_text: prompts::geometry_mcq_prompt(&problem.statement, &problem.options),
        image: None,
        temperature: config.reasoning_temperature,
        max_tokens: config.reasoning_max_tokens,
    };

    match reasoning.chat(request).await {
        Ok(reply) => match parse_answer_reasoning(&reply, problem) {
            Some((option, explanation)) => Solution {
                result: SolutionValue::MultipleChoice(McqOutcome::new(
                    option.clone(),
                    problem.options.clone(),
                    explanation.clone(),
                )),
                steps: vec![
                    SolutionStep::new(
                        1,
                        "Identify the perpendicular segment",
                        Some(option),
                        explanation,
                    ),
                ],
                confidence: 0.7,
                method: "mcq_geometry".to_string(),
                verified: false,
            },
            None => {
                warn!("geometry reply did not follow the two-line contract, using heuristic");
                perpendicular_heuristic(problem)
            }
        },
        Err(e) => {
            warn!(error = %e, "geometry reasoning call failed, using heuristic");
            perpendicular_heuristic(problem)
        }
    }
}

/// Parse the strict `ANSWER:` / `REASONING:` two-line reply. The answer must
/// be a single letter matching an existing option tag.
fn parse_answer_reasoning(reply: &str, problem: &ParsedProblem) -> Option<(String, String)> {
    let mut answer = None;
    let mut reason = None;
    for line in reply.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("ANSWER:") {
            answer = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("REASONING:") {
            reason = Some(rest.trim().to_string());
        }
    }
    let answer = answer?;
    if answer.len() != 1 || !answer.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let letter = answer.to_ascii_uppercase();
    let option = problem
        .options
        .iter()
        .find(|opt| option_letter(opt).as_deref() == Some(letter.as_str()))?;
    Some((
        option.clone(),
        reason.unwrap_or_else(|| "Identified as the height of the triangle.".to_string()),
    ))
}

/// Best-effort fallback: in `triangle ABD`, a segment naming a vertex
/// outside the label (`BE`) is the drawn altitude foot, so prefer an option
/// containing a letter that is not one of the triangle's vertices.
fn perpendicular_heuristic(problem: &ParsedProblem) -> Solution {
    let label: Vec<char> = RE_TRIANGLE_LABEL
        .captures(&problem.statement)
        .map(|c| c[1].to_ascii_uppercase().chars().collect())
        .unwrap_or_default();

    let chosen = problem
        .options
        .iter()
        .find(|opt| {
            let body = option_body(opt);
            let letters: Vec<char> = body
                .chars()
                .filter(|c| c.is_ascii_uppercase())
                .collect();
            !label.is_empty()
                && letters.len() >= 2
                && letters.iter().any(|c| !label.contains(c))
        })
        .or_else(|| problem.options.first())
        .cloned()
        .unwrap_or_default();

    Solution {
        result: SolutionValue::MultipleChoice(McqOutcome::new(
            chosen.clone(),
            problem.options.clone(),
            "Chosen because it names a segment reaching a point outside the triangle's vertices, which is where a drawn altitude lands.",
        )),
        steps: vec![SolutionStep::new(
            1,
            "Apply the altitude heuristic",
            Some(chosen),
            "A height is perpendicular to its base; the segment to a foot point outside the triangle label is the likeliest altitude.",
        )],
        confidence: 0.4,
        method: "mcq_geometry".to_string(),
        verified: false,
    }
}

// ── Branch 3: general reasoning ──────────────────────────────────────────

/// The strict JSON shape the reasoning prompt instructs.
#[derive(Debug, Deserialize)]
struct McqModelReply {
    answer: String,
    #[serde(default)]
    steps: Vec<String>,
    #[serde(default)]
    explanation: String,
    #[serde(default)]
    confidence: String,
}

fn confidence_value(label: &str) -> f64 {
    match label.trim().to_ascii_lowercase().as_str() {
        "high" => 0.9,
        "medium" => 0.7,
        _ => 0.4,
    }
}

async fn solve_general(
    problem: &ParsedProblem,
    reasoning: &dyn ChatClient,
    config: &PipelineConfig,
) -> Solution {
    let request = ChatRequest {
        system: None,
        user_text: prompts::mcq_reasoning_prompt(&problem.statement, &problem.options),
        image: None,
        temperature: config.reasoning_temperature,
        max_tokens: config.reasoning_max_tokens,
    };

    let reply = match reasoning.chat(request).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!(error = %e, "mcq reasoning call failed, defaulting to the first option");
            return first_option_fallback(problem);
        }
    };

    let Some(parsed) = parse_model_reply(&reply) else {
        warn!("mcq reply was not the instructed JSON, defaulting to the first option");
        return first_option_fallback(problem);
    };

    let letter = parsed.answer.trim().to_ascii_uppercase();
    let Some(option) = problem
        .options
        .iter()
        .find(|opt| option_letter(opt).as_deref() == Some(letter.as_str()))
    else {
        warn!(answer = %parsed.answer, "mcq reply letter matches no option, defaulting to the first option");
        return first_option_fallback(problem);
    };

    let mut steps: Vec<SolutionStep> = parsed
        .steps
        .iter()
        .enumerate()
        .map(|(i, s)| SolutionStep::new(i as u32 + 1, s.clone(), None, ""))
        .collect();
    if steps.is_empty() {
        steps.push(SolutionStep::new(
            1,
            "Select the answer",
            Some(option.clone()),
            parsed.explanation.clone(),
        ));
    }

    Solution {
        result: SolutionValue::MultipleChoice(McqOutcome::new(
            option.clone(),
            problem.options.clone(),
            if parsed.explanation.is_empty() {
                "Selected by the reasoning model.".to_string()
            } else {
                parsed.explanation
            },
        )),
        steps,
        confidence: confidence_value(&parsed.confidence),
        method: "mcq_reasoning".to_string(),
        verified: false,
    }
}

fn parse_model_reply(reply: &str) -> Option<McqModelReply> {
    let stripped = reply
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    let json = RE_JSON_OBJECT.find(stripped)?.as_str();
    serde_json::from_str(json).ok()
}

fn first_option_fallback(problem: &ParsedProblem) -> Solution {
    let chosen = problem.options.first().cloned().unwrap_or_default();
    Solution {
        result: SolutionValue::MultipleChoice(McqOutcome::new(
            chosen.clone(),
            problem.options.clone(),
            "Automated analysis was inconclusive; defaulting to the first option.",
        )),
        steps: vec![SolutionStep::new(
            1,
            "Default to the first option",
            Some(chosen),
            "The reasoning service did not produce a usable answer.",
        )],
        confidence: 0.3,
        method: "mcq_reasoning".to_string(),
        verified: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientError;
    use crate::model::ProblemCategory;
    use futures::future::BoxFuture;
    use std::collections::BTreeSet;

    struct Scripted(Result<String, ClientError>);

    impl ChatClient for Scripted {
        fn chat(&self, _request: ChatRequest) -> BoxFuture<'_, Result<String, ClientError>> {
            let out = self.0.clone();
            Box::pin(async move { out })
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn mcq(statement: &str, options: &[&str]) -> ParsedProblem {
        ParsedProblem {
            category: ProblemCategory::MultipleChoice,
            statement: statement.to_string(),
            asks: vec!["select_option".to_string()],
            options: options.iter().map(|s| s.to_string()).collect(),
            variables: BTreeSet::new(),
        }
    }

    fn config() -> PipelineConfig {
        PipelineConfig::default()
    }

    #[tokio::test]
    async fn numeral_literacy_matches_grouped_digits() {
        let p = mcq(
            "Which numeral is sixty-three thousand and forty?",
            &["A) 63,400", "B) 63,040", "C) 6,340", "D) 63,004"],
        );
        let client = Scripted(Ok("unused".into()));
        let s = solve(&p, &client, &config()).await.unwrap();
        assert_eq!(s.method, "mcq_numeral");
        assert!(s.verified);
        assert!((s.confidence - 0.9).abs() < f64::EPSILON);
        match s.result {
            SolutionValue::MultipleChoice(outcome) => {
                assert_eq!(outcome.correct_answer, "B) 63,040");
                assert_eq!(outcome.question_type, "Multiple Choice Question");
            }
            other => panic!("expected MCQ outcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn geometry_accepts_two_line_contract() {
        let p = mcq(
            "In triangle ABD, which segment is the height relative to base AD?",
            &["A) AB", "B) BE", "C) AD", "D) BD"],
        );
        let client = Scripted(Ok("ANSWER: B\nREASONING: BE is perpendicular to AD.".into()));
        let s = solve(&p, &client, &config()).await.unwrap();
        assert_eq!(s.method, "mcq_geometry");
        assert!((s.confidence - 0.7).abs() < f64::EPSILON);
        match s.result {
            SolutionValue::MultipleChoice(outcome) => {
                assert_eq!(outcome.correct_answer, "B) BE");
            }
            other => panic!("expected MCQ outcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn geometry_heuristic_on_client_failure() {
        let p = mcq(
            "In triangle ABD, which segment is the height relative to base AD?",
            &["A) AB", "B) BE", "C) AD", "D) BD"],
        );
        let client = Scripted(Err(ClientError::Timeout { secs: 60 }));
        let s = solve(&p, &client, &config()).await.unwrap();
        assert_eq!(s.method, "mcq_geometry");
        assert!((s.confidence - 0.4).abs() < f64::EPSILON);
        match s.result {
            // E is not a vertex of triangle ABD, so BE is the altitude
            SolutionValue::MultipleChoice(outcome) => {
                assert_eq!(outcome.correct_answer, "B) BE");
            }
            other => panic!("expected MCQ outcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn general_reasoning_parses_strict_json() {
        let p = mcq("What is 2 + 2?", &["A) 3", "B) 4", "C) 5"]);
        let reply = r#"```json
{"answer": "B", "steps": ["Add the numbers", "2 + 2 = 4"], "explanation": "Basic addition.", "confidence": "high"}
```"#;
        let client = Scripted(Ok(reply.into()));
        let s = solve(&p, &client, &config()).await.unwrap();
        assert_eq!(s.method, "mcq_reasoning");
        assert!((s.confidence - 0.9).abs() < f64::EPSILON);
        assert_eq!(s.steps.len(), 2);
        match s.result {
            SolutionValue::MultipleChoice(outcome) => {
                assert_eq!(outcome.correct_answer, "B) 4");
                assert_eq!(outcome.reasoning, "Basic addition.");
            }
            other => panic!("expected MCQ outcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unmatched_letter_falls_back_to_first_option() {
        let p = mcq("Pick one.", &["A) first", "B) second"]);
        let reply = r#"{"answer": "Z", "confidence": "high"}"#;
        let client = Scripted(Ok(reply.into()));
        let s = solve(&p, &client, &config()).await.unwrap();
        assert!((s.confidence - 0.3).abs() < f64::EPSILON);
        match s.result {
            SolutionValue::MultipleChoice(outcome) => {
                assert_eq!(outcome.correct_answer, "A) first");
                assert!(outcome.reasoning.contains("inconclusive"));
            }
            other => panic!("expected MCQ outcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn garbage_reply_falls_back_to_first_option() {
        let p = mcq("Pick one.", &["A) first", "B) second"]);
        let client = Scripted(Ok("I think the answer is probably B.".into()));
        let s = solve(&p, &client, &config()).await.unwrap();
        assert!((s.confidence - 0.3).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn empty_options_is_a_domain_error() {
        let p = mcq("Pick one.", &[]);
        let client = Scripted(Ok("unused".into()));
        assert!(matches!(
            solve(&p, &client, &config()).await,
            Err(SolveError::NoOptions)
        ));
    }

    #[test]
    fn option_numeral_extraction() {
        assert_eq!(option_numeral("B) 63,040"), Some(63_040));
        assert_eq!(option_numeral("A) 63 040"), Some(63_040));
        assert_eq!(option_numeral("C) none"), None);
        assert_eq!(option_numeral("D) 12 apples and 345 pears"), Some(345));
    }
}
