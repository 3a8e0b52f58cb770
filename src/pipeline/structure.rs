//! Structuring Stage: extraction output → typed [`ParsedProblem`].
//!
//! One reasoning-model call per attempt, text-only when extraction was
//! confident, combined text+image when it was not
//! ([`IMAGE_FALLBACK_CONFIDENCE`]). A failed text-only attempt is retried
//! exactly once with the image attached, when one is available; beyond that
//! the stage falls back to the minimal `other`-category problem rather than
//! failing the run.
//!
//! After parsing, [`finalize`] enforces the category/options invariant:
//! `options` is non-empty if and only if the category is multiple-choice,
//! and options carry canonical letter tags in presentation order. Explicit
//! options — enumerated markers (`(1)`, `(2)`, …) or lettered lines in the
//! statement, or an option list in the reply itself — force the
//! multiple-choice category regardless of the model's label.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::client::{ChatClient, ChatRequest, ImageAttachment};
use crate::config::{PipelineConfig, IMAGE_FALLBACK_CONFIDENCE};
use crate::error::StructureError;
use crate::model::{normalize_options, ExtractionResult, ParsedProblem, ProblemCategory};
use crate::prompts;

/// First JSON object in a reply.
static RE_JSON_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

/// Enumerated option marker: `(1)` … `(99)`.
static RE_ENUM_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(\s*\d{1,2}\s*\)").unwrap());

/// A line that is itself a lettered option: `A) 35%`, `(b) 20%`, `C. 3%`.
static RE_OPTION_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*\(?\s*[A-Za-z]\s*[).]\s*\S.*$").unwrap());

/// The JSON shape the structuring prompt instructs. Extra fields the model
/// volunteers (`visual_elements`, `confidence`, …) are ignored.
#[derive(Debug, Deserialize)]
struct RawParsedProblem {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    statement: String,
    #[serde(default)]
    asks: Vec<String>,
    #[serde(default)]
    options: Vec<String>,
    #[serde(default)]
    variables: Vec<String>,
}

/// Structure the extracted text into a typed problem. Never fails: any
/// unrecoverable attempt yields the minimal fallback problem.
pub async fn structure(
    reasoning: &dyn ChatClient,
    extraction: &ExtractionResult,
    image: Option<&ImageAttachment>,
    config: &PipelineConfig,
) -> ParsedProblem {
    let use_image = image.is_some() && extraction.confidence < IMAGE_FALLBACK_CONFIDENCE;
    info!(
        confidence = extraction.confidence,
        with_image = use_image,
        "structuring problem"
    );

    let first = try_structure(reasoning, extraction, image.filter(|_| use_image), config).await;
    match first {
        Ok(problem) => return problem,
        Err(e) => {
            // one retry with the image, if the failed attempt was text-only
            if !use_image && image.is_some() {
                warn!(error = %e, "text-only structuring failed, retrying with image");
                if let Ok(problem) = try_structure(reasoning, extraction, image, config).await {
                    return problem;
                }
            } else {
                warn!(error = %e, "structuring failed");
            }
        }
    }

    info!("structuring fell back to the minimal problem");
    ParsedProblem::fallback(extraction.text.clone())
}

async fn try_structure(
    reasoning: &dyn ChatClient,
    extraction: &ExtractionResult,
    image: Option<&ImageAttachment>,
    config: &PipelineConfig,
) -> Result<ParsedProblem, StructureError> {
    let notation = extraction.notation.as_deref();
    let user_text = match image {
        Some(_) => prompts::combined_structuring_prompt(&extraction.text, notation),
        None => prompts::text_only_structuring_prompt(&extraction.text, notation),
    };

    let reply = reasoning
        .chat(ChatRequest {
            system: Some(prompts::STRUCTURING_SYSTEM_PROMPT.to_string()),
            user_text,
            image: image.cloned(),
            temperature: config.reasoning_temperature,
            max_tokens: config.reasoning_max_tokens,
        })
        .await?;

    let raw = parse_reply(&reply)?;
    Ok(finalize(raw, &extraction.text))
}

/// Extract and deserialize the sole JSON object the prompt demands,
/// tolerating markdown fences and stray prose around it.
fn parse_reply(reply: &str) -> Result<RawParsedProblem, StructureError> {
    let stripped = reply
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    let json = RE_JSON_OBJECT
        .find(stripped)
        .ok_or_else(|| StructureError::MalformedReply {
            detail: "no JSON object in reply".to_string(),
        })?
        .as_str();
    serde_json::from_str(json).map_err(|e| StructureError::MalformedReply {
        detail: e.to_string(),
    })
}

/// Enforce the category/options invariant on a raw model reply.
fn finalize(raw: RawParsedProblem, extraction_text: &str) -> ParsedProblem {
    let statement = if raw.statement.trim().is_empty() {
        extraction_text.to_string()
    } else {
        raw.statement
    };

    let mut category = ProblemCategory::from_label(&raw.kind);
    let mut options = raw.options;

    // explicit options override whatever the model labelled; a single stray
    // entry in the array is not an option set and gets cleared below
    if category != ProblemCategory::MultipleChoice && has_explicit_options(&options, &statement) {
        debug!("explicit options force the multiple-choice category");
        category = ProblemCategory::MultipleChoice;
    }

    if category == ProblemCategory::MultipleChoice {
        if options.is_empty() {
            options = harvest_options(&statement);
        }
        if options.is_empty() {
            debug!("multiple-choice without recoverable options, demoting to other");
            category = ProblemCategory::Other;
        }
    }
    if category != ProblemCategory::MultipleChoice {
        options.clear();
    }
    let options = normalize_options(&options);

    let asks = if raw.asks.is_empty() {
        vec!["solve".to_string()]
    } else {
        raw.asks
    };

    let variables: BTreeSet<String> = raw
        .variables
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();

    ParsedProblem {
        category,
        statement,
        asks,
        options,
        variables,
    }
}

fn has_explicit_options(options: &[String], statement: &str) -> bool {
    options.len() >= 2
        || has_enumerated_markers(statement)
        || RE_OPTION_LINE.find_iter(statement).count() >= 2
}

fn has_enumerated_markers(text: &str) -> bool {
    RE_ENUM_MARKER.find_iter(text).count() >= 2
}

/// Recover options the model left out of the array: enumerated inline runs
/// (`(1) 35% (2) 20% …`) first, lettered lines second.
fn harvest_options(statement: &str) -> Vec<String> {
    let markers: Vec<(usize, usize)> = RE_ENUM_MARKER
        .find_iter(statement)
        .map(|m| (m.start(), m.end()))
        .collect();
    if markers.len() >= 2 {
        let mut options = Vec::new();
        for (i, (_, body_start)) in markers.iter().enumerate() {
            let body_end = markers
                .get(i + 1)
                .map(|(next_start, _)| *next_start)
                .unwrap_or(statement.len());
            let body = statement[*body_start..body_end]
                .trim()
                .trim_end_matches([',', ';'])
                .trim();
            if !body.is_empty() {
                options.push(body.to_string());
            }
        }
        return options;
    }

    RE_OPTION_LINE
        .find_iter(statement)
        .map(|m| m.as_str().trim().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientError;
    use futures::future::BoxFuture;
    use std::sync::Mutex;

    struct Scripted {
        replies: Mutex<Vec<Result<String, ClientError>>>,
        seen: Mutex<Vec<ChatRequest>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<String, ClientError>>) -> Self {
            Self {
                replies: Mutex::new(replies),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl ChatClient for Scripted {
        fn chat(&self, request: ChatRequest) -> BoxFuture<'_, Result<String, ClientError>> {
            self.seen.lock().unwrap().push(request);
            let mut replies = self.replies.lock().unwrap();
            let out = if replies.is_empty() {
                Err(ClientError::MalformedResponse {
                    detail: "script exhausted".to_string(),
                })
            } else {
                replies.remove(0)
            };
            Box::pin(async move { out })
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn extraction(text: &str, confidence: f64) -> ExtractionResult {
        ExtractionResult {
            text: text.to_string(),
            notation: None,
            confidence,
            method: "vision_ocr".to_string(),
        }
    }

    fn attachment() -> ImageAttachment {
        ImageAttachment {
            data: "QUJD".to_string(),
            mime_type: "image/png".to_string(),
        }
    }

    #[tokio::test]
    async fn confident_extraction_goes_text_only() {
        let client = Scripted::new(vec![Ok(r#"{"type": "equation",
            "statement": "x^2 + 2x + 1 = 0", "asks": ["solve_for:x"],
            "options": [], "variables": ["x"]}"#
            .to_string())]);
        let image = attachment();
        let problem = structure(
            &client,
            &extraction("x^2 + 2x + 1 = 0", 0.9),
            Some(&image),
            &PipelineConfig::default(),
        )
        .await;

        assert_eq!(problem.category, ProblemCategory::Equation);
        assert_eq!(problem.asks, vec!["solve_for:x"]);
        assert!(problem.variables.contains("x"));

        let seen = client.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].image.is_none(), "confident extraction must not attach the image");
    }

    #[tokio::test]
    async fn low_confidence_attaches_the_image() {
        let client = Scripted::new(vec![Ok(r#"{"type": "other",
            "statement": "unclear", "asks": [], "options": [], "variables": []}"#
            .to_string())]);
        let image = attachment();
        structure(
            &client,
            &extraction("blurry text", 0.3),
            Some(&image),
            &PipelineConfig::default(),
        )
        .await;

        let seen = client.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].image.is_some());
        assert!(seen[0].user_text.contains("image"));
    }

    #[tokio::test]
    async fn failed_text_only_retries_once_with_image() {
        let client = Scripted::new(vec![
            Ok("I cannot parse this.".to_string()),
            Ok(r#"{"type": "equation", "statement": "2x = 4",
                "asks": ["solve_for:x"], "options": [], "variables": ["x"]}"#
                .to_string()),
        ]);
        let image = attachment();
        let problem = structure(
            &client,
            &extraction("2x = 4", 0.9),
            Some(&image),
            &PipelineConfig::default(),
        )
        .await;

        assert_eq!(problem.category, ProblemCategory::Equation);
        let seen = client.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].image.is_none());
        assert!(seen[1].image.is_some());
    }

    #[tokio::test]
    async fn unrecoverable_failure_yields_fallback_problem() {
        let client = Scripted::new(vec![Err(ClientError::Timeout { secs: 60 })]);
        let problem = structure(
            &client,
            &extraction("2 + 2", 0.9),
            None,
            &PipelineConfig::default(),
        )
        .await;

        assert_eq!(problem.category, ProblemCategory::Other);
        assert_eq!(problem.statement, "2 + 2");
        assert_eq!(problem.asks, vec!["solve"]);
        assert!(problem.options.is_empty());
    }

    #[tokio::test]
    async fn fenced_reply_with_extra_fields_parses() {
        let reply = "```json\n{\"type\": \"mcq\", \"statement\": \"Pick one\",\n\
            \"asks\": [\"select_option\"], \"options\": [\"(1) 35%\", \"(2) 20%\"],\n\
            \"variables\": [], \"visual_elements\": [\"pie chart\"], \"confidence\": 0.8}\n```";
        let client = Scripted::new(vec![Ok(reply.to_string())]);
        let problem = structure(
            &client,
            &extraction("Pick one (1) 35% (2) 20%", 0.9),
            None,
            &PipelineConfig::default(),
        )
        .await;

        assert_eq!(problem.category, ProblemCategory::MultipleChoice);
        assert_eq!(problem.options, vec!["A) 35%", "B) 20%"]);
    }

    #[test]
    fn enumerated_markers_override_the_label() {
        let raw = RawParsedProblem {
            kind: "word_problem".to_string(),
            statement: "What percentage? (1) 35% (2) 20% (3) 3% (4) 7%".to_string(),
            asks: vec!["select_option".to_string()],
            options: Vec::new(),
            variables: Vec::new(),
        };
        let problem = finalize(raw, "");
        assert_eq!(problem.category, ProblemCategory::MultipleChoice);
        assert_eq!(problem.options, vec!["A) 35%", "B) 20%", "C) 3%", "D) 7%"]);
    }

    #[test]
    fn supplied_options_override_the_label() {
        let raw = RawParsedProblem {
            kind: "word_problem".to_string(),
            statement: "What percentage of the budget went to food?".to_string(),
            asks: vec!["select_option".to_string()],
            options: vec![
                "A) 35%".to_string(),
                "B) 20%".to_string(),
                "C) 3%".to_string(),
            ],
            variables: Vec::new(),
        };
        let problem = finalize(raw, "");
        assert_eq!(problem.category, ProblemCategory::MultipleChoice);
        assert_eq!(problem.options, vec!["A) 35%", "B) 20%", "C) 3%"]);
    }

    #[test]
    fn lettered_option_lines_override_the_label() {
        let raw = RawParsedProblem {
            kind: "other".to_string(),
            statement: "Which segment is the height?\nA) AB\nB) BE\nC) AD".to_string(),
            asks: Vec::new(),
            options: Vec::new(),
            variables: Vec::new(),
        };
        let problem = finalize(raw, "");
        assert_eq!(problem.category, ProblemCategory::MultipleChoice);
        assert_eq!(problem.options, vec!["A) AB", "B) BE", "C) AD"]);
    }

    #[test]
    fn mcq_without_options_demotes_to_other() {
        let raw = RawParsedProblem {
            kind: "mcq".to_string(),
            statement: "Which of the following is prime?".to_string(),
            asks: Vec::new(),
            options: Vec::new(),
            variables: Vec::new(),
        };
        let problem = finalize(raw, "");
        assert_eq!(problem.category, ProblemCategory::Other);
        assert!(problem.options.is_empty());
        assert_eq!(problem.asks, vec!["solve"]);
    }

    #[test]
    fn non_mcq_options_are_cleared() {
        let raw = RawParsedProblem {
            kind: "equation".to_string(),
            statement: "x = 2".to_string(),
            asks: vec!["solve_for:x".to_string()],
            options: vec!["A) stray".to_string()],
            variables: vec!["x".to_string()],
        };
        let problem = finalize(raw, "");
        assert_eq!(problem.category, ProblemCategory::Equation);
        assert!(problem.options.is_empty());
    }

    #[test]
    fn lettered_option_lines_are_harvested() {
        let statement = "Which segment is the height?\nA) AB\nB) BE\nC) AD";
        let raw = RawParsedProblem {
            kind: "mcq".to_string(),
            statement: statement.to_string(),
            asks: Vec::new(),
            options: Vec::new(),
            variables: Vec::new(),
        };
        let problem = finalize(raw, "");
        assert_eq!(problem.options, vec!["A) AB", "B) BE", "C) AD"]);
    }

    #[test]
    fn blank_statement_falls_back_to_extraction_text() {
        let raw = RawParsedProblem {
            kind: "other".to_string(),
            statement: "  ".to_string(),
            asks: Vec::new(),
            options: Vec::new(),
            variables: Vec::new(),
        };
        let problem = finalize(raw, "raw ocr text");
        assert_eq!(problem.statement, "raw ocr text");
    }
}
