//! Core data model for the problem-processing pipeline.
//!
//! Each pipeline stage produces exactly one of these values per run and the
//! value is immutable from then on:
//!
//! ```text
//! ExtractionResult ──▶ ParsedProblem ──▶ Solution (+ SolutionSteps)
//! ```
//!
//! Everything here is `serde`-serializable because the caller persists each
//! stage output to the external record store at the stage boundary.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ── Extraction ───────────────────────────────────────────────────────────

/// Output of the Extraction Stage: recognized text plus a confidence score.
///
/// `method` identifies which extraction path produced the result
/// (`"vision_ocr"`, `"ocr_no_text"`, `"ocr_error"`). It is diagnostic
/// metadata only — downstream stages never branch on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Recognized text, or a placeholder on failure. Never empty.
    pub text: String,
    /// Formatted mathematical notation, when the service provides one.
    pub notation: Option<String>,
    /// Extraction confidence in `[0, 1]`. `0.0` signals a placeholder.
    pub confidence: f64,
    /// Tag of the extraction path that produced this result.
    pub method: String,
}

impl ExtractionResult {
    /// Synthetic zero-confidence result emitted on any extraction failure,
    /// so downstream stages always receive well-formed input.
    pub fn placeholder(text: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            notation: None,
            confidence: 0.0,
            method: method.into(),
        }
    }
}

// ── Parsed problem ───────────────────────────────────────────────────────

/// Problem category recognized by the Structuring Stage.
///
/// Drives solver dispatch; serialized with the short labels the structuring
/// model is instructed to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemCategory {
    Equation,
    System,
    Integral,
    Derivative,
    WordProblem,
    #[serde(rename = "mcq")]
    MultipleChoice,
    Other,
}

impl ProblemCategory {
    /// Map a free-form label from the structuring model onto a category.
    ///
    /// Labels outside the instructed vocabulary (the model occasionally
    /// volunteers `"geometry"` or `"graph_analysis"`) collapse to [`Self::Other`].
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "equation" => Self::Equation,
            "system" => Self::System,
            "integral" => Self::Integral,
            "derivative" => Self::Derivative,
            "word_problem" => Self::WordProblem,
            "mcq" | "multiple_choice" => Self::MultipleChoice,
            _ => Self::Other,
        }
    }
}

/// Typed problem representation produced by the Structuring Stage.
///
/// Invariant: `options` is non-empty if and only if
/// `category == MultipleChoice`, and each option carries a letter tag
/// (`"A) 35%"`) in presentation order. [`normalize_options`] establishes the
/// lettered form; `finalize` in the structuring stage enforces the iff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedProblem {
    pub category: ProblemCategory,
    /// Canonical problem statement (OCR-corrected when an image was used).
    pub statement: String,
    /// What the problem asks for, e.g. `"solve_for:x"`, `"compute_value"`.
    pub asks: Vec<String>,
    /// Lettered answer options; empty unless `category == MultipleChoice`.
    pub options: Vec<String>,
    /// Variable names appearing in the problem.
    pub variables: BTreeSet<String>,
}

impl ParsedProblem {
    /// Minimal fallback problem used whenever structuring fails: the raw
    /// extracted text with a generic "solve" ask.
    pub fn fallback(statement: impl Into<String>) -> Self {
        Self {
            category: ProblemCategory::Other,
            statement: statement.into(),
            asks: vec!["solve".to_string()],
            options: Vec::new(),
            variables: BTreeSet::new(),
        }
    }
}

// ── Solution ─────────────────────────────────────────────────────────────

/// One entry of the human-auditable derivation trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionStep {
    /// 1-based position, strictly increasing within a solution.
    pub index: u32,
    pub description: String,
    /// Mathematical notation for this step, when one applies.
    pub notation: Option<String>,
    pub explanation: String,
}

impl SolutionStep {
    pub fn new(
        index: u32,
        description: impl Into<String>,
        notation: Option<String>,
        explanation: impl Into<String>,
    ) -> Self {
        Self {
            index,
            description: description.into(),
            notation,
            explanation: explanation.into(),
        }
    }
}

/// The final result payload of a solution.
///
/// Opaque to the pipeline: a number, a set of numbers (equation roots), a
/// structured multiple-choice record, or plain text (symbolic expressions,
/// placeholder messages). Untagged so the persisted JSON matches what API
/// consumers expect to read back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SolutionValue {
    Number(f64),
    Numbers(Vec<f64>),
    MultipleChoice(McqOutcome),
    Text(String),
}

/// Result record every multiple-choice path must produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McqOutcome {
    pub question_type: String,
    pub correct_answer: String,
    pub options: Vec<String>,
    pub reasoning: String,
}

impl McqOutcome {
    pub fn new(
        correct_answer: impl Into<String>,
        options: Vec<String>,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            question_type: "Multiple Choice Question".to_string(),
            correct_answer: correct_answer.into(),
            options,
            reasoning: reasoning.into(),
        }
    }
}

/// Output of the Solving Stage.
///
/// Invariant: `steps` is never empty — even an error solution carries one
/// step recording what went wrong. `verified` reports whether independent
/// recomputation confirmed the result; a failed verification lowers trust
/// but never suppresses the result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    pub result: SolutionValue,
    pub steps: Vec<SolutionStep>,
    /// Report-only confidence in `[0, 1]`; never drives branching downstream.
    pub confidence: f64,
    /// Tag of the solving strategy, e.g. `"solve_equation"`, `"mcq_reasoning"`.
    pub method: String,
    pub verified: bool,
}

// ── Record lifecycle ─────────────────────────────────────────────────────

/// Lifecycle status of an externally-owned problem record.
///
/// The pipeline is the sole writer: QUEUED at submission, PROCESSING when
/// the run claims the record, terminal COMPLETED or FAILED when it finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

// ── Option tagging helpers ───────────────────────────────────────────────

use once_cell::sync::Lazy;
use regex::Regex;

/// Leading option marker: `(1)`, `1)`, `1.`, `A)`, `(A)`, `a.` etc.,
/// with optional trailing separator.
static RE_OPTION_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\(?\s*(?:[A-Za-z]|\d{1,2})\s*[).:]\s*").unwrap());

/// Letter identifier for a 0-based option position: `A`, `B`, …, `Z`, `AA`, …
pub fn letter_tag(index: usize) -> String {
    let mut n = index;
    let mut tag = String::new();
    loop {
        tag.insert(0, (b'A' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    tag
}

/// Re-tag options into the canonical lettered form in presentation order.
///
/// Numeric-prefixed options such as `"(1) 35%"` become `"A) 35%"`; options
/// already lettered are re-tagged by position so the letters always match
/// their index. Empty bodies are kept as bare tags rather than dropped, so
/// positions stay stable.
pub fn normalize_options(raw: &[String]) -> Vec<String> {
    raw.iter()
        .enumerate()
        .map(|(i, opt)| {
            let body = RE_OPTION_PREFIX.replace(opt, "");
            format!("{}) {}", letter_tag(i), body.trim())
        })
        .collect()
}

/// The letter tag of a normalized option (`"B) 20%"` → `"B"`).
pub fn option_letter(option: &str) -> Option<String> {
    let trimmed = option.trim_start();
    let letters: String = trimmed.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    if letters.is_empty() {
        return None;
    }
    match trimmed[letters.len()..].chars().next() {
        Some(')') | Some('.') => Some(letters.to_ascii_uppercase()),
        _ => None,
    }
}

/// The body of a normalized option (`"B) 20%"` → `"20%"`).
pub fn option_body(option: &str) -> &str {
    match option.find(|c| c == ')' || c == '.') {
        Some(pos) => option[pos + 1..].trim(),
        None => option.trim(),
    }
}
