//! Prompts for the extraction, structuring, and reasoning-model calls.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — tightening an output contract or adding a
//!    detection rule requires editing exactly one place.
//!
//! 2. **Testability** — unit tests can inspect prompts directly without
//!    calling a real model, so contract regressions (a dropped field name, a
//!    loosened format rule) are caught cheaply.
//!
//! The structuring and MCQ prompts each pin a strict output contract (a sole
//! JSON object, or the two-field `ANSWER:`/`REASONING:` form); the parsing
//! code in `pipeline::structure` and `solve::mcq` validates against exactly
//! these shapes and treats any mismatch as a typed stage error.

/// Instruction sent to the vision model with the problem image.
pub const EXTRACTION_PROMPT: &str = "Extract all mathematical text, equations, and problems from this image. \
Return the mathematical content as plain text, preserving mathematical notation, \
symbols, and formatting verbatim. Include all visible text and mathematical \
expressions exactly as they appear. Do not solve anything and do not add commentary.";

/// System instruction for every structuring-model call.
pub const STRUCTURING_SYSTEM_PROMPT: &str = "You are a precise assistant that parses mathematics problems into structured JSON. \
Reason internally as needed, but never include your deliberation in the output. \
Reply with exactly the format requested and nothing else.";

/// The JSON shape plus MCQ detection rules shared by both structuring prompts.
const STRUCTURING_CONTRACT: &str = r#"Return ONLY a valid JSON object with this exact structure:
{
    "type": "equation|system|integral|derivative|word_problem|mcq|other",
    "statement": "the complete, corrected problem statement",
    "asks": ["solve_for:x", "simplify", "compute_value", "find_derivative", ...],
    "options": ["A) option1", "B) option2", ...],
    "variables": ["x", "y", ...]
}

CRITICAL MCQ DETECTION RULES:
- If you see numbered options like "(1)", "(2)", "(3)", "(4)" OR lettered options like "A)", "B)", "C)", "D)" anywhere, the type is DEFINITELY "mcq"
- Questions phrased "which of the following", "what percentage", or "select the correct" are type "mcq"
- Convert numbered options (1), (2), (3), (4) to lettered form A), B), C), D) in the options array, in presentation order
- Example: "(1) 35%" becomes "A) 35%", "(2) 20%" becomes "B) 20%"
- For non-MCQ problems the options array must be empty

CRITICAL: Return ONLY the JSON object — no explanation, no markdown fences, no additional text."#;

/// User prompt for the combined text + image structuring request.
///
/// Sent together with the original image so the model can correct OCR
/// mistakes against what it actually sees.
pub fn combined_structuring_prompt(ocr_text: &str, notation: Option<&str>) -> String {
    let mut prompt = format!(
        "I extracted text from a photographed mathematics problem using OCR, and I am \
also providing the original image.\n\nOCR extracted text:\n{ocr_text}\n"
    );
    if let Some(notation) = notation {
        prompt.push_str(&format!("\nFormatted notation (if helpful): {notation}\n"));
    }
    prompt.push_str(
        "\nExamine BOTH the OCR text and the image: correct OCR errors against the image, \
include any symbols, diagrams, or answer options the OCR missed, then parse the \
problem.\n\n",
    );
    prompt.push_str(STRUCTURING_CONTRACT);
    prompt
}

/// User prompt for the text-only structuring request, used when no usable
/// image is available or the extraction was confident enough on its own.
pub fn text_only_structuring_prompt(ocr_text: &str, notation: Option<&str>) -> String {
    let mut prompt = format!(
        "Parse the following mathematics problem into a structured JSON format.\n\n\
Problem text:\n{ocr_text}\n"
    );
    if let Some(notation) = notation {
        prompt.push_str(&format!("\nFormatted notation (if helpful): {notation}\n"));
    }
    prompt.push('\n');
    prompt.push_str(STRUCTURING_CONTRACT);
    prompt
}

/// Prompt for the general multiple-choice reasoning call.
///
/// The contract is strict JSON: `answer` must be one of the option letters,
/// `confidence` one of `high`/`medium`/`low` (mapped to 0.9/0.7/0.4 by the
/// solver).
pub fn mcq_reasoning_prompt(statement: &str, options: &[String]) -> String {
    format!(
        "Solve this multiple choice question.\n\nQuestion: {statement}\n\nOptions:\n{}\n\n\
Work through the question carefully: count objects, compute ratios, and compare \
quantities step by step.\n\n\
Return ONLY a valid JSON object with this exact structure:\n\
{{\n\
    \"answer\": \"<option letter, e.g. B>\",\n\
    \"steps\": [\"first reasoning step\", \"second reasoning step\", ...],\n\
    \"explanation\": \"why the chosen option is correct\",\n\
    \"confidence\": \"high|medium|low\"\n\
}}\n\n\
CRITICAL: Return ONLY the JSON object — no explanation outside it, no markdown fences.",
        options.join("\n")
    )
}

/// Prompt for the triangle height/base geometry branch.
///
/// Uses a two-field tagged-line contract instead of JSON; the solver accepts
/// only a single-letter `ANSWER` matching an existing option tag.
pub fn geometry_mcq_prompt(statement: &str, options: &[String]) -> String {
    format!(
        "Solve this geometry multiple choice question about a triangle.\n\n\
Question: {statement}\n\nOptions:\n{}\n\n\
A height relative to a base is the perpendicular segment from the opposite \
vertex to that base (or its extension).\n\n\
Reply in EXACTLY this two-line format and nothing else:\n\
ANSWER: <single option letter>\n\
REASONING: <one short paragraph>",
        options.join("\n")
    )
}
