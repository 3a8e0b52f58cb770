//! End-to-end pipeline tests with scripted model clients and the in-memory
//! record store. No network, no live services.

use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use serde_json::json;

use snapsolve::client::{ChatClient, ChatRequest, ClientError};
use snapsolve::pipeline::structure;
use snapsolve::store::{fields, MemoryRecordStore, RecordStore};
use snapsolve::{
    process_problem, ExtractionResult, PipelineConfig, PipelineError, ProblemCategory,
    ProblemSource, ProblemStatus, SolutionValue,
};

const PNG: &[u8] = b"\x89PNG\r\n\x1a\nfake-image-data";

/// Stage logs go to the test writer; filter with `RUST_LOG` as usual.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Replies one scripted message per call, in order; errors when exhausted.
struct Scripted {
    replies: Mutex<Vec<String>>,
    seen: Mutex<Vec<ChatRequest>>,
}

impl Scripted {
    fn new(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().map(|s| s.to_string()).collect()),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
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
            Ok(replies.remove(0))
        };
        Box::pin(async move { out })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

fn config(vision: Arc<Scripted>, reasoning: Arc<Scripted>) -> PipelineConfig {
    init_tracing();
    PipelineConfig::builder()
        .vision_client(vision)
        .reasoning_client(reasoning)
        .build()
        .unwrap()
}

async fn queued_record(store: &MemoryRecordStore) -> String {
    store
        .create(json!({
            fields::STATUS: ProblemStatus::Queued,
            fields::CREATED_AT: chrono::Utc::now().to_rfc3339(),
        }))
        .await
        .unwrap()
}

#[tokio::test]
async fn equation_pipeline_end_to_end() {
    let vision = Scripted::new(&["x^2 + 2x + 1 = 0"]);
    let reasoning = Scripted::new(&[r#"{
        "type": "equation",
        "statement": "Solve x^2 + 2x + 1 = 0",
        "asks": ["solve_for:x"],
        "options": [],
        "variables": ["x"]
    }"#]);
    let store = MemoryRecordStore::new();
    let id = queued_record(&store).await;

    let solution = process_problem(
        &id,
        ProblemSource::Bytes(PNG.to_vec()),
        &store,
        &config(vision.clone(), reasoning.clone()),
    )
    .await
    .unwrap();

    assert_eq!(solution.result, SolutionValue::Numbers(vec![-1.0]));
    assert_eq!(solution.method, "solve_equation");
    assert!(solution.verified);
    assert!((solution.confidence - 0.9).abs() < f64::EPSILON);

    // one vision call, one structuring call, no MCQ call
    assert_eq!(vision.calls(), 1);
    assert_eq!(reasoning.calls(), 1);

    let record = store.get(&id).await.unwrap().unwrap();
    assert_eq!(record[fields::STATUS], "completed");
    assert_eq!(record[fields::OCR_RESULT]["method"], "vision_ocr");
    assert_eq!(record[fields::PARSED_PROBLEM]["category"], "equation");
    assert_eq!(record[fields::SOLUTION]["method"], "solve_equation");
    assert!(record[fields::UPDATED_AT].is_string());
}

#[tokio::test]
async fn mcq_pipeline_normalizes_numbered_options() {
    let vision = Scripted::new(&[
        "What percentage of the budget went to food? (1) 35% (2) 20% (3) 3% (4) 7%",
    ]);
    let reasoning = Scripted::new(&[
        r#"{
            "type": "mcq",
            "statement": "What percentage of the budget went to food? (1) 35% (2) 20% (3) 3% (4) 7%",
            "asks": ["select_option"],
            "options": ["(1) 35%", "(2) 20%", "(3) 3%", "(4) 7%"],
            "variables": []
        }"#,
        r#"{"answer": "A", "steps": ["Food is the largest slice", "The food slice is 35%"],
            "explanation": "The chart shows food at 35%.", "confidence": "high"}"#,
    ]);
    let store = MemoryRecordStore::new();
    let id = queued_record(&store).await;

    let solution = process_problem(
        &id,
        ProblemSource::Bytes(PNG.to_vec()),
        &store,
        &config(vision, reasoning.clone()),
    )
    .await
    .unwrap();

    assert_eq!(solution.method, "mcq_reasoning");
    assert!((solution.confidence - 0.9).abs() < f64::EPSILON);
    match solution.result {
        SolutionValue::MultipleChoice(outcome) => {
            assert_eq!(outcome.correct_answer, "A) 35%");
            assert_eq!(
                outcome.options,
                vec!["A) 35%", "B) 20%", "C) 3%", "D) 7%"]
            );
            assert_eq!(outcome.question_type, "Multiple Choice Question");
        }
        other => panic!("expected MCQ outcome, got {other:?}"),
    }
    assert_eq!(reasoning.calls(), 2);
}

#[tokio::test]
async fn mislabelled_reply_with_options_is_treated_as_mcq() {
    let vision = Scripted::new(&["What percentage of the budget went to rent?"]);
    // the model mislabels the category but still supplies the option list
    let reasoning = Scripted::new(&[
        r#"{
            "type": "word_problem",
            "statement": "What percentage of the budget went to rent?",
            "asks": ["select_option"],
            "options": ["A) 35%", "B) 20%", "C) 3%"],
            "variables": []
        }"#,
        r#"{"answer": "B", "steps": ["The rent slice is 20%"],
            "explanation": "The chart shows rent at 20%.", "confidence": "medium"}"#,
    ]);
    let store = MemoryRecordStore::new();
    let id = queued_record(&store).await;

    let solution = process_problem(
        &id,
        ProblemSource::Bytes(PNG.to_vec()),
        &store,
        &config(vision, reasoning.clone()),
    )
    .await
    .unwrap();

    assert_eq!(solution.method, "mcq_reasoning");
    assert!((solution.confidence - 0.7).abs() < f64::EPSILON);
    match solution.result {
        SolutionValue::MultipleChoice(outcome) => {
            assert_eq!(outcome.correct_answer, "B) 20%");
        }
        other => panic!("expected MCQ outcome, got {other:?}"),
    }
    let record = store.get(&id).await.unwrap().unwrap();
    assert_eq!(record[fields::PARSED_PROBLEM]["category"], "mcq");
    assert_eq!(reasoning.calls(), 2);
}

#[tokio::test]
async fn numeral_literacy_is_solved_without_a_reasoning_call() {
    let vision = Scripted::new(&[
        "Which of the following is sixty-three thousand and forty?\nA) 63,400\nB) 63,040\nC) 6,340\nD) 63,004",
    ]);
    // only the structuring reply is scripted: the numeral branch must not
    // make a second reasoning call
    let reasoning = Scripted::new(&[r#"{
        "type": "mcq",
        "statement": "Which of the following is sixty-three thousand and forty?",
        "asks": ["select_option"],
        "options": ["A) 63,400", "B) 63,040", "C) 6,340", "D) 63,004"],
        "variables": []
    }"#]);
    let store = MemoryRecordStore::new();
    let id = queued_record(&store).await;

    let solution = process_problem(
        &id,
        ProblemSource::Bytes(PNG.to_vec()),
        &store,
        &config(vision, reasoning.clone()),
    )
    .await
    .unwrap();

    assert_eq!(solution.method, "mcq_numeral");
    assert!(solution.verified);
    assert!((solution.confidence - 0.9).abs() < f64::EPSILON);
    match solution.result {
        SolutionValue::MultipleChoice(outcome) => {
            assert_eq!(outcome.correct_answer, "B) 63,040");
        }
        other => panic!("expected MCQ outcome, got {other:?}"),
    }
    assert_eq!(reasoning.calls(), 1);
}

#[tokio::test]
async fn unparseable_structuring_falls_back_and_still_solves() {
    let vision = Scripted::new(&["2 + 2"]);
    // text-only attempt and the image retry both come back as prose
    let reasoning = Scripted::new(&["Sorry, I can't help with that.", "Still not JSON."]);
    let store = MemoryRecordStore::new();
    let id = queued_record(&store).await;

    let solution = process_problem(
        &id,
        ProblemSource::Bytes(PNG.to_vec()),
        &store,
        &config(vision, reasoning.clone()),
    )
    .await
    .unwrap();

    // fallback problem: other-category with the raw OCR text
    let record = store.get(&id).await.unwrap().unwrap();
    assert_eq!(record[fields::PARSED_PROBLEM]["category"], "other");
    assert_eq!(record[fields::PARSED_PROBLEM]["asks"], json!(["solve"]));
    assert_eq!(record[fields::PARSED_PROBLEM]["statement"], "2 + 2");

    assert_eq!(solution.method, "simplify");
    assert_eq!(solution.result, SolutionValue::Number(4.0));
    assert_eq!(reasoning.calls(), 2);
}

#[tokio::test]
async fn inconclusive_mcq_reply_defaults_to_first_option() {
    let vision = Scripted::new(&["Pick the prime. (1) 4 (2) 7 (3) 9"]);
    let reasoning = Scripted::new(&[
        r#"{
            "type": "mcq",
            "statement": "Pick the prime. (1) 4 (2) 7 (3) 9",
            "asks": ["select_option"],
            "options": ["(1) 4", "(2) 7", "(3) 9"],
            "variables": []
        }"#,
        r#"{"answer": "Q", "confidence": "high"}"#,
    ]);
    let store = MemoryRecordStore::new();
    let id = queued_record(&store).await;

    let solution = process_problem(
        &id,
        ProblemSource::Bytes(PNG.to_vec()),
        &store,
        &config(vision, reasoning),
    )
    .await
    .unwrap();

    assert_eq!(solution.method, "mcq_reasoning");
    assert!((solution.confidence - 0.3).abs() < f64::EPSILON);
    assert!(!solution.verified);
    match solution.result {
        SolutionValue::MultipleChoice(outcome) => {
            assert_eq!(outcome.correct_answer, "A) 4");
            assert!(outcome.reasoning.contains("inconclusive"));
        }
        other => panic!("expected MCQ outcome, got {other:?}"),
    }
}

#[tokio::test]
async fn low_confidence_extraction_structures_with_the_image() {
    init_tracing();
    let reasoning = Scripted::new(&[r#"{
        "type": "other", "statement": "unreadable",
        "asks": [], "options": [], "variables": []
    }"#]);
    let extraction = ExtractionResult::placeholder("OCR processing failed", "ocr_error");
    let image = snapsolve::pipeline::encode::to_attachment(PNG);

    structure::structure(
        reasoning.as_ref(),
        &extraction,
        Some(&image),
        &PipelineConfig::default(),
    )
    .await;

    let seen = reasoning.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert!(
        seen[0].image.is_some(),
        "zero-confidence extraction must attach the image"
    );
}

/// Delegates to [`MemoryRecordStore`] but rejects the write that carries the
/// given field, to exercise the fatal path.
struct FailingOn {
    inner: MemoryRecordStore,
    poison_field: &'static str,
}

impl RecordStore for FailingOn {
    fn create(
        &self,
        initial: serde_json::Value,
    ) -> BoxFuture<'_, Result<String, PipelineError>> {
        self.inner.create(initial)
    }

    fn get<'a>(
        &'a self,
        problem_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<serde_json::Value>, PipelineError>> {
        self.inner.get(problem_id)
    }

    fn update<'a>(
        &'a self,
        problem_id: &'a str,
        partial: serde_json::Value,
    ) -> BoxFuture<'a, Result<(), PipelineError>> {
        if partial.get(self.poison_field).is_some() {
            return Box::pin(async move {
                Err(PipelineError::RecordStore {
                    problem_id: problem_id.to_string(),
                    detail: "simulated outage".to_string(),
                })
            });
        }
        self.inner.update(problem_id, partial)
    }
}

#[tokio::test]
async fn store_outage_marks_the_record_failed() {
    let vision = Scripted::new(&["x = 1"]);
    let reasoning = Scripted::new(&[r#"{
        "type": "other", "statement": "x = 1",
        "asks": [], "options": [], "variables": []
    }"#]);
    let store = FailingOn {
        inner: MemoryRecordStore::new(),
        poison_field: fields::SOLUTION,
    };
    let id = queued_record(&store.inner).await;

    let err = process_problem(
        &id,
        ProblemSource::Bytes(PNG.to_vec()),
        &store,
        &config(vision, reasoning),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, PipelineError::RecordStore { .. }));

    // the FAILED mark itself does not carry a solution, so it lands
    let record = store.inner.get(&id).await.unwrap().unwrap();
    assert_eq!(record[fields::STATUS], "failed");
    assert_eq!(record[fields::ERROR_MESSAGE], format!("{err}"));
}

#[tokio::test]
async fn category_labels_in_records_use_snake_case() {
    // persisted categories must match what API consumers read back
    assert_eq!(
        serde_json::to_value(ProblemCategory::MultipleChoice).unwrap(),
        json!("mcq")
    );
    assert_eq!(
        serde_json::to_value(ProblemCategory::WordProblem).unwrap(),
        json!("word_problem")
    );
}
