//! `process_problem` — the body of one background job.
//!
//! Orchestrates the stages over an existing QUEUED record and persists each
//! stage output at its boundary:
//!
//! 1. mark PROCESSING,
//! 2. fetch + extract, write `ocr_result`,
//! 3. structure, write `parsed_problem`,
//! 4. solve, write `solution` and mark COMPLETED.
//!
//! Stage-level failures never surface here — the stages degrade internally.
//! The only `Err` returns are infrastructure: unresolvable clients, record
//! store failures, serialization bugs. On those the record is best-effort
//! marked FAILED with the message attached, then the error propagates to
//! the job runner.

use chrono::Utc;
use serde_json::json;
use tracing::{error, info};

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::model::{ExtractionResult, ProblemStatus, Solution};
use crate::pipeline::{encode, extract, fetch, structure};
use crate::store::{fields, RecordStore};

/// Run the full pipeline for one problem record.
pub async fn process_problem(
    problem_id: &str,
    source: fetch::ProblemSource,
    store: &dyn RecordStore,
    config: &PipelineConfig,
) -> Result<Solution, PipelineError> {
    info!(problem_id, "processing problem");

    match run(problem_id, source, store, config).await {
        Ok(solution) => {
            info!(problem_id, method = %solution.method, "problem completed");
            Ok(solution)
        }
        Err(e) => {
            error!(problem_id, error = %e, "pipeline run failed");
            // best-effort FAILED mark; the original error is what propagates
            let failed = json!({
                fields::STATUS: ProblemStatus::Failed,
                fields::ERROR_MESSAGE: e.to_string(),
                fields::UPDATED_AT: Utc::now().to_rfc3339(),
            });
            if let Err(store_err) = store.update(problem_id, failed).await {
                error!(problem_id, error = %store_err, "failed to mark record FAILED");
            }
            Err(e)
        }
    }
}

async fn run(
    problem_id: &str,
    source: fetch::ProblemSource,
    store: &dyn RecordStore,
    config: &PipelineConfig,
) -> Result<Solution, PipelineError> {
    let vision = config.resolve_vision_client()?;
    let reasoning = config.resolve_reasoning_client()?;

    store
        .update(
            problem_id,
            json!({
                fields::STATUS: ProblemStatus::Processing,
                fields::UPDATED_AT: Utc::now().to_rfc3339(),
            }),
        )
        .await?;

    let image_bytes = fetch::fetch_source(&source, config).await;
    let extraction = match image_bytes {
        Some(ref bytes) => extract::extract(vision.as_ref(), bytes, config).await,
        None => ExtractionResult::placeholder("No text extracted from image", "ocr_no_text"),
    };
    store
        .update(
            problem_id,
            json!({
                fields::OCR_RESULT: to_json(&extraction)?,
                fields::UPDATED_AT: Utc::now().to_rfc3339(),
            }),
        )
        .await?;

    let attachment = image_bytes.as_deref().map(encode::to_attachment);
    let problem =
        structure::structure(reasoning.as_ref(), &extraction, attachment.as_ref(), config).await;
    store
        .update(
            problem_id,
            json!({
                fields::PARSED_PROBLEM: to_json(&problem)?,
                fields::UPDATED_AT: Utc::now().to_rfc3339(),
            }),
        )
        .await?;

    let solution = crate::solve::solve(&problem, reasoning.as_ref(), config).await;
    store
        .update(
            problem_id,
            json!({
                fields::SOLUTION: to_json(&solution)?,
                fields::STATUS: ProblemStatus::Completed,
                fields::UPDATED_AT: Utc::now().to_rfc3339(),
            }),
        )
        .await?;

    Ok(solution)
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, PipelineError> {
    serde_json::to_value(value)
        .map_err(|e| PipelineError::Internal(format!("stage output serialization: {e}")))
}
