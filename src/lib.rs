//! # snapsolve
//!
//! Pipeline for solving photographed mathematics problems: a source image
//! goes through vision-model OCR, reasoning-model structuring, and a local
//! symbolic solving stage, with every stage output persisted to an
//! externally-owned problem record.
//!
//! ```text
//!                  ┌─────────┐   ┌─────────┐   ┌───────────┐   ┌─────────┐
//!  image source ──▶│  fetch  │──▶│ extract │──▶│ structure │──▶│  solve  │──▶ Solution
//!                  └─────────┘   └────┬────┘   └─────┬─────┘   └────┬────┘
//!                                     │              │              │
//!                                vision model   reasoning model   symbolic
//!                                  (OCR)        (parse + MCQ)      engine
//! ```
//!
//! The pipeline is **fail-soft below the infrastructure line**: OCR
//! failures become placeholder extractions, unparseable structuring replies
//! become a minimal fallback problem, and solving failures become
//! zero-confidence error solutions. Only infrastructure problems — no
//! client configured, record store unreachable — fail a run, as
//! [`error::PipelineError`].
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use snapsolve::{process_problem, MemoryRecordStore, PipelineConfig, ProblemSource};
//! use snapsolve::store::RecordStore;
//!
//! # async fn run() -> Result<(), snapsolve::PipelineError> {
//! let store = MemoryRecordStore::new();
//! let problem_id = store
//!     .create(serde_json::json!({ "status": "queued" }))
//!     .await?;
//!
//! // clients resolve from the environment when none are injected
//! let config = PipelineConfig::builder().build()?;
//!
//! let solution = process_problem(
//!     &problem_id,
//!     ProblemSource::Path("problem.jpg".into()),
//!     &store,
//!     &config,
//! )
//! .await?;
//! println!("{} (confidence {})", solution.method, solution.confidence);
//! # Ok(())
//! # }
//! ```
//!
//! Model clients are explicit values implementing [`client::ChatClient`];
//! inject mocks for hermetic tests, or let
//! [`config::PipelineConfig::resolve_vision_client`] build HTTP clients
//! from environment configuration.

pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod process;
pub mod prompts;
pub mod solve;
pub mod store;
pub mod symbolic;

pub use client::{ChatClient, ChatRequest, ClientError, HttpChatClient, ImageAttachment};
pub use config::{PipelineConfig, PipelineConfigBuilder, IMAGE_FALLBACK_CONFIDENCE};
pub use error::PipelineError;
pub use model::{
    ExtractionResult, McqOutcome, ParsedProblem, ProblemCategory, ProblemStatus, Solution,
    SolutionStep, SolutionValue,
};
pub use pipeline::fetch::ProblemSource;
pub use process::process_problem;
pub use store::{MemoryRecordStore, RecordStore};
