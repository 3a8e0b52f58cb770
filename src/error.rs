//! Error types for the snapsolve pipeline.
//!
//! Two tiers reflect two distinct failure modes:
//!
//! * [`PipelineError`] — **Fatal**: the run cannot proceed or finish at all
//!   (no client configured, record store unreachable, programming error).
//!   Returned as `Err(PipelineError)` from [`crate::process::process_problem`];
//!   the job runner marks the record FAILED with the message attached.
//!
//! * [`StructureError`] / [`SolveError`] — **Non-fatal**: a stage-level
//!   failure that the stage recovers from locally (minimal fallback problem,
//!   zero-confidence solution). These never cross the `process_problem`
//!   boundary; they exist as typed values so fallback branching is an
//!   explicit match on the error kind rather than a catch-all.
//!
//! Client-level failures ([`crate::client::ClientError`]) are wrapped into
//! whichever stage error is in flight and recovered per the same contracts.

use crate::client::ClientError;
use thiserror::Error;

/// All fatal errors returned by the pipeline.
///
/// Stage-level failures use [`StructureError`] / [`SolveError`] and are
/// recovered inside the stages rather than propagated here.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// No client is configured or resolvable for the given role.
    #[error("No {role} client is configured.\n{hint}")]
    MissingClient { role: &'static str, hint: String },

    /// The record store rejected or failed a read/write.
    #[error("Record store operation failed for '{problem_id}': {detail}")]
    RecordStore { problem_id: String, detail: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error (programming error, broken invariant).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal Structuring Stage failure.
///
/// [`crate::pipeline::structure::structure`] recovers every variant with the
/// minimal `Other`-category fallback problem; the variants exist so the
/// retry-with-image branch can distinguish a malformed reply from a missing
/// image before falling back.
#[derive(Debug, Error)]
pub enum StructureError {
    /// The reasoning service call itself failed.
    #[error("structuring service call failed: {0}")]
    Client(#[from] ClientError),

    /// The reply did not contain a JSON object in the instructed shape.
    #[error("structuring reply was not parseable: {detail}")]
    MalformedReply { detail: String },
}

/// A non-fatal domain-level solving failure.
///
/// [`crate::solve::solve`] converts every variant into a zero-confidence
/// `Solution` with `method = "error"` and an explanatory step.
#[derive(Debug, Error)]
pub enum SolveError {
    /// The statement contains no equation (`lhs = rhs`) to solve.
    #[error("no equation found in problem statement")]
    NoEquation,

    /// No mathematical expression could be extracted from the statement.
    #[error("no mathematical expression found in problem statement")]
    NoExpression,

    /// The expression has no free variable to solve for.
    #[error("no variable found in equation")]
    NoVariable,

    /// The expression parsed but falls outside the symbolic engine's rules.
    #[error("unsupported expression form: {detail}")]
    Unsupported { detail: String },

    /// A multiple-choice problem arrived with an empty option list.
    #[error("multiple-choice problem has no options")]
    NoOptions,

    /// Expression text failed to parse.
    #[error("expression parse error: {0}")]
    Parse(#[from] crate::symbolic::ParseError),
}
