//! The three problem-understanding stages, in pipeline order:
//!
//! ```text
//! fetch ─▶ encode ─▶ extract ─▶ structure          (─▶ solve, in crate::solve)
//!   │         │          │           │
//!   │         │          │           └─ reasoning model → ParsedProblem
//!   │         │          └─ vision model → ExtractionResult
//!   │         └─ bytes → base64 ImageAttachment
//!   └─ bytes / file path / URL → image bytes
//! ```
//!
//! Every stage is fail-soft: a failure produces a degraded-but-valid output
//! (placeholder extraction, fallback problem) and the run continues. The
//! solving stage consumes these outputs from [`crate::solve`].

pub mod encode;
pub mod extract;
pub mod fetch;
pub mod structure;
