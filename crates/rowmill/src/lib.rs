//! rowmill — a step-chained data preparation engine.
//!
//! A preparation's history is an immutable, content-addressed chain of
//! steps; each step wraps an ordered action list. Pipelines compile a
//! chain into an executable transform over streamed rows; history edits
//! rewrite the downstream chain without ever mutating a shared step.
//!
//! ## Crate layout
//! - `core` ([`rowmill_core`]): rows, diffing, actions, pipeline, step
//!   chain, history editor, filters, maintenance sweep.
//! - `service`: the operational surface — per-preparation locking,
//!   head compare-and-swap, transformation and preview runs.

pub use rowmill_core as core;

pub mod service;

pub use service::{PreparationService, TransformService};

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

///
/// Prelude
/// Domain vocabulary plus the two service entry points.
///

pub mod prelude {
    pub use crate::service::{PreparationService, TransformService};
    pub use rowmill_core::prelude::*;
}
