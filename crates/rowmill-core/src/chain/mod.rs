pub mod editor;
pub mod gc;
mod hash;
pub mod preparation;
pub mod step;
pub mod store;

pub use editor::{ChainRewrite, ChainSnapshot, StepEdit, apply_edit};
pub use gc::{CleanReport, MarkOutcome, PreparationStepMarker, StepMarker, remove_orphan_steps};
pub use preparation::{Preparation, PreparationId};
pub use step::{Step, StepId, StepRowDiff};
pub use store::{InMemoryPreparationStore, PreparationStore, chain_from_store};

#[cfg(test)]
mod tests;
