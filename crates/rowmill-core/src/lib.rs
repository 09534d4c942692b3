//! Core engine for rowmill: rows and diffing, actions and their
//! execution contexts, the streaming/materializing pipeline, the
//! content-addressed step chain with its history editor, row filter
//! predicates, and the maintenance sweep.
//!
//! Everything here is synchronous and store-agnostic: persistence goes
//! through [`chain::PreparationStore`], datasets through
//! [`source::RowSource`], and time is always passed in by the caller.

pub mod action;
pub mod chain;
pub mod date;
pub mod error;
pub mod filter;
pub mod pipeline;
pub mod row;
pub mod signature;
pub mod source;

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No stores, registries, builders, or helpers are re-exported here.
///

pub mod prelude {
    pub use crate::{
        action::ActionDefinition,
        chain::{Preparation, PreparationId, Step, StepId},
        row::{ColumnMetadata, DataSetRow, RowMetadata},
    };
}
