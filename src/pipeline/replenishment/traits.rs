//! Boundaries of the replenishment pipeline.
//!
//! - StockDocumentStore: where families come from and where decisions go
//! - CheckpointStore: persisted run progress for resume

use std::collections::BTreeMap;

use super::error::ReplenishmentError;
use super::writer::DocumentUpdate;
use crate::models::{ProgressState, SubstrateFamily};

/// Read and write side of the stock document collection.
///
/// Used only from the orchestrating task; family tasks never touch the store.
pub trait StockDocumentStore {
    /// Scan the collection once and group every readable record into families,
    /// keyed by trimmed keyword.
    fn load_families(&self) -> Result<BTreeMap<String, SubstrateFamily>, ReplenishmentError>;

    /// Apply one family's updates atomically. Returns the number of documents written.
    fn apply_updates(&self, updates: &[DocumentUpdate]) -> Result<usize, ReplenishmentError>;
}

/// Durable home of [`ProgressState`] between runs.
pub trait CheckpointStore: Send + Sync {
    /// `None` when no checkpoint has been written yet.
    fn load(&self) -> Result<Option<ProgressState>, ReplenishmentError>;

    /// Replace the stored checkpoint with `state`.
    fn save(&self, state: &ProgressState) -> Result<(), ReplenishmentError>;
}
