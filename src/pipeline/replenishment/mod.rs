//! Substrate-family replenishment decisions.
//!
//! Discovery -> per-family decision (rules, else AI arbitration) -> grouped
//! document writes, with a checkpoint so an interrupted run can resume.

pub mod checkpoint;
pub mod engine;
pub mod error;
pub mod parser;
pub mod prompt;
pub mod runner;
pub mod store;
pub mod summary;
pub mod traits;
pub mod writer;

pub use checkpoint::JsonCheckpointStore;
pub use engine::{DecisionEngine, FamilyDecision};
pub use error::ReplenishmentError;
pub use parser::ResponseParser;
pub use runner::{BatchRunner, RunOptions};
pub use store::SqliteStockStore;
pub use summary::{format_duration, RunSummary};
pub use traits::{CheckpointStore, StockDocumentStore};
pub use writer::{plan_updates, DocumentUpdate};
