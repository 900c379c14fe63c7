//! Error types for the replenishment pipeline.

use std::path::PathBuf;

use thiserror::Error;

use crate::db::DatabaseError;
use crate::pipeline::inference::InferenceError;

#[derive(Error, Debug)]
pub enum ReplenishmentError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),

    #[error("Checkpoint error at {path}: {reason}")]
    Checkpoint { path: PathBuf, reason: String },

    #[error("Family '{key}' not found ({} families available)", available.len())]
    FamilyNotFound { key: String, available: Vec<String> },

    #[error("Family '{0}' has no materials")]
    EmptyFamily(String),

    #[error("Cannot load system prompt from {path}: {reason}")]
    Prompt { path: PathBuf, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Task for family '{key}' aborted: {reason}")]
    TaskAborted { key: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),
}
