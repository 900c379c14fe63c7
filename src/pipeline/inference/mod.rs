//! Client side of the external text-generation service.

pub mod openrouter;
pub mod types;

#[cfg(test)]
pub mod mock;

pub use openrouter::*;
pub use types::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Inference service returned error (status {status}): {body}")]
    Service { status: u16, body: String },

    #[error("Inference service still failing after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    #[error("Network error calling inference service: {0}")]
    Network(String),

    #[error("Invalid inference response: {0}")]
    InvalidResponse(String),

    #[error("No inference API key configured (set OPENROUTER_API_KEY)")]
    MissingApiKey,

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

impl InferenceError {
    /// Rate limiting, temporary unavailability and connection-level failures
    /// are worth another attempt. Everything else is final for the call.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Service { status, .. } => matches!(status, 429 | 503),
            Self::Network(_) => true,
            _ => false,
        }
    }
}
