// SPDX-License-Identifier: MIT

//! Typed errors for model calls

use thiserror::Error;

/// Model/LLM-specific errors
#[derive(Debug, Error)]
pub enum ModelError {
    /// The model server could not be reached
    #[error("Connection to model server failed: {0}")]
    Connection(String),

    /// The server answered with a non-success status
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Invalid response from model
    #[error("Invalid response from model: {0}")]
    InvalidResponse(String),

    /// The request did not finish within the client timeout
    #[error("Model request timed out")]
    Timeout,

    /// Model output was not the JSON we asked for
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ModelError {
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse(message.into())
    }
}

impl From<reqwest::Error> for ModelError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ModelError::Timeout
        } else if err.is_decode() {
            ModelError::InvalidResponse(err.to_string())
        } else {
            ModelError::Connection(err.to_string())
        }
    }
}
