//! Error taxonomy for the serving layer.
//!
//! Only failures that make a correct score impossible live here. Unknown
//! categories, malformed scalars and explanation failures are recovered where
//! they happen and never reach the caller.

use std::path::PathBuf;

/// Errors surfaced by artifact loading and prediction.
#[derive(Debug, thiserror::Error)]
pub enum ServingError {
    /// Scaler or encoder bundle file does not exist.
    #[error("{artifact} file not found: {}. Please run training first.", .path.display())]
    MissingArtifact {
        artifact: &'static str,
        path: PathBuf,
    },

    /// Scaler or encoder bundle exists but cannot be used.
    #[error("{artifact} file {} is invalid: {reason}", .path.display())]
    InvalidArtifact {
        artifact: &'static str,
        path: PathBuf,
        reason: String,
    },

    /// Every model candidate was absent, unsupported or failed to load.
    #[error("Could not load any model. Tried {}.{}", .tried.join(", "), last_error_suffix(.last_error))]
    ModelUnavailable {
        tried: Vec<String>,
        last_error: Option<String>,
    },

    /// Built features disagree with what the scaler or model was fit on.
    #[error("feature mismatch: {0}")]
    FeatureMismatch(String),

    /// The active model failed while scoring.
    #[error("inference failed: {0}")]
    Inference(String),

    /// Request payload missing or not valid JSON.
    #[error("{0}")]
    InputParse(String),
}

fn last_error_suffix(last_error: &Option<String>) -> String {
    match last_error {
        Some(err) => format!(" Last error: {err}"),
        None => String::new(),
    }
}

pub type ServingResult<T> = std::result::Result<T, ServingError>;
