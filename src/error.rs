//! Error kinds surfaced by the collaborators around the monitoring engine.
//!
//! None of these reach the presentation layer directly: the engine turns each
//! one into a sink message or a neutral fallback.

use thiserror::Error;

/// Failures producing a usable screen image.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("screenshot source returned no data")]
    Empty,

    #[error("screenshot is not a base64 PNG data URI")]
    NotPngDataUri,

    #[error("screenshot payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("capture command failed: {0}")]
    Command(String),

    #[error("capture I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures talking to the vision/language model.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("API client not ready")]
    NotConfigured,

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("response did not contain the expected {0}")]
    MissingField(&'static str),

    #[error("invalid structured output: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error("model returned an empty reply")]
    EmptyReply,
}

/// Reasons an engine operation refused to run.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MonitorError {
    #[error("monitoring only runs in productivity mode")]
    NotInProductivityMode,

    #[error("monitoring already active")]
    AlreadyMonitoring,

    #[error("no screenshot source configured")]
    NoCaptureSource,

    #[error("no classifier client configured")]
    NoClassifier,

    #[error("unknown personality '{0}'")]
    UnknownPersonality(String),
}
