//! Error types for the Sentinel proctoring core

use thiserror::Error;

/// Result type alias for proctoring operations
pub type SentinelResult<T> = Result<T, SentinelError>;

/// Errors that can occur inside the proctoring core.
///
/// None of these reach the candidate: media errors degrade to a "camera unavailable"
/// state and analysis errors are replaced by the fallback report.
#[derive(Error, Debug)]
pub enum SentinelError {
    #[error("Media device error: {0}")]
    MediaDevice(String),

    #[error("Analysis request failed: {0}")]
    AnalysisTransport(#[from] reqwest::Error),

    #[error("Analysis API error {status}: {body}")]
    AnalysisStatus { status: u16, body: String },

    #[error("Empty response from analysis API")]
    EmptyResponse,

    #[error("Malformed analysis response: {0}")]
    MalformedResponse(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Session controller is no longer running")]
    SessionClosed,
}
