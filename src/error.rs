use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Renderer unavailable: {0}")]
    ToolUnavailable(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("No URLs given. Pass them as arguments or with --file.")]
    NoUrls,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Why a single archive job ended without a usable file.
///
/// Recorded on the job and surfaced in the final report; never propagated
/// out of a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    /// The renderer exited non-zero or could not be spawned.
    Subprocess(String),
    /// The renderer did not finish before the deadline and was killed.
    Timeout { millis: u64 },
    /// The renderer reported success but wrote nothing.
    MissingOutput,
    /// The output file exists but is zero bytes.
    EmptyOutput,
    /// The output has no `<html` marker.
    InvalidContent,
    /// The output could not be read back.
    Unreadable(String),
    /// The URL has no host, so no output file name can be derived.
    InvalidUrl(String),
    /// The worker processing this job hit an unexpected fault.
    WorkerFault(String),
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::Subprocess(msg) => write!(f, "renderer failed: {msg}"),
            FailureReason::Timeout { millis } => {
                write!(f, "timed out after {}s", *millis as f64 / 1000.0)
            }
            FailureReason::MissingOutput => write!(f, "no output file written"),
            FailureReason::EmptyOutput => write!(f, "output file is empty"),
            FailureReason::InvalidContent => write!(f, "invalid HTML content"),
            FailureReason::Unreadable(msg) => write!(f, "could not read output: {msg}"),
            FailureReason::InvalidUrl(url) => write!(f, "no host in URL {url:?}"),
            FailureReason::WorkerFault(msg) => write!(f, "worker fault: {msg}"),
        }
    }
}
