use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum IcaError {
    #[error("invalid project id: {0:?}")]
    InvalidProjectId(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("listing failed: {0}")]
    ListingFailed(String),

    #[error("download of {file_id} failed: {message}")]
    DownloadFailed { file_id: String, message: String },

    #[error("malformed listing response: {0}")]
    MalformedResponse(String),

    #[error("{command} timed out after {seconds}s")]
    Timeout { command: String, seconds: u64 },

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("console error: {0}")]
    Console(String),
}
