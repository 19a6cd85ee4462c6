use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum CoverError {
    #[error("root path does not exist: {}", .0.display())]
    #[diagnostic(help("check the root argument or the `root` field of the config file"))]
    PathNotFound(PathBuf),

    #[error("invalid catalog identifier: {0}")]
    InvalidIdentifier(String),

    #[error("failed to read config file at {}", .0.display())]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),

    #[error("failed to start worker runtime: {0}")]
    Runtime(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("{url} returned status {status}")]
    Status { status: u16, url: String },

    #[error("request to {url} timed out: {message}")]
    Timeout { url: String, message: String },

    #[error("connection to {url} failed: {message}")]
    Connect { url: String, message: String },

    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
}

impl FetchError {
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub fn is_client_error(&self) -> bool {
        self.status().is_some_and(|status| (400..500).contains(&status))
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskError {
    #[error("{}", page_fetch_message(.0))]
    PageFetchFailed(FetchError),

    #[error("metadata not found: {0}")]
    MetadataNotFound(String),

    #[error("artwork download failed: {0}")]
    ArtworkFetchFailed(FetchError),

    #[error("failed to write {}: {message}", .path.display())]
    WriteFailed { path: PathBuf, message: String },

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl TaskError {
    pub fn kind(&self) -> &'static str {
        match self {
            TaskError::PageFetchFailed(err) if err.is_not_found() => "not_found",
            TaskError::PageFetchFailed(_) => "page_fetch_failed",
            TaskError::MetadataNotFound(_) => "metadata_not_found",
            TaskError::ArtworkFetchFailed(_) => "artwork_fetch_failed",
            TaskError::WriteFailed { .. } => "write_failed",
            TaskError::Unexpected(_) => "unexpected",
        }
    }
}

fn page_fetch_message(err: &FetchError) -> String {
    if err.is_not_found() {
        format!("404 Not Found: identifier does not exist in the catalog or was removed ({err})")
    } else {
        format!("catalog page fetch failed: {err}")
    }
}
