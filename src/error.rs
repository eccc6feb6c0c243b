use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("USER_CANCELLED: Run aborted by user.")]
    UserCancelled,

    #[error("NO_HISTORY: No previous jest run for project '{0}'.")]
    NoHistory(String),

    #[error("NO_TEST_FILE: No test file found for '{}'.", .0.display())]
    NoTestFile(PathBuf),

    #[error("SPAWN_FAILED: Could not start test process: {0}")]
    SpawnFailed(String),

    #[error("INVALID_LOCATION: Expected FILE:LINE[:COL], got '{0}'.")]
    InvalidLocation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Cancellation is a normal outcome of a prompt, not a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::UserCancelled)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
