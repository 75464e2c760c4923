#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Analysis(#[from] helm_preview::Error),

    #[error("`{command}` not found on PATH")]
    CommandNotFound {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` failed ({status}): {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("`{command}` timed out after {seconds}s")]
    CommandTimeout { command: String, seconds: u64 },
}

pub type CliResult<T> = std::result::Result<T, CliError>;
