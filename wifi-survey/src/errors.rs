use thiserror::Error;

#[derive(Error, Debug)]
pub enum SurveyError {
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}: {stderr}")]
    ToolFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("network `{ssid}` not visible in scan output")]
    NetworkNotVisible { ssid: String },

    #[error("malformed connection info line {line_no}: {line:?}")]
    MalformedLine { line_no: usize, line: String },

    #[error("failed to enumerate network interfaces: {0}")]
    Interfaces(#[from] nix::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl SurveyError {
    /// Whether a scan attempt that failed with this error may be tried again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SurveyError::ToolFailed { .. } | SurveyError::NetworkNotVisible { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SurveyError>;
