use std::fmt;

use thiserror::Error;

/// Function name, short label and hints carried by the two outward command
/// errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandReport {
    pub function: String,
    pub error: String,
    pub hints: Vec<String>,
}

impl CommandReport {
    pub fn new(function: &str, error: &str, hints: &[&str]) -> Self {
        Self {
            function: function.to_string(),
            error: error.to_string(),
            hints: hints.iter().map(|h| h.to_string()).collect(),
        }
    }
}

impl fmt::Display for CommandReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error '{}' occurred in {}", self.error, self.function)?;
        for hint in &self.hints {
            write!(f, "\n  {hint}")?;
        }
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum DeidError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Format error: {0}")]
    Format(String),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed tag '{0}'")]
    MalformedTag(String),

    #[error("invalid action '{action}' [line {line}]")]
    InvalidAction { action: String, line: usize },

    #[error("value '{value}' cannot be stored in a {vr} field")]
    InvalidValue { value: String, vr: &'static str },

    #[error("unsupported transfer syntax {0}")]
    UnsupportedTransferSyntax(String),

    #[error("unsafe container member path: {0}")]
    UnsafePath(String),

    /// Bad arguments from the caller (e.g. no rule file given).
    #[error("{0}")]
    CommandError(CommandReport),

    /// I/O or environment failure outside a single record.
    #[error("{0}")]
    CommandFailed(CommandReport),
}

impl DeidError {
    pub fn command_error(function: &str, error: &str, hints: &[&str]) -> Self {
        DeidError::CommandError(CommandReport::new(function, error, hints))
    }

    pub fn command_failed(function: &str, error: &str, hints: &[&str]) -> Self {
        DeidError::CommandFailed(CommandReport::new(function, error, hints))
    }

    pub fn format(msg: impl Into<String>) -> Self {
        DeidError::Format(msg.into())
    }
}

// Convenient crate-wide result type
pub type Result<T> = std::result::Result<T, DeidError>;
