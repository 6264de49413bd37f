use std::path::PathBuf;

use crate::runner::Step;

/// Result type for mkabook operations
pub type Result<T> = std::result::Result<T, MkabookError>;

/// Error types for mkabook operations
#[derive(thiserror::Error, Debug)]
pub enum MkabookError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted per-directory configuration could not be parsed.
    #[error("Could not load configuration file {}: {reason}", .path.display())]
    ConfigParse { path: PathBuf, reason: String },

    #[error("Cannot read input {}: {source}", .path.display())]
    InputUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not find any input audio files in {}", .dir.display())]
    NoInputFilesFound { dir: PathBuf },

    /// A chapter line had no space between its start time and title.
    #[error("Malformed chapter line {line_number}: {line:?}")]
    MalformedChapterLine { line_number: usize, line: String },

    #[error("Subprocess returned error while: {} ({program}, {})", .step.label(), describe_status(.exit_status))]
    ExternalToolFailure {
        step: Step,
        program: String,
        exit_status: Option<i32>,
        diagnostics: String,
    },

    #[error("Input expected to be a directory: {}", .path.display())]
    NotADirectory { path: PathBuf },

    #[error("Worker task failed: {reason}")]
    TaskPanicked { reason: String },
}

impl MkabookError {
    /// Whether processing can continue with defaults after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ConfigParse { .. })
    }

    /// Captured standard-error text of a failed external step, if any.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            Self::ExternalToolFailure { diagnostics, .. } if !diagnostics.trim().is_empty() => {
                Some(diagnostics)
            }
            _ => None,
        }
    }
}

fn describe_status(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit status {}", code),
        None => "no exit status".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_failure_message_names_step() {
        let err = MkabookError::ExternalToolFailure {
            step: Step::Transcode,
            program: "ffmpeg".to_string(),
            exit_status: Some(1),
            diagnostics: "Unknown encoder 'libfdk_aac'\n".to_string(),
        };

        let message = err.to_string();
        assert!(message.contains("Converting Audio"));
        assert!(message.contains("exit status 1"));
        assert_eq!(err.diagnostics(), Some("Unknown encoder 'libfdk_aac'\n"));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_config_parse_is_recoverable() {
        let err = MkabookError::ConfigParse {
            path: PathBuf::from("/books/a/config.json"),
            reason: "expected value at line 1 column 1".to_string(),
        };
        assert!(err.is_recoverable());
        assert!(err.diagnostics().is_none());
    }
}
