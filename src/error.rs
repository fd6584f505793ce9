use std::path::PathBuf;

use thiserror::Error;

/// Result type used by everything below the CLI boundary
pub type Result<T> = std::result::Result<T, SorterError>;

#[derive(Error, Debug)]
pub enum SorterError {
    #[error("{}", format_config(.message, .attr))]
    Config { message: String, attr: String },

    #[error("Invalid sort by column: {0}")]
    InvalidSortColumn(String),

    #[error("Row has {actual} cells but the table has {expected} columns: {row:?}")]
    RowWidth {
        expected: usize,
        actual: usize,
        row: Vec<String>,
    },

    #[error("Cannot export to HTML, {0} console is not in recording mode!")]
    NotRecording(&'static str),

    #[error("Failed to write {path:?}: {source}")]
    Export {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write to the {sink} console: {source}")]
    Console {
        sink: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to load filters from {path:?}: {message}")]
    FilterFile { path: PathBuf, message: String },

    #[error("Mail query failed: {0}")]
    Query(String),
}

impl SorterError {
    pub fn config(message: impl Into<String>) -> Self {
        SorterError::Config {
            message: message.into(),
            attr: String::new(),
        }
    }

    pub fn config_attr(message: impl Into<String>, attr: impl Into<String>) -> Self {
        SorterError::Config {
            message: message.into(),
            attr: attr.into(),
        }
    }

    /// Collapses any collaborator failure (auth, API, cache) into a query error
    pub fn query(err: impl std::fmt::Display) -> Self {
        SorterError::Query(err.to_string())
    }
}

fn format_config(message: &str, attr: &str) -> String {
    if attr.is_empty() {
        message.to_string()
    } else {
        format!("{attr}: {message}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_with_attribute() {
        let err = SorterError::config_attr("must not be empty", "account_email");
        assert_eq!(err.to_string(), "account_email: must not be empty");
    }

    #[test]
    fn test_config_error_without_attribute() {
        let err = SorterError::config("Unknown result mode: verbose");
        assert_eq!(err.to_string(), "Unknown result mode: verbose");
    }

    #[test]
    fn test_not_recording_names_the_sink() {
        let err = SorterError::NotRecording("wide");
        assert!(err.to_string().contains("wide console"));
    }
}
