//! Error taxonomy shared by the reader core and its frontends.
//!
//! Backends report failures as [`BackendError`]. Anything that crosses the
//! frontend boundary is a [`StructuredError`], which [`parse_error`] can
//! rebuild from a native value, a JSON document or a bare message.

use crate::BookId;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ErrorKind {
    Database,
    Io,
    Serialization,
    Rendering,
    NotFound,
    FileNotFound,
    Format,
    Metadata,
    Duplicate,
    InvalidOperation,
    Permission,
    Unsupported,
    Validation,
    Corrupted,
    SizeLimit,
    #[default]
    #[serde(other)]
    Unknown,
}

impl ErrorKind {
    fn user_message(self) -> &'static str {
        match self {
            ErrorKind::Database => "The library database could not be accessed.",
            ErrorKind::Io => "A file could not be read or written.",
            ErrorKind::Serialization => "Stored data could not be decoded.",
            ErrorKind::Rendering => "This page could not be displayed.",
            ErrorKind::NotFound => "The requested item no longer exists.",
            ErrorKind::FileNotFound => "The book file could not be found on disk.",
            ErrorKind::Format => "This file format is not recognised.",
            ErrorKind::Metadata => "Book details could not be read.",
            ErrorKind::Duplicate => "This item already exists.",
            ErrorKind::InvalidOperation => "That action is not possible right now.",
            ErrorKind::Permission => "Access to the file was denied.",
            ErrorKind::Unsupported => "This feature is not supported for this file.",
            ErrorKind::Validation => "Some values were out of range.",
            ErrorKind::Corrupted => "The file appears to be damaged.",
            ErrorKind::SizeLimit => "The file is too large to open.",
            ErrorKind::Unknown => "Something went wrong.",
        }
    }

    fn suggestions(self) -> Vec<String> {
        let hints: &[&str] = match self {
            ErrorKind::Database => &["Restart the application", "Check free disk space"],
            ErrorKind::Io | ErrorKind::Permission => {
                &["Check that the file is accessible", "Check free disk space"]
            }
            ErrorKind::FileNotFound => &["Re-import the book from its new location"],
            ErrorKind::Format | ErrorKind::Corrupted => {
                &["Try opening a different copy of the file"]
            }
            ErrorKind::Serialization => &["Reset reader settings to defaults"],
            _ => &[],
        };
        hints.iter().map(|hint| hint.to_string()).collect()
    }
}

/// Frontend-facing error value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase", default)]
#[ts(export)]
pub struct StructuredError {
    pub message: String,
    pub user_message: String,
    pub suggestions: Vec<String>,
    pub technical_details: String,
    pub kind: ErrorKind,
}

impl Default for StructuredError {
    fn default() -> Self {
        Self::from_message(ErrorKind::Unknown.user_message())
    }
}

impl StructuredError {
    /// Wrap a bare message without guessing at its kind.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            user_message: message.clone(),
            technical_details: message.clone(),
            message,
            suggestions: Vec::new(),
            kind: ErrorKind::Unknown,
        }
    }
}

impl std::fmt::Display for StructuredError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for StructuredError {}

/// Failure reported by a durable store.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Book not found: {0}")]
    NotFound(BookId),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("{0}")]
    Other(String),
}

impl BackendError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BackendError::Database(_) => ErrorKind::Database,
            BackendError::Io(err) => match err.kind() {
                std::io::ErrorKind::NotFound => ErrorKind::FileNotFound,
                std::io::ErrorKind::PermissionDenied => ErrorKind::Permission,
                _ => ErrorKind::Io,
            },
            BackendError::Serialization(_) => ErrorKind::Serialization,
            BackendError::NotFound(_) => ErrorKind::NotFound,
            BackendError::InvalidOperation(_) => ErrorKind::InvalidOperation,
            BackendError::Other(_) => ErrorKind::Unknown,
        }
    }
}

impl From<&BackendError> for StructuredError {
    fn from(err: &BackendError) -> Self {
        let kind = err.kind();
        StructuredError {
            message: err.to_string(),
            user_message: kind.user_message().to_string(),
            suggestions: kind.suggestions(),
            technical_details: format!("{err:?}"),
            kind,
        }
    }
}

impl From<BackendError> for StructuredError {
    fn from(err: BackendError) -> Self {
        StructuredError::from(&err)
    }
}

/// The shapes in which an error can reach [`parse_error`].
#[derive(Debug, Clone)]
pub enum ErrorInput {
    Structured(StructuredError),
    Json(serde_json::Value),
    Text(String),
}

impl From<StructuredError> for ErrorInput {
    fn from(value: StructuredError) -> Self {
        ErrorInput::Structured(value)
    }
}

impl From<serde_json::Value> for ErrorInput {
    fn from(value: serde_json::Value) -> Self {
        ErrorInput::Json(value)
    }
}

impl From<String> for ErrorInput {
    fn from(value: String) -> Self {
        ErrorInput::Text(value)
    }
}

impl From<&str> for ErrorInput {
    fn from(value: &str) -> Self {
        ErrorInput::Text(value.to_string())
    }
}

/// Normalize any error representation into a [`StructuredError`].
///
/// Never fails: text that is not a JSON object is treated as a plain
/// message of kind [`ErrorKind::Unknown`].
pub fn parse_error(input: impl Into<ErrorInput>) -> StructuredError {
    match input.into() {
        ErrorInput::Structured(err) => err,
        ErrorInput::Json(value) => from_json_value(value),
        ErrorInput::Text(text) => match serde_json::from_str::<serde_json::Value>(text.trim()) {
            Ok(value @ serde_json::Value::Object(_)) => from_json_value(value),
            _ => StructuredError::from_message(text),
        },
    }
}

fn from_json_value(value: serde_json::Value) -> StructuredError {
    match value {
        serde_json::Value::Object(_) => serde_json::from_value(value.clone())
            .unwrap_or_else(|_| StructuredError::from_message(value.to_string())),
        serde_json::Value::String(text) => StructuredError::from_message(text),
        other => StructuredError::from_message(other.to_string()),
    }
}
