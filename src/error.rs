use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// ERROR CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const ERR_PARSE: &str = "PARSE_ERROR";
pub const ERR_UNRECOGNIZED_NODE: &str = "UNRECOGNIZED_NODE";
pub const ERR_PRINT: &str = "PRINT_ERROR";
pub const ERR_IO: &str = "IO_ERROR";
pub const ERR_TELEMETRY: &str = "TELEMETRY_ERROR";
pub const ERR_CONFIG: &str = "CONFIG_ERROR";
pub const ERR_STUB: &str = "STUB_ERROR";

fn get_hint(code: &str) -> Option<&'static str> {
    match code {
        ERR_PARSE => Some("The file was left untouched. Fix the template syntax and re-run."),
        ERR_UNRECOGNIZED_NODE => {
            Some("Partials, decorators, raw blocks and inverse sections are not supported.")
        }
        ERR_PRINT => Some("No output was written for this file."),
        ERR_TELEMETRY => {
            Some("Telemetry must be a JSON object or array of objects mapping templates to names.")
        }
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CODEMOD ERROR
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Error)]
pub enum CodemodError {
    #[error("{file}:{line}:{column}: {message}")]
    Parse {
        file: String,
        line: u32,
        column: u32,
        message: String,
    },

    #[error("{file}:{line}:{column}: unrecognized node `{construct}`")]
    UnrecognizedNode {
        file: String,
        line: u32,
        column: u32,
        construct: String,
    },

    #[error("{file}: print failed: {message}")]
    Print { file: String, message: String },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("telemetry: {0}")]
    Telemetry(String),

    #[error("config {}: {message}", path.display())]
    Config { path: PathBuf, message: String },

    #[error("runtime stub: {0}")]
    Stub(String),
}

impl CodemodError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CodemodError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            CodemodError::Parse { .. } => ERR_PARSE,
            CodemodError::UnrecognizedNode { .. } => ERR_UNRECOGNIZED_NODE,
            CodemodError::Print { .. } => ERR_PRINT,
            CodemodError::Io { .. } => ERR_IO,
            CodemodError::Telemetry(_) => ERR_TELEMETRY,
            CodemodError::Config { .. } => ERR_CONFIG,
            CodemodError::Stub(_) => ERR_STUB,
        }
    }

    /// Line and column for errors tied to a template position.
    pub fn position(&self) -> Option<(u32, u32)> {
        match self {
            CodemodError::Parse { line, column, .. }
            | CodemodError::UnrecognizedNode { line, column, .. } => Some((*line, *column)),
            _ => None,
        }
    }
}

/// Serializable form of a [`CodemodError`] used in run reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub code: String,
    pub message: String,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub hint: Option<String>,
}

impl From<&CodemodError> for ErrorReport {
    fn from(error: &CodemodError) -> Self {
        let code = error.code();
        let position = error.position();
        ErrorReport {
            code: code.to_string(),
            message: error.to_string(),
            line: position.map(|(line, _)| line),
            column: position.map(|(_, column)| column),
            hint: get_hint(code).map(str::to_string),
        }
    }
}
