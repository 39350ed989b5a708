// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 calflow contributors

//! Error types
//!
//! Every failure raised while loading a pipeline document is a document
//! authoring defect. Errors carry enough context (task label, field path,
//! source location) to point the author at the offending line, plus a
//! `help` text where a fix can be suggested.

mod location;

pub use location::SourceLocation;

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

use crate::pipeline::ConfigValue;

/// Result type for calflow operations
pub type CalflowResult<T> = Result<T, CalflowError>;

/// Main error type for calflow
#[derive(Error, Debug, Diagnostic)]
pub enum CalflowError {
    // ─────────────────────────────────────────────────────────────────────────
    // Document Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Failed to parse pipeline document at {location}: {message}")]
    #[diagnostic(code(calflow::parse_error))]
    Parse {
        location: SourceLocation,
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("Failed to read file '{path}': {error}")]
    #[diagnostic(code(calflow::file_read_error))]
    FileReadError { path: PathBuf, error: String },

    #[error("Unsupported document format: {path}")]
    #[diagnostic(
        code(calflow::unsupported_format),
        help("Supported extensions: .yaml, .yml, .json, .toml")
    )]
    UnsupportedFormat { path: PathBuf },

    // ─────────────────────────────────────────────────────────────────────────
    // Registry Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Unknown task class '{class}'{}", task_suffix(.task))]
    #[diagnostic(code(calflow::unknown_task))]
    UnknownTask {
        task: Option<String>,
        class: String,
        #[help]
        help: Option<String>,
    },

    #[error("Task '{task}' ({class}) has no option '{option}'")]
    #[diagnostic(code(calflow::unknown_option))]
    UnknownOption {
        task: String,
        class: String,
        option: String,
        #[help]
        help: Option<String>,
    },

    #[error("Task '{task}' option '{option}' expects {expected}, got {actual}")]
    #[diagnostic(code(calflow::invalid_option_value))]
    InvalidOptionValue {
        task: String,
        option: String,
        expected: String,
        actual: ConfigValue,
    },

    #[error("Task '{task}' ({class}) has no connection '{role}'")]
    #[diagnostic(code(calflow::unknown_connection))]
    UnknownConnection {
        task: String,
        class: String,
        role: String,
        #[help]
        help: Option<String>,
    },

    #[error("Invalid schema for task class '{identifier}': {message}")]
    #[diagnostic(code(calflow::invalid_schema))]
    InvalidSchema { identifier: String, message: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Resolution Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Task '{task}' field '{field}' references undeclared parameter '{parameter}'")]
    #[diagnostic(
        code(calflow::unresolved_parameter),
        help("Declare '{parameter}' under the top-level 'parameters' mapping")
    )]
    UnresolvedParameter {
        task: String,
        field: String,
        parameter: String,
    },

    #[error("Task '{task}' connection '{role}' must be bound to a dataset name, got {value}")]
    #[diagnostic(code(calflow::invalid_connection))]
    InvalidConnection {
        task: String,
        role: String,
        value: ConfigValue,
    },

    #[error("Dataset '{dataset}' is produced by more than one task: {}", .producers.join(", "))]
    #[diagnostic(
        code(calflow::ambiguous_producer),
        help("Rename one of the outputs, or relax 'ambiguous_producers' to 'warning'")
    )]
    AmbiguousProducer {
        dataset: String,
        producers: Vec<String>,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Contract Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Contract '{contract}' references unknown field '{path}'")]
    #[diagnostic(code(calflow::unknown_field))]
    UnknownField {
        contract: String,
        path: String,
        #[help]
        help: Option<String>,
    },

    #[error("Contract violated: {contract} (actual: {})", format_actual(.actual))]
    #[diagnostic(code(calflow::contract_violation))]
    ContractViolation {
        contract: String,
        actual: Vec<(String, ConfigValue)>,
        #[help]
        help: Option<String>,
    },

    #[error("{} contract(s) violated", .violations.len())]
    #[diagnostic(code(calflow::contract_violations))]
    ContractViolations {
        #[related]
        violations: Vec<CalflowError>,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Output Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Failed to serialize pipeline: {message}")]
    #[diagnostic(code(calflow::serialize_error))]
    Serialize { message: String },

}

fn task_suffix(task: &Option<String>) -> String {
    match task {
        Some(task) => format!(" (task '{}')", task),
        None => String::new(),
    }
}

fn format_actual(actual: &[(String, ConfigValue)]) -> String {
    actual
        .iter()
        .map(|(path, value)| format!("{} = {}", path, value))
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<serde_yaml::Error> for CalflowError {
    fn from(e: serde_yaml::Error) -> Self {
        let location = e
            .location()
            .map(|loc| SourceLocation::Position {
                line: loc.line(),
                column: loc.column(),
            })
            .unwrap_or(SourceLocation::Unknown);

        Self::Parse {
            location,
            message: e.to_string(),
            help: Some(
                "Check indentation (spaces, not tabs) and that every key is followed by ':'"
                    .into(),
            ),
        }
    }
}

impl From<serde_json::Error> for CalflowError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse {
            location: SourceLocation::Position {
                line: e.line(),
                column: e.column(),
            },
            message: e.to_string(),
            help: None,
        }
    }
}

impl CalflowError {
    /// Build a parse error pointing at a key path inside the document
    pub fn at_path(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            location: SourceLocation::Path(path.into()),
            message: message.into(),
            help: None,
        }
    }

    /// Convert a TOML error, resolving its byte span against the source text
    pub fn from_toml(e: toml::de::Error, source: &str) -> Self {
        let location = e
            .span()
            .map(|span| SourceLocation::from_offset(source, span.start))
            .unwrap_or(SourceLocation::Unknown);

        Self::Parse {
            location,
            message: e.message().to_string(),
            help: None,
        }
    }

    /// Create an unknown-task error, suggesting registered classes that
    /// share the final segment of the requested identifier
    pub fn unknown_task<'a>(class: &str, known: impl IntoIterator<Item = &'a str>) -> Self {
        let short_name = class.rsplit('.').next().unwrap_or(class);
        let candidates: Vec<&str> = known
            .into_iter()
            .filter(|id| id.rsplit('.').next() == Some(short_name))
            .collect();

        let help = if candidates.is_empty() {
            Some("Register the task schema before loading the document".to_string())
        } else {
            Some(format!("Did you mean: {}?", candidates.join(", ")))
        };

        Self::UnknownTask {
            task: None,
            class: class.to_string(),
            help,
        }
    }

    /// Attach the label of the task whose class failed to resolve
    pub fn with_task(self, label: &str) -> Self {
        match self {
            Self::UnknownTask { class, help, .. } => Self::UnknownTask {
                task: Some(label.to_string()),
                class,
                help,
            },
            other => other,
        }
    }

    /// The individual violations carried by a contract failure
    ///
    /// Returns a single-element list for fail-fast violations and every
    /// collected violation for collect-all failures.
    pub fn violations(&self) -> Vec<&CalflowError> {
        match self {
            Self::ContractViolation { .. } => vec![self],
            Self::ContractViolations { violations } => violations.iter().collect(),
            _ => vec![],
        }
    }
}
