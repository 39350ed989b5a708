// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 calflow contributors

//! Source locations for parse errors

use std::fmt;

/// Where in a pipeline document a parse error occurred
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    /// Line/column position reported by the underlying parser
    Position { line: usize, column: usize },
    /// Dotted key path inside the parsed document, e.g. `tasks.isr.class`
    Path(String),
    /// The parser gave no position
    Unknown,
}

impl SourceLocation {
    /// Convert a byte offset into a 1-based line/column position
    pub fn from_offset(source: &str, offset: usize) -> Self {
        let offset = offset.min(source.len());
        let before = &source[..offset];
        let line = before.matches('\n').count() + 1;
        let column = match before.rfind('\n') {
            Some(newline) => offset - newline,
            None => offset + 1,
        };

        Self::Position { line, column }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Position { line, column } => write!(f, "line {}, column {}", line, column),
            Self::Path(path) => write!(f, "'{}'", path),
            Self::Unknown => write!(f, "unknown location"),
        }
    }
}
