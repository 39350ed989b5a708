// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 calflow contributors

//! Loader configuration
//!
//! Controls how strictly documents are checked. Every field has a default,
//! so an empty file (or no file at all) gives the standard behavior:
//!
//! ```toml
//! contract_mode = "collect_all"
//! ambiguous_producers = "error"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::{CalflowError, CalflowResult};

/// How contract failures are reported
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContractMode {
    /// Stop at the first violated contract, in declaration order (default)
    #[default]
    FailFast,
    /// Evaluate every contract and report all violations together
    CollectAll,
}

/// Severity assigned to a diagnostic condition
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Reported alongside the loaded pipeline (default)
    #[default]
    Warning,
    /// Fails the load
    Error,
}

/// Options for [`crate::PipelineLoader`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoaderOptions {
    /// Contract reporting mode
    #[serde(default)]
    pub contract_mode: ContractMode,

    /// Severity of a dataset having more than one producer
    #[serde(default)]
    pub ambiguous_producers: Severity,
}

impl LoaderOptions {
    /// Options for strict deployments: every diagnostic is fatal and all
    /// contract violations are reported at once
    pub fn strict() -> Self {
        Self {
            contract_mode: ContractMode::CollectAll,
            ambiguous_producers: Severity::Error,
        }
    }

    /// Load options from a file (`.toml`, `.yaml` or `.yml`)
    pub fn from_file(path: &Path) -> CalflowResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CalflowError::FileReadError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml(&content),
            Some("yaml") | Some("yml") => Self::from_yaml(&content),
            _ => Err(CalflowError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }

    /// Parse options from TOML
    pub fn from_toml(source: &str) -> CalflowResult<Self> {
        toml::from_str(source).map_err(|e| CalflowError::from_toml(e, source))
    }

    /// Parse options from YAML
    pub fn from_yaml(yaml: &str) -> CalflowResult<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = LoaderOptions::default();
        assert_eq!(options.contract_mode, ContractMode::FailFast);
        assert_eq!(options.ambiguous_producers, Severity::Warning);
        assert_eq!(LoaderOptions::from_toml("").unwrap(), options);
        assert_eq!(LoaderOptions::from_yaml("").unwrap(), options);
    }

    #[test]
    fn test_parse_toml() {
        let options =
            LoaderOptions::from_toml("contract_mode = \"collect_all\"\nambiguous_producers = \"error\"")
                .unwrap();
        assert_eq!(options, LoaderOptions::strict());
    }

    #[test]
    fn test_parse_yaml_partial() {
        let options = LoaderOptions::from_yaml("ambiguous_producers: error").unwrap();
        assert_eq!(options.contract_mode, ContractMode::FailFast);
        assert_eq!(options.ambiguous_producers, Severity::Error);
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(LoaderOptions::from_toml("strictness = 3").is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calflow.toml");
        std::fs::write(&path, "contract_mode = \"collect_all\"\n").unwrap();

        let options = LoaderOptions::from_file(&path).unwrap();
        assert_eq!(options.contract_mode, ContractMode::CollectAll);
    }
}
