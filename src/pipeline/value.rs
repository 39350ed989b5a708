// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 calflow contributors

//! Typed configuration values
//!
//! Option and connection values in a pipeline document are typed scalars or
//! ordered sequences of them. Enumerated tags are carried as strings and are
//! checked against the task schema by the loader.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{CalflowError, CalflowResult};

/// Prefix marking a value as a reference to a document-level parameter
pub const PARAMETER_PREFIX: &str = "parameters.";

/// A single configuration value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<ConfigValue>),
}

impl ConfigValue {
    /// Convert a parsed YAML node, reporting `path` on failure
    pub fn from_yaml(value: &serde_yaml::Value, path: &str) -> CalflowResult<Self> {
        use serde_yaml::Value;

        match value {
            Value::Bool(b) => Ok(Self::Bool(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Self::Int(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(Self::Float(f))
                } else {
                    Err(CalflowError::at_path(path, format!("number {} is out of range", n)))
                }
            }
            Value::String(s) => Ok(Self::String(s.clone())),
            Value::Sequence(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| Self::from_yaml(item, &format!("{}[{}]", path, i)))
                .collect::<CalflowResult<Vec<_>>>()
                .map(Self::List),
            Value::Null => Err(CalflowError::at_path(path, "value must not be null")),
            Value::Mapping(_) => Err(CalflowError::at_path(
                path,
                "mappings are only allowed as nested option groups",
            )),
            Value::Tagged(tagged) => Err(CalflowError::at_path(
                path,
                format!("unsupported tagged value '{}'", tagged.tag),
            )),
        }
    }

    /// Convert back into a YAML node
    pub fn to_yaml(&self) -> serde_yaml::Value {
        use serde_yaml::Value;

        match self {
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::Number((*i).into()),
            Self::Float(f) => Value::Number((*f).into()),
            Self::String(s) => Value::String(s.clone()),
            Self::List(items) => Value::Sequence(items.iter().map(Self::to_yaml).collect()),
        }
    }

    /// The parameter name if this value is a `parameters.<name>` reference
    pub fn parameter_reference(&self) -> Option<&str> {
        match self {
            Self::String(s) => s.strip_prefix(PARAMETER_PREFIX),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Equality with int/float compared numerically
    pub fn matches(&self, other: &ConfigValue) -> bool {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::List(a), Self::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.matches(y))
            }
            _ => match (self.as_number(), other.as_number()) {
                (Some(a), Some(b)) => a == b,
                _ => self == other,
            },
        }
    }

    /// Human-readable kind name used in error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::List(_) => "list",
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(true) => write!(f, "True"),
            Self::Bool(false) => write!(f, "False"),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{:?}", x),
            Self::String(s) => write!(f, "'{}'", s),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for ConfigValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for ConfigValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<Vec<&str>> for ConfigValue {
    fn from(items: Vec<&str>) -> Self {
        Self::List(items.into_iter().map(Self::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_yaml_scalars() {
        let value: serde_yaml::Value = serde_yaml::from_str("[true, 3, 2.5, bias]").unwrap();
        let parsed = ConfigValue::from_yaml(&value, "x").unwrap();

        assert_eq!(
            parsed,
            ConfigValue::List(vec![
                ConfigValue::Bool(true),
                ConfigValue::Int(3),
                ConfigValue::Float(2.5),
                ConfigValue::String("bias".into()),
            ])
        );
    }

    #[test]
    fn test_null_is_rejected_with_path() {
        let value: serde_yaml::Value = serde_yaml::from_str("~").unwrap();
        let err = ConfigValue::from_yaml(&value, "tasks.isr.config.doBias").unwrap_err();
        assert!(err.to_string().contains("tasks.isr.config.doBias"));
    }

    #[test]
    fn test_parameter_reference() {
        let value = ConfigValue::from("parameters.exposureName");
        assert_eq!(value.parameter_reference(), Some("exposureName"));
        assert_eq!(ConfigValue::from("raw").parameter_reference(), None);
    }

    #[test]
    fn test_numeric_match_across_kinds() {
        assert!(ConfigValue::Int(8).matches(&ConfigValue::Float(8.0)));
        assert!(!ConfigValue::Int(8).matches(&ConfigValue::Float(8.5)));
        assert!(!ConfigValue::from("8").matches(&ConfigValue::Int(8)));
    }

    #[test]
    fn test_display_uses_capitalized_booleans() {
        assert_eq!(ConfigValue::Bool(false).to_string(), "False");
        assert_eq!(ConfigValue::from(vec!["BAD", "SAT"]).to_string(), "['BAD', 'SAT']");
    }
}
