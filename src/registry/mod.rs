// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 calflow contributors

//! Task registry
//!
//! Maps task class identifiers to the schema of their configuration
//! surface: recognized options with value kinds and defaults, and the
//! input/output connection roles with default dataset names.
//!
//! The schemas of the calibration task families shipped with the external
//! framework are provided as [`TaskFamily`] implementations; other
//! frameworks can hand over a schema table through [`TaskRegistry::from_yaml`].

mod combine;
mod dark;
mod flat;
mod isr;
mod ptc;

pub use combine::CombineFamily;
pub use dark::DarkFamily;
pub use flat::FlatFamily;
pub use isr::IsrFamily;
pub use ptc::PtcFamily;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::errors::{CalflowError, CalflowResult};
use crate::pipeline::{ConfigValue, PARAMETER_PREFIX};

/// Kind of value an option accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionKind {
    Bool,
    String,
    Int,
    /// Any number; integers are accepted
    Float,
    /// One tag out of `allowed`
    Choice,
    /// Ordered list of scalars; string items are checked against `allowed`
    /// when it is non-empty
    List,
}

/// Declaration of one configurable option
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionSpec {
    pub kind: OptionKind,

    /// Allowed tags for `choice` and `list` options
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed: Vec<String>,

    /// Value used when the document does not set the option
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<ConfigValue>,
}

impl OptionSpec {
    /// Check whether `value` is acceptable for this option
    pub fn accepts(&self, value: &ConfigValue) -> bool {
        match (self.kind, value) {
            (OptionKind::Bool, ConfigValue::Bool(_)) => true,
            (OptionKind::String, ConfigValue::String(_)) => true,
            (OptionKind::Int, ConfigValue::Int(_)) => true,
            (OptionKind::Float, ConfigValue::Int(_) | ConfigValue::Float(_)) => true,
            (OptionKind::Choice, ConfigValue::String(tag)) => self.allowed.contains(tag),
            (OptionKind::List, ConfigValue::List(items)) => items.iter().all(|item| match item {
                ConfigValue::String(tag) => self.allowed.is_empty() || self.allowed.contains(tag),
                ConfigValue::List(_) => false,
                _ => true,
            }),
            _ => false,
        }
    }

    /// Describe the expected value, for error messages
    pub fn expected(&self) -> String {
        match self.kind {
            OptionKind::Bool => "a boolean".into(),
            OptionKind::String => "a string".into(),
            OptionKind::Int => "an integer".into(),
            OptionKind::Float => "a number".into(),
            OptionKind::Choice => format!("one of [{}]", self.allowed.join(", ")),
            OptionKind::List if self.allowed.is_empty() => "a list of scalars".into(),
            OptionKind::List => format!("a list of [{}]", self.allowed.join(", ")),
        }
    }
}

/// Declaration of one connection role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSpec {
    /// Default dataset name
    pub dataset: String,

    /// Boolean option that must be true for the connection to exist
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled_by: Option<String>,
}

/// Configuration surface of one task class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSchema {
    /// Fully qualified task class identifier
    pub identifier: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub options: BTreeMap<String, OptionSpec>,

    #[serde(default)]
    pub inputs: BTreeMap<String, ConnectionSpec>,

    #[serde(default)]
    pub outputs: BTreeMap<String, ConnectionSpec>,
}

impl TaskSchema {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            description: None,
            options: BTreeMap::new(),
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
        }
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    fn with_option(
        mut self,
        name: &str,
        kind: OptionKind,
        allowed: &[&str],
        default: ConfigValue,
    ) -> Self {
        self.options.insert(
            name.to_string(),
            OptionSpec {
                kind,
                allowed: allowed.iter().map(|s| s.to_string()).collect(),
                default: Some(default),
            },
        );
        self
    }

    pub fn flag(self, name: &str, default: bool) -> Self {
        self.with_option(name, OptionKind::Bool, &[], default.into())
    }

    pub fn string(self, name: &str, default: &str) -> Self {
        self.with_option(name, OptionKind::String, &[], default.into())
    }

    pub fn int(self, name: &str, default: i64) -> Self {
        self.with_option(name, OptionKind::Int, &[], default.into())
    }

    pub fn float(self, name: &str, default: f64) -> Self {
        self.with_option(name, OptionKind::Float, &[], default.into())
    }

    pub fn choice(self, name: &str, allowed: &[&str], default: &str) -> Self {
        self.with_option(name, OptionKind::Choice, allowed, default.into())
    }

    /// List option whose string items are restricted to `allowed` (if non-empty)
    pub fn list(self, name: &str, allowed: &[&str], default: Vec<&str>) -> Self {
        self.with_option(name, OptionKind::List, allowed, default.into())
    }

    pub fn input(mut self, role: &str, dataset: &str) -> Self {
        self.inputs.insert(role.to_string(), connection(dataset, None));
        self
    }

    /// Input that only exists when the boolean option `option` is true
    pub fn input_if(mut self, role: &str, dataset: &str, option: &str) -> Self {
        self.inputs.insert(role.to_string(), connection(dataset, Some(option)));
        self
    }

    pub fn output(mut self, role: &str, dataset: &str) -> Self {
        self.outputs.insert(role.to_string(), connection(dataset, None));
        self
    }

    pub fn option(&self, name: &str) -> Option<&OptionSpec> {
        self.options.get(name)
    }

    /// Look up a connection role among inputs, then outputs
    pub fn connection(&self, role: &str) -> Option<&ConnectionSpec> {
        self.inputs.get(role).or_else(|| self.outputs.get(role))
    }

    pub fn has_connection(&self, role: &str) -> bool {
        self.connection(role).is_some()
    }

    /// Check that the schema is internally consistent
    pub fn validate(&self) -> CalflowResult<()> {
        for (name, spec) in &self.options {
            if let Some(default) = &spec.default {
                if !spec.accepts(default) {
                    return Err(self.invalid(format!(
                        "default {} of option '{}' is not {}",
                        default,
                        name,
                        spec.expected()
                    )));
                }
                if default.parameter_reference().is_some() {
                    return Err(self.invalid(format!(
                        "default of option '{}' must not be a parameter reference",
                        name
                    )));
                }
            }
        }

        for role in self.inputs.keys() {
            if self.outputs.contains_key(role) {
                return Err(self.invalid(format!(
                    "role '{}' is declared as both input and output",
                    role
                )));
            }
        }

        for (role, spec) in self.inputs.iter().chain(&self.outputs) {
            if spec.dataset.is_empty() {
                return Err(self.invalid(format!("role '{}' has an empty default dataset", role)));
            }
            if spec.dataset.starts_with(PARAMETER_PREFIX) {
                return Err(self.invalid(format!(
                    "default dataset of role '{}' must not be a parameter reference",
                    role
                )));
            }

            if let Some(option) = &spec.enabled_by {
                match self.options.get(option) {
                    Some(guard) if guard.kind == OptionKind::Bool => {}
                    Some(_) => {
                        return Err(self.invalid(format!(
                            "role '{}' is enabled by '{}', which is not a boolean option",
                            role, option
                        )))
                    }
                    None => {
                        return Err(self.invalid(format!(
                            "role '{}' is enabled by unknown option '{}'",
                            role, option
                        )))
                    }
                }
            }
        }

        Ok(())
    }

    fn invalid(&self, message: String) -> CalflowError {
        CalflowError::InvalidSchema {
            identifier: self.identifier.clone(),
            message,
        }
    }
}

fn connection(dataset: &str, enabled_by: Option<&str>) -> ConnectionSpec {
    ConnectionSpec {
        dataset: dataset.to_string(),
        enabled_by: enabled_by.map(str::to_string),
    }
}

/// A family of related external tasks whose schemas are known up front
pub trait TaskFamily: Send + Sync {
    /// Short family name, for logging
    fn name(&self) -> &'static str;

    /// Schemas of every task class in the family
    fn schemas(&self) -> Vec<TaskSchema>;
}

/// Create the built-in calibration task families
pub fn default_families() -> Vec<Box<dyn TaskFamily>> {
    vec![
        Box::new(IsrFamily),
        Box::new(CombineFamily),
        Box::new(PtcFamily),
        Box::new(FlatFamily),
        Box::new(DarkFamily),
    ]
}

/// Lookup table from task class identifier to schema
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    schemas: HashMap<String, TaskSchema>,
}

impl TaskRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in task family
    pub fn builtin() -> Self {
        Self::with_families(&default_families())
    }

    /// Registry holding the given task families
    pub fn with_families(families: &[Box<dyn TaskFamily>]) -> Self {
        let mut registry = Self::new();
        for family in families {
            let schemas = family.schemas();
            tracing::debug!(family = family.name(), tasks = schemas.len(), "Registering task family");
            for schema in schemas {
                registry.register(schema);
            }
        }
        registry
    }

    /// Parse a schema table (a YAML list of task schemas)
    ///
    /// Every schema is validated before it is registered.
    pub fn from_yaml(yaml: &str) -> CalflowResult<Self> {
        let schemas: Vec<TaskSchema> = serde_yaml::from_str(yaml)?;
        let mut registry = Self::new();
        for schema in schemas {
            schema.validate()?;
            registry.register(schema);
        }
        Ok(registry)
    }

    /// Add a schema, returning the one it replaced
    pub fn register(&mut self, schema: TaskSchema) -> Option<TaskSchema> {
        self.schemas.insert(schema.identifier.clone(), schema)
    }

    /// Look up the schema of a task class
    pub fn lookup(&self, identifier: &str) -> CalflowResult<&TaskSchema> {
        self.schemas
            .get(identifier)
            .ok_or_else(|| CalflowError::unknown_task(identifier, self.identifiers()))
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.schemas.contains_key(identifier)
    }

    /// Registered identifiers in sorted order
    pub fn identifiers(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.schemas.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
