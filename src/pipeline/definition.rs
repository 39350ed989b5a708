// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 calflow contributors

//! Pipeline document structures
//!
//! Defines the shape of a pipeline document:
//!
//! ```yaml
//! description: Bias calibration construction
//! parameters:
//!   exposureName: cpBiasProc
//! tasks:
//!   isr:
//!     class: lsst.ip.isr.isrTask.IsrTask
//!     config:
//!       connections.outputExposure: parameters.exposureName
//!       doBias: false
//!   cpBiasCombine:
//!     class: lsst.cp.pipe.cpCombine.CalibCombineTask
//!     config:
//!       connections:
//!         inputExps: parameters.exposureName
//!         outputData: bias
//! contracts:
//!   - isr.doBias == False
//!   - contract: cpBiasCombine.calibrationType == 'bias'
//!     msg: The combine step must be told it is building a bias
//! ```
//!
//! Documents are parsed into a generic tree first so that YAML, JSON and
//! TOML sources share one reader and structural errors can name the key
//! path they occurred at.

use serde_yaml::{Mapping, Value};
use std::path::Path;

use crate::errors::{CalflowError, CalflowResult};
use crate::pipeline::{ConfigValue, Contract};

/// Config key prefix for connection bindings
pub const CONNECTIONS_PREFIX: &str = "connections.";

const TOP_LEVEL_KEYS: &[&str] = &["description", "parameters", "tasks", "contracts"];

/// A parsed pipeline document
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineDocument {
    /// Free-text description
    pub description: String,

    /// Parameters in declaration order
    pub parameters: Vec<(String, ConfigValue)>,

    /// Tasks in declaration order
    pub tasks: Vec<TaskConfig>,

    /// Contracts in declaration order
    pub contracts: Vec<ContractSpec>,
}

/// Configuration of one task
#[derive(Debug, Clone, PartialEq)]
pub struct TaskConfig {
    /// Label the task is known by inside the document
    pub label: String,

    /// Task class identifier, resolved through the task registry
    pub class: String,

    /// Option values in declaration order
    pub options: Vec<(String, ConfigValue)>,

    /// Connection role → dataset name or parameter reference
    pub connections: Vec<(String, ConfigValue)>,
}

impl TaskConfig {
    pub fn new(label: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            class: class.into(),
            options: Vec::new(),
            connections: Vec::new(),
        }
    }

    pub fn option(&self, name: &str) -> Option<&ConfigValue> {
        self.options.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn connection(&self, role: &str) -> Option<&ConfigValue> {
        self.connections.iter().find(|(k, _)| k == role).map(|(_, v)| v)
    }
}

/// A contract together with the author's explanation
#[derive(Debug, Clone, PartialEq)]
pub struct ContractSpec {
    pub contract: Contract,
    pub message: Option<String>,
}

impl PipelineDocument {
    /// Load a document from a file, picking the format from its extension
    pub fn from_file(path: &Path) -> CalflowResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CalflowError::FileReadError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&content),
            Some("json") => Self::from_json(&content),
            Some("toml") => Self::from_toml(&content),
            _ => Err(CalflowError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }

    /// Parse a YAML document
    pub fn from_yaml(yaml: &str) -> CalflowResult<Self> {
        let value: Value = serde_yaml::from_str(yaml)?;
        Self::from_value(&value)
    }

    /// Parse a JSON document
    pub fn from_json(json: &str) -> CalflowResult<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(&value)
    }

    /// Parse a TOML document
    pub fn from_toml(source: &str) -> CalflowResult<Self> {
        let value: Value =
            toml::from_str(source).map_err(|e| CalflowError::from_toml(e, source))?;
        Self::from_value(&value)
    }

    /// Build a document from an already-parsed tree
    pub fn from_value(value: &Value) -> CalflowResult<Self> {
        let root = value
            .as_mapping()
            .ok_or_else(|| CalflowError::at_path("<root>", "document must be a mapping"))?;

        for key in root.keys() {
            let name = key_str(key, "<root>")?;
            if !TOP_LEVEL_KEYS.contains(&name) {
                return Err(CalflowError::Parse {
                    location: crate::errors::SourceLocation::Path(name.to_string()),
                    message: format!("unknown top-level key '{}'", name),
                    help: Some(format!("Allowed keys: {}", TOP_LEVEL_KEYS.join(", "))),
                });
            }
        }

        let description = match root.get("description") {
            Some(Value::String(s)) => s.clone(),
            Some(_) => return Err(CalflowError::at_path("description", "must be a string")),
            None => return Err(CalflowError::at_path("description", "missing required key")),
        };

        let parameters = match root.get("parameters") {
            None | Some(Value::Null) => Vec::new(),
            Some(value) => parse_parameters(value)?,
        };

        let tasks = match root.get("tasks") {
            Some(value) => parse_tasks(value)?,
            None => return Err(CalflowError::at_path("tasks", "missing required key")),
        };

        let contracts = match root.get("contracts") {
            None | Some(Value::Null) => Vec::new(),
            Some(value) => parse_contracts(value)?,
        };

        Ok(Self {
            description,
            parameters,
            tasks,
            contracts,
        })
    }

    /// Convert back into a generic tree
    pub fn to_value(&self) -> Value {
        let mut root = Mapping::new();
        root.insert("description".into(), Value::String(self.description.clone()));

        if !self.parameters.is_empty() {
            let mut params = Mapping::new();
            for (name, value) in &self.parameters {
                params.insert(name.as_str().into(), value.to_yaml());
            }
            root.insert("parameters".into(), Value::Mapping(params));
        }

        let mut tasks = Mapping::new();
        for task in &self.tasks {
            let mut config = Mapping::new();
            for (role, value) in &task.connections {
                config.insert(format!("{}{}", CONNECTIONS_PREFIX, role).into(), value.to_yaml());
            }
            for (name, value) in &task.options {
                config.insert(name.as_str().into(), value.to_yaml());
            }

            let mut entry = Mapping::new();
            entry.insert("class".into(), Value::String(task.class.clone()));
            entry.insert("config".into(), Value::Mapping(config));
            tasks.insert(task.label.as_str().into(), Value::Mapping(entry));
        }
        root.insert("tasks".into(), Value::Mapping(tasks));

        if !self.contracts.is_empty() {
            let contracts = self
                .contracts
                .iter()
                .map(|spec| match &spec.message {
                    None => Value::String(spec.contract.expression.clone()),
                    Some(msg) => {
                        let mut entry = Mapping::new();
                        entry.insert("contract".into(), spec.contract.expression.as_str().into());
                        entry.insert("msg".into(), msg.as_str().into());
                        Value::Mapping(entry)
                    }
                })
                .collect();
            root.insert("contracts".into(), Value::Sequence(contracts));
        }

        Value::Mapping(root)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> CalflowResult<String> {
        serde_yaml::to_string(&self.to_value()).map_err(Into::into)
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> CalflowResult<String> {
        serde_json::to_string_pretty(&self.to_value()).map_err(|e| CalflowError::Serialize {
            message: e.to_string(),
        })
    }

    /// Get a task by label
    pub fn get_task(&self, label: &str) -> Option<&TaskConfig> {
        self.tasks.iter().find(|t| t.label == label)
    }

    /// Get all task labels in declaration order
    pub fn task_labels(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.label.as_str()).collect()
    }

    /// Get a parameter's bound value
    pub fn parameter(&self, name: &str) -> Option<&ConfigValue> {
        self.parameters.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }
}

fn key_str<'a>(key: &'a Value, path: &str) -> CalflowResult<&'a str> {
    key.as_str()
        .ok_or_else(|| CalflowError::at_path(path, "mapping keys must be strings"))
}

fn parse_parameters(value: &Value) -> CalflowResult<Vec<(String, ConfigValue)>> {
    let mapping = value
        .as_mapping()
        .ok_or_else(|| CalflowError::at_path("parameters", "must be a mapping"))?;

    mapping
        .iter()
        .map(|(key, value)| {
            let name = key_str(key, "parameters")?;
            let path = format!("parameters.{}", name);
            Ok((name.to_string(), ConfigValue::from_yaml(value, &path)?))
        })
        .collect()
}

fn parse_tasks(value: &Value) -> CalflowResult<Vec<TaskConfig>> {
    let mapping = value
        .as_mapping()
        .ok_or_else(|| CalflowError::at_path("tasks", "must be a mapping of label to task"))?;

    if mapping.is_empty() {
        return Err(CalflowError::at_path("tasks", "pipeline has no tasks defined"));
    }

    let mut tasks: Vec<TaskConfig> = Vec::with_capacity(mapping.len());
    for (key, value) in mapping {
        let label = key_str(key, "tasks")?;
        let path = format!("tasks.{}", label);
        tasks.push(parse_task(label, value, &path)?);
    }

    Ok(tasks)
}

fn parse_task(label: &str, value: &Value, path: &str) -> CalflowResult<TaskConfig> {
    // `label: some.TaskClass` is shorthand for a task with no config
    if let Value::String(class) = value {
        return Ok(TaskConfig::new(label, class.clone()));
    }

    let entry = value
        .as_mapping()
        .ok_or_else(|| CalflowError::at_path(path, "task must be a class name or a mapping"))?;

    for key in entry.keys() {
        let name = key_str(key, path)?;
        if name != "class" && name != "config" {
            return Err(CalflowError::at_path(
                format!("{}.{}", path, name),
                "unknown task key (expected 'class' or 'config')",
            ));
        }
    }

    let class = match entry.get("class") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        _ => {
            return Err(CalflowError::at_path(
                format!("{}.class", path),
                "task class must be a non-empty string",
            ))
        }
    };

    let mut task = TaskConfig::new(label, class);

    let config_path = format!("{}.config", path);
    let mut flat = Vec::new();
    match entry.get("config") {
        None | Some(Value::Null) => {}
        Some(Value::Mapping(config)) => flatten_config(config, "", &config_path, &mut flat)?,
        Some(_) => return Err(CalflowError::at_path(config_path, "config must be a mapping")),
    }

    for (key, value) in flat {
        let duplicate = task.option(&key).is_some()
            || key
                .strip_prefix(CONNECTIONS_PREFIX)
                .is_some_and(|role| task.connection(role).is_some());
        if duplicate {
            return Err(CalflowError::at_path(
                format!("{}.{}", config_path, key),
                "key is set more than once",
            ));
        }

        match key.strip_prefix(CONNECTIONS_PREFIX) {
            Some(role) => task.connections.push((role.to_string(), value)),
            None => task.options.push((key, value)),
        }
    }

    Ok(task)
}

/// Flatten nested config mappings into dotted keys
fn flatten_config(
    mapping: &Mapping,
    prefix: &str,
    path: &str,
    out: &mut Vec<(String, ConfigValue)>,
) -> CalflowResult<()> {
    for (key, value) in mapping {
        let name = key_str(key, path)?;
        let dotted = if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", prefix, name)
        };
        let value_path = format!("{}.{}", path, name);

        match value {
            Value::Mapping(nested) => flatten_config(nested, &dotted, &value_path, out)?,
            other => out.push((dotted, ConfigValue::from_yaml(other, &value_path)?)),
        }
    }
    Ok(())
}

fn parse_contracts(value: &Value) -> CalflowResult<Vec<ContractSpec>> {
    let items = value
        .as_sequence()
        .ok_or_else(|| CalflowError::at_path("contracts", "must be a list"))?;

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let path = format!("contracts[{}]", i);
            let (expression, message) = match item {
                Value::String(s) => (s.as_str(), None),
                Value::Mapping(entry) => {
                    let expression = entry.get("contract").and_then(Value::as_str).ok_or_else(
                        || CalflowError::at_path(&path, "missing 'contract' expression"),
                    )?;
                    let message = match entry.get("msg") {
                        None => None,
                        Some(Value::String(msg)) => Some(msg.clone()),
                        Some(_) => {
                            return Err(CalflowError::at_path(
                                format!("{}.msg", path),
                                "must be a string",
                            ))
                        }
                    };
                    (expression, message)
                }
                _ => {
                    return Err(CalflowError::at_path(
                        &path,
                        "contract must be a string or a {contract, msg} mapping",
                    ))
                }
            };

            let contract = Contract::parse(expression).map_err(|reason| CalflowError::Parse {
                location: crate::errors::SourceLocation::Path(path.clone()),
                message: format!("invalid contract '{}': {}", expression, reason),
                help: Some("Contracts have the form '<task>.<field> == <value>'".into()),
            })?;

            Ok(ContractSpec { contract, message })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BIAS_YAML: &str = r#"
description: Bias calibration
parameters:
  exposureName: cpBiasProc
tasks:
  isr:
    class: lsst.ip.isr.isrTask.IsrTask
    config:
      connections.ccdExposure: raw
      connections.outputExposure: parameters.exposureName
      doBias: false
      overscan:
        fitType: MEDIAN_PER_ROW
  cpBiasCombine:
    class: lsst.cp.pipe.cpCombine.CalibCombineTask
    config:
      connections:
        inputExps: parameters.exposureName
        outputData: bias
      calibrationType: bias
contracts:
  - isr.doBias == False
  - contract: cpBiasCombine.calibrationType == 'bias'
    msg: Combine must build a bias
"#;

    #[test]
    fn test_parse_document() {
        let doc = PipelineDocument::from_yaml(BIAS_YAML).unwrap();

        assert_eq!(doc.description, "Bias calibration");
        assert_eq!(doc.task_labels(), vec!["isr", "cpBiasCombine"]);
        assert_eq!(doc.parameter("exposureName"), Some(&ConfigValue::from("cpBiasProc")));
        assert_eq!(doc.contracts.len(), 2);
        assert_eq!(doc.contracts[1].message.as_deref(), Some("Combine must build a bias"));
    }

    #[test]
    fn test_nested_config_is_flattened() {
        let doc = PipelineDocument::from_yaml(BIAS_YAML).unwrap();

        let isr = doc.get_task("isr").unwrap();
        assert_eq!(isr.option("overscan.fitType"), Some(&ConfigValue::from("MEDIAN_PER_ROW")));
        assert_eq!(isr.option("doBias"), Some(&ConfigValue::Bool(false)));
        assert_eq!(
            isr.connection("outputExposure"),
            Some(&ConfigValue::from("parameters.exposureName"))
        );

        let combine = doc.get_task("cpBiasCombine").unwrap();
        assert_eq!(combine.connection("outputData"), Some(&ConfigValue::from("bias")));
    }

    #[test]
    fn test_class_shorthand() {
        let yaml = r#"
description: shorthand
tasks:
  isr: lsst.ip.isr.isrTask.IsrTask
"#;
        let doc = PipelineDocument::from_yaml(yaml).unwrap();
        assert_eq!(doc.tasks[0].class, "lsst.ip.isr.isrTask.IsrTask");
        assert!(doc.tasks[0].options.is_empty());
    }

    #[test]
    fn test_syntax_error_has_position() {
        let result = PipelineDocument::from_yaml("description: [unterminated\ntasks: {}");
        match result {
            Err(CalflowError::Parse { location, .. }) => {
                assert!(matches!(location, crate::errors::SourceLocation::Position { .. }));
            }
            other => panic!("Expected Parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_structural_error_names_key_path() {
        let yaml = r#"
description: bad
tasks:
  isr:
    class: lsst.ip.isr.isrTask.IsrTask
    config:
      doBias: ~
"#;
        let err = PipelineDocument::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("tasks.isr.config.doBias"));
    }

    #[test]
    fn test_duplicate_flattened_key_rejected() {
        let yaml = r#"
description: dup
tasks:
  isr:
    class: lsst.ip.isr.isrTask.IsrTask
    config:
      overscan.order: 1
      overscan:
        order: 2
"#;
        let err = PipelineDocument::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_duplicate_task_label_is_parse_error() {
        let yaml = r#"
description: dup
tasks:
  isr: lsst.ip.isr.isrTask.IsrTask
  isr: lsst.ip.isr.isrTask.IsrTask
"#;
        let err = PipelineDocument::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, CalflowError::Parse { .. }));
        assert!(err.to_string().contains("isr"));
    }

    #[test]
    fn test_missing_tasks_and_unknown_keys() {
        assert!(PipelineDocument::from_yaml("description: none").is_err());

        let err = PipelineDocument::from_yaml("description: x\ntasks: {a: b.C}\nsubsets: {}")
            .unwrap_err();
        assert!(err.to_string().contains("subsets"));
    }

    #[test]
    fn test_invalid_contract_is_parse_error() {
        let yaml = r#"
description: bad contract
tasks:
  isr: lsst.ip.isr.isrTask.IsrTask
contracts:
  - isr.doBias is False
"#;
        let err = PipelineDocument::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, CalflowError::Parse { .. }));
        assert!(err.to_string().contains("contracts[0]"));
    }

    #[test]
    fn test_json_and_toml_sources() {
        let json = r#"{
  "description": "json doc",
  "tasks": {"isr": {"class": "lsst.ip.isr.isrTask.IsrTask", "config": {"doBias": false}}},
  "contracts": ["isr.doBias == False"]
}"#;
        let doc = PipelineDocument::from_json(json).unwrap();
        assert_eq!(doc.tasks[0].option("doBias"), Some(&ConfigValue::Bool(false)));

        let toml_src = r#"
description = "toml doc"
contracts = ["isr.doBias == False"]

[tasks.isr]
class = "lsst.ip.isr.isrTask.IsrTask"

[tasks.isr.config]
doBias = false
"#;
        let doc = PipelineDocument::from_toml(toml_src).unwrap();
        assert_eq!(doc.tasks[0].label, "isr");
        assert_eq!(doc.contracts.len(), 1);
    }

    #[test]
    fn test_round_trip_yaml() {
        let doc = PipelineDocument::from_yaml(BIAS_YAML).unwrap();
        let yaml = doc.to_yaml().unwrap();
        let parsed = PipelineDocument::from_yaml(&yaml).unwrap();

        assert_eq!(parsed.task_labels(), doc.task_labels());
        assert_eq!(parsed.contracts, doc.contracts);
        assert_eq!(parsed.parameters, doc.parameters);
    }

    #[test]
    fn test_from_file_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cpBias.yaml");
        std::fs::write(&path, BIAS_YAML).unwrap();

        let doc = PipelineDocument::from_file(&path).unwrap();
        assert_eq!(doc.tasks.len(), 2);

        let bad = dir.path().join("cpBias.ini");
        std::fs::write(&bad, BIAS_YAML).unwrap();
        assert!(matches!(
            PipelineDocument::from_file(&bad),
            Err(CalflowError::UnsupportedFormat { .. })
        ));
    }
}
