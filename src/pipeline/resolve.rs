// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 calflow contributors

//! Connection resolution
//!
//! Binds every task's options and connection roles to concrete values:
//! configured value if present, schema default otherwise, with one level of
//! `parameters.<name>` substitution. Connections guarded by a boolean option
//! that resolves to false are pruned. The resolved connections are then
//! assembled into a [`DatasetFlowGraph`].

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::errors::{CalflowError, CalflowResult};
use crate::pipeline::{ConfigValue, DatasetFlowGraph, PipelineDocument, TaskConfig};
use crate::registry::{ConnectionSpec, TaskRegistry, TaskSchema};

/// A task with every option and connection bound
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedTask {
    pub label: String,
    pub class: String,

    /// Every option known to the schema, configured or defaulted
    pub options: BTreeMap<String, ConfigValue>,

    /// Active input role → dataset name
    pub inputs: BTreeMap<String, String>,

    /// Active output role → dataset name
    pub outputs: BTreeMap<String, String>,
}

impl ResolvedTask {
    /// Look up a contract field: an option name or `connections.<role>`
    pub fn field(&self, field: &str) -> Option<ConfigValue> {
        if let Some(role) = field.strip_prefix(super::CONNECTIONS_PREFIX) {
            return self
                .inputs
                .get(role)
                .or_else(|| self.outputs.get(role))
                .map(|dataset| ConfigValue::String(dataset.clone()));
        }
        self.options.get(field).cloned()
    }
}

/// Non-fatal diagnostic produced while resolving a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineWarning {
    /// More than one task writes the same dataset name
    AmbiguousProducer {
        dataset: String,
        producers: Vec<String>,
    },
}

impl fmt::Display for PipelineWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AmbiguousProducer { dataset, producers } => write!(
                f,
                "Dataset '{}' is produced by more than one task: {}",
                dataset,
                producers.join(", ")
            ),
        }
    }
}

/// Output of connection resolution
#[derive(Debug, Clone)]
pub struct Resolution {
    pub tasks: Vec<ResolvedTask>,
    pub graph: DatasetFlowGraph,
    pub warnings: Vec<PipelineWarning>,
}

/// Resolves task configs against their schemas
pub struct ConnectionResolver;

impl ConnectionResolver {
    /// Resolve every task of a document
    pub fn resolve(document: &PipelineDocument, registry: &TaskRegistry) -> CalflowResult<Resolution> {
        let mut tasks = Vec::with_capacity(document.tasks.len());

        for task in &document.tasks {
            let schema = registry
                .lookup(&task.class)
                .map_err(|e| e.with_task(&task.label))?;
            tasks.push(Self::resolve_task(task, schema, document)?);
        }

        let graph = DatasetFlowGraph::build(&tasks);

        let warnings: Vec<PipelineWarning> = graph
            .ambiguous_producers()
            .into_iter()
            .map(|(dataset, producers)| {
                tracing::warn!(
                    dataset = %dataset,
                    producers = %producers.join(", "),
                    "Dataset has more than one producer"
                );
                PipelineWarning::AmbiguousProducer { dataset, producers }
            })
            .collect();

        Ok(Resolution {
            tasks,
            graph,
            warnings,
        })
    }

    /// Resolve one task against its schema
    pub fn resolve_task(
        task: &TaskConfig,
        schema: &TaskSchema,
        document: &PipelineDocument,
    ) -> CalflowResult<ResolvedTask> {
        let options = Self::resolve_options(task, schema, document)?;

        for (role, _) in &task.connections {
            if !schema.has_connection(role) {
                let mut roles: Vec<&str> = schema
                    .inputs
                    .keys()
                    .chain(schema.outputs.keys())
                    .map(String::as_str)
                    .collect();
                roles.sort_unstable();

                return Err(CalflowError::UnknownConnection {
                    task: task.label.clone(),
                    class: task.class.clone(),
                    role: role.clone(),
                    help: Some(format!("Known connections: {}", roles.join(", "))),
                });
            }
        }

        let inputs = Self::resolve_connections(task, &schema.inputs, &options, document)?;
        let outputs = Self::resolve_connections(task, &schema.outputs, &options, document)?;

        tracing::debug!(
            task = %task.label,
            class = %task.class,
            inputs = inputs.len(),
            outputs = outputs.len(),
            "Resolved task"
        );

        Ok(ResolvedTask {
            label: task.label.clone(),
            class: task.class.clone(),
            options,
            inputs,
            outputs,
        })
    }

    fn resolve_options(
        task: &TaskConfig,
        schema: &TaskSchema,
        document: &PipelineDocument,
    ) -> CalflowResult<BTreeMap<String, ConfigValue>> {
        let mut options: BTreeMap<String, ConfigValue> = schema
            .options
            .iter()
            .filter_map(|(name, spec)| spec.default.clone().map(|d| (name.clone(), d)))
            .collect();

        for (name, value) in &task.options {
            let spec = schema.option(name).ok_or_else(|| CalflowError::UnknownOption {
                task: task.label.clone(),
                class: task.class.clone(),
                option: name.clone(),
                help: None,
            })?;

            let value = substitute(value, document, &task.label, name)?;
            if !spec.accepts(&value) {
                return Err(CalflowError::InvalidOptionValue {
                    task: task.label.clone(),
                    option: name.clone(),
                    expected: spec.expected(),
                    actual: value,
                });
            }

            options.insert(name.clone(), value);
        }

        Ok(options)
    }

    fn resolve_connections(
        task: &TaskConfig,
        declared: &BTreeMap<String, ConnectionSpec>,
        options: &BTreeMap<String, ConfigValue>,
        document: &PipelineDocument,
    ) -> CalflowResult<BTreeMap<String, String>> {
        let mut resolved = BTreeMap::new();

        for (role, spec) in declared {
            if let Some(option) = &spec.enabled_by {
                if options.get(option) == Some(&ConfigValue::Bool(false)) {
                    tracing::debug!(task = %task.label, role = %role, option = %option, "Connection disabled");
                    continue;
                }
            }

            let field = format!("{}{}", super::CONNECTIONS_PREFIX, role);
            let value = match task.connection(role) {
                Some(configured) => substitute(configured, document, &task.label, &field)?,
                None => ConfigValue::String(spec.dataset.clone()),
            };

            match value {
                ConfigValue::String(dataset) if !dataset.is_empty() => {
                    resolved.insert(role.clone(), dataset);
                }
                other => {
                    return Err(CalflowError::InvalidConnection {
                        task: task.label.clone(),
                        role: role.clone(),
                        value: other,
                    })
                }
            }
        }

        Ok(resolved)
    }
}

/// Replace a `parameters.<name>` reference by the parameter's value
///
/// Only one level is followed: a parameter whose value is itself a
/// reference is returned as-is.
fn substitute(
    value: &ConfigValue,
    document: &PipelineDocument,
    task: &str,
    field: &str,
) -> CalflowResult<ConfigValue> {
    match value.parameter_reference() {
        None => Ok(value.clone()),
        Some(name) => document.parameter(name).cloned().ok_or_else(|| {
            CalflowError::UnresolvedParameter {
                task: task.to_string(),
                field: field.to_string(),
                parameter: name.to_string(),
            }
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(yaml: &str) -> CalflowResult<Resolution> {
        let document = PipelineDocument::from_yaml(yaml)?;
        ConnectionResolver::resolve(&document, &TaskRegistry::builtin())
    }

    const BIAS: &str = r#"
description: bias
parameters:
  exposureName: cpBiasProc
tasks:
  isr:
    class: lsst.ip.isr.isrTask.IsrTask
    config:
      connections.outputExposure: parameters.exposureName
      doBias: false
      doDark: false
      doFlat: false
      doDefect: false
      doLinearize: false
      doFringe: false
  cpBiasCombine:
    class: lsst.cp.pipe.cpCombine.CalibCombineTask
    config:
      connections.inputExps: parameters.exposureName
      connections.outputData: bias
      calibrationType: bias
"#;

    #[test]
    fn test_parameters_are_substituted() {
        let resolution = resolve(BIAS).unwrap();
        let isr = &resolution.tasks[0];

        assert_eq!(isr.outputs["outputExposure"], "cpBiasProc");
        assert_eq!(resolution.tasks[1].inputs["inputExps"], "cpBiasProc");
    }

    #[test]
    fn test_defaults_fill_unset_values() {
        let resolution = resolve(BIAS).unwrap();
        let isr = &resolution.tasks[0];

        assert_eq!(isr.inputs["ccdExposure"], "raw");
        assert_eq!(isr.options["doVariance"], ConfigValue::Bool(true));
        assert_eq!(isr.options["doBias"], ConfigValue::Bool(false));
    }

    #[test]
    fn test_disabled_connections_are_pruned() {
        let resolution = resolve(BIAS).unwrap();
        let isr = &resolution.tasks[0];

        assert!(!isr.inputs.contains_key("bias"));
        assert!(!isr.inputs.contains_key("flat"));
        assert!(isr.inputs.contains_key("camera"));
    }

    #[test]
    fn test_edges_follow_dataset_names() {
        let resolution = resolve(BIAS).unwrap();
        assert_eq!(
            resolution.graph.edges(),
            vec![("isr".to_string(), "cpBiasCombine".to_string(), "cpBiasProc".to_string())]
        );
        assert!(resolution.warnings.is_empty());
    }

    #[test]
    fn test_undeclared_parameter() {
        let yaml = r#"
description: missing parameter
tasks:
  isr:
    class: lsst.ip.isr.isrTask.IsrTask
    config:
      connections.outputExposure: parameters.exposureName
"#;
        let result = resolve(yaml);
        match result {
            Err(CalflowError::UnresolvedParameter { task, field, parameter }) => {
                assert_eq!(task, "isr");
                assert_eq!(field, "connections.outputExposure");
                assert_eq!(parameter, "exposureName");
            }
            other => panic!("Expected UnresolvedParameter, got {:?}", other),
        }
    }

    #[test]
    fn test_parameter_substitution_is_single_level() {
        let yaml = r#"
description: chained
parameters:
  a: parameters.b
  b: real
tasks:
  cpCombine:
    class: lsst.cp.pipe.cpCombine.CalibCombineTask
    config:
      connections.outputData: parameters.a
"#;
        let resolution = resolve(yaml).unwrap();
        assert_eq!(resolution.tasks[0].outputs["outputData"], "parameters.b");
    }

    #[test]
    fn test_chained_parameter_survives_round_trip() {
        let yaml = r#"
description: chained
parameters:
  a: parameters.b
  b: real
tasks:
  cpCombine:
    class: lsst.cp.pipe.cpCombine.CalibCombineTask
    config:
      connections.outputData: parameters.a
      calibrationType: parameters.a
"#;
        let registry = TaskRegistry::builtin();
        let loader = crate::pipeline::PipelineLoader::new(&registry);

        let original = loader.load_yaml(yaml).unwrap();
        let written = original.to_document().to_yaml().unwrap();
        let reloaded = loader.load_yaml(&written).unwrap();

        assert_eq!(reloaded.tasks()[0].outputs["outputData"], "parameters.b");
        assert_eq!(
            reloaded.tasks()[0].options["calibrationType"],
            ConfigValue::from("parameters.b")
        );
        assert_eq!(reloaded.tasks(), original.tasks());
        assert_eq!(reloaded.fingerprint(), original.fingerprint());
    }

    #[test]
    fn test_unknown_connection_role() {
        let yaml = r#"
description: bad role
tasks:
  cpCombine:
    class: lsst.cp.pipe.cpCombine.CalibCombineTask
    config:
      connections.outputFlat: flat
"#;
        assert!(matches!(resolve(yaml), Err(CalflowError::UnknownConnection { .. })));
    }

    #[test]
    fn test_unknown_option_and_bad_kind() {
        let unknown = r#"
description: bad option
tasks:
  isr:
    class: lsst.ip.isr.isrTask.IsrTask
    config:
      doMagic: true
"#;
        assert!(matches!(resolve(unknown), Err(CalflowError::UnknownOption { .. })));

        let bad_kind = r#"
description: bad kind
tasks:
  cpCombine:
    class: lsst.cp.pipe.cpCombine.CalibCombineTask
    config:
      exposureScaling: Sometimes
"#;
        assert!(matches!(resolve(bad_kind), Err(CalflowError::InvalidOptionValue { .. })));
    }

    #[test]
    fn test_connection_must_be_a_string() {
        let yaml = r#"
description: numeric dataset
tasks:
  cpCombine:
    class: lsst.cp.pipe.cpCombine.CalibCombineTask
    config:
      connections.outputData: 42
"#;
        assert!(matches!(resolve(yaml), Err(CalflowError::InvalidConnection { .. })));
    }

    #[test]
    fn test_unknown_task_class_names_task() {
        let yaml = r#"
description: unknown
tasks:
  isr: lsst.ip.isr.IsrTask
"#;
        match resolve(yaml) {
            Err(err @ CalflowError::UnknownTask { .. }) => {
                assert!(err.to_string().contains("task 'isr'"));
            }
            other => panic!("Expected UnknownTask, got {:?}", other),
        }
    }

    #[test]
    fn test_two_producers_warn() {
        let yaml = r#"
description: two flats
tasks:
  flatA:
    class: lsst.cp.pipe.cpCombine.CalibCombineTask
    config:
      connections.outputData: flat
  flatB:
    class: lsst.cp.pipe.cpCombine.CalibCombineTask
    config:
      connections.outputData: flat
"#;
        let resolution = resolve(yaml).unwrap();
        assert_eq!(
            resolution.warnings,
            vec![PipelineWarning::AmbiguousProducer {
                dataset: "flat".into(),
                producers: vec!["flatA".into(), "flatB".into()],
            }]
        );
    }

    #[test]
    fn test_connection_field_lookup() {
        let resolution = resolve(BIAS).unwrap();
        let isr = &resolution.tasks[0];

        assert_eq!(
            isr.field("connections.outputExposure"),
            Some(ConfigValue::from("cpBiasProc"))
        );
        assert_eq!(isr.field("doBias"), Some(ConfigValue::Bool(false)));
        assert_eq!(isr.field("nonexistentField"), None);
    }
}
