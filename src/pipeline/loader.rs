// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 calflow contributors

//! Pipeline loading
//!
//! Drives a parsed document through connection resolution and contract
//! validation, producing an immutable [`ResolvedPipeline`] for the external
//! execution framework.

use std::path::Path;

use crate::config::{LoaderOptions, Severity};
use crate::errors::{CalflowError, CalflowResult};
use crate::pipeline::{
    ConfigValue, ConnectionResolver, ContractSpec, ContractValidator, DatasetFlowGraph,
    Fingerprinter, PipelineDocument, PipelineWarning, ResolvedTask, TaskConfig, PARAMETER_PREFIX,
};
use crate::registry::TaskRegistry;

/// Loads pipeline documents against a task registry
pub struct PipelineLoader<'a> {
    registry: &'a TaskRegistry,
    options: LoaderOptions,
}

impl<'a> PipelineLoader<'a> {
    /// Create a loader with default options
    pub fn new(registry: &'a TaskRegistry) -> Self {
        Self {
            registry,
            options: LoaderOptions::default(),
        }
    }

    /// Replace the loader options
    pub fn with_options(mut self, options: LoaderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    /// Parse and load a YAML document
    pub fn load_yaml(&self, yaml: &str) -> CalflowResult<ResolvedPipeline> {
        self.load(PipelineDocument::from_yaml(yaml)?)
    }

    /// Parse and load a document file
    pub fn load_file(&self, path: &Path) -> CalflowResult<ResolvedPipeline> {
        self.load(PipelineDocument::from_file(path)?)
    }

    /// Resolve and validate a parsed document
    pub fn load(&self, document: PipelineDocument) -> CalflowResult<ResolvedPipeline> {
        let resolution = ConnectionResolver::resolve(&document, self.registry)?;

        if self.options.ambiguous_producers == Severity::Error {
            if let Some(PipelineWarning::AmbiguousProducer { dataset, producers }) =
                resolution.warnings.first()
            {
                return Err(CalflowError::AmbiguousProducer {
                    dataset: dataset.clone(),
                    producers: producers.clone(),
                });
            }
        }

        ContractValidator::validate(
            self.registry,
            &resolution.tasks,
            &document.contracts,
            self.options.contract_mode,
        )?;

        tracing::info!(
            tasks = resolution.tasks.len(),
            contracts = document.contracts.len(),
            warnings = resolution.warnings.len(),
            "Loaded pipeline document"
        );

        Ok(ResolvedPipeline {
            description: document.description,
            parameters: document.parameters,
            tasks: resolution.tasks,
            contracts: document.contracts,
            graph: resolution.graph,
            warnings: resolution.warnings,
        })
    }
}

/// A fully resolved and validated pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPipeline {
    description: String,
    parameters: Vec<(String, ConfigValue)>,
    tasks: Vec<ResolvedTask>,
    contracts: Vec<ContractSpec>,
    graph: DatasetFlowGraph,
    warnings: Vec<PipelineWarning>,
}

impl ResolvedPipeline {
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Tasks in declaration order
    pub fn tasks(&self) -> &[ResolvedTask] {
        &self.tasks
    }

    pub fn task(&self, label: &str) -> Option<&ResolvedTask> {
        self.tasks.iter().find(|t| t.label == label)
    }

    pub fn task_labels(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.label.as_str()).collect()
    }

    pub fn contracts(&self) -> &[ContractSpec] {
        &self.contracts
    }

    pub fn graph(&self) -> &DatasetFlowGraph {
        &self.graph
    }

    /// Non-fatal diagnostics collected while loading
    pub fn warnings(&self) -> &[PipelineWarning] {
        &self.warnings
    }

    /// Rebuild a document with every option and connection written out
    pub fn to_document(&self) -> PipelineDocument {
        let tasks = self
            .tasks
            .iter()
            .map(|task| {
                let mut config = TaskConfig::new(&task.label, &task.class);
                config.options = task
                    .options
                    .iter()
                    .map(|(k, v)| (k.clone(), self.unsubstitute(v)))
                    .collect();
                config.connections = task
                    .inputs
                    .iter()
                    .chain(&task.outputs)
                    .map(|(role, dataset)| {
                        (role.clone(), self.unsubstitute(&ConfigValue::String(dataset.clone())))
                    })
                    .collect();
                config
            })
            .collect();

        PipelineDocument {
            description: self.description.clone(),
            parameters: self.parameters.clone(),
            tasks,
            contracts: self.contracts.clone(),
        }
    }

    /// Map a resolved value that still reads as a parameter reference back
    /// to the parameter it came from, so a reload substitutes it only once
    fn unsubstitute(&self, value: &ConfigValue) -> ConfigValue {
        if value.parameter_reference().is_none() {
            return value.clone();
        }
        match self.parameters.iter().find(|(_, v)| v == value) {
            Some((name, _)) => ConfigValue::String(format!("{}{}", PARAMETER_PREFIX, name)),
            None => value.clone(),
        }
    }

    /// Resolved tasks as JSON, for handing to the execution framework
    pub fn to_json(&self) -> CalflowResult<String> {
        serde_json::to_string_pretty(&self.tasks).map_err(|e| CalflowError::Serialize {
            message: e.to_string(),
        })
    }

    /// BLAKE3 digest of the resolved configuration
    pub fn fingerprint(&self) -> String {
        let mut fp = Fingerprinter::new();
        fp.update_str(&self.description);
        for (name, value) in &self.parameters {
            fp.update_str(name);
            fp.update_value(value);
        }
        for task in &self.tasks {
            fp.update_task(task);
        }
        for contract in &self.contracts {
            fp.update_contract(contract);
        }
        fp.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContractMode;

    const BIAS: &str = r#"
description: Bias calibration construction
parameters:
  exposureName: cpBiasProc
tasks:
  isr:
    class: lsst.ip.isr.isrTask.IsrTask
    config:
      connections.ccdExposure: raw
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
contracts:
  - isr.doBias == False
"#;

    fn load(yaml: &str) -> CalflowResult<ResolvedPipeline> {
        let registry = TaskRegistry::builtin();
        PipelineLoader::new(&registry).load_yaml(yaml)
    }

    #[test]
    fn test_bias_contract_holds() {
        let pipeline = load(BIAS).unwrap();

        assert_eq!(pipeline.task_labels(), vec!["isr", "cpBiasCombine"]);
        assert!(pipeline.warnings().is_empty());
        assert_eq!(pipeline.graph().terminal_outputs(), vec!["bias"]);
    }

    #[test]
    fn test_bias_contract_violated() {
        let yaml = BIAS.replace("doBias: false", "doBias: true");

        match load(&yaml) {
            Err(CalflowError::ContractViolation { contract, actual, .. }) => {
                assert_eq!(contract, "isr.doBias == False");
                assert_eq!(actual, vec![("isr.doBias".to_string(), ConfigValue::Bool(true))]);
            }
            other => panic!("Expected ContractViolation, got {:?}", other),
        }
    }

    #[test]
    fn test_load_is_idempotent() {
        let a = load(BIAS).unwrap();
        let b = load(BIAS).unwrap();

        assert_eq!(a, b);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_fingerprint_tracks_changes() {
        let a = load(BIAS).unwrap();
        let b = load(&BIAS.replace("calibrationType: bias", "calibrationType: dark")).unwrap();
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_round_trip_validates_identically() {
        let original = load(BIAS).unwrap();
        let yaml = original.to_document().to_yaml().unwrap();
        let reloaded = load(&yaml).unwrap();

        assert_eq!(reloaded.tasks(), original.tasks());
        assert_eq!(reloaded.graph(), original.graph());
        assert_eq!(reloaded.contracts(), original.contracts());
        assert_eq!(reloaded.fingerprint(), original.fingerprint());
    }

    #[test]
    fn test_strict_severity_makes_ambiguity_fatal() {
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
        let registry = TaskRegistry::builtin();

        let relaxed = PipelineLoader::new(&registry).load_yaml(yaml).unwrap();
        assert_eq!(relaxed.warnings().len(), 1);

        let strict = PipelineLoader::new(&registry)
            .with_options(LoaderOptions {
                ambiguous_producers: Severity::Error,
                ..LoaderOptions::default()
            })
            .load_yaml(yaml);
        match strict {
            Err(CalflowError::AmbiguousProducer { dataset, producers }) => {
                assert_eq!(dataset, "flat");
                assert_eq!(producers, vec!["flatA".to_string(), "flatB".to_string()]);
            }
            other => panic!("Expected AmbiguousProducer, got {:?}", other),
        }
    }

    #[test]
    fn test_collect_all_mode() {
        let yaml = BIAS
            .replace("doBias: false", "doBias: true")
            .replace(
                "  - isr.doBias == False\n",
                "  - isr.doBias == False\n  - cpBiasCombine.calibrationType == 'flat'\n",
            );
        let registry = TaskRegistry::builtin();
        let loader = PipelineLoader::new(&registry).with_options(LoaderOptions {
            contract_mode: ContractMode::CollectAll,
            ..LoaderOptions::default()
        });

        let err = loader.load_yaml(&yaml).unwrap_err();
        assert!(matches!(err, CalflowError::ContractViolations { .. }));
        assert_eq!(err.violations().len(), 2);
    }

    #[test]
    fn test_to_json_lists_resolved_tasks() {
        let pipeline = load(BIAS).unwrap();
        let json: serde_json::Value = serde_json::from_str(&pipeline.to_json().unwrap()).unwrap();

        assert_eq!(json[0]["label"], "isr");
        assert_eq!(json[0]["outputs"]["outputExposure"], "cpBiasProc");
        assert_eq!(json[1]["options"]["calibrationType"], "bias");
    }
}
