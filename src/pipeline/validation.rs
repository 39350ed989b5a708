// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 calflow contributors

//! Contract validation
//!
//! Evaluates every contract of a document against the resolved task
//! configuration. Field paths are checked first, so an `UnknownField`
//! error is raised before any contract is evaluated. Evaluation then
//! follows declaration order.

use crate::config::ContractMode;
use crate::errors::{CalflowError, CalflowResult};
use crate::pipeline::{ConfigValue, ContractSpec, FieldPath, Operand, ResolvedTask};
use crate::registry::TaskRegistry;

/// Contract validator
pub struct ContractValidator;

impl ContractValidator {
    /// Validate all contracts
    ///
    /// The registry is only consulted to explain why a field is missing.
    pub fn validate(
        registry: &TaskRegistry,
        tasks: &[ResolvedTask],
        contracts: &[ContractSpec],
        mode: ContractMode,
    ) -> CalflowResult<()> {
        let mut bound = Vec::with_capacity(contracts.len());
        for spec in contracts {
            bound.push(Self::bind(registry, tasks, spec)?);
        }

        let mut violations = Vec::new();
        for (spec, (left, right)) in contracts.iter().zip(bound) {
            if spec.contract.comparison.holds(&left, &right) {
                tracing::debug!(contract = %spec.contract, "Contract holds");
                continue;
            }

            let violation = Self::violation(spec, left, right);
            match mode {
                ContractMode::FailFast => return Err(violation),
                ContractMode::CollectAll => violations.push(violation),
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(CalflowError::ContractViolations { violations })
        }
    }

    /// Resolve both sides of a contract to values
    fn bind(
        registry: &TaskRegistry,
        tasks: &[ResolvedTask],
        spec: &ContractSpec,
    ) -> CalflowResult<(ConfigValue, ConfigValue)> {
        let contract = &spec.contract;
        let left = Self::lookup(registry, tasks, &contract.left, &contract.expression)?;
        let right = match &contract.right {
            Operand::Literal(value) => value.clone(),
            Operand::Field(path) => Self::lookup(registry, tasks, path, &contract.expression)?,
        };
        Ok((left, right))
    }

    fn lookup(
        registry: &TaskRegistry,
        tasks: &[ResolvedTask],
        path: &FieldPath,
        contract: &str,
    ) -> CalflowResult<ConfigValue> {
        let Some(task) = tasks.iter().find(|t| t.label == path.task) else {
            let labels: Vec<&str> = tasks.iter().map(|t| t.label.as_str()).collect();
            return Err(CalflowError::UnknownField {
                contract: contract.to_string(),
                path: path.to_string(),
                help: Some(format!(
                    "No task is labelled '{}'; tasks are: {}",
                    path.task,
                    labels.join(", ")
                )),
            });
        };

        if let Some(value) = task.field(&path.field) {
            return Ok(value);
        }

        let schema = registry.lookup(&task.class).ok();
        let declared_option = schema.is_some_and(|s| s.option(&path.field).is_some());
        let disabled_role = path
            .field
            .strip_prefix(super::CONNECTIONS_PREFIX)
            .is_some_and(|role| schema.is_some_and(|s| s.has_connection(role)));

        let help = if declared_option {
            format!(
                "Option '{}' of task '{}' is declared but has no default and is not set",
                path.field, task.label
            )
        } else if disabled_role {
            format!(
                "Connection '{}' of task '{}' is disabled by its guarding option",
                path.field, task.label
            )
        } else {
            format!(
                "Task '{}' ({}) has no option or connection '{}'",
                task.label, task.class, path.field
            )
        };

        Err(CalflowError::UnknownField {
            contract: contract.to_string(),
            path: path.to_string(),
            help: Some(help),
        })
    }

    fn violation(spec: &ContractSpec, left: ConfigValue, right: ConfigValue) -> CalflowError {
        let contract = &spec.contract;
        let mut actual = vec![(contract.left.to_string(), left)];
        if let Operand::Field(path) = &contract.right {
            actual.push((path.to_string(), right));
        }

        CalflowError::ContractViolation {
            contract: contract.expression.clone(),
            actual,
            help: spec.message.clone(),
        }
    }
}
