// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 calflow contributors

//! Content hashing of resolved configuration
//!
//! Uses BLAKE3. Two loads of the same source give the same digest; any
//! change to a resolved option, connection or contract changes it.

use blake3::Hasher;

use crate::pipeline::{ConfigValue, ContractSpec, ResolvedTask};

/// Incremental hasher over resolved pipeline parts
pub struct Fingerprinter {
    hasher: Hasher,
}

impl Fingerprinter {
    pub fn new() -> Self {
        Self {
            hasher: Hasher::new(),
        }
    }

    /// Hash a length-prefixed string so adjacent fields cannot run together
    pub fn update_str(&mut self, value: &str) {
        self.hasher.update(&(value.len() as u64).to_le_bytes());
        self.hasher.update(value.as_bytes());
    }

    pub fn update_value(&mut self, value: &ConfigValue) {
        self.update_str(value.kind_name());
        self.update_str(&value.to_string());
    }

    /// Hash a resolved task: identity, options and connections
    pub fn update_task(&mut self, task: &ResolvedTask) {
        self.update_str(&task.label);
        self.update_str(&task.class);

        for (name, value) in &task.options {
            self.update_str(name);
            self.update_value(value);
        }

        self.update_str("inputs");
        for (role, dataset) in &task.inputs {
            self.update_str(role);
            self.update_str(dataset);
        }

        self.update_str("outputs");
        for (role, dataset) in &task.outputs {
            self.update_str(role);
            self.update_str(dataset);
        }
    }

    pub fn update_contract(&mut self, spec: &ContractSpec) {
        self.update_str(&spec.contract.expression);
        self.update_str(spec.message.as_deref().unwrap_or(""));
    }

    /// Finish and return the hex digest
    pub fn finish(&self) -> String {
        self.hasher.finalize().to_hex().to_string()
    }
}

impl Default for Fingerprinter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_input_same_digest() {
        let mut a = Fingerprinter::new();
        let mut b = Fingerprinter::new();
        a.update_value(&ConfigValue::Int(8));
        b.update_value(&ConfigValue::Int(8));
        assert_eq!(a.finish(), b.finish());
    }

    #[test]
    fn test_kind_changes_digest() {
        let mut a = Fingerprinter::new();
        let mut b = Fingerprinter::new();
        a.update_value(&ConfigValue::Int(8));
        b.update_value(&ConfigValue::Float(8.0));
        assert_ne!(a.finish(), b.finish());
    }

    #[test]
    fn test_field_boundaries_matter() {
        let mut a = Fingerprinter::new();
        a.update_str("ab");
        a.update_str("c");

        let mut b = Fingerprinter::new();
        b.update_str("a");
        b.update_str("bc");

        assert_ne!(a.finish(), b.finish());
    }
}
