// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 calflow contributors

//! Contract expressions
//!
//! A contract compares one `<task>.<field>` path against a literal or
//! against another task's field:
//!
//! ```text
//! isr.doBias == False
//! cpCombine.calibrationType == 'flat'
//! ptcExtract.maximumRangeCovariancesAstier == ptcSolve.maximumRangeCovariancesAstier
//! ```
//!
//! Every contract in a document must hold.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

use crate::pipeline::ConfigValue;

static CONTRACT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\S+?)\s*(==|!=)\s*(.+?)\s*$").expect("valid contract regex")
});

static PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\.([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*)$")
        .expect("valid field path regex")
});

/// A `<task>.<field>` reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    pub task: String,
    /// Option name, or `connections.<role>`; may itself be dotted
    pub field: String,
}

impl FieldPath {
    pub fn parse(text: &str) -> Option<Self> {
        let caps = PATH_RE.captures(text)?;
        Some(Self {
            task: caps[1].to_string(),
            field: caps[2].to_string(),
        })
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.task, self.field)
    }
}

/// Right-hand side of a comparison
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Field(FieldPath),
    Literal(ConfigValue),
}

impl Operand {
    fn parse(text: &str) -> Result<Self, String> {
        let text = text.trim();

        for quote in ['\'', '"'] {
            if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
                return Ok(Self::Literal(ConfigValue::String(
                    text[1..text.len() - 1].to_string(),
                )));
            }
        }

        match text {
            "True" | "true" => return Ok(Self::Literal(ConfigValue::Bool(true))),
            "False" | "false" => return Ok(Self::Literal(ConfigValue::Bool(false))),
            _ => {}
        }

        if text.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '+' || c == '.') {
            if let Ok(i) = text.parse::<i64>() {
                return Ok(Self::Literal(ConfigValue::Int(i)));
            }
            if let Ok(f) = text.parse::<f64>() {
                return Ok(Self::Literal(ConfigValue::Float(f)));
            }
        }

        FieldPath::parse(text)
            .map(Self::Field)
            .ok_or_else(|| format!("unrecognized operand '{}' (quote string literals)", text))
    }
}

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Equal,
    NotEqual,
}

impl Comparison {
    /// Apply the operator to two resolved values
    pub fn holds(&self, left: &ConfigValue, right: &ConfigValue) -> bool {
        match self {
            Self::Equal => left.matches(right),
            Self::NotEqual => !left.matches(right),
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equal => write!(f, "=="),
            Self::NotEqual => write!(f, "!="),
        }
    }
}

/// A parsed contract expression
#[derive(Debug, Clone, PartialEq)]
pub struct Contract {
    /// Source text as written in the document
    pub expression: String,
    pub left: FieldPath,
    pub comparison: Comparison,
    pub right: Operand,
}

impl Contract {
    /// Parse a contract expression
    pub fn parse(expression: &str) -> Result<Self, String> {
        let caps = CONTRACT_RE
            .captures(expression)
            .ok_or_else(|| "expected '<task>.<field> == <value>' or '!='".to_string())?;

        let left = FieldPath::parse(&caps[1])
            .ok_or_else(|| format!("left side '{}' is not a <task>.<field> path", &caps[1]))?;

        let comparison = match &caps[2] {
            "==" => Comparison::Equal,
            _ => Comparison::NotEqual,
        };

        let right = Operand::parse(&caps[3])?;

        Ok(Self {
            expression: expression.trim().to_string(),
            left,
            comparison,
            right,
        })
    }

    /// Every field path the contract reads
    pub fn paths(&self) -> Vec<&FieldPath> {
        match &self.right {
            Operand::Field(right) => vec![&self.left, right],
            Operand::Literal(_) => vec![&self.left],
        }
    }
}

impl fmt::Display for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expression)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_boolean_literal() {
        let contract = Contract::parse("isr.doBias == False").unwrap();

        assert_eq!(contract.left.task, "isr");
        assert_eq!(contract.left.field, "doBias");
        assert_eq!(contract.comparison, Comparison::Equal);
        assert_eq!(contract.right, Operand::Literal(ConfigValue::Bool(false)));
    }

    #[test]
    fn test_parse_string_and_numbers() {
        let c = Contract::parse("cpCombine.calibrationType != 'flat'").unwrap();
        assert_eq!(c.comparison, Comparison::NotEqual);
        assert_eq!(c.right, Operand::Literal(ConfigValue::from("flat")));

        let c = Contract::parse("ptcSolve.polynomialFitDegree == 3").unwrap();
        assert_eq!(c.right, Operand::Literal(ConfigValue::Int(3)));

        let c = Contract::parse("cpCombine.clip == -2.5").unwrap();
        assert_eq!(c.right, Operand::Literal(ConfigValue::Float(-2.5)));
    }

    #[test]
    fn test_parse_cross_task_path() {
        let contract = Contract::parse(
            "ptcExtract.maximumRangeCovariancesAstier == ptcSolve.maximumRangeCovariancesAstier",
        )
        .unwrap();

        assert_eq!(contract.paths().len(), 2);
        match &contract.right {
            Operand::Field(path) => assert_eq!(path.task, "ptcSolve"),
            _ => panic!("Expected field operand"),
        }
    }

    #[test]
    fn test_parse_dotted_field() {
        let contract = Contract::parse("isr.connections.outputExposure == 'cpBiasProc'").unwrap();
        assert_eq!(contract.left.field, "connections.outputExposure");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(Contract::parse("isr.doBias").is_err());
        assert!(Contract::parse("doBias == False").is_err());
        assert!(Contract::parse("isr.doBias == maybe").is_err());
        assert!(Contract::parse("isr.doBias < 3").is_err());
    }

    #[test]
    fn test_comparison_holds() {
        assert!(Comparison::Equal.holds(&ConfigValue::Int(8), &ConfigValue::Float(8.0)));
        assert!(Comparison::NotEqual.holds(&ConfigValue::Bool(true), &ConfigValue::Bool(false)));
    }
}
