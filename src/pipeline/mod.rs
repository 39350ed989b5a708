// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 calflow contributors

//! Pipeline documents, resolution and validation
//!
//! This module defines the pipeline document model and the load-time
//! passes run over it: connection resolution, dataset flow analysis and
//! contract validation.

mod contract;
mod definition;
mod fingerprint;
mod flow;
mod loader;
mod resolve;
mod validation;
mod value;

pub use contract::{Comparison, Contract, FieldPath, Operand};
pub use definition::*;
pub use fingerprint::Fingerprinter;
pub use flow::DatasetFlowGraph;
pub use loader::{PipelineLoader, ResolvedPipeline};
pub use resolve::{ConnectionResolver, PipelineWarning, Resolution, ResolvedTask};
pub use validation::ContractValidator;
pub use value::{ConfigValue, PARAMETER_PREFIX};
