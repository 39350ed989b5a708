// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 calflow contributors

//! # calflow - Calibration Pipeline Configuration
//!
//! `calflow` loads declarative pipeline documents describing
//! calibration-construction workflows (bias, dark, flat, photon transfer
//! curve) and checks that they are internally consistent before they are
//! handed to the external framework that runs the tasks.
//!
//! ## Features
//!
//! - **Task registry** - Schemas of the external tasks: options, value kinds, connections
//! - **Connection resolution** - Parameter substitution and dataset flow graph
//! - **Contracts** - Cross-task invariants checked at load time
//! - **Diagnostics** - Ambiguous producers, external inputs, end products
//!
//! ## Quick Start
//!
//! ```no_run
//! use calflow::{PipelineLoader, TaskRegistry};
//!
//! let registry = TaskRegistry::builtin();
//! let pipeline = PipelineLoader::new(&registry)
//!     .load_file(std::path::Path::new("pipelines/cpBias.yaml"))?;
//!
//! for warning in pipeline.warnings() {
//!     eprintln!("warning: {}", warning);
//! }
//! println!("{}", pipeline.graph().to_mermaid());
//! # Ok::<(), calflow::CalflowError>(())
//! ```

pub mod config;
pub mod errors;
pub mod pipeline;
pub mod registry;

// Re-export commonly used types
pub use config::{ContractMode, LoaderOptions, Severity};
pub use errors::{CalflowError, CalflowResult};
pub use pipeline::{
    ConfigValue, DatasetFlowGraph, PipelineDocument, PipelineLoader, PipelineWarning,
    ResolvedPipeline, ResolvedTask,
};
pub use registry::{TaskFamily, TaskRegistry, TaskSchema};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
