//! # nibble-compose
//!
//! Decomposes 32-bit VM instructions into size-bounded assume/guarantee
//! components for a Boolean solver whose expressions are limited to a few
//! hundred characters.
//!
//! This crate provides:
//! - Nibble decomposition of every instruction into per-nibble components,
//!   carry linkers and aggregators
//! - A size budget checked on every component before it is emitted
//! - A wave-scheduled orchestrator for multi-instruction batches
//! - Emission of solver query files with a digest cache and a JSON manifest
//! - A query reader, solver backends and a VM-side constraint validator
//!
//! ## Usage
//!
//! ```rust,no_run
//! use nibble_compose::{ComponentEmitter, GeneratorConfig, Orchestrator};
//!
//! let config = GeneratorConfig::default();
//! let report = Orchestrator::new(&config)?.generate(&["ADD", "JZ"]);
//! let summary = ComponentEmitter::new("out").emit(&report)?;
//! println!("{} files written", summary.written);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod aggregate;
pub mod budget;
pub mod cache;
pub mod config;
pub mod contract;
pub mod decompose;
pub mod emit;
pub mod error;
pub mod isa;
pub mod link;
pub mod manifest;
pub mod orchestrator;
pub mod parser;
pub mod solver;
pub mod validator;

pub use aggregate::{AggregationKind, Aggregator};
pub use budget::SizeBudget;
pub use config::{ConfigError, GeneratorConfig, SolverConfig, ViolationPolicy};
pub use contract::{Component, ComponentKind, Contract, Expr, InstructionPlan, LinkSpec, VariableId};
pub use decompose::{MixingFunction, NibbleDecomposer, RotateXorMix};
pub use emit::ComponentEmitter;
pub use error::{
    EmitError, ExpressionTooLong, GenerationError, QueryParseError, SolverError, ValidationError,
};
pub use isa::{InstructionKind, OperationFamily};
pub use link::CarryLinker;
pub use manifest::Manifest;
pub use orchestrator::{BatchReport, InstructionOutcome, InstructionState, Orchestrator};
pub use solver::{SolverBackend, SolverVerdict};
pub use validator::{ConstraintValidator, PlanValidator};
