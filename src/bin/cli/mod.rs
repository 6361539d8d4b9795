//! CLI module for nibble-compose
//!
//! Handles configuration loading, query discovery, solver runs and report formatting

pub mod drift;
pub mod eval;
pub mod filters;
pub mod generate;
pub mod list;
pub mod output;
pub mod settings;
pub mod validate;
