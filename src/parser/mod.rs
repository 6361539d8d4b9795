//! Parser module for nibble-compose
//!
//! This module contains:
//! - `query`: reads emitted solver queries back into contracts and clauses

pub mod query;

pub use query::{parse_clause, parse_conjunction, parse_query, solve_expression, ParsedQuery};
