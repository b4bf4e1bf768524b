//! armctl - natural language command interpreter for robot arms
//!
//! Commands go through an external model, a schema validator with a safety
//! policy, and a motion backend, with bounded replanning when a candidate is
//! refused or fails to execute.

pub mod backend;
pub mod command;
pub mod core;
pub mod llm;
pub mod safety;
pub mod schema;
