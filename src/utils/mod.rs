//! Generic utility primitives with zero domain knowledge.
//!
//! - `command` - Command execution with error handling
//! - `io` - File I/O with consistent error handling
//! - `yaml` - YAML (de)serialization with file context in errors

pub mod command;
pub mod io;
pub mod yaml;
