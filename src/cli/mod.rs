//! CLI layer for the receptionist.
//!
//! Provides the command-line interface using clap, with commands for
//! initializing storage, managing rules, flows and knowledge, and talking
//! to the engine.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{Cli, Commands, FlowCommands, KnowledgeCommands, RuleCommands};
