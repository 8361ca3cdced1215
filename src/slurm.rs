//! Slurm text interfaces: command strings, output parsers and node-list notation.

pub mod commands;
pub mod nodelist;
pub mod parse;

pub use nodelist::expand;
pub use parse::{NodeStateLine, parse_node_resources, parse_node_states, parse_pending_jobs};
