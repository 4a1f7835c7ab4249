//! Subcommand implementations

pub mod predict;
pub mod serve;
