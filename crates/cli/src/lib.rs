//! Bulwark CLI library: subcommand implementations

pub mod commands;
