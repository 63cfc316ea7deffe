//! Core types: errors, configuration, settings-file parsing.

pub mod config;
pub mod errors;
pub mod properties;
