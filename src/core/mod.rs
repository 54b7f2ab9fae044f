//! Core types: configuration, shared errors, composite-id grammar.

pub mod config;
pub mod errors;
pub mod ids;
