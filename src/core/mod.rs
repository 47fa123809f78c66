//! Core pipeline logic: types, parsing, resolution, finalization, execution.

pub mod error;
pub mod executor;
pub mod finalizer;
pub mod parser;
pub mod plan;
pub mod resolver;
pub mod template;
pub mod types;
