//! stagewright: a CI stage compiler and local runner.
//!
//! A YAML pipeline declares variable recipes and stages. Recipes are
//! evaluated with bash, stages are templated with the resulting variables
//! and either serialized as a JSON plan or run locally with live output.

pub mod cli;
pub mod core;
pub mod transport;
