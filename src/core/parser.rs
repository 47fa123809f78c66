//! Pipeline YAML parsing and validation.
//!
//! Parses the stage document and validates structural constraints:
//! - Stage names must be non-empty and unique
//! - Stage commands must be non-empty
//! - Variable names must be word characters so `${NAME}` can reach them

use super::error::{Error, Result};
use super::types::*;
use std::collections::HashSet;
use std::path::Path;
use tracing::warn;

/// Validation error.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Parse a pipeline file from disk.
pub fn parse_pipeline_file(path: &Path) -> Result<PipelineConfig> {
    let content = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_pipeline(&content)
}

/// Parse a pipeline document from a string.
pub fn parse_pipeline(yaml: &str) -> Result<PipelineConfig> {
    Ok(serde_yaml_ng::from_str(yaml)?)
}

/// Validate a parsed pipeline. Returns a list of errors (empty = valid).
pub fn validate_pipeline(config: &PipelineConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for receipt in &config.variables {
        if receipt.name.is_empty() {
            errors.push(ValidationError {
                message: "variable with empty NAME".to_string(),
            });
        } else if !is_variable_name(&receipt.name) {
            errors.push(ValidationError {
                message: format!(
                    "variable '{}' must contain only letters, digits and underscores",
                    receipt.name
                ),
            });
        }
    }

    let mut seen: HashSet<&str> = HashSet::new();
    for (index, stage) in config.stages.iter().enumerate() {
        if stage.name.trim().is_empty() {
            errors.push(ValidationError {
                message: format!("stage #{} has an empty NAME", index + 1),
            });
            continue;
        }
        if !seen.insert(stage.name.as_str()) {
            errors.push(ValidationError {
                message: format!("stage '{}' is declared more than once", stage.name),
            });
        }
        if stage.command.trim().is_empty() {
            errors.push(ValidationError {
                message: format!("stage '{}' has an empty COMMAND", stage.name),
            });
        }
    }

    errors
}

/// Parse, validate, and turn stages into drafts.
pub fn load_pipeline(path: &Path) -> Result<(Vec<VariableReceipt>, Vec<Stage<Draft>>)> {
    let config = parse_pipeline_file(path)?;
    for key in config.extra.keys() {
        warn!(key = %key, "ignoring unknown top-level key");
    }
    let errors = validate_pipeline(&config);
    if !errors.is_empty() {
        return Err(Error::Validation {
            count: errors.len(),
            messages: errors.iter().map(ToString::to_string).collect(),
        });
    }
    let drafts = config.stages.into_iter().map(Stage::from).collect();
    Ok((config.variables, drafts))
}

fn is_variable_name(name: &str) -> bool {
    name.chars().all(|c| c.is_alphanumeric() || c == '_')
}
