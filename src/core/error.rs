//! Error taxonomy for compiling and running a pipeline.
//!
//! Most variants are configuration errors raised before any plan is written
//! or any stage is started. [`Error::Write`] and [`Error::Runtime`] come from
//! the output side, and [`Error::StagesFailed`] reports a finished run.

use std::path::PathBuf;
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Input document missing or unreadable
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Input document is not valid YAML for the pipeline schema
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// Structural validation found one or more problems
    #[error("{count} validation error(s): {}", messages.join("; "))]
    Validation { count: usize, messages: Vec<String> },

    /// A `--env` seed that is not `NAME=VALUE`
    #[error("invalid variable seed '{0}', expected NAME=VALUE")]
    InvalidSeed(String),

    /// A recipe still references a variable after substitution
    #[error("undeclared variable(s) {} in recipe for {name}: {command}", variables.join(", "))]
    UndeclaredVariable {
        name: String,
        command: String,
        variables: Vec<String>,
    },

    /// A finalized stage field still contains a template placeholder
    #[error("unresolved variable in stage '{stage}', field {field}: {value}")]
    UnresolvedField {
        stage: String,
        field: String,
        value: String,
    },

    /// A stage field that must be numeric is not
    #[error("stage '{stage}': {field} must be an integer, got '{value}'")]
    InvalidField {
        stage: String,
        field: String,
        value: String,
    },

    /// Plan JSON could not be encoded or decoded
    #[error("plan JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to write {target}: {source}")]
    Write {
        target: String,
        #[source]
        source: std::io::Error,
    },

    /// The async runtime could not be started
    #[error("cannot start runtime: {0}")]
    Runtime(#[source] std::io::Error),

    /// Local run finished with failing stages
    #[error("{0} stage(s) failed")]
    StagesFailed(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undeclared_variable_message_names_command() {
        let err = Error::UndeclaredVariable {
            name: "FOO".to_string(),
            command: "echo ${MISSING}".to_string(),
            variables: vec!["MISSING".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("MISSING"));
        assert!(msg.contains("echo ${MISSING}"));
        assert!(msg.contains("FOO"));
    }

    #[test]
    fn test_unresolved_field_message_names_stage_and_field() {
        let err = Error::UnresolvedField {
            stage: "build".to_string(),
            field: "COMMAND".to_string(),
            value: "make ${TARGET}".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("'build'"));
        assert!(msg.contains("COMMAND"));
    }

    #[test]
    fn test_validation_joins_messages() {
        let err = Error::Validation {
            count: 2,
            messages: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(err.to_string(), "2 validation error(s): a; b");
    }

    #[test]
    fn test_json_error_message_is_direction_neutral() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert!(err.to_string().starts_with("plan JSON error:"));
    }
}
