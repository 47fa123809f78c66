//! JSON plan output for an external orchestrator.
//!
//! Shape: `{"VARIABLES": {...}, "STAGES": [...]}`, pretty-printed with a
//! two-space indent so plans diff cleanly in review.

use super::error::{Error, Result};
use super::types::{FinalizedStage, Plan, VariableMapping};
use std::io::Write;
use tracing::info;

/// Target name meaning standard output.
pub const STDOUT_TARGET: &str = "-";

impl Plan {
    pub fn new(variables: VariableMapping, stages: Vec<FinalizedStage>) -> Self {
        Self { variables, stages }
    }

    /// Render as pretty JSON, newline-terminated.
    pub fn to_json(&self) -> Result<String> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    /// Decode a previously written plan.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Write `plan` to the file `target`, or to stdout when `target` is `-`.
pub fn write_plan(plan: &Plan, target: &str) -> Result<()> {
    let json = plan.to_json()?;
    let write_error = |source| Error::Write {
        target: target.to_string(),
        source,
    };

    if target == STDOUT_TARGET {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(json.as_bytes()).map_err(write_error)?;
        stdout.flush().map_err(write_error)?;
    } else {
        std::fs::write(target, json).map_err(write_error)?;
        info!(
            path = %target,
            stages = plan.stages.len(),
            variables = plan.variables.len(),
            "plan written"
        );
    }
    Ok(())
}
