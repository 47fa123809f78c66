//! Stage finalization: substitute, evaluate the skip condition, project into
//! a [`FinalizedStage`], and reject anything still carrying a placeholder.
//!
//! The placeholder check at the end of [`finalize_stage`] is the only gate
//! between templating and both consumers (the JSON plan and the executor).

use super::error::{Error, Result};
use super::template;
use super::types::*;
use tracing::debug;

/// Finalize one draft stage against the fully resolved variables.
pub fn finalize_stage(
    draft: Stage<Draft>,
    vars: &VariableMapping,
    no_skip: bool,
) -> Result<FinalizedStage> {
    let stage = draft.map_text(|text| template::substitute(text, vars));

    let finalized = if no_skip || condition_holds(&stage, vars) {
        FinalizedStage::Runnable(into_runnable(stage)?)
    } else {
        debug!(stage = %stage.name, condition = %stage.only_when_not_empty, "skipping stage");
        FinalizedStage::Skipped(into_skipped(stage))
    };

    reject_placeholders(&finalized)?;
    Ok(finalized)
}

/// Finalize all stages in declaration order, failing on the first error.
pub fn finalize_stages(
    drafts: Vec<Stage<Draft>>,
    vars: &VariableMapping,
    no_skip: bool,
) -> Result<Vec<FinalizedStage>> {
    drafts
        .into_iter()
        .map(|draft| finalize_stage(draft, vars, no_skip))
        .collect()
}

/// An empty condition always holds; otherwise one listed variable must be
/// non-empty in the resolved mapping.
fn condition_holds(stage: &Stage<Templated>, vars: &VariableMapping) -> bool {
    let names = stage.condition_vars();
    names.is_empty()
        || names
            .iter()
            .any(|name| vars.get(*name).is_some_and(|v| !v.is_empty()))
}

fn into_runnable(stage: Stage<Templated>) -> Result<RunnableStage> {
    let bazel_locks_amount = parse_locks(&stage)?;
    Ok(RunnableStage {
        env_var_list: stage
            .env_vars
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect(),
        name: stage.name,
        dir: stage.dir,
        sec_var_list: stage.sec_var_list,
        git_fetch_tags: stage.git_fetch_tags,
        git_fetch_notes: stage.git_fetch_notes,
        bazel_locks_amount,
        command: stage.command,
        result_check_type: stage.result_check_type,
        result_check_file_pattern: stage.result_check_file_pattern,
        jenkins_test_result_path: stage.jenkins_test_result_path,
    })
}

fn parse_locks(stage: &Stage<Templated>) -> Result<i64> {
    let raw = stage.bazel_locks_amount.trim();
    raw.parse::<i64>().map_err(|_| {
        if template::has_placeholder(raw) {
            Error::UnresolvedField {
                stage: stage.name.clone(),
                field: "BAZEL_LOCKS_AMOUNT".to_string(),
                value: raw.to_string(),
            }
        } else {
            Error::InvalidField {
                stage: stage.name.clone(),
                field: "BAZEL_LOCKS_AMOUNT".to_string(),
                value: raw.to_string(),
            }
        }
    })
}

fn into_skipped(stage: Stage<Templated>) -> SkippedStage {
    let reason = if stage.text_on_skip.is_empty() {
        "not provided"
    } else {
        stage.text_on_skip.as_str()
    };
    SkippedStage {
        skipped: format!(
            "Reason: {}, Condition: ONLY_WHEN_NOT_EMPTY={}",
            reason, stage.only_when_not_empty
        ),
        name: stage.name,
    }
}

/// Fail on a field of the chosen variant that still contains `${`.
fn reject_placeholders(stage: &FinalizedStage) -> Result<()> {
    let value = serde_json::to_value(stage)?;
    let Some(fields) = value.as_object() else {
        return Ok(());
    };
    for (field, field_value) in fields {
        let text = match field_value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        if template::has_placeholder(&text) {
            return Err(Error::UnresolvedField {
                stage: stage.name().to_string(),
                field: field.clone(),
                value: text,
            });
        }
    }
    Ok(())
}
