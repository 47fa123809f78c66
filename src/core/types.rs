//! Pipeline document, stage lifecycle, plan, and run report types.
//!
//! A stage moves through three states: [`Stage<Draft>`] as loaded,
//! [`Stage<Templated>`] after variable substitution, and [`FinalizedStage`]
//! once the skip condition has been evaluated. Draft and Templated share one
//! struct and differ only in their marker type, so only a templated stage can
//! be handed to the finalizer.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::time::Duration;

/// Resolved variables, in resolution order.
pub type VariableMapping = IndexMap<String, String>;

// ============================================================================
// Input document
// ============================================================================

/// Root of the pipeline YAML document.
///
/// Other top-level keys (anchor holders such as `DEFAULTS`) are kept in
/// `extra` and ignored; stage and variable entries stay strict.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct PipelineConfig {
    /// Variable receipts, resolved in declaration order
    #[serde(default)]
    pub variables: Vec<VariableReceipt>,

    /// Stage declarations (order-preserving)
    #[serde(default)]
    pub stages: Vec<RawStage>,

    #[serde(flatten)]
    pub extra: IndexMap<String, serde_yaml_ng::Value>,
}

/// A named shell recipe whose trimmed stdout becomes a variable value.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", deny_unknown_fields)]
pub struct VariableReceipt {
    pub name: String,

    /// Shell recipe; may reference previously resolved variables
    pub sh: String,

    /// Collapse newlines in the captured output to spaces
    #[serde(default)]
    pub replace_newlines: Option<serde_yaml_ng::Value>,
}

impl VariableReceipt {
    /// Whether the newline-folding flag is set to a truthy spelling.
    pub fn folds_newlines(&self) -> bool {
        self.replace_newlines
            .as_ref()
            .map(|v| is_truthy(&yaml_value_to_string(v)))
            .unwrap_or(false)
    }
}

/// A stage exactly as written in the YAML document.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", deny_unknown_fields)]
pub struct RawStage {
    pub name: String,

    /// Comma-separated variable names; run only if one is non-empty
    #[serde(default)]
    pub only_when_not_empty: Option<String>,

    #[serde(default)]
    pub dir: Option<String>,

    #[serde(default)]
    pub env_vars: IndexMap<String, serde_yaml_ng::Value>,

    #[serde(default)]
    pub sec_var_list: Vec<String>,

    #[serde(default)]
    pub git_fetch_tags: bool,

    #[serde(default)]
    pub git_fetch_notes: bool,

    /// Integer or templated string
    #[serde(default)]
    pub bazel_locks_amount: Option<serde_yaml_ng::Value>,

    pub command: String,

    #[serde(default)]
    pub text_on_skip: Option<String>,

    #[serde(default)]
    pub result_check_type: Option<String>,

    #[serde(default)]
    pub result_check_file_pattern: Option<String>,

    #[serde(default)]
    pub jenkins_test_result_path: Option<String>,
}

// ============================================================================
// Stage lifecycle
// ============================================================================

/// Marker: fields as declared.
#[derive(Debug, Clone, Copy)]
pub struct Draft;

/// Marker: every string field has been through substitution.
#[derive(Debug, Clone, Copy)]
pub struct Templated;

/// Default value of `BAZEL_LOCKS_AMOUNT` when not declared.
pub const DEFAULT_BAZEL_LOCKS: &str = "-1";

/// A stage in the Draft or Templated state. All text fields are plain
/// strings; optional YAML fields become empty strings.
#[derive(Debug, Clone)]
pub struct Stage<S> {
    pub name: String,
    pub only_when_not_empty: String,
    pub dir: String,
    pub env_vars: IndexMap<String, String>,
    pub sec_var_list: Vec<String>,
    pub git_fetch_tags: bool,
    pub git_fetch_notes: bool,
    pub bazel_locks_amount: String,
    pub command: String,
    pub text_on_skip: String,
    pub result_check_type: String,
    pub result_check_file_pattern: String,
    pub jenkins_test_result_path: String,
    state: PhantomData<S>,
}

impl From<RawStage> for Stage<Draft> {
    fn from(raw: RawStage) -> Self {
        Self {
            name: raw.name,
            only_when_not_empty: raw.only_when_not_empty.unwrap_or_default(),
            dir: raw.dir.unwrap_or_default(),
            env_vars: raw
                .env_vars
                .iter()
                .map(|(k, v)| (k.clone(), yaml_value_to_string(v)))
                .collect(),
            sec_var_list: raw.sec_var_list,
            git_fetch_tags: raw.git_fetch_tags,
            git_fetch_notes: raw.git_fetch_notes,
            bazel_locks_amount: raw
                .bazel_locks_amount
                .as_ref()
                .map(yaml_value_to_string)
                .unwrap_or_else(|| DEFAULT_BAZEL_LOCKS.to_string()),
            command: raw.command.replace('\n', ";"),
            text_on_skip: raw.text_on_skip.unwrap_or_default(),
            result_check_type: raw.result_check_type.unwrap_or_default(),
            result_check_file_pattern: raw.result_check_file_pattern.unwrap_or_default(),
            jenkins_test_result_path: raw.jenkins_test_result_path.unwrap_or_default(),
            state: PhantomData,
        }
    }
}

impl Stage<Draft> {
    /// Apply `f` to every string field, producing the Templated stage.
    pub fn map_text(self, f: impl Fn(&str) -> String) -> Stage<Templated> {
        Stage {
            name: f(&self.name),
            only_when_not_empty: f(&self.only_when_not_empty),
            dir: f(&self.dir),
            env_vars: self
                .env_vars
                .iter()
                .map(|(k, v)| (k.clone(), f(v)))
                .collect(),
            sec_var_list: self.sec_var_list.iter().map(|s| f(s)).collect(),
            git_fetch_tags: self.git_fetch_tags,
            git_fetch_notes: self.git_fetch_notes,
            bazel_locks_amount: f(&self.bazel_locks_amount),
            command: f(&self.command),
            text_on_skip: f(&self.text_on_skip),
            result_check_type: f(&self.result_check_type),
            result_check_file_pattern: f(&self.result_check_file_pattern),
            jenkins_test_result_path: f(&self.jenkins_test_result_path),
            state: PhantomData,
        }
    }
}

impl Stage<Templated> {
    /// Names listed in the skip condition, trimmed, empties dropped.
    pub fn condition_vars(&self) -> Vec<&str> {
        self.only_when_not_empty
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }
}

// ============================================================================
// Finalized stages
// ============================================================================

/// A stage ready to execute. Field names are the plan's wire names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", deny_unknown_fields)]
pub struct RunnableStage {
    pub name: String,
    pub dir: String,
    pub env_var_list: Vec<String>,
    pub sec_var_list: Vec<String>,
    pub git_fetch_tags: bool,
    pub git_fetch_notes: bool,
    pub bazel_locks_amount: i64,
    pub command: String,
    pub result_check_type: String,
    pub result_check_file_pattern: String,
    pub jenkins_test_result_path: String,
}

impl RunnableStage {
    /// Split `ENV_VAR_LIST` entries back into key/value pairs.
    pub fn env_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.env_var_list
            .iter()
            .map(|entry| entry.split_once('=').unwrap_or((entry.as_str(), "")))
    }
}

/// A stage whose condition did not hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", deny_unknown_fields)]
pub struct SkippedStage {
    pub name: String,

    /// Human-readable reason, mentions the condition
    pub skipped: String,
}

/// Outcome of finalization. Serialized without a tag: the variants have
/// disjoint field sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FinalizedStage {
    Skipped(SkippedStage),
    Runnable(RunnableStage),
}

impl FinalizedStage {
    pub fn name(&self) -> &str {
        match self {
            Self::Runnable(s) => &s.name,
            Self::Skipped(s) => &s.name,
        }
    }

    pub fn is_runnable(&self) -> bool {
        matches!(self, Self::Runnable(_))
    }
}

// ============================================================================
// Plan
// ============================================================================

/// The hand-off document for an external orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Plan {
    pub variables: VariableMapping,
    pub stages: Vec<FinalizedStage>,
}

// ============================================================================
// Run reports
// ============================================================================

/// Terminal state of a stage in a local run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageStatus {
    Skipped { reason: String },
    Succeeded { elapsed: Duration },
    Failed { elapsed: Duration },
    /// Not started because an earlier stage failed under `--exitfirst`
    NotAttempted,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skipped { .. } => write!(f, "SKIPPED"),
            Self::Succeeded { elapsed } => {
                write!(f, "SUCCESSFUL ({:.2}s)", elapsed.as_secs_f64())
            }
            Self::Failed { elapsed } => write!(f, "FAILED ({:.2}s)", elapsed.as_secs_f64()),
            Self::NotAttempted => write!(f, "NOT ATTEMPTED"),
        }
    }
}

/// One row of the final summary.
#[derive(Debug, Clone)]
pub struct StageReport {
    pub name: String,
    pub status: StageStatus,
}

impl StageReport {
    pub fn failed(&self) -> bool {
        matches!(self.status, StageStatus::Failed { .. })
    }

    /// Summary row with the name left-aligned to `width`.
    pub fn summary_line(&self, width: usize) -> String {
        format!("{:<width$}  {}", self.name, self.status, width = width)
    }
}

// ============================================================================
// Value helpers
// ============================================================================

/// Convert a YAML scalar to its textual form.
pub fn yaml_value_to_string(val: &serde_yaml_ng::Value) -> String {
    match val {
        serde_yaml_ng::Value::String(s) => s.clone(),
        serde_yaml_ng::Value::Number(n) => n.to_string(),
        serde_yaml_ng::Value::Bool(b) => b.to_string(),
        serde_yaml_ng::Value::Null => String::new(),
        other => format!("{:?}", other),
    }
}

/// Accepts the usual truthy spellings, case-insensitively.
pub fn is_truthy(text: &str) -> bool {
    matches!(
        text.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}

// ============================================================================
// Tests
// ============================================================================
