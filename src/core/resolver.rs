//! Variable resolution.
//!
//! Receipts are evaluated in declaration order. Each recipe sees only the
//! seed variables and the receipts declared before it; a reference to
//! anything else is a configuration error. The first definition of a name
//! wins, so a seed passed with `--env` overrides a derived default.

use super::error::{Error, Result};
use super::template;
use super::types::{VariableMapping, VariableReceipt};
use crate::transport::local;
use tracing::{debug, warn};

/// Resolve `receipts` on top of `seed`, returning the full mapping.
pub fn resolve_variables(
    receipts: &[VariableReceipt],
    seed: &VariableMapping,
) -> Result<VariableMapping> {
    let mut resolved = seed.clone();

    for receipt in receipts {
        if resolved.contains_key(&receipt.name) {
            warn!(
                variable = %receipt.name,
                "variable already set, ignoring later definition"
            );
            continue;
        }

        let value = evaluate_receipt(receipt, &resolved)?;
        debug!(variable = %receipt.name, %value, "resolved variable");
        resolved.insert(receipt.name.clone(), value);
    }

    Ok(resolved)
}

/// Expand and run one recipe against the variables resolved so far.
fn evaluate_receipt(receipt: &VariableReceipt, known: &VariableMapping) -> Result<String> {
    let command = template::substitute(&receipt.sh, known);
    if template::has_placeholder(&command) {
        return Err(Error::UndeclaredVariable {
            name: receipt.name.clone(),
            variables: template::unresolved(&command),
            command,
        });
    }

    let output = match local::exec_local(&command) {
        Ok(out) => out,
        Err(e) => {
            warn!(variable = %receipt.name, error = %e, "cannot run recipe, using empty value");
            return Ok(String::new());
        }
    };
    if !output.success() {
        warn!(
            variable = %receipt.name,
            exit_code = output.exit_code,
            stderr = %output.stderr.trim(),
            "recipe failed, keeping its stdout"
        );
    }

    let value = output.stdout.trim();
    if receipt.folds_newlines() {
        Ok(fold_newlines(value))
    } else {
        Ok(value.to_string())
    }
}

/// Join lines with single spaces.
fn fold_newlines(text: &str) -> String {
    text.lines().collect::<Vec<_>>().join(" ")
}

/// Parse `NAME=VALUE` seeds from the command line. Repeated names keep
/// their first value.
pub fn parse_seed(entries: &[String]) -> Result<VariableMapping> {
    let mut seed = VariableMapping::new();
    for entry in entries {
        let (name, value) = entry
            .split_once('=')
            .ok_or_else(|| Error::InvalidSeed(entry.clone()))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidSeed(entry.clone()));
        }
        if seed.contains_key(name) {
            warn!(variable = %name, "seed given more than once, keeping the first");
            continue;
        }
        seed.insert(name.to_string(), value.to_string());
    }
    Ok(seed)
}
