//! Local execution of finalized stages.
//!
//! Stages run strictly one after another in declaration order. Each
//! runnable stage ends Succeeded or Failed; skipped and filtered stages never
//! spawn a process; with `exit_first` the stages after the first failure are
//! reported as not attempted.

use super::types::*;
use crate::transport::stream::{self, StreamRequest};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// Prefix for lines replayed from a `.txt` result file.
pub const RESULT_MARKER: &str = "result|";

/// Options for a local run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Stop starting new stages after the first failure
    pub exit_first: bool,
    /// Run only stages whose name contains one of these substrings
    pub name_filter: Vec<String>,
    /// 0 buffers stage output and replays it on failure; higher echoes live
    pub verbosity: u8,
}

impl RunOptions {
    fn selects(&self, name: &str) -> bool {
        self.name_filter.is_empty() || self.name_filter.iter().any(|s| name.contains(s.as_str()))
    }
}

/// Run every stage and print the summary table.
pub async fn run_stages(stages: &[FinalizedStage], opts: &RunOptions) -> Vec<StageReport> {
    let mut reports = Vec::with_capacity(stages.len());
    let mut stopped = false;

    for stage in stages {
        let status = if stopped {
            StageStatus::NotAttempted
        } else {
            run_one(stage, opts).await
        };

        if !stopped && opts.exit_first && matches!(status, StageStatus::Failed { .. }) {
            println!(
                "{}",
                format!(
                    "Stopping after failure of '{}' (--exitfirst), remaining stages not started",
                    stage.name()
                )
                .red()
            );
            stopped = true;
        }

        reports.push(StageReport {
            name: stage.name().to_string(),
            status,
        });
    }

    print_summary(&reports);
    reports
}

async fn run_one(stage: &FinalizedStage, opts: &RunOptions) -> StageStatus {
    match stage {
        FinalizedStage::Skipped(skipped) => {
            println!("{} {}: {}", "SKIP".yellow(), skipped.name, skipped.skipped);
            StageStatus::Skipped {
                reason: skipped.skipped.clone(),
            }
        }
        FinalizedStage::Runnable(runnable) if !opts.selects(&runnable.name) => {
            let reason = format!(
                "not selected by --filter-substring {}",
                opts.name_filter.join(", ")
            );
            println!("{} {}: {}", "SKIP".yellow(), runnable.name, reason);
            StageStatus::Skipped { reason }
        }
        FinalizedStage::Runnable(runnable) => run_runnable(runnable, opts).await,
    }
}

async fn run_runnable(stage: &RunnableStage, opts: &RunOptions) -> StageStatus {
    println!("{} {}", "==>".bold(), stage.name.bold());
    info!(stage = %stage.name, dir = %stage.dir, command = %stage.command, "running stage");

    let request = StreamRequest {
        command: &stage.command,
        dir: (!stage.dir.is_empty()).then(|| Path::new(stage.dir.as_str())),
        env: stage.env_pairs().collect(),
        echo: opts.verbosity > 0,
    };

    let started = Instant::now();
    match stream::run_streamed(&request).await {
        Ok(run) if run.success() => {
            info!(stage = %stage.name, elapsed = ?run.elapsed, "stage succeeded");
            StageStatus::Succeeded {
                elapsed: run.elapsed,
            }
        }
        Ok(run) => {
            warn!(stage = %stage.name, exit_code = run.exit_code, "stage failed");
            report_failure(stage, &run.output);
            StageStatus::Failed {
                elapsed: run.elapsed,
            }
        }
        Err(e) => {
            warn!(stage = %stage.name, error = %e, "cannot start stage");
            report_failure(stage, &[format!("cannot start stage: {}", e)]);
            StageStatus::Failed {
                elapsed: started.elapsed(),
            }
        }
    }
}

fn report_failure(stage: &RunnableStage, output: &[String]) {
    for line in failure_lines(stage, output) {
        println!("{}", line);
    }
}

/// Failure report: banner, the buffered output in order, then the result
/// file hints.
pub fn failure_lines(stage: &RunnableStage, output: &[String]) -> Vec<String> {
    let mut lines = vec![format!("---- stage '{}' FAILED ----", stage.name)
        .red()
        .bold()
        .to_string()];
    lines.extend(output.iter().cloned());
    lines.extend(result_check_lines(stage));
    lines
}

/// Hint lines for the stage's result files.
///
/// `RESULT_CHECK_FILE_PATTERN` is a glob relative to the stage directory.
/// Matching `.txt` files are shown line by line; any other format is only
/// named.
pub fn result_check_lines(stage: &RunnableStage) -> Vec<String> {
    let pattern = stage.result_check_file_pattern.trim();
    if pattern.is_empty() {
        return Vec::new();
    }

    let full = if Path::new(pattern).is_absolute() || stage.dir.is_empty() {
        PathBuf::from(pattern)
    } else {
        Path::new(&stage.dir).join(pattern)
    };
    let kind = if stage.result_check_type.is_empty() {
        "unknown"
    } else {
        stage.result_check_type.as_str()
    };
    let mut lines = vec![format!("Check result files ({}): {}", kind, full.display())];

    let matches: Vec<PathBuf> = match glob::glob(&full.to_string_lossy()) {
        Ok(paths) => paths.filter_map(|p| p.ok()).collect(),
        Err(e) => {
            lines.push(format!("  invalid pattern: {}", e));
            return lines;
        }
    };
    if matches.is_empty() {
        lines.push("  no matching file".to_string());
    }

    for path in matches {
        if path.extension().is_some_and(|ext| ext == "txt") {
            match std::fs::read_to_string(&path) {
                Ok(content) => {
                    lines.push(format!("  {}:", path.display()));
                    lines.extend(
                        content
                            .lines()
                            .map(|l| format!("{} {}", RESULT_MARKER.magenta(), l)),
                    );
                }
                Err(e) => lines.push(format!("  {} (unreadable: {})", path.display(), e)),
            }
        } else {
            lines.push(format!("  {} (format not shown)", path.display()));
        }
    }
    lines
}

/// Aligned summary rows, one per stage.
pub fn summary_lines(reports: &[StageReport]) -> Vec<String> {
    let width = reports.iter().map(|r| r.name.len()).max().unwrap_or(0);
    reports.iter().map(|r| r.summary_line(width)).collect()
}

fn print_summary(reports: &[StageReport]) {
    println!();
    println!("{}", "Summary:".bold());
    for (report, line) in reports.iter().zip(summary_lines(reports)) {
        let line = match report.status {
            StageStatus::Succeeded { .. } => line.green(),
            StageStatus::Failed { .. } => line.red(),
            StageStatus::Skipped { .. } => line.yellow(),
            StageStatus::NotAttempted => line.dimmed(),
        };
        println!("  {}", line);
    }
}
