//! Command line: argument parsing, log setup, and the plan-or-run pipeline.

use crate::core::error::{Error, Result};
use crate::core::executor::{self, RunOptions};
use crate::core::types::Plan;
use crate::core::{finalizer, parser, plan, resolver};
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "stagewright",
    version,
    about = "Resolve, template and run CI stages from a YAML pipeline"
)]
pub struct Cli {
    /// Seed variable, NAME=VALUE (repeatable)
    #[arg(short, long = "env", value_name = "NAME=VALUE")]
    pub env: Vec<String>,

    /// Write the finalized plan as JSON to PATH (`-` for stdout) instead of running
    #[arg(short, long, value_name = "PATH")]
    pub write_file: Option<String>,

    /// Ignore ONLY_WHEN_NOT_EMPTY conditions
    #[arg(long)]
    pub no_skip: bool,

    /// Do not start further stages after the first failure
    #[arg(short = 'x', long = "exitfirst")]
    pub exit_first: bool,

    /// Run only stages whose name contains this substring (repeatable)
    #[arg(short = 'k', long = "filter-substring", value_name = "TEXT")]
    pub filter_substring: Vec<String>,

    /// Echo stage output live and raise log verbosity (repeatable)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Pipeline document
    pub file: PathBuf,
}

/// Log filter for `verbosity`, overridden by `RUST_LOG` when set.
fn log_filter(verbosity: u8) -> EnvFilter {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Subscriber writing to stderr so a plan on stdout stays clean.
pub fn build_subscriber(verbosity: u8) -> impl tracing::Subscriber + Send + Sync {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(verbosity))
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish()
}

/// Run the whole pipeline for parsed arguments.
pub fn dispatch(cli: Cli) -> Result<()> {
    let _guard = tracing::subscriber::set_default(build_subscriber(cli.verbose));

    let seed = resolver::parse_seed(&cli.env)?;
    let (receipts, drafts) = parser::load_pipeline(&cli.file)?;
    let variables = resolver::resolve_variables(&receipts, &seed)?;
    let stages = finalizer::finalize_stages(drafts, &variables, cli.no_skip)?;
    info!(
        file = %cli.file.display(),
        stages = stages.len(),
        variables = variables.len(),
        "pipeline finalized"
    );

    if let Some(target) = &cli.write_file {
        return plan::write_plan(&Plan::new(variables, stages), target);
    }

    let opts = RunOptions {
        exit_first: cli.exit_first,
        name_filter: cli.filter_substring,
        verbosity: cli.verbose,
    };
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(Error::Runtime)?;
    let reports = runtime.block_on(executor::run_stages(&stages, &opts));

    let failed = reports.iter().filter(|r| r.failed()).count();
    if failed > 0 {
        return Err(Error::StagesFailed(failed));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn write_pipeline(dir: &Path, yaml: &str) -> PathBuf {
        let path = dir.join("stages.yml");
        std::fs::write(&path, yaml).unwrap();
        path
    }

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("stagewright").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_cli_flags() {
        let parsed = cli(&[
            "-e", "A=1", "--env", "B=2", "-x", "-k", "lint", "-k", "test", "-vv", "--no-skip",
            "-w", "-", "p.yml",
        ]);
        assert_eq!(parsed.env, vec!["A=1", "B=2"]);
        assert!(parsed.exit_first);
        assert!(parsed.no_skip);
        assert_eq!(parsed.filter_substring, vec!["lint", "test"]);
        assert_eq!(parsed.verbose, 2);
        assert_eq!(parsed.write_file.as_deref(), Some("-"));
        assert_eq!(parsed.file, PathBuf::from("p.yml"));
    }

    #[test]
    fn test_cli_requires_file() {
        assert!(Cli::try_parse_from(["stagewright"]).is_err());
    }

    #[test]
    fn test_dispatch_writes_plan() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_pipeline(
            dir.path(),
            r#"
VARIABLES:
  - NAME: FOO
    SH: echo foo ${FIRST}
STAGES:
  - NAME: greet
    COMMAND: echo ${FOO}
  - NAME: docs
    ONLY_WHEN_NOT_EMPTY: DOCS_CHANGED
    COMMAND: make docs
"#,
        );
        let out = dir.path().join("plan.json");
        let args = cli(&[
            "-e",
            "FIRST=first",
            "-e",
            "DOCS_CHANGED=",
            "-w",
            out.to_str().unwrap(),
            path.to_str().unwrap(),
        ]);
        dispatch(args).unwrap();

        let plan = Plan::from_json(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(plan.variables["FOO"], "foo first");
        assert!(plan.stages[0].is_runnable());
        assert!(!plan.stages[1].is_runnable());
    }

    #[test]
    fn test_dispatch_runs_stages() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("done");
        let path = write_pipeline(
            dir.path(),
            &format!(
                "STAGES:\n  - NAME: touch\n    COMMAND: touch {}\n",
                marker.display()
            ),
        );
        dispatch(cli(&[path.to_str().unwrap()])).unwrap();
        assert!(marker.exists());
    }

    #[test]
    fn test_dispatch_failed_stage_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_pipeline(
            dir.path(),
            "STAGES:\n  - NAME: a\n    COMMAND: exit 1\n  - NAME: b\n    COMMAND: exit 3\n",
        );
        match dispatch(cli(&[path.to_str().unwrap()])) {
            Err(Error::StagesFailed(n)) => assert_eq!(n, 2),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_dispatch_exit_first_counts_one_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_pipeline(
            dir.path(),
            "STAGES:\n  - NAME: a\n    COMMAND: exit 1\n  - NAME: b\n    COMMAND: exit 3\n",
        );
        match dispatch(cli(&["-x", path.to_str().unwrap()])) {
            Err(Error::StagesFailed(n)) => assert_eq!(n, 1),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_dispatch_bad_seed() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_pipeline(dir.path(), "STAGES: []\n");
        let result = dispatch(cli(&["-e", "NOEQUALS", path.to_str().unwrap()]));
        assert!(matches!(result, Err(Error::InvalidSeed(_))));
    }

    #[test]
    fn test_dispatch_unresolved_field_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_pipeline(
            dir.path(),
            "STAGES:\n  - NAME: a\n    COMMAND: echo ${MISSING}\n",
        );
        let out = dir.path().join("plan.json");
        let result = dispatch(cli(&["-w", out.to_str().unwrap(), path.to_str().unwrap()]));
        assert!(matches!(result, Err(Error::UnresolvedField { .. })));
        assert!(!out.exists());
    }

    #[test]
    fn test_dispatch_missing_file() {
        let result = dispatch(cli(&["/nonexistent/stagewright.yml"]));
        assert!(matches!(result, Err(Error::Read { .. })));
    }
}
