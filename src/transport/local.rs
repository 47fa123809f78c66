//! Blocking local execution, used to evaluate variable recipes.

use super::{ExecOutput, SHELL};
use std::process::{Command, Stdio};

/// Run a script with `bash -c` and wait for it. Stdin is closed, so a
/// command that reads it sees EOF. The child inherits this process's
/// environment and working directory.
pub fn exec_local(script: &str) -> std::io::Result<ExecOutput> {
    let child = Command::new(SHELL)
        .arg("-c")
        .arg(script)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let output = child.wait_with_output()?;

    Ok(ExecOutput {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_echo() {
        let out = exec_local("echo hello").unwrap();
        assert!(out.success());
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[test]
    fn test_local_failure_keeps_stdout() {
        let out = exec_local("echo partial; exit 42").unwrap();
        assert!(!out.success());
        assert_eq!(out.exit_code, 42);
        assert_eq!(out.stdout.trim(), "partial");
    }

    #[test]
    fn test_local_multiline() {
        let out = exec_local("echo line1\necho line2").unwrap();
        assert!(out.success());
        let lines: Vec<_> = out.stdout.lines().collect();
        assert_eq!(lines, vec!["line1", "line2"]);
    }

    #[test]
    fn test_local_stdin_is_closed() {
        let out = exec_local("cat\necho after").unwrap();
        assert!(out.success());
        assert_eq!(out.stdout, "after\n");
    }

    #[test]
    fn test_local_stderr() {
        let out = exec_local("echo err >&2").unwrap();
        assert!(out.success());
        assert!(out.stderr.contains("err"));
    }

    #[test]
    fn test_local_signal_killed() {
        // No exit code when killed by a signal
        let out = exec_local("kill -9 $$").unwrap();
        assert_eq!(out.exit_code, -1);
    }

    #[test]
    fn test_local_bash_redirection() {
        let out = exec_local("echo both &>/dev/stdout").unwrap();
        assert!(out.success());
        assert_eq!(out.stdout.trim(), "both");
    }
}
