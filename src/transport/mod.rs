//! Process transports: blocking capture for variable recipes, and streamed
//! async execution for stages.

pub mod local;
pub mod stream;

/// Shell used for recipes and stage commands. Stage commands may rely on
/// bash-only redirections such as `&>` and `|&`.
pub const SHELL: &str = "bash";

/// Output from executing a script to completion.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}
