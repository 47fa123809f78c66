//! Streamed execution: one child process, stdout and stderr drained by two
//! concurrently scheduled reader tasks.
//!
//! Both readers run to EOF before the exit status is awaited. A child that
//! fills one pipe while the parent waits on the other would otherwise block
//! forever.

use super::SHELL;
use colored::{ColoredString, Colorize};
use std::io;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

/// Read buffer per stream. Must hold a child's largest single write.
pub const STREAM_BUFFER_CAPACITY: usize = 512 * 1024;

/// Always set on stage processes so interpreters flush line by line.
pub const UNBUFFERED_ENV: (&str, &str) = ("PYTHONUNBUFFERED", "1");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl StreamKind {
    fn prefix(self) -> ColoredString {
        match self {
            Self::Stdout => "stdout|".cyan(),
            Self::Stderr => "stderr|".yellow(),
        }
    }

    /// Prefix a line with this stream's colored tag.
    pub fn tag(self, line: &str) -> String {
        format!("{} {}", self.prefix(), line)
    }
}

/// What to run and where.
#[derive(Debug, Clone, Default)]
pub struct StreamRequest<'a> {
    pub command: &'a str,
    /// Working directory; `None` keeps the current one
    pub dir: Option<&'a Path>,
    /// Added on top of the inherited environment
    pub env: Vec<(&'a str, &'a str)>,
    /// Print lines as they arrive instead of buffering them
    pub echo: bool,
}

/// Result of one streamed run.
#[derive(Debug, Clone)]
pub struct StreamedRun {
    pub exit_code: i32,
    /// Tagged lines from both streams; empty when echoing
    pub output: Vec<String>,
    pub elapsed: Duration,
}

impl StreamedRun {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Spawn `bash -c <command>` and drain both streams until the child exits.
pub async fn run_streamed(request: &StreamRequest<'_>) -> io::Result<StreamedRun> {
    let start = Instant::now();

    let mut cmd = Command::new(SHELL);
    cmd.arg("-c")
        .arg(request.command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    for (key, value) in &request.env {
        cmd.env(key, value);
    }
    cmd.env(UNBUFFERED_ENV.0, UNBUFFERED_ENV.1);
    if let Some(dir) = request.dir {
        cmd.current_dir(dir);
    }

    let mut child = cmd.spawn()?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| io::Error::other("child stdout not captured"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| io::Error::other("child stderr not captured"))?;

    let (sink, mut lines) = mpsc::unbounded_channel();
    let stdout_task = tokio::spawn(drain(stdout, StreamKind::Stdout, request.echo, sink.clone()));
    let stderr_task = tokio::spawn(drain(stderr, StreamKind::Stderr, request.echo, sink));

    let (stdout_done, stderr_done) = tokio::join!(stdout_task, stderr_task);
    stdout_done.map_err(io::Error::other)??;
    stderr_done.map_err(io::Error::other)??;

    let status = child.wait().await?;

    let mut output = Vec::new();
    while let Some(line) = lines.recv().await {
        output.push(line);
    }

    Ok(StreamedRun {
        exit_code: status.code().unwrap_or(-1),
        output,
        elapsed: start.elapsed(),
    })
}

/// Read `reader` line by line until EOF, echoing or forwarding non-blank lines.
async fn drain<R>(
    reader: R,
    kind: StreamKind,
    echo: bool,
    sink: mpsc::UnboundedSender<String>,
) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::with_capacity(STREAM_BUFFER_CAPACITY, reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            return Ok(());
        }
        let text = String::from_utf8_lossy(&buf);
        let line = text.trim_end_matches(['\n', '\r']);
        if line.trim().is_empty() {
            continue;
        }
        let tagged = kind.tag(line);
        if echo {
            println!("{}", tagged);
        } else {
            // receiver lives until both readers finish
            let _ = sink.send(tagged);
        }
    }
}
