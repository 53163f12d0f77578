//! External process execution.
//!
//! [`ProcessRunner`] is the seam between the pipeline and the operating system.
//! The production implementation, [`TokioProcessRunner`], spawns the child with
//! both output streams piped and drains them concurrently while the child runs,
//! so verbose tools cannot fill a pipe and stall. A non-zero exit status is
//! returned to the caller, never raised.

use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

/// A fully described command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Executable to launch
    pub program: PathBuf,
    /// Arguments, passed verbatim
    pub args: Vec<String>,
    /// Working directory, inherited when `None`
    pub cwd: Option<PathBuf>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// File name of the program, for log lines.
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }
}

impl std::fmt::Display for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " {arg:?}")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Exit status and merged stdout/stderr of a finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    /// stdout and stderr interleaved in arrival order
    pub output: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Failures that prevent a process from producing a [`ProcessOutput`].
#[derive(Error, Debug)]
pub enum RunnerError {
    /// The executable is missing or not launchable
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Reading output or waiting for exit failed after launch
    #[error("lost track of {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Runs external commands to completion.
pub trait ProcessRunner: Send + Sync {
    /// Launches `invocation`, waits for it to exit and returns its output.
    fn run(
        &self,
        invocation: &Invocation,
    ) -> impl Future<Output = Result<ProcessOutput, RunnerError>> + Send;
}

/// [`ProcessRunner`] backed by `tokio::process`.
///
/// The child is killed if the returned future is dropped before it exits,
/// which is how pipeline cancellation stops a running tool.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioProcessRunner;

impl TokioProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, invocation: &Invocation) -> Result<ProcessOutput, RunnerError> {
        let program = invocation.program_name();
        log::debug!("Executing: {}", invocation);

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &invocation.cwd {
            command.current_dir(cwd);
        }

        let mut child = command.spawn().map_err(|source| RunnerError::Launch {
            program: program.clone(),
            source,
        })?;

        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // Both pumps must finish before exit status is read, otherwise trailing
        // output can be lost.
        let (stdout_result, stderr_result, combined) = tokio::join!(
            pump(stdout, tx.clone()),
            pump(stderr, tx),
            async {
                let mut combined = Vec::new();
                while let Some(chunk) = rx.recv().await {
                    combined.extend_from_slice(&chunk);
                }
                combined
            }
        );

        let wait_err = |source: std::io::Error| RunnerError::Wait {
            program: program.clone(),
            source,
        };
        stdout_result.map_err(wait_err)?;
        stderr_result.map_err(wait_err)?;

        let status = child.wait().await.map_err(wait_err)?;
        log::debug!("{} finished with {}", program, status);

        Ok(ProcessOutput {
            exit_code: status.code(),
            output: String::from_utf8_lossy(&combined).into_owned(),
        })
    }
}

/// Forwards `reader` line by line into `tx` until EOF.
async fn pump<R>(reader: Option<R>, tx: mpsc::UnboundedSender<Vec<u8>>) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return Ok(());
    };
    let mut reader = BufReader::new(reader);
    loop {
        let mut line = Vec::new();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            return Ok(());
        }
        // Receiver lives until both pumps are done.
        let _ = tx.send(line);
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Invocation {
        Invocation::new("/bin/sh").args(["-c", script])
    }

    #[tokio::test]
    async fn captures_both_streams_and_exit_code() {
        let output = TokioProcessRunner::new()
            .run(&sh("echo out-1; echo err-1 >&2; echo out-2; exit 3"))
            .await
            .unwrap();

        assert_eq!(output.exit_code, Some(3));
        assert!(!output.success());
        for line in ["out-1", "out-2", "err-1"] {
            assert!(output.output.contains(line), "missing {line}");
        }
        let first = output.output.find("out-1").unwrap();
        let second = output.output.find("out-2").unwrap();
        assert!(first < second);
    }

    #[tokio::test]
    async fn honours_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "here").unwrap();

        let output = TokioProcessRunner::new()
            .run(&sh("cat marker.txt").current_dir(dir.path()))
            .await
            .unwrap();

        assert!(output.success());
        assert_eq!(output.output, "here");
    }

    #[tokio::test]
    async fn drains_output_larger_than_a_pipe_buffer() {
        // ~1 MiB on each stream.
        let script = "i=0; while [ $i -lt 16384 ]; do \
                      echo 0123456789012345678901234567890123456789012345678901234567890123; \
                      echo abcdefghijabcdefghijabcdefghijabcdefghijabcdefghijabcdefghijabc >&2; \
                      i=$((i+1)); done";
        let output = TokioProcessRunner::new().run(&sh(script)).await.unwrap();

        assert!(output.success());
        assert_eq!(output.output.lines().count(), 2 * 16384);
    }

    #[tokio::test]
    async fn missing_executable_is_launch_error() {
        let err = TokioProcessRunner::new()
            .run(&Invocation::new("/definitely/not/a/tool"))
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::Launch { .. }));
        assert!(err.to_string().contains("tool"));
    }

    #[test]
    fn display_quotes_arguments_with_spaces() {
        let invocation = Invocation::new("/usr/bin/hdiutil").args(["create", "-volname", "My App"]);
        assert_eq!(
            invocation.to_string(),
            r#"/usr/bin/hdiutil create -volname "My App""#
        );
        assert_eq!(invocation.program_name(), "hdiutil");
    }
}
