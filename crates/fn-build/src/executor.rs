use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::oneshot;

use crate::error::ExecError;

/// How a streamed subprocess presents itself on the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Child output goes to null sinks; a dot ticker runs on stderr.
    Quiet,
    /// Child stdout and stderr are forwarded.
    Verbose,
}

impl OutputMode {
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            Self::Verbose
        } else {
            Self::Quiet
        }
    }
}

/// Abstraction over the container engine CLI for testability.
///
/// Production code uses [`RealExecutor`], tests use mockall-generated mocks.
#[allow(async_fn_in_trait)]
pub trait ContainerExecutor: Send + Sync {
    /// Program name used in messages (`docker`, `podman`).
    fn program(&self) -> &str;

    /// Execute an engine command and capture stdout.
    async fn exec(&self, args: &[String]) -> Result<String, ExecError>;

    /// Execute an engine command in `dir`, cancelling it on SIGINT/SIGTERM.
    async fn exec_streaming(
        &self,
        args: &[String],
        dir: &Path,
        mode: OutputMode,
    ) -> Result<(), ExecError>;

    /// Execute an engine command with data piped to stdin and capture stdout.
    async fn exec_with_stdin(&self, args: &[String], stdin_data: &[u8])
    -> Result<String, ExecError>;
}

/// Container engine executor backed by a real subprocess.
#[derive(Debug, Clone)]
pub struct RealExecutor {
    program: String,
}

impl RealExecutor {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self, args: &[String]) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(args);
        cmd
    }

    fn not_found(&self, source: std::io::Error) -> ExecError {
        ExecError::NotFound {
            program: self.program.clone(),
            source,
        }
    }

    fn output_to_string(&self, args: &[String], output: std::process::Output) -> Result<String, ExecError> {
        if output.status.success() {
            String::from_utf8(output.stdout).map_err(|e| ExecError::InvalidUtf8 {
                program: self.program.clone(),
                source: e,
            })
        } else {
            Err(ExecError::CommandFailed {
                program: self.program.clone(),
                args: args.to_vec(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            })
        }
    }
}

impl Default for RealExecutor {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl ContainerExecutor for RealExecutor {
    fn program(&self) -> &str {
        &self.program
    }

    async fn exec(&self, args: &[String]) -> Result<String, ExecError> {
        let output = self
            .command(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| self.not_found(e))?;
        self.output_to_string(args, output)
    }

    async fn exec_streaming(
        &self,
        args: &[String],
        dir: &Path,
        mode: OutputMode,
    ) -> Result<(), ExecError> {
        let mut cmd = self.command(args);
        cmd.current_dir(dir);
        match mode {
            OutputMode::Verbose => cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit()),
            OutputMode::Quiet => cmd.stdout(Stdio::null()).stderr(Stdio::null()),
        };
        tracing::debug!(program = %self.program, ?args, dir = %dir.display(), "spawning");
        let child = cmd.spawn().map_err(|e| self.not_found(e))?;

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let ticker = (mode == OutputMode::Quiet).then(|| tokio::spawn(tick(stop_rx)));

        let outcome = supervise(child, &self.program).await;

        drop(stop_tx);
        if let Some(ticker) = ticker {
            if let Err(e) = ticker.await {
                tracing::debug!(error = %e, "progress ticker ended abnormally");
            }
            eprintln!();
        }

        let status = outcome?;
        if status.success() {
            Ok(())
        } else {
            Err(ExecError::CommandFailed {
                program: self.program.clone(),
                args: args.to_vec(),
                stderr: format!("exit code: {status}"),
            })
        }
    }

    async fn exec_with_stdin(
        &self,
        args: &[String],
        stdin_data: &[u8],
    ) -> Result<String, ExecError> {
        use tokio::io::AsyncWriteExt;

        let mut child = self
            .command(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.not_found(e))?;

        let stdin_err = |e| ExecError::StdinWrite {
            program: self.program.clone(),
            source: e,
        };
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(stdin_data).await.map_err(stdin_err)?;
            stdin.shutdown().await.map_err(stdin_err)?;
        }

        let output = child.wait_with_output().await.map_err(|e| ExecError::Wait {
            program: self.program.clone(),
            source: e,
        })?;
        self.output_to_string(args, output)
    }
}

/// Wait for `child`, racing SIGINT and SIGTERM. On a signal the child gets
/// SIGTERM and is reaped before the cancellation is reported.
pub(crate) async fn supervise(
    mut child: tokio::process::Child,
    program: &str,
) -> Result<ExitStatus, ExecError> {
    let mut sigint = signal(SignalKind::interrupt()).map_err(|e| ExecError::Signal { source: e })?;
    let mut sigterm = signal(SignalKind::terminate()).map_err(|e| ExecError::Signal { source: e })?;

    let wait_err = |e| ExecError::Wait {
        program: program.to_owned(),
        source: e,
    };

    let signal_name = tokio::select! {
        status = child.wait() => return status.map_err(wait_err),
        _ = sigint.recv() => "interrupt",
        _ = sigterm.recv() => "terminated",
    };

    tracing::debug!(signal = signal_name, "forwarding SIGTERM to child");
    forward_term(&child);
    child.wait().await.map_err(wait_err)?;
    Err(ExecError::Cancelled {
        signal: signal_name,
    })
}

fn forward_term(child: &tokio::process::Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return;
    };
    let Ok(pid) = i32::try_from(pid) else {
        tracing::warn!(pid, "child pid out of range, not forwarding signal");
        return;
    };
    if let Err(e) = kill(Pid::from_raw(pid), Signal::SIGTERM) {
        tracing::warn!(pid, error = %e, "failed to forward SIGTERM");
    }
}

/// Print a dot to stderr every second until `stop` resolves or its sender
/// is dropped.
async fn tick(mut stop: oneshot::Receiver<()>) {
    use std::io::Write;

    let mut interval = tokio::time::interval(Duration::from_secs(1));
    interval.tick().await;
    loop {
        tokio::select! {
            _ = &mut stop => break,
            _ = interval.tick() => {
                eprint!(".");
                if let Err(e) = std::io::stderr().flush() {
                    tracing::debug!(error = %e, "stderr flush failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ticker_stops_when_sender_drops() {
        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(tick(rx));
        drop(tx);
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn missing_program_is_not_found() {
        let exec = RealExecutor::new("definitely-not-a-container-engine");
        let err = exec.exec(&["version".to_owned()]).await.unwrap_err();
        assert!(matches!(err, ExecError::NotFound { .. }));
    }

    #[tokio::test]
    async fn stdin_is_piped_through() {
        let exec = RealExecutor::new("cat");
        let out = exec.exec_with_stdin(&[], b"{\"a\":1}").await.unwrap();
        assert_eq!(out, "{\"a\":1}");
    }

    #[tokio::test]
    async fn streaming_reports_failed_exit() {
        let exec = RealExecutor::new("false");
        let dir = std::env::temp_dir();
        let err = exec
            .exec_streaming(&[], &dir, OutputMode::Verbose)
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::CommandFailed { .. }));
    }
}
