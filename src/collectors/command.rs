//! Invocation of the LSF command-line tools.

use crate::collectors::error::CollectorError;
use futures::future::BoxFuture;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info_span};
use tracing_futures::Instrument as _;

/// Runs an external executable and returns its captured stdout.
pub trait CommandRunner: Send + Sync {
    fn run<'a>(
        &'a self,
        program: &'a str,
        args: &'a [&'a str],
    ) -> BoxFuture<'a, Result<Vec<u8>, CollectorError>>;
}

/// Spawns LSF binaries, optionally from a fixed directory and with a bounded wait.
#[derive(Clone, Debug, Default)]
pub struct LsfCommand {
    bin_dir: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl LsfCommand {
    #[must_use]
    pub const fn new(bin_dir: Option<PathBuf>, timeout: Option<Duration>) -> Self {
        Self { bin_dir, timeout }
    }

    fn resolve(&self, program: &str) -> PathBuf {
        self.bin_dir
            .as_deref()
            .map_or_else(|| PathBuf::from(program), |dir| dir.join(program))
    }

    async fn output(&self, path: &Path, args: &[&str]) -> io::Result<Vec<u8>> {
        let child = Command::new(path)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child).await.map_err(|_| {
                io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("no result after {}s", limit.as_secs_f64()),
                )
            })??,
            None => child.await?,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(io::Error::other(format!(
                "{}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(output.stdout)
    }
}

/// Render a command line for logs and error messages.
#[must_use]
pub fn command_line(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

impl CommandRunner for LsfCommand {
    fn run<'a>(
        &'a self,
        program: &'a str,
        args: &'a [&'a str],
    ) -> BoxFuture<'a, Result<Vec<u8>, CollectorError>> {
        Box::pin(async move {
            let path = self.resolve(program);
            let command = command_line(program, args);
            let span = info_span!(
                "process.command",
                process.command = %command,
                otel.kind = "client"
            );

            let stdout = self
                .output(&path, args)
                .instrument(span)
                .await
                .map_err(|source| CollectorError::ExecutionFailed {
                    command: command.clone(),
                    source,
                })?;

            debug!(command = %command, bytes = stdout.len(), "command finished");
            Ok(stdout)
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_joins_args() {
        assert_eq!(command_line("bhosts", &["-w", "-X"]), "bhosts -w -X");
        assert_eq!(command_line("lsid", &[]), "lsid");
    }

    #[test]
    fn test_resolve_uses_bin_dir() {
        let runner = LsfCommand::new(Some(PathBuf::from("/opt/lsf/bin")), None);
        assert_eq!(runner.resolve("bhosts"), PathBuf::from("/opt/lsf/bin/bhosts"));

        let runner = LsfCommand::default();
        assert_eq!(runner.resolve("bhosts"), PathBuf::from("bhosts"));
    }

    #[tokio::test]
    async fn test_missing_executable_is_execution_failure() {
        let runner = LsfCommand::new(Some(PathBuf::from("/nonexistent/lsf/bin")), None);
        let res = runner.run("bhosts", &["-w"]).await;
        assert!(matches!(
            res,
            Err(CollectorError::ExecutionFailed { ref command, .. }) if command == "bhosts -w"
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_captures_stdout() {
        let runner = LsfCommand::new(None, Some(Duration::from_secs(5)));
        let res = runner.run("echo", &["hello"]).await;
        assert!(matches!(res, Ok(ref out) if out == b"hello\n"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_is_execution_failure() {
        let runner = LsfCommand::new(None, None);
        let res = runner.run("false", &[]).await;
        assert!(matches!(res, Err(CollectorError::ExecutionFailed { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_is_execution_failure() {
        let runner = LsfCommand::new(None, Some(Duration::from_millis(50)));
        let res = runner.run("sleep", &["5"]).await;
        assert!(matches!(
            res,
            Err(CollectorError::ExecutionFailed { ref source, .. })
                if source.kind() == io::ErrorKind::TimedOut
        ));
    }
}
