// Handles all interactions with the `brew services` command.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Output, Stdio};
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Default location of the Homebrew executable.
pub const DEFAULT_BREW_PATH: &str = "/usr/local/bin/brew";

/// Spawn attempts while the executable is still open for writing elsewhere
/// (mid-upgrade, or inherited by a concurrently forked child).
const BUSY_ATTEMPTS: u32 = 5;
const BUSY_BACKOFF: Duration = Duration::from_millis(20);

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("supervisor executable not found at {path}")]
    Unavailable { path: PathBuf },

    #[error("command exited with status {}", describe_code(.code))]
    Failed { code: Option<i32> },

    #[error("command timed out after {0:?}")]
    TimedOut(Duration),

    #[error("failed to spawn supervisor: {0}")]
    Spawn(#[source] io::Error),
}

fn describe_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| c.to_string())
}

/// Runs the external service supervisor.
///
/// Both operations check that the executable is present before spawning so
/// that a missing supervisor is never mistaken for a failed service command.
#[trait_variant::make(Supervisor: Send)]
pub trait LocalSupervisor {
    /// Runs the supervisor with `args`, discarding its output.
    async fn run(&self, args: &[String]) -> Result<(), ExecError>;

    /// Runs the supervisor with `args` and returns its raw stdout.
    async fn run_capturing_output(&self, args: &[String]) -> Result<Vec<u8>, ExecError>;
}

/// The real `brew` binary.
#[derive(Debug, Clone)]
pub struct BrewCli {
    executable: PathBuf,
    timeout: Option<Duration>,
}

impl BrewCli {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn unavailable(&self) -> ExecError {
        ExecError::Unavailable {
            path: self.executable.clone(),
        }
    }

    async fn ensure_executable(&self) -> Result<(), ExecError> {
        if is_executable_file(&self.executable).await {
            Ok(())
        } else {
            Err(self.unavailable())
        }
    }

    fn command(&self, args: &[String], stdout: Stdio) -> Command {
        let mut command = Command::new(&self.executable);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    async fn execute(&self, args: &[String], capture: bool) -> Result<Vec<u8>, ExecError> {
        self.ensure_executable().await?;

        debug!("running {} {}", self.executable.display(), args.join(" "));

        let child = self.output(args, capture);

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child)
                .await
                .map_err(|_| ExecError::TimedOut(limit))?,
            None => child.await,
        }
        .map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                self.unavailable()
            } else {
                ExecError::Spawn(e)
            }
        })?;

        if !output.stderr.is_empty() {
            debug!(
                "brew {} stderr: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim_end()
            );
        }

        check_status(output.status)?;
        Ok(output.stdout)
    }

    async fn output(&self, args: &[String], capture: bool) -> io::Result<Output> {
        let mut attempt = 1;
        loop {
            let stdout = if capture { Stdio::piped() } else { Stdio::null() };
            match self.command(args, stdout).output().await {
                Err(e) if is_busy(&e) && attempt < BUSY_ATTEMPTS => {
                    debug!("{} is busy, retrying", self.executable.display());
                    tokio::time::sleep(BUSY_BACKOFF * attempt).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

impl Supervisor for BrewCli {
    async fn run(&self, args: &[String]) -> Result<(), ExecError> {
        self.execute(args, false).await.map(|_| ())
    }

    async fn run_capturing_output(&self, args: &[String]) -> Result<Vec<u8>, ExecError> {
        self.execute(args, true).await
    }
}

fn check_status(status: ExitStatus) -> Result<(), ExecError> {
    if status.success() {
        Ok(())
    } else {
        Err(ExecError::Failed {
            code: status.code(),
        })
    }
}

fn is_busy(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::ExecutableFileBusy
}

async fn is_executable_file(path: &Path) -> bool {
    let Ok(metadata) = tokio::fs::metadata(path).await else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }

    #[cfg(not(unix))]
    {
        true
    }
}
