use std::fmt;
use std::future::Future;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::process::{Child, Command};

pub const DEFAULT_PRIMARY: &str = "npm run dev";
pub const DEFAULT_SECONDARY: &str = "npx zmp start";
pub const DEFAULT_READY_URL: &str = "http://localhost:5173/";
pub const DEFAULT_READY_TIMEOUT_SECS: u64 = 120;
const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
/// Per-request timeout of the readiness probe
const PROBE_TIMEOUT_MS: u64 = 2000;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to wait for `{command}`: {source}")]
    Wait {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Empty command")]
    EmptyCommand,
}

/// A shell command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec(String);

impl CommandSpec {
    pub fn new(line: impl Into<String>) -> Result<Self, RunnerError> {
        let line = line.into();
        if line.trim().is_empty() {
            return Err(RunnerError::EmptyCommand);
        }
        Ok(Self(line.trim().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Run through the platform shell, output inherited
    fn command(&self) -> Command {
        #[cfg(unix)]
        let mut cmd = {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(&self.0);
            cmd
        };
        #[cfg(not(unix))]
        let mut cmd = {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(&self.0);
            cmd
        };
        cmd.stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        cmd
    }

    fn spawn(&self) -> Result<Child, RunnerError> {
        tracing::info!(command = %self, "Starting");
        self.command().spawn().map_err(|source| RunnerError::Spawn {
            command: self.0.clone(),
            source,
        })
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct DevRunConfig {
    pub primary: CommandSpec,
    pub secondary: CommandSpec,
    /// Polled with GET until it answers 2xx or 3xx
    pub ready_url: String,
    pub ready_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for DevRunConfig {
    fn default() -> Self {
        Self {
            primary: CommandSpec(DEFAULT_PRIMARY.to_string()),
            secondary: CommandSpec(DEFAULT_SECONDARY.to_string()),
            ready_url: DEFAULT_READY_URL.to_string(),
            ready_timeout: Duration::from_secs(DEFAULT_READY_TIMEOUT_SECS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// SIGINT / SIGTERM
    Interrupted,
    /// `ready_url` never answered
    ReadyTimeout,
    PrimaryExited(i32),
    SecondaryExited(i32),
}

impl RunOutcome {
    /// Process exit code for `dev-all`
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Interrupted => 0,
            Self::ReadyTimeout => 1,
            Self::PrimaryExited(code) | Self::SecondaryExited(code) => *code,
        }
    }
}

/// Run until a child exits, the wait times out, or Ctrl+C / SIGTERM
pub async fn run(config: &DevRunConfig) -> Result<RunOutcome, RunnerError> {
    run_with_shutdown(config, super::shutdown_signal()).await
}

/// [`run`] with a caller-supplied shutdown future
pub async fn run_with_shutdown<F>(
    config: &DevRunConfig,
    shutdown: F,
) -> Result<RunOutcome, RunnerError>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(Duration::from_millis(PROBE_TIMEOUT_MS))
        .build()?;

    let mut primary = config.primary.spawn()?;
    // set once the primary exited with 0; it is not waited on again
    let mut primary_done = false;

    tracing::info!(
        url = %config.ready_url,
        timeout_secs = config.ready_timeout.as_secs(),
        "Waiting for dev server"
    );
    let deadline = tokio::time::sleep(config.ready_timeout);
    tokio::pin!(deadline);
    let mut poll = tokio::time::interval(config.poll_interval);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                stop(&mut primary, &config.primary).await;
                return Ok(RunOutcome::Interrupted);
            }
            _ = &mut deadline => {
                tracing::error!(url = %config.ready_url, "Timed out waiting for dev server");
                stop(&mut primary, &config.primary).await;
                return Ok(RunOutcome::ReadyTimeout);
            }
            status = primary.wait(), if !primary_done => {
                let code = exit_code(&config.primary, status)?;
                if code != 0 {
                    return Ok(RunOutcome::PrimaryExited(code));
                }
                primary_done = true;
            }
            _ = poll.tick() => {
                if probe(&client, &config.ready_url).await {
                    break;
                }
            }
        }
    }

    tracing::info!(url = %config.ready_url, "Dev server is responding");
    let mut secondary = match config.secondary.spawn() {
        Ok(child) => child,
        Err(e) => {
            stop(&mut primary, &config.primary).await;
            return Err(e);
        }
    };

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                stop(&mut secondary, &config.secondary).await;
                stop(&mut primary, &config.primary).await;
                return Ok(RunOutcome::Interrupted);
            }
            status = primary.wait(), if !primary_done => {
                let code = exit_code(&config.primary, status)?;
                if code != 0 {
                    stop(&mut secondary, &config.secondary).await;
                    return Ok(RunOutcome::PrimaryExited(code));
                }
                primary_done = true;
            }
            status = secondary.wait() => {
                let code = exit_code(&config.secondary, status)?;
                stop(&mut primary, &config.primary).await;
                return Ok(RunOutcome::SecondaryExited(code));
            }
        }
    }
}

/// GET answered with 2xx or 3xx
async fn probe(client: &reqwest::Client, url: &str) -> bool {
    match client.get(url).send().await {
        Ok(resp) => {
            let status = resp.status();
            tracing::debug!(url, status = status.as_u16(), "Probe answered");
            status.is_success() || status.is_redirection()
        }
        Err(e) => {
            tracing::trace!(url, error = %e, "Probe failed");
            false
        }
    }
}

/// Exit code, 1 when killed by a signal
fn exit_code(
    spec: &CommandSpec,
    status: std::io::Result<ExitStatus>,
) -> Result<i32, RunnerError> {
    let status = status.map_err(|source| RunnerError::Wait {
        command: spec.0.clone(),
        source,
    })?;
    let code = status.code().unwrap_or(1);
    if code != 0 {
        tracing::error!(command = %spec, code, "Exited with non-zero code");
    } else {
        tracing::info!(command = %spec, "Exited");
    }
    Ok(code)
}

async fn stop(child: &mut Child, spec: &CommandSpec) {
    if let Ok(Some(_)) = child.try_wait() {
        return;
    }
    match child.kill().await {
        Ok(()) => tracing::info!(command = %spec, "Stopped"),
        Err(e) => tracing::warn!(command = %spec, error = %e, "Failed to stop"),
    }
}
