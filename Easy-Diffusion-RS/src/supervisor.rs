use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

use crate::client::EasyDiffusionClient;
use crate::error::{EasyDiffusionError, Result};

const DEFAULT_PROCESS_NAME: &str = "uvicorn";
const DEFAULT_PING_INTERVAL: Duration = Duration::from_millis(500);
const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Keeps the Easy Diffusion process alive.
///
/// [`ensure_running`](Self::ensure_running) looks the server process up by
/// name, launches the start script if it is missing, and then waits until
/// `/ping` reports the server online.
///
/// # Example
/// ```no_run
/// use easy_diffusion_rs::{BackendSupervisor, EasyDiffusionClient};
///
/// # async fn example() -> easy_diffusion_rs::Result<()> {
/// let supervisor = BackendSupervisor::new(
///     EasyDiffusionClient::default(),
///     "/opt/easy-diffusion/start.sh",
/// );
/// supervisor.ensure_running().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct BackendSupervisor {
    client: EasyDiffusionClient,
    launch_path: PathBuf,
    process_name: String,
    ping_interval: Duration,
    startup_timeout: Duration,
}

impl BackendSupervisor {
    pub fn new(client: EasyDiffusionClient, launch_path: impl Into<PathBuf>) -> Self {
        Self {
            client,
            launch_path: launch_path.into(),
            process_name: DEFAULT_PROCESS_NAME.to_string(),
            ping_interval: DEFAULT_PING_INTERVAL,
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
        }
    }

    /// Process name looked up with `pgrep` to decide whether to launch.
    pub fn with_process_name(mut self, name: impl Into<String>) -> Self {
        self.process_name = name.into();
        self
    }

    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// How long to wait for the server to come online before giving up.
    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    pub fn launch_path(&self) -> &Path {
        &self.launch_path
    }

    pub fn client(&self) -> &EasyDiffusionClient {
        &self.client
    }

    /// Whether a process named `process_name` exists. A failure to run
    /// `pgrep` counts as "not running".
    pub async fn is_running(&self) -> bool {
        match Command::new("pgrep").arg(&self.process_name).output().await {
            Ok(output) => output.status.success() && !output.stdout.is_empty(),
            Err(e) => {
                tracing::warn!(error = %e, "pgrep failed, assuming Easy Diffusion is not running");
                false
            }
        }
    }

    /// Make sure the backend is up and answering.
    ///
    /// Launches the start script when no server process exists, then pings
    /// until the server reports online. Connection refused while waiting is
    /// expected; any other transport error aborts immediately.
    pub async fn ensure_running(&self) -> Result<()> {
        if self.is_running().await {
            tracing::info!(process = %self.process_name, "Easy Diffusion is already running");
        } else {
            tracing::info!(path = %self.launch_path.display(), "starting Easy Diffusion");
            Command::new(&self.launch_path)
                .spawn()
                .map_err(EasyDiffusionError::Launch)?;
        }

        tracing::info!("checking Easy Diffusion");
        let started = tokio::time::Instant::now();
        let mut ticker = tokio::time::interval(self.ping_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            match self.client.ping().await {
                Ok(true) => break,
                Ok(false) => tracing::debug!("ping: not ready"),
                Err(e) if e.is_connection_refused() => tracing::debug!("ping: refused"),
                Err(e) => return Err(e),
            }

            if started.elapsed() > self.startup_timeout {
                return Err(EasyDiffusionError::StartupTimeout(self.startup_timeout));
            }
        }

        tracing::info!(elapsed_ms = started.elapsed().as_millis() as u64, "Easy Diffusion is online");
        Ok(())
    }
}
