//! `render-queue` -- console host for the Easy Diffusion render queue.
//!
//! Each non-empty line on stdin is rendered as a prompt with default
//! parameters; the line `cancel` stops the active render. Status text is
//! logged and images are written to the output directory.
//!
//! # Environment variables
//!
//! | Variable              | Flag                    | Default                 |
//! |-----------------------|-------------------------|-------------------------|
//! | `EASY_DIFFUSION_URL`  | `--endpoint`            | `http://localhost:9000` |
//! | `EASY_DIFFUSION_PATH` | `--easy-diffusion-path` | --                      |
//! | `DELAYED_ED_START`    | `--delayed-start`       | `false`                 |
//! | `RUST_LOG`            | --                      | `info`                  |

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Context;
use clap::Parser;
use easy_diffusion_rs::{BackendSupervisor, EasyDiffusionClient, RenderRequest, DEFAULT_ENDPOINT};
use render_queue::{Notifier, Origin, QueueConfig, QueueError, RenderQueue};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Chat id used for console requests.
const CONSOLE_CHAT_ID: i64 = 0;

#[derive(Debug, Parser)]
#[command(name = "render-queue", about = "Queue Stable Diffusion renders on Easy Diffusion")]
struct Args {
    /// Easy Diffusion base URL.
    #[arg(long, env = "EASY_DIFFUSION_URL", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Script that starts Easy Diffusion when it is not running.
    #[arg(long, env = "EASY_DIFFUSION_PATH")]
    easy_diffusion_path: PathBuf,

    /// Process name that identifies a running Easy Diffusion server.
    #[arg(long, default_value = "uvicorn")]
    process_name: String,

    /// Skip starting Easy Diffusion until the first render needs it.
    #[arg(long, env = "DELAYED_ED_START")]
    delayed_start: bool,

    /// Directory rendered images are written to.
    #[arg(long, default_value = "renders")]
    output_dir: PathBuf,
}

/// Notifier that logs status text and saves images to disk.
struct ConsoleNotifier {
    output_dir: PathBuf,
    next_handle: AtomicU64,
}

impl ConsoleNotifier {
    fn new(output_dir: PathBuf) -> Self {
        Self {
            output_dir,
            next_handle: AtomicU64::new(1),
        }
    }
}

impl Notifier for ConsoleNotifier {
    type Handle = (Origin, u64);

    async fn announce(&self, origin: &Origin, text: &str) -> anyhow::Result<(Origin, u64)> {
        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
        tracing::info!(request = origin.message_id, "{}", text);
        Ok((*origin, handle))
    }

    async fn update(&self, handle: &(Origin, u64), text: &str) -> anyhow::Result<()> {
        tracing::info!(request = handle.0.message_id, "{}", text);
        Ok(())
    }

    async fn delete_status(&self, handle: &(Origin, u64)) -> anyhow::Result<()> {
        tracing::debug!(request = handle.0.message_id, status = handle.1, "status cleared");
        Ok(())
    }

    async fn deliver_images(
        &self,
        origin: &Origin,
        images: &[Vec<u8>],
        caption: &str,
    ) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .with_context(|| format!("creating {}", self.output_dir.display()))?;
        for (i, bytes) in images.iter().enumerate() {
            let path = self.output_dir.join(format!("{}-{}.jpg", origin.message_id, i));
            tokio::fs::write(&path, bytes)
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            tracing::info!(request = origin.message_id, path = %path.display(), "image saved");
        }
        tracing::info!(request = origin.message_id, "{}", caption);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let client = EasyDiffusionClient::new(&args.endpoint);
    let supervisor = BackendSupervisor::new(client.clone(), &args.easy_diffusion_path)
        .with_process_name(&args.process_name);

    tracing::info!(
        endpoint = %client.endpoint(),
        launch_path = %args.easy_diffusion_path.display(),
        delayed_start = args.delayed_start,
        "starting render-queue",
    );

    if !args.delayed_start {
        supervisor
            .ensure_running()
            .await
            .context("Easy Diffusion did not start")?;
    }

    let queue = RenderQueue::new(
        client,
        supervisor,
        ConsoleNotifier::new(args.output_dir),
        QueueConfig::default(),
    );
    let mut worker = queue.spawn();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut message_id: i64 = 0;

    loop {
        tokio::select! {
            joined = &mut worker => {
                return match joined.context("render worker panicked")? {
                    Ok(()) => Ok(()),
                    Err(e) => Err(e).context("render worker stopped"),
                };
            }
            line = lines.next_line() => {
                let Some(line) = line.context("reading stdin")? else {
                    tracing::info!("stdin closed, exiting");
                    return Ok(());
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line.eq_ignore_ascii_case("cancel") {
                    match queue.cancel_active() {
                        Ok(()) => {}
                        Err(QueueError::NothingToCancel) => println!("nothing to cancel"),
                        Err(e) => tracing::warn!(error = %e, "cancel failed"),
                    }
                    continue;
                }

                message_id += 1;
                match RenderRequest::builder(line).raw_prompt(line).build() {
                    Ok(request) => {
                        queue
                            .submit(request, Origin::private(CONSOLE_CHAT_ID, message_id))
                            .await;
                    }
                    Err(e) => tracing::warn!(error = %e, "invalid request"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_console_notifier_writes_images() {
        let dir = tempfile::tempdir().unwrap();
        let notifier = ConsoleNotifier::new(dir.path().join("out"));
        let origin = Origin::private(CONSOLE_CHAT_ID, 7);

        notifier
            .deliver_images(&origin, &[b"one".to_vec(), b"two".to_vec()], "a fox")
            .await
            .unwrap();

        let first = std::fs::read(dir.path().join("out").join("7-0.jpg")).unwrap();
        let second = std::fs::read(dir.path().join("out").join("7-1.jpg")).unwrap();
        assert_eq!(first, b"one");
        assert_eq!(second, b"two");
    }

    #[tokio::test]
    async fn test_console_notifier_handles_are_distinct() {
        let notifier = ConsoleNotifier::new(PathBuf::from("unused"));
        let origin = Origin::shared(-1, 3);
        let a = notifier.announce(&origin, "first").await.unwrap();
        let b = notifier.announce(&origin, "second").await.unwrap();
        assert_ne!(a.1, b.1);
        assert_eq!(a.0, origin);
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "render-queue",
            "--endpoint",
            "http://gpu:9000",
            "--easy-diffusion-path",
            "/opt/ed/start.sh",
            "--delayed-start",
        ])
        .unwrap();
        assert_eq!(args.endpoint, "http://gpu:9000");
        assert_eq!(args.easy_diffusion_path, PathBuf::from("/opt/ed/start.sh"));
        assert!(args.delayed_start);
        assert_eq!(args.process_name, "uvicorn");
        assert_eq!(args.output_dir, PathBuf::from("renders"));
    }
}
