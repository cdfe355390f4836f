use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::backend::{RenderBackend, Supervisor};
use crate::config::QueueConfig;
use crate::error::QueueError;
use crate::format;
use crate::notifier::{announce, clear_status, Notifier};
use crate::types::QueueEntry;

/// How many times one entry may restart the backend after a refused
/// submission.
const MAX_SUBMIT_RESTARTS: u32 = 1;

/// Drives a single entry from submission to delivered images.
///
/// Owns the collaborators the queue renders with; the queue calls
/// [`process`](Self::process) for its head entry and handles the outcome.
pub(crate) struct QueueExecutor<B, S, N> {
    pub(crate) backend: B,
    supervisor: S,
    pub(crate) notifier: N,
    pub(crate) config: QueueConfig,
}

impl<B, S, N> QueueExecutor<B, S, N>
where
    B: RenderBackend,
    S: Supervisor,
    N: Notifier,
{
    pub(crate) fn new(backend: B, supervisor: S, notifier: N, config: QueueConfig) -> Self {
        Self {
            backend,
            supervisor,
            notifier,
            config,
        }
    }

    /// Render one entry.
    ///
    /// Returns [`QueueError::Cancelled`] as soon as `token` fires and
    /// [`QueueError::Timeout`] once `deadline` passes, whichever phase the
    /// render is in. Nothing is delivered after either.
    pub(crate) async fn process(
        &self,
        entry: &QueueEntry<N::Handle>,
        token: &CancellationToken,
        deadline: Instant,
    ) -> Result<(), QueueError> {
        let params = format::render_params(entry.request());
        announce(&self.notifier, entry, format::starting(&params)).await;

        let render = async {
            let task_id = self.submit(entry).await?;
            entry.set_task_id(task_id);
            tracing::info!(entry = %entry.id(), task = task_id, "render submitted");
            self.wait_for_images(entry, task_id, &params).await
        };

        let images = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(QueueError::Cancelled),
            _ = tokio::time::sleep_until(deadline) => return Err(QueueError::Timeout),
            images = render => images?,
        };

        announce(&self.notifier, entry, format::uploading(&params)).await;
        let caption = format::caption(entry.request(), &params);
        if let Err(e) = self
            .notifier
            .deliver_images(entry.origin(), &images, &caption)
            .await
        {
            tracing::warn!(entry = %entry.id(), error = %e, "failed to deliver images");
        }
        clear_status(&self.notifier, entry).await;
        Ok(())
    }

    /// Submit the request, restarting the backend once if it refuses the
    /// connection.
    async fn submit(&self, entry: &QueueEntry<N::Handle>) -> Result<u64, QueueError> {
        let mut restarts = 0;
        loop {
            match self.backend.submit(entry.request()).await {
                Ok(task_id) => return Ok(task_id),
                Err(e) if e.is_connection_refused() && restarts < MAX_SUBMIT_RESTARTS => {
                    restarts += 1;
                    tracing::warn!(entry = %entry.id(), error = %e, "backend unreachable, restarting");
                    announce(&self.notifier, entry, format::RESTARTING.to_string()).await;
                    self.supervisor
                        .ensure_running()
                        .await
                        .map_err(QueueError::BackendStart)?;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Poll the backend until the task yields images.
    ///
    /// Progress is checked on the fast interval; the status message is
    /// refreshed on the slower, destination-dependent one.
    async fn wait_for_images(
        &self,
        entry: &QueueEntry<N::Handle>,
        task_id: u64,
        params: &str,
    ) -> Result<Vec<Vec<u8>>, QueueError> {
        let check_period = self.config.check_interval;
        let refresh_period = self.config.refresh_interval(entry.origin().destination);

        let now = Instant::now();
        let mut check = interval_at(now + check_period, check_period);
        check.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut refresh = interval_at(now + refresh_period, refresh_period);
        refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = check.tick() => {
                    let progress = self.backend.poll(task_id).await?;
                    if entry.record_progress(progress.percent) {
                        tracing::debug!(task = task_id, percent = entry.progress(), "render progress");
                    }
                    if let Some(images) = progress.images {
                        return Ok(images);
                    }
                }
                _ = refresh.tick() => {
                    let text = format::rendering(
                        entry.progress(),
                        self.config.progress_bar_length,
                        params,
                    );
                    announce(&self.notifier, entry, text).await;
                }
            }
        }
    }
}
