use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use easy_diffusion_rs::RenderRequest;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    backend::{RenderBackend, Supervisor},
    config::QueueConfig,
    error::QueueError,
    executor::QueueExecutor,
    format,
    notifier::{announce, announce_locked, Notifier},
    types::{Origin, QueueEntry},
};

type EntryRef<N> = Arc<QueueEntry<<N as Notifier>::Handle>>;

/// State of the entry currently being rendered.
struct ActiveRender {
    entry_id: Uuid,
    token: CancellationToken,
}

struct QueueState<H> {
    entries: VecDeque<Arc<QueueEntry<H>>>,
    active: Option<ActiveRender>,
}

/// FIFO render queue with a single background worker.
///
/// Requests are rendered strictly one at a time in submission order. The
/// head of the queue is the active entry; everyone behind it is told their
/// position, and told again whenever the head moves on.
///
/// # Example
///
/// ```ignore
/// let client = EasyDiffusionClient::default();
/// let supervisor = BackendSupervisor::new(client.clone(), "/opt/easy-diffusion/start.sh");
/// let queue = RenderQueue::new(client, supervisor, notifier, QueueConfig::default());
///
/// let worker = queue.spawn();
/// queue.submit(RenderRequest::builder("a red fox").build()?, Origin::private(1, 42)).await;
/// ```
pub struct RenderQueue<B, S, N: Notifier> {
    executor: QueueExecutor<B, S, N>,
    state: Mutex<QueueState<N::Handle>>,
    wake: Notify,
}

impl<B, S, N> RenderQueue<B, S, N>
where
    B: RenderBackend,
    S: Supervisor,
    N: Notifier,
{
    /// Create a queue rendering on `backend`, restarting it through
    /// `supervisor` and reporting through `notifier`.
    pub fn new(backend: B, supervisor: S, notifier: N, config: QueueConfig) -> Arc<Self> {
        Arc::new(Self {
            executor: QueueExecutor::new(backend, supervisor, notifier, config),
            state: Mutex::new(QueueState {
                entries: VecDeque::new(),
                active: None,
            }),
            wake: Notify::new(),
        })
    }

    fn lock_state(&self) -> MutexGuard<'_, QueueState<N::Handle>> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add a request to the tail of the queue and wake the worker.
    ///
    /// If something is already queued the requester is told its position.
    /// Returns the new entry's id.
    pub async fn submit(&self, request: RenderRequest, origin: Origin) -> Uuid {
        let entry = Arc::new(QueueEntry::new(request, origin));

        // The status lock is taken before the entry becomes visible to the
        // worker, so the position notice always lands before "starting".
        let (position, status) = {
            let mut state = self.lock_state();
            let status = entry.status.try_lock().ok();
            state.entries.push_back(Arc::clone(&entry));
            (state.entries.len() - 1, status)
        };
        self.wake.notify_one();

        tracing::info!(
            entry = %entry.id(),
            chat = origin.chat_id,
            position,
            enqueued_at = %entry.enqueued_at(),
            "render request queued"
        );

        if position > 0 {
            if let Some(mut status) = status {
                announce_locked(
                    &self.executor.notifier,
                    entry.origin(),
                    &mut status,
                    format::queue_position(position),
                )
                .await;
            }
        }
        entry.id()
    }

    /// Cancel the render in progress.
    ///
    /// Fails with [`QueueError::NothingToCancel`] when nothing is rendering;
    /// queued entries are never affected.
    pub fn cancel_active(&self) -> Result<(), QueueError> {
        let state = self.lock_state();
        let active = state.active.as_ref().ok_or(QueueError::NothingToCancel)?;
        active.token.cancel();
        tracing::info!(entry = %active.entry_id, "cancel requested");
        Ok(())
    }

    /// Number of entries, including the active one.
    pub fn len(&self) -> usize {
        self.lock_state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Id of the entry being rendered, if any.
    pub fn active_id(&self) -> Option<Uuid> {
        self.lock_state().active.as_ref().map(|a| a.entry_id)
    }

    /// Ids of all entries in processing order.
    pub fn entry_ids(&self) -> Vec<Uuid> {
        self.lock_state().entries.iter().map(|e| e.id()).collect()
    }

    /// Start the worker on the tokio runtime.
    ///
    /// The worker runs until the backend cannot be restarted, in which case
    /// it resolves to [`QueueError::BackendStart`].
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<Result<(), QueueError>> {
        let queue = Arc::clone(self);
        tokio::spawn(async move { queue.run().await })
    }

    async fn run(&self) -> Result<(), QueueError> {
        loop {
            let Some((entry, token, waiting)) = self.activate_head() else {
                self.wake.notified().await;
                continue;
            };

            for (position, waiting_entry) in waiting {
                announce(
                    &self.executor.notifier,
                    &waiting_entry,
                    format::queue_position(position),
                )
                .await;
            }

            let started = Instant::now();
            let deadline = started + self.executor.config.process_timeout;
            let result = self.executor.process(&entry, &token, deadline).await;

            {
                let mut state = self.lock_state();
                state.active = None;
            }
            let cancelled = token.is_cancelled();

            self.finish(&entry, &result, cancelled, started).await;

            {
                let mut state = self.lock_state();
                if state.entries.front().map(|e| e.id()) == Some(entry.id()) {
                    state.entries.pop_front();
                }
            }

            if let Err(QueueError::BackendStart(_)) = result {
                tracing::error!(entry = %entry.id(), "backend could not be restarted, stopping queue");
                return result;
            }
        }
    }

    /// Mark the head entry active and snapshot the positions of the
    /// entries behind it.
    fn activate_head(&self) -> Option<(EntryRef<N>, CancellationToken, Vec<(usize, EntryRef<N>)>)> {
        let mut state = self.lock_state();
        let entry = Arc::clone(state.entries.front()?);
        let token = CancellationToken::new();
        state.active = Some(ActiveRender {
            entry_id: entry.id(),
            token: token.clone(),
        });
        let waiting = state
            .entries
            .iter()
            .enumerate()
            .skip(1)
            .map(|(position, e)| (position, Arc::clone(e)))
            .collect();
        Some((entry, token, waiting))
    }

    /// Report how an entry ended.
    async fn finish(
        &self,
        entry: &QueueEntry<N::Handle>,
        result: &Result<(), QueueError>,
        cancelled: bool,
        started: Instant,
    ) {
        let elapsed_ms = started.elapsed().as_millis() as u64;
        let task = entry.task_id();
        let notifier = &self.executor.notifier;

        match result {
            Ok(()) => {
                tracing::info!(entry = %entry.id(), task, elapsed_ms, "render completed");
            }
            Err(_) if cancelled => {
                tracing::info!(entry = %entry.id(), task, elapsed_ms, "render cancelled");
                announce(notifier, entry, format::CANCELED.to_string()).await;
                if let Some(task_id) = task {
                    self.executor.backend.stop(task_id).await;
                }
            }
            Err(QueueError::Timeout) => {
                tracing::warn!(entry = %entry.id(), task, elapsed_ms, "render timed out");
                announce(notifier, entry, format::failed("timeout")).await;
                if let Some(task_id) = task {
                    self.executor.backend.stop(task_id).await;
                }
            }
            Err(e) => {
                tracing::warn!(entry = %entry.id(), task, elapsed_ms, error = %e, "render failed");
                announce(notifier, entry, format::failed(&e.to_string())).await;
            }
        }
    }
}
