use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use easy_diffusion_rs::RenderRequest;
use uuid::Uuid;

/// Kind of conversation a request came from.
///
/// Shared conversations are refreshed less often because chat platforms
/// rate-limit message edits there more aggressively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
    Private,
    Shared,
}

/// Where a request came from and where its replies go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Origin {
    pub chat_id: i64,
    pub message_id: i64,
    pub destination: Destination,
}

impl Origin {
    /// A request from a one-to-one conversation.
    pub fn private(chat_id: i64, message_id: i64) -> Self {
        Self {
            chat_id,
            message_id,
            destination: Destination::Private,
        }
    }

    /// A request from a group conversation.
    pub fn shared(chat_id: i64, message_id: i64) -> Self {
        Self {
            chat_id,
            message_id,
            destination: Destination::Shared,
        }
    }
}

/// The single status message kept for an entry.
///
/// Created by the first announcement, edited in place afterwards and
/// deleted once the images are delivered.
#[derive(Debug)]
pub(crate) struct StatusMessage<H> {
    pub(crate) handle: Option<H>,
    pub(crate) text: String,
}

/// One accepted request and its runtime state.
///
/// Entries live only while queued or rendering. The remote task id is set
/// once, after a successful submission; progress only ever grows.
#[derive(Debug)]
pub struct QueueEntry<H> {
    id: Uuid,
    enqueued_at: DateTime<Utc>,
    request: RenderRequest,
    origin: Origin,
    task_id: OnceLock<u64>,
    progress: AtomicU8,
    pub(crate) status: tokio::sync::Mutex<StatusMessage<H>>,
}

impl<H> QueueEntry<H> {
    pub(crate) fn new(request: RenderRequest, origin: Origin) -> Self {
        Self {
            id: Uuid::new_v4(),
            enqueued_at: Utc::now(),
            request,
            origin,
            task_id: OnceLock::new(),
            progress: AtomicU8::new(0),
            status: tokio::sync::Mutex::new(StatusMessage {
                handle: None,
                text: String::new(),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn enqueued_at(&self) -> DateTime<Utc> {
        self.enqueued_at
    }

    pub fn request(&self) -> &RenderRequest {
        &self.request
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Backend task id, once the request has been accepted.
    pub fn task_id(&self) -> Option<u64> {
        self.task_id.get().copied()
    }

    pub(crate) fn set_task_id(&self, task_id: u64) {
        if self.task_id.set(task_id).is_err() {
            tracing::warn!(entry = %self.id, task = task_id, "task id already assigned");
        }
    }

    /// Last displayed progress, 0-100.
    pub fn progress(&self) -> u8 {
        self.progress.load(Ordering::Acquire)
    }

    /// Record a progress reading. Returns `true` if it moved the displayed
    /// value forward; lower readings are ignored.
    pub(crate) fn record_progress(&self, percent: u8) -> bool {
        let percent = percent.min(100);
        self.progress.fetch_max(percent, Ordering::AcqRel) < percent
    }
}
