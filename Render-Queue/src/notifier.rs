use std::future::Future;
use std::sync::Arc;

use crate::types::{Origin, QueueEntry, StatusMessage};

/// Chat-side capability the queue reports through.
///
/// The queue keeps one status message per entry: it is created with
/// [`announce`](Self::announce), edited with [`update`](Self::update) and
/// removed with [`delete_status`](Self::delete_status) after the images are
/// delivered. Failures are logged by the queue and never fail a render.
///
/// # Example
///
/// ```
/// use render_queue::{Notifier, Origin};
///
/// struct StdoutNotifier;
///
/// impl Notifier for StdoutNotifier {
///     type Handle = ();
///
///     async fn announce(&self, origin: &Origin, text: &str) -> anyhow::Result<()> {
///         println!("[{}] {}", origin.chat_id, text);
///         Ok(())
///     }
///
///     async fn update(&self, _handle: &(), text: &str) -> anyhow::Result<()> {
///         println!("{}", text);
///         Ok(())
///     }
///
///     async fn delete_status(&self, _handle: &()) -> anyhow::Result<()> {
///         Ok(())
///     }
///
///     async fn deliver_images(
///         &self,
///         _origin: &Origin,
///         images: &[Vec<u8>],
///         caption: &str,
///     ) -> anyhow::Result<()> {
///         println!("{} images: {}", images.len(), caption);
///         Ok(())
///     }
/// }
/// ```
pub trait Notifier: Send + Sync + 'static {
    /// Reference to a sent status message.
    type Handle: Send + Sync + 'static;

    /// Send a new status message in reply to `origin`.
    fn announce(
        &self,
        origin: &Origin,
        text: &str,
    ) -> impl Future<Output = anyhow::Result<Self::Handle>> + Send;

    /// Replace the text of a status message.
    fn update(
        &self,
        handle: &Self::Handle,
        text: &str,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;

    fn delete_status(&self, handle: &Self::Handle) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// Send all images as one group; `caption` goes on the first image.
    fn deliver_images(
        &self,
        origin: &Origin,
        images: &[Vec<u8>],
        caption: &str,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;
}

impl<T: Notifier> Notifier for Arc<T> {
    type Handle = T::Handle;

    fn announce(
        &self,
        origin: &Origin,
        text: &str,
    ) -> impl Future<Output = anyhow::Result<Self::Handle>> + Send {
        (**self).announce(origin, text)
    }

    fn update(
        &self,
        handle: &Self::Handle,
        text: &str,
    ) -> impl Future<Output = anyhow::Result<()>> + Send {
        (**self).update(handle, text)
    }

    fn delete_status(&self, handle: &Self::Handle) -> impl Future<Output = anyhow::Result<()>> + Send {
        (**self).delete_status(handle)
    }

    fn deliver_images(
        &self,
        origin: &Origin,
        images: &[Vec<u8>],
        caption: &str,
    ) -> impl Future<Output = anyhow::Result<()>> + Send {
        (**self).deliver_images(origin, images, caption)
    }
}

/// Show `text` in the entry's status message, sending it on first use.
pub(crate) async fn announce<N: Notifier>(notifier: &N, entry: &QueueEntry<N::Handle>, text: String) {
    let mut status = entry.status.lock().await;
    announce_locked(notifier, entry.origin(), &mut status, text).await;
}

/// Same as [`announce`] for a caller that already holds the status lock.
/// Unchanged text is not re-sent.
pub(crate) async fn announce_locked<N: Notifier>(
    notifier: &N,
    origin: &Origin,
    status: &mut StatusMessage<N::Handle>,
    text: String,
) {
    match status.handle.as_ref() {
        Some(_) if status.text == text => return,
        Some(handle) => {
            if let Err(e) = notifier.update(handle, &text).await {
                tracing::warn!(chat = origin.chat_id, error = %e, "failed to update status message");
                return;
            }
        }
        None => match notifier.announce(origin, &text).await {
            Ok(handle) => status.handle = Some(handle),
            Err(e) => {
                tracing::warn!(chat = origin.chat_id, error = %e, "failed to send status message");
                return;
            }
        },
    }
    status.text = text;
}

/// Delete the entry's status message, if one was sent.
pub(crate) async fn clear_status<N: Notifier>(notifier: &N, entry: &QueueEntry<N::Handle>) {
    let mut status = entry.status.lock().await;
    if let Some(handle) = status.handle.take() {
        if let Err(e) = notifier.delete_status(&handle).await {
            tracing::warn!(chat = entry.origin().chat_id, error = %e, "failed to delete status message");
        }
    }
    status.text.clear();
}
