use easy_diffusion_rs::EasyDiffusionError;
use thiserror::Error;

/// Errors that can occur in the render queue.
#[derive(Error, Debug)]
pub enum QueueError {
    /// The backend client failed (submission, polling or decoding).
    #[error("{0}")]
    Backend(#[from] EasyDiffusionError),

    /// The backend was down and could not be restarted. Fatal for the
    /// whole queue.
    #[error("restart failed: {0}")]
    BackendStart(#[source] EasyDiffusionError),

    /// The render did not finish before its deadline.
    #[error("timeout")]
    Timeout,

    /// The render was cancelled by a requester.
    #[error("render was cancelled")]
    Cancelled,

    /// `cancel_active` was called while no render was running.
    #[error("no active request to cancel")]
    NothingToCancel,
}
