//! # Render Queue
//!
//! Single-worker render queue for Easy Diffusion.
//!
//! ## Features
//!
//! - Strict FIFO processing, one render at a time
//! - Queue position notices that follow the head of the queue
//! - Live progress bar in a single, edited status message
//! - Cancellation of the active render with a backend stop request
//! - Per-render timeout
//! - One automatic backend restart when a submission is refused
//!
//! ## Quick Start
//!
//! 1. Implement [`Notifier`] for your chat platform
//! 2. Create a [`RenderQueue`] from an [`EasyDiffusionClient`], a
//!    [`BackendSupervisor`], your notifier and a [`QueueConfig`]
//! 3. Start the worker with [`RenderQueue::spawn()`]
//! 4. Add requests with [`RenderQueue::submit()`]
//!
//! See the `examples/` directory for complete usage examples.
//!
//! [`EasyDiffusionClient`]: easy_diffusion_rs::EasyDiffusionClient
//! [`BackendSupervisor`]: easy_diffusion_rs::BackendSupervisor

pub mod backend;
pub mod config;
pub mod error;
pub mod format;
pub mod notifier;
pub mod queue;
pub mod types;

mod executor;

pub use backend::{RenderBackend, Supervisor};
pub use config::{QueueConfig, QueueConfigBuilder};
pub use error::QueueError;
pub use notifier::Notifier;
pub use queue::RenderQueue;
pub use types::{Destination, Origin, QueueEntry};
