//! # easy-diffusion-rs
//!
//! Async Rust client for [Easy Diffusion](https://github.com/easydiffusion/easydiffusion),
//! the single-job Stable Diffusion server.
//!
//! Provides a validated [`RenderRequest`] builder, a typed client for job
//! submission, status polling and cancellation, a parser for the server's
//! concatenated-JSON status stream, and a [`BackendSupervisor`] that starts
//! the server process on demand.
//!
//! ## Quick Start
//!
//! ```no_run
//! use easy_diffusion_rs::{EasyDiffusionClient, RenderRequest, Sampler};
//! use std::time::Duration;
//!
//! # async fn example() -> easy_diffusion_rs::Result<()> {
//! let client = EasyDiffusionClient::new("http://localhost:9000");
//!
//! let request = RenderRequest::builder("a sunset over mountains")
//!     .negative_prompt("lowres, blurry")
//!     .inference_steps(25)
//!     .sampler(Sampler::Dpmpp2m)
//!     .build()?;
//!
//! let task = client.render(&request).await?;
//! let images = loop {
//!     let progress = client.progress(task).await?;
//!     if let Some(images) = progress.images {
//!         break images;
//!     }
//!     println!("{}%", progress.percent);
//!     tokio::time::sleep(Duration::from_millis(250)).await;
//! };
//!
//! for (i, bytes) in images.iter().enumerate() {
//!     std::fs::write(format!("{}-{}.jpg", request.seed(), i), bytes).unwrap();
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod request;
pub mod stream;
pub mod supervisor;
pub mod types;

pub use client::{resolve_model, EasyDiffusionClient, DEFAULT_ENDPOINT};
pub use error::{EasyDiffusionError, Result};
pub use request::{RenderRequest, RenderRequestBuilder, Sampler};
pub use supervisor::BackendSupervisor;
pub use types::TaskProgress;
