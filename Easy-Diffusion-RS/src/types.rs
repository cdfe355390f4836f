use serde::{Deserialize, Serialize};

/// Snapshot of a running task, as read from the status stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskProgress {
    /// Completion estimate, 0-100.
    pub percent: u8,
    /// Decoded output images, present once the task has succeeded.
    pub images: Option<Vec<Vec<u8>>>,
}

/// Job body posted to `/render`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct RenderJob<'a> {
    pub active_tags: Vec<String>,
    pub inactive_tags: Vec<String>,
    pub block_nsfw: bool,
    pub clip_skip: bool,
    pub guidance_scale: f32,
    pub height: u32,
    pub width: u32,
    pub metadata_output_format: &'static str,
    pub negative_prompt: &'a str,
    pub num_inference_steps: u32,
    pub num_outputs: u32,
    pub original_prompt: &'a str,
    pub output_format: &'static str,
    pub output_lossless: bool,
    pub output_quality: u32,
    pub prompt: &'a str,
    pub sampler_name: &'static str,
    pub seed: u32,
    pub session_id: String,
    pub show_only_filtered_image: bool,
    pub stream_image_progress: bool,
    pub stream_progress_updates: bool,
    pub tiling: &'static str,
    pub use_stable_diffusion_model: String,
    pub use_vae_model: &'static str,
    pub used_random_seed: bool,
    pub vram_usage_level: &'static str,
}

/// Reply from `/render`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RenderResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub task: u64,
}

/// Reply from `/ping`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PingResponse {
    #[serde(default)]
    pub status: String,
}
