//! Text shown to requesters.

use easy_diffusion_rs::{resolve_model, RenderRequest};

pub const RESTARTING: &str = "⚠️ Easy Diffusion is not running, starting it...";
pub const CANCELED: &str = "❌ Canceled";

/// One-line summary of the effective render parameters.
///
/// ```
/// use easy_diffusion_rs::RenderRequest;
///
/// let request = RenderRequest::builder("a cat").seed(255).build().unwrap();
/// assert_eq!(
///     render_queue::format::render_params(&request),
///     "🌱0xFF 👟20 🕹7.0 🖼512x512x4 🔭euler_a/sd-v1-4"
/// );
/// ```
pub fn render_params(request: &RenderRequest) -> String {
    format!(
        "🌱0x{:X} 👟{} 🕹{:.1} 🖼{}x{}x{} 🔭{}/{}",
        request.seed(),
        request.inference_steps(),
        request.guidance_scale(),
        request.width(),
        request.height(),
        request.num_outputs(),
        request.sampler(),
        resolve_model(request.model()),
    )
}

pub fn starting(params: &str) -> String {
    format!("🛠 Starting render...\n{}", params)
}

pub fn uploading(params: &str) -> String {
    format!("☁️ Uploading...\n{}", params)
}

/// Status text while the backend is rendering.
pub fn rendering(percent: u8, bar_length: usize, params: &str) -> String {
    format!(
        "🔨 Rendering {} {}%\n{}",
        progress_bar(percent, bar_length),
        percent.min(100),
        params
    )
}

/// Fixed-width bar filled in proportion to `percent`.
pub fn progress_bar(percent: u8, length: usize) -> String {
    let filled = usize::from(percent.min(100)) * length / 100;
    let mut bar = "█".repeat(filled);
    bar.push_str(&"░".repeat(length - filled));
    bar
}

/// `position` counts from the active entry, which is position 0.
pub fn queue_position(position: usize) -> String {
    format!("Request queued at position #{}", position)
}

pub fn failed(detail: &str) -> String {
    format!("❌ Error: {}", detail)
}

/// Caption for the first delivered image.
pub fn caption(request: &RenderRequest, params: &str) -> String {
    format!("{} ({})", request.raw_prompt(), params)
}
