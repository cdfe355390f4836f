use reqwest::{Client, Response};
use std::time::Duration;

use crate::error::{EasyDiffusionError, Result};
use crate::request::RenderRequest;
use crate::stream::parse_status_body;
use crate::types::*;

/// Default Easy Diffusion endpoint.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:9000";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);
const DEFAULT_MODEL: &str = "sd-v1-4";

fn normalize(endpoint: String) -> String {
    endpoint.trim_end_matches('/').to_string()
}

/// Map a request's model selector to the model name Easy Diffusion loads.
///
/// Version numbers `1`-`3` pick the stock checkpoints; an empty selector
/// picks the default; anything else is taken as a model name.
pub fn resolve_model(selector: &str) -> String {
    match selector.trim() {
        "" | "1" => DEFAULT_MODEL.to_string(),
        "2" => "v1-5-pruned-emaonly".to_string(),
        "3" => "768-v-ema".to_string(),
        name => name.to_string(),
    }
}

/// True if any error in the chain is an I/O "connection refused".
fn is_refused(err: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = source {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::ConnectionRefused {
                return true;
            }
        }
        source = e.source();
    }
    false
}

/// Async client for an Easy Diffusion server.
///
/// Easy Diffusion runs one job at a time. A job is posted to `/render`,
/// then its status is read from `/image/stream/<task>` until the final
/// result (with base64 images) shows up.
///
/// # Example
/// ```no_run
/// use easy_diffusion_rs::{EasyDiffusionClient, RenderRequest};
///
/// # async fn example() -> easy_diffusion_rs::Result<()> {
/// let client = EasyDiffusionClient::new("http://localhost:9000");
/// if client.ping().await? {
///     let task = client.render(&RenderRequest::builder("a red fox").build()?).await?;
///     let progress = client.progress(task).await?;
///     println!("{}%", progress.percent);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct EasyDiffusionClient {
    http: Client,
    endpoint: String,
    timeout: Duration,
}

impl Default for EasyDiffusionClient {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT)
    }
}

impl EasyDiffusionClient {
    /// Create a new client pointing at the given Easy Diffusion endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            endpoint: normalize(endpoint.into()),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Use a custom `reqwest::Client` (for connection pooling, proxies, TLS).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the configured endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn network_error(&self, context: &str, err: reqwest::Error) -> EasyDiffusionError {
        if is_refused(&err) {
            EasyDiffusionError::ConnectionRefused {
                endpoint: self.endpoint.clone(),
            }
        } else {
            EasyDiffusionError::Network {
                context: context.to_string(),
                source: err,
            }
        }
    }

    async fn check(&self, resp: Response, context: &str) -> Result<String> {
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| self.network_error(context, e))?;
        if !status.is_success() {
            return Err(EasyDiffusionError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    async fn get(&self, path: &str, context: &str) -> Result<String> {
        let url = format!("{}{}", self.endpoint, path);
        let resp = self
            .http
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.network_error(context, e))?;
        self.check(resp, context).await
    }

    // ── Health ──────────────────────────────────────────────────────

    /// Probe `/ping`. Returns `Ok(true)` once the server reports `Online`,
    /// `Ok(false)` while it answers but is not ready, and
    /// [`EasyDiffusionError::ConnectionRefused`] while nothing is listening.
    pub async fn ping(&self) -> Result<bool> {
        let body = self.get("/ping", "Failed to ping Easy Diffusion").await?;
        let ping: PingResponse = serde_json::from_str(&body)?;
        Ok(ping.status == "Online")
    }

    // ── Render ──────────────────────────────────────────────────────

    /// Submit a render job. Returns the backend task id.
    pub async fn render(&self, request: &RenderRequest) -> Result<u64> {
        let job = render_job(request, rand::random::<u32>().to_string());

        let url = format!("{}/render", self.endpoint);
        let context = format!(
            "Cannot connect to Easy Diffusion at {}, is the service running?",
            self.endpoint
        );
        let resp = self
            .http
            .post(&url)
            .timeout(self.timeout)
            .json(&job)
            .send()
            .await
            .map_err(|e| self.network_error(&context, e))?;
        let body = self.check(resp, &context).await?;

        let task = parse_render_response(&body)?;
        tracing::debug!(task, seed = request.seed(), "render job accepted");
        Ok(task)
    }

    /// Read the current status of a task.
    ///
    /// The returned [`TaskProgress`] carries the decoded images once the
    /// task has succeeded; a failed task is returned as
    /// [`EasyDiffusionError::TaskFailed`].
    ///
    /// Until the render thread picks the task up the endpoint answers
    /// `425 Too Early`. Any non-success status is reported as "no progress
    /// yet" rather than an error.
    pub async fn progress(&self, task_id: u64) -> Result<TaskProgress> {
        let body = match self
            .get(
                &format!("/image/stream/{}", task_id),
                "Failed to fetch Easy Diffusion task status",
            )
            .await
        {
            Ok(body) => body,
            Err(EasyDiffusionError::Http { status, body }) => {
                tracing::debug!(task = task_id, status, body = %body, "task status not available yet");
                return Ok(TaskProgress::default());
            }
            Err(e) => return Err(e),
        };
        parse_status_body(&body)
    }

    // ── Control ─────────────────────────────────────────────────────

    /// Ask the backend to stop a task. Failures are logged and otherwise
    /// ignored.
    pub async fn stop(&self, task_id: u64) {
        let path = format!("/image/stop?task={}", task_id);
        if let Err(e) = self.get(&path, "Failed to stop Easy Diffusion task").await {
            tracing::debug!(task = task_id, error = %e, "stop request failed");
        }
    }
}

fn render_job(request: &RenderRequest, session_id: String) -> RenderJob<'_> {
    RenderJob {
        active_tags: Vec::new(),
        inactive_tags: Vec::new(),
        block_nsfw: false,
        clip_skip: false,
        guidance_scale: request.guidance_scale(),
        height: request.height(),
        width: request.width(),
        metadata_output_format: "none",
        negative_prompt: request.negative_prompt().unwrap_or(""),
        num_inference_steps: request.inference_steps(),
        num_outputs: request.num_outputs(),
        original_prompt: request.prompt(),
        output_format: "jpeg",
        output_lossless: false,
        output_quality: 75,
        prompt: request.prompt(),
        sampler_name: request.sampler().as_str(),
        seed: request.seed(),
        session_id,
        show_only_filtered_image: true,
        stream_image_progress: false,
        stream_progress_updates: true,
        tiling: "none",
        use_stable_diffusion_model: resolve_model(request.model()),
        use_vae_model: "",
        used_random_seed: true,
        vram_usage_level: "high",
    }
}

fn parse_render_response(body: &str) -> Result<u64> {
    let resp: RenderResponse = serde_json::from_str(body)?;
    if resp.status != "Online" {
        return Err(EasyDiffusionError::Rejected(resp.status));
    }
    if resp.task == 0 {
        return Err(EasyDiffusionError::InvalidResponse(
            "Render response missing task id".into(),
        ));
    }
    Ok(resp.task)
}
