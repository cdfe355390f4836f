use thiserror::Error;

/// Errors returned by Easy Diffusion operations.
#[derive(Error, Debug)]
pub enum EasyDiffusionError {
    /// Nothing is listening on the backend endpoint.
    #[error("Cannot connect to Easy Diffusion at {endpoint}: connection refused")]
    ConnectionRefused { endpoint: String },

    /// Network-level request failure with context.
    #[error("{context}: {source}")]
    Network {
        context: String,
        source: reqwest::Error,
    },

    /// Easy Diffusion returned a non-success HTTP status.
    #[error("Easy Diffusion returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The render endpoint did not accept the job.
    #[error("Render request rejected with status {0:?}")]
    Rejected(String),

    /// The response was missing expected fields.
    #[error("{0}")]
    InvalidResponse(String),

    /// The backend reported a terminal status other than `succeeded`.
    #[error("got status {status}: {detail}")]
    TaskFailed { status: String, detail: String },

    /// A `succeeded` result carried no output images.
    #[error("no images in result")]
    NoImages,

    /// An output image was not a `data:<mime>;base64,<payload>` URI or
    /// its payload failed to decode.
    #[error("image base64 decode error: {0}")]
    ImageDecode(String),

    /// The prompt was empty after trimming.
    #[error("missing prompt")]
    MissingPrompt,

    /// The sampler name is not one the backend accepts.
    #[error("unknown sampler {0:?}")]
    UnknownSampler(String),

    /// The backend process could not be launched.
    #[error("can't start Easy Diffusion: {0}")]
    Launch(#[source] std::io::Error),

    /// The backend did not answer ping in time after startup.
    #[error("can't start Easy Diffusion: ping timeout after {0:?}")]
    StartupTimeout(std::time::Duration),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EasyDiffusionError {
    /// True when the backend is simply not reachable yet, which is the one
    /// condition a restart can fix.
    pub fn is_connection_refused(&self) -> bool {
        matches!(self, EasyDiffusionError::ConnectionRefused { .. })
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, EasyDiffusionError>;
