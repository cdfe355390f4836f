use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{EasyDiffusionError, Result};

/// Sampling algorithms accepted by Easy Diffusion's render endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sampler {
    Plms,
    Ddim,
    Heun,
    Euler,
    #[default]
    EulerA,
    Dpm2,
    Dpm2A,
    Lms,
    DpmSolverStability,
    #[serde(rename = "dpmpp_2s_a")]
    Dpmpp2sA,
    #[serde(rename = "dpmpp_2m")]
    Dpmpp2m,
    #[serde(rename = "dpmpp_2m_sde")]
    Dpmpp2mSde,
    DpmppSde,
    DpmAdaptive,
    Ddpm,
    Deis,
    UnipcSnr,
    UnipcTu,
    #[serde(rename = "unipc_snr_2")]
    UnipcSnr2,
    #[serde(rename = "unipc_tu_2")]
    UnipcTu2,
    UnipcTq,
}

impl Sampler {
    pub const ALL: [Sampler; 21] = [
        Sampler::Plms,
        Sampler::Ddim,
        Sampler::Heun,
        Sampler::Euler,
        Sampler::EulerA,
        Sampler::Dpm2,
        Sampler::Dpm2A,
        Sampler::Lms,
        Sampler::DpmSolverStability,
        Sampler::Dpmpp2sA,
        Sampler::Dpmpp2m,
        Sampler::Dpmpp2mSde,
        Sampler::DpmppSde,
        Sampler::DpmAdaptive,
        Sampler::Ddpm,
        Sampler::Deis,
        Sampler::UnipcSnr,
        Sampler::UnipcTu,
        Sampler::UnipcSnr2,
        Sampler::UnipcTu2,
        Sampler::UnipcTq,
    ];

    /// The name used on the wire and in status text.
    pub fn as_str(&self) -> &'static str {
        match self {
            Sampler::Plms => "plms",
            Sampler::Ddim => "ddim",
            Sampler::Heun => "heun",
            Sampler::Euler => "euler",
            Sampler::EulerA => "euler_a",
            Sampler::Dpm2 => "dpm2",
            Sampler::Dpm2A => "dpm2_a",
            Sampler::Lms => "lms",
            Sampler::DpmSolverStability => "dpm_solver_stability",
            Sampler::Dpmpp2sA => "dpmpp_2s_a",
            Sampler::Dpmpp2m => "dpmpp_2m",
            Sampler::Dpmpp2mSde => "dpmpp_2m_sde",
            Sampler::DpmppSde => "dpmpp_sde",
            Sampler::DpmAdaptive => "dpm_adaptive",
            Sampler::Ddpm => "ddpm",
            Sampler::Deis => "deis",
            Sampler::UnipcSnr => "unipc_snr",
            Sampler::UnipcTu => "unipc_tu",
            Sampler::UnipcSnr2 => "unipc_snr_2",
            Sampler::UnipcTu2 => "unipc_tu_2",
            Sampler::UnipcTq => "unipc_tq",
        }
    }
}

impl fmt::Display for Sampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sampler {
    type Err = EasyDiffusionError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        Sampler::ALL
            .iter()
            .copied()
            .find(|sampler| sampler.as_str() == wanted)
            .ok_or_else(|| EasyDiffusionError::UnknownSampler(s.to_string()))
    }
}

/// Validated parameters for one render job.
///
/// Construct with [`RenderRequest::builder`]. Once built the request is
/// read-only; numeric fields are kept exactly as given.
///
/// # Example
/// ```
/// use easy_diffusion_rs::{RenderRequest, Sampler};
///
/// let request = RenderRequest::builder("a lighthouse in a storm")
///     .negative_prompt("blurry")
///     .seed(0x2a)
///     .size(768, 512)
///     .sampler(Sampler::Dpmpp2m)
///     .build()
///     .unwrap();
///
/// assert_eq!(request.width(), 768);
/// assert_eq!(request.raw_prompt(), "a lighthouse in a storm");
/// ```
///
/// There is no way around the builder's validation, so a request cannot be
/// deserialized directly:
///
/// ```compile_fail
/// use easy_diffusion_rs::RenderRequest;
///
/// let request: RenderRequest = serde_json::from_str(r#"{"prompt":""}"#).unwrap();
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    prompt: String,
    negative_prompt: Option<String>,
    seed: u32,
    width: u32,
    height: u32,
    inference_steps: u32,
    num_outputs: u32,
    guidance_scale: f32,
    sampler: Sampler,
    model: String,
    raw_prompt: String,
}

impl RenderRequest {
    /// Start a request for `prompt` with the default parameters: random
    /// seed, 512x512, 20 steps, 4 outputs, guidance 7.0, `euler_a`, and the
    /// backend's default model.
    pub fn builder(prompt: impl Into<String>) -> RenderRequestBuilder {
        RenderRequestBuilder::new(prompt)
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn negative_prompt(&self) -> Option<&str> {
        self.negative_prompt.as_deref()
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn inference_steps(&self) -> u32 {
        self.inference_steps
    }

    pub fn num_outputs(&self) -> u32 {
        self.num_outputs
    }

    pub fn guidance_scale(&self) -> f32 {
        self.guidance_scale
    }

    pub fn sampler(&self) -> Sampler {
        self.sampler
    }

    /// The model selector as given; see [`resolve_model`](crate::resolve_model).
    pub fn model(&self) -> &str {
        &self.model
    }

    /// The text the requester originally typed, used for image captions.
    pub fn raw_prompt(&self) -> &str {
        &self.raw_prompt
    }
}

/// Builder for [`RenderRequest`].
#[derive(Debug, Clone)]
pub struct RenderRequestBuilder {
    draft: RenderRequest,
    raw_prompt: Option<String>,
}

impl RenderRequestBuilder {
    fn new(prompt: impl Into<String>) -> Self {
        Self {
            draft: RenderRequest {
                prompt: prompt.into(),
                negative_prompt: None,
                seed: rand::random(),
                width: 512,
                height: 512,
                inference_steps: 20,
                num_outputs: 4,
                guidance_scale: 7.0,
                sampler: Sampler::default(),
                model: String::new(),
                raw_prompt: String::new(),
            },
            raw_prompt: None,
        }
    }

    /// Set the negative prompt. Blank text clears it.
    pub fn negative_prompt(mut self, negative: impl Into<String>) -> Self {
        let negative = negative.into();
        self.draft.negative_prompt = if negative.trim().is_empty() {
            None
        } else {
            Some(negative)
        };
        self
    }

    pub fn seed(mut self, seed: u32) -> Self {
        self.draft.seed = seed;
        self
    }

    /// Set output dimensions.
    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.draft.width = width;
        self.draft.height = height;
        self
    }

    pub fn inference_steps(mut self, steps: u32) -> Self {
        self.draft.inference_steps = steps;
        self
    }

    /// Number of images rendered for this request.
    pub fn num_outputs(mut self, count: u32) -> Self {
        self.draft.num_outputs = count;
        self
    }

    pub fn guidance_scale(mut self, scale: f32) -> Self {
        self.draft.guidance_scale = scale;
        self
    }

    pub fn sampler(mut self, sampler: Sampler) -> Self {
        self.draft.sampler = sampler;
        self
    }

    /// Set the model selector: a version number (`1`, `2`, `3`) or a model
    /// file name without extension.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.draft.model = model.into();
        self
    }

    /// Override the caption text. Defaults to the prompt.
    pub fn raw_prompt(mut self, raw: impl Into<String>) -> Self {
        self.raw_prompt = Some(raw.into());
        self
    }

    /// Validate and build the request.
    pub fn build(self) -> Result<RenderRequest> {
        let mut request = self.draft;
        request.prompt = request.prompt.trim().to_string();
        if request.prompt.is_empty() {
            return Err(EasyDiffusionError::MissingPrompt);
        }
        request.raw_prompt = self.raw_prompt.unwrap_or_else(|| request.prompt.clone());
        Ok(request)
    }
}
