//! Parser for the `/image/stream/<task>` body.
//!
//! The stream endpoint answers with whatever status objects it has buffered,
//! written back to back with no separator: a stale progress record may be
//! followed by the final result in the same body. [`JsonObjects`] splits the
//! body into balanced top-level `{...}` slices and [`parse_status_body`]
//! interprets them in order.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;

use crate::error::{EasyDiffusionError, Result};
use crate::types::TaskProgress;

/// Iterator over balanced top-level JSON objects in a text body.
///
/// Braces inside string literals are ignored (escape aware). A closing
/// brace with no open object is skipped, and a trailing object that never
/// closes is dropped.
///
/// ```
/// use easy_diffusion_rs::stream::JsonObjects;
///
/// let body = r#"{"step":1}{"status":"succeeded","output":[]}"#;
/// let objects: Vec<&str> = JsonObjects::new(body).collect();
/// assert_eq!(objects, vec![r#"{"step":1}"#, r#"{"status":"succeeded","output":[]}"#]);
/// ```
#[derive(Debug, Clone)]
pub struct JsonObjects<'a> {
    body: &'a str,
    pos: usize,
}

impl<'a> JsonObjects<'a> {
    pub fn new(body: &'a str) -> Self {
        Self { body, pos: 0 }
    }
}

impl<'a> Iterator for JsonObjects<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let bytes = self.body.as_bytes();
        let mut depth = 0usize;
        let mut start = 0usize;
        let mut in_string = false;
        let mut escaped = false;

        while self.pos < bytes.len() {
            let i = self.pos;
            self.pos += 1;
            let b = bytes[i];

            if in_string {
                if escaped {
                    escaped = false;
                } else if b == b'\\' {
                    escaped = true;
                } else if b == b'"' {
                    in_string = false;
                }
                continue;
            }

            match b {
                b'"' if depth > 0 => in_string = true,
                b'{' => {
                    if depth == 0 {
                        start = i;
                    }
                    depth += 1;
                }
                b'}' if depth > 0 => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(&self.body[start..=i]);
                    }
                }
                _ => {}
            }
        }
        None
    }
}

/// Interpret a full status body.
///
/// Objects are examined in order. A `succeeded` result ends the scan and
/// its images are returned with progress 100; any other result status is an
/// error. Without a result, the last reported step percentage is returned.
pub fn parse_status_body(body: &str) -> Result<TaskProgress> {
    let mut percent = 0u8;
    for object in JsonObjects::new(body) {
        let section = parse_status_object(object)?;
        if let Some(p) = section.percent {
            percent = p;
        }
        if let Some(images) = section.images {
            return Ok(TaskProgress {
                percent,
                images: Some(images),
            });
        }
    }
    Ok(TaskProgress {
        percent,
        images: None,
    })
}

struct Section {
    percent: Option<u8>,
    images: Option<Vec<Vec<u8>>>,
}

fn parse_status_object(object: &str) -> Result<Section> {
    let json: Value = match serde_json::from_str(object) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(error = %e, "skipping unparseable status object");
            return Ok(Section {
                percent: None,
                images: None,
            });
        }
    };

    let mut section = Section {
        percent: step_percent(&json),
        images: None,
    };

    if let Some(status) = json.get("status").and_then(|v| v.as_str()) {
        if status.is_empty() {
            return Ok(section);
        }
        if status != "succeeded" {
            let detail = json
                .get("detail")
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            return Err(EasyDiffusionError::TaskFailed {
                status: status.to_string(),
                detail: detail.to_string(),
            });
        }

        let outputs = json
            .get("output")
            .and_then(|v| v.as_array())
            .map(Vec::as_slice)
            .unwrap_or_default();
        if outputs.is_empty() {
            return Err(EasyDiffusionError::NoImages);
        }

        let images = outputs
            .iter()
            .map(|output| {
                let data = output.get("data").and_then(|v| v.as_str()).unwrap_or("");
                decode_data_uri(data)
            })
            .collect::<Result<Vec<_>>>()?;

        section.percent = Some(100);
        section.images = Some(images);
    }

    Ok(section)
}

fn step_percent(json: &Value) -> Option<u8> {
    let step = json.get("step").and_then(|v| v.as_u64()).unwrap_or(0);
    let total = json.get("total_steps").and_then(|v| v.as_u64())?;
    if total == 0 {
        return None;
    }
    Some((step.saturating_mul(100) / total).min(100) as u8)
}

/// Decode a `data:<mime>;base64,<payload>` URI into raw bytes.
pub fn decode_data_uri(data: &str) -> Result<Vec<u8>> {
    let (_, payload) = data
        .split_once(',')
        .ok_or_else(|| EasyDiffusionError::ImageDecode("missing data URI separator".into()))?;
    STANDARD
        .decode(payload)
        .map_err(|e| EasyDiffusionError::ImageDecode(e.to_string()))
}
