use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::{
    Client as HttpClient, Request as HttpRequest, Response as HttpResponse,
};
use reqwest::header::HeaderValue;
use serde_json::{json, Map, Value};
use tryon_contracts::assets::InlineImage;

use crate::backend::{BackendRequest, BackendResponse, GenerationBackend, Modality, RequestPart};
use crate::config::EngineConfig;
use crate::text::truncate_text;

const API_KEY_HEADER: &str = "x-goog-api-key";

pub struct GeminiBackend {
    api_base: String,
    api_key: Option<String>,
    timeout_s: f64,
    max_retries: usize,
    retry_backoff_s: f64,
    http: HttpClient,
}

impl GeminiBackend {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            api_base: config.api_base.clone(),
            api_key: config.api_key.clone(),
            timeout_s: config.request_timeout_s,
            max_retries: config.transport_retries,
            retry_backoff_s: config.retry_backoff_s,
            http: HttpClient::new(),
        }
    }

    fn endpoint_for_model(&self, model: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }

    fn build_payload(request: &BackendRequest) -> Value {
        let parts: Vec<Value> = request
            .parts
            .iter()
            .map(|part| match part {
                RequestPart::Image(image) => json!({
                    "inlineData": {
                        "mimeType": image.mime_type,
                        "data": image.data,
                    }
                }),
                RequestPart::Text(text) => json!({ "text": text }),
            })
            .collect();

        let mut generation_config = Map::new();
        match request.modality {
            Modality::Image => {
                generation_config.insert(
                    "responseModalities".to_string(),
                    json!(["IMAGE", "TEXT"]),
                );
            }
            Modality::Text => {
                if let Some(schema) = request.response_schema.as_ref() {
                    generation_config.insert(
                        "responseMimeType".to_string(),
                        Value::String("application/json".to_string()),
                    );
                    generation_config.insert("responseSchema".to_string(), schema.clone());
                }
                if let Some(budget) = request.thinking_budget {
                    generation_config.insert(
                        "thinkingConfig".to_string(),
                        json!({ "thinkingBudget": budget }),
                    );
                }
            }
        }

        let mut payload = Map::new();
        payload.insert(
            "contents".to_string(),
            Value::Array(vec![json!({
                "role": "user",
                "parts": parts,
            })]),
        );
        if !generation_config.is_empty() {
            payload.insert(
                "generationConfig".to_string(),
                Value::Object(generation_config),
            );
        }
        Value::Object(payload)
    }

    /// The API key is sent only as a sensitive header, never in the URL.
    fn build_request(
        &self,
        endpoint: &str,
        api_key: &str,
        payload: &Value,
    ) -> Result<HttpRequest> {
        let mut key = HeaderValue::from_str(api_key)
            .map_err(|_| anyhow::anyhow!("Gemini API key is not a valid header value"))?;
        key.set_sensitive(true);
        self.http
            .post(endpoint)
            .header(API_KEY_HEADER, key)
            .timeout(Duration::from_secs_f64(self.timeout_s))
            .json(payload)
            .build()
            .map_err(|raw| anyhow::Error::new(raw.without_url()))
            .with_context(|| format!("Gemini request could not be built ({endpoint})"))
    }

    fn post_with_transport_retries(
        &self,
        endpoint: &str,
        api_key: &str,
        payload: &Value,
    ) -> Result<HttpResponse> {
        for attempt in 0..=self.max_retries {
            let request = self.build_request(endpoint, api_key, payload)?;
            match self.http.execute(request) {
                Ok(ok) => return Ok(ok),
                Err(raw) => {
                    let err = anyhow::Error::new(raw.without_url())
                        .context(format!("Gemini request failed ({endpoint})"));
                    if !is_retryable_transport_error(&err) || attempt >= self.max_retries {
                        return Err(err);
                    }
                    let delay_s = self.retry_backoff_s * (attempt as f64 + 1.0);
                    thread::sleep(Duration::from_secs_f64(delay_s));
                }
            }
        }

        bail!("Gemini transport retry loop exhausted without a response")
    }

    /// Collects the text and inline-image parts of the first candidate.
    fn extract_response(response_payload: &Value) -> BackendResponse {
        let candidates = response_payload
            .get("candidates")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let mut out = BackendResponse::default();
        out.metadata.insert(
            "candidates".to_string(),
            Value::Number(candidates.len().into()),
        );
        out.metadata.insert(
            "usage_metadata".to_string(),
            response_payload
                .get("usageMetadata")
                .cloned()
                .unwrap_or(Value::Null),
        );
        if let Some(feedback) = response_payload.get("promptFeedback") {
            out.metadata
                .insert("prompt_feedback".to_string(), feedback.clone());
        }

        let Some(candidate) = candidates.first() else {
            return out;
        };
        if let Some(reason) = candidate.get("finishReason").and_then(Value::as_str) {
            out.metadata.insert(
                "finish_reason".to_string(),
                Value::String(reason.to_string()),
            );
        }
        let parts = candidate
            .get("content")
            .and_then(|content| content.get("parts"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for part in parts {
            if let Some(text) = part.get("text").and_then(Value::as_str) {
                out.texts.push(text.to_string());
                continue;
            }
            let Some(inline) = part
                .get("inlineData")
                .or_else(|| part.get("inline_data"))
                .and_then(Value::as_object)
            else {
                continue;
            };
            let data = inline
                .get("data")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if data.is_empty() {
                continue;
            }
            let mime_type = inline
                .get("mimeType")
                .or_else(|| inline.get("mime_type"))
                .and_then(Value::as_str)
                .unwrap_or("image/png");
            out.images.push(InlineImage {
                mime_type: mime_type.to_string(),
                data: data.to_string(),
            });
        }
        out
    }
}

impl GenerationBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    fn generate(&self, request: &BackendRequest) -> Result<BackendResponse> {
        let Some(api_key) = self.api_key.as_deref() else {
            bail!("GEMINI_API_KEY or GOOGLE_API_KEY not set");
        };
        let endpoint = self.endpoint_for_model(&request.model);
        let payload = Self::build_payload(request);
        let response = self.post_with_transport_retries(&endpoint, api_key, &payload)?;
        let response_payload = response_json_or_error("Gemini", response)?;
        let mut out = Self::extract_response(&response_payload);
        out.metadata
            .insert("endpoint".to_string(), Value::String(endpoint));
        Ok(out)
    }
}

fn response_json_or_error(backend: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .with_context(|| format!("{backend} response body read failed"))?;
    if !status.is_success() {
        bail!(
            "{backend} request failed ({code}): {}",
            truncate_text(&body, 512)
        );
    }
    let parsed: Value = serde_json::from_str(&body)
        .with_context(|| format!("{backend} returned invalid JSON payload"))?;
    Ok(parsed)
}

fn is_retryable_transport_error(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<reqwest::Error>()
            .map(|reqwest_err| reqwest_err.is_timeout() || reqwest_err.is_connect())
            .unwrap_or(false)
    })
}
