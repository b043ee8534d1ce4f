use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{Config, SafetyProfile};
use crate::imaging::{detect_encoding, normalize_image, NormalizeOptions, UploadedImage};
use crate::llm::error::{classify_http_failure, summarize_error_body, truncate_for_log, GenerationError};
use crate::llm::prompt::build_edit_instruction;
use crate::llm::HairstyleGenerator;
use crate::utils::http::get_http_client;
use crate::utils::timing::log_generation_timing;

/// Generated images are always declared as PNG to the caller.
pub const RESULT_MIME_TYPE: &str = "image/png";
const REFUSAL_TEXT_LIMIT: usize = 100;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiResponse {
    #[serde(default)]
    pub candidates: Option<Vec<GeminiCandidate>>,
    #[serde(default)]
    pub prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiPromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiCandidate {
    #[serde(default)]
    pub content: Option<GeminiContent>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GeminiContent {
    #[serde(default)]
    pub parts: Option<Vec<GeminiPart>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
    Other(Value),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiInlineData {
    #[serde(default)]
    pub mime_type: String,
    pub data: String,
}

/// The single request/response exchange with the model endpoint.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn generate_content(
        &self,
        model: &str,
        api_key: &str,
        payload: &Value,
    ) -> Result<GeminiResponse, GenerationError>;
}

fn redact_api_key(text: &str, api_key: &str) -> String {
    let key = api_key.trim();
    if key.is_empty() {
        return text.to_string();
    }
    text.replace(key, "[redacted]")
}

pub fn build_safety_settings(profile: SafetyProfile) -> Vec<Value> {
    let threshold = profile.threshold();
    vec![
        json!({ "category": "HARM_CATEGORY_HARASSMENT", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_HATE_SPEECH", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_SEXUALLY_EXPLICIT", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_DANGEROUS_CONTENT", "threshold": threshold }),
    ]
}

/// Image first, instruction second.
pub fn build_generate_payload(
    instruction: &str,
    image: &UploadedImage,
    mime_type: &str,
    safety: SafetyProfile,
) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [
                { "inlineData": { "mimeType": mime_type, "data": image.to_base64() } },
                { "text": instruction }
            ]
        }],
        "generationConfig": { "responseModalities": ["TEXT", "IMAGE"] },
        "safetySettings": build_safety_settings(safety),
    })
}

fn summarize_gemini_parts(parts: &[Value]) -> Vec<Value> {
    parts
        .iter()
        .map(|part| {
            if let Some(text) = part.get("text").and_then(|value| value.as_str()) {
                json!({ "text": truncate_for_log(text, 200) })
            } else if let Some(inline_data) = part.get("inlineData") {
                let mime_type = inline_data
                    .get("mimeType")
                    .and_then(|value| value.as_str())
                    .unwrap_or("unknown");
                let data_len = inline_data
                    .get("data")
                    .and_then(|value| value.as_str())
                    .map(|value| value.len())
                    .unwrap_or(0);
                json!({ "inlineData": { "mimeType": mime_type, "dataLen": data_len } })
            } else {
                json!({ "unknownPart": true })
            }
        })
        .collect()
}

fn summarize_gemini_payload(payload: &Value) -> Value {
    let mut summary = Map::new();

    if let Some(contents) = payload.get("contents").and_then(|value| value.as_array()) {
        let summarized: Vec<Value> = contents
            .iter()
            .map(|content| {
                let parts = content
                    .get("parts")
                    .and_then(|value| value.as_array())
                    .map(|parts| summarize_gemini_parts(parts))
                    .unwrap_or_default();
                json!({ "parts": parts })
            })
            .collect();
        summary.insert("contents".to_string(), Value::Array(summarized));
    }

    if let Some(config) = payload.get("generationConfig") {
        summary.insert("generationConfig".to_string(), config.clone());
    }

    if let Some(safety) = payload
        .get("safetySettings")
        .and_then(|value| value.as_array())
    {
        summary.insert("safetySettingsCount".to_string(), json!(safety.len()));
    }

    Value::Object(summary)
}

fn summarize_gemini_response(response: &GeminiResponse) -> Value {
    let mut text_parts = 0usize;
    let mut image_parts = 0usize;
    let mut other_parts = 0usize;

    let candidates = response.candidates.as_deref().unwrap_or(&[]);
    for candidate in candidates {
        let parts = candidate
            .content
            .as_ref()
            .and_then(|content| content.parts.as_deref())
            .unwrap_or(&[]);
        for part in parts {
            match part {
                GeminiPart::Text { .. } => text_parts += 1,
                GeminiPart::InlineData { .. } => image_parts += 1,
                GeminiPart::Other(_) => other_parts += 1,
            }
        }
    }

    json!({
        "candidates": candidates.len(),
        "finishReason": candidates.first().and_then(|candidate| candidate.finish_reason.clone()),
        "textParts": text_parts,
        "imageParts": image_parts,
        "otherParts": other_parts,
        "blockReason": response.prompt_feedback.as_ref().and_then(|feedback| feedback.block_reason.clone()),
    })
}

fn refusal_excerpt(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= REFUSAL_TEXT_LIMIT {
        return trimmed.to_string();
    }
    let prefix: String = trimmed.chars().take(REFUSAL_TEXT_LIMIT).collect();
    format!("{prefix}...")
}

/// Picks the edited image out of a response, or classifies why there is none.
/// Only the first candidate is considered.
pub fn interpret_response(response: GeminiResponse) -> Result<UploadedImage, GenerationError> {
    let block_reason = response
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason);
    let Some(candidate) = response.candidates.unwrap_or_default().into_iter().next() else {
        return Err(GenerationError::NoCandidates { block_reason });
    };

    let parts = candidate
        .content
        .and_then(|content| content.parts)
        .unwrap_or_default();

    for part in &parts {
        let GeminiPart::InlineData { inline_data } = part else {
            continue;
        };
        if !inline_data.mime_type.is_empty() && !inline_data.mime_type.starts_with("image/") {
            continue;
        }
        if inline_data.data.is_empty() {
            continue;
        }
        match general_purpose::STANDARD.decode(&inline_data.data) {
            Ok(bytes) if !bytes.is_empty() => {
                return Ok(UploadedImage::new(RESULT_MIME_TYPE, bytes));
            }
            Ok(_) => continue,
            Err(err) => {
                warn!("Skipping undecodable inline image part: {}", err);
                continue;
            }
        }
    }

    let refusal = parts.iter().find_map(|part| match part {
        GeminiPart::Text { text } if !text.trim().is_empty() => Some(text.as_str()),
        _ => None,
    });
    if let Some(text) = refusal {
        warn!("Model response text: {}", truncate_for_log(text, 500));
        return Err(GenerationError::ModelRefusal {
            text: refusal_excerpt(text),
        });
    }

    Err(GenerationError::EmptyResponse)
}

/// Talks to the hosted `generateContent` endpoint over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: Url,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(base_url: Url, timeout: Duration) -> Self {
        Self { base_url, timeout }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.gemini_api_base_url.clone(), config.gemini_request_timeout)
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.as_str().trim_end_matches('/'),
            model
        )
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn generate_content(
        &self,
        model: &str,
        api_key: &str,
        payload: &Value,
    ) -> Result<GeminiResponse, GenerationError> {
        let client = get_http_client();
        let url = self.endpoint(model);

        if tracing::enabled!(tracing::Level::DEBUG) {
            let payload_summary = summarize_gemini_payload(payload);
            debug!(target: "llm.gemini", model = model, payload = %payload_summary);
        }

        let response = match client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .timeout(self.timeout)
            .json(payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                let err_text = redact_api_key(&err.to_string(), api_key);
                warn!(
                    "Gemini request failed to send: {} (timeout={}, connect={}, status={:?})",
                    err_text,
                    err.is_timeout(),
                    err.is_connect(),
                    err.status()
                );
                return Err(GenerationError::Upstream {
                    status: err.status().map(|status| status.as_u16()),
                    message: format!("Gemini request failed: {}", err_text),
                });
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let body = redact_api_key(&body, api_key);
            let (_, body_summary) = summarize_error_body(&body);
            warn!("Gemini API error: status={}, body={}", status, body_summary);
            return Err(classify_http_failure(status.as_u16(), &body));
        }

        let value = response.json::<GeminiResponse>().await.map_err(|err| {
            GenerationError::Upstream {
                status: None,
                message: format!(
                    "Gemini returned an unreadable response: {}",
                    redact_api_key(&err.to_string(), api_key)
                ),
            }
        })?;
        if tracing::enabled!(tracing::Level::DEBUG) {
            let response_summary = summarize_gemini_response(&value);
            debug!(target: "llm.gemini", model = model, response = %response_summary);
        }
        Ok(value)
    }
}

/// Hairstyle generator backed by a Gemini image model.
pub struct GeminiClient<T = HttpTransport> {
    config: Config,
    transport: T,
}

impl GeminiClient<HttpTransport> {
    pub fn new(config: Config) -> Self {
        let transport = HttpTransport::from_config(&config);
        Self { config, transport }
    }
}

impl<T: Transport> GeminiClient<T> {
    pub fn with_transport(config: Config, transport: T) -> Self {
        Self { config, transport }
    }

    pub fn model(&self) -> &str {
        &self.config.gemini_image_model
    }

    async fn prepare_image(&self, source: &UploadedImage) -> UploadedImage {
        let options = NormalizeOptions::from_config(&self.config);
        let owned = source.clone();
        match tokio::task::spawn_blocking(move || normalize_image(&owned, options)).await {
            Ok(normalized) => normalized,
            Err(err) => {
                warn!("Image normalization task failed, sending original: {}", err);
                source.clone()
            }
        }
    }
}

#[async_trait]
impl<T: Transport> HairstyleGenerator for GeminiClient<T> {
    async fn generate(
        &self,
        source: &UploadedImage,
        style_name: &str,
        style_description: &str,
    ) -> Result<UploadedImage, GenerationError> {
        if !self.config.has_api_key() {
            warn!("Refusing to call Gemini: no API key configured");
            return Err(GenerationError::MissingCredential {
                detail: "GEMINI_API_KEY is not set".to_string(),
            });
        }

        let normalized = self.prepare_image(source).await;
        let mime_type = detect_encoding(normalized.bytes());
        let instruction = build_edit_instruction(style_name, style_description);
        let payload = build_generate_payload(
            &instruction,
            &normalized,
            &mime_type,
            self.config.gemini_safety_settings,
        );

        info!("Generating hairstyle: {}", style_name);
        let model = self.model();
        let metadata = json!({
            "style": style_name,
            "mimeType": mime_type,
            "sourceBytes": source.len(),
            "sentBytes": normalized.len(),
        });
        log_generation_timing("gemini", model, "generate_hairstyle", Some(metadata), || async {
            let response = self
                .transport
                .generate_content(model, &self.config.gemini_api_key, &payload)
                .await?;
            interpret_response(response)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use image::{ImageFormat, RgbImage};
    use parking_lot::Mutex;

    use super::*;

    fn response_from(value: Value) -> GeminiResponse {
        serde_json::from_value(value).unwrap()
    }

    fn png_upload() -> UploadedImage {
        let mut out = Cursor::new(Vec::new());
        RgbImage::new(8, 6).write_to(&mut out, ImageFormat::Png).unwrap();
        UploadedImage::from_bytes(out.into_inner()).unwrap()
    }

    fn configured() -> Config {
        Config {
            gemini_api_key: "test-key".to_string(),
            ..Config::default()
        }
    }

    struct RecordingTransport {
        reply: Mutex<Option<Result<GeminiResponse, GenerationError>>>,
        calls: AtomicUsize,
        payloads: Mutex<Vec<Value>>,
    }

    impl RecordingTransport {
        fn replying(reply: Result<GeminiResponse, GenerationError>) -> Self {
            Self {
                reply: Mutex::new(Some(reply)),
                calls: AtomicUsize::new(0),
                payloads: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn generate_content(
            &self,
            _model: &str,
            api_key: &str,
            payload: &Value,
        ) -> Result<GeminiResponse, GenerationError> {
            assert_eq!(api_key, "test-key");
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.payloads.lock().push(payload.clone());
            self.reply
                .lock()
                .take()
                .unwrap_or(Err(GenerationError::EmptyResponse))
        }
    }

    #[test]
    fn first_inline_image_wins_and_is_tagged_png() {
        let first = general_purpose::STANDARD.encode(b"first-image");
        let second = general_purpose::STANDARD.encode(b"second-image");
        let response = response_from(json!({
            "candidates": [{
                "content": { "parts": [
                    { "text": "Here you go" },
                    { "inlineData": { "mimeType": "image/jpeg", "data": first } },
                    { "inlineData": { "mimeType": "image/png", "data": second } }
                ]}
            }]
        }));
        let image = interpret_response(response).unwrap();
        assert_eq!(image.mime_type(), "image/png");
        assert_eq!(image.bytes(), b"first-image");
        assert_eq!(image.to_data_uri(), format!("data:image/png;base64,{first}"));
    }

    #[test]
    fn text_only_response_is_a_refusal() {
        let response = response_from(json!({
            "candidates": [{ "content": { "parts": [{ "text": "I can't edit this photo." }] } }]
        }));
        assert_eq!(
            interpret_response(response),
            Err(GenerationError::ModelRefusal {
                text: "I can't edit this photo.".to_string()
            })
        );
    }

    #[test]
    fn long_refusal_text_is_truncated() {
        let long = "x".repeat(300);
        let response = response_from(json!({
            "candidates": [{ "content": { "parts": [{ "text": long }] } }]
        }));
        match interpret_response(response) {
            Err(GenerationError::ModelRefusal { text }) => {
                assert_eq!(text.len(), REFUSAL_TEXT_LIMIT + 3);
                assert!(text.ends_with("..."));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn zero_candidates_fail_with_block_reason() {
        let response = response_from(json!({
            "candidates": [],
            "promptFeedback": { "blockReason": "SAFETY" }
        }));
        assert_eq!(
            interpret_response(response),
            Err(GenerationError::NoCandidates {
                block_reason: Some("SAFETY".to_string())
            })
        );
        assert_eq!(
            interpret_response(response_from(json!({}))),
            Err(GenerationError::NoCandidates { block_reason: None })
        );
    }

    #[test]
    fn candidate_without_usable_parts_is_empty() {
        let response = response_from(json!({
            "candidates": [{
                "content": { "parts": [
                    { "functionCall": { "name": "noop" } },
                    { "inlineData": { "mimeType": "image/png", "data": "!!not base64!!" } },
                    { "text": "   " }
                ]},
                "finishReason": "STOP"
            }]
        }));
        assert_eq!(interpret_response(response), Err(GenerationError::EmptyResponse));

        let no_content = response_from(json!({ "candidates": [{ "finishReason": "IMAGE_SAFETY" }] }));
        assert_eq!(interpret_response(no_content), Err(GenerationError::EmptyResponse));
    }

    #[test]
    fn payload_puts_image_before_instruction() {
        let image = UploadedImage::new("image/jpeg", vec![1, 2, 3]);
        let payload = build_generate_payload("do it", &image, "image/jpeg", SafetyProfile::Relaxed);
        let parts = payload.pointer("/contents/0/parts").unwrap().as_array().unwrap();
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(parts[0]["inlineData"]["data"], "AQID");
        assert_eq!(parts[1]["text"], "do it");
        assert_eq!(
            payload.pointer("/safetySettings/0/threshold").unwrap(),
            "BLOCK_ONLY_HIGH"
        );
        assert_eq!(
            payload.pointer("/generationConfig/responseModalities/1").unwrap(),
            "IMAGE"
        );
    }

    #[test]
    fn endpoint_joins_base_url_and_model() {
        let transport = HttpTransport::new(
            Url::parse("https://example.test/v1beta/").unwrap(),
            Duration::from_secs(5),
        );
        assert_eq!(
            transport.endpoint("gemini-2.5-flash-image"),
            "https://example.test/v1beta/models/gemini-2.5-flash-image:generateContent"
        );
    }

    #[test]
    fn redacts_key_from_error_text() {
        assert_eq!(
            redact_api_key("bad url ?key=secret-123", "secret-123"),
            "bad url ?key=[redacted]"
        );
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_network_call() {
        let config = Config {
            gemini_api_base_url: Url::parse("http://127.0.0.1:9/v1beta").unwrap(),
            ..Config::default()
        };
        let client = GeminiClient::new(config);
        let err = client
            .generate(&png_upload(), "Buzz Cut", "Very short")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::llm::ErrorKind::MissingCredential);
    }

    #[tokio::test]
    async fn missing_key_never_reaches_transport() {
        let transport = RecordingTransport::replying(Ok(GeminiResponse::default()));
        let client = GeminiClient::with_transport(Config::default(), transport);
        let err = client
            .generate(&png_upload(), "Buzz Cut", "Very short")
            .await
            .unwrap_err();
        assert!(err.is_configuration_issue());
        assert_eq!(client.transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn sends_normalized_jpeg_with_detected_encoding() {
        let reply = response_from(json!({
            "candidates": [{ "content": { "parts": [
                { "inlineData": { "mimeType": "image/png", "data": "cmVzdWx0" } }
            ]}}]
        }));
        let transport = RecordingTransport::replying(Ok(reply));
        let client = GeminiClient::with_transport(configured(), transport);

        let result = client
            .generate(&png_upload(), "Buzz Cut", "Very short all over")
            .await
            .unwrap();
        assert_eq!(result.to_data_uri(), "data:image/png;base64,cmVzdWx0");

        assert_eq!(client.transport.calls.load(Ordering::SeqCst), 1);
        let payloads = client.transport.payloads.lock();
        let parts = payloads[0].pointer("/contents/0/parts").unwrap();
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/jpeg");
        let sent = general_purpose::STANDARD
            .decode(parts[0]["inlineData"]["data"].as_str().unwrap())
            .unwrap();
        assert_eq!(&sent[..3], &[0xFF, 0xD8, 0xFF]);
        assert!(parts[1]["text"].as_str().unwrap().contains("Buzz Cut"));
    }

    #[tokio::test]
    async fn transport_errors_propagate_unchanged() {
        let upstream = GenerationError::Upstream {
            status: Some(500),
            message: "Gemini request failed with status 500: boom".to_string(),
        };
        let transport = RecordingTransport::replying(Err(upstream.clone()));
        let client = GeminiClient::with_transport(configured(), transport);
        let err = client
            .generate(&png_upload(), "Buzz Cut", "Very short")
            .await
            .unwrap_err();
        assert_eq!(err, upstream);
    }
}
