use serde_json::Value;

pub const BAD_REQUEST_MESSAGE: &str =
    "Image processing failed. The photo might be too large or the format is unsupported.";

/// Discriminant of [`GenerationError`], for callers that branch on the failure
/// class rather than on its text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MissingCredential,
    Upstream,
    NoCandidates,
    EmptyResponse,
    ModelRefusal,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("Gemini API key is missing or invalid ({detail}). Check the GEMINI_API_KEY configuration.")]
    MissingCredential { detail: String },
    #[error("{message}")]
    Upstream { status: Option<u16>, message: String },
    #[error("{}", no_candidates_message(.block_reason.as_deref()))]
    NoCandidates { block_reason: Option<String> },
    #[error("The AI returned a response but it contained no image.")]
    EmptyResponse,
    #[error("AI processing note: {text}")]
    ModelRefusal { text: String },
}

fn no_candidates_message(block_reason: Option<&str>) -> String {
    match block_reason {
        Some(reason) => format!("No image generated. The request was blocked by safety filters ({reason})."),
        None => "No image generated. The AI might have been blocked by safety filters.".to_string(),
    }
}

impl GenerationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GenerationError::MissingCredential { .. } => ErrorKind::MissingCredential,
            GenerationError::Upstream { .. } => ErrorKind::Upstream,
            GenerationError::NoCandidates { .. } => ErrorKind::NoCandidates,
            GenerationError::EmptyResponse => ErrorKind::EmptyResponse,
            GenerationError::ModelRefusal { .. } => ErrorKind::ModelRefusal,
        }
    }

    /// True when retrying cannot help until the operator fixes configuration.
    pub fn is_configuration_issue(&self) -> bool {
        self.kind() == ErrorKind::MissingCredential
    }
}

pub(crate) fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

/// Pulls `(status, message, reasons)` out of a Google API error envelope.
fn parse_error_envelope(body: &str) -> (Option<String>, Option<String>, Vec<String>) {
    let Ok(value) = serde_json::from_str::<Value>(body.trim()) else {
        return (None, None, Vec::new());
    };

    let status = value
        .pointer("/error/status")
        .and_then(|v| v.as_str())
        .map(|v| v.to_string());
    let message = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str())
                .map(|v| v.to_string())
        });
    let reasons = value
        .pointer("/error/details")
        .and_then(|v| v.as_array())
        .map(|details| {
            details
                .iter()
                .filter_map(|detail| detail.get("reason").and_then(|v| v.as_str()))
                .map(|reason| reason.to_string())
                .collect()
        })
        .unwrap_or_default();

    (status, message, reasons)
}

pub fn summarize_error_body(body: &str) -> (Option<String>, String) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return (None, "empty response body".to_string());
    }

    let (_, message, _) = parse_error_envelope(trimmed);
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return (message, truncate_for_log(&value.to_string(), 2000));
    }

    (None, truncate_for_log(trimmed, 2000))
}

/// Maps a non-success HTTP reply to a classified error.
pub fn classify_http_failure(status: u16, body: &str) -> GenerationError {
    let (api_status, message, reasons) = parse_error_envelope(body);
    let credential_reason = reasons
        .iter()
        .any(|reason| reason.starts_with("API_KEY_") || reason == "ACCESS_TOKEN_TYPE_UNSUPPORTED");
    let credential_status = matches!(
        api_status.as_deref(),
        Some("UNAUTHENTICATED") | Some("PERMISSION_DENIED")
    );

    if status == 401 || status == 403 || credential_reason || credential_status {
        let detail = message.unwrap_or_else(|| format!("HTTP {status}"));
        return GenerationError::MissingCredential { detail };
    }

    let (_, summary) = summarize_error_body(body);
    let detail = message.unwrap_or(summary);
    if status == 400 {
        return GenerationError::Upstream {
            status: Some(status),
            message: format!("{BAD_REQUEST_MESSAGE} ({detail})"),
        };
    }

    GenerationError::Upstream {
        status: Some(status),
        message: format!("Gemini request failed with status {status}: {detail}"),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn invalid_key_reason_is_a_credential_failure() {
        let body = json!({
            "error": {
                "code": 400,
                "message": "API key not valid. Please pass a valid API key.",
                "status": "INVALID_ARGUMENT",
                "details": [{ "@type": "type.googleapis.com/google.rpc.ErrorInfo", "reason": "API_KEY_INVALID" }]
            }
        })
        .to_string();
        let err = classify_http_failure(400, &body);
        assert_eq!(err.kind(), ErrorKind::MissingCredential);
        assert!(err.is_configuration_issue());
        assert!(err.to_string().contains("API key not valid"));
    }

    #[test]
    fn forbidden_status_is_a_credential_failure() {
        let err = classify_http_failure(403, "");
        assert_eq!(
            err,
            GenerationError::MissingCredential {
                detail: "HTTP 403".to_string()
            }
        );
    }

    #[test]
    fn plain_bad_request_keeps_friendly_message() {
        let body = json!({ "error": { "code": 400, "message": "Request payload size exceeds the limit", "status": "INVALID_ARGUMENT" } })
            .to_string();
        let err = classify_http_failure(400, &body);
        assert_eq!(err.kind(), ErrorKind::Upstream);
        let text = err.to_string();
        assert!(text.starts_with(BAD_REQUEST_MESSAGE));
        assert!(text.contains("payload size"));
    }

    #[test]
    fn server_errors_are_upstream() {
        let err = classify_http_failure(503, "upstream overloaded");
        assert_eq!(
            err,
            GenerationError::Upstream {
                status: Some(503),
                message: "Gemini request failed with status 503: upstream overloaded".to_string()
            }
        );
    }

    #[test]
    fn no_candidates_message_mentions_block_reason() {
        let err = GenerationError::NoCandidates {
            block_reason: Some("SAFETY".to_string()),
        };
        assert!(err.to_string().contains("SAFETY"));
        assert!(GenerationError::NoCandidates { block_reason: None }
            .to_string()
            .contains("safety filters"));
    }
}
