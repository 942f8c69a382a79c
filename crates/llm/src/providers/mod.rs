//! Generation service providers.

pub mod claude;
pub mod ollama;
pub mod openai;

pub use claude::ClaudeClient;
pub use ollama::OllamaClient;
pub use openai::OpenAiCompatibleClient;

use std::time::Duration;
use waypoint_core::{AppError, AppResult};

/// Build an HTTP client, optionally bounded by a request timeout.
pub(crate) fn http_client(timeout: Option<Duration>) -> AppResult<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder
        .build()
        .map_err(|e| AppError::Llm(format!("Failed to build HTTP client: {}", e)))
}

/// Turn a non-2xx response into an error, detecting missing models.
pub(crate) async fn error_from_response(provider: &str, response: reqwest::Response) -> AppError {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    classify_failure(provider, status, &body)
}

pub(crate) fn classify_failure(provider: &str, status: reqwest::StatusCode, body: &str) -> AppError {
    if looks_like_missing_model(status, body) {
        return AppError::ModelUnavailable(format!("{} ({}): {}", provider, status, body));
    }
    AppError::Llm(format!("{} API error ({}): {}", provider, status, body))
}

fn looks_like_missing_model(status: reqwest::StatusCode, body: &str) -> bool {
    let lower = body.to_lowercase();
    let mentions_model = lower.contains("model");
    let not_found = lower.contains("not found")
        || lower.contains("not_found")
        || lower.contains("does not exist");
    (status == reqwest::StatusCode::NOT_FOUND && mentions_model) || (mentions_model && not_found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_classify_missing_model() {
        let err = classify_failure(
            "ollama",
            StatusCode::NOT_FOUND,
            r#"{"error":"model \"llama9\" not found, try pulling it first"}"#,
        );
        assert!(matches!(err, AppError::ModelUnavailable(_)));

        let err = classify_failure(
            "openai",
            StatusCode::BAD_REQUEST,
            r#"{"error":{"code":"model_not_found","message":"The model does not exist"}}"#,
        );
        assert!(matches!(err, AppError::ModelUnavailable(_)));
    }

    #[test]
    fn test_classify_generic_failure() {
        let err = classify_failure("openai", StatusCode::INTERNAL_SERVER_ERROR, "boom");
        assert!(matches!(err, AppError::Llm(_)));
        assert!(err.to_string().contains("500"));
    }
}
