//! A chat backend for OpenAI-compatible APIs.
//!
//! The relay's wire types already follow the chat-completion shape, so
//! this backend is a thin `POST /chat/completions` client: it fills in
//! the default model when the caller names none, sends the request as
//! JSON, and decodes the non-streamed response.
//!
//! Endpoint failures are never retried here. The upstream tool server
//! gets retries because its elastic backend cold starts; a chat
//! endpoint rejecting a request (bad key, unknown model, rate limit) is
//! terminal for that request, with the status and message preserved for
//! the caller.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod config;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use reqwest::{Client, header};
use serde_json::Value;
use verse_relay_model::{
    BackendError, ChatBackend, ChatRequest, ChatResponse, ErrorKind,
};

pub use config::{OpenAIConfig, OpenAIConfigBuilder};

/// Error type for [`OpenAIBackend`].
#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
    status: Option<u16>,
}

impl Error {
    fn new(
        message: impl Into<String>,
        kind: ErrorKind,
        status: Option<u16>,
    ) -> Self {
        Self {
            message: message.into(),
            kind,
            status,
        }
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for Error {}

impl BackendError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[inline]
    fn status(&self) -> Option<u16> {
        self.status
    }
}

/// OpenAI-compatible chat backend.
#[derive(Clone, Debug)]
pub struct OpenAIBackend {
    client: Client,
    config: Arc<OpenAIConfig>,
}

impl OpenAIBackend {
    /// Creates a new `OpenAIBackend` with the given configuration.
    #[inline]
    pub fn new(config: OpenAIConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
        }
    }
}

impl ChatBackend for OpenAIBackend {
    type Error = Error;

    fn complete(
        &self,
        req: &ChatRequest,
    ) -> impl Future<Output = Result<ChatResponse, Self::Error>> + Send + 'static
    {
        let mut req = req.clone();
        if req.model.is_empty() {
            req.model = self.config.model.clone();
        }

        let resp_fut = self
            .client
            .post(format!("{}{}", self.config.base_url, "/chat/completions"))
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.config.api_key),
            )
            .header(header::CONTENT_TYPE, "application/json")
            .json(&req)
            .send();

        async move {
            trace!("sending a completion request: {req:?}");
            let resp = match resp_fut.await {
                Ok(resp) => resp,
                Err(err) => {
                    return Err(Error::new(
                        format!("{err}"),
                        ErrorKind::Other,
                        None,
                    ));
                }
            };

            let status = resp.status().as_u16();
            if !resp.status().is_success() {
                let body = resp.text().await.unwrap_or_default();
                let message =
                    extract_error_message(&body).unwrap_or(body);
                warn!(status, "chat endpoint returned an error: {message}");
                return Err(Error::new(
                    message,
                    classify_status(status),
                    Some(status),
                ));
            }

            match resp.json::<ChatResponse>().await {
                Ok(parsed) => Ok(parsed),
                Err(err) => Err(Error::new(
                    format!("failed to decode response: {err}"),
                    ErrorKind::Other,
                    None,
                )),
            }
        }
    }
}

fn classify_status(status: u16) -> ErrorKind {
    match status {
        401 | 403 => ErrorKind::AuthenticationFailed,
        429 => ErrorKind::RateLimitExceeded,
        400..=499 => ErrorKind::InvalidRequest,
        _ => ErrorKind::Other,
    }
}

/// Pulls the `error.message` out of an OpenAI-style error body.
fn extract_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .pointer("/error/message")
        .and_then(Value::as_str)
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status(401), ErrorKind::AuthenticationFailed);
        assert_eq!(classify_status(403), ErrorKind::AuthenticationFailed);
        assert_eq!(classify_status(429), ErrorKind::RateLimitExceeded);
        assert_eq!(classify_status(400), ErrorKind::InvalidRequest);
        assert_eq!(classify_status(404), ErrorKind::InvalidRequest);
        assert_eq!(classify_status(500), ErrorKind::Other);
        assert_eq!(classify_status(503), ErrorKind::Other);
    }

    #[test]
    fn test_extract_error_message() {
        let body = r#"{"error":{"message":"Incorrect API key provided",
            "type":"invalid_request_error"}}"#;
        assert_eq!(
            extract_error_message(body).as_deref(),
            Some("Incorrect API key provided")
        );

        assert_eq!(extract_error_message("<html>502</html>"), None);
        assert_eq!(extract_error_message(r#"{"detail":"nope"}"#), None);
    }

    #[test]
    fn test_backend_error_accessors() {
        let err = Error::new(
            "Rate limit reached",
            ErrorKind::RateLimitExceeded,
            Some(429),
        );
        assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);
        assert_eq!(err.status(), Some(429));
        assert_eq!(err.message(), "Rate limit reached");
        assert_eq!(format!("{err}"), "Rate limit reached");
    }
}
