//! HTTP client for the password recovery API.
//!
//! [`HttpResetBackend`] implements the engine's `ResetBackend` over three JSON
//! endpoints:
//!
//! | Operation | Endpoint | Body |
//! |-----------|----------|------|
//! | request code | `POST {base}/auth/password/forgot` | `{email}` |
//! | verify code | `POST {base}/auth/password/verify` | `{email, code}` |
//! | set password | `POST {base}/auth/password/reset` | `{email, code, new_password}` |
//!
//! # Error Handling
//!
//! Every failure is reported as a `BackendError`:
//!
//! | Response | Classification |
//! |----------|----------------|
//! | 2xx | success |
//! | 410 | `Expired` |
//! | other 4xx | `Rejected`, with the server's message when it sends one |
//! | 5xx after retries, no response | `Transport` |

pub mod retry;

use std::sync::Arc;
use std::time::Duration;

use recover_engine::{BackendError, BackendFut, ResetBackend, TokenSource};
use recover_types::{Email, NewPassword, VerificationCode, clean_server_message};
use reqwest::{StatusCode, Url};
use serde::Serialize;
use thiserror::Error;

pub use retry::RetryConfig;

pub const FORGOT_PATH: &str = "/auth/password/forgot";
pub const VERIFY_PATH: &str = "/auth/password/verify";
pub const RESET_PATH: &str = "/auth/password/reset";

const CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const TCP_KEEPALIVE_SECS: u64 = 60;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;
const MAX_SERVER_MESSAGE_CHARS: usize = 200;

#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub base_url: String,
    pub timeout: Duration,
    /// Permit `http://` base URLs. Off outside local development.
    pub allow_insecure_http: bool,
    pub retry: RetryConfig,
}

impl HttpSettings {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            allow_insecure_http: false,
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid API base URL {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

fn client_builder(settings: &HttpSettings) -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .timeout(settings.timeout)
        .redirect(reqwest::redirect::Policy::none())
        .https_only(!settings.allow_insecure_http)
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
        .user_agent(concat!("recover/", env!("CARGO_PKG_VERSION")))
}

fn validate_base_url(raw: &str, allow_insecure_http: bool) -> Result<String, ClientError> {
    let invalid = |reason: &str| ClientError::InvalidBaseUrl {
        url: raw.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = raw.trim().trim_end_matches('/');
    let url = Url::parse(trimmed).map_err(|e| invalid(&e.to_string()))?;
    match url.scheme() {
        "https" => {}
        "http" if allow_insecure_http => {}
        "http" => return Err(invalid("plain http requires allow_insecure_http")),
        other => return Err(invalid(&format!("unsupported scheme {other:?}"))),
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host"));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(invalid("query and fragment are not allowed"));
    }
    Ok(trimmed.to_string())
}

#[derive(Serialize)]
struct ForgotBody<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct VerifyBody<'a> {
    email: &'a str,
    code: &'a str,
}

#[derive(Serialize)]
struct ResetBody<'a> {
    email: &'a str,
    code: &'a str,
    new_password: &'a str,
}

/// `ResetBackend` over the recovery REST API.
pub struct HttpResetBackend {
    client: reqwest::Client,
    base_url: String,
    retry: RetryConfig,
    tokens: Arc<dyn TokenSource>,
}

impl std::fmt::Debug for HttpResetBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResetBackend")
            .field("base_url", &self.base_url)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl HttpResetBackend {
    pub fn new(settings: HttpSettings, tokens: Arc<dyn TokenSource>) -> Result<Self, ClientError> {
        let base_url = validate_base_url(&settings.base_url, settings.allow_insecure_http)?;
        if settings.allow_insecure_http {
            tracing::warn!(%base_url, "Insecure HTTP allowed for recovery API");
        }
        let client = client_builder(&settings).build()?;
        Ok(Self {
            client,
            base_url,
            retry: settings.retry,
            tokens,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<T: Serialize + Sync>(
        &self,
        endpoint: &'static str,
        body: &T,
    ) -> Result<(), BackendError> {
        let url = format!("{}{endpoint}", self.base_url);
        let token = self.tokens.current_auth_token();

        let outcome = retry::send_with_retry(
            || {
                let builder = self.client.post(&url).json(body);
                match &token {
                    Some(token) => builder.bearer_auth(token.expose_secret()),
                    None => builder,
                }
            },
            &self.retry,
        )
        .await;

        match outcome {
            retry::RetryOutcome::Success(response) => {
                tracing::debug!(endpoint, status = %response.status(), "Recovery API call succeeded");
                Ok(())
            }
            retry::RetryOutcome::HttpError(response) => {
                let status = response.status();
                let body = read_capped_error_body(response).await;
                tracing::debug!(endpoint, %status, "Recovery API returned an error");
                Err(error_for_status(status, &body))
            }
            retry::RetryOutcome::ConnectionError { attempts, source } => {
                tracing::debug!(endpoint, attempts, error = %source, "Recovery API unreachable");
                Err(BackendError::Transport {
                    message: format!("request failed after {attempts} attempt(s): {source}"),
                })
            }
        }
    }
}

impl ResetBackend for HttpResetBackend {
    fn request_code<'a>(&'a self, email: &'a Email) -> BackendFut<'a> {
        Box::pin(async move {
            let body = ForgotBody {
                email: email.as_str(),
            };
            self.post(FORGOT_PATH, &body).await
        })
    }

    fn verify_code<'a>(&'a self, email: &'a Email, code: &'a VerificationCode) -> BackendFut<'a> {
        Box::pin(async move {
            let body = VerifyBody {
                email: email.as_str(),
                code: code.as_str(),
            };
            self.post(VERIFY_PATH, &body).await
        })
    }

    fn set_new_password<'a>(
        &'a self,
        email: &'a Email,
        code: &'a VerificationCode,
        password: &'a NewPassword,
    ) -> BackendFut<'a> {
        Box::pin(async move {
            let body = ResetBody {
                email: email.as_str(),
                code: code.as_str(),
                new_password: password.expose_secret(),
            };
            self.post(RESET_PATH, &body).await
        })
    }
}

/// Read at most `MAX_ERROR_BODY_BYTES` of an error response.
pub async fn read_capped_error_body(mut response: reqwest::Response) -> String {
    let mut body = Vec::new();
    while let Ok(Some(chunk)) = response.chunk().await {
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            let text = String::from_utf8_lossy(&body);
            return format!("{text}...(truncated)");
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}

/// Pull a human-readable message out of a JSON error body.
///
/// Looks at `/error/message`, `/message` and a string `/error`, in that
/// order.
#[must_use]
pub fn extract_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["/error/message", "/message", "/error"]
        .iter()
        .find_map(|pointer| value.pointer(pointer)?.as_str())
        .map(|message| clean_server_message(message, MAX_SERVER_MESSAGE_CHARS))
        .filter(|message| !message.is_empty())
}

/// Classify a non-success response.
#[must_use]
pub fn error_for_status(status: StatusCode, body: &str) -> BackendError {
    let message = extract_error_message(body);

    match status {
        StatusCode::GONE => BackendError::Expired {
            message: message.unwrap_or_default(),
        },
        _ if status.is_client_error() => BackendError::Rejected {
            message: message.unwrap_or_else(|| default_rejection(status).to_string()),
        },
        _ => BackendError::Transport {
            message: match message {
                Some(message) => format!("HTTP {status}: {message}"),
                None => format!("HTTP {status}"),
            },
        },
    }
}

fn default_rejection(status: StatusCode) -> &'static str {
    match status {
        StatusCode::TOO_MANY_REQUESTS => "Too many attempts. Wait a few minutes and try again.",
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            "This request is not allowed. Start the reset again."
        }
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::{ClientError, error_for_status, extract_error_message, validate_base_url};
    use recover_engine::BackendError;
    use reqwest::StatusCode;

    #[test]
    fn base_url_must_be_https_unless_allowed() {
        assert_eq!(
            validate_base_url("https://api.example.com/", false).unwrap(),
            "https://api.example.com"
        );
        assert!(matches!(
            validate_base_url("http://localhost:8080", false),
            Err(ClientError::InvalidBaseUrl { .. })
        ));
        assert!(validate_base_url("http://localhost:8080", true).is_ok());
        assert!(validate_base_url("ftp://example.com", true).is_err());
        assert!(validate_base_url("https://example.com/?x=1", false).is_err());
        assert!(validate_base_url("not a url", false).is_err());
    }

    #[test]
    fn message_extraction_order() {
        assert_eq!(
            extract_error_message(r#"{"error":{"message":"Invalid code"},"message":"other"}"#)
                .as_deref(),
            Some("Invalid code")
        );
        assert_eq!(
            extract_error_message(r#"{"message":"Unknown email"}"#).as_deref(),
            Some("Unknown email")
        );
        assert_eq!(
            extract_error_message(r#"{"error":"rate_limited"}"#).as_deref(),
            Some("rate_limited")
        );
        assert_eq!(extract_error_message("<html>oops</html>"), None);
        assert_eq!(extract_error_message(r#"{"message":"   "}"#), None);
    }

    #[test]
    fn server_message_is_sanitized() {
        let message =
            extract_error_message("{\"message\":\"bad\\u001b[31m code\\n\\ttry again\"}").unwrap();
        assert!(!message.contains('\u{1b}'));
        assert!(!message.contains('\n'));
        assert!(message.starts_with("bad"));
    }

    #[test]
    fn status_classification() {
        assert_eq!(
            error_for_status(StatusCode::GONE, r#"{"message":"Code expired"}"#),
            BackendError::Expired {
                message: "Code expired".to_string()
            }
        );
        assert_eq!(
            error_for_status(StatusCode::BAD_REQUEST, ""),
            BackendError::Rejected {
                message: String::new()
            }
        );
        assert!(matches!(
            error_for_status(StatusCode::TOO_MANY_REQUESTS, ""),
            BackendError::Rejected { message } if message.contains("Too many")
        ));
        assert!(error_for_status(StatusCode::INTERNAL_SERVER_ERROR, "").is_transport());
    }
}
