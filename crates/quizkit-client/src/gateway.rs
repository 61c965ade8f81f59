//! The single entry point for every network call.
//!
//! `RequestGateway::call` attaches the bearer token when it is still valid,
//! tags the request with an `X-Request-ID`, unwraps the `{code, message,
//! data, timestamp}` envelope and maps failures onto [`QuizError`]. Every
//! failure goes through the [`ErrorClassifier`] before it is returned.
//!
//! Only GET requests are retried, only on transport failures, and at most
//! [`MAX_RETRIES`] times with a linearly growing delay.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use quizkit_core::classify::{ErrorClassifier, ErrorInfo, RawFailure};
use quizkit_core::traits::{Notifier, SilentNotifier};
use quizkit_core::{QuizError, Result};

use crate::config::ClientConfig;
use crate::credentials::CredentialStore;

/// Hard ceiling on automatic retries, whatever the caller asks for.
pub const MAX_RETRIES: u32 = 3;

pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// Per-call overrides. Unset fields fall back to the gateway's config.
#[derive(Debug, Clone)]
pub struct CallOptions {
    pub retry_limit: Option<u32>,
    pub retry_delay: Option<Duration>,
    pub timeout: Option<Duration>,
    /// Pass failures to the notifier.
    pub show_error: bool,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            retry_limit: None,
            retry_delay: None,
            timeout: None,
            show_error: true,
        }
    }
}

impl CallOptions {
    pub fn quiet() -> Self {
        Self {
            show_error: false,
            ..Self::default()
        }
    }

    pub fn with_retries(mut self, limit: u32) -> Self {
        self.retry_limit = Some(limit);
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    code: i64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: serde_json::Value,
}

type UnauthorizedHandler = Arc<dyn Fn() + Send + Sync>;

/// Runs the unauthorized handler at most once until re-armed.
struct UnauthorizedGuard {
    fired: AtomicBool,
    handler: Option<UnauthorizedHandler>,
}

impl UnauthorizedGuard {
    /// True for the one caller that won the flag.
    fn trigger(&self, credentials: &CredentialStore) -> bool {
        if self
            .fired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        tracing::warn!("login rejected by server, clearing credentials");
        credentials.clear();
        if let Some(handler) = &self.handler {
            handler();
        }
        true
    }
}

pub struct RequestGateway {
    http: reqwest::Client,
    config: ClientConfig,
    credentials: CredentialStore,
    classifier: Arc<ErrorClassifier>,
    notifier: Arc<dyn Notifier>,
    unauthorized: UnauthorizedGuard,
}

impl RequestGateway {
    pub fn new(config: ClientConfig, credentials: CredentialStore) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(config.timeout()).build()?;
        let classifier = Arc::new(ErrorClassifier::new(config.error_log_capacity));
        Ok(Self {
            http,
            config,
            credentials,
            classifier,
            notifier: Arc::new(SilentNotifier),
            unauthorized: UnauthorizedGuard {
                fired: AtomicBool::new(false),
                handler: None,
            },
        })
    }

    pub fn with_classifier(mut self, classifier: Arc<ErrorClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Called once, after credentials are cleared, when the server first
    /// rejects the login with a 401.
    pub fn on_unauthorized(mut self, handler: impl Fn() + Send + Sync + 'static) -> Self {
        self.unauthorized.handler = Some(Arc::new(handler));
        self
    }

    /// Allow the unauthorized handler to run again, after a fresh login.
    pub fn rearm_unauthorized(&self) {
        self.unauthorized.fired.store(false, Ordering::Release);
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn classifier(&self) -> &Arc<ErrorClassifier> {
        &self.classifier
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.call(Method::GET, path, None, &CallOptions::default()).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T> {
        let body = to_body(body)?;
        self.call(Method::POST, path, Some(body), &CallOptions::default()).await
    }

    pub async fn put<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.call(Method::PUT, path, None, &CallOptions::default()).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.call(Method::DELETE, path, None, &CallOptions::default()).await
    }

    /// Issue one logical call, retrying GET transport failures.
    #[instrument(skip_all, fields(method = %method, path = %path))]
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        options: &CallOptions,
    ) -> Result<T> {
        let url = self.config.url(path);
        let retries = if method == Method::GET {
            options
                .retry_limit
                .unwrap_or(self.config.retry_limit)
                .min(MAX_RETRIES)
        } else {
            0
        };
        let delay = options.retry_delay.unwrap_or_else(|| self.config.retry_delay());
        let timeout = options.timeout.unwrap_or_else(|| self.config.timeout());

        let mut attempt = 0u32;
        loop {
            let request_id = Uuid::new_v4().to_string();
            let mut request = self
                .http
                .request(method.clone(), &url)
                .timeout(timeout)
                .header(REQUEST_ID_HEADER, &request_id);
            if let Some(token) = self.credentials.valid_token() {
                request = request.bearer_auth(token);
            } else {
                tracing::debug!("no valid token, sending without credentials");
            }
            if let Some(body) = &body {
                request = request.json(body);
            }

            tracing::debug!(%request_id, attempt, "sending request");
            let error = match request.send().await {
                Ok(response) => return self.handle_response(response, &request_id, &url, options).await,
                Err(e) => e,
            };

            let message = if error.is_timeout() {
                format!("request timeout after {}s", timeout.as_secs())
            } else {
                format!("network error: {error}")
            };
            if attempt < retries {
                attempt += 1;
                tracing::warn!(attempt, retries, "{message}, retrying");
                tokio::time::sleep(delay * attempt).await;
                continue;
            }

            let info = self.fail(
                RawFailure::Transport {
                    message: message.clone(),
                },
                &request_id,
                &url,
                options,
            );
            tracing::debug!(classified = %info.error_type, "giving up after {attempt} retries");
            return Err(QuizError::Network(message));
        }
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
        request_id: &str,
        url: &str,
        options: &CallOptions,
    ) -> Result<T> {
        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        let envelope = serde_json::from_str::<Envelope>(&text).ok();
        let server_message = envelope
            .as_ref()
            .and_then(|e| e.message.clone())
            .filter(|m| !m.trim().is_empty());

        if !(200..300).contains(&status) {
            if status == 401 {
                self.unauthorized.trigger(&self.credentials);
            }
            let info = self.fail(
                RawFailure::Http {
                    status,
                    message: server_message,
                },
                request_id,
                url,
                options,
            );
            return Err(status_error(status, info.message));
        }

        let Some(envelope) = envelope else {
            let info = self.fail(
                RawFailure::Other(format!("unreadable response body (HTTP {status})")),
                request_id,
                url,
                options,
            );
            return Err(QuizError::System {
                status,
                message: info.message,
            });
        };

        if envelope.code == 401 {
            self.unauthorized.trigger(&self.credentials);
            let info = self.fail(
                RawFailure::Http {
                    status: 401,
                    message: server_message,
                },
                request_id,
                url,
                options,
            );
            return Err(status_error(401, info.message));
        }

        if envelope.code != 200 {
            let info = self.fail(
                RawFailure::Business {
                    code: envelope.code,
                    message: server_message,
                },
                request_id,
                url,
                options,
            );
            return Err(QuizError::Business {
                code: envelope.code,
                message: info.message,
            });
        }

        serde_json::from_value(envelope.data).map_err(|e| {
            let info = self.fail(
                RawFailure::Other(format!("failed to decode response data: {e}")),
                request_id,
                url,
                options,
            );
            QuizError::System {
                status,
                message: info.message,
            }
        })
    }

    /// Classify, record and optionally show a failure.
    fn fail(&self, raw: RawFailure, request_id: &str, url: &str, options: &CallOptions) -> ErrorInfo {
        let info = self
            .classifier
            .parse(&raw)
            .with_request(Some(request_id.to_string()), Some(url.to_string()));
        self.classifier.record_info(info.clone());
        if options.show_error {
            self.notifier.notify(&info);
        }
        info
    }
}

fn to_body<B: Serialize + ?Sized>(body: &B) -> Result<serde_json::Value> {
    serde_json::to_value(body).map_err(|e| QuizError::validation(format!("invalid request body: {e}")))
}

/// The error kind for a non-success HTTP status. Agrees with the
/// classifier's table, so every `System` error is also reported as Critical.
fn status_error(status: u16, message: String) -> QuizError {
    match status {
        400 => QuizError::Validation(message),
        401 | 403 => QuizError::Permission { status, message },
        500 | 502 | 503 => QuizError::System { status, message },
        _ => QuizError::Business {
            code: i64::from(status),
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert!(matches!(status_error(400, "x".into()), QuizError::Validation(_)));
        assert!(status_error(401, "x".into()).is_unauthorized());
        assert!(matches!(
            status_error(403, "x".into()),
            QuizError::Permission { status: 403, .. }
        ));
        assert!(matches!(
            status_error(404, "x".into()),
            QuizError::Business { code: 404, .. }
        ));
        assert!(matches!(
            status_error(502, "x".into()),
            QuizError::System { status: 502, .. }
        ));
        assert!(matches!(
            status_error(504, "x".into()),
            QuizError::Business { code: 504, .. }
        ));
        assert!(matches!(
            status_error(418, "x".into()),
            QuizError::Business { code: 418, .. }
        ));
    }

    #[test]
    fn system_errors_are_classified_critical() {
        use quizkit_core::classify::{classify, ErrorLevel, ErrorType};
        for status in [500u16, 501, 502, 503, 504, 599] {
            let err = status_error(status, "x".into());
            let info = classify(
                &RawFailure::Http {
                    status,
                    message: None,
                },
                chrono::Utc::now(),
            );
            assert_eq!(err.kind(), info.error_type, "status {status}");
            if err.kind() == ErrorType::System {
                assert_eq!(info.level, ErrorLevel::Critical);
            }
        }
    }

    #[test]
    fn default_options_show_errors() {
        assert!(CallOptions::default().show_error);
        assert!(!CallOptions::quiet().show_error);
        assert_eq!(CallOptions::default().with_retries(1).retry_limit, Some(1));
    }
}
