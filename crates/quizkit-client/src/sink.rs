//! Remote error reporting.

use std::time::Duration;

use async_trait::async_trait;

use quizkit_core::classify::ErrorInfo;
use quizkit_core::traits::ErrorSink;

use crate::config::ClientConfig;

const REPORT_TIMEOUT: Duration = Duration::from_secs(5);

/// Posts error records to the server's report endpoint.
///
/// Bypasses the gateway: report failures are never classified.
pub struct HttpErrorSink {
    http: reqwest::Client,
    url: String,
}

impl HttpErrorSink {
    pub fn new(config: &ClientConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(REPORT_TIMEOUT).build()?;
        Ok(Self {
            http,
            url: config.url(&config.error_report_path),
        })
    }
}

#[async_trait]
impl ErrorSink for HttpErrorSink {
    async fn report(&self, info: &ErrorInfo) -> anyhow::Result<()> {
        self.http
            .post(&self.url)
            .json(info)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizkit_core::classify::{classify, RawFailure};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn posts_record_to_report_path() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/errors/report"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let config = ClientConfig {
            base_url: format!("{}/api", server.uri()),
            ..ClientConfig::default()
        };
        let sink = HttpErrorSink::new(&config).unwrap();
        let info = classify(
            &RawFailure::Http {
                status: 500,
                message: None,
            },
            chrono::Utc::now(),
        );
        sink.report(&info).await.unwrap();
    }

    #[tokio::test]
    async fn server_error_is_an_err() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let config = ClientConfig {
            base_url: server.uri(),
            ..ClientConfig::default()
        };
        let sink = HttpErrorSink::new(&config).unwrap();
        let info = classify(&RawFailure::Other("boom".into()), chrono::Utc::now());
        assert!(sink.report(&info).await.is_err());
    }
}
