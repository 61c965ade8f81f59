//! Error classification and the rolling error log.
//!
//! `classify` is a pure table from a raw failure to an `ErrorInfo`.
//! `ErrorClassifier` adds the side effects: every record is traced and
//! pushed into a bounded log, and System/Critical records are reported to
//! an `ErrorSink` without waiting on the result.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};
use crate::traits::ErrorSink;

/// Default number of records kept by the rolling log.
pub const DEFAULT_LOG_CAPACITY: usize = 100;

const NETWORK_MARKERS: &[&str] = &["network", "timeout", "timed out", "connect", "dns"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ErrorType {
    Network,
    Business,
    Validation,
    Permission,
    System,
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorType::Network => "network",
            ErrorType::Business => "business",
            ErrorType::Validation => "validation",
            ErrorType::Permission => "permission",
            ErrorType::System => "system",
        };
        f.write_str(s)
    }
}

/// Severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorLevel {
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for ErrorLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorLevel::Info => "info",
            ErrorLevel::Warning => "warning",
            ErrorLevel::Error => "error",
            ErrorLevel::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// A failure as observed before classification.
#[derive(Debug, Clone, PartialEq)]
pub enum RawFailure {
    /// An HTTP response with a non-success status. `message` is the body's
    /// envelope message when one could be read.
    Http { status: u16, message: Option<String> },
    /// A business code from the response envelope or the caller.
    Business { code: i64, message: Option<String> },
    /// No response was received.
    Transport { message: String },
    /// Anything else.
    Other(String),
}

/// A classified error record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    #[serde(rename = "type")]
    pub error_type: ErrorType,
    pub level: ErrorLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    pub message: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ErrorInfo {
    /// Whether this record goes to the remote sink.
    pub fn is_reportable(&self) -> bool {
        self.level == ErrorLevel::Critical || self.error_type == ErrorType::System
    }

    pub fn with_request(mut self, request_id: Option<String>, url: Option<String>) -> Self {
        self.request_id = request_id;
        self.url = url;
        self
    }
}

/// Fallback message for an HTTP status when the body carries none.
pub fn default_http_message(status: u16) -> String {
    let known = match status {
        400 => "bad request parameters",
        401 => "not logged in or login expired",
        403 => "permission denied",
        404 => "requested resource not found",
        405 => "method not allowed",
        408 => "request timed out",
        409 => "request conflict",
        422 => "request validation failed",
        429 => "too many requests, try again later",
        500 => "internal server error",
        502 => "bad gateway",
        503 => "service unavailable",
        504 => "gateway timeout",
        _ => return format!("request failed ({status})"),
    };
    known.to_string()
}

fn is_network_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    NETWORK_MARKERS.iter().any(|m| lower.contains(m))
}

/// Classify a raw failure. Pure: the only input besides `raw` is `now`.
pub fn classify(raw: &RawFailure, now: DateTime<Utc>) -> ErrorInfo {
    let timestamp = now.timestamp_millis();
    let (error_type, level, code, message) = match raw {
        RawFailure::Http { status, message } => {
            let (error_type, level) = match status {
                400 => (ErrorType::Validation, ErrorLevel::Warning),
                401 => (ErrorType::Permission, ErrorLevel::Warning),
                403 => (ErrorType::Permission, ErrorLevel::Error),
                404 => (ErrorType::Business, ErrorLevel::Warning),
                500 | 502 | 503 => (ErrorType::System, ErrorLevel::Critical),
                _ => (ErrorType::Business, ErrorLevel::Error),
            };
            let message = message
                .clone()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| default_http_message(*status));
            (error_type, level, Some(i64::from(*status)), message)
        }
        RawFailure::Business { code, message } => (
            ErrorType::Business,
            ErrorLevel::Error,
            Some(*code),
            message
                .clone()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| "operation failed".to_string()),
        ),
        RawFailure::Transport { message } if is_network_message(message) => (
            ErrorType::Network,
            ErrorLevel::Error,
            None,
            "network connection failed, check your network settings".to_string(),
        ),
        RawFailure::Transport { message } | RawFailure::Other(message) => (
            ErrorType::System,
            ErrorLevel::Error,
            None,
            if message.is_empty() {
                "unknown error".to_string()
            } else {
                message.clone()
            },
        ),
    };

    ErrorInfo {
        error_type,
        level,
        code,
        message,
        timestamp,
        request_id: None,
        url: None,
    }
}

/// Counts over the current log contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ErrorStats {
    pub total: usize,
    pub by_type: BTreeMap<ErrorType, usize>,
    pub by_level: BTreeMap<ErrorLevel, usize>,
}

/// Append-only log with a fixed capacity; the oldest record is evicted first.
#[derive(Debug, Clone)]
pub struct ErrorLog {
    entries: VecDeque<ErrorInfo>,
    capacity: usize,
}

impl ErrorLog {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, info: ErrorInfo) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(info);
    }

    /// Records, newest first.
    pub fn entries(&self) -> Vec<ErrorInfo> {
        self.entries.iter().rev().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> ErrorStats {
        let mut stats = ErrorStats {
            total: self.entries.len(),
            ..Default::default()
        };
        for info in &self.entries {
            *stats.by_type.entry(info.error_type).or_default() += 1;
            *stats.by_level.entry(info.level).or_default() += 1;
        }
        stats
    }
}

impl Default for ErrorLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY)
    }
}

/// Classifies failures, keeps the rolling log, and forwards severe records.
pub struct ErrorClassifier {
    log: Mutex<ErrorLog>,
    sink: Option<Arc<dyn ErrorSink>>,
    clock: Arc<dyn Clock>,
}

impl ErrorClassifier {
    pub fn new(capacity: usize) -> Self {
        Self {
            log: Mutex::new(ErrorLog::with_capacity(capacity)),
            sink: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Classify without recording.
    pub fn parse(&self, raw: &RawFailure) -> ErrorInfo {
        classify(raw, self.clock.now())
    }

    /// Classify, log and record a failure, returning the record.
    pub fn record(&self, raw: &RawFailure) -> ErrorInfo {
        let info = self.parse(raw);
        self.record_info(info.clone());
        info
    }

    /// Record an already classified error.
    pub fn record_info(&self, info: ErrorInfo) {
        match info.level {
            ErrorLevel::Critical => tracing::error!(
                error_type = %info.error_type,
                code = ?info.code,
                request_id = ?info.request_id,
                "{}",
                info.message
            ),
            _ => tracing::warn!(
                error_type = %info.error_type,
                level = %info.level,
                code = ?info.code,
                request_id = ?info.request_id,
                "{}",
                info.message
            ),
        }

        if info.is_reportable() {
            self.report(&info);
        }

        self.log
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(info);
    }

    fn report(&self, info: &ErrorInfo) {
        let Some(sink) = self.sink.clone() else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("no async runtime, skipping error report");
            return;
        };
        let info = info.clone();
        handle.spawn(async move {
            if let Err(e) = sink.report(&info).await {
                tracing::debug!("error report failed: {e:#}");
            }
        });
    }

    /// Snapshot of the log, newest first.
    pub fn entries(&self) -> Vec<ErrorInfo> {
        self.log.lock().unwrap_or_else(|e| e.into_inner()).entries()
    }

    pub fn stats(&self) -> ErrorStats {
        self.log.lock().unwrap_or_else(|e| e.into_inner()).stats()
    }

    pub fn clear(&self) {
        self.log.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn http(status: u16) -> RawFailure {
        RawFailure::Http {
            status,
            message: None,
        }
    }

    #[test]
    fn http_status_table() {
        let cases = [
            (400, ErrorType::Validation, ErrorLevel::Warning),
            (401, ErrorType::Permission, ErrorLevel::Warning),
            (403, ErrorType::Permission, ErrorLevel::Error),
            (404, ErrorType::Business, ErrorLevel::Warning),
            (500, ErrorType::System, ErrorLevel::Critical),
            (502, ErrorType::System, ErrorLevel::Critical),
            (503, ErrorType::System, ErrorLevel::Critical),
            (504, ErrorType::Business, ErrorLevel::Error),
            (418, ErrorType::Business, ErrorLevel::Error),
        ];
        for (status, ty, level) in cases {
            let info = classify(&http(status), now());
            assert_eq!(info.error_type, ty, "type for {status}");
            assert_eq!(info.level, level, "level for {status}");
            assert_eq!(info.code, Some(i64::from(status)));
        }
    }

    #[test]
    fn http_message_prefers_body_then_table() {
        let info = classify(
            &RawFailure::Http {
                status: 400,
                message: Some("answer too long".into()),
            },
            now(),
        );
        assert_eq!(info.message, "answer too long");

        assert_eq!(classify(&http(429), now()).message, default_http_message(429));
        assert_eq!(classify(&http(418), now()).message, "request failed (418)");
    }

    #[test]
    fn transport_classification() {
        let info = classify(
            &RawFailure::Transport {
                message: "request timeout after 10s".into(),
            },
            now(),
        );
        assert_eq!(info.error_type, ErrorType::Network);
        assert_eq!(info.level, ErrorLevel::Error);
        assert_eq!(info.code, None);

        let info = classify(&RawFailure::Other("boom".into()), now());
        assert_eq!(info.error_type, ErrorType::System);
        assert_eq!(info.message, "boom");
    }

    #[test]
    fn business_code_without_http() {
        let info = classify(
            &RawFailure::Business {
                code: 4002,
                message: Some("bank disabled".into()),
            },
            now(),
        );
        assert_eq!(info.error_type, ErrorType::Business);
        assert_eq!(info.level, ErrorLevel::Error);
        assert_eq!(info.code, Some(4002));
        assert_eq!(info.timestamp, now().timestamp_millis());
    }

    #[test]
    fn log_evicts_oldest_first() {
        let mut log = ErrorLog::with_capacity(3);
        for code in 0..5 {
            log.push(classify(
                &RawFailure::Business {
                    code,
                    message: None,
                },
                now(),
            ));
        }
        assert_eq!(log.len(), 3);
        let codes: Vec<_> = log.entries().iter().map(|e| e.code.unwrap()).collect();
        assert_eq!(codes, vec![4, 3, 2]);
    }

    #[test]
    fn stats_count_by_type_and_level() {
        let classifier = ErrorClassifier::new(10);
        classifier.record(&http(500));
        classifier.record(&http(404));
        classifier.record(&http(403));
        let stats = classifier.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_type[&ErrorType::Permission], 1);
        assert_eq!(stats.by_type[&ErrorType::System], 1);
        assert_eq!(stats.by_level[&ErrorLevel::Critical], 1);
        assert_eq!(stats.by_level[&ErrorLevel::Warning], 1);

        classifier.clear();
        assert!(classifier.entries().is_empty());
    }

    struct CountingSink {
        calls: AtomicU32,
        fail: bool,
    }

    #[async_trait]
    impl ErrorSink for CountingSink {
        async fn report(&self, _info: &ErrorInfo) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("sink offline");
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn only_severe_records_are_reported() {
        let sink = Arc::new(CountingSink {
            calls: AtomicU32::new(0),
            fail: false,
        });
        let classifier = ErrorClassifier::new(10).with_sink(sink.clone());

        classifier.record(&http(404));
        classifier.record(&http(401));
        classifier.record(&http(503));
        classifier.record(&RawFailure::Other("panic in view".into()));

        // Reports run on spawned tasks.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(sink.calls.load(Ordering::SeqCst), 2);
        assert_eq!(classifier.entries().len(), 4);
    }

    #[tokio::test]
    async fn sink_failures_are_swallowed() {
        let sink = Arc::new(CountingSink {
            calls: AtomicU32::new(0),
            fail: true,
        });
        let classifier = ErrorClassifier::new(10).with_sink(sink.clone());
        let info = classifier.record(&http(500));
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(info.error_type, ErrorType::System);
        assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reporting_without_runtime_is_skipped() {
        let sink = Arc::new(CountingSink {
            calls: AtomicU32::new(0),
            fail: false,
        });
        let classifier = ErrorClassifier::new(10).with_sink(sink.clone());
        classifier.record(&http(500));
        assert_eq!(sink.calls.load(Ordering::SeqCst), 0);
        assert_eq!(classifier.entries().len(), 1);
    }
}
