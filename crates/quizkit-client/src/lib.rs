//! quizkit-client — HTTP transport and endpoint client for quizkit.
//!
//! Implements the `QuizApi` trait from `quizkit-core` over the quiz server's
//! REST API, with credential handling, bounded retries, a TTL response cache
//! and error reporting.

pub mod api;
pub mod cache;
pub mod config;
pub mod context;
pub mod credentials;
pub mod gateway;
pub mod sink;
pub mod storage;

pub use api::{Page, QuizClient};
pub use cache::ResponseCache;
pub use config::{load_config, load_config_from, ClientConfig};
pub use context::QuizContext;
pub use credentials::CredentialStore;
pub use gateway::{CallOptions, RequestGateway};
