//! The object graph a host builds once at startup.

use std::sync::Arc;

use anyhow::Result;

use quizkit_core::classify::ErrorClassifier;
use quizkit_core::traits::{KeyValueStore, Notifier};
use quizkit_core::SessionEngine;

use crate::api::QuizClient;
use crate::config::ClientConfig;
use crate::credentials::CredentialStore;
use crate::gateway::RequestGateway;
use crate::sink::HttpErrorSink;
use crate::storage::FileStore;

/// Config, storage and the shared client, wired together.
pub struct QuizContext {
    config: ClientConfig,
    store: Arc<dyn KeyValueStore>,
    client: Arc<QuizClient>,
}

impl QuizContext {
    pub fn new(
        config: ClientConfig,
        store: Arc<dyn KeyValueStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let mut classifier = ErrorClassifier::new(config.error_log_capacity);
        if config.report_errors {
            classifier = classifier.with_sink(Arc::new(HttpErrorSink::new(&config)?));
        }

        let credentials = CredentialStore::new(Arc::clone(&store));
        let gateway = RequestGateway::new(config.clone(), credentials)?
            .with_classifier(Arc::new(classifier))
            .with_notifier(notifier)
            .on_unauthorized(|| tracing::warn!("session expired, log in again"));
        let client = Arc::new(QuizClient::new(Arc::new(gateway)));

        Ok(Self {
            config,
            store,
            client,
        })
    }

    /// Build a context backed by a [`FileStore`] in the configured data dir.
    pub fn open(config: ClientConfig, notifier: Arc<dyn Notifier>) -> Result<Self> {
        let store = Arc::new(FileStore::in_dir(&config.data_dir)?);
        Self::new(config, store, notifier)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub fn client(&self) -> &Arc<QuizClient> {
        &self.client
    }

    pub fn credentials(&self) -> &CredentialStore {
        self.client.gateway().credentials()
    }

    /// A fresh session engine over the shared client and store.
    pub fn engine(&self) -> SessionEngine {
        SessionEngine::new(self.client.clone()).with_store(Arc::clone(&self.store))
    }
}
