//! Wiring of the service components from an [`AppConfig`].

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::api::Api;
use crate::config::AppConfig;
use crate::fetch::Coordinator;
use crate::store::Database;
use crate::tasks::{self, TaskManager};
use crate::twitter::{CredentialProvider, HttpSearchClient};

/// Every long-lived component, constructed once per process.
pub struct Service {
    pub db: Arc<Database>,
    pub credentials: Arc<CredentialProvider>,
    pub coordinator: Arc<Coordinator>,
    pub tasks: Arc<TaskManager>,
    pub api: Api,
    seed_token: Option<String>,
}

impl Service {
    pub fn build(config: &AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let db = Arc::new(Database::open(&config.db_path)?);

        let credentials = Arc::new(CredentialProvider::new(
            &config.api_url,
            &config.api_key,
            &config.api_secret,
            config.bearer_token.clone(),
            config.request_timeout,
        )?);
        let client = Arc::new(HttpSearchClient::new(&config.api_url, config.request_timeout)?);

        let coordinator = Arc::new(Coordinator::new(
            db.clone(),
            db.clone(),
            client,
            credentials.clone(),
            config.fetch_settings(),
        ));
        let tasks = Arc::new(TaskManager::new(coordinator.clone()));
        let api = Api::new(db.clone(), tasks.clone(), &config.api_base_uri);

        Ok(Self {
            db,
            credentials,
            coordinator,
            tasks,
            api,
            seed_token: config.bearer_token.clone(),
        })
    }

    /// Periodic cycle on a background task; stops when `shutdown` fires.
    pub fn spawn_scheduler(
        &self,
        config: &AppConfig,
        shutdown: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(tasks::run_scheduled(
            self.coordinator.clone(),
            config.fetch_interval,
            shutdown,
        ))
    }

    /// Revoke the bearer token if this process obtained it. A token supplied
    /// through the environment is left alone.
    pub async fn shutdown(&self) {
        let Some(token) = self.credentials.cached().await else {
            return;
        };
        if self.seed_token.as_deref() == Some(token.as_str()) {
            return;
        }
        if let Err(e) = self.credentials.invalidate(&token).await {
            log::warn!("⚠️  Failed to invalidate bearer token: {}", e);
        }
    }
}
