//! Application state management.
//!
//! Shared state handed to every request handler through Axum's `State`
//! extractor.

use std::path::PathBuf;
use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use tracing::error;

use crate::domain::{
    BlobStorage, CampaignRepository, DatabaseHealth, HealthResponse, HealthStatus,
    TransactionRepository, UserRepository,
};

use super::{CampaignService, TokenService, TransactionService, UserService};

/// Shared application state for the Axum web server.
///
/// Services hold `Arc<dyn Trait>` handles to their stores, so handlers never
/// see a concrete database or storage backend.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<UserService>,
    pub campaigns: Arc<CampaignService>,
    pub transactions: Arc<TransactionService>,
    pub tokens: Arc<TokenService>,
    pub storage: Arc<dyn BlobStorage>,
    pub db_health: Arc<dyn DatabaseHealth>,
    /// Largest accepted upload body, in bytes.
    pub max_upload_bytes: usize,
    /// Renders `/metrics`; absent when no recorder is installed.
    pub metrics: Option<Arc<PrometheusHandle>>,
    /// Directory served under `/images`; absent when uploads are not stored
    /// on the local filesystem.
    pub upload_dir: Option<PathBuf>,
}

impl AppState {
    /// Wires every service to a single store that implements all
    /// repository contracts.
    #[must_use]
    pub fn new<D>(
        db: Arc<D>,
        storage: Arc<dyn BlobStorage>,
        tokens: TokenService,
        max_upload_bytes: usize,
    ) -> Self
    where
        D: UserRepository + CampaignRepository + TransactionRepository + DatabaseHealth + 'static,
    {
        let user_repo: Arc<dyn UserRepository> = db.clone();
        let campaign_repo: Arc<dyn CampaignRepository> = db.clone();
        let transaction_repo: Arc<dyn TransactionRepository> = db.clone();

        Self {
            users: Arc::new(UserService::new(user_repo)),
            campaigns: Arc::new(CampaignService::new(Arc::clone(&campaign_repo))),
            transactions: Arc::new(TransactionService::new(transaction_repo, campaign_repo)),
            tokens: Arc::new(tokens),
            storage,
            db_health: db,
            max_upload_bytes,
            metrics: None,
            upload_dir: None,
        }
    }

    #[must_use]
    pub fn with_metrics(mut self, handle: Arc<PrometheusHandle>) -> Self {
        self.metrics = Some(handle);
        self
    }

    #[must_use]
    pub fn with_upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.upload_dir = Some(dir.into());
        self
    }

    /// Probes the database and reports overall health.
    pub async fn health_check(&self) -> HealthResponse {
        let database = match self.db_health.health_check().await {
            Ok(()) => HealthStatus::Healthy,
            Err(e) => {
                error!(error = %e, "Database health check failed");
                HealthStatus::Unhealthy
            }
        };
        HealthResponse::new(database)
    }
}
