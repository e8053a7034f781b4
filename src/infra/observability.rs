//! Logging and Prometheus metrics setup.

use std::sync::Arc;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::LogFormat;

const DEFAULT_LOG_FILTER: &str = "crowdfund_backend=debug,tower_http=info";

/// Counters recorded by the application services.
pub const COUNTERS: [(&str, &str); 4] = [
    ("campaigns_created_total", "Campaigns created"),
    ("campaign_images_uploaded_total", "Campaign images stored"),
    ("users_registered_total", "Accounts registered"),
    ("auth_failures_total", "Failed login attempts"),
];

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the default filter.
pub fn init_tracing(format: LogFormat) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer().pretty()).init(),
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
    }
}

/// Install the global metrics recorder and return a handle for rendering.
///
/// No HTTP listener is started; `GET /metrics` renders through the handle.
///
/// # Errors
/// Returns an error if a recorder is already installed or building fails.
pub fn init_metrics() -> Result<Arc<PrometheusHandle>, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    for (name, description) in COUNTERS {
        metrics::describe_counter!(name, description);
    }
    Ok(Arc::new(handle))
}
