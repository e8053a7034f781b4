//! Crowdfunding backend
//!
//! Campaigns with image galleries, user accounts with bearer-token sessions,
//! and pledge listings, served over an axum HTTP API.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                   API Layer                  │
//! │  Routing, extractors, envelopes, formatters  │
//! ├─────────────────────────────────────────────┤
//! │               Application Layer              │
//! │   Campaign/Transaction/User services, tokens │
//! ├─────────────────────────────────────────────┤
//! │                 Domain Layer                 │
//! │      Entities, repository traits, errors     │
//! ├─────────────────────────────────────────────┤
//! │             Infrastructure Layer             │
//! │  PostgreSQL, local file storage, metrics     │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Services depend on `Arc<dyn Trait>` repositories, so every layer above
//! infrastructure runs against the in-memory mocks in `test_utils`.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use crowdfund_backend::api::create_router;
//! use crowdfund_backend::app::{AppConfig, AppState, TokenService};
//! use crowdfund_backend::infra::{LocalBlobStorage, PostgresClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::from_env()?;
//!     let db = Arc::new(PostgresClient::with_defaults(&config.database_url).await?);
//!     let storage = Arc::new(LocalBlobStorage::new(&config.upload_dir));
//!     let tokens = TokenService::new(&config.jwt_secret, config.token_ttl)?;
//!
//!     let state = Arc::new(AppState::new(db, storage, tokens, config.max_upload_bytes));
//!     let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
//!     axum::serve(listener, create_router(state)).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod app;
pub mod domain;
pub mod infra;

// Test utilities are available in tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
