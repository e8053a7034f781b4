//! Application layer containing business logic and shared state.

pub mod campaign_service;
pub mod config;
pub mod state;
pub mod token;
pub mod transaction_service;
pub mod user_service;

pub use campaign_service::CampaignService;
pub use config::{AppConfig, LogFormat};
pub use state::AppState;
pub use token::{Claims, TokenService};
pub use transaction_service::TransactionService;
pub use user_service::UserService;
