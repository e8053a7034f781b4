//! The API layer, containing web handlers, extractors, response views and routing.

pub mod formatter;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod router;

pub use middleware::{CurrentUser, ValidatedJson};
pub use router::{RateLimitConfig, create_router, create_router_with_rate_limit};
