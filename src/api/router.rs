//! HTTP routing configuration with rate limiting and OpenAPI documentation.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    extract::{DefaultBodyLimit, State},
    http::{HeaderValue, Request, Response, StatusCode},
    middleware::{self, Next},
    response::IntoResponse,
    routing::{get, post},
};
use governor::{Quota, RateLimiter};
use tower::ServiceBuilder;
use tower_http::{
    services::ServeDir,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, warn};

use crate::app::{AppConfig, AppState};
use crate::domain::PUBLIC_IMAGE_PREFIX;

use super::handlers::{
    check_email_handler, create_campaign_handler, fetch_user_handler, get_campaign_handler,
    health_check_handler, list_campaign_transactions_handler, list_campaigns_handler,
    list_user_transactions_handler, liveness_handler, login_handler, metrics_handler,
    openapi_handler, readiness_handler, register_user_handler, update_campaign_handler,
    upload_avatar_handler, upload_campaign_image_handler,
};
use super::response::failure;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests per second for API endpoints
    pub general_rps: u32,
    /// Burst size for API endpoints
    pub general_burst: u32,
    /// Requests per second for health endpoints
    pub health_rps: u32,
    /// Burst size for health endpoints
    pub health_burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            general_rps: 10,
            general_burst: 20,
            health_rps: 100,
            health_burst: 100,
        }
    }
}

impl From<&AppConfig> for RateLimitConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            general_rps: config.rate_limit_rps,
            general_burst: config.rate_limit_burst,
            ..Self::default()
        }
    }
}

type KeyedLimiter = RateLimiter<
    IpAddr,
    governor::state::keyed::DashMapStateStore<IpAddr>,
    governor::clock::DefaultClock,
>;

/// Shared rate limiter state, keyed by client IP.
pub struct RateLimitState {
    api_limiter: KeyedLimiter,
    health_limiter: KeyedLimiter,
    config: RateLimitConfig,
}

fn non_zero(value: u32) -> NonZeroU32 {
    NonZeroU32::new(value).unwrap_or(NonZeroU32::MIN)
}

impl RateLimitState {
    pub fn new(config: RateLimitConfig) -> Self {
        let api_quota =
            Quota::per_second(non_zero(config.general_rps)).allow_burst(non_zero(config.general_burst));
        let health_quota =
            Quota::per_second(non_zero(config.health_rps)).allow_burst(non_zero(config.health_burst));

        Self {
            api_limiter: RateLimiter::dashmap(api_quota),
            health_limiter: RateLimiter::dashmap(health_quota),
            config,
        }
    }
}

/// Extract client IP from request (X-Forwarded-For, X-Real-IP, or ConnectInfo).
/// Unknown clients share one bucket.
fn client_ip_from_request<B>(request: &Request<B>) -> IpAddr {
    let header_ip = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|first| first.trim().parse::<IpAddr>().ok())
    };

    if let Some(ip) = header_ip("x-forwarded-for").or_else(|| header_ip("x-real-ip")) {
        return ip;
    }
    if let Some(addr) = request
        .extensions()
        .get::<axum::extract::ConnectInfo<SocketAddr>>()
    {
        return addr.0.ip();
    }
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn too_many_requests(limit: u32, retry_after: u64) -> Response<Body> {
    let mut response = failure(
        StatusCode::TOO_MANY_REQUESTS,
        "rate_limited",
        "Rate limit exceeded. Please slow down your requests.",
    )
    .into_response();
    let headers = response.headers_mut();
    headers.insert("X-RateLimit-Limit", HeaderValue::from(limit));
    headers.insert("X-RateLimit-Remaining", HeaderValue::from_static("0"));
    headers.insert("Retry-After", HeaderValue::from(retry_after));
    response
}

fn retry_after_secs(not_until: &governor::NotUntil<governor::clock::QuantaInstant>) -> u64 {
    not_until
        .wait_time_from(governor::clock::Clock::now(
            &governor::clock::DefaultClock::default(),
        ))
        .as_secs()
        .max(1)
}

/// Rate limit middleware for API endpoints
async fn rate_limit_api_middleware(
    State(rate_limit): State<Arc<RateLimitState>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let client_ip = client_ip_from_request(&request);
    let limit = rate_limit.config.general_rps;
    match rate_limit.api_limiter.check_key(&client_ip) {
        Ok(_) => {
            let mut response = next.run(request).await;
            response
                .headers_mut()
                .insert("X-RateLimit-Limit", HeaderValue::from(limit));
            response
        }
        Err(not_until) => {
            warn!(%client_ip, "Rate limit exceeded");
            too_many_requests(limit, retry_after_secs(&not_until))
        }
    }
}

/// Rate limit middleware for health endpoints
async fn rate_limit_health_middleware(
    State(rate_limit): State<Arc<RateLimitState>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let client_ip = client_ip_from_request(&request);
    match rate_limit.health_limiter.check_key(&client_ip) {
        Ok(_) => next.run(request).await,
        Err(not_until) => {
            too_many_requests(rate_limit.config.health_rps, retry_after_secs(&not_until))
        }
    }
}

fn api_routes(max_upload_bytes: usize) -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", post(register_user_handler))
        .route("/users/fetch", get(fetch_user_handler))
        .route("/sessions", post(login_handler))
        .route("/email_checkers", post(check_email_handler))
        .route("/avatars", post(upload_avatar_handler))
        .route(
            "/campaigns",
            get(list_campaigns_handler).post(create_campaign_handler),
        )
        .route(
            "/campaigns/{id}",
            get(get_campaign_handler).put(update_campaign_handler),
        )
        .route(
            "/campaigns/{id}/transactions",
            get(list_campaign_transactions_handler),
        )
        .route("/campaign-images", post(upload_campaign_image_handler))
        .route("/transactions", get(list_user_transactions_handler))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

fn health_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(health_check_handler))
        .route("/live", get(liveness_handler))
        .route("/ready", get(readiness_handler))
}

fn assemble(
    app_state: Arc<AppState>,
    api: Router<Arc<AppState>>,
    health: Router<Arc<AppState>>,
) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            REQUEST_TIMEOUT,
        ));

    let mut router = Router::new()
        .nest("/api/v1", api)
        .nest("/health", health)
        .route("/metrics", get(metrics_handler))
        .route("/api-docs/openapi.json", get(openapi_handler));
    if let Some(dir) = &app_state.upload_dir {
        router = router.nest_service(&format!("/{PUBLIC_IMAGE_PREFIX}"), ServeDir::new(dir));
    }

    router.layer(middleware).with_state(app_state)
}

/// Create router without rate limiting
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api = api_routes(app_state.max_upload_bytes);
    assemble(app_state, api, health_routes())
}

/// Create router with per-IP rate limiting on API and health routes
pub fn create_router_with_rate_limit(app_state: Arc<AppState>, config: RateLimitConfig) -> Router {
    let rate_limit_state = Arc::new(RateLimitState::new(config));

    let api = api_routes(app_state.max_upload_bytes).layer(middleware::from_fn_with_state(
        Arc::clone(&rate_limit_state),
        rate_limit_api_middleware,
    ));
    let health = health_routes().layer(middleware::from_fn_with_state(
        rate_limit_state,
        rate_limit_health_middleware,
    ));

    assemble(app_state, api, health)
}
