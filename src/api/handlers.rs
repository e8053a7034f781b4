//! HTTP request handlers with OpenAPI documentation.

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{
        Multipart, Path, Query, State,
        multipart::{Field, MultipartError, MultipartRejection},
        rejection::{PathRejection, QueryRejection},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::{error, info, warn};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{IntoParams, Modify, OpenApi};

use crate::app::AppState;
use crate::domain::{
    AppError, CampaignId, CampaignInput, CheckEmailInput, DatabaseError, HealthResponse,
    HealthStatus, LoginInput, RegisterUserInput, StorageError, TokenError, UserId,
    ValidationError,
};

use super::formatter::{
    CampaignDetailFormatter, CampaignDetailImageFormatter, CampaignDetailUserFormatter,
    CampaignFormatter, CampaignTransactionFormatter, UserFormatter, UserTransactionCampaignFormatter,
    UserTransactionFormatter, format_campaign, format_campaign_detail,
    format_campaign_transactions, format_campaigns, format_user, format_user_transactions,
};
use super::middleware::{CurrentUser, ValidatedJson};
use super::response::{
    ApiResponse, EmailAvailability, ErrorDetail, Meta, ResponseStatus, UploadResult, failure,
    success,
};

type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;

/// Registers the bearer token scheme referenced by authenticated paths.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);

        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "Crowdfunding API",
        version = "0.1.0",
        description = "Campaigns, user accounts and pledge transactions",
        license(
            name = "MIT"
        )
    ),
    paths(
        register_user_handler,
        login_handler,
        check_email_handler,
        upload_avatar_handler,
        fetch_user_handler,
        list_campaigns_handler,
        get_campaign_handler,
        create_campaign_handler,
        update_campaign_handler,
        upload_campaign_image_handler,
        list_campaign_transactions_handler,
        list_user_transactions_handler,
        health_check_handler,
        liveness_handler,
        readiness_handler,
    ),
    components(
        schemas(
            RegisterUserInput,
            LoginInput,
            CheckEmailInput,
            CampaignInput,
            UserFormatter,
            CampaignFormatter,
            CampaignDetailFormatter,
            CampaignDetailUserFormatter,
            CampaignDetailImageFormatter,
            CampaignTransactionFormatter,
            UserTransactionFormatter,
            UserTransactionCampaignFormatter,
            EmailAvailability,
            UploadResult,
            Meta,
            ResponseStatus,
            ErrorDetail,
            HealthResponse,
            HealthStatus,
        )
    ),
    tags(
        (name = "users", description = "Accounts and sessions"),
        (name = "campaigns", description = "Campaigns and their galleries"),
        (name = "transactions", description = "Pledge listings"),
        (name = "health", description = "Health check endpoints")
    )
)]
pub struct ApiDoc;

/// Query string of the campaign list.
#[derive(Debug, Deserialize, IntoParams)]
pub struct ListCampaignsParams {
    /// Only campaigns owned by this user. Absent or 0 lists every campaign.
    pub user_id: Option<UserId>,
}

/// Register a new account
#[utoipa::path(
    post,
    path = "/api/v1/users",
    tag = "users",
    request_body = RegisterUserInput,
    responses(
        (status = 200, description = "Account registered", body = ApiResponse<UserFormatter>),
        (status = 409, description = "Email already registered", body = ApiResponse<ErrorDetail>),
        (status = 422, description = "Validation error", body = ApiResponse<ErrorDetail>)
    )
)]
pub async fn register_user_handler(
    State(state): State<Arc<AppState>>,
    ValidatedJson(input): ValidatedJson<RegisterUserInput>,
) -> ApiResult<UserFormatter> {
    let user = state.users.register(&input).await?;
    let token = state.tokens.issue(user.id)?;
    Ok(success("Account has been registered", format_user(&user, &token)))
}

/// Log in with email and password
#[utoipa::path(
    post,
    path = "/api/v1/sessions",
    tag = "users",
    request_body = LoginInput,
    responses(
        (status = 200, description = "Logged in", body = ApiResponse<UserFormatter>),
        (status = 401, description = "Invalid email or password", body = ApiResponse<ErrorDetail>),
        (status = 422, description = "Validation error", body = ApiResponse<ErrorDetail>)
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    ValidatedJson(input): ValidatedJson<LoginInput>,
) -> ApiResult<UserFormatter> {
    let user = state.users.authenticate(&input).await?;
    let token = state.tokens.issue(user.id)?;
    Ok(success("Successfully logged in", format_user(&user, &token)))
}

/// Check whether an email can still be registered
#[utoipa::path(
    post,
    path = "/api/v1/email_checkers",
    tag = "users",
    request_body = CheckEmailInput,
    responses(
        (status = 200, description = "Availability", body = ApiResponse<EmailAvailability>),
        (status = 422, description = "Validation error", body = ApiResponse<ErrorDetail>)
    )
)]
pub async fn check_email_handler(
    State(state): State<Arc<AppState>>,
    ValidatedJson(input): ValidatedJson<CheckEmailInput>,
) -> ApiResult<EmailAvailability> {
    let is_available = state.users.is_email_available(&input.email).await?;
    let message = if is_available {
        "Email is available"
    } else {
        "Email has been registered"
    };
    Ok(success(message, EmailAvailability { is_available }))
}

/// Upload the current user's avatar (multipart field `avatar`)
#[utoipa::path(
    post,
    path = "/api/v1/avatars",
    tag = "users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Avatar stored", body = ApiResponse<UploadResult>),
        (status = 400, description = "Missing or unsupported file", body = ApiResponse<ErrorDetail>),
        (status = 401, description = "Not authenticated", body = ApiResponse<ErrorDetail>)
    )
)]
pub async fn upload_avatar_handler(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<UploadResult> {
    let mut multipart = multipart.map_err(|e| StorageError::InvalidUpload(e.body_text()))?;

    let mut avatar = None;
    while let Some(field) = multipart.next_field().await.map_err(invalid_upload)? {
        if field.name() == Some("avatar") {
            avatar = Some(UploadedFile::read(field).await?);
        }
    }
    let avatar = avatar
        .ok_or_else(|| StorageError::InvalidUpload("avatar field is required".to_string()))?;

    let reference = state
        .storage
        .store(
            current.user.id,
            &avatar.file_name,
            avatar.content_type.as_deref(),
            &avatar.bytes,
        )
        .await?;
    let attached = state.users.attach_avatar(current.user.id, &reference).await;
    discard_on_error(&state, &reference, attached).await?;

    Ok(success(
        "Avatar successfully uploaded",
        UploadResult { is_uploaded: true },
    ))
}

/// The current user's profile with the presented token
#[utoipa::path(
    get,
    path = "/api/v1/users/fetch",
    tag = "users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Current user", body = ApiResponse<UserFormatter>),
        (status = 401, description = "Not authenticated", body = ApiResponse<ErrorDetail>)
    )
)]
pub async fn fetch_user_handler(current: CurrentUser) -> ApiResult<UserFormatter> {
    Ok(success(
        "Successfully fetched user data",
        format_user(&current.user, &current.token),
    ))
}

/// List campaigns, optionally for one owner
#[utoipa::path(
    get,
    path = "/api/v1/campaigns",
    tag = "campaigns",
    params(ListCampaignsParams),
    responses(
        (status = 200, description = "Campaigns", body = ApiResponse<Vec<CampaignFormatter>>),
        (status = 422, description = "Invalid query", body = ApiResponse<ErrorDetail>)
    )
)]
pub async fn list_campaigns_handler(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ListCampaignsParams>, QueryRejection>,
) -> ApiResult<Vec<CampaignFormatter>> {
    let Query(params) = params.map_err(|e| ValidationError::InvalidFormat(e.body_text()))?;
    let campaigns = state.campaigns.list_campaigns(params.user_id).await?;
    Ok(success("List of campaigns", format_campaigns(&campaigns)))
}

/// Campaign detail with gallery and owner
#[utoipa::path(
    get,
    path = "/api/v1/campaigns/{id}",
    tag = "campaigns",
    params(("id" = i64, Path, description = "Campaign ID")),
    responses(
        (status = 200, description = "Campaign detail", body = ApiResponse<CampaignDetailFormatter>),
        (status = 404, description = "Campaign not found", body = ApiResponse<ErrorDetail>)
    )
)]
pub async fn get_campaign_handler(
    State(state): State<Arc<AppState>>,
    id: Result<Path<CampaignId>, PathRejection>,
) -> ApiResult<CampaignDetailFormatter> {
    let id = path_id(id)?;
    let campaign = state.campaigns.get_campaign_detail(id).await?;
    Ok(success("Campaign detail", format_campaign_detail(&campaign)))
}

/// Create a campaign owned by the current user
#[utoipa::path(
    post,
    path = "/api/v1/campaigns",
    tag = "campaigns",
    security(("bearer" = [])),
    request_body = CampaignInput,
    responses(
        (status = 200, description = "Campaign created", body = ApiResponse<CampaignFormatter>),
        (status = 401, description = "Not authenticated", body = ApiResponse<ErrorDetail>),
        (status = 422, description = "Validation error", body = ApiResponse<ErrorDetail>)
    )
)]
pub async fn create_campaign_handler(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    ValidatedJson(input): ValidatedJson<CampaignInput>,
) -> ApiResult<CampaignFormatter> {
    let campaign = state.campaigns.create_campaign(&input, &current.user).await?;
    Ok(success("Successfully created campaign", format_campaign(&campaign)))
}

/// Update a campaign the current user owns
#[utoipa::path(
    put,
    path = "/api/v1/campaigns/{id}",
    tag = "campaigns",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Campaign ID")),
    request_body = CampaignInput,
    responses(
        (status = 200, description = "Campaign updated", body = ApiResponse<CampaignFormatter>),
        (status = 401, description = "Not authenticated", body = ApiResponse<ErrorDetail>),
        (status = 403, description = "Not the owner", body = ApiResponse<ErrorDetail>),
        (status = 404, description = "Campaign not found", body = ApiResponse<ErrorDetail>),
        (status = 422, description = "Validation error", body = ApiResponse<ErrorDetail>)
    )
)]
pub async fn update_campaign_handler(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    id: Result<Path<CampaignId>, PathRejection>,
    ValidatedJson(input): ValidatedJson<CampaignInput>,
) -> ApiResult<CampaignFormatter> {
    let id = path_id(id)?;
    let campaign = state
        .campaigns
        .update_campaign(id, &input, &current.user)
        .await?;
    Ok(success("Successfully updated campaign", format_campaign(&campaign)))
}

/// Upload a campaign image (multipart fields `campaign_id`, `is_primary`, `file`)
#[utoipa::path(
    post,
    path = "/api/v1/campaign-images",
    tag = "campaigns",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Image stored", body = ApiResponse<UploadResult>),
        (status = 400, description = "Missing or unsupported file", body = ApiResponse<ErrorDetail>),
        (status = 401, description = "Not authenticated", body = ApiResponse<ErrorDetail>),
        (status = 403, description = "Not the owner", body = ApiResponse<ErrorDetail>),
        (status = 404, description = "Campaign not found", body = ApiResponse<ErrorDetail>)
    )
)]
pub async fn upload_campaign_image_handler(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<UploadResult> {
    let mut multipart = multipart.map_err(|e| StorageError::InvalidUpload(e.body_text()))?;

    let mut campaign_id = None;
    let mut is_primary = false;
    let mut file = None;
    while let Some(field) = multipart.next_field().await.map_err(invalid_upload)? {
        match field.name() {
            Some("campaign_id") => {
                let raw = field.text().await.map_err(invalid_upload)?;
                let id = raw.trim().parse::<CampaignId>().map_err(|_| {
                    ValidationError::InvalidField {
                        field: "campaign_id".to_string(),
                        message: "must be an integer".to_string(),
                    }
                })?;
                campaign_id = Some(id);
            }
            Some("is_primary") => {
                let raw = field.text().await.map_err(invalid_upload)?;
                is_primary = parse_flag(&raw)?;
            }
            Some("file") => file = Some(UploadedFile::read(field).await?),
            _ => {}
        }
    }

    let campaign_id =
        campaign_id.ok_or_else(|| ValidationError::MissingField("campaign_id".to_string()))?;
    let file =
        file.ok_or_else(|| StorageError::InvalidUpload("file field is required".to_string()))?;

    // Nothing reaches storage unless the caller owns the campaign.
    state
        .campaigns
        .owned_campaign(campaign_id, &current.user)
        .await?;

    let reference = state
        .storage
        .store(
            current.user.id,
            &file.file_name,
            file.content_type.as_deref(),
            &file.bytes,
        )
        .await?;
    let recorded = state
        .campaigns
        .set_campaign_image(campaign_id, &reference, &current.user, is_primary)
        .await;
    discard_on_error(&state, &reference, recorded).await?;

    Ok(success(
        "Campaign image successfully uploaded",
        UploadResult { is_uploaded: true },
    ))
}

/// Pledges to a campaign, visible to its owner only
#[utoipa::path(
    get,
    path = "/api/v1/campaigns/{id}/transactions",
    tag = "transactions",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Campaign ID")),
    responses(
        (status = 200, description = "Pledges, newest first", body = ApiResponse<Vec<CampaignTransactionFormatter>>),
        (status = 401, description = "Not authenticated", body = ApiResponse<ErrorDetail>),
        (status = 403, description = "Not the owner", body = ApiResponse<ErrorDetail>),
        (status = 404, description = "Campaign not found", body = ApiResponse<ErrorDetail>)
    )
)]
pub async fn list_campaign_transactions_handler(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    id: Result<Path<CampaignId>, PathRejection>,
) -> ApiResult<Vec<CampaignTransactionFormatter>> {
    let id = path_id(id)?;
    let transactions = state
        .transactions
        .list_by_campaign(id, &current.user)
        .await?;
    Ok(success(
        "List of campaign transactions",
        format_campaign_transactions(&transactions),
    ))
}

/// The current user's own pledges
#[utoipa::path(
    get,
    path = "/api/v1/transactions",
    tag = "transactions",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Pledges, newest first", body = ApiResponse<Vec<UserTransactionFormatter>>),
        (status = 401, description = "Not authenticated", body = ApiResponse<ErrorDetail>)
    )
)]
pub async fn list_user_transactions_handler(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
) -> ApiResult<Vec<UserTransactionFormatter>> {
    let transactions = state.transactions.list_by_user(current.user.id).await?;
    Ok(success(
        "List of user transactions",
        format_user_transactions(&transactions),
    ))
}

/// Detailed health check
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Health status", body = HealthResponse)
    )
)]
pub async fn health_check_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(state.health_check().await)
}

/// Kubernetes liveness check
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "health",
    responses(
        (status = 200, description = "Application is alive")
    )
)]
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// Kubernetes readiness check
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "health",
    responses(
        (status = 200, description = "Application is ready to serve traffic"),
        (status = 503, description = "Application is not ready")
    )
)]
pub async fn readiness_handler(State(state): State<Arc<AppState>>) -> StatusCode {
    match state.health_check().await.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Prometheus scrape output
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// The generated OpenAPI document
pub async fn openapi_handler() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// A file part of a multipart upload, fully buffered.
struct UploadedFile {
    file_name: String,
    content_type: Option<String>,
    bytes: Bytes,
}

impl UploadedFile {
    async fn read(field: Field<'_>) -> Result<Self, AppError> {
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(invalid_upload)?;
        if bytes.is_empty() {
            return Err(StorageError::InvalidUpload("uploaded file is empty".to_string()).into());
        }
        Ok(Self {
            file_name,
            content_type,
            bytes,
        })
    }
}

/// Deletes a just-stored upload when recording it failed, so no blob is left
/// without a row pointing at it.
async fn discard_on_error<T>(
    state: &AppState,
    reference: &str,
    result: Result<T, AppError>,
) -> Result<T, AppError> {
    if result.is_err() {
        if let Err(e) = state.storage.remove(reference).await {
            warn!(reference, error = %e, "Failed to remove orphaned upload");
        }
    }
    result
}

fn invalid_upload(err: MultipartError) -> AppError {
    StorageError::InvalidUpload(err.body_text()).into()
}

fn path_id(id: Result<Path<CampaignId>, PathRejection>) -> Result<CampaignId, AppError> {
    id.map(|Path(id)| id)
        .map_err(|e| ValidationError::InvalidFormat(e.body_text()).into())
}

fn parse_flag(raw: &str) -> Result<bool, ValidationError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" | "" => Ok(false),
        _ => Err(ValidationError::InvalidField {
            field: "is_primary".to_string(),
            message: "must be true or false".to_string(),
        }),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            AppError::Database(db_err) if db_err.is_unavailable() => {
                (StatusCode::SERVICE_UNAVAILABLE, "storage_unavailable")
            }
            AppError::Database(DatabaseError::NotFound(_)) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Database(DatabaseError::Duplicate(_)) => (StatusCode::CONFLICT, "duplicate"),
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            AppError::Token(token_err) => match token_err {
                TokenError::Expired => (StatusCode::UNAUTHORIZED, "token_expired"),
                TokenError::InvalidCredential(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            },
            AppError::Storage(storage_err) => match storage_err {
                StorageError::InvalidUpload(_) => (StatusCode::BAD_REQUEST, "invalid_upload"),
                StorageError::WriteFailed(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "upload_failed")
                }
            },
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "configuration_error"),
            AppError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            AppError::DuplicateEmail => (StatusCode::CONFLICT, "duplicate_email"),
            AppError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "invalid_credentials"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        // Server-side detail stays in the log.
        let message = if status.is_server_error() {
            error!(error_type = %error_type, error = %self, "Server error");
            match status {
                StatusCode::SERVICE_UNAVAILABLE => "Service temporarily unavailable".to_string(),
                _ => "Internal server error".to_string(),
            }
        } else {
            info!(error_type = %error_type, error = %self, "Request failed");
            self.to_string()
        };

        failure(status, error_type, message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_error_status_mapping() {
        let cases = [
            (AppError::NotFound("Campaign 1".into()), StatusCode::NOT_FOUND),
            (AppError::Forbidden("no".into()), StatusCode::FORBIDDEN),
            (AppError::DuplicateEmail, StatusCode::CONFLICT),
            (AppError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (AppError::Token(TokenError::Expired), StatusCode::UNAUTHORIZED),
            (
                AppError::Validation(ValidationError::MissingField("name".into())),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                AppError::Database(DatabaseError::Connection("down".into())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                AppError::Storage(StorageError::InvalidUpload("bad".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::Storage(StorageError::WriteFailed("disk".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[tokio::test]
    async fn test_error_body_is_enveloped() {
        let response = AppError::Forbidden("you do not own this campaign".into()).into_response();
        let json = body_json(response).await;
        assert_eq!(json["meta"]["code"], 403);
        assert_eq!(json["meta"]["status"], "error");
        assert_eq!(json["data"]["type"], "forbidden");
        assert_eq!(json["data"]["message"], "Forbidden: you do not own this campaign");
    }

    #[tokio::test]
    async fn test_server_errors_hide_detail() {
        let response =
            AppError::Database(DatabaseError::Query("syntax error at SELECT".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["data"]["message"], "Internal server error");
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true").unwrap());
        assert!(parse_flag(" 1 ").unwrap());
        assert!(!parse_flag("false").unwrap());
        assert!(!parse_flag("").unwrap());
        assert!(parse_flag("yes").is_err());
    }
}
