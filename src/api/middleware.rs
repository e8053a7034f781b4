//! Request extractors: authentication and validated JSON bodies.

use std::sync::Arc;

use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Request, rejection::JsonRejection},
    http::{header, request::Parts},
};
use serde::de::DeserializeOwned;
use tracing::warn;
use validator::Validate;

use crate::app::AppState;
use crate::domain::{AppError, TokenError, User, ValidationError};

/// The authenticated caller, resolved from `Authorization: Bearer <token>`.
///
/// Handlers that take this extractor reject unauthenticated requests with
/// 401 before their body runs.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    /// The token the request presented.
    pub token: String,
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(parts) else {
            warn!("Rejected request without a bearer token");
            return Err(TokenError::InvalidCredential("missing bearer token".to_string()).into());
        };

        let user_id = state.tokens.validate(token)?;

        // A valid token for a deleted account is still unauthenticated.
        let user = state.users.get_by_id(user_id).await.map_err(|e| match e {
            AppError::NotFound(_) => {
                warn!(user_id, "Token subject no longer exists");
                AppError::Token(TokenError::InvalidCredential(
                    "unknown token subject".to_string(),
                ))
            }
            other => other,
        })?;

        Ok(Self {
            user,
            token: token.to_string(),
        })
    }
}

/// JSON body that passed its `validator` rules.
///
/// Malformed JSON and rule violations both surface as
/// `AppError::Validation`, so services only ever see checked input.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ValidationError::InvalidFormat(rejection.body_text()))?;
        value.validate()?;
        Ok(Self(value))
    }
}
