//! The `{meta, data}` envelope wrapped around every API body.

use axum::{Json, http::StatusCode};
use serde::Serialize;
use utoipa::ToSchema;

/// Outcome of a request as reported in `meta.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Meta {
    pub message: String,
    pub code: u16,
    pub status: ResponseStatus,
}

/// Body of every response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub meta: Meta,
    pub data: T,
}

/// Payload of an error envelope.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ErrorDetail {
    pub r#type: String,
    pub message: String,
}

/// Payload for upload endpoints.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UploadResult {
    pub is_uploaded: bool,
}

/// Payload of the email availability check.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EmailAvailability {
    pub is_available: bool,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(message: impl Into<String>, code: StatusCode, status: ResponseStatus, data: T) -> Self {
        Self {
            meta: Meta {
                message: message.into(),
                code: code.as_u16(),
                status,
            },
            data,
        }
    }
}

/// A 200 response carrying `data`.
pub fn success<T: Serialize>(message: impl Into<String>, data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse::new(
        message,
        StatusCode::OK,
        ResponseStatus::Success,
        data,
    ))
}

/// An error envelope with the given status.
pub fn failure(
    code: StatusCode,
    error_type: &str,
    message: impl Into<String>,
) -> (StatusCode, Json<ApiResponse<ErrorDetail>>) {
    let message = message.into();
    let body = ApiResponse::new(
        message.clone(),
        code,
        ResponseStatus::Error,
        ErrorDetail {
            r#type: error_type.to_string(),
            message,
        },
    );
    (code, Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope_shape() {
        let Json(body) = success("List of campaigns", vec![1, 2]);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["meta"]["message"], "List of campaigns");
        assert_eq!(json["meta"]["code"], 200);
        assert_eq!(json["meta"]["status"], "success");
        assert_eq!(json["data"], serde_json::json!([1, 2]));
    }

    #[test]
    fn test_failure_envelope_shape() {
        let (status, Json(body)) = failure(StatusCode::FORBIDDEN, "forbidden", "not yours");
        assert_eq!(status, StatusCode::FORBIDDEN);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["meta"]["code"], 403);
        assert_eq!(json["meta"]["status"], "error");
        assert_eq!(json["data"]["type"], "forbidden");
        assert_eq!(json["data"]["message"], "not yours");
    }
}
