//! The one response shape every `/api` route produces.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::Value;

/// Closed status vocabulary. Nothing outside this table leaves the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayStatus {
    Ok,
    BadRequest,
    Unauthorized,
    NotFound,
    MethodNotAllowed,
    Internal,
    Unavailable,
}

pub const GATEWAY_STATUS_TABLE: [GatewayStatus; 7] = [
    GatewayStatus::Ok,
    GatewayStatus::BadRequest,
    GatewayStatus::Unauthorized,
    GatewayStatus::NotFound,
    GatewayStatus::MethodNotAllowed,
    GatewayStatus::Internal,
    GatewayStatus::Unavailable,
];

impl GatewayStatus {
    pub fn http(self) -> StatusCode {
        match self {
            Self::Ok => StatusCode::OK,
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn code(self) -> u16 {
        self.http().as_u16()
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::BadRequest => "Bad Request",
            Self::Unauthorized => "Unauthorized",
            Self::NotFound => "Not Found",
            Self::MethodNotAllowed => "Method Not Allowed",
            Self::Internal => "Internal Server Error",
            Self::Unavailable => "Service Unavailable",
        }
    }
}

/// Body shape for every `/api` response: `id` repeats the HTTP status so
/// clients that only read bodies still see it.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub id: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

pub fn respond(status: GatewayStatus, message: Option<String>, data: Option<Value>) -> Response {
    let message = message
        .filter(|text| !text.trim().is_empty())
        .unwrap_or_else(|| status.message().to_string());
    let envelope = Envelope {
        id: status.code(),
        message,
        data,
    };
    (status.http(), Json(envelope)).into_response()
}

pub fn ok_data(data: Value) -> Response {
    respond(GatewayStatus::Ok, None, Some(data))
}

pub fn error(status: GatewayStatus) -> Response {
    respond(status, None, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn status_table_is_unique() {
        let codes: HashSet<u16> = GATEWAY_STATUS_TABLE.iter().map(|s| s.code()).collect();
        assert_eq!(codes.len(), GATEWAY_STATUS_TABLE.len());
        let messages: HashSet<&str> = GATEWAY_STATUS_TABLE.iter().map(|s| s.message()).collect();
        assert_eq!(messages.len(), GATEWAY_STATUS_TABLE.len());
    }

    #[test]
    fn id_always_matches_http_status() {
        for status in GATEWAY_STATUS_TABLE {
            assert_eq!(status.code(), status.http().as_u16());
        }
    }

    #[test]
    fn blank_message_overrides_fall_back_to_the_default() {
        let envelope = Envelope {
            id: GatewayStatus::NotFound.code(),
            message: GatewayStatus::NotFound.message().to_string(),
            data: None,
        };
        let rendered = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            rendered,
            serde_json::json!({"id": 404, "message": "Not Found"})
        );
    }

    #[test]
    fn data_is_omitted_when_absent() {
        let envelope = Envelope {
            id: 200,
            message: "OK".to_string(),
            data: None,
        };
        let rendered = serde_json::to_string(&envelope).unwrap();
        assert!(!rendered.contains("data"));
    }
}
