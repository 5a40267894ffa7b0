//! Success envelope shared by all JSON endpoints.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::{json, Value};

/// `{statusCode, message, data, success:true}` success body.
#[derive(Debug)]
pub struct ApiResponse {
    status: StatusCode,
    message: String,
    data: Value,
}

impl ApiResponse {
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>, data: Value) -> Self {
        Self {
            status,
            message: message.into(),
            data,
        }
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        let body = json!({
            "statusCode": self.status.as_u16(),
            "message": self.message,
            "data": self.data,
            "success": true,
        });
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_status() {
        let response =
            ApiResponse::new(StatusCode::CREATED, "Created", Value::Null).into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
    }
}
