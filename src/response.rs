/* src/response.rs */

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;

pub fn success<T: Serialize>(data: Option<T>) -> Response {
    (
        StatusCode::OK,
        Json(json!({ "status": "success", "data": data })),
    )
        .into_response()
}

pub fn error(code: StatusCode, message: impl Into<String>) -> Response {
    (
        code,
        Json(json!({ "status": "error", "message": message.into() })),
    )
        .into_response()
}
