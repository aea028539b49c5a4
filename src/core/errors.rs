use spin_sdk::http::Response;
use std::fmt;

#[derive(Debug)]
pub enum ApiError {
    InvalidInput(String),
    Conflict(String),
    Unauthorized(String),
    Forbidden,
    NotFound(String),
    Internal(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::InvalidInput(msg) => write!(f, "Invalid Input: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden => write!(f, "Forbidden"),
            ApiError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            ApiError::Internal(msg) => write!(f, "Internal Error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(format!("{:#}", err))
    }
}

fn error_response(status: u16, message: &str) -> Response {
    let body = serde_json::json!({ "success": false, "message": message });
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&body).unwrap_or_default())
        .build()
}

impl From<ApiError> for Response {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::InvalidInput(msg) => error_response(400, &msg),
            ApiError::Conflict(msg) => error_response(400, &msg),
            ApiError::Unauthorized(msg) => error_response(401, &msg),
            ApiError::Forbidden => error_response(403, "You are not authorized to modify this blog"),
            ApiError::NotFound(msg) => error_response(404, &msg),
            ApiError::Internal(detail) => {
                // Detail stays on the server side; clients get a fixed message.
                eprintln!("internal error: {}", detail);
                error_response(500, "Internal server error")
            }
        }
    }
}
