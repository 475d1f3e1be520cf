pub mod articles;
pub mod feeds;
pub mod fetch;
pub mod stats;
pub mod streams;
pub mod topics;

use axum::http::HeaderMap;
use uuid::Uuid;

use crate::error::ApiError;

/// Header set by the auth/session collaborator in front of this service.
/// The core itself never authenticates; a missing user is a caller bug.
pub const USER_HEADER: &str = "x-user-id";

pub fn user_id(headers: &HeaderMap) -> Result<Uuid, ApiError> {
    headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| ApiError::bad_request(format!("missing or invalid {USER_HEADER} header")))
}
