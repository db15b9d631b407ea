//! 调用者身份提取
//!
//! 认证由前置网关完成，这里只读取其注入的请求头

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::application::{RequestContext, UserRole};
use crate::infrastructure::http::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

fn header_value<'a>(parts: &'a Parts, name: &str) -> Result<Option<&'a str>, ApiError> {
    match parts.headers.get(name) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .map(|v| Some(v.trim()))
            .map_err(|_| ApiError::BadRequest(format!("Header {} is not valid text", name))),
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header_value(parts, USER_ID_HEADER)?
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ApiError::BadRequest(format!("Header {} is required", USER_ID_HEADER)))?
            .to_string();

        let role = match header_value(parts, USER_ROLE_HEADER)? {
            None | Some("") => UserRole::Member,
            Some(raw) => UserRole::from_str(raw)
                .ok_or_else(|| ApiError::BadRequest(format!("Unknown user role: {}", raw)))?,
        };

        Ok(RequestContext::new(user_id, role))
    }
}
