//! Caller identity
//!
//! Token verification happens upstream; by the time a request reaches this
//! service the authenticated user id is in `X-User-Id`.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::Error;

/// Header carrying the authenticated user id
pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated owner of the request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: String,
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::Unauthorized("Unauthorized: missing user identity".into()))?;

        Ok(Self { id: id.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(header: Option<&str>) -> Result<AuthUser, Error> {
        let mut builder = Request::builder().uri("/invoices");
        if let Some(value) = header {
            builder = builder.header(USER_ID_HEADER, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        AuthUser::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_present_header() {
        assert_eq!(extract(Some(" user-1 ")).await.unwrap().id, "user-1");
    }

    #[tokio::test]
    async fn test_missing_or_blank_header() {
        assert!(matches!(extract(None).await, Err(Error::Unauthorized(_))));
        assert!(matches!(extract(Some("  ")).await, Err(Error::Unauthorized(_))));
    }
}
