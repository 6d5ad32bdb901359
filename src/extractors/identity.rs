//! Caller identity attached by the authentication layer.

use crate::error::AppError;
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};

/// Verified caller, stored in request extensions by the auth middleware.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub admin: bool,
}

/// Extractor requiring an authenticated caller. Rejects with 403 when none is attached.
#[derive(Clone, Debug)]
pub struct Identity(pub AuthUser);

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .filter(|u| !u.id.trim().is_empty())
            .cloned()
            .map(Identity)
            .ok_or_else(|| AppError::Forbidden("Missing valid user authentication".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[tokio::test]
    async fn missing_identity_is_forbidden() {
        let (mut parts, _) = Request::new(()).into_parts();
        let err = Identity::from_request_parts(&mut parts, &()).await.unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn attached_identity_is_extracted() {
        let (mut parts, _) = Request::new(()).into_parts();
        parts.extensions.insert(AuthUser { id: "u1".into(), admin: false });
        let Identity(user) = Identity::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(user.id, "u1");
    }
}
