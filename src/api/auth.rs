//! Bearer-token authentication middleware

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use super::{ApiState, error::ApiError};
use crate::db::Role;

/// The authenticated caller, inserted into request extensions
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
    pub role: Role,
}

impl AuthUser {
    /// Reject callers without the admin role
    ///
    /// # Errors
    ///
    /// Returns 403 if the caller is not an admin
    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            tracing::debug!(user_id = %self.id, "admin route denied");
            Err(ApiError::forbidden("Unauthorized: Admin access required"))
        }
    }
}

/// Extract the token from the Authorization header; the `Bearer ` prefix is optional
fn extract_token(req: &Request) -> Option<&str> {
    let value = req.headers().get("authorization")?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
    (!token.is_empty()).then_some(token)
}

/// Middleware resolving the caller through the identity provider and user directory
pub async fn require_user(
    State(state): State<Arc<ApiState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(token) = extract_token(&req) else {
        tracing::debug!("no token provided");
        return Err(ApiError::forbidden("Token is missing!"));
    };

    let user_id = state.identity.verify(token).await.map_err(|e| {
        tracing::warn!(error = %e, "invalid token");
        ApiError::forbidden("Invalid token")
    })?;

    let Some(user) = state.users.find(&user_id)? else {
        tracing::warn!(user_id = %user_id, "token subject not in user directory");
        return Err(ApiError::not_found("User not found in database!"));
    };

    req.extensions_mut().insert(AuthUser {
        id: user.id,
        role: user.role,
    });

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_extract_token() {
        let mut req = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(extract_token(&req), None);

        req.headers_mut()
            .insert("authorization", HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(extract_token(&req), Some("abc.def"));

        req.headers_mut()
            .insert("authorization", HeaderValue::from_static("abc.def"));
        assert_eq!(extract_token(&req), Some("abc.def"));

        req.headers_mut()
            .insert("authorization", HeaderValue::from_static("Bearer "));
        assert_eq!(extract_token(&req), None);
    }

    #[test]
    fn test_require_admin() {
        let admin = AuthUser {
            id: "a".to_string(),
            role: Role::Admin,
        };
        let user = AuthUser {
            id: "u".to_string(),
            role: Role::User,
        };

        assert!(admin.require_admin().is_ok());
        let err = user.require_admin().unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::FORBIDDEN);
    }
}
