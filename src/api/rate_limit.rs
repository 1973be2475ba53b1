//! Per-user rate limiting for chat requests

use std::num::NonZeroU32;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};

use super::{ApiState, auth::AuthUser, error::ApiError};

/// Rate limiter keyed by user id
pub type SharedLimiter = Arc<RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>>;

/// Create a keyed limiter with the given requests-per-minute burst capacity
pub fn create_limiter(requests_per_minute: u32) -> SharedLimiter {
    let rpm = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
    let quota = Quota::per_minute(rpm);
    Arc::new(RateLimiter::keyed(quota))
}

/// Rate limiting middleware; runs after authentication and is a no-op without a limiter
pub async fn limit_per_user(
    State(state): State<Arc<ApiState>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let (Some(limiter), Some(user)) = (&state.chat_limiter, req.extensions().get::<AuthUser>()) {
        if limiter.check_key(&user.id).is_err() {
            tracing::warn!(user_id = %user.id, "rate limit exceeded");
            return Err(ApiError::new(
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests, slow down",
            ));
        }
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limiter_is_per_key() {
        let limiter = create_limiter(2);
        let alice = "alice".to_string();
        let bob = "bob".to_string();

        assert!(limiter.check_key(&alice).is_ok());
        assert!(limiter.check_key(&alice).is_ok());
        assert!(limiter.check_key(&alice).is_err());
        assert!(limiter.check_key(&bob).is_ok());
    }

    #[test]
    fn test_zero_rpm_clamped() {
        let limiter = create_limiter(0);
        assert!(limiter.check_key(&"u".to_string()).is_ok());
    }
}
