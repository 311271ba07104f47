pub mod rate_limit;
pub mod topic;

use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use rate_limit::{RateLimitDecision, RateLimiter, DEFAULT_WINDOW};

/// Admits one request for `user_id` on `endpoint` or returns a 429 error.
pub fn admit(
    limiter: &RateLimiter,
    user_id: Uuid,
    endpoint: &str,
    limit_per_hour: u32,
) -> Result<(), AppError> {
    match limiter.check(&user_id.to_string(), endpoint, limit_per_hour, DEFAULT_WINDOW) {
        RateLimitDecision::Allowed => Ok(()),
        RateLimitDecision::Denied { retry_after_secs } => {
            info!("Rate limited user {user_id} on {endpoint} (retry after {retry_after_secs}s)");
            Err(AppError::RateLimited {
                retry_after: retry_after_secs,
            })
        }
    }
}
