mod input_validator;
mod rate_limiter;

pub use input_validator::InputValidator;
pub use rate_limiter::{RateLimitError, RateLimiter, RateLimits};
