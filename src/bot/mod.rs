mod gateway;
mod rate_limiter;

pub use gateway::{Command, CommandError, CommandGateway};
pub use rate_limiter::{RateLimiter, RateLimiterConfig};
