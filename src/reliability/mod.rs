//! Rate limiting and retry for calls to the cleaning service.

mod backoff;
mod rate_limiter;
mod retry;

pub use backoff::{Backoff, ExponentialBackoff, Sleeper, TokioSleeper};
pub use rate_limiter::{RateLimiter, RatePermit};
pub use retry::RetryingCaller;
