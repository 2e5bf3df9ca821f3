//! Infrastructure: key-value store access and rate limiting.

pub mod kv;
pub mod rate_limit;

pub use kv::Kv;
pub use rate_limit::RateLimiter;
