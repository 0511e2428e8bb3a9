pub mod auth;
pub mod cors;
pub mod rate_limit;

pub use auth::{CredentialResolver, ResolvedCredential, API_KEY_HEADER};
pub use cors::{CorsDecision, OriginPattern, OriginPolicy};
pub use rate_limit::{
    ClientKey, Clock, FixedWindowLimiter, InMemoryRateLimitStore, ManualClock, RateLimitBucket,
    RateLimitDecision, RateLimitStore, SystemClock,
};
