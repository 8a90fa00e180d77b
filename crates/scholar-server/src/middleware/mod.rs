pub mod auth;
pub mod rate_limit;

pub use auth::{AuthConfig, AuthContext, authenticate, is_authenticated};
pub use rate_limit::{UserRateLimiter, rate_limit_by_user};
