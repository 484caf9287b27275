// ============================
// toolroom-backend-lib/src/auth/mod.rs
// ============================
//! Authentication module.

pub mod device;
pub mod password;
pub mod rate_limit;
pub mod session;
pub mod token_generator;
mod service;
mod service_impl;

pub use device::DeviceInfo;
pub use password::{hash_password, verify_password, validate_password_strength, PasswordRequirements};
pub use rate_limit::AuthRateLimiter;
pub use session::{Session, SessionManager, SESSION_COOKIE, SESSION_TTL};
pub use service::AuthService;
pub use service_impl::DefaultAuth;
