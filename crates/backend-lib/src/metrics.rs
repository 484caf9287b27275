// ==============
// crates/backend-lib/src/metrics.rs

//! Central place for Prometheus metric keys
pub const SESSION_CREATED: &str = "session.created";
pub const SESSION_ACTIVE: &str = "session.active";
pub const SESSION_EXPIRED: &str = "session.expired";
pub const ACCOUNT_REGISTERED: &str = "account.registered";
pub const LOGIN_SUCCEEDED: &str = "login.succeeded";
pub const LOGIN_FAILED: &str = "login.failed";
pub const LOGIN_THROTTLED: &str = "login.throttled";
pub const PHOTO_NORMALIZED: &str = "photo.normalized";
pub const PHOTO_BYTES: &str = "photo.bytes";
pub const PHOTO_QUALITY: &str = "photo.quality";
pub const MAIL_SENT: &str = "mail.sent";
pub const MAIL_FAILED: &str = "mail.failed";
pub const TELEMETRY_RECORDED: &str = "telemetry.recorded";
pub const TELEMETRY_FAILED: &str = "telemetry.failed";
