// crates/backend-lib/src/middleware/mod.rs

//! Request middleware: the session gate and the request helpers it shares
//! with the login handler.

pub mod session_gate;

pub use session_gate::{client_ip, parse_cookies, require_session, session_token, CurrentAccount};
