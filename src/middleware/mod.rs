//! Middleware for Research Hub.
//!
//! - `session_auth` - session cookie / Bearer session validation for every
//!   mutating route

mod session_auth;

pub use session_auth::{
    cookie_key, require_auth, session_id, AuthUser, MIN_SESSION_SECRET_BYTES, SESSION_COOKIE_NAME,
};
