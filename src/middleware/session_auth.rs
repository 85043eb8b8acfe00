//! Session-based authentication middleware.
//!
//! # Session Flow
//!
//! 1. User signs in through an OAuth provider
//! 2. Server creates a session and sets the `research_hub_session` cookie
//! 3. Subsequent requests carry the cookie (or `Authorization: Bearer <session id>`)
//!    and are validated here
//! 4. Session expires after `SESSION_MAX_AGE` or on logout
//!
//! Session ids are random (nanoid) and stored server-side, so a session can be
//! invalidated at any time by deleting its row. The cookie is signed with a key
//! derived from `SESSION_SECRET`; a cookie with a bad signature is ignored.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Key, SignedCookieJar};

use crate::{error::Error, models::UserProfile, AppState, Result};

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "research_hub_session";

/// Shortest `SESSION_SECRET` accepted for deriving the cookie key.
pub const MIN_SESSION_SECRET_BYTES: usize = 32;

/// Derive the cookie signing key from the session secret.
pub fn cookie_key(secret: &str) -> Result<Key> {
    if secret.len() < MIN_SESSION_SECRET_BYTES {
        return Err(Error::Internal(format!(
            "SESSION_SECRET must be at least {} bytes",
            MIN_SESSION_SECRET_BYTES
        )));
    }
    Ok(Key::derive_from(secret.as_bytes()))
}

/// Signed-in user injected into request extensions.
#[derive(Clone, Debug)]
pub struct AuthUser {
    /// Email, which is also the user's document key
    pub email: String,
    pub name: String,
    /// "admin" or "researcher"
    pub role: String,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == crate::models::ADMIN_ROLE
    }
}

impl From<UserProfile> for AuthUser {
    fn from(user: UserProfile) -> Self {
        AuthUser {
            email: user.email,
            name: user.username,
            role: user.role,
        }
    }
}

/// Session id from the cookie, falling back to a Bearer header.
pub fn session_id(jar: &SignedCookieJar, headers: &HeaderMap) -> Option<String> {
    if let Some(cookie) = jar.get(SESSION_COOKIE_NAME) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }

    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// Middleware that requires a valid session.
///
/// Injects `AuthUser` into request extensions.
///
/// # Errors
///
/// Returns 401 Unauthorized if:
/// - No session cookie or Bearer header present
/// - Session not found or expired
/// - The session's user document no longer exists
///
/// # Example
///
/// ```rust,ignore
/// use axum::{Router, middleware};
/// use research_hub::middleware::require_auth;
///
/// let app = Router::new()
///     .route("/tasks", post(create_task))
///     .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));
/// ```
pub async fn require_auth(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response> {
    let session_id = session_id(&jar, req.headers()).ok_or(Error::Unauthenticated)?;

    let user = state.auth.validate_session(&session_id).await?;

    req.extensions_mut().insert(AuthUser::from(user));

    Ok(next.run(req).await)
}
