//! Authentication Routes
//!
//! Handles the OAuth sign-in flow and the session cookie.
//!
//! Routes:
//! - GET /auth/providers - List available auth providers
//! - GET /auth/login/:provider - Redirect to provider login
//! - GET /auth/callback/:provider - Handle OAuth callback
//! - POST /auth/logout - End session
//! - GET /auth/me - Get the signed-in user's document

use axum::{
    extract::{Extension, Path, Query, State},
    http::HeaderMap,
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, SameSite, SignedCookieJar};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::db::collections;
use crate::middleware::{require_auth, session_id, AuthUser, SESSION_COOKIE_NAME};
use crate::{AppState, Error, Result};

/// Build authentication routes.
pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Public routes
        .route("/providers", get(list_providers))
        .route("/login/:provider", get(login_redirect))
        .route("/callback/:provider", get(oauth_callback))
        .route("/logout", post(logout))
        // Protected routes
        .route(
            "/me",
            get(get_current_user).layer(middleware::from_fn_with_state(state, require_auth)),
        )
}

/// OAuth callback query parameters.
#[derive(Debug, Deserialize)]
pub struct OAuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// List available auth providers.
///
/// GET /auth/providers
async fn list_providers(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "providers": state.auth.providers() }))
}

/// Redirect to OAuth provider login page.
///
/// GET /auth/login/:provider
async fn login_redirect(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> Result<Response> {
    let auth = state.auth.authorization_url(&provider).await?;
    Ok(Redirect::temporary(&auth.url).into_response())
}

/// Handle OAuth callback from provider.
///
/// GET /auth/callback/:provider?code=...&state=...
///
/// Registers the user on first sign-in, opens a session, sets the session
/// cookie and sends the browser back to the app.
async fn oauth_callback(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Path(provider): Path<String>,
    Query(query): Query<OAuthCallbackQuery>,
) -> Result<Response> {
    if let Some(error) = query.error {
        warn!(
            provider = %provider,
            error = %error,
            description = query.error_description.as_deref().unwrap_or(""),
            "Provider returned an error"
        );
        return Err(Error::Unauthenticated);
    }

    let code = query.code.ok_or(Error::MissingField("code"))?;
    let oauth_state = query.state.ok_or(Error::MissingField("state"))?;

    let sign_in = state
        .auth
        .complete_sign_in(&provider, &code, &oauth_state)
        .await?;

    let public_url = state.auth.public_url();
    let cookie = Cookie::build((SESSION_COOKIE_NAME, sign_in.session.id))
        .path("/")
        .http_only(true)
        .secure(public_url.starts_with("https"))
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(
            state.auth.session_max_age().num_seconds(),
        ))
        .build();

    let jar = jar.add(cookie);

    Ok((jar, Redirect::temporary(&format!("{}/", public_url))).into_response())
}

/// End the current session.
///
/// POST /auth/logout
///
/// Always clears the cookie, even when the session is already gone.
async fn logout(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    if let Some(id) = session_id(&jar, &headers) {
        state.auth.logout(&id).await?;
    }

    let cookie = Cookie::build((SESSION_COOKIE_NAME, ""))
        .path("/")
        .max_age(time::Duration::seconds(0))
        .build();

    let jar = jar.add(cookie);

    Ok((
        jar,
        Json(json!({
            "message": "Logged out successfully"
        })),
    ))
}

/// Get current authenticated user information.
///
/// GET /auth/me
async fn get_current_user(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>> {
    let doc = state
        .store
        .get(collections::USERS, &user.email)
        .await?
        .ok_or(Error::Unauthenticated)?;

    Ok(Json(doc.into_json()))
}
