//! Auth service for OAuth sign-in and session management.
//!
//! Sign-in is delegated to an external OAuth provider:
//! 1. `authorization_url` stores a CSRF state + PKCE verifier and returns the
//!    provider's consent URL
//! 2. `complete_sign_in` exchanges the callback code, fetches the provider's
//!    userinfo, registers the user on first sign-in and opens a session
//!
//! Registration is one-way: a user document keyed by email is created the
//! first time someone signs in and is never rewritten by later sign-ins.

use std::time::Duration;

use chrono::Utc;
use oauth2::{
    basic::BasicClient, reqwest::async_http_client, AuthUrl, AuthorizationCode, ClientId,
    ClientSecret, CsrfToken, PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope,
    TokenResponse, TokenUrl,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{AuthConfig, AuthProvider, MAX_SESSION_MAX_AGE_SECONDS};
use crate::db::{self, collections, DbPool, DocumentStore, OAuthState, Session};
use crate::error::{Error, Result};
use crate::models::{to_document, UserProfile};

/// OAuth state duration
const STATE_DURATION_MINUTES: i64 = 10;

/// Service for authentication and sessions.
#[derive(Clone)]
pub struct AuthService {
    db: DbPool,
    store: DocumentStore,
    config: AuthConfig,
    public_url: String,
    session_max_age: chrono::Duration,
    http_client: Client,
}

/// Public description of a sign-in provider.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderInfo {
    pub id: String,
    pub name: String,
}

/// Authorization URL result
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationUrl {
    pub url: String,
    pub state: String,
    pub provider: String,
}

/// Userinfo returned by the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderUser {
    pub sub: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub picture: Option<String>,
}

/// Outcome of a completed sign-in.
#[derive(Debug, Clone)]
pub struct SignIn {
    pub user: UserProfile,
    pub session: Session,
    /// True when this sign-in registered the user.
    pub registered: bool,
}

impl AuthService {
    /// Create a new auth service.
    pub fn new(
        db: DbPool,
        store: DocumentStore,
        config: AuthConfig,
        public_url: &str,
        session_max_age_seconds: u64,
    ) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("research-hub/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            db,
            store,
            config,
            public_url: public_url.trim_end_matches('/').to_string(),
            session_max_age: chrono::Duration::seconds(
                session_max_age_seconds.min(MAX_SESSION_MAX_AGE_SECONDS) as i64,
            ),
            http_client,
        })
    }

    pub fn public_url(&self) -> &str {
        &self.public_url
    }

    pub fn session_max_age(&self) -> chrono::Duration {
        self.session_max_age
    }

    /// Callback URL registered with the provider.
    pub fn redirect_uri(&self, provider_id: &str) -> String {
        format!("{}/auth/callback/{}", self.public_url, provider_id)
    }

    /// Get available auth providers.
    pub fn providers(&self) -> Vec<ProviderInfo> {
        let mut providers: Vec<ProviderInfo> = self
            .config
            .providers
            .values()
            .filter(|p| p.enabled)
            .map(|p| ProviderInfo {
                id: p.id.clone(),
                name: p.display_name.clone(),
            })
            .collect();
        providers.sort_by(|a, b| a.id.cmp(&b.id));
        providers
    }

    fn get_provider(&self, provider_id: &str) -> Result<&AuthProvider> {
        let provider = self
            .config
            .providers
            .get(provider_id)
            .ok_or_else(|| Error::NotFound(format!("Auth provider {}", provider_id)))?;

        if !provider.enabled {
            return Err(Error::Forbidden);
        }

        Ok(provider)
    }

    /// Generate authorization URL for a provider.
    pub async fn authorization_url(&self, provider_id: &str) -> Result<AuthorizationUrl> {
        let provider = self.get_provider(provider_id)?;
        let redirect_uri = self.redirect_uri(provider_id);

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let client = build_oauth_client(provider, &redirect_uri)?;

        let mut auth_request = client
            .authorize_url(CsrfToken::new_random)
            .set_pkce_challenge(pkce_challenge);

        for scope in &provider.scopes {
            auth_request = auth_request.add_scope(Scope::new(scope.clone()));
        }

        let (auth_url, csrf_token) = auth_request.url();

        let now = Utc::now();
        let oauth_state = OAuthState {
            state: csrf_token.secret().clone(),
            provider: provider_id.to_string(),
            pkce_verifier: pkce_verifier.secret().clone(),
            redirect_uri,
            expires_at: now + chrono::Duration::minutes(STATE_DURATION_MINUTES),
            created_at: now,
        };
        db::store_oauth_state(&self.db, &oauth_state).await?;

        debug!(provider = provider_id, "Authorization URL issued");

        Ok(AuthorizationUrl {
            url: auth_url.to_string(),
            state: oauth_state.state,
            provider: provider_id.to_string(),
        })
    }

    /// Exchange the callback code, register the user if needed and open a session.
    pub async fn complete_sign_in(
        &self,
        provider_id: &str,
        code: &str,
        state: &str,
    ) -> Result<SignIn> {
        let oauth_state = db::take_oauth_state(&self.db, state)
            .await?
            .ok_or(Error::InvalidState)?;

        if oauth_state.is_expired() || oauth_state.provider != provider_id {
            warn!(provider = provider_id, "Rejected sign-in callback with stale or mismatched state");
            return Err(Error::InvalidState);
        }

        let provider = self.get_provider(provider_id)?;
        let client = build_oauth_client(provider, &oauth_state.redirect_uri)?;

        let token_response = client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_pkce_verifier(PkceCodeVerifier::new(oauth_state.pkce_verifier))
            .request_async(async_http_client)
            .await
            .map_err(|e| Error::IdentityProvider(format!("Code exchange failed: {}", e)))?;

        let user_info = self
            .fetch_user_info(provider, token_response.access_token().secret())
            .await?;

        let (user, registered) = self.register_user(&user_info).await?;
        let session = self.create_session(&user.email).await?;

        info!(email = %user.email, provider = provider_id, registered, "User signed in");

        Ok(SignIn {
            user,
            session,
            registered,
        })
    }

    /// Fetch the signed-in user's profile from the provider.
    async fn fetch_user_info(
        &self,
        provider: &AuthProvider,
        access_token: &str,
    ) -> Result<ProviderUser> {
        let response = self
            .http_client
            .get(&provider.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::IdentityProvider(format!(
                "Userinfo request returned {}",
                response.status()
            )));
        }

        Ok(response.json().await?)
    }

    /// Create the user document on first sign-in.
    ///
    /// Returns the stored profile and whether it was created by this call.
    pub async fn register_user(&self, info: &ProviderUser) -> Result<(UserProfile, bool)> {
        let email = info
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or(Error::Unauthenticated)?
            .to_string();

        let profile = UserProfile::new_member(
            info.sub.clone(),
            email.clone(),
            info.name.clone(),
            info.picture.clone(),
        );

        let created = self
            .store
            .create_if_absent(collections::USERS, &email, to_document(&profile)?)
            .await?;

        if created {
            info!(email = %email, "New user registered");
            return Ok((profile, true));
        }

        debug!(email = %email, "User already registered");

        let existing = self
            .store
            .get(collections::USERS, &email)
            .await?
            .ok_or_else(|| Error::NotFound("User".into()))?;

        Ok((existing.decode()?, false))
    }

    /// Open a session for a registered user.
    pub async fn create_session(&self, email: &str) -> Result<Session> {
        let id = nanoid::nanoid!(32);
        let expires_at = Utc::now()
            .checked_add_signed(self.session_max_age)
            .ok_or_else(|| Error::Internal("Session expiry out of range".into()))?;
        db::create_session(&self.db, &id, email, expires_at).await
    }

    /// Resolve a session id to the signed-in user's profile.
    pub async fn validate_session(&self, session_id: &str) -> Result<UserProfile> {
        let session = db::get_session(&self.db, session_id)
            .await?
            .ok_or(Error::Unauthenticated)?;

        if session.is_expired() {
            db::delete_session(&self.db, session_id).await?;
            return Err(Error::Unauthenticated);
        }

        let user = self
            .store
            .get(collections::USERS, &session.user_email)
            .await?
            .ok_or(Error::Unauthenticated)?;

        user.decode()
    }

    /// End a session.
    pub async fn logout(&self, session_id: &str) -> Result<()> {
        db::delete_session(&self.db, session_id).await
    }
}

/// Build OAuth client for a provider.
fn build_oauth_client(provider: &AuthProvider, redirect_uri: &str) -> Result<BasicClient> {
    let client = BasicClient::new(
        ClientId::new(provider.client_id.clone()),
        Some(ClientSecret::new(provider.client_secret.clone())),
        AuthUrl::new(provider.auth_url.clone())
            .map_err(|e| Error::Internal(format!("Invalid auth URL: {}", e)))?,
        Some(
            TokenUrl::new(provider.token_url.clone())
                .map_err(|e| Error::Internal(format!("Invalid token URL: {}", e)))?,
        ),
    )
    .set_redirect_uri(
        RedirectUrl::new(redirect_uri.to_string())
            .map_err(|e| Error::Internal(format!("Invalid redirect URL: {}", e)))?,
    );

    Ok(client)
}
