//! Session and OAuth state queries.
//!
//! Sessions tie a random id (the cookie value) to a user document key.
//! OAuth states hold the CSRF token and PKCE verifier between the redirect
//! to the identity provider and its callback.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use super::DbPool;
use crate::Result;

/// Web session record.
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub id: String,
    pub user_email: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

/// Pending authorization request.
#[derive(Debug, Clone, FromRow)]
pub struct OAuthState {
    pub state: String,
    pub provider: String,
    pub pkce_verifier: String,
    pub redirect_uri: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl OAuthState {
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

// ============================================================================
// Session Queries
// ============================================================================

/// Create a new session for a user.
///
/// Expired sessions are pruned on every insert.
pub async fn create_session(
    pool: &DbPool,
    id: &str,
    user_email: &str,
    expires_at: DateTime<Utc>,
) -> Result<Session> {
    sqlx::query("DELETE FROM sessions WHERE expires_at < ?")
        .bind(Utc::now())
        .execute(pool)
        .await?;

    let session = sqlx::query_as::<_, Session>(
        r#"
        INSERT INTO sessions (id, user_email, expires_at, created_at)
        VALUES (?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(user_email)
    .bind(expires_at)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    Ok(session)
}

/// Get a session by ID.
pub async fn get_session(pool: &DbPool, id: &str) -> Result<Option<Session>> {
    let session = sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(session)
}

/// Delete a session.
pub async fn delete_session(pool: &DbPool, id: &str) -> Result<()> {
    sqlx::query("DELETE FROM sessions WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Remove expired sessions and OAuth states. Returns the number of rows removed.
pub async fn cleanup_expired(pool: &DbPool) -> Result<u64> {
    let now = Utc::now();

    let sessions = sqlx::query("DELETE FROM sessions WHERE expires_at < ?")
        .bind(now)
        .execute(pool)
        .await?;

    let states = sqlx::query("DELETE FROM oauth_states WHERE expires_at < ?")
        .bind(now)
        .execute(pool)
        .await?;

    Ok(sessions.rows_affected() + states.rows_affected())
}

// ============================================================================
// OAuth State Queries
// ============================================================================

/// Store a pending authorization request.
///
/// Expired requests are pruned on every insert, so abandoned sign-ins do
/// not accumulate.
pub async fn store_oauth_state(pool: &DbPool, state: &OAuthState) -> Result<()> {
    sqlx::query("DELETE FROM oauth_states WHERE expires_at < ?")
        .bind(Utc::now())
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO oauth_states (state, provider, pkce_verifier, redirect_uri, expires_at, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&state.state)
    .bind(&state.provider)
    .bind(&state.pkce_verifier)
    .bind(&state.redirect_uri)
    .bind(state.expires_at)
    .bind(state.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Remove and return a pending authorization request.
///
/// States are single-use, so the row is deleted even when it has expired.
pub async fn take_oauth_state(pool: &DbPool, state: &str) -> Result<Option<OAuthState>> {
    let row = sqlx::query_as::<_, OAuthState>(
        "DELETE FROM oauth_states WHERE state = ? RETURNING *",
    )
    .bind(state)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_pool, initialize_schema};
    use chrono::Duration;

    async fn pool() -> DbPool {
        let pool = init_pool(":memory:").await.unwrap();
        initialize_schema(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_session_roundtrip() {
        let pool = pool().await;
        let expires = Utc::now() + Duration::days(7);
        create_session(&pool, "sess-1", "ada@lab.org", expires)
            .await
            .unwrap();

        let session = get_session(&pool, "sess-1").await.unwrap().unwrap();
        assert_eq!(session.user_email, "ada@lab.org");
        assert!(!session.is_expired());

        delete_session(&pool, "sess-1").await.unwrap();
        assert!(get_session(&pool, "sess-1").await.unwrap().is_none());
    }

    fn pending_state(state: &str, expires_at: DateTime<Utc>) -> OAuthState {
        OAuthState {
            state: state.into(),
            provider: "google".into(),
            pkce_verifier: "verifier".into(),
            redirect_uri: "http://localhost:3000/auth/callback/google".into(),
            expires_at,
            created_at: Utc::now(),
        }
    }

    async fn count_rows(pool: &DbPool, table: &str) -> i64 {
        let (n,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(pool)
            .await
            .unwrap();
        n
    }

    #[tokio::test]
    async fn test_storing_state_prunes_expired_states() {
        let pool = pool().await;
        for i in 0..3 {
            store_oauth_state(
                &pool,
                &pending_state(&format!("abandoned-{}", i), Utc::now() - Duration::minutes(1)),
            )
            .await
            .unwrap();
        }

        store_oauth_state(&pool, &pending_state("fresh", Utc::now() + Duration::minutes(10)))
            .await
            .unwrap();

        assert_eq!(count_rows(&pool, "oauth_states").await, 1);
        assert!(take_oauth_state(&pool, "fresh").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_creating_session_prunes_expired_sessions() {
        let pool = pool().await;
        create_session(&pool, "old", "a@lab.org", Utc::now() - Duration::hours(1))
            .await
            .unwrap();

        create_session(&pool, "new", "a@lab.org", Utc::now() + Duration::hours(1))
            .await
            .unwrap();

        assert_eq!(count_rows(&pool, "sessions").await, 1);
        assert!(get_session(&pool, "old").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let pool = pool().await;
        create_session(&pool, "new", "a@lab.org", Utc::now() + Duration::hours(1))
            .await
            .unwrap();
        create_session(&pool, "old", "a@lab.org", Utc::now() - Duration::hours(1))
            .await
            .unwrap();

        assert_eq!(cleanup_expired(&pool).await.unwrap(), 1);
        assert!(get_session(&pool, "old").await.unwrap().is_none());
        assert!(get_session(&pool, "new").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_oauth_state_is_single_use() {
        let pool = pool().await;
        let state = pending_state("csrf", Utc::now() + Duration::minutes(10));
        store_oauth_state(&pool, &state).await.unwrap();

        let taken = take_oauth_state(&pool, "csrf").await.unwrap().unwrap();
        assert_eq!(taken.provider, "google");
        assert!(take_oauth_state(&pool, "csrf").await.unwrap().is_none());
    }
}
