//! Caller credential lookup for identity-scoped tools.
//!
//! Tools that act on a user's behalf (calendar, mail, sheets) read the
//! `userId` injected by the dispatcher and resolve an access credential
//! through a [`CredentialProvider`]. Token persistence and the OAuth refresh
//! exchange live outside this crate behind [`TokenStore`] and
//! [`TokenRefresher`].

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use alira_primitives::UserId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::registry::{ToolError, ToolResult};

/// Parameter key the dispatcher injects into identity-scoped tool arguments.
pub const USER_ID_PARAM: &str = "userId";

/// Access credential resolved for a user and provider.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

impl Credential {
    /// Creates a credential from an access token.
    #[must_use]
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: None,
        }
    }

    /// Attaches a refresh token.
    #[must_use]
    pub fn with_refresh_token(mut self, token: impl Into<String>) -> Self {
        self.refresh_token = Some(token.into());
        self
    }

    /// Sets the expiry instant.
    #[must_use]
    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Returns the bearer token used to authenticate outward.
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Returns the refresh token, if any.
    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    /// Returns the expiry instant, if known.
    #[must_use]
    pub const fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Returns `true` if the credential expired at or before `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

/// Resolves a currently valid credential for `(user, provider)`.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Returns a valid credential or `None` when the user has not linked the
    /// provider (or the stored credential could not be refreshed).
    ///
    /// # Errors
    ///
    /// Returns an error when the backing store is unavailable.
    async fn credential(&self, user: &UserId, provider: &str) -> ToolResult<Option<Credential>>;
}

/// Persisted token records keyed by user and provider.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Returns the most recently stored credential.
    ///
    /// # Errors
    ///
    /// Returns an error when the store cannot be queried.
    async fn latest(&self, user: &UserId, provider: &str) -> ToolResult<Option<Credential>>;

    /// Replaces the stored credential after a refresh.
    ///
    /// # Errors
    ///
    /// Returns an error when the store cannot be written.
    async fn update(&self, user: &UserId, provider: &str, credential: &Credential)
    -> ToolResult<()>;
}

/// Exchanges a refresh token for a new access credential.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Performs the refresh exchange.
    ///
    /// # Errors
    ///
    /// Returns an error when the identity provider rejects the exchange.
    async fn refresh(&self, provider: &str, refresh_token: &str) -> ToolResult<Credential>;
}

/// Provider that transparently refreshes expired stored credentials.
#[derive(Debug)]
pub struct RefreshingCredentials<S, R> {
    store: S,
    refresher: R,
}

impl<S, R> RefreshingCredentials<S, R>
where
    S: TokenStore,
    R: TokenRefresher,
{
    /// Composes a token store with a refresher.
    #[must_use]
    pub const fn new(store: S, refresher: R) -> Self {
        Self { store, refresher }
    }
}

#[async_trait]
impl<S, R> CredentialProvider for RefreshingCredentials<S, R>
where
    S: TokenStore,
    R: TokenRefresher,
{
    async fn credential(&self, user: &UserId, provider: &str) -> ToolResult<Option<Credential>> {
        let Some(stored) = self.store.latest(user, provider).await? else {
            debug!(user = %user, provider, "no stored credential");
            return Ok(None);
        };

        if !stored.is_expired_at(Utc::now()) {
            return Ok(Some(stored));
        }

        let Some(refresh_token) = stored.refresh_token() else {
            warn!(user = %user, provider, "credential expired without refresh token");
            return Ok(None);
        };

        match self.refresher.refresh(provider, refresh_token).await {
            Ok(mut refreshed) => {
                // Providers usually omit the refresh token on refresh.
                if refreshed.refresh_token.is_none() {
                    refreshed.refresh_token.clone_from(&stored.refresh_token);
                }
                self.store.update(user, provider, &refreshed).await?;
                debug!(user = %user, provider, "credential refreshed");
                Ok(Some(refreshed))
            }
            Err(err) => {
                warn!(user = %user, provider, error = %err, "credential refresh failed");
                Ok(None)
            }
        }
    }
}

/// In-memory credential table.
#[derive(Default)]
pub struct StaticCredentials {
    entries: RwLock<HashMap<(UserId, String), Credential>>,
}

impl fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.entries.read().map_or(0, |entries| entries.len());
        f.debug_struct("StaticCredentials")
            .field("entries", &count)
            .finish()
    }
}

impl StaticCredentials {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a credential for `(user, provider)`.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn insert(&self, user: UserId, provider: impl Into<String>, credential: Credential) {
        self.entries
            .write()
            .expect("credential table poisoned")
            .insert((user, provider.into()), credential);
    }
}

#[async_trait]
impl TokenStore for StaticCredentials {
    async fn latest(&self, user: &UserId, provider: &str) -> ToolResult<Option<Credential>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| ToolError::execution("credential table poisoned"))?;
        Ok(entries.get(&(user.clone(), provider.to_owned())).cloned())
    }

    async fn update(
        &self,
        user: &UserId,
        provider: &str,
        credential: &Credential,
    ) -> ToolResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| ToolError::execution("credential table poisoned"))?;
        entries.insert((user.clone(), provider.to_owned()), credential.clone());
        Ok(())
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn credential(&self, user: &UserId, provider: &str) -> ToolResult<Option<Credential>> {
        let credential = self.latest(user, provider).await?;
        Ok(credential.filter(|credential| !credential.is_expired_at(Utc::now())))
    }
}

/// Reads the caller identity the dispatcher injected into tool parameters.
///
/// # Errors
///
/// Returns [`ToolError::Execution`] when no `userId` was injected or it is
/// blank.
pub fn injected_user_id(parameters: &Value) -> ToolResult<UserId> {
    let raw = parameters
        .get(USER_ID_PARAM)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::execution("no valid tokens: caller identity not provided"))?;
    UserId::new(raw).map_err(|err| ToolError::execution(err.to_string()))
}
