//! Access/refresh token storage and renewal.
//!
//! Tokens live in a [`TokenStore`] under three string keys so the same manager works over
//! a JSON file for the CLI and an in-memory map for tests. Refresh failures are fail-closed:
//! every stored credential is dropped and callers see "not authenticated".

use crate::oauth::OAuthManager;
use eyre::Context;
use jiff::{SignedDuration, Timestamp};
use oauth2::TokenResponse;
use oauth2::basic::BasicTokenResponse;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::instrument;

pub const ACCESS_TOKEN_KEY: &str = "youtube_access_token";
pub const REFRESH_TOKEN_KEY: &str = "youtube_refresh_token";
pub const EXPIRES_AT_KEY: &str = "youtube_token_expiry";

/// Lifetime assumed when the provider does not say how long a token lives.
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(55 * 60);

/// String key/value storage that survives between runs of the client.
pub trait TokenStore: Send + Sync + fmt::Debug {
    fn get(&self, key: &str) -> eyre::Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> eyre::Result<()>;
    fn remove(&self, key: &str) -> eyre::Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> eyre::Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>> {
        self.values
            .lock()
            .map_err(|_| eyre::eyre!("token store lock poisoned"))
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, key: &str) -> eyre::Result<Option<String>> {
        Ok(self.values()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> eyre::Result<()> {
        self.values()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> eyre::Result<()> {
        self.values()?.remove(key);
        Ok(())
    }
}

/// Keeps the keys in a small JSON object on disk.
///
/// The file is re-read on every access so that a second process (say, `livestream status
/// --watch` next to `livestream start`) sees refreshed tokens.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn load(&self) -> eyre::Result<BTreeMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(contents) => serde_json::from_str(&contents)
                .with_context(|| format!("parse token file {}", self.path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e).with_context(|| format!("read token file {}", self.path.display())),
        }
    }

    fn update(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) -> eyre::Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| eyre::eyre!("token file lock poisoned"))?;
        let mut values = self.load()?;
        f(&mut values);
        let json = serde_json::to_string_pretty(&values).context("serialize tokens")?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("write token file {}", self.path.display()))
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self, key: &str) -> eyre::Result<Option<String>> {
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> eyre::Result<()> {
        self.update(|values| {
            values.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> eyre::Result<()> {
        self.update(|values| {
            values.remove(key);
        })
    }
}

/// Hands out a currently valid access token, refreshing it through OAuth when it has expired.
///
/// Cloning is cheap and clones share the same store, so a status poller and an operator
/// action never refresh concurrently.
#[derive(Debug, Clone)]
pub struct CredentialManager {
    store: Arc<dyn TokenStore>,
    oauth: Arc<OAuthManager>,
    refresh_lock: Arc<tokio::sync::Mutex<()>>,
}

impl CredentialManager {
    pub fn new(store: Arc<dyn TokenStore>, oauth: Arc<OAuthManager>) -> Self {
        Self {
            store,
            oauth,
            refresh_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn oauth(&self) -> &OAuthManager {
        &self.oauth
    }

    /// Stores a token pair; the expiry becomes `now + expires_in`.
    ///
    /// A missing refresh token keeps whichever one was stored before, since providers
    /// usually omit it from refresh responses.
    pub fn set_tokens(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_in: Option<Duration>,
    ) -> eyre::Result<()> {
        let expires_in = SignedDuration::try_from(expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME))
            .context("convert token lifetime")?;
        let expires_at = Timestamp::now()
            .checked_add(expires_in)
            .context("compute token expiry")?;

        self.store.set(ACCESS_TOKEN_KEY, access_token)?;
        if let Some(refresh_token) = refresh_token {
            self.store.set(REFRESH_TOKEN_KEY, refresh_token)?;
        }
        self.store.set(EXPIRES_AT_KEY, &expires_at.to_string())?;
        tracing::debug!(%expires_at, "stored access token");
        Ok(())
    }

    /// Stores the token returned by an OAuth exchange.
    pub fn store_token_response(&self, token: &BasicTokenResponse) -> eyre::Result<()> {
        self.set_tokens(
            token.access_token().secret(),
            token.refresh_token().map(|t| t.secret().as_str()),
            token.expires_in(),
        )
    }

    /// Returns a usable access token, or `None` if the client is not authenticated.
    ///
    /// An expired (or missing) access token triggers exactly one refresh attempt.
    #[instrument(skip(self))]
    pub async fn valid_token(&self) -> eyre::Result<Option<String>> {
        let _refreshing = self.refresh_lock.lock().await;

        if let Some(access_token) = self.store.get(ACCESS_TOKEN_KEY)? {
            if !self.is_expired()? {
                return Ok(Some(access_token));
            }
            tracing::debug!("access token expired, attempting refresh");
        }

        if self.refresh_locked().await? {
            self.store.get(ACCESS_TOKEN_KEY)
        } else {
            Ok(None)
        }
    }

    /// Exchanges the stored refresh token for a new access token.
    ///
    /// Returns `false` after clearing all stored credentials if no refresh token is stored or
    /// the exchange fails for any reason.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> eyre::Result<bool> {
        let _refreshing = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    /// Forgets every stored credential.
    pub fn clear(&self) -> eyre::Result<()> {
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, EXPIRES_AT_KEY] {
            self.store.remove(key)?;
        }
        Ok(())
    }

    async fn refresh_locked(&self) -> eyre::Result<bool> {
        let Some(refresh_token) = self.store.get(REFRESH_TOKEN_KEY)? else {
            tracing::warn!("no refresh token stored, cannot refresh");
            self.clear()?;
            return Ok(false);
        };

        let new_token = match self.oauth.refresh_token(&refresh_token).await {
            Ok(Some(token)) => token,
            Ok(None) => {
                tracing::warn!("refresh token rejected, clearing stored credentials");
                self.clear()?;
                return Ok(false);
            }
            Err(e) => {
                tracing::error!(error = %e, "token refresh failed, clearing stored credentials");
                self.clear()?;
                return Ok(false);
            }
        };

        self.store_token_response(&new_token)
            .context("store refreshed token")?;
        Ok(true)
    }

    fn is_expired(&self) -> eyre::Result<bool> {
        let Some(expires_at) = self.store.get(EXPIRES_AT_KEY)? else {
            return Ok(true);
        };
        match expires_at.parse::<Timestamp>() {
            Ok(expires_at) => Ok(Timestamp::now() >= expires_at),
            Err(e) => {
                tracing::warn!(error = %e, "unparseable token expiry, treating token as expired");
                Ok(true)
            }
        }
    }
}
