//! Configuration for the livestream flow.

use crate::content_store::{Collections, RestContentStore};
use crate::credentials::{CredentialManager, FileTokenStore};
use crate::lifecycle::DEFAULT_SETTLE_DELAY;
use crate::oauth::{OAuthConfig, OAuthManager};
use crate::poller::DEFAULT_POLL_INTERVAL;
use crate::youtube_api::{BroadcastPrivacyStatus, YOUTUBE_API_BASE, YouTubeClient};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Knobs for a [`crate::Broadcaster`].
#[derive(Debug, Clone)]
pub struct LiveConfig {
    /// Pause between entering `testing` and requesting `live`
    pub settle_delay: Duration,

    /// Status polling interval
    pub poll_interval: Duration,

    /// Privacy of newly provisioned broadcasts
    pub privacy_status: BroadcastPrivacyStatus,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
            poll_interval: DEFAULT_POLL_INTERVAL,
            privacy_status: BroadcastPrivacyStatus::Public,
        }
    }
}

/// Settings shared by every `livestream` subcommand.
#[derive(clap::Args, Debug, Clone)]
pub struct Settings {
    /// Google OAuth client id.
    #[arg(long, env = "YOUTUBE_CLIENT_ID")]
    pub client_id: String,

    /// Google OAuth client secret.
    #[arg(long, env = "YOUTUBE_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: String,

    /// Where access and refresh tokens are kept between runs.
    #[arg(long, env = "LIVESTREAM_TOKEN_FILE", default_value = "tokens.json")]
    pub token_file: PathBuf,

    /// YouTube Data API base URL.
    #[arg(long, env = "YOUTUBE_API_BASE", default_value = YOUTUBE_API_BASE)]
    pub api_base_url: String,

    /// Base URL of the CMS holding session and sermon records.
    #[arg(long, env = "CMS_URL", default_value = "http://localhost:1337")]
    pub cms_url: String,

    /// CMS API token.
    #[arg(long, env = "CMS_API_TOKEN", hide_env_values = true)]
    pub cms_token: Option<String>,

    /// CMS collection holding the live broadcast session.
    #[arg(long, env = "CMS_SESSIONS_COLLECTION", default_value = "live-streams")]
    pub sessions_collection: String,

    /// CMS collection finished broadcasts are archived into.
    #[arg(long, env = "CMS_ARCHIVE_COLLECTION", default_value = "sermons")]
    pub archive_collection: String,

    /// Privacy of newly provisioned broadcasts (public, unlisted or private).
    #[arg(long, env = "LIVESTREAM_PRIVACY", default_value = "public")]
    pub privacy: BroadcastPrivacyStatus,

    /// Seconds between entering testing and going live.
    #[arg(long, env = "LIVESTREAM_SETTLE_SECS", default_value = "2")]
    pub settle_secs: u64,

    /// Seconds between status polls.
    #[arg(long, env = "LIVESTREAM_POLL_SECS", default_value = "5")]
    pub poll_secs: u64,
}

impl Settings {
    pub fn live_config(&self) -> LiveConfig {
        LiveConfig {
            settle_delay: Duration::from_secs(self.settle_secs),
            poll_interval: Duration::from_secs(self.poll_secs),
            privacy_status: self.privacy,
        }
    }

    pub fn collections(&self) -> Collections {
        Collections {
            sessions: self.sessions_collection.clone(),
            played_items: self.archive_collection.clone(),
        }
    }

    pub fn credentials(&self) -> eyre::Result<CredentialManager> {
        let oauth = OAuthManager::new(OAuthConfig::google(&self.client_id, &self.client_secret))?;
        Ok(CredentialManager::new(
            Arc::new(FileTokenStore::new(&self.token_file)),
            Arc::new(oauth),
        ))
    }

    pub fn youtube_client(&self) -> eyre::Result<YouTubeClient> {
        YouTubeClient::new(self.credentials()?, &self.api_base_url)
    }

    pub fn content_store(&self) -> eyre::Result<RestContentStore> {
        RestContentStore::new(&self.cms_url, self.cms_token.clone(), self.collections())
    }
}
