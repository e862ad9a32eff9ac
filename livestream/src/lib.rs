//! Orchestration of the church's YouTube service livestreams.
//!
//! [`Broadcaster`] is the entry point: it provisions a broadcast and ingest stream, drives
//! the broadcast live and back down, and archives the result into the content store.

use crate::credentials::CredentialManager;
use eyre::Context;
use std::ops::AsyncFnMut;

pub mod broadcaster;
pub mod config;
pub mod content_store;
pub mod credentials;
pub mod lifecycle;
pub mod oauth;
pub mod poller;
pub mod provision;
pub mod youtube_api;

#[cfg(test)]
mod test_support;

pub use broadcaster::Broadcaster;
pub use config::{LiveConfig, Settings};
pub use content_store::{BroadcastSession, ContentStore, PlayedItem, StoredSession};
pub use poller::{Observed, PollerHandle, StatusSnapshot};

/// Makes sure `credentials` can produce a valid access token.
///
/// Stored tokens are used (and refreshed) when possible. Otherwise `notify` is told why the
/// browser is about to open and the interactive OAuth flow runs.
pub async fn ensure_signed_in<F>(credentials: &CredentialManager, mut notify: F) -> eyre::Result<()>
where
    F: AsyncFnMut(&str),
{
    if credentials
        .valid_token()
        .await
        .context("check stored YouTube credentials")?
        .is_some()
    {
        tracing::debug!("stored YouTube credentials are valid");
        return Ok(());
    }

    notify("You need to sign in to YouTube to give access to the church channel. Check your browser.")
        .await;
    let token = credentials
        .oauth()
        .authenticate()
        .await
        .context("authorize operator to YouTube")?;
    credentials
        .store_token_response(&token)
        .context("store new YouTube credentials")?;
    tracing::info!("signed in to YouTube");
    Ok(())
}
