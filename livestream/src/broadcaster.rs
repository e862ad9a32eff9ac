//! The operator-facing livestream flow: provision, go live, end and archive.
//!
//! A [`Broadcaster`] ties the YouTube client to the content store. The single broadcast
//! session record in the store is what makes "the current broadcast" a thing: provisioning
//! writes it, start and stop read it, and archival removes it.

use crate::config::LiveConfig;
use crate::content_store::{BroadcastSession, ContentStore, PlayedItem, StoredSession};
use crate::lifecycle::LifecycleDriver;
use crate::poller::{PollerHandle, StatusPoller};
use crate::provision;
use crate::youtube_api::YouTubeClient;
use eyre::{Context, OptionExt};
use jiff::Timestamp;
use tracing::instrument;

/// Runs the livestream flow against one YouTube channel and one content store.
#[derive(Debug)]
pub struct Broadcaster<C> {
    yt: YouTubeClient,
    store: C,
    lifecycle: LifecycleDriver,
    config: LiveConfig,
}

impl<C: ContentStore> Broadcaster<C> {
    pub fn new(yt: YouTubeClient, store: C, config: LiveConfig) -> Self {
        let lifecycle = LifecycleDriver::new(yt.clone(), config.settle_delay);
        Self {
            yt,
            store,
            lifecycle,
            config,
        }
    }

    pub fn store(&self) -> &C {
        &self.store
    }

    pub fn youtube(&self) -> &YouTubeClient {
        &self.yt
    }

    /// Creates a broadcast and an ingest stream on YouTube, binds them, and records the result
    /// as the current session.
    ///
    /// There is at most one session record: an existing one is overwritten rather than a second
    /// one created. If any YouTube step fails, resources created by earlier steps are left
    /// behind and nothing is recorded.
    #[instrument(skip(self))]
    pub async fn provision(&self, title: &str) -> eyre::Result<BroadcastSession> {
        let session = provision::create(&self.yt, title, self.config.privacy_status).await?;

        let stored = match self
            .store
            .latest_session()
            .await
            .context("look up existing session")?
        {
            Some(existing) => {
                tracing::info!(
                    record = %existing.id,
                    replaced_broadcast = %existing.session.broadcast_id,
                    "replacing existing session record"
                );
                self.store
                    .update_session(&existing.id, &session)
                    .await
                    .context("update session record")?
            }
            None => self
                .store
                .create_session(&session)
                .await
                .context("create session record")?,
        };

        tracing::info!(
            broadcast_id = %stored.session.broadcast_id,
            stream_id = %stored.session.stream_id,
            "provisioned broadcast"
        );
        Ok(stored.session)
    }

    /// The session currently on record, if any.
    pub async fn current_session(&self) -> eyre::Result<Option<StoredSession>> {
        self.store.latest_session().await
    }

    async fn require_session(&self) -> eyre::Result<StoredSession> {
        self.current_session()
            .await?
            .ok_or_eyre("no broadcast session on record; provision one first")
    }

    /// Takes the current session's broadcast live.
    #[instrument(skip(self))]
    pub async fn start(&self) -> eyre::Result<BroadcastSession> {
        let mut stored = self.require_session().await?;
        let reported = self.lifecycle.start(&stored.session.broadcast_id).await?;

        stored.session.lifecycle_status = reported;
        let stored = self
            .store
            .update_session(&stored.id, &stored.session)
            .await
            .context("record new lifecycle status")?;
        Ok(stored.session)
    }

    /// Ends the current broadcast and archives it as a played item.
    ///
    /// The played item is created before the session record is deleted; if creating it
    /// fails, the session record stays so the operator can retry. A retry finds the
    /// broadcast already `complete` and goes straight to archiving.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> eyre::Result<PlayedItem> {
        let stored = self.require_session().await?;
        let reported = self.lifecycle.stop(&stored.session.broadcast_id).await?;
        tracing::debug!(%reported, "broadcast ended");
        self.archive(&stored).await
    }

    /// Records a finished session as a played item and removes the session record.
    #[instrument(skip(self, stored), fields(broadcast_id = %stored.session.broadcast_id))]
    pub async fn archive(&self, stored: &StoredSession) -> eyre::Result<PlayedItem> {
        let item = PlayedItem {
            title: stored.session.title.clone(),
            external_video_id: stored.session.broadcast_id.clone(),
            recorded_at: Timestamp::now(),
        };
        self.store
            .create_played_item(&item)
            .await
            .context("archive broadcast as played item")?;
        self.store
            .delete_session(&stored.id)
            .await
            .context("delete archived session record")?;
        tracing::info!(title = %item.title, "archived broadcast");
        Ok(item)
    }

    /// Drops the current session record without archiving anything.
    ///
    /// The YouTube resources are left as they are.
    #[instrument(skip(self))]
    pub async fn cancel(&self) -> eyre::Result<Option<BroadcastSession>> {
        let Some(stored) = self.current_session().await? else {
            return Ok(None);
        };
        self.store
            .delete_session(&stored.id)
            .await
            .context("delete cancelled session record")?;
        tracing::info!(broadcast_id = %stored.session.broadcast_id, "cancelled session");
        Ok(Some(stored.session))
    }

    /// Whether `broadcast_id` is still the broadcast of the session on record.
    pub async fn is_current(&self, broadcast_id: &str) -> eyre::Result<bool> {
        Ok(self
            .current_session()
            .await?
            .is_some_and(|s| s.session.broadcast_id == broadcast_id))
    }

    /// Starts polling the current session's status.
    pub async fn watch_status(&self) -> eyre::Result<PollerHandle> {
        let stored = self.require_session().await?;
        Ok(StatusPoller::spawn(
            self.yt.clone(),
            stored.session.broadcast_id,
            stored.session.stream_id,
            self.config.poll_interval,
        ))
    }
}
