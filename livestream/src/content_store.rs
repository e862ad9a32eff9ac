//! Records the livestream flow keeps in the church's content store.
//!
//! Two collections are involved: the transient broadcast session (at most one at a time,
//! holding what the encoder needs to connect) and the sermons a finished broadcast is
//! archived into. The CMS speaks Strapi's REST dialect: `/api/<collection>` with records
//! wrapped in a `data` envelope and addressed by `documentId`.

use crate::youtube_api::BroadcastLifeCycleStatus;
use eyre::Context;
use jiff::Timestamp;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Mutex;
use tracing::instrument;

/// Everything an operator needs to run one service stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastSession {
    pub broadcast_id: String,
    pub stream_id: String,
    pub ingest_url: String,
    pub ingest_key: String,
    pub watch_url: String,
    pub title: String,
    pub lifecycle_status: BroadcastLifeCycleStatus,
}

/// A [`BroadcastSession`] as persisted, with the store's id for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSession {
    #[serde(rename = "documentId")]
    pub id: String,
    #[serde(flatten)]
    pub session: BroadcastSession,
}

/// An archived broadcast, playable from the public sermons page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayedItem {
    pub title: String,
    /// The YouTube video id, which is the broadcast id.
    pub external_video_id: String,
    pub recorded_at: Timestamp,
}

/// Persistence for sessions and played items.
pub trait ContentStore: Send + Sync {
    /// The most recently created session, if any.
    fn latest_session(&self) -> impl Future<Output = eyre::Result<Option<StoredSession>>> + Send;

    fn create_session(
        &self,
        session: &BroadcastSession,
    ) -> impl Future<Output = eyre::Result<StoredSession>> + Send;

    fn update_session(
        &self,
        id: &str,
        session: &BroadcastSession,
    ) -> impl Future<Output = eyre::Result<StoredSession>> + Send;

    fn delete_session(&self, id: &str) -> impl Future<Output = eyre::Result<()>> + Send;

    fn create_played_item(&self, item: &PlayedItem)
    -> impl Future<Output = eyre::Result<()>> + Send;
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope<T> {
    data: T,
}

/// Collection names as configured in the CMS.
#[derive(Debug, Clone)]
pub struct Collections {
    pub sessions: String,
    pub played_items: String,
}

impl Default for Collections {
    fn default() -> Self {
        Self {
            sessions: "live-streams".to_string(),
            played_items: "sermons".to_string(),
        }
    }
}

/// [`ContentStore`] over the CMS's REST API.
#[derive(Debug, Clone)]
pub struct RestContentStore {
    client: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
    collections: Collections,
}

impl RestContentStore {
    pub fn new(
        base_url: impl Into<String>,
        api_token: Option<String>,
        collections: Collections,
    ) -> eyre::Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("build content store HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token,
            collections,
        })
    }

    fn request(&self, method: http::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/api/{}", self.base_url, path);
        let request = self.client.request(method, url);
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder, what: &str) -> eyre::Result<reqwest::Response> {
        let response = request
            .send()
            .await
            .with_context(|| format!("send content store request to {what}"))?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            eyre::bail!("content store request to {what} failed with status {status}: {body}");
        }
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        what: &str,
    ) -> eyre::Result<T> {
        let envelope: Envelope<T> = self
            .send(request, what)
            .await?
            .json()
            .await
            .with_context(|| format!("parse content store response to {what}"))?;
        Ok(envelope.data)
    }
}

impl ContentStore for RestContentStore {
    #[instrument(skip(self))]
    async fn latest_session(&self) -> eyre::Result<Option<StoredSession>> {
        let request = self
            .request(http::Method::GET, &self.collections.sessions)
            .query(&[("sort", "createdAt:desc"), ("pagination[pageSize]", "1")]);
        let sessions: Vec<StoredSession> = self.send_json(request, "find latest session").await?;
        Ok(sessions.into_iter().next())
    }

    #[instrument(skip(self))]
    async fn create_session(&self, session: &BroadcastSession) -> eyre::Result<StoredSession> {
        let request = self
            .request(http::Method::POST, &self.collections.sessions)
            .json(&Envelope { data: session });
        self.send_json(request, "create session").await
    }

    #[instrument(skip(self))]
    async fn update_session(&self, id: &str, session: &BroadcastSession) -> eyre::Result<StoredSession> {
        let request = self
            .request(
                http::Method::PUT,
                &format!("{}/{}", self.collections.sessions, id),
            )
            .json(&Envelope { data: session });
        self.send_json(request, "update session").await
    }

    #[instrument(skip(self))]
    async fn delete_session(&self, id: &str) -> eyre::Result<()> {
        let request = self.request(
            http::Method::DELETE,
            &format!("{}/{}", self.collections.sessions, id),
        );
        self.send(request, "delete session").await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn create_played_item(&self, item: &PlayedItem) -> eyre::Result<()> {
        let request = self
            .request(http::Method::POST, &self.collections.played_items)
            .json(&Envelope { data: item });
        self.send(request, "create played item").await?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryContents {
    sessions: Vec<StoredSession>,
    played_items: Vec<PlayedItem>,
    next_id: u64,
}

/// [`ContentStore`] kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryContentStore {
    contents: Mutex<MemoryContents>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn contents(&self) -> eyre::Result<std::sync::MutexGuard<'_, MemoryContents>> {
        self.contents
            .lock()
            .map_err(|_| eyre::eyre!("content store lock poisoned"))
    }

    pub fn sessions(&self) -> eyre::Result<Vec<StoredSession>> {
        Ok(self.contents()?.sessions.clone())
    }

    pub fn played_items(&self) -> eyre::Result<Vec<PlayedItem>> {
        Ok(self.contents()?.played_items.clone())
    }
}

impl ContentStore for MemoryContentStore {
    async fn latest_session(&self) -> eyre::Result<Option<StoredSession>> {
        Ok(self.contents()?.sessions.last().cloned())
    }

    async fn create_session(&self, session: &BroadcastSession) -> eyre::Result<StoredSession> {
        let mut contents = self.contents()?;
        contents.next_id += 1;
        let stored = StoredSession {
            id: format!("session-{}", contents.next_id),
            session: session.clone(),
        };
        contents.sessions.push(stored.clone());
        Ok(stored)
    }

    async fn update_session(&self, id: &str, session: &BroadcastSession) -> eyre::Result<StoredSession> {
        let mut contents = self.contents()?;
        let stored = contents
            .sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| eyre::eyre!("no session with id {id}"))?;
        stored.session = session.clone();
        Ok(stored.clone())
    }

    async fn delete_session(&self, id: &str) -> eyre::Result<()> {
        let mut contents = self.contents()?;
        let before = contents.sessions.len();
        contents.sessions.retain(|s| s.id != id);
        if contents.sessions.len() == before {
            eyre::bail!("no session with id {id}");
        }
        Ok(())
    }

    async fn create_played_item(&self, item: &PlayedItem) -> eyre::Result<()> {
        self.contents()?.played_items.push(item.clone());
        Ok(())
    }
}
