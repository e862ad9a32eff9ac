//! Authenticated client for the YouTube Live endpoints the livestream flow uses.

use crate::credentials::CredentialManager;
use crate::youtube_api::{
    ApiError,
    broadcasts::{BroadcastPrivacyStatus, BroadcastStatus, LiveBroadcast, LiveBroadcastInsertRequest},
    streams::{LiveStream, LiveStreamInsertRequest},
    types::ListResponse,
};
use eyre::Context;
use http::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::instrument;

/// Production base URL of the YouTube Data API v3.
pub const YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// Client for the YouTube Data API v3.
///
/// Every call first asks the [`CredentialManager`] for a valid access token; when there is
/// none the call fails with [`ApiError::NotAuthenticated`] before anything is sent.
#[derive(Debug, Clone)]
pub struct YouTubeClient {
    credentials: CredentialManager,
    client: reqwest::Client,
    api_base: String,
}

impl YouTubeClient {
    /// Creates a client that talks to `api_base` (normally [`YOUTUBE_API_BASE`]).
    pub fn new(credentials: CredentialManager, api_base: impl Into<String>) -> eyre::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build YouTube HTTP client")?;
        Ok(Self {
            credentials,
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn credentials(&self) -> &CredentialManager {
        &self.credentials
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path)
    }

    /// Makes an authenticated request and rejects non-2xx responses.
    ///
    /// The error for a rejected request carries the response body verbatim so the operator
    /// sees YouTube's own explanation.
    #[instrument(skip(self, json_body), level = tracing::Level::TRACE)]
    async fn make_authenticated_request(
        &self,
        method: Method,
        path: &str,
        query_params: &[(&str, &str)],
        json_body: Option<&impl Serialize>,
    ) -> eyre::Result<reqwest::Response> {
        let Some(access_token) = self.credentials.valid_token().await? else {
            return Err(ApiError::NotAuthenticated.into());
        };

        let url = self.url(path);
        let mut request = self
            .client
            .request(method.clone(), &url)
            .bearer_auth(access_token)
            .query(query_params);

        if let Some(body) = json_body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|source| ApiError::Transport {
            method: method.clone(),
            url: url.clone(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(ApiError::Rejected {
                method,
                url,
                status,
                body,
            }
            .into());
        }

        Ok(response)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query_params: &[(&str, &str)],
        json_body: Option<&impl Serialize>,
    ) -> eyre::Result<T> {
        let response = self
            .make_authenticated_request(method, path, query_params, json_body)
            .await?;
        response
            .json()
            .await
            .with_context(|| format!("parse YouTube {path} response as JSON"))
    }

    /// Creates a new broadcast titled `title`, scheduled to start now.
    ///
    /// <https://developers.google.com/youtube/v3/live/docs/liveBroadcasts/insert>
    #[instrument(skip(self))]
    pub async fn insert_live_broadcast(
        &self,
        title: &str,
        privacy_status: BroadcastPrivacyStatus,
    ) -> eyre::Result<LiveBroadcast> {
        let request = LiveBroadcastInsertRequest::new(title, privacy_status);
        let broadcast: LiveBroadcast = self
            .call(
                Method::POST,
                "liveBroadcasts",
                &[("part", "snippet,status,contentDetails")],
                Some(&request),
            )
            .await
            .context("create live broadcast")?;
        tracing::debug!(broadcast_id = %broadcast.id, "created broadcast");
        Ok(broadcast)
    }

    /// Creates a new RTMP ingest stream.
    ///
    /// <https://developers.google.com/youtube/v3/live/docs/liveStreams/insert>
    #[instrument(skip(self))]
    pub async fn insert_live_stream(&self, title: &str) -> eyre::Result<LiveStream> {
        let request = LiveStreamInsertRequest::rtmp(title);
        let stream: LiveStream = self
            .call(
                Method::POST,
                "liveStreams",
                &[("part", "snippet,cdn,contentDetails,status")],
                Some(&request),
            )
            .await
            .context("create live stream")?;
        tracing::debug!(stream_id = %stream.id, "created ingest stream");
        Ok(stream)
    }

    /// Binds a broadcast to the stream that will feed it.
    ///
    /// <https://developers.google.com/youtube/v3/live/docs/liveBroadcasts/bind>
    #[instrument(skip(self))]
    pub async fn bind_live_broadcast(
        &self,
        broadcast_id: &str,
        stream_id: &str,
    ) -> eyre::Result<LiveBroadcast> {
        let broadcast: LiveBroadcast = self
            .call(
                Method::POST,
                "liveBroadcasts/bind",
                &[
                    ("part", "id,snippet,status,contentDetails"),
                    ("id", broadcast_id),
                    ("streamId", stream_id),
                ],
                None::<&()>,
            )
            .await
            .context("bind broadcast to stream")?;
        tracing::debug!(broadcast_id, stream_id, "bound broadcast to stream");
        Ok(broadcast)
    }

    /// Moves a broadcast to `status`.
    ///
    /// <https://developers.google.com/youtube/v3/live/docs/liveBroadcasts/transition>
    #[instrument(skip(self))]
    pub async fn transition_live_broadcast(
        &self,
        broadcast_id: &str,
        status: BroadcastStatus,
    ) -> eyre::Result<LiveBroadcast> {
        let broadcast: LiveBroadcast = self
            .call(
                Method::POST,
                "liveBroadcasts/transition",
                &[
                    ("part", "id,snippet,status"),
                    ("id", broadcast_id),
                    ("broadcastStatus", status.as_str()),
                ],
                None::<&()>,
            )
            .await
            .with_context(|| format!("transition broadcast to {status}"))?;
        tracing::debug!(
            broadcast_id,
            requested = %status,
            reported = %broadcast.status.life_cycle_status,
            "transitioned broadcast"
        );
        Ok(broadcast)
    }

    /// Looks up one broadcast. `Ok(None)` means YouTube returned no such item.
    #[instrument(skip(self))]
    pub async fn get_live_broadcast(&self, broadcast_id: &str) -> eyre::Result<Option<LiveBroadcast>> {
        let mut response: ListResponse<LiveBroadcast> = self
            .call(
                Method::GET,
                "liveBroadcasts",
                &[("part", "id,snippet,status,contentDetails"), ("id", broadcast_id)],
                None::<&()>,
            )
            .await
            .context("fetch broadcast")?;
        Ok(response.items.pop_front())
    }

    /// Looks up one stream. `Ok(None)` means YouTube returned no such item.
    #[instrument(skip(self))]
    pub async fn get_live_stream(&self, stream_id: &str) -> eyre::Result<Option<LiveStream>> {
        let mut response: ListResponse<LiveStream> = self
            .call(
                Method::GET,
                "liveStreams",
                &[("part", "id,snippet,cdn,status"), ("id", stream_id)],
                None::<&()>,
            )
            .await
            .context("fetch stream")?;
        Ok(response.items.pop_front())
    }

    /// Lists up to `limit` of the channel's broadcasts, newest first.
    #[instrument(skip(self))]
    pub async fn list_my_live_broadcasts(&self, limit: usize) -> eyre::Result<Vec<LiveBroadcast>> {
        let mut broadcasts = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut query_params = vec![
                ("part", "id,snippet,status"),
                ("mine", "true"),
                ("maxResults", "50"),
            ];
            if let Some(ref token) = page_token {
                query_params.push(("pageToken", token.as_str()));
            }

            let response: ListResponse<LiveBroadcast> = self
                .call(Method::GET, "liveBroadcasts", &query_params, None::<&()>)
                .await
                .context("list broadcasts")?;
            tracing::debug!(
                total_results = response.page_info.total_results,
                returned_items = response.items.len(),
                "fetched page of broadcasts"
            );

            broadcasts.extend(response.items);
            if broadcasts.len() >= limit {
                broadcasts.truncate(limit);
                break;
            }
            match response.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }
        Ok(broadcasts)
    }
}
