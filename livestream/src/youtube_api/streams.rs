//! YouTube Live Streams API types.
//!
//! A stream is the ingest side: the RTMP address and key the church's encoder pushes video
//! to, plus the health YouTube reports for that feed. A broadcast only goes out once it is
//! bound to a stream.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A `liveStream` resource.
///
/// See: <https://developers.google.com/youtube/v3/live/docs/liveStreams#resource>
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveStream {
    /// The ID that YouTube assigns to uniquely identify the stream.
    pub id: String,
    pub snippet: LiveStreamSnippet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cdn: Option<Cdn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<LiveStreamStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveStreamSnippet {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<Timestamp>,
}

/// Ingest settings.
///
/// See: <https://developers.google.com/youtube/v3/live/docs/liveStreams#cdn>
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cdn {
    pub ingestion_type: String,
    pub resolution: String,
    pub frame_rate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingestion_info: Option<IngestionInfo>,
}

/// Where the encoder should push its feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionInfo {
    /// The stream key.
    pub stream_name: String,
    /// The primary ingest URL.
    pub ingestion_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_ingestion_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rtmps_ingestion_address: Option<String>,
}

/// See: <https://developers.google.com/youtube/v3/live/docs/liveStreams#status>
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveStreamStatus {
    pub stream_status: StreamStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_status: Option<LiveStreamHealth>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveStreamHealth {
    pub status: HealthStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StreamStatus {
    /// The stream is receiving data.
    Active,
    /// The stream exists but lacks valid CDN settings.
    Created,
    Error,
    /// The stream is not receiving data.
    Inactive,
    /// The stream has valid CDN settings.
    Ready,
}

impl fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Created => write!(f, "created"),
            Self::Error => write!(f, "error"),
            Self::Inactive => write!(f, "inactive"),
            Self::Ready => write!(f, "ready"),
        }
    }
}

/// YouTube's verdict on the incoming feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HealthStatus {
    Good,
    Ok,
    Bad,
    NoData,
    Revoked,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Good => write!(f, "good"),
            Self::Ok => write!(f, "ok"),
            Self::Bad => write!(f, "bad"),
            Self::NoData => write!(f, "noData"),
            Self::Revoked => write!(f, "revoked"),
        }
    }
}

/// Request body for `liveStreams.insert`.
///
/// See: <https://developers.google.com/youtube/v3/live/docs/liveStreams/insert>
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveStreamInsertRequest {
    pub snippet: LiveStreamInsertSnippet,
    pub cdn: Cdn,
    pub content_details: LiveStreamInsertContentDetails,
}

#[derive(Debug, Serialize)]
pub struct LiveStreamInsertSnippet {
    pub title: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveStreamInsertContentDetails {
    pub is_reusable: bool,
}

impl LiveStreamInsertRequest {
    /// A single-use RTMP stream that accepts whatever resolution the encoder sends.
    pub fn rtmp(title: &str) -> Self {
        Self {
            snippet: LiveStreamInsertSnippet {
                title: title.to_string(),
            },
            cdn: Cdn {
                ingestion_type: "rtmp".to_string(),
                resolution: "variable".to_string(),
                frame_rate: "variable".to_string(),
                ingestion_info: None,
            },
            content_details: LiveStreamInsertContentDetails { is_reusable: false },
        }
    }
}
