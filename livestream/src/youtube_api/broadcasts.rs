//! YouTube Live Broadcasts API types.
//!
//! A broadcast is the viewer-facing side of a service stream: title, schedule, privacy and
//! the lifecycle the congregation sees (`ready` → `testing` → `live` → `complete`). Each
//! broadcast is exactly one YouTube video, which is why its id doubles as the sermon's
//! video id once the service is archived.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A `liveBroadcast` resource.
///
/// See: <https://developers.google.com/youtube/v3/live/docs/liveBroadcasts#resource>
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveBroadcast {
    /// The ID that YouTube assigns to uniquely identify the broadcast.
    pub id: String,
    pub snippet: LiveBroadcastSnippet,
    pub status: LiveBroadcastStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_details: Option<LiveBroadcastContentDetails>,
}

/// See: <https://developers.google.com/youtube/v3/live/docs/liveBroadcasts#snippet>
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveBroadcastSnippet {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_start_time: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_start_time: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_end_time: Option<Timestamp>,
}

/// See: <https://developers.google.com/youtube/v3/live/docs/liveBroadcasts#status>
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveBroadcastStatus {
    pub life_cycle_status: BroadcastLifeCycleStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privacy_status: Option<BroadcastPrivacyStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recording_status: Option<RecordingStatus>,
}

/// See: <https://developers.google.com/youtube/v3/live/docs/liveBroadcasts#contentDetails>
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveBroadcastContentDetails {
    /// The stream this broadcast is bound to, once bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bound_stream_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_auto_start: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_auto_stop: Option<bool>,
}

/// The broadcast's current lifecycle status.
///
/// `testStarting` and `liveStarting` are transient states YouTube reports while a
/// transition is still in progress.
///
/// See: <https://developers.google.com/youtube/v3/live/docs/liveBroadcasts#status.lifeCycleStatus>
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BroadcastLifeCycleStatus {
    /// The broadcast was created but is not bound to a stream yet.
    Created,
    /// The broadcast settings are complete and it can be activated.
    Ready,
    TestStarting,
    /// Visible only to the broadcaster, for checking the feed before going public.
    Testing,
    LiveStarting,
    /// Visible to everyone with access to the URL.
    Live,
    /// The broadcast is over.
    Complete,
    /// Removed by an admin action; can no longer be activated.
    Revoked,
}

impl fmt::Display for BroadcastLifeCycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Ready => write!(f, "ready"),
            Self::TestStarting => write!(f, "testStarting"),
            Self::Testing => write!(f, "testing"),
            Self::LiveStarting => write!(f, "liveStarting"),
            Self::Live => write!(f, "live"),
            Self::Complete => write!(f, "complete"),
            Self::Revoked => write!(f, "revoked"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BroadcastPrivacyStatus {
    Public,
    Unlisted,
    Private,
}

impl fmt::Display for BroadcastPrivacyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => write!(f, "public"),
            Self::Unlisted => write!(f, "unlisted"),
            Self::Private => write!(f, "private"),
        }
    }
}

impl std::str::FromStr for BroadcastPrivacyStatus {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Self::Public),
            "unlisted" => Ok(Self::Unlisted),
            "private" => Ok(Self::Private),
            other => Err(eyre::eyre!("unknown privacy status: {other}")),
        }
    }
}

/// Whether YouTube is recording the broadcast into its video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordingStatus {
    NotRecording,
    Recording,
    Recorded,
}

impl fmt::Display for RecordingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotRecording => write!(f, "notRecording"),
            Self::Recording => write!(f, "recording"),
            Self::Recorded => write!(f, "recorded"),
        }
    }
}

/// Target states accepted by `liveBroadcasts.transition`.
///
/// See: <https://developers.google.com/youtube/v3/live/docs/liveBroadcasts/transition>
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BroadcastStatus {
    Testing,
    Live,
    Complete,
}

impl BroadcastStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Testing => "testing",
            Self::Live => "live",
            Self::Complete => "complete",
        }
    }
}

impl fmt::Display for BroadcastStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request body for `liveBroadcasts.insert`.
///
/// See: <https://developers.google.com/youtube/v3/live/docs/liveBroadcasts/insert>
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveBroadcastInsertRequest {
    pub snippet: LiveBroadcastInsertSnippet,
    pub status: LiveBroadcastInsertStatus,
    pub content_details: LiveBroadcastContentDetails,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveBroadcastInsertSnippet {
    pub title: String,
    pub scheduled_start_time: Timestamp,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveBroadcastInsertStatus {
    pub privacy_status: BroadcastPrivacyStatus,
    pub self_declared_made_for_kids: bool,
}

impl LiveBroadcastInsertRequest {
    /// A broadcast that starts now and is driven manually through its lifecycle.
    pub fn new(title: &str, privacy_status: BroadcastPrivacyStatus) -> Self {
        Self {
            snippet: LiveBroadcastInsertSnippet {
                title: title.to_string(),
                scheduled_start_time: Timestamp::now(),
            },
            status: LiveBroadcastInsertStatus {
                privacy_status,
                self_declared_made_for_kids: false,
            },
            content_details: LiveBroadcastContentDetails {
                bound_stream_id: None,
                enable_auto_start: Some(false),
                enable_auto_stop: Some(false),
            },
        }
    }
}
