//! The slice of the YouTube Data API v3 needed to run a service livestream.
//!
//! # Broadcasts vs Streams
//!
//! - [`broadcasts::LiveBroadcast`] is what viewers see: title, schedule, privacy, and the
//!   lifecycle `created → ready → testing → live → complete`. Each broadcast is one video.
//! - [`streams::LiveStream`] is the ingest pipeline the encoder pushes to: RTMP address,
//!   stream key and feed health.
//!
//! A service stream creates one of each, binds the broadcast to the stream, then drives the
//! broadcast through its lifecycle with [`YouTubeClient::transition_live_broadcast`].

pub mod broadcasts;
pub mod client;
pub mod error;
pub mod streams;
pub mod types;

pub use client::{YOUTUBE_API_BASE, YouTubeClient};
pub use error::ApiError;
pub use types::{ListResponse, PageInfo};

pub use broadcasts::{
    BroadcastLifeCycleStatus, BroadcastPrivacyStatus, BroadcastStatus, LiveBroadcast,
    LiveBroadcastSnippet, LiveBroadcastStatus, RecordingStatus,
};

pub use streams::{HealthStatus, IngestionInfo, LiveStream, LiveStreamStatus, StreamStatus};
