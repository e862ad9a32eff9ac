//! Creating the YouTube side of a new service stream.

use crate::content_store::BroadcastSession;
use crate::youtube_api::{BroadcastPrivacyStatus, YouTubeClient};
use eyre::OptionExt;
use tracing::instrument;

pub fn watch_url(broadcast_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={broadcast_id}")
}

/// Creates a broadcast and an ingest stream, and binds them together.
///
/// The three calls are made in order and the first failure aborts. Nothing is rolled back, so
/// a failed bind leaves an unbound broadcast and stream behind on the channel.
#[instrument(skip(yt))]
pub async fn create(
    yt: &YouTubeClient,
    title: &str,
    privacy: BroadcastPrivacyStatus,
) -> eyre::Result<BroadcastSession> {
    let broadcast = yt.insert_live_broadcast(title, privacy).await?;
    tracing::debug!(broadcast_id = %broadcast.id, "created broadcast");
    let stream = yt.insert_live_stream(title).await?;
    tracing::debug!(stream_id = %stream.id, "created stream");
    let bound = yt.bind_live_broadcast(&broadcast.id, &stream.id).await?;

    let ingestion = stream
        .cdn
        .and_then(|cdn| cdn.ingestion_info)
        .ok_or_eyre("YouTube returned a stream without ingestion info")?;

    Ok(BroadcastSession {
        watch_url: watch_url(&broadcast.id),
        broadcast_id: broadcast.id,
        stream_id: stream.id,
        ingest_url: ingestion.ingestion_address,
        ingest_key: ingestion.stream_name,
        title: title.to_string(),
        lifecycle_status: bound.status.life_cycle_status,
    })
}
