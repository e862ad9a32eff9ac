//! Periodic, read-only status checks for the active broadcast and its ingest stream.
//!
//! Polling never fails: lookups that come back empty show up as `unknown`, lookups that
//! could not be made show up as `error`, and the next tick tries again.

use crate::youtube_api::{
    BroadcastLifeCycleStatus, HealthStatus, RecordingStatus, StreamStatus, YouTubeClient,
};
use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;

/// How often the poller checks in with YouTube.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// One status field as last observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observed<T> {
    Value(T),
    /// The lookup succeeded but the resource (or the field) was not there.
    Unknown,
    /// The lookup itself failed.
    Error,
}

impl<T> Observed<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Value(v) => Some(v),
            Self::Unknown | Self::Error => None,
        }
    }
}

impl<T: fmt::Display> fmt::Display for Observed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => v.fmt(f),
            Self::Unknown => f.write_str("unknown"),
            Self::Error => f.write_str("error"),
        }
    }
}

impl<T: fmt::Display> Serialize for Observed<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Status of a broadcast and its bound stream at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub life_cycle_status: Observed<BroadcastLifeCycleStatus>,
    pub recording_status: Observed<RecordingStatus>,
    pub stream_status: Observed<StreamStatus>,
    pub health_status: Observed<HealthStatus>,
}

impl StatusSnapshot {
    pub fn is_live(&self) -> bool {
        self.life_cycle_status == Observed::Value(BroadcastLifeCycleStatus::Live)
    }

    /// Whether the broadcast has ended for good, so there is nothing left to watch.
    pub fn is_finished(&self) -> bool {
        matches!(
            self.life_cycle_status,
            Observed::Value(BroadcastLifeCycleStatus::Complete | BroadcastLifeCycleStatus::Revoked)
        )
    }
}

impl fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "broadcast {} (recording {}), stream {} (health {})",
            self.life_cycle_status, self.recording_status, self.stream_status, self.health_status
        )
    }
}

/// Whether the "go live" action should be offered.
///
/// Requires at least one completed poll, and the broadcast not already live.
pub fn can_start(latest: Option<&StatusSnapshot>) -> bool {
    latest.is_some_and(|s| !s.is_live())
}

/// Whether the "end broadcast" action should be offered: only while exactly live.
pub fn can_stop(latest: Option<&StatusSnapshot>) -> bool {
    latest.is_some_and(StatusSnapshot::is_live)
}

/// Looks up the broadcast and the stream independently and folds the answers into a snapshot.
pub async fn fetch_status(yt: &YouTubeClient, broadcast_id: &str, stream_id: &str) -> StatusSnapshot {
    let (broadcast, stream) = tokio::join!(
        yt.get_live_broadcast(broadcast_id),
        yt.get_live_stream(stream_id)
    );

    let (life_cycle_status, recording_status) = match broadcast {
        Ok(Some(b)) => (
            Observed::Value(b.status.life_cycle_status),
            b.status
                .recording_status
                .map_or(Observed::Unknown, Observed::Value),
        ),
        Ok(None) => (Observed::Unknown, Observed::Unknown),
        Err(e) => {
            tracing::warn!(broadcast_id, error = %e, "broadcast status lookup failed");
            (Observed::Error, Observed::Error)
        }
    };

    let (stream_status, health_status) = match stream {
        Ok(Some(s)) => match s.status {
            Some(status) => (
                Observed::Value(status.stream_status),
                status
                    .health_status
                    .map_or(Observed::Unknown, |h| Observed::Value(h.status)),
            ),
            None => (Observed::Unknown, Observed::Unknown),
        },
        Ok(None) => (Observed::Unknown, Observed::Unknown),
        Err(e) => {
            tracing::warn!(stream_id, error = %e, "stream status lookup failed");
            (Observed::Error, Observed::Error)
        }
    };

    StatusSnapshot {
        life_cycle_status,
        recording_status,
        stream_status,
        health_status,
    }
}

/// Spawns status polling tasks.
pub struct StatusPoller;

impl StatusPoller {
    /// Polls once right away and then every `interval` until the handle is stopped or dropped.
    pub fn spawn(
        yt: YouTubeClient,
        broadcast_id: String,
        stream_id: String,
        interval: Duration,
    ) -> PollerHandle {
        let (tx, rx) = watch::channel(None);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let snapshot = fetch_status(&yt, &broadcast_id, &stream_id).await;
                tracing::trace!(%broadcast_id, %snapshot, "polled broadcast status");
                if tx.send(Some(snapshot)).is_err() {
                    tracing::debug!("all status receivers gone, stopping poller");
                    break;
                }
            }
        });
        PollerHandle { rx, task }
    }
}

/// Owner of a running poller. Dropping it stops polling.
#[derive(Debug)]
pub struct PollerHandle {
    rx: watch::Receiver<Option<StatusSnapshot>>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// The most recent snapshot, or `None` before the first poll completes.
    pub fn latest(&self) -> Option<StatusSnapshot> {
        *self.rx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<StatusSnapshot>> {
        self.rx.clone()
    }

    /// Every snapshot from now on, starting with the current one if there is one.
    pub fn updates(&self) -> impl tokio_stream::Stream<Item = StatusSnapshot> + use<> {
        use tokio_stream::StreamExt;
        WatchStream::new(self.rx.clone()).filter_map(|s| s)
    }

    pub fn can_start(&self) -> bool {
        can_start(self.latest().as_ref())
    }

    pub fn can_stop(&self) -> bool {
        can_stop(self.latest().as_ref())
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stops polling. Snapshots already received stay readable through [`Self::latest`].
    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
