//! Driving a broadcast through `ready → testing → live → complete`.
//!
//! The plan for "go live" is decided by [`plan_start`], which is total over every
//! lifecycle state YouTube can report; the driver only executes plans.

use crate::youtube_api::{BroadcastLifeCycleStatus, BroadcastStatus, YouTubeClient};
use eyre::Context;
use std::time::Duration;
use thiserror::Error;
use tracing::instrument;

/// How long to let YouTube settle between entering `testing` and requesting `live`.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("broadcast {0} not found on YouTube")]
    BroadcastNotFound(String),

    /// The broadcast is in a state from which going live is not a forward move.
    #[error("cannot start broadcast while it is {status}")]
    CannotStart { status: BroadcastLifeCycleStatus },

    #[error("cannot end broadcast while it is {status}")]
    CannotStop { status: BroadcastLifeCycleStatus },
}

/// The transitions needed to take a broadcast live from its current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPlan {
    /// `ready`: enter `testing`, wait for the settle delay, then go `live`.
    TestThenLive,
    /// `testing`: go `live` directly.
    LiveOnly,
    /// Already `live`; nothing to do.
    AlreadyLive,
}

impl StartPlan {
    pub fn transitions(&self) -> &'static [BroadcastStatus] {
        match self {
            Self::TestThenLive => &[BroadcastStatus::Testing, BroadcastStatus::Live],
            Self::LiveOnly => &[BroadcastStatus::Live],
            Self::AlreadyLive => &[],
        }
    }
}

/// Decides how to start a broadcast that is currently in `status`.
///
/// States mid-transition (`testStarting`, `liveStarting`), states before binding
/// (`created`) and terminal states are refused rather than guessed at.
pub fn plan_start(status: BroadcastLifeCycleStatus) -> Result<StartPlan, LifecycleError> {
    use BroadcastLifeCycleStatus as S;
    match status {
        S::Ready => Ok(StartPlan::TestThenLive),
        S::Testing => Ok(StartPlan::LiveOnly),
        S::Live => Ok(StartPlan::AlreadyLive),
        S::Created | S::TestStarting | S::LiveStarting | S::Complete | S::Revoked => {
            Err(LifecycleError::CannotStart { status })
        }
    }
}

/// What ending a broadcast takes from its current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopPlan {
    /// Request `complete`.
    Complete,
    /// Already `complete`, e.g. when an earlier stop ended it but archiving failed.
    AlreadyComplete,
}

/// Decides how to end a broadcast that is currently in `status`.
///
/// A broadcast that was never bound (`created`) or was taken down (`revoked`) cannot be
/// completed.
pub fn plan_stop(status: BroadcastLifeCycleStatus) -> Result<StopPlan, LifecycleError> {
    use BroadcastLifeCycleStatus as S;
    match status {
        S::Ready | S::TestStarting | S::Testing | S::LiveStarting | S::Live => Ok(StopPlan::Complete),
        S::Complete => Ok(StopPlan::AlreadyComplete),
        S::Created | S::Revoked => Err(LifecycleError::CannotStop { status }),
    }
}

/// Whether `from → to` moves forward through the lifecycle.
pub fn is_forward(from: BroadcastLifeCycleStatus, to: BroadcastStatus) -> bool {
    use BroadcastLifeCycleStatus as S;
    match (from, to) {
        (S::Ready, BroadcastStatus::Testing) => true,
        (S::Testing | S::TestStarting, BroadcastStatus::Live) => true,
        (S::Ready | S::TestStarting | S::Testing | S::LiveStarting | S::Live, BroadcastStatus::Complete) => {
            true
        }
        _ => false,
    }
}

/// Issues lifecycle transitions for broadcasts.
#[derive(Debug, Clone)]
pub struct LifecycleDriver {
    yt: YouTubeClient,
    settle_delay: Duration,
}

impl LifecycleDriver {
    pub fn new(yt: YouTubeClient, settle_delay: Duration) -> Self {
        Self { yt, settle_delay }
    }

    /// Takes the broadcast live from whatever state it is in now.
    ///
    /// Returns the lifecycle status YouTube reported after the last transition (or the
    /// current one if nothing had to be done). Transition failures are returned as-is; nothing
    /// is retried.
    #[instrument(skip(self))]
    pub async fn start(&self, broadcast_id: &str) -> eyre::Result<BroadcastLifeCycleStatus> {
        let current = self.current_status(broadcast_id, "before starting").await?;
        let plan = plan_start(current)?;
        tracing::info!(broadcast_id, %current, ?plan, "starting broadcast");

        let mut reported = current;
        for (i, &target) in plan.transitions().iter().enumerate() {
            if i > 0 {
                tracing::debug!(delay = ?self.settle_delay, "letting YouTube settle");
                tokio::time::sleep(self.settle_delay).await;
            }
            if !is_forward(reported, target) {
                tracing::warn!(from = %reported, to = %target, "requesting unexpected transition");
            }
            reported = self
                .yt
                .transition_live_broadcast(broadcast_id, target)
                .await?
                .status
                .life_cycle_status;
        }
        Ok(reported)
    }

    /// Ends the broadcast and returns the lifecycle status YouTube reports afterwards.
    ///
    /// A broadcast that is already `complete` is left alone, so a stop can be repeated.
    /// Whether YouTube has actually reached `complete` after the request is not verified.
    #[instrument(skip(self))]
    pub async fn stop(&self, broadcast_id: &str) -> eyre::Result<BroadcastLifeCycleStatus> {
        let current = self.current_status(broadcast_id, "before ending").await?;
        match plan_stop(current)? {
            StopPlan::AlreadyComplete => {
                tracing::info!(broadcast_id, "broadcast already complete");
                Ok(current)
            }
            StopPlan::Complete => {
                tracing::info!(broadcast_id, %current, "ending broadcast");
                Ok(self
                    .yt
                    .transition_live_broadcast(broadcast_id, BroadcastStatus::Complete)
                    .await?
                    .status
                    .life_cycle_status)
            }
        }
    }

    async fn current_status(
        &self,
        broadcast_id: &str,
        when: &str,
    ) -> eyre::Result<BroadcastLifeCycleStatus> {
        let broadcast = self
            .yt
            .get_live_broadcast(broadcast_id)
            .await
            .with_context(|| format!("read broadcast status {when}"))?
            .ok_or_else(|| LifecycleError::BroadcastNotFound(broadcast_id.to_string()))?;
        Ok(broadcast.status.life_cycle_status)
    }
}
