//! Envelope types shared by the YouTube `*.list` endpoints.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Response structure shared by the `liveBroadcasts.list` and `liveStreams.list` calls.
///
/// See: <https://developers.google.com/youtube/v3/live/docs/liveBroadcasts/list>
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse<T> {
    /// Identifies the API resource's type, e.g. `youtube#liveBroadcastListResponse`.
    #[serde(default)]
    pub kind: String,
    pub items: VecDeque<T>,
    #[serde(default)]
    pub page_info: PageInfo,
    /// Token for the next page of results, if there is one.
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Paging details for lists of resources.
///
/// See: <https://developers.google.com/youtube/v3/docs/pageInfo>
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    /// The total number of results in the result set.
    pub total_results: u32,
    /// The number of results included in the API response.
    pub results_per_page: u32,
}
