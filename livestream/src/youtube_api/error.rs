//! Failure classes for calls to the YouTube Data API.

use http::{Method, StatusCode};
use thiserror::Error;

/// Why a YouTube API call did not produce a usable response.
///
/// These are wrapped into [`eyre::Report`]s by the client; use
/// [`eyre::Report::downcast_ref`] to tell them apart.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No valid access token could be produced; no request was sent.
    #[error("not signed in to YouTube (no valid access token)")]
    NotAuthenticated,

    /// YouTube answered with a non-2xx status. `body` is the response body as received.
    #[error("YouTube API {method} request failed with status {status}: {body}")]
    Rejected {
        method: Method,
        url: String,
        status: StatusCode,
        body: String,
    },

    /// The request could not be completed at all.
    #[error("send {method} request to YouTube API: {url}")]
    Transport {
        method: Method,
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ApiError {
    /// Finds an [`ApiError`] anywhere in a report's chain.
    pub fn find(report: &eyre::Report) -> Option<&ApiError> {
        report.chain().find_map(|e| e.downcast_ref::<ApiError>())
    }
}
