//! Error types shared by the client, crawler, extractor and downloader.
//!
//! Rate limiting is the only failure recovered inside the client. Everything
//! else surfaces here and is handled (or not) by the caller:
//!
//! - a listing page answering `404` is turned into an empty page by the crawler
//! - [`Error::TooManyIterations`] means the listing never ran dry
//! - [`Error::MissingContent`] means a post page did not have the expected layout
//! - [`Error::Post`] wraps any failure of a single downloader item with its id

use crate::models::PostId;
use reqwest::{Method, StatusCode};
use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Transport-level failure (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a status the caller does not accept.
    #[error("{method} {url} returned {status}")]
    Status {
        method: Method,
        url: String,
        status: StatusCode,
    },

    /// Every attempt was answered with `429 Too Many Requests`.
    #[error("{method} {url} still rate limited after {attempts} attempts")]
    RateLimited {
        method: Method,
        url: String,
        attempts: u32,
    },

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// The listing kept returning posts up to the page ceiling.
    #[error("listing did not run out of posts before page {max_pages}")]
    TooManyIterations { max_pages: u32 },

    /// The post page has no element matching the content region marker.
    #[error("content region `{marker}` not found in document")]
    MissingContent { marker: &'static str },

    #[error("invalid listing record: {0}")]
    InvalidRecord(String),

    #[error("invalid selector `{0}`")]
    Selector(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// Failure while processing a single post in the downloader.
    #[error("post {id}: {source}")]
    Post {
        id: PostId,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub fn for_post(id: &PostId, source: Error) -> Self {
        Error::Post {
            id: id.clone(),
            source: Box::new(source),
        }
    }

    /// True when the server answered `404 Not Found`.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Status { status, .. } if *status == StatusCode::NOT_FOUND)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_error_mentions_id_and_cause() {
        let id = PostId::from(42u64);
        let err = Error::for_post(
            &id,
            Error::MissingContent {
                marker: "div#post-content-body",
            },
        );
        let msg = err.to_string();
        assert!(msg.starts_with("post 42:"));
        assert!(msg.contains("div#post-content-body"));
    }

    #[test]
    fn test_is_not_found() {
        let not_found = Error::Status {
            method: Method::GET,
            url: "https://habr.com/x".to_string(),
            status: StatusCode::NOT_FOUND,
        };
        let server_error = Error::Status {
            method: Method::GET,
            url: "https://habr.com/x".to_string(),
            status: StatusCode::INTERNAL_SERVER_ERROR,
        };
        assert!(not_found.is_not_found());
        assert!(!server_error.is_not_found());
        assert!(!Error::TooManyIterations { max_pages: 3 }.is_not_found());
    }
}
