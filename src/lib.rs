//! # habr_snippets
//!
//! Collects code snippets from habr.com posts in two stages:
//!
//! 1. **Crawl**: walk the paginated article listing of a flow and append every
//!    listing record to a JSON-lines index ([`crawler`], [`index`])
//! 2. **Download**: pick the indexed posts of one hub, fetch each post page,
//!    pull out the code blocks of one language and write the long ones to
//!    `{id}.{ext}`, a few posts at a time ([`downloader`], [`extract`])
//!
//! All HTTP goes through one shared [`client::HabrClient`], which backs off
//! while the site answers `429 Too Many Requests`.

pub mod client;
pub mod crawler;
pub mod downloader;
pub mod error;
pub mod extract;
pub mod index;
pub mod models;
pub mod utils;

pub use client::{ClientConfig, HabrClient, RequestOptions, RetryPolicy};
pub use downloader::{DownloadOptions, DownloadReport, Downloader, PostOutcome};
pub use error::{Error, Result};
pub use models::{ListingRecord, PostId, Snippet};
