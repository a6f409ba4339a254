//! Concurrent snippet download.
//!
//! Each post goes through fetch, extract, filter and write, strictly in that
//! order. Up to `workers` posts are in flight at once and finish in any order.
//!
//! # Idempotence
//!
//! The artifact `{output_dir}/{id}.{extension}` is the only record that a
//! post is done. A post whose artifact exists is skipped without a request.
//! Posts without qualifying snippets leave no artifact and are looked at
//! again on the next run. Artifacts are written under a `.part` name and
//! renamed into place, so an interrupted write never counts as done.
//!
//! # Failures
//!
//! A failing post does not stop the others. Every post is run to completion,
//! then the first failure (in completion order) is returned.

use crate::client::HabrClient;
use crate::error::{Error, Result};
use crate::extract::{SnippetFilter, extract_snippets, join_snippets};
use crate::models::PostId;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::fs;
use tracing::{debug, error, info, instrument, warn};

pub const DEFAULT_LANGUAGE: &str = "python";
pub const DEFAULT_EXTENSION: &str = "py";

/// What to extract and how to name artifacts.
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Highlight class of the code blocks to collect.
    pub language: String,
    /// Artifact file extension, without the dot.
    pub extension: String,
    pub filter: SnippetFilter,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            extension: DEFAULT_EXTENSION.to_string(),
            filter: SnippetFilter::default(),
        }
    }
}

/// Result of processing one post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostOutcome {
    /// Artifact written with this many snippets.
    Written { snippets: usize },
    /// Artifact already present.
    Skipped,
    /// No snippet passed the filter; nothing written.
    NoSnippets,
}

/// Counters for one [`Downloader::download`] run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    /// Distinct posts submitted.
    pub submitted: usize,
    /// Repeated ids dropped before submission.
    pub duplicates: usize,
    pub written: usize,
    pub skipped: usize,
    pub empty: usize,
    pub failed: usize,
}

impl DownloadReport {
    fn record(&mut self, outcome: &Result<PostOutcome>) {
        match outcome {
            Ok(PostOutcome::Written { .. }) => self.written += 1,
            Ok(PostOutcome::Skipped) => self.skipped += 1,
            Ok(PostOutcome::NoSnippets) => self.empty += 1,
            Err(_) => self.failed += 1,
        }
    }
}

#[derive(Debug)]
pub struct Downloader {
    client: HabrClient,
    output_dir: PathBuf,
    options: DownloadOptions,
}

impl Downloader {
    pub fn new(client: HabrClient, output_dir: impl Into<PathBuf>, options: DownloadOptions) -> Self {
        Self {
            client,
            output_dir: output_dir.into(),
            options,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Where the artifact for `id` lives.
    pub fn artifact_path(&self, id: &PostId) -> PathBuf {
        self.output_dir
            .join(format!("{id}.{}", self.options.extension))
    }

    /// Run the fetch, extract, filter and write pipeline for one post.
    #[instrument(level = "debug", skip_all, fields(%id))]
    pub async fn process_post(&self, id: &PostId) -> Result<PostOutcome> {
        let out_path = self.artifact_path(id);
        if fs::try_exists(&out_path).await? {
            debug!(path = %out_path.display(), "artifact exists; skipping");
            return Ok(PostOutcome::Skipped);
        }

        let html = self.client.fetch_post_html(id).await?;

        // HTML parsing is CPU-bound; keep it off the async workers.
        let language = self.options.language.clone();
        let snippets =
            tokio::task::spawn_blocking(move || extract_snippets(&html, &language)).await??;
        let found = snippets.len();

        let kept = self.options.filter.keep(snippets);
        if kept.is_empty() {
            debug!(found, "no snippet long enough; nothing written");
            return Ok(PostOutcome::NoSnippets);
        }

        let part_path = self
            .output_dir
            .join(format!("{id}.{}.part", self.options.extension));
        fs::write(&part_path, join_snippets(&kept)).await?;
        fs::rename(&part_path, &out_path).await?;

        debug!(found, kept = kept.len(), path = %out_path.display(), "wrote snippets");
        Ok(PostOutcome::Written {
            snippets: kept.len(),
        })
    }

    /// Process every post in `ids` with up to `workers` posts in flight.
    ///
    /// Ids that name the same artifact (`1` and `"1"`) are processed once.
    ///
    /// # Arguments
    ///
    /// * `ids` - Posts to process, in submission order
    /// * `workers` - Maximum number of posts in flight (at least 1)
    ///
    /// # Returns
    ///
    /// A [`DownloadReport`] with per-outcome counts when every post succeeded.
    ///
    /// # Errors
    ///
    /// All posts are awaited first; if any failed, the first failure observed
    /// is returned as [`Error::Post`] carrying the post id.
    #[instrument(level = "info", skip_all, fields(output_dir = %self.output_dir.display()))]
    pub async fn download<I>(&self, ids: I, workers: usize) -> Result<DownloadReport>
    where
        I: IntoIterator<Item = PostId>,
    {
        let t0 = Instant::now();
        let workers = workers.max(1);

        let mut seen = HashSet::new();
        let mut report = DownloadReport::default();
        let mut unique = Vec::new();
        for id in ids {
            // Dedupe on the artifact stem so two ids never share one file.
            if seen.insert(id.to_string()) {
                unique.push(id);
            } else {
                report.duplicates += 1;
            }
        }
        report.submitted = unique.len();
        let total = unique.len();
        info!(total, duplicates = report.duplicates, workers, "submitting posts");

        let mut done = 0usize;
        let mut first_failure: Option<Error> = None;
        let mut completions = stream::iter(unique)
            .map(|id| async move {
                let outcome = self.process_post(&id).await;
                (id, outcome)
            })
            .buffer_unordered(workers);

        while let Some((id, outcome)) = completions.next().await {
            done += 1;
            report.record(&outcome);
            match outcome {
                Ok(outcome) => debug!(done, total, %id, ?outcome, "processed post"),
                Err(e) => {
                    error!(done, total, %id, error = %e, "post failed");
                    first_failure.get_or_insert(Error::for_post(&id, e));
                }
            }
        }

        let elapsed = t0.elapsed();
        info!(
            submitted = report.submitted,
            written = report.written,
            skipped = report.skipped,
            empty = report.empty,
            failed = report.failed,
            secs = elapsed.as_secs(),
            "download finished"
        );

        match first_failure {
            Some(e) => {
                warn!(failed = report.failed, "returning first failure");
                Err(e)
            }
            None => Ok(report),
        }
    }
}
