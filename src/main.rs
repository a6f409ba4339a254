//! # habr_snippets
//!
//! Collects code snippets from habr.com posts.
//!
//! ## Usage
//!
//! ```sh
//! habr_snippets crawl       # build data/posts.jsonl from the listing
//! habr_snippets             # download python snippets into data/posts/
//! ```
//!
//! ## Architecture
//!
//! 1. **Crawl**: page through the listing, append each record to the index
//! 2. **Filter**: scan the index for posts tagged with the requested hub
//! 3. **Download**: fetch, extract and write snippets, several posts at a time

use clap::Parser;
use futures::{StreamExt, TryStreamExt};
use habr_snippets::client::{ClientConfig, HabrClient, RetryPolicy};
use habr_snippets::crawler::iter_posts;
use habr_snippets::downloader::{DownloadOptions, DownloadReport, Downloader};
use habr_snippets::extract::SnippetFilter;
use habr_snippets::index::{INDEX_FILE_NAME, IndexWriter, filter_by_hub, read_index};
use habr_snippets::models::PostId;
use habr_snippets::utils::{default_worker_count, ensure_writable_dir};
use habr_snippets::Result;
use std::error::Error;
use std::path::Path;
use std::pin::pin;
use std::time::Duration;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};
use url::Url;

mod cli;

use cli::{Cli, Command, CrawlArgs, DownloadArgs};

/// Name of the snippet directory inside the data directory.
const POSTS_DIR_NAME: &str = "posts";

/// Records between crawl progress lines.
const CRAWL_PROGRESS_EVERY: u64 = 100;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let client = HabrClient::new(client_config(&args)?)?;
    debug!(?client, "HTTP client ready");

    match args.command {
        Some(Command::Crawl(crawl)) => {
            let written = fetch_posts(&client, &args.data_dir, &crawl).await?;
            info!(written, "Crawl complete");
        }
        Some(Command::Download(download)) => {
            download_snippets(&client, &args.data_dir, &download).await?;
        }
        None => {
            download_snippets(&client, &args.data_dir, &DownloadArgs::default()).await?;
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}

fn client_config(args: &Cli) -> std::result::Result<ClientConfig, url::ParseError> {
    Ok(ClientConfig {
        site_url: Url::parse(&args.site_url)?,
        api_url: Url::parse(&args.api_url)?,
        timeout: Duration::from_secs(args.timeout_secs),
        retry: RetryPolicy {
            max_attempts: args.max_attempts.max(1),
            ..RetryPolicy::default()
        },
    })
}

/// Crawl the listing into `{data_dir}/posts.jsonl`.
///
/// Records are flushed one by one; when the crawl fails, everything read up
/// to that point stays in the index.
#[instrument(level = "info", skip_all, fields(flow = %args.flow))]
async fn fetch_posts(client: &HabrClient, data_dir: &Path, args: &CrawlArgs) -> Result<u64> {
    ensure_writable_dir(data_dir).await?;
    let mut writer = IndexWriter::create(data_dir.join(INDEX_FILE_NAME)).await?;
    let mut posts = pin!(iter_posts(client, &args.flow, args.max_pages));

    while let Some(post) = posts.next().await {
        let post = match post {
            Ok(post) => post,
            Err(e) => {
                error!(
                    written = writer.written(),
                    path = %writer.path().display(),
                    error = %e,
                    "Crawl aborted; index keeps the records written so far"
                );
                return Err(e);
            }
        };
        writer.append(&post).await?;
        if writer.written() % CRAWL_PROGRESS_EVERY == 0 {
            info!(written = writer.written(), "Crawl progress");
        }
    }

    Ok(writer.written())
}

/// Download snippets for every indexed post tagged with `args.hub`.
#[instrument(level = "info", skip_all, fields(hub = %args.hub, language = %args.language))]
async fn download_snippets(
    client: &HabrClient,
    data_dir: &Path,
    args: &DownloadArgs,
) -> Result<DownloadReport> {
    let posts_dir = data_dir.join(POSTS_DIR_NAME);
    ensure_writable_dir(&posts_dir).await?;

    let records = read_index(data_dir.join(INDEX_FILE_NAME)).await?;
    let ids: Vec<PostId> = filter_by_hub(records, &args.hub)
        .map_ok(|record| record.id().clone())
        .try_collect()
        .await?;
    info!(matching = ids.len(), "Selected posts from index");

    let downloader = Downloader::new(
        client.clone(),
        posts_dir,
        DownloadOptions {
            language: args.language.clone(),
            extension: args.extension.clone(),
            filter: SnippetFilter {
                min_lines: args.min_lines,
            },
        },
    );
    let workers = args.workers.unwrap_or_else(default_worker_count);
    info!(workers, output_dir = %downloader.output_dir().display(), "Starting download");

    downloader.download(ids, workers).await
}
