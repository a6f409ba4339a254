//! Command-line interface definitions.
//!
//! Every option can also be set through an environment variable. Running the
//! binary without a subcommand is the same as `habr_snippets download`.

use habr_snippets::client::{API_URL, SITE_URL};
use habr_snippets::crawler::{DEFAULT_FLOW, DEFAULT_MAX_PAGES};
use habr_snippets::downloader::{DEFAULT_EXTENSION, DEFAULT_LANGUAGE};
use habr_snippets::extract::DEFAULT_MIN_LINES;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for habr_snippets.
///
/// # Examples
///
/// ```sh
/// # Crawl the listing into data/posts.jsonl
/// habr_snippets crawl
///
/// # Download Python snippets into data/posts/
/// habr_snippets
///
/// # Rust snippets from the rust hub, 8 workers
/// habr_snippets download --hub rust --language rust --extension rs --workers 8
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Directory holding the post index and the downloaded snippets
    #[arg(short, long, env = "HABR_DATA_DIR", default_value = "data", global = true)]
    pub data_dir: PathBuf,

    /// Base URL of the site (post pages and relative paths)
    #[arg(long, env = "HABR_SITE_URL", default_value = SITE_URL, global = true)]
    pub site_url: String,

    /// Base URL of the JSON API
    #[arg(long, env = "HABR_API_URL", default_value = API_URL, global = true)]
    pub api_url: String,

    /// Per-request timeout in seconds
    #[arg(long, env = "HABR_TIMEOUT_SECS", default_value_t = 10, global = true)]
    pub timeout_secs: u64,

    /// Attempts per request while the server keeps answering 429
    #[arg(long, env = "HABR_MAX_ATTEMPTS", default_value_t = 20, global = true)]
    pub max_attempts: u32,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Crawl the article listing and write the post index
    Crawl(CrawlArgs),
    /// Download code snippets for indexed posts of one hub
    Download(DownloadArgs),
}

#[derive(Args, Debug)]
pub struct CrawlArgs {
    /// Listing flow to crawl
    #[arg(long, env = "HABR_FLOW", default_value = DEFAULT_FLOW)]
    pub flow: String,

    /// Give up if the listing has not ended before this page number
    #[arg(long, default_value_t = DEFAULT_MAX_PAGES)]
    pub max_pages: u32,
}

#[derive(Args, Debug, Clone)]
pub struct DownloadArgs {
    /// Only posts tagged with this hub alias are downloaded
    #[arg(long, env = "HABR_HUB", default_value = "python")]
    pub hub: String,

    /// Highlight language of the code blocks to collect
    #[arg(long, env = "HABR_LANGUAGE", default_value = DEFAULT_LANGUAGE)]
    pub language: String,

    /// Extension of the snippet files
    #[arg(long, default_value = DEFAULT_EXTENSION)]
    pub extension: String,

    /// Keep snippets with more lines than this
    #[arg(long, default_value_t = DEFAULT_MIN_LINES)]
    pub min_lines: usize,

    /// Posts processed in parallel (defaults to min(32, CPUs + 4))
    #[arg(short, long, env = "HABR_WORKERS")]
    pub workers: Option<usize>,
}

impl Default for DownloadArgs {
    fn default() -> Self {
        Self {
            hub: "python".to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            extension: DEFAULT_EXTENSION.to_string(),
            min_lines: DEFAULT_MIN_LINES,
            workers: None,
        }
    }
}
