//! Paginated crawl of the habr.com article listing.
//!
//! [`iter_posts`] walks `/kek/v2/articles/` page by page, one request at a
//! time, and yields the listing records in page order. The crawl ends on the
//! first empty page. A `404` for a page counts as empty. If the page number
//! reaches `max_pages` without an empty page the stream yields
//! [`Error::TooManyIterations`] and ends.

use crate::client::{HabrClient, RequestOptions};
use crate::error::{Error, Result};
use crate::models::ListingRecord;
use crate::utils::truncate_for_log;
use futures::stream::{self, Stream, TryStreamExt};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_FLOW: &str = "develop";
pub const DEFAULT_MAX_PAGES: u32 = 10_000;

/// Body of one listing page. Only `articleRefs` is of interest.
#[derive(Debug, Deserialize)]
struct ArticlesPage {
    #[serde(rename = "articleRefs")]
    article_refs: ArticleRefs,
}

/// `articleRefs` maps ref keys to records. An exhausted listing may send an
/// empty array instead of an empty object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ArticleRefs {
    Map(Map<String, Value>),
    List(Vec<Value>),
}

impl ArticleRefs {
    fn into_records(self) -> Result<Vec<ListingRecord>> {
        let values: Vec<Value> = match self {
            ArticleRefs::Map(map) => map.into_iter().map(|(_, v)| v).collect(),
            ArticleRefs::List(list) => list,
        };
        values.into_iter().map(ListingRecord::try_from).collect()
    }
}

/// Fetch one page of the listing for `flow`.
///
/// Returns an empty list when the server answers `404`.
#[instrument(level = "debug", skip(client))]
pub async fn fetch_page(client: &HabrClient, flow: &str, page: u32) -> Result<Vec<ListingRecord>> {
    let options = RequestOptions::default()
        .query("flow", flow)
        .query("sort", "all")
        .query("page", page)
        .query("fl", "ru")
        .query("hl", "ru");
    let response = client.get(&client.articles_url(), options).await?;

    let status = response.status();
    if !status.is_success() {
        let err = Error::Status {
            method: Method::GET,
            url: response.url().to_string(),
            status,
        };
        if err.is_not_found() {
            debug!(page, "listing page not found; treating as empty");
            return Ok(Vec::new());
        }
        return Err(err);
    }

    let body = response.text().await?;
    let parsed: ArticlesPage = serde_json::from_str(&body).map_err(|e| {
        warn!(page, error = %e, body = %truncate_for_log(&body, 300), "unexpected listing body");
        e
    })?;
    parsed.article_refs.into_records()
}

/// Lazily crawl every post of `flow`.
///
/// Each page is requested only when the previous one has been fully consumed.
/// The stream is forward-only; after an error or the final page it stays
/// exhausted.
///
/// # Arguments
///
/// * `client` - Shared client used for every page request
/// * `flow` - Listing flow to crawl (e.g. `"develop"`)
/// * `max_pages` - Page ceiling; pages `1..max_pages` are requested at most
///
/// # Returns
///
/// A stream of listing records in page order, then within-page order.
///
/// # Errors
///
/// The stream yields [`Error::TooManyIterations`] when page `max_pages` is
/// reached without an empty page, and any non-404 HTTP failure as is.
pub fn iter_posts(
    client: &HabrClient,
    flow: &str,
    max_pages: u32,
) -> impl Stream<Item = Result<ListingRecord>> + Send + use<> {
    let client = client.clone();
    let flow = flow.to_owned();

    stream::try_unfold(1u32, move |page| {
        let client = client.clone();
        let flow = flow.clone();
        async move {
            if page >= max_pages {
                warn!(max_pages, %flow, "listing did not end; giving up");
                return Err(Error::TooManyIterations { max_pages });
            }
            debug!(page, %flow, "scraping posts page");
            let posts = fetch_page(&client, &flow, page).await?;
            if posts.is_empty() {
                info!(pages = page - 1, %flow, "reached end of listing");
                return Ok(None);
            }
            Ok(Some((posts, page + 1)))
        }
    })
    .map_ok(|posts| stream::iter(posts.into_iter().map(Ok::<_, Error>)))
    .try_flatten()
}
