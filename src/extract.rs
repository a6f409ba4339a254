//! Code snippet extraction from post pages.
//!
//! A post body lives in `div#post-content-body`. Code blocks inside it carry
//! the highlight language as a class, e.g. `<code class="python">`. The
//! extractor returns every block of the requested language, in document
//! order, unfiltered; [`SnippetFilter`] decides which ones are worth keeping.

use crate::error::{Error, Result};
use crate::models::Snippet;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};

/// Marker of the content region inside a post page.
pub const CONTENT_MARKER: &str = "div#post-content-body";

/// Placed between snippets in an output artifact.
pub const SNIPPETS_DELIMITER: &str = "\n\n# ----------------------------------------\n\n";

pub const DEFAULT_MIN_LINES: usize = 4;

static CONTENT_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse(CONTENT_MARKER).unwrap());

/// Selector for code blocks tagged with `language`.
fn code_selector(language: &str) -> Result<Selector> {
    let valid = !language.is_empty()
        && language
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(Error::Selector(format!("code.{language}")));
    }
    Selector::parse(&format!("code.{language}"))
        .map_err(|e| Error::Selector(format!("code.{language}: {e:?}")))
}

/// Extract the text of every `code.{language}` block in the content region.
///
/// Fails with [`Error::MissingContent`] when the page has no content region.
pub fn extract_snippets(html: &str, language: &str) -> Result<Vec<Snippet>> {
    let selector = code_selector(language)?;
    let document = Html::parse_document(html);
    let content = document
        .select(&CONTENT_SELECTOR)
        .next()
        .ok_or(Error::MissingContent {
            marker: CONTENT_MARKER,
        })?;

    Ok(content
        .select(&selector)
        .map(|code| Snippet::new(code.text().collect::<String>()))
        .collect())
}

/// Minimum-size policy for snippets worth saving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnippetFilter {
    /// A snippet is kept only when it has strictly more lines than this.
    pub min_lines: usize,
}

impl Default for SnippetFilter {
    fn default() -> Self {
        Self {
            min_lines: DEFAULT_MIN_LINES,
        }
    }
}

impl SnippetFilter {
    pub fn keep(&self, snippets: Vec<Snippet>) -> Vec<Snippet> {
        snippets
            .into_iter()
            .filter(|s| s.line_count() > self.min_lines)
            .collect()
    }
}

/// Artifact content for a set of snippets, in the given order.
pub fn join_snippets(snippets: &[Snippet]) -> String {
    snippets
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(SNIPPETS_DELIMITER)
}
