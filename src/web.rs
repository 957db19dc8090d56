//! Web fallback: find a Stack Overflow question for a phrase and return
//! its text.
//!
//! Nothing in the lookup path depends on this module; it is only reached
//! from the `stackoverflow` command.

use std::time::Duration;

use async_trait::async_trait;
use percent_encoding::{NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

use crate::{
    error::{Error, Result},
    text_util::apply_line_limits,
};

const DDG_HTML_URL: &str = "https://html.duckduckgo.com/html/";
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const TIMEOUT_SECS: u64 = 15;
const MAX_RESPONSE_BYTES: usize = 5 * 1024 * 1024;
const MAX_RESULTS: usize = 20;
const TEXT_WIDTH: usize = 80;
const QUESTION_PREFIX: &str = "https://stackoverflow.com/questions/";

/// Search-and-scrape collaborator.
#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Candidate page URLs for `query`, best first.
    async fn search_web(&self, query: &str) -> Result<Vec<String>>;

    /// Plain-text rendering of the page at `url`.
    async fn fetch_page(&self, url: &str) -> Result<String>;
}

/// A page found by [`first_page`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub url: String,
    pub text: String,
}

/// Search, then fetch the first candidate, cut to `max_lines`. Returns
/// `None` when the search found nothing.
pub async fn first_page(
    web: &dyn WebSearch,
    query: &str,
    max_lines: Option<usize>,
) -> Result<Option<Page>> {
    let urls = web.search_web(query).await?;
    let Some(url) = urls.into_iter().next() else {
        return Ok(None);
    };
    tracing::debug!(%url, "fetching web page");
    let text = web.fetch_page(&url).await?;
    Ok(Some(Page {
        text: apply_line_limits(&text, 1, max_lines),
        url,
    }))
}

/// DuckDuckGo search restricted to Stack Overflow questions.
#[derive(Debug, Clone)]
pub struct StackOverflow {
    client: reqwest::Client,
}

impl StackOverflow {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl WebSearch for StackOverflow {
    async fn search_web(&self, query: &str) -> Result<Vec<String>> {
        let query = format!("site:stackoverflow.com {query}");
        let html = self
            .client
            .post(DDG_HTML_URL)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(format!(
                "q={}&b=",
                utf8_percent_encode(&query, NON_ALPHANUMERIC)
            ))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let links = parse_result_links(&html, MAX_RESULTS);
        tracing::debug!(found = links.len(), "search results");
        Ok(question_links(links))
    }

    async fn fetch_page(&self, url: &str) -> Result<String> {
        let bytes = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        if bytes.len() > MAX_RESPONSE_BYTES {
            return Err(Error::Fetch {
                path: url.to_string(),
                reason: format!("response too large: {} bytes", bytes.len()),
            });
        }

        html2text::from_read(&bytes[..], TEXT_WIDTH).map_err(|e| Error::Fetch {
            path: url.to_string(),
            reason: format!("html2text: {e}"),
        })
    }
}

/// Keep Stack Overflow question pages, first occurrence only.
pub fn question_links(urls: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for url in urls {
        let url = url.replacen("http://", "https://", 1);
        if url.starts_with(QUESTION_PREFIX) && !out.contains(&url) {
            out.push(url);
        }
    }
    out
}

/// Destination URLs of the result links on a DuckDuckGo HTML page.
fn parse_result_links(html: &str, max_results: usize) -> Vec<String> {
    const MARKER: &str = "class=\"result__a\"";

    let mut links = Vec::new();
    let mut pos = 0;

    while links.len() < max_results {
        let Some(found) = html[pos..].find(MARKER) else {
            break;
        };
        let marker_pos = pos + found;
        pos = marker_pos + MARKER.len();

        let Some(a_start) = html[..marker_pos].rfind("<a ") else {
            continue;
        };
        let Some(tag_len) = html[a_start..].find('>') else {
            break;
        };
        let tag = &html[a_start..a_start + tag_len];
        if let Some(href) = extract_attr(tag, "href") {
            let url = resolve_redirect(&href);
            if !url.is_empty() {
                links.push(url);
            }
        }
    }

    links
}

/// DuckDuckGo wraps result links as `//duckduckgo.com/l/?uddg=<encoded>`.
fn resolve_redirect(href: &str) -> String {
    if let Some(rest) = href
        .strip_prefix("//duckduckgo.com/l/?uddg=")
        .or_else(|| href.strip_prefix("/l/?uddg="))
    {
        let encoded = rest.split('&').next().unwrap_or(rest);
        percent_decode_str(encoded)
            .decode_utf8()
            .map(|s| s.into_owned())
            .unwrap_or_default()
    } else if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else {
        String::new()
    }
}

fn extract_attr(tag: &str, attr: &str) -> Option<String> {
    let pattern = format!("{attr}=\"");
    let start = tag.find(&pattern)? + pattern.len();
    let end = tag[start..].find('"')? + start;
    Some(html_decode(&tag[start..end]))
}

fn html_decode(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
}
