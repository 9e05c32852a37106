//! Web tools: search and page text extraction.
//!
//! Search uses DuckDuckGo's HTML endpoint, which needs no API key. Both tools
//! reduce HTML to plain text before handing it to the model.

use async_trait::async_trait;
use regex_lite::Regex;
use reqwest::Url;
use std::time::Duration;
use taskclaw_core::error::ToolError;
use taskclaw_core::tool::{Tool, ToolArgs, ToolExecutionContext, required_arg};
use tracing::debug;

const SEARCH_ENDPOINT: &str = "https://html.duckduckgo.com/html/";
const USER_AGENT: &str = concat!("taskclaw/", env!("CARGO_PKG_VERSION"));

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_default()
}

fn request_failure(tool: &str, e: impl std::fmt::Display) -> ToolError {
    ToolError::ExecutionFailed {
        tool_name: tool.into(),
        reason: e.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

pub struct WebSearchTool {
    client: reqwest::Client,
    max_results: usize,
}

impl WebSearchTool {
    pub fn new(max_results: usize) -> Self {
        Self {
            client: http_client(),
            max_results,
        }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "websearch"
    }

    fn description(&self) -> &str {
        "Search the web. Returns numbered results with title, URL and snippet."
    }

    fn arguments(&self) -> &'static [&'static str] {
        &["query"]
    }

    async fn execute(
        &self,
        args: &ToolArgs,
        _context: &mut ToolExecutionContext,
    ) -> Result<String, ToolError> {
        let query = required_arg(args, self.name(), "query")?.trim();
        if query.is_empty() {
            return Err(ToolError::InvalidArguments("websearch: empty query".into()));
        }
        debug!(query = %query, "Searching the web");

        let html = self
            .client
            .get(SEARCH_ENDPOINT)
            .query(&[("q", query)])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| request_failure(self.name(), e))?
            .text()
            .await
            .map_err(|e| request_failure(self.name(), e))?;

        let hits = parse_search_results(&html, self.max_results)
            .map_err(|e| request_failure(self.name(), e))?;
        Ok(format_hits(query, &hits))
    }
}

pub fn format_hits(query: &str, hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return format!("No results found for \"{query}\".");
    }
    hits.iter()
        .enumerate()
        .map(|(i, hit)| format!("{}. {}\n   {}\n   {}\n", i + 1, hit.title, hit.url, hit.snippet))
        .collect()
}

/// Pull result titles, links and snippets out of a DuckDuckGo HTML page.
pub fn parse_search_results(html: &str, limit: usize) -> Result<Vec<SearchHit>, regex_lite::Error> {
    let links = Regex::new(r#"(?s)<a[^>]*class="result__a"[^>]*href="([^"]*)"[^>]*>(.*?)</a>"#)?;
    let snippets = Regex::new(r#"(?s)<a[^>]*class="result__snippet"[^>]*>(.*?)</a>"#)?;
    let tags = Regex::new(r"(?s)<[^>]*>")?;

    let snippet_texts: Vec<String> = snippets
        .captures_iter(html)
        .map(|c| clean_fragment(&tags, &c[1]))
        .collect();

    Ok(links
        .captures_iter(html)
        .take(limit)
        .enumerate()
        .map(|(i, c)| SearchHit {
            title: clean_fragment(&tags, &c[2]),
            url: resolve_result_url(&decode_entities(&c[1])),
            snippet: snippet_texts.get(i).cloned().unwrap_or_default(),
        })
        .collect())
}

/// Result links point at a redirector; the target is in its `uddg` parameter.
fn resolve_result_url(href: &str) -> String {
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_string()
    };
    Url::parse(&absolute)
        .ok()
        .and_then(|url| {
            url.query_pairs()
                .find(|(key, _)| key == "uddg")
                .map(|(_, target)| target.into_owned())
        })
        .unwrap_or(absolute)
}

fn clean_fragment(tags: &Regex, fragment: &str) -> String {
    collapse_whitespace(&decode_entities(&tags.replace_all(fragment, "")))
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Reduce an HTML document to its visible text.
pub fn html_to_text(html: &str) -> Result<String, regex_lite::Error> {
    let hidden = Regex::new(r"(?is)<(script|style|noscript)[^>]*>.*?</(script|style|noscript)>")?;
    let comments = Regex::new(r"(?s)<!--.*?-->")?;
    let tags = Regex::new(r"(?s)<[^>]*>")?;

    let text = hidden.replace_all(html, " ");
    let text = comments.replace_all(&text, " ");
    let text = tags.replace_all(&text, " ");
    Ok(collapse_whitespace(&decode_entities(&text)))
}

/// Cut `text` to at most `max_chars` characters.
fn truncate_chars(text: String, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}... [truncated]", &text[..cut]),
        None => text,
    }
}

pub struct WebPageTextTool {
    client: reqwest::Client,
    max_chars: usize,
}

impl WebPageTextTool {
    pub fn new(max_chars: usize) -> Self {
        Self {
            client: http_client(),
            max_chars,
        }
    }
}

#[async_trait]
impl Tool for WebPageTextTool {
    fn name(&self) -> &str {
        "gettextfromwebpage"
    }

    fn description(&self) -> &str {
        "Fetch a web page and return its readable text."
    }

    fn arguments(&self) -> &'static [&'static str] {
        &["url"]
    }

    async fn execute(
        &self,
        args: &ToolArgs,
        _context: &mut ToolExecutionContext,
    ) -> Result<String, ToolError> {
        let url = required_arg(args, self.name(), "url")?.trim();
        let url = Url::parse(url).map_err(|e| {
            ToolError::InvalidArguments(format!("gettextfromwebpage: invalid url '{url}': {e}"))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ToolError::InvalidArguments(format!(
                "gettextfromwebpage: unsupported scheme '{}'",
                url.scheme()
            )));
        }
        debug!(url = %url, "Fetching web page");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| request_failure(self.name(), e))?;
        let status = response.status();
        if !status.is_success() {
            return Ok(format!("Failed to fetch \"{url}\": HTTP {status}"));
        }
        let html = response
            .text()
            .await
            .map_err(|e| request_failure(self.name(), e))?;

        let text = html_to_text(&html).map_err(|e| request_failure(self.name(), e))?;
        if text.is_empty() {
            return Ok(format!("No readable text found at \"{url}\""));
        }
        Ok(truncate_chars(text, self.max_chars))
    }
}
