//! Web tools: web_search and web_scrape

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, Url};
use scraper::{Html, Node, Selector};
use serde::Deserialize;
use serde_json::json;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::debug;

use motorcrew_config::{ScrapeConfig, SearchConfig};

use super::{ToolError, ToolResult, ToolTrait};

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";
const SEARCH: &str = "web_search";
const SCRAPE: &str = "web_scrape";

/// Elements whose text is never visible
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Web search against DuckDuckGo's HTML endpoint
pub struct WebSearchTool {
    client: Client,
    endpoint: String,
    max_results: u32,
    timeout_secs: u64,
}

impl WebSearchTool {
    pub fn new(endpoint: impl Into<String>, max_results: u32, timeout_secs: u64) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            max_results,
            timeout_secs,
        }
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new(&config.endpoint, config.max_results, config.timeout_secs)
    }
}

#[derive(Deserialize)]
struct WebSearchArgs {
    query: String,
}

/// One parsed search hit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

#[async_trait]
impl ToolTrait for WebSearchTool {
    fn name(&self) -> &str {
        SEARCH
    }
    fn description(&self) -> &str {
        "Search the web. Returns titles, URLs, and snippets."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Search query" }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> ToolResult {
        let args: WebSearchArgs = serde_json::from_value(args)
            .map_err(|e| ToolError::new(SEARCH, format!("invalid arguments: {}", e)))?;
        let query = args.query.trim();
        if query.is_empty() {
            return Err(ToolError::new(SEARCH, "empty query"));
        }
        debug!("◆ SEARCH: {}", query);

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query)])
            .header("User-Agent", USER_AGENT)
            .timeout(Duration::from_secs(self.timeout_secs))
            .send()
            .await
            .map_err(|e| ToolError::from_http(SEARCH, &self.endpoint, self.timeout_secs, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::new(
                SEARCH,
                format!("search backend returned {}", status),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ToolError::from_http(SEARCH, &self.endpoint, self.timeout_secs, e))?;

        let hits = parse_search_results(&body, self.max_results as usize);
        Ok(format_hits(query, &hits))
    }
}

/// Extract result entries from a DuckDuckGo HTML results page
pub fn parse_search_results(html: &str, limit: usize) -> Vec<SearchHit> {
    let (Ok(result_sel), Ok(link_sel), Ok(snippet_sel)) = (
        Selector::parse(".result"),
        Selector::parse("a.result__a"),
        Selector::parse(".result__snippet"),
    ) else {
        return Vec::new();
    };

    let document = Html::parse_document(html);
    document
        .select(&result_sel)
        .filter_map(|result| {
            let link = result.select(&link_sel).next()?;
            let title = collapse_whitespace(&link.text().collect::<String>());
            let href = link.value().attr("href")?;
            let snippet = result
                .select(&snippet_sel)
                .next()
                .map(|s| collapse_whitespace(&s.text().collect::<String>()))
                .unwrap_or_default();
            Some(SearchHit {
                title,
                url: decode_result_url(href),
                snippet,
            })
        })
        .take(limit)
        .collect()
}

/// DuckDuckGo wraps targets as `//duckduckgo.com/l/?uddg=<encoded>`
fn decode_result_url(href: &str) -> String {
    let absolute = if href.starts_with("//") {
        format!("https:{}", href)
    } else {
        href.to_string()
    };
    Url::parse(&absolute)
        .ok()
        .and_then(|url| {
            url.query_pairs()
                .find(|(k, _)| k == "uddg")
                .map(|(_, v)| v.into_owned())
        })
        .unwrap_or(absolute)
}

fn format_hits(query: &str, hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return format!("No results for: {}", query);
    }
    let mut lines = vec![format!("Results for: {}", query)];
    for (i, hit) in hits.iter().enumerate() {
        lines.push(format!("{}. {}", i + 1, hit.title));
        lines.push(format!("   {}", hit.url));
        if !hit.snippet.is_empty() {
            lines.push(format!("   {}", hit.snippet));
        }
    }
    lines.join("\n")
}

/// Fetch a page and return its visible text
pub struct WebScrapeTool {
    client: Client,
    timeout_secs: u64,
    max_chars: usize,
}

impl WebScrapeTool {
    pub fn new(timeout_secs: u64, max_chars: usize) -> Self {
        Self {
            client: Client::new(),
            timeout_secs,
            max_chars,
        }
    }

    pub fn from_config(config: &ScrapeConfig) -> Self {
        Self::new(config.timeout_secs, config.max_chars)
    }
}

impl Default for WebScrapeTool {
    fn default() -> Self {
        Self::from_config(&ScrapeConfig::default())
    }
}

#[derive(Deserialize)]
struct WebScrapeArgs {
    url: String,
}

#[async_trait]
impl ToolTrait for WebScrapeTool {
    fn name(&self) -> &str {
        SCRAPE
    }
    fn description(&self) -> &str {
        "Fetch a URL and return the readable text of the page."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "url": { "type": "string", "description": "http(s) URL to scrape" }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> ToolResult {
        let args: WebScrapeArgs = serde_json::from_value(args)
            .map_err(|e| ToolError::new(SCRAPE, format!("invalid arguments: {}", e)))?;
        let url = Url::parse(args.url.trim())
            .map_err(|e| ToolError::new(SCRAPE, format!("invalid url {}: {}", args.url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ToolError::new(
                SCRAPE,
                format!("unsupported scheme: {}", url.scheme()),
            ));
        }
        debug!("◆ SCRAPING {}", url);

        let target = url.to_string();
        let response = self
            .client
            .get(url)
            .header("User-Agent", USER_AGENT)
            .timeout(Duration::from_secs(self.timeout_secs))
            .send()
            .await
            .map_err(|e| ToolError::from_http(SCRAPE, &target, self.timeout_secs, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::new(
                SCRAPE,
                format!("{} returned {}", target, status),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ToolError::from_http(SCRAPE, &target, self.timeout_secs, e))?;

        let text = extract_text(&body);
        if text.is_empty() {
            return Err(ToolError::new(
                SCRAPE,
                format!("no readable text at {}", target),
            ));
        }
        Ok(truncate_chars(text, self.max_chars))
    }
}

/// Visible text, one trimmed text node per line, blank lines dropped
pub fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut lines = Vec::new();

    for node in document.tree.root().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .map(|e| HIDDEN_ELEMENTS.contains(&e.name()))
                .unwrap_or(false)
        });
        if hidden {
            continue;
        }
        let line = collapse_whitespace(text);
        if !line.is_empty() {
            lines.push(line);
        }
    }

    lines.join("\n")
}

fn collapse_whitespace(text: &str) -> String {
    static WS: OnceLock<Regex> = OnceLock::new();
    let re = WS.get_or_init(|| Regex::new(r"\s+").expect("static regex"));
    re.replace_all(text.trim(), " ").into_owned()
}

fn truncate_chars(text: String, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}\n[truncated]", &text[..cut]),
        None => text,
    }
}
