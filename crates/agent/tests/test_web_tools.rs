//! Tests for web tools against local HTTP servers

use motorcrew_agent::tools::{ToolTrait, WebScrapeTool, WebSearchTool};
use motorcrew_config::{ScrapeConfig, SearchConfig};
use serde_json::json;

const RESULTS_PAGE: &str = r#"<html><body>
<div class="result">
  <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.tesla.com%2Fmodel3">Model 3 | Tesla</a>
  <a class="result__snippet">Up to 363 miles of range.</a>
</div>
<div class="result">
  <a class="result__a" href="https://www.edmunds.com/tesla/model-3/">2024 Tesla Model 3 Review</a>
  <a class="result__snippet">Pricing, specs and reviews.</a>
</div>
</body></html>"#;

#[test]
fn test_web_search_tool_from_config() {
    let tool = WebSearchTool::from_config(&SearchConfig::default());
    assert_eq!(tool.name(), "web_search");
    assert_eq!(
        tool.description(),
        "Search the web. Returns titles, URLs, and snippets."
    );
    let params = tool.parameters();
    assert!(params["required"]
        .as_array()
        .unwrap()
        .contains(&json!("query")));
}

#[tokio::test]
async fn test_web_search_parses_results() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/html/")
        .match_query(mockito::Matcher::UrlEncoded(
            "q".into(),
            "Tesla Model 3 specs".into(),
        ))
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(RESULTS_PAGE)
        .create_async()
        .await;

    let tool = WebSearchTool::new(format!("{}/html/", server.url()), 5, 5);
    let out = tool
        .execute(json!({"query": "Tesla Model 3 specs"}))
        .await
        .unwrap();

    mock.assert_async().await;
    assert!(out.starts_with("Results for: Tesla Model 3 specs"));
    assert!(out.contains("1. Model 3 | Tesla"));
    assert!(out.contains("https://www.tesla.com/model3"));
    assert!(out.contains("2. 2024 Tesla Model 3 Review"));
}

#[tokio::test]
async fn test_web_search_respects_max_results() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/html/")
        .match_query(mockito::Matcher::Any)
        .with_status(200)
        .with_body(RESULTS_PAGE)
        .create_async()
        .await;

    let tool = WebSearchTool::new(format!("{}/html/", server.url()), 1, 5);
    let out = tool.execute(json!({"query": "model 3"})).await.unwrap();
    assert!(out.contains("1. Model 3 | Tesla"));
    assert!(!out.contains("2. "));
}

#[tokio::test]
async fn test_web_search_no_results() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/html/")
        .match_query(mockito::Matcher::Any)
        .with_status(200)
        .with_body("<html><body><p>nothing</p></body></html>")
        .create_async()
        .await;

    let tool = WebSearchTool::new(format!("{}/html/", server.url()), 5, 5);
    let out = tool.execute(json!({"query": "zzqx"})).await.unwrap();
    assert_eq!(out, "No results for: zzqx");
}

#[tokio::test]
async fn test_web_search_empty_query() {
    let tool = WebSearchTool::from_config(&SearchConfig::default());
    let err = tool.execute(json!({"query": "   "})).await.unwrap_err();
    assert_eq!(err.message, "empty query");
}

#[tokio::test]
async fn test_web_search_backend_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/html/")
        .match_query(mockito::Matcher::Any)
        .with_status(503)
        .create_async()
        .await;

    let tool = WebSearchTool::new(format!("{}/html/", server.url()), 5, 5);
    let err = tool.execute(json!({"query": "camry"})).await.unwrap_err();
    assert_eq!(err.tool, "web_search");
    assert!(err.message.contains("503"));
}

#[test]
fn test_web_scrape_tool_default() {
    let tool = WebScrapeTool::default();
    assert_eq!(tool.name(), "web_scrape");
    assert!(tool.parameters()["required"]
        .as_array()
        .unwrap()
        .contains(&json!("url")));
}

#[tokio::test]
async fn test_web_scrape_extracts_text() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/camry")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(
            "<html><head><title>Camry Review</title><script>track()</script></head>\
             <body><h1>2024 Camry</h1><p>203 hp</p></body></html>",
        )
        .create_async()
        .await;

    let tool = WebScrapeTool::from_config(&ScrapeConfig::default());
    let out = tool
        .execute(json!({"url": format!("{}/camry", server.url())}))
        .await
        .unwrap();
    assert_eq!(out, "Camry Review\n2024 Camry\n203 hp");
}

#[tokio::test]
async fn test_web_scrape_truncates() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/long")
        .with_status(200)
        .with_body(format!("<p>{}</p>", "a".repeat(100)))
        .create_async()
        .await;

    let tool = WebScrapeTool::new(5, 10);
    let out = tool
        .execute(json!({"url": format!("{}/long", server.url())}))
        .await
        .unwrap();
    assert_eq!(out, format!("{}\n[truncated]", "a".repeat(10)));
}

#[tokio::test]
async fn test_web_scrape_not_found_is_tool_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/missing")
        .with_status(404)
        .create_async()
        .await;

    let tool = WebScrapeTool::default();
    let err = tool
        .execute(json!({"url": format!("{}/missing", server.url())}))
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("◆ TOOL ERROR [web_scrape]"));
    assert!(err.message.contains("404"));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_web_scrape_timeout_is_transient() {
    // Accepts connections into the backlog but never answers
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let tool = WebScrapeTool::new(1, 1000);
    let err = tool
        .execute(json!({"url": format!("http://{}/slow", addr)}))
        .await
        .unwrap_err();

    assert!(err.is_transient());
    assert!(err.message.contains("timed out after 1s"));
    drop(listener);
}

#[tokio::test]
async fn test_web_scrape_rejects_bad_urls() {
    let tool = WebScrapeTool::default();

    let err = tool.execute(json!({"url": "not a url"})).await.unwrap_err();
    assert!(err.message.starts_with("invalid url"));

    let err = tool
        .execute(json!({"url": "file:///etc/passwd"}))
        .await
        .unwrap_err();
    assert_eq!(err.message, "unsupported scheme: file");

    let err = tool.execute(json!({})).await.unwrap_err();
    assert!(err.message.starts_with("invalid arguments"));
}
