//! Web access tools: search and page retrieval.

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use std::time::Duration;

use super::{Tool, ToolError};

const USER_AGENT: &str = "Mozilla/5.0 (compatible; Newsdesk/1.0)";

/// One entry returned by the search backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub title: String,
    pub snippet: String,
    pub url: String,
}

impl SearchResult {
    fn render(&self) -> String {
        format!("**{}**\n{}\nURL: {}", self.title, self.snippet, self.url)
    }
}

/// Search the web via DuckDuckGo HTML (no API key needed). Pure query.
pub struct WebSearch;

#[async_trait]
impl Tool for WebSearch {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for information. Returns ranked results with title, snippet and URL. Use for finding news articles or current information."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                },
                "num_results": {
                    "type": "integer",
                    "description": "Maximum number of results to return (default: 5)"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let query = args["query"]
            .as_str()
            .ok_or_else(|| ToolError::recoverable("Missing 'query' argument"))?;
        let num_results = args["num_results"].as_u64().unwrap_or(5) as usize;

        let encoded_query = urlencoding::encode(query);
        let url = format!("https://html.duckduckgo.com/html/?q={}", encoded_query);

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ToolError::fault(format!("failed to build HTTP client: {e}")))?;

        let response = client
            .get(&url)
            .send()
            .await
            .map_err(|e| ToolError::recoverable(format!("search request failed: {e}")))?;
        let html = response
            .text()
            .await
            .map_err(|e| ToolError::recoverable(format!("failed to read search response: {e}")))?;

        let results = extract_ddg_results(&html, num_results);

        if results.is_empty() {
            Ok(format!("No results found for: {}", query))
        } else {
            Ok(results
                .iter()
                .map(SearchResult::render)
                .collect::<Vec<_>>()
                .join("\n\n"))
        }
    }
}

/// Extract search results from DuckDuckGo HTML.
fn extract_ddg_results(html: &str, limit: usize) -> Vec<SearchResult> {
    let mut results = Vec::new();

    for chunk in html.split("class=\"result__body\"").skip(1) {
        if results.len() >= limit {
            break;
        }

        let title = chunk
            .split("class=\"result__a\"")
            .nth(1)
            .and_then(|s| s.split('>').nth(1))
            .and_then(|s| s.split('<').next())
            .unwrap_or("");

        let snippet = chunk
            .split("class=\"result__snippet\"")
            .nth(1)
            .and_then(|s| s.split('>').nth(1))
            .and_then(|s| s.split('<').next())
            .unwrap_or("");

        let url = chunk
            .split("class=\"result__url\"")
            .nth(1)
            .and_then(|s| s.split('>').nth(1))
            .and_then(|s| s.split('<').next())
            .map(|s| s.trim())
            .unwrap_or("");

        if !title.is_empty() {
            results.push(SearchResult {
                title: html_decode(title),
                snippet: html_decode(snippet),
                url: url.to_string(),
            });
        }
    }

    results
}

/// Visit a webpage and return its content as readable text. Pure query.
pub struct VisitPage;

#[async_trait]
impl Tool for VisitPage {
    fn name(&self) -> &str {
        "visit_page"
    }

    fn description(&self) -> &str {
        "Visit a webpage at the given URL and return its content as plain text with markup stripped. Useful for reading articles found via web_search."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL of the webpage to visit"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let raw_url = args["url"]
            .as_str()
            .ok_or_else(|| ToolError::recoverable("Missing 'url' argument"))?;

        let url = url::Url::parse(raw_url)
            .map_err(|e| ToolError::recoverable(format!("invalid URL '{raw_url}': {e}")))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ToolError::recoverable(format!(
                "unsupported URL scheme: {}",
                url.scheme()
            )));
        }

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ToolError::fault(format!("failed to build HTTP client: {e}")))?;

        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| ToolError::recoverable(format!("error fetching the webpage: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::recoverable(format!("HTTP error: {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ToolError::recoverable(format!("failed to read page body: {e}")))?;

        Ok(page_to_text(&body))
    }
}

/// Convert an HTML page to readable plain text: strip scripts, styles and
/// tags, decode entities, and collapse runs of blank lines.
fn page_to_text(html: &str) -> String {
    let text = strip_element(html, "<script", "</script>");
    let text = strip_element(&text, "<style", "</style>");

    // Keep document structure: block-level closings become line breaks.
    let block_breaks = Regex::new(r"(?i)</(p|div|li|h[1-6]|tr|article|section)>|<br\s*/?>").unwrap();
    let text = block_breaks.replace_all(&text, "\n");

    let mut result = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(c),
            _ => {}
        }
    }

    let decoded = html_decode(&result);

    // Trim trailing space per line, then collapse 3+ newlines down to 2.
    let trimmed = decoded
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n");
    collapse_blank_lines(trimmed.trim())
}

/// Remove everything between an opening marker and its closing tag.
fn strip_element(html: &str, open: &str, close: &str) -> String {
    let mut text = html.to_string();
    while let Some(start) = text.find(open) {
        if let Some(end) = text[start..].find(close) {
            text.replace_range(start..start + end + close.len(), "");
        } else {
            break;
        }
    }
    text
}

/// Collapse runs of three or more newlines into exactly two.
fn collapse_blank_lines(text: &str) -> String {
    Regex::new(r"\n{3,}").unwrap().replace_all(text, "\n\n").into_owned()
}

/// Basic HTML entity decoding.
fn html_decode(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_ddg_results() {
        let html = r##"
            <div class="result__body">
            <a class="result__a" href="#">First &amp; Best</a>
            <a class="result__snippet" href="#">A snippet</a>
            <a class="result__url" href="#"> example.com/a </a>
            </div>
            <div class="result__body">
            <a class="result__a" href="#">Second</a>
            <a class="result__snippet" href="#">Another</a>
            <a class="result__url" href="#"> example.com/b </a>
            </div>
        "##;

        let results = extract_ddg_results(html, 5);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "First & Best");
        assert_eq!(results[0].snippet, "A snippet");
        assert_eq!(results[0].url, "example.com/a");
    }

    #[test]
    fn search_result_limit_is_honored() {
        let html = r##"
            <div class="result__body"><a class="result__a" href="#">One</a></div>
            <div class="result__body"><a class="result__a" href="#">Two</a></div>
            <div class="result__body"><a class="result__a" href="#">Three</a></div>
        "##;
        assert_eq!(extract_ddg_results(html, 2).len(), 2);
    }

    #[test]
    fn page_text_strips_scripts_and_collapses_blank_lines() {
        let html = "<html><head><script>var x = 1;</script><style>p{}</style></head>\
                    <body><h1>Title</h1><p>First.</p><p></p><p></p><p>Second &amp; last.</p></body></html>";
        let text = page_to_text(html);
        assert!(!text.contains("var x"));
        assert!(!text.contains("p{}"));
        assert!(text.contains("Title"));
        assert!(text.contains("Second & last."));
        assert!(!text.contains("\n\n\n"));
    }

    #[test]
    fn html_entities_are_decoded() {
        assert_eq!(html_decode("a &lt;b&gt; &quot;c&quot;"), "a <b> \"c\"");
    }

    #[test]
    fn invalid_url_is_recoverable() {
        let err = tokio_test::block_on(VisitPage.execute(json!({"url": "not a url"}))).unwrap_err();
        assert!(matches!(err, ToolError::Recoverable(_)));

        let err =
            tokio_test::block_on(VisitPage.execute(json!({"url": "ftp://host/x"}))).unwrap_err();
        assert!(err.to_string().contains("unsupported URL scheme"));
    }

    #[test]
    fn missing_query_is_recoverable() {
        let err = tokio_test::block_on(WebSearch.execute(json!({}))).unwrap_err();
        assert!(matches!(err, ToolError::Recoverable(_)));
    }

    #[test]
    fn web_tools_are_pure_queries() {
        assert!(!WebSearch.has_side_effects());
        assert!(!VisitPage.has_side_effects());
    }
}
