use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use pagedeck_core::{CoreError, PageTextProvider};
use tokio::io::AsyncReadExt;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("cannot convert HTML: {0}")]
    Render(String),

    #[error("page has no visible text")]
    Empty,
}

impl From<PageError> for CoreError {
    fn from(e: PageError) -> Self {
        CoreError::Extraction(e.to_string())
    }
}

/// Reduce `raw` to visible text when it is an HTML document.
fn page_text(raw: String) -> Result<String, PageError> {
    let text = if looks_like_html(&raw) {
        html_to_text(&raw)?
    } else {
        raw
    };
    non_empty(text)
}

fn non_empty(text: String) -> Result<String, PageError> {
    if text.trim().is_empty() {
        Err(PageError::Empty)
    } else {
        Ok(text)
    }
}

/// Reads a saved page (plain text or HTML) from disk.
pub struct FilePage {
    path: PathBuf,
}

impl FilePage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl PageTextProvider for FilePage {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn capture(&self, _tab: &str) -> pagedeck_core::Result<String> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(PageError::from)?;
        Ok(page_text(raw)?)
    }
}

/// Reads page text piped on stdin.
pub struct StdinPage;

#[async_trait]
impl PageTextProvider for StdinPage {
    fn name(&self) -> &'static str {
        "stdin"
    }

    async fn capture(&self, _tab: &str) -> pagedeck_core::Result<String> {
        let mut raw = String::new();
        tokio::io::stdin()
            .read_to_string(&mut raw)
            .await
            .map_err(PageError::from)?;
        Ok(page_text(raw)?)
    }
}

/// Fetches a page over HTTP and reduces it to its visible text.
pub struct UrlPage {
    client: reqwest::Client,
}

impl UrlPage {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("pagedeck/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

#[async_trait]
impl PageTextProvider for UrlPage {
    fn name(&self) -> &'static str {
        "url"
    }

    async fn capture(&self, tab: &str) -> pagedeck_core::Result<String> {
        let response = self
            .client
            .get(tab)
            .send()
            .await
            .map_err(|e| PageError::Fetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PageError::Fetch(format!("{tab} returned {status}")).into());
        }

        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map_or(true, |ct| ct.contains("html"));

        let body = response
            .text()
            .await
            .map_err(|e| PageError::Fetch(e.to_string()))?;
        debug!(url = %tab, bytes = body.len(), is_html, "page fetched");

        let text = if is_html { html_to_text(&body)? } else { body };
        Ok(non_empty(text)?)
    }
}

fn looks_like_html(raw: &str) -> bool {
    let head: String = raw.trim_start().chars().take(256).collect::<String>().to_lowercase();
    head.starts_with("<!doctype html") || head.starts_with("<html") || head.contains("<body")
}

/// Wrap width handed to the renderer. Wide enough that prose keeps its lines.
const TEXT_WIDTH: usize = 120;

/// Render an HTML document to the text a reader would see.
///
/// Non-rendered elements (head, script, style) are dropped and entities are
/// decoded by the renderer. Blank lines are removed from the result.
pub fn html_to_text(html: &str) -> Result<String, PageError> {
    let rendered = html2text::from_read(html.as_bytes(), TEXT_WIDTH)
        .map_err(|e| PageError::Render(e.to_string()))?;

    Ok(rendered
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_to_text_should_keep_visible_text_only() {
        let html = r#"<!DOCTYPE html>
<html><head><title>Tab title</title><style>p { color: red; }</style></head>
<body>
  <h1>Photosynthesis</h1>
  <script>var x = "hidden";</script>
  <p>Converts light to chemical energy.</p>
  <!-- comment -->
</body></html>"#;

        let text = html_to_text(html).unwrap();
        assert!(text.contains("Photosynthesis"));
        assert!(text.contains("Converts light to chemical energy."));
        assert!(!text.contains("hidden"));
        assert!(!text.contains("color: red"));
        assert!(!text.contains("comment"));
        assert!(!text.contains('<'));
    }

    #[test]
    fn html_to_text_should_decode_numeric_and_named_entities() {
        let html = "<body><p>It&#8217;s caf&eacute; &mdash; 5&#x2009;kg</p></body>";
        let text = html_to_text(html).unwrap();

        assert!(text.contains("It\u{2019}s caf\u{e9} \u{2014} 5"));
        assert!(text.ends_with("kg"));
        assert!(!text.contains('&'));
    }

    #[test]
    fn html_to_text_should_not_double_decode() {
        assert_eq!(html_to_text("<p>&amp;lt;</p>").unwrap(), "&lt;");
    }

    #[test]
    fn html_to_text_should_ignore_attribute_values() {
        let html = r#"<body><p title="a > b">visible</p></body>"#;
        assert_eq!(html_to_text(html).unwrap(), "visible");
    }

    #[test]
    fn html_to_text_should_break_on_block_elements() {
        let html = "<body><div>one</div><div>two<br>three</div></body>";
        let text = html_to_text(html).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["one", "two", "three"]);
    }

    #[test]
    fn html_to_text_should_collapse_whitespace_in_fragments() {
        assert_eq!(
            html_to_text("<p>just   a   fragment</p>").unwrap(),
            "just a fragment"
        );
    }

    #[test]
    fn looks_like_html_should_detect_documents() {
        assert!(looks_like_html("  <!DOCTYPE html><html></html>"));
        assert!(looks_like_html("<html lang=\"en\">"));
        assert!(!looks_like_html("Plain notes about <b> tags"));
    }

    #[tokio::test]
    async fn file_page_should_read_plain_text() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "Mitochondria are the powerhouse of the cell.").unwrap();

        let text = FilePage::new(path).capture("notes.txt").await.unwrap();
        assert_eq!(text, "Mitochondria are the powerhouse of the cell.");
    }

    #[tokio::test]
    async fn file_page_should_strip_html() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("page.html");
        std::fs::write(&path, "<html><body><p>Hello</p></body></html>").unwrap();

        let text = FilePage::new(path).capture("page.html").await.unwrap();
        assert_eq!(text, "Hello");
    }

    #[tokio::test]
    async fn file_page_should_fail_on_missing_file() {
        let err = FilePage::new(PathBuf::from("/nonexistent/pagedeck/page.txt"))
            .capture("page.txt")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Extraction(_)));
    }

    #[tokio::test]
    async fn file_page_should_fail_on_blank_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("blank.txt");
        std::fs::write(&path, "  \n\t").unwrap();

        let err = FilePage::new(path).capture("blank.txt").await.unwrap_err();
        assert!(err.to_string().contains("no visible text"));
    }

    #[tokio::test]
    async fn url_page_should_reduce_html_to_text() {
        let mut server = mockito::Server::new_async().await;
        let _page = server
            .mock("GET", "/article")
            .with_status(200)
            .with_header("content-type", "text/html; charset=utf-8")
            .with_body("<html><body><p>Hello &amp; welcome</p><script>track()</script></body></html>")
            .create_async()
            .await;

        let url = format!("{}/article", server.url());
        let text = UrlPage::new().capture(&url).await.unwrap();
        assert_eq!(text, "Hello & welcome");
    }

    #[tokio::test]
    async fn url_page_should_pass_plain_text_through() {
        let mut server = mockito::Server::new_async().await;
        let _page = server
            .mock("GET", "/notes.txt")
            .with_status(200)
            .with_header("content-type", "text/plain")
            .with_body("<b>raw</b> notes &amp; more")
            .create_async()
            .await;

        let url = format!("{}/notes.txt", server.url());
        let text = UrlPage::new().capture(&url).await.unwrap();
        assert_eq!(text, "<b>raw</b> notes &amp; more");
    }

    #[tokio::test]
    async fn url_page_should_fail_on_error_status() {
        let mut server = mockito::Server::new_async().await;
        let _page = server
            .mock("GET", "/missing")
            .with_status(404)
            .with_body("not found")
            .create_async()
            .await;

        let url = format!("{}/missing", server.url());
        let err = UrlPage::new().capture(&url).await.unwrap_err();
        assert!(matches!(err, CoreError::Extraction(_)));
        assert!(err.to_string().contains("404"));
    }
}
