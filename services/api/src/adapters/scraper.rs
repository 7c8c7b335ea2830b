//! services/api/src/adapters/scraper.rs
//!
//! Fetches web pages and extracts their main textual content using CSS selectors.

use async_trait::async_trait;
use nexus_chat_core::domain::ScrapedPage;
use nexus_chat_core::ports::{PortError, PortResult, WebScraper};
use regex::Regex;
use reqwest::header::CONTENT_TYPE;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Elements whose text is never part of the main content.
const NOISE_ELEMENTS: [&str; 8] = [
    "script", "style", "nav", "footer", "header", "aside", "noscript", "template",
];

/// Tried in order; the first match with enough text wins.
const CONTENT_SELECTORS: [&str; 11] = [
    "article",
    ".content",
    ".post-content",
    ".entry-content",
    ".article-content",
    ".main-content",
    "main",
    ".container",
    "#content",
    ".post",
    ".blog-post",
];

const MIN_SECTION_CHARS: usize = 200;
const MIN_PAGE_CHARS: usize = 100;

const BOILERPLATE: &str = r"(?i)\b(advertisement|subscribe|newsletter|follow us|share this|cookie policy|privacy policy|terms of service)\b";

#[derive(Clone)]
pub struct HttpScraper {
    client: reqwest::Client,
    boilerplate: Regex,
}

impl HttpScraper {
    pub fn new(timeout: Duration) -> PortResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (compatible; NexusChat/0.1; +https://example.invalid/bot)")
            .build()
            .map_err(|e| PortError::Unexpected(format!("failed to build HTTP client: {e}")))?;
        let boilerplate =
            Regex::new(BOILERPLATE).map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(Self {
            client,
            boilerplate,
        })
    }

    /// Extracts the title and main text of an HTML document.
    pub fn parse_page(&self, url: &str, html: &str) -> PortResult<ScrapedPage> {
        let document = Html::parse_document(html);
        let title = extract_title(&document);

        let text = main_content(&document).unwrap_or_default();
        let text = self.boilerplate.replace_all(&text, "");
        let text = clean_text(&text);

        if text.chars().count() < MIN_PAGE_CHARS {
            return Err(PortError::Unsupported(
                "insufficient content extracted from URL".to_string(),
            ));
        }

        Ok(ScrapedPage {
            url: url.to_string(),
            title,
            text,
        })
    }
}

#[async_trait]
impl WebScraper for HttpScraper {
    #[instrument(skip(self))]
    async fn scrape(&self, url: &str) -> PortResult<ScrapedPage> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                warn!("Fetching {url} failed: {e}");
                PortError::Unavailable(e.to_string())
            })?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("text/html")
            .to_ascii_lowercase();
        if !content_type.contains("html") && !content_type.starts_with("text/") {
            return Err(PortError::Unsupported(format!(
                "expected an HTML page, got '{content_type}'"
            )));
        }

        let html = response
            .text()
            .await
            .map_err(|e| PortError::Unavailable(e.to_string()))?;

        let page = self.parse_page(url, &html)?;
        info!("Scraped {} characters from {url}", page.text.len());
        Ok(page)
    }
}

fn extract_title(document: &Html) -> String {
    ["title", "h1", ".title"]
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .filter_map(|selector| {
            document
                .select(&selector)
                .next()
                .map(|el| clean_text(&el.text().collect::<String>()))
        })
        .find(|title| title.chars().count() > 3)
        .unwrap_or_else(|| "Untitled".to_string())
}

fn main_content(document: &Html) -> Option<String> {
    for selector_str in CONTENT_SELECTORS {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(element) = document.select(&selector).next() {
                let text = clean_text(&visible_text(element));
                if text.chars().count() > MIN_SECTION_CHARS {
                    return Some(text);
                }
            }
        }
    }

    // Fallback: the whole body minus noise
    let body = Selector::parse("body").ok()?;
    document
        .select(&body)
        .next()
        .map(|body| clean_text(&visible_text(body)))
}

/// Text of `element`, skipping anything nested inside a noise element.
fn visible_text(element: ElementRef) -> String {
    element
        .descendants()
        .filter_map(|node| {
            let text: &str = node.value().as_text()?;
            let in_noise = node.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .is_some_and(|el| NOISE_ELEMENTS.contains(&el.name()))
            });
            (!in_noise).then(|| text.to_string())
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalize whitespace to single spaces.
fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
