use std::time::Duration;

use reqwest::Client;
use scraper::{ElementRef, Selector};

use super::ScrapeError;

const USER_AGENT: &str = "happns-scraper/0.1 (+https://happns.app)";

pub fn clean_text(input: &str) -> String {
    input
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

pub fn inner_text(element: ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<Vec<_>>().join(" "))
}

pub fn absolute_url(base: &str, href: Option<String>) -> Option<String> {
    let href = href?;
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }
    let base_url = reqwest::Url::parse(base).ok()?;
    base_url.join(href).ok().map(|u| u.to_string())
}

/// One way of pulling a value out of markup: the text of the first element
/// matching a selector, or one of its attributes.
pub struct Strategy {
    selector: Selector,
    attr: Option<&'static str>,
}

impl Strategy {
    pub fn text(css: &str) -> Self {
        Self {
            selector: Selector::parse(css).expect("valid strategy selector"),
            attr: None,
        }
    }

    pub fn attr(css: &str, attr: &'static str) -> Self {
        Self {
            selector: Selector::parse(css).expect("valid strategy selector"),
            attr: Some(attr),
        }
    }

    fn value_of(&self, node: ElementRef<'_>) -> Option<String> {
        let raw = match self.attr {
            Some(attr) => node.value().attr(attr).map(clean_text),
            None => Some(inner_text(node)),
        };
        raw.filter(|value| !value.is_empty())
    }

    pub fn extract(&self, root: &ElementRef<'_>) -> Option<String> {
        root.select(&self.selector)
            .find_map(|node| self.value_of(node))
    }

    pub fn extract_all(&self, root: &ElementRef<'_>) -> Vec<String> {
        root.select(&self.selector)
            .filter_map(|node| self.value_of(node))
            .collect()
    }
}

/// Ordered fallbacks for one field; the first strategy that yields a
/// non-empty value wins.
pub struct FieldChain(Vec<Strategy>);

impl FieldChain {
    pub fn new(strategies: Vec<Strategy>) -> Self {
        Self(strategies)
    }

    pub fn first(&self, root: &ElementRef<'_>) -> Option<String> {
        self.0.iter().find_map(|strategy| strategy.extract(root))
    }

    /// Every value from the first strategy that matches anything.
    pub fn all(&self, root: &ElementRef<'_>) -> Vec<String> {
        self.0
            .iter()
            .map(|strategy| strategy.extract_all(root))
            .find(|values| !values.is_empty())
            .unwrap_or_default()
    }
}

/// HTTP access for the scraper: one client, explicit per-request timeout.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(timeout: Duration) -> Result<Self, ScrapeError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|err| ScrapeError::Http(format!("unable to build http client: {err}")))?;
        Ok(Self { client })
    }

    pub async fn fetch_html(&self, url: &str) -> Result<String, ScrapeError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| ScrapeError::Http(format!("request failed for {url}: {err}")))?;
        let response = response
            .error_for_status()
            .map_err(|err| ScrapeError::Http(format!("non-success status for {url}: {err}")))?;
        response
            .text()
            .await
            .map_err(|err| ScrapeError::Http(format!("unable to read response body for {url}: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    const SAMPLE: &str = r#"
    <html><head><meta property="og:title" content="  Fallback   Title "></head>
    <body>
      <h1 class="entry-title">   </h1>
      <ul class="tags"><li><a>Music</a></li><li><a> Free </a></li></ul>
    </body></html>
    "#;

    #[test]
    fn chain_skips_empty_matches() {
        let document = Html::parse_document(SAMPLE);
        let root = document.root_element();
        let chain = FieldChain::new(vec![
            Strategy::text("h1.entry-title"),
            Strategy::text("h1.event-title"),
            Strategy::attr("meta[property='og:title']", "content"),
        ]);
        assert_eq!(chain.first(&root).as_deref(), Some("Fallback Title"));
    }

    #[test]
    fn chain_all_uses_first_productive_strategy() {
        let document = Html::parse_document(SAMPLE);
        let root = document.root_element();
        let chain = FieldChain::new(vec![
            Strategy::text(".category a"),
            Strategy::text(".tags a"),
        ]);
        assert_eq!(chain.all(&root), vec!["Music".to_string(), "Free".to_string()]);
    }

    #[test]
    fn resolves_relative_links() {
        assert_eq!(
            absolute_url("https://sf.example.com/events/", Some("/2025/06/01/show/".into()))
                .as_deref(),
            Some("https://sf.example.com/2025/06/01/show/")
        );
        assert_eq!(absolute_url("https://sf.example.com/", Some("#top".into())), None);
        assert_eq!(
            absolute_url("not a url", Some("https://x.example/a".into())).as_deref(),
            Some("https://x.example/a")
        );
    }
}
