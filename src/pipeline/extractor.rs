use scraper::{ElementRef, Html, Selector};
use tracing::warn;

use crate::pipeline::ExtractorConfig;

/// Readable content pulled out of a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub title: Option<String>,
    /// Inner HTML of the chosen content element
    pub content: String,
    /// Selector that matched, `body` for the fallback
    pub selector: String,
}

/// Content extractor for cleaning and extracting article content from HTML
pub struct ContentExtractor {
    config: ExtractorConfig,
    content_selectors: Vec<(String, Selector)>,
    remove_selectors: Vec<Selector>,
}

impl ContentExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        let content_selectors = config
            .content_selectors
            .iter()
            .filter_map(|s| parse_selector(s).map(|sel| (s.clone(), sel)))
            .collect();
        let remove_selectors = config
            .remove_selectors
            .iter()
            .filter_map(|s| parse_selector(s))
            .collect();

        Self {
            config,
            content_selectors,
            remove_selectors,
        }
    }

    /// Strip unwanted elements, then return the first content selector
    /// match with enough text, falling back to `<body>`.
    pub fn extract(&self, html: &str) -> Article {
        let mut document = Html::parse_document(html);
        let title = page_title(&document);

        for selector in &self.remove_selectors {
            let ids: Vec<_> = document.select(selector).map(|el| el.id()).collect();
            for id in ids {
                if let Some(mut node) = document.tree.get_mut(id) {
                    node.detach();
                }
            }
        }

        for (name, selector) in &self.content_selectors {
            if let Some(element) = document.select(selector).next() {
                if text_len(&element) > self.config.min_content_length {
                    return Article {
                        title,
                        content: element.inner_html(),
                        selector: name.clone(),
                    };
                }
            }
        }

        let content = parse_selector("body")
            .and_then(|body| document.select(&body).next().map(|el| el.inner_html()))
            .unwrap_or_default();

        Article {
            title,
            content,
            selector: "body".to_string(),
        }
    }
}

fn parse_selector(s: &str) -> Option<Selector> {
    match Selector::parse(s) {
        Ok(selector) => Some(selector),
        Err(e) => {
            warn!(selector = %s, "Ignoring invalid selector: {}", e);
            None
        }
    }
}

fn page_title(document: &Html) -> Option<String> {
    let selector = parse_selector("title")?;
    let title = document
        .select(&selector)
        .next()?
        .text()
        .collect::<String>();
    let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
    (!title.is_empty()).then_some(title)
}

fn text_len(element: &ElementRef<'_>) -> usize {
    element.text().map(|t| t.trim().len()).sum()
}
