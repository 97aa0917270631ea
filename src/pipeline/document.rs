use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use html_escape::{encode_double_quoted_attribute, encode_text};
use tracing::{info, warn};

use crate::app::{KindleError, Result};
use crate::domain::fingerprint;
use crate::fetcher::{Fetcher, ParallelFetcher};
use crate::pipeline::{classify, ContentExtractor, ExtractorConfig, Pipeline, Request, RequestKind};
use crate::sources::file::parse_bookmark_lines;

const MAX_SLUG_LEN: usize = 60;

/// One converted page inside a document
#[derive(Debug, Clone)]
struct Section {
    url: String,
    title: String,
    content: String,
}

/// Converts web pages into self-contained offline HTML documents.
pub struct DocumentPipeline {
    fetcher: ParallelFetcher,
    extractor: ContentExtractor,
    output_dir: PathBuf,
}

impl DocumentPipeline {
    pub fn new(
        fetcher: Arc<dyn Fetcher + Send + Sync>,
        workers: usize,
        extractor: ExtractorConfig,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            fetcher: ParallelFetcher::with_workers(fetcher, workers),
            extractor: ContentExtractor::new(extractor),
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    async fn convert_urls(&self, urls: Vec<String>) -> Vec<Section> {
        let mut sections = Vec::new();
        for (url, result) in self.fetcher.fetch_all(urls).await {
            match result {
                Ok(page) if page.is_html() => {
                    let article = self.extractor.extract(&page.body);
                    sections.push(Section {
                        title: article.title.unwrap_or_else(|| url.clone()),
                        url,
                        content: article.content,
                    });
                }
                Ok(page) => warn!(
                    url = %url,
                    content_type = page.content_type.as_deref().unwrap_or(""),
                    "Skipping non-HTML page"
                ),
                Err(e) => warn!(url = %url, "Failed to fetch page: {}", e),
            }
        }
        sections
    }

    async fn convert(&self, request: &Request) -> Result<PathBuf> {
        match request.kind {
            RequestKind::LocalFile => Ok(PathBuf::from(&request.path)),
            RequestKind::Url => {
                let sections = self.convert_urls(vec![request.path.clone()]).await;
                let title = sections
                    .first()
                    .map(|s| s.title.clone())
                    .ok_or_else(|| KindleError::Conversion("page could not be converted".into()))?;
                self.write_document(&title, &request.path, &sections).await
            }
            RequestKind::UrlFile => {
                let content = tokio::fs::read_to_string(&request.path).await?;
                let links = parse_bookmark_lines(&content);
                if links.is_empty() {
                    return Err(KindleError::Conversion("no links in file".into()));
                }
                let sections = self.convert_urls(links).await;
                if sections.is_empty() {
                    return Err(KindleError::Conversion("none of the links could be converted".into()));
                }
                let title = Path::new(&request.path)
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| request.path.clone());
                self.write_document(&title, &request.path, &sections).await
            }
        }
    }

    async fn write_document(&self, title: &str, key: &str, sections: &[Section]) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self
            .output_dir
            .join(format!("{}-{}.html", slugify(title), &fingerprint(key)[..8]));
        tokio::fs::write(&path, render_document(title, sections)).await?;
        Ok(path)
    }
}

#[async_trait]
impl Pipeline for DocumentPipeline {
    fn classify(&self, items: &[String]) -> Vec<Request> {
        classify(items)
    }

    async fn queue(&self, requests: Vec<Request>) -> Vec<PathBuf> {
        let mut produced = Vec::new();
        for request in &requests {
            match self.convert(request).await {
                Ok(path) => {
                    info!(source = %request.path, output = %path.display(), "Prepared document");
                    produced.push(path);
                }
                Err(e) => warn!(source = %request.path, "SKIPPING: {}", e),
            }
        }
        produced
    }
}

fn render_document(title: &str, sections: &[Section]) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str(&format!("<title>{}</title>\n</head>\n<body>\n", encode_text(title)));
    html.push_str(&format!("<h1>{}</h1>\n", encode_text(title)));

    let single = sections.len() == 1;
    for section in sections {
        html.push_str("<section>\n");
        if !single {
            html.push_str(&format!("<h2>{}</h2>\n", encode_text(&section.title)));
        }
        html.push_str(&format!(
            "<p><a href=\"{}\">{}</a></p>\n",
            encode_double_quoted_attribute(&section.url),
            encode_text(&section.url)
        ));
        html.push_str(&section.content);
        html.push_str("\n</section>\n");
    }

    html.push_str("</body>\n</html>\n");
    html
}

fn slugify(title: &str) -> String {
    let mut slug = String::new();
    for c in title.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
        if slug.chars().count() >= MAX_SLUG_LEN {
            break;
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "document".to_string()
    } else {
        slug.to_string()
    }
}
