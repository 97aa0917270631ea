use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::debug;

use crate::pipeline::{Request, RequestKind};

const BOOK_EXTENSIONS: &[&str] = &["mobi", "pdf", "epub", "azw3", "txt"];
const URL_FILE_SNIFF_BYTES: u64 = 1024;

fn is_url(item: &str) -> bool {
    item.starts_with("http://") || item.starts_with("https://")
}

/// A readable file whose first KiB holds only `http…` lines.
fn is_url_file(item: &str) -> bool {
    let Ok(file) = File::open(item) else {
        return false;
    };
    let mut head = Vec::new();
    if file.take(URL_FILE_SNIFF_BYTES).read_to_end(&mut head).is_err() {
        return false;
    }

    let content = String::from_utf8_lossy(&head);
    let mut lines = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .peekable();

    lines.peek().is_some() && lines.all(|line| line.starts_with("http"))
}

fn is_book(item: &str) -> bool {
    let path = Path::new(item);
    if !path.is_file() {
        return false;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| BOOK_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Sort arguments into conversion requests, dropping anything unrecognised.
pub fn classify(items: &[String]) -> Vec<Request> {
    items
        .iter()
        .filter_map(|item| {
            let kind = if is_url(item) {
                RequestKind::Url
            } else if is_url_file(item) {
                RequestKind::UrlFile
            } else if is_book(item) {
                RequestKind::LocalFile
            } else {
                debug!(item = %item, "Ignoring unrecognised item");
                return None;
            };
            Some(Request::new(item.clone(), kind))
        })
        .collect()
}
