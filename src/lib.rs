//! # kindle-send
//!
//! Forwards web pages and bookmarks to an e-reader by email.
//!
//! ## Architecture
//!
//! ```text
//! Daemon → BookmarkProcessor → Sources → DedupStore → Pipeline → Mail → DedupStore
//! ```
//!
//! - [`daemon`]: interval loop, PID file guard, signal handling
//! - [`processor`]: one collect/filter/convert/deliver cycle
//! - [`sources`]: bookmark sources and their registry
//! - [`store`]: persisted record of bookmarks already sent
//! - [`pipeline`]: page fetching and offline document generation
//! - [`mail`]: delivery through the local `sendmail`
//!
//! ## Quick Start
//!
//! ```bash
//! # Send a page right away
//! kindle-send send https://blog.rust-lang.org/2024/01/01/post.html
//!
//! # Watch a bookmark file every 15 minutes
//! kindle-send daemon start --interval 15m
//!
//! # Check on it, then stop it
//! kindle-send daemon status
//! kindle-send daemon stop
//! ```

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together all components:
/// source registry, state store, pipeline, mailer.
pub mod app;

/// Command-line interface using clap.
///
/// - `send <items>...` - Convert and mail once
/// - `download <items>...` - Convert and keep the documents locally
/// - `daemon start|stop|status|restart` - Manage the background daemon
/// - `config` - Show effective configuration
pub mod cli;

/// Configuration loaded from `~/.config/kindle-send/config.toml`.
pub mod config;

/// Background daemon for automatic bookmark delivery.
pub mod daemon;

/// Core domain models.
///
/// - [`Bookmark`](domain::Bookmark): a candidate URL from a source
/// - [`ProcessedState`](domain::ProcessedState): fingerprints of handled bookmarks
pub mod domain;

/// HTTP fetching.
///
/// - [`Fetcher`](fetcher::Fetcher): Async trait for page fetching
/// - [`HttpFetcher`](fetcher::HttpFetcher): reqwest-based implementation
/// - [`ParallelFetcher`](fetcher::ParallelFetcher): Concurrent fetching with semaphore
pub mod fetcher;

pub mod logging;

/// Mail delivery of generated documents.
pub mod mail;

/// Conversion of URLs and files into sendable documents.
pub mod pipeline;

pub mod processor;

/// Bookmark sources.
pub mod sources;

/// Deduplication state.
///
/// - [`DedupStore`](store::DedupStore): Trait defining dedup operations
/// - [`JsonStateStore`](store::JsonStateStore): JSON file implementation
pub mod store;
