//! Crawling: listing pages over HTTP, item pages through a worker
//!
//! This module handles:
//! - HTTP fetching of listing and item pages
//! - Listing-page link extraction and pagination
//! - The per-chunk [`WorkerTask`] that produces one artifact

mod fetcher;
mod parser;
mod worker;

pub use fetcher::{build_http_client, fetch_url, FetchResult, FetchedPage};
pub use parser::{ListingPage, ListingParser};
pub use worker::{run_worker, WorkerReport, WorkerTask};
