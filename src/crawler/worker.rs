//! One crawl worker: a page range, one browser session, one artifact

use crate::browser::{BrowserDriver, ChromiumDriver};
use crate::config::Config;
use crate::crawler::fetcher::{build_http_client, fetch_url, FetchResult, FetchedPage};
use crate::crawler::parser::ListingParser;
use crate::extract::{normalize_phone, FieldExtractor};
use crate::pipeline::write_records;
use crate::record::{ChunkJob, RecordError, VehicleRecord};
use crate::reveal::{BrowserSession, PhoneRevealer, PopupResolver};
use crate::url::{listing_url, page_number};
use crate::{HarvestError, Result};
use reqwest::Client;
use scraper::Html;
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;
use url::Url;

/// Counters for one worker run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub listing_pages: u32,
    pub items_seen: u32,
    pub records: u32,
    pub deleted_skipped: u32,
    pub failed: u32,
    pub phones_revealed: u32,
}

enum ItemOutcome {
    Record(Box<VehicleRecord>),
    Deleted,
    Failed,
}

/// Crawls one chunk of listing pages and turns every item page into a
/// [`VehicleRecord`]
///
/// Page fields come from the HTTP response; only the phone number goes
/// through the browser session.
pub struct WorkerTask<D: BrowserDriver> {
    client: Client,
    listing: ListingParser,
    extractor: FieldExtractor,
    revealer: PhoneRevealer,
    session: BrowserSession<D>,
    start_url: Url,
    reveal_timeout: Duration,
}

impl<D: BrowserDriver> WorkerTask<D> {
    pub fn new(config: &Config, driver: D) -> Result<Self> {
        let popup = PopupResolver::consent_defaults(config.browser.poll_interval());
        Ok(Self {
            client: build_http_client(&config.crawler)?,
            listing: ListingParser::new(&config.crawler)?,
            extractor: FieldExtractor::new(&config.extract)?,
            revealer: PhoneRevealer::site_defaults(&config.browser),
            session: BrowserSession::new(driver, popup),
            start_url: Url::parse(&config.crawler.start_url)?,
            reveal_timeout: config.browser.reveal_timeout(),
        })
    }

    pub fn session(&self) -> &BrowserSession<D> {
        &self.session
    }

    pub fn into_driver(self) -> D {
        self.session.into_driver()
    }

    /// Crawls `job`'s pages and writes its artifact
    ///
    /// The artifact is written even when no records were produced, so an
    /// empty chunk is distinguishable from a crashed worker.
    pub async fn run(&mut self, job: &ChunkJob) -> Result<WorkerReport> {
        let (records, report) = self.crawl(job.start_page, job.end_page).await;
        write_records(&job.artifact_path, &records)?;

        tracing::info!(
            "Worker {} saved {} records to {} ({} listing pages, {} deleted, {} failed)",
            job.index,
            records.len(),
            job.artifact_path.display(),
            report.listing_pages,
            report.deleted_skipped,
            report.failed
        );
        Ok(report)
    }

    /// Visits listing pages `start_page..=end_page` and every item they link to
    ///
    /// Starts from the start URL with `page=start_page` and then follows the
    /// "next page" link. Stops early when a listing page cannot be fetched
    /// or has no next link.
    pub async fn crawl(&mut self, start_page: u32, end_page: u32) -> (Vec<VehicleRecord>, WorkerReport) {
        let mut report = WorkerReport::default();
        let mut records = Vec::new();
        let mut visited = HashSet::new();

        let page_count = end_page.saturating_sub(start_page) + 1;
        let mut next = Some(listing_url(&self.start_url, start_page));

        for offset in 0..page_count {
            let Some(listing) = next.take() else {
                tracing::info!("No next page after page {}", start_page + offset - 1);
                break;
            };
            tracing::info!("Listing page {} ({}/{})", start_page + offset, offset + 1, page_count);

            let Some(page) = self.fetch(&listing).await else {
                break;
            };
            report.listing_pages += 1;

            let parsed = self.listing.parse(&page.body, &page.final_url);
            tracing::debug!(
                "Found {} item links on page {}",
                parsed.item_links.len(),
                page_number(&page.final_url).unwrap_or(start_page + offset)
            );

            for item in parsed.item_links {
                if !visited.insert(item.to_string()) {
                    continue;
                }
                report.items_seen += 1;

                match self.process_item(&item).await {
                    ItemOutcome::Record(record) => {
                        if !record.phone_number.is_empty() {
                            report.phones_revealed += 1;
                        }
                        report.records += 1;
                        records.push(*record);
                    }
                    ItemOutcome::Deleted => report.deleted_skipped += 1,
                    ItemOutcome::Failed => report.failed += 1,
                }
            }

            next = parsed.next_page;
        }

        (records, report)
    }

    async fn fetch(&self, url: &Url) -> Option<FetchedPage> {
        match fetch_url(&self.client, url).await {
            FetchResult::Success(page) => Some(page),
            FetchResult::HttpError { status_code } => {
                tracing::warn!("HTTP {} for {}", status_code, url);
                None
            }
            FetchResult::ContentMismatch { content_type } => {
                tracing::warn!("Skipping {}: not HTML ({})", url, content_type);
                None
            }
            FetchResult::NetworkError { error } => {
                tracing::warn!("Failed to fetch {}: {}", url, error);
                None
            }
        }
    }

    async fn process_item(&mut self, url: &Url) -> ItemOutcome {
        let Some(page) = self.fetch(url).await else {
            return ItemOutcome::Failed;
        };

        let mut record = {
            let doc = Html::parse_document(&page.body);
            if self.extractor.is_deleted_listing(&doc) {
                tracing::info!("Skipping deleted listing {}", page.final_url);
                return ItemOutcome::Deleted;
            }
            self.extractor
                .build_record(page.final_url.as_str(), &doc, page.date.clone(), None)
        };

        let raw_phone = self
            .revealer
            .reveal(&mut self.session, page.final_url.as_str(), self.reveal_timeout)
            .await;

        if let Some(raw) = raw_phone {
            record.phone_number = normalize_phone(&raw, self.extractor.country_code());
            if let Err(e @ RecordError::InvalidPhone { .. }) =
                record.validate(self.extractor.country_code())
            {
                tracing::warn!("Discarding phone for {}: {}", record.url, e);
                record.phone_number.clear();
            }
        }

        tracing::debug!(
            "Extracted {}: vin={:?} price={:?} odometer={:?}",
            record.url,
            record.vin,
            record.price_usd,
            record.odometer_km
        );
        ItemOutcome::Record(Box::new(record))
    }
}

/// Entry point of the `worker` subcommand
///
/// Launches a private Chromium session, crawls the job and closes the
/// browser whether the crawl succeeded, failed, or was cut short by
/// `shutdown`. An interrupted worker writes no artifact.
pub async fn run_worker<S>(config: &Config, job: &ChunkJob, shutdown: S) -> Result<WorkerReport>
where
    S: Future<Output = ()>,
{
    tracing::info!(
        "Worker {} starting: pages {} to {}",
        job.index,
        job.start_page,
        job.end_page
    );

    let driver = ChromiumDriver::launch(&config.browser).await?;
    let mut task = WorkerTask::new(config, driver)?;

    let result = tokio::select! {
        result = task.run(job) => result,
        _ = shutdown => {
            tracing::warn!("Worker {} interrupted, closing browser", job.index);
            Err(HarvestError::Interrupted)
        }
    };
    task.into_driver().close().await;
    result
}
