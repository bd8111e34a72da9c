use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for ria-harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub extract: ExtractConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

/// Crawl range and listing-page navigation
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// First listing page; the `page` query parameter is set per chunk
    #[serde(rename = "start-url")]
    pub start_url: String,

    /// Domain pattern item links must belong to (e.g. "auto.ria.com" or "*.ria.com")
    #[serde(rename = "allowed-domain")]
    pub allowed_domain: String,

    /// Total number of listing pages to crawl
    #[serde(rename = "total-pages")]
    pub total_pages: u32,

    /// Number of worker processes the page range is split across
    #[serde(default = "default_chunks")]
    pub chunks: u32,

    /// HTTP request timeout (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// User agent sent with listing and item requests
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Selector for item links on a listing page
    #[serde(rename = "item-link-selector", default = "default_item_link_selector")]
    pub item_link_selector: String,

    /// Selector for the "next page" link on a listing page
    #[serde(rename = "next-page-selector", default = "default_next_page_selector")]
    pub next_page_selector: String,

    /// Item links containing this substring are not followed
    #[serde(rename = "skip-link-pattern", default = "default_skip_link_pattern")]
    pub skip_link_pattern: String,
}

impl CrawlerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Browser session configuration for phone reveal
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "default_true")]
    pub headless: bool,

    /// Explicit Chrome/Chromium binary; autodetected when absent
    #[serde(default)]
    pub executable: Option<String>,

    /// Bounded wait per consent-popup dismissal strategy (milliseconds)
    #[serde(rename = "popup-timeout-ms", default = "default_popup_timeout")]
    pub popup_timeout_ms: u64,

    /// Bounded wait per reveal-control candidate (milliseconds)
    #[serde(rename = "locate-timeout-ms", default = "default_locate_timeout")]
    pub locate_timeout_ms: u64,

    /// Bounded wait for the phone value after the click (milliseconds)
    #[serde(rename = "reveal-timeout-ms", default = "default_reveal_timeout")]
    pub reveal_timeout_ms: u64,

    /// Interval between element polls (milliseconds)
    #[serde(rename = "poll-interval-ms", default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl BrowserConfig {
    pub fn popup_timeout(&self) -> Duration {
        Duration::from_millis(self.popup_timeout_ms)
    }

    pub fn locate_timeout(&self) -> Duration {
        Duration::from_millis(self.locate_timeout_ms)
    }

    pub fn reveal_timeout(&self) -> Duration {
        Duration::from_millis(self.reveal_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            executable: None,
            popup_timeout_ms: default_popup_timeout(),
            locate_timeout_ms: default_locate_timeout(),
            reveal_timeout_ms: default_reveal_timeout(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

/// How the photo counter on an item page becomes `images_count`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImageCountPolicy {
    /// Use the advertised count as-is
    All,
    /// The advertised count includes the cover image; subtract it
    ExcludeCover,
}

/// Field extraction rules: selectors and normalization settings
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractConfig {
    /// Calling code that replaces a single leading zero in phone numbers
    #[serde(rename = "country-code", default = "default_country_code")]
    pub country_code: String,

    /// Tokens that mark an odometer value as thousands of kilometres
    #[serde(rename = "thousands-markers", default = "default_thousands_markers")]
    pub thousands_markers: Vec<String>,

    #[serde(rename = "image-count-policy", default = "default_image_count_policy")]
    pub image_count_policy: ImageCountPolicy,

    #[serde(rename = "price-selector", default = "default_price_selector")]
    pub price_selector: String,

    #[serde(
        rename = "price-fallback-selector",
        default = "default_price_fallback_selector"
    )]
    pub price_fallback_selector: String,

    #[serde(rename = "odometer-selector", default = "default_odometer_selector")]
    pub odometer_selector: String,

    /// Tried in order; first non-empty value wins
    #[serde(rename = "vin-selectors", default = "default_vin_selectors")]
    pub vin_selectors: Vec<String>,

    #[serde(rename = "title-selector", default = "default_title_selector")]
    pub title_selector: String,

    #[serde(rename = "image-selector", default = "default_image_selector")]
    pub image_selector: String,

    #[serde(
        rename = "images-count-selector",
        default = "default_images_count_selector"
    )]
    pub images_count_selector: String,

    /// Tried in order; first non-empty value wins
    #[serde(rename = "seller-selectors", default = "default_seller_selectors")]
    pub seller_selectors: Vec<String>,

    #[serde(rename = "plate-selector", default = "default_plate_selector")]
    pub plate_selector: String,

    #[serde(
        rename = "deleted-notice-selector",
        default = "default_deleted_notice_selector"
    )]
    pub deleted_notice_selector: String,

    /// Case-insensitive regex matched against the notice text of removed listings
    #[serde(
        rename = "deleted-notice-pattern",
        default = "default_deleted_notice_pattern"
    )]
    pub deleted_notice_pattern: String,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            country_code: default_country_code(),
            thousands_markers: default_thousands_markers(),
            image_count_policy: default_image_count_policy(),
            price_selector: default_price_selector(),
            price_fallback_selector: default_price_fallback_selector(),
            odometer_selector: default_odometer_selector(),
            vin_selectors: default_vin_selectors(),
            title_selector: default_title_selector(),
            image_selector: default_image_selector(),
            images_count_selector: default_images_count_selector(),
            seller_selectors: default_seller_selectors(),
            plate_selector: default_plate_selector(),
            deleted_notice_selector: default_deleted_notice_selector(),
            deleted_notice_pattern: default_deleted_notice_pattern(),
        }
    }
}

/// Output locations
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory holding the per-chunk `chunk_<n>.json` artifacts
    #[serde(rename = "artifact-dir")]
    pub artifact_dir: String,

    /// Path of the merged, deduplicated artifact
    #[serde(rename = "canonical-path")]
    pub canonical_path: String,

    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Directory receiving database backups
    #[serde(rename = "backup-dir", default = "default_backup_dir")]
    pub backup_dir: String,
}

/// Which stored columns an incoming record may overwrite on VIN collision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    /// Only price and odometer change over time
    PriceAndOdometer,
    /// Everything except `url` and `vin`
    FullRow,
}

/// Persistence behaviour
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(rename = "conflict-policy", default = "default_conflict_policy")]
    pub conflict_policy: ConflictPolicy,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            conflict_policy: default_conflict_policy(),
        }
    }
}

/// Daily run times for the `schedule` command
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    /// Local time of the daily harvest, `HH:MM`
    #[serde(rename = "scrape-at", default = "default_scrape_at")]
    pub scrape_at: String,

    /// Local time of the daily database backup, `HH:MM`
    #[serde(rename = "backup-at", default = "default_backup_at")]
    pub backup_at: String,

    /// Clear stored vehicles before each scheduled sync
    #[serde(default)]
    pub fresh: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            scrape_at: default_scrape_at(),
            backup_at: default_backup_at(),
            fresh: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_chunks() -> u32 {
    3
}

fn default_request_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/115.0.0.0 Safari/537.36"
        .to_string()
}

fn default_item_link_selector() -> String {
    "a.address".to_string()
}

fn default_next_page_selector() -> String {
    "a.js-next".to_string()
}

fn default_skip_link_pattern() -> String {
    "/newauto/".to_string()
}

fn default_popup_timeout() -> u64 {
    1_000
}

fn default_locate_timeout() -> u64 {
    4_000
}

fn default_reveal_timeout() -> u64 {
    15_000
}

fn default_poll_interval() -> u64 {
    250
}

fn default_country_code() -> String {
    "380".to_string()
}

fn default_thousands_markers() -> Vec<String> {
    vec!["тыс".to_string(), "тис".to_string()]
}

fn default_image_count_policy() -> ImageCountPolicy {
    ImageCountPolicy::ExcludeCover
}

fn default_price_selector() -> String {
    "span[data-currency='USD']".to_string()
}

fn default_price_fallback_selector() -> String {
    "strong".to_string()
}

fn default_odometer_selector() -> String {
    "div.bold.dhide".to_string()
}

fn default_vin_selectors() -> Vec<String> {
    vec![
        "span.label-vin".to_string(),
        "span#badgesVin span.common-text".to_string(),
    ]
}

fn default_title_selector() -> String {
    "h1.head".to_string()
}

fn default_image_selector() -> String {
    "meta[property='og:image']".to_string()
}

fn default_images_count_selector() -> String {
    "div.action_disp_all_block a.show-all".to_string()
}

fn default_seller_selectors() -> Vec<String> {
    vec![
        "div.seller_info_name a".to_string(),
        "div.seller_info_name".to_string(),
        "h4.seller_info_name a".to_string(),
    ]
}

fn default_plate_selector() -> String {
    "span.state-num".to_string()
}

fn default_deleted_notice_selector() -> String {
    "div.notice_head".to_string()
}

fn default_deleted_notice_pattern() -> String {
    "(удалено|видалено).*(не принимает участия|не бере участі)".to_string()
}

fn default_backup_dir() -> String {
    "./dumps".to_string()
}

fn default_conflict_policy() -> ConflictPolicy {
    ConflictPolicy::PriceAndOdometer
}

fn default_scrape_at() -> String {
    "12:00".to_string()
}

fn default_backup_at() -> String {
    "12:30".to_string()
}
