//! Field extraction from fetched item pages
//!
//! Everything here is response-only: no network and no waiting. Missing
//! markup yields an empty or `None` field, never an error.

mod text;

pub use text::{normalize_phone, parse_first_integer, parse_odometer, parse_price};

use crate::config::{ExtractConfig, ImageCountPolicy};
use crate::record::VehicleRecord;
use crate::{ConfigError, ConfigResult};
use regex::{Regex, RegexBuilder};
use scraper::{ElementRef, Html, Selector};

/// Compiled extraction rules for one site
#[derive(Debug)]
pub struct FieldExtractor {
    price: Selector,
    price_fallback: Selector,
    price_pattern: Regex,
    odometer: Selector,
    vin: Vec<Selector>,
    title: Selector,
    image: Selector,
    images_count: Selector,
    seller: Vec<Selector>,
    plate: Selector,
    deleted_notice: Selector,
    deleted_pattern: Regex,
    thousands_markers: Vec<String>,
    image_policy: ImageCountPolicy,
    country_code: String,
}

fn compile(selector: &str) -> ConfigResult<Selector> {
    Selector::parse(selector)
        .map_err(|e| ConfigError::InvalidSelector(format!("'{}': {:?}", selector, e)))
}

fn compile_all(selectors: &[String]) -> ConfigResult<Vec<Selector>> {
    selectors.iter().map(|s| compile(s)).collect()
}

/// Concatenated direct text children of an element, trimmed
fn own_text(element: ElementRef<'_>) -> String {
    element
        .children()
        .filter_map(|node| node.value().as_text())
        .map(|t| &**t)
        .collect::<String>()
        .trim()
        .to_string()
}

/// All descendant text, whitespace-joined
fn full_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

impl FieldExtractor {
    /// Compiles every selector and pattern in `config`
    pub fn new(config: &ExtractConfig) -> ConfigResult<Self> {
        let deleted_pattern = RegexBuilder::new(&config.deleted_notice_pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| ConfigError::Validation(format!("deleted-notice-pattern: {}", e)))?;

        let price_pattern = Regex::new(r"\d[\d\s]*\$")
            .map_err(|e| ConfigError::Validation(format!("price pattern: {}", e)))?;

        Ok(Self {
            price: compile(&config.price_selector)?,
            price_fallback: compile(&config.price_fallback_selector)?,
            price_pattern,
            odometer: compile(&config.odometer_selector)?,
            vin: compile_all(&config.vin_selectors)?,
            title: compile(&config.title_selector)?,
            image: compile(&config.image_selector)?,
            images_count: compile(&config.images_count_selector)?,
            seller: compile_all(&config.seller_selectors)?,
            plate: compile(&config.plate_selector)?,
            deleted_notice: compile(&config.deleted_notice_selector)?,
            deleted_pattern,
            thousands_markers: config.thousands_markers.clone(),
            image_policy: config.image_count_policy,
            country_code: config.country_code.clone(),
        })
    }

    pub fn country_code(&self) -> &str {
        &self.country_code
    }

    /// USD price: the currency-tagged element first, then any bold text
    /// that looks like "<digits> $"
    pub fn extract_price(&self, doc: &Html) -> Option<u64> {
        let tagged: Vec<String> = doc
            .select(&self.price)
            .map(own_text)
            .filter(|t| !t.is_empty())
            .collect();

        let first = if let Some(first) = tagged.into_iter().next() {
            first
        } else {
            doc.select(&self.price_fallback)
                .map(own_text)
                .find_map(|t| self.price_pattern.find(&t).map(|m| m.as_str().to_string()))?
        };

        tracing::debug!("Price candidate: {:?}", first);
        parse_price(&first)
    }

    pub fn extract_odometer(&self, doc: &Html) -> Option<u64> {
        let text = doc.select(&self.odometer).map(own_text).next()?;
        let parsed = parse_odometer(&text, &self.thousands_markers);
        if parsed.is_none() {
            tracing::debug!("Odometer text not numeric: {:?}", text);
        }
        parsed
    }

    /// First non-empty VIN across the badge selectors
    pub fn extract_vin(&self, doc: &Html) -> String {
        first_non_empty(doc, &self.vin)
    }

    pub fn extract_title(&self, doc: &Html) -> String {
        first_non_empty(doc, std::slice::from_ref(&self.title))
    }

    /// Cover image URL from the `content` or `src` attribute
    pub fn extract_image_url(&self, doc: &Html) -> String {
        doc.select(&self.image)
            .find_map(|el| {
                el.value()
                    .attr("content")
                    .or_else(|| el.value().attr("src"))
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_default()
    }

    pub fn extract_images_count(&self, doc: &Html) -> u32 {
        let advertised = doc
            .select(&self.images_count)
            .map(full_text)
            .find_map(|t| parse_first_integer(&t));

        match (advertised, self.image_policy) {
            (None, _) => 0,
            (Some(n), ImageCountPolicy::All) => n,
            (Some(n), ImageCountPolicy::ExcludeCover) => n.saturating_sub(1),
        }
    }

    pub fn extract_seller(&self, doc: &Html) -> String {
        first_non_empty(doc, &self.seller)
    }

    pub fn extract_plate(&self, doc: &Html) -> String {
        first_non_empty(doc, std::slice::from_ref(&self.plate))
    }

    /// True if the page carries a "listing removed" notice
    pub fn is_deleted_listing(&self, doc: &Html) -> bool {
        let notice = doc
            .select(&self.deleted_notice)
            .map(full_text)
            .collect::<Vec<_>>()
            .join(" ");
        !notice.is_empty() && self.deleted_pattern.is_match(&notice)
    }

    /// Builds the record for one item page
    ///
    /// # Arguments
    ///
    /// * `url` - Final URL of the item page
    /// * `doc` - Parsed item page
    /// * `observed_at` - Raw timestamp from the response headers
    /// * `raw_phone` - Unnormalized phone text from the reveal step, if any
    pub fn build_record(
        &self,
        url: &str,
        doc: &Html,
        observed_at: Option<String>,
        raw_phone: Option<&str>,
    ) -> VehicleRecord {
        VehicleRecord {
            url: url.to_string(),
            title: self.extract_title(doc),
            price_usd: self.extract_price(doc),
            odometer_km: self.extract_odometer(doc),
            seller_name: self.extract_seller(doc),
            phone_number: raw_phone
                .map(|p| normalize_phone(p, &self.country_code))
                .unwrap_or_default(),
            image_url: self.extract_image_url(doc),
            images_count: self.extract_images_count(doc),
            plate_number: self.extract_plate(doc),
            vin: self.extract_vin(doc),
            observed_at,
        }
    }
}

fn first_non_empty(doc: &Html, selectors: &[Selector]) -> String {
    selectors
        .iter()
        .flat_map(|selector| doc.select(selector))
        .map(own_text)
        .find(|t| !t.is_empty())
        .unwrap_or_default()
}
