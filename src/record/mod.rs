//! Record types shared by workers, the merger and persistence

mod lenient;

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::path::PathBuf;
use thiserror::Error;
use url::Url;

/// One scraped listing
///
/// Field names are the artifact wire format. `vin` is the natural key used
/// by persistence and may be empty when the page did not expose it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleRecord {
    pub url: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient::optional_count")]
    pub price_usd: Option<u64>,
    #[serde(default, deserialize_with = "lenient::optional_count")]
    pub odometer_km: Option<u64>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub seller_name: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub phone_number: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub image_url: String,
    #[serde(default, deserialize_with = "lenient::count")]
    pub images_count: u32,
    #[serde(default, deserialize_with = "lenient::text")]
    pub plate_number: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub vin: String,
    /// Raw observation timestamp as received (HTTP date or RFC 3339)
    #[serde(default)]
    pub observed_at: Option<String>,
}

/// Why a record was rejected at the artifact boundary
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("record has an empty url")]
    EmptyUrl,

    #[error("record url '{0}' is not an absolute http(s) URL")]
    MalformedUrl(String),

    #[error("phone number '{phone}' must be digits starting with {country_code}")]
    InvalidPhone { phone: String, country_code: String },
}

impl VehicleRecord {
    /// Creates a record with only its source URL set
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: String::new(),
            price_usd: None,
            odometer_km: None,
            seller_name: String::new(),
            phone_number: String::new(),
            image_url: String::new(),
            images_count: 0,
            plate_number: String::new(),
            vin: String::new(),
            observed_at: None,
        }
    }

    /// Checks the record invariants
    ///
    /// The URL must be absolute http(s); a non-empty phone must be digits
    /// only and begin with `country_code`.
    pub fn validate(&self, country_code: &str) -> Result<(), RecordError> {
        if self.url.trim().is_empty() {
            return Err(RecordError::EmptyUrl);
        }

        match Url::parse(&self.url) {
            Ok(u) if (u.scheme() == "http" || u.scheme() == "https") && u.has_host() => {}
            _ => return Err(RecordError::MalformedUrl(self.url.clone())),
        }

        if !self.phone_number.is_empty()
            && (!self.phone_number.chars().all(|c| c.is_ascii_digit())
                || !self.phone_number.starts_with(country_code))
        {
            return Err(RecordError::InvalidPhone {
                phone: self.phone_number.clone(),
                country_code: country_code.to_string(),
            });
        }

        Ok(())
    }

    pub fn has_vin(&self) -> bool {
        !self.vin.trim().is_empty()
    }
}

/// A contiguous, inclusive page range assigned to one worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkJob {
    /// 1-based chunk number; also names the artifact file
    pub index: u32,
    pub start_page: u32,
    pub end_page: u32,
    pub artifact_path: PathBuf,
}

impl ChunkJob {
    pub fn pages(&self) -> RangeInclusive<u32> {
        self.start_page..=self.end_page
    }

    pub fn page_count(&self) -> u32 {
        self.end_page - self.start_page + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lenient_fields() {
        let json = r#"{
            "url": "https://auto.ria.com/uk/auto_bmw_x5_1.html",
            "title": null,
            "price_usd": "12 500",
            "odometer_km": -5,
            "images_count": "abc",
            "vin": "WBA123"
        }"#;
        let record: VehicleRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.title, "");
        assert_eq!(record.price_usd, Some(12_500));
        assert_eq!(record.odometer_km, None);
        assert_eq!(record.images_count, 0);
        assert_eq!(record.vin, "WBA123");
        assert_eq!(record.observed_at, None);
    }

    #[test]
    fn test_float_price_truncates() {
        let json = r#"{"url": "https://auto.ria.com/a.html", "price_usd": 9999.0}"#;
        let record: VehicleRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.price_usd, Some(9999));
    }

    #[test]
    fn test_missing_url_is_a_decode_error() {
        let json = r#"{"title": "no url"}"#;
        assert!(serde_json::from_str::<VehicleRecord>(json).is_err());
    }

    #[test]
    fn test_validate() {
        let mut record = VehicleRecord::new("https://auto.ria.com/uk/auto_1.html");
        assert!(record.validate("380").is_ok());

        record.phone_number = "380501234567".to_string();
        assert!(record.validate("380").is_ok());

        record.phone_number = "0501234567".to_string();
        assert!(matches!(
            record.validate("380"),
            Err(RecordError::InvalidPhone { .. })
        ));

        assert_eq!(VehicleRecord::new("  ").validate("380"), Err(RecordError::EmptyUrl));
        assert!(matches!(
            VehicleRecord::new("/uk/auto_1.html").validate("380"),
            Err(RecordError::MalformedUrl(_))
        ));
    }

    #[test]
    fn test_chunk_job_pages() {
        let job = ChunkJob {
            index: 2,
            start_page: 5,
            end_page: 7,
            artifact_path: PathBuf::from("chunk_2.json"),
        };
        assert_eq!(job.page_count(), 3);
        assert_eq!(job.pages().collect::<Vec<_>>(), vec![5, 6, 7]);
    }
}
