//! Tolerant decoding for artifact fields written by older or foreign
//! producers: numbers may arrive as strings, floats or null, and text
//! fields may arrive as null.

use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum RawNumber {
    Int(i64),
    Float(f64),
    Text(String),
}

impl RawNumber {
    fn into_count(self) -> Option<u64> {
        match self {
            RawNumber::Int(n) => u64::try_from(n).ok(),
            RawNumber::Float(f) if f.is_finite() && f >= 0.0 => Some(f.trunc() as u64),
            RawNumber::Float(_) => None,
            RawNumber::Text(s) => {
                let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
                compact.parse().ok()
            }
        }
    }
}

/// Integer-or-null: negative or non-numeric input becomes `None`
pub fn optional_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawNumber>::deserialize(deserializer)?;
    Ok(raw.and_then(RawNumber::into_count))
}

/// Non-negative integer; anything unusable becomes 0
pub fn count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = optional_count(deserializer)?;
    Ok(value.and_then(|n| u32::try_from(n).ok()).unwrap_or(0))
}

/// String where `null` reads as empty
pub fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
