//! Pure text normalization used by the field extractor

/// Returns the first run of digits in `text`, with single spaces inside
/// the run removed ("95 000 km" -> "95000")
fn leading_digit_run(text: &str) -> Option<String> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let digits: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == ' ')
        .filter(|c| c.is_ascii_digit())
        .collect();
    Some(digits)
}

/// Parses odometer display text into kilometres
///
/// The text is lowercased and non-breaking spaces become plain spaces
/// before the first digit run is read. If any of `thousands_markers`
/// occurs anywhere in the text, the value is multiplied by 1000.
///
/// # Examples
///
/// ```
/// use ria_harvest::extract::parse_odometer;
///
/// let markers = ["тис".to_string()];
/// assert_eq!(parse_odometer("95 тис. км", &markers), Some(95_000));
/// assert_eq!(parse_odometer("95000 км", &markers), Some(95_000));
/// assert_eq!(parse_odometer("без пробігу", &markers), None);
/// ```
pub fn parse_odometer(text: &str, thousands_markers: &[String]) -> Option<u64> {
    let normalized = text.to_lowercase().replace('\u{a0}', " ");
    let digits = leading_digit_run(normalized.trim())?;
    let value: u64 = digits.parse().ok()?;

    let in_thousands = thousands_markers
        .iter()
        .any(|marker| !marker.is_empty() && normalized.contains(&marker.to_lowercase()));

    if in_thousands {
        value.checked_mul(1000)
    } else {
        Some(value)
    }
}

/// Strips every non-digit; an empty result means "no price"
pub fn parse_price(text: &str) -> Option<u64> {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// First integer in text such as "Дивитися всі 62 фотографії"
pub fn parse_first_integer(text: &str) -> Option<u32> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let digits: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Normalizes a revealed phone number to a digits-only international form
///
/// Every non-digit is removed. A single leading zero is replaced with
/// `country_code`; numbers that already start with the code, or with
/// "00", are otherwise left unchanged.
///
/// # Examples
///
/// ```
/// use ria_harvest::extract::normalize_phone;
///
/// assert_eq!(normalize_phone("(050) 123 45 67", "380"), "380501234567");
/// assert_eq!(normalize_phone("380501234567", "380"), "380501234567");
/// assert_eq!(normalize_phone("", "380"), "");
/// ```
pub fn normalize_phone(raw: &str, country_code: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    match digits.strip_prefix('0') {
        Some(rest) if !rest.starts_with('0') => format!("{}{}", country_code, rest),
        _ => digits,
    }
}
