//! URL helpers: domain extraction, allowed-domain matching and listing
//! page addressing.

mod domain;
mod matcher;
mod page;

pub use domain::{extract_domain, is_allowed};
pub use matcher::matches_wildcard;
pub use page::{listing_url, page_number};
