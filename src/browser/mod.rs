//! Browser automation seam
//!
//! The reveal layer talks to a browser only through [`BrowserDriver`].
//! [`ChromiumDriver`] is the production implementation.

mod chromium;
mod driver;
mod error;
pub mod wait;

pub use chromium::{ChromiumDriver, ChromiumElement};
pub use driver::{BrowserDriver, ElementContent, Locator};
pub use error::{BrowserError, BrowserResult};
