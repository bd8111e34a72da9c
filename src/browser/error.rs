use thiserror::Error;

pub type BrowserResult<T> = std::result::Result<T, BrowserError>;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("chromium error: {0}")]
    Chromium(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("element is no longer attached: {0}")]
    StaleElement(String),

    #[error("script failed: {0}")]
    Script(String),
}
