use super::BrowserResult;
use async_trait::async_trait;
use std::fmt;

/// How an element is located on the page
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    Css(String),
    XPath(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn xpath(expression: impl Into<String>) -> Self {
        Locator::XPath(expression.into())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(s) => write!(f, "css={}", s),
            Locator::XPath(s) => write!(f, "xpath={}", s),
        }
    }
}

/// What `BrowserDriver::read` returns for an element
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementContent {
    /// Value of the requested attribute, if it was requested and present
    pub attribute: Option<String>,
    /// Rendered text, trimmed
    pub text: String,
}

impl ElementContent {
    /// The attribute when non-empty, otherwise the text
    pub fn value(&self) -> &str {
        match self.attribute.as_deref().map(str::trim) {
            Some(attr) if !attr.is_empty() => attr,
            _ => self.text.trim(),
        }
    }
}

/// The browser operations the reveal layer depends on
///
/// Implementations own one page of one browser session. Lookups return
/// `Ok(None)` for absent elements; `Err` is reserved for driver faults.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    type Element: Send + Sync;

    async fn navigate(&self, url: &str) -> BrowserResult<()>;

    async fn find(&self, locator: &Locator) -> BrowserResult<Option<Self::Element>>;

    /// Displayed and enabled
    async fn is_interactable(&self, element: &Self::Element) -> BrowserResult<bool>;

    /// Still attached and rendered
    async fn is_displayed(&self, element: &Self::Element) -> BrowserResult<bool>;

    /// Native click
    async fn click(&self, element: &Self::Element) -> BrowserResult<()>;

    /// Click dispatched from a script (`element.click()`), unaffected by overlap
    async fn dispatch_click(&self, element: &Self::Element) -> BrowserResult<()>;

    async fn read(
        &self,
        element: &Self::Element,
        attribute: Option<&str>,
    ) -> BrowserResult<ElementContent>;

    async fn execute(&self, script: &str) -> BrowserResult<serde_json::Value>;
}
