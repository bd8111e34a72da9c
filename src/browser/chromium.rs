use super::{BrowserDriver, BrowserError, BrowserResult, ElementContent, Locator};
use crate::config::BrowserConfig as HarvestBrowserConfig;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use serde_json::Value;
use tokio::task::JoinHandle;

const WINDOW_SIZE: (u32, u32) = (1366, 900);

/// Element handle: the locator that produced it
///
/// Every operation re-resolves the locator inside the page, so a node that
/// was detached since `find` surfaces as `BrowserError::StaleElement`.
#[derive(Debug, Clone)]
pub struct ChromiumElement {
    locator: Locator,
}

/// One Chromium process with a single page
pub struct ChromiumDriver {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl ChromiumDriver {
    /// Launches Chromium and opens a blank page
    pub async fn launch(config: &HarvestBrowserConfig) -> BrowserResult<Self> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(WINDOW_SIZE.0, WINDOW_SIZE.1)
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage");

        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &config.executable {
            builder = builder.chrome_executable(executable);
        }

        let launch_config = builder.build().map_err(BrowserError::Chromium)?;

        let (browser, mut handler) = Browser::launch(launch_config)
            .await
            .map_err(|e| BrowserError::Chromium(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::trace!("Chromium handler event error: {}", e);
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::Chromium(e.to_string()))?;

        tracing::debug!("Chromium session started (headless: {})", config.headless);

        Ok(Self {
            browser,
            page,
            handler,
        })
    }

    /// Closes the browser and stops the event handler
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            tracing::debug!("Error closing Chromium: {}", e);
        }
        let _ = self.browser.wait().await;
        self.handler.abort();
    }

    async fn eval(&self, script: String) -> BrowserResult<Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::Script(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    /// Runs `body` with `el` bound to the located node; null if absent
    async fn with_element(&self, locator: &Locator, body: &str) -> BrowserResult<Value> {
        self.eval(element_script(locator, body)).await
    }

    async fn with_attached(&self, element: &ChromiumElement, body: &str) -> BrowserResult<Value> {
        match self.with_element(&element.locator, body).await? {
            Value::Null => Err(BrowserError::StaleElement(element.locator.to_string())),
            value => Ok(value),
        }
    }
}

/// Wraps `body` in a function that resolves `locator` to `el` first
fn element_script(locator: &Locator, body: &str) -> String {
    let lookup = match locator {
        Locator::Css(selector) => format!(
            "document.querySelector({})",
            serde_json::to_string(selector).unwrap_or_default()
        ),
        Locator::XPath(expression) => format!(
            "document.evaluate({}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue",
            serde_json::to_string(expression).unwrap_or_default()
        ),
    };
    format!(
        "(() => {{ const el = {}; if (!el) return null; {} }})()",
        lookup, body
    )
}

const DISPLAYED: &str = "const r = el.getBoundingClientRect(); \
    const s = window.getComputedStyle(el); \
    const shown = el.isConnected && r.width > 0 && r.height > 0 \
        && s.visibility !== 'hidden' && s.display !== 'none';";

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    type Element = ChromiumElement;

    async fn navigate(&self, url: &str) -> BrowserResult<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| BrowserError::Navigation(format!("{}: {}", url, e)))?;
        Ok(())
    }

    async fn find(&self, locator: &Locator) -> BrowserResult<Option<ChromiumElement>> {
        let found = self.with_element(locator, "return true;").await?;
        Ok(found.as_bool().unwrap_or(false).then(|| ChromiumElement {
            locator: locator.clone(),
        }))
    }

    async fn is_interactable(&self, element: &ChromiumElement) -> BrowserResult<bool> {
        let body = format!("{} return shown && !el.disabled;", DISPLAYED);
        Ok(self
            .with_element(&element.locator, &body)
            .await?
            .as_bool()
            .unwrap_or(false))
    }

    async fn is_displayed(&self, element: &ChromiumElement) -> BrowserResult<bool> {
        let body = format!("{} return shown;", DISPLAYED);
        Ok(self
            .with_element(&element.locator, &body)
            .await?
            .as_bool()
            .unwrap_or(false))
    }

    async fn click(&self, element: &ChromiumElement) -> BrowserResult<()> {
        let body = "el.scrollIntoView({block: 'center'}); \
            const r = el.getBoundingClientRect(); \
            const opts = {bubbles: true, cancelable: true, view: window, \
                clientX: r.left + r.width / 2, clientY: r.top + r.height / 2}; \
            for (const t of ['mousedown', 'mouseup', 'click']) el.dispatchEvent(new MouseEvent(t, opts)); \
            return true;";
        self.with_attached(element, body).await.map(|_| ())
    }

    async fn dispatch_click(&self, element: &ChromiumElement) -> BrowserResult<()> {
        self.with_attached(element, "el.click(); return true;")
            .await
            .map(|_| ())
    }

    async fn read(
        &self,
        element: &ChromiumElement,
        attribute: Option<&str>,
    ) -> BrowserResult<ElementContent> {
        let attr = match attribute {
            Some(name) => format!(
                "el.getAttribute({})",
                serde_json::to_string(name).unwrap_or_default()
            ),
            None => "null".to_string(),
        };
        let body = format!(
            "return {{attribute: {}, text: (el.innerText || el.textContent || '').trim()}};",
            attr
        );
        let value = self.with_attached(element, &body).await?;

        Ok(ElementContent {
            attribute: value
                .get("attribute")
                .and_then(Value::as_str)
                .map(str::to_string),
            text: value
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        })
    }

    async fn execute(&self, script: &str) -> BrowserResult<Value> {
        self.eval(script.to_string()).await
    }
}
