use crate::browser::wait::{wait_for_interactable, wait_until_absent};
use crate::browser::{BrowserDriver, Locator};
use std::time::Duration;

/// One way of getting rid of a consent dialog
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DismissStrategy {
    /// Click an accept/reject/close control inside the dialog
    ClickControl(Locator),
    /// Click the backdrop around the dialog
    ClickOverlay(Locator),
    /// Remove the dialog nodes from the DOM
    RemoveNodes(Vec<String>),
}

impl DismissStrategy {
    fn describe(&self) -> String {
        match self {
            DismissStrategy::ClickControl(l) => format!("click control {}", l),
            DismissStrategy::ClickOverlay(l) => format!("click overlay {}", l),
            DismissStrategy::RemoveNodes(selectors) => format!("remove {}", selectors.join(", ")),
        }
    }
}

/// Dismisses a consent overlay with a ranked list of strategies
///
/// One resolver belongs to one browser session. Once a popup has been
/// seen in that session the resolver stops checking for it.
#[derive(Debug, Clone)]
pub struct PopupResolver {
    presence: Locator,
    strategies: Vec<DismissStrategy>,
    poll_interval: Duration,
    attempted: bool,
}

const DIALOG: &str = ".fc-dialog";
const OVERLAY: &str = ".fc-dialog-overlay";

impl PopupResolver {
    pub fn new(presence: Locator, strategies: Vec<DismissStrategy>, poll_interval: Duration) -> Self {
        Self {
            presence,
            strategies,
            poll_interval,
            attempted: false,
        }
    }

    /// Strategies for the consent dialog shown on the target site, in
    /// English and with its localized labels
    pub fn consent_defaults(poll_interval: Duration) -> Self {
        let controls = [
            "//p[contains(@class, 'fc-button-label') and text()='Consent']",
            "//p[contains(text(), 'Consent')]",
            "//button[contains(text(), 'Accept')]",
            "//button[contains(text(), 'Прийняти')]",
            "//button[contains(text(), 'Принять')]",
            "//button[contains(text(), 'Do not consent')]",
            "//button[contains(text(), 'Reject')]",
            "//button[contains(text(), 'Close')]",
            "//a[contains(text(), 'Close')]",
        ];

        let mut strategies: Vec<DismissStrategy> = controls
            .iter()
            .map(|xpath| DismissStrategy::ClickControl(Locator::xpath(*xpath)))
            .collect();
        strategies.push(DismissStrategy::ClickOverlay(Locator::css(OVERLAY)));
        strategies.push(DismissStrategy::RemoveNodes(vec![
            OVERLAY.to_string(),
            DIALOG.to_string(),
        ]));

        Self::new(
            Locator::css(format!("{}, {}", DIALOG, OVERLAY)),
            strategies,
            poll_interval,
        )
    }

    /// True once a popup has been encountered in this session
    pub fn is_settled(&self) -> bool {
        self.attempted
    }

    /// Dismisses the popup if one is showing
    ///
    /// Returns false only when a popup was detected and every strategy
    /// failed. Each strategy gets `timeout` to take effect.
    pub async fn resolve<D: BrowserDriver>(&mut self, driver: &D, timeout: Duration) -> bool {
        if self.attempted {
            return true;
        }

        match driver.find(&self.presence).await {
            Ok(None) => return true,
            Ok(Some(_)) => {}
            Err(e) => {
                tracing::warn!("Consent popup presence check failed: {}", e);
                return true;
            }
        }

        self.attempted = true;
        tracing::debug!("Consent popup detected");

        for strategy in &self.strategies {
            if self.try_strategy(driver, strategy, timeout).await {
                tracing::info!("Consent popup dismissed ({})", strategy.describe());
                return true;
            }
            tracing::trace!("Popup strategy did not apply: {}", strategy.describe());
        }

        tracing::warn!("Consent popup could not be dismissed");
        false
    }

    async fn try_strategy<D: BrowserDriver>(
        &self,
        driver: &D,
        strategy: &DismissStrategy,
        timeout: Duration,
    ) -> bool {
        match strategy {
            DismissStrategy::ClickControl(locator) | DismissStrategy::ClickOverlay(locator) => {
                let Some(element) =
                    wait_for_interactable(driver, locator, timeout, self.poll_interval).await
                else {
                    return false;
                };
                if let Err(e) = driver.click(&element).await {
                    tracing::debug!("Click on {} failed: {}", locator, e);
                    return false;
                }
                // The control vanishing is not enough; the dialog itself must go
                wait_until_absent(driver, &self.presence, timeout, self.poll_interval).await
            }
            DismissStrategy::RemoveNodes(selectors) => {
                if let Err(e) = driver.execute(&removal_script(selectors)).await {
                    tracing::warn!("Script removal of consent popup failed: {}", e);
                    return false;
                }
                wait_until_absent(driver, &self.presence, timeout, self.poll_interval).await
            }
        }
    }
}

fn removal_script(selectors: &[String]) -> String {
    let list = serde_json::to_string(selectors).unwrap_or_else(|_| "[]".to_string());
    format!(
        "for (const s of {}) {{ document.querySelectorAll(s).forEach(n => n.remove()); }}",
        list
    )
}
