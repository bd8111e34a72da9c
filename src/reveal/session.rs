use super::PopupResolver;
use crate::browser::BrowserDriver;
use std::time::Duration;

/// A browser driver together with the per-session popup state
///
/// Workers own exactly one session, so the popup gate never leaks between
/// workers or between unrelated sessions in one process.
pub struct BrowserSession<D: BrowserDriver> {
    driver: D,
    popup: PopupResolver,
}

impl<D: BrowserDriver> BrowserSession<D> {
    pub fn new(driver: D, popup: PopupResolver) -> Self {
        Self { driver, popup }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn popup(&self) -> &PopupResolver {
        &self.popup
    }

    /// See [`PopupResolver::resolve`]
    pub async fn resolve_popup(&mut self, timeout: Duration) -> bool {
        self.popup.resolve(&self.driver, timeout).await
    }

    pub fn into_driver(self) -> D {
        self.driver
    }
}
