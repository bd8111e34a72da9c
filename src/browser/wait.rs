//! Bounded polling. Every wait in the reveal layer goes through here so
//! none of them can block forever.

use super::{BrowserDriver, Locator};
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Polls `check` until it yields `Some`, or `timeout` elapses
///
/// The check always runs at least once, even with a zero timeout.
pub async fn poll_until<T, F, Fut>(timeout: Duration, interval: Duration, mut check: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(value) = check().await {
            return Some(value);
        }
        let now = Instant::now();
        if now >= deadline {
            return None;
        }
        sleep(interval.min(deadline - now)).await;
    }
}

/// Waits for `locator` to resolve to an interactable element
///
/// Driver faults during a check count as "not yet"; they are logged at
/// trace level and polling continues.
pub async fn wait_for_interactable<D: BrowserDriver>(
    driver: &D,
    locator: &Locator,
    timeout: Duration,
    interval: Duration,
) -> Option<D::Element> {
    poll_until(timeout, interval, || async move {
        let element = match driver.find(locator).await {
            Ok(Some(element)) => element,
            Ok(None) => return None,
            Err(e) => {
                tracing::trace!("Lookup of {} failed: {}", locator, e);
                return None;
            }
        };
        match driver.is_interactable(&element).await {
            Ok(true) => Some(element),
            _ => None,
        }
    })
    .await
}

/// Waits until `locator` no longer resolves to a displayed element
pub async fn wait_until_absent<D: BrowserDriver>(
    driver: &D,
    locator: &Locator,
    timeout: Duration,
    interval: Duration,
) -> bool {
    poll_until(timeout, interval, || async move {
        match driver.find(locator).await {
            Ok(None) => Some(true),
            Ok(Some(element)) => match driver.is_displayed(&element).await {
                Ok(false) => Some(true),
                _ => None,
            },
            Err(_) => None,
        }
    })
    .await
    .unwrap_or(false)
}
