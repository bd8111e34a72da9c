use super::BrowserSession;
use crate::browser::wait::{poll_until, wait_for_interactable};
use crate::browser::{BrowserDriver, BrowserError, Locator};
use crate::config::BrowserConfig;
use std::fmt;
use std::time::Duration;

/// Placeholder character of a still-masked number ("(050) XXX XX XX")
const MASK: char = 'X';

fn is_revealed(value: &str) -> bool {
    !value.is_empty() && !value.contains(MASK)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealState {
    Navigated,
    ButtonSearch,
    ButtonFound,
    Clicked,
    WaitingForValue,
    Revealed,
    TimedOut,
    NotFound,
}

impl RevealState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RevealState::Revealed | RevealState::TimedOut | RevealState::NotFound
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RevealState::Navigated => "navigated",
            RevealState::ButtonSearch => "button-search",
            RevealState::ButtonFound => "button-found",
            RevealState::Clicked => "clicked",
            RevealState::WaitingForValue => "waiting-for-value",
            RevealState::Revealed => "revealed",
            RevealState::TimedOut => "timed-out",
            RevealState::NotFound => "not-found",
        }
    }
}

impl fmt::Display for RevealState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A place the revealed number can show up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueLocation {
    pub locator: Locator,
    /// Attribute read before falling back to the element text
    pub attribute: Option<String>,
}

/// Result of one reveal attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevealOutcome {
    pub state: RevealState,
    pub phone: Option<String>,
}

enum Step<E> {
    Navigated,
    ButtonSearch,
    ButtonFound { trigger: usize, element: E },
    Clicked,
    WaitingForValue,
    Done(RevealState, Option<String>),
}

impl<E> Step<E> {
    fn state(&self) -> RevealState {
        match self {
            Step::Navigated => RevealState::Navigated,
            Step::ButtonSearch => RevealState::ButtonSearch,
            Step::ButtonFound { .. } => RevealState::ButtonFound,
            Step::Clicked => RevealState::Clicked,
            Step::WaitingForValue => RevealState::WaitingForValue,
            Step::Done(state, _) => *state,
        }
    }
}

/// Reveals a seller phone number hidden behind a click
#[derive(Debug, Clone)]
pub struct PhoneRevealer {
    triggers: Vec<Locator>,
    value_locations: Vec<ValueLocation>,
    locate_timeout: Duration,
    popup_timeout: Duration,
    poll_interval: Duration,
}

impl PhoneRevealer {
    pub fn new(
        triggers: Vec<Locator>,
        value_locations: Vec<ValueLocation>,
        config: &BrowserConfig,
    ) -> Self {
        Self {
            triggers,
            value_locations,
            locate_timeout: config.locate_timeout(),
            popup_timeout: config.popup_timeout(),
            poll_interval: config.poll_interval(),
        }
    }

    /// Trigger and value markup used by the target site's item templates
    pub fn site_defaults(config: &BrowserConfig) -> Self {
        let triggers = vec![
            Locator::css("a.phone_show_link"),
            Locator::css(r#"button.size-large.conversion[data-action="showBottomPopUp"]"#),
            Locator::css(r#"button.size-large.conversion[data-action="call"]"#),
            Locator::css("span.conversion_phone_newcars.button.button--green.boxed.mb-16"),
        ];
        let value_locations = vec![
            ValueLocation {
                locator: Locator::css("div.popup-successful-call-desk"),
                attribute: Some("data-value".to_string()),
            },
            ValueLocation {
                locator: Locator::css(
                    r#"button.size-large.conversion[data-action="call"] span.common-text.ws-pre-wrap.action"#,
                ),
                attribute: None,
            },
        ];
        Self::new(triggers, value_locations, config)
    }

    /// Returns the raw phone text for `url`, or `None` if it could not be
    /// revealed within `timeout`. Never fails.
    pub async fn reveal<D: BrowserDriver>(
        &self,
        session: &mut BrowserSession<D>,
        url: &str,
        timeout: Duration,
    ) -> Option<String> {
        self.attempt(session, url, timeout).await.phone
    }

    /// Runs the reveal state machine and reports where it stopped
    pub async fn attempt<D: BrowserDriver>(
        &self,
        session: &mut BrowserSession<D>,
        url: &str,
        timeout: Duration,
    ) -> RevealOutcome {
        if let Err(e) = session.driver().navigate(url).await {
            tracing::warn!("Phone reveal skipped, navigation failed: {}", e);
            return RevealOutcome {
                state: RevealState::NotFound,
                phone: None,
            };
        }

        let mut step: Step<D::Element> = Step::Navigated;
        loop {
            tracing::trace!("Reveal {}: {}", url, step.state());
            step = match step {
                Step::Navigated => {
                    if !session.resolve_popup(self.popup_timeout).await {
                        tracing::debug!("Continuing with consent popup still present");
                    }
                    Step::ButtonSearch
                }
                Step::ButtonSearch => self.search(session.driver()).await,
                Step::ButtonFound { trigger, element } => {
                    self.click(session.driver(), trigger, element).await
                }
                Step::Clicked => Step::WaitingForValue,
                Step::WaitingForValue => match self.wait_for_value(session.driver(), timeout).await {
                    Some(phone) => Step::Done(RevealState::Revealed, Some(phone)),
                    None => {
                        tracing::warn!("Phone number did not appear after click on {}", url);
                        Step::Done(RevealState::TimedOut, None)
                    }
                },
                Step::Done(state, phone) => return RevealOutcome { state, phone },
            };
        }
    }

    async fn search<D: BrowserDriver>(&self, driver: &D) -> Step<D::Element> {
        for (trigger, locator) in self.triggers.iter().enumerate() {
            if let Some(element) =
                wait_for_interactable(driver, locator, self.locate_timeout, self.poll_interval).await
            {
                tracing::debug!("Found reveal control {}", locator);
                return Step::ButtonFound { trigger, element };
            }
            tracing::trace!("Reveal control not found: {}", locator);
        }
        tracing::warn!("No phone reveal control was found");
        Step::Done(RevealState::NotFound, None)
    }

    /// Script-dispatched click; a stale reference gets one fresh lookup
    async fn click<D: BrowserDriver>(
        &self,
        driver: &D,
        trigger: usize,
        element: D::Element,
    ) -> Step<D::Element> {
        let locator = &self.triggers[trigger];
        let outcome = match driver.dispatch_click(&element).await {
            Err(BrowserError::StaleElement(_)) => {
                tracing::debug!("Stale reveal control {}, retrying lookup", locator);
                match wait_for_interactable(driver, locator, self.locate_timeout, self.poll_interval)
                    .await
                {
                    Some(fresh) => driver.dispatch_click(&fresh).await,
                    None => Err(BrowserError::StaleElement(locator.to_string())),
                }
            }
            other => other,
        };

        match outcome {
            Ok(()) => Step::Clicked,
            Err(e) => {
                tracing::warn!("Clicking reveal control {} failed: {}", locator, e);
                Step::Done(RevealState::NotFound, None)
            }
        }
    }

    async fn wait_for_value<D: BrowserDriver>(&self, driver: &D, timeout: Duration) -> Option<String> {
        let locations = &self.value_locations;
        poll_until(timeout, self.poll_interval, || async move {
            for location in locations {
                let element = match driver.find(&location.locator).await {
                    Ok(Some(element)) => element,
                    _ => continue,
                };
                let content = match driver.read(&element, location.attribute.as_deref()).await {
                    Ok(content) => content,
                    Err(e) => {
                        tracing::trace!("Reading {} failed: {}", location.locator, e);
                        continue;
                    }
                };
                let value = content.value();
                if is_revealed(value) {
                    tracing::debug!("Phone value appeared in {}", location.locator);
                    return Some(value.to_string());
                }
            }
            None
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reveal::fake::{Effect, FakeElement, ScriptedDriver};
    use crate::reveal::PopupResolver;

    const URL: &str = "https://auto.ria.com/uk/auto_bmw_x5_1.html";
    const POPUP_VALUE: &str = "div.popup-successful-call-desk";
    const INLINE_VALUE: &str =
        r#"button.size-large.conversion[data-action="call"] span.common-text.ws-pre-wrap.action"#;

    fn config() -> BrowserConfig {
        BrowserConfig {
            popup_timeout_ms: 10,
            locate_timeout_ms: 20,
            reveal_timeout_ms: 50,
            poll_interval_ms: 5,
            ..BrowserConfig::default()
        }
    }

    fn session(driver: ScriptedDriver) -> BrowserSession<ScriptedDriver> {
        BrowserSession::new(driver, PopupResolver::consent_defaults(Duration::from_millis(5)))
    }

    #[tokio::test]
    async fn test_link_trigger_reveals_popup_attribute() {
        let trigger = Locator::css("a.phone_show_link");
        let driver = ScriptedDriver::new().page(
            URL,
            vec![(
                trigger.clone(),
                FakeElement::visible("показати").on_click(Effect::Insert(
                    Locator::css(POPUP_VALUE),
                    FakeElement::visible("(050) 123 45 67").with_attribute("data-value", "0501234567"),
                )),
            )],
        );
        let mut session = session(driver);

        let outcome = PhoneRevealer::site_defaults(&config())
            .attempt(&mut session, URL, Duration::from_millis(50))
            .await;

        assert_eq!(outcome.state, RevealState::Revealed);
        assert_eq!(outcome.phone.as_deref(), Some("0501234567"));
        assert_eq!(session.driver().clicks(), vec![trigger]);
    }

    #[tokio::test]
    async fn test_short_popup_value_counts_as_revealed() {
        let trigger = Locator::css("a.phone_show_link");
        let driver = ScriptedDriver::new().page(
            URL,
            vec![(
                trigger,
                FakeElement::visible("показати").on_click(Effect::Insert(
                    Locator::css(POPUP_VALUE),
                    FakeElement::visible("103 55"),
                )),
            )],
        );
        let mut session = session(driver);

        let outcome = PhoneRevealer::site_defaults(&config())
            .attempt(&mut session, URL, Duration::from_millis(50))
            .await;
        assert_eq!(outcome.state, RevealState::Revealed);
        assert_eq!(outcome.phone.as_deref(), Some("103 55"));
    }

    #[test]
    fn test_masked_values_are_not_revealed() {
        assert!(!is_revealed(""));
        assert!(!is_revealed("(050) XXX XX XX"));
        assert!(is_revealed("(050) 123 45 67"));
    }

    #[tokio::test]
    async fn test_inline_value_waits_past_masked_label() {
        let call = Locator::css(r#"button.size-large.conversion[data-action="call"]"#);
        let driver = ScriptedDriver::new().page(
            URL,
            vec![
                (Locator::css(INLINE_VALUE), FakeElement::visible("(050) XXX XX XX")),
                (
                    call,
                    FakeElement::visible("")
                        .on_click(Effect::Remove(Locator::css(INLINE_VALUE)))
                        .on_click(Effect::Insert(
                            Locator::css(INLINE_VALUE),
                            FakeElement::visible("(050) 123 45 67"),
                        )),
                ),
            ],
        );
        let mut session = session(driver);

        let phone = PhoneRevealer::site_defaults(&config())
            .reveal(&mut session, URL, Duration::from_millis(50))
            .await;
        assert_eq!(phone.as_deref(), Some("(050) 123 45 67"));
    }

    #[tokio::test]
    async fn test_no_trigger_is_not_found() {
        let driver = ScriptedDriver::new().page(URL, vec![]);
        let mut session = session(driver);

        let outcome = PhoneRevealer::site_defaults(&config())
            .attempt(&mut session, URL, Duration::from_millis(50))
            .await;
        assert_eq!(outcome.state, RevealState::NotFound);
        assert_eq!(outcome.phone, None);
    }

    #[tokio::test]
    async fn test_value_never_appears_times_out() {
        let driver = ScriptedDriver::new().page(
            URL,
            vec![(Locator::css("a.phone_show_link"), FakeElement::visible("показати"))],
        );
        let mut session = session(driver);

        let outcome = PhoneRevealer::site_defaults(&config())
            .attempt(&mut session, URL, Duration::from_millis(30))
            .await;
        assert_eq!(outcome.state, RevealState::TimedOut);
        assert!(outcome.state.is_terminal());
    }

    #[tokio::test]
    async fn test_stale_trigger_retried_once() {
        let trigger = Locator::css("a.phone_show_link");
        let driver = ScriptedDriver::new().page(
            URL,
            vec![(
                trigger.clone(),
                FakeElement::visible("показати")
                    .stale_for(1)
                    .on_click(Effect::Insert(
                        Locator::css(POPUP_VALUE),
                        FakeElement::visible("050 123 45 67"),
                    )),
            )],
        );
        let mut session = session(driver);

        let phone = PhoneRevealer::site_defaults(&config())
            .reveal(&mut session, URL, Duration::from_millis(50))
            .await;
        assert_eq!(phone.as_deref(), Some("050 123 45 67"));
        assert_eq!(session.driver().clicks().len(), 1);
    }

    #[tokio::test]
    async fn test_twice_stale_trigger_gives_up() {
        let driver = ScriptedDriver::new().page(
            URL,
            vec![(
                Locator::css("a.phone_show_link"),
                FakeElement::visible("показати").stale_for(2),
            )],
        );
        let mut session = session(driver);

        let outcome = PhoneRevealer::site_defaults(&config())
            .attempt(&mut session, URL, Duration::from_millis(50))
            .await;
        assert_eq!(outcome.state, RevealState::NotFound);
    }

    #[tokio::test]
    async fn test_hidden_trigger_skipped_for_next_candidate() {
        let span = Locator::css("span.conversion_phone_newcars.button.button--green.boxed.mb-16");
        let driver = ScriptedDriver::new().page(
            URL,
            vec![
                (Locator::css("a.phone_show_link"), FakeElement::hidden()),
                (
                    span.clone(),
                    FakeElement::visible("Показати телефон").on_click(Effect::Insert(
                        Locator::css(POPUP_VALUE),
                        FakeElement::visible("0671112233"),
                    )),
                ),
            ],
        );
        let mut session = session(driver);

        let phone = PhoneRevealer::site_defaults(&config())
            .reveal(&mut session, URL, Duration::from_millis(50))
            .await;
        assert_eq!(phone.as_deref(), Some("0671112233"));
        assert_eq!(session.driver().clicks(), vec![span]);
    }
}
