//! Scripted in-memory driver for reveal tests

use crate::browser::{BrowserDriver, BrowserError, BrowserResult, ElementContent, Locator};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub enum Effect {
    Remove(Locator),
    Insert(Locator, FakeElement),
}

#[derive(Debug, Clone)]
pub struct FakeElement {
    pub displayed: bool,
    pub enabled: bool,
    pub text: String,
    pub attributes: HashMap<String, String>,
    pub on_click: Vec<Effect>,
    /// Clicks that fail with a stale reference before one succeeds
    pub stale_clicks: u32,
}

impl FakeElement {
    pub fn visible(text: &str) -> Self {
        Self {
            displayed: true,
            enabled: true,
            text: text.to_string(),
            attributes: HashMap::new(),
            on_click: Vec::new(),
            stale_clicks: 0,
        }
    }

    pub fn hidden() -> Self {
        Self {
            displayed: false,
            ..Self::visible("")
        }
    }

    pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    pub fn on_click(mut self, effect: Effect) -> Self {
        self.on_click.push(effect);
        self
    }

    pub fn stale_for(mut self, clicks: u32) -> Self {
        self.stale_clicks = clicks;
        self
    }
}

#[derive(Default)]
struct State {
    pages: HashMap<String, Vec<(Locator, FakeElement)>>,
    current: Vec<(Locator, FakeElement)>,
    visited: Vec<String>,
    clicks: Vec<Locator>,
    scripts: Vec<String>,
    finds: usize,
}

/// Page contents are keyed by URL and loaded on `navigate`
#[derive(Default)]
pub struct ScriptedDriver {
    state: Mutex<State>,
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, url: &str, elements: Vec<(Locator, FakeElement)>) -> Self {
        self.state
            .lock()
            .unwrap()
            .pages
            .insert(url.to_string(), elements);
        self
    }

    pub fn visited(&self) -> Vec<String> {
        self.state.lock().unwrap().visited.clone()
    }

    pub fn clicks(&self) -> Vec<Locator> {
        self.state.lock().unwrap().clicks.clone()
    }

    pub fn scripts(&self) -> Vec<String> {
        self.state.lock().unwrap().scripts.clone()
    }

    pub fn finds(&self) -> usize {
        self.state.lock().unwrap().finds
    }

    pub fn is_present(&self, locator: &Locator) -> bool {
        self.state
            .lock()
            .unwrap()
            .current
            .iter()
            .any(|(l, _)| l == locator)
    }
}

fn lookup<'a>(current: &'a [(Locator, FakeElement)], locator: &Locator) -> Option<(&'a Locator, &'a FakeElement)> {
    let candidates: Vec<Locator> = match locator {
        Locator::Css(list) if list.contains(',') => list
            .split(',')
            .map(|part| Locator::css(part.trim()))
            .collect(),
        other => vec![other.clone()],
    };
    candidates
        .iter()
        .find_map(|c| current.iter().find(|(l, _)| l == c))
        .map(|(l, e)| (l, e))
}

fn apply(current: &mut Vec<(Locator, FakeElement)>, effects: Vec<Effect>) {
    for effect in effects {
        match effect {
            Effect::Remove(locator) => current.retain(|(l, _)| *l != locator),
            Effect::Insert(locator, element) => current.push((locator, element)),
        }
    }
}

#[async_trait]
impl BrowserDriver for ScriptedDriver {
    type Element = Locator;

    async fn navigate(&self, url: &str) -> BrowserResult<()> {
        let mut state = self.state.lock().unwrap();
        state.visited.push(url.to_string());
        state.current = state.pages.get(url).cloned().unwrap_or_default();
        Ok(())
    }

    async fn find(&self, locator: &Locator) -> BrowserResult<Option<Locator>> {
        let mut state = self.state.lock().unwrap();
        state.finds += 1;
        Ok(lookup(&state.current, locator).map(|(l, _)| l.clone()))
    }

    async fn is_interactable(&self, element: &Locator) -> BrowserResult<bool> {
        let state = self.state.lock().unwrap();
        Ok(lookup(&state.current, element)
            .map(|(_, e)| e.displayed && e.enabled)
            .unwrap_or(false))
    }

    async fn is_displayed(&self, element: &Locator) -> BrowserResult<bool> {
        let state = self.state.lock().unwrap();
        Ok(lookup(&state.current, element)
            .map(|(_, e)| e.displayed)
            .unwrap_or(false))
    }

    async fn click(&self, element: &Locator) -> BrowserResult<()> {
        self.dispatch_click(element).await
    }

    async fn dispatch_click(&self, element: &Locator) -> BrowserResult<()> {
        let mut state = self.state.lock().unwrap();
        let index = state
            .current
            .iter()
            .position(|(l, _)| l == element)
            .ok_or_else(|| BrowserError::StaleElement(element.to_string()))?;

        if state.current[index].1.stale_clicks > 0 {
            state.current[index].1.stale_clicks -= 1;
            return Err(BrowserError::StaleElement(element.to_string()));
        }

        state.clicks.push(element.clone());
        let effects = state.current[index].1.on_click.clone();
        apply(&mut state.current, effects);
        Ok(())
    }

    async fn read(&self, element: &Locator, attribute: Option<&str>) -> BrowserResult<ElementContent> {
        let state = self.state.lock().unwrap();
        let (_, found) = lookup(&state.current, element)
            .ok_or_else(|| BrowserError::StaleElement(element.to_string()))?;
        Ok(ElementContent {
            attribute: attribute.and_then(|name| found.attributes.get(name).cloned()),
            text: found.text.trim().to_string(),
        })
    }

    async fn execute(&self, script: &str) -> BrowserResult<serde_json::Value> {
        let mut state = self.state.lock().unwrap();
        state.scripts.push(script.to_string());
        state.current.retain(|(l, _)| match l {
            Locator::Css(selector) => {
                let quoted = serde_json::to_string(selector).unwrap();
                !script.contains(&quoted)
            }
            Locator::XPath(_) => true,
        });
        Ok(serde_json::Value::Null)
    }
}
