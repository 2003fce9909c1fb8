//! Test utilities for career-harvest
//!
//! Scripted, in-memory stand-ins for the browser collaborators. A
//! `ScriptedSite` is a set of named screens (URL + markup) plus click
//! transitions between them; pages opened on it record every call in a
//! shared journal so tests can assert on what the engine actually did.

use async_trait::async_trait;
use scraper::{Html, Selector};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use url::Url;

use crate::domain::SiteTarget;
use crate::extraction::orchestrator::{EngineOptions, RunOptions};
use crate::extraction::pagination_controller::PaginationOptions;
use crate::extraction::readiness::ReadinessOptions;
use crate::infrastructure::browser::{BrowserPage, SessionError, SessionFactory, SessionResult, Snapshot};

const BLANK_URL: &str = "about:blank";

/// Journal entry for one page operation (`content` reads are not journaled)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageCall {
    Goto(String),
    Reload,
    WaitForIdle,
    IsVisible(String),
    Click(String),
    Snapshot,
    Close,
}

#[derive(Debug, Clone)]
struct Screen {
    url: String,
    html: String,
}

#[derive(Debug)]
struct Script {
    screens: HashMap<String, Screen>,
    order: Vec<String>,
    transitions: HashMap<(String, String), String>,
    hidden: HashSet<String>,
    idle: bool,
    goto_failures: u32,
    crash_on: HashSet<String>,
    stall_on: HashSet<String>,
    fail_open: bool,
    fail_snapshot: bool,
    opened: u32,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            screens: HashMap::new(),
            order: Vec::new(),
            transitions: HashMap::new(),
            hidden: HashSet::new(),
            idle: true,
            goto_failures: 0,
            crash_on: HashSet::new(),
            stall_on: HashSet::new(),
            fail_open: false,
            fail_snapshot: false,
            opened: 0,
        }
    }
}

impl Script {
    fn screen_for_url(&self, url: &str) -> Option<&String> {
        self.order
            .iter()
            .find(|key| self.screens.get(*key).is_some_and(|screen| same_url(&screen.url, url)))
    }
}

fn same_url(a: &str, b: &str) -> bool {
    match (Url::parse(a), Url::parse(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// First element matching `selector` in `html`, with its `href`
fn first_href(html: &str, selector: &str) -> Option<Option<String>> {
    let selector = Selector::parse(selector).ok()?;
    let document = Html::parse_document(html);
    let element = document.select(&selector).next()?;
    Some(element.value().attr("href").map(str::to_string))
}

/// Builder and shared state for scripted pages
#[derive(Clone, Default)]
pub struct ScriptedSite {
    script: Arc<Mutex<Script>>,
    journal: Arc<Mutex<Vec<PageCall>>>,
}

impl ScriptedSite {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a screen; screens sharing a URL resolve to the first registered
    #[must_use]
    pub fn screen(self, key: &str, url: &str, html: &str) -> Self {
        {
            let mut script = lock(&self.script);
            if !script.screens.contains_key(key) {
                script.order.push(key.to_string());
            }
            script.screens.insert(
                key.to_string(),
                Screen {
                    url: url.to_string(),
                    html: html.to_string(),
                },
            );
        }
        self
    }

    /// Clicking `selector` while on `from` shows `to`
    #[must_use]
    pub fn on_click(self, from: &str, selector: &str, to: &str) -> Self {
        lock(&self.script)
            .transitions
            .insert((from.to_string(), selector.to_string()), to.to_string());
        self
    }

    /// `is_visible(selector)` reports false
    #[must_use]
    pub fn hidden(self, selector: &str) -> Self {
        lock(&self.script).hidden.insert(selector.to_string());
        self
    }

    /// Whether the network idle signal fires
    #[must_use]
    pub fn idle(self, fires: bool) -> Self {
        lock(&self.script).idle = fires;
        self
    }

    /// The next `times` navigations fail with a transient error
    #[must_use]
    pub fn fail_goto(self, times: u32) -> Self {
        lock(&self.script).goto_failures = times;
        self
    }

    /// Reading content on screen `key` reports a closed session
    #[must_use]
    pub fn crash_on(self, key: &str) -> Self {
        lock(&self.script).crash_on.insert(key.to_string());
        self
    }

    /// Reading content on screen `key` never returns
    #[must_use]
    pub fn stall_on(self, key: &str) -> Self {
        lock(&self.script).stall_on.insert(key.to_string());
        self
    }

    #[must_use]
    pub fn fail_open(self) -> Self {
        lock(&self.script).fail_open = true;
        self
    }

    #[must_use]
    pub fn fail_snapshot(self) -> Self {
        lock(&self.script).fail_snapshot = true;
        self
    }

    /// A page already showing screen `key`
    pub fn page_at(&self, key: &str) -> ScriptedPage {
        ScriptedPage {
            site: self.clone(),
            current: Some(key.to_string()),
            closed: false,
        }
    }

    pub fn factory(&self) -> ScriptedSessionFactory {
        ScriptedSessionFactory { site: self.clone() }
    }

    pub fn calls(&self) -> Vec<PageCall> {
        lock(&self.journal).clone()
    }

    pub fn count(&self, predicate: impl Fn(&PageCall) -> bool) -> usize {
        lock(&self.journal).iter().filter(|call| predicate(call)).count()
    }

    /// Sessions opened through the factory
    pub fn opened(&self) -> u32 {
        lock(&self.script).opened
    }

    fn record(&self, call: PageCall) {
        lock(&self.journal).push(call);
    }
}

pub struct ScriptedPage {
    site: ScriptedSite,
    current: Option<String>,
    closed: bool,
}

impl ScriptedPage {
    fn ensure_open(&self) -> SessionResult<()> {
        if self.closed {
            Err(SessionError::Closed)
        } else {
            Ok(())
        }
    }

    fn stalled(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|key| lock(&self.site.script).stall_on.contains(key))
    }

    fn current_html(&self) -> SessionResult<String> {
        let script = lock(&self.site.script);
        let Some(key) = &self.current else {
            return Ok("<html><body></body></html>".to_string());
        };
        if script.crash_on.contains(key) {
            return Err(SessionError::Closed);
        }
        Ok(script.screens.get(key).map(|s| s.html.clone()).unwrap_or_default())
    }

    fn navigate(&mut self, url: &str) -> SessionResult<()> {
        let mut script = lock(&self.site.script);
        if script.goto_failures > 0 {
            script.goto_failures -= 1;
            return Err(SessionError::Navigation {
                url: url.to_string(),
                reason: "net::ERR_CONNECTION_RESET".to_string(),
            });
        }
        match script.screen_for_url(url) {
            Some(key) => {
                self.current = Some(key.clone());
                Ok(())
            }
            None => Err(SessionError::Navigation {
                url: url.to_string(),
                reason: "404 Not Found".to_string(),
            }),
        }
    }
}

#[async_trait]
impl BrowserPage for ScriptedPage {
    async fn goto(&mut self, url: &str, _timeout: std::time::Duration) -> SessionResult<()> {
        self.site.record(PageCall::Goto(url.to_string()));
        self.ensure_open()?;
        self.navigate(url)
    }

    async fn reload(&mut self, _timeout: std::time::Duration) -> SessionResult<()> {
        self.site.record(PageCall::Reload);
        self.ensure_open()
    }

    async fn wait_for_network_idle(&mut self, _timeout: std::time::Duration) -> SessionResult<bool> {
        self.site.record(PageCall::WaitForIdle);
        self.ensure_open()?;
        Ok(lock(&self.site.script).idle)
    }

    async fn content(&mut self) -> SessionResult<String> {
        self.ensure_open()?;
        if self.stalled() {
            std::future::pending::<()>().await;
        }
        self.current_html()
    }

    fn current_url(&self) -> String {
        let script = lock(&self.site.script);
        self.current
            .as_ref()
            .and_then(|key| script.screens.get(key))
            .map_or_else(|| BLANK_URL.to_string(), |screen| screen.url.clone())
    }

    async fn is_visible(&mut self, selector: &str) -> SessionResult<bool> {
        self.site.record(PageCall::IsVisible(selector.to_string()));
        self.ensure_open()?;
        if lock(&self.site.script).hidden.contains(selector) {
            return Ok(false);
        }
        let html = self.current_html()?;
        Ok(first_href(&html, selector).is_some())
    }

    async fn click(&mut self, selector: &str) -> SessionResult<()> {
        self.site.record(PageCall::Click(selector.to_string()));
        self.ensure_open()?;

        let transition = self.current.as_ref().and_then(|current| {
            lock(&self.site.script)
                .transitions
                .get(&(current.clone(), selector.to_string()))
                .cloned()
        });
        if let Some(next) = transition {
            self.current = Some(next);
            return Ok(());
        }

        let html = self.current_html()?;
        match first_href(&html, selector) {
            // present but scripted to do nothing
            Some(_) => Ok(()),
            None => Err(SessionError::ElementNotFound {
                selector: selector.to_string(),
            }),
        }
    }

    async fn snapshot(&mut self) -> SessionResult<Snapshot> {
        self.site.record(PageCall::Snapshot);
        if lock(&self.site.script).fail_snapshot {
            return Err(SessionError::Unsupported {
                operation: "snapshot".to_string(),
            });
        }
        let bytes = self.current_html().unwrap_or_default().into_bytes();
        Ok(Snapshot {
            bytes,
            extension: "html".to_string(),
        })
    }

    async fn close(&mut self) -> SessionResult<()> {
        self.site.record(PageCall::Close);
        self.closed = true;
        Ok(())
    }
}

#[derive(Clone)]
pub struct ScriptedSessionFactory {
    site: ScriptedSite,
}

#[async_trait]
impl SessionFactory for ScriptedSessionFactory {
    async fn open(&self, _target: &SiteTarget) -> SessionResult<Box<dyn BrowserPage>> {
        let mut script = lock(&self.site.script);
        if script.fail_open {
            return Err(SessionError::Transport("browser context unavailable".to_string()));
        }
        script.opened += 1;
        drop(script);
        Ok(Box::new(ScriptedPage {
            site: self.site.clone(),
            current: None,
            closed: false,
        }))
    }
}

/// Engine options with millisecond-scale waits
pub fn quick_engine() -> EngineOptions {
    EngineOptions {
        readiness: ReadinessOptions {
            idle_timeout_ms: 5,
            container_timeout_ms: 5,
            poll_interval_ms: 1,
            max_attempts: 2,
            ..ReadinessOptions::default()
        },
        pagination: PaginationOptions {
            navigation_timeout_ms: 500,
            idle_timeout_ms: 5,
            settle_delay_ms: 1,
            ..PaginationOptions::default()
        },
        run: RunOptions {
            navigation_attempts: 3,
            navigation_backoff_ms: 1,
            navigation_timeout_ms: 500,
            page_delay_ms: 0,
            step_timeout_ms: 2_000,
            require_growth_after_load_more: true,
        },
    }
}
