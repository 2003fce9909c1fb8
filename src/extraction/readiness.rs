//! Page readiness detection
//!
//! Layered, short-circuiting heuristics:
//! 1. network idle signal (bounded; a timeout is not a failure on its own)
//! 2. any container pattern present within a secondary timeout
//! 3. job-domain keywords in the rendered text (last resort)
//!
//! The detector never navigates. Between attempts it may ask the page to
//! reload, which is the caller-sanctioned retry described by its options.

use scraper::Html;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::cascade::resolve_all;
use super::patterns::{PatternSet, Role};
use super::text::collapse_whitespace;
use crate::infrastructure::browser::{BrowserPage, SessionResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessOptions {
    /// Upper bound on the network idle wait
    pub idle_timeout_ms: u64,
    /// How long containers may take to appear after the idle wait
    pub container_timeout_ms: u64,
    pub poll_interval_ms: u64,
    /// Whole-detector attempts (>= 1)
    pub max_attempts: u32,
    pub reload_between_attempts: bool,
    /// Lowercase keywords accepted as a low-confidence readiness signal
    pub keywords: Vec<String>,
}

impl Default for ReadinessOptions {
    fn default() -> Self {
        Self {
            idle_timeout_ms: 30_000,
            container_timeout_ms: 5_000,
            poll_interval_ms: 500,
            max_attempts: 2,
            reload_between_attempts: true,
            keywords: vec!["job".into(), "career".into(), "position".into()],
        }
    }
}

impl ReadinessOptions {
    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub const fn container_timeout(&self) -> Duration {
        Duration::from_millis(self.container_timeout_ms)
    }

    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Longest a full `is_ready` can legitimately take: every attempt's idle
    /// wait, container poll and one extra poll interval, plus the reloads between
    pub fn budget(&self) -> Duration {
        let attempts = self.max_attempts.max(1);
        let per_attempt = self.idle_timeout() + self.container_timeout() + self.poll_interval();
        let reloads = if self.reload_between_attempts { attempts - 1 } else { 0 };
        per_attempt * attempts + self.idle_timeout() * reloads
    }
}

/// Which layer declared the page ready
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadinessSignal {
    Containers { pattern: String },
    Keywords { keyword: String },
    NotReady,
}

impl ReadinessSignal {
    pub const fn is_ready(&self) -> bool {
        !matches!(self, Self::NotReady)
    }
}

pub struct ReadinessDetector<'a> {
    patterns: &'a PatternSet,
    options: &'a ReadinessOptions,
}

impl<'a> ReadinessDetector<'a> {
    pub const fn new(patterns: &'a PatternSet, options: &'a ReadinessOptions) -> Self {
        Self { patterns, options }
    }

    /// Run the detector up to `max_attempts` times; `false` is an answer, not an error
    pub async fn is_ready(&self, page: &mut dyn BrowserPage) -> SessionResult<bool> {
        let attempts = self.options.max_attempts.max(1);
        for attempt in 1..=attempts {
            let signal = self.check(page).await?;
            if signal.is_ready() {
                debug!("✅ Page ready on attempt {}/{}: {:?}", attempt, attempts, signal);
                return Ok(true);
            }

            if attempt < attempts && self.options.reload_between_attempts {
                info!("🔄 Page not ready (attempt {}/{}), reloading", attempt, attempts);
                if let Err(e) = page.reload(self.options.idle_timeout()).await {
                    if e.is_fatal() {
                        return Err(e);
                    }
                    warn!("⚠️ Reload before readiness retry failed: {}", e);
                }
            }
        }

        warn!("⚠️ Page not ready after {} attempts: {}", attempts, page.current_url());
        Ok(false)
    }

    /// One pass over the three layers
    pub async fn check(&self, page: &mut dyn BrowserPage) -> SessionResult<ReadinessSignal> {
        match page.wait_for_network_idle(self.options.idle_timeout()).await {
            Ok(true) => {}
            Ok(false) => debug!("Network idle signal did not fire within {}ms", self.options.idle_timeout_ms),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => debug!("Network idle wait failed: {}", e),
        }

        let deadline = Instant::now() + self.options.container_timeout();
        loop {
            let html = page.content().await?;
            if let Some(pattern) = self.container_pattern(&html) {
                return Ok(ReadinessSignal::Containers { pattern });
            }
            if Instant::now() >= deadline {
                break;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            tokio::time::sleep(self.options.poll_interval().min(remaining)).await;
        }

        let html = page.content().await?;
        Ok(self
            .keyword_in(&html)
            .map_or(ReadinessSignal::NotReady, |keyword| ReadinessSignal::Keywords { keyword }))
    }

    fn container_pattern(&self, html: &str) -> Option<String> {
        let document = Html::parse_document(html);
        resolve_all(&document, Role::Container, self.patterns)
            .map(|(pattern, _)| pattern.source().to_string())
    }

    fn keyword_in(&self, html: &str) -> Option<String> {
        let document = Html::parse_document(html);
        let text = collapse_whitespace(&document.root_element().text().collect::<Vec<_>>().join(" "))
            .to_lowercase();
        self.options
            .keywords
            .iter()
            .find(|keyword| text.contains(&keyword.to_lowercase()))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{PageCall, ScriptedSite};

    fn quick_options(max_attempts: u32) -> ReadinessOptions {
        ReadinessOptions {
            idle_timeout_ms: 10,
            container_timeout_ms: 10,
            poll_interval_ms: 2,
            max_attempts,
            ..ReadinessOptions::default()
        }
    }

    #[test]
    fn test_budget_covers_every_attempt() {
        let options = ReadinessOptions::default();
        // 2 x (30s idle + 5s containers + 0.5s poll) + one 30s reload
        assert_eq!(options.budget(), Duration::from_millis(101_000));

        let single = ReadinessOptions {
            max_attempts: 1,
            ..ReadinessOptions::default()
        };
        assert_eq!(single.budget(), Duration::from_millis(35_500));
    }

    #[tokio::test]
    async fn test_containers_signal_ready() {
        let site = ScriptedSite::new()
            .screen("p1", "https://jobs.example.com/", r#"<div class="job-card"><h3>A</h3></div>"#);
        let mut page = site.page_at("p1");
        let patterns = PatternSet::default();
        let options = quick_options(2);
        let detector = ReadinessDetector::new(&patterns, &options);

        let signal = detector.check(&mut page).await.unwrap();
        assert_eq!(signal, ReadinessSignal::Containers { pattern: ".job-card".into() });
    }

    #[tokio::test]
    async fn test_keyword_fallback() {
        let site = ScriptedSite::new()
            .idle(false)
            .screen("p1", "https://x.io/", "<p>Explore open Positions at Acme</p>");
        let mut page = site.page_at("p1");
        let patterns = PatternSet::default();
        let options = quick_options(1);
        let detector = ReadinessDetector::new(&patterns, &options);

        let signal = detector.check(&mut page).await.unwrap();
        assert_eq!(signal, ReadinessSignal::Keywords { keyword: "position".into() });
        assert!(detector.is_ready(&mut page).await.unwrap());
    }

    #[tokio::test]
    async fn test_not_ready_after_exhausting_attempts() {
        let site = ScriptedSite::new()
            .idle(false)
            .screen("p1", "https://x.io/", "<p>Under maintenance</p>");
        let mut page = site.page_at("p1");
        let patterns = PatternSet::default();
        let options = quick_options(3);
        let detector = ReadinessDetector::new(&patterns, &options);

        assert!(!detector.is_ready(&mut page).await.unwrap());
        let calls = site.calls();
        assert_eq!(calls.iter().filter(|c| matches!(c, PageCall::Reload)).count(), 2);
        assert_eq!(calls.iter().filter(|c| matches!(c, PageCall::WaitForIdle)).count(), 3);
        assert!(!calls.iter().any(|c| matches!(c, PageCall::Goto(_))));
    }

    #[tokio::test]
    async fn test_no_reload_when_disabled() {
        let site = ScriptedSite::new().idle(false).screen("p1", "https://x.io/", "<p>empty</p>");
        let mut page = site.page_at("p1");
        let patterns = PatternSet::default();
        let options = ReadinessOptions {
            reload_between_attempts: false,
            ..quick_options(2)
        };

        assert!(!ReadinessDetector::new(&patterns, &options).is_ready(&mut page).await.unwrap());
        assert!(!site.calls().iter().any(|c| matches!(c, PageCall::Reload)));
    }
}
