//! Pagination controller
//!
//! Drives `PaginationState` through `Ready -> Advancing -> {Ready | Exhausted | Failed}`.
//! Strategies are tried in priority order on every call (unless one is forced):
//! sequential "next" link, "load more" append, numbered pager with an exact
//! offset target. A missing control exhausts the listing; an activation error
//! fails it. Neither is a run-level failure.

use lazy_static::lazy_static;
use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::cascade::resolve_where;
use super::patterns::{Pattern, PatternSet, Role};
use super::text::{element_text, first_digit_run, is_disabled, resolve_href};
use crate::domain::{NavigationStrategy, PaginationState};
use crate::infrastructure::browser::{bounded, BrowserPage, SessionError, SessionResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationOptions {
    pub navigation_timeout_ms: u64,
    pub idle_timeout_ms: u64,
    /// Fixed wait after a load-more activation
    pub settle_delay_ms: u64,
    /// Rows per page, used to compute numbered pager offsets
    pub page_size: u32,
    /// Single authoritative strategy; `None` tries all in priority order
    pub strategy: Option<NavigationStrategy>,
}

impl Default for PaginationOptions {
    fn default() -> Self {
        Self {
            navigation_timeout_ms: 30_000,
            idle_timeout_ms: 30_000,
            settle_delay_ms: 2_000,
            page_size: 10,
            strategy: None,
        }
    }
}

impl PaginationOptions {
    pub const fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub const fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// A located, enabled pagination control
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Control {
    pub strategy: NavigationStrategy,
    /// Selector whose first match is the control
    pub selector: String,
    /// Absolute navigation target; `None` means activate by click
    pub target: Option<String>,
}

pub struct PaginationController<'a> {
    patterns: &'a PatternSet,
    options: &'a PaginationOptions,
}

impl<'a> PaginationController<'a> {
    pub const fn new(patterns: &'a PatternSet, options: &'a PaginationOptions) -> Self {
        Self { patterns, options }
    }

    /// `Ok(true)` when new content is reachable and `state` moved to the next page.
    ///
    /// Only fatal session errors are returned as `Err`; the state is marked
    /// failed before they propagate.
    pub async fn advance(&self, page: &mut dyn BrowserPage, state: &mut PaginationState) -> SessionResult<bool> {
        if state.is_terminal() {
            return Ok(false);
        }
        if state.at_last_page() {
            debug!("Page limit {} reached", state.max_pages());
            state.exhaust();
            return Ok(false);
        }

        state.begin_advance();

        let html = match page.content().await {
            Ok(html) => html,
            Err(e) => return Self::abandon(state, e),
        };
        let controls = self.locate_controls(&html, &page.current_url(), state.current_page_index());

        for control in controls {
            match page.is_visible(&control.selector).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!("{} control '{}' is not visible", control.strategy, control.selector);
                    continue;
                }
                Err(e) if e.is_fatal() => return Self::abandon(state, e),
                Err(e) => {
                    debug!("Visibility check for '{}' failed: {}", control.selector, e);
                    continue;
                }
            }

            info!(
                "➡️ Advancing page {} -> {} via {} ('{}')",
                state.current_page_index(),
                state.current_page_index() + 1,
                control.strategy,
                control.selector
            );
            return match self.activate(page, &control).await {
                Ok(()) => {
                    state.record_advance(control.strategy);
                    Ok(true)
                }
                Err(e) => Self::abandon(state, e),
            };
        }

        info!("🏁 No pagination control found after page {}; listing exhausted", state.current_page_index());
        state.exhaust();
        Ok(false)
    }

    fn abandon(state: &mut PaginationState, error: SessionError) -> SessionResult<bool> {
        state.fail();
        if error.is_fatal() {
            return Err(error);
        }
        warn!("⚠️ Pagination failed: {}", error);
        Ok(false)
    }

    async fn activate(&self, page: &mut dyn BrowserPage, control: &Control) -> SessionResult<()> {
        let timeout = self.options.navigation_timeout();
        match &control.target {
            Some(url) if control.strategy != NavigationStrategy::LoadMore => page.goto(url, timeout).await?,
            _ => bounded("click", timeout, page.click(&control.selector)).await?,
        }

        match page.wait_for_network_idle(self.options.idle_timeout()).await {
            Ok(true) => {}
            Ok(false) => debug!("Network idle not reached after activation"),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => debug!("Idle wait after activation failed: {}", e),
        }

        if control.strategy == NavigationStrategy::LoadMore {
            tokio::time::sleep(self.options.settle_delay()).await;
        }
        Ok(())
    }

    /// Enabled controls in the order they should be tried
    pub fn locate_controls(&self, html: &str, page_url: &str, current_page: u32) -> Vec<Control> {
        let document = Html::parse_document(html);
        let base = Url::parse(page_url).ok();

        let strategies: Vec<NavigationStrategy> = match self.options.strategy {
            Some(NavigationStrategy::None) => Vec::new(),
            Some(forced) => vec![forced],
            None => NavigationStrategy::PRIORITY.to_vec(),
        };

        strategies
            .into_iter()
            .filter_map(|strategy| match strategy {
                NavigationStrategy::SequentialLink => {
                    self.role_control(&document, base.as_ref(), page_url, Role::NextPage, strategy)
                }
                NavigationStrategy::LoadMore => {
                    self.role_control(&document, base.as_ref(), page_url, Role::LoadMore, strategy)
                }
                NavigationStrategy::NumberedForm => {
                    self.numbered_control(&document, base.as_ref(), page_url, current_page)
                }
                NavigationStrategy::None => None,
            })
            .collect()
    }

    fn role_control(
        &self,
        document: &Html,
        base: Option<&Url>,
        page_url: &str,
        role: Role,
        strategy: NavigationStrategy,
    ) -> Option<Control> {
        self.control_from(document, base, page_url, self.patterns.candidates(role), strategy)
    }

    fn control_from(
        &self,
        document: &Html,
        base: Option<&Url>,
        page_url: &str,
        candidates: &[Pattern],
        strategy: NavigationStrategy,
    ) -> Option<Control> {
        let found = resolve_where(document, candidates, |node| !is_disabled(node));
        let (pattern, node) = (found.pattern()?, found.node()?);

        let target = base
            .zip(node.value().attr("href"))
            .and_then(|(base, href)| resolve_href(base, href).ok().flatten())
            .map(String::from);

        // A "next" link back to the current page would never terminate
        if strategy == NavigationStrategy::SequentialLink && target.as_deref() == Some(page_url) {
            debug!("Next control '{}' points at the current page; ignoring", pattern.source());
            return None;
        }

        Some(Control {
            strategy,
            selector: pattern.source().to_string(),
            target,
        })
    }

    fn numbered_control(
        &self,
        document: &Html,
        base: Option<&Url>,
        page_url: &str,
        current_page: u32,
    ) -> Option<Control> {
        let active = self.active_page_number(document).unwrap_or(current_page);
        let next_page = active + 1;
        let offset = u64::from(active) * u64::from(self.options.page_size);
        debug!("Numbered pager: active page {}, looking for page {} / offset {}", active, next_page, offset);

        self.patterns.numbered_targets().iter().find_map(|template| {
            match NumberedTarget::parse(template, next_page, offset) {
                NumberedTarget::QueryValue { key, value } => Self::query_value_control(document, base?, &key, value),
                NumberedTarget::Selector(pattern) => self.control_from(
                    document,
                    base,
                    page_url,
                    std::slice::from_ref(&pattern),
                    NavigationStrategy::NumberedForm,
                ),
            }
        })
    }

    /// First enabled link whose `key` query parameter is exactly `value`
    fn query_value_control(document: &Html, base: &Url, key: &str, value: u64) -> Option<Control> {
        let links = Selector::parse("a[href]").ok()?;
        document
            .select(&links)
            .filter(|node| !is_disabled(*node))
            .find_map(|node| {
                let href = node.value().attr("href")?;
                let target = resolve_href(base, href).ok().flatten()?;
                let matches = target.query_pairs().any(|(name, raw)| {
                    name.eq_ignore_ascii_case(key) && raw.trim().parse::<u64>().is_ok_and(|n| n == value)
                });
                matches.then(|| Control {
                    strategy: NavigationStrategy::NumberedForm,
                    selector: exact_href_selector(href),
                    target: Some(target.to_string()),
                })
            })
    }

    /// Page number shown as active by the pager widget
    fn active_page_number(&self, document: &Html) -> Option<u32> {
        let found = resolve_where(document, self.patterns.candidates(Role::ActivePage), |_| true);
        let node = found.node()?;
        let value = node.value();

        ["data-page", "aria-label", "title"]
            .iter()
            .filter_map(|attr| value.attr(attr))
            .map(str::to_string)
            .chain(element_text(node))
            .find_map(|text| first_digit_run(&text).and_then(|digits| digits.parse().ok()))
    }
}

lazy_static! {
    static ref QUERY_TEMPLATE: Option<Regex> = Regex::new(r"^([A-Za-z_][A-Za-z0-9_.-]*)=\{(page|offset)\}$").ok();
}

/// A numbered pager template with the next page substituted
#[derive(Debug)]
enum NumberedTarget {
    QueryValue { key: String, value: u64 },
    Selector(Pattern),
}

impl NumberedTarget {
    fn parse(template: &str, next_page: u32, offset: u64) -> Self {
        let captures = QUERY_TEMPLATE.as_ref().and_then(|re| re.captures(template.trim()));
        if let Some(captures) = captures {
            let value = if &captures[2] == "page" { u64::from(next_page) } else { offset };
            return Self::QueryValue {
                key: captures[1].to_string(),
                value,
            };
        }
        Self::Selector(Pattern::new(
            template
                .replace("{page}", &next_page.to_string())
                .replace("{offset}", &offset.to_string()),
        ))
    }
}

/// Selector matching exactly the anchors carrying `href`
fn exact_href_selector(href: &str) -> String {
    format!("a[href=\"{}\"]", href.replace('\\', "\\\\").replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PaginationPhase;
    use crate::extraction::patterns::PatternConfig;
    use crate::test_utils::{PageCall, ScriptedSite};

    fn quick() -> PaginationOptions {
        PaginationOptions {
            navigation_timeout_ms: 200,
            idle_timeout_ms: 10,
            settle_delay_ms: 1,
            ..PaginationOptions::default()
        }
    }

    fn ready_state(max_pages: u32) -> PaginationState {
        let mut state = PaginationState::new(max_pages);
        state.mark_ready();
        state
    }

    #[tokio::test]
    async fn test_sequential_link_navigates_to_target() {
        let site = ScriptedSite::new()
            .screen("p1", "https://x.io/jobs", r#"<a rel="next" href="/jobs?page=2">Next</a>"#)
            .screen("p2", "https://x.io/jobs?page=2", "<p>page two</p>");
        let mut page = site.page_at("p1");
        let patterns = PatternSet::default();
        let options = quick();
        let mut state = ready_state(3);

        let advanced = PaginationController::new(&patterns, &options)
            .advance(&mut page, &mut state)
            .await
            .unwrap();

        assert!(advanced);
        assert_eq!(state.current_page_index(), 2);
        assert_eq!(state.strategy(), NavigationStrategy::SequentialLink);
        assert_eq!(page.current_url(), "https://x.io/jobs?page=2");
        assert!(site.calls().contains(&PageCall::Goto("https://x.io/jobs?page=2".into())));
    }

    #[tokio::test]
    async fn test_next_button_without_target_is_clicked() {
        let site = ScriptedSite::new()
            .screen("p1", "https://x.io/jobs", r#"<button aria-label="Next Page">›</button>"#)
            .screen("p2", "https://x.io/jobs", "<p>page two</p>")
            .on_click("p1", "[aria-label=\"Next Page\"]", "p2");
        let mut page = site.page_at("p1");
        let patterns = PatternSet::default();
        let options = quick();
        let mut state = ready_state(3);

        let controller = PaginationController::new(&patterns, &options);
        assert!(controller.advance(&mut page, &mut state).await.unwrap());
        assert!(site.calls().contains(&PageCall::Click("[aria-label=\"Next Page\"]".into())));
    }

    #[tokio::test]
    async fn test_load_more_clicks_and_settles() {
        let site = ScriptedSite::new()
            .screen("p1", "https://x.io/jobs", r#"<button class="load-more">Load more</button>"#)
            .screen("p1b", "https://x.io/jobs", r#"<p>more rows</p>"#)
            .on_click("p1", ".load-more", "p1b");
        let mut page = site.page_at("p1");
        let patterns = PatternSet::default();
        let options = quick();
        let mut state = ready_state(2);

        let controller = PaginationController::new(&patterns, &options);
        assert!(controller.advance(&mut page, &mut state).await.unwrap());
        assert_eq!(state.strategy(), NavigationStrategy::LoadMore);
        assert!(site.calls().contains(&PageCall::Click(".load-more".into())));
    }

    #[tokio::test]
    async fn test_numbered_pager_uses_offset_of_next_page() {
        let html = r#"
            <ul class="pagination">
              <li class="active"><a href="?q=&startrow=0">1</a></li>
              <li><a href="?q=&startrow=10">2</a></li>
              <li><a href="?q=&startrow=20">3</a></li>
            </ul>"#;
        let site = ScriptedSite::new()
            .screen("p1", "https://x.io/search/?q=", html)
            .screen("p2", "https://x.io/search/?q=&startrow=10", "<p>rows 11-20</p>");
        let mut page = site.page_at("p1");
        let patterns = PatternSet::default();
        let options = PaginationOptions {
            strategy: Some(NavigationStrategy::NumberedForm),
            ..quick()
        };
        let mut state = ready_state(5);

        let controller = PaginationController::new(&patterns, &options);
        assert!(controller.advance(&mut page, &mut state).await.unwrap());
        assert_eq!(state.strategy(), NavigationStrategy::NumberedForm);
        assert_eq!(page.current_url(), "https://x.io/search/?q=&startrow=10");
    }

    #[test]
    fn test_numbered_pager_reads_active_page_from_widget() {
        let html = r#"
            <ul class="pagination">
              <li><a href="?page=2">2</a></li>
              <li class="active"><a href="?page=3">3</a></li>
              <li><a href="?page=4">4</a></li>
            </ul>"#;
        let patterns = PatternSet::default();
        let options = PaginationOptions {
            strategy: Some(NavigationStrategy::NumberedForm),
            ..quick()
        };
        let controls =
            PaginationController::new(&patterns, &options).locate_controls(html, "https://x.io/list?page=3", 1);
        assert_eq!(controls.len(), 1);
        assert_eq!(controls[0].target.as_deref(), Some("https://x.io/list?page=4"));
    }

    #[test]
    fn test_numbered_pager_matches_exact_offset_out_of_order() {
        let html = r#"
            <ul class="pagination">
              <li class="active"><a href="?q=&startrow=0">1</a></li>
              <li><a href="?q=&startrow=100">11</a></li>
              <li><a href="?q=&startrow=10">2</a></li>
            </ul>"#;
        let patterns = PatternSet::default();
        let options = PaginationOptions {
            strategy: Some(NavigationStrategy::NumberedForm),
            ..quick()
        };
        let controls =
            PaginationController::new(&patterns, &options).locate_controls(html, "https://x.io/search/?q=", 1);

        assert_eq!(controls.len(), 1);
        assert_eq!(controls[0].target.as_deref(), Some("https://x.io/search/?q=&startrow=10"));
        assert_eq!(controls[0].selector, r#"a[href="?q=&startrow=10"]"#);
    }

    #[test]
    fn test_numbered_pager_ignores_longer_page_numbers() {
        let html = r#"
            <ul class="pagination">
              <li class="active"><a href="?page=1">1</a></li>
              <li><a href="?page=20">20</a></li>
              <li><a href="?pageSize=2&page=3">3</a></li>
            </ul>"#;
        let patterns = PatternSet::default();
        let options = PaginationOptions {
            strategy: Some(NavigationStrategy::NumberedForm),
            ..quick()
        };
        let controller = PaginationController::new(&patterns, &options);

        assert!(controller.locate_controls(html, "https://x.io/list?page=1", 1).is_empty());

        let with_two = html.replace("?page=20", "?page=2");
        let controls = controller.locate_controls(&with_two, "https://x.io/list?page=1", 1);
        assert_eq!(controls[0].target.as_deref(), Some("https://x.io/list?page=2"));
    }

    #[test]
    fn test_selector_templates_still_substitute() {
        let html = r#"<a title="Page 2" data-go="p2">2</a>"#;
        let patterns = PatternConfig {
            numbered_targets: vec!["a[title=\"Page {page}\"]".into()],
            ..PatternConfig::default()
        }
        .compile();
        let options = PaginationOptions {
            strategy: Some(NavigationStrategy::NumberedForm),
            ..quick()
        };
        let controls = PaginationController::new(&patterns, &options).locate_controls(html, "https://x.io/list", 1);
        assert_eq!(controls[0].selector, r#"a[title="Page 2"]"#);
        assert_eq!(controls[0].target, None);
    }

    #[test]
    fn test_disabled_next_is_skipped() {
        let html = r#"<a rel="next" class="disabled" href="?page=2">Next</a>"#;
        let patterns = PatternConfig {
            next_page: vec!["a[rel=\"next\"]".into()],
            load_more: vec![],
            numbered_targets: vec![],
            ..PatternConfig::default()
        }
        .compile();
        let options = quick();
        let controls = PaginationController::new(&patterns, &options).locate_controls(html, "https://x.io/", 1);
        assert!(controls.is_empty());
    }

    #[tokio::test]
    async fn test_no_control_exhausts() {
        let site = ScriptedSite::new().screen("p1", "https://x.io/jobs", "<p>last page</p>");
        let mut page = site.page_at("p1");
        let patterns = PatternSet::default();
        let options = quick();
        let mut state = ready_state(3);

        let controller = PaginationController::new(&patterns, &options);
        assert!(!controller.advance(&mut page, &mut state).await.unwrap());
        assert!(state.is_exhausted());
        assert_eq!(state.phase(), PaginationPhase::Exhausted);
        assert_eq!(state.current_page_index(), 1);
    }

    #[tokio::test]
    async fn test_activation_error_fails_without_raising() {
        let site = ScriptedSite::new()
            .screen("p1", "https://x.io/jobs", r#"<a rel="next" href="/jobs?page=2">Next</a>"#);
        let mut page = site.page_at("p1");
        let patterns = PatternSet::default();
        let options = quick();
        let mut state = ready_state(3);

        let controller = PaginationController::new(&patterns, &options);
        assert!(!controller.advance(&mut page, &mut state).await.unwrap());
        assert_eq!(state.phase(), PaginationPhase::Failed);
        assert!(state.is_exhausted());
    }

    #[tokio::test]
    async fn test_hidden_control_falls_through_to_next_strategy() {
        let site = ScriptedSite::new()
            .screen(
                "p1",
                "https://x.io/jobs",
                r#"<a rel="next" href="/jobs?page=2">Next</a><button class="load-more">More</button>"#,
            )
            .screen("p1b", "https://x.io/jobs", "<p>appended</p>")
            .hidden("a[rel=\"next\"]")
            .on_click("p1", ".load-more", "p1b");
        let mut page = site.page_at("p1");
        let patterns = PatternSet::default();
        let options = quick();
        let mut state = ready_state(3);

        let controller = PaginationController::new(&patterns, &options);
        assert!(controller.advance(&mut page, &mut state).await.unwrap());
        assert_eq!(state.strategy(), NavigationStrategy::LoadMore);
    }

    #[tokio::test]
    async fn test_at_last_page_never_touches_page() {
        let site = ScriptedSite::new().screen("p1", "https://x.io/jobs", r#"<a rel="next" href="?p=2">Next</a>"#);
        let mut page = site.page_at("p1");
        let patterns = PatternSet::default();
        let options = quick();
        let mut state = ready_state(1);

        let controller = PaginationController::new(&patterns, &options);
        assert!(!controller.advance(&mut page, &mut state).await.unwrap());
        assert!(state.is_exhausted());
        assert!(site.calls().is_empty());
    }
}
