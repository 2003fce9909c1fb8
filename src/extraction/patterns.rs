//! Pattern library for job listing pages
//!
//! Centralized, ordered candidate selectors per semantic role. Order encodes
//! priority: explicit data attributes and vendor classes first, bare tags last.

use scraper::Selector;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use super::text::collapse_whitespace;
use crate::domain::normalize_title;

/// Semantic slot a cascade resolves against arbitrary markup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Container,
    Title,
    Location,
    Link,
    NextPage,
    LoadMore,
    /// Current page marker inside a numbered pager
    ActivePage,
}

impl Role {
    pub const ALL: [Self; 7] = [
        Self::Container,
        Self::Title,
        Self::Location,
        Self::Link,
        Self::NextPage,
        Self::LoadMore,
        Self::ActivePage,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Container => "container",
            Self::Title => "title",
            Self::Location => "location",
            Self::Link => "link",
            Self::NextPage => "next_page",
            Self::LoadMore => "load_more",
            Self::ActivePage => "active_page",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One candidate structural matcher.
///
/// Selectors the CSS engine cannot parse (e.g. jQuery `:contains(...)`) are
/// kept as unsupported candidates; cascades skip them.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    selector: Option<Selector>,
}

impl Pattern {
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let selector = match Selector::parse(&source) {
            Ok(selector) => Some(selector),
            Err(e) => {
                debug!("Unsupported selector '{}' kept as inert candidate: {}", source, e);
                None
            }
        };
        Self { source, selector }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub const fn selector(&self) -> Option<&Selector> {
        self.selector.as_ref()
    }

    pub const fn is_supported(&self) -> bool {
        self.selector.is_some()
    }
}

/// Serializable pattern configuration (role -> ordered selector strings)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    /// Selectors for job containers - multiple fallbacks
    pub container: Vec<String>,

    /// Selectors for the job title inside a container
    pub title: Vec<String>,

    /// Selectors for the job location inside a container
    pub location: Vec<String>,

    /// Selectors for the detail page link inside a container
    pub link: Vec<String>,

    /// "Next page" controls
    pub next_page: Vec<String>,

    /// "Load more" / "show more" controls
    pub load_more: Vec<String>,

    /// Active page marker of a numbered pager
    pub active_page: Vec<String>,

    /// Templates for the control leading to an exact page; `{page}` is the
    /// 1-based next page number and `{offset}` the next row offset.
    /// `key={page}` / `key={offset}` match a link whose `key` query value
    /// equals the number; anything else is a CSS selector after substitution.
    pub numbered_targets: Vec<String>,

    /// Container titles that are navigation chrome, not jobs
    pub ignored_titles: Vec<String>,

    /// Attributes carrying an external job id
    pub id_attributes: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            container: strings(&[
                "[data-job-id]",
                "[data-posting-id]",
                ".job-tile",
                ".job-card",
                "[class*=\"job-item\"]",
                ".bx--card-group__card",
                "a[ph-tevent=\"job_click\"]",
                "a[data-ph-at-id=\"job-link\"]",
                "tr[class*=\"table--advanced-search\"]",
                "tr.data-row",
                ".views-row",
                "div[class*=\"job\"]",
                "div[class*=\"career\"]",
                "div[class*=\"position\"]",
                ".careers-list",
                ".listing",
                ".posting",
                "article",
            ]),
            title: strings(&[
                ".job-title",
                "[class*=\"job-title\"]",
                "[class*=\"role-title\"]",
                "[data-ph-at-job-title-text]",
                ".jobTitle-link",
                ".bx--card__heading",
                ".table--advanced-search__title",
                "a[id^=\"jotTitle_\"]",
                "h1",
                "h2",
                "h3",
                "h4",
                "[class*=\"title\"]",
            ]),
            location: strings(&[
                ".location-text",
                ".job-location",
                "[class*=\"location\"]",
                "[data-location]",
                "[data-ph-at-job-location-text]",
                ".jobLocation",
                ".ibm--card__copy__inner",
                ".table--advanced-search__location",
                "[class*=\"city\"]",
                "[class*=\"region\"]",
            ]),
            link: strings(&[
                // Job-specific paths
                "a[href*=\"/jobs/\"]",
                "a[href*=\"/job/\"]",
                "a[href*=\"/careers/\"]",
                "a[href*=\"/positions/\"]",
                "a[href*=\"/opportunities/\"]",
                "a[href*=\"/openings/\"]",
                "a[href*=\"/vacancy/\"]",
                "a[href*=\"/role/\"]",
                "a[href*=\"/details/\"]",
                "a[href*=\"/description/\"]",
                "a[href*=\"/apply/\"]",
                // Common URL patterns
                "a[href*=\"job\"]",
                "a[href*=\"career\"]",
                "a[href*=\"position\"]",
                "a[href*=\"posting\"]",
                "a[href*=\"vacancy\"]",
                "a[href*=\"opening\"]",
                "a[href*=\"requisition\"]",
                "a[href*=\"req-id\"]",
                "a[href*=\"jobid\"]",
                // Common job boards
                "a[href*=\"linkedin.com/jobs\"]",
                "a[href*=\"workday.com/\"]",
                "a[href*=\"lever.co/\"]",
                "a[href*=\"greenhouse.io/\"]",
                "a[href*=\"smartrecruiters.com\"]",
                "a[href*=\"icims.com\"]",
                // Query parameters
                "a[href*=\"?job=\"]",
                "a[href*=\"?posting=\"]",
                "a[href*=\"?position=\"]",
                "a[href*=\"?req=\"]",
                "a[href*=\"?id=\"]",
                // Class / id / data attributes
                "a[class*=\"job-link\"]",
                "a[class*=\"career-link\"]",
                "a[class*=\"position-link\"]",
                "a[class*=\"posting-link\"]",
                "a[id*=\"job-link\"]",
                "a[data-job-id]",
                "a[data-posting-id]",
                "a[ph-tevent=\"job_click\"]",
                "a[id^=\"jotTitle_\"]",
                // Generic but relevant
                "a[href*=\"employment\"]",
                "a[href*=\"job-search\"]",
            ]),
            next_page: strings(&[
                "a[rel=\"next\"]",
                "[aria-label=\"Next Page\"]",
                "a[title=\"Go to next page\"]",
                "[data-ph-at-id=\"pagination-next-text\"]",
                ".pagination__next a",
                ".pager__item--next a",
                ".pagination-next",
                ".next-page",
                ".nextPage",
                ".next-link",
                "[data-page=\"next\"]",
                "[data-navigation=\"next\"]",
                "button[aria-label*=\"Next\"]",
                "button[aria-label*=\"next\"]",
                "[aria-label*=\"Next\"]",
                "[aria-label*=\"next\"]",
                "[data-testid*=\"next\"]",
                "[data-test*=\"next\"]",
                "[class*=\"pagination-next\"]",
                "[class*=\"pager-next\"]",
                "[class*=\"paginate-next\"]",
                "[class*=\"arrow-next\"]",
                "[class*=\"chevron-right\"]",
                "[aria-label=\"Forward\"]",
                "a:contains(\"Next\")",
                "button.next",
                "[class*=\"next\"]",
            ]),
            load_more: strings(&[
                ".load-more-jobs",
                "a[title=\"Load more items\"]",
                "a[aria-label*=\"Load More\"]",
                "button[aria-label*=\"Load more\"]",
                "[data-action*=\"load-more\"]",
                ".load-more",
                ".loadMore",
                ".show-more",
                ".showMore",
                "button[class*=\"load-more\"]",
                "a.filters-more",
            ]),
            active_page: strings(&[
                ".pagination li.active a",
                ".pagination .active",
                "[aria-current=\"page\"]",
                ".pager__item.is-active",
                ".pagination__item--active",
                ".pageNumber.active",
            ]),
            numbered_targets: strings(&[
                "startrow={offset}",
                "start={offset}",
                "offset={offset}",
                "page={page}",
                "pageNumber={page}",
                "pageNum={page}",
                "a[title=\"Page {page}\"]",
                "[data-page=\"{page}\"]",
            ]),
            ignored_titles: strings(&[
                "saved jobs",
                "filter",
                "filter results",
                "search",
                "previous",
                "next",
                "load more",
                "show more",
                "new job search",
                "careers",
                "view all jobs",
            ]),
            id_attributes: strings(&[
                "data-job-id",
                "data-posting-id",
                "data-requisition-id",
                "data-ph-at-job-id",
                "data-id",
            ]),
        }
    }
}

/// How per-site overrides combine with the base pattern configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideMode {
    /// Override candidates are tried before the base candidates (superset)
    #[default]
    Prepend,
    /// Non-empty override roles replace the base candidates
    Replace,
}

/// Site supplied candidates; empty roles leave the base untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternOverrides {
    pub mode: OverrideMode,
    pub container: Vec<String>,
    pub title: Vec<String>,
    pub location: Vec<String>,
    pub link: Vec<String>,
    pub next_page: Vec<String>,
    pub load_more: Vec<String>,
    pub active_page: Vec<String>,
    pub numbered_targets: Vec<String>,
    pub ignored_titles: Vec<String>,
}

fn combine(base: &mut Vec<String>, extra: &[String], mode: OverrideMode) {
    if extra.is_empty() {
        return;
    }
    match mode {
        OverrideMode::Replace => *base = extra.to_vec(),
        OverrideMode::Prepend => {
            let mut merged = extra.to_vec();
            merged.extend(base.drain(..).filter(|s| !extra.contains(s)));
            *base = merged;
        }
    }
}

impl PatternConfig {
    pub fn with_overrides(mut self, overrides: &PatternOverrides) -> Self {
        let mode = overrides.mode;
        combine(&mut self.container, &overrides.container, mode);
        combine(&mut self.title, &overrides.title, mode);
        combine(&mut self.location, &overrides.location, mode);
        combine(&mut self.link, &overrides.link, mode);
        combine(&mut self.next_page, &overrides.next_page, mode);
        combine(&mut self.load_more, &overrides.load_more, mode);
        combine(&mut self.active_page, &overrides.active_page, mode);
        combine(&mut self.numbered_targets, &overrides.numbered_targets, mode);
        combine(&mut self.ignored_titles, &overrides.ignored_titles, mode);
        self
    }

    pub fn compile(&self) -> PatternSet {
        PatternSet::from_config(self)
    }
}

/// Compiled, immutable patterns for one run
#[derive(Debug, Clone)]
pub struct PatternSet {
    container: Vec<Pattern>,
    title: Vec<Pattern>,
    location: Vec<Pattern>,
    link: Vec<Pattern>,
    next_page: Vec<Pattern>,
    load_more: Vec<Pattern>,
    active_page: Vec<Pattern>,
    numbered_targets: Vec<String>,
    ignored_titles: Vec<String>,
    id_attributes: Vec<String>,
}

fn compile_all(sources: &[String]) -> Vec<Pattern> {
    sources.iter().map(Pattern::new).collect()
}

impl PatternSet {
    pub fn from_config(config: &PatternConfig) -> Self {
        let set = Self {
            container: compile_all(&config.container),
            title: compile_all(&config.title),
            location: compile_all(&config.location),
            link: compile_all(&config.link),
            next_page: compile_all(&config.next_page),
            load_more: compile_all(&config.load_more),
            active_page: compile_all(&config.active_page),
            numbered_targets: config.numbered_targets.clone(),
            ignored_titles: config.ignored_titles.iter().map(|t| normalize_title(t)).collect(),
            id_attributes: config.id_attributes.clone(),
        };

        for role in Role::ALL {
            let candidates = set.candidates(role);
            let unsupported = candidates.iter().filter(|p| !p.is_supported()).count();
            if unsupported > 0 {
                debug!(
                    "Role '{}': {} of {} candidates unsupported",
                    role,
                    unsupported,
                    candidates.len()
                );
            }
        }

        set
    }

    pub fn candidates(&self, role: Role) -> &[Pattern] {
        match role {
            Role::Container => &self.container,
            Role::Title => &self.title,
            Role::Location => &self.location,
            Role::Link => &self.link,
            Role::NextPage => &self.next_page,
            Role::LoadMore => &self.load_more,
            Role::ActivePage => &self.active_page,
        }
    }

    pub fn numbered_targets(&self) -> &[String] {
        &self.numbered_targets
    }

    pub fn id_attributes(&self) -> &[String] {
        &self.id_attributes
    }

    /// Navigation chrome such as "Next" or "Saved jobs", or `#`-prefixed labels
    pub fn is_ignored_title(&self, title: &str) -> bool {
        let normalized = normalize_title(&collapse_whitespace(title));
        normalized.starts_with('#') || self.ignored_titles.iter().any(|t| *t == normalized)
    }
}

impl Default for PatternSet {
    fn default() -> Self {
        PatternConfig::default().compile()
    }
}
