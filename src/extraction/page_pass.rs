//! Extraction pass over one rendered listing page
//!
//! The container cascade picks a single pattern for the whole page; title,
//! location and link cascades then run per container. A fault in one
//! container is logged and counted, never propagated.

use scraper::{ElementRef, Html};
use tracing::{debug, trace, warn};
use url::Url;

use super::cascade::{resolve, resolve_all, resolve_where};
use super::error::{ExtractionError, ExtractionResult};
use super::patterns::{PatternSet, Role};
use super::text::{element_text, external_id_from_url, is_navigable_href, resolve_href};
use crate::domain::RawRecord;
use crate::infrastructure::browser::{BrowserPage, SessionResult};

/// Everything one pass learned about a page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageExtraction {
    /// Emittable records in document order
    pub records: Vec<RawRecord>,
    /// Container pattern used for the page, `None` when nothing matched
    pub container_pattern: Option<String>,
    pub containers_seen: usize,
    /// Containers failing the emission rule
    pub dropped: usize,
    /// Containers whose processing raised a fault
    pub faults: usize,
}

impl PageExtraction {
    pub fn record_count(&self) -> usize {
        self.records.len()
    }
}

/// Read the current page content and extract candidate records from it
pub async fn extract_page(page: &mut dyn BrowserPage, patterns: &PatternSet) -> SessionResult<PageExtraction> {
    let html = page.content().await?;
    let page_url = page.current_url();
    // Html is parsed and dropped synchronously so the future stays Send
    Ok(extract_from_html(&html, &page_url, patterns))
}

/// Synchronous core of [`extract_page`]
pub fn extract_from_html(html: &str, page_url: &str, patterns: &PatternSet) -> PageExtraction {
    let document = Html::parse_document(html);
    let base = Url::parse(page_url).ok();
    if base.is_none() {
        warn!("Page URL '{}' is not absolute; links cannot be resolved", page_url);
    }

    let Some((pattern, containers)) = resolve_all(&document, Role::Container, patterns) else {
        debug!("No container pattern matched on {}", page_url);
        return PageExtraction::default();
    };

    let mut extraction = PageExtraction {
        container_pattern: Some(pattern.source().to_string()),
        containers_seen: containers.len(),
        ..PageExtraction::default()
    };
    debug!(
        "Found {} containers using pattern '{}' on {}",
        containers.len(),
        pattern.source(),
        page_url
    );

    for (index, container) in containers.into_iter().enumerate() {
        match extract_container(container, base.as_ref(), page_url, patterns) {
            Ok(Some(record)) => extraction.records.push(record),
            Ok(None) => {
                trace!("Container {} skipped: not a job listing", index);
                extraction.dropped += 1;
            }
            Err(e) => {
                warn!("Failed to extract container {} on {}: {}", index, page_url, e);
                extraction.faults += 1;
            }
        }
    }

    debug!(
        "Extracted {} records ({} dropped, {} faults) from {}",
        extraction.records.len(),
        extraction.dropped,
        extraction.faults,
        page_url
    );
    extraction
}

/// `Ok(None)` when the container fails the emission rule
fn extract_container(
    container: ElementRef<'_>,
    base: Option<&Url>,
    page_url: &str,
    patterns: &PatternSet,
) -> ExtractionResult<Option<RawRecord>> {
    let link = find_link(container, patterns);

    // A matched but blank title element means "no title", not "use the link text"
    let title = match resolve(container, Role::Title, patterns).node() {
        Some(node) => element_text(node),
        None => link.and_then(element_text),
    };

    let Some(title) = title else {
        return Ok(None);
    };
    if patterns.is_ignored_title(&title) {
        return Ok(None);
    }

    let location = resolve_where(container, patterns.candidates(Role::Location), |node| {
        element_text(node).is_some()
    })
    .node()
    .and_then(element_text)
    .unwrap_or_default();

    let href = link.and_then(|node| node.value().attr("href"));
    let url = match (href, base) {
        (Some(href), Some(base)) => match resolve_href(base, href) {
            Ok(url) => url,
            Err(e) if location.is_empty() => {
                return Err(ExtractionError::url_resolution_failed(href, page_url, e));
            }
            Err(e) => {
                debug!("Ignoring unresolvable href '{}': {}", href, e);
                None
            }
        },
        (Some(href), None) if location.is_empty() && is_navigable_href(href) => {
            return Err(ExtractionError::url_resolution_failed(href, page_url, "page URL is not absolute"));
        }
        _ => None,
    };

    let external_id = attribute_id(container, link, patterns)
        .or_else(|| url.as_ref().and_then(external_id_from_url));

    let record = RawRecord {
        title,
        location,
        url: url.map(String::from),
        external_id,
    };
    Ok(record.is_emittable().then_some(record))
}

/// Link cascade, else the container itself when it is an anchor
fn find_link<'d>(container: ElementRef<'d>, patterns: &PatternSet) -> Option<ElementRef<'d>> {
    let has_target = |node: ElementRef<'_>| node.value().attr("href").is_some_and(is_navigable_href);

    resolve_where(container, patterns.candidates(Role::Link), has_target)
        .node()
        .or_else(|| {
            (container.value().name() == "a" && has_target(container)).then_some(container)
        })
        .or_else(|| resolve(container, Role::Link, patterns).node())
}

fn attribute_id(container: ElementRef<'_>, link: Option<ElementRef<'_>>, patterns: &PatternSet) -> Option<String> {
    std::iter::once(container)
        .chain(link)
        .find_map(|node| {
            patterns
                .id_attributes()
                .iter()
                .find_map(|attr| node.value().attr(attr))
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::patterns::PatternConfig;
    use crate::test_utils::ScriptedSite;

    const PAGE_URL: &str = "https://careers.example.com/search/?q=engineer";

    fn card(title: &str, location: &str, href: &str) -> String {
        format!(
            r#"<div class="job-card"><h3 class="job-title">{title}</h3><span class="job-location">{location}</span><a href="{href}">Apply</a></div>"#
        )
    }

    #[test]
    fn test_five_valid_two_invalid_yields_five() {
        let mut body = String::new();
        for i in 1..=5 {
            body.push_str(&card(&format!("Engineer {i}"), "Pune", &format!("/job/{i}")));
        }
        body.push_str(&card("", "Pune", "/job/6"));
        body.push_str(&card("   ", "Mumbai", "/job/7"));

        let extraction = extract_from_html(&body, PAGE_URL, &PatternSet::default());
        assert_eq!(extraction.containers_seen, 7);
        assert_eq!(extraction.record_count(), 5);
        assert_eq!(extraction.dropped, 2);
        assert!(extraction.records.iter().all(|r| !r.title.is_empty()));
    }

    #[test]
    fn test_links_resolved_against_page_url() {
        let html = card("Data Engineer", "Remote", "../job/Pune-Data-Engineer/1042337/");
        let extraction = extract_from_html(&html, PAGE_URL, &PatternSet::default());
        let record = &extraction.records[0];
        assert_eq!(
            record.url.as_deref(),
            Some("https://careers.example.com/job/Pune-Data-Engineer/1042337/")
        );
        assert_eq!(record.external_id.as_deref(), Some("1042337"));
        assert_eq!(record.location, "Remote");
    }

    #[test]
    fn test_missing_location_keeps_record_with_link() {
        let html = r#"<div class="job-card"><h3 class="job-title">  QA   Lead </h3><a href="/jobs/9">Go</a></div>"#;
        let extraction = extract_from_html(html, PAGE_URL, &PatternSet::default());
        assert_eq!(extraction.record_count(), 1);
        assert_eq!(extraction.records[0].title, "QA Lead");
        assert_eq!(extraction.records[0].location, "");
    }

    #[test]
    fn test_record_without_link_or_location_is_dropped() {
        let html = r#"<div class="job-card"><h3 class="job-title">Ghost</h3><a href="javascript:void(0)">x</a></div>"#;
        let extraction = extract_from_html(html, PAGE_URL, &PatternSet::default());
        assert!(extraction.records.is_empty());
        assert_eq!(extraction.dropped, 1);
    }

    #[test]
    fn test_title_falls_back_to_link_text_and_container_link() {
        let patterns = PatternConfig {
            container: vec!["a.tile".into()],
            ..PatternConfig::default()
        }
        .compile();
        let html = r#"<a class="tile" href="/jobs/77" data-job-id="JR-77"><span>Platform Engineer</span></a>"#;
        let extraction = extract_from_html(html, PAGE_URL, &patterns);
        let record = &extraction.records[0];
        assert_eq!(record.title, "Platform Engineer");
        assert_eq!(record.url.as_deref(), Some("https://careers.example.com/jobs/77"));
        assert_eq!(record.external_id.as_deref(), Some("JR-77"));
    }

    #[test]
    fn test_navigation_labels_are_not_jobs() {
        let html = format!(
            "{}{}",
            card("Load more", "", "/jobs?page=2"),
            card("Backend Engineer", "Austin", "/jobs/5")
        );
        let extraction = extract_from_html(&html, PAGE_URL, &PatternSet::default());
        assert_eq!(extraction.record_count(), 1);
        assert_eq!(extraction.records[0].title, "Backend Engineer");
    }

    #[test]
    fn test_relative_page_url_counts_fault_only_without_location() {
        let html = format!(
            "{}{}",
            card("Backend Engineer", "", "/jobs/5"),
            card("Frontend Engineer", "Austin", "/jobs/6")
        );
        let extraction = extract_from_html(&html, "not a url", &PatternSet::default());
        assert_eq!(extraction.faults, 1);
        assert_eq!(extraction.record_count(), 1);
        assert_eq!(extraction.records[0].url, None);
    }

    #[test]
    fn test_no_containers_is_empty_not_error() {
        let extraction = extract_from_html("<p>nothing</p>", PAGE_URL, &PatternSet::default());
        assert_eq!(extraction, PageExtraction::default());
    }

    #[tokio::test]
    async fn test_extract_page_reads_current_page() {
        let site = ScriptedSite::new().screen("p1", PAGE_URL, &card("SRE", "Berlin", "/job/3"));
        let mut page = site.page_at("p1");
        let extraction = extract_page(&mut page, &PatternSet::default()).await.unwrap();
        assert_eq!(extraction.records[0].url.as_deref(), Some("https://careers.example.com/job/3"));
    }
}
