//! Text and URL helpers shared by the extraction pass and pagination

use lazy_static::lazy_static;
use regex::Regex;
use scraper::ElementRef;
use url::Url;

lazy_static! {
    static ref DIGIT_RUN: Option<Regex> = Regex::new(r"[0-9]+").ok();
}

/// Query parameters commonly carrying a requisition / posting id
const ID_QUERY_KEYS: [&str; 9] = [
    "jobid",
    "job_id",
    "id",
    "req",
    "reqid",
    "requisitionid",
    "postingid",
    "jobreqid",
    "pid",
];

/// Trim and collapse whitespace runs to one space
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First run of ASCII digits in `text`
pub fn first_digit_run(text: &str) -> Option<&str> {
    DIGIT_RUN.as_ref()?.find(text).map(|m| m.as_str())
}

/// Collapsed text content of an element, `None` when blank
pub fn element_text(element: ElementRef<'_>) -> Option<String> {
    let raw: String = element.text().collect::<Vec<_>>().join(" ");
    let text = collapse_whitespace(&raw);
    (!text.is_empty()).then_some(text)
}

/// `href` values that point somewhere other than the current document
pub fn is_navigable_href(href: &str) -> bool {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return false;
    }
    let lowered = href.to_ascii_lowercase();
    !["javascript:", "mailto:", "tel:"]
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
}

/// Resolve `href` against the page URL; `None` for non-navigable targets
pub fn resolve_href(base: &Url, href: &str) -> Result<Option<Url>, url::ParseError> {
    if !is_navigable_href(href) {
        return Ok(None);
    }
    base.join(href.trim()).map(Some)
}

/// Id encoded in a listing URL: query parameter first, then path segment digits
pub fn external_id_from_url(url: &Url) -> Option<String> {
    let from_query = url.query_pairs().find_map(|(key, value)| {
        let key = key.to_ascii_lowercase();
        (ID_QUERY_KEYS.contains(&key.as_str()) && !value.trim().is_empty())
            .then(|| value.trim().to_string())
    });
    if from_query.is_some() {
        return from_query;
    }

    url.path_segments()?
        .filter_map(first_digit_run)
        .last()
        .map(str::to_string)
}

/// Whether an element is a control that must not be activated
pub fn is_disabled(element: ElementRef<'_>) -> bool {
    let value = element.value();
    value.attr("disabled").is_some()
        || value
            .attr("aria-disabled")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
        || value.classes().any(|c| c.to_ascii_lowercase().contains("disabled"))
}
