//! End-to-end runs of the extraction orchestrator against scripted sites
use std::sync::Arc;

use career_harvest::domain::{RunStatus, SiteTarget};
use career_harvest::extraction::{EngineOptions, ExtractionOrchestrator};
use career_harvest::infrastructure::FileDiagnostics;
use career_harvest::test_utils::{PageCall, ScriptedSite, quick_engine};

const START: &str = "https://careers.acme.test/jobs";
const PAGE_2: &str = "https://careers.acme.test/jobs?page=2";

fn card(title: &str, id: u32) -> String {
    format!(
        r#"<div class="job-card"><h3 class="job-title">{title}</h3><span class="job-location">Pune, IN</span><a href="/jobs/{id}">Apply</a></div>"#
    )
}

fn listing(cards: &[(&str, u32)], extra: &str) -> String {
    let body: String = cards.iter().map(|(title, id)| card(title, *id)).collect();
    format!("<html><body><main>{body}</main>{extra}</body></html>")
}

fn next_link(href: &str) -> String {
    format!(r#"<nav><a rel="next" href="{href}">Next</a></nav>"#)
}

fn orchestrator(site: &ScriptedSite, max_pages: u32) -> ExtractionOrchestrator {
    ExtractionOrchestrator::new(SiteTarget::new("Acme", START, max_pages), Arc::new(site.factory()))
        .with_engine(quick_engine())
}

fn titles(result: &career_harvest::RunResult) -> Vec<&str> {
    result.records.iter().map(|r| r.title.as_str()).collect()
}

#[tokio::test]
async fn overlapping_pages_merge_in_first_seen_order() {
    let site = ScriptedSite::new()
        .screen("p1", START, &listing(&[("A", 1), ("B", 2)], &next_link("/jobs?page=2")))
        .screen("p2", PAGE_2, &listing(&[("B", 2), ("C", 3)], ""));

    let result = orchestrator(&site, 2).run().await;

    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(titles(&result), vec!["A", "B", "C"]);
    assert_eq!(result.pages_processed, 2);
    assert_eq!(result.records[0].company, "Acme");
    assert_eq!(result.records[0].location, "Pune, IN");
    assert_eq!(result.records[2].url.as_deref(), Some("https://careers.acme.test/jobs/3"));
    assert_eq!(result.records[2].external_id.as_deref(), Some("3"));
    assert!(result.error.is_none());
    assert_eq!(site.count(|c| *c == PageCall::Close), 1);
}

#[tokio::test]
async fn single_page_budget_never_paginates() {
    let site = ScriptedSite::new()
        .screen("p1", START, &listing(&[("A", 1)], &next_link("/jobs?page=2")))
        .screen("p2", PAGE_2, &listing(&[("B", 2)], ""));

    let result = orchestrator(&site, 1).run().await;

    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(titles(&result), vec!["A"]);
    assert_eq!(site.count(|c| matches!(c, PageCall::Goto(_))), 1);
    assert_eq!(site.count(|c| matches!(c, PageCall::IsVisible(_) | PageCall::Click(_))), 0);
}

#[tokio::test]
async fn listing_without_controls_completes_early() {
    let site = ScriptedSite::new().screen("p1", START, &listing(&[("A", 1), ("B", 2)], ""));

    let result = orchestrator(&site, 5).run().await;

    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.pages_processed, 1);
    assert_eq!(result.record_count(), 2);
}

#[tokio::test]
async fn initial_load_failure_is_failed_with_diagnostic() {
    let dir = tempfile::tempdir().unwrap();
    let site = ScriptedSite::new()
        .fail_goto(10)
        .screen("p1", START, &listing(&[("A", 1)], ""));

    let result = orchestrator(&site, 2)
        .with_diagnostics(Arc::new(FileDiagnostics::new(dir.path())))
        .run()
        .await;

    assert_eq!(result.status, RunStatus::Failed);
    assert!(result.records.is_empty());
    assert_eq!(result.pages_processed, 0);
    assert!(result.error.as_deref().unwrap().contains("Initial load failed"));
    assert_eq!(site.count(|c| matches!(c, PageCall::Goto(_))), 3);

    let artifact = result.diagnostic.expect("diagnostic captured");
    assert!(artifact.contains("error_"));
    assert!(std::path::Path::new(&artifact).exists());
    assert_eq!(site.calls().last(), Some(&PageCall::Close));
}

#[tokio::test]
async fn lost_snapshot_does_not_change_outcome() {
    let site = ScriptedSite::new()
        .fail_goto(10)
        .fail_snapshot()
        .screen("p1", START, &listing(&[("A", 1)], ""));

    let result = orchestrator(&site, 2).run().await;

    assert_eq!(result.status, RunStatus::Failed);
    assert!(result.diagnostic.is_none());
    assert!(site.calls().contains(&PageCall::Snapshot));
    assert_eq!(site.calls().last(), Some(&PageCall::Close));
}

#[tokio::test]
async fn transient_load_failures_are_retried() {
    let site = ScriptedSite::new()
        .fail_goto(2)
        .screen("p1", START, &listing(&[("A", 1)], ""));

    let result = orchestrator(&site, 1).run().await;

    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(titles(&result), vec!["A"]);
    assert_eq!(site.count(|c| matches!(c, PageCall::Goto(_))), 3);
}

#[tokio::test]
async fn broken_next_link_yields_partial_with_records() {
    let site = ScriptedSite::new().screen(
        "p1",
        START,
        &listing(&[("A", 1), ("B", 2)], &next_link("/jobs?page=404")),
    );

    let result = orchestrator(&site, 3).run().await;

    assert_eq!(result.status, RunStatus::Partial);
    assert_eq!(titles(&result), vec!["A", "B"]);
    assert!(result.error.is_some());
    assert!(result.diagnostic.is_none());
}

#[tokio::test]
async fn session_crash_keeps_earlier_records() {
    let site = ScriptedSite::new()
        .screen("p1", START, &listing(&[("A", 1)], &next_link("/jobs?page=2")))
        .screen("p2", PAGE_2, &listing(&[("B", 2)], ""))
        .crash_on("p2");

    let result = orchestrator(&site, 3).run().await;

    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(titles(&result), vec!["A"]);
    assert!(result.diagnostic.is_some());
    assert_eq!(site.count(|c| *c == PageCall::Close), 1);
}

#[tokio::test]
async fn hung_page_read_is_partial_not_failed() {
    let site = ScriptedSite::new()
        .screen("p1", START, &listing(&[("A", 1)], &next_link("/jobs?page=2")))
        .screen("p2", PAGE_2, &listing(&[("B", 2)], ""))
        .stall_on("p2");
    let mut engine = quick_engine();
    engine.run.step_timeout_ms = 50;

    let result = ExtractionOrchestrator::new(SiteTarget::new("Acme", START, 3), Arc::new(site.factory()))
        .with_engine(engine)
        .run()
        .await;

    assert_eq!(result.status, RunStatus::Partial);
    assert_eq!(titles(&result), vec!["A"]);
    assert_eq!(result.pages_processed, 1);
    let error = result.error.as_deref().unwrap();
    assert!(error.contains("Extraction failed on page 2"), "{error}");
    assert!(error.contains("extract_page"), "{error}");
    assert!(result.diagnostic.is_none());
    assert!(!site.calls().contains(&PageCall::Snapshot));
    assert_eq!(site.count(|c| *c == PageCall::Close), 1);
}

#[tokio::test]
async fn session_that_never_opens_is_failed() {
    let site = ScriptedSite::new().fail_open();

    let result = orchestrator(&site, 2).run().await;

    assert_eq!(result.status, RunStatus::Failed);
    assert!(result.records.is_empty());
    assert_eq!(result.pages_processed, 0);
    assert_eq!(site.opened(), 0);
    assert!(site.calls().is_empty());
}

#[tokio::test]
async fn load_more_without_growth_stops() {
    let more = r#"<button class="load-more">Load more</button>"#;
    let site = ScriptedSite::new()
        .screen("p1", START, &listing(&[("A", 1), ("B", 2)], more))
        .screen("p1-again", START, &listing(&[("A", 1), ("B", 2)], more))
        .on_click("p1", ".load-more", "p1-again")
        .on_click("p1-again", ".load-more", "p1-again");

    let result = orchestrator(&site, 10).run().await;

    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.pages_processed, 2);
    assert_eq!(titles(&result), vec!["A", "B"]);
    assert_eq!(site.count(|c| *c == PageCall::Click(".load-more".into())), 1);
}

#[tokio::test]
async fn load_more_accumulates_growing_list() {
    let more = r#"<button class="load-more">Load more</button>"#;
    let site = ScriptedSite::new()
        .screen("p1", START, &listing(&[("A", 1)], more))
        .screen("p2", START, &listing(&[("A", 1), ("B", 2)], more))
        .screen("p3", START, &listing(&[("A", 1), ("B", 2), ("C", 3)], ""))
        .on_click("p1", ".load-more", "p2")
        .on_click("p2", ".load-more", "p3");

    let mut engine: EngineOptions = quick_engine();
    engine.run.require_growth_after_load_more = true;
    let result = orchestrator(&site, 10).with_engine(engine).run().await;

    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(titles(&result), vec!["A", "B", "C"]);
    assert_eq!(result.pages_processed, 3);
}
