//! Pagination state for a single site run.
//!
//! Responsibility:
//! - 현재 페이지 인덱스 / max_pages 경계 관리
//! - 어떤 navigation strategy 로 마지막 advance 가 이루어졌는지 기록
//! - Init → Ready → Advancing → {Ready | Exhausted | Failed} 상태 전이

use serde::{Deserialize, Serialize};
use std::fmt;

/// Mechanics a listing can use to reveal the next batch of results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationStrategy {
    /// "Next" link or button that replaces the page content
    SequentialLink,
    /// "Load more" control that appends to the current page
    LoadMore,
    /// Numbered pager whose targets encode a page index or row offset
    NumberedForm,
    /// No navigation has happened (yet)
    None,
}

impl NavigationStrategy {
    /// Order in which strategies are tried when none is forced
    pub const PRIORITY: [Self; 3] = [Self::SequentialLink, Self::LoadMore, Self::NumberedForm];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SequentialLink => "sequential_link",
            Self::LoadMore => "load_more",
            Self::NumberedForm => "numbered_form",
            Self::None => "none",
        }
    }
}

impl fmt::Display for NavigationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationPhase {
    Init,
    Ready,
    Advancing,
    /// No further control exists (or the page limit was reached)
    Exhausted,
    /// A navigation attempt raised a transport error
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationState {
    current_page_index: u32,
    max_pages: u32,
    strategy: NavigationStrategy,
    exhausted: bool,
    phase: PaginationPhase,
}

impl PaginationState {
    /// `max_pages` below 1 is clamped to 1
    pub fn new(max_pages: u32) -> Self {
        Self {
            current_page_index: 1,
            max_pages: max_pages.max(1),
            strategy: NavigationStrategy::None,
            exhausted: false,
            phase: PaginationPhase::Init,
        }
    }

    pub const fn current_page_index(&self) -> u32 {
        self.current_page_index
    }

    pub const fn max_pages(&self) -> u32 {
        self.max_pages
    }

    pub const fn strategy(&self) -> NavigationStrategy {
        self.strategy
    }

    pub const fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub const fn phase(&self) -> PaginationPhase {
        self.phase
    }

    pub const fn at_last_page(&self) -> bool {
        self.current_page_index >= self.max_pages
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self.phase, PaginationPhase::Exhausted | PaginationPhase::Failed)
    }

    /// First page loaded, or an advance landed
    pub fn mark_ready(&mut self) {
        if !self.is_terminal() {
            self.phase = PaginationPhase::Ready;
        }
    }

    pub fn begin_advance(&mut self) {
        if !self.is_terminal() {
            self.phase = PaginationPhase::Advancing;
        }
    }

    /// A navigation succeeded through `strategy`
    pub fn record_advance(&mut self, strategy: NavigationStrategy) {
        if self.is_terminal() {
            return;
        }
        self.current_page_index += 1;
        self.strategy = strategy;
        self.phase = PaginationPhase::Ready;
    }

    pub fn exhaust(&mut self) {
        self.exhausted = true;
        self.phase = PaginationPhase::Exhausted;
    }

    pub fn fail(&mut self) {
        self.exhausted = true;
        self.phase = PaginationPhase::Failed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_starts_at_page_one() {
        let state = PaginationState::new(3);
        assert_eq!(state.current_page_index(), 1);
        assert_eq!(state.phase(), PaginationPhase::Init);
        assert_eq!(state.strategy(), NavigationStrategy::None);
        assert!(!state.at_last_page());
    }

    #[test]
    fn test_zero_max_pages_is_clamped() {
        let state = PaginationState::new(0);
        assert_eq!(state.max_pages(), 1);
        assert!(state.at_last_page());
    }

    #[test]
    fn test_advance_lifecycle() {
        let mut state = PaginationState::new(2);
        state.mark_ready();
        state.begin_advance();
        assert_eq!(state.phase(), PaginationPhase::Advancing);
        state.record_advance(NavigationStrategy::LoadMore);
        assert_eq!(state.current_page_index(), 2);
        assert_eq!(state.strategy(), NavigationStrategy::LoadMore);
        assert!(state.at_last_page());
    }

    #[test]
    fn test_terminal_states_freeze_index() {
        let mut state = PaginationState::new(5);
        state.fail();
        assert!(state.is_exhausted());
        state.record_advance(NavigationStrategy::SequentialLink);
        state.mark_ready();
        assert_eq!(state.current_page_index(), 1);
        assert_eq!(state.phase(), PaginationPhase::Failed);
    }
}
