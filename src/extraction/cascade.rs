//! Selector cascade resolver
//!
//! Tries the candidates of a role in order against a document or element and
//! reports the first structural match as an explicit tagged result.

use scraper::{ElementRef, Html, Selector};

use super::patterns::{Pattern, PatternSet, Role};

/// Root a cascade runs against
#[derive(Clone, Copy)]
pub enum DomScope<'d> {
    Document(&'d Html),
    Element(ElementRef<'d>),
}

impl<'d> DomScope<'d> {
    fn select_first(self, selector: &Selector) -> Option<ElementRef<'d>> {
        self.select_all(selector).into_iter().next()
    }

    fn select_all(self, selector: &Selector) -> Vec<ElementRef<'d>> {
        match self {
            Self::Document(html) => html.select(selector).collect(),
            Self::Element(element) => element.select(selector).collect(),
        }
    }
}

impl<'d> From<&'d Html> for DomScope<'d> {
    fn from(html: &'d Html) -> Self {
        Self::Document(html)
    }
}

impl<'d> From<ElementRef<'d>> for DomScope<'d> {
    fn from(element: ElementRef<'d>) -> Self {
        Self::Element(element)
    }
}

/// Outcome of one cascade
#[derive(Debug, Clone, Copy)]
pub enum CascadeMatch<'p, 'd> {
    Matched {
        /// Position of the winning candidate in its role list
        rank: usize,
        pattern: &'p Pattern,
        node: ElementRef<'d>,
    },
    /// Every candidate was tried (or skipped as unsupported) without a match
    Unmatched,
}

impl<'p, 'd> CascadeMatch<'p, 'd> {
    pub const fn node(&self) -> Option<ElementRef<'d>> {
        match self {
            Self::Matched { node, .. } => Some(*node),
            Self::Unmatched => None,
        }
    }

    pub const fn pattern(&self) -> Option<&'p Pattern> {
        match self {
            Self::Matched { pattern, .. } => Some(*pattern),
            Self::Unmatched => None,
        }
    }

    pub const fn is_matched(&self) -> bool {
        matches!(self, Self::Matched { .. })
    }
}

/// First node of the first candidate of `role` with any match under `scope`
pub fn resolve<'p, 'd>(
    scope: impl Into<DomScope<'d>>,
    role: Role,
    patterns: &'p PatternSet,
) -> CascadeMatch<'p, 'd> {
    resolve_where(scope, patterns.candidates(role), |_| true)
}

/// Like [`resolve`], but a candidate only wins if its first match satisfies `accept`
pub fn resolve_where<'p, 'd>(
    scope: impl Into<DomScope<'d>>,
    candidates: &'p [Pattern],
    accept: impl Fn(ElementRef<'d>) -> bool,
) -> CascadeMatch<'p, 'd> {
    let scope = scope.into();
    for (rank, pattern) in candidates.iter().enumerate() {
        let Some(selector) = pattern.selector() else {
            continue;
        };
        if let Some(node) = scope.select_first(selector).filter(|node| accept(*node)) {
            return CascadeMatch::Matched { rank, pattern, node };
        }
    }
    CascadeMatch::Unmatched
}

/// All matches of the first candidate that yields any; candidates are never mixed
pub fn resolve_all<'p, 'd>(
    scope: impl Into<DomScope<'d>>,
    role: Role,
    patterns: &'p PatternSet,
) -> Option<(&'p Pattern, Vec<ElementRef<'d>>)> {
    let scope = scope.into();
    patterns.candidates(role).iter().find_map(|pattern| {
        let nodes = scope.select_all(pattern.selector()?);
        (!nodes.is_empty()).then_some((pattern, nodes))
    })
}
