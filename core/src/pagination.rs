//! Scroll-driven "load more" state machine for one recipe list instance.
//!
//! The remote endpoint has no end-of-data flag. A page that leaves the
//! store no bigger than the offset it was requested at means there is
//! nothing further, and the paginator latches until it is reset.

use serde::Serialize;

use crate::filter::FilterState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PaginationState {
    Idle,
    FetchingMore { offset: usize },
    Exhausted,
}

/// What the list currently shows, in rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub first_visible: usize,
    pub visible_count: usize,
    pub total: usize,
}

impl Viewport {
    #[must_use]
    pub fn at_end(&self) -> bool {
        self.total != 0 && self.first_visible + self.visible_count == self.total
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchRequest {
    pub offset: usize,
}

#[derive(Debug)]
pub struct Paginator {
    state: PaginationState,
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new()
    }
}

impl Paginator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: PaginationState::Idle,
        }
    }

    #[must_use]
    pub fn state(&self) -> PaginationState {
        self.state
    }

    /// True while a page request is outstanding; drives the progress footer.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(self.state, PaginationState::FetchingMore { .. })
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.state == PaginationState::Exhausted
    }

    /// Refresh the first page when the list opens, regardless of scroll position.
    pub fn request_first_page(&mut self) -> Option<FetchRequest> {
        match self.state {
            PaginationState::Idle => {
                self.state = PaginationState::FetchingMore { offset: 0 };
                Some(FetchRequest { offset: 0 })
            }
            PaginationState::FetchingMore { .. } | PaginationState::Exhausted => None,
        }
    }

    /// Called on every scroll event. Returns the page to request, if any.
    pub fn on_scroll(&mut self, viewport: Viewport, filter: &FilterState) -> Option<FetchRequest> {
        if !viewport.at_end() || filter.blocks_fetch_more() {
            return None;
        }
        match self.state {
            PaginationState::Idle => {
                let offset = viewport.total;
                self.state = PaginationState::FetchingMore { offset };
                tracing::debug!(offset, "requesting next page");
                Some(FetchRequest { offset })
            }
            PaginationState::FetchingMore { .. } | PaginationState::Exhausted => None,
        }
    }

    /// The requested page committed; `total_after` is the store's recipe count.
    pub fn on_page_loaded(&mut self, total_after: usize) -> PaginationState {
        if let PaginationState::FetchingMore { offset } = self.state {
            self.state = if total_after > offset {
                PaginationState::Idle
            } else {
                tracing::debug!(offset, "no new recipes, pagination exhausted");
                PaginationState::Exhausted
            };
        }
        self.state
    }

    /// The requested page failed; allow another attempt on the next qualifying scroll.
    pub fn on_page_failed(&mut self) -> PaginationState {
        if self.is_loading() {
            self.state = PaginationState::Idle;
        }
        self.state
    }

    pub fn reset(&mut self) {
        self.state = PaginationState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn end_of(total: usize) -> Viewport {
        Viewport {
            first_visible: total.saturating_sub(8),
            visible_count: total.min(8),
            total,
        }
    }

    #[test]
    fn test_first_page_of_twenty() {
        let mut p = Paginator::new();
        let req = p.request_first_page().unwrap();
        assert_eq!(req.offset, 0);
        assert!(p.is_loading());
        assert!(p.request_first_page().is_none());

        assert_eq!(p.on_page_loaded(20), PaginationState::Idle);
    }

    #[test]
    fn test_scroll_to_end_then_idle() {
        let mut p = Paginator::new();
        let filter = FilterState::new();

        // Seeded list of 20 rows scrolled to the bottom
        let req = p.on_scroll(end_of(20), &filter).unwrap();
        assert_eq!(req.offset, 20);
        assert_eq!(p.state(), PaginationState::FetchingMore { offset: 20 });
        assert!(p.is_loading());

        assert_eq!(p.on_page_loaded(40), PaginationState::Idle);
        assert!(!p.is_loading());
    }

    #[test]
    fn test_empty_page_latches() {
        let mut p = Paginator::new();
        let filter = FilterState::new();

        p.on_scroll(end_of(20), &filter).unwrap();
        assert_eq!(p.on_page_loaded(20), PaginationState::Exhausted);

        for _ in 0..5 {
            assert!(p.on_scroll(end_of(20), &filter).is_none());
        }
        assert!(p.is_exhausted());
    }

    #[test]
    fn test_single_flight() {
        let mut p = Paginator::new();
        let filter = FilterState::new();

        assert!(p.on_scroll(end_of(20), &filter).is_some());
        assert!(p.on_scroll(end_of(20), &filter).is_none());
        assert!(p.on_scroll(end_of(20), &filter).is_none());
    }

    #[test]
    fn test_failure_allows_retry() {
        let mut p = Paginator::new();
        let filter = FilterState::new();

        p.on_scroll(end_of(20), &filter).unwrap();
        assert_eq!(p.on_page_failed(), PaginationState::Idle);

        let retry = p.on_scroll(end_of(20), &filter).unwrap();
        assert_eq!(retry.offset, 20);
    }

    #[test]
    fn test_not_at_end_does_nothing() {
        let mut p = Paginator::new();
        let filter = FilterState::new();
        let mid = Viewport {
            first_visible: 3,
            visible_count: 8,
            total: 20,
        };
        assert!(p.on_scroll(mid, &filter).is_none());
        assert!(p.on_scroll(end_of(0), &filter).is_none());
        assert_eq!(p.state(), PaginationState::Idle);
    }

    #[test]
    fn test_search_or_filter_suppresses_fetch() {
        let mut p = Paginator::new();

        let searching = FilterState::new().with_search(Some("soup"));
        assert!(p.on_scroll(end_of(20), &searching).is_none());

        let filtering = FilterState::new().with_tags([5]);
        assert!(p.on_scroll(end_of(20), &filtering).is_none());

        assert_eq!(p.state(), PaginationState::Idle);
        assert!(p.on_scroll(end_of(20), &FilterState::new()).is_some());
    }

    #[test]
    fn test_stray_completion_is_ignored() {
        let mut p = Paginator::new();
        assert_eq!(p.on_page_loaded(10), PaginationState::Idle);
        assert_eq!(p.on_page_failed(), PaginationState::Idle);
    }

    #[test]
    fn test_reset_unlatches() {
        let mut p = Paginator::new();
        let filter = FilterState::new();
        p.on_scroll(end_of(20), &filter).unwrap();
        p.on_page_loaded(20);
        assert!(p.is_exhausted());

        p.reset();
        assert!(p.on_scroll(end_of(20), &filter).is_some());
    }
}
