//! Tag filtering and title search over the locally stored recipe list.
//!
//! `FilterState` belongs to whichever screen shows the list; it survives
//! navigation to a detail view and back, and is reapplied rather than reset.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::models::{RecipeListItem, fold_case};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterState {
    selected_tags: BTreeSet<i64>,
    search: Option<String>,
}

impl FilterState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_tags<I: IntoIterator<Item = i64>>(mut self, tags: I) -> Self {
        self.select_tags(tags);
        self
    }

    #[must_use]
    pub fn with_search(mut self, text: Option<&str>) -> Self {
        self.set_search(text);
        self
    }

    /// Replace the tag selection.
    pub fn select_tags<I: IntoIterator<Item = i64>>(&mut self, tags: I) {
        self.selected_tags = tags.into_iter().collect();
    }

    /// Flip one tag in or out of the selection. Returns whether it is now selected.
    pub fn toggle_tag(&mut self, tag_id: i64) -> bool {
        if self.selected_tags.remove(&tag_id) {
            false
        } else {
            self.selected_tags.insert(tag_id);
            true
        }
    }

    pub fn clear_tags(&mut self) {
        self.selected_tags.clear();
    }

    /// Set the search text, trimmed. Blank text clears the search.
    pub fn set_search(&mut self, text: Option<&str>) {
        self.search = text
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
    }

    pub fn clear_search(&mut self) {
        self.search = None;
    }

    #[must_use]
    pub fn selected_tags(&self) -> &BTreeSet<i64> {
        &self.selected_tags
    }

    #[must_use]
    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    #[must_use]
    pub fn is_search_active(&self) -> bool {
        self.search.is_some()
    }

    #[must_use]
    pub fn is_filter_active(&self) -> bool {
        !self.selected_tags.is_empty()
    }

    /// Fetching more pages only makes sense while the full list is shown.
    #[must_use]
    pub fn blocks_fetch_more(&self) -> bool {
        self.is_search_active() || self.is_filter_active()
    }
}

/// Derive the visible list from everything stored.
///
/// Selected tags widen the result (a recipe with any one of them is kept);
/// the search text then narrows it to titles containing the text after
/// Unicode case folding. Input order is preserved.
#[must_use]
pub fn compose(all: &[RecipeListItem], state: &FilterState) -> Vec<RecipeListItem> {
    let needle = state.search().map(fold_case);

    all.iter()
        .filter(|r| {
            state.selected_tags.is_empty() || !r.tag_ids.is_disjoint(&state.selected_tags)
        })
        .filter(|r| {
            needle
                .as_deref()
                .is_none_or(|n| fold_case(&r.title).contains(n))
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: i64, title: &str, tags: &[i64]) -> RecipeListItem {
        RecipeListItem {
            id,
            title: title.to_string(),
            tag_ids: tags.iter().copied().collect(),
        }
    }

    fn catalogue() -> Vec<RecipeListItem> {
        vec![
            item(1, "Café tart", &[5]),
            item(2, "Tomato soup", &[9, 3]),
            item(3, "Apple tart", &[3]),
            item(4, "CAFÉ au lait", &[]),
            item(5, "Lentil stew", &[5, 9]),
        ]
    }

    fn ids(v: &[RecipeListItem]) -> Vec<i64> {
        v.iter().map(|r| r.id).collect()
    }

    #[test]
    fn test_no_filters_returns_everything() {
        let all = catalogue();
        assert_eq!(compose(&all, &FilterState::new()), all);
    }

    #[test]
    fn test_tags_are_or_not_and() {
        let all = catalogue();
        let state = FilterState::new().with_tags([5, 9]);
        assert_eq!(ids(&compose(&all, &state)), vec![1, 2, 5]);
    }

    #[test]
    fn test_tag_selection_order_is_irrelevant() {
        let all = catalogue();
        let a = compose(&all, &FilterState::new().with_tags([5, 9]));
        let b = compose(&all, &FilterState::new().with_tags([9, 5]));
        assert_eq!(a, b);
    }

    #[test]
    fn test_tag_filter_sound_and_complete() {
        let all = catalogue();
        for selection in [vec![3], vec![5], vec![9], vec![3, 5], vec![1, 2], vec![3, 5, 9]] {
            let state = FilterState::new().with_tags(selection.clone());
            let visible = compose(&all, &state);
            let selected: BTreeSet<i64> = selection.into_iter().collect();

            // Every visible recipe carries a selected tag
            for r in &visible {
                assert!(!r.tag_ids.is_disjoint(&selected));
            }
            // Every recipe carrying a selected tag is visible
            let expected: Vec<i64> = all
                .iter()
                .filter(|r| !r.tag_ids.is_disjoint(&selected))
                .map(|r| r.id)
                .collect();
            assert_eq!(ids(&visible), expected);
        }
    }

    #[test]
    fn test_search_is_case_insensitive_for_non_ascii() {
        let all = catalogue();
        let state = FilterState::new().with_search(Some("Café"));
        assert_eq!(ids(&compose(&all, &state)), vec![1, 4]);

        let state = FilterState::new().with_search(Some("café"));
        assert_eq!(ids(&compose(&all, &state)), vec![1, 4]);
    }

    #[test]
    fn test_search_narrows_tag_filter() {
        let all = catalogue();
        let state = FilterState::new().with_tags([3]).with_search(Some("TART"));
        assert_eq!(ids(&compose(&all, &state)), vec![3]);
    }

    #[test]
    fn test_every_search_hit_contains_text() {
        let all = catalogue();
        for s in ["t", "ta", "soup", "É", "lait", "zzz"] {
            let visible = compose(&all, &FilterState::new().with_search(Some(s)));
            for r in &visible {
                assert!(r.title.to_lowercase().contains(&s.to_lowercase()));
            }
        }
    }

    #[test]
    fn test_empty_search_returns_tag_filtered_set() {
        let all = catalogue();
        let tagged = compose(&all, &FilterState::new().with_tags([9]));

        let mut state = FilterState::new().with_tags([9]).with_search(Some("soup"));
        assert!(state.is_search_active());
        state.set_search(Some(""));
        assert!(!state.is_search_active());
        assert_eq!(compose(&all, &state), tagged);

        state.set_search(None);
        assert_eq!(compose(&all, &state), tagged);
    }

    #[test]
    fn test_search_is_trimmed_and_blank_is_inactive() {
        let all = catalogue();
        let mut state = FilterState::new().with_search(Some("   "));
        assert!(!state.is_search_active());
        assert!(!state.blocks_fetch_more());
        assert_eq!(compose(&all, &state), all);

        state.set_search(Some("  TART "));
        assert_eq!(state.search(), Some("TART"));
        let composed = compose(&all, &state);
        let titles: Vec<&str> = composed.iter().map(|r| r.title.as_str()).collect();
        assert!(!titles.is_empty());
        assert!(titles.iter().all(|t| t.to_lowercase().contains("tart")));
    }

    #[test]
    fn test_no_match_is_empty_not_error() {
        let all = catalogue();
        let state = FilterState::new().with_tags([42]);
        assert!(compose(&all, &state).is_empty());
        assert!(compose(&[], &FilterState::new()).is_empty());
    }

    #[test]
    fn test_toggle_and_blocks_fetch_more() {
        let mut state = FilterState::new();
        assert!(!state.blocks_fetch_more());

        assert!(state.toggle_tag(5));
        assert!(state.blocks_fetch_more());
        assert!(!state.toggle_tag(5));
        assert!(!state.blocks_fetch_more());

        state.set_search(Some("soup"));
        assert!(state.blocks_fetch_more());
        state.clear_search();
        assert!(!state.blocks_fetch_more());
    }
}
