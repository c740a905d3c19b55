use std::collections::BTreeSet;
use std::path::Path;

use anyhow::Result;
use serde::Serialize;
use tokio::sync::watch;

use crate::db::Database;
use crate::filter::{FilterState, compose};
use crate::models::{RecipeDetail, RecipeListItem, RemoteRecipe, RemoteTag, TagWithCount};
use crate::pipeline::{self, PageOutcome};

/// Remote recipe catalogue.
///
/// The CLI implements this with reqwest; tests use an in-memory fake.
/// Called synchronously. Callers on an async runtime should run it on a
/// blocking worker.
pub trait RecipeSource: Send + Sync {
    /// One page of recipes starting at `offset`. An empty page means no more data.
    fn fetch_page(&self, offset: usize) -> Result<Vec<RemoteRecipe>>;
    /// The full tag catalogue.
    fn fetch_tags(&self) -> Result<Vec<RemoteTag>>;
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub tags_synced: usize,
    pub pages: Vec<PageOutcome>,
    pub total_recipes: usize,
    pub reached_end: bool,
}

pub struct RecipeService {
    db: Database,
}

impl RecipeService {
    pub fn new(db_path: &Path) -> Result<Self> {
        let db = Database::open(db_path)?;
        Ok(Self { db })
    }

    pub fn new_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self { db })
    }

    #[must_use]
    pub fn from_database(db: Database) -> Self {
        Self { db }
    }

    // --- Fetching ---

    pub fn sync_page(&mut self, source: &dyn RecipeSource, offset: usize) -> Result<PageOutcome> {
        pipeline::run_page(&mut self.db, source, offset)
    }

    pub fn commit_page(&mut self, offset: usize, page: &[RemoteRecipe]) -> Result<PageOutcome> {
        pipeline::commit_page(&mut self.db, offset, page)
    }

    pub fn sync_tags(&mut self, source: &dyn RecipeSource) -> Result<usize> {
        let tags = source.fetch_tags()?;
        self.db.upsert_tags(&tags)
    }

    /// Refresh tags, then walk up to `max_pages` pages from `start_offset`,
    /// stopping early once a page adds nothing.
    pub fn sync(
        &mut self,
        source: &dyn RecipeSource,
        start_offset: usize,
        max_pages: usize,
    ) -> Result<SyncReport> {
        let mut report = SyncReport {
            tags_synced: self.sync_tags(source)?,
            ..SyncReport::default()
        };

        let mut offset = start_offset;
        for _ in 0..max_pages {
            let outcome = self.sync_page(source, offset)?;
            report.pages.push(outcome);
            if !outcome.has_more() {
                report.reached_end = true;
                break;
            }
            offset = outcome.total_after;
        }
        report.total_recipes = self.db.count_recipes()?;
        Ok(report)
    }

    // --- Reads ---

    pub fn count_recipes(&self) -> Result<usize> {
        self.db.count_recipes()
    }

    pub fn visible_recipes(&self, filter: &FilterState) -> Result<Vec<RecipeListItem>> {
        let all = self.db.list_recipe_items()?;
        Ok(compose(&all, filter))
    }

    pub fn find_recipes_by_title(&self, query: &str) -> Result<Vec<RecipeListItem>> {
        self.db.find_recipes_by_title(query)
    }

    pub fn recipe_ids_with_any_tag(&self, tag_ids: &BTreeSet<i64>) -> Result<BTreeSet<i64>> {
        self.db.recipe_ids_with_any_tag(tag_ids)
    }

    pub fn recipe_detail(&self, id: i64) -> Result<RecipeDetail> {
        self.db.get_recipe_detail(id)
    }

    pub fn list_tags(&self) -> Result<Vec<TagWithCount>> {
        self.db.list_tags()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.db.subscribe()
    }
}
