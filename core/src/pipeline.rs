use anyhow::{Context, Result};
use serde::Serialize;

use crate::db::Database;
use crate::models::{PageWriteSummary, RemoteRecipe};
use crate::service::RecipeSource;

/// Result of fetching and committing one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageOutcome {
    pub offset: usize,
    pub fetched: usize,
    pub written: PageWriteSummary,
    /// Stored recipe count after the commit.
    pub total_after: usize,
}

impl PageOutcome {
    /// Whether the store grew past the requested offset.
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.total_after > self.offset
    }
}

/// Network half: no store access, safe to run off the presentation thread.
pub fn fetch_page(source: &dyn RecipeSource, offset: usize) -> Result<Vec<RemoteRecipe>> {
    source
        .fetch_page(offset)
        .with_context(|| format!("Failed to fetch recipes at offset {offset}"))
}

/// Store half: one transaction for the whole page.
pub fn commit_page(db: &mut Database, offset: usize, page: &[RemoteRecipe]) -> Result<PageOutcome> {
    let written = db.upsert_page(page)?;
    let total_after = db.count_recipes()?;
    tracing::info!(
        offset,
        fetched = page.len(),
        total_after,
        "recipe page stored"
    );
    Ok(PageOutcome {
        offset,
        fetched: page.len(),
        written,
        total_after,
    })
}

/// Fetch the page at `offset` and store it. A failed fetch never opens a transaction.
pub fn run_page(db: &mut Database, source: &dyn RecipeSource, offset: usize) -> Result<PageOutcome> {
    let page = fetch_page(source, offset)?;
    commit_page(db, offset, &page)
}
