use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use rusqlite::{Connection, OptionalExtension, Transaction, params, params_from_iter};
use tokio::sync::watch;

use crate::models::{
    Ingredient, PageWriteSummary, RecipeDetail, RecipeListItem, RemoteRecipe, RemoteTag, Step,
    Tag, TagWithCount, fold_case,
};

/// Local record store for fetched recipes.
///
/// Writes happen in one transaction per call. Subscribers returned by
/// [`Database::subscribe`] see the store version bump only after a write
/// has committed.
pub struct Database {
    conn: Connection,
    changes: watch::Sender<u64>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        let (changes, _) = watch::channel(0);
        let db = Database { conn, changes };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS recipes (
                    id INTEGER PRIMARY KEY,
                    title TEXT NOT NULL,
                    title_folded TEXT NOT NULL,
                    synced_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS tags (
                    id INTEGER PRIMARY KEY,
                    name TEXT NOT NULL,
                    tag_category_id INTEGER NOT NULL DEFAULT 0
                );

                CREATE TABLE IF NOT EXISTS recipe_tags (
                    recipe_id INTEGER NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
                    tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
                    PRIMARY KEY (recipe_id, tag_id)
                );

                CREATE TABLE IF NOT EXISTS steps (
                    id INTEGER PRIMARY KEY,
                    recipe_id INTEGER NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
                    text TEXT NOT NULL,
                    seq_num INTEGER NOT NULL,
                    timer INTEGER,
                    timer_name TEXT,
                    image_file_name TEXT,
                    UNIQUE (recipe_id, seq_num)
                );

                CREATE TABLE IF NOT EXISTS ingredients (
                    id INTEGER PRIMARY KEY,
                    recipe_id INTEGER NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
                    name TEXT NOT NULL,
                    amount REAL,
                    unit TEXT
                );

                CREATE INDEX IF NOT EXISTS idx_recipe_tags_tag ON recipe_tags(tag_id);
                CREATE INDEX IF NOT EXISTS idx_ingredients_recipe ON ingredients(recipe_id);

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    // --- Change notification ---

    /// Subscribe to store changes. Dropping the receiver unsubscribes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Monotonic counter bumped once per committed write.
    #[must_use]
    pub fn version(&self) -> u64 {
        *self.changes.borrow()
    }

    fn publish_change(&self) {
        self.changes.send_modify(|v| *v += 1);
    }

    // --- Writes ---

    /// Upsert one fetched page. All recipes, tags, links, steps and
    /// ingredients in the page land together or not at all.
    pub fn upsert_page(&mut self, page: &[RemoteRecipe]) -> Result<PageWriteSummary> {
        if page.is_empty() {
            return Ok(PageWriteSummary::default());
        }

        let now = Local::now().to_rfc3339();
        let mut summary = PageWriteSummary::default();

        let tx = self.conn.transaction()?;
        for recipe in page {
            write_recipe(&tx, recipe, &now, &mut summary)
                .with_context(|| format!("Failed to store recipe {}", recipe.id))?;
        }
        tx.commit().context("Failed to commit recipe page")?;

        tracing::debug!(
            recipes = summary.recipes_written,
            steps = summary.steps_written,
            ingredients = summary.ingredients_written,
            "committed recipe page"
        );
        self.publish_change();
        Ok(summary)
    }

    /// Refresh the tag catalogue independently of any recipe page.
    pub fn upsert_tags(&mut self, tags: &[RemoteTag]) -> Result<usize> {
        if tags.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.transaction()?;
        for tag in tags {
            upsert_tag(&tx, tag)?;
        }
        tx.commit().context("Failed to commit tag catalogue")?;
        self.publish_change();
        Ok(tags.len())
    }

    // --- Reads ---

    pub fn count_recipes(&self) -> Result<usize> {
        self.count_rows("recipes")
    }

    pub fn count_tags(&self) -> Result<usize> {
        self.count_rows("tags")
    }

    pub fn count_steps(&self) -> Result<usize> {
        self.count_rows("steps")
    }

    pub fn count_ingredients(&self) -> Result<usize> {
        self.count_rows("ingredients")
    }

    pub fn count_recipe_tags(&self) -> Result<usize> {
        self.count_rows("recipe_tags")
    }

    fn count_rows(&self, table: &str) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get(0)
            })?;
        Ok(usize::try_from(n).unwrap_or_default())
    }

    fn tag_ids_by_recipe(&self) -> Result<HashMap<i64, BTreeSet<i64>>> {
        let mut stmt = self
            .conn
            .prepare("SELECT recipe_id, tag_id FROM recipe_tags")?;
        let mut map: HashMap<i64, BTreeSet<i64>> = HashMap::new();
        let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)))?;
        for row in rows {
            let (recipe_id, tag_id) = row?;
            map.entry(recipe_id).or_default().insert(tag_id);
        }
        Ok(map)
    }

    fn with_tags(&self, rows: Vec<(i64, String)>) -> Result<Vec<RecipeListItem>> {
        let mut tags = self.tag_ids_by_recipe()?;
        Ok(rows
            .into_iter()
            .map(|(id, title)| RecipeListItem {
                id,
                title,
                tag_ids: tags.remove(&id).unwrap_or_default(),
            })
            .collect())
    }

    /// All stored recipes in remote-id order, each with its tag ids.
    pub fn list_recipe_items(&self) -> Result<Vec<RecipeListItem>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, title FROM recipes ORDER BY id")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        self.with_tags(rows)
    }

    /// Recipes whose title contains `query`, compared after Unicode case folding.
    pub fn find_recipes_by_title(&self, query: &str) -> Result<Vec<RecipeListItem>> {
        let needle = fold_case(query.trim());
        if needle.is_empty() {
            return self.list_recipe_items();
        }
        let mut stmt = self.conn.prepare(
            "SELECT id, title FROM recipes WHERE instr(title_folded, ?1) > 0 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![needle], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        self.with_tags(rows)
    }

    /// Ids of recipes linked to at least one of `tag_ids`.
    pub fn recipe_ids_with_any_tag(&self, tag_ids: &BTreeSet<i64>) -> Result<BTreeSet<i64>> {
        if tag_ids.is_empty() {
            return Ok(BTreeSet::new());
        }
        let placeholders = vec!["?"; tag_ids.len()].join(", ");
        let mut stmt = self.conn.prepare(&format!(
            "SELECT DISTINCT recipe_id FROM recipe_tags WHERE tag_id IN ({placeholders})"
        ))?;
        let ids = stmt
            .query_map(params_from_iter(tag_ids.iter()), |row| row.get(0))?
            .collect::<Result<BTreeSet<i64>, _>>()?;
        Ok(ids)
    }

    pub fn get_recipe_detail(&self, id: i64) -> Result<RecipeDetail> {
        let (title, synced_at): (String, String) = self
            .conn
            .query_row(
                "SELECT title, synced_at FROM recipes WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
            .with_context(|| format!("Recipe {id} not found"))?;

        let tags = {
            let mut stmt = self.conn.prepare(
                "SELECT t.id, t.name, t.tag_category_id
                 FROM recipe_tags rt
                 JOIN tags t ON t.id = rt.tag_id
                 WHERE rt.recipe_id = ?1
                 ORDER BY t.tag_category_id, t.name",
            )?;
            stmt.query_map(params![id], Self::tag_from_row)?
                .collect::<Result<Vec<_>, _>>()?
        };

        let steps = {
            let mut stmt = self.conn.prepare(
                "SELECT id, recipe_id, text, seq_num, timer, timer_name, image_file_name
                 FROM steps WHERE recipe_id = ?1 ORDER BY seq_num",
            )?;
            stmt.query_map(params![id], Self::step_from_row)?
                .collect::<Result<Vec<_>, _>>()?
        };

        let ingredients = {
            let mut stmt = self.conn.prepare(
                "SELECT id, recipe_id, name, amount, unit
                 FROM ingredients WHERE recipe_id = ?1 ORDER BY id",
            )?;
            stmt.query_map(params![id], Self::ingredient_from_row)?
                .collect::<Result<Vec<_>, _>>()?
        };

        Ok(RecipeDetail {
            id,
            title,
            synced_at,
            tags,
            steps,
            ingredients,
        })
    }

    /// The tag catalogue grouped by category, with how many stored recipes carry each tag.
    pub fn list_tags(&self) -> Result<Vec<TagWithCount>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.id, t.name, t.tag_category_id, COUNT(rt.recipe_id)
             FROM tags t
             LEFT JOIN recipe_tags rt ON rt.tag_id = t.id
             GROUP BY t.id
             ORDER BY t.tag_category_id, t.name",
        )?;
        let tags = stmt
            .query_map([], |row| {
                Ok(TagWithCount {
                    tag: Self::tag_from_row(row)?,
                    recipe_count: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tags)
    }

    // --- Row mapping helpers ---

    fn tag_from_row(row: &rusqlite::Row) -> rusqlite::Result<Tag> {
        Ok(Tag {
            id: row.get(0)?,
            name: row.get(1)?,
            tag_category_id: row.get(2)?,
        })
    }

    fn step_from_row(row: &rusqlite::Row) -> rusqlite::Result<Step> {
        Ok(Step {
            id: row.get(0)?,
            recipe_id: row.get(1)?,
            text: row.get(2)?,
            seq_num: row.get(3)?,
            timer: row.get(4)?,
            timer_name: row.get(5)?,
            image_file_name: row.get(6)?,
        })
    }

    fn ingredient_from_row(row: &rusqlite::Row) -> rusqlite::Result<Ingredient> {
        Ok(Ingredient {
            id: row.get(0)?,
            recipe_id: row.get(1)?,
            name: row.get(2)?,
            amount: row.get(3)?,
            unit: row.get(4)?,
        })
    }
}

fn upsert_tag(tx: &Transaction, tag: &RemoteTag) -> Result<()> {
    tx.execute(
        "INSERT INTO tags (id, name, tag_category_id) VALUES (?1, ?2, ?3)
         ON CONFLICT(id) DO UPDATE SET name = excluded.name, tag_category_id = excluded.tag_category_id",
        params![tag.id, tag.name, tag.tag_category_id],
    )?;
    Ok(())
}

// The recipe row goes first so child foreign keys resolve at statement time.
// Children of a re-fetched recipe are replaced wholesale: a reordered step
// list would otherwise trip UNIQUE(recipe_id, seq_num) mid-update.
fn write_recipe(
    tx: &Transaction,
    recipe: &RemoteRecipe,
    now: &str,
    summary: &mut PageWriteSummary,
) -> Result<()> {
    tx.execute(
        "INSERT INTO recipes (id, title, title_folded, synced_at) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(id) DO UPDATE SET
             title = excluded.title,
             title_folded = excluded.title_folded,
             synced_at = excluded.synced_at",
        params![recipe.id, recipe.title, fold_case(&recipe.title), now],
    )?;
    summary.recipes_written += 1;

    tx.execute(
        "DELETE FROM recipe_tags WHERE recipe_id = ?1",
        params![recipe.id],
    )?;
    for tag in &recipe.tags {
        upsert_tag(tx, tag)?;
        summary.tags_written += 1;
        summary.links_written += tx.execute(
            "INSERT OR IGNORE INTO recipe_tags (recipe_id, tag_id) VALUES (?1, ?2)",
            params![recipe.id, tag.id],
        )?;
    }

    tx.execute("DELETE FROM steps WHERE recipe_id = ?1", params![recipe.id])?;
    for step in &recipe.steps {
        tx.execute(
            "INSERT INTO steps (id, recipe_id, text, seq_num, timer, timer_name, image_file_name)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                 recipe_id = excluded.recipe_id,
                 text = excluded.text,
                 seq_num = excluded.seq_num,
                 timer = excluded.timer,
                 timer_name = excluded.timer_name,
                 image_file_name = excluded.image_file_name",
            params![
                step.id,
                recipe.id,
                step.text,
                step.seq_num,
                step.timer_secs(),
                step.timer_name,
                step.image_file_name,
            ],
        )
        .with_context(|| format!("Failed to store step {} (seq {})", step.id, step.seq_num))?;
        summary.steps_written += 1;
    }

    tx.execute(
        "DELETE FROM ingredients WHERE recipe_id = ?1",
        params![recipe.id],
    )?;
    for ingredient in &recipe.ingredients {
        tx.execute(
            "INSERT INTO ingredients (id, recipe_id, name, amount, unit)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                 recipe_id = excluded.recipe_id,
                 name = excluded.name,
                 amount = excluded.amount,
                 unit = excluded.unit",
            params![
                ingredient.id,
                recipe.id,
                ingredient.name,
                ingredient.amount,
                ingredient.unit,
            ],
        )?;
        summary.ingredients_written += 1;
    }

    Ok(())
}
