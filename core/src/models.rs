use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize};

// --- Wire types (remote recipe endpoint) ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteRecipe {
    pub id: i64,
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tags: Vec<RemoteTag>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub steps: Vec<RemoteStep>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub ingredients: Vec<RemoteIngredient>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteTag {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub tag_category_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteStep {
    pub id: i64,
    #[serde(default)]
    pub text: String,
    pub seq_num: i64,
    /// Seconds. The endpoint sends `0` for steps without a timer.
    #[serde(default)]
    pub timer: Option<i64>,
    #[serde(default)]
    pub timer_name: Option<String>,
    #[serde(default)]
    pub image_file_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteIngredient {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
}

fn null_as_empty<'de, T, D>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

impl RemoteStep {
    /// Timer in seconds, with the wire's `0` sentinel mapped to `None`.
    #[must_use]
    pub fn timer_secs(&self) -> Option<i64> {
        self.timer.filter(|t| *t > 0)
    }
}

// --- Stored entities ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub tag_category_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    pub id: i64,
    pub recipe_id: i64,
    pub text: String,
    pub seq_num: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timer: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timer_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_file_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ingredient {
    pub id: i64,
    pub recipe_id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// One row of the recipe list: the unit the filter/search composer works on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipeListItem {
    pub id: i64,
    pub title: String,
    pub tag_ids: BTreeSet<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeDetail {
    pub id: i64,
    pub title: String,
    pub synced_at: String,
    pub tags: Vec<Tag>,
    pub steps: Vec<Step>,
    pub ingredients: Vec<Ingredient>,
}

impl RecipeDetail {
    /// Sum of all step timers, in seconds.
    #[must_use]
    pub fn total_timer_secs(&self) -> i64 {
        self.steps.iter().filter_map(|s| s.timer).sum()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TagWithCount {
    #[serde(flatten)]
    pub tag: Tag,
    pub recipe_count: i64,
}

/// What one page commit wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[allow(clippy::struct_field_names)]
pub struct PageWriteSummary {
    pub recipes_written: usize,
    pub tags_written: usize,
    pub steps_written: usize,
    pub ingredients_written: usize,
    pub links_written: usize,
}

/// Lower-case a string with the full Unicode mapping so titles like
/// "CAFÉ" and "ŠLJIVE" fold the same way their lower-case forms do.
#[must_use]
pub fn fold_case(s: &str) -> String {
    s.to_lowercase()
}

/// Render a timer as `1h 05m`, `12m 30s` or `45s`.
#[must_use]
pub fn format_timer(secs: i64) -> String {
    let h = secs / 3600;
    let m = (secs % 3600) / 60;
    let s = secs % 60;
    if h > 0 {
        format!("{h}h {m:02}m")
    } else if m > 0 {
        if s > 0 {
            format!("{m}m {s:02}s")
        } else {
            format!("{m}m")
        }
    } else {
        format!("{s}s")
    }
}
