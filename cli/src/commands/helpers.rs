use std::fmt::Write as _;

use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use recipebox_core::models::{RecipeDetail, RecipeListItem, TagWithCount, format_timer};

pub(crate) fn recipe_table(recipes: &[RecipeListItem], first_row: usize) -> String {
    #[derive(Tabled)]
    struct RecipeRow {
        #[tabled(rename = "#")]
        idx: usize,
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Title")]
        title: String,
        #[tabled(rename = "Tags")]
        tags: String,
    }

    let rows: Vec<RecipeRow> = recipes
        .iter()
        .enumerate()
        .map(|(i, r)| RecipeRow {
            idx: first_row + i + 1,
            id: r.id,
            title: truncate(&r.title, 40),
            tags: join_ids(r.tag_ids.iter()),
        })
        .collect();

    Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(0..2)).with(Alignment::right()))
        .to_string()
}

pub(crate) fn tag_table(tags: &[TagWithCount]) -> String {
    #[derive(Tabled)]
    struct TagRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Category")]
        category: i64,
        #[tabled(rename = "Recipes")]
        recipes: i64,
    }

    let rows: Vec<TagRow> = tags
        .iter()
        .map(|t| TagRow {
            id: t.tag.id,
            name: truncate(&t.tag.name, 30),
            category: t.tag.tag_category_id,
            recipes: t.recipe_count,
        })
        .collect();

    Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..)).with(Alignment::right()))
        .to_string()
}

pub(crate) fn recipe_detail_text(detail: &RecipeDetail) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} (id: {})", detail.title, detail.id);

    if !detail.tags.is_empty() {
        let names: Vec<&str> = detail.tags.iter().map(|t| t.name.as_str()).collect();
        let _ = writeln!(out, "Tags: {}", names.join(", "));
    }
    let total = detail.total_timer_secs();
    if total > 0 {
        let _ = writeln!(out, "Timed steps: {}", format_timer(total));
    }

    if !detail.ingredients.is_empty() {
        let _ = writeln!(out, "\nIngredients:");
        for ing in &detail.ingredients {
            let qty = match (ing.amount, ing.unit.as_deref()) {
                (Some(a), Some(u)) => format!("{a} {u} "),
                (Some(a), None) => format!("{a} "),
                _ => String::new(),
            };
            let _ = writeln!(out, "  - {qty}{}", ing.name);
        }
    }

    if !detail.steps.is_empty() {
        let _ = writeln!(out, "\nSteps:");
        for step in &detail.steps {
            let _ = write!(out, "  {}. {}", step.seq_num + 1, step.text);
            if let Some(secs) = step.timer {
                let label = step.timer_name.as_deref().unwrap_or("timer");
                let _ = write!(out, " [{label}: {}]", format_timer(secs));
            }
            if let Some(img) = &step.image_file_name {
                let _ = write!(out, " ({img})");
            }
            out.push('\n');
        }
    }

    out
}

/// Parse "5,9" or "5 9" into tag ids.
pub(crate) fn parse_tag_ids(s: &str) -> anyhow::Result<Vec<i64>> {
    s.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|p| !p.is_empty())
        .map(|p| {
            p.parse::<i64>()
                .map_err(|_| anyhow::anyhow!("Invalid tag id '{p}'"))
        })
        .collect()
}

fn join_ids<'a>(ids: impl Iterator<Item = &'a i64>) -> String {
    ids.map(i64::to_string).collect::<Vec<_>>().join(",")
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recipebox_core::models::{Ingredient, Step, Tag};

    #[test]
    fn test_parse_tag_ids() {
        assert_eq!(parse_tag_ids("5,9").unwrap(), vec![5, 9]);
        assert_eq!(parse_tag_ids(" 5  9 ,3").unwrap(), vec![5, 9, 3]);
        assert!(parse_tag_ids("").unwrap().is_empty());
        assert!(parse_tag_ids("5,x").is_err());
    }

    #[test]
    fn test_truncate_utf8() {
        assert_eq!(truncate("Crème brûlée", 20), "Crème brûlée");
        assert_eq!(truncate("Pečena paprika sa sirom", 10), "Pečena ...");
    }

    #[test]
    fn test_recipe_table_numbers_rows_from_offset() {
        let items = vec![RecipeListItem {
            id: 42,
            title: "Café tart".to_string(),
            tag_ids: [5, 9].into_iter().collect(),
        }];
        let table = recipe_table(&items, 10);
        assert!(table.contains("11"));
        assert!(table.contains("Café tart"));
        assert!(table.contains("5,9"));
    }

    #[test]
    fn test_recipe_detail_text() {
        let detail = RecipeDetail {
            id: 1,
            title: "Soup".to_string(),
            synced_at: String::new(),
            tags: vec![Tag {
                id: 5,
                name: "Warm".to_string(),
                tag_category_id: 1,
            }],
            steps: vec![
                Step {
                    id: 10,
                    recipe_id: 1,
                    text: "Chop".to_string(),
                    seq_num: 0,
                    timer: None,
                    timer_name: None,
                    image_file_name: None,
                },
                Step {
                    id: 11,
                    recipe_id: 1,
                    text: "Simmer".to_string(),
                    seq_num: 1,
                    timer: Some(900),
                    timer_name: Some("Pot".to_string()),
                    image_file_name: Some("pot.jpg".to_string()),
                },
            ],
            ingredients: vec![Ingredient {
                id: 100,
                recipe_id: 1,
                name: "Leek".to_string(),
                amount: Some(2.0),
                unit: None,
            }],
        };
        let text = recipe_detail_text(&detail);
        assert!(text.starts_with("Soup (id: 1)"));
        assert!(text.contains("Tags: Warm"));
        assert!(text.contains("  - 2 Leek"));
        assert!(text.contains("  1. Chop\n"));
        assert!(text.contains("  2. Simmer [Pot: 15m] (pot.jpg)"));
    }
}
