use anyhow::{Result, bail};
use std::process;

use recipebox_core::filter::FilterState;
use recipebox_core::service::RecipeService;

use super::helpers::{recipe_detail_text, recipe_table, tag_table};

pub(crate) fn cmd_list(
    svc: &RecipeService,
    tags: &[i64],
    search: Option<&str>,
    json: bool,
) -> Result<()> {
    let filter = FilterState::new()
        .with_tags(tags.iter().copied())
        .with_search(search);
    let recipes = svc.visible_recipes(&filter)?;

    if recipes.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("No recipes match");
        }
        process::exit(2);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&recipes)?);
    } else {
        println!("{}", recipe_table(&recipes, 0));
    }
    Ok(())
}

/// Accepts a numeric id or a title fragment that must match exactly one recipe.
pub(crate) fn cmd_show(svc: &RecipeService, recipe: &str, json: bool) -> Result<()> {
    let id = match recipe.trim().parse::<i64>() {
        Ok(id) => id,
        Err(_) => {
            let hits = svc.find_recipes_by_title(recipe)?;
            match hits.as_slice() {
                [] => bail!("No recipe found matching '{recipe}'"),
                [only] => only.id,
                many => {
                    eprintln!("{}", recipe_table(many, 0));
                    bail!(
                        "'{recipe}' matches {} recipes; use an ID from the table",
                        many.len()
                    )
                }
            }
        }
    };

    let detail = svc.recipe_detail(id)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&detail)?);
    } else {
        print!("{}", recipe_detail_text(&detail));
    }
    Ok(())
}

pub(crate) fn cmd_tags(svc: &RecipeService, json: bool) -> Result<()> {
    let tags = svc.list_tags()?;

    if tags.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("No tags stored. Run `recipebox sync` first.");
        }
        process::exit(2);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&tags)?);
    } else {
        println!("{}", tag_table(&tags));
    }
    Ok(())
}
