use anyhow::Result;

use recipebox_core::service::RecipeService;

use crate::remote::RemoteClient;

pub(crate) fn cmd_sync(
    svc: &mut RecipeService,
    client: &RemoteClient,
    offset: usize,
    pages: usize,
    json: bool,
) -> Result<()> {
    // The client blocks on its own runtime handle; step off the worker first.
    let report = tokio::task::block_in_place(|| svc.sync(client, offset, pages))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let fetched: usize = report.pages.iter().map(|p| p.fetched).sum();
    let tags = report.tags_synced;
    let total = report.total_recipes;
    println!(
        "Fetched {fetched} recipes in {} page(s), {tags} tags. {total} recipes stored.",
        report.pages.len()
    );
    if report.reached_end {
        println!("Reached the end of the catalogue.");
    }
    Ok(())
}
