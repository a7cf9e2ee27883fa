//! Release listing handler.

use serde::Serialize;
use tabled::Tabled;

use cfflash_core::{ReleaseCache, ReleaseCatalog};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct CatalogItem {
    label: String,
    url: String,
}

#[derive(Tabled)]
struct CatalogRow {
    #[tabled(rename = "Release")]
    label: String,
    #[tabled(rename = "URL")]
    url: String,
}

pub async fn handle(cache: &ReleaseCache, global: &GlobalOpts) -> Result<(), CliError> {
    let entries = cache.fetch_releases().await?;
    let catalog = ReleaseCatalog::from_entries(&entries);

    let items: Vec<CatalogItem> = catalog
        .iter()
        .map(|(label, url)| CatalogItem {
            label: label.to_owned(),
            url: url.to_owned(),
        })
        .collect();

    if items.is_empty() && !global.quiet {
        eprintln!("No releases found");
        return Ok(());
    }

    let out = output::render_list(
        &global.output,
        &items,
        |item| CatalogRow {
            label: item.label.clone(),
            url: item.url.clone(),
        },
        |item| item.label.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
