//! Release download handler.

use std::path::{Path, PathBuf};
use std::time::Duration;

use bytesize::ByteSize;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use cfflash_core::{CACHE_FILE_NAME, ReleaseCache, ReleaseCatalog};

use crate::cli::{FetchArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct FetchSummary {
    release: String,
    url: String,
    path: PathBuf,
    bytes: u64,
}

pub async fn handle(
    cache: &ReleaseCache,
    args: FetchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let entries = cache.fetch_releases().await?;
    let catalog = ReleaseCatalog::from_entries(&entries);
    let url = catalog
        .url(&args.label)
        .ok_or_else(|| CliError::NotFound {
            label: args.label.clone(),
        })?
        .to_owned();

    let pb = spinner(global.quiet, format!("Fetching {}", args.label));
    let result = cache.download(&args.label, &url).await;
    pb.finish_and_clear();
    let artifact = result?;

    let dest = destination(&args.dest, &url);
    let bytes = tokio::fs::copy(&artifact.path, &dest).await?;
    tracing::info!(path = %dest.display(), bytes, "release archive saved");

    let summary = FetchSummary {
        release: artifact.release,
        url,
        path: dest,
        bytes,
    };
    let out = output::render_single(
        &global.output,
        &summary,
        |s| {
            format!(
                "Saved {} ({}) to {}",
                s.release,
                ByteSize::b(s.bytes),
                s.path.display()
            )
        },
        |s| s.path.display().to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

/// Place the archive inside `dest` when it is a directory, named after the
/// last URL segment.
fn destination(dest: &Path, url: &str) -> PathBuf {
    if !dest.is_dir() {
        return dest.to_path_buf();
    }
    let name = url
        .split(['?', '#'])
        .next()
        .and_then(|path| path.rsplit('/').next())
        .filter(|name| !name.is_empty())
        .unwrap_or(CACHE_FILE_NAME);
    dest.join(name)
}

fn spinner(quiet: bool, message: String) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
