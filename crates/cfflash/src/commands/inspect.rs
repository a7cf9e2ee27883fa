//! Local image inspection handler.

use std::fmt::Write as _;
use std::path::PathBuf;

use bytesize::ByteSize;
use serde::Serialize;

use cfflash_core::{CoreError, FlashTargets, ImageKind, check_archive};

use crate::cli::{GlobalOpts, InspectArgs};
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct ImageReport {
    path: PathBuf,
    kind: ImageKind,
    targets: String,
    bytes: u64,
    /// Archive entries checked; `None` for raw binaries.
    verified: Option<bool>,
}

pub async fn handle(args: InspectArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let kind = ImageKind::from_path(&args.image)?;
    let filter = args.target.or(kind.default_filter());
    let bytes = tokio::fs::metadata(&args.image).await?.len();

    let verified = match kind {
        ImageKind::Zip => {
            let path = args.image.clone();
            tokio::task::spawn_blocking(move || check_archive(&path))
                .await
                .map_err(|e| CoreError::Internal(format!("archive check task failed: {e}")))??;
            Some(true)
        }
        ImageKind::Bin => None,
    };

    let report = ImageReport {
        path: args.image,
        kind,
        targets: FlashTargets::from_filter(filter).to_string(),
        bytes,
        verified,
    };

    let out = output::render_single(&global.output, &report, detail, |r| r.targets.clone())?;
    output::print_output(&out, global.quiet);
    Ok(())
}

fn detail(report: &ImageReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Image:   {}", report.path.display());
    let _ = writeln!(out, "Kind:    {}", report.kind);
    let _ = writeln!(out, "Size:    {}", ByteSize::b(report.bytes));
    let _ = write!(out, "Targets: {}", report.targets);
    if report.verified == Some(true) {
        let _ = write!(out, "\nArchive: ok");
    }
    out
}
