use std::path::PathBuf;

use dcmdeid_core::error::Result;
use dcmdeid_core::{DeidOptions, DiscoverSummary, ScanOptions, run_deid, run_scan};

pub fn handle_scan(folder: PathBuf, target_file: PathBuf, limit: usize) -> Result<()> {
    let opts = ScanOptions {
        folder,
        target_file,
        limit,
    };
    let summary = run_scan(&opts)?;
    print_summary(&summary);
    println!("fields written to {}", opts.target_file.display());
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn handle_deid(
    folder: Option<PathBuf>,
    param_file: Option<PathBuf>,
    archive_file: Option<PathBuf>,
    output_folder: Option<PathBuf>,
    extension: Option<String>,
    replacement_date: Option<String>,
    config: Option<PathBuf>,
) -> Result<()> {
    let mut opts = match config {
        Some(path) => DeidOptions::from_json_file(&path)?,
        None => DeidOptions::default(),
    };
    if let Some(f) = folder {
        opts.folder = f;
    }
    if let Some(p) = param_file {
        opts.param_file = Some(p);
    }
    if let Some(a) = archive_file {
        opts.archive_file = a;
    }
    if output_folder.is_some() {
        opts.output_folder = output_folder;
    }
    if let Some(e) = extension {
        opts.extension = e;
    }
    if replacement_date.is_some() {
        opts.replacement_date = replacement_date;
    }

    let summary = run_deid(&opts)?;
    print_summary(&summary);
    println!("archive written to {}", opts.archive_file.display());
    Ok(())
}

fn print_summary(summary: &DiscoverSummary) {
    println!(
        "records: {}  containers: {}  skipped: {}  failed: {}",
        summary.records, summary.containers, summary.unrecognized, summary.failed
    );
}
