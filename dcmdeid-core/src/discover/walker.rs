//! Recursive discovery of records under a directory tree.
//!
//! Containers are handled with an explicit stack of frames. A frame walks one
//! directory (the root, or a container's scratch extraction) and owns the
//! scratch directories of its container, so they are removed when the frame
//! is dropped whether or not processing succeeded.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use super::container::{extract, repack};
use super::classify::{ArchiveKind, FileKind, classify};
use crate::codec::{CodecId, decompress_bytes};
use crate::dicom::read::{ReadOptions, read_file_bytes};
use crate::dicom::record::DicomFile;
use crate::error::{DeidError, Result};
use crate::output::{EngineState, container_target, record_name, write_record};
use crate::sink::{ArchiveRecord, ArchiveSink};

#[derive(Clone, Debug, Default)]
pub struct DiscoverOptions {
    /// Mirror outputs under this root; `None` writes in place.
    pub output_root: Option<PathBuf>,
    /// Give saved records synthetic names. Requires `output_root`.
    pub rename: bool,
    /// Inserted into synthetic record names and re-packed container names.
    pub extension: String,
    /// Fully parse and write back every record.
    pub save: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DiscoverSummary {
    pub records: usize,
    pub containers: usize,
    pub unrecognized: usize,
    pub failed: usize,
}

struct ContainerJob {
    ident: String,
    kind: ArchiveKind,
    dest: PathBuf,
    _scratch: TempDir,
    /// Present when saving; re-packed into `dest` once the frame is done.
    scratch_out: Option<TempDir>,
}

struct Frame {
    root: PathBuf,
    output_root: Option<PathBuf>,
    /// Identifier prefix of members, `<container ident>/` inside containers.
    prefix: String,
    pending: std::vec::IntoIter<PathBuf>,
    job: Option<ContainerJob>,
}

/// A discovered file and where its output goes.
struct Target<'a> {
    path: &'a Path,
    rel: &'a Path,
    ident: &'a str,
    prefix: &'a str,
    output_root: Option<&'a Path>,
}

/// Find every record under `root`, including inside zip and tar containers,
/// and pass it to `per_record` with its relative identifier.
///
/// Per-file failures are logged and counted; they never abort the run.
pub fn discover<F>(
    root: &Path,
    opts: &DiscoverOptions,
    state: &mut EngineState,
    sink: &mut dyn ArchiveSink,
    mut per_record: F,
) -> Result<DiscoverSummary>
where
    F: FnMut(&mut DicomFile, &str) -> Result<()>,
{
    if opts.rename && opts.output_root.is_none() {
        return Err(DeidError::command_failed(
            "discover",
            "Output folder not specified",
            &[
                "Files can only be renamed if they are being saved in a different location.",
                "Please provide an output folder!",
            ],
        ));
    }

    let mut summary = DiscoverSummary::default();
    let mut stack = vec![Frame {
        root: root.to_path_buf(),
        output_root: opts.output_root.clone(),
        prefix: String::new(),
        pending: list_files(root).into_iter(),
        job: None,
    }];

    while let Some(frame) = stack.last_mut() {
        let Some(path) = frame.pending.next() else {
            if let Some(done) = stack.pop() {
                finish(done, &mut summary);
            }
            continue;
        };
        let rel = path.strip_prefix(&frame.root).unwrap_or(&path).to_path_buf();
        let ident = format!("{}{}", frame.prefix, slash_path(&rel));
        let prefix = frame.prefix.clone();
        let output_root = frame.output_root.clone();
        // Members a container run cannot process still belong in the re-packed container.
        let verbatim = frame
            .job
            .as_ref()
            .and_then(|job| job.scratch_out.as_ref())
            .map(|out| out.path().join(&rel));
        let target = Target {
            path: &path,
            rel: &rel,
            ident: &ident,
            prefix: &prefix,
            output_root: output_root.as_deref(),
        };

        match classify(&path) {
            Ok(FileKind::Record { codec }) => {
                match process_record(&target, codec, opts, state, sink, &mut per_record) {
                    Ok(()) => summary.records += 1,
                    Err(e) => {
                        error!(record = %ident, error = %e, "failed to process record");
                        summary.failed += 1;
                        keep_verbatim(&path, verbatim.as_deref(), &ident);
                    }
                }
            }
            Ok(FileKind::Archive(kind)) => match open_container(&target, kind, opts) {
                Ok(child) => {
                    info!(container = %ident, ?kind, "extracted container");
                    summary.containers += 1;
                    stack.push(child);
                }
                Err(e) => {
                    error!(container = %ident, error = %e, "failed to extract container");
                    summary.failed += 1;
                    keep_verbatim(&path, verbatim.as_deref(), &ident);
                }
            },
            Ok(FileKind::Unrecognized) => {
                warn!(file = %ident, "not an imaging record or container, skipping");
                summary.unrecognized += 1;
                keep_verbatim(&path, verbatim.as_deref(), &ident);
            }
            Err(e) => {
                error!(file = %ident, error = %e, "could not inspect file");
                summary.failed += 1;
                keep_verbatim(&path, verbatim.as_deref(), &ident);
            }
        }
    }

    info!(
        records = summary.records,
        containers = summary.containers,
        unrecognized = summary.unrecognized,
        failed = summary.failed,
        "discovery finished"
    );
    Ok(summary)
}

fn process_record<F>(
    t: &Target<'_>,
    codec: CodecId,
    opts: &DiscoverOptions,
    state: &mut EngineState,
    sink: &mut dyn ArchiveSink,
    per_record: &mut F,
) -> Result<()>
where
    F: FnMut(&mut DicomFile, &str) -> Result<()>,
{
    let raw = fs::read(t.path)?;
    let bytes = match codec {
        CodecId::Store => raw,
        other => decompress_bytes(other, &raw)?,
    };
    let read_opts = if opts.save {
        ReadOptions::full()
    } else {
        ReadOptions::header_only()
    };
    let mut file = read_file_bytes(&bytes, read_opts)?;
    info!(record = %t.ident, "processing record");
    per_record(&mut file, t.ident)?;

    if !opts.save {
        return Ok(());
    }
    match t.output_root {
        None => write_record(&file, codec, t.path)?,
        Some(out) if opts.rename => {
            let name = record_name(&file.dataset, state, &opts.extension, codec);
            let new_rel = t.rel.parent().unwrap_or_else(|| Path::new("")).join(name);
            write_record(&file, codec, &out.join(&new_rel))?;
            let renamed = format!("{}{}", t.prefix, slash_path(&new_rel));
            sink.append(&ArchiveRecord::rename(t.ident, &renamed))?;
            debug!(record = %t.ident, renamed = %renamed, "saved renamed record");
        }
        Some(out) => write_record(&file, codec, &out.join(t.rel))?,
    }
    Ok(())
}

fn open_container(t: &Target<'_>, kind: ArchiveKind, opts: &DiscoverOptions) -> Result<Frame> {
    let scratch = tempfile::Builder::new().prefix("dcmdeid-in-").tempdir()?;
    extract(t.path, kind, scratch.path())?;
    let scratch_out = if opts.save {
        Some(tempfile::Builder::new().prefix("dcmdeid-out-").tempdir()?)
    } else {
        None
    };
    let dest = match t.output_root {
        None => t.path.to_path_buf(),
        Some(out) => out.join(container_target(t.rel, &opts.extension)),
    };
    Ok(Frame {
        root: scratch.path().to_path_buf(),
        output_root: scratch_out.as_ref().map(|d| d.path().to_path_buf()),
        prefix: format!("{}/", t.ident),
        pending: list_files(scratch.path()).into_iter(),
        job: Some(ContainerJob {
            ident: t.ident.to_string(),
            kind,
            dest,
            _scratch: scratch,
            scratch_out,
        }),
    })
}

/// Re-pack a finished container frame; scratch directories go with `frame`.
fn finish(frame: Frame, summary: &mut DiscoverSummary) {
    let Some(job) = frame.job else {
        return;
    };
    if let Some(out) = &job.scratch_out {
        match repack(out.path(), job.kind, &job.dest) {
            Ok(()) => info!(container = %job.ident, dest = %job.dest.display(), "saved container"),
            Err(e) => {
                error!(container = %job.ident, error = %e, "failed to re-pack container");
                summary.failed += 1;
            }
        }
    }
}

/// Copy an unprocessed container member unchanged into the container's output.
fn keep_verbatim(path: &Path, dest: Option<&Path>, ident: &str) {
    let Some(dest) = dest else {
        return;
    };
    let copied = match dest.parent() {
        Some(parent) => fs::create_dir_all(parent).and_then(|()| fs::copy(path, dest)),
        None => fs::copy(path, dest),
    };
    match copied {
        Ok(_) => debug!(file = %ident, "kept member unchanged"),
        Err(e) => error!(file = %ident, error = %e, "could not keep member"),
    }
}

/// Regular files under `root` in sorted order. Symlinks are not followed.
fn list_files(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "cannot read directory entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect()
}

fn slash_path(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
