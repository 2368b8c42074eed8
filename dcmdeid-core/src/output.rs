//! Output naming and persistence for processed records.

use std::fs;
use std::path::{Path, PathBuf};

use crate::codec::{CodecId, compress_bytes};
use crate::dicom::dict::{PATIENT_ID, SERIES_NUMBER, SOP_INSTANCE_UID, STUDY_ID};
use crate::dicom::record::{DicomFile, Record};
use crate::dicom::write::to_bytes;
use crate::error::Result;

/// Archive suffixes recognized when naming re-packed containers, longest first.
const CONTAINER_SUFFIXES: &[&str] = &[
    ".tar.bzip2",
    ".tar.bz2",
    ".tar.gz",
    ".tar.xz",
    ".tbz2",
    ".tgz",
    ".txz",
    ".tar",
    ".zip",
];

/// Mutable state shared across one run.
#[derive(Debug, Default)]
pub struct EngineState {
    counter: u64,
}

impl EngineState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the record counter; the first call returns 1.
    pub fn next_counter(&mut self) -> u64 {
        self.counter += 1;
        self.counter
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }
}

/// Synthetic file name: `<patient|study|NA>-<series|NA>-<sop|counter>[.<ext>].dcm[.gz]`.
///
/// The counter advances on every call so names stay ordered by discovery.
pub fn record_name(dataset: &Record, state: &mut EngineState, extension: &str, codec: CodecId) -> String {
    let n = state.next_counter();
    let subject = dataset
        .text(PATIENT_ID)
        .or_else(|| dataset.text(STUDY_ID))
        .unwrap_or_else(|| "NA".to_string());
    let series = dataset
        .text(SERIES_NUMBER)
        .unwrap_or_else(|| "NA".to_string());
    let instance = dataset
        .text(SOP_INSTANCE_UID)
        .unwrap_or_else(|| format!("{n:010}"));

    let mut name = format!(
        "{}-{}-{}",
        sanitize(&subject),
        sanitize(&series),
        sanitize(&instance)
    );
    if !extension.is_empty() {
        name.push('.');
        name.push_str(extension);
    }
    name.push_str(".dcm");
    name.push_str(codec.suffix());
    name
}

/// Keep identifier text usable as a single path component.
fn sanitize(component: &str) -> String {
    component
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '^' | '+') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Relative output path of a re-packed container: `.<ext>` goes before the
/// archive suffix, e.g. `a/scan.tar.gz` becomes `a/scan.v1.tar.gz`.
pub fn container_target(rel: &Path, extension: &str) -> PathBuf {
    if extension.is_empty() {
        return rel.to_path_buf();
    }
    let Some(name) = rel.file_name().map(|n| n.to_string_lossy().into_owned()) else {
        return rel.to_path_buf();
    };
    let lower = name.to_ascii_lowercase();
    let Some(suffix_len) = CONTAINER_SUFFIXES
        .iter()
        .find(|s| lower.ends_with(*s) && lower.len() > s.len())
        .map(|s| s.len())
    else {
        return rel.to_path_buf();
    };
    let (stem, suffix) = name.split_at(name.len() - suffix_len);
    rel.with_file_name(format!("{stem}.{extension}{suffix}"))
}

/// Serialize and compress a record with `codec`.
pub fn encode_record(file: &DicomFile, codec: CodecId) -> Result<Vec<u8>> {
    let bytes = to_bytes(file)?;
    match codec {
        CodecId::Store => Ok(bytes),
        other => compress_bytes(other, &bytes),
    }
}

/// Write a record, creating parent directories as needed.
pub fn write_record(file: &DicomFile, codec: CodecId, target: &Path) -> Result<()> {
    let bytes = encode_record(file, codec)?;
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(target, bytes)?;
    Ok(())
}
