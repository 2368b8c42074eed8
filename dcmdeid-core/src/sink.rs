//! Archive sink: append-only log of original values.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use csv::WriterBuilder;
use serde::Serialize;

use crate::error::Result;

/// Field label used for rename rows.
pub const FILENAME_FIELD: &str = "filename";

/// One archive row: source identifier, field address, original value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ArchiveRecord {
    pub source: String,
    pub field: String,
    pub value: String,
}

impl ArchiveRecord {
    pub fn new(source: &str, field: &str, value: String) -> Self {
        Self {
            source: source.to_string(),
            field: field.to_string(),
            value,
        }
    }

    pub fn rename(source: &str, new_relative: &str) -> Self {
        Self::new(source, FILENAME_FIELD, new_relative.to_string())
    }
}

pub trait ArchiveSink {
    fn append(&mut self, record: &ArchiveRecord) -> Result<()>;
}

/// In-memory sink.
impl ArchiveSink for Vec<ArchiveRecord> {
    fn append(&mut self, record: &ArchiveRecord) -> Result<()> {
        self.push(record.clone());
        Ok(())
    }
}

/// CSV file sink without a header row. The file is opened in append mode for
/// every row, so no handle is held between writes.
#[derive(Clone, Debug)]
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the file if missing without truncating it.
    pub fn touch(&self) -> Result<()> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        Ok(())
    }
}

impl ArchiveSink for CsvSink {
    fn append(&mut self, record: &ArchiveRecord) -> Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        writer.serialize(record)?;
        writer.flush()?;
        Ok(())
    }
}

/// Sink that drops every row.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl ArchiveSink for NullSink {
    fn append(&mut self, _record: &ArchiveRecord) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn csv_sink_appends_across_instances() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("archive.csv");
        let mut first = CsvSink::new(&path);
        first
            .append(&ArchiveRecord::new("a.dcm", "0x100010", "Doe^Jane".into()))
            .unwrap();
        let mut second = CsvSink::new(&path);
        second
            .append(&ArchiveRecord::rename("a.dcm", "P1-1-1.2.3.dcm"))
            .unwrap();
        second
            .append(&ArchiveRecord::new("b.dcm", "0x81030", "Brain, w/o".into()))
            .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "a.dcm,0x100010,Doe^Jane\na.dcm,filename,P1-1-1.2.3.dcm\nb.dcm,0x81030,\"Brain, w/o\"\n"
        );
    }

    #[test]
    fn touch_keeps_existing_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("archive.csv");
        std::fs::write(&path, "x,y,z\n").unwrap();
        CsvSink::new(&path).touch().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "x,y,z\n");
    }
}
