#![forbid(unsafe_code)]

pub mod error;
pub mod tag;

pub mod dicom {
    pub mod dict;
    pub mod read;
    pub mod record;
    pub mod vr;
    pub mod write;
}

pub mod codec;
pub mod walk;

pub mod actions;
pub mod dates;
pub mod rules;

pub mod output;
pub mod scan;
pub mod sink;

pub mod discover {
    pub mod container;
    pub mod classify;
    pub mod walker;
}

pub mod commands;

// Re-exports: stable API surface
pub use actions::{ApplyReport, apply};
pub use commands::{DeidOptions, ScanOptions, run_deid, run_scan};
pub use dates::strip_dates;
pub use dicom::record::{DicomFile, Element, Record, Value};
pub use discover::walker::{DiscoverOptions, DiscoverSummary, discover};
pub use error::{CommandReport, DeidError, Result};
pub use output::EngineState;
pub use rules::{Action, ReplaceMap, RuleTable, parse_rules};
pub use sink::{ArchiveRecord, ArchiveSink, CsvSink};
pub use tag::{FieldAddress, Tag, string_to_tag, tag_to_string};
pub use walk::walk;
