//! Study date substitution across a whole record.

use rand::Rng;
use tracing::{debug, warn};

use crate::dicom::dict::{SERIES_DATE, STUDY_DATE};
use crate::dicom::record::DicomFile;
use crate::walk::walk_file_mut;

/// Outcome of a substitution that found a date to replace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DateChange {
    pub original: String,
    pub replacement: String,
    /// Number of text fields rewritten.
    pub fields: usize,
}

/// `YYYYMMDD` with year in 1970..=2015, month in 1..=12, day in 1..=28.
pub fn random_date<R: Rng + ?Sized>(rng: &mut R) -> String {
    let year = rng.gen_range(1970..=2015);
    let month = rng.gen_range(1..=12);
    let day = rng.gen_range(1..=28);
    format!("{year:04}{month:02}{day:02}")
}

/// Replace the study date (or series date) everywhere it appears as text.
///
/// Returns `None` when the record carries neither date.
pub fn strip_dates(file: &mut DicomFile, replacement: Option<&str>) -> Option<DateChange> {
    strip_dates_with(file, replacement, &mut rand::thread_rng())
}

pub fn strip_dates_with<R: Rng + ?Sized>(
    file: &mut DicomFile,
    replacement: Option<&str>,
    rng: &mut R,
) -> Option<DateChange> {
    let Some(original) = file
        .dataset
        .text(STUDY_DATE)
        .or_else(|| file.dataset.text(SERIES_DATE))
    else {
        warn!("no study or series date present");
        return None;
    };
    let replacement = match replacement {
        Some(date) => date.to_string(),
        None => random_date(rng),
    };

    let mut fields = 0;
    walk_file_mut(file, |_, _, element| {
        if element.replace_text(original.as_bytes(), replacement.as_bytes()) {
            fields += 1;
        }
    });
    debug!(fields, "substituted study date");
    Some(DateChange {
        original,
        replacement,
        fields,
    })
}
