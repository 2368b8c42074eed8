//! Field inventory: distinct values per field across a corpus.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use csv::WriterBuilder;

use crate::dicom::dict::FILE_META_VERSION;
use crate::dicom::record::{DicomFile, ValueText};
use crate::error::Result;
use crate::tag::FieldAddress;
use crate::walk::walk_file;

pub const BINARY_PLACEHOLDER: &str = "POTENTIAL PHI; REMOVE: binary data";
/// Rows whose first value is this long or longer are left out of the report.
pub const MAX_FIRST_VALUE_LEN: usize = 128;

#[derive(Clone, Debug, Default)]
pub struct FieldInventory {
    fields: BTreeMap<(String, String), BTreeSet<String>>,
}

impl FieldInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record every leaf value of `file`.
    pub fn add(&mut self, file: &DicomFile) {
        walk_file(file, |address, path, element| {
            let value = match element.value_text() {
                ValueText::Text(s) => s,
                ValueText::Binary(raw) if is_meta_version(address) => hex::encode(raw),
                ValueText::Binary(_) => BINARY_PLACEHOLDER.to_string(),
                ValueText::Sequence(n) => format!("<sequence of {n} items>"),
            };
            self.fields
                .entry((address.to_string(), path.to_string()))
                .or_default()
                .insert(value);
        });
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn values(&self, address: &str, path: &str) -> Option<&BTreeSet<String>> {
        self.fields.get(&(address.to_string(), path.to_string()))
    }

    /// Rows `address, path, value1..valueN` with at most `limit` values each.
    pub fn rows(&self, limit: usize) -> Vec<Vec<String>> {
        self.fields
            .iter()
            .filter(|(_, values)| {
                values
                    .iter()
                    .next()
                    .is_none_or(|first| first.chars().count() < MAX_FIRST_VALUE_LEN)
            })
            .map(|((address, path), values)| {
                let mut row = vec![address.clone(), path.clone()];
                row.extend(values.iter().take(limit).cloned());
                row
            })
            .collect()
    }

    pub fn write_csv(&self, path: &Path, limit: usize) -> Result<()> {
        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)?;
        for row in self.rows(limit) {
            writer.write_record(&row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn is_meta_version(address: &FieldAddress) -> bool {
    address.tags() == [FILE_META_VERSION]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dicom::dict::{PATIENT_NAME, PIXEL_DATA};
    use crate::dicom::record::{EXPLICIT_VR_LITTLE_ENDIAN, Element};
    use crate::dicom::vr::Vr;
    use tempfile::tempdir;

    fn record(name: &str) -> DicomFile {
        let mut file = DicomFile::new(EXPLICIT_VR_LITTLE_ENDIAN, "1.2", "3.4").unwrap();
        file.dataset.put_text(PATIENT_NAME, Vr::PN, name);
        file.dataset
            .insert(0x0009_1001, Element::bytes(Vr::OB, vec![1, 2, 3, 4]));
        file.dataset
            .insert(PIXEL_DATA, Element::bytes(Vr::OW, vec![0; 8]));
        file
    }

    #[test]
    fn values_are_collected_per_field() {
        let mut inventory = FieldInventory::new();
        inventory.add(&record("Doe^Jane"));
        inventory.add(&record("Roe^Rick"));
        inventory.add(&record("Doe^Jane"));

        let names = inventory.values("0x100010", "Patient's Name").unwrap();
        assert_eq!(names.len(), 2);
        let private = inventory.values("0x91001", "0x91001").unwrap();
        assert!(private.contains(BINARY_PLACEHOLDER));
        let version = inventory
            .values("0x20001", "File Meta Information Version")
            .unwrap();
        assert!(version.contains("0001"));
        assert!(inventory.values("0x7fe00010", "Pixel Data").is_none());
    }

    #[test]
    fn rows_honor_limit_and_skip_long_values() {
        let mut inventory = FieldInventory::new();
        for i in 0..5 {
            inventory.add(&record(&format!("Name{i}")));
        }
        let mut long = record("x");
        long.dataset
            .put_text(0x0010_4000, Vr::LT, &"c".repeat(200));
        inventory.add(&long);

        let rows = inventory.rows(3);
        let names = rows.iter().find(|r| r[0] == "0x100010").unwrap();
        assert_eq!(names.len(), 2 + 3);
        assert!(rows.iter().all(|r| r[0] != "0x104000"));

        let dir = tempdir().unwrap();
        let out = dir.path().join("fields.csv");
        inventory.write_csv(&out, 3).unwrap();
        let text = std::fs::read_to_string(&out).unwrap();
        assert!(text.contains("0x100010,Patient's Name,Name0,Name1,Name2\n"));
    }
}
