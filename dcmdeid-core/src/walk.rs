//! Dataset tree walker.
//!
//! Visits every leaf field depth-first in tag order. Sequence items extend the
//! address by the sequence tag only, so one address denotes the field in every
//! item. Pixel data is never visited.

use crate::dicom::dict;
use crate::dicom::record::{DicomFile, Element, Record, Value, display_name};
use crate::tag::FieldAddress;

/// Visit every leaf of `record`.
pub fn walk<F>(record: &Record, visitor: &mut F)
where
    F: FnMut(&FieldAddress, &str, &Element),
{
    walk_at(record, &FieldAddress::root(), "", visitor);
}

/// Mutable variant of [`walk`].
pub fn walk_mut<F>(record: &mut Record, visitor: &mut F)
where
    F: FnMut(&FieldAddress, &str, &mut Element),
{
    walk_mut_at(record, &FieldAddress::root(), "", visitor);
}

/// Walk the main dataset, then the file-meta record as a separate root.
pub fn walk_file<F>(file: &DicomFile, mut visitor: F)
where
    F: FnMut(&FieldAddress, &str, &Element),
{
    walk(&file.dataset, &mut visitor);
    walk(&file.meta, &mut visitor);
}

pub fn walk_file_mut<F>(file: &mut DicomFile, mut visitor: F)
where
    F: FnMut(&FieldAddress, &str, &mut Element),
{
    walk_mut(&mut file.dataset, &mut visitor);
    walk_mut(&mut file.meta, &mut visitor);
}

fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

fn walk_at<F>(record: &Record, parent: &FieldAddress, parent_path: &str, visitor: &mut F)
where
    F: FnMut(&FieldAddress, &str, &Element),
{
    for (tag, element) in record {
        if dict::is_pixel_data(*tag) {
            continue;
        }
        let address = parent.child(*tag);
        let path = join_path(parent_path, &display_name(*tag));
        match &element.value {
            Value::Sequence(seq) => {
                for item in &seq.items {
                    walk_at(item, &address, &path, visitor);
                }
            }
            Value::Nested(inner) => walk_at(inner, &address, &path, visitor),
            Value::Scalar(_) => visitor(&address, &path, element),
        }
    }
}

fn walk_mut_at<F>(record: &mut Record, parent: &FieldAddress, parent_path: &str, visitor: &mut F)
where
    F: FnMut(&FieldAddress, &str, &mut Element),
{
    for (tag, element) in record.iter_mut() {
        if dict::is_pixel_data(*tag) {
            continue;
        }
        let address = parent.child(*tag);
        let path = join_path(parent_path, &display_name(*tag));
        if element.is_scalar() {
            visitor(&address, &path, element);
            continue;
        }
        match &mut element.value {
            Value::Sequence(seq) => {
                for item in &mut seq.items {
                    walk_mut_at(item, &address, &path, visitor);
                }
            }
            Value::Nested(inner) => walk_mut_at(inner, &address, &path, visitor),
            Value::Scalar(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dicom::dict::{PATIENT_NAME, PIXEL_DATA};
    use crate::dicom::record::EXPLICIT_VR_LITTLE_ENDIAN;
    use crate::dicom::vr::Vr;

    fn visited(file: &DicomFile) -> Vec<(String, String)> {
        let mut seen = Vec::new();
        walk_file(file, |address, path, _| {
            seen.push((address.to_string(), path.to_string()))
        });
        seen
    }

    #[test]
    fn sequences_share_one_address_and_pixels_are_skipped() {
        let mut file = DicomFile::new(EXPLICIT_VR_LITTLE_ENDIAN, "1.2", "3.4").unwrap();
        let items = (0..3)
            .map(|i| {
                let mut item = Record::new();
                item.put_text(0x0008_1150, Vr::UI, &format!("1.{i}"));
                item
            })
            .collect();
        file.dataset.insert(0x0008_1111, Element::sequence(items));
        file.dataset.put_text(PATIENT_NAME, Vr::PN, "Doe^Jo");
        file.dataset
            .insert(PIXEL_DATA, Element::bytes(Vr::OW, vec![0; 4]));

        let seen = visited(&file);
        let nested: Vec<_> = seen
            .iter()
            .filter(|(a, _)| a == "0x81111/0x81150")
            .collect();
        assert_eq!(nested.len(), 3);
        assert_eq!(
            nested[0].1,
            "Referenced Performed Procedure Step Sequence/Referenced SOP Class UID"
        );
        assert!(seen.iter().all(|(a, _)| a != "0x7fe00010"));
        // file-meta comes after the main dataset
        assert_eq!(seen.last().unwrap().0, "0x20012");
    }

    #[test]
    fn unknown_tags_are_named_by_tag_string() {
        let mut record = Record::new();
        record.insert(0x0009_1001, Element::bytes(Vr::UN, vec![1, 2]));
        let mut paths = Vec::new();
        let mut collect = |_: &FieldAddress, path: &str, _: &Element| paths.push(path.to_string());
        walk(&record, &mut collect);
        assert_eq!(paths, vec!["0x91001".to_string()]);
    }

    #[test]
    fn nested_records_extend_the_address() {
        let mut inner = Record::new();
        inner.put_text(PATIENT_NAME, Vr::PN, "A");
        let mut record = Record::new();
        record.insert(0x0040_0275, Element::nested(inner));
        let mut rename = |address: &FieldAddress, _: &str, element: &mut Element| {
            assert_eq!(address.to_string(), "0x400275/0x100010");
            element.set_text("B").unwrap();
        };
        walk_mut(&mut record, &mut rename);
        match &record.get(0x0040_0275).unwrap().value {
            Value::Nested(inner) => assert_eq!(inner.text(PATIENT_NAME).as_deref(), Some("B")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
