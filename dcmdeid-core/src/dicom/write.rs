use std::fs;
use std::path::Path;

use super::dict::{FILE_META_GROUP_LENGTH, ITEM, ITEM_DELIMITATION, SEQUENCE_DELIMITATION};
use super::read::{MAGIC, UNDEFINED_LENGTH};
use super::record::{DicomFile, Element, Encoding, Record, Value};
use super::vr::Vr;
use crate::error::{DeidError, Result};
use crate::tag::{Tag, element, group, tag_to_string};

/// Serialize a full record. The file-meta group length is recomputed.
pub fn to_bytes(file: &DicomFile) -> Result<Vec<u8>> {
    if file.partial {
        return Err(DeidError::format(
            "record was read without pixel data and cannot be written",
        ));
    }
    let mut meta_body = Vec::new();
    for (tag, el) in file.meta.iter().filter(|(t, _)| **t != FILE_META_GROUP_LENGTH) {
        write_element(&mut meta_body, *tag, el, Encoding::EXPLICIT)?;
    }
    let group_length = u32::try_from(meta_body.len())
        .map_err(|_| DeidError::format("file meta group too large"))?;

    let mut out = Vec::with_capacity(file.preamble.len() + MAGIC.len() + meta_body.len());
    out.extend_from_slice(&file.preamble);
    out.extend_from_slice(MAGIC);
    write_element(
        &mut out,
        FILE_META_GROUP_LENGTH,
        &Element::bytes(Vr::UL, group_length.to_le_bytes().to_vec()),
        Encoding::EXPLICIT,
    )?;
    out.extend_from_slice(&meta_body);
    write_record(&mut out, &file.dataset, file.syntax.encoding)?;
    Ok(out)
}

pub fn write_file(file: &DicomFile, path: &Path) -> Result<()> {
    let bytes = to_bytes(file)?;
    fs::write(path, bytes)?;
    Ok(())
}

fn write_record(out: &mut Vec<u8>, record: &Record, enc: Encoding) -> Result<()> {
    for (tag, el) in record {
        write_element(out, *tag, el, enc)?;
    }
    Ok(())
}

fn write_element(out: &mut Vec<u8>, tag: Tag, el: &Element, enc: Encoding) -> Result<()> {
    match &el.value {
        Value::Scalar(raw) => {
            let len = if el.undefined_length {
                UNDEFINED_LENGTH
            } else {
                value_len(tag, raw.len())?
            };
            write_header(out, tag, el.vr, len, enc)?;
            out.extend_from_slice(raw);
            if el.undefined_length {
                write_delimiter(out, SEQUENCE_DELIMITATION);
            }
        }
        Value::Sequence(seq) => {
            let item_enc = if seq.implicit_items {
                Encoding::IMPLICIT
            } else {
                enc
            };
            let mut body = Vec::new();
            for item in &seq.items {
                write_item(&mut body, item, item_enc)?;
            }
            if el.undefined_length {
                write_header(out, tag, el.vr, UNDEFINED_LENGTH, enc)?;
                out.extend_from_slice(&body);
                write_delimiter(out, SEQUENCE_DELIMITATION);
            } else {
                write_header(out, tag, el.vr, value_len(tag, body.len())?, enc)?;
                out.extend_from_slice(&body);
            }
        }
        Value::Nested(record) => {
            let mut body = Vec::new();
            write_item(&mut body, record, enc)?;
            write_header(out, tag, Vr::SQ, value_len(tag, body.len())?, enc)?;
            out.extend_from_slice(&body);
        }
    }
    Ok(())
}

fn write_item(out: &mut Vec<u8>, record: &Record, enc: Encoding) -> Result<()> {
    let mut body = Vec::new();
    write_record(&mut body, record, enc)?;
    write_tag(out, ITEM);
    if record.undefined_length {
        out.extend_from_slice(&UNDEFINED_LENGTH.to_le_bytes());
        out.extend_from_slice(&body);
        write_delimiter(out, ITEM_DELIMITATION);
    } else {
        out.extend_from_slice(&value_len(ITEM, body.len())?.to_le_bytes());
        out.extend_from_slice(&body);
    }
    Ok(())
}

fn write_header(out: &mut Vec<u8>, tag: Tag, vr: Vr, len: u32, enc: Encoding) -> Result<()> {
    write_tag(out, tag);
    if !enc.explicit_vr {
        out.extend_from_slice(&len.to_le_bytes());
        return Ok(());
    }
    out.extend_from_slice(&vr.to_bytes());
    if vr.has_long_header() {
        out.extend_from_slice(&[0, 0]);
        out.extend_from_slice(&len.to_le_bytes());
    } else {
        let short = u16::try_from(len).map_err(|_| {
            DeidError::format(format!(
                "value of {} too long for {vr}",
                tag_to_string(tag)
            ))
        })?;
        out.extend_from_slice(&short.to_le_bytes());
    }
    Ok(())
}

fn write_tag(out: &mut Vec<u8>, tag: Tag) {
    out.extend_from_slice(&group(tag).to_le_bytes());
    out.extend_from_slice(&element(tag).to_le_bytes());
}

fn write_delimiter(out: &mut Vec<u8>, tag: Tag) {
    write_tag(out, tag);
    out.extend_from_slice(&0u32.to_le_bytes());
}

fn value_len(tag: Tag, len: usize) -> Result<u32> {
    u32::try_from(len)
        .ok()
        .filter(|n| *n != UNDEFINED_LENGTH)
        .ok_or_else(|| DeidError::format(format!("value of {} too large", tag_to_string(tag))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dicom::dict::{PATIENT_ID, TRANSFER_SYNTAX_UID};
    use crate::dicom::record::EXPLICIT_VR_LITTLE_ENDIAN;

    #[test]
    fn group_length_is_recomputed() {
        let mut file = DicomFile::new(EXPLICIT_VR_LITTLE_ENDIAN, "1.2", "3.4").unwrap();
        let before = to_bytes(&file).unwrap();
        file.meta.put_text(0x0002_0013, Vr::SH, "DEID_1");
        let after = to_bytes(&file).unwrap();
        let len_at = 132 + 8;
        let read_len = |b: &[u8]| u32::from_le_bytes([b[len_at], b[len_at + 1], b[len_at + 2], b[len_at + 3]]);
        assert_eq!(read_len(&after), read_len(&before) + 8 + 6);
        assert!(file.meta.contains(TRANSFER_SYNTAX_UID));
    }

    #[test]
    fn oversized_short_value_is_rejected() {
        let mut file = DicomFile::new(EXPLICIT_VR_LITTLE_ENDIAN, "1.2", "3.4").unwrap();
        file.dataset
            .insert(PATIENT_ID, Element::text(Vr::LO, &"x".repeat(70_000)));
        assert!(to_bytes(&file).is_err());
    }

    #[test]
    fn nested_record_is_written_as_single_item_sequence() {
        let mut file = DicomFile::new(EXPLICIT_VR_LITTLE_ENDIAN, "1.2", "3.4").unwrap();
        let mut inner = Record::new();
        inner.put_text(PATIENT_ID, Vr::LO, "P1");
        file.dataset.insert(0x0040_0275, Element::nested(inner));
        let bytes = to_bytes(&file).unwrap();
        let parsed =
            crate::dicom::read::read_file_bytes(&bytes, crate::dicom::read::ReadOptions::full())
                .unwrap();
        match &parsed.dataset.get(0x0040_0275).unwrap().value {
            Value::Sequence(seq) => {
                assert_eq!(seq.items.len(), 1);
                assert_eq!(seq.items[0].text(PATIENT_ID).as_deref(), Some("P1"));
            }
            other => panic!("expected sequence, got {other:?}"),
        }
    }
}
