//! In-memory record model.
//!
//! Scalars keep their raw value bytes so that untouched fields serialize back
//! byte-for-byte. Sequences and items remember whether they were delimited
//! (undefined length) on the wire.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::collections::btree_map;

use super::dict::{self, TRANSFER_SYNTAX_UID};
use super::vr::Vr;
use crate::error::{DeidError, Result};
use crate::tag::{Tag, tag_to_string};

pub const IMPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2";
pub const EXPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2.1";
pub const EXPLICIT_VR_BIG_ENDIAN: &str = "1.2.840.10008.1.2.2";
pub const DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2.1.99";

/// Field value: raw scalar bytes, a sequence of items, or a directly nested
/// record.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Scalar(Vec<u8>),
    Sequence(Sequence),
    Nested(Record),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Sequence {
    pub items: Vec<Record>,
    /// Items inside an explicit-VR `UN` sequence are implicit VR.
    pub implicit_items: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Element {
    pub vr: Vr,
    pub value: Value,
    /// Written with 0xFFFFFFFF length and a closing delimiter.
    pub undefined_length: bool,
}

/// Textual rendering of a field value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValueText {
    Text(String),
    Binary(Vec<u8>),
    Sequence(usize),
}

impl ValueText {
    /// Form written to the archive sink.
    pub fn into_archive_string(self) -> String {
        match self {
            ValueText::Text(s) => s,
            ValueText::Binary(b) => hex::encode(b),
            ValueText::Sequence(n) => format!("<sequence of {n} items>"),
        }
    }
}

impl Element {
    pub fn text(vr: Vr, value: &str) -> Self {
        Self {
            vr,
            value: Value::Scalar(pad_even(value.as_bytes().to_vec(), vr.pad_byte())),
            undefined_length: false,
        }
    }

    pub fn bytes(vr: Vr, raw: Vec<u8>) -> Self {
        Self {
            vr,
            value: Value::Scalar(raw),
            undefined_length: false,
        }
    }

    pub fn sequence(items: Vec<Record>) -> Self {
        Self {
            vr: Vr::SQ,
            value: Value::Sequence(Sequence {
                items,
                implicit_items: false,
            }),
            undefined_length: false,
        }
    }

    pub fn nested(record: Record) -> Self {
        Self {
            vr: Vr::SQ,
            value: Value::Nested(record),
            undefined_length: false,
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self.value, Value::Scalar(_))
    }

    pub fn raw(&self) -> Option<&[u8]> {
        match &self.value {
            Value::Scalar(b) => Some(b),
            _ => None,
        }
    }

    /// String content of a text-VR scalar with trailing padding removed.
    pub fn as_text(&self) -> Option<String> {
        match &self.value {
            Value::Scalar(b) if self.vr.is_text() => {
                let s = String::from_utf8_lossy(b);
                Some(s.trim_end_matches([' ', '\0']).to_string())
            }
            _ => None,
        }
    }

    pub fn value_text(&self) -> ValueText {
        match &self.value {
            Value::Sequence(seq) => ValueText::Sequence(seq.items.len()),
            Value::Nested(_) => ValueText::Sequence(1),
            Value::Scalar(raw) => {
                if let Some(s) = self.as_text() {
                    return ValueText::Text(s);
                }
                match format_numbers(self.vr, raw) {
                    Some(s) => ValueText::Text(s),
                    None => ValueText::Binary(raw.clone()),
                }
            }
        }
    }

    /// Overwrite the value with a literal, encoded for this element's VR.
    pub fn set_text(&mut self, literal: &str) -> Result<()> {
        let invalid = || DeidError::InvalidValue {
            value: literal.to_string(),
            vr: self.vr.as_str(),
        };
        if !self.is_scalar() {
            return Err(invalid());
        }
        let raw = if self.vr.is_text() {
            pad_even(literal.as_bytes().to_vec(), self.vr.pad_byte())
        } else if self.vr.numeric_width().is_some() {
            encode_numbers(self.vr, literal).ok_or_else(invalid)?
        } else {
            pad_even(literal.as_bytes().to_vec(), 0)
        };
        self.value = Value::Scalar(raw);
        self.undefined_length = false;
        Ok(())
    }

    /// Replace every occurrence of `needle` inside a text-VR scalar.
    ///
    /// Works on raw bytes so content outside the match keeps its encoding.
    /// Returns true when the value changed.
    pub fn replace_text(&mut self, needle: &[u8], with: &[u8]) -> bool {
        if !self.vr.is_text() || needle.is_empty() {
            return false;
        }
        let pad = self.vr.pad_byte();
        let Value::Scalar(raw) = &mut self.value else {
            return false;
        };
        match replace_all(raw, needle, with) {
            Some(replaced) => {
                *raw = pad_even(replaced, pad);
                true
            }
            None => false,
        }
    }
}

/// Ordered mapping from tag to element.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record {
    fields: BTreeMap<Tag, Element>,
    /// Set for sequence items written with an item delimiter.
    pub undefined_length: bool,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tag: Tag) -> Option<&Element> {
        self.fields.get(&tag)
    }

    pub fn get_mut(&mut self, tag: Tag) -> Option<&mut Element> {
        self.fields.get_mut(&tag)
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.fields.contains_key(&tag)
    }

    pub fn insert(&mut self, tag: Tag, element: Element) -> Option<Element> {
        self.fields.insert(tag, element)
    }

    pub fn remove(&mut self, tag: Tag) -> Option<Element> {
        self.fields.remove(&tag)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, Tag, Element> {
        self.fields.iter()
    }

    pub fn iter_mut(&mut self) -> btree_map::IterMut<'_, Tag, Element> {
        self.fields.iter_mut()
    }

    /// Text of a field when present and non-empty.
    pub fn text(&self, tag: Tag) -> Option<String> {
        self.get(tag)
            .and_then(Element::as_text)
            .filter(|s| !s.is_empty())
    }

    pub fn put_text(&mut self, tag: Tag, vr: Vr, value: &str) {
        self.insert(tag, Element::text(vr, value));
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = (&'a Tag, &'a Element);
    type IntoIter = btree_map::Iter<'a, Tag, Element>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Encoding {
    pub explicit_vr: bool,
}

impl Encoding {
    pub const EXPLICIT: Encoding = Encoding { explicit_vr: true };
    pub const IMPLICIT: Encoding = Encoding { explicit_vr: false };
}

/// Transfer syntax of the main dataset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferSyntax {
    pub uid: String,
    pub encoding: Encoding,
}

impl TransferSyntax {
    pub fn from_uid(uid: &str) -> Result<Self> {
        let uid = uid.trim_end_matches(['\0', ' ']);
        let encoding = match uid {
            IMPLICIT_VR_LITTLE_ENDIAN => Encoding::IMPLICIT,
            EXPLICIT_VR_BIG_ENDIAN | DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN => {
                return Err(DeidError::UnsupportedTransferSyntax(uid.to_string()));
            }
            // All remaining standard syntaxes encode the dataset as explicit
            // VR little endian (encapsulated pixel data included).
            _ => Encoding::EXPLICIT,
        };
        Ok(Self {
            uid: uid.to_string(),
            encoding,
        })
    }
}

/// A parsed imaging record: preamble, file-meta group and main dataset.
#[derive(Clone, Debug, PartialEq)]
pub struct DicomFile {
    pub preamble: [u8; 128],
    pub meta: Record,
    pub dataset: Record,
    pub syntax: TransferSyntax,
    /// Parsing stopped before pixel data; the record cannot be re-serialized.
    pub partial: bool,
}

impl DicomFile {
    /// New empty record with a minimal file-meta group.
    pub fn new(transfer_syntax_uid: &str, sop_class_uid: &str, sop_instance_uid: &str) -> Result<Self> {
        let syntax = TransferSyntax::from_uid(transfer_syntax_uid)?;
        let mut meta = Record::new();
        meta.insert(dict::FILE_META_VERSION, Element::bytes(Vr::OB, vec![0, 1]));
        meta.put_text(dict::MEDIA_STORAGE_SOP_CLASS_UID, Vr::UI, sop_class_uid);
        meta.put_text(dict::MEDIA_STORAGE_SOP_INSTANCE_UID, Vr::UI, sop_instance_uid);
        meta.put_text(TRANSFER_SYNTAX_UID, Vr::UI, transfer_syntax_uid);
        meta.put_text(dict::IMPLEMENTATION_CLASS_UID, Vr::UI, "1.2.826.0.1.3680043.10.1");
        let mut dataset = Record::new();
        dataset.put_text(dict::SOP_CLASS_UID, Vr::UI, sop_class_uid);
        dataset.put_text(dict::SOP_INSTANCE_UID, Vr::UI, sop_instance_uid);
        Ok(Self {
            preamble: [0u8; 128],
            meta,
            dataset,
            syntax,
            partial: false,
        })
    }
}

/// Human-readable name of a tag, falling back to its hex string.
pub fn display_name(tag: Tag) -> String {
    dict::name(tag)
        .map(Cow::into_owned)
        .unwrap_or_else(|| tag_to_string(tag))
}

fn pad_even(mut raw: Vec<u8>, pad: u8) -> Vec<u8> {
    if raw.len() % 2 == 1 {
        raw.push(pad);
    }
    raw
}

fn replace_all(haystack: &[u8], needle: &[u8], with: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(haystack.len());
    let mut i = 0;
    let mut hit = false;
    while i < haystack.len() {
        if haystack[i..].starts_with(needle) {
            out.extend_from_slice(with);
            i += needle.len();
            hit = true;
        } else {
            out.push(haystack[i]);
            i += 1;
        }
    }
    hit.then_some(out)
}

fn format_numbers(vr: Vr, raw: &[u8]) -> Option<String> {
    let width = vr.numeric_width()?;
    if raw.len() % width != 0 {
        return None;
    }
    let parts: Vec<String> = raw
        .chunks_exact(width)
        .map(|c| match vr {
            Vr::US => u16::from_le_bytes([c[0], c[1]]).to_string(),
            Vr::SS => i16::from_le_bytes([c[0], c[1]]).to_string(),
            Vr::UL => u32::from_le_bytes([c[0], c[1], c[2], c[3]]).to_string(),
            Vr::SL => i32::from_le_bytes([c[0], c[1], c[2], c[3]]).to_string(),
            Vr::FL => f32::from_le_bytes([c[0], c[1], c[2], c[3]]).to_string(),
            Vr::AT => {
                let g = u16::from_le_bytes([c[0], c[1]]) as u32;
                let e = u16::from_le_bytes([c[2], c[3]]) as u32;
                tag_to_string((g << 16) | e)
            }
            Vr::FD => f64::from_le_bytes(eight(c)).to_string(),
            Vr::SV => i64::from_le_bytes(eight(c)).to_string(),
            _ => u64::from_le_bytes(eight(c)).to_string(),
        })
        .collect();
    Some(parts.join("\\"))
}

fn eight(c: &[u8]) -> [u8; 8] {
    let mut b = [0u8; 8];
    b.copy_from_slice(c);
    b
}

fn encode_numbers(vr: Vr, literal: &str) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    for part in literal.split('\\').map(str::trim) {
        match vr {
            Vr::US => out.extend_from_slice(&part.parse::<u16>().ok()?.to_le_bytes()),
            Vr::SS => out.extend_from_slice(&part.parse::<i16>().ok()?.to_le_bytes()),
            Vr::UL => out.extend_from_slice(&part.parse::<u32>().ok()?.to_le_bytes()),
            Vr::SL => out.extend_from_slice(&part.parse::<i32>().ok()?.to_le_bytes()),
            Vr::FL => out.extend_from_slice(&part.parse::<f32>().ok()?.to_le_bytes()),
            Vr::FD => out.extend_from_slice(&part.parse::<f64>().ok()?.to_le_bytes()),
            Vr::SV => out.extend_from_slice(&part.parse::<i64>().ok()?.to_le_bytes()),
            Vr::UV => out.extend_from_slice(&part.parse::<u64>().ok()?.to_le_bytes()),
            Vr::AT => {
                let tag = crate::tag::string_to_tag(part).ok()?;
                out.extend_from_slice(&crate::tag::group(tag).to_le_bytes());
                out.extend_from_slice(&crate::tag::element(tag).to_le_bytes());
            }
            _ => return None,
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_is_padded_and_trimmed() {
        let el = Element::text(Vr::PN, "Doe^Jo");
        assert_eq!(el.raw().unwrap(), b"Doe^Jo");
        let el = Element::text(Vr::LO, "abc");
        assert_eq!(el.raw().unwrap(), b"abc ");
        assert_eq!(el.as_text().as_deref(), Some("abc"));
        let el = Element::text(Vr::UI, "1.2.3");
        assert_eq!(el.raw().unwrap(), b"1.2.3\0");
    }

    #[test]
    fn numeric_values_render_and_parse() {
        let mut el = Element::bytes(Vr::US, vec![0x00, 0x02, 0x10, 0x00]);
        assert_eq!(el.value_text(), ValueText::Text("512\\16".to_string()));
        el.set_text("7").unwrap();
        assert_eq!(el.raw().unwrap(), &[7, 0]);
        assert!(el.set_text("seven").is_err());
    }

    #[test]
    fn binary_values_are_reported_as_binary() {
        let el = Element::bytes(Vr::OB, vec![1, 2]);
        assert_eq!(el.value_text(), ValueText::Binary(vec![1, 2]));
        assert_eq!(el.value_text().into_archive_string(), "0102");
    }

    #[test]
    fn replace_text_hits_every_occurrence() {
        let mut el = Element::text(Vr::LT, "20100101 and 20100101");
        assert!(el.replace_text(b"20100101", b"19991231"));
        assert_eq!(el.as_text().as_deref(), Some("19991231 and 19991231"));
        assert!(!el.replace_text(b"20100101", b"19991231"));
    }

    #[test]
    fn replace_text_ignores_binary_vrs() {
        let mut el = Element::bytes(Vr::OB, b"20100101".to_vec());
        assert!(!el.replace_text(b"20100101", b"19991231"));
        assert_eq!(el.raw().unwrap(), b"20100101");
    }

    #[test]
    fn sequences_cannot_take_text() {
        let mut el = Element::sequence(vec![Record::new()]);
        assert!(matches!(
            el.set_text("x"),
            Err(DeidError::InvalidValue { vr: "SQ", .. })
        ));
    }

    #[test]
    fn transfer_syntax_selection() {
        assert_eq!(
            TransferSyntax::from_uid(IMPLICIT_VR_LITTLE_ENDIAN).unwrap().encoding,
            Encoding::IMPLICIT
        );
        assert_eq!(
            TransferSyntax::from_uid("1.2.840.10008.1.2.4.50\0").unwrap().encoding,
            Encoding::EXPLICIT
        );
        assert!(TransferSyntax::from_uid(EXPLICIT_VR_BIG_ENDIAN).is_err());
    }
}
