use std::fs;
use std::path::Path;

use super::dict::{self, ITEM, ITEM_DELIMITATION, SEQUENCE_DELIMITATION, TRANSFER_SYNTAX_UID};
use super::record::{DicomFile, Element, Encoding, Record, Sequence, TransferSyntax, Value};
use super::vr::Vr;
use crate::error::{DeidError, Result};
use crate::tag::{FILE_META_GROUP, Tag, make_tag, tag_to_string};

pub const PREAMBLE_LEN: usize = 128;
pub const MAGIC: &[u8; 4] = b"DICM";
pub(crate) const UNDEFINED_LENGTH: u32 = 0xFFFF_FFFF;

#[derive(Clone, Copy, Debug, Default)]
pub struct ReadOptions {
    /// Stop at the first top-level pixel data element.
    pub stop_before_pixels: bool,
}

impl ReadOptions {
    pub fn full() -> Self {
        Self {
            stop_before_pixels: false,
        }
    }

    pub fn header_only() -> Self {
        Self {
            stop_before_pixels: true,
        }
    }
}

/// True when `bytes` start with a preamble followed by the `DICM` magic.
pub fn has_magic(bytes: &[u8]) -> bool {
    bytes.len() >= PREAMBLE_LEN + MAGIC.len()
        && &bytes[PREAMBLE_LEN..PREAMBLE_LEN + MAGIC.len()] == MAGIC
}

pub fn read_file(path: &Path, opts: ReadOptions) -> Result<DicomFile> {
    let bytes = fs::read(path)?;
    read_file_bytes(&bytes, opts)
}

pub fn read_file_bytes(bytes: &[u8], opts: ReadOptions) -> Result<DicomFile> {
    if !has_magic(bytes) {
        return Err(DeidError::format("missing DICM magic"));
    }
    let mut preamble = [0u8; PREAMBLE_LEN];
    preamble.copy_from_slice(&bytes[..PREAMBLE_LEN]);

    let mut r = Reader::new(&bytes[PREAMBLE_LEN + MAGIC.len()..]);
    let mut meta = Record::new();
    while r.peek_group() == Some(FILE_META_GROUP) {
        let tag = r.tag()?;
        let element = read_element(&mut r, tag, Encoding::EXPLICIT)?;
        meta.insert(tag, element);
    }
    let uid = meta
        .text(TRANSFER_SYNTAX_UID)
        .ok_or_else(|| DeidError::format("file meta has no transfer syntax"))?;
    let syntax = TransferSyntax::from_uid(&uid)?;

    let (dataset, end) = read_dataset(&mut r, syntax.encoding, opts.stop_before_pixels)?;
    if end == End::ItemDelimiter {
        return Err(DeidError::format("item delimiter outside of a sequence"));
    }
    Ok(DicomFile {
        preamble,
        meta,
        dataset,
        syntax,
        partial: end == End::Pixels,
    })
}

#[derive(Debug, PartialEq, Eq)]
enum End {
    Exhausted,
    ItemDelimiter,
    Pixels,
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| DeidError::format(format!("truncated record at offset {}", self.pos)))?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    /// Sub-reader over the next `len` bytes.
    fn split(&mut self, len: u32) -> Result<Reader<'a>> {
        Ok(Reader::new(self.take(len as usize)?))
    }

    fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn tag(&mut self) -> Result<Tag> {
        let group = self.u16()?;
        let element = self.u16()?;
        Ok(make_tag(group, element))
    }

    fn peek_group(&self) -> Option<u16> {
        let b = self.buf.get(self.pos..self.pos + 2)?;
        Some(u16::from_le_bytes([b[0], b[1]]))
    }
}

fn read_dataset(r: &mut Reader<'_>, enc: Encoding, stop_at_pixels: bool) -> Result<(Record, End)> {
    let mut record = Record::new();
    while !r.is_empty() {
        let tag = r.tag()?;
        if tag == ITEM_DELIMITATION {
            r.u32()?;
            return Ok((record, End::ItemDelimiter));
        }
        if stop_at_pixels && dict::is_pixel_data(tag) {
            return Ok((record, End::Pixels));
        }
        let element = read_element(r, tag, enc)?;
        record.insert(tag, element);
    }
    Ok((record, End::Exhausted))
}

fn read_element(r: &mut Reader<'_>, tag: Tag, enc: Encoding) -> Result<Element> {
    let (vr, len) = if enc.explicit_vr {
        let b = r.take(2)?;
        let vr = Vr::from_bytes([b[0], b[1]]).ok_or_else(|| {
            DeidError::format(format!(
                "unknown VR {:?} in {}",
                String::from_utf8_lossy(b),
                tag_to_string(tag)
            ))
        })?;
        let len = if vr.has_long_header() {
            r.take(2)?;
            r.u32()?
        } else {
            r.u16()? as u32
        };
        (vr, len)
    } else {
        (dict::vr(tag), r.u32()?)
    };
    let undefined_length = len == UNDEFINED_LENGTH;

    if undefined_length && dict::is_pixel_data(tag) {
        return Ok(Element {
            vr,
            value: Value::Scalar(read_fragments(r)?),
            undefined_length,
        });
    }

    if vr == Vr::SQ || undefined_length {
        // Undefined-length UN holds implicit VR items.
        let implicit_items = vr == Vr::UN && enc.explicit_vr;
        let item_enc = if implicit_items { Encoding::IMPLICIT } else { enc };
        let items = read_items(r, len, item_enc)?;
        let vr = if enc.explicit_vr { vr } else { Vr::SQ };
        return Ok(Element {
            vr,
            value: Value::Sequence(Sequence {
                items,
                implicit_items,
            }),
            undefined_length,
        });
    }

    Ok(Element {
        vr,
        value: Value::Scalar(r.take(len as usize)?.to_vec()),
        undefined_length: false,
    })
}

fn read_items(r: &mut Reader<'_>, len: u32, enc: Encoding) -> Result<Vec<Record>> {
    let mut items = Vec::new();
    if len == UNDEFINED_LENGTH {
        loop {
            match r.tag()? {
                SEQUENCE_DELIMITATION => {
                    r.u32()?;
                    return Ok(items);
                }
                ITEM => items.push(read_item(r, enc)?),
                other => {
                    return Err(DeidError::format(format!(
                        "expected item, found {}",
                        tag_to_string(other)
                    )));
                }
            }
        }
    }

    let mut sub = r.split(len)?;
    while !sub.is_empty() {
        let tag = sub.tag()?;
        if tag != ITEM {
            return Err(DeidError::format(format!(
                "expected item, found {}",
                tag_to_string(tag)
            )));
        }
        items.push(read_item(&mut sub, enc)?);
    }
    Ok(items)
}

fn read_item(r: &mut Reader<'_>, enc: Encoding) -> Result<Record> {
    let len = r.u32()?;
    if len == UNDEFINED_LENGTH {
        let (mut record, end) = read_dataset(r, enc, false)?;
        if end != End::ItemDelimiter {
            return Err(DeidError::format("unterminated sequence item"));
        }
        record.undefined_length = true;
        return Ok(record);
    }
    let mut sub = r.split(len)?;
    let (record, _) = read_dataset(&mut sub, enc, false)?;
    Ok(record)
}

/// Raw bytes of an encapsulated pixel data element, item headers included,
/// without the closing sequence delimiter.
fn read_fragments(r: &mut Reader<'_>) -> Result<Vec<u8>> {
    let start = r.pos;
    loop {
        let at = r.pos;
        let tag = r.tag()?;
        let len = r.u32()?;
        match tag {
            ITEM => {
                r.take(len as usize)?;
            }
            SEQUENCE_DELIMITATION => return Ok(r.buf[start..at].to_vec()),
            other => {
                return Err(DeidError::format(format!(
                    "unexpected {} in encapsulated pixel data",
                    tag_to_string(other)
                )));
            }
        }
    }
}
