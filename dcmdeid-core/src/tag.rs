//! Tag codec: canonical hex strings, packed tags and field addresses.
//!
//! A tag packs the group into the high 16 bits and the element into the low
//! 16 bits, so `(0010,0010)` is `0x00100010` and prints as `0x100010`.

use std::fmt;
use std::str::FromStr;

use crate::error::{DeidError, Result};

pub type Tag = u32;

/// Group reserved for the file-meta sub-record.
pub const FILE_META_GROUP: u16 = 0x0002;

pub const fn make_tag(group: u16, element: u16) -> Tag {
    ((group as u32) << 16) | element as u32
}

pub const fn group(tag: Tag) -> u16 {
    (tag >> 16) as u16
}

pub const fn element(tag: Tag) -> u16 {
    (tag & 0xFFFF) as u16
}

/// Lowercase hex with a `0x` prefix and no padding.
pub fn tag_to_string(tag: Tag) -> String {
    format!("{tag:#x}")
}

/// Parse a hex tag with or without `0x` and leading zeros.
pub fn string_to_tag(s: &str) -> Result<Tag> {
    let trimmed = s.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if digits.is_empty() || digits.len() > 8 {
        return Err(DeidError::MalformedTag(s.to_string()));
    }
    let padded = format!("{digits:0>8}");
    let bytes = hex::decode(&padded).map_err(|_| DeidError::MalformedTag(s.to_string()))?;
    let mut be = [0u8; 4];
    be.copy_from_slice(&bytes);
    Ok(u32::from_be_bytes(be))
}

/// Path of tags from a record root (main dataset or file-meta) to a field.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldAddress {
    tags: Vec<Tag>,
}

impl FieldAddress {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn from_tags(tags: Vec<Tag>) -> Self {
        Self { tags }
    }

    pub fn child(&self, tag: Tag) -> Self {
        let mut tags = Vec::with_capacity(self.tags.len() + 1);
        tags.extend_from_slice(&self.tags);
        tags.push(tag);
        Self { tags }
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Intermediate segments and the terminal tag.
    pub fn split_last(&self) -> Option<(&[Tag], Tag)> {
        self.tags.split_last().map(|(last, parents)| (parents, *last))
    }

    /// Group of the first segment; `0` for the empty address.
    pub fn group_of(&self) -> u16 {
        self.tags.first().map(|t| group(*t)).unwrap_or(0)
    }

    pub fn is_file_meta(&self) -> bool {
        self.group_of() == FILE_META_GROUP
    }
}

impl FromStr for FieldAddress {
    type Err = DeidError;

    fn from_str(s: &str) -> Result<Self> {
        let tags = s
            .split('/')
            .map(string_to_tag)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { tags })
    }
}

impl fmt::Display for FieldAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, tag) in self.tags.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{tag:#x}")?;
        }
        Ok(())
    }
}
