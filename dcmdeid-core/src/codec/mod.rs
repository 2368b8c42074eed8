//! Whole-file compression layers around records and tar containers.

use crate::error::Result;
use std::fmt;
use std::io::{Read, Write};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CodecId {
    Store,
    Gzip,
    Xz,
    Bzip2,
}

impl CodecId {
    /// Detect a compression layer from leading magic bytes.
    pub fn sniff(head: &[u8]) -> Self {
        if head.starts_with(&[0x1f, 0x8b]) {
            CodecId::Gzip
        } else if head.starts_with(&[0xfd, b'7', b'z', b'X', b'Z', 0x00]) {
            CodecId::Xz
        } else if head.len() >= 4 && head.starts_with(b"BZh") && (b'1'..=b'9').contains(&head[3]) {
            CodecId::Bzip2
        } else {
            CodecId::Store
        }
    }

    /// `None` for uncompressed data.
    pub fn compressor(self) -> Option<&'static dyn Compressor> {
        match self {
            CodecId::Store => None,
            CodecId::Gzip => Some(&gzip::GzipCompressor),
            CodecId::Xz => Some(&xz::XzCompressor),
            CodecId::Bzip2 => Some(&bz2::Bzip2Compressor),
        }
    }

    /// Wrap `src` so reads yield decompressed bytes.
    pub fn reader<'a>(self, src: Box<dyn Read + 'a>) -> Box<dyn Read + 'a> {
        match self.compressor() {
            Some(c) => c.decoder(src),
            None => src,
        }
    }

    /// File suffix appended to a compressed record.
    pub fn suffix(self) -> &'static str {
        match self {
            CodecId::Store => "",
            CodecId::Gzip => ".gz",
            CodecId::Xz => ".xz",
            CodecId::Bzip2 => ".bz2",
        }
    }
}

impl fmt::Display for CodecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CodecId::Store => "store",
            CodecId::Gzip => "gzip",
            CodecId::Xz => "xz",
            CodecId::Bzip2 => "bzip2",
        })
    }
}

pub trait Compressor: Send + Sync {
    fn compress(&self, src: &mut dyn Read, dst: &mut dyn Write) -> Result<u64>;
    fn decoder<'a>(&self, src: Box<dyn Read + 'a>) -> Box<dyn Read + 'a>;
}

pub fn compress_bytes(codec: CodecId, data: &[u8]) -> Result<Vec<u8>> {
    let Some(c) = codec.compressor() else {
        return Ok(data.to_vec());
    };
    let mut out = Vec::new();
    c.compress(&mut &data[..], &mut out)?;
    Ok(out)
}

pub fn decompress_bytes(codec: CodecId, data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    codec.reader(Box::new(data)).read_to_end(&mut out)?;
    Ok(out)
}

/// Decompress at most `limit` bytes; enough to sniff what a compressed file holds.
pub fn decompress_head<'a, R: Read + 'a>(codec: CodecId, src: R, limit: u64) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    codec
        .reader(Box::new(src))
        .take(limit)
        .read_to_end(&mut out)?;
    Ok(out)
}

pub mod bz2;
pub mod gzip;
pub mod xz;
