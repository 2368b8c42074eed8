use super::Compressor;
use crate::error::Result;
use flate2::Compression;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use std::io::{Read, Write};

pub struct GzipCompressor;

impl Compressor for GzipCompressor {
    fn compress(&self, src: &mut dyn Read, dst: &mut dyn Write) -> Result<u64> {
        let mut enc = GzEncoder::new(dst, Compression::default());
        let n = std::io::copy(src, &mut enc)?;
        enc.finish()?;
        Ok(n)
    }

    // Concatenated members are read as one stream.
    fn decoder<'a>(&self, src: Box<dyn Read + 'a>) -> Box<dyn Read + 'a> {
        Box::new(MultiGzDecoder::new(src))
    }
}
