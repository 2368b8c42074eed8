use super::Compressor;
use crate::error::Result;
use std::io::{Read, Write};
use xz2::read::XzDecoder;
use xz2::write::XzEncoder;

const PRESET: u32 = 6;

pub struct XzCompressor;

impl Compressor for XzCompressor {
    fn compress(&self, src: &mut dyn Read, dst: &mut dyn Write) -> Result<u64> {
        let mut enc = XzEncoder::new(dst, PRESET);
        let n = std::io::copy(src, &mut enc)?;
        enc.finish()?;
        Ok(n)
    }

    fn decoder<'a>(&self, src: Box<dyn Read + 'a>) -> Box<dyn Read + 'a> {
        Box::new(XzDecoder::new_multi_decoder(src))
    }
}
