use super::Compressor;
use crate::error::Result;
use bzip2::Compression;
use bzip2::read::MultiBzDecoder;
use bzip2::write::BzEncoder;
use std::io::{Read, Write};

pub struct Bzip2Compressor;

impl Compressor for Bzip2Compressor {
    fn compress(&self, src: &mut dyn Read, dst: &mut dyn Write) -> Result<u64> {
        let mut enc = BzEncoder::new(dst, Compression::best());
        let n = std::io::copy(src, &mut enc)?;
        enc.finish()?;
        Ok(n)
    }

    fn decoder<'a>(&self, src: Box<dyn Read + 'a>) -> Box<dyn Read + 'a> {
        Box::new(MultiBzDecoder::new(src))
    }
}
