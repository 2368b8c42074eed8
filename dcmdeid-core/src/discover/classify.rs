//! Cheap content sniffing for discovered files.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::codec::{CodecId, decompress_head};
use crate::dicom::read::has_magic;
use crate::error::Result;

/// Bytes inspected per file; covers the record magic and the tar header.
const HEAD_LEN: u64 = 512;
const TAR_MAGIC_OFFSET: usize = 257;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    /// Tar stream under an optional compression layer.
    Tar(CodecId),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FileKind {
    /// Imaging record, possibly compressed as a whole.
    Record { codec: CodecId },
    Archive(ArchiveKind),
    Unrecognized,
}

pub fn classify(path: &Path) -> Result<FileKind> {
    let mut raw = Vec::new();
    File::open(path)?.take(HEAD_LEN).read_to_end(&mut raw)?;

    let codec = CodecId::sniff(&raw);
    if codec == CodecId::Store {
        return Ok(sniff(&raw, CodecId::Store));
    }
    // Re-open so the decoder sees the whole stream, not just the raw head.
    let head = decompress_head(codec, File::open(path)?, HEAD_LEN)?;
    Ok(sniff(&head, codec))
}

/// Classify decompressed leading bytes.
pub fn sniff(head: &[u8], codec: CodecId) -> FileKind {
    if has_magic(head) {
        return FileKind::Record { codec };
    }
    if codec == CodecId::Store && (head.starts_with(b"PK\x03\x04") || head.starts_with(b"PK\x05\x06")) {
        return FileKind::Archive(ArchiveKind::Zip);
    }
    if head.len() >= TAR_MAGIC_OFFSET + 5 && &head[TAR_MAGIC_OFFSET..TAR_MAGIC_OFFSET + 5] == b"ustar" {
        return FileKind::Archive(ArchiveKind::Tar(codec));
    }
    FileKind::Unrecognized
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::compress_bytes;
    use crate::dicom::read::{MAGIC, PREAMBLE_LEN};
    use tempfile::tempdir;

    fn record_head() -> Vec<u8> {
        let mut head = vec![0u8; PREAMBLE_LEN];
        head.extend_from_slice(MAGIC);
        head.extend_from_slice(&[2, 0, 0, 0]);
        head
    }

    #[test]
    fn plain_and_compressed_records() {
        assert_eq!(
            sniff(&record_head(), CodecId::Store),
            FileKind::Record {
                codec: CodecId::Store
            }
        );
        let dir = tempdir().unwrap();
        let path = dir.path().join("x.dcm.gz");
        std::fs::write(&path, compress_bytes(CodecId::Gzip, &record_head()).unwrap()).unwrap();
        assert_eq!(
            classify(&path).unwrap(),
            FileKind::Record {
                codec: CodecId::Gzip
            }
        );
        let path = dir.path().join("x.dcm.bz2");
        std::fs::write(&path, compress_bytes(CodecId::Bzip2, &record_head()).unwrap()).unwrap();
        assert_eq!(
            classify(&path).unwrap(),
            FileKind::Record {
                codec: CodecId::Bzip2
            }
        );
    }

    #[test]
    fn containers_and_text() {
        assert_eq!(
            sniff(b"PK\x03\x04rest", CodecId::Store),
            FileKind::Archive(ArchiveKind::Zip)
        );
        let mut tar_head = vec![0u8; 512];
        tar_head[257..262].copy_from_slice(b"ustar");
        assert_eq!(
            sniff(&tar_head, CodecId::Xz),
            FileKind::Archive(ArchiveKind::Tar(CodecId::Xz))
        );
        assert_eq!(sniff(b"hello world", CodecId::Store), FileKind::Unrecognized);
        assert_eq!(sniff(b"", CodecId::Store), FileKind::Unrecognized);
    }
}
