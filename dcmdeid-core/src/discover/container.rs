//! Zip and tar extraction into scratch directories, and re-packing.

use std::fs::{self, File};
use std::io::{self, Cursor, Read, Write};
use std::path::{Component, Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::classify::ArchiveKind;
use crate::codec::compress_bytes;
use crate::error::{DeidError, Result};

/// Join a member path under `root`, rejecting absolute paths and `..`.
pub fn safe_join(root: &Path, rel: &str) -> Result<PathBuf> {
    let p = Path::new(rel);
    let safe = p
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !safe || rel.contains("..\\") {
        return Err(DeidError::UnsafePath(rel.to_string()));
    }
    Ok(root.join(p))
}

/// Unpack every regular file of the container into `dest`.
pub fn extract(archive: &Path, kind: ArchiveKind, dest: &Path) -> Result<()> {
    match kind {
        ArchiveKind::Zip => extract_zip(archive, dest),
        ArchiveKind::Tar(codec) => {
            let reader = codec.reader(Box::new(File::open(archive)?));
            extract_tar(reader, dest)
        }
    }
}

fn extract_zip(archive: &Path, dest: &Path) -> Result<()> {
    let mut zip = ZipArchive::new(File::open(archive)?)?;
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let out = safe_join(dest, entry.name())?;
        if entry.is_dir() {
            fs::create_dir_all(&out)?;
            continue;
        }
        if let Some(parent) = out.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut f = File::create(&out)?;
        io::copy(&mut entry, &mut f)?;
    }
    Ok(())
}

fn extract_tar(reader: impl Read, dest: &Path) -> Result<()> {
    let mut archive = tar::Archive::new(reader);
    for entry in archive.entries()? {
        let mut entry = entry?;
        let name = entry.path()?.to_string_lossy().into_owned();
        let out = safe_join(dest, &name)?;
        let kind = entry.header().entry_type();
        if kind.is_dir() {
            fs::create_dir_all(&out)?;
        } else if kind.is_file() {
            if let Some(parent) = out.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut f = File::create(&out)?;
            io::copy(&mut entry, &mut f)?;
        } else {
            debug!(member = %name, "skipping non-regular tar member");
        }
    }
    Ok(())
}

/// Regular files under `root`, sorted, with `/`-separated relative names.
fn members(root: &Path) -> Result<Vec<(PathBuf, String)>> {
    let mut out = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| DeidError::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(root)
            .map_err(|_| DeidError::format("member outside scratch directory"))?;
        let name = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        out.push((entry.path().to_path_buf(), name));
    }
    Ok(out)
}

/// Build a container of `kind` from the files under `src` and write it to `dest`.
pub fn repack(src: &Path, kind: ArchiveKind, dest: &Path) -> Result<()> {
    let files = members(src)?;
    let bytes = match kind {
        ArchiveKind::Zip => {
            let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
            let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
            for (path, name) in &files {
                zip.start_file(name.as_str(), options)?;
                zip.write_all(&fs::read(path)?)?;
            }
            zip.finish()?.into_inner()
        }
        ArchiveKind::Tar(codec) => {
            let mut builder = tar::Builder::new(Vec::new());
            builder.mode(tar::HeaderMode::Deterministic);
            for (path, name) in &files {
                builder.append_path_with_name(path, name)?;
            }
            let tar = builder.into_inner()?;
            compress_bytes(codec, &tar)?
        }
    };
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(dest, bytes)?;
    debug!(dest = %dest.display(), members = files.len(), "re-packed container");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CodecId;
    use tempfile::tempdir;

    #[test]
    fn safe_join_rejects_escapes() {
        let root = Path::new("/scratch");
        assert!(safe_join(root, "a/b.dcm").is_ok());
        assert!(safe_join(root, "./a").is_ok());
        assert!(matches!(
            safe_join(root, "../etc/passwd"),
            Err(DeidError::UnsafePath(_))
        ));
        assert!(safe_join(root, "a/../../x").is_err());
        assert!(safe_join(root, "/abs").is_err());
    }

    #[test]
    fn zip_repack_then_extract_preserves_members() {
        let src = tempdir().unwrap();
        fs::create_dir_all(src.path().join("sub")).unwrap();
        fs::write(src.path().join("a.dcm"), b"alpha").unwrap();
        fs::write(src.path().join("sub/b.dcm"), b"beta").unwrap();

        let work = tempdir().unwrap();
        let archive = work.path().join("out.zip");
        repack(src.path(), ArchiveKind::Zip, &archive).unwrap();

        let dest = tempdir().unwrap();
        extract(&archive, ArchiveKind::Zip, dest.path()).unwrap();
        assert_eq!(fs::read(dest.path().join("a.dcm")).unwrap(), b"alpha");
        assert_eq!(fs::read(dest.path().join("sub/b.dcm")).unwrap(), b"beta");
    }

    #[test]
    fn tar_gz_repack_keeps_compression() {
        let src = tempdir().unwrap();
        fs::write(src.path().join("a.dcm"), b"alpha").unwrap();
        let work = tempdir().unwrap();
        let archive = work.path().join("out.tar.gz");
        repack(src.path(), ArchiveKind::Tar(CodecId::Gzip), &archive).unwrap();
        assert_eq!(CodecId::sniff(&fs::read(&archive).unwrap()), CodecId::Gzip);

        let dest = tempdir().unwrap();
        extract(&archive, ArchiveKind::Tar(CodecId::Gzip), dest.path()).unwrap();
        assert_eq!(fs::read(dest.path().join("a.dcm")).unwrap(), b"alpha");
    }

    #[test]
    fn tar_bz2_round_trips_through_repack() {
        let src = tempdir().unwrap();
        fs::write(src.path().join("a.dcm"), b"alpha").unwrap();
        let work = tempdir().unwrap();
        let archive = work.path().join("out.tar.bz2");
        repack(src.path(), ArchiveKind::Tar(CodecId::Bzip2), &archive).unwrap();
        assert_eq!(CodecId::sniff(&fs::read(&archive).unwrap()), CodecId::Bzip2);

        let dest = tempdir().unwrap();
        extract(&archive, ArchiveKind::Tar(CodecId::Bzip2), dest.path()).unwrap();
        assert_eq!(fs::read(dest.path().join("a.dcm")).unwrap(), b"alpha");
    }

    #[test]
    fn zip_slip_member_is_rejected() {
        let work = tempdir().unwrap();
        let archive = work.path().join("evil.zip");
        let mut zip = ZipWriter::new(File::create(&archive).unwrap());
        zip.start_file("../escape.txt", FileOptions::default())
            .unwrap();
        zip.write_all(b"x").unwrap();
        zip.finish().unwrap();

        let dest = tempdir().unwrap();
        assert!(matches!(
            extract(&archive, ArchiveKind::Zip, dest.path()),
            Err(DeidError::UnsafePath(_))
        ));
    }
}
