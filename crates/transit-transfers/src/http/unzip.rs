//! Zip extraction for compressed downloads.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use transit_core::transfer::TransferError;

/// Where the archive at `archive` is extracted to: a sibling named after the
/// archive with its extension removed.
pub fn extraction_dir(archive: &Path) -> PathBuf {
    let parent = archive.parent().unwrap_or_else(|| Path::new(""));
    let stem = archive
        .file_stem()
        .map_or_else(|| "download".into(), |s| s.to_string_lossy().into_owned());
    let dir = parent.join(&stem);
    if dir == archive {
        parent.join(format!("{stem}_extracted"))
    } else {
        dir
    }
}

/// Extract every entry of `archive` under `dest`, returning the file count.
///
/// Entries whose names would escape `dest` are skipped.
pub fn unzip(archive: &Path, dest: &Path) -> Result<usize, TransferError> {
    let file = File::open(archive).map_err(|e| TransferError::from_io_error(&e))?;
    let mut zip = zip::ZipArchive::new(file)
        .map_err(|e| TransferError::decompression(format!("Failed to read zip archive: {e}")))?;

    fs::create_dir_all(dest).map_err(|e| TransferError::from_io_error(&e))?;

    let mut extracted = 0;
    for i in 0..zip.len() {
        let mut entry = zip
            .by_index(i)
            .map_err(|e| TransferError::decompression(format!("Failed to read entry {i}: {e}")))?;

        let Some(relative) = entry.enclosed_name() else {
            tracing::warn!(entry = entry.name(), "Skipping zip entry outside the archive root");
            continue;
        };
        let out_path = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path).map_err(|e| TransferError::from_io_error(&e))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| TransferError::from_io_error(&e))?;
        }
        let mut out = File::create(&out_path).map_err(|e| TransferError::from_io_error(&e))?;
        io::copy(&mut entry, &mut out).map_err(|e| {
            TransferError::decompression(format!("Failed to extract {}: {e}", out_path.display()))
        })?;
        extracted += 1;
    }

    Ok(extracted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::write_zip;

    #[test]
    fn extraction_dir_strips_extension() {
        assert_eq!(
            extraction_dir(Path::new("/d/slides.zip")),
            PathBuf::from("/d/slides")
        );
        assert_eq!(
            extraction_dir(Path::new("/d/slides")),
            PathBuf::from("/d/slides_extracted")
        );
    }

    #[test]
    fn unzip_extracts_nested_entries() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("bundle.zip");
        write_zip(&archive, &[("a.txt", "alpha"), ("sub/b.txt", "beta")]).unwrap();

        let dest = extraction_dir(&archive);
        let count = unzip(&archive, &dest).unwrap();

        assert_eq!(count, 2);
        assert_eq!(fs::read(dest.join("a.txt")).unwrap(), b"alpha");
        assert_eq!(fs::read(dest.join("sub/b.txt")).unwrap(), b"beta");
    }

    #[test]
    fn unzip_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("bad.zip");
        fs::write(&archive, b"not a zip").unwrap();

        let err = unzip(&archive, &dir.path().join("bad")).unwrap_err();
        assert!(matches!(err, TransferError::Decompression { .. }));
    }
}
