//! Disk cleanup after the engine drops a torrent.

use std::fs;
use std::path::{Path, PathBuf};

/// Delete the files the engine never completed, then prune empty directories
/// under `save_path`.
pub fn final_cleanup(incomplete_files: &[PathBuf], save_path: &Path) {
    for file in incomplete_files {
        match fs::remove_file(file) {
            Ok(()) => tracing::debug!(path = %file.display(), "Deleted incomplete file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %file.display(), error = %e, "Can't delete incomplete file");
            }
        }
    }
    delete_empty_dirs(save_path);
}

/// Recursively delete `dir` if it (transitively) contains only directories.
///
/// Only entries whose canonical path lies under `dir`'s canonical path are
/// descended into, so symlinks never lead the walk elsewhere. Returns whether
/// `dir` itself was deleted.
pub fn delete_empty_dirs(dir: &Path) -> bool {
    let Ok(canonical_parent) = dir.canonicalize() else {
        return false;
    };
    if !dir.is_dir() {
        return false;
    }
    let Ok(entries) = fs::read_dir(dir) else {
        return false;
    };

    let mut can_delete = true;
    for entry in entries {
        let Ok(entry) = entry else {
            can_delete = false;
            continue;
        };
        let path = entry.path();
        match path.canonicalize() {
            Ok(canonical) if !canonical.starts_with(&canonical_parent) => continue,
            Ok(_) => {}
            Err(_) => can_delete = false,
        }
        if !delete_empty_dirs(&path) {
            can_delete = false;
        }
    }

    can_delete && fs::remove_dir(dir).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prunes_nested_empty_directories() {
        let root = tempfile::tempdir().unwrap();
        let save = root.path().join("torrent");
        fs::create_dir_all(save.join("a/b")).unwrap();
        fs::create_dir_all(save.join("c")).unwrap();

        assert!(delete_empty_dirs(&save));
        assert!(!save.exists());
    }

    #[test]
    fn keeps_directories_with_files() {
        let root = tempfile::tempdir().unwrap();
        let save = root.path().join("torrent");
        fs::create_dir_all(save.join("empty")).unwrap();
        fs::create_dir_all(save.join("full")).unwrap();
        fs::write(save.join("full/track.mp3"), b"x").unwrap();

        assert!(!delete_empty_dirs(&save));
        assert!(!save.join("empty").exists());
        assert!(save.join("full/track.mp3").exists());
    }

    #[test]
    fn final_cleanup_removes_incomplete_files_first() {
        let root = tempfile::tempdir().unwrap();
        let save = root.path().join("torrent");
        fs::create_dir_all(save.join("disc1")).unwrap();
        let part = save.join("disc1/01.flac");
        fs::write(&part, b"partial").unwrap();

        final_cleanup(&[part.clone(), save.join("missing.bin")], &save);

        assert!(!part.exists());
        assert!(!save.exists());
    }

    #[cfg(unix)]
    #[test]
    fn does_not_follow_symlinks_out_of_save_path() {
        let root = tempfile::tempdir().unwrap();
        let outside = root.path().join("outside");
        fs::create_dir_all(outside.join("keep")).unwrap();
        let save = root.path().join("torrent");
        fs::create_dir_all(&save).unwrap();
        std::os::unix::fs::symlink(&outside, save.join("link")).unwrap();

        delete_empty_dirs(&save);

        assert!(outside.join("keep").exists());
    }
}
