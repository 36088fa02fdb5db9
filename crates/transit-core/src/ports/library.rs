//! Media library indexer port.

use std::path::Path;

/// Makes finished downloads visible to the media library.
///
/// Scans are fire-and-forget: implementations queue the work and return
/// immediately.
#[cfg_attr(test, mockall::automock)]
pub trait LibraryIndexerPort: Send + Sync {
    /// Index `path` (a file or a directory tree).
    fn scan(&self, path: &Path);
}

/// Indexer that ignores every scan request.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLibraryIndexer;

impl LibraryIndexerPort for NoopLibraryIndexer {
    fn scan(&self, path: &Path) {
        tracing::trace!(path = %path.display(), "library scan skipped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Arc;

    #[test]
    fn indexer_is_object_safe() {
        let mut mock = MockLibraryIndexerPort::new();
        mock.expect_scan()
            .withf(|p| p == Path::new("/music/song.mp3"))
            .times(1)
            .return_const(());

        let indexer: Arc<dyn LibraryIndexerPort> = Arc::new(mock);
        indexer.scan(&PathBuf::from("/music/song.mp3"));
    }
}
