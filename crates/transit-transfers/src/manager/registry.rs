//! The three transfer collections and the pending-review counter.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use indexmap::IndexMap;

use transit_core::ports::TransferEventEmitterPort;
use transit_core::transfer::{TransferEvent, TransferId};

use crate::transfer::Transfer;

/// Which collection a transfer lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Collection {
    /// HTTP-family downloads, peer downloads included.
    Downloads,
    /// Peer uploads.
    Uploads,
    /// Engine torrents and `.torrent` fetchers.
    Bittorrent,
}

type Entries = IndexMap<TransferId, Transfer>;

/// Insertion-ordered collections keyed by transfer identity.
///
/// Readers clone the entries under a short read lock and iterate the copy,
/// so transfers may unregister themselves while a bulk operation runs.
pub(crate) struct Registry {
    downloads: RwLock<Entries>,
    uploads: RwLock<Entries>,
    bittorrent: RwLock<Entries>,
    /// Makes HTTP de-dup check-then-add atomic.
    dedup: Mutex<()>,
    downloads_to_review: AtomicU32,
    emitter: Arc<dyn TransferEventEmitterPort>,
}

impl Registry {
    pub fn new(emitter: Arc<dyn TransferEventEmitterPort>) -> Self {
        Self {
            downloads: RwLock::default(),
            uploads: RwLock::default(),
            bittorrent: RwLock::default(),
            dedup: Mutex::new(()),
            downloads_to_review: AtomicU32::new(0),
            emitter,
        }
    }

    const fn collection(&self, collection: Collection) -> &RwLock<Entries> {
        match collection {
            Collection::Downloads => &self.downloads,
            Collection::Uploads => &self.uploads,
            Collection::Bittorrent => &self.bittorrent,
        }
    }

    fn read(&self, collection: Collection) -> RwLockReadGuard<'_, Entries> {
        self.collection(collection)
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self, collection: Collection) -> RwLockWriteGuard<'_, Entries> {
        self.collection(collection)
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `transfer`, replacing any finished entry with the same id.
    pub fn insert(&self, transfer: Transfer) {
        let id = transfer.id();
        let replaced = {
            let mut entries = self.write(transfer.collection());
            let replaced = entries.shift_remove(&id);
            entries.insert(id.clone(), transfer.clone());
            replaced
        };

        if replaced.is_some() {
            self.emitter.emit(TransferEvent::Removed { id: id.clone() });
        }
        self.emitter.emit(TransferEvent::Added {
            id,
            kind: transfer.kind(),
            display_name: transfer.display_name(),
        });
    }

    /// Drop `id` from `collection` if the entry is still `owner`.
    ///
    /// A replaced transfer that unregisters late must not evict its successor.
    pub fn unregister(&self, collection: Collection, id: &TransferId, owner: *const ()) {
        let removed = {
            let mut entries = self.write(collection);
            match entries.get(id) {
                Some(entry) if std::ptr::eq(entry.addr(), owner) => entries.shift_remove(id),
                _ => None,
            }
        };
        if removed.is_some() {
            tracing::debug!(target: "transit.transfers", id = %id, "Transfer unregistered");
            self.emitter.emit(TransferEvent::Removed { id: id.clone() });
        }
    }

    pub fn snapshot(&self, collection: Collection) -> Vec<Transfer> {
        self.read(collection).values().cloned().collect()
    }

    /// Every transfer: HTTP downloads, then uploads, then torrents.
    pub fn all(&self) -> Vec<Transfer> {
        let mut all = self.snapshot(Collection::Downloads);
        all.extend(self.snapshot(Collection::Uploads));
        all.extend(self.snapshot(Collection::Bittorrent));
        all
    }

    pub fn get(&self, id: &TransferId) -> Option<Transfer> {
        [
            Collection::Downloads,
            Collection::Uploads,
            Collection::Bittorrent,
        ]
        .into_iter()
        .find_map(|collection| self.read(collection).get(id).cloned())
    }

    pub fn get_in(&self, collection: Collection, id: &TransferId) -> Option<Transfer> {
        self.read(collection).get(id).cloned()
    }

    pub fn contains(&self, collection: Collection, id: &TransferId) -> bool {
        self.read(collection).contains_key(id)
    }

    /// Hold while checking for and registering an HTTP download.
    pub fn lock_dedup(&self) -> MutexGuard<'_, ()> {
        self.dedup.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Forget every torrent without touching the engine.
    pub fn clear_bittorrent(&self) {
        let drained: Vec<TransferId> = self
            .write(Collection::Bittorrent)
            .drain(..)
            .map(|(id, _)| id)
            .collect();
        for id in drained {
            self.emitter.emit(TransferEvent::Removed { id });
        }
    }

    pub fn downloads_to_review(&self) -> u32 {
        self.downloads_to_review.load(Ordering::SeqCst)
    }

    pub fn increment_downloads_to_review(&self) {
        let count = self.downloads_to_review.fetch_add(1, Ordering::SeqCst) + 1;
        self.emitter.emit(TransferEvent::ReviewCountChanged { count });
    }

    pub fn clear_downloads_to_review(&self) {
        if self.downloads_to_review.swap(0, Ordering::SeqCst) != 0 {
            self.emitter.emit(TransferEvent::ReviewCountChanged { count: 0 });
        }
    }
}
