//! What every transfer needs from its surroundings.

use std::path::Path;
use std::sync::{Arc, Weak};

use tokio::runtime::Handle;

use transit_core::ports::{
    ConnectivityPort, FetchPort, LibraryIndexerPort, SettingsStorePort, TorrentEnginePort,
    TransferEventEmitterPort,
};
use transit_core::settings::SettingKey;
use transit_core::transfer::{TransferEvent, TransferId};

use crate::config::TransferManagerConfig;
use crate::manager::registry::{Collection, Registry};

/// Collaborators and a registry handle shared by the manager and its transfers.
///
/// The registry is held weakly: transfers live inside it, and dropping the
/// manager must tear everything down.
#[derive(Clone)]
pub(crate) struct TransferContext {
    pub fetcher: Arc<dyn FetchPort>,
    pub engine: Arc<dyn TorrentEnginePort>,
    pub indexer: Arc<dyn LibraryIndexerPort>,
    pub connectivity: Arc<dyn ConnectivityPort>,
    pub settings: Arc<dyn SettingsStorePort>,
    pub emitter: Arc<dyn TransferEventEmitterPort>,
    pub config: Arc<TransferManagerConfig>,
    pub runtime: Handle,
    pub registry: Weak<Registry>,
}

impl TransferContext {
    /// Remove `owner` from `collection`, if it is still the entry under `id`.
    pub fn unregister(&self, collection: Collection, id: &TransferId, owner: *const ()) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unregister(collection, id, owner);
        }
    }

    pub fn increment_downloads_to_review(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.increment_downloads_to_review();
        }
    }

    /// Announce a finished download and hand its data to the library.
    pub fn notify_download_finished(&self, display_name: &str, path: &Path) {
        self.emitter.emit(TransferEvent::DownloadFinished {
            display_name: display_name.to_string(),
            path: path.to_path_buf(),
        });
        self.indexer.scan(path);
    }

    /// Whether finished torrents should keep seeding on the current network.
    pub fn seeding_allowed(&self) -> bool {
        let seed = self.settings.get_bool(SettingKey::SeedFinishedTorrents);
        let wifi_only = self.settings.get_bool(SettingKey::SeedFinishedTorrentsWifiOnly);
        seed && (!wifi_only || self.connectivity.is_wifi_up())
    }

    /// Mobile network up and BitTorrent over mobile data disallowed.
    pub fn mobile_data_savings_on(&self) -> bool {
        self.connectivity.is_mobile_up() && !self.settings.get_bool(SettingKey::UseMobileData)
    }
}
