//! Pushes engine tunables to the BitTorrent engine as soon as they change.

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};

use transit_core::ports::{SettingsStorePort, TorrentEnginePort};
use transit_core::settings::SettingKey;

const LOG_TARGET: &str = "transit.transfers";

/// Forward every changed tunable to `engine` until the settings store closes.
///
/// The receiver is taken by the caller before spawning, so no change made
/// after `TransferManager::start` returns is missed.
pub(crate) async fn forward_settings(
    mut changes: broadcast::Receiver<SettingKey>,
    settings: Arc<dyn SettingsStorePort>,
    engine: Arc<dyn TorrentEnginePort>,
) {
    loop {
        match changes.recv().await {
            Ok(key) => apply(key, settings.as_ref(), engine.as_ref()),
            Err(RecvError::Lagged(missed)) => {
                tracing::warn!(target: LOG_TARGET, missed, "Settings changes lagged, re-applying all tunables");
                for key in SettingKey::ALL {
                    apply(key, settings.as_ref(), engine.as_ref());
                }
            }
            Err(RecvError::Closed) => break,
        }
    }
    tracing::debug!(target: LOG_TARGET, "Settings forwarder stopped");
}

fn apply(key: SettingKey, settings: &dyn SettingsStorePort, engine: &dyn TorrentEnginePort) {
    let Some(setting) = key.engine_setting() else {
        return;
    };
    let value = settings.get_i64(key);
    tracing::debug!(target: LOG_TARGET, key = key.as_str(), value, "Applying engine setting");
    engine.set_setting(setting, value);
}
