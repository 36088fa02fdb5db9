//! Reactions to the device joining or leaving a network.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use transit_core::settings::SettingKey;

use super::TransferManager;

const LOG_TARGET: &str = "transit.transfers";

/// Stops and restarts transfers as data connectivity comes and goes.
///
/// Edge-triggered: only a change in "any data network up" since the last
/// call does anything.
pub struct ConnectivityMonitor {
    manager: Arc<TransferManager>,
    connected: AtomicBool,
}

impl ConnectivityMonitor {
    /// Start from the network state the manager's connectivity port reports now.
    pub fn new(manager: Arc<TransferManager>) -> Self {
        let connected = manager.ctx.connectivity.is_data_up();
        Self {
            manager,
            connected: AtomicBool::new(connected),
        }
    }

    /// Whether the last observed state was connected.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Re-read connectivity and react if it changed.
    pub fn on_connectivity_changed(&self) {
        let up = self.manager.ctx.connectivity.is_data_up();
        if self.connected.swap(up, Ordering::SeqCst) == up {
            return;
        }
        if up {
            self.handle_connected();
        } else {
            self.handle_disconnected();
        }
    }

    fn handle_disconnected(&self) {
        tracing::info!(target: LOG_TARGET, "Disconnected from network");
        self.manager.stop_http_transfers();
        self.manager.pause_torrents();
    }

    fn handle_connected(&self) {
        let ctx = &self.manager.ctx;
        let mobile_only = ctx.connectivity.is_mobile_up() && !ctx.connectivity.is_wifi_up();

        if mobile_only && !ctx.settings.get_bool(SettingKey::UseMobileData) {
            tracing::info!(target: LOG_TARGET, "Connected to mobile data only, torrents stay paused");
            self.manager.pause_torrents();
            return;
        }

        tracing::info!(target: LOG_TARGET, wifi = ctx.connectivity.is_wifi_up(), "Connected to network");
        self.manager.resume_resumable_transfers();
        if !ctx.seeding_allowed() {
            self.manager.stop_seeding_torrents();
        }
    }
}

impl std::fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectivityMonitor")
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}
