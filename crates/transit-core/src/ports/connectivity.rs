//! Network connectivity oracle.

use std::sync::atomic::{AtomicBool, Ordering};

/// Answers "which networks are up right now".
#[cfg_attr(test, mockall::automock)]
pub trait ConnectivityPort: Send + Sync {
    /// Whether a wifi (or other unmetered) network is connected.
    fn is_wifi_up(&self) -> bool;

    /// Whether a mobile (metered) network is connected.
    fn is_mobile_up(&self) -> bool;

    /// Whether any data network is connected.
    fn is_data_up(&self) -> bool {
        self.is_wifi_up() || self.is_mobile_up()
    }
}

/// Connectivity that reports whatever it was last told.
///
/// Used by the CLI (always on wifi) and by tests that flip networks on and off.
#[derive(Debug)]
pub struct FixedConnectivity {
    wifi: AtomicBool,
    mobile: AtomicBool,
}

impl FixedConnectivity {
    /// Create with the given network states.
    #[must_use]
    pub const fn new(wifi: bool, mobile: bool) -> Self {
        Self {
            wifi: AtomicBool::new(wifi),
            mobile: AtomicBool::new(mobile),
        }
    }

    /// Wifi up, mobile down.
    #[must_use]
    pub const fn wifi() -> Self {
        Self::new(true, false)
    }

    /// Set the wifi state.
    pub fn set_wifi(&self, up: bool) {
        self.wifi.store(up, Ordering::SeqCst);
    }

    /// Set the mobile state.
    pub fn set_mobile(&self, up: bool) {
        self.mobile.store(up, Ordering::SeqCst);
    }
}

impl Default for FixedConnectivity {
    fn default() -> Self {
        Self::wifi()
    }
}

impl ConnectivityPort for FixedConnectivity {
    fn is_wifi_up(&self) -> bool {
        self.wifi.load(Ordering::SeqCst)
    }

    fn is_mobile_up(&self) -> bool {
        self.mobile.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_connectivity_flips() {
        let conn = FixedConnectivity::wifi();
        assert!(conn.is_data_up());
        conn.set_wifi(false);
        assert!(!conn.is_data_up());
        conn.set_mobile(true);
        assert!(conn.is_data_up());
        assert!(!conn.is_wifi_up());
    }

    #[test]
    fn mocked_connectivity_answers_expectations() {
        let mut mock = MockConnectivityPort::new();
        mock.expect_is_wifi_up().return_const(false);
        mock.expect_is_mobile_up().return_const(true);
        mock.expect_is_data_up().return_const(true);
        assert!(mock.is_data_up());
        assert!(mock.is_mobile_up());
    }
}
