//! WiFi configuration bundle and the live holder it is swapped through.
//!
//! The live bundle is a single `ArcSwap<WifiConfig>`. Readers take a cheap
//! snapshot with [`ConfigState::current`]; writers go through a
//! [`ConfigTransaction`](transaction::ConfigTransaction), which stages changes
//! on a private draft and installs it in one swap on commit.

pub mod persist;
pub mod transaction;
pub mod validation;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::info;

pub use persist::{ConfigPersist, JsonFileStore, MemoryStore};
pub use transaction::{Committed, ConfigTransaction, Field};

/// Maximum SSID length in bytes.
pub const SSID_LEN: usize = 32;

/// Maximum password buffer length in bytes.
pub const PASSWORD_LEN: usize = 64;

/// Radio operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpMode {
    Disabled,
    Client,
    SoftAp,
    ClientAp,
}

impl OpMode {
    /// Numeric code as used on the wire (0-3).
    pub fn code(self) -> u8 {
        match self {
            OpMode::Disabled => 0,
            OpMode::Client => 1,
            OpMode::SoftAp => 2,
            OpMode::ClientAp => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(OpMode::Disabled),
            1 => Some(OpMode::Client),
            2 => Some(OpMode::SoftAp),
            3 => Some(OpMode::ClientAp),
            _ => None,
        }
    }

    fn from_roles(station: bool, ap: bool) -> Self {
        match (station, ap) {
            (false, false) => OpMode::Disabled,
            (true, false) => OpMode::Client,
            (false, true) => OpMode::SoftAp,
            (true, true) => OpMode::ClientAp,
        }
    }

    pub fn has_station(self) -> bool {
        matches!(self, OpMode::Client | OpMode::ClientAp)
    }

    pub fn has_ap(self) -> bool {
        matches!(self, OpMode::SoftAp | OpMode::ClientAp)
    }

    /// Same mode with the station role switched on or off.
    pub fn with_station(self, enabled: bool) -> Self {
        Self::from_roles(enabled, self.has_ap())
    }

    /// Same mode with the access point role switched on or off.
    pub fn with_ap(self, enabled: bool) -> Self {
        Self::from_roles(self.has_station(), enabled)
    }

    /// Human readable name.
    pub fn name(self) -> &'static str {
        match self {
            OpMode::Disabled => "Disabled",
            OpMode::Client => "Client",
            OpMode::SoftAp => "AP only",
            OpMode::ClientAp => "Client+AP",
        }
    }
}

/// The full set of WiFi settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiConfig {
    pub opmode: OpMode,
    /// Transmit power, 0-82 (quarter dBm steps).
    pub tpw: u8,
    pub ap_channel: u8,
    pub ap_ssid: String,
    pub ap_password: String,
    pub ap_hidden: bool,
    pub sta_ssid: String,
    pub sta_password: String,
}

impl Default for WifiConfig {
    fn default() -> Self {
        Self {
            opmode: OpMode::ClientAp,
            tpw: 60,
            ap_channel: 1,
            ap_ssid: "wifid-setup".to_string(),
            ap_password: String::new(),
            ap_hidden: false,
            sta_ssid: String::new(),
            sta_password: String::new(),
        }
    }
}

/// Subsystems that need a reload because one of their fields changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeFlags {
    pub ap: bool,
    pub sta: bool,
}

impl ChangeFlags {
    pub fn any(self) -> bool {
        self.ap || self.sta
    }

    pub fn merge(self, other: ChangeFlags) -> ChangeFlags {
        ChangeFlags {
            ap: self.ap || other.ap,
            sta: self.sta || other.sta,
        }
    }
}

/// Process-wide owner of the live configuration bundle.
pub struct ConfigState {
    current: ArcSwap<WifiConfig>,
    /// Changes committed but not yet applied to the radio.
    changes: Mutex<ChangeFlags>,
    /// Serializes writers; readers never take it.
    writer: Mutex<()>,
    persist: Arc<dyn ConfigPersist>,
}

impl ConfigState {
    pub fn new(initial: WifiConfig, persist: Arc<dyn ConfigPersist>) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial),
            changes: Mutex::new(ChangeFlags::default()),
            writer: Mutex::new(()),
            persist,
        }
    }

    /// Load the persisted bundle, falling back to defaults.
    pub fn load(persist: Arc<dyn ConfigPersist>) -> Result<Self, crate::error::PersistError> {
        let initial = match persist.load()? {
            Some(config) => config,
            None => {
                info!("No stored WiFi configuration, using defaults");
                WifiConfig::default()
            }
        };
        Ok(Self::new(initial, persist))
    }

    /// Snapshot of the live bundle.
    pub fn current(&self) -> Arc<WifiConfig> {
        self.current.load_full()
    }

    /// Change flags accumulated since the last apply.
    pub fn pending_changes(&self) -> ChangeFlags {
        *self.changes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take and clear the accumulated change flags.
    pub fn take_changes(&self) -> ChangeFlags {
        std::mem::take(&mut *self.changes.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Start a configuration transaction.
    ///
    /// Writers are serialized: a second `begin` blocks until the first
    /// transaction is committed or dropped.
    pub fn begin(&self) -> ConfigTransaction<'_> {
        ConfigTransaction::new(self, self.lock_writer())
    }

    /// Switch the station role on without persisting it.
    ///
    /// Returns the new bundle if the mode changed.
    pub fn force_station(&self) -> Option<Arc<WifiConfig>> {
        let _guard = self.lock_writer();
        let current = self.current.load_full();
        if current.opmode.has_station() {
            return None;
        }
        let mut next = (*current).clone();
        next.opmode = next.opmode.with_station(true);
        let next = Arc::new(next);
        self.current.store(Arc::clone(&next));
        Some(next)
    }

    pub(crate) fn persist(&self) -> &dyn ConfigPersist {
        self.persist.as_ref()
    }

    /// Install a committed bundle. The caller must hold the writer lock.
    pub(crate) fn install(&self, config: Arc<WifiConfig>, changes: ChangeFlags) {
        let mut pending = self.changes.lock().unwrap_or_else(PoisonError::into_inner);
        *pending = pending.merge(changes);
        self.current.store(config);
    }

    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> ConfigState {
        ConfigState::new(WifiConfig::default(), Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_opmode_roles() {
        assert!(OpMode::ClientAp.has_station());
        assert!(OpMode::ClientAp.has_ap());
        assert!(!OpMode::SoftAp.has_station());
        assert_eq!(OpMode::SoftAp.with_station(true), OpMode::ClientAp);
        assert_eq!(OpMode::Client.with_station(false), OpMode::Disabled);
        assert_eq!(OpMode::Client.with_ap(true), OpMode::ClientAp);
        assert_eq!(OpMode::ClientAp.with_ap(false), OpMode::Client);
    }

    #[test]
    fn test_opmode_codes() {
        for mode in [
            OpMode::Disabled,
            OpMode::Client,
            OpMode::SoftAp,
            OpMode::ClientAp,
        ] {
            assert_eq!(OpMode::from_code(mode.code() as i64), Some(mode));
        }
        assert_eq!(OpMode::from_code(4), None);
        assert_eq!(OpMode::SoftAp.name(), "AP only");
    }

    #[test]
    fn test_force_station() {
        let state = state();
        assert!(state.force_station().is_none());

        let mut tx = state.begin();
        tx.propose(Field::OpMode, "2");
        tx.commit().unwrap();
        assert_eq!(state.current().opmode, OpMode::SoftAp);

        let forced = state.force_station().unwrap();
        assert_eq!(forced.opmode, OpMode::ClientAp);
        assert_eq!(state.current().opmode, OpMode::ClientAp);
    }

    #[test]
    fn test_take_changes_clears() {
        let state = state();
        let mut tx = state.begin();
        tx.propose(Field::ApChannel, "6");
        tx.commit().unwrap();

        assert_eq!(state.pending_changes(), ChangeFlags { ap: true, sta: false });
        assert!(state.take_changes().ap);
        assert!(!state.pending_changes().any());
    }
}
