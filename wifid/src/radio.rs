//! Radio driver interface.
//!
//! The driver runs scans, manages the station connection and applies role
//! settings. Scan completion is reported through a callback that may run on
//! any thread.

use std::net::Ipv4Addr;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::{ChangeFlags, WifiConfig};
use crate::error::RadioError;

/// Completion callback for [`Radio::start_scan`]. Called exactly once.
pub type ScanDone = Box<dyn FnOnce(Result<Vec<BssInfo>, RadioError>) + Send + 'static>;

/// Authentication scheme advertised by a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Open,
    Wep,
    WpaPsk,
    Wpa2Psk,
    WpaWpa2Psk,
    Other(u8),
}

impl AuthMode {
    /// Numeric code as reported by the driver.
    pub fn code(self) -> u8 {
        match self {
            AuthMode::Open => 0,
            AuthMode::Wep => 1,
            AuthMode::WpaPsk => 2,
            AuthMode::Wpa2Psk => 3,
            AuthMode::WpaWpa2Psk => 4,
            AuthMode::Other(code) => code,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AuthMode::Open => "Open",
            AuthMode::Wep => "WEP",
            AuthMode::WpaPsk => "WPA",
            AuthMode::Wpa2Psk => "WPA2",
            AuthMode::WpaWpa2Psk => "WPA/WPA2",
            AuthMode::Other(_) => "Unknown",
        }
    }
}

impl From<u8> for AuthMode {
    fn from(code: u8) -> Self {
        match code {
            0 => AuthMode::Open,
            1 => AuthMode::Wep,
            2 => AuthMode::WpaPsk,
            3 => AuthMode::Wpa2Psk,
            4 => AuthMode::WpaWpa2Psk,
            other => AuthMode::Other(other),
        }
    }
}

/// One network as reported by a driver scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BssInfo {
    /// Raw SSID bytes, possibly NUL padded.
    pub ssid: Vec<u8>,
    pub bssid: [u8; 6],
    pub channel: u8,
    pub rssi: i8,
    pub auth: AuthMode,
}

/// Station connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationStatus {
    Idle,
    Connecting,
    WrongPassword,
    NoApFound,
    ConnectFailed,
    GotIp,
    Unknown(i32),
}

/// The radio driver.
pub trait Radio: Send + Sync {
    /// Start a scan. `done` is called once when it finishes, possibly on another thread.
    ///
    /// If this returns an error `done` is never called.
    fn start_scan(&self, done: ScanDone) -> Result<(), RadioError>;

    fn station_status(&self) -> StationStatus;

    /// Signal level of the joined network in dBm.
    fn station_rssi(&self) -> i8;

    /// SSID of the joined network.
    fn station_ssid(&self) -> Option<String>;

    /// Address assigned to the station interface.
    fn station_ip(&self) -> Option<Ipv4Addr>;

    /// Push a configuration bundle to the running radio.
    fn apply_settings(&self, config: &WifiConfig, changes: ChangeFlags) -> Result<(), RadioError>;
}

#[derive(Debug)]
struct SimState {
    networks: Vec<BssInfo>,
    fail_next_scan: bool,
    scans_started: usize,
    applied: Vec<(WifiConfig, ChangeFlags)>,
    status: StationStatus,
    joined: Option<BssInfo>,
}

/// In-process radio used for development mode and tests.
///
/// Scans complete on a separate thread after a configurable delay. Applying a
/// configuration with station credentials joins the matching network when its
/// password requirement is met.
#[derive(Debug)]
pub struct SimulatedRadio {
    state: Mutex<SimState>,
    scan_delay: Duration,
}

/// Address handed to the simulated station on a successful join.
const SIM_STATION_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 100);

impl SimulatedRadio {
    pub fn new(networks: Vec<BssInfo>) -> Self {
        Self {
            state: Mutex::new(SimState {
                networks,
                fail_next_scan: false,
                scans_started: 0,
                applied: Vec::new(),
                status: StationStatus::Idle,
                joined: None,
            }),
            scan_delay: Duration::from_millis(500),
        }
    }

    pub fn with_scan_delay(mut self, delay: Duration) -> Self {
        self.scan_delay = delay;
        self
    }

    /// A handful of plausible neighbours.
    pub fn sample_networks() -> Vec<BssInfo> {
        vec![
            BssInfo {
                ssid: b"HomeNet".to_vec(),
                bssid: [0x24, 0x0a, 0xc4, 0x11, 0x22, 0x33],
                channel: 6,
                rssi: -48,
                auth: AuthMode::Wpa2Psk,
            },
            BssInfo {
                ssid: b"CoffeeShop".to_vec(),
                bssid: [0x5c, 0xcf, 0x7f, 0x01, 0x02, 0x03],
                channel: 11,
                rssi: -71,
                auth: AuthMode::Open,
            },
            BssInfo {
                ssid: b"Neighbour \"5G\"".to_vec(),
                bssid: [0xa0, 0x20, 0xa6, 0xde, 0xad, 0x01],
                channel: 1,
                rssi: -88,
                auth: AuthMode::WpaWpa2Psk,
            },
        ]
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next scan report a failure.
    pub fn fail_next_scan(&self) {
        self.lock().fail_next_scan = true;
    }

    pub fn scans_started(&self) -> usize {
        self.lock().scans_started
    }

    /// Every bundle pushed through `apply_settings`, oldest first.
    pub fn applied(&self) -> Vec<(WifiConfig, ChangeFlags)> {
        self.lock().applied.clone()
    }
}

impl Radio for SimulatedRadio {
    fn start_scan(&self, done: ScanDone) -> Result<(), RadioError> {
        let (result, delay) = {
            let mut state = self.lock();
            state.scans_started += 1;
            let result = if std::mem::take(&mut state.fail_next_scan) {
                Err(RadioError::ScanFailed("simulated failure".to_string()))
            } else {
                Ok(state.networks.clone())
            };
            (result, self.scan_delay)
        };

        debug!(delay_ms = delay.as_millis() as u64, "Simulated scan started");
        std::thread::Builder::new()
            .name("radio-scan".to_string())
            .spawn(move || {
                std::thread::sleep(delay);
                done(result);
            })
            .map_err(|e| RadioError::ScanFailed(e.to_string()))?;
        Ok(())
    }

    fn station_status(&self) -> StationStatus {
        self.lock().status
    }

    fn station_rssi(&self) -> i8 {
        self.lock().joined.as_ref().map_or(0, |bss| bss.rssi)
    }

    fn station_ssid(&self) -> Option<String> {
        self.lock()
            .joined
            .as_ref()
            .map(|bss| String::from_utf8_lossy(&bss.ssid).into_owned())
    }

    fn station_ip(&self) -> Option<Ipv4Addr> {
        let state = self.lock();
        (state.status == StationStatus::GotIp).then_some(SIM_STATION_IP)
    }

    fn apply_settings(&self, config: &WifiConfig, changes: ChangeFlags) -> Result<(), RadioError> {
        let mut state = self.lock();
        state.applied.push((config.clone(), changes));

        if !config.opmode.has_station() || config.sta_ssid.is_empty() {
            state.status = StationStatus::Idle;
            state.joined = None;
            return Ok(());
        }

        let target = state
            .networks
            .iter()
            .find(|bss| bss.ssid == config.sta_ssid.as_bytes())
            .cloned();

        let (status, joined) = match target {
            None => (StationStatus::NoApFound, None),
            Some(bss) if bss.auth != AuthMode::Open && config.sta_password.len() < 8 => {
                (StationStatus::WrongPassword, None)
            }
            Some(bss) => (StationStatus::GotIp, Some(bss)),
        };

        info!(
            ssid = %config.sta_ssid,
            status = ?status,
            "Simulated radio applied settings"
        );
        state.status = status;
        state.joined = joined;
        Ok(())
    }
}
