//! Holder of the most recent scan results.
//!
//! Results are published as an immutable [`ScanSnapshot`] behind an
//! `ArcSwap`, gated by an in-progress flag. The completion path stores the new
//! snapshot first and clears the flag last (release), so a reader that sees
//! the flag clear (acquire) also sees the complete snapshot.

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::SSID_LEN;
use crate::radio::{AuthMode, BssInfo};

/// One discovered network. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRecord {
    pub ssid: String,
    pub bssid: [u8; 6],
    pub channel: u8,
    pub rssi: i8,
    pub auth: AuthMode,
}

impl ScanRecord {
    /// BSSID in `aa:bb:cc:dd:ee:ff` form.
    pub fn bssid_string(&self) -> String {
        let [a, b, c, d, e, f] = self.bssid;
        format!("{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{f:02x}")
    }
}

impl From<BssInfo> for ScanRecord {
    fn from(bss: BssInfo) -> Self {
        let raw = &bss.ssid[..bss.ssid.len().min(SSID_LEN)];
        let raw = match raw.iter().position(|&b| b == 0) {
            Some(nul) => &raw[..nul],
            None => raw,
        };
        Self {
            ssid: String::from_utf8_lossy(raw).into_owned(),
            bssid: bss.bssid,
            channel: bss.channel,
            rssi: bss.rssi,
            auth: bss.auth,
        }
    }
}

/// Results of one completed scan, in discovery order.
#[derive(Debug, Default)]
pub struct ScanSnapshot {
    records: Vec<ScanRecord>,
    completed_at: Option<DateTime<Utc>>,
}

impl ScanSnapshot {
    pub fn new(records: Vec<ScanRecord>) -> Self {
        Self {
            records,
            completed_at: Some(Utc::now()),
        }
    }

    pub fn records(&self) -> &[ScanRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// When the scan finished; `None` before the first successful scan.
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }
}

/// Scan result store shared between the scan callback and readers.
#[derive(Debug, Default)]
pub struct ScanStore {
    in_progress: AtomicBool,
    snapshot: ArcSwap<ScanSnapshot>,
}

impl ScanStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_progress(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// Latest completed results, or `None` while a scan is running.
    pub fn completed(&self) -> Option<Arc<ScanSnapshot>> {
        if self.in_progress() {
            None
        } else {
            Some(self.snapshot.load_full())
        }
    }

    /// Claim the store for a new scan. False if one is already running.
    pub(crate) fn try_begin(&self) -> bool {
        self.in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// End the running scan, installing `replacement` if there is one.
    pub(crate) fn finish(&self, replacement: Option<ScanSnapshot>) {
        if let Some(snapshot) = replacement {
            self.snapshot.store(Arc::new(snapshot));
        }
        self.in_progress.store(false, Ordering::Release);
    }
}
