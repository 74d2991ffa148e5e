//! Scan triggering and completion handling.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::store::{ScanRecord, ScanSnapshot, ScanStore};
use crate::config::{ChangeFlags, ConfigState};
use crate::error::RadioError;
use crate::radio::{BssInfo, Radio};

/// Keeps at most one scan in flight and publishes its results.
#[derive(Clone)]
pub struct ScanOrchestrator {
    store: Arc<ScanStore>,
    radio: Arc<dyn Radio>,
    config: Arc<ConfigState>,
}

impl ScanOrchestrator {
    pub fn new(store: Arc<ScanStore>, radio: Arc<dyn Radio>, config: Arc<ConfigState>) -> Self {
        Self {
            store,
            radio,
            config,
        }
    }

    pub fn store(&self) -> &Arc<ScanStore> {
        &self.store
    }

    /// Start a scan unless one is already running.
    ///
    /// Scanning needs the station role, so it is switched on (and applied,
    /// not persisted) first if the current mode lacks it.
    pub fn request_scan(&self) {
        if !self.store.try_begin() {
            debug!("Scan already in progress");
            return;
        }

        if let Some(config) = self.config.force_station() {
            info!(opmode = config.opmode.name(), "Enabling station role for scan");
            if let Err(e) = self.radio.apply_settings(&config, ChangeFlags::default()) {
                warn!(error = %e, "Failed to apply station role");
            }
        }

        let this = self.clone();
        let done = Box::new(move |result: Result<Vec<BssInfo>, RadioError>| {
            this.on_scan_complete(result);
        });
        if let Err(e) = self.radio.start_scan(done) {
            error!(error = %e, "Failed to start scan");
            self.store.finish(None);
        }
    }

    /// Publish the results of a finished scan.
    ///
    /// The list is walked once to count it and once to copy it. On failure,
    /// or if storage for the copy cannot be reserved, the previous results
    /// stay in place. The in-progress flag is always cleared.
    pub fn on_scan_complete<I>(&self, result: Result<I, RadioError>)
    where
        I: IntoIterator<Item = BssInfo>,
        I::IntoIter: Clone,
    {
        let list = match result {
            Ok(list) => list.into_iter(),
            Err(e) => {
                warn!(error = %e, "Scan failed, keeping previous results");
                self.store.finish(None);
                return;
            }
        };

        let count = list.clone().count();
        let mut records: Vec<ScanRecord> = Vec::new();
        if let Err(e) = records.try_reserve_exact(count) {
            error!(count, error = %e, "Out of memory allocating scan results");
            self.store.finish(None);
            return;
        }

        for bss in list {
            if records.len() >= count {
                error!(count, "Scan list grew while copying, truncating");
                break;
            }
            records.push(ScanRecord::from(bss));
        }

        info!(count = records.len(), "Scan done");
        self.store.finish(Some(ScanSnapshot::new(records)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MemoryStore, OpMode, WifiConfig};
    use crate::radio::{AuthMode, SimulatedRadio};
    use std::time::{Duration, Instant};

    fn bss(n: u8) -> BssInfo {
        BssInfo {
            ssid: format!("net-{n}").into_bytes(),
            bssid: [0, 0, 0, 0, 0, n],
            channel: n % 14 + 1,
            rssi: -40 - n as i8,
            auth: AuthMode::Wpa2Psk,
        }
    }

    fn orchestrator(radio: Arc<SimulatedRadio>, opmode: OpMode) -> ScanOrchestrator {
        let config = ConfigState::new(
            WifiConfig {
                opmode,
                ..Default::default()
            },
            Arc::new(MemoryStore::new()),
        );
        ScanOrchestrator::new(Arc::new(ScanStore::new()), radio, Arc::new(config))
    }

    fn wait_idle(store: &ScanStore) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while store.in_progress() {
            assert!(Instant::now() < deadline, "scan did not complete");
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    /// Reports one element fewer to the counting pass than to the copy pass.
    #[derive(Debug)]
    struct Growing {
        items: Vec<BssInfo>,
        pos: usize,
    }

    impl Clone for Growing {
        fn clone(&self) -> Self {
            Self {
                items: self.items[..self.items.len() - 1].to_vec(),
                pos: self.pos,
            }
        }
    }

    impl Iterator for Growing {
        type Item = BssInfo;

        fn next(&mut self) -> Option<BssInfo> {
            let item = self.items.get(self.pos).cloned();
            self.pos += 1;
            item
        }
    }

    /// Claims a length no allocator can satisfy.
    #[derive(Debug, Clone)]
    struct Inflated;

    impl Iterator for Inflated {
        type Item = BssInfo;

        fn next(&mut self) -> Option<BssInfo> {
            None
        }

        fn count(self) -> usize {
            usize::MAX / 2
        }
    }

    #[test]
    fn test_count_preserved() {
        let radio = Arc::new(SimulatedRadio::new(vec![]));
        let orch = orchestrator(radio, OpMode::ClientAp);

        for n in [0usize, 1, 7] {
            assert!(orch.store().try_begin());
            orch.on_scan_complete(Ok((0..n as u8).map(bss).collect::<Vec<_>>()));
            assert!(!orch.store().in_progress());
            let snapshot = orch.store().completed().unwrap();
            assert_eq!(snapshot.len(), n);
            if n > 0 {
                assert_eq!(snapshot.records()[n - 1].ssid, format!("net-{}", n - 1));
            }
        }
    }

    #[test]
    fn test_failure_keeps_stale_results() {
        let radio = Arc::new(SimulatedRadio::new(vec![]));
        let orch = orchestrator(radio, OpMode::ClientAp);

        assert!(orch.store().try_begin());
        orch.on_scan_complete(Ok(vec![bss(1), bss(2)]));

        assert!(orch.store().try_begin());
        orch.on_scan_complete::<Vec<BssInfo>>(Err(RadioError::ScanFailed("boom".to_string())));

        assert!(!orch.store().in_progress());
        assert_eq!(orch.store().completed().unwrap().len(), 2);
    }

    #[test]
    fn test_grown_list_is_truncated() {
        let radio = Arc::new(SimulatedRadio::new(vec![]));
        let orch = orchestrator(radio, OpMode::ClientAp);

        assert!(orch.store().try_begin());
        orch.on_scan_complete(Ok(Growing {
            items: vec![bss(1), bss(2), bss(3)],
            pos: 0,
        }));

        let snapshot = orch.store().completed().unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.records()[1].ssid, "net-2");
    }

    #[test]
    fn test_allocation_failure_keeps_previous() {
        let radio = Arc::new(SimulatedRadio::new(vec![]));
        let orch = orchestrator(radio, OpMode::ClientAp);

        assert!(orch.store().try_begin());
        orch.on_scan_complete(Ok(vec![bss(1)]));

        assert!(orch.store().try_begin());
        orch.on_scan_complete(Ok(Inflated));

        assert!(!orch.store().in_progress());
        assert_eq!(orch.store().completed().unwrap().len(), 1);
    }

    #[test]
    fn test_request_scan_is_idempotent() {
        let radio = Arc::new(
            SimulatedRadio::new(vec![bss(1)]).with_scan_delay(Duration::from_millis(100)),
        );
        let orch = orchestrator(radio.clone(), OpMode::ClientAp);

        orch.request_scan();
        orch.request_scan();
        assert!(orch.store().in_progress());
        assert_eq!(radio.scans_started(), 1);

        wait_idle(orch.store());
        assert_eq!(orch.store().completed().unwrap().len(), 1);

        orch.request_scan();
        assert_eq!(radio.scans_started(), 2);
        wait_idle(orch.store());
    }

    #[test]
    fn test_failed_scan_is_retriable() {
        let radio = Arc::new(SimulatedRadio::new(vec![bss(1)]).with_scan_delay(Duration::ZERO));
        let orch = orchestrator(radio.clone(), OpMode::ClientAp);

        radio.fail_next_scan();
        orch.request_scan();
        wait_idle(orch.store());
        assert!(orch.store().completed().unwrap().is_empty());

        orch.request_scan();
        wait_idle(orch.store());
        assert_eq!(orch.store().completed().unwrap().len(), 1);
    }

    #[test]
    fn test_request_scan_enables_station() {
        let radio = Arc::new(SimulatedRadio::new(vec![]).with_scan_delay(Duration::ZERO));
        let orch = orchestrator(radio.clone(), OpMode::SoftAp);

        orch.request_scan();
        wait_idle(orch.store());

        assert_eq!(orch.config.current().opmode, OpMode::ClientAp);
        let applied = radio.applied();
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].0.opmode, OpMode::ClientAp);
    }
}
