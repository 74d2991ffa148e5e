//! Resumable scan listing.
//!
//! The transport calls [`PaginatedEmitter::step`] repeatedly, once per output
//! chunk it can accept, handing back the same cursor slot each time. Every
//! step writes a bounded amount: the opening frame, exactly one record, or
//! the "scan in progress" reply. The record that brings the cursor past the
//! end also writes the closing frame and kicks off the next scan.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error};
use utoipa::ToSchema;

use super::orchestrator::ScanOrchestrator;
use super::store::{ScanRecord, ScanSnapshot};

const FRAME_IN_PROGRESS: &str = "{\n \"result\": {\n  \"inProgress\": 1\n }\n}";
const FRAME_OPEN: &str = "{\n \"result\": {\n  \"inProgress\": 0,\n  \"APs\": [\n   ";
const FRAME_CLOSE: &str = "  ]\n }\n}";
const SEPARATOR: &str = ",\n   ";
const LAST_SEPARATOR: &str = "\n  ";

/// Approximate signal quality in percent for an RSSI in dBm.
///
/// Linear from -100 dBm (0%) to -50 dBm (100%), clamped outside that range.
pub fn rssi2perc(rssi: i32) -> u8 {
    (2 * (rssi + 100)).clamp(0, 100) as u8
}

/// Whether the transport should call again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CgiState {
    More,
    Done,
}

/// Output side of the transport.
pub trait ChunkSink {
    fn send(&mut self, chunk: &[u8]);

    /// False once the client has gone away.
    fn is_connected(&self) -> bool {
        true
    }
}

impl ChunkSink for Vec<u8> {
    fn send(&mut self, chunk: &[u8]) {
        self.extend_from_slice(chunk);
    }
}

/// Position within one listing. Lives in the transport's per-request slot.
///
/// The cursor pins the snapshot that was current when the listing started,
/// so a scan finishing mid-listing does not shift records under it.
#[derive(Debug)]
pub struct ScanCursor {
    /// 1-based index of the next record to emit.
    position: usize,
    snapshot: Arc<ScanSnapshot>,
}

/// One network in the listing.
#[derive(Debug, Serialize, ToSchema)]
pub struct AccessPoint {
    pub essid: String,
    pub bssid: String,
    pub rssi: i8,
    pub rssi_perc: u8,
    /// Authentication mode code.
    pub enc: u8,
    pub channel: u8,
}

impl From<&ScanRecord> for AccessPoint {
    fn from(record: &ScanRecord) -> Self {
        Self {
            essid: record.ssid.clone(),
            bssid: record.bssid_string(),
            rssi: record.rssi,
            rssi_perc: rssi2perc(record.rssi.into()),
            enc: record.auth.code(),
            channel: record.channel,
        }
    }
}

/// Scan listing generator. Stateless apart from the cursor it is handed.
#[derive(Clone)]
pub struct PaginatedEmitter {
    orchestrator: ScanOrchestrator,
}

impl PaginatedEmitter {
    pub fn new(orchestrator: ScanOrchestrator) -> Self {
        Self { orchestrator }
    }

    /// Emit the next unit of the listing into `sink`.
    ///
    /// `slot` must be `None` on the first call of a listing and is cleared
    /// when the listing finishes or the client disconnects.
    pub fn step(&self, slot: &mut Option<ScanCursor>, sink: &mut impl ChunkSink) -> CgiState {
        if !sink.is_connected() {
            debug!("Client went away, dropping scan listing");
            *slot = None;
            return CgiState::Done;
        }

        let Some(cursor) = slot.as_mut() else {
            return match self.orchestrator.store().completed() {
                None => {
                    sink.send(FRAME_IN_PROGRESS.as_bytes());
                    CgiState::Done
                }
                Some(snapshot) => {
                    debug!(
                        count = snapshot.len(),
                        completed_at = ?snapshot.completed_at(),
                        "Listing scan results"
                    );
                    sink.send(FRAME_OPEN.as_bytes());
                    *slot = Some(ScanCursor {
                        position: 1,
                        snapshot,
                    });
                    CgiState::More
                }
            };
        };

        let count = cursor.snapshot.len();
        if let Some(record) = cursor.snapshot.records().get(cursor.position - 1) {
            sink.send(&encode(record));
            let separator = if cursor.position == count {
                LAST_SEPARATOR
            } else {
                SEPARATOR
            };
            sink.send(separator.as_bytes());
        }

        cursor.position += 1;
        if cursor.position <= count {
            return CgiState::More;
        }

        sink.send(FRAME_CLOSE.as_bytes());
        *slot = None;
        self.orchestrator.request_scan();
        CgiState::Done
    }
}

fn encode(record: &ScanRecord) -> Vec<u8> {
    serde_json::to_vec(&AccessPoint::from(record)).unwrap_or_else(|e| {
        error!(ssid = %record.ssid, error = %e, "Failed to encode scan record");
        b"null".to_vec()
    })
}
