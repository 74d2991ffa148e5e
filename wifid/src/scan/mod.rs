//! Network scanning: result store, scan orchestration and the paginated listing.

pub mod emitter;
pub mod orchestrator;
pub mod store;

pub use emitter::{AccessPoint, CgiState, ChunkSink, PaginatedEmitter, ScanCursor, rssi2perc};
pub use orchestrator::ScanOrchestrator;
pub use store::{ScanRecord, ScanSnapshot, ScanStore};
