//! wifid - WiFi scan listing and transactional configuration for
//! network-attached devices.
//!
//! ## Architecture
//!
//! - **Scan**: a single in-flight radio scan publishes results into a
//!   [`ScanStore`](scan::ScanStore); a resumable emitter lists them one record
//!   per output chunk and triggers the next scan when done.
//! - **Config**: settings updates run as all-or-nothing transactions over the
//!   live [`WifiConfig`](config::WifiConfig) bundle.
//! - **Apply**: committed settings reach the radio after a delay, so the
//!   response that confirmed them is delivered first.

pub mod apply;
pub mod config;
pub mod error;
pub mod radio;
pub mod rest;
pub mod scan;

pub use apply::DeferredApplier;
pub use config::{ConfigState, WifiConfig};
pub use radio::{Radio, SimulatedRadio};
pub use scan::{PaginatedEmitter, ScanOrchestrator, ScanStore};
