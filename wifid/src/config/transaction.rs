//! All-or-nothing settings updates.
//!
//! A transaction snapshots the live bundle, stages each proposed field on a
//! private draft after validating it, and on commit either installs the whole
//! draft in one swap or discards it. Rejected fields are reported by name in
//! the order they were proposed.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, MutexGuard};
use tracing::{debug, info, warn};

use super::{ChangeFlags, ConfigState, WifiConfig, validation};
use crate::error::{CommitError, UnknownField, ValidationError, join_fields};

/// Settings fields accepted by an update, named as on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    OpMode,
    ApEnable,
    StaEnable,
    TxPower,
    ApChannel,
    ApSsid,
    ApPassword,
    ApHidden,
    StaSsid,
    StaPassword,
}

impl Field {
    /// All fields in processing order.
    pub const ALL: [Field; 10] = [
        Field::OpMode,
        Field::ApEnable,
        Field::StaEnable,
        Field::TxPower,
        Field::ApChannel,
        Field::ApSsid,
        Field::ApPassword,
        Field::ApHidden,
        Field::StaSsid,
        Field::StaPassword,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Field::OpMode => "opmode",
            Field::ApEnable => "ap_enable",
            Field::StaEnable => "sta_enable",
            Field::TxPower => "tpw",
            Field::ApChannel => "ap_channel",
            Field::ApSsid => "ap_ssid",
            Field::ApPassword => "ap_password",
            Field::ApHidden => "ap_hidden",
            Field::StaSsid => "sta_ssid",
            Field::StaPassword => "sta_password",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| UnknownField(s.to_string()))
    }
}

/// Result of a successful commit.
#[derive(Debug, Clone)]
pub struct Committed {
    /// The bundle now live.
    pub config: Arc<WifiConfig>,
    /// Subsystems changed by this transaction.
    pub changes: ChangeFlags,
    /// `sta_enable` was submitted as on.
    pub station_turned_on: bool,
    /// Station SSID or password changed.
    pub station_credentials_changed: bool,
}

impl Committed {
    /// The client asked the device to join a network it can actually join.
    pub fn wants_connect(&self) -> bool {
        (self.station_credentials_changed || self.station_turned_on)
            && self.config.opmode.has_station()
            && !self.config.sta_ssid.is_empty()
    }
}

/// A settings update in progress. See the module docs.
pub struct ConfigTransaction<'a> {
    state: &'a ConfigState,
    _writer: MutexGuard<'a, ()>,
    snapshot: Arc<WifiConfig>,
    draft: WifiConfig,
    changes: ChangeFlags,
    failed: Vec<(Field, ValidationError)>,
    station_turned_on: bool,
    station_credentials_changed: bool,
}

impl<'a> ConfigTransaction<'a> {
    pub(super) fn new(state: &'a ConfigState, writer: MutexGuard<'a, ()>) -> Self {
        let snapshot = state.current();
        Self {
            state,
            _writer: writer,
            draft: (*snapshot).clone(),
            snapshot,
            changes: ChangeFlags::default(),
            failed: Vec::new(),
            station_turned_on: false,
            station_credentials_changed: false,
        }
    }

    /// The bundle as it was when the transaction began.
    pub fn snapshot(&self) -> &WifiConfig {
        &self.snapshot
    }

    /// The bundle with all accepted fields staged.
    pub fn draft(&self) -> &WifiConfig {
        &self.draft
    }

    /// Fields rejected so far, in processing order.
    pub fn failed(&self) -> impl Iterator<Item = (Field, &ValidationError)> {
        self.failed.iter().map(|(field, err)| (*field, err))
    }

    /// Propose a field by its wire name.
    pub fn propose_field(&mut self, name: &str, raw: &str) -> Result<(), UnknownField> {
        let field = name.parse()?;
        self.propose(field, raw);
        Ok(())
    }

    /// Validate `raw` for `field` and stage it on the draft, or record the rejection.
    pub fn propose(&mut self, field: Field, raw: &str) {
        debug!(field = %field, value = raw, "Proposed WiFi setting");
        if let Err(e) = self.stage(field, raw) {
            warn!(field = %field, value = raw, error = %e, "Rejected WiFi setting");
            self.failed.push((field, e));
        }
    }

    fn stage(&mut self, field: Field, raw: &str) -> Result<(), ValidationError> {
        let old = &self.snapshot;
        let draft = &mut self.draft;

        match field {
            Field::OpMode => draft.opmode = validation::opmode(raw)?,
            Field::ApEnable => draft.opmode = draft.opmode.with_ap(validation::flag(raw)),
            Field::StaEnable => {
                let enable = validation::flag(raw);
                draft.opmode = draft.opmode.with_station(enable);
                self.station_turned_on |= enable;
            }
            Field::TxPower => {
                draft.tpw = validation::tx_power(raw)?;
                self.changes.ap |= draft.tpw != old.tpw;
            }
            Field::ApChannel => {
                draft.ap_channel = validation::channel(raw)?;
                self.changes.ap |= draft.ap_channel != old.ap_channel;
            }
            Field::ApSsid => {
                draft.ap_ssid = validation::ap_ssid(raw)?;
                self.changes.ap |= draft.ap_ssid != old.ap_ssid;
            }
            Field::ApPassword => {
                draft.ap_password = validation::ap_password(raw)?;
                self.changes.ap |= draft.ap_password != old.ap_password;
            }
            Field::ApHidden => {
                draft.ap_hidden = validation::flag(raw);
                self.changes.ap |= draft.ap_hidden != old.ap_hidden;
            }
            Field::StaSsid => {
                draft.sta_ssid = validation::sta_ssid(raw);
                let changed = draft.sta_ssid != old.sta_ssid;
                self.changes.sta |= changed;
                self.station_credentials_changed |= changed;
            }
            Field::StaPassword => {
                draft.sta_password = validation::sta_password(raw);
                let changed = draft.sta_password != old.sta_password;
                self.changes.sta |= changed;
                self.station_credentials_changed |= changed;
            }
        }
        Ok(())
    }

    /// Persist and install the draft, or discard it if any field was rejected.
    ///
    /// On error the live bundle and pending change flags are exactly as they
    /// were before the transaction began.
    pub fn commit(self) -> Result<Committed, CommitError> {
        if !self.failed.is_empty() {
            let fields: Vec<Field> = self.failed.iter().map(|(field, _)| *field).collect();
            warn!(
                fields = %join_fields(&fields),
                "Some WiFi settings did not validate, discarding all changes"
            );
            return Err(CommitError::Rejected(fields));
        }

        self.state.persist().store(&self.draft)?;

        let config = Arc::new(self.draft);
        self.state.install(Arc::clone(&config), self.changes);
        info!(
            ap_changed = self.changes.ap,
            sta_changed = self.changes.sta,
            "WiFi settings committed"
        );

        Ok(Committed {
            config,
            changes: self.changes,
            station_turned_on: self.station_turned_on,
            station_credentials_changed: self.station_credentials_changed,
        })
    }
}
