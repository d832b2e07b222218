use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::position::Position;

/// Name of the log section receiving installation faults.
pub const INSTALLATION_LOG: &str = "fault_log_installation";
/// Name of the log section receiving every other fault.
pub const OPERATION_LOG: &str = "fault_log_operation";

/// Lifecycle phase a fault event belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Installation,
    Operation,
}

impl EventType {
    /// Classify a raw ledger event type. Only `installation` (any case) maps to
    /// [`EventType::Installation`]; everything else is an operation event.
    pub fn classify(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("installation") {
            Self::Installation
        } else {
            Self::Operation
        }
    }

    /// The log section events of this type are appended to.
    pub fn log_section(&self) -> &'static str {
        match self {
            Self::Installation => INSTALLATION_LOG,
            Self::Operation => OPERATION_LOG,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Installation => "installation",
            Self::Operation => "operation",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event as decoded from the ledger, before validation.
///
/// Every payload field is optional so that malformed contract logs can be
/// represented and rejected by the engine instead of failing decoding.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    pub block: u64,
    pub log_index: u64,
    #[serde(default)]
    pub entity_id: Option<String>,
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub fault_type: Option<String>,
    #[serde(default)]
    pub severity: Option<i64>,
    #[serde(default)]
    pub action_taken: Option<String>,
    #[serde(default)]
    pub validator: Option<String>,
    /// Seconds since the UNIX epoch.
    #[serde(default)]
    pub timestamp: Option<i64>,
    /// Visual status reported by the oracle, if any.
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

impl RawEvent {
    pub fn position(&self) -> Position {
        Position::new(self.block, self.log_index)
    }
}

/// A validated fault record as stored in a passport log section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultEvent {
    pub event_id: String,
    pub event_type: EventType,
    pub fault_type: String,
    pub severity: u32,
    pub action_taken: String,
    pub validator: String,
    pub timestamp: DateTime<Utc>,
    pub block: u64,
    pub log_index: u64,
}

impl FaultEvent {
    pub fn position(&self) -> Position {
        Position::new(self.block, self.log_index)
    }
}
