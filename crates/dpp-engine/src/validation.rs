use chrono::{DateTime, Utc};
use dpp_types::{EventType, FaultEvent, Position, RawEvent};

use crate::error::EngineError;

/// A ledger event that passed validation, with the target entity split off.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedEvent {
    pub entity_id: String,
    pub event: FaultEvent,
    /// Visual status for the status section, when the oracle reported one.
    pub status: Option<String>,
    pub color: Option<String>,
}

/// Why an event was rejected. Keeps whatever identifiers could be read so the
/// rejection can be attached to the right document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationFailure {
    pub position: Position,
    pub entity_id: Option<String>,
    pub event_id: Option<String>,
    pub reason: String,
}

impl From<ValidationFailure> for EngineError {
    fn from(f: ValidationFailure) -> Self {
        EngineError::Validation {
            position: f.position,
            reason: f.reason,
        }
    }
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Check required fields and convert a raw ledger event into a [`FaultEvent`].
///
/// `entity_id`, `event_id`, `event_type`, `fault_type`, `severity`, and
/// `timestamp` are required. `action_taken` and `validator` default to empty
/// strings.
pub fn validate(raw: &RawEvent) -> Result<ValidatedEvent, ValidationFailure> {
    let entity_id = present(&raw.entity_id);
    let event_id = present(&raw.event_id);
    let fail = |reason: String| ValidationFailure {
        position: raw.position(),
        entity_id: entity_id.map(str::to_string),
        event_id: event_id.map(str::to_string),
        reason,
    };

    let mut missing = Vec::new();
    if entity_id.is_none() {
        missing.push("entity_id");
    }
    if event_id.is_none() {
        missing.push("event_id");
    }
    if present(&raw.event_type).is_none() {
        missing.push("event_type");
    }
    if present(&raw.fault_type).is_none() {
        missing.push("fault_type");
    }
    if raw.severity.is_none() {
        missing.push("severity");
    }
    if raw.timestamp.is_none() {
        missing.push("timestamp");
    }
    if !missing.is_empty() {
        return Err(fail(format!("missing required fields: {}", missing.join(", "))));
    }

    let severity = raw.severity.unwrap_or_default();
    let severity = u32::try_from(severity)
        .map_err(|_| fail(format!("severity {severity} out of range")))?;

    let secs = raw.timestamp.unwrap_or_default();
    let timestamp: DateTime<Utc> = DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| fail(format!("timestamp {secs} out of range")))?;

    let (Some(entity_id), Some(event_id)) = (entity_id, event_id) else {
        return Err(fail("missing identifiers".into()));
    };

    Ok(ValidatedEvent {
        entity_id: entity_id.to_string(),
        event: FaultEvent {
            event_id: event_id.to_string(),
            event_type: EventType::classify(raw.event_type.as_deref().unwrap_or_default()),
            fault_type: raw.fault_type.as_deref().unwrap_or_default().trim().to_string(),
            severity,
            action_taken: raw.action_taken.clone().unwrap_or_default(),
            validator: raw.validator.clone().unwrap_or_default(),
            timestamp,
            block: raw.block,
            log_index: raw.log_index,
        },
        status: present(&raw.status).map(str::to_string),
        color: present(&raw.color).map(str::to_string),
    })
}
