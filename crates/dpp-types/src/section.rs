use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::event::FaultEvent;
use crate::tier::Tier;

/// How the engine may treat a section.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    /// Populated at registration, never mutated by the engine.
    Static,
    /// Single mutable record derived from the most recent event.
    Status,
    /// Append-only sequence of fault events.
    Log,
}

/// Typed contents of a section.
#[derive(Clone, Debug, PartialEq)]
pub enum SectionContent {
    Static(Map<String, Value>),
    Status(Map<String, Value>),
    Log(Vec<FaultEvent>),
}

impl SectionContent {
    pub fn kind(&self) -> SectionKind {
        match self {
            Self::Static(_) => SectionKind::Static,
            Self::Status(_) => SectionKind::Status,
            Self::Log(_) => SectionKind::Log,
        }
    }
}

/// A named sub-object of a passport with its own disclosure tier.
///
/// `access_tier` is `None` for sections that were registered untagged.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireSection", into = "WireSection")]
pub struct SectionRecord {
    pub access_tier: Option<Tier>,
    pub content: SectionContent,
}

impl SectionRecord {
    pub fn new(access_tier: Option<Tier>, content: SectionContent) -> Self {
        Self {
            access_tier,
            content,
        }
    }

    pub fn static_fields(access_tier: Tier, fields: Map<String, Value>) -> Self {
        Self::new(Some(access_tier), SectionContent::Static(fields))
    }

    pub fn status(access_tier: Tier, fields: Map<String, Value>) -> Self {
        Self::new(Some(access_tier), SectionContent::Status(fields))
    }

    /// An empty fault log.
    pub fn log(access_tier: Tier) -> Self {
        Self::new(Some(access_tier), SectionContent::Log(Vec::new()))
    }

    pub fn kind(&self) -> SectionKind {
        self.content.kind()
    }

    /// Tier used for disclosure decisions. Untagged sections are `Tier2` only.
    pub fn effective_tier(&self) -> Tier {
        self.access_tier.unwrap_or(Tier::Tier2)
    }

    /// The section payload as a JSON value. This is what gets hashed.
    pub fn payload(&self) -> Result<Value, serde_json::Error> {
        match &self.content {
            SectionContent::Static(fields) | SectionContent::Status(fields) => {
                Ok(Value::Object(fields.clone()))
            }
            SectionContent::Log(events) => serde_json::to_value(events),
        }
    }

    pub fn log_entries(&self) -> Option<&[FaultEvent]> {
        match &self.content {
            SectionContent::Log(events) => Some(events),
            _ => None,
        }
    }

    pub fn log_entries_mut(&mut self) -> Option<&mut Vec<FaultEvent>> {
        match &mut self.content {
            SectionContent::Log(events) => Some(events),
            _ => None,
        }
    }

    pub fn status_fields_mut(&mut self) -> Option<&mut Map<String, Value>> {
        match &mut self.content {
            SectionContent::Status(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn fields(&self) -> Option<&Map<String, Value>> {
        match &self.content {
            SectionContent::Static(fields) | SectionContent::Status(fields) => Some(fields),
            SectionContent::Log(_) => None,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct WireSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_tier: Option<Tier>,
    kind: SectionKind,
    payload: Value,
}

impl From<SectionRecord> for WireSection {
    fn from(section: SectionRecord) -> Self {
        let kind = section.kind();
        let payload = match section.content {
            SectionContent::Static(fields) | SectionContent::Status(fields) => {
                Value::Object(fields)
            }
            SectionContent::Log(events) => Value::Array(
                events
                    .iter()
                    .filter_map(|e| serde_json::to_value(e).ok())
                    .collect(),
            ),
        };
        Self {
            access_tier: section.access_tier,
            kind,
            payload,
        }
    }
}

impl TryFrom<WireSection> for SectionRecord {
    type Error = String;

    fn try_from(wire: WireSection) -> Result<Self, Self::Error> {
        let content = match (wire.kind, wire.payload) {
            (SectionKind::Static, Value::Object(fields)) => SectionContent::Static(fields),
            (SectionKind::Status, Value::Object(fields)) => SectionContent::Status(fields),
            (SectionKind::Log, payload @ Value::Array(_)) => SectionContent::Log(
                serde_json::from_value(payload).map_err(|e| format!("invalid log entry: {e}"))?,
            ),
            (kind, _) => return Err(format!("payload shape does not match {kind:?} section")),
        };
        Ok(Self {
            access_tier: wire.access_tier,
            content,
        })
    }
}
