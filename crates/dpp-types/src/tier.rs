use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Disclosure level controlling which passport sections a reader may see.
///
/// Tiers are totally ordered: `Public < Tier1 < Tier2`. A reader granted a
/// tier sees every section tagged with that tier or any lower one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tier {
    Public,
    Tier1,
    Tier2,
}

impl Tier {
    /// All tiers in ascending order.
    pub const ALL: [Tier; 3] = [Tier::Public, Tier::Tier1, Tier::Tier2];

    /// Label used inside passport documents (`"Tier 1"`).
    pub fn label(&self) -> &'static str {
        match self {
            Self::Public => "Public",
            Self::Tier1 => "Tier 1",
            Self::Tier2 => "Tier 2",
        }
    }

    /// Label used in query strings (`"tier1"`).
    pub fn query_name(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Tier1 => "tier1",
            Self::Tier2 => "tier2",
        }
    }

    /// Returns `true` if a reader holding `self` may see a section tagged `section_tier`.
    pub fn grants(&self, section_tier: Tier) -> bool {
        section_tier <= *self
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Tier {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "public" => Ok(Self::Public),
            "tier1" => Ok(Self::Tier1),
            "tier2" => Ok(Self::Tier2),
            _ => Err(TypeError::UnknownTier(s.to_string())),
        }
    }
}

impl Serialize for Tier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for Tier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_are_totally_ordered() {
        assert!(Tier::Public < Tier::Tier1);
        assert!(Tier::Tier1 < Tier::Tier2);
    }

    #[test]
    fn grants_follow_hierarchy() {
        assert!(Tier::Public.grants(Tier::Public));
        assert!(!Tier::Public.grants(Tier::Tier1));
        assert!(Tier::Tier1.grants(Tier::Public));
        assert!(Tier::Tier1.grants(Tier::Tier1));
        assert!(!Tier::Tier1.grants(Tier::Tier2));
        assert!(Tier::Tier2.grants(Tier::Tier2));
    }

    #[test]
    fn parses_document_and_query_spellings() {
        assert_eq!("Tier 1".parse::<Tier>().unwrap(), Tier::Tier1);
        assert_eq!("tier2".parse::<Tier>().unwrap(), Tier::Tier2);
        assert_eq!("PUBLIC".parse::<Tier>().unwrap(), Tier::Public);
        assert_eq!("tier_1".parse::<Tier>().unwrap(), Tier::Tier1);
        assert!("tier3".parse::<Tier>().is_err());
    }

    #[test]
    fn serializes_as_document_label() {
        let json = serde_json::to_string(&Tier::Tier2).unwrap();
        assert_eq!(json, "\"Tier 2\"");
        let parsed: Tier = serde_json::from_str("\"Tier 1\"").unwrap();
        assert_eq!(parsed, Tier::Tier1);
    }
}
