//! Industry and pillar taxonomy
//!
//! Industries and pillars are closed enumerations. Every free-form key coming
//! from a catalog seed, a TOML file, a database row or an HTTP path goes
//! through [`canonical_key`] before it is matched, so "Food & Agriculture",
//! "food_agriculture" and "FOOD AND AGRICULTURE" all name the same industry.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonicalize a free-form industry/pillar key
///
/// Lowercases, splits on any run of non-alphanumeric characters, drops the
/// connective "and", and joins the remaining words with `_`.
pub fn canonical_key(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty() && *word != "and")
        .collect::<Vec<_>>()
        .join("_")
}

/// Normative dimension along which an industry is scored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pillar {
    Autonomy,
    Resilience,
    Sustainability,
    Effectiveness,
}

impl Pillar {
    /// All pillars in canonical order
    pub const ALL: [Pillar; 4] = [
        Pillar::Autonomy,
        Pillar::Resilience,
        Pillar::Sustainability,
        Pillar::Effectiveness,
    ];

    /// Canonical key used in storage and documents
    pub fn as_str(&self) -> &'static str {
        match self {
            Pillar::Autonomy => "autonomy",
            Pillar::Resilience => "resilience",
            Pillar::Sustainability => "sustainability",
            Pillar::Effectiveness => "effectiveness",
        }
    }
}

impl fmt::Display for Pillar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Pillar {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let key = canonical_key(s);
        Pillar::ALL
            .into_iter()
            .find(|p| p.as_str() == key)
            .ok_or_else(|| Error::InvalidInput(format!("Unknown pillar: {}", s)))
    }
}

/// Critical-infrastructure sector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Industry {
    Communications,
    Defence,
    Energy,
    Finance,
    FoodAgriculture,
    Healthcare,
    Transport,
    Water,
    WasteManagement,
    EmergencyServices,
    InformationTechnology,
}

impl Industry {
    /// All industries in canonical order
    pub const ALL: [Industry; 11] = [
        Industry::Communications,
        Industry::Defence,
        Industry::Energy,
        Industry::Finance,
        Industry::FoodAgriculture,
        Industry::Healthcare,
        Industry::Transport,
        Industry::Water,
        Industry::WasteManagement,
        Industry::EmergencyServices,
        Industry::InformationTechnology,
    ];

    /// Canonical key used in storage and documents
    pub fn as_str(&self) -> &'static str {
        match self {
            Industry::Communications => "communications",
            Industry::Defence => "defence",
            Industry::Energy => "energy",
            Industry::Finance => "finance",
            Industry::FoodAgriculture => "food_agriculture",
            Industry::Healthcare => "healthcare",
            Industry::Transport => "transport",
            Industry::Water => "water",
            Industry::WasteManagement => "waste_management",
            Industry::EmergencyServices => "emergency_services",
            Industry::InformationTechnology => "information_technology",
        }
    }
}

impl fmt::Display for Industry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Industry {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let key = canonical_key(s);
        let key = match key.as_str() {
            "defense" => "defence".to_string(),
            _ => key,
        };
        Industry::ALL
            .into_iter()
            .find(|i| i.as_str() == key)
            .ok_or_else(|| Error::InvalidInput(format!("Unknown industry: {}", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_key_variants() {
        assert_eq!(canonical_key("Food & Agriculture"), "food_agriculture");
        assert_eq!(canonical_key("FOOD AND AGRICULTURE"), "food_agriculture");
        assert_eq!(canonical_key("  Information Technology "), "information_technology");
        assert_eq!(canonical_key("waste-management"), "waste_management");
        assert_eq!(canonical_key("energy"), "energy");
    }

    #[test]
    fn test_industry_parse_round_trips_every_variant() {
        for industry in Industry::ALL {
            assert_eq!(industry.as_str().parse::<Industry>().unwrap(), industry);
        }
        assert_eq!("Defense".parse::<Industry>().unwrap(), Industry::Defence);
        assert_eq!("Emergency Services".parse::<Industry>().unwrap(), Industry::EmergencyServices);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!("mining".parse::<Industry>().is_err());
        assert!("happiness".parse::<Pillar>().is_err());
        assert!("".parse::<Pillar>().is_err());
    }

    #[test]
    fn test_pillar_parse_is_case_insensitive() {
        assert_eq!("Resilience".parse::<Pillar>().unwrap(), Pillar::Resilience);
        assert_eq!("SUSTAINABILITY".parse::<Pillar>().unwrap(), Pillar::Sustainability);
    }

    #[test]
    fn test_serde_uses_canonical_keys() {
        let json = serde_json::to_string(&Industry::FoodAgriculture).unwrap();
        assert_eq!(json, "\"food_agriculture\"");
        let pillar: Pillar = serde_json::from_str("\"effectiveness\"").unwrap();
        assert_eq!(pillar, Pillar::Effectiveness);
    }
}
