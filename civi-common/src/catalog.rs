//! Metric catalog
//!
//! Static registry of indicator definitions. Every other component looks up
//! an indicator's industry, pillar and directionality here; observations whose
//! metric id is missing from the catalog are excluded downstream.

use crate::taxonomy::{Industry, Pillar};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Whether a higher raw value is good (POS) or bad (NEG) for the index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Directionality {
    #[serde(rename = "POS")]
    Pos,
    #[serde(rename = "NEG")]
    Neg,
}

impl Directionality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Directionality::Pos => "POS",
            Directionality::Neg => "NEG",
        }
    }
}

impl fmt::Display for Directionality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Directionality {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "POS" => Ok(Directionality::Pos),
            "NEG" => Ok(Directionality::Neg),
            other => Err(Error::InvalidInput(format!("Unknown directionality: {}", other))),
        }
    }
}

/// Indicator definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDefinition {
    pub metric_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub industry: Industry,
    pub pillar: Pillar,
    pub directionality: Directionality,
    #[serde(default)]
    pub units: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
}

/// In-memory catalog keyed by metric id
#[derive(Debug, Clone, Default)]
pub struct MetricCatalog {
    metrics: BTreeMap<String, MetricDefinition>,
}

impl MetricCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog, rejecting duplicate metric ids
    pub fn from_definitions<I>(definitions: I) -> Result<Self>
    where
        I: IntoIterator<Item = MetricDefinition>,
    {
        let mut catalog = Self::new();
        for definition in definitions {
            if catalog.metrics.contains_key(&definition.metric_id) {
                return Err(Error::Catalog(format!(
                    "Duplicate metric id: {}",
                    definition.metric_id
                )));
            }
            catalog.insert(definition);
        }
        Ok(catalog)
    }

    /// Insert or replace a definition
    pub fn insert(&mut self, definition: MetricDefinition) {
        self.metrics.insert(definition.metric_id.clone(), definition);
    }

    pub fn get(&self, metric_id: &str) -> Option<&MetricDefinition> {
        self.metrics.get(metric_id)
    }

    pub fn contains(&self, metric_id: &str) -> bool {
        self.metrics.contains_key(metric_id)
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Definitions in metric id order
    pub fn iter(&self) -> impl Iterator<Item = &MetricDefinition> {
        self.metrics.values()
    }

    /// Indicators scored under one (industry, pillar) cell
    pub fn indicators_for(&self, industry: Industry, pillar: Pillar) -> Vec<&MetricDefinition> {
        self.metrics
            .values()
            .filter(|m| m.industry == industry && m.pillar == pillar)
            .collect()
    }

    /// Distinct, sorted source names
    pub fn sources(&self) -> Vec<String> {
        self.metrics
            .values()
            .filter_map(|m| m.source.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// One entry of the built-in catalog seed
struct SeedEntry {
    metric_id: &'static str,
    name: &'static str,
    industry: Industry,
    pillar: Pillar,
    directionality: Directionality,
    units: &'static str,
    source: &'static str,
    weight: f64,
}

#[allow(clippy::too_many_arguments)]
fn seed(
    metric_id: &'static str,
    name: &'static str,
    industry: Industry,
    pillar: Pillar,
    directionality: Directionality,
    units: &'static str,
    source: &'static str,
    weight: f64,
) -> SeedEntry {
    SeedEntry {
        metric_id,
        name,
        industry,
        pillar,
        directionality,
        units,
        source,
        weight,
    }
}

use Directionality::{Neg, Pos};
use Industry as I;
use Pillar as P;

const WORLD_BANK: &str = "World Bank";
const ITU: &str = "ITU DataHub";
const WHO: &str = "WHO GHO";
const FAO: &str = "FAOSTAT";

/// Metric id of the derived military expenditure per capita indicator
pub const MILITARY_EXPENDITURE_PER_CAPITA: &str = "MS.MIL.XPND.PC.CD";

fn seed_entries() -> Vec<SeedEntry> {
    vec![
        // Communications
        seed("ITU_242", "International bandwidth usage", I::Communications, P::Autonomy, Pos, "Mbit/s per Internet user", ITU, 1.0),
        seed("ITU_100095", "Mobile-broadband network coverage (% population)", I::Communications, P::Resilience, Pos, "%", ITU, 1.0),
        seed("IT.NET.BBND.P2", "Fixed-broadband subscriptions (per 100 people)", I::Communications, P::Sustainability, Pos, "per 100 people", WORLD_BANK, 1.0),
        seed("IT.NET.USER.ZS", "Individuals using the Internet (% of population)", I::Communications, P::Effectiveness, Pos, "%", WORLD_BANK, 1.0),
        // Defence
        seed("MS.MIL.XPND.GD.ZS", "Military expenditure (% of GDP)", I::Defence, P::Autonomy, Neg, "% of GDP", WORLD_BANK, 1.0),
        seed("MS.MIL.TOTL.P1", "Armed forces personnel, total", I::Defence, P::Resilience, Pos, "total", WORLD_BANK, 1.0),
        seed("MS.MIL.XPND.ZS", "Military expenditure (% of central government expenditure)", I::Defence, P::Sustainability, Neg, "% of govt. expenditure", WORLD_BANK, 1.0),
        seed(MILITARY_EXPENDITURE_PER_CAPITA, "Military expenditure per capita (current USD)", I::Defence, P::Effectiveness, Neg, "current USD per capita", "Derived from World Bank", 1.0),
        // Energy
        seed("EG.IMP.CONS.ZS", "Energy imports, net (% of energy use)", I::Energy, P::Autonomy, Neg, "% of energy use", WORLD_BANK, 1.0),
        seed("EG.ELC.LOSS.ZS", "Electric power transmission and distribution losses (% of output)", I::Energy, P::Resilience, Neg, "% of output", WORLD_BANK, 1.0),
        seed("EG.FEC.RNEW.ZS", "Renewable energy consumption (% of total final energy consumption)", I::Energy, P::Sustainability, Pos, "%", WORLD_BANK, 1.0),
        seed("EG.ELC.ACCS.ZS", "Access to electricity (% of population)", I::Energy, P::Effectiveness, Pos, "%", WORLD_BANK, 1.0),
        // Finance
        seed("FS.AST.PRVT.GD.ZS", "Domestic credit to private sector (% of GDP)", I::Finance, P::Autonomy, Pos, "% of GDP", WORLD_BANK, 1.0),
        seed("FB.AST.NPER.ZS", "Bank nonperforming loans to total gross loans (%)", I::Finance, P::Resilience, Neg, "%", WORLD_BANK, 1.0),
        seed("FX.OWN.TOTL.ZS", "Account ownership at a financial institution or with a mobile-money-service provider (% of population ages 15+)", I::Finance, P::Sustainability, Pos, "%", WORLD_BANK, 1.0),
        seed("FB.CBK.BRCH.P5", "Commercial bank branches (per 100,000 adults)", I::Finance, P::Effectiveness, Pos, "per 100,000 adults", WORLD_BANK, 1.0),
        // Food & Agriculture
        seed("FAO_FS_DEFI_P3", "Prevalence of undernourishment (% of population) (3-year average)", I::FoodAgriculture, P::Resilience, Neg, "%", FAO, 1.0),
        seed("AG.PRD.FOOD.XD", "Food production index (2014-2016 = 100)", I::FoodAgriculture, P::Effectiveness, Pos, "index", WORLD_BANK, 1.0),
        // Healthcare
        seed("HRH_26", "Physicians per 1,000 population (health workforce density)", I::Healthcare, P::Autonomy, Pos, "per 1,000 population", WHO, 0.5),
        seed("WB_SH_XPD_CHEX_GD_ZS", "Current health expenditure (% of GDP)", I::Healthcare, P::Autonomy, Pos, "%", WORLD_BANK, 0.5),
        seed("UHC_INDEX_REPORTED", "UHC Service Coverage Index (0-100)", I::Healthcare, P::Resilience, Pos, "0-100", WHO, 1.0),
        seed("SH.XPD.CHEX.PC.CD", "Current health expenditure per capita (current US$)", I::Healthcare, P::Sustainability, Pos, "current US$", WORLD_BANK, 1.0),
        seed("SH.IMM.IDPT", "Immunization, DPT (% of children ages 12-23 months)", I::Healthcare, P::Effectiveness, Pos, "%", WORLD_BANK, 0.5),
        seed("SH.DYN.MORT", "Mortality rate, under-5 (per 1,000 live births)", I::Healthcare, P::Effectiveness, Neg, "per 1,000 live births", WORLD_BANK, 0.5),
        // Transport
        seed("IS.ROD.PAVE.ZS", "Paved roads (% of total roads)", I::Transport, P::Effectiveness, Pos, "% of total roads", WORLD_BANK, 1.0),
        // Information Technology
        seed("IT.CEL.SETS.P2", "Mobile cellular subscriptions (per 100 people)", I::InformationTechnology, P::Autonomy, Pos, "per 100 people", WORLD_BANK, 1.0),
        seed("ITU_90014", "Global Cybersecurity Index - Overall Score", I::InformationTechnology, P::Resilience, Pos, "score", ITU, 1.0),
        seed("GB.XPD.RSDV.GD.ZS", "Research and development expenditure (% of GDP)", I::InformationTechnology, P::Sustainability, Pos, "% of GDP", WORLD_BANK, 1.0),
        seed("IT.NET.SECR.P6", "Secure Internet servers (per 1 million people)", I::InformationTechnology, P::Effectiveness, Pos, "per 1 million people", WORLD_BANK, 1.0),
    ]
}

/// Built-in catalog seed definitions
pub fn default_definitions() -> Vec<MetricDefinition> {
    seed_entries()
        .into_iter()
        .map(|entry| {
            let source_url = (entry.source == WORLD_BANK && entry.metric_id.contains('.')).then(|| {
                format!("https://data.worldbank.org/indicator/{}", entry.metric_id)
            });
            MetricDefinition {
                metric_id: entry.metric_id.to_string(),
                name: entry.name.to_string(),
                description: None,
                industry: entry.industry,
                pillar: entry.pillar,
                directionality: entry.directionality,
                units: Some(entry.units.to_string()),
                source: Some(entry.source.to_string()),
                source_url,
            }
        })
        .collect()
}

/// Per-indicator default weights matching [`default_definitions`]
pub fn default_indicator_weights() -> BTreeMap<String, f64> {
    seed_entries()
        .into_iter()
        .map(|entry| (entry.metric_id.to_string(), entry.weight))
        .collect()
}
