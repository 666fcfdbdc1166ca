//! Serde-deserializable schema types for planner data files.
//!
//! These types mirror the on-disk format. Cross-references are by name
//! (strings), resolved to typed IDs during loading.

use serde::Deserialize;
use std::collections::BTreeMap;

// ===========================================================================
// Catalog
// ===========================================================================

/// Top-level contents of a `catalog.*` file.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogData {
    /// Item names, most basic first.
    pub items: Vec<String>,
    #[serde(default)]
    pub facilities: Vec<FacilityData>,
    #[serde(default)]
    pub lines: Vec<LineData>,
}

/// A facility, either with explicit levels or generated from a recipe.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FacilityData {
    /// Every level spelled out.
    Explicit {
        name: String,
        levels: Vec<FacilityLevelData>,
    },
    /// `steps` levels of a single recipe whose throughput ramps from
    /// `current` towards `maximum`. Level `i` runs at
    /// `current + (maximum - current) * i / steps` and costs `step_cost`
    /// (level 0 is free).
    Ramp {
        name: String,
        recipe: BTreeMap<String, f64>,
        current: f64,
        maximum: f64,
        steps: u32,
        #[serde(default)]
        step_cost: f64,
    },
    /// A pure forwarding node with no rates and no upgrades.
    Splitter { name: String },
}

impl FacilityData {
    pub fn name(&self) -> &str {
        match self {
            Self::Explicit { name, .. } | Self::Ramp { name, .. } | Self::Splitter { name } => name,
        }
    }
}

/// One explicit facility level.
#[derive(Debug, Clone, Deserialize)]
pub struct FacilityLevelData {
    /// Signed rate per item name.
    #[serde(default)]
    pub rates: BTreeMap<String, f64>,
    /// Incremental cost from the previous level.
    #[serde(default)]
    pub cost: f64,
}

/// A transport line between two named facilities.
#[derive(Debug, Clone, Deserialize)]
pub struct LineData {
    pub item: String,
    pub from: String,
    pub to: String,
    pub levels: Vec<LineLevelData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LineLevelData {
    pub capacity: f64,
    #[serde(default)]
    pub cost: f64,
}

// ===========================================================================
// Planner settings
// ===========================================================================

/// Contents of an optional `planner.*` file. Absent fields keep the
/// solver and search defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlannerData {
    pub tolerance: Option<f64>,
    pub max_iterations: Option<u32>,
    pub max_expansions: Option<usize>,
    pub time_budget_ms: Option<u64>,
    #[serde(default)]
    pub verify_validated_levels: bool,
}
