//! Static description of the network: item types, facilities and transport
//! lines, each facility and line with an ordered list of upgrade levels.
//!
//! A [`Catalog`] is built once through [`CatalogBuilder`] and is immutable
//! afterwards. Level 0 of every facility and line is the unupgraded baseline;
//! level `L` carries the incremental cost of moving from `L - 1` to `L`.

use crate::configuration::Configuration;
use crate::fixed::Fixed64;
use crate::id::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised while building a catalog.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog has no item types")]
    NoItems,
    #[error("duplicate item name: {0}")]
    DuplicateItem(String),
    #[error("item not found: {0}")]
    ItemNotFound(ItemTypeId),
    #[error("facility not found: {0}")]
    FacilityNotFound(FacilityId),
    #[error("facility '{0}' has no upgrade levels")]
    FacilityWithoutLevels(String),
    #[error("transport line {0} has no upgrade levels")]
    LineWithoutLevels(LineId),
    #[error("negative cost at level {level} of {owner}")]
    NegativeCost { owner: String, level: usize },
    #[error("negative capacity at level {level} of {line}")]
    NegativeCapacity { line: LineId, level: usize },
    #[error("capacity of {line} decreases at level {level}")]
    CapacityDecreases { line: LineId, level: usize },
    #[error("{what} at level {level} of {owner} exceeds the quantity bound")]
    QuantityOutOfRange {
        owner: String,
        what: &'static str,
        level: usize,
    },
    #[error("production of {item} by '{facility}' decreases at level {level}")]
    ProductionDecreases {
        facility: String,
        item: ItemTypeId,
        level: usize,
    },
}

// ---------------------------------------------------------------------------
// Definitions
// ---------------------------------------------------------------------------

/// Largest magnitude (2^30) accepted for any single rate, capacity or cost.
/// Sums of a few such values stay inside `Fixed64`; longer sums are checked.
pub const MAX_QUANTITY: Fixed64 = Fixed64::from_bits(1 << 62);

fn in_range(v: Fixed64) -> bool {
    (-MAX_QUANTITY..=MAX_QUANTITY).contains(&v)
}

/// An item type definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDef {
    pub name: String,
}

/// One upgrade level of a facility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityLevel {
    /// Signed rate per item: positive produces, negative consumes, absent is 0.
    pub rates: BTreeMap<ItemTypeId, Fixed64>,
    /// Cost of moving from the previous level to this one.
    pub incremental_cost: Fixed64,
}

impl FacilityLevel {
    pub fn new(
        rates: impl IntoIterator<Item = (ItemTypeId, Fixed64)>,
        incremental_cost: Fixed64,
    ) -> Self {
        Self {
            rates: rates.into_iter().collect(),
            incremental_cost,
        }
    }

    /// Signed rate for `item` at this level, zero when the item is absent.
    pub fn rate(&self, item: ItemTypeId) -> Fixed64 {
        self.rates.get(&item).copied().unwrap_or(Fixed64::ZERO)
    }
}

/// One upgrade level of a transport line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineLevel {
    pub capacity: Fixed64,
    pub incremental_cost: Fixed64,
}

impl LineLevel {
    pub fn new(capacity: Fixed64, incremental_cost: Fixed64) -> Self {
        Self {
            capacity,
            incremental_cost,
        }
    }
}

/// A producing and/or consuming node of the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facility {
    pub name: String,
    pub levels: Vec<FacilityLevel>,
    /// Items with a nonzero rate at any level, plus the items of every line
    /// this facility terminates. Derived at build time.
    involved: BTreeSet<ItemTypeId>,
}

impl Facility {
    /// Items this facility produces, consumes or forwards.
    pub fn involved_items(&self) -> &BTreeSet<ItemTypeId> {
        &self.involved
    }

    pub fn involves(&self, item: ItemTypeId) -> bool {
        self.involved.contains(&item)
    }

    /// The most basic involved item, if any.
    pub fn most_basic_item(&self) -> Option<ItemTypeId> {
        self.involved.first().copied()
    }

    /// The most advanced involved item, if any.
    pub fn most_advanced_item(&self) -> Option<ItemTypeId> {
        self.involved.last().copied()
    }

    /// True when a nonzero rate for `item` appears at any level.
    pub fn has_rate_for(&self, item: ItemTypeId) -> bool {
        self.levels.iter().any(|l| l.rate(item) != Fixed64::ZERO)
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }
}

/// A directed, capacity-limited transport line carrying one item type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportLine {
    pub item: ItemTypeId,
    pub from: FacilityId,
    pub to: FacilityId,
    pub levels: Vec<LineLevel>,
}

impl TransportLine {
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for an immutable [`Catalog`].
/// Lifecycle: register items, add facilities and lines, then `build`.
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    items: Vec<ItemDef>,
    item_name_to_id: HashMap<String, ItemTypeId>,
    duplicate_item: Option<String>,
    facilities: Vec<(String, Vec<FacilityLevel>)>,
    lines: Vec<TransportLine>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an item type. Registration order is refinement order: the
    /// first registered item is the most basic.
    pub fn register_item(&mut self, name: &str) -> ItemTypeId {
        if let Some(&existing) = self.item_name_to_id.get(name) {
            self.duplicate_item.get_or_insert_with(|| name.to_string());
            return existing;
        }
        let id = ItemTypeId(self.items.len() as u32);
        self.items.push(ItemDef {
            name: name.to_string(),
        });
        self.item_name_to_id.insert(name.to_string(), id);
        id
    }

    /// Add a facility with its upgrade levels. Returns its ID.
    pub fn add_facility(&mut self, name: &str, levels: Vec<FacilityLevel>) -> FacilityId {
        let id = FacilityId(self.facilities.len() as u32);
        self.facilities.push((name.to_string(), levels));
        id
    }

    /// Add a transport line carrying `item` from `from` to `to`. Returns its ID.
    pub fn add_line(
        &mut self,
        item: ItemTypeId,
        from: FacilityId,
        to: FacilityId,
        levels: Vec<LineLevel>,
    ) -> LineId {
        let id = LineId(self.lines.len() as u32);
        self.lines.push(TransportLine {
            item,
            from,
            to,
            levels,
        });
        id
    }

    /// Lookup item type ID by name.
    pub fn item_id(&self, name: &str) -> Option<ItemTypeId> {
        self.item_name_to_id.get(name).copied()
    }

    /// Validate and freeze the catalog.
    pub fn build(self) -> Result<Catalog, CatalogError> {
        if let Some(name) = self.duplicate_item {
            return Err(CatalogError::DuplicateItem(name));
        }
        if self.items.is_empty() {
            return Err(CatalogError::NoItems);
        }
        let item_count = self.items.len();
        let check_item = |item: ItemTypeId| {
            if item.index() < item_count {
                Ok(())
            } else {
                Err(CatalogError::ItemNotFound(item))
            }
        };

        for (name, levels) in &self.facilities {
            if levels.is_empty() {
                return Err(CatalogError::FacilityWithoutLevels(name.clone()));
            }
            for (idx, level) in levels.iter().enumerate() {
                if level.incremental_cost < Fixed64::ZERO {
                    return Err(CatalogError::NegativeCost {
                        owner: format!("facility '{name}'"),
                        level: idx,
                    });
                }
                if !in_range(level.incremental_cost) {
                    return Err(CatalogError::QuantityOutOfRange {
                        owner: format!("facility '{name}'"),
                        what: "cost",
                        level: idx,
                    });
                }
                for (&item, &rate) in &level.rates {
                    check_item(item)?;
                    if !in_range(rate) {
                        return Err(CatalogError::QuantityOutOfRange {
                            owner: format!("facility '{name}'"),
                            what: "rate",
                            level: idx,
                        });
                    }
                }
            }
            for (idx, pair) in levels.windows(2).enumerate() {
                for (&item, &rate) in &pair[0].rates {
                    if rate > Fixed64::ZERO && pair[1].rate(item) < rate {
                        return Err(CatalogError::ProductionDecreases {
                            facility: name.clone(),
                            item,
                            level: idx + 1,
                        });
                    }
                }
            }
        }

        for (idx, line) in self.lines.iter().enumerate() {
            let id = LineId(idx as u32);
            check_item(line.item)?;
            for endpoint in [line.from, line.to] {
                if endpoint.index() >= self.facilities.len() {
                    return Err(CatalogError::FacilityNotFound(endpoint));
                }
            }
            if line.levels.is_empty() {
                return Err(CatalogError::LineWithoutLevels(id));
            }
            for (lvl, level) in line.levels.iter().enumerate() {
                if level.incremental_cost < Fixed64::ZERO {
                    return Err(CatalogError::NegativeCost {
                        owner: id.to_string(),
                        level: lvl,
                    });
                }
                if level.capacity < Fixed64::ZERO {
                    return Err(CatalogError::NegativeCapacity { line: id, level: lvl });
                }
                for (what, v) in [("cost", level.incremental_cost), ("capacity", level.capacity)] {
                    if !in_range(v) {
                        return Err(CatalogError::QuantityOutOfRange {
                            owner: id.to_string(),
                            what,
                            level: lvl,
                        });
                    }
                }
            }
            if let Some(lvl) = line
                .levels
                .windows(2)
                .position(|pair| pair[1].capacity < pair[0].capacity)
            {
                return Err(CatalogError::CapacityDecreases {
                    line: id,
                    level: lvl + 1,
                });
            }
        }

        let mut facilities: Vec<Facility> = self
            .facilities
            .into_iter()
            .map(|(name, levels)| {
                let involved = levels
                    .iter()
                    .flat_map(|l| l.rates.iter())
                    .filter(|(_, rate)| **rate != Fixed64::ZERO)
                    .map(|(&item, _)| item)
                    .collect();
                Facility {
                    name,
                    levels,
                    involved,
                }
            })
            .collect();

        // Pass-through endpoints forward the item even without a rate for it.
        for line in &self.lines {
            facilities[line.from.index()].involved.insert(line.item);
            facilities[line.to.index()].involved.insert(line.item);
        }

        Ok(Catalog {
            items: self.items,
            item_name_to_id: self.item_name_to_id,
            facilities,
            lines: self.lines,
        })
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Immutable catalog. Frozen after `build()`; safe to share across threads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    items: Vec<ItemDef>,
    item_name_to_id: HashMap<String, ItemTypeId>,
    facilities: Vec<Facility>,
    lines: Vec<TransportLine>,
}

impl Catalog {
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn facility_count(&self) -> usize {
        self.facilities.len()
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// All item types, most basic first.
    pub fn item_ids(&self) -> impl DoubleEndedIterator<Item = ItemTypeId> + '_ {
        (0..self.items.len() as u32).map(ItemTypeId)
    }

    /// The most refined item type.
    pub fn most_advanced_item(&self) -> ItemTypeId {
        ItemTypeId(self.items.len().saturating_sub(1) as u32)
    }

    pub fn item_id(&self, name: &str) -> Option<ItemTypeId> {
        self.item_name_to_id.get(name).copied()
    }

    pub fn item_name(&self, item: ItemTypeId) -> Option<&str> {
        self.items.get(item.index()).map(|d| d.name.as_str())
    }

    pub fn facility(&self, id: FacilityId) -> Option<&Facility> {
        self.facilities.get(id.index())
    }

    pub fn line(&self, id: LineId) -> Option<&TransportLine> {
        self.lines.get(id.index())
    }

    pub fn facilities(&self) -> impl Iterator<Item = (FacilityId, &Facility)> {
        self.facilities
            .iter()
            .enumerate()
            .map(|(i, f)| (FacilityId(i as u32), f))
    }

    pub fn lines(&self) -> impl Iterator<Item = (LineId, &TransportLine)> {
        self.lines
            .iter()
            .enumerate()
            .map(|(i, l)| (LineId(i as u32), l))
    }

    pub fn facility_id(&self, name: &str) -> Option<FacilityId> {
        self.facilities
            .iter()
            .position(|f| f.name == name)
            .map(|i| FacilityId(i as u32))
    }

    /// Every facility and line at level 0.
    pub fn initial_configuration(&self) -> Configuration {
        Configuration::initial(self)
    }

    #[cfg(test)]
    pub(crate) fn line_mut(&mut self, id: LineId) -> Option<&mut TransportLine> {
        self.lines.get_mut(id.index())
    }

    /// Run a catalog that did not come from [`CatalogBuilder::build`]
    /// (a decoded snapshot, say) through the builder again. Derived data
    /// such as the name index and involved-item sets is recomputed rather
    /// than trusted.
    pub fn revalidate(self) -> Result<Catalog, CatalogError> {
        let mut builder = CatalogBuilder::new();
        for item in &self.items {
            builder.register_item(&item.name);
        }
        for facility in self.facilities {
            builder.add_facility(&facility.name, facility.levels);
        }
        for line in self.lines {
            builder.add_line(line.item, line.from, line.to, line.levels);
        }
        builder.build()
    }
}
