//! The chosen upgrade level of every facility and transport line.

use crate::catalog::Catalog;
use crate::fixed::Fixed64;
use crate::id::{FacilityId, LineId};
use serde::{Deserialize, Serialize};

/// Errors raised when a configuration does not fit a catalog.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("configuration has {got} facility levels, catalog has {expected} facilities")]
    FacilityCount { expected: usize, got: usize },
    #[error("configuration has {got} line levels, catalog has {expected} lines")]
    LineCount { expected: usize, got: usize },
    #[error("{facility} is at level {level} but only has {available} levels")]
    FacilityLevelOutOfRange {
        facility: FacilityId,
        level: u32,
        available: usize,
    },
    #[error("{line} is at level {level} but only has {available} levels")]
    LineLevelOutOfRange {
        line: LineId,
        level: u32,
        available: usize,
    },
    #[error("{0} cannot be reached from the base configuration by upgrades")]
    NotAnUpgrade(String),
    #[error("upgrade cost exceeds the representable range")]
    CostOverflow,
}

/// Upgrade levels for all facilities and lines. Fully determines network
/// behavior for every item type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Configuration {
    pub facility_levels: Vec<u32>,
    pub line_levels: Vec<u32>,
}

impl Configuration {
    /// Level 0 everywhere.
    pub fn initial(catalog: &Catalog) -> Self {
        Self {
            facility_levels: vec![0; catalog.facility_count()],
            line_levels: vec![0; catalog.line_count()],
        }
    }

    pub fn facility_level(&self, id: FacilityId) -> u32 {
        self.facility_levels[id.index()]
    }

    pub fn line_level(&self, id: LineId) -> u32 {
        self.line_levels[id.index()]
    }

    pub fn upgrade_facility(&mut self, id: FacilityId) {
        self.facility_levels[id.index()] += 1;
    }

    pub fn upgrade_line(&mut self, id: LineId) {
        self.line_levels[id.index()] += 1;
    }

    /// Check that this configuration matches the catalog's shape and that
    /// every level exists.
    pub fn validate(&self, catalog: &Catalog) -> Result<(), ConfigurationError> {
        if self.facility_levels.len() != catalog.facility_count() {
            return Err(ConfigurationError::FacilityCount {
                expected: catalog.facility_count(),
                got: self.facility_levels.len(),
            });
        }
        if self.line_levels.len() != catalog.line_count() {
            return Err(ConfigurationError::LineCount {
                expected: catalog.line_count(),
                got: self.line_levels.len(),
            });
        }
        for (id, facility) in catalog.facilities() {
            let level = self.facility_level(id);
            if level as usize >= facility.level_count() {
                return Err(ConfigurationError::FacilityLevelOutOfRange {
                    facility: id,
                    level,
                    available: facility.level_count(),
                });
            }
        }
        for (id, line) in catalog.lines() {
            let level = self.line_level(id);
            if level as usize >= line.level_count() {
                return Err(ConfigurationError::LineLevelOutOfRange {
                    line: id,
                    level,
                    available: line.level_count(),
                });
            }
        }
        Ok(())
    }

    /// Sum of the incremental costs paid to move from `base` to `self`.
    ///
    /// Both configurations must be valid for `catalog`, and `self` must be
    /// at or above `base` everywhere.
    pub fn cost_from(
        &self,
        catalog: &Catalog,
        base: &Configuration,
    ) -> Result<Fixed64, ConfigurationError> {
        self.validate(catalog)?;
        base.validate(catalog)?;

        let mut total = Fixed64::ZERO;
        for (id, facility) in catalog.facilities() {
            let (from, to) = (base.facility_level(id), self.facility_level(id));
            if to < from {
                return Err(ConfigurationError::NotAnUpgrade(id.to_string()));
            }
            for level in &facility.levels[(from as usize + 1)..=(to as usize)] {
                total = total
                    .checked_add(level.incremental_cost)
                    .ok_or(ConfigurationError::CostOverflow)?;
            }
        }
        for (id, line) in catalog.lines() {
            let (from, to) = (base.line_level(id), self.line_level(id));
            if to < from {
                return Err(ConfigurationError::NotAnUpgrade(id.to_string()));
            }
            for level in &line.levels[(from as usize + 1)..=(to as usize)] {
                total = total
                    .checked_add(level.incremental_cost)
                    .ok_or(ConfigurationError::CostOverflow)?;
            }
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogBuilder, FacilityLevel, LineLevel};
    use crate::fixed::f64_to_fixed64 as fx;

    fn two_level_catalog() -> Catalog {
        let mut b = CatalogBuilder::new();
        let coal = b.register_item("coal");
        let mine = b.add_facility(
            "mine",
            vec![
                FacilityLevel::new([(coal, fx(5.0))], Fixed64::ZERO),
                FacilityLevel::new([(coal, fx(8.0))], fx(3.0)),
                FacilityLevel::new([(coal, fx(12.0))], fx(4.0)),
            ],
        );
        let sink = b.add_facility(
            "sink",
            vec![FacilityLevel::new([(coal, fx(-6.0))], Fixed64::ZERO)],
        );
        b.add_line(
            coal,
            mine,
            sink,
            vec![
                LineLevel::new(fx(5.0), Fixed64::ZERO),
                LineLevel::new(fx(10.0), fx(2.5)),
            ],
        );
        b.build().unwrap()
    }

    #[test]
    fn initial_is_all_zero() {
        let catalog = two_level_catalog();
        let conf = Configuration::initial(&catalog);
        assert_eq!(conf.facility_levels, vec![0, 0]);
        assert_eq!(conf.line_levels, vec![0]);
        assert!(conf.validate(&catalog).is_ok());
    }

    #[test]
    fn cost_from_sums_incremental_costs() {
        let catalog = two_level_catalog();
        let base = Configuration::initial(&catalog);
        let mut conf = base.clone();
        conf.upgrade_facility(FacilityId(0));
        conf.upgrade_facility(FacilityId(0));
        conf.upgrade_line(LineId(0));
        assert_eq!(conf.cost_from(&catalog, &base).unwrap(), fx(9.5));
        assert_eq!(base.cost_from(&catalog, &base).unwrap(), Fixed64::ZERO);
    }

    #[test]
    fn cost_from_reports_overflow() {
        let catalog = crate::test_utils::costly_mine();
        let base = Configuration::initial(&catalog);
        let mut conf = base.clone();
        conf.upgrade_facility(FacilityId(0));
        conf.upgrade_facility(FacilityId(0));
        assert_eq!(conf.cost_from(&catalog, &base).unwrap(), fx(2e9));

        conf.upgrade_facility(FacilityId(0));
        assert_eq!(
            conf.cost_from(&catalog, &base),
            Err(ConfigurationError::CostOverflow)
        );
    }

    #[test]
    fn cost_from_rejects_downgrades() {
        let catalog = two_level_catalog();
        let base = Configuration::initial(&catalog);
        let mut upgraded = base.clone();
        upgraded.upgrade_line(LineId(0));
        assert!(matches!(
            base.cost_from(&catalog, &upgraded),
            Err(ConfigurationError::NotAnUpgrade(_))
        ));
    }

    #[test]
    fn validate_detects_shape_and_range_errors() {
        let catalog = two_level_catalog();
        let mut conf = Configuration::initial(&catalog);
        conf.line_levels.push(0);
        assert_eq!(
            conf.validate(&catalog),
            Err(ConfigurationError::LineCount {
                expected: 1,
                got: 2
            })
        );

        let mut conf = Configuration::initial(&catalog);
        conf.upgrade_facility(FacilityId(1));
        assert!(matches!(
            conf.validate(&catalog),
            Err(ConfigurationError::FacilityLevelOutOfRange { .. })
        ));
    }
}
