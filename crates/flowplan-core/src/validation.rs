//! Consistency checks for search states.
//!
//! The search only moves to a more basic item after the current one is
//! feasible, and upgrades never reduce capability, so every item more
//! refined than a state's current level must stay feasible. These routines
//! re-verify that claim explicitly; they are exercised by tests and by the
//! search only when asked to.

use crate::configuration::Configuration;
use crate::flow::{FlowSnapshot, SolverError};
use crate::id::{FacilityId, ItemLevel, ItemTypeId};
use crate::network::Network;

/// An already-validated item type that is no longer feasible.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConsistencyError {
    #[error("{item} was validated but is now infeasible (under-supplied: {under_supplied:?})")]
    ValidatedItemInfeasible {
        item: ItemTypeId,
        under_supplied: Vec<FacilityId>,
    },
    #[error(transparent)]
    Solver(#[from] SolverError),
}

/// Item types strictly more refined than `level`, most basic first.
pub fn validated_items(network: &Network, level: ItemLevel) -> Vec<ItemTypeId> {
    network
        .catalog()
        .item_ids()
        .filter(|&item| !level.covers(item))
        .collect()
}

fn check(snapshot: FlowSnapshot) -> Result<(), ConsistencyError> {
    if snapshot.feasible {
        Ok(())
    } else {
        Err(ConsistencyError::ValidatedItemInfeasible {
            item: snapshot.item,
            under_supplied: snapshot.under_supplied().collect(),
        })
    }
}

/// Verify that every item type more refined than `level` is feasible under
/// `conf`. Reports the most basic failing item.
#[cfg(not(feature = "parallel"))]
pub fn verify_validated_levels(
    network: &Network,
    level: ItemLevel,
    conf: &Configuration,
) -> Result<(), ConsistencyError> {
    for item in validated_items(network, level) {
        check(network.evaluate(item, conf)?)?;
    }
    Ok(())
}

/// Verify that every item type more refined than `level` is feasible under
/// `conf`. Reports the most basic failing item.
#[cfg(feature = "parallel")]
pub fn verify_validated_levels(
    network: &Network,
    level: ItemLevel,
    conf: &Configuration,
) -> Result<(), ConsistencyError> {
    use rayon::prelude::*;

    let snapshots = validated_items(network, level)
        .par_iter()
        .map(|&item| network.evaluate(item, conf))
        .collect::<Result<Vec<_>, _>>()?;
    snapshots.into_iter().try_for_each(check)
}

/// True when `conf` is feasible at every item type.
pub fn is_fully_feasible(network: &Network, conf: &Configuration) -> Result<bool, SolverError> {
    Ok(network.evaluate_all(conf)?.iter().all(|s| s.feasible))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogBuilder, FacilityLevel, LineLevel};
    use crate::fixed::{Fixed64, f64_to_fixed64 as fx};
    use crate::id::LineId;
    use crate::test_utils::*;

    #[test]
    fn validated_items_are_strictly_above_level() {
        let network = Network::initialize(smelting_chain()).unwrap();
        assert_eq!(
            validated_items(&network, ItemLevel::Item(ore())),
            vec![plate()]
        );
        assert!(validated_items(&network, ItemLevel::Item(plate())).is_empty());
        assert_eq!(validated_items(&network, ItemLevel::Done).len(), 2);
    }

    #[test]
    fn detects_a_validated_item_that_became_infeasible() {
        // The upgraded furnace wants more plates than the press can supply.
        let mut b = CatalogBuilder::new();
        let ore = b.register_item("ore");
        let plate = b.register_item("plate");
        let mine = b.add_facility("mine", vec![FacilityLevel::new([(ore, fx(4.0))], Fixed64::ZERO)]);
        let furnace = b.add_facility(
            "furnace",
            vec![
                FacilityLevel::new([(ore, fx(-1.0)), (plate, fx(-1.0))], Fixed64::ZERO),
                FacilityLevel::new([(ore, fx(-2.0)), (plate, fx(-5.0))], fx(1.0)),
            ],
        );
        let press = b.add_facility("press", vec![FacilityLevel::new([(plate, fx(2.0))], Fixed64::ZERO)]);
        b.add_line(ore, mine, furnace, vec![LineLevel::new(fx(10.0), Fixed64::ZERO)]);
        b.add_line(plate, press, furnace, vec![LineLevel::new(fx(10.0), Fixed64::ZERO)]);
        let network = Network::initialize(b.build().unwrap()).unwrap();

        let mut conf = Configuration::initial(network.catalog());
        assert!(verify_validated_levels(&network, ItemLevel::Item(ore), &conf).is_ok());

        conf.upgrade_facility(furnace);
        assert_eq!(
            verify_validated_levels(&network, ItemLevel::Item(ore), &conf),
            Err(ConsistencyError::ValidatedItemInfeasible {
                item: plate,
                under_supplied: vec![furnace],
            })
        );
    }

    #[test]
    fn initial_smelting_chain_is_not_fully_feasible() {
        let network = initialized(smelting_chain());
        let mut conf = Configuration::initial(network.catalog());
        assert!(!is_fully_feasible(&network, &conf).unwrap());

        conf.upgrade_facility(FURNACE);
        conf.upgrade_line(LineId(0));
        assert!(is_fully_feasible(&network, &conf).unwrap());
    }
}
