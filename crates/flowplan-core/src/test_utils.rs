//! Shared fixtures for unit tests, integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::catalog::{Catalog, CatalogBuilder, FacilityLevel, LineLevel};
use crate::fixed::Fixed64;
use crate::id::*;
use crate::network::Network;

// ===========================================================================
// Fixed-point helper
// ===========================================================================

pub fn fixed(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

// ===========================================================================
// Item constructors
// ===========================================================================

/// The only item of [`coal_network`].
pub fn coal() -> ItemTypeId {
    ItemTypeId(0)
}

/// Most basic item of the two-item fixtures.
pub fn ore() -> ItemTypeId {
    ItemTypeId(0)
}

/// Most advanced item of the two-item fixtures.
pub fn plate() -> ItemTypeId {
    ItemTypeId(1)
}

// ===========================================================================
// Level constructors
// ===========================================================================

/// A single free level with the given rate for `item`.
pub fn fixed_rate(item: ItemTypeId, rate: f64) -> Vec<FacilityLevel> {
    vec![FacilityLevel::new([(item, fixed(rate))], Fixed64::ZERO)]
}

/// Levels `(rate, incremental_cost)` for a single-item facility.
pub fn rate_levels(item: ItemTypeId, levels: &[(f64, f64)]) -> Vec<FacilityLevel> {
    levels
        .iter()
        .map(|&(rate, cost)| FacilityLevel::new([(item, fixed(rate))], fixed(cost)))
        .collect()
}

/// A facility with no rates: a pure pass-through splitter.
pub fn splitter() -> Vec<FacilityLevel> {
    vec![FacilityLevel::new([], Fixed64::ZERO)]
}

/// Levels `(capacity, incremental_cost)` for a transport line.
pub fn line_levels(levels: &[(f64, f64)]) -> Vec<LineLevel> {
    levels
        .iter()
        .map(|&(capacity, cost)| LineLevel::new(fixed(capacity), fixed(cost)))
        .collect()
}

pub fn initialized(catalog: Catalog) -> Network {
    match Network::initialize(catalog) {
        Ok(network) => network,
        Err(e) => panic!("fixture catalog failed to initialize: {e}"),
    }
}

fn build(b: CatalogBuilder) -> Catalog {
    match b.build() {
        Ok(catalog) => catalog,
        Err(e) => panic!("fixture catalog is invalid: {e}"),
    }
}

// ===========================================================================
// Catalogs
// ===========================================================================

/// Fifteen-facility coal network: four mines, eleven consumers and
/// splitters, fourteen lines of capacity 50. Mines have two further levels
/// at 1.5x and 2x output; lines can double their capacity.
///
/// `sink_demand` overrides the demand of the large consumer (facility 6,
/// 24 by default), which makes the network tight enough to need upgrades.
pub fn coal_network_with(sink_demand: f64) -> Catalog {
    let mut b = CatalogBuilder::new();
    let coal = b.register_item("coal");

    let mine = |rate: f64| rate_levels(coal, &[(rate, 0.0), (rate * 1.5, 2.0), (rate * 2.0, 3.0)]);
    let f: Vec<FacilityId> = [
        ("mine-0", mine(10.0)),
        ("mine-1", mine(20.0)),
        ("mine-2", mine(25.0)),
        ("mine-3", mine(15.0)),
        ("boiler-4", fixed_rate(coal, -2.0)),
        ("split-5", splitter()),
        ("forge-6", fixed_rate(coal, -sink_demand)),
        ("boiler-7", fixed_rate(coal, -2.0)),
        ("boiler-8", fixed_rate(coal, -4.0)),
        ("boiler-9", fixed_rate(coal, -3.0)),
        ("split-10", splitter()),
        ("split-11", splitter()),
        ("plant-12", fixed_rate(coal, -8.0)),
        ("plant-13", fixed_rate(coal, -7.0)),
        ("plant-14", fixed_rate(coal, -14.0)),
    ]
    .into_iter()
    .map(|(name, levels)| b.add_facility(name, levels))
    .collect();

    for (from, to) in [
        (0, 4),
        (4, 5),
        (1, 5),
        (5, 6),
        (6, 7),
        (7, 11),
        (2, 8),
        (2, 9),
        (8, 10),
        (10, 11),
        (11, 12),
        (11, 13),
        (11, 14),
        (3, 14),
    ] {
        b.add_line(coal, f[from], f[to], line_levels(&[(50.0, 0.0), (100.0, 1.0)]));
    }
    build(b)
}

/// [`coal_network_with`] at its default demand.
pub fn coal_network() -> Catalog {
    coal_network_with(24.0)
}

/// Facilities of [`smelting_chain`], in catalog order.
pub const MINE: FacilityId = FacilityId(0);
pub const FURNACE: FacilityId = FacilityId(1);
pub const ASSEMBLER: FacilityId = FacilityId(2);

/// Ore mine -> furnace -> plate assembler.
///
/// Initially the assembler is short of plates. The cheapest plan upgrades
/// the furnace (cost 4), after which the ore line is the bottleneck
/// (cost 1): total 5.
pub fn smelting_chain() -> Catalog {
    let mut b = CatalogBuilder::new();
    let ore = b.register_item("ore");
    let plate = b.register_item("plate");

    let mine = b.add_facility("mine", rate_levels(ore, &[(6.0, 0.0), (9.0, 2.0), (12.0, 3.0)]));
    let furnace = b.add_facility(
        "furnace",
        vec![
            FacilityLevel::new([(ore, fixed(-4.0)), (plate, fixed(2.0))], Fixed64::ZERO),
            FacilityLevel::new([(ore, fixed(-6.0)), (plate, fixed(3.0))], fixed(4.0)),
        ],
    );
    let assembler = b.add_facility("assembler", fixed_rate(plate, -3.0));
    b.add_line(ore, mine, furnace, line_levels(&[(5.0, 0.0), (10.0, 1.0)]));
    b.add_line(plate, furnace, assembler, line_levels(&[(10.0, 0.0)]));
    build(b)
}

/// Two interchangeable plate presses feeding one assembler, and an
/// independent ore mine feeding a kiln. Upgrading either press (cost 1)
/// fixes the plate level, and the resulting states are equivalent once the
/// search moves on to ore. The mine upgrade costs 2: total 3.
pub fn parallel_presses() -> Catalog {
    let mut b = CatalogBuilder::new();
    let ore = b.register_item("ore");
    let plate = b.register_item("plate");

    let mine = b.add_facility("mine", rate_levels(ore, &[(1.0, 0.0), (3.0, 2.0)]));
    let kiln = b.add_facility("kiln", fixed_rate(ore, -2.0));
    let press_a = b.add_facility("press-a", rate_levels(plate, &[(2.0, 0.0), (3.0, 1.0)]));
    let press_b = b.add_facility("press-b", rate_levels(plate, &[(2.0, 0.0), (3.0, 1.0)]));
    let assembler = b.add_facility("assembler", fixed_rate(plate, -5.0));
    b.add_line(ore, mine, kiln, line_levels(&[(10.0, 0.0)]));
    b.add_line(plate, press_a, assembler, line_levels(&[(10.0, 0.0)]));
    b.add_line(plate, press_b, assembler, line_levels(&[(10.0, 0.0)]));
    build(b)
}

/// A mine whose three upgrades cost 1e9 each, feeding a sink that needs
/// all of them. Each cost is within the catalog bound but the total of
/// 3e9 is not representable.
pub fn costly_mine() -> Catalog {
    let mut b = CatalogBuilder::new();
    let coal = b.register_item("coal");
    let mine = b.add_facility(
        "mine",
        rate_levels(coal, &[(1.0, 0.0), (2.0, 1e9), (3.0, 1e9), (4.0, 1e9)]),
    );
    let sink = b.add_facility("sink", fixed_rate(coal, -4.0));
    b.add_line(coal, mine, sink, line_levels(&[(10.0, 0.0)]));
    build(b)
}

/// One producer and one consumer joined by one line, each with three
/// levels of strictly increasing cost. The consumer needs 5.
///
/// Producer rates 2/4/6 (costs 0/3/4), line capacities 3/5/8 (costs
/// 0/2/5), consumer levels cost 0/1/1 and never help. Minimum: producer at
/// level 2 and line at level 1, cost 9.
pub fn single_line() -> Catalog {
    let mut b = CatalogBuilder::new();
    let coal = b.register_item("coal");
    let producer = b.add_facility(
        "producer",
        rate_levels(coal, &[(2.0, 0.0), (4.0, 3.0), (6.0, 4.0)]),
    );
    let consumer = b.add_facility(
        "consumer",
        rate_levels(coal, &[(-5.0, 0.0), (-5.0, 1.0), (-5.0, 1.0)]),
    );
    b.add_line(coal, producer, consumer, line_levels(&[(3.0, 0.0), (5.0, 2.0), (8.0, 5.0)]));
    build(b)
}

/// A consumer that no upgrade can satisfy.
pub fn impossible() -> Catalog {
    let mut b = CatalogBuilder::new();
    let coal = b.register_item("coal");
    let producer = b.add_facility("producer", rate_levels(coal, &[(2.0, 0.0), (3.0, 1.0)]));
    let consumer = b.add_facility("consumer", fixed_rate(coal, -10.0));
    b.add_line(coal, producer, consumer, line_levels(&[(5.0, 0.0), (20.0, 1.0)]));
    build(b)
}

/// Plate lines loop between two facilities; coal lines are acyclic.
pub fn cyclic_catalog() -> Catalog {
    let mut b = CatalogBuilder::new();
    let coal = b.register_item("coal");
    let plate = b.register_item("plate");
    let x = b.add_facility("x", fixed_rate(coal, 1.0));
    let y = b.add_facility("y", fixed_rate(coal, -1.0));
    b.add_line(coal, x, y, line_levels(&[(5.0, 0.0)]));
    b.add_line(plate, x, y, line_levels(&[(5.0, 0.0)]));
    b.add_line(plate, y, x, line_levels(&[(5.0, 0.0)]));
    build(b)
}
