//! Criterion benchmarks for the planner.
//!
//! Two benchmark groups:
//! - `evaluate`: one equilibrium solve of the coal network, and of a wide
//!   generated fan-out network
//! - `plan`: full searches on the coal network at increasing demand

use criterion::{Criterion, criterion_group, criterion_main};
use flowplan_core::catalog::{Catalog, CatalogBuilder};
use flowplan_core::network::Network;
use flowplan_core::search::Planner;
use flowplan_core::test_utils::*;

// ===========================================================================
// Network builders
// ===========================================================================

/// `mines` mines feeding one splitter that fans out to `sinks` consumers.
fn build_fan_out(mines: usize, sinks: usize) -> Catalog {
    let mut b = CatalogBuilder::new();
    let coal = b.register_item("coal");
    let hub = b.add_facility("hub", splitter());
    for i in 0..mines {
        let mine = b.add_facility(&format!("mine-{i}"), rate_levels(coal, &[(3.0, 0.0), (5.0, 1.0)]));
        b.add_line(coal, mine, hub, line_levels(&[(4.0, 0.0), (8.0, 1.0)]));
    }
    for i in 0..sinks {
        let demand = 1.0 + (i % 4) as f64;
        let sink = b.add_facility(&format!("sink-{i}"), fixed_rate(coal, -demand));
        b.add_line(coal, hub, sink, line_levels(&[(10.0, 0.0)]));
    }
    b.build().unwrap()
}

// ===========================================================================
// Benchmarks
// ===========================================================================

fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate");

    let network = initialized(coal_network());
    let conf = network.catalog().initial_configuration();
    group.bench_function("coal_network", |b| {
        b.iter(|| network.evaluate(coal(), &conf).unwrap());
    });

    let network = initialized(build_fan_out(20, 100));
    let conf = network.catalog().initial_configuration();
    group.bench_function("fan_out_20x100", |b| {
        b.iter(|| network.evaluate(coal(), &conf).unwrap());
    });

    group.bench_function("initialize_fan_out_20x100", |b| {
        b.iter(|| Network::initialize(build_fan_out(20, 100)).unwrap());
    });

    group.finish();
}

fn bench_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan");
    group.sample_size(20);

    for demand in [30.0, 40.0] {
        let network = initialized(coal_network_with(demand));
        let conf = network.catalog().initial_configuration();
        group.bench_function(format!("coal_network_demand_{demand}"), |b| {
            b.iter(|| Planner::new(&network).plan(&conf).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_evaluate, bench_plan);
criterion_main!(benches);
