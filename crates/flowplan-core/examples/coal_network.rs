//! Coal network example: fifteen facilities, fourteen lines, one item.
//!
//! Evaluates the network, prints the converged flow graph as DOT, then
//! raises the big forge's demand until upgrades are needed and plans them.
//!
//! Run with: `RUST_LOG=debug cargo run -p flowplan-core --example coal_network`

use flowplan_core::dot;
use flowplan_core::network::Network;
use flowplan_core::search::{PlanOutcome, Planner, UpgradeAction};
use flowplan_core::test_utils::{coal, coal_network, coal_network_with};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // --- Evaluate the baseline network ---

    let network = Network::initialize(coal_network())?;
    let initial = network.catalog().initial_configuration();
    let snapshot = network.evaluate(coal(), &initial)?;
    info!(
        iterations = snapshot.iterations,
        feasible = snapshot.feasible,
        "baseline evaluated"
    );
    print!("{}", dot::render(network.catalog(), &snapshot));

    // --- Plan upgrades for increasing demand ---

    for demand in [30.0, 40.0, 60.0] {
        let network = Network::initialize(coal_network_with(demand))?;
        let catalog = network.catalog();
        let outcome = Planner::new(&network).plan(&catalog.initial_configuration())?;

        match &outcome {
            PlanOutcome::Found(plan) => {
                println!("demand {demand}: cost {}", plan.total_cost);
                for action in &plan.actions {
                    match *action {
                        UpgradeAction::Facility { id, to_level, cost } => {
                            let name = catalog.facility(id).map_or("?", |f| f.name.as_str());
                            println!("  upgrade {name} to level {to_level} for {cost}");
                        }
                        UpgradeAction::Line { id, to_level, cost } => {
                            println!("  upgrade {id} to level {to_level} for {cost}");
                        }
                    }
                }
            }
            other => println!("demand {demand}: no plan (cost {})", other.total_cost()),
        }
        let stats = outcome.stats();
        info!(
            demand,
            expanded = stats.expanded,
            pruned = stats.pruned,
            evaluations = stats.evaluations,
            "search finished"
        );
    }
    Ok(())
}
