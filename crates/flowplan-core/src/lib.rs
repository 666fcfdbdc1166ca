//! Flowplan Core -- upgrade planning for production networks.
//!
//! A network is a set of facilities that produce and consume item types,
//! joined by capacity-limited transport lines. Every facility and line has a
//! ladder of upgrade levels with incremental costs. This crate finds the
//! cheapest set of upgrades under which every consumer is supplied.
//!
//! # Pipeline
//!
//! 1. **Catalog** -- [`catalog::CatalogBuilder`] validates and freezes the
//!    static description of items, facilities and lines.
//! 2. **Topology** -- [`network::Network::initialize`] orders the relevant
//!    facilities of every item type once, rejecting cyclic line layouts.
//! 3. **Equilibrium** -- [`network::Network::evaluate`] builds the
//!    [`flow::FlowGraph`] for one item type under one
//!    [`configuration::Configuration`], balances it with fair-share
//!    allocation and back-pressure, and returns a [`flow::FlowSnapshot`].
//! 4. **Search** -- [`search::Planner`] runs a uniform-cost search over
//!    configurations, most advanced item type first, merging states that
//!    only differ in parts that no longer matter.
//!
//! ```rust,ignore
//! let network = Network::initialize(catalog)?;
//! let outcome = Planner::new(&network).plan(&network.catalog().initial_configuration())?;
//! println!("cost: {}", outcome.total_cost());
//! ```
//!
//! # Key Types
//!
//! - [`catalog::Catalog`] -- Immutable description of the network.
//! - [`configuration::Configuration`] -- Current level of every facility
//!   and line.
//! - [`flow::FlowSnapshot`] -- Converged per-item state: node and edge
//!   records plus the feasibility verdict.
//! - [`search::PlanOutcome`] -- A plan, proof of infeasibility, or a
//!   budget-limited partial result.
//! - [`fixed::Fixed64`] -- Q32.32 fixed-point type for exact, reproducible
//!   arithmetic.
//! - [`serialize`] -- Versioned binary snapshots via bitcode.

pub mod catalog;
pub mod configuration;
pub mod dot;
pub mod fixed;
pub mod flow;
pub mod id;
pub mod network;
pub mod search;
pub mod serialize;
pub mod topology;
pub mod validation;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
