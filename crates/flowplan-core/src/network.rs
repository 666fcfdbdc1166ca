//! The initialized network: catalog, per-item topology tables and solver
//! settings. This is the feasibility oracle the search engine queries.

use crate::catalog::Catalog;
use crate::configuration::Configuration;
use crate::flow::{FlowGraph, FlowSnapshot, SolverConfig, SolverError};
use crate::id::ItemTypeId;
use crate::topology::{Topology, TopologyError};

/// A catalog together with its precomputed topology. Immutable once
/// initialized; every evaluation builds a fresh [`FlowGraph`].
#[derive(Debug, Clone)]
pub struct Network {
    catalog: Catalog,
    topology: Topology,
    solver: SolverConfig,
}

impl Network {
    /// Prepare the topology tables for every item type. Fails with
    /// [`TopologyError::Cyclic`] if any item's lines form a cycle.
    pub fn initialize(catalog: Catalog) -> Result<Self, TopologyError> {
        let topology = Topology::prepare(&catalog)?;
        Ok(Self {
            catalog,
            topology,
            solver: SolverConfig::default(),
        })
    }

    /// Replace the solver settings.
    pub fn with_solver_config(mut self, solver: SolverConfig) -> Self {
        self.solver = solver;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn solver_config(&self) -> &SolverConfig {
        &self.solver
    }

    /// Build the flow graph for `item` under `conf` without solving it.
    pub fn flow_graph(
        &self,
        item: ItemTypeId,
        conf: &Configuration,
    ) -> Result<FlowGraph, SolverError> {
        let topology = self
            .topology
            .for_item(item)
            .ok_or(SolverError::UnknownItem(item))?;
        FlowGraph::build(&self.catalog, topology, conf)
    }

    /// Build and solve the flow graph for `item` under `conf`.
    pub fn evaluate(
        &self,
        item: ItemTypeId,
        conf: &Configuration,
    ) -> Result<FlowSnapshot, SolverError> {
        let mut graph = self.flow_graph(item, conf)?;
        let report = graph.solve(&self.solver)?;
        Ok(graph.snapshot(report, self.solver.tolerance))
    }

    /// Evaluate every item type under `conf`, most basic first.
    #[cfg(not(feature = "parallel"))]
    pub fn evaluate_all(&self, conf: &Configuration) -> Result<Vec<FlowSnapshot>, SolverError> {
        self.catalog
            .item_ids()
            .map(|item| self.evaluate(item, conf))
            .collect()
    }

    /// Evaluate every item type under `conf`, most basic first. Item types
    /// are independent and are solved in parallel.
    #[cfg(feature = "parallel")]
    pub fn evaluate_all(&self, conf: &Configuration) -> Result<Vec<FlowSnapshot>, SolverError> {
        use rayon::prelude::*;

        let items: Vec<ItemTypeId> = self.catalog.item_ids().collect();
        items
            .par_iter()
            .map(|&item| self.evaluate(item, conf))
            .collect()
    }
}
