//! Per-item flow graph and its equilibrium solver.
//!
//! A [`FlowGraph`] is rebuilt for every evaluation from the cached
//! [`ItemTopology`] and a [`Configuration`]. Nodes and edges live in
//! `SlotMap` arenas; adjacency lists hold edge keys, never references.
//!
//! # Equilibrium
//!
//! Each iteration runs, in topological order:
//!
//! 1. **Forward** -- every node produces (or consumes what has arrived) and
//!    splits what it holds over its outgoing edges by fair share, bounded by
//!    each edge's effective capacity. Leftover becomes `excess`; a producer
//!    first throttles its own output by that leftover.
//! 2. **Convergence check** -- done when every node's excess is within the
//!    tolerance.
//! 3. **Backward** -- every node with excess shrinks the effective capacity
//!    of its incoming edges by fair share of what it actually wants, so
//!    upstream pushes less on the next forward pass.

use crate::catalog::Catalog;
use crate::configuration::{Configuration, ConfigurationError};
use crate::fixed::{Fixed64, f64_to_fixed64, share_of};
use crate::id::*;
use crate::topology::ItemTopology;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use tracing::warn;

// ---------------------------------------------------------------------------
// Configuration and errors
// ---------------------------------------------------------------------------

/// Solver parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Residual excess below which the equilibrium counts as converged, and
    /// the slack allowed when checking that consumers are supplied.
    pub tolerance: Fixed64,
    /// Hard cap on forward/backward iterations.
    pub max_iterations: u32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: f64_to_fixed64(0.001),
            max_iterations: 1000,
        }
    }
}

/// Internal bookkeeping violations of the fair-share allocation. These
/// indicate a solver bug, never an infeasible network.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SolverError {
    #[error("unknown item type: {0}")]
    UnknownItem(ItemTypeId),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("topology tables for {0} do not match the catalog")]
    TopologyMismatch(ItemTypeId),
    #[error("fair-share division with no remaining edges at {facility}")]
    NoRemainingEdges { facility: FacilityId },
    #[error("negative residual {residual} in fair-share at {facility}")]
    NegativeResidual {
        facility: FacilityId,
        residual: Fixed64,
    },
}

// ---------------------------------------------------------------------------
// Arena data
// ---------------------------------------------------------------------------

/// A facility as seen by one item's flow graph.
#[derive(Debug, Clone)]
pub struct FlowNode {
    pub facility: FacilityId,
    /// Configured rate for the item: positive produces, negative consumes,
    /// zero is a pass-through splitter.
    pub max_production: Fixed64,
    pub actual_production: Fixed64,
    pub excess: Fixed64,
    inputs: Vec<FlowEdgeId>,
    outputs: Vec<FlowEdgeId>,
}

impl FlowNode {
    pub fn inputs(&self) -> &[FlowEdgeId] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[FlowEdgeId] {
        &self.outputs
    }

    /// Amount this node must receive to be satisfied.
    pub fn demand(&self) -> Fixed64 {
        if self.max_production < Fixed64::ZERO {
            -self.max_production
        } else {
            Fixed64::ZERO
        }
    }
}

/// A transport line as seen by one item's flow graph.
#[derive(Debug, Clone)]
pub struct FlowEdge {
    pub line: LineId,
    pub from: FlowNodeId,
    pub to: FlowNodeId,
    /// Configured capacity.
    pub capacity: Fixed64,
    /// Capacity after back-pressure throttling.
    pub actual_capacity: Fixed64,
    pub actual_flow: Fixed64,
}

/// Outcome of [`FlowGraph::solve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolveReport {
    pub iterations: u32,
    pub converged: bool,
}

// ---------------------------------------------------------------------------
// Fair share
// ---------------------------------------------------------------------------

struct Allocation {
    amounts: Vec<Fixed64>,
    /// Amount left after saturating edges; the shared amount if some edge
    /// stayed below its capacity.
    remaining: Fixed64,
    /// Edges that did not saturate.
    open: usize,
}

/// Split `amount` over `slots`, which must be sorted ascending by capacity.
/// Each slot gets the smaller of its capacity and an even share of what is
/// left among the slots still open.
fn fair_share(
    amount: Fixed64,
    slots: &[(Fixed64, FlowEdgeId)],
    facility: FacilityId,
    tolerance: Fixed64,
) -> Result<Allocation, SolverError> {
    let mut remaining = amount;
    let mut open = slots.len();
    let mut amounts = Vec::with_capacity(slots.len());

    for &(capacity, _) in slots {
        let share = share_of(remaining, open).ok_or(SolverError::NoRemainingEdges { facility })?;
        if share < capacity {
            amounts.push(share);
        } else {
            amounts.push(capacity);
            remaining -= capacity;
            open -= 1;
        }
        if remaining < -tolerance {
            return Err(SolverError::NegativeResidual {
                facility,
                residual: remaining,
            });
        }
    }

    Ok(Allocation {
        amounts,
        remaining: remaining.max(Fixed64::ZERO),
        open,
    })
}

// ---------------------------------------------------------------------------
// FlowGraph
// ---------------------------------------------------------------------------

/// The derived flow graph for one item type under one configuration.
#[derive(Debug, Clone)]
pub struct FlowGraph {
    item: ItemTypeId,
    nodes: SlotMap<FlowNodeId, FlowNode>,
    edges: SlotMap<FlowEdgeId, FlowEdge>,
    /// Nodes in topological order (matches `ItemTopology::facilities`).
    order: Vec<FlowNodeId>,
    /// Edges in per-item line table order (matches `ItemTopology::lines`).
    edge_order: Vec<FlowEdgeId>,
}

impl FlowGraph {
    /// Build the flow graph for `topology`'s item under `conf`.
    pub fn build(
        catalog: &Catalog,
        topology: &ItemTopology,
        conf: &Configuration,
    ) -> Result<Self, SolverError> {
        conf.validate(catalog)?;
        let item = topology.item();

        let mut nodes = SlotMap::with_capacity_and_key(topology.facilities().len());
        let mut order = Vec::with_capacity(topology.facilities().len());
        for &facility_id in topology.facilities() {
            let facility = catalog
                .facility(facility_id)
                .ok_or(SolverError::TopologyMismatch(item))?;
            let level = &facility.levels[conf.facility_level(facility_id) as usize];
            order.push(nodes.insert(FlowNode {
                facility: facility_id,
                max_production: level.rate(item),
                actual_production: Fixed64::ZERO,
                excess: Fixed64::ZERO,
                inputs: Vec::new(),
                outputs: Vec::new(),
            }));
        }

        let mut edges = SlotMap::with_capacity_and_key(topology.lines().len());
        let mut edge_order = Vec::with_capacity(topology.lines().len());
        for &line_id in topology.lines() {
            let line = catalog
                .line(line_id)
                .ok_or(SolverError::TopologyMismatch(item))?;
            let (Some(from), Some(to)) = (
                topology.position_of_facility(line.from),
                topology.position_of_facility(line.to),
            ) else {
                return Err(SolverError::TopologyMismatch(item));
            };
            let capacity = line.levels[conf.line_level(line_id) as usize].capacity;
            let (from, to) = (order[from], order[to]);
            let edge_id = edges.insert(FlowEdge {
                line: line_id,
                from,
                to,
                capacity,
                actual_capacity: capacity,
                actual_flow: Fixed64::ZERO,
            });
            nodes[from].outputs.push(edge_id);
            nodes[to].inputs.push(edge_id);
            edge_order.push(edge_id);
        }

        Ok(Self {
            item,
            nodes,
            edges,
            order,
            edge_order,
        })
    }

    pub fn item(&self) -> ItemTypeId {
        self.item
    }

    /// Nodes in topological order.
    pub fn nodes(&self) -> impl Iterator<Item = (FlowNodeId, &FlowNode)> {
        self.order.iter().map(|&id| (id, &self.nodes[id]))
    }

    /// Edges in per-item line order.
    pub fn edges(&self) -> impl Iterator<Item = (FlowEdgeId, &FlowEdge)> {
        self.edge_order.iter().map(|&id| (id, &self.edges[id]))
    }

    pub fn node(&self, id: FlowNodeId) -> Option<&FlowNode> {
        self.nodes.get(id)
    }

    pub fn edge(&self, id: FlowEdgeId) -> Option<&FlowEdge> {
        self.edges.get(id)
    }

    /// Sum of actual flow over a node's incoming edges, saturating at
    /// `Fixed64::MAX`. Every demand is far below that, so a saturated sum
    /// still reads as supplied.
    pub fn incoming(&self, id: FlowNodeId) -> Fixed64 {
        self.nodes[id]
            .inputs
            .iter()
            .fold(Fixed64::ZERO, |acc, &e| acc.saturating_add(self.edges[e].actual_flow))
    }

    /// Amount a node holds for pushing downstream.
    pub fn available(&self, id: FlowNodeId) -> Fixed64 {
        self.incoming(id)
            .saturating_add(self.nodes[id].actual_production)
            .max(Fixed64::ZERO)
    }

    /// Iterate forward/backward passes until every excess is within the
    /// tolerance or the iteration cap is hit.
    pub fn solve(&mut self, config: &SolverConfig) -> Result<SolveReport, SolverError> {
        let order = self.order.clone();
        for iteration in 1..=config.max_iterations {
            for &id in &order {
                self.update_forward(id, config.tolerance)?;
            }

            // Backward passes never change excess, so checking here ends on
            // the same iteration as checking after them. Skipping the last
            // one keeps every flow within the capacity it was allocated under.
            if self.nodes.values().all(|n| n.excess <= config.tolerance) {
                return Ok(SolveReport {
                    iterations: iteration,
                    converged: true,
                });
            }

            for &id in order.iter().rev() {
                self.update_backward(id, config.tolerance)?;
            }
        }

        warn!(
            item = self.item.0,
            max_iterations = config.max_iterations,
            "flow equilibrium did not converge"
        );
        Ok(SolveReport {
            iterations: config.max_iterations,
            converged: false,
        })
    }

    /// Push the node's available amount out along its outgoing edges.
    fn update_forward(&mut self, id: FlowNodeId, tolerance: Fixed64) -> Result<(), SolverError> {
        let incoming = self.incoming(id);
        let node = &mut self.nodes[id];
        node.actual_production = if node.max_production > Fixed64::ZERO {
            node.max_production
        } else {
            // Never consume more than has arrived.
            -incoming.min(-node.max_production)
        };
        let available = incoming
            .saturating_add(node.actual_production)
            .max(Fixed64::ZERO);
        let facility = node.facility;

        let mut slots: Vec<(Fixed64, FlowEdgeId)> = node
            .outputs
            .iter()
            .map(|&e| (self.edges[e].actual_capacity, e))
            .collect();
        slots.sort();

        let allocation = fair_share(available, &slots, facility, tolerance)?;
        for (&(_, edge), &amount) in slots.iter().zip(&allocation.amounts) {
            self.edges[edge].actual_flow = amount;
        }

        let node = &mut self.nodes[id];
        if allocation.open == 0 {
            node.excess = allocation.remaining;
            if node.actual_production > Fixed64::ZERO {
                let reduction = node.excess.min(node.actual_production);
                node.actual_production -= reduction;
                node.excess -= reduction;
            }
        } else {
            node.excess = Fixed64::ZERO;
        }
        Ok(())
    }

    /// Throttle incoming edges of a node that could not move everything.
    fn update_backward(&mut self, id: FlowNodeId, tolerance: Fixed64) -> Result<(), SolverError> {
        let node = &self.nodes[id];
        if node.excess <= Fixed64::ZERO {
            return Ok(());
        }
        let wanted = (self.incoming(id) - node.excess).max(Fixed64::ZERO);
        let facility = node.facility;

        let mut slots: Vec<(Fixed64, FlowEdgeId)> = node
            .inputs
            .iter()
            .map(|&e| (self.edges[e].actual_flow, e))
            .collect();
        slots.sort();

        let allocation = fair_share(wanted, &slots, facility, tolerance)?;
        for (&(_, edge), &amount) in slots.iter().zip(&allocation.amounts) {
            self.edges[edge].actual_capacity = amount;
        }
        Ok(())
    }

    /// True when every node receives at least its demand, within `tolerance`.
    pub fn is_feasible(&self, tolerance: Fixed64) -> bool {
        self.order
            .iter()
            .all(|&id| self.incoming(id).saturating_add(tolerance) >= self.nodes[id].demand())
    }

    /// Read-only record of the current state.
    pub fn snapshot(&self, report: SolveReport, tolerance: Fixed64) -> FlowSnapshot {
        let nodes: Vec<NodeState> = self
            .order
            .iter()
            .map(|&id| {
                let node = &self.nodes[id];
                let incoming = self.incoming(id);
                NodeState {
                    facility: node.facility,
                    max_production: node.max_production,
                    actual_production: node.actual_production,
                    incoming,
                    excess: node.excess,
                    satisfied: incoming.saturating_add(tolerance) >= node.demand(),
                }
            })
            .collect();

        let position = |node: FlowNodeId| self.order.iter().position(|&n| n == node).unwrap_or(0);
        let edges = self
            .edge_order
            .iter()
            .map(|&id| {
                let edge = &self.edges[id];
                EdgeState {
                    line: edge.line,
                    from: position(edge.from),
                    to: position(edge.to),
                    capacity: edge.capacity,
                    actual_capacity: edge.actual_capacity,
                    actual_flow: edge.actual_flow,
                }
            })
            .collect();

        let feasible = nodes.iter().all(|n| n.satisfied);
        FlowSnapshot {
            item: self.item,
            nodes,
            edges,
            iterations: report.iterations,
            converged: report.converged,
            feasible,
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Converged state of one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeState {
    pub facility: FacilityId,
    pub max_production: Fixed64,
    pub actual_production: Fixed64,
    pub incoming: Fixed64,
    pub excess: Fixed64,
    /// Incoming flow covers demand.
    pub satisfied: bool,
}

impl NodeState {
    /// A producer running at its full configured rate.
    pub fn at_capacity(&self) -> bool {
        self.max_production > Fixed64::ZERO && self.actual_production == self.max_production
    }
}

/// Converged state of one edge. `from`/`to` are node positions in the
/// snapshot's topological order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeState {
    pub line: LineId,
    pub from: usize,
    pub to: usize,
    pub capacity: Fixed64,
    pub actual_capacity: Fixed64,
    pub actual_flow: Fixed64,
}

impl EdgeState {
    /// Flow equals the configured capacity.
    pub fn at_capacity(&self) -> bool {
        self.actual_flow == self.capacity
    }
}

/// Structured result of evaluating one item type under one configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowSnapshot {
    pub item: ItemTypeId,
    /// Nodes in topological order.
    pub nodes: Vec<NodeState>,
    pub edges: Vec<EdgeState>,
    pub iterations: u32,
    pub converged: bool,
    pub feasible: bool,
}

impl FlowSnapshot {
    /// Producers running at their configured rate.
    pub fn saturated_producers(&self) -> impl Iterator<Item = FacilityId> + '_ {
        self.nodes
            .iter()
            .filter(|n| n.at_capacity())
            .map(|n| n.facility)
    }

    /// Lines whose flow equals their configured capacity.
    pub fn saturated_lines(&self) -> impl Iterator<Item = LineId> + '_ {
        self.edges
            .iter()
            .filter(|e| e.at_capacity())
            .map(|e| e.line)
    }

    /// Consumers that receive less than their demand.
    pub fn under_supplied(&self) -> impl Iterator<Item = FacilityId> + '_ {
        self.nodes
            .iter()
            .filter(|n| !n.satisfied)
            .map(|n| n.facility)
    }

    pub fn node_for(&self, facility: FacilityId) -> Option<&NodeState> {
        self.nodes.iter().find(|n| n.facility == facility)
    }

    pub fn edge_for(&self, line: LineId) -> Option<&EdgeState> {
        self.edges.iter().find(|e| e.line == line)
    }
}
