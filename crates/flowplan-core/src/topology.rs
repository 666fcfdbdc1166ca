//! Per-item topology tables, computed once from the catalog.
//!
//! For every item type the preprocessor collects the relevant facilities,
//! orders them topologically along that item's transport lines (Kahn's
//! algorithm), and records lookup tables between flow graph positions and
//! catalog indices. Every later flow graph construction for the item reuses
//! these tables.

use crate::catalog::Catalog;
use crate::id::*;
use std::collections::VecDeque;
use tracing::debug;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised while preparing the topology.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopologyError {
    /// The item's transport lines form a cycle; the catalog cannot be planned.
    #[error("transport lines for {item} form a cycle")]
    Cyclic { item: ItemTypeId },
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// Topology tables for one item type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemTopology {
    item: ItemTypeId,
    /// Relevant facilities in topological order.
    toposort: Vec<FacilityId>,
    /// Facility index -> position in `toposort`.
    toposort_inv: Vec<Option<usize>>,
    /// Lines carrying the item, in catalog order.
    lines: Vec<LineId>,
    /// Line index -> position in `lines`.
    lines_inv: Vec<Option<usize>>,
}

impl ItemTopology {
    pub fn item(&self) -> ItemTypeId {
        self.item
    }

    /// Relevant facilities, sources before sinks.
    pub fn facilities(&self) -> &[FacilityId] {
        &self.toposort
    }

    /// Lines carrying this item.
    pub fn lines(&self) -> &[LineId] {
        &self.lines
    }

    /// Position of a facility in the topological order, if it is relevant.
    pub fn position_of_facility(&self, id: FacilityId) -> Option<usize> {
        self.toposort_inv.get(id.index()).copied().flatten()
    }

    /// Position of a line in the per-item line table, if it carries the item.
    pub fn position_of_line(&self, id: LineId) -> Option<usize> {
        self.lines_inv.get(id.index()).copied().flatten()
    }
}

/// Topology tables for every item type of a catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    items: Vec<ItemTopology>,
}

impl Topology {
    /// Build the tables for every item. Fails on the first item whose
    /// transport lines contain a cycle.
    pub fn prepare(catalog: &Catalog) -> Result<Self, TopologyError> {
        let items = catalog
            .item_ids()
            .map(|item| prepare_item(catalog, item))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { items })
    }

    pub fn for_item(&self, item: ItemTypeId) -> Option<&ItemTopology> {
        self.items.get(item.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ItemTopology> {
        self.items.iter()
    }
}

/// Facilities with a nonzero rate for `item` at any level, or terminating a
/// line that carries `item`, in catalog order.
fn collect_relevant_facilities(catalog: &Catalog, item: ItemTypeId) -> Vec<FacilityId> {
    catalog
        .facilities()
        .filter(|(_, f)| f.involves(item))
        .map(|(id, _)| id)
        .collect()
}

fn prepare_item(catalog: &Catalog, item: ItemTypeId) -> Result<ItemTopology, TopologyError> {
    let relevant = collect_relevant_facilities(catalog, item);

    let mut lines = Vec::new();
    let mut lines_inv = vec![None; catalog.line_count()];
    for (id, line) in catalog.lines().filter(|(_, l)| l.item == item) {
        lines_inv[id.index()] = Some(lines.len());
        lines.push(id);
    }

    // In-degree and outgoing lines per facility (multigraph: parallel lines
    // each count).
    let mut in_degree = vec![0usize; catalog.facility_count()];
    let mut outgoing: Vec<Vec<FacilityId>> = vec![Vec::new(); catalog.facility_count()];
    for &id in &lines {
        if let Some(line) = catalog.line(id) {
            in_degree[line.to.index()] += 1;
            outgoing[line.from.index()].push(line.to);
        }
    }

    // Seed with zero-in-degree facilities in catalog order for determinism.
    let mut queue: VecDeque<FacilityId> = relevant
        .iter()
        .copied()
        .filter(|f| in_degree[f.index()] == 0)
        .collect();

    let mut toposort = Vec::with_capacity(relevant.len());
    let mut toposort_inv = vec![None; catalog.facility_count()];

    while let Some(facility) = queue.pop_front() {
        toposort_inv[facility.index()] = Some(toposort.len());
        toposort.push(facility);

        for &dest in &outgoing[facility.index()] {
            let deg = &mut in_degree[dest.index()];
            *deg -= 1;
            if *deg == 0 {
                queue.push_back(dest);
            }
        }
    }

    if toposort.len() != relevant.len() {
        return Err(TopologyError::Cyclic { item });
    }

    debug!(
        item = item.0,
        facilities = toposort.len(),
        lines = lines.len(),
        "prepared item topology"
    );

    Ok(ItemTopology {
        item,
        toposort,
        toposort_inv,
        lines,
        lines_inv,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogBuilder, FacilityLevel, LineLevel};
    use crate::fixed::{Fixed64, f64_to_fixed64 as fx};

    fn passthrough() -> Vec<FacilityLevel> {
        vec![FacilityLevel::new([], Fixed64::ZERO)]
    }

    fn line() -> Vec<LineLevel> {
        vec![LineLevel::new(fx(10.0), Fixed64::ZERO)]
    }

    #[test]
    fn linear_chain_is_ordered_sources_first() {
        let mut b = CatalogBuilder::new();
        let coal = b.register_item("coal");
        // Registered sink-first so catalog order differs from flow order.
        let c = b.add_facility("c", vec![FacilityLevel::new([(coal, fx(-1.0))], Fixed64::ZERO)]);
        let bb = b.add_facility("b", passthrough());
        let a = b.add_facility("a", vec![FacilityLevel::new([(coal, fx(1.0))], Fixed64::ZERO)]);
        b.add_line(coal, bb, c, line());
        b.add_line(coal, a, bb, line());
        let catalog = b.build().unwrap();

        let topo = Topology::prepare(&catalog).unwrap();
        let t = topo.for_item(coal).unwrap();
        assert_eq!(t.facilities(), &[a, bb, c]);
        assert_eq!(t.position_of_facility(a), Some(0));
        assert_eq!(t.position_of_facility(c), Some(2));
        assert_eq!(t.lines(), &[LineId(0), LineId(1)]);
        assert_eq!(t.position_of_line(LineId(1)), Some(1));
    }

    #[test]
    fn diamond_respects_all_edges() {
        let mut b = CatalogBuilder::new();
        let coal = b.register_item("coal");
        let ids: Vec<_> = (0..4).map(|i| b.add_facility(&format!("n{i}"), passthrough())).collect();
        b.add_line(coal, ids[0], ids[1], line());
        b.add_line(coal, ids[0], ids[2], line());
        b.add_line(coal, ids[1], ids[3], line());
        b.add_line(coal, ids[2], ids[3], line());
        let catalog = b.build().unwrap();

        let topo = Topology::prepare(&catalog).unwrap();
        let t = topo.for_item(coal).unwrap();
        for (_, l) in catalog.lines() {
            assert!(t.position_of_facility(l.from) < t.position_of_facility(l.to));
        }
    }

    #[test]
    fn irrelevant_facilities_are_excluded_per_item() {
        let mut b = CatalogBuilder::new();
        let coal = b.register_item("coal");
        let plate = b.register_item("plate");
        let mine = b.add_facility("mine", vec![FacilityLevel::new([(coal, fx(2.0))], Fixed64::ZERO)]);
        let smelter = b.add_facility(
            "smelter",
            vec![FacilityLevel::new([(coal, fx(-1.0)), (plate, fx(1.0))], Fixed64::ZERO)],
        );
        let store = b.add_facility("store", vec![FacilityLevel::new([(plate, fx(-1.0))], Fixed64::ZERO)]);
        b.add_line(coal, mine, smelter, line());
        b.add_line(plate, smelter, store, line());
        let catalog = b.build().unwrap();

        let topo = Topology::prepare(&catalog).unwrap();
        assert_eq!(topo.for_item(coal).unwrap().facilities(), &[mine, smelter]);
        assert_eq!(topo.for_item(plate).unwrap().facilities(), &[smelter, store]);
        assert_eq!(topo.for_item(plate).unwrap().position_of_facility(mine), None);
        assert_eq!(topo.for_item(coal).unwrap().position_of_line(LineId(1)), None);
    }

    #[test]
    fn cycle_is_reported_for_exactly_that_item() {
        let mut b = CatalogBuilder::new();
        let coal = b.register_item("coal");
        let plate = b.register_item("plate");
        let x = b.add_facility("x", passthrough());
        let y = b.add_facility("y", passthrough());
        b.add_line(coal, x, y, line());
        b.add_line(plate, x, y, line());
        b.add_line(plate, y, x, line());
        let catalog = b.build().unwrap();

        assert_eq!(
            Topology::prepare(&catalog),
            Err(TopologyError::Cyclic { item: plate })
        );
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let mut b = CatalogBuilder::new();
        let coal = b.register_item("coal");
        let x = b.add_facility("x", passthrough());
        b.add_line(coal, x, x, line());
        let catalog = b.build().unwrap();
        assert_eq!(
            Topology::prepare(&catalog),
            Err(TopologyError::Cyclic { item: coal })
        );
    }

    #[test]
    fn parallel_lines_are_a_multigraph() {
        let mut b = CatalogBuilder::new();
        let coal = b.register_item("coal");
        let x = b.add_facility("x", passthrough());
        let y = b.add_facility("y", passthrough());
        b.add_line(coal, x, y, line());
        b.add_line(coal, x, y, line());
        let catalog = b.build().unwrap();
        let topo = Topology::prepare(&catalog).unwrap();
        assert_eq!(topo.for_item(coal).unwrap().facilities(), &[x, y]);
        assert_eq!(topo.for_item(coal).unwrap().lines().len(), 2);
    }
}
