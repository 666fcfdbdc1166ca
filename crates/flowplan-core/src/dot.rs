//! Graphviz DOT rendering of a [`FlowSnapshot`].
//!
//! Under-supplied nodes are red, nodes left with excess are blue, and edges
//! carrying more than their throttled capacity are red.

use crate::catalog::Catalog;
use crate::fixed::{Fixed64, fixed64_to_f64};
use crate::flow::FlowSnapshot;
use std::fmt;

fn num(v: Fixed64) -> String {
    let v = fixed64_to_f64(v);
    if v.fract() == 0.0 {
        format!("{v:.0}")
    } else {
        format!("{v:.3}")
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Displays a snapshot as a DOT digraph named after its item. Nodes are
/// numbered by topological position.
#[derive(Debug, Clone, Copy)]
pub struct Dot<'a> {
    catalog: &'a Catalog,
    snapshot: &'a FlowSnapshot,
}

impl<'a> Dot<'a> {
    pub fn new(catalog: &'a Catalog, snapshot: &'a FlowSnapshot) -> Self {
        Self { catalog, snapshot }
    }
}

impl fmt::Display for Dot<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let item = self
            .catalog
            .item_name(self.snapshot.item)
            .map(str::to_string)
            .unwrap_or_else(|| self.snapshot.item.to_string());

        writeln!(f, "digraph \"{}\" {{", escape(&item))?;
        for (pos, node) in self.snapshot.nodes.iter().enumerate() {
            let name = self
                .catalog
                .facility(node.facility)
                .map(|fac| fac.name.clone())
                .unwrap_or_else(|| node.facility.to_string());
            let color = if !node.satisfied {
                "color=red,"
            } else if node.excess > Fixed64::ZERO {
                "color=blue,"
            } else {
                ""
            };
            writeln!(
                f,
                "\t{pos} [{color}label=\"{}\\n{}/{}\"];",
                escape(&name),
                num(node.actual_production),
                num(node.max_production),
            )?;
        }
        for edge in &self.snapshot.edges {
            let color = if edge.actual_flow > edge.actual_capacity {
                "color=red,"
            } else {
                ""
            };
            writeln!(
                f,
                "\t{} -> {} [{color}label=\"{}/{} ({})\"];",
                edge.from,
                edge.to,
                num(edge.actual_flow),
                num(edge.actual_capacity),
                num(edge.capacity),
            )?;
        }
        writeln!(f, "}}")
    }
}

/// Render `snapshot` as a DOT digraph.
pub fn render(catalog: &Catalog, snapshot: &FlowSnapshot) -> String {
    Dot::new(catalog, snapshot).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn renders_nodes_and_edges() {
        let network = initialized(smelting_chain());
        let conf = network.catalog().initial_configuration();
        let snapshot = network.evaluate(plate(), &conf).unwrap();
        let dot = render(network.catalog(), &snapshot);

        assert!(dot.starts_with("digraph \"plate\" {"));
        assert!(dot.contains("0 [label=\"furnace\\n2/2\"];"));
        assert!(dot.contains("1 [color=red,label=\"assembler\\n-2/-3\"];"));
        assert!(dot.contains("0 -> 1 [label=\"2/10 (10)\"];"));
        assert!(dot.ends_with("}\n"));
    }

    #[test]
    fn display_writes_into_any_formatter() {
        let network = initialized(smelting_chain());
        let conf = network.catalog().initial_configuration();
        let snapshot = network.evaluate(ore(), &conf).unwrap();
        let dot = Dot::new(network.catalog(), &snapshot);

        let mut out = String::new();
        fmt::write(&mut out, format_args!("{dot}")).unwrap();
        assert_eq!(out, render(network.catalog(), &snapshot));
        assert!(out.starts_with("digraph \"ore\" {"));
        assert_eq!(out.lines().count(), 2 + snapshot.nodes.len() + snapshot.edges.len());
    }

    #[test]
    fn escapes_quotes_in_names() {
        assert_eq!(escape("a \"b\""), "a \\\"b\\\"");
    }
}
