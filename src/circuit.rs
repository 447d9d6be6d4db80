use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::analysis::{operating_point, Solution, SolveOptions};
use crate::error::Result;

/// Label of the ground reference node. Its voltage is fixed at 0.
pub const GROUND: &str = "0";

/// Normalize a node label: trim and map ground aliases to `"0"`.
pub fn normalize_node(label: &str) -> String {
    let label = label.trim();
    let upper = label.to_uppercase();
    if upper == "GND" || upper == "TIERRA" {
        GROUND.to_string()
    } else {
        label.to_string()
    }
}

/// Resistor between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resistor {
    pub name: String,
    pub node_a: String,
    pub node_b: String,
    /// Ohms. Values below [`crate::mna::R_MIN`] are floored when used as a
    /// divisor, so a 0-ohm entry behaves as a near-ideal short.
    pub resistance: f64,
}

/// Ideal voltage source. Enforces `V(pos) - V(neg) = voltage` and carries
/// its own branch-current unknown in the augmented system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoltageSource {
    pub name: String,
    pub node_pos: String,
    pub node_neg: String,
    pub voltage: f64,
}

/// Ideal current source injecting a fixed current from `node_from` to
/// `node_to`. Contributes no extra unknown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentSource {
    pub name: String,
    pub node_from: String,
    pub node_to: String,
    pub current: f64,
}

/// A DC network: element collections plus the set of node labels they
/// reference. Nodes have no lifecycle of their own; they exist implicitly
/// through the elements that mention them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Circuit {
    pub resistors: Vec<Resistor>,
    pub voltage_sources: Vec<VoltageSource>,
    pub current_sources: Vec<CurrentSource>,
    nodes: BTreeSet<String>,
}

impl Circuit {
    pub fn new() -> Self {
        Self::default()
    }

    fn register_node(&mut self, label: &str) {
        self.nodes.insert(normalize_node(label));
    }

    /// Add a resistor. Both endpoint labels are registered in the node set.
    ///
    /// Names are not required to be unique; duplicate names show up
    /// independently in results.
    pub fn add_resistor(&mut self, name: &str, node_a: &str, node_b: &str, resistance: f64) {
        self.register_node(node_a);
        self.register_node(node_b);
        self.resistors.push(Resistor {
            name: name.to_string(),
            node_a: normalize_node(node_a),
            node_b: normalize_node(node_b),
            resistance,
        });
    }

    /// Add an ideal voltage source from its positive to negative terminal.
    pub fn add_voltage_source(&mut self, name: &str, node_pos: &str, node_neg: &str, voltage: f64) {
        self.register_node(node_pos);
        self.register_node(node_neg);
        self.voltage_sources.push(VoltageSource {
            name: name.to_string(),
            node_pos: normalize_node(node_pos),
            node_neg: normalize_node(node_neg),
            voltage,
        });
    }

    /// Add an ideal current source pushing current from `node_from` to
    /// `node_to`.
    pub fn add_current_source(&mut self, name: &str, node_from: &str, node_to: &str, current: f64) {
        self.register_node(node_from);
        self.register_node(node_to);
        self.current_sources.push(CurrentSource {
            name: name.to_string(),
            node_from: normalize_node(node_from),
            node_to: normalize_node(node_to),
            current,
        });
    }

    /// All node labels referenced so far, in sorted order.
    pub fn node_labels(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(String::as_str)
    }

    pub fn element_count(&self) -> usize {
        self.resistors.len() + self.voltage_sources.len() + self.current_sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.element_count() == 0
    }

    /// Build the node index for the current element set.
    ///
    /// The index is recomputed on every solve rather than cached, so
    /// elements added after a solve are always reflected.
    pub fn node_index(&self) -> NodeIndex {
        NodeIndex::build(self)
    }

    /// Solve the network for its DC operating point with default options.
    pub fn solve(&self) -> Result<Solution> {
        operating_point(self, &SolveOptions::default())
    }

    /// Solve with explicit options (regularization policy, solver choice).
    pub fn solve_with(&self, options: &SolveOptions) -> Result<Solution> {
        operating_point(self, options)
    }
}

/// Mapping from node labels to dense unknown indices, ground excluded.
///
/// Non-ground labels are sorted lexicographically and numbered `0..N-1`, so
/// repeated builds over an unchanged circuit produce identical layouts.
#[derive(Debug, Clone)]
pub struct NodeIndex {
    map: HashMap<String, usize>,
    unknowns: Vec<String>,
}

impl NodeIndex {
    fn build(circuit: &Circuit) -> Self {
        // Ground belongs to the label set whether or not any element
        // referenced it, so a reference voltage always exists.
        let mut labels = circuit.nodes.clone();
        labels.insert(GROUND.to_string());

        let unknowns: Vec<String> = labels.into_iter().filter(|label| label != GROUND).collect();

        let map = unknowns
            .iter()
            .enumerate()
            .map(|(i, label)| (label.clone(), i))
            .collect();

        NodeIndex { map, unknowns }
    }

    /// Index of a non-ground node, `None` for ground.
    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.map.get(label).copied()
    }

    /// Number of non-ground unknowns.
    pub fn len(&self) -> usize {
        self.unknowns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.unknowns.is_empty()
    }

    /// Non-ground labels in index order.
    pub fn unknown_labels(&self) -> &[String] {
        &self.unknowns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ground_aliases_normalize() {
        assert_eq!(normalize_node("0"), "0");
        assert_eq!(normalize_node("GND"), "0");
        assert_eq!(normalize_node("gnd"), "0");
        assert_eq!(normalize_node("Tierra"), "0");
        assert_eq!(normalize_node(" 2 "), "2");
        assert_eq!(normalize_node("out"), "out");
    }

    #[test]
    fn test_node_set_growth() {
        let mut circuit = Circuit::new();
        circuit.add_resistor("R1", "1", "2", 1000.0);
        circuit.add_resistor("R2", "2", "GND", 2000.0);

        let labels: Vec<&str> = circuit.node_labels().collect();
        assert_eq!(labels, vec!["0", "1", "2"]);
    }

    #[test]
    fn test_duplicate_names_allowed() {
        let mut circuit = Circuit::new();
        circuit.add_resistor("R1", "1", "0", 100.0);
        circuit.add_resistor("R1", "2", "0", 200.0);
        assert_eq!(circuit.resistors.len(), 2);
    }

    #[test]
    fn test_index_reserves_ground() {
        // Ground appears even when no element references it.
        let mut circuit = Circuit::new();
        circuit.add_resistor("R1", "a", "b", 50.0);

        let index = circuit.node_index();
        assert_eq!(index.len(), 2);
        assert_eq!(index.index_of(GROUND), None);
        assert_eq!(index.index_of("a"), Some(0));
        assert_eq!(index.index_of("b"), Some(1));
    }

    #[test]
    fn test_index_is_lexicographic_and_deterministic() {
        let mut circuit = Circuit::new();
        circuit.add_resistor("R1", "n2", "n10", 1.0);
        circuit.add_resistor("R2", "n1", "0", 1.0);

        let first = circuit.node_index();
        let second = circuit.node_index();
        assert_eq!(first.unknown_labels(), &["n1", "n10", "n2"]);
        assert_eq!(first.unknown_labels(), second.unknown_labels());
        for label in first.unknown_labels() {
            assert_eq!(first.index_of(label), second.index_of(label));
        }
    }

    #[test]
    fn test_index_reflects_later_additions() {
        let mut circuit = Circuit::new();
        circuit.add_resistor("R1", "1", "0", 1.0);
        assert_eq!(circuit.node_index().len(), 1);

        circuit.add_current_source("I1", "2", "0", 1e-3);
        assert_eq!(circuit.node_index().len(), 2);
    }
}
