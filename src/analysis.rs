use std::collections::HashMap;

use log::{debug, info, warn};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::circuit::{Circuit, GROUND};
use crate::error::{DcsimError, Result};
use crate::mna::{MnaSystem, R_MIN};
use crate::solver::{LinearSolver, SolverConfig, SolverMethod, SolverStats};

/// Default relative tolerance for the power-balance check.
pub const BALANCE_TOLERANCE: f64 = 1e-6;

/// Options controlling a single solve.
#[derive(Debug, Clone)]
pub struct SolveOptions {
    /// Add GMIN to the conductance diagonals. Off by default: singular
    /// topologies surface [`DcsimError::SingularSystem`] instead of being
    /// nudged toward 0.
    pub regularize: bool,
    pub solver: SolverConfig,
    /// Relative tolerance before a solve logs a power-imbalance warning.
    pub balance_tolerance: f64,
}

impl Default for SolveOptions {
    fn default() -> Self {
        SolveOptions {
            regularize: false,
            solver: SolverConfig::default(),
            balance_tolerance: BALANCE_TOLERANCE,
        }
    }
}

/// Electrical quantities of one element: voltage across it, current through
/// it, and the power it dissipates (positive) or supplies (negative).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElementResult {
    pub voltage: f64,
    pub current: f64,
    pub power: f64,
}

/// A solved DC operating point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solution {
    /// Node label to voltage; always contains `"0" -> 0.0`.
    pub voltages: HashMap<String, f64>,
    /// Element name to its derived quantities. Duplicate element names
    /// collapse onto one entry, last registration wins.
    pub elements: HashMap<String, ElementResult>,
    /// Signed sum of element powers; near zero for a well-posed network.
    pub power_balance: f64,
    pub stats: SolverStats,
}

impl Solution {
    pub fn voltage(&self, label: &str) -> Option<f64> {
        self.voltages.get(label).copied()
    }

    /// Whether `|Σ P|` is within `tolerance`, relative to the total
    /// absolute element power.
    pub fn is_balanced(&self, tolerance: f64) -> bool {
        let scale: f64 = self
            .elements
            .values()
            .map(|result| result.power.abs())
            .sum::<f64>()
            .max(1.0);
        self.power_balance.abs() <= tolerance * scale
    }

    /// Reshape into the legacy 3-tuple form:
    /// `(voltages, resistor currents, voltage source currents)`.
    pub fn legacy(
        &self,
        circuit: &Circuit,
    ) -> (
        HashMap<String, f64>,
        HashMap<String, f64>,
        HashMap<String, f64>,
    ) {
        let resistor_currents = circuit
            .resistors
            .iter()
            .filter_map(|r| {
                self.elements
                    .get(&r.name)
                    .map(|res| (r.name.clone(), res.current))
            })
            .collect();
        let source_currents = circuit
            .voltage_sources
            .iter()
            .filter_map(|vs| {
                self.elements
                    .get(&vs.name)
                    .map(|res| (vs.name.clone(), res.current))
            })
            .collect();
        (self.voltages.clone(), resistor_currents, source_currents)
    }
}

/// Solve a circuit for its DC operating point.
///
/// Runs the full pipeline: node indexing, matrix assembly, linear solve,
/// and per-element result extraction. An out-of-tolerance power balance is
/// logged as a warning but does not fail the solve.
pub fn operating_point(circuit: &Circuit, options: &SolveOptions) -> Result<Solution> {
    if circuit.is_empty() {
        return Err(DcsimError::EmptyCircuit);
    }

    let system = MnaSystem::assemble(circuit, options.regularize);
    info!(
        "assembled MNA system: {} node unknowns, {} source currents",
        system.num_nodes, system.num_voltage_sources
    );

    let (raw, stats) = if system.size() == 0 {
        // Every element is tied to ground on both ends; nothing to solve.
        (
            DVector::zeros(0),
            SolverStats {
                method_used: SolverMethod::Lu,
                iterations: 0,
                residual_norm: 0.0,
                solve_time: 0.0,
            },
        )
    } else {
        LinearSolver::with_config(options.solver.clone()).solve(&system)?
    };
    debug!(
        "solve finished: method {:?}, residual {:.3e}",
        stats.method_used, stats.residual_norm
    );

    let solution = extract(circuit, &system, &raw, stats);
    if !solution.is_balanced(options.balance_tolerance) {
        warn!(
            "power imbalance: sum of element powers is {:.6e} W",
            solution.power_balance
        );
    }
    Ok(solution)
}

/// Sum of element powers; the primary correctness oracle for callers.
pub fn validate_power_balance(solution: &Solution) -> f64 {
    solution.elements.values().map(|result| result.power).sum()
}

/// Map the raw solution vector back to node voltages and per-element
/// current, voltage, and power.
fn extract(circuit: &Circuit, system: &MnaSystem, raw: &DVector<f64>, stats: SolverStats) -> Solution {
    let mut voltages = HashMap::new();
    voltages.insert(GROUND.to_string(), 0.0);
    for (i, label) in system.index.unknown_labels().iter().enumerate() {
        voltages.insert(label.clone(), raw[i]);
    }

    let volt = |label: &str| voltages.get(label).copied().unwrap_or(0.0);
    let mut elements = HashMap::new();
    // Accumulated in registration order so repeated solves reproduce the
    // balance bit for bit; shadowed duplicate names still count.
    let mut power_balance = 0.0;

    for resistor in &circuit.resistors {
        let dv = volt(&resistor.node_a) - volt(&resistor.node_b);
        let r_eff = resistor.resistance.abs().max(R_MIN);
        let current = dv / r_eff;
        // dv * current == current^2 * r_eff: dissipated, never negative.
        power_balance += dv * current;
        elements.insert(
            resistor.name.clone(),
            ElementResult {
                voltage: dv,
                current,
                power: dv * current,
            },
        );
    }

    for (k, source) in circuit.voltage_sources.iter().enumerate() {
        let dv = volt(&source.node_pos) - volt(&source.node_neg);
        let current = raw[system.num_nodes + k];
        // Passive sign convention at the positive terminal: negative power
        // means the source is supplying energy.
        power_balance += dv * current;
        elements.insert(
            source.name.clone(),
            ElementResult {
                voltage: dv,
                current,
                power: dv * current,
            },
        );
    }

    for source in &circuit.current_sources {
        let dv = volt(&source.node_from) - volt(&source.node_to);
        power_balance += dv * source.current;
        elements.insert(
            source.name.clone(),
            ElementResult {
                voltage: dv,
                current: source.current,
                power: dv * source.current,
            },
        );
    }

    Solution {
        voltages,
        elements,
        power_balance,
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voltage_divider() -> Circuit {
        let mut circuit = Circuit::new();
        circuit.add_voltage_source("V1", "1", "0", 12.0);
        circuit.add_resistor("R1", "1", "2", 1000.0);
        circuit.add_resistor("R2", "2", "0", 2000.0);
        circuit
    }

    #[test]
    fn test_voltage_divider() {
        let solution = voltage_divider().solve().unwrap();
        assert!((solution.voltage("1").unwrap() - 12.0).abs() < 1e-9);
        assert!((solution.voltage("2").unwrap() - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_ground_invariant() {
        // Ground shows up in the result map even when nothing references it.
        // A network detached from ground is singular, so anchor it with GMIN.
        let mut circuit = Circuit::new();
        circuit.add_resistor("R1", "a", "b", 100.0);
        circuit.add_voltage_source("V1", "a", "b", 1.0);

        let options = SolveOptions {
            regularize: true,
            ..SolveOptions::default()
        };
        let solution = circuit.solve_with(&options).unwrap();
        assert_eq!(solution.voltage(GROUND), Some(0.0));

        let grounded = voltage_divider().solve().unwrap();
        assert_eq!(grounded.voltage(GROUND), Some(0.0));
    }

    #[test]
    fn test_single_resistor_loop() {
        let mut circuit = Circuit::new();
        circuit.add_voltage_source("V1", "1", "0", 10.0);
        circuit.add_resistor("R1", "1", "0", 50.0);

        let solution = circuit.solve().unwrap();
        let r1 = solution.elements["R1"];
        assert!((r1.current - 0.2).abs() < 1e-9);
        assert!((r1.power - 2.0).abs() < 1e-9);

        // The source supplies what the resistor dissipates.
        let v1 = solution.elements["V1"];
        assert!((v1.power + 2.0).abs() < 1e-9);
        assert!((v1.current + 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_power_balance() {
        let solution = voltage_divider().solve().unwrap();
        assert!(solution.is_balanced(BALANCE_TOLERANCE));
        assert!(validate_power_balance(&solution).abs() < 1e-6);
    }

    #[test]
    fn test_current_source_circuit() {
        let mut circuit = Circuit::new();
        circuit.add_current_source("I1", "1", "0", 1e-3);
        circuit.add_resistor("R1", "1", "0", 1000.0);

        let solution = circuit.solve().unwrap();
        // 1 mA drawn out of node 1 through the source drives it to -1 V.
        assert!((solution.voltage("1").unwrap() + 1.0).abs() < 1e-9);
        assert!(solution.is_balanced(BALANCE_TOLERANCE));

        let i1 = solution.elements["I1"];
        assert!((i1.power + 1e-3).abs() < 1e-12);
    }

    #[test]
    fn test_determinism() {
        let circuit = voltage_divider();
        let first = circuit.solve().unwrap();
        let second = circuit.solve().unwrap();

        for (label, voltage) in &first.voltages {
            assert_eq!(second.voltages[label], *voltage);
        }
        assert_eq!(first.power_balance, second.power_balance);
    }

    #[test]
    fn test_degenerate_resistor_short() {
        let mut circuit = Circuit::new();
        circuit.add_voltage_source("V1", "1", "0", 5.0);
        circuit.add_resistor("R1", "1", "2", 1000.0);
        circuit.add_resistor("R2", "2", "0", 0.0);

        let solution = circuit.solve().unwrap();
        // The 0-ohm leg behaves as a short: node 2 sits at ~0 V and the
        // current stays finite.
        assert!(solution.voltage("2").unwrap().abs() < 1e-3);
        let r2 = solution.elements["R2"];
        assert!(r2.current.is_finite());
        assert!((r2.current - 5e-3).abs() < 1e-6);
    }

    #[test]
    fn test_floating_node_fails_without_regularization() {
        let mut circuit = Circuit::new();
        circuit.add_current_source("I1", "1", "2", 1e-3);

        let err = circuit.solve().unwrap_err();
        assert!(matches!(err, DcsimError::SingularSystem { .. }));
    }

    #[test]
    fn test_floating_node_bounded_with_regularization() {
        let mut circuit = Circuit::new();
        circuit.add_current_source("I1", "1", "2", 1e-3);
        circuit.add_resistor("R1", "2", "0", 1000.0);

        let options = SolveOptions {
            regularize: true,
            ..SolveOptions::default()
        };
        let solution = circuit.solve_with(&options).unwrap();
        for label in ["1", "2"] {
            assert!(solution.voltage(label).unwrap().is_finite());
        }
    }

    #[test]
    fn test_elements_tied_to_ground_on_both_ends() {
        // No unknowns at all; the solve degenerates to an empty system.
        let mut circuit = Circuit::new();
        circuit.add_resistor("R1", "0", "GND", 100.0);

        let solution = circuit.solve().unwrap();
        assert_eq!(solution.voltages.len(), 1);
        assert_eq!(solution.voltage(GROUND), Some(0.0));
        let r1 = solution.elements["R1"];
        assert_eq!(r1.current, 0.0);
        assert_eq!(r1.power, 0.0);
    }

    #[test]
    fn test_empty_circuit_errors() {
        let circuit = Circuit::new();
        assert!(matches!(
            circuit.solve(),
            Err(DcsimError::EmptyCircuit)
        ));
    }

    #[test]
    fn test_legacy_tuple_shape() {
        let circuit = voltage_divider();
        let solution = circuit.solve().unwrap();
        let (voltages, resistor_currents, source_currents) = solution.legacy(&circuit);

        assert!((voltages["2"] - 8.0).abs() < 1e-9);
        assert!((resistor_currents["R1"] - 4e-3).abs() < 1e-9);
        assert!((source_currents["V1"] + 4e-3).abs() < 1e-9);
    }

    #[test]
    fn test_large_network_takes_sparse_path() {
        use crate::solver::SolverMethod;

        // 60-resistor chain to ground, driven by a 1 mA injection: pure
        // conductance system above the sparse threshold.
        let mut circuit = Circuit::new();
        circuit.add_current_source("I1", "0", "n01", 1e-3);
        for i in 1..=60usize {
            let a = format!("n{:02}", i);
            let b = if i == 60 {
                "0".to_string()
            } else {
                format!("n{:02}", i + 1)
            };
            circuit.add_resistor(&format!("R{:02}", i), &a, &b, 100.0);
        }

        let solution = circuit.solve().unwrap();
        assert_eq!(solution.stats.method_used, SolverMethod::BiCgStab);
        // 1 mA through 60 x 100 ohm in series.
        assert!((solution.voltage("n01").unwrap() - 6.0).abs() < 1e-4);
        assert!(solution.is_balanced(BALANCE_TOLERANCE));
    }

    #[test]
    fn test_solution_with_prior_mutation() {
        // Indexing is rebuilt per solve, so later additions are picked up.
        let mut circuit = Circuit::new();
        circuit.add_voltage_source("V1", "1", "0", 10.0);
        circuit.add_resistor("R1", "1", "0", 100.0);
        let before = circuit.solve().unwrap();
        assert_eq!(before.voltages.len(), 2);

        circuit.add_resistor("R2", "1", "2", 100.0);
        circuit.add_resistor("R3", "2", "0", 100.0);
        let after = circuit.solve().unwrap();
        assert!((after.voltage("2").unwrap() - 5.0).abs() < 1e-9);
    }
}
