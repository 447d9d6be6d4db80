use nalgebra::{DMatrix, DVector};
use sprs::{CsMat, TriMat};

use crate::circuit::{Circuit, CurrentSource, NodeIndex, Resistor, VoltageSource};

/// Floor applied to |R| before division, so 0-ohm resistors behave as
/// near-ideal shorts instead of faulting.
pub const R_MIN: f64 = 1e-9;

/// Regularization conductance added to the node diagonals when enabled.
/// Keeps systems with floating nodes solvable and pushes their voltages
/// toward 0.
pub const GMIN: f64 = 1e-12;

/// Effective conductance of a resistor, with the degenerate-value floor.
pub fn conductance(resistor: &Resistor) -> f64 {
    1.0 / resistor.resistance.abs().max(R_MIN)
}

/// Assembled MNA system `A·x = z` with
/// `x = [node voltages (N); source currents (M)]`.
///
/// The top-left N×N block is the conductance matrix G, the off-diagonal
/// blocks are the voltage-source incidence matrix B and its transpose, and
/// the bottom-right M×M block is zero. When M = 0 the system is just G.
#[derive(Debug, Clone)]
pub struct MnaSystem {
    pub matrix: DMatrix<f64>,
    pub rhs: DVector<f64>,
    pub index: NodeIndex,
    pub num_nodes: usize,
    pub num_voltage_sources: usize,
}

impl MnaSystem {
    /// Build the augmented system for a circuit.
    ///
    /// The node index is rebuilt here on every call, so the assembly always
    /// reflects the circuit's current element set.
    pub fn assemble(circuit: &Circuit, regularize: bool) -> Self {
        let index = circuit.node_index();
        let num_nodes = index.len();
        let num_voltage_sources = circuit.voltage_sources.len();
        let size = num_nodes + num_voltage_sources;

        let mut system = MnaSystem {
            matrix: DMatrix::zeros(size, size),
            rhs: DVector::zeros(size),
            index,
            num_nodes,
            num_voltage_sources,
        };

        for resistor in &circuit.resistors {
            system.stamp_resistor(resistor);
        }
        for source in &circuit.current_sources {
            system.stamp_current_source(source);
        }
        for (k, source) in circuit.voltage_sources.iter().enumerate() {
            system.stamp_voltage_source(k, source);
        }

        if regularize {
            for i in 0..num_nodes {
                system.matrix[(i, i)] += GMIN;
            }
        }

        system
    }

    pub fn size(&self) -> usize {
        self.num_nodes + self.num_voltage_sources
    }

    /// Stamp a conductance: `+g` on each non-ground diagonal, `-g` on the
    /// cross terms when both endpoints are non-ground.
    fn stamp_resistor(&mut self, resistor: &Resistor) {
        let g = conductance(resistor);
        let ia = self.index.index_of(&resistor.node_a);
        let ib = self.index.index_of(&resistor.node_b);

        if let Some(i) = ia {
            self.matrix[(i, i)] += g;
        }
        if let Some(j) = ib {
            self.matrix[(j, j)] += g;
        }
        if let (Some(i), Some(j)) = (ia, ib) {
            self.matrix[(i, j)] -= g;
            self.matrix[(j, i)] -= g;
        }
    }

    /// Stamp a fixed injection into the RHS: the current leaves the `from`
    /// node and arrives at the `to` node.
    fn stamp_current_source(&mut self, source: &CurrentSource) {
        if let Some(i) = self.index.index_of(&source.node_from) {
            self.rhs[i] -= source.current;
        }
        if let Some(j) = self.index.index_of(&source.node_to) {
            self.rhs[j] += source.current;
        }
    }

    /// Stamp voltage source `k`: incidence entries in B and its transpose,
    /// prescribed voltage in the bottom RHS slice. Ground rows are omitted.
    fn stamp_voltage_source(&mut self, k: usize, source: &VoltageSource) {
        let row = self.num_nodes + k;

        if let Some(i) = self.index.index_of(&source.node_pos) {
            self.matrix[(i, row)] = 1.0;
            self.matrix[(row, i)] = 1.0;
        }
        if let Some(j) = self.index.index_of(&source.node_neg) {
            self.matrix[(j, row)] = -1.0;
            self.matrix[(row, j)] = -1.0;
        }

        self.rhs[row] = source.voltage;
    }

    /// Convert the dense system to CSR for the sparse solver path.
    pub fn to_sparse(&self) -> CsMat<f64> {
        let size = self.size();
        let mut triplets = TriMat::new((size, size));

        for i in 0..size {
            for j in 0..size {
                let value = self.matrix[(i, j)];
                if value != 0.0 {
                    triplets.add_triplet(i, j, value);
                }
            }
        }

        triplets.to_csr()
    }
}
