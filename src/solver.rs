use std::time::Instant;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use sprs::CsMat;

use crate::error::{DcsimError, Result};
use crate::mna::MnaSystem;

/// Solver configuration.
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Forced method; `None` selects by system size.
    pub method: Option<SolverMethod>,
    /// Relative residual tolerance for the iterative path.
    pub tolerance: f64,
    pub max_iterations: usize,
    /// Systems with at least this many unknowns take the sparse path when
    /// no method is forced.
    pub sparse_threshold: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            method: None,
            tolerance: 1e-9,
            max_iterations: 1000,
            sparse_threshold: 50,
        }
    }
}

/// Available solver methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolverMethod {
    /// Direct dense LU decomposition.
    Lu,
    /// BiCGSTAB iteration over the sparse matrix.
    BiCgStab,
}

/// Per-solve statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverStats {
    pub method_used: SolverMethod,
    pub iterations: usize,
    pub residual_norm: f64,
    pub solve_time: f64,
}

/// Linear system solver for assembled MNA systems.
pub struct LinearSolver {
    config: SolverConfig,
}

impl LinearSolver {
    pub fn new() -> Self {
        LinearSolver {
            config: SolverConfig::default(),
        }
    }

    pub fn with_config(config: SolverConfig) -> Self {
        LinearSolver { config }
    }

    /// Solve an assembled system, choosing the method by size unless the
    /// configuration forces one. Both paths share numerical semantics at
    /// the configured tolerance.
    ///
    /// The iterative path is only auto-selected for pure conductance
    /// systems; augmented systems with source-current unknowns are
    /// indefinite and go through the direct solver.
    pub fn solve(&self, system: &MnaSystem) -> Result<(DVector<f64>, SolverStats)> {
        let size = system.size();
        let method = self.config.method.unwrap_or(
            if size >= self.config.sparse_threshold && system.num_voltage_sources == 0 {
                SolverMethod::BiCgStab
            } else {
                SolverMethod::Lu
            },
        );

        match method {
            SolverMethod::Lu => self.solve_dense(&system.matrix, &system.rhs),
            SolverMethod::BiCgStab => self.solve_sparse(&system.to_sparse(), &system.rhs),
        }
    }

    /// Solve `Ax = b` by dense LU decomposition.
    pub fn solve_dense(
        &self,
        matrix: &DMatrix<f64>,
        rhs: &DVector<f64>,
    ) -> Result<(DVector<f64>, SolverStats)> {
        check_dimensions(matrix.nrows(), matrix.ncols(), rhs.len())?;
        let start = Instant::now();

        let lu = matrix.clone().lu();
        let solution = lu.solve(rhs).ok_or_else(DcsimError::singular)?;

        let residual_norm = (matrix * &solution - rhs).norm();
        Ok((
            solution,
            SolverStats {
                method_used: SolverMethod::Lu,
                iterations: 1,
                residual_norm,
                solve_time: start.elapsed().as_secs_f64(),
            },
        ))
    }

    /// Solve `Ax = b` by BiCGSTAB iteration on a sparse matrix.
    pub fn solve_sparse(
        &self,
        matrix: &CsMat<f64>,
        rhs: &DVector<f64>,
    ) -> Result<(DVector<f64>, SolverStats)> {
        check_dimensions(matrix.rows(), matrix.cols(), rhs.len())?;
        let start = Instant::now();
        let n = matrix.rows();

        let rhs_norm = rhs.norm();
        if rhs_norm == 0.0 {
            return Ok((
                DVector::zeros(n),
                SolverStats {
                    method_used: SolverMethod::BiCgStab,
                    iterations: 0,
                    residual_norm: 0.0,
                    solve_time: start.elapsed().as_secs_f64(),
                },
            ));
        }
        let target = self.config.tolerance * rhs_norm;

        let mut x = DVector::zeros(n);
        let mut r = rhs.clone();
        let r_hat = r.clone();
        let mut p = DVector::zeros(n);
        let mut v = DVector::zeros(n);
        let mut rho = 1.0;
        let mut alpha = 1.0;
        let mut omega = 1.0;
        let mut residual_norm = rhs_norm;

        for iteration in 1..=self.config.max_iterations {
            let rho_next = r_hat.dot(&r);
            if rho_next.abs() < f64::MIN_POSITIVE {
                // Breakdown: the shadow residual became orthogonal.
                return Err(DcsimError::singular());
            }
            let beta = (rho_next / rho) * (alpha / omega);
            rho = rho_next;

            p = &r + beta * (&p - omega * &v);
            v = spmv(matrix, &p);

            let denom = r_hat.dot(&v);
            if denom.abs() < f64::MIN_POSITIVE {
                return Err(DcsimError::singular());
            }
            alpha = rho / denom;

            let s = &r - alpha * &v;
            let t = spmv(matrix, &s);
            let tt = t.dot(&t);

            if tt == 0.0 {
                x += alpha * &p;
                residual_norm = s.norm();
            } else {
                omega = t.dot(&s) / tt;
                x += alpha * &p + omega * &s;
                r = &s - omega * &t;
                residual_norm = r.norm();
            }

            if residual_norm <= target {
                return Ok((
                    x,
                    SolverStats {
                        method_used: SolverMethod::BiCgStab,
                        iterations: iteration,
                        residual_norm,
                        solve_time: start.elapsed().as_secs_f64(),
                    },
                ));
            }

            if tt == 0.0 || omega == 0.0 {
                break;
            }
        }

        Err(DcsimError::NoConvergence {
            iterations: self.config.max_iterations,
            residual: residual_norm,
        })
    }
}

impl Default for LinearSolver {
    fn default() -> Self {
        Self::new()
    }
}

fn check_dimensions(rows: usize, cols: usize, rhs_len: usize) -> Result<()> {
    if rows != cols {
        return Err(DcsimError::DimensionMismatch {
            expected: rows,
            actual: cols,
        });
    }
    if rows != rhs_len {
        return Err(DcsimError::DimensionMismatch {
            expected: rows,
            actual: rhs_len,
        });
    }
    Ok(())
}

/// Sparse matrix-vector product.
fn spmv(matrix: &CsMat<f64>, vector: &DVector<f64>) -> DVector<f64> {
    let mut result = DVector::zeros(matrix.rows());
    for (value, (row, col)) in matrix.iter() {
        result[row] += value * vector[col];
    }
    result
}
