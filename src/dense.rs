//! Dense-matrix entry points for the projected Gauss-Seidel solver.
//!
//! These accept `A` as a first-class faer matrix instead of the padded
//! strided buffer, and run whole-vector sweeps built from triangular
//! kernels: `z = b - strictly_upper(A)*x` followed by a lower-triangular
//! solve. `A` is never mutated; when normalization pays off (`n` below the
//! iteration cap) a row-scaled copy is kept in solver scratch.

use std::time::Instant;

use faer_core::mul::triangular::{self, BlockStructure};
use faer_core::{mat, solve, Mat, MatRef, Parallelism};

use crate::layout::{pad, validate_findex, ProblemError};
use crate::ldlt;
use crate::report::{finish_stats, IterationReport, Reporter, ReporterSlot, SolveStatus, SolverStats};
use crate::solver::{PgsSolver, SolverOptions};

impl PgsSolver {
    /// Solves the boxed system `A*x = b` with per-variable bounds.
    ///
    /// `a` is borrowed read-only; `x` carries the initial guess in and the
    /// solution out. With `nub >= n` the system is factored directly.
    /// Otherwise each sweep solves against the (unit-)lower triangle and
    /// clamps into `[lo, hi]`, stopping as soon as any component moves less
    /// than the absolute threshold.
    #[allow(clippy::too_many_arguments)]
    pub fn solve_dense(
        &mut self,
        a: MatRef<'_, f64>,
        x: &mut [f64],
        b: &[f64],
        nub: usize,
        lo: &[f64],
        hi: &[f64],
        options: &SolverOptions,
        reporter: Option<&mut dyn Reporter>,
    ) -> Result<SolverStats, ProblemError> {
        self.solve_dense_inner(a, x, b, nub, lo, hi, options, reporter)
    }

    /// Variant of [`PgsSolver::solve_dense`] that also takes the friction
    /// coupling vector.
    ///
    /// The couplings are validated for interface parity with the strided
    /// solver but do not alter the sweep bounds; the triangular sweeps clamp
    /// against `lo`/`hi` only.
    #[allow(clippy::too_many_arguments)]
    pub fn solve_dense_with_friction(
        &mut self,
        a: MatRef<'_, f64>,
        x: &mut [f64],
        b: &[f64],
        nub: usize,
        lo: &[f64],
        hi: &[f64],
        findex: &[i32],
        options: &SolverOptions,
        reporter: Option<&mut dyn Reporter>,
    ) -> Result<SolverStats, ProblemError> {
        validate_findex(b.len(), findex)?;
        self.solve_dense_inner(a, x, b, nub, lo, hi, options, reporter)
    }

    #[allow(clippy::too_many_arguments)]
    fn solve_dense_inner(
        &mut self,
        a: MatRef<'_, f64>,
        x: &mut [f64],
        b: &[f64],
        nub: usize,
        lo: &[f64],
        hi: &[f64],
        options: &SolverOptions,
        reporter: Option<&mut dyn Reporter>,
    ) -> Result<SolverStats, ProblemError> {
        let n = b.len();
        if a.nrows() != n || a.ncols() != n {
            return Err(ProblemError::MatrixShape {
                nrows: a.nrows(),
                ncols: a.ncols(),
                n,
            });
        }
        for (name, len) in [("x", x.len()), ("lo", lo.len()), ("hi", hi.len())] {
            if len != n {
                return Err(ProblemError::VectorLen {
                    name,
                    expected: n,
                    actual: len,
                });
            }
        }

        let start = options.verbose.then(Instant::now);
        let mut reporter = ReporterSlot::new(reporter, options.verbose);

        // All variables unbounded: pack into the padded scratch and run the
        // strided factorization.
        if nub >= n {
            let nskip = pad(n);
            self.cache_a.clear();
            self.cache_a.resize(n * nskip, 0.0);
            for i in 0..n {
                for j in 0..n {
                    self.cache_a[i * nskip + j] = a.read(i, j);
                }
            }
            self.cache_d.clear();
            self.cache_d.resize(n, 0.0);
            self.cache_b.clear();
            self.cache_b.extend_from_slice(b);
            ldlt::factor(&mut self.cache_a, &mut self.cache_d, n, nskip);
            ldlt::solve(&self.cache_a, &self.cache_d, &mut self.cache_b, n, nskip);
            x.copy_from_slice(&self.cache_b);
            let stats = SolverStats {
                status: SolveStatus::Factorized,
                iterations: 0,
                active_rows: n,
                max_delta_x: 0.0,
            };
            return Ok(finish_stats(stats, start, &mut reporter));
        }

        // Row-scaling A and b by the diagonal saves n divisions per sweep,
        // which only pays off when n is below the sweep cap.
        let normalized = n < options.max_iteration;
        if normalized {
            self.cache_normalized_a.resize_with(n, n, |_, _| 0.0);
            self.cache_normalized_b.resize_with(n, 1, |_, _| 0.0);
            for j in 0..n {
                for i in 0..n {
                    self.cache_normalized_a.write(i, j, a.read(i, j) / a.read(i, i));
                }
            }
            for i in 0..n {
                self.cache_normalized_b.write(i, 0, b[i] / a.read(i, i));
            }
        }

        self.cache_old_x.clear();
        self.cache_old_x.resize(n, 0.0);

        let mut iterations = 0;
        let mut max_delta_x = 0.0_f64;
        for iter in 0..options.max_iteration {
            self.cache_old_x.copy_from_slice(x);

            if normalized {
                sweep_forward_normalized_with(
                    &mut self.cache_z,
                    self.cache_normalized_a.as_ref(),
                    x,
                    self.cache_normalized_b.as_ref(),
                    self.parallelism,
                );
            } else {
                let rhs = mat::from_column_major_slice::<f64>(b, n, 1);
                sweep_forward_with(&mut self.cache_z, a, x, rhs, self.parallelism);
            }

            // Project into the box, then accept as soon as any component has
            // settled below the absolute threshold.
            let mut min_delta = f64::INFINITY;
            max_delta_x = 0.0;
            for i in 0..n {
                let clamped = x[i].max(lo[i]).min(hi[i]);
                x[i] = clamped;
                let delta = (clamped - self.cache_old_x[i]).abs();
                if delta > max_delta_x {
                    max_delta_x = delta;
                }
                if delta < min_delta {
                    min_delta = delta;
                }
            }
            iterations = iter + 1;

            if let Some(r) = reporter.as_mut() {
                r.on_iteration(&IterationReport {
                    iteration: iter,
                    max_delta_x,
                    shuffled: false,
                });
            }

            if min_delta <= options.delta_x_threshold {
                let stats = SolverStats {
                    status: SolveStatus::Converged,
                    iterations,
                    active_rows: n,
                    max_delta_x,
                };
                return Ok(finish_stats(stats, start, &mut reporter));
            }
        }

        let stats = SolverStats {
            status: SolveStatus::MaxIterations,
            iterations,
            active_rows: n,
            max_delta_x,
        };
        Ok(finish_stats(stats, start, &mut reporter))
    }

    /// One forward Gauss-Seidel sweep: `lower(A) * x_new = b - strictly_upper(A) * x`.
    pub fn sweep_forward(&mut self, a: MatRef<'_, f64>, x: &mut [f64], b: &[f64]) {
        let rhs = mat::from_column_major_slice::<f64>(b, b.len(), 1);
        sweep_forward_with(&mut self.cache_z, a, x, rhs, self.parallelism);
    }

    /// Forward sweep against a row-normalized matrix (unit lower triangle).
    pub fn sweep_forward_normalized(&mut self, a: MatRef<'_, f64>, x: &mut [f64], b: &[f64]) {
        let rhs = mat::from_column_major_slice::<f64>(b, b.len(), 1);
        sweep_forward_normalized_with(&mut self.cache_z, a, x, rhs, self.parallelism);
    }

    /// One backward sweep: `upper(A) * x_new = b - strictly_lower(A) * x`.
    ///
    /// Pairs with [`PgsSolver::sweep_forward`] for symmetric Gauss-Seidel.
    pub fn sweep_backward(&mut self, a: MatRef<'_, f64>, x: &mut [f64], b: &[f64]) {
        let rhs = mat::from_column_major_slice::<f64>(b, b.len(), 1);
        sweep_backward_with(&mut self.cache_z, a, x, rhs, self.parallelism);
    }

    /// Backward sweep against a row-normalized matrix (unit upper triangle).
    pub fn sweep_backward_normalized(&mut self, a: MatRef<'_, f64>, x: &mut [f64], b: &[f64]) {
        let rhs = mat::from_column_major_slice::<f64>(b, b.len(), 1);
        sweep_backward_normalized_with(&mut self.cache_z, a, x, rhs, self.parallelism);
    }
}

fn load_rhs(z: &mut Mat<f64>, b: MatRef<'_, f64>) {
    let n = b.nrows();
    z.resize_with(n, 1, |_, _| 0.0);
    for i in 0..n {
        z.write(i, 0, b.read(i, 0));
    }
}

fn store_solution(x: &mut [f64], z: &Mat<f64>) {
    for (i, xi) in x.iter_mut().enumerate() {
        *xi = z.read(i, 0);
    }
}

fn sweep_forward_with(
    z: &mut Mat<f64>,
    a: MatRef<'_, f64>,
    x: &mut [f64],
    b: MatRef<'_, f64>,
    parallelism: Parallelism,
) {
    load_rhs(z, b);
    {
        let x_ref = mat::from_column_major_slice::<f64>(x, a.nrows(), 1);
        triangular::matmul(
            z.as_mut(),
            BlockStructure::Rectangular,
            a,
            BlockStructure::StrictTriangularUpper,
            x_ref,
            BlockStructure::Rectangular,
            Some(1.0),
            -1.0,
            parallelism,
        );
    }
    solve::solve_lower_triangular_in_place(a, z.as_mut(), parallelism);
    store_solution(x, z);
}

fn sweep_forward_normalized_with(
    z: &mut Mat<f64>,
    a: MatRef<'_, f64>,
    x: &mut [f64],
    b: MatRef<'_, f64>,
    parallelism: Parallelism,
) {
    load_rhs(z, b);
    {
        let x_ref = mat::from_column_major_slice::<f64>(x, a.nrows(), 1);
        triangular::matmul(
            z.as_mut(),
            BlockStructure::Rectangular,
            a,
            BlockStructure::StrictTriangularUpper,
            x_ref,
            BlockStructure::Rectangular,
            Some(1.0),
            -1.0,
            parallelism,
        );
    }
    solve::solve_unit_lower_triangular_in_place(a, z.as_mut(), parallelism);
    store_solution(x, z);
}

fn sweep_backward_with(
    z: &mut Mat<f64>,
    a: MatRef<'_, f64>,
    x: &mut [f64],
    b: MatRef<'_, f64>,
    parallelism: Parallelism,
) {
    load_rhs(z, b);
    {
        let x_ref = mat::from_column_major_slice::<f64>(x, a.nrows(), 1);
        triangular::matmul(
            z.as_mut(),
            BlockStructure::Rectangular,
            a,
            BlockStructure::StrictTriangularLower,
            x_ref,
            BlockStructure::Rectangular,
            Some(1.0),
            -1.0,
            parallelism,
        );
    }
    solve::solve_upper_triangular_in_place(a, z.as_mut(), parallelism);
    store_solution(x, z);
}

fn sweep_backward_normalized_with(
    z: &mut Mat<f64>,
    a: MatRef<'_, f64>,
    x: &mut [f64],
    b: MatRef<'_, f64>,
    parallelism: Parallelism,
) {
    load_rhs(z, b);
    {
        let x_ref = mat::from_column_major_slice::<f64>(x, a.nrows(), 1);
        triangular::matmul(
            z.as_mut(),
            BlockStructure::Rectangular,
            a,
            BlockStructure::StrictTriangularLower,
            x_ref,
            BlockStructure::Rectangular,
            Some(1.0),
            -1.0,
            parallelism,
        );
    }
    solve::solve_unit_upper_triangular_in_place(a, z.as_mut(), parallelism);
    store_solution(x, z);
}
