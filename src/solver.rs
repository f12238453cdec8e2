use std::time::Instant;

use faer_core::{Mat, Parallelism};

use crate::layout::{pad, BoxedLcp};
use crate::ldlt;
use crate::report::{finish_stats, IterationReport, Reporter, ReporterSlot, SolveStatus, SolverStats};
use crate::shuffle::ShuffleRng;

/// Diagonal floor and symmetry tolerance used by [`BoxedLcpSolver::can_solve`].
const PGS_EPSILON: f64 = 1e-8;

/// Options controlling the projected Gauss-Seidel solve.
#[derive(Debug, Clone)]
pub struct SolverOptions {
    /// Hard sweep cap, including the initial filtering sweep.
    pub max_iteration: usize,
    /// Absolute per-variable change below which the initial sweep (and the
    /// dense variant) accepts `x`.
    pub delta_x_threshold: f64,
    /// Relative per-variable change below which subsequent strided sweeps
    /// accept `x`.
    pub relative_delta_x_tolerance: f64,
    /// Minimum acceptable diagonal; rows below it are pinned to zero. Also
    /// floors the denominator of the relative-change test.
    pub epsilon_for_division: f64,
    /// Reshuffle the active-row order every 8 sweeps.
    pub randomize_constraint_order: bool,
    /// Emit per-sweep diagnostics to stdout by default.
    pub verbose: bool,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            max_iteration: 30,
            delta_x_threshold: 1e-6,
            relative_delta_x_tolerance: 1e-3,
            epsilon_for_division: 1e-9,
            randomize_constraint_order: false,
            verbose: false,
        }
    }
}

/// A backend capable of solving boxed LCP instances in the padded layout.
///
/// The constraint pipeline composes its backend by reference; anything that
/// accepts the [`BoxedLcp`] contract can stand in for the default
/// [`PgsSolver`].
pub trait BoxedLcpSolver {
    /// Solves the instance in place and reports how the solve ended.
    fn solve(
        &mut self,
        problem: BoxedLcp<'_>,
        options: &SolverOptions,
        reporter: Option<&mut dyn Reporter>,
    ) -> SolverStats;

    /// Returns true iff every diagonal of `a` is positive and `a` is
    /// symmetric, both to within 1e-8. O(n^2); intended for debug-build
    /// audits.
    fn can_solve(&self, n: usize, a: &[f64]) -> bool;
}

/// Projected Gauss-Seidel solver for boxed LCPs.
///
/// One instance owns reusable scratch (LDL^T diagonal, active-row order,
/// normalized copies for the dense variant) plus the shuffle generator, so
/// repeated solves of the same size do not allocate. Instances are cheap but
/// must not be shared across threads mid-solve.
pub struct PgsSolver {
    pub(crate) parallelism: Parallelism,
    pub(crate) rng: ShuffleRng,
    pub(crate) cache_d: Vec<f64>,
    pub(crate) cache_order: Vec<usize>,
    pub(crate) cache_a: Vec<f64>,
    pub(crate) cache_b: Vec<f64>,
    pub(crate) cache_old_x: Vec<f64>,
    pub(crate) cache_normalized_a: Mat<f64>,
    pub(crate) cache_normalized_b: Mat<f64>,
    pub(crate) cache_z: Mat<f64>,
}

impl PgsSolver {
    /// Create a solver with the default shuffle seed.
    pub fn new(parallelism: Parallelism) -> Self {
        Self {
            parallelism,
            rng: ShuffleRng::default(),
            cache_d: Vec::new(),
            cache_order: Vec::new(),
            cache_a: Vec::new(),
            cache_b: Vec::new(),
            cache_old_x: Vec::new(),
            cache_normalized_a: Mat::zeros(0, 0),
            cache_normalized_b: Mat::zeros(0, 0),
            cache_z: Mat::zeros(0, 0),
        }
    }

    /// Create a solver whose shuffle sequence starts from `seed`.
    pub fn with_seed(parallelism: Parallelism, seed: u64) -> Self {
        let mut solver = Self::new(parallelism);
        solver.rng = ShuffleRng::new(seed);
        solver
    }

    /// Restart the shuffle sequence from `seed`.
    pub fn reseed(&mut self, seed: u64) {
        self.rng.reseed(seed);
    }

    /// Solves the strided instance in place.
    ///
    /// With `nub >= n` this factors `A` and back-substitutes; otherwise it
    /// runs the filtering sweep, normalizes the active rows of `A` and `b`
    /// in place, and iterates projected Gauss-Seidel sweeps until the
    /// relative change settles or the cap is hit. `x` always holds the best
    /// iterate found; the returned stats say which way the solve ended.
    pub fn solve(
        &mut self,
        problem: BoxedLcp<'_>,
        options: &SolverOptions,
        reporter: Option<&mut dyn Reporter>,
    ) -> SolverStats {
        let BoxedLcp {
            n,
            nub,
            a,
            x,
            b,
            lo,
            hi,
            findex,
        } = problem;
        let nskip = pad(n);
        let start = options.verbose.then(Instant::now);
        let mut reporter = ReporterSlot::new(reporter, options.verbose);

        // All variables unbounded: factor, back-substitute, done. The
        // solution travels through b, matching the strided storage contract.
        if nub >= n {
            self.cache_d.clear();
            self.cache_d.resize(n, 0.0);
            ldlt::factor(a, &mut self.cache_d, n, nskip);
            ldlt::solve(a, &self.cache_d, b, n, nskip);
            x[..n].copy_from_slice(&b[..n]);
            let stats = SolverStats {
                status: SolveStatus::Factorized,
                iterations: 0,
                active_rows: n,
                max_delta_x: 0.0,
            };
            return finish_stats(stats, start, &mut reporter);
        }

        self.cache_order.clear();
        self.cache_order.reserve(n);

        // Initial filtering sweep: pin degenerate rows, collect the active
        // order, and take one projected update per row (with division).
        let mut possible_to_terminate = true;
        let mut max_delta_x = 0.0_f64;
        for i in 0..n {
            if a[nskip * i + i] < options.epsilon_for_division {
                x[i] = 0.0;
                continue;
            }
            self.cache_order.push(i);

            let row = &a[nskip * i..nskip * i + n];
            let old_x = x[i];
            let mut new_x = b[i];
            for j in 0..i {
                new_x -= row[j] * x[j];
            }
            for j in i + 1..n {
                new_x -= row[j] * x[j];
            }
            new_x /= a[nskip * i + i];

            x[i] = project(i, new_x, x, lo, hi, findex);

            let delta = (x[i] - old_x).abs();
            if delta > max_delta_x {
                max_delta_x = delta;
            }
            if possible_to_terminate && delta > options.delta_x_threshold {
                possible_to_terminate = false;
            }
        }

        let active_rows = self.cache_order.len();
        if let Some(r) = reporter.as_mut() {
            r.on_iteration(&IterationReport {
                iteration: 0,
                max_delta_x,
                shuffled: false,
            });
        }

        if possible_to_terminate {
            let stats = SolverStats {
                status: SolveStatus::Converged,
                iterations: 1,
                active_rows,
                max_delta_x,
            };
            return finish_stats(stats, start, &mut reporter);
        }

        // One-shot normalization: scale each active row of A and b by the
        // reciprocal diagonal, amortizing the per-sweep divisions.
        for &index in &self.cache_order {
            let inv = 1.0 / a[nskip * index + index];
            b[index] *= inv;
            for j in 0..n {
                a[nskip * index + j] *= inv;
            }
        }

        let mut iterations = 1;
        for iter in 1..options.max_iteration {
            let mut shuffled = false;
            if options.randomize_constraint_order && (iter & 7) == 0 {
                self.rng.shuffle(&mut self.cache_order);
                shuffled = true;
            }

            possible_to_terminate = true;
            max_delta_x = 0.0;
            for &index in &self.cache_order {
                let row = &a[nskip * index..nskip * index + n];
                let old_x = x[index];
                let mut new_x = b[index];
                for j in 0..index {
                    new_x -= row[j] * x[j];
                }
                for j in index + 1..n {
                    new_x -= row[j] * x[j];
                }

                x[index] = project(index, new_x, x, lo, hi, findex);

                let delta = (x[index] - old_x).abs();
                if delta > max_delta_x {
                    max_delta_x = delta;
                }
                if possible_to_terminate && x[index].abs() > options.epsilon_for_division {
                    let relative = ((x[index] - old_x) / x[index]).abs();
                    if relative > options.relative_delta_x_tolerance {
                        possible_to_terminate = false;
                    }
                }
            }
            iterations = iter + 1;

            if let Some(r) = reporter.as_mut() {
                r.on_iteration(&IterationReport {
                    iteration: iter,
                    max_delta_x,
                    shuffled,
                });
            }

            if possible_to_terminate {
                let stats = SolverStats {
                    status: SolveStatus::Converged,
                    iterations,
                    active_rows,
                    max_delta_x,
                };
                return finish_stats(stats, start, &mut reporter);
            }
        }

        let stats = SolverStats {
            status: SolveStatus::MaxIterations,
            iterations,
            active_rows,
            max_delta_x,
        };
        finish_stats(stats, start, &mut reporter)
    }

    /// See [`BoxedLcpSolver::can_solve`].
    pub fn can_solve(&self, n: usize, a: &[f64]) -> bool {
        let nskip = pad(n);
        for i in 0..n {
            if a[nskip * i + i] < PGS_EPSILON {
                return false;
            }
            for j in 0..n {
                if (a[nskip * i + j] - a[nskip * j + i]).abs() > PGS_EPSILON {
                    return false;
                }
            }
        }
        true
    }
}

impl BoxedLcpSolver for PgsSolver {
    fn solve(
        &mut self,
        problem: BoxedLcp<'_>,
        options: &SolverOptions,
        reporter: Option<&mut dyn Reporter>,
    ) -> SolverStats {
        PgsSolver::solve(self, problem, options, reporter)
    }

    fn can_solve(&self, n: usize, a: &[f64]) -> bool {
        PgsSolver::can_solve(self, n, a)
    }
}

/// Projects a candidate update into the row's effective box.
///
/// Friction rows scale their bounds by the coupled variable as
/// `hi_tmp = hi[i] * x[findex[i]]`, `lo_tmp = -hi_tmp`. When the coupled
/// variable is negative the bounds invert and the if-chain pins the result
/// at `hi_tmp`; this mirrors the pyramid arithmetic the assembler expects.
fn project(i: usize, new_x: f64, x: &[f64], lo: &[f64], hi: &[f64], findex: &[i32]) -> f64 {
    let coupled = findex[i];
    if coupled >= 0 {
        let hi_tmp = hi[i] * x[coupled as usize];
        let lo_tmp = -hi_tmp;
        if new_x > hi_tmp {
            hi_tmp
        } else if new_x < lo_tmp {
            lo_tmp
        } else {
            new_x
        }
    } else if new_x > hi[i] {
        hi[i]
    } else if new_x < lo[i] {
        lo[i]
    } else {
        new_x
    }
}
