//! Boxed linear complementarity problems solved with projected Gauss-Seidel.
//!
//! This crate is the constraint-force kernel of a rigid-body pipeline: given
//! a symmetric positive-semidefinite `A`, a right-hand side `b`, per-variable
//! box limits and optional Coulomb friction couplings, it finds `x` such
//! that each component either satisfies its row of `A*x = b` or sits clamped
//! at a bound with the residual pointing back into the box.
//!
//! How it works (high level):
//! - When every variable is unbounded the system is factored as `L*D*L^T`
//!   and solved directly.
//! - Otherwise a filtering sweep pins degenerate rows, the active rows are
//!   normalized in place, and projected Gauss-Seidel sweeps run until the
//!   per-variable change settles or the iteration cap is hit.
//! - Rows with a friction index take their bounds from the coupled normal
//!   variable, scaling the box with the normal force each sweep.
//!
//! Calling it:
//! - Pack `A` row-major with stride [`pad`]`(n)` and wrap the arrays in a
//!   [`BoxedLcp`].
//! - Call [`PgsSolver::solve`] and inspect the returned [`SolverStats`];
//!   `x` is updated in place either way.
//! - A dense, non-strided entry point ([`PgsSolver::solve_dense`]) accepts a
//!   faer matrix and leaves it unmutated.
//!
//! Example:
//! ```rust
//! use faer_core::Parallelism;
//! use pgs_lcp_rs::{pad, BoxedLcp, PgsSolver, SolveStatus, SolverOptions};
//!
//! let n = 2;
//! let nskip = pad(n);
//! let mut a = vec![0.0; n * nskip];
//! a[0] = 1.0;
//! a[nskip + 1] = 1.0;
//! let mut x = vec![0.0; n];
//! let mut b = vec![5.0, -5.0];
//! let lo = vec![0.0; n];
//! let hi = vec![10.0; n];
//! let findex = vec![-1_i32; n];
//!
//! let mut solver = PgsSolver::new(Parallelism::None);
//! let problem = BoxedLcp::new(n, &mut a, &mut x, &mut b, 0, &lo, &hi, &findex).unwrap();
//! let stats = solver.solve(problem, &SolverOptions::default(), None);
//!
//! assert_eq!(stats.status, SolveStatus::Converged);
//! assert!((x[0] - 5.0).abs() < 1e-9);
//! assert!(x[1].abs() < 1e-9);
//! ```

mod dense;
mod layout;
mod ldlt;
mod report;
mod shuffle;
mod solver;

pub use layout::{pad, BoxedLcp, ProblemError};
pub use report::{IterationReport, Reporter, SolveStatus, SolverStats, StdoutReporter};
pub use shuffle::ShuffleRng;
pub use solver::{BoxedLcpSolver, PgsSolver, SolverOptions};
