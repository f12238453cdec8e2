use std::time::{Duration, Instant};

use comfy_table::{presets, Cell, CellAlignment, ContentArrangement, Table};

/// Solver termination status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// Every variable was unbounded; solved directly by LDL^T factorization.
    Factorized,
    /// The per-sweep change fell below tolerance.
    Converged,
    /// Reached the iteration cap without meeting the tolerance.
    MaxIterations,
}

/// Summary statistics from a solve.
#[derive(Debug, Clone)]
pub struct SolverStats {
    /// Termination status.
    pub status: SolveStatus,
    /// Number of completed sweeps, including the initial filtering sweep.
    pub iterations: usize,
    /// Rows whose diagonal passed the division epsilon. Equals `n` on the
    /// factorized and dense paths.
    pub active_rows: usize,
    /// Largest absolute per-variable change in the last sweep.
    pub max_delta_x: f64,
}

/// Per-sweep diagnostics.
#[derive(Debug, Clone)]
pub struct IterationReport {
    /// Sweep index, starting at 0.
    pub iteration: usize,
    /// Largest absolute per-variable change in this sweep.
    pub max_delta_x: f64,
    /// Whether the active-row order was reshuffled before this sweep.
    pub shuffled: bool,
}

pub(crate) fn emit_line(line: &str) {
    if log::log_enabled!(log::Level::Info) {
        log::info!("{line}");
    } else {
        println!("{line}");
    }
}

/// Receives sweep updates from the solver.
pub trait Reporter {
    /// Called after each sweep.
    fn on_iteration(&mut self, report: &IterationReport);
    /// Called once after the solver exits.
    fn on_finish(&mut self) {}
}

/// Reporter that prints a UTF-8 table to stdout or the log.
pub struct StdoutReporter {
    rows: Vec<IterationReport>,
}

impl StdoutReporter {
    /// Create a new stdout reporter.
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }
}

impl Default for StdoutReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for StdoutReporter {
    fn on_iteration(&mut self, report: &IterationReport) {
        self.rows.push(report.clone());
    }

    fn on_finish(&mut self) {
        if self.rows.is_empty() {
            return;
        }
        if !log::log_enabled!(log::Level::Info) {
            println!();
        }
        let mut table = Table::new();
        table.load_preset(presets::UTF8_FULL);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec![
            Cell::new("sweep").set_alignment(CellAlignment::Right),
            Cell::new("max dx").set_alignment(CellAlignment::Right),
            Cell::new("shuffled"),
        ]);
        for row in &self.rows {
            table.add_row(vec![
                Cell::new(row.iteration).set_alignment(CellAlignment::Right),
                Cell::new(format!("{:.4e}", row.max_delta_x)).set_alignment(CellAlignment::Right),
                Cell::new(if row.shuffled { "yes" } else { "no" }),
            ]);
        }

        for line in table.to_string().lines() {
            emit_line(line);
        }
        self.rows.clear();
    }
}

pub(crate) enum ReporterSlot<'a> {
    External(&'a mut dyn Reporter),
    Local(StdoutReporter),
    None,
}

impl<'a> ReporterSlot<'a> {
    pub(crate) fn new(reporter: Option<&'a mut dyn Reporter>, verbose: bool) -> Self {
        match reporter {
            Some(r) => Self::External(r),
            None if verbose => Self::Local(StdoutReporter::new()),
            None => Self::None,
        }
    }

    pub(crate) fn as_mut(&mut self) -> Option<&mut dyn Reporter> {
        match self {
            Self::External(r) => Some(*r),
            Self::Local(r) => Some(r),
            Self::None => None,
        }
    }
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs >= 1.0 {
        format!("{:.3} s", secs)
    } else if secs >= 1e-3 {
        format!("{:.3} ms", secs * 1e3)
    } else if secs >= 1e-6 {
        format!("{:.3} us", secs * 1e6)
    } else {
        format!("{:.0} ns", secs * 1e9)
    }
}

pub(crate) fn finish_stats(
    stats: SolverStats,
    start_time: Option<Instant>,
    reporter: &mut ReporterSlot<'_>,
) -> SolverStats {
    if let Some(reporter) = reporter.as_mut() {
        reporter.on_finish();
    }
    if let Some(start) = start_time {
        let elapsed = format_duration(start.elapsed());
        emit_line(&format!("time: {elapsed}"));
    }
    stats
}
