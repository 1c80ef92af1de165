//! Search metrics.
//!
//! With the `tracing` feature the engine counts what the trampoline does:
//! goal activations, backtracks, choice points, cuts, unifications and
//! exceptions. Without it [`SolveMetrics`] is a unit struct and every
//! `record_*` call compiles away.
//!
//! ```rust,ignore
//! let engine = Engine::new();
//! // ... run queries ...
//! println!("{}", engine.metrics().report());
//! ```

#[cfg(feature = "tracing")]
use std::sync::atomic::{AtomicU64, Ordering};

/// Aggregate counters for all queries of one engine.
///
/// Counters use relaxed ordering; a report taken between queries is exact.
#[cfg(feature = "tracing")]
pub struct SolveMetrics {
    /// Success continuations activated
    pub activations: AtomicU64,
    /// Failure continuations resumed
    pub backtracks: AtomicU64,
    /// Choice points pushed
    pub choice_points: AtomicU64,
    /// Cuts executed
    pub cuts: AtomicU64,
    /// Successful unifications
    pub unifications: AtomicU64,
    /// Failed unifications
    pub unification_failures: AtomicU64,
    /// Errors raised, by `throw/1` or by a builtin
    pub exceptions_thrown: AtomicU64,
    /// Errors intercepted by `catch/3`
    pub exceptions_caught: AtomicU64,
    /// Solutions reported to the driver
    pub solutions: AtomicU64,
}

#[cfg(feature = "tracing")]
impl SolveMetrics {
    pub fn new() -> Self {
        Self {
            activations: AtomicU64::new(0),
            backtracks: AtomicU64::new(0),
            choice_points: AtomicU64::new(0),
            cuts: AtomicU64::new(0),
            unifications: AtomicU64::new(0),
            unification_failures: AtomicU64::new(0),
            exceptions_thrown: AtomicU64::new(0),
            exceptions_caught: AtomicU64::new(0),
            solutions: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_activation(&self) {
        self.activations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_backtrack(&self) {
        self.backtracks.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_choice_point(&self) {
        self.choice_points.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_cut(&self) {
        self.cuts.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the outcome of one unification.
    #[inline]
    pub fn record_unification(&self, success: bool) {
        if success {
            self.unifications.fetch_add(1, Ordering::Relaxed);
        } else {
            self.unification_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_exception_thrown(&self) {
        self.exceptions_thrown.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_exception_caught(&self) {
        self.exceptions_caught.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_solution(&self) {
        self.solutions.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot of all counters.
    pub fn report(&self) -> MetricsReport {
        MetricsReport {
            activations: self.activations.load(Ordering::Relaxed),
            backtracks: self.backtracks.load(Ordering::Relaxed),
            choice_points: self.choice_points.load(Ordering::Relaxed),
            cuts: self.cuts.load(Ordering::Relaxed),
            unifications: self.unifications.load(Ordering::Relaxed),
            unification_failures: self.unification_failures.load(Ordering::Relaxed),
            exceptions_thrown: self.exceptions_thrown.load(Ordering::Relaxed),
            exceptions_caught: self.exceptions_caught.load(Ordering::Relaxed),
            solutions: self.solutions.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.activations.store(0, Ordering::Relaxed);
        self.backtracks.store(0, Ordering::Relaxed);
        self.choice_points.store(0, Ordering::Relaxed);
        self.cuts.store(0, Ordering::Relaxed);
        self.unifications.store(0, Ordering::Relaxed);
        self.unification_failures.store(0, Ordering::Relaxed);
        self.exceptions_thrown.store(0, Ordering::Relaxed);
        self.exceptions_caught.store(0, Ordering::Relaxed);
        self.solutions.store(0, Ordering::Relaxed);
    }
}

#[cfg(feature = "tracing")]
impl Default for SolveMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsReport {
    pub activations: u64,
    pub backtracks: u64,
    pub choice_points: u64,
    pub cuts: u64,
    pub unifications: u64,
    pub unification_failures: u64,
    pub exceptions_thrown: u64,
    pub exceptions_caught: u64,
    pub solutions: u64,
}

impl MetricsReport {
    pub fn unification_success_rate(&self) -> f64 {
        let total = self.unifications + self.unification_failures;
        if total == 0 {
            1.0
        } else {
            self.unifications as f64 / total as f64
        }
    }

    /// Backtracks per solution; all of them when nothing was found.
    pub fn backtracks_per_solution(&self) -> f64 {
        if self.solutions == 0 {
            self.backtracks as f64
        } else {
            self.backtracks as f64 / self.solutions as f64
        }
    }
}

impl std::fmt::Display for MetricsReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Solve Metrics ===")?;
        writeln!(f, "Activations:        {}", self.activations)?;
        writeln!(
            f,
            "Backtracks:         {} ({:.1} per solution)",
            self.backtracks,
            self.backtracks_per_solution()
        )?;
        writeln!(f, "Choice points:      {}", self.choice_points)?;
        writeln!(f, "Cuts:               {}", self.cuts)?;
        writeln!(
            f,
            "Unifications:       {} ({} failures, {:.1}% success)",
            self.unifications,
            self.unification_failures,
            self.unification_success_rate() * 100.0
        )?;
        writeln!(
            f,
            "Exceptions:         {} thrown, {} caught",
            self.exceptions_thrown, self.exceptions_caught
        )?;
        writeln!(f, "Solutions:          {}", self.solutions)?;
        Ok(())
    }
}

// No-op implementation when tracing is disabled
#[cfg(not(feature = "tracing"))]
pub struct SolveMetrics;

#[cfg(not(feature = "tracing"))]
impl SolveMetrics {
    #[inline]
    pub fn new() -> Self {
        SolveMetrics
    }
    #[inline]
    pub fn record_activation(&self) {}
    #[inline]
    pub fn record_backtrack(&self) {}
    #[inline]
    pub fn record_choice_point(&self) {}
    #[inline]
    pub fn record_cut(&self) {}
    #[inline]
    pub fn record_unification(&self, _success: bool) {}
    #[inline]
    pub fn record_exception_thrown(&self) {}
    #[inline]
    pub fn record_exception_caught(&self) {}
    #[inline]
    pub fn record_solution(&self) {}
    #[inline]
    pub fn report(&self) -> MetricsReport {
        MetricsReport::default()
    }
    #[inline]
    pub fn reset(&self) {}
}

#[cfg(not(feature = "tracing"))]
impl Default for SolveMetrics {
    fn default() -> Self {
        Self::new()
    }
}
