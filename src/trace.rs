//! Feature-gated tracing macros.
//!
//! With the `tracing` feature the engine's instrumentation points (goal
//! activation, backtracking, cut, clause selection, unwinding, checkpoint
//! reverts) emit `tracing` events. Without it every macro below expands to
//! nothing.
//!
//! ```rust,ignore
//! use crate::trace::{debug, debug_span, trace};
//!
//! let _span = debug_span!("solve", query = heap.id()).entered();
//! trace!(goal = ?goal, "activate");
//! debug!(depth, "cut");
//! ```

#[cfg(feature = "tracing")]
pub use tracing::{debug, debug_span, trace, Span};

// Without the feature the same names resolve to macros that expand to
// nothing, so instrumented code reads the same either way.
#[cfg(not(feature = "tracing"))]
mod noop {
    /// Span stand-in; entering it yields a guard that does nothing.
    pub struct Span;

    impl Span {
        pub fn none() -> Self {
            Span
        }

        pub fn entered(self) -> SpanGuard {
            SpanGuard
        }
    }

    pub struct SpanGuard;

    #[macro_export]
    macro_rules! trace {
        ($($tt:tt)*) => {};
    }

    #[macro_export]
    macro_rules! debug {
        ($($tt:tt)*) => {};
    }

    #[macro_export]
    macro_rules! debug_span {
        ($($tt:tt)*) => {
            $crate::trace::Span::none()
        };
    }

    pub use crate::{debug, debug_span, trace};
}

#[cfg(not(feature = "tracing"))]
pub use noop::*;

/// Install a stderr `fmt` subscriber filtered by `RUST_LOG` (default `info`).
///
/// Safe to call more than once; later calls are ignored.
#[cfg(feature = "tracing")]
pub fn init_subscriber() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true)
                .with_ansi(false),
        )
        .with(filter)
        .try_init()
        .ok();
}

#[cfg(not(feature = "tracing"))]
pub fn init_subscriber() {}

#[cfg(test)]
#[path = "tests/trace.rs"]
mod tests;
