//! Error taxonomy.
//!
//! Ordinary failure is never an error: unification and builtins report it
//! as `false`. What remains are two disjoint kinds:
//!
//! - catchable errors ([`PrologError::Iso`], [`PrologError::Thrown`]), which
//!   unwind to the nearest matching `catch/3` or abandon the query;
//! - fatal errors ([`PrologError::Fatal`]), engine invariant violations that
//!   no program-level catch may intercept.

use crate::format::format_term;
use crate::heap::Heap;
use crate::symbol::{Atoms, Sym, SymbolStore};
use crate::term::{Term, TermId, TermStore};
use smallvec::smallvec;
use std::fmt;

/// Engine invariant violations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FatalError {
    /// A checkpoint taken on one heap was reverted on another.
    ForeignCheckpoint { heap: u32, checkpoint_heap: u32 },
    /// The trail is already shorter than the checkpoint: it was reverted
    /// past, so the checkpoint is no longer live.
    CheckpointAhead { trail_len: usize, checkpoint: usize },
    /// The checkpoint claims a branch that this heap never took.
    UnknownBranch { generation: u64, current: u64 },
}

impl fmt::Display for FatalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FatalError::ForeignCheckpoint {
                heap,
                checkpoint_heap,
            } => write!(
                f,
                "checkpoint from heap {} reverted on heap {}",
                checkpoint_heap, heap
            ),
            FatalError::CheckpointAhead {
                trail_len,
                checkpoint,
            } => write!(
                f,
                "checkpoint at trail position {} is past the trail end {}",
                checkpoint, trail_len
            ),
            FatalError::UnknownBranch {
                generation,
                current,
            } => write!(
                f,
                "checkpoint generation {} was never issued (current {})",
                generation, current
            ),
        }
    }
}

impl std::error::Error for FatalError {}

/// ISO error conditions raised by the engine and its builtins.
///
/// These are kept typed until they need to become a term: either when a
/// `catch/3` frame tries to match them, or when the driver reports them.
#[derive(Debug, Clone, PartialEq)]
pub enum IsoError {
    Instantiation,
    Type {
        expected: &'static str,
        culprit: TermId,
    },
    Domain {
        domain: &'static str,
        culprit: TermId,
    },
    Existence {
        kind: &'static str,
        culprit: TermId,
    },
    Permission {
        action: &'static str,
        kind: &'static str,
        culprit: TermId,
    },
    Representation {
        signature: TermId,
        message: &'static str,
    },
    Syntax(String),
    Import {
        module: Sym,
        signature: TermId,
    },
}

impl IsoError {
    pub fn type_error(expected: &'static str, culprit: TermId) -> Self {
        IsoError::Type { expected, culprit }
    }

    pub fn domain_error(domain: &'static str, culprit: TermId) -> Self {
        IsoError::Domain { domain, culprit }
    }

    pub fn existence_error(kind: &'static str, culprit: TermId) -> Self {
        IsoError::Existence { kind, culprit }
    }

    pub fn permission_error(action: &'static str, kind: &'static str, culprit: TermId) -> Self {
        IsoError::Permission {
            action,
            kind,
            culprit,
        }
    }

    /// The formal part of the error term, e.g. `type_error(callable, 1)`.
    pub fn formal(&self, terms: &TermStore, symbols: &SymbolStore) -> TermId {
        let atom = |name: &str| terms.atom(symbols.intern(name));
        match self {
            IsoError::Instantiation => atom("instantiation_error"),
            IsoError::Type { expected, culprit } => {
                terms.app2(symbols.intern("type_error"), atom(expected), *culprit)
            }
            IsoError::Domain { domain, culprit } => {
                terms.app2(symbols.intern("domain_error"), atom(domain), *culprit)
            }
            IsoError::Existence { kind, culprit } => {
                terms.app2(symbols.intern("existence_error"), atom(kind), *culprit)
            }
            IsoError::Permission {
                action,
                kind,
                culprit,
            } => terms.app(
                symbols.intern("permission_error"),
                smallvec![atom(action), atom(kind), *culprit],
            ),
            IsoError::Representation { signature, message } => terms.app2(
                symbols.intern("representation_error"),
                *signature,
                atom(message),
            ),
            IsoError::Syntax(message) => terms.app1(symbols.intern("syntax_error"), atom(message)),
            IsoError::Import { module, signature } => terms.app2(
                symbols.intern("import_error"),
                terms.atom(*module),
                *signature,
            ),
        }
    }

    /// Build the thrown term `error(Formal, Context)` with a fresh context
    /// variable.
    pub fn to_ball(&self, heap: &mut Heap, terms: &TermStore, symbols: &SymbolStore) -> TermId {
        let formal = self.formal(terms, symbols);
        let context = heap.new_var(terms);
        terms.app2(symbols.intern("error"), formal, context)
    }
}

/// Errors that abort the current search path.
#[derive(Debug, Clone, PartialEq)]
pub enum PrologError {
    /// An ISO error condition not yet turned into a term.
    Iso(IsoError),
    /// A ball raised by `throw/1`, or an ISO error after it was copied out
    /// of the search state. Contains no bound variables.
    Thrown(TermId),
    /// Uncatchable engine invariant violation.
    Fatal(FatalError),
}

impl PrologError {
    /// Can a program-level `catch/3` intercept this error?
    pub fn is_catchable(&self) -> bool {
        !matches!(self, PrologError::Fatal(_))
    }
}

impl fmt::Display for PrologError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrologError::Iso(e) => write!(f, "ISO error: {:?}", e),
            PrologError::Thrown(ball) => write!(f, "uncaught exception (term #{})", ball.raw()),
            PrologError::Fatal(e) => write!(f, "internal error: {}", e),
        }
    }
}

impl std::error::Error for PrologError {}

impl From<IsoError> for PrologError {
    fn from(e: IsoError) -> Self {
        PrologError::Iso(e)
    }
}

impl From<FatalError> for PrologError {
    fn from(e: FatalError) -> Self {
        PrologError::Fatal(e)
    }
}

/// Message shown when a top-level query has no (more) solutions.
pub const NO_SOLUTIONS: &str = "no solutions";

/// Render an error for the top level.
///
/// Thrown terms of the form `error(Formal, _)` get a message specific to
/// the formal error; any other ball is reported as an uncaught exception.
pub fn describe_error(
    error: &PrologError,
    heap: Option<&Heap>,
    terms: &TermStore,
    symbols: &SymbolStore,
) -> String {
    match error {
        PrologError::Fatal(e) => format!("internal error: {}", e),
        PrologError::Iso(e) => describe_formal(e.formal(terms, symbols), heap, terms, symbols),
        PrologError::Thrown(ball) => {
            let atoms = Atoms::intern(symbols);
            match terms.get(*ball) {
                Term::Struct(name, args) if name == atoms.error && args.len() == 2 => {
                    describe_formal(args[0], heap, terms, symbols)
                }
                _ => format!(
                    "uncaught exception: {}",
                    format_term(*ball, terms, symbols, heap)
                ),
            }
        }
    }
}

fn describe_formal(
    formal: TermId,
    heap: Option<&Heap>,
    terms: &TermStore,
    symbols: &SymbolStore,
) -> String {
    let show = |t: TermId| format_term(t, terms, symbols, heap);
    let term = terms.get(formal);
    let Some((name, arity)) = term.functor() else {
        return format!("unknown error: {}", show(formal));
    };
    let args: Vec<TermId> = match &term {
        Term::Struct(_, args) => args.to_vec(),
        _ => Vec::new(),
    };
    match (symbols.name(name), arity) {
        ("instantiation_error", 0) => {
            "instantiation error: arguments are not sufficiently instantiated".to_string()
        }
        ("type_error", 2) => format!(
            "type error: expected {}, got {}",
            show(args[0]),
            show(args[1])
        ),
        ("domain_error", 2) => format!(
            "domain error: {} is not in domain {}",
            show(args[1]),
            show(args[0])
        ),
        ("existence_error", 2) => format!(
            "existence error: unknown {} {}",
            show(args[0]),
            show(args[1])
        ),
        ("permission_error", 3) => format!(
            "permission error: cannot {} {} {}",
            show(args[0]),
            show(args[1]),
            show(args[2])
        ),
        ("representation_error", 2) => format!(
            "representation error: {}: {}",
            show(args[0]),
            show(args[1])
        ),
        ("syntax_error", 1) => format!("syntax error: {}", show(args[0])),
        ("import_error", 2) => format!(
            "import error: {} is not exported by module {}",
            show(args[1]),
            show(args[0])
        ),
        _ => format!("unknown error: {}", show(formal)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::setup;

    #[test]
    fn fatal_errors_are_not_catchable() {
        let fatal = PrologError::Fatal(FatalError::CheckpointAhead {
            trail_len: 1,
            checkpoint: 4,
        });
        assert!(!fatal.is_catchable());
        assert!(PrologError::Iso(IsoError::Instantiation).is_catchable());
    }

    #[test]
    fn formal_terms_follow_iso_shapes() {
        let (symbols, terms) = setup();
        let one = terms.int(1);
        let formal = IsoError::type_error("callable", one).formal(&terms, &symbols);
        let type_error = symbols.intern("type_error");
        let callable = terms.atom(symbols.intern("callable"));
        assert_eq!(formal, terms.app2(type_error, callable, one));
    }

    #[test]
    fn ball_wraps_formal_in_error() {
        let (symbols, terms) = setup();
        let mut heap = Heap::new(0);
        let ball = IsoError::Instantiation.to_ball(&mut heap, &terms, &symbols);
        match terms.get(ball) {
            Term::Struct(name, args) => {
                assert_eq!(symbols.name(name), "error");
                assert_eq!(args.len(), 2);
                assert_eq!(
                    args[0],
                    terms.atom(symbols.intern("instantiation_error"))
                );
                assert!(matches!(terms.get(args[1]), Term::Var(_)));
            }
            other => panic!("expected error/2, got {:?}", other),
        }
    }

    #[test]
    fn describe_type_error() {
        let (symbols, terms) = setup();
        let err = PrologError::Iso(IsoError::type_error("callable", terms.int(1)));
        assert_eq!(
            describe_error(&err, None, &terms, &symbols),
            "type error: expected callable, got 1"
        );
    }

    #[test]
    fn describe_thrown_iso_ball() {
        let (symbols, terms) = setup();
        let mut heap = Heap::new(0);
        let culprit = terms.atom(symbols.intern("foo"));
        let ball = IsoError::existence_error("procedure", culprit).to_ball(&mut heap, &terms, &symbols);
        assert_eq!(
            describe_error(&PrologError::Thrown(ball), Some(&heap), &terms, &symbols),
            "existence error: unknown procedure foo"
        );
    }

    #[test]
    fn describe_every_formal_kind() {
        let (symbols, terms) = setup();
        let a = terms.atom(symbols.intern("a"));
        let m = symbols.intern("lists");
        let cases = [
            (
                IsoError::domain_error("order", a),
                "domain error: a is not in domain order",
            ),
            (
                IsoError::permission_error("modify", "static_procedure", a),
                "permission error: cannot modify static_procedure a",
            ),
            (
                IsoError::Representation {
                    signature: a,
                    message: "max_arity",
                },
                "representation error: a: max_arity",
            ),
            (
                IsoError::Syntax("operator expected".to_string()),
                "syntax error: 'operator expected'",
            ),
            (
                IsoError::Import {
                    module: m,
                    signature: a,
                },
                "import error: a is not exported by module lists",
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(
                describe_error(&PrologError::Iso(err), None, &terms, &symbols),
                expected
            );
        }
    }

    #[test]
    fn describe_plain_ball() {
        let (symbols, terms) = setup();
        let ball = terms.atom(symbols.intern("oops"));
        assert_eq!(
            describe_error(&PrologError::Thrown(ball), None, &terms, &symbols),
            "uncaught exception: oops"
        );
    }

    #[test]
    fn describe_fatal() {
        let (symbols, terms) = setup();
        let err = PrologError::Fatal(FatalError::ForeignCheckpoint {
            heap: 2,
            checkpoint_heap: 1,
        });
        assert_eq!(
            describe_error(&err, None, &terms, &symbols),
            "internal error: checkpoint from heap 1 reverted on heap 2"
        );
    }
}
