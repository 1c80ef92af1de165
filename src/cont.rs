//! Success and failure continuations.
//!
//! A success continuation is an immutable, reference-counted chain of
//! [`Frame`]s describing what runs after the current goal succeeds. A failure
//! continuation is a second chain of [`Choice`]s, each holding the checkpoint
//! it reverts to and the alternative it offers. Branches share unmodified
//! suffixes of both chains.

use crate::database::Clause;
use crate::heap::Checkpoint;
use crate::symbol::Sym;
use crate::term::TermId;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Head of a success chain.
pub type SuccessCont = Rc<Kont>;

/// Head of a failure chain. `None` is done-failure: no alternatives left.
pub type FailCont = Option<Rc<Choice>>;

/// Solutions gathered by one `findall/3` call.
pub type Collected = Rc<RefCell<Vec<TermId>>>;

/// One link of a success chain.
pub struct Kont {
    pub frame: Frame,
    pub next: Option<SuccessCont>,
}

/// What a success continuation does when activated.
#[derive(Debug)]
pub enum Frame {
    /// Done-success: report a solution.
    Done,
    /// Solve `goal` in `module`. A cut inside it prunes back to `barrier`.
    Call {
        goal: TermId,
        module: Sym,
        barrier: FailCont,
    },
    /// First success of an if-then-else condition: drop the condition's
    /// choice points by resuming `commit_to`, then solve `then`.
    IfThen {
        then: TermId,
        module: Sym,
        barrier: FailCont,
        commit_to: FailCont,
    },
    /// Scope of a `catch/3`. Transparent on success; consulted while an
    /// error unwinds.
    Catch {
        catcher: TermId,
        recovery: TermId,
        module: Sym,
        checkpoint: Checkpoint,
        fcont_at_entry: FailCont,
    },
    /// Record a copy of `template` for `findall/3` and ask for the next
    /// solution.
    Collect {
        template: TermId,
        results: Collected,
    },
}

/// One link of a failure chain.
pub struct Choice {
    pub alt: Alternative,
    pub checkpoint: Checkpoint,
    pub prev: FailCont,
}

/// The alternative a choice point offers once the heap is reverted.
#[derive(Debug)]
pub enum Alternative {
    /// Solve `goal` with `scont`: the right branch of a disjunction or the
    /// else branch of an if-then-else.
    Goal {
        goal: TermId,
        module: Sym,
        barrier: FailCont,
        scont: SuccessCont,
    },
    /// Try the remaining clauses of a predicate call, from index `next`.
    Clauses {
        goal: TermId,
        module: Sym,
        clauses: Rc<[Clause]>,
        next: usize,
        scont: SuccessCont,
    },
    /// `repeat`: succeed again, forever.
    Repeat { scont: SuccessCont },
    /// All solutions of a `findall/3` goal are in: unify `out` with them.
    CollectDone {
        results: Collected,
        out: TermId,
        module: Sym,
        scont: SuccessCont,
    },
}

/// Result of activating a success continuation or failing into a failure
/// continuation.
pub enum Transition {
    /// Continue with this success continuation under this failure one.
    Proceed(SuccessCont, FailCont),
    /// Resume the given failure continuation.
    Backtrack(FailCont),
    /// Done-success was reached; the failure continuation yields more.
    Solution(FailCont),
    /// Done-failure was reached.
    Exhausted,
}

impl Kont {
    pub fn done() -> SuccessCont {
        Rc::new(Kont {
            frame: Frame::Done,
            next: None,
        })
    }

    pub fn push(frame: Frame, next: SuccessCont) -> SuccessCont {
        Rc::new(Kont {
            frame,
            next: Some(next),
        })
    }

    /// Prepend a `Call` frame.
    pub fn call(goal: TermId, module: Sym, barrier: FailCont, next: SuccessCont) -> SuccessCont {
        Kont::push(
            Frame::Call {
                goal,
                module,
                barrier,
            },
            next,
        )
    }

    /// Number of frames in the chain, counting this one.
    pub fn depth(&self) -> usize {
        let mut depth = 1;
        let mut cur = self.next.as_deref();
        while let Some(k) = cur {
            depth += 1;
            cur = k.next.as_deref();
        }
        depth
    }
}

impl Choice {
    pub fn push(alt: Alternative, checkpoint: Checkpoint, prev: FailCont) -> FailCont {
        Some(Rc::new(Choice {
            alt,
            checkpoint,
            prev,
        }))
    }
}

/// Number of choice points in a failure chain.
pub fn choice_depth(fcont: &FailCont) -> usize {
    let mut depth = 0;
    let mut cur = fcont.as_deref();
    while let Some(c) = cur {
        depth += 1;
        cur = c.prev.as_deref();
    }
    depth
}

/// Are `a` and `b` the same failure continuation?
pub fn same_fcont(a: &FailCont, b: &FailCont) -> bool {
    match (a, b) {
        (Some(x), Some(y)) => Rc::ptr_eq(x, y),
        (None, None) => true,
        _ => false,
    }
}

impl fmt::Debug for Kont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kont")
            .field("frame", &self.frame)
            .field("depth", &self.depth())
            .finish()
    }
}

impl fmt::Debug for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Choice")
            .field("alt", &self.alt)
            .field("checkpoint", &self.checkpoint)
            .field("depth", &choice_depth(&self.prev))
            .finish()
    }
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transition::Proceed(_, fcont) => write!(f, "Proceed(.., {} choices)", choice_depth(fcont)),
            Transition::Backtrack(fcont) => write!(f, "Backtrack({} choices)", choice_depth(fcont)),
            Transition::Solution(fcont) => write!(f, "Solution({} choices)", choice_depth(fcont)),
            Transition::Exhausted => f.write_str("Exhausted"),
        }
    }
}

// Chains can be arbitrarily long; dropping them link by link keeps the
// host stack flat. Frames and alternatives also own chains of the other
// kind, so both drops hand those over to a shared worklist.

enum Link {
    S(SuccessCont),
    F(Rc<Choice>),
}

fn drain(mut pending: Vec<Link>) {
    while let Some(link) = pending.pop() {
        match link {
            Link::S(rc) => {
                if let Ok(mut kont) = Rc::try_unwrap(rc) {
                    take_kont(&mut kont, &mut pending);
                }
            }
            Link::F(rc) => {
                if let Ok(mut choice) = Rc::try_unwrap(rc) {
                    take_choice(&mut choice, &mut pending);
                }
            }
        }
    }
}

fn take_fcont(fcont: &mut FailCont, pending: &mut Vec<Link>) {
    if let Some(c) = fcont.take() {
        pending.push(Link::F(c));
    }
}

fn take_kont(kont: &mut Kont, pending: &mut Vec<Link>) {
    if let Some(next) = kont.next.take() {
        pending.push(Link::S(next));
    }
    match &mut kont.frame {
        Frame::Call { barrier, .. } => take_fcont(barrier, pending),
        Frame::IfThen {
            barrier, commit_to, ..
        } => {
            take_fcont(barrier, pending);
            take_fcont(commit_to, pending);
        }
        Frame::Catch { fcont_at_entry, .. } => take_fcont(fcont_at_entry, pending),
        Frame::Done | Frame::Collect { .. } => {}
    }
}

fn take_choice(choice: &mut Choice, pending: &mut Vec<Link>) {
    take_fcont(&mut choice.prev, pending);
    let scont = match &mut choice.alt {
        Alternative::Goal { barrier, scont, .. } => {
            take_fcont(barrier, pending);
            scont
        }
        Alternative::Clauses { scont, .. }
        | Alternative::Repeat { scont }
        | Alternative::CollectDone { scont, .. } => scont,
    };
    // Leave a cheap terminal in place of the moved chain.
    let done = Rc::new(Kont {
        frame: Frame::Done,
        next: None,
    });
    pending.push(Link::S(std::mem::replace(scont, done)));
}

impl Drop for Kont {
    fn drop(&mut self) {
        if self.next.is_none() && matches!(self.frame, Frame::Done | Frame::Collect { .. }) {
            return;
        }
        let mut pending = Vec::new();
        take_kont(self, &mut pending);
        drain(pending);
    }
}

impl Drop for Choice {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        take_choice(self, &mut pending);
        drain(pending);
    }
}
