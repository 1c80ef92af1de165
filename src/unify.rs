use crate::heap::Heap;
use crate::term::{Term, TermId, TermStore};
use hashbrown::HashSet;
use smallvec::SmallVec;

#[cfg(feature = "tracing")]
use crate::trace::{debug_span, trace};

/// Unify two terms by binding heap variables.
///
/// Returns `false` on mismatch. Bindings made before the mismatch stay on
/// the trail; the caller reverts them by backtracking to a checkpoint.
///
/// Uses an explicit worklist to avoid recursion. With `occurs_check` a
/// binding that would make a term contain itself fails instead.
///
/// Variable-variable bindings point the younger cell at the older one, and
/// a plain variable is always bound rather than an attributed one. Binding
/// an attributed variable queues a wakeup on the heap.
pub fn unify(
    heap: &mut Heap,
    terms: &TermStore,
    t1: TermId,
    t2: TermId,
    occurs_check: bool,
) -> bool {
    #[cfg(feature = "tracing")]
    let _span = debug_span!("unify", ?t1, ?t2).entered();

    let mut worklist: SmallVec<[(TermId, TermId); 32]> = SmallVec::new();
    worklist.push((t1, t2));

    while let Some((a, b)) = worklist.pop() {
        let a = heap.deref(terms, a);
        let b = heap.deref(terms, b);
        if a == b {
            continue;
        }

        match (terms.get(a), terms.get(b)) {
            (Term::Var(i), Term::Var(j)) => {
                if i < j {
                    heap.bind(j, a);
                } else {
                    heap.bind(i, b);
                }
            }
            (Term::Var(i), Term::AttVar(_)) => heap.bind(i, b),
            (Term::AttVar(_), Term::Var(j)) => heap.bind(j, a),
            (Term::AttVar(i), Term::AttVar(j)) => {
                if i < j {
                    heap.bind_attvar(j, a);
                } else {
                    heap.bind_attvar(i, b);
                }
            }
            (Term::Var(i), _) => {
                if occurs_check && occurs(heap, terms, i, b) {
                    #[cfg(feature = "tracing")]
                    trace!(var = i, "unify_occurs_check_failed");
                    return false;
                }
                heap.bind(i, b);
            }
            (_, Term::Var(j)) => {
                if occurs_check && occurs(heap, terms, j, a) {
                    #[cfg(feature = "tracing")]
                    trace!(var = j, "unify_occurs_check_failed");
                    return false;
                }
                heap.bind(j, a);
            }
            (Term::AttVar(i), _) => {
                if occurs_check && occurs(heap, terms, i, b) {
                    #[cfg(feature = "tracing")]
                    trace!(var = i, "unify_occurs_check_failed");
                    return false;
                }
                heap.bind_attvar(i, b);
            }
            (_, Term::AttVar(j)) => {
                if occurs_check && occurs(heap, terms, j, a) {
                    #[cfg(feature = "tracing")]
                    trace!(var = j, "unify_occurs_check_failed");
                    return false;
                }
                heap.bind_attvar(j, a);
            }
            (Term::Float(x), Term::Float(y)) => {
                if x.get() != y.get() {
                    return false;
                }
            }
            (Term::Struct(f1, args1), Term::Struct(f2, args2)) => {
                if f1 != f2 || args1.len() != args2.len() {
                    #[cfg(feature = "tracing")]
                    trace!("unify_functor_mismatch");
                    return false;
                }
                for (c1, c2) in args1.iter().zip(args2.iter()).rev() {
                    worklist.push((*c1, *c2));
                }
            }
            // Distinct atoms, integers, or mixed kinds. Hashconsing makes
            // equal atomic terms share an id, caught above.
            _ => return false,
        }
    }

    true
}

/// Occurs check: does variable cell `var` occur in `term` under the
/// current bindings?
///
/// Ground subterms are skipped without a walk, so binding a variable to a
/// ground structure costs O(1) however large it is.
pub fn occurs(heap: &Heap, terms: &TermStore, var: u32, term: TermId) -> bool {
    if terms.is_ground(term) {
        return false;
    }
    let mut stack: SmallVec<[TermId; 16]> = SmallVec::new();
    let mut seen: HashSet<TermId> = HashSet::new();
    stack.push(term);

    while let Some(t) = stack.pop() {
        let t = heap.deref(terms, t);
        if terms.is_ground(t) || !seen.insert(t) {
            continue;
        }
        match terms.get(t) {
            Term::Var(idx) | Term::AttVar(idx) => {
                if idx == var {
                    return true;
                }
            }
            Term::Struct(_, args) => stack.extend(args.iter().copied()),
            _ => {}
        }
    }

    false
}

#[cfg(test)]
mod tests;
