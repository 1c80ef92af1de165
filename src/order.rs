//! Standard order of terms.
//!
//! Var < Number < Atom < Compound. Variables order by cell index, numbers
//! by value (a float before an equal integer), atoms alphabetically, and
//! compounds by arity, then name, then arguments left to right.

use crate::heap::Heap;
use crate::symbol::SymbolStore;
use crate::term::{Term, TermId, TermStore};
use smallvec::SmallVec;
use std::cmp::Ordering;

fn rank(term: &Term) -> u8 {
    match term {
        Term::Var(_) | Term::AttVar(_) | Term::Slot(_) => 0,
        Term::Int(_) | Term::Float(_) => 1,
        Term::Atom(_) => 3,
        Term::Struct(_, _) => 4,
    }
}

fn compare_numbers(a: &Term, b: &Term) -> Ordering {
    match (a, b) {
        (Term::Int(x), Term::Int(y)) => x.cmp(y),
        (Term::Float(x), Term::Float(y)) => x.get().total_cmp(&y.get()),
        (Term::Float(x), Term::Int(y)) => match x.get().partial_cmp(&(*y as f64)) {
            Some(Ordering::Equal) | None => Ordering::Less,
            Some(ord) => ord,
        },
        (Term::Int(x), Term::Float(y)) => match (*x as f64).partial_cmp(&y.get()) {
            Some(Ordering::Equal) | None => Ordering::Greater,
            Some(ord) => ord,
        },
        _ => Ordering::Equal,
    }
}

/// Compare two terms in the standard order, under the current bindings.
pub fn compare_terms(
    heap: &Heap,
    terms: &TermStore,
    symbols: &SymbolStore,
    a: TermId,
    b: TermId,
) -> Ordering {
    let mut worklist: SmallVec<[(TermId, TermId); 16]> = SmallVec::new();
    worklist.push((a, b));

    while let Some((a, b)) = worklist.pop() {
        let a = heap.deref(terms, a);
        let b = heap.deref(terms, b);
        if a == b {
            continue;
        }
        let ta = terms.get(a);
        let tb = terms.get(b);
        let ord = rank(&ta).cmp(&rank(&tb));
        if ord != Ordering::Equal {
            return ord;
        }
        let ord = match (&ta, &tb) {
            (Term::Atom(x), Term::Atom(y)) => symbols.name(*x).cmp(symbols.name(*y)),
            (Term::Struct(f, xs), Term::Struct(g, ys)) => {
                let ord = xs
                    .len()
                    .cmp(&ys.len())
                    .then_with(|| symbols.name(*f).cmp(symbols.name(*g)));
                if ord == Ordering::Equal {
                    for (x, y) in xs.iter().zip(ys.iter()).rev() {
                        worklist.push((*x, *y));
                    }
                }
                ord
            }
            _ if rank(&ta) == 1 => compare_numbers(&ta, &tb),
            _ => var_key(&ta).cmp(&var_key(&tb)),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }

    Ordering::Equal
}

fn var_key(term: &Term) -> (u32, u8) {
    match term {
        Term::Var(i) => (*i, 0),
        Term::AttVar(i) => (*i, 1),
        Term::Slot(i) => (*i, 2),
        _ => (0, 3),
    }
}
