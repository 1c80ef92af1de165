//! Iterative term rebuilding.
//!
//! Four operations share one traversal: resolving a term against the heap
//! for reporting, turning heap variables into template slots, instantiating
//! a clause template with fresh variables, and `copy_term` with its
//! attribute handling. None of them recurse on the host stack, and all of
//! them return ground subterms as they are.

use crate::heap::{AttrMap, Heap};
use crate::symbol::Sym;
use crate::term::{Term, TermId, TermStore};
use hashbrown::HashMap;
use smallvec::SmallVec;
use std::collections::VecDeque;

/// What to do with one node during a rebuild.
pub(crate) enum Step {
    /// Use this term as the result for the node.
    Leaf(TermId),
    /// Rebuild a compound from the results of these children.
    Descend(Sym, SmallVec<[TermId; 4]>),
}

/// Rebuild `root` bottom-up, asking `visit` what each node becomes.
///
/// Results are memoized by node id, so shared subterms are visited once.
pub(crate) fn rebuild<F>(root: TermId, terms: &TermStore, mut visit: F) -> TermId
where
    F: FnMut(TermId) -> Step,
{
    enum Work {
        Visit(TermId),
        Build(TermId, Sym, usize),
    }

    let mut work = vec![Work::Visit(root)];
    let mut results: Vec<TermId> = Vec::new();
    let mut memo: HashMap<TermId, TermId> = HashMap::new();

    while let Some(item) = work.pop() {
        match item {
            Work::Visit(id) => {
                if let Some(&done) = memo.get(&id) {
                    results.push(done);
                    continue;
                }
                match visit(id) {
                    Step::Leaf(result) => {
                        memo.insert(id, result);
                        results.push(result);
                    }
                    Step::Descend(name, args) => {
                        work.push(Work::Build(id, name, args.len()));
                        for &arg in args.iter().rev() {
                            work.push(Work::Visit(arg));
                        }
                    }
                }
            }
            Work::Build(id, name, arity) => {
                let args: SmallVec<[TermId; 4]> =
                    results.drain(results.len() - arity..).collect();
                let built = terms.app(name, args);
                memo.insert(id, built);
                results.push(built);
            }
        }
    }

    results.pop().unwrap_or(root)
}

/// Replace every bound variable in `term` by its value.
pub fn resolve(heap: &Heap, terms: &TermStore, term: TermId) -> TermId {
    rebuild(term, terms, |id| {
        let id = heap.deref(terms, id);
        if terms.is_ground(id) {
            return Step::Leaf(id);
        }
        match terms.get(id) {
            Term::Struct(name, args) => Step::Descend(name, args),
            _ => Step::Leaf(id),
        }
    })
}

/// Replace the variables of `roots` by template slots numbered from
/// `first`, one slot per cell and shared across all roots. Returns the slot
/// count afterwards.
///
/// Terms handed in from outside a query (answers of an earlier query,
/// clauses built from them) carry cell indices of a heap that is gone;
/// generalizing them first makes them ordinary templates. Attributes do
/// not travel with them.
pub fn generalize(roots: &mut [TermId], first: u32, terms: &TermStore) -> u32 {
    let mut slots: HashMap<u32, TermId> = HashMap::new();
    let mut next = first;
    for root in roots.iter_mut() {
        if terms.is_ground(*root) {
            continue;
        }
        *root = rebuild(*root, terms, |id| {
            if terms.is_ground(id) {
                return Step::Leaf(id);
            }
            match terms.get(id) {
                Term::Var(index) | Term::AttVar(index) => {
                    Step::Leaf(*slots.entry(index).or_insert_with(|| {
                        let slot = terms.slot(next);
                        next += 1;
                        slot
                    }))
                }
                Term::Struct(name, args) => Step::Descend(name, args),
                _ => Step::Leaf(id),
            }
        });
    }
    next
}

/// Instantiate a clause or query template, giving every `Slot(n)` the
/// variable in `slots[n]` (created on first use).
pub fn instantiate(
    template: TermId,
    slots: &mut [Option<TermId>],
    heap: &mut Heap,
    terms: &TermStore,
) -> TermId {
    if slots.is_empty() || terms.is_ground(template) {
        return template;
    }
    rebuild(template, terms, |id| {
        if terms.is_ground(id) {
            return Step::Leaf(id);
        }
        match terms.get(id) {
            Term::Slot(n) => {
                let slot = &mut slots[n as usize];
                let var = match *slot {
                    Some(var) => var,
                    None => {
                        let var = heap.new_var(terms);
                        *slot = Some(var);
                        var
                    }
                };
                Step::Leaf(var)
            }
            Term::Struct(name, args) => Step::Descend(name, args),
            _ => Step::Leaf(id),
        }
    })
}

/// How `copy_term` treats attributed variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrCopy {
    /// Copies are attributed variables carrying copied attributes.
    Keep,
    /// Copies are plain variables; attributes come back as goals.
    AsGoals,
}

/// Result of [`copy_term`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Copied {
    pub term: TermId,
    /// `(fresh variable, key, copied value)` per attribute, in order of
    /// first encounter of the variable, then attribute order. Only filled
    /// for [`AttrCopy::AsGoals`].
    pub goals: Vec<(TermId, Sym, TermId)>,
}

struct Copier {
    mode: AttrCopy,
    vars: HashMap<u32, TermId>,
    pending: VecDeque<(u32, TermId)>,
}

impl Copier {
    fn copy(&mut self, term: TermId, heap: &mut Heap, terms: &TermStore) -> TermId {
        let Copier {
            mode,
            vars,
            pending,
        } = self;
        rebuild(term, terms, |id| {
            let id = heap.deref(terms, id);
            if terms.is_ground(id) {
                return Step::Leaf(id);
            }
            match terms.get(id) {
                Term::Var(index) => Step::Leaf(
                    *vars
                        .entry(index)
                        .or_insert_with(|| heap.new_var(terms)),
                ),
                Term::AttVar(index) => {
                    if let Some(&fresh) = vars.get(&index) {
                        return Step::Leaf(fresh);
                    }
                    let fresh = match mode {
                        AttrCopy::Keep => heap.new_attvar(terms),
                        AttrCopy::AsGoals => heap.new_var(terms),
                    };
                    vars.insert(index, fresh);
                    pending.push_back((index, fresh));
                    Step::Leaf(fresh)
                }
                Term::Struct(name, args) => Step::Descend(name, args),
                _ => Step::Leaf(id),
            }
        })
    }
}

/// Copy `term` with fresh variables. Variables shared in the original are
/// shared in the copy, including through attribute values.
pub fn copy_term(term: TermId, heap: &mut Heap, terms: &TermStore, mode: AttrCopy) -> Copied {
    let mut copier = Copier {
        mode,
        vars: HashMap::new(),
        pending: VecDeque::new(),
    };
    let copy = copier.copy(term, heap, terms);
    let mut goals = Vec::new();

    while let Some((original, fresh)) = copier.pending.pop_front() {
        let mut copied_attrs = AttrMap::new();
        for (key, value) in heap.attrs(original) {
            let value = copier.copy(value, heap, terms);
            match mode {
                AttrCopy::Keep => copied_attrs.push((key, Some(value))),
                AttrCopy::AsGoals => goals.push((fresh, key, value)),
            }
        }
        if mode == AttrCopy::Keep {
            if let Term::AttVar(index) = terms.get(fresh) {
                heap.init_attrs(index, copied_attrs);
            }
        }
    }

    Copied { term: copy, goals }
}

#[cfg(test)]
#[path = "tests/copy.rs"]
mod tests;
