//! Clause storage and lookup.
//!
//! The engine only needs [`ClauseSource`]: an ordered clause snapshot per
//! predicate that stays the same while a call backtracks into it. The
//! in-memory [`Database`] is the reference implementation.

use crate::builtin;
use crate::control::check_body;
use crate::copy::generalize;
use crate::error::{IsoError, PrologError};
use crate::symbol::{Atoms, Sym, SymbolStore};
use crate::term::{Term, TermId, TermStore};
use hashbrown::HashMap;
use smallvec::SmallVec;
use std::cell::RefCell;
use std::rc::Rc;

/// A stored clause. `head` and `body` are templates whose variables are
/// `Slot(0..slots)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clause {
    pub head: TermId,
    pub body: TermId,
    pub slots: u32,
}

/// Where the engine gets clauses from.
pub trait ClauseSource {
    /// Clauses of `module:name/arity` in order, or `None` if the predicate
    /// is not defined there.
    fn lookup(&self, module: Sym, name: Sym, arity: usize) -> Option<Rc<[Clause]>>;
}

type PredKey = (Sym, Sym, usize);

#[derive(Default)]
struct Predicate {
    clauses: Vec<Clause>,
    snapshot: RefCell<Option<Rc<[Clause]>>>,
}

impl Predicate {
    fn snapshot(&self) -> Rc<[Clause]> {
        let mut cached = self.snapshot.borrow_mut();
        match cached.as_ref() {
            Some(clauses) => Rc::clone(clauses),
            None => {
                let clauses: Rc<[Clause]> = self.clauses.as_slice().into();
                *cached = Some(Rc::clone(&clauses));
                clauses
            }
        }
    }

    fn push(&mut self, clause: Clause, front: bool) {
        if front {
            self.clauses.insert(0, clause);
        } else {
            self.clauses.push(clause);
        }
        *self.snapshot.get_mut() = None;
    }
}

/// In-memory clause database with per-module predicates and imports.
#[derive(Default)]
pub struct Database {
    predicates: HashMap<PredKey, Predicate>,
    imports: HashMap<PredKey, Sym>,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a clause to `module`. Heap variables in `head` and `body`
    /// are turned into `Slot`s.
    pub fn add_clause(
        &mut self,
        module: Sym,
        head: TermId,
        body: TermId,
        terms: &TermStore,
        symbols: &SymbolStore,
    ) -> Result<(), PrologError> {
        self.insert(module, head, body, terms, symbols, false)
    }

    /// Prepend a clause to `module`.
    pub fn add_clause_front(
        &mut self,
        module: Sym,
        head: TermId,
        body: TermId,
        terms: &TermStore,
        symbols: &SymbolStore,
    ) -> Result<(), PrologError> {
        self.insert(module, head, body, terms, symbols, true)
    }

    fn insert(
        &mut self,
        module: Sym,
        head: TermId,
        body: TermId,
        terms: &TermStore,
        symbols: &SymbolStore,
        front: bool,
    ) -> Result<(), PrologError> {
        let atoms = Atoms::intern(symbols);
        let (name, arity) = match terms.get(head) {
            Term::Slot(_) | Term::Var(_) | Term::AttVar(_) => {
                return Err(IsoError::Instantiation.into())
            }
            term => term
                .functor()
                .ok_or(IsoError::type_error("callable", head))?,
        };
        if atoms.is_control(name, arity) || builtin::is_builtin(symbols.name(name), arity)
        {
            return Err(IsoError::permission_error(
                "modify",
                "static_procedure",
                indicator(terms, &atoms, name, arity),
            )
            .into());
        }
        check_body(body, terms, &atoms, None)?;

        let first = slot_count(head, terms).max(slot_count(body, terms));
        let mut template = [head, body];
        let slots = generalize(&mut template, first, terms);
        let [head, body] = template;
        let clause = Clause { head, body, slots };
        self.predicates
            .entry((module, name, arity))
            .or_default()
            .push(clause, front);
        Ok(())
    }

    /// Make `from:name/arity` callable from module `into`.
    pub fn import(
        &mut self,
        from: Sym,
        into: Sym,
        name: Sym,
        arity: usize,
        terms: &TermStore,
        symbols: &SymbolStore,
    ) -> Result<(), PrologError> {
        if !self.predicates.contains_key(&(from, name, arity)) {
            let atoms = Atoms::intern(symbols);
            return Err(IsoError::Import {
                module: from,
                signature: indicator(terms, &atoms, name, arity),
            }
            .into());
        }
        self.imports.insert((into, name, arity), from);
        Ok(())
    }

    /// Is `module:name/arity` defined, directly or through an import?
    pub fn is_defined(&self, module: Sym, name: Sym, arity: usize) -> bool {
        self.lookup(module, name, arity).is_some()
    }

    pub fn clause_count(&self, module: Sym, name: Sym, arity: usize) -> usize {
        self.predicates
            .get(&(module, name, arity))
            .map_or(0, |pred| pred.clauses.len())
    }
}

impl ClauseSource for Database {
    fn lookup(&self, module: Sym, name: Sym, arity: usize) -> Option<Rc<[Clause]>> {
        let key = (module, name, arity);
        if let Some(pred) = self.predicates.get(&key) {
            return Some(pred.snapshot());
        }
        let from = self.imports.get(&key)?;
        self.predicates
            .get(&(*from, name, arity))
            .map(Predicate::snapshot)
    }
}

/// The predicate indicator term `name/arity`.
pub fn indicator(terms: &TermStore, atoms: &Atoms, name: Sym, arity: usize) -> TermId {
    terms.app2(atoms.slash, terms.atom(name), terms.int(arity as i64))
}

/// One more than the highest `Slot` index in `template`.
pub fn slot_count(template: TermId, terms: &TermStore) -> u32 {
    let mut stack: SmallVec<[TermId; 16]> = SmallVec::new();
    stack.push(template);
    let mut count = 0;
    while let Some(t) = stack.pop() {
        match terms.get(t) {
            Term::Slot(n) => count = count.max(n + 1),
            Term::Struct(_, args) => stack.extend(args.iter().copied()),
            _ => {}
        }
    }
    count
}
