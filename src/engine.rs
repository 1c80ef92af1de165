//! Engine - top-level driver for queries.
//!
//! The Engine owns everything shared by its queries (symbols, terms, the
//! clause source, builtins, configuration). A [`Query`] owns one heap and
//! drives the continuation trampoline:
//! 1. Instantiate the goal template with fresh variables
//! 2. Alternate `activate` / `fail` until a solution or exhaustion
//! 3. Report the slot bindings as an [`Answer`]

use crate::builtin::{self, BuiltinTable};
use crate::config::EngineConfig;
use crate::control::{check_body, Machine};
use crate::copy::{generalize, instantiate, resolve};
use crate::cont::{FailCont, Kont, Transition};
use crate::database::{ClauseSource, Database};
use crate::error::{describe_error, PrologError, NO_SOLUTIONS};
use crate::format::format_term;
use crate::heap::Heap;
use crate::metrics::SolveMetrics;
use crate::symbol::{Atoms, Sym, SymbolStore};
use crate::term::{TermId, TermStore};
use std::cell::Cell;
use std::rc::Rc;

#[cfg(feature = "tracing")]
use crate::trace::{debug, debug_span};

/// Resolution engine over a clause source.
pub struct Engine<S: ClauseSource = Database> {
    symbols: SymbolStore,
    terms: TermStore,
    atoms: Atoms,
    source: S,
    builtins: BuiltinTable,
    config: EngineConfig,
    default_module: Sym,
    metrics: SolveMetrics,
    next_heap: Cell<u32>,
}

impl Engine<Database> {
    /// Create an engine with an empty in-memory database.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self::with_source(config, Database::new())
    }

    /// Append a clause to the default module. Variables are `Slot`s.
    pub fn add_clause(&mut self, head: TermId, body: TermId) -> Result<(), PrologError> {
        self.source
            .add_clause(self.default_module, head, body, &self.terms, &self.symbols)
    }

    /// Append a clause to `module`.
    pub fn add_clause_in(
        &mut self,
        module: &str,
        head: TermId,
        body: TermId,
    ) -> Result<(), PrologError> {
        let module = self.symbols.intern(module);
        self.source
            .add_clause(module, head, body, &self.terms, &self.symbols)
    }

    /// Append a fact to the default module.
    pub fn add_fact(&mut self, head: TermId) -> Result<(), PrologError> {
        let body = self.terms.atom(self.atoms.true_);
        self.add_clause(head, body)
    }

    /// Make `from:name/arity` visible in module `into`.
    pub fn import(
        &mut self,
        from: &str,
        into: &str,
        name: &str,
        arity: usize,
    ) -> Result<(), PrologError> {
        let from = self.symbols.intern(from);
        let into = self.symbols.intern(into);
        let name = self.symbols.intern(name);
        self.source
            .import(from, into, name, arity, &self.terms, &self.symbols)
    }

    pub fn database(&self) -> &Database {
        &self.source
    }
}

impl Default for Engine<Database> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ClauseSource> Engine<S> {
    /// Create an engine over any clause source.
    pub fn with_source(config: EngineConfig, source: S) -> Self {
        let symbols = SymbolStore::new();
        let atoms = Atoms::intern(&symbols);
        let builtins = builtin::table(&symbols);
        let default_module = symbols.intern(&config.default_module);
        Self {
            symbols,
            terms: TermStore::new(),
            atoms,
            source,
            builtins,
            config,
            default_module,
            metrics: SolveMetrics::new(),
            next_heap: Cell::new(0),
        }
    }

    pub fn symbols(&self) -> &SymbolStore {
        &self.symbols
    }

    pub fn terms(&self) -> &TermStore {
        &self.terms
    }

    pub fn atoms(&self) -> &Atoms {
        &self.atoms
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn metrics(&self) -> &SolveMetrics {
        &self.metrics
    }

    pub fn atom(&self, name: &str) -> TermId {
        self.terms.atom(self.symbols.intern(name))
    }

    pub fn int(&self, value: i64) -> TermId {
        self.terms.int(value)
    }

    pub fn float(&self, value: f64) -> TermId {
        self.terms.float(value)
    }

    /// Template variable number `n`.
    pub fn slot(&self, n: u32) -> TermId {
        self.terms.slot(n)
    }

    /// `name(args...)`, or the atom `name` for no arguments.
    pub fn app(&self, name: &str, args: &[TermId]) -> TermId {
        self.terms
            .app(self.symbols.intern(name), args.iter().copied().collect())
    }

    /// Proper list of `items`.
    pub fn list(&self, items: &[TermId]) -> TermId {
        self.list_with_tail(items, self.terms.atom(self.atoms.nil))
    }

    pub fn list_with_tail(&self, items: &[TermId], tail: TermId) -> TermId {
        self.terms.list(self.atoms.dot, items, tail)
    }

    /// Canonical text of a binding-free term.
    pub fn format(&self, term: TermId) -> String {
        format_term(term, &self.terms, &self.symbols, None)
    }

    /// Top-level message for an error.
    pub fn describe(&self, error: &PrologError) -> String {
        describe_error(error, None, &self.terms, &self.symbols)
    }

    /// Start solving `goal` in the default module.
    pub fn query(&self, goal: TermId) -> Result<Query<'_, S>, PrologError> {
        self.query_in(self.default_module, goal)
    }

    /// Start solving `goal` with `module` as the context module.
    pub fn query_in(&self, module: Sym, goal: TermId) -> Result<Query<'_, S>, PrologError> {
        check_body(goal, &self.terms, &self.atoms, None)?;

        let id = self.next_heap.get();
        self.next_heap.set(id.wrapping_add(1));
        let mut heap = Heap::new(id);

        // Variables left over from other queries become extra slots that
        // are not part of the answer.
        let slots = crate::database::slot_count(goal, &self.terms);
        let mut template = [goal];
        let total = generalize(&mut template, slots, &self.terms);
        let mut vars = vec![None; total as usize];
        let goal = instantiate(template[0], &mut vars, &mut heap, &self.terms);
        let vars = vars
            .into_iter()
            .take(slots as usize)
            .map(|var| var.unwrap_or_else(|| heap.new_var(&self.terms)))
            .collect();

        #[cfg(feature = "tracing")]
        debug!(heap = id, goal = %format_term(goal, &self.terms, &self.symbols, None), "query");

        let start = Kont::call(goal, module, None, Kont::done());
        Ok(Query {
            engine: self,
            heap,
            vars,
            state: State::Start(start),
        })
    }

    /// All answers of `goal`.
    pub fn solve_all(&self, goal: TermId) -> Result<Vec<Answer>, PrologError> {
        self.query(goal)?.collect()
    }

    /// First answer of `goal`, if any.
    pub fn solve_first(&self, goal: TermId) -> Result<Option<Answer>, PrologError> {
        self.query(goal)?.next_solution()
    }

    /// Run `goal` like an interactive top level would, showing at most
    /// `limit` answers, one per line.
    pub fn top_level(&self, goal: TermId, limit: usize) -> String {
        let mut query = match self.query(goal) {
            Ok(query) => query,
            Err(err) => return self.describe(&err),
        };
        let mut lines = Vec::new();
        while lines.len() < limit {
            match query.next_solution() {
                Ok(Some(answer)) => lines.push(self.render_answer(&answer)),
                Ok(None) => break,
                Err(err) => {
                    lines.push(query.describe(&err));
                    return lines.join("\n");
                }
            }
        }
        if lines.is_empty() {
            lines.push(NO_SOLUTIONS.to_string());
        }
        lines.join("\n")
    }

    /// `_S0 = a, _S1 = f(b)`, or `true` when the query had no variables.
    pub fn render_answer(&self, answer: &Answer) -> String {
        if answer.is_empty() {
            return "true".to_string();
        }
        answer
            .bindings()
            .iter()
            .enumerate()
            .map(|(n, value)| format!("_S{} = {}", n, self.format(*value)))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn machine<'a>(&'a self, heap: &'a mut Heap) -> Machine<'a> {
        Machine {
            terms: &self.terms,
            symbols: &self.symbols,
            atoms: &self.atoms,
            source: &self.source,
            builtins: &self.builtins,
            config: &self.config,
            metrics: &self.metrics,
            default_module: self.default_module,
            heap,
        }
    }
}

/// One solution: the values of the query's template variables, resolved
/// against the heap at the moment the solution was found.
///
/// Unbound variables in an answer are only meaningful within that answer.
/// Passing answer terms to a new query or clause turns them into fresh
/// template variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    bindings: Vec<TermId>,
}

impl Answer {
    /// Value of template variable `Slot(n)`.
    pub fn get(&self, n: u32) -> Option<TermId> {
        self.bindings.get(n as usize).copied()
    }

    pub fn bindings(&self) -> &[TermId] {
        &self.bindings
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

enum State {
    Start(Rc<Kont>),
    Suspended(FailCont),
    Done,
}

/// A running query. Dropping it abandons the search.
pub struct Query<'e, S: ClauseSource = Database> {
    engine: &'e Engine<S>,
    heap: Heap,
    vars: Vec<TermId>,
    state: State,
}

impl<'e, S: ClauseSource> Query<'e, S> {
    /// Run until the next solution.
    ///
    /// `Ok(None)` means no (more) solutions. An uncaught error ends the
    /// query; it is returned as [`PrologError::Thrown`] with a binding-free
    /// ball, or as [`PrologError::Fatal`].
    pub fn next_solution(&mut self) -> Result<Option<Answer>, PrologError> {
        let start = match std::mem::replace(&mut self.state, State::Done) {
            State::Start(k) => Transition::Proceed(k, None),
            State::Suspended(f) => Transition::Backtrack(f),
            State::Done => return Ok(None),
        };
        let engine = self.engine;
        #[cfg(feature = "tracing")]
        let _span = debug_span!("next_solution", heap = self.heap.id()).entered();

        let outcome = {
            let mut machine = engine.machine(&mut self.heap);
            drive(&mut machine, start)
        };
        match outcome {
            Ok(Some(f)) => {
                self.state = State::Suspended(f);
                Ok(Some(self.answer()))
            }
            Ok(None) => Ok(None),
            Err(PrologError::Thrown(ball)) => {
                let ball = resolve(&self.heap, &engine.terms, ball);
                #[cfg(feature = "tracing")]
                debug!(ball = %engine.format(ball), "uncaught");
                Err(PrologError::Thrown(ball))
            }
            Err(err) => Err(err),
        }
    }

    fn answer(&self) -> Answer {
        let bindings = self
            .vars
            .iter()
            .map(|&var| resolve(&self.heap, &self.engine.terms, var))
            .collect();
        Answer { bindings }
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Canonical text of `term` under the current bindings.
    pub fn format(&self, term: TermId) -> String {
        format_term(
            term,
            &self.engine.terms,
            &self.engine.symbols,
            Some(&self.heap),
        )
    }

    pub fn describe(&self, error: &PrologError) -> String {
        describe_error(
            error,
            Some(&self.heap),
            &self.engine.terms,
            &self.engine.symbols,
        )
    }

    /// Count the remaining answers (consumes them).
    pub fn count_answers(&mut self) -> Result<usize, PrologError> {
        let mut count = 0;
        while self.next_solution()?.is_some() {
            count += 1;
        }
        Ok(count)
    }
}

impl<'e, S: ClauseSource> Iterator for Query<'e, S> {
    type Item = Result<Answer, PrologError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_solution().transpose()
    }
}

/// The trampoline. Returns the failure continuation of a solution, or
/// `None` at exhaustion.
fn drive(machine: &mut Machine<'_>, mut step: Transition) -> Result<Option<FailCont>, PrologError> {
    loop {
        step = match step {
            Transition::Proceed(k, f) => match machine.activate(Rc::clone(&k), f) {
                Ok(next) => next,
                Err(err) => machine.unwind(&k, err)?,
            },
            Transition::Backtrack(f) => machine.fail(f)?,
            Transition::Solution(f) => return Ok(Some(f)),
            Transition::Exhausted => return Ok(None),
        };
    }
}

#[cfg(test)]
#[path = "tests/engine.rs"]
mod tests;
