use crate::engine::Engine;
use crate::error::PrologError;
use crate::symbol::SymbolStore;
use crate::term::{TermId, TermStore};

pub(crate) fn setup() -> (SymbolStore, TermStore) {
    (SymbolStore::new(), TermStore::new())
}

/// Formatted value of slot `n` in every answer of `goal`.
pub(crate) fn slot_values(
    engine: &Engine,
    goal: TermId,
    n: u32,
) -> Result<Vec<String>, PrologError> {
    Ok(engine
        .solve_all(goal)?
        .iter()
        .map(|answer| answer.get(n).map_or_else(String::new, |t| engine.format(t)))
        .collect())
}

/// Does `goal` have at least one solution?
pub(crate) fn succeeds(engine: &Engine, goal: TermId) -> bool {
    matches!(engine.solve_first(goal), Ok(Some(_)))
}

/// The uncaught error of `goal`, rendered for the top level.
pub(crate) fn error_of(engine: &Engine, goal: TermId) -> Option<String> {
    engine.solve_all(goal).err().map(|err| engine.describe(&err))
}

/// Add `head :- body` to `engine`, panicking on rejection.
pub(crate) fn rule(engine: &mut Engine, head: TermId, body: TermId) {
    engine.add_clause(head, body).expect("clause rejected");
}

pub(crate) fn fact(engine: &mut Engine, head: TermId) {
    engine.add_fact(head).expect("fact rejected");
}
