//! Binding cells, attribute maps and the trail.
//!
//! Every mutation of a binding or an attribute goes through the heap and is
//! recorded on the trail, so [`Heap::revert_upto`] can restore the state that
//! held when a [`Checkpoint`] was taken. Reverting also drops the cells
//! created after the checkpoint, except those below the pin mark: copies
//! that must outlive backtracking (`findall/3` results, thrown balls,
//! `nb_setval/2` values) are pinned when they are made.

use crate::error::FatalError;
use crate::symbol::Sym;
use crate::term::{Term, TermId, TermStore};
use hashbrown::HashMap;
use smallvec::SmallVec;
use std::fmt;

#[cfg(feature = "tracing")]
use crate::trace::trace;

/// Attribute slots of one attributed variable, in insertion order.
/// A deleted key keeps its slot with `None`.
pub type AttrMap = SmallVec<[(Sym, Option<TermId>); 2]>;

/// Callback run when the trail is unwound past the record that holds it.
pub type UndoFn = Box<dyn FnOnce(&mut Heap)>;

/// One undo record.
pub enum TrailEntry {
    /// Cell `var` was unbound before.
    Binding(u32),
    /// Attribute `key` of `var` held `prev`. `appended` means the slot did
    /// not exist and must be removed again.
    Attr {
        var: u32,
        key: Sym,
        prev: Option<TermId>,
        appended: bool,
    },
    Undo(UndoFn),
}

impl fmt::Debug for TrailEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrailEntry::Binding(var) => f.debug_tuple("Binding").field(var).finish(),
            TrailEntry::Attr {
                var,
                key,
                prev,
                appended,
            } => f
                .debug_struct("Attr")
                .field("var", var)
                .field("key", key)
                .field("prev", prev)
                .field("appended", appended)
                .finish(),
            TrailEntry::Undo(_) => f.write_str("Undo(..)"),
        }
    }
}

/// A position in one heap's trail, plus the cell count at that point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    heap: u32,
    trail_len: usize,
    cells: usize,
    generation: u64,
}

impl Checkpoint {
    pub fn trail_len(&self) -> usize {
        self.trail_len
    }

    pub fn cell_count(&self) -> usize {
        self.cells
    }
}

/// An attributed variable that was bound by unification and whose
/// `attr_unify_hook`s still have to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wakeup {
    pub var: u32,
    pub value: TermId,
}

/// Variable bindings and attributes for one query.
pub struct Heap {
    id: u32,
    cells: Vec<Option<TermId>>,
    attrs: HashMap<u32, AttrMap>,
    trail: Vec<TrailEntry>,
    /// Cells below this index survive every revert.
    pinned: usize,
    generation: u64,
    globals: HashMap<Sym, TermId>,
    wakeups: Vec<Wakeup>,
}

impl Heap {
    /// Create an empty heap. `id` distinguishes heaps of one engine so a
    /// checkpoint can't be reverted on the wrong one.
    pub fn new(id: u32) -> Self {
        Self {
            id,
            cells: Vec::new(),
            attrs: HashMap::new(),
            trail: Vec::new(),
            pinned: 0,
            generation: 0,
            globals: HashMap::new(),
            wakeups: Vec::new(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Number of live binding cells.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn trail_len(&self) -> usize {
        self.trail.len()
    }

    /// Fresh unbound plain variable.
    pub fn new_var(&mut self, terms: &TermStore) -> TermId {
        let index = self.push_cell();
        terms.var(index)
    }

    /// Fresh unbound attributed variable with an empty attribute map.
    pub fn new_attvar(&mut self, terms: &TermStore) -> TermId {
        let index = self.push_cell();
        self.attrs.insert(index, AttrMap::new());
        terms.attvar(index)
    }

    /// Turn unbound plain variable `var` into an attributed one by binding
    /// it (trailed) to a fresh attributed variable. Returns the new cell.
    pub fn promote(&mut self, terms: &TermStore, var: u32) -> u32 {
        let index = self.push_cell();
        self.attrs.insert(index, AttrMap::new());
        self.bind(var, terms.attvar(index));
        index
    }

    /// Install the attributes of a freshly created attributed variable
    /// without trailing. Nothing older than the cell can observe it.
    pub(crate) fn init_attrs(&mut self, var: u32, attrs: AttrMap) {
        self.attrs.insert(var, attrs);
    }

    fn push_cell(&mut self) -> u32 {
        let index = self.cells.len() as u32;
        self.cells.push(None);
        index
    }

    /// Start a new choice point's scope.
    pub fn branch(&mut self) -> Checkpoint {
        self.generation += 1;
        Checkpoint {
            heap: self.id,
            trail_len: self.trail.len(),
            cells: self.cells.len(),
            generation: self.generation,
        }
    }

    /// Keep every cell that exists now across all later reverts.
    ///
    /// Called right after building a copy that backtracking must not take
    /// away. Cell indices are reused once reclaimed, so an unpinned term
    /// that survives a revert would alias fresh variables.
    pub fn pin(&mut self) {
        self.pinned = self.cells.len();
    }

    /// Bind unbound cell `var` to `value`.
    pub fn bind(&mut self, var: u32, value: TermId) {
        debug_assert!(
            self.cells[var as usize].is_none(),
            "binding an already bound cell {}",
            var
        );
        self.trail.push(TrailEntry::Binding(var));
        self.cells[var as usize] = Some(value);
    }

    /// Bind an attributed variable and queue its unification hooks.
    pub fn bind_attvar(&mut self, var: u32, value: TermId) {
        self.bind(var, value);
        self.wakeups.push(Wakeup { var, value });
    }

    pub fn is_bound(&self, var: u32) -> bool {
        matches!(self.cells.get(var as usize), Some(Some(_)))
    }

    /// Current binding of cell `var`.
    pub fn binding(&self, var: u32) -> Option<TermId> {
        self.cells.get(var as usize).copied().flatten()
    }

    /// Follow bindings until an unbound variable or a non-variable.
    pub fn deref(&self, terms: &TermStore, mut term: TermId) -> TermId {
        loop {
            match terms.get(term) {
                Term::Var(index) | Term::AttVar(index) => match self.binding(index) {
                    Some(next) => term = next,
                    None => return term,
                },
                _ => return term,
            }
        }
    }

    /// Does cell `var` belong to an attributed variable?
    pub fn is_attvar(&self, var: u32) -> bool {
        self.attrs.contains_key(&var)
    }

    /// Set (`Some`) or delete (`None`) attribute `key` of `var`, trailing
    /// the previous value.
    pub fn set_attr(&mut self, var: u32, key: Sym, value: Option<TermId>) {
        let map = self.attrs.entry(var).or_default();
        match map.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => {
                let prev = slot.1;
                slot.1 = value;
                self.trail.push(TrailEntry::Attr {
                    var,
                    key,
                    prev,
                    appended: false,
                });
            }
            None => {
                if value.is_none() {
                    return;
                }
                map.push((key, value));
                self.trail.push(TrailEntry::Attr {
                    var,
                    key,
                    prev: None,
                    appended: true,
                });
            }
        }
    }

    pub fn attr(&self, var: u32, key: Sym) -> Option<TermId> {
        self.attrs
            .get(&var)?
            .iter()
            .find(|(k, _)| *k == key)
            .and_then(|(_, value)| *value)
    }

    /// Present attributes of `var` in insertion order.
    pub fn attrs(&self, var: u32) -> Vec<(Sym, TermId)> {
        match self.attrs.get(&var) {
            Some(map) => map
                .iter()
                .filter_map(|(key, value)| value.map(|v| (*key, v)))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Raw attribute slots of `var`, including deleted ones.
    pub fn attr_slots(&self, var: u32) -> &[(Sym, Option<TermId>)] {
        self.attrs.get(&var).map(|map| map.as_slice()).unwrap_or(&[])
    }

    /// Push a callback that runs when the trail is unwound past this point.
    pub fn on_undo(&mut self, undo: impl FnOnce(&mut Heap) + 'static) {
        self.trail.push(TrailEntry::Undo(Box::new(undo)));
    }

    /// Undo every trail record newer than `checkpoint`.
    ///
    /// `discard` says the reverting choice point is exhausted; it only
    /// affects what gets reported.
    pub fn revert_upto(
        &mut self,
        checkpoint: Checkpoint,
        discard: bool,
    ) -> Result<&mut Self, FatalError> {
        if checkpoint.heap != self.id {
            return Err(FatalError::ForeignCheckpoint {
                heap: self.id,
                checkpoint_heap: checkpoint.heap,
            });
        }
        if checkpoint.trail_len > self.trail.len() {
            return Err(FatalError::CheckpointAhead {
                trail_len: self.trail.len(),
                checkpoint: checkpoint.trail_len,
            });
        }
        if checkpoint.generation > self.generation {
            return Err(FatalError::UnknownBranch {
                generation: checkpoint.generation,
                current: self.generation,
            });
        }

        #[cfg(feature = "tracing")]
        trace!(
            heap = self.id,
            undone = self.trail.len() - checkpoint.trail_len,
            discard,
            "revert_upto"
        );
        #[cfg(not(feature = "tracing"))]
        let _ = discard;
        while self.trail.len() > checkpoint.trail_len {
            let Some(entry) = self.trail.pop() else {
                break;
            };
            match entry {
                TrailEntry::Binding(var) => self.cells[var as usize] = None,
                TrailEntry::Attr {
                    var,
                    key,
                    prev,
                    appended,
                } => {
                    if let Some(map) = self.attrs.get_mut(&var) {
                        if appended {
                            if let Some(pos) = map.iter().position(|(k, _)| *k == key) {
                                map.remove(pos);
                            }
                        } else if let Some(slot) = map.iter_mut().find(|(k, _)| *k == key) {
                            slot.1 = prev;
                        }
                    }
                }
                TrailEntry::Undo(undo) => undo(self),
            }
        }
        let keep = checkpoint.cells.max(self.pinned);
        if self.cells.len() > keep {
            self.cells.truncate(keep);
            if !self.attrs.is_empty() {
                self.attrs.retain(|&var, _| (var as usize) < keep);
            }
        }
        self.wakeups.clear();
        Ok(self)
    }

    /// Take the queued unification hooks.
    pub fn take_wakeups(&mut self) -> Vec<Wakeup> {
        std::mem::take(&mut self.wakeups)
    }

    pub fn has_wakeups(&self) -> bool {
        !self.wakeups.is_empty()
    }

    /// `b_setval/2`: the previous value comes back on backtracking.
    pub fn b_setval(&mut self, name: Sym, value: TermId) {
        let prev = self.globals.insert(name, value);
        self.on_undo(move |heap| match prev {
            Some(prev) => {
                heap.globals.insert(name, prev);
            }
            None => {
                heap.globals.remove(&name);
            }
        });
    }

    /// `nb_setval/2`: survives backtracking. `value` must be a fresh
    /// copy; its cells are pinned here.
    pub fn nb_setval(&mut self, name: Sym, value: TermId) {
        self.pin();
        self.globals.insert(name, value);
    }

    pub fn getval(&self, name: Sym) -> Option<TermId> {
        self.globals.get(&name).copied()
    }
}

impl fmt::Debug for Heap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Heap")
            .field("id", &self.id)
            .field("cells", &self.cells.len())
            .field("pinned", &self.pinned)
            .field("trail", &self.trail.len())
            .field("generation", &self.generation)
            .finish()
    }
}

#[cfg(test)]
#[path = "tests/heap.rs"]
mod tests;
