use crate::symbol::Sym;
use hashbrown::HashMap;
use parking_lot::RwLock;
use rustc_hash::FxHasher;
use smallvec::SmallVec;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU32, Ordering};

/// Unique identifier for a term node in the term store.
/// TermIds are stable and can be compared for equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TermId(u32);

impl TermId {
    /// Get the raw u32 value (for debugging/display).
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Bit pattern of an `f64`, so floats can live in a hashconsed store.
/// Unification compares the decoded values, not the bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FloatBits(u64);

impl FloatBits {
    pub fn new(value: f64) -> Self {
        FloatBits(value.to_bits())
    }

    pub fn get(self) -> f64 {
        f64::from_bits(self.0)
    }
}

/// One node of a Prolog term.
///
/// `Var` and `AttVar` carry the index of a binding cell owned by a
/// [`Heap`](crate::heap::Heap); their identity is that index. `Slot` is a
/// clause-local placeholder that only appears in clause and query
/// templates and is replaced by a fresh variable on every instantiation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    Atom(Sym),
    Int(i64),
    Float(FloatBits),
    /// Compound term: functor applied to one or more arguments.
    Struct(Sym, SmallVec<[TermId; 4]>),
    Var(u32),
    AttVar(u32),
    Slot(u32),
}

impl Term {
    /// Name and arity for callable terms.
    pub fn functor(&self) -> Option<(Sym, usize)> {
        match self {
            Term::Atom(name) => Some((*name, 0)),
            Term::Struct(name, args) => Some((*name, args.len())),
            _ => None,
        }
    }

    /// Binding-cell index for both plain and attributed variables.
    pub fn var_index(&self) -> Option<u32> {
        match self {
            Term::Var(idx) | Term::AttVar(idx) => Some(*idx),
            _ => None,
        }
    }

    pub fn is_atomic(&self) -> bool {
        matches!(self, Term::Atom(_) | Term::Int(_) | Term::Float(_))
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Term::Atom(_) | Term::Struct(_, _))
    }
}

/// Number of shards for hashcons maps (power of 2 for fast modulo).
const NUM_SHARDS: usize = 16;

/// A stored node. `ground` is fixed at interning time: no `Var`, `AttVar`
/// or `Slot` occurs anywhere below the node.
#[derive(Clone)]
struct Node {
    term: Term,
    ground: bool,
}

/// Term store with hashconsing.
///
/// Guarantees:
/// - Structurally equal nodes get the same TermId
/// - TermId can be resolved back to the node
/// - Variable nodes are hashconsed by cell index, so the same cell always
///   has the same TermId
/// - Whether a node is ground is known without walking it
///
/// Interning takes `&self`; the store is shared by every query of an engine.
pub struct TermStore {
    /// Central storage of all nodes, indexed by TermId.
    nodes: RwLock<Vec<Node>>,
    /// Sharded hashcons maps.
    shards: [RwLock<HashMap<Term, TermId>>; NUM_SHARDS],
    /// Counter for generating unique TermIds.
    next_id: AtomicU32,
}

impl TermStore {
    /// Create a new empty term store.
    pub fn new() -> Self {
        let shards = std::array::from_fn(|_| RwLock::new(HashMap::new()));
        Self {
            nodes: RwLock::new(Vec::new()),
            shards,
            next_id: AtomicU32::new(0),
        }
    }

    /// Intern a node, returning its TermId.
    fn intern(&self, term: Term) -> TermId {
        let shard = &self.shards[Self::shard_index(&term)];

        // Fast path: read lock
        {
            let map = shard.read();
            if let Some(&id) = map.get(&term) {
                return id;
            }
        }

        let mut map = shard.write();
        // Double-check after acquiring write lock
        if let Some(&id) = map.get(&term) {
            return id;
        }

        let ground = match &term {
            Term::Var(_) | Term::AttVar(_) | Term::Slot(_) => false,
            Term::Struct(_, args) => {
                let nodes = self.nodes.read();
                args.iter().all(|arg| nodes[arg.0 as usize].ground)
            }
            _ => true,
        };
        let id = TermId(self.next_id.fetch_add(1, Ordering::Relaxed));
        {
            let mut nodes = self.nodes.write();
            let idx = id.0 as usize;
            if nodes.len() <= idx {
                // placeholder
                nodes.resize(
                    idx + 1,
                    Node {
                        term: Term::Int(0),
                        ground: true,
                    },
                );
            }
            nodes[idx] = Node {
                term: term.clone(),
                ground,
            };
        }
        map.insert(term, id);
        id
    }

    pub fn atom(&self, name: Sym) -> TermId {
        self.intern(Term::Atom(name))
    }

    pub fn int(&self, value: i64) -> TermId {
        self.intern(Term::Int(value))
    }

    pub fn float(&self, value: f64) -> TermId {
        self.intern(Term::Float(FloatBits::new(value)))
    }

    /// Create a compound term. With no arguments this is the atom `name`.
    pub fn app(&self, name: Sym, args: SmallVec<[TermId; 4]>) -> TermId {
        if args.is_empty() {
            return self.atom(name);
        }
        self.intern(Term::Struct(name, args))
    }

    pub fn app1(&self, name: Sym, arg: TermId) -> TermId {
        self.app(name, smallvec::smallvec![arg])
    }

    pub fn app2(&self, name: Sym, left: TermId, right: TermId) -> TermId {
        self.app(name, smallvec::smallvec![left, right])
    }

    /// Plain variable node for binding cell `index`.
    pub fn var(&self, index: u32) -> TermId {
        self.intern(Term::Var(index))
    }

    /// Attributed variable node for binding cell `index`.
    pub fn attvar(&self, index: u32) -> TermId {
        self.intern(Term::AttVar(index))
    }

    /// Template placeholder number `index`.
    pub fn slot(&self, index: u32) -> TermId {
        self.intern(Term::Slot(index))
    }

    /// Build a list `[items... | tail]` with `'.'/2` cells.
    pub fn list(&self, dot: Sym, items: &[TermId], tail: TermId) -> TermId {
        items
            .iter()
            .rev()
            .fold(tail, |acc, &item| self.app2(dot, item, acc))
    }

    /// Resolve a TermId to its node.
    /// Returns None if the TermId is invalid.
    pub fn resolve(&self, id: TermId) -> Option<Term> {
        let nodes = self.nodes.read();
        nodes.get(id.0 as usize).map(|node| node.term.clone())
    }

    /// Resolve a TermId created by this store.
    ///
    /// Ids are only ever handed out by `intern`, so a miss means the id came
    /// from a different store, which is a caller bug.
    pub fn get(&self, id: TermId) -> Term {
        let nodes = self.nodes.read();
        nodes[id.0 as usize].term.clone()
    }

    /// Does no variable or slot occur in `id`? Bindings are not followed:
    /// a ground node stays ground on every heap.
    pub fn is_ground(&self, id: TermId) -> bool {
        self.nodes.read()[id.0 as usize].ground
    }

    /// Name and arity of a callable term.
    pub fn functor(&self, id: TermId) -> Option<(Sym, usize)> {
        self.get(id).functor()
    }

    /// Number of distinct nodes interned so far.
    pub fn len(&self) -> usize {
        self.next_id.load(Ordering::Relaxed) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn shard_index(term: &Term) -> usize {
        let mut hasher = FxHasher::default();
        term.hash(&mut hasher);
        (hasher.finish() as usize) % NUM_SHARDS
    }
}

impl Default for TermStore {
    fn default() -> Self {
        Self::new()
    }
}
