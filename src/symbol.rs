use lasso::{Spur, ThreadedRodeo};

/// An interned atom or functor name.
/// Equality on `Sym` is name equality.
pub type Sym = Spur;

/// Interning store for atom and functor names.
///
/// Guarantees:
/// - Same string always produces same Sym
/// - Different strings always produce different Syms
/// - Sym can be resolved back to the original string
///
/// Interning takes `&self`, so a running query can create new atoms
/// (e.g. through `functor/3`) while it only borrows the engine.
pub struct SymbolStore {
    rodeo: ThreadedRodeo,
}

impl SymbolStore {
    /// Create a new empty symbol store.
    pub fn new() -> Self {
        Self {
            rodeo: ThreadedRodeo::new(),
        }
    }

    /// Intern a name, returning its unique Sym.
    pub fn intern(&self, name: &str) -> Sym {
        self.rodeo.get_or_intern(name)
    }

    /// Resolve a Sym back to its name.
    /// Returns None if the Sym was not created by this store.
    pub fn resolve(&self, id: Sym) -> Option<&str> {
        self.rodeo.try_resolve(&id)
    }

    /// Resolve a Sym, falling back to a placeholder for foreign ids.
    pub fn name(&self, id: Sym) -> &str {
        self.resolve(id).unwrap_or("<unknown>")
    }

    /// Check if a name has already been interned.
    pub fn contains(&self, name: &str) -> bool {
        self.rodeo.contains(name)
    }

    /// Get the Sym for a name if it exists, without interning.
    pub fn get(&self, name: &str) -> Option<Sym> {
        self.rodeo.get(name)
    }
}

impl Default for SymbolStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Names the engine dispatches on, interned once per engine.
#[derive(Debug, Clone, Copy)]
pub struct Atoms {
    pub true_: Sym,
    pub fail: Sym,
    pub false_: Sym,
    pub cut: Sym,
    pub comma: Sym,
    pub semicolon: Sym,
    pub arrow: Sym,
    pub not_provable: Sym,
    pub not: Sym,
    pub call: Sym,
    pub colon: Sym,
    pub repeat: Sym,
    pub catch: Sym,
    pub throw: Sym,
    pub findall: Sym,
    pub once: Sym,
    pub ignore: Sym,
    pub forall: Sym,
    pub nil: Sym,
    pub dot: Sym,
    pub slash: Sym,
    pub equals: Sym,
    pub error: Sym,
    pub put_attr: Sym,
    pub attr_unify_hook: Sym,
}

impl Atoms {
    pub fn intern(symbols: &SymbolStore) -> Self {
        Self {
            true_: symbols.intern("true"),
            fail: symbols.intern("fail"),
            false_: symbols.intern("false"),
            cut: symbols.intern("!"),
            comma: symbols.intern(","),
            semicolon: symbols.intern(";"),
            arrow: symbols.intern("->"),
            not_provable: symbols.intern("\\+"),
            not: symbols.intern("not"),
            call: symbols.intern("call"),
            colon: symbols.intern(":"),
            repeat: symbols.intern("repeat"),
            catch: symbols.intern("catch"),
            throw: symbols.intern("throw"),
            findall: symbols.intern("findall"),
            once: symbols.intern("once"),
            ignore: symbols.intern("ignore"),
            forall: symbols.intern("forall"),
            nil: symbols.intern("[]"),
            dot: symbols.intern("."),
            slash: symbols.intern("/"),
            equals: symbols.intern("="),
            error: symbols.intern("error"),
            put_attr: symbols.intern("put_attr"),
            attr_unify_hook: symbols.intern("attr_unify_hook"),
        }
    }

    /// Is `name/arity` one of the control constructs the engine solves
    /// itself rather than through the clause database?
    pub fn is_control(&self, name: Sym, arity: usize) -> bool {
        if name == self.call {
            return (1..=8).contains(&arity);
        }
        match arity {
            0 => {
                name == self.true_
                    || name == self.fail
                    || name == self.false_
                    || name == self.cut
                    || name == self.repeat
            }
            1 => {
                name == self.not_provable
                    || name == self.not
                    || name == self.throw
                    || name == self.once
                    || name == self.ignore
            }
            2 => {
                name == self.comma
                    || name == self.semicolon
                    || name == self.arrow
                    || name == self.colon
                    || name == self.forall
            }
            3 => name == self.catch || name == self.findall,
            _ => false,
        }
    }
}
