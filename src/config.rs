//! Engine configuration.

/// What calling an undefined predicate does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownPolicy {
    /// Raise `existence_error(procedure, Name/Arity)`.
    #[default]
    Error,
    /// Fail silently.
    Fail,
}

/// Settings shared by every query of an engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Reject bindings that would create cyclic terms. Turning this off
    /// makes unification faster, but the engine does not support the
    /// cyclic terms that can then arise: formatting, copying and
    /// comparing them does not terminate.
    pub occurs_check: bool,
    pub unknown: UnknownPolicy,
    /// Module that unqualified goals and clauses belong to.
    pub default_module: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            occurs_check: true,
            unknown: UnknownPolicy::Error,
            default_module: "user".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_occurs_check(mut self, occurs_check: bool) -> Self {
        self.occurs_check = occurs_check;
        self
    }

    pub fn with_unknown(mut self, unknown: UnknownPolicy) -> Self {
        self.unknown = unknown;
        self
    }

    pub fn with_default_module(mut self, module: impl Into<String>) -> Self {
        self.default_module = module.into();
        self
    }
}
