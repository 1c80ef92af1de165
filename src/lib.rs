//! Continuation-passing resolution engine for an embedded Prolog
//! interpreter: trail-based heap, success/failure continuation chains,
//! control constructs with lexical cut, `catch/throw`, and attributed
//! variables.

pub mod attvar;
pub mod builtin;
pub mod config;
pub mod cont;
pub mod control;
pub mod copy;
pub mod database;
pub mod engine;
pub mod error;
pub mod format;
pub mod heap;
pub mod metrics;
pub mod order;
pub mod symbol;
pub mod term;
pub mod trace;
pub mod unify;

#[cfg(test)]
pub(crate) mod test_utils;
