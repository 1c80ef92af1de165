//! Attribute predicates.
//!
//! Attributes are keyed by module name. Every change goes through
//! [`Heap::set_attr`](crate::heap::Heap::set_attr) and is undone on
//! backtracking. Putting an attribute on a plain variable first promotes it:
//! the variable is bound (trailed) to a fresh attributed variable.

use crate::builtin::Outcome;
use crate::control::Machine;
use crate::copy::{copy_term, AttrCopy};
use crate::error::{IsoError, PrologError};
use crate::symbol::Sym;
use crate::term::{Term, TermId};
use hashbrown::HashSet;
use smallvec::smallvec;

fn key_arg(m: &Machine<'_>, key: TermId) -> Result<Sym, PrologError> {
    let key = m.deref(key);
    match m.terms.get(key) {
        Term::Atom(name) => Ok(name),
        Term::Var(_) | Term::AttVar(_) => Err(IsoError::Instantiation.into()),
        _ => Err(IsoError::type_error("atom", key).into()),
    }
}

/// `put_attr(Var, Key, Value)`
pub(crate) fn put_attr(m: &mut Machine<'_>, args: &[TermId]) -> Result<Outcome, PrologError> {
    let key = key_arg(m, args[1])?;
    let var = m.deref(args[0]);
    let index = match m.terms.get(var) {
        Term::AttVar(index) => index,
        Term::Var(index) => m.heap.promote(m.terms, index),
        _ => return Err(IsoError::type_error("variable", var).into()),
    };
    m.heap.set_attr(index, key, Some(args[2]));
    Ok(Outcome::Succeed)
}

/// `get_attr(Var, Key, Value)`: fails when `Var` has no `Key` attribute.
pub(crate) fn get_attr(m: &mut Machine<'_>, args: &[TermId]) -> Result<Outcome, PrologError> {
    let key = key_arg(m, args[1])?;
    let Term::AttVar(index) = m.node(args[0]) else {
        return Ok(Outcome::Fail);
    };
    match m.heap.attr(index, key) {
        Some(value) => Ok(m.unify(args[2], value).into()),
        None => Ok(Outcome::Fail),
    }
}

/// `del_attr(Var, Key)`: succeeds whether or not the attribute existed.
pub(crate) fn del_attr(m: &mut Machine<'_>, args: &[TermId]) -> Result<Outcome, PrologError> {
    let key = key_arg(m, args[1])?;
    if let Term::AttVar(index) = m.node(args[0]) {
        m.heap.set_attr(index, key, None);
    }
    Ok(Outcome::Succeed)
}

/// `del_attrs(Var)`
pub(crate) fn del_attrs(m: &mut Machine<'_>, args: &[TermId]) -> Result<Outcome, PrologError> {
    if let Term::AttVar(index) = m.node(args[0]) {
        for (key, _) in m.heap.attrs(index) {
            m.heap.set_attr(index, key, None);
        }
    }
    Ok(Outcome::Succeed)
}

/// `attvar(X)`: `X` is an unbound variable with at least one attribute.
pub(crate) fn attvar(m: &mut Machine<'_>, args: &[TermId]) -> Result<Outcome, PrologError> {
    Ok(match m.node(args[0]) {
        Term::AttVar(index) => (!m.heap.attrs(index).is_empty()).into(),
        _ => Outcome::Fail,
    })
}

/// `term_attvars(Term, Vars)`: attributed variables reachable from `Term`
/// or from their attribute values, in first-occurrence order.
pub(crate) fn term_attvars(m: &mut Machine<'_>, args: &[TermId]) -> Result<Outcome, PrologError> {
    let mut seen = HashSet::new();
    let mut found = Vec::new();
    let mut stack = vec![args[0]];
    while let Some(t) = stack.pop() {
        let t = m.deref(t);
        match m.terms.get(t) {
            Term::AttVar(index) => {
                let attrs = m.heap.attrs(index);
                if attrs.is_empty() || !seen.insert(index) {
                    continue;
                }
                found.push(t);
                stack.extend(attrs.iter().rev().map(|(_, value)| *value));
            }
            Term::Struct(_, sub) => stack.extend(sub.iter().rev().copied()),
            _ => {}
        }
    }
    let list = m.list(&found);
    Ok(m.unify(args[1], list).into())
}

/// `copy_term(Term, Copy, Goals)`: `Copy` has plain variables and `Goals`
/// is a list of `put_attr/3` goals that restore the copied attributes.
pub(crate) fn copy_term_3(m: &mut Machine<'_>, args: &[TermId]) -> Result<Outcome, PrologError> {
    let copied = copy_term(args[0], m.heap, m.terms, AttrCopy::AsGoals);
    let goals: Vec<TermId> = copied
        .goals
        .iter()
        .map(|&(var, key, value)| {
            m.terms.app(
                m.atoms.put_attr,
                smallvec![var, m.terms.atom(key), value],
            )
        })
        .collect();
    let goals = m.list(&goals);
    Ok((m.unify(args[1], copied.term) && m.unify(args[2], goals)).into())
}

#[cfg(test)]
#[path = "tests/attvar.rs"]
mod tests;
