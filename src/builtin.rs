//! Deterministic and simple nondeterministic builtins.
//!
//! A builtin gets the dereferenced-on-demand argument terms of the call and
//! answers with an [`Outcome`]. Control constructs live in
//! [`crate::control`]; attribute predicates in [`crate::attvar`].

use crate::attvar;
use crate::control::Machine;
use crate::copy::{copy_term, AttrCopy};
use crate::database::indicator;
use crate::error::{IsoError, PrologError};
use crate::order::compare_terms;
use crate::symbol::{Sym, SymbolStore};
use crate::term::{Term, TermId};
use crate::unify::unify;
use hashbrown::HashMap;
use smallvec::SmallVec;
use std::cmp::Ordering;

/// Result of running a builtin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Fail,
    Succeed,
    /// Continue by solving this goal in place of the call.
    Solve(TermId),
}

impl From<bool> for Outcome {
    fn from(ok: bool) -> Self {
        if ok {
            Outcome::Succeed
        } else {
            Outcome::Fail
        }
    }
}

pub(crate) type BuiltinFn = fn(&mut Machine<'_>, &[TermId]) -> Result<Outcome, PrologError>;

/// Builtins keyed by interned name and arity.
pub(crate) type BuiltinTable = HashMap<(Sym, usize), BuiltinFn>;

/// Largest arity `functor/3` and `=../2` will build.
pub const MAX_ARITY: i64 = 1024;

const BUILTINS: &[(&str, usize, BuiltinFn)] = &[
    ("=", 2, unify_2),
    ("\\=", 2, not_unifiable),
    ("unify_with_occurs_check", 2, unify_with_occurs_check),
    ("==", 2, identical),
    ("\\==", 2, not_identical),
    ("@<", 2, term_less),
    ("@>", 2, term_greater),
    ("@=<", 2, term_less_or_equal),
    ("@>=", 2, term_greater_or_equal),
    ("compare", 3, compare),
    ("var", 1, is_var),
    ("nonvar", 1, is_nonvar),
    ("atom", 1, is_atom),
    ("number", 1, is_number),
    ("integer", 1, is_integer),
    ("float", 1, is_float),
    ("atomic", 1, is_atomic),
    ("compound", 1, is_compound),
    ("callable", 1, is_callable),
    ("is_list", 1, is_list),
    ("ground", 1, ground),
    ("functor", 3, functor),
    ("arg", 3, arg),
    ("=..", 2, univ),
    ("copy_term", 2, copy_term_2),
    ("b_setval", 2, b_setval),
    ("b_getval", 2, getval),
    ("nb_setval", 2, nb_setval),
    ("nb_getval", 2, getval),
    ("between", 3, between),
    ("put_attr", 3, attvar::put_attr),
    ("get_attr", 3, attvar::get_attr),
    ("del_attr", 2, attvar::del_attr),
    ("del_attrs", 1, attvar::del_attrs),
    ("attvar", 1, attvar::attvar),
    ("term_attvars", 2, attvar::term_attvars),
    ("copy_term", 3, attvar::copy_term_3),
];

/// Is `name/arity` a builtin predicate?
pub fn is_builtin(name: &str, arity: usize) -> bool {
    lookup(name, arity).is_some()
}

pub(crate) fn lookup(name: &str, arity: usize) -> Option<BuiltinFn> {
    BUILTINS
        .iter()
        .find(|(n, a, _)| *n == name && *a == arity)
        .map(|(_, _, f)| *f)
}

/// Intern every builtin name into `symbols`.
pub(crate) fn table(symbols: &SymbolStore) -> BuiltinTable {
    BUILTINS
        .iter()
        .map(|(name, arity, f)| ((symbols.intern(name), *arity), *f))
        .collect()
}

fn unify_2(m: &mut Machine<'_>, args: &[TermId]) -> Result<Outcome, PrologError> {
    Ok(m.unify(args[0], args[1]).into())
}

fn not_unifiable(m: &mut Machine<'_>, args: &[TermId]) -> Result<Outcome, PrologError> {
    let cp = m.heap.branch();
    let unifiable = m.unify(args[0], args[1]);
    m.heap.revert_upto(cp, true)?;
    Ok((!unifiable).into())
}

fn unify_with_occurs_check(m: &mut Machine<'_>, args: &[TermId]) -> Result<Outcome, PrologError> {
    let ok = unify(m.heap, m.terms, args[0], args[1], true);
    m.metrics.record_unification(ok);
    Ok(ok.into())
}

fn order(m: &Machine<'_>, a: TermId, b: TermId) -> Ordering {
    compare_terms(m.heap, m.terms, m.symbols, a, b)
}

macro_rules! order_test {
    ($($name:ident => $test:expr;)*) => {$(
        fn $name(m: &mut Machine<'_>, args: &[TermId]) -> Result<Outcome, PrologError> {
            let test: fn(Ordering) -> bool = $test;
            Ok(test(order(m, args[0], args[1])).into())
        }
    )*};
}

order_test! {
    identical => |o| o == Ordering::Equal;
    not_identical => |o| o != Ordering::Equal;
    term_less => |o| o == Ordering::Less;
    term_greater => |o| o == Ordering::Greater;
    term_less_or_equal => |o| o != Ordering::Greater;
    term_greater_or_equal => |o| o != Ordering::Less;
}

macro_rules! type_test {
    ($($name:ident($node:ident) => $test:expr;)*) => {$(
        fn $name(m: &mut Machine<'_>, args: &[TermId]) -> Result<Outcome, PrologError> {
            let $node = m.node(args[0]);
            Ok(($test).into())
        }
    )*};
}

type_test! {
    is_var(t) => t.var_index().is_some();
    is_nonvar(t) => t.var_index().is_none();
    is_atom(t) => matches!(t, Term::Atom(_));
    is_number(t) => matches!(t, Term::Int(_) | Term::Float(_));
    is_integer(t) => matches!(t, Term::Int(_));
    is_float(t) => matches!(t, Term::Float(_));
    is_atomic(t) => t.is_atomic();
    is_compound(t) => matches!(t, Term::Struct(..));
    is_callable(t) => t.is_callable();
}

fn is_list(m: &mut Machine<'_>, args: &[TermId]) -> Result<Outcome, PrologError> {
    Ok(m.list_items(args[0]).is_ok().into())
}

fn compare(m: &mut Machine<'_>, args: &[TermId]) -> Result<Outcome, PrologError> {
    let given = m.deref(args[0]);
    match m.terms.get(given) {
        Term::Var(_) | Term::AttVar(_) => {}
        Term::Atom(name) => {
            if !matches!(m.symbols.name(name), "<" | "=" | ">") {
                return Err(IsoError::domain_error("order", given).into());
            }
        }
        _ => return Err(IsoError::type_error("atom", given).into()),
    }
    let symbol = match order(m, args[1], args[2]) {
        Ordering::Less => "<",
        Ordering::Equal => "=",
        Ordering::Greater => ">",
    };
    let result = m.atom(symbol);
    Ok(m.unify(given, result).into())
}

fn ground(m: &mut Machine<'_>, args: &[TermId]) -> Result<Outcome, PrologError> {
    let mut stack: SmallVec<[TermId; 16]> = SmallVec::new();
    stack.push(args[0]);
    while let Some(t) = stack.pop() {
        match m.node(t) {
            Term::Var(_) | Term::AttVar(_) => return Ok(Outcome::Fail),
            Term::Struct(_, sub) => stack.extend(sub.iter().copied()),
            _ => {}
        }
    }
    Ok(Outcome::Succeed)
}

fn int_arg(m: &Machine<'_>, term: TermId) -> Result<i64, PrologError> {
    let term = m.deref(term);
    match m.terms.get(term) {
        Term::Int(n) => Ok(n),
        Term::Var(_) | Term::AttVar(_) => Err(IsoError::Instantiation.into()),
        _ => Err(IsoError::type_error("integer", term).into()),
    }
}

fn atom_arg(m: &Machine<'_>, term: TermId) -> Result<Sym, PrologError> {
    let term = m.deref(term);
    match m.terms.get(term) {
        Term::Atom(name) => Ok(name),
        Term::Var(_) | Term::AttVar(_) => Err(IsoError::Instantiation.into()),
        _ => Err(IsoError::type_error("atom", term).into()),
    }
}

fn functor(m: &mut Machine<'_>, args: &[TermId]) -> Result<Outcome, PrologError> {
    let term = m.deref(args[0]);
    match m.terms.get(term) {
        Term::Struct(name, sub) => {
            let name = m.terms.atom(name);
            let arity = m.terms.int(sub.len() as i64);
            Ok((m.unify(args[1], name) && m.unify(args[2], arity)).into())
        }
        Term::Var(_) | Term::AttVar(_) => {
            let name = m.deref(args[1]);
            let arity = int_arg(m, args[2])?;
            let name_node = m.terms.get(name);
            if name_node.var_index().is_some() {
                return Err(IsoError::Instantiation.into());
            }
            if arity < 0 {
                let culprit = m.terms.int(arity);
                return Err(IsoError::domain_error("not_less_than_zero", culprit).into());
            }
            if arity > MAX_ARITY {
                let functor = m.symbols.intern("functor");
                return Err(IsoError::Representation {
                    signature: indicator(m.terms, m.atoms, functor, 3),
                    message: "max_arity",
                }
                .into());
            }
            if arity == 0 {
                if !name_node.is_atomic() {
                    return Err(IsoError::type_error("atomic", name).into());
                }
                return Ok(m.unify(term, name).into());
            }
            let Term::Atom(functor) = name_node else {
                return Err(if name_node.is_atomic() {
                    IsoError::type_error("atom", name)
                } else {
                    IsoError::type_error("atomic", name)
                }
                .into());
            };
            let fresh: SmallVec<[TermId; 4]> =
                (0..arity).map(|_| m.heap.new_var(m.terms)).collect();
            let built = m.terms.app(functor, fresh);
            Ok(m.unify(term, built).into())
        }
        _ => {
            let arity = m.terms.int(0);
            Ok((m.unify(args[1], term) && m.unify(args[2], arity)).into())
        }
    }
}

fn arg(m: &mut Machine<'_>, args: &[TermId]) -> Result<Outcome, PrologError> {
    let term = m.deref(args[1]);
    let sub = match m.terms.get(term) {
        Term::Struct(_, sub) => sub,
        Term::Var(_) | Term::AttVar(_) => return Err(IsoError::Instantiation.into()),
        _ => return Err(IsoError::type_error("compound", term).into()),
    };
    let n = m.deref(args[0]);
    match m.terms.get(n) {
        Term::Int(i) => {
            if i < 1 || i as usize > sub.len() {
                return Ok(Outcome::Fail);
            }
            Ok(m.unify(args[2], sub[i as usize - 1]).into())
        }
        Term::Var(_) | Term::AttVar(_) => {
            // (N = 1, A = X1 ; N = 2, A = X2 ; ...)
            let (equals, comma, semicolon) = (m.atoms.equals, m.atoms.comma, m.atoms.semicolon);
            let choice = |i: usize| {
                m.terms.app2(
                    comma,
                    m.terms.app2(equals, n, m.terms.int(i as i64 + 1)),
                    m.terms.app2(equals, args[2], sub[i]),
                )
            };
            let last = sub.len() - 1;
            let goal = (0..last)
                .rev()
                .fold(choice(last), |rest, i| m.terms.app2(semicolon, choice(i), rest));
            Ok(Outcome::Solve(goal))
        }
        _ => Err(IsoError::type_error("integer", n).into()),
    }
}

fn univ(m: &mut Machine<'_>, args: &[TermId]) -> Result<Outcome, PrologError> {
    let term = m.deref(args[0]);
    match m.terms.get(term) {
        Term::Struct(name, sub) => {
            let mut items = Vec::with_capacity(sub.len() + 1);
            items.push(m.terms.atom(name));
            items.extend(sub.iter().copied());
            let list = m.list(&items);
            Ok(m.unify(args[1], list).into())
        }
        Term::Var(_) | Term::AttVar(_) => {
            let list = m.deref(args[1]);
            let items = m.list_items(list).map_err(|tail| {
                if m.terms.get(tail).var_index().is_some() {
                    IsoError::Instantiation
                } else {
                    IsoError::type_error("list", list)
                }
            })?;
            if items.len() as i64 > MAX_ARITY + 1 {
                let univ = m.symbols.intern("=..");
                return Err(IsoError::Representation {
                    signature: indicator(m.terms, m.atoms, univ, 2),
                    message: "max_arity",
                }
                .into());
            }
            let Some((&head, rest)) = items.split_first() else {
                return Err(IsoError::domain_error("non_empty_list", list).into());
            };
            let head = m.deref(head);
            let head_node = m.terms.get(head);
            if head_node.var_index().is_some() {
                return Err(IsoError::Instantiation.into());
            }
            if rest.is_empty() {
                if !head_node.is_atomic() {
                    return Err(IsoError::type_error("atomic", head).into());
                }
                return Ok(m.unify(term, head).into());
            }
            let Term::Atom(name) = head_node else {
                return Err(if head_node.is_atomic() {
                    IsoError::type_error("atom", head)
                } else {
                    IsoError::type_error("atomic", head)
                }
                .into());
            };
            let built = m.terms.app(name, rest.iter().copied().collect());
            Ok(m.unify(term, built).into())
        }
        _ => {
            let list = m.list(&[term]);
            Ok(m.unify(args[1], list).into())
        }
    }
}

fn copy_term_2(m: &mut Machine<'_>, args: &[TermId]) -> Result<Outcome, PrologError> {
    let copy = copy_term(args[0], m.heap, m.terms, AttrCopy::Keep).term;
    Ok(m.unify(args[1], copy).into())
}

fn b_setval(m: &mut Machine<'_>, args: &[TermId]) -> Result<Outcome, PrologError> {
    let key = atom_arg(m, args[0])?;
    let value = m.deref(args[1]);
    m.heap.b_setval(key, value);
    Ok(Outcome::Succeed)
}

fn nb_setval(m: &mut Machine<'_>, args: &[TermId]) -> Result<Outcome, PrologError> {
    let key = atom_arg(m, args[0])?;
    let value = copy_term(args[1], m.heap, m.terms, AttrCopy::Keep).term;
    m.heap.nb_setval(key, value);
    Ok(Outcome::Succeed)
}

fn getval(m: &mut Machine<'_>, args: &[TermId]) -> Result<Outcome, PrologError> {
    let key = atom_arg(m, args[0])?;
    let Some(value) = m.heap.getval(key) else {
        let culprit = m.terms.atom(key);
        return Err(IsoError::existence_error("variable", culprit).into());
    };
    Ok(m.unify(args[1], value).into())
}

fn between(m: &mut Machine<'_>, args: &[TermId]) -> Result<Outcome, PrologError> {
    let low = int_arg(m, args[0])?;
    let high_term = m.deref(args[1]);
    let high = match m.terms.get(high_term) {
        Term::Atom(name) if matches!(m.symbols.name(name), "inf" | "infinite") => i64::MAX,
        _ => int_arg(m, high_term)?,
    };
    let x = m.deref(args[2]);
    match m.terms.get(x) {
        Term::Int(value) => Ok((low <= value && value <= high).into()),
        Term::Var(_) | Term::AttVar(_) => {
            if low > high {
                return Ok(Outcome::Fail);
            }
            let first = m.terms.int(low);
            if low == high {
                return Ok(m.unify(x, first).into());
            }
            // (X = Low ; between(Low + 1, High, X))
            let between = m.symbols.intern("between");
            let rest = m.terms.app(
                between,
                smallvec::smallvec![m.terms.int(low + 1), high_term, x],
            );
            let here = m.terms.app2(m.atoms.equals, x, first);
            Ok(Outcome::Solve(m.terms.app2(m.atoms.semicolon, here, rest)))
        }
        _ => Err(IsoError::type_error("integer", x).into()),
    }
}

#[cfg(test)]
#[path = "tests/builtin.rs"]
mod tests;
