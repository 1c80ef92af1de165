//! Canonical term writer.
//!
//! Prints terms in canonical syntax: quoted atoms, list notation, and no
//! operators (`a+b` prints as `+(a,b)`). Bindings are read through
//! [`Heap::deref`]; the writer never touches the trail.

use crate::heap::Heap;
use crate::term::{Term, TermId, TermStore};
use crate::symbol::SymbolStore;
use std::fmt::Write;

enum Piece {
    Term(TermId),
    Text(&'static str),
}

/// Render `term`. Without a heap, variables print unbound.
pub fn format_term(
    term: TermId,
    terms: &TermStore,
    symbols: &SymbolStore,
    heap: Option<&Heap>,
) -> String {
    let deref = |t: TermId| match heap {
        Some(heap) => heap.deref(terms, t),
        None => t,
    };
    let dot = symbols.intern(".");
    let nil = terms.atom(symbols.intern("[]"));

    let mut out = String::new();
    let mut stack = vec![Piece::Term(term)];

    while let Some(piece) = stack.pop() {
        let t = match piece {
            Piece::Text(text) => {
                out.push_str(text);
                continue;
            }
            Piece::Term(t) => deref(t),
        };
        match terms.get(t) {
            Term::Atom(name) => write_atom(&mut out, symbols.name(name)),
            Term::Int(value) => {
                let _ = write!(out, "{}", value);
            }
            Term::Float(bits) => write_float(&mut out, bits.get()),
            Term::Var(index) | Term::AttVar(index) => {
                let _ = write!(out, "_{}", index);
            }
            Term::Slot(index) => {
                let _ = write!(out, "_S{}", index);
            }
            Term::Struct(name, args) if name == dot && args.len() == 2 => {
                let mut items = vec![args[0]];
                let mut tail = deref(args[1]);
                while let Term::Struct(n, cell) = terms.get(tail) {
                    if n != dot || cell.len() != 2 {
                        break;
                    }
                    items.push(cell[0]);
                    tail = deref(cell[1]);
                }
                out.push('[');
                stack.push(Piece::Text("]"));
                if tail != nil {
                    stack.push(Piece::Term(tail));
                    stack.push(Piece::Text("|"));
                }
                push_args(&mut stack, &items);
            }
            Term::Struct(name, args) => {
                write_atom(&mut out, symbols.name(name));
                out.push('(');
                stack.push(Piece::Text(")"));
                push_args(&mut stack, &args);
            }
        }
    }

    out
}

/// Push `items` so they pop in order, comma separated.
fn push_args(stack: &mut Vec<Piece>, items: &[TermId]) {
    for (i, &item) in items.iter().enumerate().rev() {
        stack.push(Piece::Term(item));
        if i > 0 {
            stack.push(Piece::Text(","));
        }
    }
}

const SYMBOL_CHARS: &str = "+-*/\\^<>=~:.?@#&$";

/// Must `name` be quoted to read back as the same atom?
pub fn atom_needs_quotes(name: &str) -> bool {
    if matches!(name, "[]" | "!" | ";" | "{}") {
        return false;
    }
    let mut chars = name.chars();
    match chars.next() {
        None => true,
        Some(c) if c.is_ascii_lowercase() => {
            !chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        Some(_) => !name.chars().all(|c| SYMBOL_CHARS.contains(c)),
    }
}

fn write_atom(out: &mut String, name: &str) {
    if !atom_needs_quotes(name) {
        out.push_str(name);
        return;
    }
    out.push('\'');
    for c in name.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('\'');
}

fn write_float(out: &mut String, value: f64) {
    if value.is_nan() {
        out.push_str("1.5NaN");
    } else if value.is_infinite() {
        out.push_str(if value > 0.0 { "inf" } else { "-inf" });
    } else {
        let text = format!("{:?}", value);
        match text.find('e') {
            Some(pos) if !text[..pos].contains('.') => {
                out.push_str(&text[..pos]);
                out.push_str(".0");
                out.push_str(&text[pos..]);
            }
            _ => out.push_str(&text),
        }
    }
}
