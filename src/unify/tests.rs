use super::*;
use crate::test_utils::setup;

// ========== IDENTICAL AND ATOMIC TERMS ==========

#[test]
fn unify_same_var() {
    let (_, terms) = setup();
    let mut heap = Heap::new(0);
    let x = heap.new_var(&terms);
    assert!(unify(&mut heap, &terms, x, x, true));
    assert_eq!(heap.trail_len(), 0, "same var should bind nothing");
}

#[test]
fn unify_equal_atoms() {
    let (symbols, terms) = setup();
    let mut heap = Heap::new(0);
    let a = terms.atom(symbols.intern("a"));
    assert!(unify(&mut heap, &terms, a, a, true));
}

#[test]
fn unify_distinct_atoms_fails() {
    let (symbols, terms) = setup();
    let mut heap = Heap::new(0);
    let a = terms.atom(symbols.intern("a"));
    let b = terms.atom(symbols.intern("b"));
    assert!(!unify(&mut heap, &terms, a, b, true));
}

#[test]
fn unify_int_and_float_fails() {
    let (_, terms) = setup();
    let mut heap = Heap::new(0);
    assert!(!unify(&mut heap, &terms, terms.int(1), terms.float(1.0), true));
}

#[test]
fn unify_floats_by_value() {
    let (_, terms) = setup();
    let mut heap = Heap::new(0);
    assert!(unify(&mut heap, &terms, terms.float(0.0), terms.float(-0.0), true));
    assert!(!unify(&mut heap, &terms, terms.float(1.5), terms.float(2.5), true));
}

// ========== VARIABLES ==========

#[test]
fn unify_var_with_atom_binds() {
    let (symbols, terms) = setup();
    let mut heap = Heap::new(0);
    let x = heap.new_var(&terms);
    let a = terms.atom(symbols.intern("a"));
    assert!(unify(&mut heap, &terms, x, a, true));
    assert_eq!(heap.deref(&terms, x), a);
}

#[test]
fn unify_two_vars_binds_younger_to_older() {
    let (_, terms) = setup();
    let mut heap = Heap::new(0);
    let x = heap.new_var(&terms);
    let y = heap.new_var(&terms);
    assert!(unify(&mut heap, &terms, x, y, true));
    assert!(!heap.is_bound(0));
    assert_eq!(heap.binding(1), Some(x));
}

#[test]
fn unify_plain_var_with_attvar_binds_plain() {
    let (_, terms) = setup();
    let mut heap = Heap::new(0);
    let v = heap.new_attvar(&terms);
    let x = heap.new_var(&terms);
    assert!(unify(&mut heap, &terms, v, x, true));
    assert!(!heap.is_bound(0));
    assert_eq!(heap.deref(&terms, x), v);
    assert!(!heap.has_wakeups());
}

#[test]
fn unify_attvar_with_value_queues_wakeup() {
    let (symbols, terms) = setup();
    let mut heap = Heap::new(0);
    let v = heap.new_attvar(&terms);
    let a = terms.atom(symbols.intern("a"));
    assert!(unify(&mut heap, &terms, a, v, true));
    assert_eq!(heap.take_wakeups(), vec![crate::heap::Wakeup { var: 0, value: a }]);
}

// ========== COMPOUNDS ==========

#[test]
fn unify_compounds_binds_arguments() {
    let (symbols, terms) = setup();
    let mut heap = Heap::new(0);
    let f = symbols.intern("f");
    let x = heap.new_var(&terms);
    let y = heap.new_var(&terms);
    let a = terms.atom(symbols.intern("a"));
    let b = terms.atom(symbols.intern("b"));
    assert!(unify(
        &mut heap,
        &terms,
        terms.app2(f, x, b),
        terms.app2(f, a, y),
        true
    ));
    assert_eq!(heap.deref(&terms, x), a);
    assert_eq!(heap.deref(&terms, y), b);
}

#[test]
fn unify_functor_mismatch_fails() {
    let (symbols, terms) = setup();
    let mut heap = Heap::new(0);
    let x = heap.new_var(&terms);
    let f = terms.app1(symbols.intern("f"), x);
    let g = terms.app1(symbols.intern("g"), x);
    assert!(!unify(&mut heap, &terms, f, g, true));
}

#[test]
fn unify_arity_mismatch_fails() {
    let (symbols, terms) = setup();
    let mut heap = Heap::new(0);
    let f = symbols.intern("f");
    let a = terms.atom(symbols.intern("a"));
    assert!(!unify(&mut heap, &terms, terms.app1(f, a), terms.app2(f, a, a), true));
}

#[test]
fn unify_shared_variable_propagates() {
    let (symbols, terms) = setup();
    let mut heap = Heap::new(0);
    let f = symbols.intern("f");
    let x = heap.new_var(&terms);
    let a = terms.atom(symbols.intern("a"));
    let b = terms.atom(symbols.intern("b"));
    assert!(!unify(
        &mut heap,
        &terms,
        terms.app2(f, x, x),
        terms.app2(f, a, b),
        true
    ));
}

#[test]
fn unify_deep_terms_does_not_overflow() {
    let (symbols, terms) = setup();
    let mut heap = Heap::new(0);
    let s = symbols.intern("s");
    let x = heap.new_var(&terms);
    let mut left = x;
    let mut right = terms.int(0);
    for _ in 0..100_000 {
        left = terms.app1(s, left);
        right = terms.app1(s, right);
    }
    assert!(!unify(&mut heap, &terms, left, terms.int(0), true));
    assert!(unify(&mut heap, &terms, left, terms.app1(s, right), true));
    assert_eq!(heap.deref(&terms, x), terms.app1(s, terms.int(0)));
}

// ========== OCCURS CHECK ==========

#[test]
fn occurs_check_rejects_cycles() {
    let (symbols, terms) = setup();
    let mut heap = Heap::new(0);
    let f = symbols.intern("f");
    let x = heap.new_var(&terms);
    assert!(!unify(&mut heap, &terms, x, terms.app1(f, x), true));
    assert!(!heap.is_bound(0));
}

#[test]
fn occurs_check_sees_through_bindings() {
    let (symbols, terms) = setup();
    let mut heap = Heap::new(0);
    let f = symbols.intern("f");
    let x = heap.new_var(&terms);
    let y = heap.new_var(&terms);
    heap.bind(1, terms.app1(f, x));
    assert!(occurs(&heap, &terms, 0, y));
    assert!(!unify(&mut heap, &terms, x, y, true));
}

#[test]
fn occurs_check_sees_variables_behind_ground_looking_bindings() {
    let (symbols, terms) = setup();
    let mut heap = Heap::new(0);
    let s = symbols.intern("s");
    let x = heap.new_var(&terms);
    let y = heap.new_var(&terms);

    let mut nat = terms.int(0);
    for _ in 0..1_000 {
        nat = terms.app1(s, nat);
    }
    assert!(terms.is_ground(nat));
    assert!(!occurs(&heap, &terms, 0, nat));

    // y = s(x): not ground as a node, so the walk still finds x.
    heap.bind(1, terms.app1(s, x));
    assert!(occurs(&heap, &terms, 0, terms.app1(s, y)));
    assert!(unify(&mut heap, &terms, x, nat, true));
    assert_eq!(heap.binding(0), Some(nat));
}

#[test]
fn without_occurs_check_binding_succeeds() {
    let (symbols, terms) = setup();
    let mut heap = Heap::new(0);
    let f = symbols.intern("f");
    let x = heap.new_var(&terms);
    let fx = terms.app1(f, x);
    assert!(unify(&mut heap, &terms, x, fx, false));
    assert_eq!(heap.binding(0), Some(fx));
}
