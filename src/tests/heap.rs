use super::*;
use crate::test_utils::setup;

#[test]
fn fresh_vars_are_unbound_and_distinct() {
    let (_, terms) = setup();
    let mut heap = Heap::new(0);
    let x = heap.new_var(&terms);
    let y = heap.new_var(&terms);
    assert_ne!(x, y);
    assert_eq!(heap.deref(&terms, x), x);
    assert_eq!(heap.cell_count(), 2);
}

#[test]
fn deref_follows_chains() {
    let (symbols, terms) = setup();
    let mut heap = Heap::new(0);
    let x = heap.new_var(&terms);
    let y = heap.new_var(&terms);
    let a = terms.atom(symbols.intern("a"));
    heap.bind(1, x);
    heap.bind(0, a);
    assert_eq!(heap.deref(&terms, y), a);
    assert!(heap.is_bound(0));
    assert!(heap.is_bound(1));
}

#[test]
fn revert_restores_bindings() {
    let (symbols, terms) = setup();
    let mut heap = Heap::new(0);
    let x = heap.new_var(&terms);
    let a = terms.atom(symbols.intern("a"));
    let cp = heap.branch();
    heap.bind(0, a);
    assert_eq!(heap.deref(&terms, x), a);
    heap.revert_upto(cp, false).unwrap();
    assert_eq!(heap.deref(&terms, x), x);
    assert_eq!(heap.trail_len(), cp.trail_len());
}

#[test]
fn bindings_before_checkpoint_survive_revert() {
    let (symbols, terms) = setup();
    let mut heap = Heap::new(0);
    let x = heap.new_var(&terms);
    let y = heap.new_var(&terms);
    let a = terms.atom(symbols.intern("a"));
    heap.bind(0, a);
    let cp = heap.branch();
    heap.bind(1, a);
    heap.revert_upto(cp, true).unwrap();
    assert_eq!(heap.deref(&terms, x), a);
    assert_eq!(heap.deref(&terms, y), y);
}

#[test]
fn attribute_set_and_delete_are_undone() {
    let (symbols, terms) = setup();
    let mut heap = Heap::new(0);
    let v = heap.new_attvar(&terms);
    let Term::AttVar(idx) = terms.get(v) else {
        panic!("expected attvar");
    };
    let k = symbols.intern("k");
    let one = terms.int(1);
    let two = terms.int(2);

    heap.set_attr(idx, k, Some(one));
    let cp = heap.branch();
    heap.set_attr(idx, k, Some(two));
    heap.set_attr(idx, k, None);
    assert_eq!(heap.attr(idx, k), None);
    heap.revert_upto(cp, false).unwrap();
    assert_eq!(heap.attr(idx, k), Some(one));
}

#[test]
fn appended_attribute_slot_is_removed_on_revert() {
    let (symbols, terms) = setup();
    let mut heap = Heap::new(0);
    let v = heap.new_attvar(&terms);
    let Term::AttVar(idx) = terms.get(v) else {
        panic!("expected attvar");
    };
    let a = symbols.intern("a");
    let b = symbols.intern("b");
    heap.set_attr(idx, a, Some(terms.int(1)));
    let cp = heap.branch();
    heap.set_attr(idx, b, Some(terms.int(2)));
    assert_eq!(heap.attr_slots(idx).len(), 2);
    heap.revert_upto(cp, false).unwrap();
    assert_eq!(heap.attr_slots(idx), &[(a, Some(terms.int(1)))]);
}

#[test]
fn deleted_keys_keep_their_slot() {
    let (symbols, terms) = setup();
    let mut heap = Heap::new(0);
    let v = heap.new_attvar(&terms);
    let Term::AttVar(idx) = terms.get(v) else {
        panic!("expected attvar");
    };
    let a = symbols.intern("a");
    let b = symbols.intern("b");
    heap.set_attr(idx, a, Some(terms.int(1)));
    heap.set_attr(idx, b, Some(terms.int(2)));
    heap.set_attr(idx, a, None);
    assert_eq!(heap.attrs(idx), vec![(b, terms.int(2))]);
    heap.set_attr(idx, a, Some(terms.int(3)));
    assert_eq!(heap.attrs(idx), vec![(a, terms.int(3)), (b, terms.int(2))]);
}

#[test]
fn deleting_absent_key_leaves_no_record() {
    let (symbols, terms) = setup();
    let mut heap = Heap::new(0);
    let v = heap.new_attvar(&terms);
    let Term::AttVar(idx) = terms.get(v) else {
        panic!("expected attvar");
    };
    let before = heap.trail_len();
    heap.set_attr(idx, symbols.intern("missing"), None);
    assert_eq!(heap.trail_len(), before);
}

#[test]
fn undo_callbacks_run_in_reverse_order() {
    use std::cell::RefCell;
    use std::rc::Rc;

    let mut heap = Heap::new(0);
    let log = Rc::new(RefCell::new(Vec::new()));
    let cp = heap.branch();
    for i in 0..3 {
        let log = Rc::clone(&log);
        heap.on_undo(move |_| log.borrow_mut().push(i));
    }
    heap.revert_upto(cp, false).unwrap();
    assert_eq!(*log.borrow(), vec![2, 1, 0]);
}

#[test]
fn backtrackable_globals_are_restored() {
    let (symbols, terms) = setup();
    let mut heap = Heap::new(0);
    let name = symbols.intern("counter");
    heap.b_setval(name, terms.int(1));
    let cp = heap.branch();
    heap.b_setval(name, terms.int(2));
    assert_eq!(heap.getval(name), Some(terms.int(2)));
    heap.revert_upto(cp, false).unwrap();
    assert_eq!(heap.getval(name), Some(terms.int(1)));
}

#[test]
fn non_backtrackable_globals_survive() {
    let (symbols, terms) = setup();
    let mut heap = Heap::new(0);
    let name = symbols.intern("seen");
    let cp = heap.branch();
    heap.nb_setval(name, terms.int(7));
    heap.revert_upto(cp, false).unwrap();
    assert_eq!(heap.getval(name), Some(terms.int(7)));
}

#[test]
fn binding_an_attvar_queues_a_wakeup() {
    let (symbols, terms) = setup();
    let mut heap = Heap::new(0);
    let v = heap.new_attvar(&terms);
    let Term::AttVar(idx) = terms.get(v) else {
        panic!("expected attvar");
    };
    let a = terms.atom(symbols.intern("a"));
    let cp = heap.branch();
    heap.bind_attvar(idx, a);
    assert!(heap.has_wakeups());
    heap.revert_upto(cp, false).unwrap();
    assert!(!heap.has_wakeups());

    heap.bind_attvar(idx, a);
    assert_eq!(heap.take_wakeups(), vec![Wakeup { var: idx, value: a }]);
    assert!(!heap.has_wakeups());
}

#[test]
fn foreign_checkpoint_is_fatal() {
    let mut first = Heap::new(1);
    let mut second = Heap::new(2);
    let cp = first.branch();
    second.branch();
    let err = second.revert_upto(cp, false).unwrap_err();
    assert_eq!(
        err,
        FatalError::ForeignCheckpoint {
            heap: 2,
            checkpoint_heap: 1
        }
    );
}

#[test]
fn checkpoint_past_trail_end_is_fatal() {
    let (symbols, terms) = setup();
    let mut heap = Heap::new(0);
    heap.new_var(&terms);
    let outer = heap.branch();
    heap.bind(0, terms.atom(symbols.intern("a")));
    let inner = heap.branch();
    heap.revert_upto(outer, true).unwrap();
    let err = heap.revert_upto(inner, false).unwrap_err();
    assert!(matches!(err, FatalError::CheckpointAhead { .. }));
}

#[test]
fn nested_checkpoints_revert_in_lifo_order() {
    let (symbols, terms) = setup();
    let mut heap = Heap::new(0);
    let x = heap.new_var(&terms);
    let y = heap.new_var(&terms);
    let a = terms.atom(symbols.intern("a"));
    let outer = heap.branch();
    heap.bind(0, a);
    let inner = heap.branch();
    heap.bind(1, a);
    heap.revert_upto(inner, true).unwrap();
    assert_eq!(heap.deref(&terms, x), a);
    assert_eq!(heap.deref(&terms, y), y);
    heap.revert_upto(outer, true).unwrap();
    assert_eq!(heap.deref(&terms, x), x);
}

#[test]
fn promotion_is_undone_on_revert() {
    let (symbols, terms) = setup();
    let mut heap = Heap::new(0);
    let x = heap.new_var(&terms);
    let key = symbols.intern("k");
    let cp = heap.branch();
    let index = heap.promote(&terms, 0);
    heap.set_attr(index, key, Some(terms.int(5)));
    assert_eq!(heap.deref(&terms, x), terms.attvar(index));
    assert!(heap.is_attvar(index));
    heap.revert_upto(cp, false).unwrap();
    assert_eq!(heap.deref(&terms, x), x);
    assert!(!heap.is_attvar(0));
    assert!(!heap.is_attvar(index));
    assert_eq!(heap.cell_count(), 1);
}

#[test]
fn revert_reclaims_cells_created_after_the_checkpoint() {
    let (symbols, terms) = setup();
    let mut heap = Heap::new(0);
    heap.new_var(&terms);
    let cp = heap.branch();
    assert_eq!(cp.cell_count(), 1);
    for _ in 0..100 {
        let v = heap.new_var(&terms);
        let index = terms.get(v).var_index().unwrap();
        heap.bind(index, terms.atom(symbols.intern("a")));
    }
    heap.new_attvar(&terms);
    heap.revert_upto(cp, true).unwrap();
    assert_eq!(heap.cell_count(), 1);
    assert!(!heap.is_attvar(101));

    // Indices are handed out again.
    assert_eq!(heap.new_var(&terms), terms.var(1));
    assert!(!heap.is_bound(1));
}

#[test]
fn pinned_cells_survive_revert() {
    let (_, terms) = setup();
    let mut heap = Heap::new(0);
    let outer = heap.branch();
    let kept = heap.new_var(&terms);
    heap.pin();
    let inner = heap.branch();
    heap.new_var(&terms);
    heap.new_var(&terms);

    heap.revert_upto(inner, true).unwrap();
    assert_eq!(heap.cell_count(), 1);
    heap.revert_upto(outer, true).unwrap();
    assert_eq!(heap.cell_count(), 1);
    assert_eq!(heap.deref(&terms, kept), kept);
}

#[test]
fn non_backtrackable_values_are_pinned() {
    let (symbols, terms) = setup();
    let mut heap = Heap::new(0);
    let name = symbols.intern("g");
    let cp = heap.branch();
    let value = heap.new_var(&terms);
    heap.nb_setval(name, value);
    heap.new_var(&terms);
    heap.revert_upto(cp, true).unwrap();
    assert_eq!(heap.cell_count(), 1);
    assert_eq!(heap.getval(name), Some(value));
}
