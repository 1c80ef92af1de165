//! End-to-end behavior of the engine through its public API.

use contlog::engine::Engine;
use contlog::term::TermId;

fn conj(engine: &Engine, goals: &[TermId]) -> TermId {
    let (last, init) = goals.split_last().expect("at least one goal");
    init.iter()
        .rev()
        .fold(*last, |rest, &goal| engine.app(",", &[goal, rest]))
}

fn values(engine: &Engine, goal: TermId, n: u32) -> Vec<String> {
    engine
        .solve_all(goal)
        .expect("query raised")
        .iter()
        .map(|answer| engine.format(answer.get(n).expect("slot")))
        .collect()
}

fn rendered(engine: &Engine, goal: TermId) -> Vec<String> {
    engine
        .solve_all(goal)
        .expect("query raised")
        .iter()
        .map(|answer| engine.render_answer(answer))
        .collect()
}

#[test]
fn true_and_true_has_one_solution() {
    let engine = Engine::new();
    let goal = engine.app(",", &[engine.atom("true"), engine.atom("true")]);
    let answers = engine.solve_all(goal).unwrap();
    assert_eq!(answers.len(), 1);
    assert!(answers[0].is_empty());
}

#[test]
fn fail_or_true_leaves_the_heap_untouched() {
    let engine = Engine::new();
    let goal = engine.app(";", &[engine.atom("fail"), engine.atom("true")]);
    let mut query = engine.query(goal).unwrap();
    let before = (query.heap().cell_count(), query.heap().trail_len());

    assert!(query.next_solution().unwrap().is_some());
    assert_eq!(
        (query.heap().cell_count(), query.heap().trail_len()),
        before
    );
    assert!(query.next_solution().unwrap().is_none());
}

#[test]
fn failure_driven_loop_reclaims_its_cells() {
    let engine = Engine::new();
    let (n, t) = (engine.slot(0), engine.slot(1));
    // (between(1, 1000, N), functor(T, f, 3), fail ; true)
    let lp = conj(
        &engine,
        &[
            engine.app("between", &[engine.int(1), engine.int(1000), n]),
            engine.app("functor", &[t, engine.atom("f"), engine.int(3)]),
            engine.atom("fail"),
        ],
    );
    let goal = engine.app(";", &[lp, engine.atom("true")]);
    let mut query = engine.query(goal).unwrap();
    let before = query.heap().cell_count();

    assert!(query.next_solution().unwrap().is_some());
    assert_eq!(query.heap().cell_count(), before);
    assert!(query.next_solution().unwrap().is_none());
}

/// Runs `setup`, makes three fresh variables with `functor(Z, g, 3)`, and
/// checks that none of them is the variable `kept` ended up holding.
fn survivor_is_not_aliased(engine: &Engine, setup: TermId, kept: TermId) -> usize {
    let (z, p) = (engine.slot(10), engine.slot(11));
    let (q, r) = (engine.slot(12), engine.slot(13));
    let goal = conj(
        engine,
        &[
            setup,
            engine.app("functor", &[z, engine.atom("g"), engine.int(3)]),
            engine.app("=", &[z, engine.app("g", &[p, q, r])]),
            engine.app("\\==", &[kept, p]),
            engine.app("\\==", &[kept, q]),
            engine.app("\\==", &[kept, r]),
        ],
    );
    engine.solve_all(goal).expect("query raised").len()
}

#[test]
fn findall_results_outlive_reclaimed_cells() {
    let engine = Engine::new();
    let (y, l, a) = (engine.slot(0), engine.slot(1), engine.slot(2));
    let gen = conj(
        &engine,
        &[
            engine.app("between", &[engine.int(1), engine.int(3), engine.slot(3)]),
            engine.app("functor", &[y, engine.atom("f"), engine.int(1)]),
        ],
    );
    // findall(Y, (between(1, 3, _), functor(Y, f, 1)), L), L = [f(A)|_]
    let setup = conj(
        &engine,
        &[
            engine.app("findall", &[y, gen, l]),
            engine.app(
                "=",
                &[l, engine.list_with_tail(&[engine.app("f", &[a])], engine.slot(4))],
            ),
        ],
    );
    assert_eq!(survivor_is_not_aliased(&engine, setup, a), 1);
}

#[test]
fn global_values_outlive_reclaimed_cells() {
    let engine = Engine::new();
    let (t, v, a) = (engine.slot(0), engine.slot(1), engine.slot(2));
    // (functor(T, f, 2), nb_setval(k, T), fail ; true), nb_getval(k, V), V = f(A, _)
    let store = conj(
        &engine,
        &[
            engine.app("functor", &[t, engine.atom("f"), engine.int(2)]),
            engine.app("nb_setval", &[engine.atom("k"), t]),
            engine.atom("fail"),
        ],
    );
    let setup = conj(
        &engine,
        &[
            engine.app(";", &[store, engine.atom("true")]),
            engine.app("nb_getval", &[engine.atom("k"), v]),
            engine.app("=", &[v, engine.app("f", &[a, engine.slot(3)])]),
        ],
    );
    assert_eq!(survivor_is_not_aliased(&engine, setup, a), 1);
}

#[test]
fn caught_ball_outlives_reclaimed_cells() {
    let engine = Engine::new();
    let (t, b, a) = (engine.slot(0), engine.slot(1), engine.slot(2));
    // catch((functor(T, f, 1), throw(T)), B, true), B = f(A)
    let thrower = conj(
        &engine,
        &[
            engine.app("functor", &[t, engine.atom("f"), engine.int(1)]),
            engine.app("throw", &[t]),
        ],
    );
    let setup = conj(
        &engine,
        &[
            engine.app("catch", &[thrower, b, engine.atom("true")]),
            engine.app("=", &[b, engine.app("f", &[a])]),
        ],
    );
    assert_eq!(survivor_is_not_aliased(&engine, setup, a), 1);
}

#[test]
fn if_then_else_takes_the_then_branch_once() {
    let engine = Engine::new();
    let (x, y) = (engine.slot(0), engine.slot(1));
    // (X = 1 -> Y = 2 ; Y = 3)
    let goal = engine.app(
        ";",
        &[
            engine.app(
                "->",
                &[
                    engine.app("=", &[x, engine.int(1)]),
                    engine.app("=", &[y, engine.int(2)]),
                ],
            ),
            engine.app("=", &[y, engine.int(3)]),
        ],
    );
    assert_eq!(rendered(&engine, goal), vec!["_S0 = 1, _S1 = 2"]);
}

#[test]
fn attribute_survives_backtracking_that_postdates_it() {
    let engine = Engine::new();
    let v = engine.slot(0);
    let tag = engine.atom("tag");
    let retry = engine.app(";", &[engine.atom("fail"), engine.atom("true")]);

    // put_attr(V, tag, 1), (fail ; true), get_attr(V, tag, X)
    let goal = conj(
        &engine,
        &[
            engine.app("put_attr", &[v, tag, engine.int(1)]),
            retry,
            engine.app("get_attr", &[v, tag, engine.slot(1)]),
        ],
    );
    assert_eq!(values(&engine, goal, 1), vec!["1"]);

    // (put_attr(V, tag, 1), fail ; true), get_attr(V, tag, X)
    let goal = conj(
        &engine,
        &[
            engine.app(
                ";",
                &[
                    conj(
                        &engine,
                        &[
                            engine.app("put_attr", &[v, tag, engine.int(1)]),
                            engine.atom("fail"),
                        ],
                    ),
                    engine.atom("true"),
                ],
            ),
            engine.app("get_attr", &[v, tag, engine.slot(1)]),
        ],
    );
    assert!(engine.solve_all(goal).unwrap().is_empty());
}

#[test]
fn copy_term_emits_one_goal_per_shared_attvar() {
    let engine = Engine::new();
    let v = engine.slot(0);
    // put_attr(V, a, 1), copy_term(f(V, V), Copy, Goals)
    let goal = conj(
        &engine,
        &[
            engine.app("put_attr", &[v, engine.atom("a"), engine.int(1)]),
            engine.app(
                "copy_term",
                &[engine.app("f", &[v, v]), engine.slot(1), engine.slot(2)],
            ),
        ],
    );
    let answer = engine.solve_first(goal).unwrap().unwrap();
    let copy = engine.format(answer.get(1).unwrap());
    let goals = engine.format(answer.get(2).unwrap());

    let inner = copy
        .strip_prefix("f(")
        .and_then(|rest| rest.strip_suffix(')'))
        .expect("f/2 copy");
    let (w1, w2) = inner.split_once(',').expect("two arguments");
    assert_eq!(w1, w2);
    assert_ne!(w1, engine.format(answer.get(0).unwrap()));
    assert_eq!(goals, format!("[put_attr({},a,1)]", w1));
}

#[test]
fn cut_is_monotone() {
    let mut engine = Engine::new();
    for n in 1..=3 {
        engine.add_fact(engine.app("p", &[engine.int(n)])).unwrap();
    }
    for n in [10, 20] {
        engine.add_fact(engine.app("q", &[engine.int(n)])).unwrap();
    }
    // r(X, Y) :- p(X), !, q(Y).
    let head = engine.app("r", &[engine.slot(0), engine.slot(1)]);
    let body = conj(
        &engine,
        &[
            engine.app("p", &[engine.slot(0)]),
            engine.atom("!"),
            engine.app("q", &[engine.slot(1)]),
        ],
    );
    engine.add_clause(head, body).unwrap();
    // r(0, 0).
    engine.add_fact(engine.app("r", &[engine.int(0), engine.int(0)])).unwrap();

    let goal = engine.app("r", &[engine.slot(0), engine.slot(1)]);
    assert_eq!(
        rendered(&engine, goal),
        vec!["_S0 = 1, _S1 = 10", "_S0 = 1, _S1 = 20"]
    );
}

#[test]
fn if_then_else_never_retries_the_condition() {
    let mut engine = Engine::new();
    for n in 1..=3 {
        engine.add_fact(engine.app("p", &[engine.int(n)])).unwrap();
    }
    // (p(X) -> (Y = a ; Y = b) ; Y = c)
    let (x, y) = (engine.slot(0), engine.slot(1));
    let then = engine.app(
        ";",
        &[
            engine.app("=", &[y, engine.atom("a")]),
            engine.app("=", &[y, engine.atom("b")]),
        ],
    );
    let goal = engine.app(
        ";",
        &[
            engine.app("->", &[engine.app("p", &[x]), then]),
            engine.app("=", &[y, engine.atom("c")]),
        ],
    );
    assert_eq!(
        rendered(&engine, goal),
        vec!["_S0 = 1, _S1 = a", "_S0 = 1, _S1 = b"]
    );
}

#[test]
fn conjunction_is_depth_first() {
    let mut engine = Engine::new();
    for name in ["a1", "a2"] {
        engine.add_fact(engine.app("a", &[engine.atom(name)])).unwrap();
    }
    for (from, to) in [("a1", "b11"), ("a1", "b12"), ("a2", "b21"), ("a2", "b22")] {
        engine.add_fact(engine.app("b", &[engine.atom(from), engine.atom(to)])).unwrap();
    }
    let goal = conj(
        &engine,
        &[
            engine.app("a", &[engine.slot(0)]),
            engine.app("b", &[engine.slot(0), engine.slot(1)]),
        ],
    );
    assert_eq!(values(&engine, goal, 1), vec!["b11", "b12", "b21", "b22"]);
}

#[test]
fn failed_put_attr_leaves_no_attribute() {
    let engine = Engine::new();
    let v = engine.slot(0);
    let k = engine.atom("k");
    // (put_attr(V, k, 5), fail ; \+ get_attr(V, k, _))
    let goal = engine.app(
        ";",
        &[
            conj(
                &engine,
                &[engine.app("put_attr", &[v, k, engine.int(5)]), engine.atom("fail")],
            ),
            engine.app("\\+", &[engine.app("get_attr", &[v, k, engine.slot(1)])]),
        ],
    );
    assert_eq!(engine.solve_all(goal).unwrap().len(), 1);
}

#[test]
fn recovered_error_reaches_the_top_level_as_a_term() {
    let engine = Engine::new();
    // catch(atom_length(X, _), error(E, _), true), atom_length/2 unknown
    let goal = engine.app(
        "catch",
        &[
            engine.app("atom_length", &[engine.slot(1), engine.slot(2)]),
            engine.app("error", &[engine.slot(0), engine.slot(3)]),
            engine.atom("true"),
        ],
    );
    assert_eq!(
        values(&engine, goal, 0),
        vec!["existence_error(procedure,/(atom_length,2))"]
    );
}

#[test]
fn uncaught_error_abandons_only_the_query() {
    let engine = Engine::new();
    let goal = engine.app("atom", &[engine.slot(0)]);
    let bad = engine.app("functor", &[engine.slot(0), engine.slot(1), engine.int(1)]);
    assert_eq!(
        engine.top_level(bad, 5),
        "instantiation error: arguments are not sufficiently instantiated"
    );
    assert_eq!(engine.top_level(goal, 5), "no solutions");
}
