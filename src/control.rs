//! Goal dispatch over the continuation protocol.
//!
//! [`Machine::activate`] runs one success frame and [`Machine::fail`] resumes
//! one choice point; each returns the next [`Transition`] and never recurses
//! into the other, so the driver loop in [`crate::engine`] keeps the host
//! stack flat however deep the resolution goes.
//!
//! Cut is lexical: every `Call` frame carries the failure continuation that
//! was current when its enclosing clause (or `call/N`) was entered, and `!`
//! simply resumes that one.

use crate::builtin::{BuiltinTable, Outcome};
use crate::config::{EngineConfig, UnknownPolicy};
use crate::copy::{copy_term, instantiate, AttrCopy};
use crate::cont::{Alternative, Choice, FailCont, Frame, Kont, SuccessCont, Transition};
use crate::database::{indicator, Clause, ClauseSource};
use crate::error::{IsoError, PrologError};
use crate::heap::Heap;
use crate::metrics::SolveMetrics;
use crate::symbol::{Atoms, Sym, SymbolStore};
use crate::term::{Term, TermId, TermStore};
use crate::unify::unify;
use smallvec::{smallvec, SmallVec};
use std::cell::RefCell;
use std::rc::Rc;

#[cfg(feature = "tracing")]
use crate::trace::{debug, trace};

/// Everything a running query needs: the engine's shared stores plus the
/// query's own heap.
pub(crate) struct Machine<'a> {
    pub(crate) terms: &'a TermStore,
    pub(crate) symbols: &'a SymbolStore,
    pub(crate) atoms: &'a Atoms,
    pub(crate) source: &'a dyn ClauseSource,
    pub(crate) builtins: &'a BuiltinTable,
    pub(crate) config: &'a EngineConfig,
    pub(crate) metrics: &'a SolveMetrics,
    pub(crate) default_module: Sym,
    pub(crate) heap: &'a mut Heap,
}

fn rest(k: &Kont) -> SuccessCont {
    k.next.clone().unwrap_or_else(Kont::done)
}

impl<'a> Machine<'a> {
    pub(crate) fn deref(&self, term: TermId) -> TermId {
        self.heap.deref(self.terms, term)
    }

    /// The dereferenced node of `term`.
    pub(crate) fn node(&self, term: TermId) -> Term {
        self.terms.get(self.deref(term))
    }

    pub(crate) fn unify(&mut self, a: TermId, b: TermId) -> bool {
        let ok = unify(self.heap, self.terms, a, b, self.config.occurs_check);
        self.metrics.record_unification(ok);
        ok
    }

    pub(crate) fn atom(&self, name: &str) -> TermId {
        self.terms.atom(self.symbols.intern(name))
    }

    pub(crate) fn list(&self, items: &[TermId]) -> TermId {
        self.terms
            .list(self.atoms.dot, items, self.terms.atom(self.atoms.nil))
    }

    /// Elements of a proper list. Otherwise the dereferenced tail that is
    /// neither a list cell nor `[]`: an unbound variable for a partial list.
    pub(crate) fn list_items(&self, list: TermId) -> Result<Vec<TermId>, TermId> {
        let nil = self.terms.atom(self.atoms.nil);
        let mut items = Vec::new();
        let mut cur = self.deref(list);
        loop {
            if cur == nil {
                return Ok(items);
            }
            match self.terms.get(cur) {
                Term::Struct(name, args) if name == self.atoms.dot && args.len() == 2 => {
                    items.push(args[0]);
                    cur = self.deref(args[1]);
                }
                _ => return Err(cur),
            }
        }
    }

    /// Run one success frame.
    pub(crate) fn activate(
        &mut self,
        k: SuccessCont,
        f: FailCont,
    ) -> Result<Transition, PrologError> {
        self.metrics.record_activation();
        match &k.frame {
            Frame::Done => {
                self.metrics.record_solution();
                Ok(Transition::Solution(f))
            }
            Frame::Call {
                goal,
                module,
                barrier,
            } => self.solve(*goal, *module, barrier.clone(), rest(&k), f),
            Frame::IfThen {
                then,
                module,
                barrier,
                commit_to,
            } => Ok(Transition::Proceed(
                Kont::call(*then, *module, barrier.clone(), rest(&k)),
                commit_to.clone(),
            )),
            Frame::Catch { .. } => Ok(Transition::Proceed(rest(&k), f)),
            Frame::Collect { template, results } => {
                let copy = copy_term(*template, self.heap, self.terms, AttrCopy::Keep).term;
                self.heap.pin();
                results.borrow_mut().push(copy);
                Ok(Transition::Backtrack(f))
            }
        }
    }

    /// Resume the newest choice point of `f`.
    pub(crate) fn fail(&mut self, f: FailCont) -> Result<Transition, PrologError> {
        let Some(choice) = f else {
            return Ok(Transition::Exhausted);
        };
        self.metrics.record_backtrack();
        #[cfg(feature = "tracing")]
        trace!(alt = ?choice.alt, "backtrack");

        match &choice.alt {
            Alternative::Goal {
                goal,
                module,
                barrier,
                scont,
            } => {
                self.heap.revert_upto(choice.checkpoint, true)?;
                Ok(Transition::Proceed(
                    Kont::call(*goal, *module, barrier.clone(), scont.clone()),
                    choice.prev.clone(),
                ))
            }
            Alternative::Clauses {
                goal,
                module,
                clauses,
                next,
                scont,
            } => {
                self.heap.revert_upto(choice.checkpoint, true)?;
                self.resume_clauses(
                    *goal,
                    *module,
                    Rc::clone(clauses),
                    *next,
                    scont.clone(),
                    choice.prev.clone(),
                )
            }
            Alternative::Repeat { scont } => {
                self.heap.revert_upto(choice.checkpoint, false)?;
                Ok(Transition::Proceed(scont.clone(), Some(Rc::clone(&choice))))
            }
            Alternative::CollectDone {
                results,
                out,
                module,
                scont,
            } => {
                self.heap.revert_upto(choice.checkpoint, true)?;
                let items = results.borrow().clone();
                let list = self.list(&items);
                let goal = self.terms.app2(self.atoms.equals, *out, list);
                Ok(Transition::Proceed(
                    Kont::call(goal, *module, choice.prev.clone(), scont.clone()),
                    choice.prev.clone(),
                ))
            }
        }
    }

    /// Deliver `err` to the innermost `catch/3` frame of `k` whose catcher
    /// unifies with the ball. Fatal errors are never intercepted.
    pub(crate) fn unwind(
        &mut self,
        k: &SuccessCont,
        err: PrologError,
    ) -> Result<Transition, PrologError> {
        let ball = match err {
            PrologError::Fatal(_) => return Err(err),
            PrologError::Iso(e) => {
                let ball = e.to_ball(self.heap, self.terms, self.symbols);
                let ball = copy_term(ball, self.heap, self.terms, AttrCopy::Keep).term;
                self.heap.pin();
                ball
            }
            PrologError::Thrown(ball) => ball,
        };
        self.metrics.record_exception_thrown();
        #[cfg(feature = "tracing")]
        debug!(ball = ?ball, "unwind");

        let mut cur = Some(Rc::clone(k));
        while let Some(kont) = cur {
            if let Frame::Catch {
                catcher,
                recovery,
                module,
                checkpoint,
                fcont_at_entry,
            } = &kont.frame
            {
                self.heap.revert_upto(*checkpoint, true)?;
                if self.unify(*catcher, ball) {
                    self.metrics.record_exception_caught();
                    #[cfg(feature = "tracing")]
                    debug!(ball = ?ball, "caught");
                    let next = Kont::call(*recovery, *module, fcont_at_entry.clone(), rest(&kont));
                    let next = self.wake(next, fcont_at_entry);
                    return Ok(Transition::Proceed(next, fcont_at_entry.clone()));
                }
                self.heap.revert_upto(*checkpoint, true)?;
            }
            cur = kont.next.clone();
        }
        Err(PrologError::Thrown(ball))
    }

    /// A goal argument about to be called: must not contain numbers in
    /// goal position.
    fn callable_arg(&self, goal: TermId) -> Result<TermId, PrologError> {
        check_body(goal, self.terms, self.atoms, Some(&*self.heap))?;
        Ok(goal)
    }

    fn solve(
        &mut self,
        goal: TermId,
        module: Sym,
        mut barrier: FailCont,
        next: SuccessCont,
        f: FailCont,
    ) -> Result<Transition, PrologError> {
        let resolved = self.deref(goal);
        let (name, args): (Sym, SmallVec<[TermId; 4]>) = match self.terms.get(resolved) {
            Term::Var(_) | Term::AttVar(_) => return Err(IsoError::Instantiation.into()),
            Term::Atom(name) => (name, SmallVec::new()),
            Term::Struct(name, args) => (name, args),
            _ => return Err(IsoError::type_error("callable", resolved).into()),
        };
        if resolved != goal {
            // A variable in goal position behaves as call/1.
            self.callable_arg(resolved)?;
            barrier = f.clone();
        }
        #[cfg(feature = "tracing")]
        trace!(goal = %crate::format::format_term(resolved, self.terms, self.symbols, Some(&*self.heap)), "activate");

        let a = *self.atoms;
        let arity = args.len();
        match arity {
            0 if name == a.true_ => return Ok(Transition::Proceed(next, f)),
            0 if name == a.fail || name == a.false_ => return Ok(Transition::Backtrack(f)),
            0 if name == a.cut => {
                self.metrics.record_cut();
                #[cfg(feature = "tracing")]
                trace!(
                    dropped = crate::cont::choice_depth(&f)
                        .saturating_sub(crate::cont::choice_depth(&barrier)),
                    "cut"
                );
                return Ok(Transition::Proceed(next, barrier));
            }
            0 if name == a.repeat => {
                let cp = self.heap.branch();
                self.metrics.record_choice_point();
                let choice = Choice::push(Alternative::Repeat { scont: next.clone() }, cp, f);
                return Ok(Transition::Proceed(next, choice));
            }
            1 if name == a.not_provable || name == a.not => {
                let cond = self.callable_arg(args[0])?;
                let fail = self.terms.atom(a.fail);
                let succeed = self.terms.atom(a.true_);
                return Ok(self.if_then_else(cond, fail, Some(succeed), module, f.clone(), next, f));
            }
            1 if name == a.once => {
                let cond = self.callable_arg(args[0])?;
                let succeed = self.terms.atom(a.true_);
                return Ok(self.if_then_else(cond, succeed, None, module, f.clone(), next, f));
            }
            1 if name == a.ignore => {
                let cond = self.callable_arg(args[0])?;
                let succeed = self.terms.atom(a.true_);
                return Ok(self.if_then_else(cond, succeed, Some(succeed), module, f.clone(), next, f));
            }
            1 if name == a.throw => {
                let ball = self.deref(args[0]);
                if self.terms.get(ball).var_index().is_some() {
                    return Err(IsoError::Instantiation.into());
                }
                let ball = copy_term(ball, self.heap, self.terms, AttrCopy::Keep).term;
                self.heap.pin();
                return Err(PrologError::Thrown(ball));
            }
            2 if name == a.comma => {
                let right = Kont::call(args[1], module, barrier.clone(), next);
                return Ok(Transition::Proceed(
                    Kont::call(args[0], module, barrier, right),
                    f,
                ));
            }
            2 if name == a.semicolon => {
                // Only a literal `->` makes an if-then-else. A variable bound
                // to one is an ordinary call with its own cut barrier.
                if let Term::Struct(n, ite) = self.terms.get(args[0]) {
                    if n == a.arrow && ite.len() == 2 {
                        return Ok(self.if_then_else(
                            ite[0],
                            ite[1],
                            Some(args[1]),
                            module,
                            barrier,
                            next,
                            f,
                        ));
                    }
                }
                let cp = self.heap.branch();
                self.metrics.record_choice_point();
                let choice = Choice::push(
                    Alternative::Goal {
                        goal: args[1],
                        module,
                        barrier: barrier.clone(),
                        scont: next.clone(),
                    },
                    cp,
                    f,
                );
                return Ok(Transition::Proceed(
                    Kont::call(args[0], module, barrier, next),
                    choice,
                ));
            }
            2 if name == a.arrow => {
                return Ok(self.if_then_else(args[0], args[1], None, module, barrier, next, f));
            }
            2 if name == a.colon => {
                let target = self.deref(args[0]);
                return match self.terms.get(target) {
                    Term::Atom(m) => Ok(Transition::Proceed(
                        Kont::call(args[1], m, barrier, next),
                        f,
                    )),
                    Term::Var(_) | Term::AttVar(_) => Err(IsoError::Instantiation.into()),
                    _ => Err(IsoError::type_error("atom", target).into()),
                };
            }
            2 if name == a.forall => {
                // \+ (Cond, \+ Action)
                let action = self.callable_arg(args[1])?;
                let inner = self.terms.app1(a.not_provable, action);
                let cond = self.callable_arg(self.terms.app2(a.comma, args[0], inner))?;
                let fail = self.terms.atom(a.fail);
                let succeed = self.terms.atom(a.true_);
                return Ok(self.if_then_else(cond, fail, Some(succeed), module, f.clone(), next, f));
            }
            3 if name == a.catch => {
                let protected = self.callable_arg(args[0])?;
                let cp = self.heap.branch();
                let frame = Frame::Catch {
                    catcher: args[1],
                    recovery: args[2],
                    module,
                    checkpoint: cp,
                    fcont_at_entry: f.clone(),
                };
                let body = Kont::call(protected, module, f.clone(), Kont::push(frame, next));
                return Ok(Transition::Proceed(body, f));
            }
            3 if name == a.findall => {
                let generator = self.callable_arg(args[1])?;
                let results = Rc::new(RefCell::new(Vec::new()));
                let cp = self.heap.branch();
                self.metrics.record_choice_point();
                let done = Choice::push(
                    Alternative::CollectDone {
                        results: Rc::clone(&results),
                        out: args[2],
                        module,
                        scont: next.clone(),
                    },
                    cp,
                    f,
                );
                let collect = Kont::push(
                    Frame::Collect {
                        template: args[0],
                        results,
                    },
                    next,
                );
                return Ok(Transition::Proceed(
                    Kont::call(generator, module, done.clone(), collect),
                    done,
                ));
            }
            _ if name == a.call && (1..=8).contains(&arity) => {
                let target = self.add_args(args[0], &args[1..])?;
                let target = self.callable_arg(target)?;
                return Ok(Transition::Proceed(
                    Kont::call(target, module, f.clone(), next),
                    f,
                ));
            }
            _ => {}
        }

        if let Some(builtin) = self.builtins.get(&(name, arity)).copied() {
            return match builtin(self, &args)? {
                Outcome::Fail => Ok(Transition::Backtrack(f)),
                Outcome::Succeed => {
                    let next = self.wake(next, &f);
                    Ok(Transition::Proceed(next, f))
                }
                Outcome::Solve(goal) => Ok(Transition::Proceed(
                    Kont::call(goal, module, f.clone(), next),
                    f,
                )),
            };
        }

        match self.find_clauses(module, name, arity) {
            Some((def_module, clauses)) => {
                self.resume_clauses(resolved, def_module, clauses, 0, next, f)
            }
            None => match self.config.unknown {
                UnknownPolicy::Fail => Ok(Transition::Backtrack(f)),
                UnknownPolicy::Error => Err(IsoError::existence_error(
                    "procedure",
                    indicator(self.terms, self.atoms, name, arity),
                )
                .into()),
            },
        }
    }

    /// `call/N`: append `extra` to the arguments of `goal`.
    fn add_args(&self, goal: TermId, extra: &[TermId]) -> Result<TermId, PrologError> {
        let goal = self.deref(goal);
        if extra.is_empty() {
            return Ok(goal);
        }
        match self.terms.get(goal) {
            Term::Atom(name) => Ok(self.terms.app(name, extra.iter().copied().collect())),
            Term::Struct(name, args) => {
                let mut all = args;
                all.extend(extra.iter().copied());
                Ok(self.terms.app(name, all))
            }
            Term::Var(_) | Term::AttVar(_) => Err(IsoError::Instantiation.into()),
            _ => Err(IsoError::type_error("callable", goal).into()),
        }
    }

    /// `Cond -> Then ; Else`, or `Cond -> Then` when `otherwise` is `None`.
    /// A cut in `Cond` is local to it; cuts in the branches cut through to
    /// `barrier`.
    #[allow(clippy::too_many_arguments)]
    fn if_then_else(
        &mut self,
        cond: TermId,
        then: TermId,
        otherwise: Option<TermId>,
        module: Sym,
        barrier: FailCont,
        next: SuccessCont,
        f: FailCont,
    ) -> Transition {
        let cond_f = match otherwise {
            Some(goal) => {
                let cp = self.heap.branch();
                self.metrics.record_choice_point();
                Choice::push(
                    Alternative::Goal {
                        goal,
                        module,
                        barrier: barrier.clone(),
                        scont: next.clone(),
                    },
                    cp,
                    f.clone(),
                )
            }
            None => f.clone(),
        };
        let commit = Kont::push(
            Frame::IfThen {
                then,
                module,
                barrier,
                commit_to: f,
            },
            next,
        );
        Transition::Proceed(Kont::call(cond, module, cond_f.clone(), commit), cond_f)
    }

    /// Clauses for `module:name/arity`, falling back to the default module.
    fn find_clauses(
        &self,
        module: Sym,
        name: Sym,
        arity: usize,
    ) -> Option<(Sym, Rc<[Clause]>)> {
        if let Some(clauses) = self.source.lookup(module, name, arity) {
            return Some((module, clauses));
        }
        if module != self.default_module {
            let clauses = self.source.lookup(self.default_module, name, arity)?;
            return Some((self.default_module, clauses));
        }
        None
    }

    /// Try the clauses of `clauses` from index `start` against `goal`.
    ///
    /// A choice point is only left when a later clause could still match,
    /// so the last candidate runs deterministically.
    fn resume_clauses(
        &mut self,
        goal: TermId,
        module: Sym,
        clauses: Rc<[Clause]>,
        start: usize,
        scont: SuccessCont,
        prev: FailCont,
    ) -> Result<Transition, PrologError> {
        let Some(mut index) = self.next_candidate(goal, &clauses, start) else {
            return Ok(Transition::Backtrack(prev));
        };
        loop {
            let following = self.next_candidate(goal, &clauses, index + 1);
            let cp = self.heap.branch();
            let clause = clauses[index];
            let mut slots: SmallVec<[Option<TermId>; 8]> = smallvec![None; clause.slots as usize];
            let head = instantiate(clause.head, &mut slots, self.heap, self.terms);

            if self.unify(goal, head) {
                #[cfg(feature = "tracing")]
                trace!(clause = index, more = following.is_some(), "clause_selected");
                let fcont = match following {
                    Some(next) => {
                        self.metrics.record_choice_point();
                        Choice::push(
                            Alternative::Clauses {
                                goal,
                                module,
                                clauses: Rc::clone(&clauses),
                                next,
                                scont: scont.clone(),
                            },
                            cp,
                            prev.clone(),
                        )
                    }
                    None => prev.clone(),
                };
                let body = instantiate(clause.body, &mut slots, self.heap, self.terms);
                let k = if body == self.terms.atom(self.atoms.true_) {
                    scont
                } else {
                    Kont::call(body, module, prev, scont)
                };
                let k = self.wake(k, &fcont);
                return Ok(Transition::Proceed(k, fcont));
            }

            self.heap.revert_upto(cp, following.is_none())?;
            match following {
                Some(next) => index = next,
                None => return Ok(Transition::Backtrack(prev)),
            }
        }
    }

    fn next_candidate(&self, goal: TermId, clauses: &[Clause], from: usize) -> Option<usize> {
        (from..clauses.len()).find(|&i| self.may_match(goal, clauses[i].head))
    }

    /// Cheap first-level test: can `head` possibly unify with `goal`?
    fn may_match(&self, goal: TermId, head: TermId) -> bool {
        let (Term::Struct(_, goal_args), Term::Struct(_, head_args)) =
            (self.terms.get(goal), self.terms.get(head))
        else {
            return true;
        };
        goal_args.iter().zip(head_args.iter()).all(|(&g, &h)| {
            let g = self.deref(g);
            if g == h {
                return true;
            }
            match (self.terms.get(g), self.terms.get(h)) {
                (Term::Var(_) | Term::AttVar(_), _) | (_, Term::Slot(_)) => true,
                (Term::Struct(fa, xs), Term::Struct(fb, ys)) => fa == fb && xs.len() == ys.len(),
                (Term::Float(x), Term::Float(y)) => x.get() == y.get(),
                _ => false,
            }
        })
    }

    /// Prepend `attr_unify_hook` calls for every attributed variable bound
    /// since the last wakeup. Keys without a hook predicate stay passive.
    pub(crate) fn wake(&mut self, next: SuccessCont, f: &FailCont) -> SuccessCont {
        if !self.heap.has_wakeups() {
            return next;
        }
        let mut hooks = Vec::new();
        for wakeup in self.heap.take_wakeups() {
            for (key, value) in self.heap.attrs(wakeup.var) {
                if self
                    .source
                    .lookup(key, self.atoms.attr_unify_hook, 2)
                    .is_none()
                {
                    continue;
                }
                let hook = self
                    .terms
                    .app2(self.atoms.attr_unify_hook, value, wakeup.value);
                hooks.push((key, hook));
            }
        }
        hooks
            .into_iter()
            .rev()
            .fold(next, |k, (key, hook)| Kont::call(hook, key, f.clone(), k))
    }
}

/// Check that no number stands in goal position of the control structure
/// `body` (through `,`, `;` and `->`). Variables are allowed; they are
/// checked when called. With a heap, bound variables are followed.
///
/// The error names the whole of `body`, not the number inside it.
pub fn check_body(
    body: TermId,
    terms: &TermStore,
    atoms: &Atoms,
    heap: Option<&Heap>,
) -> Result<(), IsoError> {
    let deref = |t: TermId| match heap {
        Some(heap) => heap.deref(terms, t),
        None => t,
    };
    let body = deref(body);
    let mut stack: SmallVec<[TermId; 8]> = smallvec![body];
    while let Some(goal) = stack.pop() {
        let goal = deref(goal);
        match terms.get(goal) {
            Term::Int(_) | Term::Float(_) => return Err(IsoError::type_error("callable", body)),
            Term::Struct(name, args)
                if args.len() == 2
                    && (name == atoms.comma || name == atoms.semicolon || name == atoms.arrow) =>
            {
                stack.push(args[1]);
                stack.push(args[0]);
            }
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/control.rs"]
mod tests;
