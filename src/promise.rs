//! Single-threaded, write-once promises with microtask-queue ordering.
//!
//! A `Promise<T>` is the externally-visible half of a settlement: it starts
//! `Pending`, is fulfilled with a `T` or rejected with a [`Value`] exactly
//! once, and delivers both outcomes to reactions registered with [`then`].
//! Reactions never run synchronously; they are enqueued on the
//! [`EventLoop`] and fire after the current synchronous execution unwinds,
//! in registration order.
//!
//! Two payload types are used by the coordinator: `T = Value` for awaitables
//! (the await bridge and thenable return values) and `T = IterResult` for
//! request settlements.

use std::cell::RefCell;
use std::rc::Rc;

use crate::event_loop::EventLoop;
use crate::value::{Value, generate_unique_id};

pub type PromiseRef<T> = Rc<RefCell<Promise<T>>>;

/// A reaction receives the settled outcome: `Ok(payload)` on fulfillment,
/// `Err(reason)` on rejection.
pub type ReactionFn<T> = Box<dyn FnOnce(&Rc<EventLoop>, Result<T, Value>)>;

#[derive(Clone, Debug, PartialEq)]
pub enum PromiseState<T> {
    Pending,
    Fulfilled(T),
    Rejected(Value),
}

pub struct Promise<T> {
    id: usize,
    state: PromiseState<T>,
    reactions: Vec<ReactionFn<T>>,
    /// Set while this promise tracks another promise's eventual state.
    /// External settlement attempts are ignored until adoption finishes.
    adopting: bool,
    /// Whether any reaction has ever been attached. Used for
    /// unhandled-rejection bookkeeping.
    handled: bool,
}

impl<T> Promise<T> {
    pub fn new_ref() -> PromiseRef<T> {
        Rc::new(RefCell::new(Promise {
            id: generate_unique_id(),
            state: PromiseState::Pending,
            reactions: Vec::new(),
            adopting: false,
            handled: false,
        }))
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn state(&self) -> &PromiseState<T> {
        &self.state
    }

    pub fn state_name(&self) -> &'static str {
        match self.state {
            PromiseState::Pending => "pending",
            PromiseState::Fulfilled(_) => "fulfilled",
            PromiseState::Rejected(_) => "rejected",
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, PromiseState::Pending)
    }
}

impl<T: Clone> Promise<T> {
    /// The settled outcome, if any. Intended for callers that have drained
    /// the event loop and want to inspect the result directly.
    pub fn result(&self) -> Option<Result<T, Value>> {
        match &self.state {
            PromiseState::Pending => None,
            PromiseState::Fulfilled(value) => Some(Ok(value.clone())),
            PromiseState::Rejected(reason) => Some(Err(reason.clone())),
        }
    }
}

impl<T> std::fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Promise(id={}, {}, reactions={})",
            self.id,
            self.state_name(),
            self.reactions.len()
        )
    }
}

/// Fulfill `promise` with `value`. Ignored if the promise is already settled
/// or mid-adoption.
pub fn fulfill<T: Clone + 'static>(el: &Rc<EventLoop>, promise: &PromiseRef<T>, value: T) {
    settle_with(el, promise, Ok(value), false);
}

/// Reject `promise` with `reason`. Ignored if the promise is already settled
/// or mid-adoption.
pub fn reject<T: Clone + 'static>(el: &Rc<EventLoop>, promise: &PromiseRef<T>, reason: Value) {
    settle_with(el, promise, Err(reason), false);
}

fn settle_with<T: Clone + 'static>(el: &Rc<EventLoop>, promise: &PromiseRef<T>, result: Result<T, Value>, forced: bool) {
    let reactions = {
        let mut p = promise.borrow_mut();
        if !p.is_pending() || (p.adopting && !forced) {
            log::trace!("settle_with: promise id={} already {} , ignoring", p.id, p.state_name());
            return;
        }
        p.state = match &result {
            Ok(value) => PromiseState::Fulfilled(value.clone()),
            Err(reason) => PromiseState::Rejected(reason.clone()),
        };
        log::debug!("settle_with: promise id={} -> {}", p.id, p.state_name());
        let reactions = std::mem::take(&mut p.reactions);
        if let Err(reason) = &result
            && reactions.is_empty()
            && !p.handled
        {
            el.report_unhandled(p.id, reason.clone());
        }
        reactions
    };
    for reaction in reactions {
        let result = result.clone();
        el.enqueue_job(Box::new(move |el| reaction(el, result)));
    }
}

/// Register a reaction. If the promise is already settled the reaction is
/// enqueued as a job immediately; it is never run synchronously.
pub fn then<T: Clone + 'static>(el: &Rc<EventLoop>, promise: &PromiseRef<T>, reaction: ReactionFn<T>) {
    let ready = {
        let mut p = promise.borrow_mut();
        if !p.handled {
            p.handled = true;
            el.clear_unhandled(p.id);
        }
        p.result()
    };
    match ready {
        None => promise.borrow_mut().reactions.push(reaction),
        Some(result) => el.enqueue_job(Box::new(move |el| reaction(el, result))),
    }
}

/// Resolve `promise` with `value`, adopting it when it is itself a promise:
/// the target stays pending until the inner promise settles, then takes over
/// its outcome. Resolving a promise with itself rejects with a type error.
pub fn resolve(el: &Rc<EventLoop>, promise: &PromiseRef<Value>, value: Value) {
    {
        let p = promise.borrow();
        if !p.is_pending() || p.adopting {
            return;
        }
    }
    resolve_unlocked(el, promise, value);
}

fn resolve_unlocked(el: &Rc<EventLoop>, promise: &PromiseRef<Value>, value: Value) {
    if let Value::Promise(inner) = &value {
        if Rc::ptr_eq(inner, promise) {
            let reason = Value::from(crate::error::CoordinatorError::type_error("chaining cycle detected"));
            settle_with(el, promise, Err(reason), true);
            return;
        }
        promise.borrow_mut().adopting = true;
        let target = promise.clone();
        then(
            el,
            inner,
            Box::new(move |el, outcome| {
                target.borrow_mut().adopting = false;
                match outcome {
                    Ok(v) => resolve_unlocked(el, &target, v),
                    Err(reason) => settle_with(el, &target, Err(reason), true),
                }
            }),
        );
        return;
    }
    settle_with(el, promise, Ok(value), true);
}

/// Wrap `value` as an awaitable: a promise passes through unchanged, anything
/// else becomes a fresh, already-fulfilled promise.
pub fn resolve_value(el: &Rc<EventLoop>, value: Value) -> PromiseRef<Value> {
    if let Value::Promise(promise) = value {
        return promise;
    }
    let promise = Promise::new_ref();
    settle_with(el, &promise, Ok(value), true);
    promise
}
