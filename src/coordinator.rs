//! The coordination loop for one async generator instance.
//!
//! A generator owns its request queue and state machine; everything that
//! happens to it funnels through [`AsyncGenerator::enqueue`] (caller
//! requests) or the await-bridge continuations registered here (body
//! suspensions). The body itself is invoked with a resume mode and value and
//! reports back one [`Outcome`] per invocation; this module decides when the
//! body runs and which queued request each outcome settles.
//!
//! There is no lock: `Phase::Executing` acting as a state flag is the mutual
//! exclusion, and every path that sets it performs the body invocation within
//! the same synchronous call. All types here are single-threaded
//! (`Rc<RefCell<_>>`).

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::body::{GeneratorBody, Outcome, ResumeMode};
use crate::error::CoordinatorError;
use crate::event_loop::EventLoop;
use crate::promise::{self, Promise, PromiseRef};
use crate::value::{IterResult, Value, generate_unique_id};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// The body has never been invoked.
    SuspendedStart,
    /// A body invocation is on the stack, or the body is parked at an
    /// internal await (see [`SuspendReason`]).
    Executing,
    /// The body is idle at a yield point.
    SuspendedYield,
    /// An early `return` value is itself being awaited; the queue head stays
    /// in place until it settles.
    AwaitingReturn,
    /// Terminal and sticky.
    Completed,
}

/// Why the most recent body invocation returned control. Meaningful only
/// while `phase == Executing`; a yield is transient (classification lands
/// directly in `SuspendedYield`), so the only value observable across a
/// suspension is `Await`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SuspendReason {
    None,
    Yield,
    Await,
}

/// One caller-issued operation awaiting settlement. The settlement handle is
/// written exactly once, and only by the coordinator.
struct Request {
    mode: ResumeMode,
    value: Value,
    settlement: PromiseRef<IterResult>,
}

struct GeneratorInner {
    id: usize,
    phase: Phase,
    suspend_reason: SuspendReason,
    queue: VecDeque<Request>,
    /// Taken out of the option around each invocation so a reentrant caller
    /// can never observe a nested borrow; dropped on completion.
    body: Option<Box<dyn GeneratorBody>>,
}

/// Handle to one async generator instance. Cloning shares the instance.
#[derive(Clone)]
pub struct AsyncGenerator {
    inner: Rc<RefCell<GeneratorInner>>,
}

impl AsyncGenerator {
    pub fn new(body: impl GeneratorBody + 'static) -> AsyncGenerator {
        AsyncGenerator {
            inner: Rc::new(RefCell::new(GeneratorInner {
                id: generate_unique_id(),
                phase: Phase::SuspendedStart,
                suspend_reason: SuspendReason::None,
                queue: VecDeque::new(),
                body: Some(Box::new(body)),
            })),
        }
    }

    pub fn id(&self) -> usize {
        self.inner.borrow().id
    }

    pub fn phase(&self) -> Phase {
        self.inner.borrow().phase
    }

    pub fn queued_requests(&self) -> usize {
        self.inner.borrow().queue.len()
    }

    pub fn ptr_eq(&self, other: &AsyncGenerator) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Queue one request and, unless a body invocation is in flight or a
    /// pending await/return is being waited on, drive the coordination loop.
    /// The returned settlement handle is caller-visible immediately; its
    /// outcome is only ever observable through the event loop.
    pub fn enqueue(&self, el: &Rc<EventLoop>, mode: ResumeMode, value: Value) -> PromiseRef<IterResult> {
        let settlement = Promise::new_ref();
        let should_resume = {
            let mut inner = self.inner.borrow_mut();
            log::debug!(
                "generator id={}: enqueue {} (phase {:?}, queue_len {})",
                inner.id,
                mode.as_str(),
                inner.phase,
                inner.queue.len()
            );
            inner.queue.push_back(Request {
                mode,
                value,
                settlement: settlement.clone(),
            });
            let awaiting = inner.phase == Phase::Executing && inner.suspend_reason == SuspendReason::Await;
            !awaiting && inner.phase != Phase::AwaitingReturn
        };
        if should_resume {
            resume_next(el, self);
        }
        settlement
    }

    pub fn next(&self, el: &Rc<EventLoop>, value: Value) -> PromiseRef<IterResult> {
        self.enqueue(el, ResumeMode::Next, value)
    }

    pub fn return_(&self, el: &Rc<EventLoop>, value: Value) -> PromiseRef<IterResult> {
        self.enqueue(el, ResumeMode::Return, value)
    }

    pub fn throw(&self, el: &Rc<EventLoop>, error: Value) -> PromiseRef<IterResult> {
        self.enqueue(el, ResumeMode::Throw, error)
    }
}

impl std::fmt::Debug for AsyncGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.inner.try_borrow() {
            Ok(inner) => write!(
                f,
                "AsyncGenerator(id={}, phase={:?}, queued={})",
                inner.id,
                inner.phase,
                inner.queue.len()
            ),
            Err(_) => write!(f, "AsyncGenerator(<borrowed>)"),
        }
    }
}

/// What the loop decided to do with the current queue head.
enum Step {
    /// Nothing to do: queue empty, body in flight, or await pending.
    Idle,
    /// The body must run with the head's mode and value.
    Invoke { mode: ResumeMode, value: Value },
    /// Fast path: `return` against a not-yet-started or completed generator.
    /// The head stays queued until the value has been awaited.
    AwaitReturn { value: Value },
    /// Fast path: `throw` against a not-yet-started or completed generator.
    RejectThrow { request: Request },
    /// Fast path: `next` against a completed generator.
    FulfillDone { request: Request },
}

fn plan_step(generator: &AsyncGenerator) -> Step {
    let mut inner = generator.inner.borrow_mut();
    if matches!(inner.phase, Phase::Executing | Phase::AwaitingReturn) {
        return Step::Idle;
    }
    if inner.queue.is_empty() {
        return Step::Idle;
    }
    let head_mode = inner.queue[0].mode;
    match (head_mode, inner.phase) {
        (ResumeMode::Return, Phase::SuspendedStart | Phase::Completed) => {
            inner.phase = Phase::AwaitingReturn;
            let value = inner.queue[0].value.clone();
            Step::AwaitReturn { value }
        }
        (ResumeMode::Throw, Phase::SuspendedStart | Phase::Completed) => {
            inner.phase = Phase::Completed;
            inner.body = None;
            match inner.queue.pop_front() {
                Some(request) => Step::RejectThrow { request },
                None => Step::Idle,
            }
        }
        (ResumeMode::Next, Phase::Completed) => match inner.queue.pop_front() {
            Some(request) => Step::FulfillDone { request },
            None => Step::Idle,
        },
        // SuspendedStart + Next, or any request against SuspendedYield: the
        // body runs. The head stays queued; a yield/return/throw outcome
        // settles it, an await leaves it untouched.
        _ => Step::Invoke {
            mode: head_mode,
            value: inner.queue[0].value.clone(),
        },
    }
}

/// The loop driver. An explicit loop rather than recursion so that many
/// queued requests settling back-to-back cannot grow the stack.
fn resume_next(el: &Rc<EventLoop>, generator: &AsyncGenerator) {
    loop {
        match plan_step(generator) {
            Step::Idle => break,
            Step::Invoke { mode, value } => {
                if !invoke_body(el, generator, mode, value) {
                    // Parked at an internal await; the bridge calls back.
                    break;
                }
            }
            Step::AwaitReturn { value } => {
                await_return(el, generator, value);
                break;
            }
            Step::RejectThrow { request } => {
                promise::reject(el, &request.settlement, request.value);
            }
            Step::FulfillDone { request } => {
                promise::fulfill(el, &request.settlement, IterResult::done(Value::Undefined));
            }
        }
    }
}

/// Run the body once and classify the outcome. Returns `true` when the
/// coordination loop should keep going, `false` when the body is parked at an
/// internal await.
fn invoke_body(el: &Rc<EventLoop>, generator: &AsyncGenerator, mode: ResumeMode, value: Value) -> bool {
    let body = {
        let mut inner = generator.inner.borrow_mut();
        inner.phase = Phase::Executing;
        inner.suspend_reason = SuspendReason::None;
        inner.body.take()
    };
    let Some(mut body) = body else {
        // Unreachable through the public surface (a completed generator never
        // reaches Invoke), but a stale continuation must not panic.
        let request = {
            let mut inner = generator.inner.borrow_mut();
            inner.phase = Phase::Completed;
            inner.queue.pop_front()
        };
        if let Some(request) = request {
            promise::reject(el, &request.settlement, Value::from(CoordinatorError::BodyMissing));
        }
        return true;
    };
    log::debug!("generator id={}: resuming body with {}", generator.inner.borrow().id, mode.as_str());
    let outcome = body.resume(mode, value);
    classify_outcome(el, generator, body, outcome)
}

fn classify_outcome(el: &Rc<EventLoop>, generator: &AsyncGenerator, body: Box<dyn GeneratorBody>, outcome: Outcome) -> bool {
    match outcome {
        Outcome::Threw(error) => {
            log::debug!("generator id={}: body threw", generator.inner.borrow().id);
            let request = {
                let mut inner = generator.inner.borrow_mut();
                inner.phase = Phase::Completed;
                inner.queue.pop_front()
            };
            // Completion releases the body binding; `body` drops here.
            if let Some(request) = request {
                promise::reject(el, &request.settlement, error);
            }
            true
        }
        Outcome::Returned(value) => {
            log::debug!("generator id={}: body returned", generator.inner.borrow().id);
            let request = {
                let mut inner = generator.inner.borrow_mut();
                inner.phase = Phase::Completed;
                inner.queue.pop_front()
            };
            if let Some(request) = request {
                promise::fulfill(el, &request.settlement, IterResult::done(value));
            }
            true
        }
        Outcome::Awaited(value) => {
            log::debug!("generator id={}: body awaiting", generator.inner.borrow().id);
            {
                let mut inner = generator.inner.borrow_mut();
                inner.suspend_reason = SuspendReason::Await;
                inner.body = Some(body);
            }
            await_then_and_resume(el, generator, value);
            false
        }
        Outcome::Yielded(value) => {
            log::debug!("generator id={}: body yielded", generator.inner.borrow().id);
            let request = {
                let mut inner = generator.inner.borrow_mut();
                // The yield reason is transient: classification settles the
                // head in the same synchronous call and lands directly in
                // SuspendedYield.
                inner.phase = Phase::SuspendedYield;
                inner.suspend_reason = SuspendReason::None;
                inner.body = Some(body);
                inner.queue.pop_front()
            };
            if let Some(request) = request {
                promise::fulfill(el, &request.settlement, IterResult::next(value));
            }
            true
        }
    }
}

/// The await bridge: park the body on `value` and resume it once the value
/// settles — with `Next` and the fulfillment on success, with `Throw` and the
/// reason on rejection, so the body's own exception handling observes the
/// failure. This is the only path out of `Executing`/`Await`, which keeps the
/// number of outstanding awaits per generator at one.
fn await_then_and_resume(el: &Rc<EventLoop>, generator: &AsyncGenerator, value: Value) {
    let awaitable = promise::resolve_value(el, value);
    let generator = generator.clone();
    promise::then(
        el,
        &awaitable,
        Box::new(move |el, outcome| {
            let (mode, value) = match outcome {
                Ok(value) => (ResumeMode::Next, value),
                Err(reason) => (ResumeMode::Throw, reason),
            };
            {
                let inner = generator.inner.borrow();
                debug_assert_eq!(inner.phase, Phase::Executing);
                debug_assert_eq!(inner.suspend_reason, SuspendReason::Await);
            }
            if invoke_body(el, &generator, mode, value) {
                resume_next(el, &generator);
            }
        }),
    );
}

/// Fast-path `return` against an idle generator: the return value is awaited
/// first so a thenable is honored, then the head settles `{value, done}` (or
/// rejects) and the loop continues with whatever queued up meanwhile.
fn await_return(el: &Rc<EventLoop>, generator: &AsyncGenerator, value: Value) {
    let awaitable = promise::resolve_value(el, value);
    let generator = generator.clone();
    promise::then(
        el,
        &awaitable,
        Box::new(move |el, outcome| {
            let request = {
                let mut inner = generator.inner.borrow_mut();
                debug_assert_eq!(inner.phase, Phase::AwaitingReturn);
                inner.phase = Phase::Completed;
                inner.body = None;
                inner.queue.pop_front()
            };
            if let Some(request) = request {
                match outcome {
                    Ok(value) => promise::fulfill(el, &request.settlement, IterResult::done(value)),
                    Err(reason) => promise::reject(el, &request.settlement, reason),
                }
            }
            resume_next(el, &generator);
        }),
    );
}

/// Dynamically-typed `next`: validates the handle and rejects with a type
/// error instead of panicking when it is not an async generator.
pub fn generator_next(el: &Rc<EventLoop>, target: &Value, value: Value) -> PromiseRef<IterResult> {
    dispatch(el, target, ResumeMode::Next, value)
}

/// Dynamically-typed `return`; see [`generator_next`].
pub fn generator_return(el: &Rc<EventLoop>, target: &Value, value: Value) -> PromiseRef<IterResult> {
    dispatch(el, target, ResumeMode::Return, value)
}

/// Dynamically-typed `throw`; see [`generator_next`].
pub fn generator_throw(el: &Rc<EventLoop>, target: &Value, error: Value) -> PromiseRef<IterResult> {
    dispatch(el, target, ResumeMode::Throw, error)
}

fn dispatch(el: &Rc<EventLoop>, target: &Value, mode: ResumeMode, value: Value) -> PromiseRef<IterResult> {
    match target {
        Value::AsyncGenerator(generator) => generator.enqueue(el, mode, value),
        other => {
            let settlement = Promise::new_ref();
            let err = CoordinatorError::type_error(format!(
                "{} called on a value of type {}, expected an async generator",
                mode.as_str(),
                other.type_name()
            ));
            promise::reject(el, &settlement, Value::from(err));
            settlement
        }
    }
}
