use crate::value::Value;

/// How a suspended body is re-entered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResumeMode {
    /// Continue normally; the value becomes the result of the suspension
    /// point the body paused at.
    Next,
    /// Unwind: the body observes an early return (its cleanup constructs
    /// still run) and should complete with the given value.
    Return,
    /// Raise: the value is thrown at the suspension point so the body's own
    /// exception handling observes it.
    Throw,
}

impl ResumeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ResumeMode::Next => "next",
            ResumeMode::Return => "return",
            ResumeMode::Throw => "throw",
        }
    }
}

/// The single result of one body invocation: the body runs until it produces
/// exactly one of these.
#[derive(Clone, Debug)]
pub enum Outcome {
    /// The body paused at a yield; the value is observable by the caller.
    Yielded(Value),
    /// The body paused at an internal await; the value must settle before the
    /// same logical step continues. Not observable by the caller.
    Awaited(Value),
    /// The body finished normally with a final value.
    Returned(Value),
    /// The body raised an error it did not handle.
    Threw(Value),
}

/// An opaque resumable computation. How the body remembers where it was —
/// a compiled step function keyed by a program-counter tag, a hand-written
/// state machine, anything else — is invisible to the coordinator.
pub trait GeneratorBody {
    fn resume(&mut self, mode: ResumeMode, value: Value) -> Outcome;
}

impl<F> GeneratorBody for F
where
    F: FnMut(ResumeMode, Value) -> Outcome,
{
    fn resume(&mut self, mode: ResumeMode, value: Value) -> Outcome {
        self(mode, value)
    }
}
