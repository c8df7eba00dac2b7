pub mod body;
pub mod coordinator;
pub mod error;
pub mod event_loop;
pub mod promise;
pub mod value;

pub use body::{GeneratorBody, Outcome, ResumeMode};
pub use coordinator::{AsyncGenerator, Phase, SuspendReason, generator_next, generator_return, generator_throw};
pub use error::CoordinatorError;
pub use event_loop::{EventLoop, Job, PollResult};
pub use promise::{Promise, PromiseRef, PromiseState, ReactionFn};
pub use value::{IterResult, Value};
