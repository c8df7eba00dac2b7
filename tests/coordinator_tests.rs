use async_generator::{AsyncGenerator, EventLoop, IterResult, Outcome, Phase, ResumeMode, Value, generator_next, generator_return, generator_throw};

// Initialize logger for this integration test binary so `RUST_LOG` is honored.
// Using `ctor` ensures initialization runs before tests start.
#[ctor::ctor]
fn __init_test_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default()).is_test(true).try_init();
}

fn settled(p: &async_generator::PromiseRef<IterResult>) -> Result<IterResult, Value> {
    p.borrow().result().expect("settlement should have been written")
}

// A compiled-step-function body: yields "0", yields "1", returns "2";
// handles return/throw requests at any suspension point.
fn three_step_body() -> impl FnMut(ResumeMode, Value) -> Outcome {
    let mut pc = 0;
    move |mode, value| match mode {
        ResumeMode::Return => Outcome::Returned(value),
        ResumeMode::Throw => Outcome::Threw(value),
        ResumeMode::Next => {
            pc += 1;
            match pc {
                1 => Outcome::Yielded(Value::from("0")),
                2 => Outcome::Yielded(Value::from("1")),
                _ => Outcome::Returned(Value::from("2")),
            }
        }
    }
}

#[test]
fn test_single_next_yields_first_value() {
    let el = EventLoop::new();
    let generator = AsyncGenerator::new(three_step_body());

    assert_eq!(generator.phase(), Phase::SuspendedStart);
    let result = generator.next(&el, Value::Undefined);
    el.run_jobs();

    assert_eq!(settled(&result), Ok(IterResult::next(Value::from("0"))));
    assert_eq!(generator.phase(), Phase::SuspendedYield);
}

#[test]
fn test_run_to_completion() {
    let el = EventLoop::new();
    let generator = AsyncGenerator::new(three_step_body());

    let r1 = generator.next(&el, Value::Undefined);
    let r2 = generator.next(&el, Value::Undefined);
    let r3 = generator.next(&el, Value::Undefined);
    el.run_jobs();

    assert_eq!(settled(&r1), Ok(IterResult::next(Value::from("0"))));
    assert_eq!(settled(&r2), Ok(IterResult::next(Value::from("1"))));
    assert_eq!(settled(&r3), Ok(IterResult::done(Value::from("2"))));
    assert_eq!(generator.phase(), Phase::Completed);
}

#[test]
fn test_sent_value_reaches_suspension_point() {
    let el = EventLoop::new();
    // First resume yields; the second resume completes with whatever value the
    // caller sent into the yield.
    let mut started = false;
    let generator = AsyncGenerator::new(move |mode: ResumeMode, value: Value| {
        assert_eq!(mode, ResumeMode::Next);
        if !started {
            started = true;
            Outcome::Yielded(Value::Undefined)
        } else {
            Outcome::Returned(value)
        }
    });

    let r1 = generator.next(&el, Value::Undefined);
    let r2 = generator.next(&el, Value::Number(42.0));
    el.run_jobs();

    assert_eq!(settled(&r1), Ok(IterResult::next(Value::Undefined)));
    assert_eq!(settled(&r2), Ok(IterResult::done(Value::Number(42.0))));
}

#[test]
fn test_body_exception_rejects_current_request() {
    let el = EventLoop::new();
    let generator = AsyncGenerator::new(|_mode: ResumeMode, _value: Value| Outcome::Threw(Value::from("boom")));

    let result = generator.next(&el, Value::Undefined);
    el.run_jobs();

    assert_eq!(settled(&result), Err(Value::from("boom")));
    assert_eq!(generator.phase(), Phase::Completed);
    // The rejection was never observed through a reaction.
    assert_eq!(el.take_unhandled_rejections().len(), 1);
}

#[test]
fn test_settlement_is_not_observable_synchronously() {
    let el = EventLoop::new();
    let generator = AsyncGenerator::new(three_step_body());

    let observed = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    let result = generator.next(&el, Value::Undefined);
    let sink = observed.clone();
    async_generator::promise::then(
        &el,
        &result,
        Box::new(move |_el, outcome| {
            sink.borrow_mut().push(outcome);
        }),
    );

    // The reaction only fires once the job queue is drained.
    assert!(observed.borrow().is_empty());
    el.run_jobs();
    assert_eq!(observed.borrow().len(), 1);
    assert_eq!(observed.borrow()[0], Ok(IterResult::next(Value::from("0"))));
}

#[test]
fn test_dispatch_rejects_non_generator_handle() {
    let el = EventLoop::new();

    let result = generator_next(&el, &Value::Number(1.0), Value::Undefined);
    el.run_jobs();

    match settled(&result) {
        Err(Value::String(message)) => {
            assert!(message.contains("Type error"), "unexpected message: {message}");
            assert!(message.contains("async generator"), "unexpected message: {message}");
        }
        other => panic!("expected a type-error rejection, got {other:?}"),
    }
    // Drop the recorded unhandled rejection so it does not leak into asserts
    // elsewhere.
    let _ = el.take_unhandled_rejections();
}

#[test]
fn test_dispatch_routes_to_wrapped_generator() {
    let el = EventLoop::new();
    let generator = AsyncGenerator::new(three_step_body());
    let handle = Value::AsyncGenerator(generator.clone());

    let r1 = generator_next(&el, &handle, Value::Undefined);
    let r2 = generator_throw(&el, &handle, Value::from("stop"));
    el.run_jobs();

    assert_eq!(settled(&r1), Ok(IterResult::next(Value::from("0"))));
    assert_eq!(settled(&r2), Err(Value::from("stop")));
    assert_eq!(generator.phase(), Phase::Completed);
    let _ = el.take_unhandled_rejections();
}

#[test]
fn test_dispatch_return_finishes_wrapped_generator() {
    let el = EventLoop::new();
    let generator = AsyncGenerator::new(three_step_body());
    let handle = Value::AsyncGenerator(generator.clone());

    let r1 = generator_next(&el, &handle, Value::Undefined);
    let r2 = generator_return(&el, &handle, Value::from("done early"));
    el.run_jobs();

    assert_eq!(settled(&r1), Ok(IterResult::next(Value::from("0"))));
    assert_eq!(settled(&r2), Ok(IterResult::done(Value::from("done early"))));
    assert_eq!(generator.phase(), Phase::Completed);

    // The non-generator rejection path is shared by all three entry points.
    let r3 = generator_return(&el, &Value::Undefined, Value::Undefined);
    el.run_jobs();
    match settled(&r3) {
        Err(Value::String(message)) => {
            assert!(message.contains("return"), "unexpected message: {message}");
        }
        other => panic!("expected a type-error rejection, got {other:?}"),
    }
    let _ = el.take_unhandled_rejections();
}

#[test]
fn test_queue_drains_while_body_never_suspends() {
    let el = EventLoop::new();
    // A body that returns immediately: every request after the first settles
    // through the completed fast path.
    let generator = AsyncGenerator::new(|_mode: ResumeMode, _value: Value| Outcome::Returned(Value::from("end")));

    let r1 = generator.next(&el, Value::Undefined);
    let r2 = generator.next(&el, Value::Undefined);
    let r3 = generator.next(&el, Value::Undefined);
    el.run_jobs();

    assert_eq!(settled(&r1), Ok(IterResult::done(Value::from("end"))));
    assert_eq!(settled(&r2), Ok(IterResult::done(Value::Undefined)));
    assert_eq!(settled(&r3), Ok(IterResult::done(Value::Undefined)));
    assert_eq!(generator.queued_requests(), 0);
}
