//! Single-threaded job queue with microtask ordering.
//!
//! Jobs run strictly in enqueue order, and always after the synchronous
//! execution that scheduled them has unwound. A running job may enqueue
//! further jobs; those run after every job enqueued before them.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::value::Value;

pub type Job = Box<dyn FnOnce(&Rc<EventLoop>)>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollResult {
    /// One job was executed.
    Ran,
    /// The queue was empty.
    Idle,
}

pub struct EventLoop {
    jobs: RefCell<VecDeque<Job>>,
    /// Rejected promises nobody has attached a reaction to yet: (id, reason).
    pending_unhandled: RefCell<Vec<(usize, Value)>>,
}

impl EventLoop {
    pub fn new() -> Rc<EventLoop> {
        Rc::new(EventLoop {
            jobs: RefCell::new(VecDeque::new()),
            pending_unhandled: RefCell::new(Vec::new()),
        })
    }

    pub fn enqueue_job(&self, job: Job) {
        let mut jobs = self.jobs.borrow_mut();
        jobs.push_back(job);
        log::debug!("enqueue_job: queue_len after push = {}", jobs.len());
    }

    pub fn job_count(&self) -> usize {
        self.jobs.borrow().len()
    }

    /// Run at most one queued job.
    pub fn poll(self: &Rc<EventLoop>) -> PollResult {
        let job = self.jobs.borrow_mut().pop_front();
        match job {
            Some(job) => {
                log::trace!("poll: executing job, {} remaining", self.job_count());
                job(self);
                PollResult::Ran
            }
            None => PollResult::Idle,
        }
    }

    /// Drain the queue, including jobs enqueued while draining. Returns the
    /// number of jobs executed.
    pub fn run_jobs(self: &Rc<EventLoop>) -> usize {
        let mut executed = 0;
        while self.poll() == PollResult::Ran {
            executed += 1;
        }
        if executed > 0 {
            log::debug!("run_jobs: executed {} job(s)", executed);
        }
        executed
    }

    pub(crate) fn report_unhandled(&self, id: usize, reason: Value) {
        log::debug!("report_unhandled: promise id={} rejected with no reactions", id);
        self.pending_unhandled.borrow_mut().push((id, reason));
    }

    pub(crate) fn clear_unhandled(&self, id: usize) {
        self.pending_unhandled.borrow_mut().retain(|(pid, _)| *pid != id);
    }

    /// Take the rejections that still have no reaction attached.
    pub fn take_unhandled_rejections(&self) -> Vec<(usize, Value)> {
        std::mem::take(&mut self.pending_unhandled.borrow_mut())
    }
}
