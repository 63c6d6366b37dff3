//! Cooperative scheduler for timed background work.
//!
//! Events are kept sorted by fire time, FIFO among equal times. Nothing runs
//! on its own: [`Scheduler::run_due`] is called from the byte multiplexer
//! while the engine waits for input, so tasks never interleave with a message
//! being processed.

use std::any::type_name;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use alink_diagnostics::{Diagnostics, Fault};
use parking_lot::Mutex;

use crate::error::TaskError;

type Task = Box<dyn FnOnce() -> Result<(), TaskError> + Send>;

struct ScheduledEvent {
    fire_time: Instant,
    name: &'static str,
    task: Task,
}

/// Events ordered by ascending fire time.
#[derive(Default)]
struct EventQueue {
    events: VecDeque<ScheduledEvent>,
}

impl EventQueue {
    fn insert(&mut self, event: ScheduledEvent) {
        let index = self
            .events
            .partition_point(|queued| queued.fire_time <= event.fire_time);
        self.events.insert(index, event);
    }

    fn take_due(&mut self, now: Instant) -> Vec<ScheduledEvent> {
        let due = self.events.partition_point(|queued| queued.fire_time <= now);
        self.events.drain(..due).collect()
    }
}

/// Handle to the shared event queue.
#[derive(Clone)]
pub struct Scheduler {
    queue: Arc<Mutex<EventQueue>>,
    diagnostics: Diagnostics,
}

impl Scheduler {
    pub fn new(diagnostics: Diagnostics) -> Self {
        Scheduler {
            queue: Arc::new(Mutex::new(EventQueue::default())),
            diagnostics,
        }
    }

    /// Run `callback(args)` once `at` has passed.
    pub fn schedule<F, A>(&self, at: Instant, callback: F, args: A)
    where
        F: FnOnce(A) -> Result<(), TaskError> + Send + 'static,
        A: Send + 'static,
    {
        let event = ScheduledEvent {
            fire_time: at,
            name: task_name(type_name::<F>()),
            task: Box::new(move || callback(args)),
        };
        self.queue.lock().insert(event);
    }

    /// Run `callback(args)` after `delay`.
    pub fn schedule_in<F, A>(&self, delay: Duration, callback: F, args: A)
    where
        F: FnOnce(A) -> Result<(), TaskError> + Send + 'static,
        A: Send + 'static,
    {
        self.schedule(Instant::now() + delay, callback, args);
    }

    /// Run every event due at `now`, in fire time order.
    ///
    /// A failing or panicking task is recorded as an exception and the
    /// remaining tasks still run. Events scheduled by a running task are left
    /// for the next call. Returns the number of tasks run.
    pub fn run_due(&self, now: Instant) -> usize {
        let due = self.queue.lock().take_due(now);
        let count = due.len();

        for event in due {
            match panic::catch_unwind(AssertUnwindSafe(event.task)) {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    let fault =
                        Fault::from_error("TaskError", &error, event.name, Some(error.location()));
                    self.diagnostics.log_exception(&fault);
                }
                Err(payload) => {
                    let fault = Fault::from_panic(payload.as_ref(), event.name);
                    self.diagnostics.log_exception(&fault);
                }
            }
        }

        count
    }

    /// Number of queued events.
    pub fn pending(&self) -> usize {
        self.queue.lock().events.len()
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("pending", &self.pending())
            .finish()
    }
}

fn task_name(full: &'static str) -> &'static str {
    full.trim_end_matches("::{{closure}}")
}
