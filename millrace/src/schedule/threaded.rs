//! The worker-pool scheduler.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use log::trace;

use crate::error::FlowError;
use crate::port::Port;
use crate::schedule::{run_actor, settle, Deliver, Scheduler};
use crate::value::Value;

struct PoolState {
    queue: VecDeque<(Port, Value)>,
    /// Ids of actors currently between claim and completion.
    running: HashSet<usize>,
    finished: bool,
    failure: Option<FlowError>,
}

struct Shared {
    state: Mutex<PoolState>,
    work_ready: Condvar,
}

/// Scheduler that fires actors on a pool of worker threads.
///
/// A single mutex guards the delivery queue and the set of running actors.
/// Workers claim the first queued delivery whose owning actor is not
/// already running, which keeps firings of any one actor mutually
/// exclusive while independent actors fire in parallel. Deliveries whose
/// actor is busy are skipped for that scan only and picked up by a later
/// one. Workers block on a condition variable signalled by every
/// `put_value` and every completed firing; `execute` returns once the
/// queue is empty, no actor is running, and all workers have been joined.
///
/// The first failing firing is surfaced from `execute`; the remaining
/// workers stop after their current firing (in-flight work is never
/// interrupted).
pub struct ThreadedScheduler {
    max_threads: usize,
    shared: Arc<Shared>,
}

impl ThreadedScheduler {
    /// A scheduler with `max_threads` workers.
    pub fn new(max_threads: usize) -> ThreadedScheduler {
        ThreadedScheduler {
            max_threads: max_threads.max(1),
            shared: Arc::new(Shared {
                state: Mutex::new(PoolState {
                    queue: VecDeque::new(),
                    running: HashSet::new(),
                    finished: false,
                    failure: None,
                }),
                work_ready: Condvar::new(),
            }),
        }
    }

    /// The configured worker count.
    pub fn max_threads(&self) -> usize {
        self.max_threads
    }
}

impl Default for ThreadedScheduler {
    fn default() -> ThreadedScheduler {
        ThreadedScheduler::new(2)
    }
}

impl Scheduler for ThreadedScheduler {
    fn put_value(&mut self, port: &Port, value: Value) -> Result<(), FlowError> {
        push_delivery(&self.shared, port, value);
        Ok(())
    }

    fn execute(&mut self) -> Result<(), FlowError> {
        {
            let mut state = self.shared.state.lock().expect("scheduler state poisoned");
            state.finished = false;
            state.failure = None;
        }
        let workers: Vec<_> = (0..self.max_threads)
            .map(|index| {
                let shared = Arc::clone(&self.shared);
                thread::Builder::new()
                    .name(format!("millrace-worker-{}", index))
                    .spawn(move || worker_loop(index, &shared))
                    .expect("failed to spawn worker thread")
            })
            .collect();
        for worker in workers {
            let _ = worker.join();
        }
        let mut state = self.shared.state.lock().expect("scheduler state poisoned");
        match state.failure.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn copy(&self) -> Box<dyn Scheduler> {
        Box::new(ThreadedScheduler::new(self.max_threads))
    }
}

fn push_delivery(shared: &Shared, port: &Port, value: Value) {
    let mut state = shared.state.lock().expect("scheduler state poisoned");
    state.queue.push_back((port.clone(), value));
    shared.work_ready.notify_one();
}

/// A worker's view of the pool, used as the fan-out sink while it runs an
/// actor.
struct WorkerSink<'a> {
    shared: &'a Shared,
}

impl Deliver for WorkerSink<'_> {
    fn deliver(&mut self, port: &Port, value: Value) -> Result<(), FlowError> {
        push_delivery(self.shared, port, value);
        Ok(())
    }
}

fn worker_loop(index: usize, shared: &Shared) {
    trace!("worker {} up", index);
    loop {
        let claimed = {
            let mut state = shared.state.lock().expect("scheduler state poisoned");
            loop {
                if state.finished {
                    trace!("worker {} down", index);
                    return;
                }
                let eligible = state.queue.iter().position(|(port, _)| {
                    port.owner_id().map_or(true, |id| !state.running.contains(&id))
                });
                if let Some(position) = eligible {
                    let (port, value) = state
                        .queue
                        .remove(position)
                        .expect("position found by scan");
                    if let Some(id) = port.owner_id() {
                        state.running.insert(id);
                    }
                    break (port, value);
                }
                if state.queue.is_empty() && state.running.is_empty() {
                    state.finished = true;
                    shared.work_ready.notify_all();
                    trace!("worker {} down", index);
                    return;
                }
                state = shared
                    .work_ready
                    .wait(state)
                    .expect("scheduler state poisoned");
            }
        };

        let (port, value) = claimed;
        let owner = port.owner_id();
        let mut sink = WorkerSink { shared };
        let outcome = match settle(&mut sink, &port, value) {
            Ok(Some(actor)) => run_actor(&mut sink, &actor),
            Ok(None) => Ok(()),
            Err(error) => Err(error),
        };

        let mut state = shared.state.lock().expect("scheduler state poisoned");
        if let Some(id) = owner {
            state.running.remove(&id);
        }
        if let Err(error) = outcome {
            if state.failure.is_none() {
                state.failure = Some(error);
            }
            state.finished = true;
        }
        if state.queue.is_empty() && state.running.is_empty() {
            state.finished = true;
        }
        shared.work_ready.notify_all();
    }
}
