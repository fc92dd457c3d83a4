//! The single-threaded FIFO scheduler, the reference semantics.

use std::collections::VecDeque;

use crate::error::FlowError;
use crate::port::Port;
use crate::schedule::{run_actor, settle, Deliver, Scheduler};
use crate::value::Value;

/// Scheduler that queues every delivery and drains the queue in FIFO order.
///
/// Running an actor appends its fan-out to the tail of the queue, so a
/// single `execute` is fully deterministic: the final port buffers of any
/// acyclic graph of deterministic actors depend only on the order of the
/// initial `put_value` calls. The other schedulers are measured against
/// this one.
#[derive(Debug, Default)]
pub struct LinearizedScheduler {
    execution_queue: VecDeque<(Port, Value)>,
}

impl LinearizedScheduler {
    /// A new scheduler with an empty queue.
    pub fn new() -> LinearizedScheduler {
        LinearizedScheduler { execution_queue: VecDeque::new() }
    }

    /// Number of queued deliveries.
    pub fn pending(&self) -> usize {
        self.execution_queue.len()
    }
}

impl Deliver for LinearizedScheduler {
    fn deliver(&mut self, port: &Port, value: Value) -> Result<(), FlowError> {
        self.execution_queue.push_back((port.clone(), value));
        Ok(())
    }
}

impl Scheduler for LinearizedScheduler {
    fn put_value(&mut self, port: &Port, value: Value) -> Result<(), FlowError> {
        self.execution_queue.push_back((port.clone(), value));
        Ok(())
    }

    fn execute(&mut self) -> Result<(), FlowError> {
        while let Some((port, value)) = self.execution_queue.pop_front() {
            if let Some(actor) = settle(self, &port, value)? {
                run_actor(self, &actor)?;
            }
        }
        Ok(())
    }

    fn copy(&self) -> Box<dyn Scheduler> {
        Box::new(LinearizedScheduler::new())
    }
}
