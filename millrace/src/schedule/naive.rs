//! The synchronous, recursive scheduler.

use crate::error::FlowError;
use crate::port::Port;
use crate::schedule::{run_actor, settle, Deliver, Scheduler};
use crate::value::Value;

/// Scheduler that fires actors the moment a delivery makes them eligible.
///
/// Firings recurse: an actor's emissions are delivered (and may fire
/// downstream actors) before its own `put_value` returns. The recursion
/// depth therefore equals the dataflow depth, which rules this scheduler
/// out for long chains and loops with many iterations.
#[derive(Clone, Copy, Debug, Default)]
pub struct NaiveScheduler;

impl NaiveScheduler {
    /// A new naive scheduler.
    pub fn new() -> NaiveScheduler {
        NaiveScheduler
    }
}

impl Deliver for NaiveScheduler {
    fn deliver(&mut self, port: &Port, value: Value) -> Result<(), FlowError> {
        self.put_value(port, value)
    }
}

impl Scheduler for NaiveScheduler {
    fn put_value(&mut self, port: &Port, value: Value) -> Result<(), FlowError> {
        if let Some(actor) = settle(self, port, value)? {
            run_actor(self, &actor)?;
        }
        Ok(())
    }

    fn execute(&mut self) -> Result<(), FlowError> {
        // Everything already ran inside put_value.
        Ok(())
    }

    fn copy(&self) -> Box<dyn Scheduler> {
        Box::new(NaiveScheduler)
    }
}
