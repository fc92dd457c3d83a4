//! The schedulers that drive a dataflow graph, and the runner logic they
//! share.
//!
//! All schedulers observe the same semantics: a delivery buffers a value on
//! an inport; when the owning actor's firing rule is satisfied the actor
//! fires; each emitted `(outport, value)` pair is validated, buffered, and
//! propagated to every connected inport. The schedulers differ only in
//! *when* and *where* firings happen: recursively ([`NaiveScheduler`]), in
//! deterministic FIFO order ([`LinearizedScheduler`]), on a worker pool
//! ([`ThreadedScheduler`]), or on remote engines ([`ClusterScheduler`],
//! [`MultiClusterScheduler`]).

mod naive;
mod linear;
mod threaded;
mod cluster;

pub use self::naive::NaiveScheduler;
pub use self::linear::LinearizedScheduler;
pub use self::threaded::ThreadedScheduler;
pub use self::cluster::{ClusterScheduler, MultiClusterConfig, MultiClusterScheduler};

use log::debug;

use crate::actor::{ActorRef, RunResult};
use crate::error::FlowError;
use crate::port::Port;
use crate::value::Value;
use crate::workflow::Workflow;

/// The scheduling surface every scheduler exposes.
pub trait Scheduler: Send {
    /// Accepts a value for delivery to `port`.
    ///
    /// Depending on the scheduler this may fire actors immediately (and so
    /// return their failures) or merely enqueue the delivery.
    fn put_value(&mut self, port: &Port, value: Value) -> Result<(), FlowError>;

    /// Drains the graph: delivers queued values and fires actors until no
    /// work remains.
    fn execute(&mut self) -> Result<(), FlowError>;

    /// A fresh scheduler of the same kind and configuration, with an empty
    /// queue.
    fn copy(&self) -> Box<dyn Scheduler>;

    /// Runs `workflow` to completion with the given boundary inputs.
    ///
    /// Input keys are validated against the workflow's boundary inports
    /// before anything is delivered. A workflow that owns a scheduler is
    /// run by that scheduler; otherwise this one drives it.
    fn run_workflow(
        &mut self,
        workflow: &Workflow,
        inputs: Vec<(String, Value)>,
    ) -> Result<(), FlowError> {
        let mut deliveries = Vec::with_capacity(inputs.len());
        for (name, value) in inputs {
            let port = workflow.inport(&name).ok_or_else(|| FlowError::UnknownInport {
                actor: workflow.name().to_owned(),
                port: name.clone(),
            })?;
            deliveries.push((port, value));
        }
        let mut owned = workflow.owned_scheduler();
        if let Some(scheduler) = owned.as_mut() {
            for (port, value) in deliveries {
                scheduler.put_value(&port, value)?;
            }
            scheduler.execute()
        } else {
            drop(owned);
            for (port, value) in deliveries {
                self.put_value(&port, value)?;
            }
            self.execute()
        }
    }
}

/// Where the runner sends the deliveries a firing fans out.
///
/// Each scheduler supplies its own sink: the naive scheduler recurses, the
/// queue-based schedulers append, the threaded workers push into the shared
/// queue.
pub(crate) trait Deliver {
    fn deliver(&mut self, port: &Port, value: Value) -> Result<(), FlowError>;
}

/// Delivers `value` to `port` and reports the actor that became ready.
///
/// Boundary proxies are expanded here: their value is forwarded through the
/// sink (re-entering the scheduler's queue) or, with nothing to forward to,
/// left buffered for external callers. For actor inports the value is
/// buffered and the owner returned if its firing rule is now satisfied.
pub(crate) fn settle<D: Deliver + ?Sized>(
    sink: &mut D,
    port: &Port,
    value: Value,
) -> Result<Option<ActorRef>, FlowError> {
    if port.is_boundary() {
        let targets = port.forward_targets();
        if targets.is_empty() {
            port.put(value);
        } else {
            for target in &targets {
                sink.deliver(target, value.clone())?;
            }
        }
        return Ok(None);
    }
    let should_run = port.put(value);
    if should_run {
        Ok(port.owner_actor())
    } else {
        Ok(None)
    }
}

/// Dispatches one firing of `actor` and fans its result out through `sink`.
pub(crate) fn run_actor<D: Deliver + ?Sized>(
    sink: &mut D,
    actor: &ActorRef,
) -> Result<(), FlowError> {
    debug!("firing actor {}", actor.name());
    let outcome = {
        let mut guard = actor.lock();
        if !guard.can_run() {
            return Err(FlowError::FiringRuleViolation {
                actor: actor.name().to_owned(),
            });
        }
        let args = guard.get_run_args()?;
        if actor.is_system() {
            guard.run_local(args)
        } else {
            let task = guard.task();
            drop(guard);
            task(args)
        }
    };
    let result = outcome.map_err(|source| FlowError::ActorFailed {
        actor: actor.name().to_owned(),
        source,
    })?;
    dispatch_result(sink, actor, result)
}

/// Validates and fans out the emissions of one firing.
pub(crate) fn dispatch_result<D: Deliver + ?Sized>(
    sink: &mut D,
    actor: &ActorRef,
    result: RunResult,
) -> Result<(), FlowError> {
    match result {
        RunResult::Empty => Ok(()),
        RunResult::Emit(pairs) => {
            for (name, value) in pairs {
                emit(sink, actor, &name, value)?;
            }
            Ok(())
        }
        RunResult::Stream(iter) => {
            for (name, value) in iter {
                emit(sink, actor, &name, value)?;
            }
            Ok(())
        }
    }
}

fn emit<D: Deliver + ?Sized>(
    sink: &mut D,
    actor: &ActorRef,
    name: &str,
    value: Value,
) -> Result<(), FlowError> {
    let outport = actor.outport(name).ok_or_else(|| FlowError::UnknownOutport {
        actor: actor.name().to_owned(),
        port: name.to_owned(),
    })?;
    outport.put(value);
    propagate(sink, &outport)
}

/// Drains the outport's freshly emitted value along its connections.
///
/// The value is popped exactly once and a clone delivered to every peer;
/// an unconnected outport keeps the value buffered for external readers.
pub(crate) fn propagate<D: Deliver + ?Sized>(
    sink: &mut D,
    outport: &Port,
) -> Result<(), FlowError> {
    let peers = outport.connections();
    if peers.is_empty() {
        return Ok(());
    }
    let value = outport.pop()?;
    for peer in &peers {
        sink.deliver(peer, value.clone())?;
    }
    Ok(())
}
