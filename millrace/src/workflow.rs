//! Composite workflows: actors whose body is a sub-graph of actors.

use std::sync::{Mutex, MutexGuard};

use itertools::Itertools;

use crate::actor::ActorRef;
use crate::error::FlowError;
use crate::port::{Direction, Owner, Port, PortGroup};
use crate::schedule::Scheduler;

/// An actor whose body is a sub-graph of actors.
///
/// A workflow's boundary ports are pass-through proxies: a value delivered
/// to a boundary inport is forwarded to every internal inport linked to it,
/// and internal outports linked to a boundary outport deliver back out. A
/// boundary outport with no outside connection buffers what reaches it, so
/// callers can `pop` results after `execute` returns.
///
/// A workflow may carry its own scheduler; `run_workflow` prefers it over
/// the scheduler it was called on. A workflow nested inside a larger graph
/// is driven by whatever scheduler drives that graph.
pub struct Workflow {
    name: String,
    inports: PortGroup,
    outports: PortGroup,
    actors: Vec<ActorRef>,
    scheduler: Mutex<Option<Box<dyn Scheduler>>>,
}

impl Workflow {
    /// An empty workflow named `name`.
    pub fn new(name: &str) -> Workflow {
        Workflow {
            name: name.to_owned(),
            inports: PortGroup::new(Direction::Input),
            outports: PortGroup::new(Direction::Output),
            actors: Vec::new(),
            scheduler: Mutex::new(None),
        }
    }

    /// The workflow's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers an internal actor.
    ///
    /// Actor names must be unique within the workflow.
    pub fn add(&mut self, actor: &ActorRef) -> Result<(), FlowError> {
        if self.actors.iter().any(|a| a.name() == actor.name()) {
            return Err(FlowError::BadConfiguration(format!(
                "actor {:?} is already part of workflow {:?}",
                actor.name(),
                self.name,
            )));
        }
        self.actors.push(actor.clone());
        Ok(())
    }

    /// The registered internal actors, in registration order.
    pub fn actors(&self) -> &[ActorRef] {
        &self.actors
    }

    /// Creates a boundary inport named `name`.
    pub fn expose_inport(&mut self, name: &str) -> Result<Port, FlowError> {
        let port = self.inports.append(name)?;
        port.bind_owner(Owner::Boundary);
        Ok(port)
    }

    /// Creates a boundary outport named `name`.
    pub fn expose_outport(&mut self, name: &str) -> Result<Port, FlowError> {
        let port = self.outports.append(name)?;
        port.bind_owner(Owner::Boundary);
        Ok(port)
    }

    /// Forwards the boundary inport `boundary` to an internal inport.
    pub fn link_in(&self, boundary: &str, internal: &Port) -> Result<(), FlowError> {
        let proxy = self.inports.get(boundary).ok_or_else(|| FlowError::UnknownInport {
            actor: self.name.clone(),
            port: boundary.to_owned(),
        })?;
        if internal.direction() != Direction::Input {
            return Err(FlowError::BadConnection {
                from: boundary.to_owned(),
                to: internal.name().to_owned(),
            });
        }
        proxy.push_forward(internal);
        Ok(())
    }

    /// Routes an internal outport out through the boundary outport `boundary`.
    pub fn link_out(&self, internal: &Port, boundary: &str) -> Result<(), FlowError> {
        let proxy = self.outports.get(boundary).ok_or_else(|| FlowError::UnknownOutport {
            actor: self.name.clone(),
            port: boundary.to_owned(),
        })?;
        if internal.direction() != Direction::Output {
            return Err(FlowError::BadConnection {
                from: internal.name().to_owned(),
                to: boundary.to_owned(),
            });
        }
        internal.push_connection(proxy);
        Ok(())
    }

    /// The boundary inport named `name`.
    pub fn inport(&self, name: &str) -> Option<Port> {
        self.inports.get(name).cloned()
    }

    /// The boundary outport named `name`.
    pub fn outport(&self, name: &str) -> Option<Port> {
        self.outports.get(name).cloned()
    }

    /// The boundary inport group.
    pub fn inports(&self) -> &PortGroup {
        &self.inports
    }

    /// The boundary outport group.
    pub fn outports(&self) -> &PortGroup {
        &self.outports
    }

    /// Gives the workflow its own scheduler, preferred by `run_workflow`.
    pub fn set_scheduler(&self, scheduler: Box<dyn Scheduler>) {
        *self.scheduler.lock().expect("workflow scheduler poisoned") = Some(scheduler);
    }

    pub(crate) fn owned_scheduler(&self) -> MutexGuard<'_, Option<Box<dyn Scheduler>>> {
        self.scheduler.lock().expect("workflow scheduler poisoned")
    }

    /// Builds a linear chain: each stage's outports wired to the next
    /// stage's inports, the first stage's inports and the last stage's
    /// outports exposed on the boundary.
    pub fn chain(name: &str, stages: &[ActorRef]) -> Result<Workflow, FlowError> {
        if stages.is_empty() {
            return Err(FlowError::BadConfiguration(
                "a chain needs at least one stage".into(),
            ));
        }
        chain_actors(stages)?;
        let mut workflow = Workflow::new(name);
        let first = &stages[0];
        let last = stages.last().expect("stages checked non-empty");
        for port in first.inports() {
            workflow.expose_inport(port.name())?;
            workflow.link_in(port.name(), &port)?;
        }
        for port in last.outports() {
            workflow.expose_outport(port.name())?;
            workflow.link_out(&port, port.name())?;
        }
        for stage in stages {
            workflow.add(stage)?;
        }
        Ok(workflow)
    }
}

/// Wires consecutive stages together: single-port stages positionally,
/// multi-port stages by matching outport and inport names.
pub fn chain_actors(stages: &[ActorRef]) -> Result<(), FlowError> {
    for (first, second) in stages.iter().tuple_windows() {
        let outs = first.outports();
        let ins = second.inports();
        if outs.len() == 1 && ins.len() == 1 {
            outs[0].connect(&ins[0])?;
        } else {
            for out in &outs {
                let target = second.inport(out.name()).ok_or_else(|| FlowError::UnknownInport {
                    actor: second.name().to_owned(),
                    port: out.name().to_owned(),
                })?;
                out.connect(&target)?;
            }
        }
    }
    Ok(())
}
