//! Flow-control actors: loops, splitters, sinks.

use std::sync::Arc;

use crate::actor::{Actor, ActorRef, FiringRule, Node, RunArgs, RunResult, Task};
use crate::error::{ActorError, FlowError};
use crate::value::Value;

/// The while-loop actor.
///
/// Values arriving on `loop_in` are re-emitted on `loop_out` while the
/// condition holds, and leave on `final` the first time it does not. Wiring
/// `loop_out` through a body actor and back into `loop_in` closes the loop.
pub struct LoopWhile {
    node: Node,
    condition: Arc<dyn Fn(&Value) -> bool + Send + Sync>,
}

impl LoopWhile {
    /// A loop actor with the given continuation condition.
    pub fn new(
        name: &str,
        condition: impl Fn(&Value) -> bool + Send + Sync + 'static,
    ) -> Result<LoopWhile, FlowError> {
        let mut node = Node::new(name);
        node.add_inport("loop_in")?;
        node.add_outport("loop_out")?;
        node.add_outport("final")?;
        Ok(LoopWhile { node, condition: Arc::new(condition) })
    }

    /// A loop actor wired through `inner` at construction.
    ///
    /// The inner actor must already be registered and expose exactly one
    /// inport and one outport; `loop_out` feeds its inport and its outport
    /// feeds `loop_in`.
    pub fn with_inner(
        name: &str,
        condition: impl Fn(&Value) -> bool + Send + Sync + 'static,
        inner: &ActorRef,
    ) -> Result<LoopWhile, FlowError> {
        let looper = LoopWhile::new(name, condition)?;
        let inner_in = inner.inports();
        let inner_out = inner.outports();
        if inner_in.len() != 1 || inner_out.len() != 1 {
            return Err(FlowError::BadConfiguration(format!(
                "loop body {:?} must have exactly one inport and one outport",
                inner.name(),
            )));
        }
        let loop_out = looper.node.outports.get("loop_out").expect("declared above");
        let loop_in = looper.node.inports.get("loop_in").expect("declared above");
        loop_out.connect(&inner_in[0])?;
        inner_out[0].connect(loop_in)?;
        Ok(looper)
    }
}

impl Actor for LoopWhile {
    fn node(&self) -> &Node {
        &self.node
    }

    fn node_mut(&mut self) -> &mut Node {
        &mut self.node
    }

    fn task(&self) -> Task {
        let condition = self.condition.clone();
        Arc::new(move |args| {
            let value = args
                .args
                .into_iter()
                .next()
                .ok_or_else(|| ActorError::message("loop expects a value on loop_in"))?;
            if condition(&value) {
                Ok(RunResult::emit_one("loop_out", value))
            } else {
                Ok(RunResult::emit_one("final", value))
            }
        })
    }
}

/// A round-robin fan-out actor.
///
/// Each firing forwards the consumed value to the next of its
/// `multiplicity` outports (`{in}_1` through `{in}_m`). The cursor lives in
/// the actor across firings, which is exactly why this is a system actor:
/// executed on an engine, every firing would start from a fresh cursor.
pub struct Splitter {
    node: Node,
    inport_name: String,
    multiplicity: usize,
    cursor: usize,
}

impl Splitter {
    /// A splitter with inport `in` and the given multiplicity.
    pub fn new(name: &str, multiplicity: usize) -> Result<Splitter, FlowError> {
        Splitter::with_inport(name, "in", multiplicity)
    }

    /// A splitter with a custom inport name.
    pub fn with_inport(
        name: &str,
        inport_name: &str,
        multiplicity: usize,
    ) -> Result<Splitter, FlowError> {
        if multiplicity < 1 {
            return Err(FlowError::BadConfiguration(
                "splitter multiplicity must be at least 1".into(),
            ));
        }
        let mut node = Node::new(name);
        node.add_inport(inport_name)?;
        for i in 1..=multiplicity {
            node.add_outport(&format!("{}_{}", inport_name, i))?;
        }
        Ok(Splitter {
            node,
            inport_name: inport_name.to_owned(),
            multiplicity,
            cursor: 0,
        })
    }
}

impl Actor for Splitter {
    fn node(&self) -> &Node {
        &self.node
    }

    fn node_mut(&mut self) -> &mut Node {
        &mut self.node
    }

    fn get_run_args(&mut self) -> Result<RunArgs, FlowError> {
        let port = self.node.inports.at(0).expect("splitter has one inport");
        let value = port.pop()?;
        Ok(RunArgs::default().with_kwarg(&self.inport_name, value))
    }

    fn system_actor(&self) -> bool {
        true
    }

    fn task(&self) -> Task {
        Arc::new(|_| Err(ActorError::message("splitter must run in the scheduler's process")))
    }

    fn run_local(&mut self, mut args: RunArgs) -> Result<RunResult, ActorError> {
        let value = args
            .kwargs
            .remove(&self.inport_name)
            .ok_or_else(|| ActorError::message("splitter expects its inport value"))?;
        self.cursor = self.cursor % self.multiplicity + 1;
        let outport = format!("{}_{}", self.inport_name, self.cursor);
        Ok(RunResult::emit_one(&outport, value))
    }
}

/// An always-ready actor that discards whatever reaches it.
pub struct Sink {
    node: Node,
}

impl Sink {
    /// A sink with the given inports.
    pub fn new(name: &str, inports: &[&str]) -> Result<Sink, FlowError> {
        let mut node = Node::new(name);
        for inport in inports {
            node.add_inport(inport)?;
        }
        Ok(Sink { node })
    }
}

impl Actor for Sink {
    fn node(&self) -> &Node {
        &self.node
    }

    fn node_mut(&mut self) -> &mut Node {
        &mut self.node
    }

    fn firing_rule(&self) -> FiringRule {
        FiringRule::Always
    }

    fn get_run_args(&mut self) -> Result<RunArgs, FlowError> {
        for port in self.node.inports.iter() {
            port.try_pop();
        }
        Ok(RunArgs::default())
    }

    fn task(&self) -> Task {
        Arc::new(|_| Ok(RunResult::Empty))
    }
}
