//! An actor defined by a plain function.

use std::sync::Arc;

use itertools::Itertools;

use crate::actor::{Actor, Node, RunResult, Task};
use crate::error::{ActorError, FlowError};
use crate::value::Value;

type Func = Arc<dyn Fn(&[Value]) -> Result<Vec<Value>, ActorError> + Send + Sync>;

/// An actor that applies a pure function to one value per inport.
///
/// The function receives the fixed bound arguments (if any) followed by one
/// value popped from each inport in declaration order, and must return one
/// value per declared outport; results are zipped onto the outports
/// positionally.
pub struct FuncActor {
    node: Node,
    func: Func,
    bound: Vec<Value>,
}

impl FuncActor {
    /// Wraps an infallible function with the given port names.
    pub fn new(
        name: &str,
        inports: &[&str],
        outports: &[&str],
        func: impl Fn(&[Value]) -> Vec<Value> + Send + Sync + 'static,
    ) -> Result<FuncActor, FlowError> {
        FuncActor::fallible(name, inports, outports, move |args| Ok(func(args)))
    }

    /// Wraps a function that may fail with the given port names.
    pub fn fallible(
        name: &str,
        inports: &[&str],
        outports: &[&str],
        func: impl Fn(&[Value]) -> Result<Vec<Value>, ActorError> + Send + Sync + 'static,
    ) -> Result<FuncActor, FlowError> {
        let mut node = Node::new(name);
        for inport in inports {
            node.add_inport(inport)?;
        }
        for outport in outports {
            node.add_outport(outport)?;
        }
        Ok(FuncActor { node, func: Arc::new(func), bound: Vec::new() })
    }

    /// Fixes leading arguments, passed before the popped inport values.
    pub fn with_bound_args(mut self, bound: Vec<Value>) -> FuncActor {
        self.bound = bound;
        self
    }

    /// Applies the wrapped function directly, outside any dataflow.
    ///
    /// `actor.call(&[x, y])` equals what the dataflow path would emit for
    /// the same inputs.
    pub fn call(&self, args: &[Value]) -> Result<Vec<Value>, ActorError> {
        let mut full = self.bound.clone();
        full.extend_from_slice(args);
        (self.func)(&full)
    }
}

impl Actor for FuncActor {
    fn node(&self) -> &Node {
        &self.node
    }

    fn node_mut(&mut self) -> &mut Node {
        &mut self.node
    }

    fn task(&self) -> Task {
        let func = self.func.clone();
        let bound = self.bound.clone();
        let outports = self.node.outports.names();
        Arc::new(move |run_args| {
            let mut full = bound.clone();
            full.extend(run_args.args);
            let produced = func(&full)?;
            if produced.len() != outports.len() {
                return Err(ActorError::message(format!(
                    "function produced {} values for {} outports",
                    produced.len(),
                    outports.len(),
                )));
            }
            Ok(RunResult::Emit(
                outports.iter().cloned().zip_eq(produced).collect(),
            ))
        })
    }
}
