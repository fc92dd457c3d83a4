//! The actor contract: named nodes with ports, a firing rule, and a pure
//! run function.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::error::{ActorError, FlowError};
use crate::port::{Direction, Owner, Port, PortGroup};
use crate::value::Value;

/// The state every actor carries: a name and its two port groups.
pub struct Node {
    name: String,
    /// Ports the actor consumes from.
    pub inports: PortGroup,
    /// Ports the actor emits on.
    pub outports: PortGroup,
}

impl Node {
    /// A node named `name` with empty port groups.
    pub fn new(name: &str) -> Node {
        Node {
            name: name.to_owned(),
            inports: PortGroup::new(Direction::Input),
            outports: PortGroup::new(Direction::Output),
        }
    }

    /// The actor's name, unique within its enclosing workflow.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declares an input port.
    pub fn add_inport(&mut self, name: &str) -> Result<Port, FlowError> {
        self.inports.append(name)
    }

    /// Declares an output port.
    pub fn add_outport(&mut self, name: &str) -> Result<Port, FlowError> {
        self.outports.append(name)
    }
}

/// When an actor is eligible to fire, as a function of its inports.
#[derive(Clone)]
pub enum FiringRule {
    /// Every declared inport holds at least one value.
    AllPorts,
    /// At least one inport holds a value.
    AnyPort,
    /// The actor is always eligible (sinks).
    Always,
    /// An arbitrary predicate over the inport group.
    Custom(Arc<dyn Fn(&PortGroup) -> bool + Send + Sync>),
}

impl FiringRule {
    /// Evaluates the rule against `inports`.
    pub fn satisfied(&self, inports: &PortGroup) -> bool {
        match self {
            FiringRule::AllPorts => inports.iter().all(|port| !port.is_empty()),
            FiringRule::AnyPort => inports.iter().any(|port| !port.is_empty()),
            FiringRule::Always => true,
            FiringRule::Custom(rule) => rule(inports),
        }
    }
}

impl fmt::Debug for FiringRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FiringRule::AllPorts => write!(f, "AllPorts"),
            FiringRule::AnyPort => write!(f, "AnyPort"),
            FiringRule::Always => write!(f, "Always"),
            FiringRule::Custom(_) => write!(f, "Custom"),
        }
    }
}

/// The arguments one firing hands to the run function.
///
/// Collected by `get_run_args` from local port state; everything past that
/// point is location independent and may be serialized to an engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunArgs {
    /// Positional arguments, in inport declaration order.
    pub args: Vec<Value>,
    /// Named arguments.
    pub kwargs: BTreeMap<String, Value>,
}

impl RunArgs {
    /// Arguments consisting of `args` alone.
    pub fn positional(args: Vec<Value>) -> RunArgs {
        RunArgs { args, kwargs: BTreeMap::new() }
    }

    /// Adds a named argument.
    pub fn with_kwarg(mut self, name: &str, value: Value) -> RunArgs {
        self.kwargs.insert(name.to_owned(), value);
        self
    }
}

/// What one firing produced.
pub enum RunResult {
    /// The firing produced nothing.
    Empty,
    /// Values for declared outports, emitted in order.
    Emit(Vec<(String, Value)>),
    /// A lazily produced sequence of outport emissions (generator actors).
    Stream(Box<dyn Iterator<Item = (String, Value)> + Send>),
}

impl RunResult {
    /// A single emission.
    pub fn emit_one(port: &str, value: Value) -> RunResult {
        RunResult::Emit(vec![(port.to_owned(), value)])
    }

    /// Collapses the result into its emissions, draining streams.
    ///
    /// `None` stands for `Empty`; engines encode this form because streams
    /// cannot cross a payload boundary lazily.
    pub fn into_pairs(self) -> Option<Vec<(String, Value)>> {
        match self {
            RunResult::Empty => None,
            RunResult::Emit(pairs) => Some(pairs),
            RunResult::Stream(iter) => Some(iter.collect()),
        }
    }
}

impl fmt::Debug for RunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunResult::Empty => write!(f, "Empty"),
            RunResult::Emit(pairs) => f.debug_tuple("Emit").field(pairs).finish(),
            RunResult::Stream(_) => write!(f, "Stream(..)"),
        }
    }
}

/// The pure run function of one firing.
///
/// A task captures actor configuration only, never ports and never
/// mutable actor state, so it can execute in a worker thread or on an
/// engine in a different process.
pub type Task = Arc<dyn Fn(RunArgs) -> Result<RunResult, ActorError> + Send + Sync>;

/// A computation node in a dataflow graph.
///
/// Implementations split each firing into two phases: `get_run_args`
/// consumes values from local port buffers, and the [`Task`] returned by
/// `task` turns those arguments into emissions without touching the actor.
/// Actors whose firing must mutate per-instance state instead override
/// `run_local` and report `system_actor`, which pins them to the driving
/// scheduler's process.
pub trait Actor: Send {
    /// The actor's name and port groups.
    fn node(&self) -> &Node;

    /// Mutable access to the name and port groups.
    fn node_mut(&mut self) -> &mut Node;

    /// The firing rule evaluated over the inports.
    fn firing_rule(&self) -> FiringRule {
        FiringRule::AllPorts
    }

    /// True when the firing rule is satisfied.
    fn can_run(&self) -> bool {
        self.firing_rule().satisfied(&self.node().inports)
    }

    /// Consumes one value per needed inport and builds the run arguments.
    ///
    /// The default takes one value from every declared inport, positionally
    /// in declaration order.
    fn get_run_args(&mut self) -> Result<RunArgs, FlowError> {
        let mut args = Vec::with_capacity(self.node().inports.len());
        for port in self.node().inports.iter() {
            args.push(port.pop()?);
        }
        Ok(RunArgs::positional(args))
    }

    /// The pure run function for the next firing.
    fn task(&self) -> Task;

    /// True when the actor must execute in the scheduler's own process.
    fn system_actor(&self) -> bool {
        false
    }

    /// The in-process run path; the only place `&mut self` state may be
    /// touched during a firing.
    fn run_local(&mut self, args: RunArgs) -> Result<RunResult, ActorError> {
        (self.task())(args)
    }
}

static NEXT_ACTOR_ID: AtomicUsize = AtomicUsize::new(0);

pub(crate) struct ActorSlot {
    id: usize,
    name: String,
    system: bool,
    cell: Mutex<Box<dyn Actor>>,
}

/// A registration handle to an actor.
///
/// Registering with [`spawn`] binds every port's owner back-reference and
/// assigns an engine-unique id; schedulers address actors exclusively
/// through these handles.
#[derive(Clone)]
pub struct ActorRef {
    slot: Arc<ActorSlot>,
}

/// Registers `actor`, binding its ports, and returns the handle.
pub fn spawn(actor: impl Actor + 'static) -> ActorRef {
    ActorRef::from_boxed(Box::new(actor))
}

impl ActorRef {
    /// Registers a boxed actor; see [`spawn`].
    pub fn from_boxed(actor: Box<dyn Actor>) -> ActorRef {
        let name = actor.node().name().to_owned();
        let system = actor.system_actor();
        let slot = Arc::new(ActorSlot {
            id: NEXT_ACTOR_ID.fetch_add(1, Ordering::Relaxed),
            name,
            system,
            cell: Mutex::new(actor),
        });
        let owner = Arc::downgrade(&slot);
        {
            let guard = slot.cell.lock().expect("actor poisoned");
            let node = guard.node();
            for port in node.inports.iter().chain(node.outports.iter()) {
                port.bind_owner(Owner::Actor(owner.clone()));
            }
        }
        ActorRef { slot }
    }

    pub(crate) fn from_slot(slot: Arc<ActorSlot>) -> ActorRef {
        ActorRef { slot }
    }

    /// The engine-unique id assigned at registration.
    pub fn id(&self) -> usize {
        self.slot.id
    }

    /// The actor's name.
    pub fn name(&self) -> &str {
        &self.slot.name
    }

    /// True when the actor must run in the scheduler's own process.
    pub fn is_system(&self) -> bool {
        self.slot.system
    }

    /// True when the firing rule is currently satisfied.
    pub fn can_run(&self) -> bool {
        self.lock().can_run()
    }

    /// The declared inport named `name`.
    pub fn inport(&self, name: &str) -> Option<Port> {
        self.lock().node().inports.get(name).cloned()
    }

    /// The declared outport named `name`.
    pub fn outport(&self, name: &str) -> Option<Port> {
        self.lock().node().outports.get(name).cloned()
    }

    /// Handles to all declared inports, in declaration order.
    pub fn inports(&self) -> Vec<Port> {
        self.lock().node().inports.iter().cloned().collect()
    }

    /// Handles to all declared outports, in declaration order.
    pub fn outports(&self) -> Vec<Port> {
        self.lock().node().outports.iter().cloned().collect()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Box<dyn Actor>> {
        self.slot.cell.lock().expect("actor poisoned")
    }
}

impl fmt::Debug for ActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorRef")
            .field("id", &self.slot.id)
            .field("name", &self.slot.name)
            .field("system", &self.slot.system)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Doubler {
        node: Node,
    }

    impl Doubler {
        fn new() -> Doubler {
            let mut node = Node::new("doubler");
            node.add_inport("x").unwrap();
            node.add_outport("y").unwrap();
            Doubler { node }
        }
    }

    impl Actor for Doubler {
        fn node(&self) -> &Node {
            &self.node
        }

        fn node_mut(&mut self) -> &mut Node {
            &mut self.node
        }

        fn task(&self) -> Task {
            Arc::new(|args| {
                let x = args.args[0].as_int().ok_or_else(|| ActorError::message("int expected"))?;
                Ok(RunResult::emit_one("y", Value::from(x * 2)))
            })
        }
    }

    #[test]
    fn default_rule_requires_every_inport() {
        let actor = spawn(Doubler::new());
        assert!(!actor.can_run());
        let x = actor.inport("x").unwrap();
        assert!(x.put(Value::from(4)));
        assert!(actor.can_run());
    }

    #[test]
    fn firing_rules_cover_the_strategy_set() {
        let mut node = Node::new("rules");
        node.add_inport("a").unwrap();
        node.add_inport("b").unwrap();
        node.inports.get("a").unwrap().put(Value::from(1));

        assert!(!FiringRule::AllPorts.satisfied(&node.inports));
        assert!(FiringRule::AnyPort.satisfied(&node.inports));
        assert!(FiringRule::Always.satisfied(&node.inports));
        let rule = FiringRule::Custom(Arc::new(|ports| ports.len() == 2));
        assert!(rule.satisfied(&node.inports));
    }

    #[test]
    fn default_get_run_args_pops_one_per_inport() {
        let actor = spawn(Doubler::new());
        let x = actor.inport("x").unwrap();
        x.put(Value::from(1));
        x.put(Value::from(2));
        let args = actor.lock().get_run_args().unwrap();
        assert_eq!(args.args, vec![Value::from(1)]);
        assert_eq!(x.len(), 1);
    }
}
