//! Millrace is a port-based dataflow workflow engine.
//!
//! A computation is a directed graph of [`Actor`]s whose input and output
//! [`Port`]s are wired together. Values are fed into entry ports through a
//! [`Scheduler`]; an actor fires when its [`FiringRule`] over its inports is
//! satisfied, its pure run function turns the consumed values into
//! emissions, and each emission is propagated along the outport's
//! connections. Execution ends when no deliveries are queued and no actor
//! is running; whatever reached unconnected outports stays buffered for the
//! caller.
//!
//! Several schedulers drive the same graph semantics: synchronous recursion
//! ([`NaiveScheduler`]), a deterministic FIFO queue
//! ([`LinearizedScheduler`]), a worker pool ([`ThreadedScheduler`]), and
//! engine pools behind the [`millrace_cluster`] client
//! ([`ClusterScheduler`], [`MultiClusterScheduler`]).
//!
//! # Examples
//!
//! ```
//! use millrace::{spawn, FuncActor, LinearizedScheduler, Scheduler, Value};
//!
//! let double = spawn(
//!     FuncActor::new("double", &["x"], &["y"], |args| {
//!         vec![Value::from(args[0].as_int().unwrap() * 2)]
//!     })
//!     .unwrap(),
//! );
//!
//! let mut scheduler = LinearizedScheduler::new();
//! scheduler.put_value(&double.inport("x").unwrap(), Value::from(21)).unwrap();
//! scheduler.execute().unwrap();
//!
//! assert_eq!(double.outport("y").unwrap().pop().unwrap(), Value::from(42));
//! ```

#![deny(missing_docs)]

pub mod actor;
pub mod actors;
pub mod error;
pub mod port;
pub mod schedule;
pub mod value;
pub mod workflow;

/// Re-export of the cluster client crate.
pub mod cluster {
    pub use millrace_cluster::*;
}

pub use crate::actor::{spawn, Actor, ActorRef, FiringRule, Node, RunArgs, RunResult, Task};
pub use crate::actors::{FuncActor, Iterate, LineReader, LoopWhile, ShellRunner, Sink, Splitter};
pub use crate::error::{ActorError, FlowError};
pub use crate::port::{Direction, Port, PortGroup};
pub use crate::schedule::{
    ClusterScheduler, LinearizedScheduler, MultiClusterConfig, MultiClusterScheduler,
    NaiveScheduler, Scheduler, ThreadedScheduler,
};
pub use crate::value::Value;
pub use crate::workflow::{chain_actors, Workflow};
