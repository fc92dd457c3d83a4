//! Ready-made actors: function wrappers, shell commands, generators, and
//! the flow-control actors (loops, splitters, sinks).

mod func;
mod shell;
mod generate;
mod special;

pub use self::func::FuncActor;
pub use self::shell::ShellRunner;
pub use self::generate::{Iterate, LineReader};
pub use self::special::{LoopWhile, Sink, Splitter};
