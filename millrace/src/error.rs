//! Failures surfaced by the engine and by actor run functions.

use millrace_cluster::ClusterError;

/// Failures surfaced by schedulers and graph construction.
///
/// Nothing is recovered internally: every error aborts the `execute` that
/// encountered it, and whatever values were already delivered stay in their
/// port buffers for inspection.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    /// A workflow input key names no declared inport.
    #[error("{port:?} is not an inport of {actor:?}")]
    UnknownInport {
        /// The actor or workflow the lookup ran against.
        actor: String,
        /// The offending port name.
        port: String,
    },
    /// A run result key names no declared outport.
    #[error("{port:?} is not an outport of {actor:?}")]
    UnknownOutport {
        /// The actor the result came from.
        actor: String,
        /// The offending port name.
        port: String,
    },
    /// `pop` was called on an empty buffer.
    #[error("pop from empty port {port:?}")]
    EmptyPort {
        /// The port whose buffer was empty.
        port: String,
    },
    /// A port name was appended twice to the same group.
    #[error("port {port:?} already exists in the group")]
    DuplicatePort {
        /// The duplicated name.
        port: String,
    },
    /// Both endpoints of an attempted connection have the same direction.
    #[error("cannot connect {from:?} to {to:?}: an output must pair with an input")]
    BadConnection {
        /// Name of the first port.
        from: String,
        /// Name of the second port.
        to: String,
    },
    /// A scheduler asked an actor to run while its firing rule was unsatisfied.
    #[error("firing rule of {actor:?} is not satisfied")]
    FiringRuleViolation {
        /// The actor that was about to fire.
        actor: String,
    },
    /// An actor's run function failed, locally or on an engine.
    #[error("actor {actor:?} failed")]
    ActorFailed {
        /// The actor whose run failed.
        actor: String,
        /// The originating failure.
        #[source]
        source: ActorError,
    },
    /// A scheduler or workflow was configured inconsistently.
    #[error("bad configuration: {0}")]
    BadConfiguration(String),
    /// Connecting to a cluster failed.
    #[error(transparent)]
    Cluster(#[from] ClusterError),
}

/// A failure inside an actor's run function.
#[derive(Debug, thiserror::Error)]
pub enum ActorError {
    /// A domain failure described by the actor.
    #[error("{0}")]
    Message(String),
    /// An I/O failure (shell actors, file readers).
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Run arguments or results failed to encode or decode.
    #[error("payload codec error: {0}")]
    Codec(String),
}

impl ActorError {
    /// A domain failure with the given description.
    pub fn message(text: impl Into<String>) -> ActorError {
        ActorError::Message(text.into())
    }
}
