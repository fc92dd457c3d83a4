//! Engine pools and job submission for the millrace dataflow engine.
//!
//! This crate is the execution backend the cluster schedulers in `millrace`
//! delegate to. It exposes the surface an external cluster client would
//! have: a [`Cluster`] is a handle to a pool of engines, [`Cluster::submit`]
//! hands a framed job payload to the least-busy engine, and the returned
//! [`JobHandle`] can be polled for readiness and asked for the outcome.
//!
//! Engines here are threads of the current process. Job payloads still
//! cross the engine boundary as framed bytes (a [`JobHeader`] followed by an
//! opaque payload), so a task that works against this crate works unchanged
//! against an out-of-process pool.
//!
//! # Examples
//! ```
//! use std::sync::Arc;
//! use millrace_cluster::Cluster;
//!
//! let cluster = Cluster::local(2);
//! let task = Arc::new(|payload: &[u8]| Ok(payload.to_vec()));
//! let mut handle = cluster.submit(task, b"ping".to_vec());
//! assert_eq!(handle.get().unwrap(), b"ping");
//! ```

#![deny(missing_docs)]

mod message;
mod job;
mod pool;
mod initialize;

pub use crate::message::JobHeader;
pub use crate::job::{JobError, JobHandle, JobReport, TaskFn};
pub use crate::pool::Cluster;
pub use crate::initialize::{register_profile, ClusterConfig, ClusterError, ClusterSource};
