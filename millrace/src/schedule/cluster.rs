//! Schedulers that submit firings to remote engine pools.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, error};

use millrace_cluster::{Cluster, ClusterConfig, ClusterSource, JobError, JobHandle, TaskFn};

use crate::actor::{ActorRef, RunArgs, RunResult, Task};
use crate::error::{ActorError, FlowError};
use crate::port::Port;
use crate::schedule::{dispatch_result, settle, Deliver, Scheduler};
use crate::value::Value;

/// Pause between polling passes while jobs are in flight.
const POLL_PAUSE: Duration = Duration::from_millis(100);

struct Submitted {
    actor: ActorRef,
    handle: JobHandle,
}

/// The dispatch state shared by the single- and multi-cluster schedulers.
struct ClusterCore {
    clients: Vec<Arc<Cluster>>,
    next_client: usize,
    execution_queue: VecDeque<(Port, Value)>,
    wait_queue: Vec<ActorRef>,
    running: HashMap<usize, Submitted>,
}

impl Deliver for ClusterCore {
    fn deliver(&mut self, port: &Port, value: Value) -> Result<(), FlowError> {
        self.execution_queue.push_back((port.clone(), value));
        Ok(())
    }
}

impl ClusterCore {
    fn new(clients: Vec<Arc<Cluster>>) -> ClusterCore {
        ClusterCore {
            clients,
            next_client: 0,
            execution_queue: VecDeque::new(),
            wait_queue: Vec::new(),
            running: HashMap::new(),
        }
    }

    fn rotate(&mut self) -> Arc<Cluster> {
        let client = Arc::clone(&self.clients[self.next_client]);
        self.next_client = (self.next_client + 1) % self.clients.len();
        client
    }

    fn execute(&mut self) -> Result<(), FlowError> {
        while !self.execution_queue.is_empty()
            || !self.wait_queue.is_empty()
            || !self.running.is_empty()
        {
            self.drain_deliveries()?;
            self.submit_waiting()?;
            self.reap_ready()?;
            if !self.running.is_empty() {
                thread::sleep(POLL_PAUSE);
            }
        }
        Ok(())
    }

    /// Delivers queued values; actors that become eligible join the wait
    /// queue.
    fn drain_deliveries(&mut self) -> Result<(), FlowError> {
        while let Some((port, value)) = self.execution_queue.pop_front() {
            if let Some(actor) = settle(self, &port, value)? {
                self.wait_queue.push(actor);
            }
        }
        Ok(())
    }

    /// Submits waiting actors that are not already running; the rest stay
    /// queued for the next pass.
    fn submit_waiting(&mut self) -> Result<(), FlowError> {
        let waiting = std::mem::take(&mut self.wait_queue);
        for actor in waiting {
            if self.running.contains_key(&actor.id()) {
                self.wait_queue.push(actor);
            } else {
                let submitted = self.submit(&actor)?;
                self.running.insert(actor.id(), submitted);
            }
        }
        Ok(())
    }

    /// One submission: system actors run here and wrap in a ready job,
    /// everything else ships its encoded arguments to an engine.
    fn submit(&mut self, actor: &ActorRef) -> Result<Submitted, FlowError> {
        let handle = {
            let mut guard = actor.lock();
            if !guard.can_run() {
                return Err(FlowError::FiringRuleViolation {
                    actor: actor.name().to_owned(),
                });
            }
            let args = guard.get_run_args()?;
            if actor.is_system() {
                let result = guard.run_local(args).map_err(|source| FlowError::ActorFailed {
                    actor: actor.name().to_owned(),
                    source,
                })?;
                JobHandle::immediate(encode_pairs(result))
            } else {
                let task = guard.task();
                drop(guard);
                let payload =
                    bincode::serialize(&args).map_err(|e| FlowError::ActorFailed {
                        actor: actor.name().to_owned(),
                        source: ActorError::Codec(e.to_string()),
                    })?;
                self.rotate().submit(wire_task(task), payload)
            }
        };
        debug!("submitted actor {}", actor.name());
        Ok(Submitted { actor: actor.clone(), handle })
    }

    /// Processes every job whose engine has reported; pending jobs stay.
    fn reap_ready(&mut self) -> Result<(), FlowError> {
        let mut ready = Vec::new();
        for (id, submitted) in self.running.iter_mut() {
            if submitted.handle.ready() {
                ready.push(*id);
            }
        }
        for id in ready {
            let mut submitted = self.running.remove(&id).expect("id collected above");
            let actor = submitted.actor.clone();
            if let Some(report) = submitted.handle.report() {
                debug!(
                    "started actor {} on engine {:?} at {:?}",
                    actor.name(),
                    report.engine,
                    report.started,
                );
            }
            match submitted.handle.get() {
                Err(failure) => {
                    error!("actor {} failed: {}", actor.name(), failure);
                    return Err(FlowError::ActorFailed {
                        actor: actor.name().to_owned(),
                        source: ActorError::Message(failure.to_string()),
                    });
                }
                Ok(bytes) => {
                    let pairs: Option<Vec<(String, Value)>> = bincode::deserialize(&bytes)
                        .map_err(|e| FlowError::ActorFailed {
                            actor: actor.name().to_owned(),
                            source: ActorError::Codec(e.to_string()),
                        })?;
                    debug!("completed actor {}", actor.name());
                    let result = match pairs {
                        Some(pairs) => RunResult::Emit(pairs),
                        None => RunResult::Empty,
                    };
                    dispatch_result(self, &actor, result)?;
                }
            }
        }
        Ok(())
    }
}

/// Adapts a pure actor task to the byte-level surface engines expect.
fn wire_task(task: Task) -> TaskFn {
    Arc::new(move |payload: &[u8]| {
        let args: RunArgs = bincode::deserialize(payload)
            .map_err(|e| JobError::Failed(format!("argument decode: {}", e)))?;
        let result = task(args).map_err(|e| JobError::Failed(e.to_string()))?;
        bincode::serialize(&result.into_pairs())
            .map_err(|e| JobError::Failed(format!("result encode: {}", e)))
    })
}

fn encode_pairs(result: RunResult) -> Result<Vec<u8>, JobError> {
    bincode::serialize(&result.into_pairs())
        .map_err(|e| JobError::Failed(format!("result encode: {}", e)))
}

/// Scheduler that submits non-system actors to a remote engine pool.
///
/// The dispatch loop runs in the calling thread: it delivers queued
/// values, submits eligible actors (at most one in-flight firing per
/// actor), and polls the outstanding job handles, fanning results out
/// exactly as the local runner would. System actors run in this process so
/// their per-instance state survives across firings.
pub struct ClusterScheduler {
    config: ClusterConfig,
    core: ClusterCore,
}

impl ClusterScheduler {
    /// Connects per `config` and wraps the cluster in a scheduler.
    pub fn connect(config: ClusterConfig) -> Result<ClusterScheduler, FlowError> {
        let cluster = Cluster::connect(&config)?;
        Ok(ClusterScheduler {
            config,
            core: ClusterCore::new(vec![Arc::new(cluster)]),
        })
    }

    /// A scheduler over an anonymous in-process pool of `engines` engines.
    pub fn local(engines: usize) -> Result<ClusterScheduler, FlowError> {
        ClusterScheduler::connect(ClusterConfig::local(engines))
    }

    /// Number of engines behind the scheduler.
    pub fn engines(&self) -> usize {
        self.core.clients.iter().map(|c| c.engines()).sum()
    }
}

impl Scheduler for ClusterScheduler {
    fn put_value(&mut self, port: &Port, value: Value) -> Result<(), FlowError> {
        self.core.deliver(port, value)
    }

    fn execute(&mut self) -> Result<(), FlowError> {
        self.core.execute()
    }

    /// Same configuration and connection, fresh queues.
    fn copy(&self) -> Box<dyn Scheduler> {
        Box::new(ClusterScheduler {
            config: self.config.clone(),
            core: ClusterCore::new(self.core.clients.clone()),
        })
    }
}

/// Configuration for [`MultiClusterScheduler`].
///
/// Either `profiles` or `profile_dirs` must name at least one cluster;
/// profiles win when both are given.
#[derive(Debug, Clone)]
pub struct MultiClusterConfig {
    /// Named profiles, resolved through the cluster registry.
    pub profiles: Vec<String>,
    /// Profile directories, each holding an `engines` file.
    pub profile_dirs: Vec<PathBuf>,
    /// Minimum engines per cluster.
    pub min_engines: usize,
    /// Connection budget per cluster.
    pub timeout: Duration,
}

impl Default for MultiClusterConfig {
    fn default() -> MultiClusterConfig {
        MultiClusterConfig {
            profiles: Vec::new(),
            profile_dirs: Vec::new(),
            min_engines: 1,
            timeout: Duration::from_secs(60),
        }
    }
}

impl MultiClusterConfig {
    fn sources(&self) -> Result<Vec<ClusterSource>, FlowError> {
        if !self.profiles.is_empty() {
            Ok(self.profiles.iter().cloned().map(ClusterSource::Profile).collect())
        } else if !self.profile_dirs.is_empty() {
            Ok(self
                .profile_dirs
                .iter()
                .cloned()
                .map(ClusterSource::ProfileDir)
                .collect())
        } else {
            Err(FlowError::BadConfiguration(
                "either profiles or profile_dirs must be specified".into(),
            ))
        }
    }
}

/// Scheduler that fans submissions out round-robin over several clusters.
///
/// Behaves like [`ClusterScheduler`] in every other respect; system actors
/// still run in this process.
pub struct MultiClusterScheduler {
    config: MultiClusterConfig,
    core: ClusterCore,
}

impl MultiClusterScheduler {
    /// Connects to every configured cluster.
    pub fn connect(config: MultiClusterConfig) -> Result<MultiClusterScheduler, FlowError> {
        let mut clients = Vec::new();
        for source in config.sources()? {
            let cluster_config = ClusterConfig {
                source,
                min_engines: config.min_engines,
                timeout: config.timeout,
            };
            clients.push(Arc::new(Cluster::connect(&cluster_config)?));
        }
        Ok(MultiClusterScheduler { config, core: ClusterCore::new(clients) })
    }

    /// Number of clusters submissions rotate across.
    pub fn clusters(&self) -> usize {
        self.core.clients.len()
    }
}

impl Scheduler for MultiClusterScheduler {
    fn put_value(&mut self, port: &Port, value: Value) -> Result<(), FlowError> {
        self.core.deliver(port, value)
    }

    fn execute(&mut self) -> Result<(), FlowError> {
        self.core.execute()
    }

    /// Same configuration and connections, fresh queues.
    fn copy(&self) -> Box<dyn Scheduler> {
        Box::new(MultiClusterScheduler {
            config: self.config.clone(),
            core: ClusterCore::new(self.core.clients.clone()),
        })
    }
}
