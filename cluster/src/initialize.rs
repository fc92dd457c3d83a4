//! Cluster configuration and connection with a bounded retry budget.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, Instant};

use log::debug;

use crate::pool::Cluster;

/// Where a cluster's engines come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterSource {
    /// A named profile previously registered with [`register_profile`].
    Profile(String),
    /// A profile directory whose `engines` file names the pool size.
    ProfileDir(PathBuf),
    /// An anonymous local pool of the given size.
    Local(usize),
}

/// Everything needed to connect to a cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterConfig {
    /// Where the engines come from.
    pub source: ClusterSource,
    /// Reject pools smaller than this.
    pub min_engines: usize,
    /// Total budget for connecting, including retries.
    pub timeout: Duration,
}

impl ClusterConfig {
    /// Configuration for an anonymous local pool of `engines` engines.
    pub fn local(engines: usize) -> ClusterConfig {
        ClusterConfig {
            source: ClusterSource::Local(engines),
            min_engines: 1,
            timeout: Duration::from_secs(60),
        }
    }

    /// Configuration for a named profile.
    pub fn profile(name: impl Into<String>) -> ClusterConfig {
        ClusterConfig {
            source: ClusterSource::Profile(name.into()),
            min_engines: 1,
            timeout: Duration::from_secs(60),
        }
    }

    /// Configuration for a profile directory.
    pub fn profile_dir(path: impl Into<PathBuf>) -> ClusterConfig {
        ClusterConfig {
            source: ClusterSource::ProfileDir(path.into()),
            min_engines: 1,
            timeout: Duration::from_secs(60),
        }
    }

    /// Sets the minimum acceptable engine count.
    pub fn with_min_engines(mut self, min_engines: usize) -> ClusterConfig {
        self.min_engines = min_engines;
        self
    }

    /// Sets the connection budget.
    pub fn with_timeout(mut self, timeout: Duration) -> ClusterConfig {
        self.timeout = timeout;
        self
    }
}

/// Failures establishing a cluster connection.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClusterError {
    /// The source could not be resolved within the budget.
    #[error("cluster {source_desc} unavailable: {reason}")]
    Unavailable {
        /// Description of the requested source.
        source_desc: String,
        /// The last failure observed before the budget ran out.
        reason: String,
    },
    /// The pool resolved, but is too small.
    #[error("not enough engines: wanted at least {wanted}, found {found}")]
    NotEnoughEngines {
        /// The configured minimum.
        wanted: usize,
        /// What the pool actually offers.
        found: usize,
    },
    /// The configuration itself is unusable.
    #[error("bad cluster configuration: {0}")]
    BadConfiguration(String),
}

fn registry() -> &'static Mutex<HashMap<String, usize>> {
    static REGISTRY: OnceLock<Mutex<HashMap<String, usize>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Registers a named profile resolving to a local pool of `engines` engines.
///
/// Re-registering a name overwrites the previous entry.
pub fn register_profile(name: impl Into<String>, engines: usize) {
    registry()
        .lock()
        .expect("profile registry poisoned")
        .insert(name.into(), engines);
}

fn resolve(source: &ClusterSource) -> Result<usize, ClusterError> {
    match source {
        ClusterSource::Local(engines) => Ok(*engines),
        ClusterSource::Profile(name) => registry()
            .lock()
            .expect("profile registry poisoned")
            .get(name)
            .copied()
            .ok_or_else(|| ClusterError::Unavailable {
                source_desc: format!("profile {:?}", name),
                reason: "profile is not registered".into(),
            }),
        ClusterSource::ProfileDir(dir) => {
            let path = dir.join("engines");
            let text = std::fs::read_to_string(&path).map_err(|e| ClusterError::Unavailable {
                source_desc: format!("profile dir {:?}", dir),
                reason: e.to_string(),
            })?;
            text.trim().parse::<usize>().map_err(|e| ClusterError::Unavailable {
                source_desc: format!("profile dir {:?}", dir),
                reason: format!("unreadable engines file: {}", e),
            })
        }
    }
}

impl Cluster {
    /// Connects to the configured cluster, retrying within the budget.
    ///
    /// Resolution failures are retried after a pause of 10% of the
    /// configured timeout, until the budget is exhausted. A pool that
    /// resolves but offers fewer than `min_engines` engines is released
    /// and retried the same way.
    pub fn connect(config: &ClusterConfig) -> Result<Cluster, ClusterError> {
        if config.min_engines == 0 {
            return Err(ClusterError::BadConfiguration(
                "min_engines must be at least 1".into(),
            ));
        }
        let deadline = Instant::now() + config.timeout;
        let pause = config.timeout.mul_f64(0.1);
        loop {
            match resolve(&config.source) {
                Ok(engines) if engines >= config.min_engines => {
                    debug!("connected to {:?} with {} engines", config.source, engines);
                    return Ok(Cluster::local(engines));
                }
                Ok(engines) => {
                    if Instant::now() >= deadline {
                        return Err(ClusterError::NotEnoughEngines {
                            wanted: config.min_engines,
                            found: engines,
                        });
                    }
                }
                Err(error) => {
                    if Instant::now() >= deadline {
                        return Err(error);
                    }
                }
            }
            std::thread::sleep(pause);
        }
    }
}
