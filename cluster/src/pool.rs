//! Engine pools: spawned threads competing for framed jobs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::SystemTime;

use crossbeam_channel::{Receiver, Sender};
use log::{debug, trace};

use crate::job::{JobHandle, JobReport, TaskFn};
use crate::message::JobHeader;

struct Job {
    frame: Vec<u8>,
    task: TaskFn,
    reply: Sender<JobReport>,
}

/// A handle to a pool of engines accepting framed jobs.
///
/// Submission is load balanced: all engines receive from one shared channel,
/// so whichever engine is free next picks the job up. Dropping the cluster
/// closes the channel; engines finish their current job and exit, and the
/// drop blocks until all of them have been joined.
pub struct Cluster {
    injector: Option<Sender<Job>>,
    engines: Vec<thread::JoinHandle<()>>,
    next_job: AtomicU64,
}

impl Cluster {
    /// Spawns a pool of `engines` engine threads in the current process.
    pub fn local(engines: usize) -> Cluster {
        let (injector, jobs) = crossbeam_channel::unbounded::<Job>();
        let handles = (0..engines)
            .map(|index| {
                let jobs = jobs.clone();
                thread::Builder::new()
                    .name(format!("millrace-engine-{}", index))
                    .spawn(move || engine_loop(index, jobs))
                    .expect("failed to spawn engine thread")
            })
            .collect();
        debug!("started local engine pool with {} engines", engines);
        Cluster {
            injector: Some(injector),
            engines: handles,
            next_job: AtomicU64::new(1),
        }
    }

    /// Number of engines in the pool.
    pub fn engines(&self) -> usize {
        self.engines.len()
    }

    /// Frames `payload`, hands it with `task` to the pool, and returns a
    /// pollable handle for the outcome.
    pub fn submit(&self, task: TaskFn, payload: Vec<u8>) -> JobHandle {
        let job = self.next_job.fetch_add(1, Ordering::Relaxed);
        let frame = JobHeader::frame(job, &payload);
        let (reply, receiver) = crossbeam_channel::bounded(1);
        let injector = self.injector.as_ref().expect("pool alive while handle exists");
        trace!("submitting job {} ({} payload bytes)", job, payload.len());
        if injector.send(Job { frame, task, reply }).is_err() {
            // All engines exited; the handle will report EngineGone.
        }
        JobHandle::pending(job, receiver)
    }
}

impl Drop for Cluster {
    fn drop(&mut self) {
        drop(self.injector.take());
        for engine in self.engines.drain(..) {
            let _ = engine.join();
        }
    }
}

fn engine_loop(index: usize, jobs: Receiver<Job>) {
    trace!("engine {} up", index);
    while let Ok(job) = jobs.recv() {
        let started = SystemTime::now();
        let (job_id, outcome) = match JobHeader::unframe(&job.frame) {
            Ok((header, payload)) => {
                trace!("engine {} running job {}", index, header.job);
                (header.job, (job.task)(payload))
            }
            Err(error) => (0, Err(error)),
        };
        let report = JobReport {
            job: job_id,
            engine: Some(index),
            started,
            completed: SystemTime::now(),
            outcome,
        };
        // A submitter that dropped its handle no longer cares.
        let _ = job.reply.send(report);
    }
    trace!("engine {} down", index);
}
