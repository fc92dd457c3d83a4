//! Jobs, job outcomes, and the handles used to poll for them.

use std::sync::Arc;
use std::time::SystemTime;

use crossbeam_channel::{Receiver, TryRecvError};

/// The callable an engine applies to a job's payload bytes.
///
/// Tasks must be location independent: everything a task needs beyond its
/// configuration arrives through the payload, and everything it produces
/// leaves through the returned bytes.
pub type TaskFn = Arc<dyn Fn(&[u8]) -> Result<Vec<u8>, JobError> + Send + Sync>;

/// A failure reported for a single job.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum JobError {
    /// The task itself reported an error.
    #[error("job failed: {0}")]
    Failed(String),
    /// The engine pool shut down before reporting an outcome.
    #[error("engine dropped the job before completion")]
    EngineGone,
    /// The framed payload did not match its header.
    #[error("malformed job frame: {0}")]
    BadFrame(String),
}

/// Everything an engine reports back about one job.
#[derive(Debug, Clone)]
pub struct JobReport {
    /// Pool-unique job identifier.
    pub job: u64,
    /// Index of the engine that ran the job; `None` for immediate jobs.
    pub engine: Option<usize>,
    /// When the engine picked the job up.
    pub started: SystemTime,
    /// When the task returned.
    pub completed: SystemTime,
    /// The task's result bytes, or the failure.
    pub outcome: Result<Vec<u8>, JobError>,
}

/// A pollable handle to a submitted job.
///
/// `ready` never blocks; `get` blocks until the engine reports. Once a
/// report arrives it is cached, so both methods can be called repeatedly.
pub struct JobHandle {
    job: u64,
    waiting: Option<Receiver<JobReport>>,
    report: Option<JobReport>,
}

impl JobHandle {
    pub(crate) fn pending(job: u64, receiver: Receiver<JobReport>) -> JobHandle {
        JobHandle { job, waiting: Some(receiver), report: None }
    }

    /// Wraps an already-computed outcome in a ready handle.
    ///
    /// Used for work that had to run in the submitting process and only
    /// needs to look like a job to the code that polls it.
    pub fn immediate(outcome: Result<Vec<u8>, JobError>) -> JobHandle {
        let now = SystemTime::now();
        JobHandle {
            job: 0,
            waiting: None,
            report: Some(JobReport {
                job: 0,
                engine: None,
                started: now,
                completed: now,
                outcome,
            }),
        }
    }

    /// The pool-unique identifier of this job.
    pub fn job(&self) -> u64 {
        self.job
    }

    /// Checks for a report without blocking.
    pub fn ready(&mut self) -> bool {
        if self.report.is_some() {
            return true;
        }
        let receiver = self.waiting.as_ref().expect("pending handle must hold a receiver");
        match receiver.try_recv() {
            Ok(report) => {
                self.install(report);
                true
            }
            Err(TryRecvError::Empty) => false,
            Err(TryRecvError::Disconnected) => {
                self.install_gone();
                true
            }
        }
    }

    /// Blocks until the report arrives and returns the outcome.
    pub fn get(&mut self) -> Result<Vec<u8>, JobError> {
        if self.report.is_none() {
            let receiver = self.waiting.as_ref().expect("pending handle must hold a receiver");
            match receiver.recv() {
                Ok(report) => self.install(report),
                Err(_) => self.install_gone(),
            }
        }
        self.report
            .as_ref()
            .expect("report installed above")
            .outcome
            .clone()
    }

    /// The full report, if one has arrived.
    pub fn report(&self) -> Option<&JobReport> {
        self.report.as_ref()
    }

    /// The engine that ran the job, once reported.
    pub fn engine(&self) -> Option<usize> {
        self.report.as_ref().and_then(|r| r.engine)
    }

    /// When the job started, once reported.
    pub fn started(&self) -> Option<SystemTime> {
        self.report.as_ref().map(|r| r.started)
    }

    fn install(&mut self, report: JobReport) {
        self.waiting = None;
        self.report = Some(report);
    }

    fn install_gone(&mut self) {
        let now = SystemTime::now();
        self.install(JobReport {
            job: self.job,
            engine: None,
            started: now,
            completed: now,
            outcome: Err(JobError::EngineGone),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn immediate_handles_are_ready_at_once() {
        let mut handle = JobHandle::immediate(Ok(vec![1, 2, 3]));
        assert!(handle.ready());
        assert_eq!(handle.get().unwrap(), vec![1, 2, 3]);
        assert_eq!(handle.engine(), None);
    }

    #[test]
    fn dropped_reply_side_reports_engine_gone() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let mut handle = JobHandle::pending(9, rx);
        assert!(!handle.ready());
        drop(tx);
        assert!(handle.ready());
        assert_eq!(handle.get(), Err(JobError::EngineGone));
    }
}
