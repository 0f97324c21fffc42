//! Batch worker pool provisioning via an external PBS scheduler
//!
//! Heavy ensemble processing is offloaded to worker processes allocated
//! through the site batch system. This module is a thin pass-through to the
//! scheduler's command-line tools: one `qsub` per single-core worker job,
//! `qdel` to release it, `qstat` to poll it. There is no retry, timeout, or
//! backoff; scheduler failures propagate unmodified as
//! [`ClusterError`](crate::errors::PpePostError::ClusterError).
//!
//! Releasing the allocation is the caller's responsibility: drop does not
//! release workers, [`ClusterClient::close`] does.

use crate::errors::{PpePostError, Result};
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use tokio::process::Command;

/// Worker count requested when the caller does not specify one
pub const DEFAULT_WORKER_COUNT: usize = 30;

/// Resource request for a single batch worker job.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Project account charged for the allocation
    pub account: String,
    /// Scheduler queue to submit into
    pub queue: String,
    /// Cores per worker job
    pub cores_per_worker: usize,
    /// Processes per worker job
    pub processes_per_worker: usize,
    /// Memory per worker job, in scheduler syntax
    pub memory: String,
    /// Wall time per worker job
    pub walltime: String,
    /// Scratch directory made available to each worker
    pub local_directory: String,
    /// Executable launched on each allocated node
    pub worker_command: String,
}

impl ClusterConfig {
    /// Default single-core, 10GB worker request on the `casper` queue.
    pub fn new(account: &str) -> Self {
        Self {
            account: account.to_string(),
            queue: "casper".to_string(),
            cores_per_worker: 1,
            processes_per_worker: 1,
            memory: "10GB".to_string(),
            walltime: "02:00:00".to_string(),
            local_directory: "$TMPDIR".to_string(),
            worker_command: "ppe-worker".to_string(),
        }
    }

    /// PBS resource selection, e.g. `select=1:ncpus=1:mem=10GB`.
    pub fn resource_spec(&self) -> String {
        format!(
            "select=1:ncpus={}:mem={}",
            self.cores_per_worker, self.memory
        )
    }

    /// Argument vector passed to `qsub` for one worker job.
    pub fn submit_args(&self) -> Vec<String> {
        vec![
            "-N".to_string(),
            "ppe-worker".to_string(),
            "-q".to_string(),
            self.queue.clone(),
            "-A".to_string(),
            self.account.clone(),
            "-l".to_string(),
            self.resource_spec(),
            "-l".to_string(),
            format!("walltime={}", self.walltime),
            "-v".to_string(),
            format!("TMPDIR={}", self.local_directory),
            "--".to_string(),
            self.worker_command.clone(),
        ]
    }
}

/// Scheduler-reported state of one worker job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Waiting in the queue (queued, held, or waiting)
    Queued,
    /// Running on an allocated node
    Running,
    /// Exiting or finished
    Finished,
}

/// The seam behind which the external batch system lives.
///
/// The production implementation shells out to the PBS tools; tests swap in
/// an in-memory provisioner.
#[async_trait]
pub trait ClusterProvisioner: Send + Sync {
    /// Request one worker job; returns the scheduler's job id.
    async fn submit_worker(&self, config: &ClusterConfig) -> Result<String>;

    /// Release one worker job.
    async fn release_worker(&self, job_id: &str) -> Result<()>;

    /// Poll the scheduler for a worker job's state.
    async fn poll_worker(&self, job_id: &str) -> Result<WorkerState>;
}

/// PBS batch system provisioner (`qsub` / `qdel` / `qstat`).
#[derive(Debug, Clone, Copy, Default)]
pub struct PbsScheduler;

#[async_trait]
impl ClusterProvisioner for PbsScheduler {
    async fn submit_worker(&self, config: &ClusterConfig) -> Result<String> {
        let output = Command::new("qsub")
            .args(config.submit_args())
            .output()
            .await
            .map_err(|e| PpePostError::ClusterError(format!("failed to run qsub: {}", e)))?;

        if !output.status.success() {
            return Err(PpePostError::ClusterError(format!(
                "qsub exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let job_id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if job_id.is_empty() {
            return Err(PpePostError::ClusterError(
                "qsub returned no job id".to_string(),
            ));
        }
        Ok(job_id)
    }

    async fn release_worker(&self, job_id: &str) -> Result<()> {
        let output = Command::new("qdel")
            .arg(job_id)
            .output()
            .await
            .map_err(|e| PpePostError::ClusterError(format!("failed to run qdel: {}", e)))?;

        if !output.status.success() {
            return Err(PpePostError::ClusterError(format!(
                "qdel {} exited with {}: {}",
                job_id,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    async fn poll_worker(&self, job_id: &str) -> Result<WorkerState> {
        let output = Command::new("qstat")
            .arg(job_id)
            .output()
            .await
            .map_err(|e| PpePostError::ClusterError(format!("failed to run qstat: {}", e)))?;

        if !output.status.success() {
            // PBS forgets finished jobs; qstat then exits non-zero
            return Ok(WorkerState::Finished);
        }

        parse_qstat_state(&String::from_utf8_lossy(&output.stdout), job_id)
    }
}

/// Parse one job's state letter out of tabular `qstat` output.
pub fn parse_qstat_state(stdout: &str, job_id: &str) -> Result<WorkerState> {
    for line in stdout.lines() {
        if !line.starts_with(job_id) {
            continue;
        }
        // Columns: Job id, Name, User, Time Use, S, Queue
        let state = line
            .split_whitespace()
            .nth(4)
            .and_then(|s| s.chars().next());
        return match state {
            Some('Q') | Some('H') | Some('W') => Ok(WorkerState::Queued),
            Some('R') => Ok(WorkerState::Running),
            Some('E') | Some('F') | Some('X') => Ok(WorkerState::Finished),
            other => Err(PpePostError::ClusterError(format!(
                "unrecognized qstat state {:?} for job {}",
                other, job_id
            ))),
        };
    }
    Err(PpePostError::ClusterError(format!(
        "job {} not found in qstat output",
        job_id
    )))
}

/// Owned handle to a pool of batch worker jobs.
///
/// Holds the job ids of every submitted worker. The pool is grown or shrunk
/// with [`scale`](Self::scale) and must be released explicitly with
/// [`close`](Self::close).
pub struct ClusterClient<P: ClusterProvisioner> {
    provisioner: P,
    config: ClusterConfig,
    workers: Vec<String>,
}

impl<P: ClusterProvisioner> ClusterClient<P> {
    /// Wrap a provisioner without submitting anything yet.
    pub fn new(provisioner: P, config: ClusterConfig) -> Self {
        Self {
            provisioner,
            config,
            workers: Vec::new(),
        }
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    pub fn job_ids(&self) -> &[String] {
        &self.workers
    }

    /// Grow or shrink the pool to exactly `count` workers.
    pub async fn scale(&mut self, count: usize) -> Result<()> {
        while self.workers.len() < count {
            let job_id = self.provisioner.submit_worker(&self.config).await?;
            self.workers.push(job_id);
        }
        while self.workers.len() > count {
            if let Some(job_id) = self.workers.pop() {
                self.provisioner.release_worker(&job_id).await?;
            }
        }
        println!(
            "✅ Worker pool scaled to {} job(s) on queue '{}'",
            self.workers.len(),
            self.config.queue
        );
        Ok(())
    }

    /// One scheduler poll per worker, as a stream of `(job_id, state)`.
    pub fn worker_states(
        &self,
    ) -> Pin<Box<dyn Stream<Item = Result<(String, WorkerState)>> + Send + '_>> {
        Box::pin(async_stream::stream! {
            for job_id in &self.workers {
                match self.provisioner.poll_worker(job_id).await {
                    Ok(state) => yield Ok((job_id.clone(), state)),
                    Err(e) => yield Err(e),
                }
            }
        })
    }

    /// Release every worker job and consume the handle.
    pub async fn close(mut self) -> Result<()> {
        while let Some(job_id) = self.workers.pop() {
            self.provisioner.release_worker(&job_id).await?;
        }
        println!("✅ Released all worker jobs");
        Ok(())
    }
}

/// Spin up a worker pool: request `workers` single-core 10GB jobs charged to
/// `account` (30 when unspecified) and return the client handle.
///
/// The caller owns the handle for the duration of the processing session and
/// releases the allocation with [`ClusterClient::close`].
pub async fn get_cluster(
    account: &str,
    workers: Option<usize>,
) -> Result<ClusterClient<PbsScheduler>> {
    let config = ClusterConfig::new(account);
    let mut client = ClusterClient::new(PbsScheduler, config);
    client.scale(workers.unwrap_or(DEFAULT_WORKER_COUNT)).await?;
    Ok(client)
}
