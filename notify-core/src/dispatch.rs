//! The dispatcher: an in-process job queue with a bounded delivery worker
//! pool. Enqueue is non-blocking; delivery, retries, and terminal failure
//! handling all happen off the caller's path.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use uuid::Uuid;

use crate::config::DispatchConfig;
use crate::job::{JobState, JobStatus, NotificationJob};
use crate::transport::{MailTransport, TransportError};

enum Command {
    Deliver(NotificationJob),
    Shutdown,
}

/// Cloneable handle to the dispatch queue. All clones share one run loop.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    tx: mpsc::UnboundedSender<Command>,
    jobs: Arc<DashMap<Uuid, JobState>>,
    runner: Mutex<Option<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Spawn the run loop on the current runtime and return a handle to it.
    pub fn start(transport: Arc<dyn MailTransport>, config: DispatchConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let jobs: Arc<DashMap<Uuid, JobState>> = Arc::new(DashMap::new());
        let runner = tokio::spawn(run(rx, transport, jobs.clone(), config));

        Self {
            inner: Arc::new(DispatcherInner {
                tx,
                jobs,
                runner: Mutex::new(Some(runner)),
            }),
        }
    }

    /// Queue a job for delivery and return immediately. A stopped dispatcher
    /// records the job as failed rather than surfacing an error: delivery
    /// outcome must never reach back into the operation that triggered it.
    pub fn enqueue(&self, job: NotificationJob) -> Uuid {
        let job_id = job.job_id;
        self.inner.jobs.insert(job_id, JobState::queued());

        if self.inner.tx.send(Command::Deliver(job)).is_err() {
            tracing::error!(job_id = %job_id, "dispatcher stopped, notification dropped");
            if let Some(mut state) = self.inner.jobs.get_mut(&job_id) {
                state.status = JobStatus::Failed;
                state.error = Some("dispatcher stopped".to_string());
            }
        }

        job_id
    }

    /// Current state of a job, if it was ever enqueued on this dispatcher.
    pub fn job_state(&self, job_id: Uuid) -> Option<JobState> {
        self.inner.jobs.get(&job_id).map(|state| state.clone())
    }

    /// Stop accepting work and wait for in-flight deliveries (including
    /// their retries) to reach a terminal state.
    pub async fn shutdown(&self) {
        let _ = self.inner.tx.send(Command::Shutdown);
        let handle = self.inner.runner.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

async fn run(
    mut rx: mpsc::UnboundedReceiver<Command>,
    transport: Arc<dyn MailTransport>,
    jobs: Arc<DashMap<Uuid, JobState>>,
    config: DispatchConfig,
) {
    let permits = Arc::new(Semaphore::new(config.workers));
    let mut inflight = JoinSet::new();

    while let Some(command) = rx.recv().await {
        match command {
            Command::Deliver(job) => {
                let permit = match permits.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };
                let transport = transport.clone();
                let jobs = jobs.clone();
                let config = config.clone();
                inflight.spawn(async move {
                    let _permit = permit;
                    deliver_with_retry(job, transport, jobs, config).await;
                });
                // Reap finished deliveries so the set does not grow unbounded.
                while inflight.try_join_next().is_some() {}
            }
            Command::Shutdown => break,
        }
    }

    while inflight.join_next().await.is_some() {}
}

async fn deliver_with_retry(
    mut job: NotificationJob,
    transport: Arc<dyn MailTransport>,
    jobs: Arc<DashMap<Uuid, JobState>>,
    config: DispatchConfig,
) {
    loop {
        job.attempts += 1;
        if let Some(mut state) = jobs.get_mut(&job.job_id) {
            state.attempts = job.attempts;
        }

        let outcome = match tokio::time::timeout(
            config.delivery_timeout,
            transport.deliver(&job.message),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(config.delivery_timeout)),
        };

        match outcome {
            Ok(()) => {
                if let Some(mut state) = jobs.get_mut(&job.job_id) {
                    state.status = JobStatus::Delivered;
                }
                tracing::info!(
                    job_id = %job.job_id,
                    recipient = %job.message.to,
                    attempt = job.attempts,
                    "notification delivered"
                );
                return;
            }
            Err(err) if !err.is_transient() => {
                mark_failed(&jobs, &job, &err);
                tracing::warn!(
                    job_id = %job.job_id,
                    recipient = %job.message.to,
                    error = %err,
                    "notification failed with permanent error, not retrying"
                );
                return;
            }
            Err(err) if job.attempts >= job.max_attempts => {
                mark_failed(&jobs, &job, &err);
                tracing::warn!(
                    job_id = %job.job_id,
                    recipient = %job.message.to,
                    attempts = job.attempts,
                    error = %err,
                    "notification failed after max attempts"
                );
                return;
            }
            Err(err) => {
                let backoff = config.backoff_duration(job.attempts - 1);
                tracing::warn!(
                    job_id = %job.job_id,
                    attempt = job.attempts,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "delivery failed, retrying after backoff"
                );
                tokio::time::sleep(backoff).await;
            }
        }
    }
}

fn mark_failed(jobs: &DashMap<Uuid, JobState>, job: &NotificationJob, err: &TransportError) {
    if let Some(mut state) = jobs.get_mut(&job.job_id) {
        state.status = JobStatus::Failed;
        state.error = Some(err.to_string());
    }
}
