//! The worker loop.
//!
//! A single sequential loop: obtain a batch of ids from the consumer, fully
//! process each one, then wait before the next cycle. Errors local to a job
//! end in that job's outcome; errors obtaining ids are logged and retried
//! after a backoff. Neither ends the loop.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::processor::{JobProcessor, ProcessOutcome};
use crate::queue::QueueConsumer;
use crate::types::JobId;

/// Owns the consumption strategy and the job processor.
pub struct Worker {
    consumer: QueueConsumer,
    processor: Arc<JobProcessor>,
    retry_backoff: Duration,
}

impl Worker {
    pub fn new(
        consumer: QueueConsumer,
        processor: Arc<JobProcessor>,
        retry_backoff: Duration,
    ) -> Self {
        Self {
            consumer,
            processor,
            retry_backoff,
        }
    }

    pub fn consumer(&self) -> &QueueConsumer {
        &self.consumer
    }

    /// Runs one consumption cycle and processes everything it yields.
    ///
    /// Returns an error only when ids could not be obtained.
    pub async fn run_cycle(&self) -> Result<Vec<(JobId, ProcessOutcome)>> {
        let ids = self.consumer.next_batch().await?;
        let mut outcomes = Vec::with_capacity(ids.len());
        for id in ids {
            let outcome = self.processor.process(&id).await;
            outcomes.push((id, outcome));
        }
        Ok(outcomes)
    }

    /// Runs the loop until `cancel` is triggered.
    ///
    /// Cancellation interrupts idle waits only. A blocking pop runs to its
    /// timeout, and a job that has been fetched is always resolved.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            mode = self.consumer.mode(),
            idle_delay_ms = self.consumer.idle_delay().as_millis() as u64,
            "Worker started"
        );

        while !cancel.is_cancelled() {
            let delay = match self.consumer.next_batch().await {
                Ok(ids) => {
                    if !ids.is_empty() {
                        tracing::debug!(count = ids.len(), "Received jobs");
                    }
                    for (i, id) in ids.iter().enumerate() {
                        // Unprocessed ids stay pending in the store.
                        if i > 0 && cancel.is_cancelled() {
                            break;
                        }
                        let outcome = self.processor.process(id).await;
                        tracing::debug!(job_id = %id, outcome = %outcome, "Job handled");
                    }
                    self.consumer.idle_delay()
                }
                Err(e) if e.code.is_transient() => {
                    tracing::warn!(
                        mode = self.consumer.mode(),
                        code = e.code.as_str(),
                        error = %e.message,
                        backoff_secs = self.retry_backoff.as_secs_f64(),
                        "Could not obtain jobs, retrying"
                    );
                    self.retry_backoff
                }
                Err(e) => {
                    tracing::error!(
                        mode = self.consumer.mode(),
                        code = e.code.as_str(),
                        error = %e.message,
                        backoff_secs = self.retry_backoff.as_secs_f64(),
                        "Unexpected error obtaining jobs, retrying"
                    );
                    self.retry_backoff
                }
            };

            if delay.is_zero() {
                continue;
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        tracing::info!("Worker shutting down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueueSettings;
    use crate::error::WorkerError;
    use crate::queue::{QueueMode, WorkQueue};
    use crate::testing::{
        job, FakeBackend, FakeEncoder, FakeStorage, MemoryJobStore, MemoryQueue,
    };
    use crate::types::JobStatus;

    fn processor(store: Arc<MemoryJobStore>, backend: Arc<FakeBackend>) -> Arc<JobProcessor> {
        Arc::new(JobProcessor::new(
            store,
            backend,
            Arc::new(FakeEncoder::default()),
            Arc::new(FakeStorage::default()),
            "facebook/musicgen-medium",
        ))
    }

    fn settings() -> QueueSettings {
        QueueSettings {
            redis_url: "redis://127.0.0.1:1".to_string(),
            name: "jobs".to_string(),
            mode: QueueMode::Auto,
            block_timeout: Duration::from_millis(10),
            poll_interval: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn fallback_processes_exactly_the_pending_job() {
        let store = Arc::new(MemoryJobStore::with_jobs(vec![
            job("1", JobStatus::Completed),
            job("2", JobStatus::Pending),
            job("3", JobStatus::Failed),
            job("4", JobStatus::Processing),
        ]));
        let backend = Arc::new(FakeBackend::new());
        let consumer = QueueConsumer::from_connection(
            Err(WorkerError::queue_unavailable("connection refused")),
            store.clone(),
            &settings(),
        );
        assert!(consumer.is_polling());

        let worker = Worker::new(
            consumer,
            processor(store.clone(), backend.clone()),
            Duration::from_millis(10),
        );
        assert_eq!(worker.consumer().mode(), "polling");
        let outcomes = worker.run_cycle().await.unwrap();

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].0, JobId::from("2"));
        assert!(outcomes[0].1.is_completed());
        assert_eq!(backend.calls().len(), 1);
        assert_eq!(store.fetch_count(), 1);
        assert!(store.patches().iter().all(|(id, _)| id.as_str() == "2"));
        assert_eq!(store.status_of("2"), Some(JobStatus::Completed));
        assert_eq!(store.status_of("4"), Some(JobStatus::Processing));

        // Nothing is pending any more.
        assert!(worker.run_cycle().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn broker_cycle_processes_popped_id() {
        let store = Arc::new(MemoryJobStore::with_jobs(vec![
            job("7", JobStatus::Pending),
            job("8", JobStatus::Pending),
        ]));
        let backend = Arc::new(FakeBackend::new());
        let queue: Arc<dyn WorkQueue> = Arc::new(MemoryQueue::with_items(&["8"]));
        let consumer = QueueConsumer::from_connection(Ok(queue), store.clone(), &settings());

        let worker = Worker::new(
            consumer,
            processor(store.clone(), backend.clone()),
            Duration::from_millis(10),
        );
        let outcomes = worker.run_cycle().await.unwrap();

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].0, JobId::from("8"));
        assert_eq!(store.status_of("8"), Some(JobStatus::Completed));
        assert_eq!(store.status_of("7"), Some(JobStatus::Pending));

        // Empty queue: the pop times out and yields nothing.
        assert!(worker.run_cycle().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cycle_error_surfaces_listing_failure() {
        let store = Arc::new(
            MemoryJobStore::with_jobs(vec![job("1", JobStatus::Pending)]).failing_list(1),
        );
        let consumer = QueueConsumer::Polling {
            store: store.clone(),
            interval: Duration::from_millis(10),
        };
        let worker = Worker::new(
            consumer,
            processor(store.clone(), Arc::new(FakeBackend::new())),
            Duration::from_millis(10),
        );

        assert!(worker.run_cycle().await.is_err());
        let outcomes = worker.run_cycle().await.unwrap();
        assert_eq!(outcomes.len(), 1);
    }

    #[tokio::test]
    async fn loop_survives_errors_until_cancelled() {
        let store = Arc::new(
            MemoryJobStore::with_jobs(vec![job("1", JobStatus::Pending)]).failing_list(3),
        );
        let consumer = QueueConsumer::Polling {
            store: store.clone(),
            interval: Duration::from_millis(10),
        };
        let worker = Arc::new(Worker::new(
            consumer,
            processor(store.clone(), Arc::new(FakeBackend::new())),
            Duration::from_millis(5),
        ));

        let cancel = CancellationToken::new();
        let handle = tokio::spawn({
            let worker = worker.clone();
            let cancel = cancel.clone();
            async move { worker.run(cancel).await }
        });

        let mut completed = false;
        for _ in 0..200 {
            if store.status_of("1") == Some(JobStatus::Completed) {
                completed = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("worker did not stop")
            .unwrap();

        assert!(completed);
        assert_eq!(store.patches_for("1").len(), 2);
    }

    #[tokio::test]
    async fn cancellation_interrupts_idle_wait() {
        let store = Arc::new(MemoryJobStore::default());
        let consumer = QueueConsumer::Polling {
            store: store.clone(),
            interval: Duration::from_secs(3600),
        };
        let worker = Worker::new(
            consumer,
            processor(store, Arc::new(FakeBackend::new())),
            Duration::from_secs(3600),
        );

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        tokio::time::timeout(Duration::from_secs(2), worker.run(cancel))
            .await
            .expect("worker did not stop");
    }

    #[tokio::test]
    async fn broker_loop_drains_queue() {
        let store = Arc::new(MemoryJobStore::with_jobs(vec![
            job("1", JobStatus::Pending),
            job("2", JobStatus::Pending),
        ]));
        let queue = Arc::new(MemoryQueue::with_items(&["1", "2"]));
        let consumer = QueueConsumer::Broker {
            queue,
            block_timeout: Duration::from_millis(10),
        };
        let backend = Arc::new(FakeBackend::new());
        let worker = Arc::new(Worker::new(
            consumer,
            processor(store.clone(), backend.clone()),
            Duration::from_millis(10),
        ));

        let cancel = CancellationToken::new();
        let handle = tokio::spawn({
            let worker = worker.clone();
            let cancel = cancel.clone();
            async move { worker.run(cancel).await }
        });

        for _ in 0..200 {
            if store.status_of("2") == Some(JobStatus::Completed) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(store.status_of("1"), Some(JobStatus::Completed));
        assert_eq!(store.status_of("2"), Some(JobStatus::Completed));
        let durations: Vec<_> = backend.calls().into_iter().map(|c| c.duration_sec).collect();
        assert_eq!(durations, vec![15, 15]);
    }
}
