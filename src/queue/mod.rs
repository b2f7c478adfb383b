//! Queue consumption strategies.
//!
//! The worker obtains job ids in one of two modes, chosen once at startup:
//!
//! - **Broker**: blocking pop from a Redis list with a bounded timeout.
//!   Each id is delivered to exactly one worker.
//! - **Polling** (fallback): list jobs from the job store on a fixed
//!   interval and pick those still `pending`.
//!
//! Polling does not reserve jobs. Two workers polling the same store can
//! both pick up the same pending job; the mode exists for local and offline
//! operation, not for running several workers side by side.

pub mod redis;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::QueueSettings;
use crate::error::{Result, WorkerError};
use crate::store::JobStore;
use crate::types::{JobId, JobStatus};

pub use self::redis::RedisQueue;

/// A named list of plain-text job ids.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Pops the next item, waiting at most `timeout`. `None` on timeout.
    async fn pop(&self, timeout: Duration) -> Result<Option<String>>;

    /// Appends an item to the tail of the queue.
    async fn push(&self, item: &str) -> Result<()>;
}

/// How the worker should obtain job ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueMode {
    /// Use the broker; fall back to polling if it cannot be reached at startup.
    #[default]
    Auto,
    /// Use the broker; refuse to start without it.
    Broker,
    /// Poll the job store; never connect to the broker.
    Poll,
}

impl QueueMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueMode::Auto => "auto",
            QueueMode::Broker => "broker",
            QueueMode::Poll => "poll",
        }
    }

    /// Parses a mode from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Some(QueueMode::Auto),
            "broker" | "redis" | "queue" => Some(QueueMode::Broker),
            "poll" | "polling" => Some(QueueMode::Poll),
            _ => None,
        }
    }
}

impl fmt::Display for QueueMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The resolved consumption strategy.
pub enum QueueConsumer {
    Broker {
        queue: Arc<dyn WorkQueue>,
        block_timeout: Duration,
    },
    Polling {
        store: Arc<dyn JobStore>,
        interval: Duration,
    },
}

impl QueueConsumer {
    /// Resolves the strategy from the outcome of a broker connection attempt.
    ///
    /// A failed connection is logged and degrades to polling.
    pub fn from_connection(
        connection: Result<Arc<dyn WorkQueue>>,
        store: Arc<dyn JobStore>,
        settings: &QueueSettings,
    ) -> Self {
        match connection {
            Ok(queue) => QueueConsumer::Broker {
                queue,
                block_timeout: settings.block_timeout,
            },
            Err(e) => {
                tracing::warn!(
                    error = %e.message,
                    poll_interval_secs = settings.poll_interval.as_secs(),
                    "Broker unavailable, falling back to polling the job store"
                );
                QueueConsumer::Polling {
                    store,
                    interval: settings.poll_interval,
                }
            }
        }
    }

    /// Connects according to `settings.mode`.
    ///
    /// Only [`QueueMode::Broker`] turns a connection failure into an error.
    pub async fn connect(settings: &QueueSettings, store: Arc<dyn JobStore>) -> Result<Self> {
        match settings.mode {
            QueueMode::Poll => {
                tracing::info!("Polling mode selected, not connecting to the broker");
                Ok(QueueConsumer::Polling {
                    store,
                    interval: settings.poll_interval,
                })
            }
            QueueMode::Broker => {
                let queue = RedisQueue::connect(&settings.redis_url, &settings.name).await?;
                Ok(QueueConsumer::Broker {
                    queue: Arc::new(queue),
                    block_timeout: settings.block_timeout,
                })
            }
            QueueMode::Auto => {
                let connection = RedisQueue::connect(&settings.redis_url, &settings.name)
                    .await
                    .map(|q| Arc::new(q) as Arc<dyn WorkQueue>);
                Ok(Self::from_connection(connection, store, settings))
            }
        }
    }

    /// Name of the active mode, for logs.
    pub fn mode(&self) -> &'static str {
        match self {
            QueueConsumer::Broker { .. } => "broker",
            QueueConsumer::Polling { .. } => "polling",
        }
    }

    pub fn is_polling(&self) -> bool {
        matches!(self, QueueConsumer::Polling { .. })
    }

    /// Delay before the next cycle once a batch has been handled.
    ///
    /// Broker mode already waits inside the blocking pop.
    pub fn idle_delay(&self) -> Duration {
        match self {
            QueueConsumer::Broker { .. } => Duration::ZERO,
            QueueConsumer::Polling { interval, .. } => *interval,
        }
    }

    /// Obtains the ids to process in this cycle.
    ///
    /// Broker mode yields at most one id; an empty batch means the pop timed
    /// out. Polling yields every pending id once, in listing order.
    pub async fn next_batch(&self) -> Result<Vec<JobId>> {
        match self {
            QueueConsumer::Broker {
                queue,
                block_timeout,
            } => match queue.pop(*block_timeout).await? {
                None => Ok(Vec::new()),
                Some(raw) => match JobId::parse(&raw) {
                    Some(id) => Ok(vec![id]),
                    None => {
                        tracing::warn!(item = %raw, "Ignoring blank queue item");
                        Ok(Vec::new())
                    }
                },
            },
            QueueConsumer::Polling { store, .. } => {
                let jobs = store.list().await?;
                let mut seen = HashSet::new();
                Ok(jobs
                    .into_iter()
                    .filter(|job| job.status == JobStatus::Pending)
                    .map(|job| job.id)
                    .filter(|id| seen.insert(id.clone()))
                    .collect())
            }
        }
    }

    /// Pushes an id onto the broker queue (what the job tracking API does on creation).
    pub async fn enqueue(&self, id: &JobId) -> Result<()> {
        match self {
            QueueConsumer::Broker { queue, .. } => queue.push(id.as_str()).await,
            QueueConsumer::Polling { .. } => Err(WorkerError::queue_unavailable(
                "Cannot enqueue in polling mode: no broker connection",
            )),
        }
    }
}
