//! Command-line arguments for the worker binary.
//!
//! Flags override the matching environment variables; everything else comes
//! from [`WorkerConfig::from_env`](crate::config::WorkerConfig::from_env).

use clap::{Parser, ValueEnum};

use crate::config::WorkerConfig;
use crate::queue::QueueMode;

/// Queue consumption mode selectable on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Use Redis, fall back to polling if it is unreachable at startup
    Auto,
    /// Require Redis
    Broker,
    /// Poll the job tracking API for pending jobs
    Poll,
}

impl From<ModeArg> for QueueMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Auto => QueueMode::Auto,
            ModeArg::Broker => QueueMode::Broker,
            ModeArg::Poll => QueueMode::Poll,
        }
    }
}

/// sonicforge-worker: consumes music generation jobs and reports results
#[derive(Parser, Debug)]
#[command(name = "sonicforge-worker")]
#[command(about = "Music generation job worker for the SonicForge job tracking API")]
#[command(version)]
pub struct Cli {
    /// Queue consumption mode (overrides QUEUE_MODE)
    #[arg(short, long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Job tracking API base URL (overrides API_URL)
    #[arg(long)]
    pub api_url: Option<String>,

    /// Redis connection string (overrides REDIS_URL)
    #[arg(long)]
    pub redis_url: Option<String>,

    /// Generation endpoint base URL (overrides GENERATION_URL)
    #[arg(long)]
    pub generation_url: Option<String>,

    /// Run a single consumption cycle, then exit
    #[arg(long)]
    pub once: bool,

    /// Check the generation endpoint and exit
    #[arg(long, conflicts_with_all = ["once", "enqueue"])]
    pub health: bool,

    /// Push a job id onto the work queue and exit
    #[arg(long, value_name = "JOB_ID", conflicts_with = "once")]
    pub enqueue: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Returns true if only the health check should run.
    pub fn is_health_mode(&self) -> bool {
        self.health
    }

    /// Returns true if the process should only enqueue an id.
    pub fn is_enqueue_mode(&self) -> bool {
        self.enqueue.is_some()
    }

    /// Returns true if running the long-lived consumption loop.
    pub fn is_worker_mode(&self) -> bool {
        !self.health && self.enqueue.is_none() && !self.once
    }

    /// Applies command-line overrides to a config loaded from the environment.
    pub fn apply(&self, config: &mut WorkerConfig) {
        if let Some(mode) = self.mode {
            config.queue.mode = mode.into();
        }
        if let Some(ref url) = self.api_url {
            config.api_url = url.clone();
        }
        if let Some(ref url) = self.redis_url {
            config.queue.redis_url = url.clone();
        }
        if let Some(ref url) = self.generation_url {
            config.generation_url = url.clone();
        }
    }
}
