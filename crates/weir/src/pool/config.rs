use crate::error::{Error, Result};
use tokio_util::sync::CancellationToken;

/// Settings for [`WorkerPool::start`](crate::WorkerPool::start).
///
/// Queue and sink capacities belong to the queue and sink themselves; the
/// pool only decides how many workers drain one into the other and which
/// token stops them.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of workers to launch. Must be at least 1.
    pub num_workers: usize,

    /// Cancelling this token makes every worker stop after its current item.
    ///
    /// Share one token between several pools to stop them together.
    pub shutdown_token: CancellationToken,
}

impl PoolConfig {
    pub fn new(num_workers: usize) -> Self {
        Self {
            num_workers,
            shutdown_token: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_shutdown_token(mut self, shutdown_token: CancellationToken) -> Self {
        self.shutdown_token = shutdown_token;
        self
    }

    /// Rejects configurations the pool cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `num_workers` is 0.
    pub fn validate(&self) -> Result<()> {
        if self.num_workers == 0 {
            return Err(Error::InvalidConfig {
                reason: "num_workers must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    /// One worker per available core.
    fn default() -> Self {
        Self::new(num_cpus::get())
    }
}
