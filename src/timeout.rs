//! Budgets for classification work.
//!
//! [`EvalBudget`] bounds a single evaluation by rule count and wall-clock
//! time from inside the matching loop. [`with_timeout`] bounds an async
//! operation from the outside, which is how a service host should wrap
//! classification of untrusted input.

use crate::error::{Result, SigilError};
use crate::handle::{Classification, Classifier};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, error, warn};

/// Default budget for a wrapped classification in milliseconds.
pub const DEFAULT_TIMEOUT_MILLIS: u64 = 5_000;

/// Timeout configuration for an async operation.
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Maximum duration for the operation
    pub duration: Duration,
    /// Whether to log timeout warnings
    pub log_warnings: bool,
    /// Operation name for logging
    pub operation_name: String,
}

impl TimeoutConfig {
    pub fn new(millis: u64, operation: impl Into<String>) -> Self {
        Self {
            duration: Duration::from_millis(millis),
            log_warnings: true,
            operation_name: operation.into(),
        }
    }

    /// The default five second budget.
    pub fn default_timeout(operation: impl Into<String>) -> Self {
        Self::new(DEFAULT_TIMEOUT_MILLIS, operation)
    }
}

/// Execute an async operation with a timeout.
pub async fn with_timeout<T, F>(config: TimeoutConfig, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    debug!(
        operation = %config.operation_name,
        millis = config.duration.as_millis() as u64,
        "starting operation with timeout"
    );

    match timeout(config.duration, future).await {
        Ok(result) => result,
        Err(_) => {
            let millis = config.duration.as_millis() as u64;
            if config.log_warnings {
                error!(operation = %config.operation_name, millis, "operation timed out");
            }
            Err(SigilError::Timeout { millis })
        }
    }
}

/// Classify `data` on the blocking pool, giving up after `config.duration`.
///
/// The evaluation itself keeps running to completion on its worker thread;
/// only the caller stops waiting.
pub async fn classify_with_timeout(
    classifier: Classifier,
    data: Vec<u8>,
    config: TimeoutConfig,
) -> Result<Classification> {
    with_timeout(config, async move {
        tokio::task::spawn_blocking(move || classifier.classify_bytes(&data))
            .await
            .map_err(|e| SigilError::Internal(format!("classification task failed: {}", e)))?
    })
    .await
}

/// Step and time budget checked from inside the evaluation loop.
pub struct EvalBudget {
    start: Instant,
    max_duration: Option<Duration>,
    max_steps: usize,
    check_interval: usize,
    steps: usize,
}

impl EvalBudget {
    /// `max_millis == 0` disables the wall-clock bound.
    pub fn new(max_steps: usize, max_millis: u64) -> Self {
        Self {
            start: Instant::now(),
            max_duration: (max_millis > 0).then(|| Duration::from_millis(max_millis)),
            max_steps,
            check_interval: 256,
            steps: 0,
        }
    }

    /// Set how often the clock is read.
    pub fn with_check_interval(mut self, interval: usize) -> Self {
        self.check_interval = interval.max(1);
        self
    }

    /// Account for one rule evaluation.
    pub fn check(&mut self) -> Result<()> {
        self.steps += 1;
        if self.steps > self.max_steps {
            warn!(steps = self.max_steps, "evaluation budget exhausted");
            return Err(SigilError::Budget {
                steps: self.max_steps,
            });
        }

        // Only read the clock every N steps.
        if let Some(max) = self.max_duration {
            if self.steps % self.check_interval == 0 {
                let elapsed = self.start.elapsed();
                if elapsed > max {
                    warn!(steps = self.steps, ?elapsed, "evaluation timed out");
                    return Err(SigilError::Timeout {
                        millis: max.as_millis() as u64,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Macro for adding budget checks to loops
#[macro_export]
macro_rules! check_timeout {
    ($budget:expr) => {
        $budget.check()?
    };
    ($budget:expr, $msg:expr) => {
        $budget.check().map_err(|e| {
            tracing::debug!("budget exhausted in {}: {}", $msg, e);
            e
        })?
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_async_timeout_success() {
        let config = TimeoutConfig::new(1000, "test_operation");

        let result = with_timeout(config, async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(42)
        })
        .await;

        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_async_timeout_failure() {
        let config = TimeoutConfig::new(50, "test_operation");

        let result: Result<i32> = with_timeout(config, async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            Ok(42)
        })
        .await;

        assert!(matches!(result, Err(SigilError::Timeout { millis: 50 })));
    }

    #[test]
    fn test_step_budget() {
        let mut budget = EvalBudget::new(100, 0);
        for _ in 0..100 {
            budget.check().unwrap();
        }
        assert!(matches!(
            budget.check(),
            Err(SigilError::Budget { steps: 100 })
        ));
        assert_eq!(budget.steps(), 101);
    }

    #[test]
    fn test_wall_clock_budget() {
        let mut budget = EvalBudget::new(usize::MAX, 1).with_check_interval(1);
        std::thread::sleep(Duration::from_millis(20));
        assert!(matches!(
            budget.check(),
            Err(SigilError::Timeout { millis: 1 })
        ));
    }

    #[test]
    fn test_check_timeout_macro() {
        fn run(budget: &mut EvalBudget) -> Result<usize> {
            loop {
                check_timeout!(budget, "test loop");
            }
        }
        let mut budget = EvalBudget::new(10, 0);
        assert!(run(&mut budget).is_err());
    }
}
