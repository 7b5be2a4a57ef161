//! Retry strategy with exponential backoff for transient `SyncError`s.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{SyncError, SyncResult};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    pub max_retries: u32,
    /// Initial delay between retries.
    pub initial_delay: Duration,
    /// Maximum delay (cap for exponential growth).
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays.
    pub jitter: bool,
}

impl RetryConfig {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Calculate delay for a given attempt number.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_delay =
            self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32);

        let capped_delay = base_delay.min(self.max_delay.as_millis() as f64);

        let final_delay = if self.jitter {
            let jitter_factor = 0.75 + (rand::random::<f64>() * 0.5);
            capped_delay * jitter_factor
        } else {
            capped_delay
        };

        Duration::from_millis(final_delay as u64)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Retry executor for running fallible async operations against the
/// `SyncError` taxonomy's transient categories
/// (`network_error`/`timeout`/`service_unavailable`/`api_rate_limit`).
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Execute an operation, retrying while `is_retryable` holds.
    pub async fn execute<F, Fut, T>(&self, operation: F) -> SyncResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = SyncResult<T>>,
    {
        self.execute_with_condition(operation, Self::is_retryable).await
    }

    /// Execute with a custom retry predicate.
    pub async fn execute_with_condition<F, Fut, T, C>(
        &self,
        operation: F,
        should_retry: C,
    ) -> SyncResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = SyncResult<T>>,
        C: Fn(&SyncError) -> bool,
    {
        let mut attempt = 0;
        let mut last_error: Option<SyncError> = None;

        loop {
            match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        debug!("operation succeeded after {} retries", attempt);
                    }
                    return Ok(result);
                }
                Err(err) => {
                    if !should_retry(&err) {
                        return Err(err);
                    }

                    attempt += 1;
                    if attempt > self.config.max_retries {
                        warn!(
                            "operation failed after {} attempts: {}",
                            self.config.max_retries, err
                        );
                        return Err(last_error.unwrap_or(err));
                    }

                    let delay = self.config.delay_for_attempt(attempt - 1);
                    warn!("attempt {} failed: {}. retrying in {:?}...", attempt, err, delay);

                    last_error = Some(err);
                    sleep(delay).await;
                }
            }
        }
    }

    /// Retryable iff the error's category is transient, per §7.
    fn is_retryable(err: &SyncError) -> bool {
        err.is_transient()
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

/// Convenience function for simple retry with defaults.
pub async fn retry<F, Fut, T>(operation: F) -> SyncResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = SyncResult<T>>,
{
    RetryExecutor::default().execute(operation).await
}

/// Convenience function for retry with custom config.
pub async fn retry_with_config<F, Fut, T>(config: RetryConfig, operation: F) -> SyncResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = SyncResult<T>>,
{
    RetryExecutor::new(config).execute(operation).await
}

/// Circuit breaker states, following the standard closed/open/half-open
/// machine: failures accumulate in `Closed`, `Open` short-circuits calls
/// until the reset timeout elapses, `HalfOpen` allows one probe through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Tracks consecutive failures for a single remote backend and trips
/// open once `failure_threshold` is reached, failing fast with
/// `SyncErrorType::CircuitBreakerOpen` until `reset_timeout` has passed.
pub struct CircuitBreaker {
    failure_threshold: u32,
    reset_timeout: Duration,
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<std::time::Instant>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            failure_threshold,
            reset_timeout,
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    /// Returns `Err(circuit_breaker_open)` if the breaker is open and the
    /// reset timeout has not yet elapsed; transitions to `HalfOpen`
    /// otherwise and lets the caller proceed with a single probe.
    fn check(&mut self) -> SyncResult<()> {
        match self.state {
            CircuitState::Closed => Ok(()),
            CircuitState::HalfOpen => Ok(()),
            CircuitState::Open => {
                let elapsed = self.opened_at.map(|t| t.elapsed()).unwrap_or_default();
                if elapsed >= self.reset_timeout {
                    debug!("circuit breaker entering half-open probe state");
                    self.state = CircuitState::HalfOpen;
                    Ok(())
                } else {
                    Err(SyncError::new(
                        crate::error::SyncErrorType::CircuitBreakerOpen,
                        format!("circuit breaker open, retry after {:?}", self.reset_timeout - elapsed),
                    ))
                }
            }
        }
    }

    fn on_success(&mut self) {
        self.consecutive_failures = 0;
        self.state = CircuitState::Closed;
        self.opened_at = None;
    }

    fn on_failure(&mut self) {
        self.consecutive_failures += 1;
        if self.consecutive_failures >= self.failure_threshold {
            if self.state != CircuitState::Open {
                warn!(
                    "circuit breaker tripped open after {} consecutive failures",
                    self.consecutive_failures
                );
            }
            self.state = CircuitState::Open;
            self.opened_at = Some(std::time::Instant::now());
        }
    }

    /// Run `operation` through the breaker, updating its state based on
    /// the outcome.
    pub async fn call<F, Fut, T>(&mut self, operation: F) -> SyncResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SyncResult<T>>,
    {
        self.check()?;
        match operation().await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(err) => {
                self.on_failure();
                Err(err)
            }
        }
    }
}
