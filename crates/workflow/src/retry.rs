use lambda_runtime::tracing;
use provider::ProviderError;
use std::future::Future;
use std::time::Duration;

/// Bounded exponential backoff.
///
/// `max_attempts` counts every call, including the first, so a policy with
/// ten attempts waits at most nine times.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    interval: Duration,
    backoff_rate: f64,
    max_attempts: u32,
    max_delay: Option<Duration>,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RetryPolicyError {
    #[error("backoff rate must be a finite number >= 1, got {0}")]
    BackoffRate(f64),
    #[error("at least one attempt is required")]
    NoAttempts,
}

impl RetryPolicy {
    pub fn new(
        interval: Duration,
        backoff_rate: f64,
        max_attempts: u32,
    ) -> Result<Self, RetryPolicyError> {
        if !backoff_rate.is_finite() || backoff_rate < 1.0 {
            return Err(RetryPolicyError::BackoffRate(backoff_rate));
        }
        if max_attempts == 0 {
            return Err(RetryPolicyError::NoAttempts);
        }

        Ok(RetryPolicy {
            interval,
            backoff_rate,
            max_attempts,
            max_delay: None,
        })
    }

    /// 30 seconds doubling, ten polls in total.
    pub fn export_poll() -> Self {
        RetryPolicy {
            interval: Duration::from_secs(30),
            backoff_rate: 2.0,
            max_attempts: 10,
            max_delay: None,
        }
    }

    /// Short policy for transient query engine failures.
    pub fn transient_ddl() -> Self {
        RetryPolicy {
            interval: Duration::from_secs(1),
            backoff_rate: 2.0,
            max_attempts: 3,
            max_delay: None,
        }
    }

    /// Cap any single wait
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait before the next call once `attempt` (1 based) has failed.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent: i32 = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let seconds: f64 = self.interval.as_secs_f64() * self.backoff_rate.powi(exponent);
        let delay: Duration = Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX);

        match self.max_delay {
            Some(max_delay) => delay.min(max_delay),
            None => delay,
        }
    }

    /// Every wait the policy allows, in order.
    pub fn schedule(&self) -> impl Iterator<Item = Duration> + '_ {
        (1..self.max_attempts).map(|attempt| self.delay_after(attempt))
    }

    /// Upper bound of time spent waiting when every attempt is used.
    pub fn total_wait(&self) -> Duration {
        self.schedule().fold(Duration::ZERO, Duration::saturating_add)
    }
}

/// Run `operation`, retrying only transient provider errors within the policy.
pub async fn retry_transient<T, F, Fut>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut attempt: u32 = 1;

    loop {
        match operation().await {
            Err(err) if err.is_transient() && attempt < policy.max_attempts() => {
                let delay: Duration = policy.delay_after(attempt);
                tracing::warn!(attempt, ?delay, error = %err, "Transient provider failure, retrying");

                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}
