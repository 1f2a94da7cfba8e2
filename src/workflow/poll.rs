use std::{future::Future, time::Duration};
use tokio::time::{sleep, Instant};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollOutcome<T> {
    Ready { value: T, attempts: usize },
    TimedOut { attempts: usize },
}

/// Repeats a probe at a fixed interval until it yields a value or the
/// deadline passes. Time comes from `tokio::time`, so a paused runtime
/// drives it without real delays.
#[derive(Clone, Debug)]
pub struct RetryWithDeadline {
    interval: Duration,
    deadline: Instant,
}

impl RetryWithDeadline {
    pub fn new(interval: Duration, deadline: Instant) -> Self {
        Self { interval, deadline }
    }

    /// Deadline measured from now.
    pub fn within(interval: Duration, ceiling: Duration) -> Self {
        Self::new(interval, Instant::now() + ceiling)
    }

    /// Runs `probe` with the 1-based attempt number. `Ok(None)` means "not
    /// yet" and schedules another attempt, an `Err` stops immediately.
    pub async fn run<T, E, F, Fut>(&self, mut probe: F) -> Result<PollOutcome<T>, E>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
    {
        let mut attempts = 0;

        while Instant::now() < self.deadline {
            attempts += 1;
            if let Some(value) = probe(attempts).await? {
                return Ok(PollOutcome::Ready { value, attempts });
            }
            sleep(self.interval).await;
        }

        Ok(PollOutcome::TimedOut { attempts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    #[tokio::test(start_paused = true)]
    async fn stops_on_first_ready_value() {
        let start = Instant::now();
        let retry = RetryWithDeadline::within(Duration::from_secs(1), Duration::from_secs(120));

        let outcome = retry
            .run(|attempt| async move { Ok::<_, Infallible>((attempt == 4).then_some("done")) })
            .await
            .unwrap();

        assert_eq!(
            outcome,
            PollOutcome::Ready {
                value: "done",
                attempts: 4
            }
        );
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_at_the_deadline() {
        let start = Instant::now();
        let retry = RetryWithDeadline::within(Duration::from_secs(1), Duration::from_secs(120));

        let outcome = retry
            .run(|_| async { Ok::<Option<()>, Infallible>(None) })
            .await
            .unwrap();

        assert_eq!(outcome, PollOutcome::TimedOut { attempts: 120 });
        assert!(start.elapsed() >= Duration::from_secs(120));
        assert!(start.elapsed() < Duration::from_secs(121));
    }

    #[tokio::test(start_paused = true)]
    async fn probe_error_aborts() {
        let retry = RetryWithDeadline::within(Duration::from_secs(1), Duration::from_secs(120));

        let result = retry
            .run(|attempt| async move {
                if attempt == 2 {
                    Err("upstream gone")
                } else {
                    Ok::<Option<()>, _>(None)
                }
            })
            .await;

        assert_eq!(result, Err("upstream gone"));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_deadline_never_probes() {
        let retry = RetryWithDeadline::new(Duration::from_secs(1), Instant::now());
        let mut called = false;

        let outcome = retry
            .run(|_| {
                called = true;
                async { Ok::<Option<()>, Infallible>(None) }
            })
            .await
            .unwrap();

        assert_eq!(outcome, PollOutcome::TimedOut { attempts: 0 });
        assert!(!called);
    }
}
