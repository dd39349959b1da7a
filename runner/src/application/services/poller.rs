//! Bounded polling loop.
//!
//! The loop owns its interval timer and, when bounded, its timeout timer.
//! Both live inside the returned future, so they are dropped on every exit
//! path: satisfied, timed out, probe error, or the caller dropping the future.

use std::future::Future;
use std::time::Duration;

use anyhow::{Result, ensure};
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::domain::PollState;

/// Run `probe` every `every` until it returns a terminal state.
///
/// The first probe runs one interval after the call. With `limit` set, the
/// loop resolves to [`PollState::TimedOut`] once `limit` has elapsed, even
/// while a probe is in flight. Probe errors abort the loop.
///
/// # Errors
///
/// Returns an error if `every` is zero or a probe fails.
pub async fn poll_until<T, F, Fut>(
    every: Duration,
    limit: Option<Duration>,
    mut probe: F,
) -> Result<PollState<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<PollState<T>>>,
{
    ensure!(!every.is_zero(), "polling interval must be greater than zero");

    let ticking = async {
        let mut ticker = time::interval_at(Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let state = probe().await?;
            if state.is_terminal() {
                return Ok::<_, anyhow::Error>(state);
            }
        }
    };

    match limit {
        Some(limit) => match time::timeout(limit, ticking).await {
            Ok(result) => result,
            Err(_elapsed) => Ok(PollState::TimedOut),
        },
        None => ticking.await,
    }
}
