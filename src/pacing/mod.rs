//! Account rotation and request pacing.
//!
//! The remote service throttles accounts that query too often and answers
//! with verification challenges. This module keeps the pool of accounts
//! ordered, spaces the requests of each account with a jittered delay, and
//! makes the whole pool cool down once every account has been used.
//!
//! # Overview
//!
//! - [`AccountRotator`]: the active account index and one pacing clock per account
//! - [`jitter_delay`]: the randomized minimum spacing between two requests
//! - [`ReminderCadence`]: a coarse "at most once per period" gate
//!
//! All waits are raced against a [`CancellationToken`] so that shutdown
//! never blocks on a long cooldown.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use tgtg_ant::pacing::{jitter_delay, AccountRotator};
//!
//! let period = Duration::from_secs(45);
//! let delay = jitter_delay(period);
//! assert!(delay >= Duration::from_secs(30) && delay < Duration::from_secs(60));
//!
//! let mut rotator = AccountRotator::new(3, period, Duration::from_secs(5400));
//! assert_eq!(rotator.advance(), 1);
//! assert_eq!(rotator.advance(), 2);
//! assert_eq!(rotator.advance(), 0);
//! ```

use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::clients::TransportError;

/// Returns a random delay uniformly drawn from `[2P/3, 4P/3)`.
///
/// A zero period yields a zero delay.
#[must_use]
pub fn jitter_delay(period: Duration) -> Duration {
    jitter_delay_with(period, &mut rand::thread_rng())
}

/// Same as [`jitter_delay`] with an explicit random source.
pub fn jitter_delay_with<R: Rng>(period: Duration, rng: &mut R) -> Duration {
    let nanos = period.as_nanos();
    let low = nanos * 2 / 3;
    let high = nanos * 4 / 3;
    if low >= high {
        return Duration::from_nanos(saturating_nanos(low));
    }
    Duration::from_nanos(saturating_nanos(rng.gen_range(low..high)))
}

fn saturating_nanos(nanos: u128) -> u64 {
    u64::try_from(nanos).unwrap_or(u64::MAX)
}

/// Sleeps for `duration`, returning early with
/// [`TransportError::Cancelled`] when `cancel` fires.
///
/// # Errors
///
/// Returns [`TransportError::Cancelled`] if the token is, or becomes,
/// cancelled.
pub async fn sleep_or_cancel(
    duration: Duration,
    cancel: &CancellationToken,
) -> Result<(), TransportError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(TransportError::Cancelled),
        () = tokio::time::sleep(duration) => Ok(()),
    }
}

/// The ordered account pool cursor and per-account pacing clocks.
///
/// The rotator only deals with indices; the accounts themselves live in the
/// configuration.
#[derive(Debug)]
pub struct AccountRotator {
    current: usize,
    last_query: Vec<Option<Instant>>,
    period: Duration,
    cooldown: Duration,
}

impl AccountRotator {
    /// Creates a rotator for `accounts` accounts, starting at index 0.
    ///
    /// A pool size of zero is treated as one.
    #[must_use]
    pub fn new(accounts: usize, period: Duration, cooldown: Duration) -> Self {
        Self {
            current: 0,
            last_query: vec![None; accounts.max(1)],
            period,
            cooldown,
        }
    }

    /// Returns the index of the active account.
    #[must_use]
    pub const fn current(&self) -> usize {
        self.current
    }

    /// Returns the number of accounts in the pool.
    #[must_use]
    pub fn len(&self) -> usize {
        self.last_query.len()
    }

    /// Always `false`: a pool holds at least one account.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.last_query.is_empty()
    }

    /// Returns when `account` last sent a paced request.
    #[must_use]
    pub fn last_query(&self, account: usize) -> Option<Instant> {
        self.last_query.get(account).copied().flatten()
    }

    /// Moves to the next account without waiting and returns its index.
    ///
    /// A single-account pool never moves.
    pub fn advance(&mut self) -> usize {
        if self.len() > 1 {
            self.current = (self.current + 1) % self.len();
        }
        self.current
    }

    /// Remaining cooldown before the first account may be used again.
    ///
    /// Only meaningful right after the rotation wrapped to index 0.
    #[must_use]
    pub fn cooldown_wait(&self, now: Instant) -> Duration {
        self.last_query(0)
            .map_or(Duration::ZERO, |last| (last + self.cooldown).saturating_duration_since(now))
    }

    /// Moves to the next account and returns its index.
    ///
    /// When the rotation wraps back to the first account, waits until the
    /// cooldown since that account's last request has elapsed.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Cancelled`] if shutdown is requested while
    /// cooling down.
    pub async fn rotate(&mut self, cancel: &CancellationToken) -> Result<usize, TransportError> {
        let before = self.current;
        let next = self.advance();
        if next == 0 && before != 0 {
            let wait = self.cooldown_wait(Instant::now());
            if !wait.is_zero() {
                tracing::warn!(
                    "every account was challenged, cooling down for {}",
                    humantime::format_duration(wait)
                );
                sleep_or_cancel(wait, cancel).await?;
            }
        }
        Ok(next)
    }

    /// Wait required before `account` may send its next request, given a
    /// drawn jitter delay.
    ///
    /// The first request of an account never waits.
    #[must_use]
    pub fn pacing_wait(&self, account: usize, jitter: Duration, now: Instant) -> Duration {
        self.last_query(account).map_or(Duration::ZERO, |last| {
            jitter.saturating_sub(now.saturating_duration_since(last))
        })
    }

    /// Waits as long as [`pacing_wait`](Self::pacing_wait) requires, then
    /// stamps the account's clock.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Cancelled`] if shutdown is requested while
    /// waiting. The clock is not stamped in that case.
    pub async fn pace(
        &mut self,
        account: usize,
        cancel: &CancellationToken,
    ) -> Result<(), TransportError> {
        let wait = self.pacing_wait(account, jitter_delay(self.period), Instant::now());
        if !wait.is_zero() {
            tracing::debug!("pacing: waiting {:?} before next request", wait);
            sleep_or_cancel(wait, cancel).await?;
        }
        self.stamp(account, Instant::now());
        Ok(())
    }

    /// Records a request of `account` at `now`.
    pub fn stamp(&mut self, account: usize, now: Instant) {
        if let Some(slot) = self.last_query.get_mut(account) {
            *slot = Some(now);
        }
    }
}

/// Gate allowing an action at most once per period.
///
/// The first check is always due.
#[derive(Debug)]
pub struct ReminderCadence {
    period: Duration,
    last: Option<Instant>,
}

impl ReminderCadence {
    /// Creates a cadence with the given period.
    #[must_use]
    pub const fn new(period: Duration) -> Self {
        Self { period, last: None }
    }

    /// Returns `true`, and restarts the period, when the action is due.
    pub fn due(&mut self, now: Instant) -> bool {
        let due = self
            .last
            .map_or(true, |last| now.saturating_duration_since(last) >= self.period);
        if due {
            self.last = Some(now);
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const PERIOD: Duration = Duration::from_secs(45);
    const COOLDOWN: Duration = Duration::from_secs(90 * 60);

    #[test]
    fn test_jitter_delay_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..10_000 {
            let delay = jitter_delay_with(PERIOD, &mut rng);
            assert!(delay >= Duration::from_secs(30), "{delay:?} too short");
            assert!(delay < Duration::from_secs(60), "{delay:?} too long");
        }
    }

    #[test]
    fn test_jitter_delay_is_spread_over_the_range() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut buckets = [0u32; 4];
        let samples = 20_000;
        for _ in 0..samples {
            let delay = jitter_delay_with(PERIOD, &mut rng).as_secs_f64();
            let bucket = ((delay - 30.0) / 7.5) as usize;
            buckets[bucket.min(3)] += 1;
        }
        for count in buckets {
            // Each quarter should hold about 5000 samples.
            assert!((4500..5500).contains(&count), "unbalanced buckets {buckets:?}");
        }
    }

    #[test]
    fn test_jitter_delay_zero_period() {
        assert_eq!(jitter_delay(Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn test_rotation_is_cyclic() {
        let mut rotator = AccountRotator::new(4, PERIOD, COOLDOWN);
        let visited: Vec<usize> = (0..4).map(|_| rotator.advance()).collect();
        assert_eq!(visited, vec![1, 2, 3, 0]);
        assert_eq!(rotator.current(), 0);
    }

    #[test]
    fn test_single_account_never_moves() {
        let mut rotator = AccountRotator::new(1, PERIOD, COOLDOWN);
        for _ in 0..5 {
            assert_eq!(rotator.advance(), 0);
        }
    }

    #[test]
    fn test_empty_pool_behaves_as_single_account() {
        let rotator = AccountRotator::new(0, PERIOD, COOLDOWN);
        assert_eq!(rotator.len(), 1);
        assert!(!rotator.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_request_of_an_account_does_not_wait() {
        let mut rotator = AccountRotator::new(2, PERIOD, COOLDOWN);
        let cancel = CancellationToken::new();
        let start = Instant::now();

        rotator.pace(0, &cancel).await.unwrap();
        rotator.pace(1, &cancel).await.unwrap();

        assert_eq!(Instant::now(), start);
        assert_eq!(rotator.last_query(0), Some(start));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_request_waits_for_the_jitter_delay() {
        let mut rotator = AccountRotator::new(1, PERIOD, COOLDOWN);
        let cancel = CancellationToken::new();
        let start = Instant::now();

        rotator.pace(0, &cancel).await.unwrap();
        rotator.pace(0, &cancel).await.unwrap();

        let waited = Instant::now() - start;
        assert!(waited >= Duration::from_secs(30));
        assert!(waited < Duration::from_secs(60));
    }

    #[test]
    fn test_pacing_wait_subtracts_elapsed_time() {
        let mut rotator = AccountRotator::new(1, PERIOD, COOLDOWN);
        let now = Instant::now();
        rotator.stamp(0, now);

        let later = now + Duration::from_secs(20);
        assert_eq!(
            rotator.pacing_wait(0, Duration::from_secs(40), later),
            Duration::from_secs(20)
        );

        let much_later = now + Duration::from_secs(120);
        assert_eq!(
            rotator.pacing_wait(0, Duration::from_secs(40), much_later),
            Duration::ZERO
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_wrap_to_first_account_enforces_cooldown() {
        let mut rotator = AccountRotator::new(2, PERIOD, COOLDOWN);
        let cancel = CancellationToken::new();
        let start = Instant::now();
        rotator.stamp(0, start);

        assert_eq!(rotator.rotate(&cancel).await.unwrap(), 1);
        assert_eq!(Instant::now(), start);

        assert_eq!(rotator.rotate(&cancel).await.unwrap(), 0);
        assert!(Instant::now() >= start + COOLDOWN);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wrap_without_prior_query_does_not_wait() {
        let mut rotator = AccountRotator::new(2, PERIOD, COOLDOWN);
        let cancel = CancellationToken::new();
        let start = Instant::now();

        rotator.rotate(&cancel).await.unwrap();
        rotator.rotate(&cancel).await.unwrap();

        assert_eq!(Instant::now(), start);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_is_interrupted_by_cancellation() {
        let mut rotator = AccountRotator::new(2, PERIOD, COOLDOWN);
        let cancel = CancellationToken::new();
        rotator.stamp(0, Instant::now());
        rotator.advance();

        cancel.cancel();
        let result = rotator.rotate(&cancel).await;
        assert!(matches!(result, Err(TransportError::Cancelled)));
    }

    #[test]
    fn test_reminder_cadence() {
        let mut cadence = ReminderCadence::new(Duration::from_secs(600));
        let now = Instant::now();

        assert!(cadence.due(now));
        assert!(!cadence.due(now + Duration::from_secs(10)));
        assert!(!cadence.due(now + Duration::from_secs(599)));
        assert!(cadence.due(now + Duration::from_secs(600)));
        assert!(!cadence.due(now + Duration::from_secs(601)));
    }
}
