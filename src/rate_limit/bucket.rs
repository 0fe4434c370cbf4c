//! The [`TokenBucketLimiter`] itself.

// std
use std::time::Duration as StdDuration;
// crates.io
use tokio::time::{self, Instant};
// self
use crate::{
	_prelude::*,
	rate_limit::{
		LimiterError, RateLimitContext, RateLimitDecision, RateLimitPolicy, RateLimiterConfig,
		RetryDirective, persist::{self, PersistError},
	},
};

// Floor for a single wait so rounding residue cannot spin the loop.
const MIN_WAIT_SECS: f64 = 0.001;

#[derive(Debug)]
struct BucketState {
	level: f64,
	last_drain: Instant,
}
impl BucketState {
	fn drain(&mut self, per_second: f64) {
		let now = Instant::now();
		let elapsed = now.saturating_duration_since(self.last_drain).as_secs_f64();

		self.level = (self.level - elapsed * per_second).max(0.);
		self.last_drain = now;
	}
}

/// Async leaky-bucket limiter whose fill level survives restarts.
///
/// Waiters are served first-come first-served. The on-disk level is read once at
/// [`open`](Self::open) and rewritten after every acquisition; concurrent processes sharing a
/// file are not coordinated beyond each write being atomic.
#[derive(Debug)]
pub struct TokenBucketLimiter {
	config: RateLimiterConfig,
	drain_per_second: f64,
	state: Mutex<BucketState>,
	queue: AsyncMutex<()>,
}
impl TokenBucketLimiter {
	/// Opens a limiter, resuming from the persisted fill level when one is readable.
	pub fn open(config: RateLimiterConfig) -> Result<Self, LimiterError> {
		config.validate()?;

		let level = match persist::read_level(&config.persistence_path) {
			Ok(level) => level,
			Err(e) => {
				tracing::debug!(error = %e, "Falling back to the default fill level.");

				config.default_fill_level()
			},
		}
		.clamp(0., config.max_capacity);

		tracing::info!(
			path = %config.persistence_path.display(),
			remaining = config.max_capacity - level,
			"Initializing rate limiter."
		);

		Ok(Self {
			drain_per_second: config.drain_per_second(),
			state: Mutex::new(BucketState { level, last_drain: Instant::now() }),
			queue: AsyncMutex::new(()),
			config,
		})
	}

	/// Returns the configuration this limiter was opened with.
	pub fn config(&self) -> &RateLimiterConfig {
		&self.config
	}

	/// Current fill level after draining elapsed time.
	pub fn fill_level(&self) -> f64 {
		let mut state = self.state.lock();

		state.drain(self.drain_per_second);

		state.level
	}

	/// Capacity still available in the window.
	pub fn remaining(&self) -> f64 {
		self.config.max_capacity - self.fill_level()
	}

	/// Returns `true` iff acquiring `amount` right now would not wait.
	pub fn has_capacity(&self, amount: f64) -> bool {
		self.check_amount(amount).is_ok() && self.wait_for(amount).is_none()
	}

	/// Waits until `amount` fits in the bucket, commits it, and persists the new level.
	///
	/// Persistence failures are logged and do not fail the acquisition.
	pub async fn acquire(&self, amount: f64) -> Result<(), LimiterError> {
		self.check_amount(amount)?;

		let _turn = self.queue.lock().await;

		loop {
			let wait = {
				let mut state = self.state.lock();

				state.drain(self.drain_per_second);

				if state.level + amount <= self.config.max_capacity {
					state.level += amount;

					let level = state.level;

					drop(state);
					self.persist_or_warn(level);

					return Ok(());
				}

				(state.level + amount - self.config.max_capacity) / self.drain_per_second
			};
			let wait = wait.max(MIN_WAIT_SECS);

			tracing::debug!(
				path = %self.config.persistence_path.display(),
				wait_secs = wait,
				"Rate limiter is full; waiting."
			);

			time::sleep(StdDuration::from_secs_f64(wait)).await;
		}
	}

	/// Writes the current level to disk.
	pub fn persist(&self) -> Result<(), PersistError> {
		persist::write_level(&self.config.persistence_path, self.fill_level())
	}

	fn persist_or_warn(&self, level: f64) {
		if let Err(e) = persist::write_level(&self.config.persistence_path, level) {
			tracing::warn!(error = %e, "Rate limiter level could not be persisted.");
		}
	}

	fn check_amount(&self, amount: f64) -> Result<(), LimiterError> {
		if !(amount.is_finite() && amount > 0.) {
			return Err(LimiterError::InvalidAmount { amount });
		}
		if amount > self.config.max_capacity {
			return Err(LimiterError::AmountExceedsCapacity {
				amount,
				max_capacity: self.config.max_capacity,
			});
		}

		Ok(())
	}

	/// Seconds until `amount` would fit, or `None` when it fits now.
	fn wait_for(&self, amount: f64) -> Option<f64> {
		let mut state = self.state.lock();

		state.drain(self.drain_per_second);

		let overflow = state.level + amount - self.config.max_capacity;

		if overflow > 0. { Some(overflow / self.drain_per_second) } else { None }
	}
}
impl RateLimitPolicy for TokenBucketLimiter {
	fn evaluate(&self, context: &RateLimitContext) -> Result<RateLimitDecision, LimiterError> {
		self.check_amount(context.amount)?;

		Ok(match self.wait_for(context.amount) {
			None => RateLimitDecision::Allow,
			Some(secs) => {
				let backoff = Duration::seconds_f64(secs);

				RateLimitDecision::Delay(
					RetryDirective::new(context.observed_at + backoff, backoff)
						.with_reason(format!("The {} quota is exhausted.", context.operation)),
				)
			},
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn config(dir: &tempfile::TempDir, max: f64, deficit: f64) -> RateLimiterConfig {
		RateLimiterConfig::new(max, Duration::DAY, deficit, dir.path().join("limit"))
	}

	#[tokio::test(start_paused = true)]
	async fn fresh_limiter_starts_with_the_deficit_withheld() {
		let dir = tempfile::tempdir().expect("Temp dir should be created.");
		let limiter = TokenBucketLimiter::open(config(&dir, 50., 10.))
			.expect("Valid config should open.");

		assert_eq!(limiter.fill_level(), 40.);

		for _ in 0..9 {
			assert!(limiter.has_capacity(1.));

			limiter.acquire(1.).await.expect("Acquire within capacity should succeed.");
		}

		assert_eq!(limiter.fill_level(), 49.);
		assert_eq!(persist::read_level(&dir.path().join("limit")).ok(), Some(49.));
	}

	#[tokio::test(start_paused = true)]
	async fn has_capacity_matches_whether_acquire_would_wait() {
		let dir = tempfile::tempdir().expect("Temp dir should be created.");
		let limiter = TokenBucketLimiter::open(config(&dir, 2., 1.))
			.expect("Valid config should open.");

		assert!(limiter.has_capacity(1.));
		assert!(!limiter.has_capacity(2.));

		limiter.acquire(1.).await.expect("Acquire within capacity should succeed.");

		assert!(!limiter.has_capacity(1.));

		// Half a day drains one unit of a two-per-day bucket.
		time::advance(StdDuration::from_secs(43_200)).await;

		assert!(limiter.has_capacity(1.));
	}

	#[tokio::test(start_paused = true)]
	async fn acquire_waits_for_drain() {
		let dir = tempfile::tempdir().expect("Temp dir should be created.");
		let limiter = TokenBucketLimiter::open(config(&dir, 2., 0.))
			.expect("Valid config should open.");
		let started = Instant::now();

		limiter.acquire(1.).await.expect("Acquire should eventually succeed.");

		assert!(Instant::now() - started >= StdDuration::from_secs(43_200));
	}

	#[tokio::test]
	async fn misuse_is_an_error_not_a_delay() {
		let dir = tempfile::tempdir().expect("Temp dir should be created.");
		let limiter = TokenBucketLimiter::open(config(&dir, 5., 5.))
			.expect("Valid config should open.");

		assert_eq!(
			limiter.acquire(6.).await,
			Err(LimiterError::AmountExceedsCapacity { amount: 6., max_capacity: 5. })
		);
		assert_eq!(limiter.acquire(0.).await, Err(LimiterError::InvalidAmount { amount: 0. }));
		assert!(!limiter.has_capacity(6.));
	}

	#[tokio::test(start_paused = true)]
	async fn evaluate_reports_when_capacity_frees() {
		let dir = tempfile::tempdir().expect("Temp dir should be created.");
		let limiter = TokenBucketLimiter::open(config(&dir, 2., 0.))
			.expect("Valid config should open.");
		let context = RateLimitContext::new("refresh");

		match limiter.evaluate(&context).expect("Valid amount should evaluate.") {
			RateLimitDecision::Delay(directive) => {
				assert_eq!(directive.recommended_backoff, Duration::seconds(43_200));
				assert_eq!(
					directive.earliest_retry_at,
					context.observed_at + Duration::seconds(43_200)
				);
			},
			RateLimitDecision::Allow => panic!("A full bucket must not allow."),
		}
	}

	#[tokio::test(start_paused = true)]
	async fn evaluate_honors_the_requested_amount() {
		let dir = tempfile::tempdir().expect("Temp dir should be created.");
		let limiter = TokenBucketLimiter::open(config(&dir, 4., 2.))
			.expect("Valid config should open.");

		assert_eq!(
			limiter.evaluate(&RateLimitContext::new("status").with_amount(2.)),
			Ok(RateLimitDecision::Allow)
		);

		match limiter
			.evaluate(&RateLimitContext::new("status").with_amount(3.))
			.expect("Valid amount should evaluate.")
		{
			RateLimitDecision::Delay(directive) => {
				assert!((directive.recommended_backoff.as_seconds_f64() - 21_600.).abs() < 1e-3);
			},
			RateLimitDecision::Allow => panic!("Three units must not fit beside two."),
		}

		assert_eq!(
			limiter.evaluate(&RateLimitContext::new("status").with_amount(5.)),
			Err(LimiterError::AmountExceedsCapacity { amount: 5., max_capacity: 4. })
		);
	}

	#[test]
	fn persisted_level_is_clamped() {
		let dir = tempfile::tempdir().expect("Temp dir should be created.");
		let config = config(&dir, 10., 2.);

		persist::write_level(&config.persistence_path, 99.).expect("Fixture write should succeed.");

		let limiter = TokenBucketLimiter::open(config).expect("Valid config should open.");

		assert!((limiter.fill_level() - 10.).abs() < 1e-3);
	}
}
