//! Persisted leaky-bucket quotas for the vendor's rate-limited endpoints.
//!
//! Each [`TokenBucketLimiter`] tracks a fill level (capacity already used in the rolling
//! window) that drains continuously at `max_capacity / window`. The level is written to disk
//! after every acquisition so a restarted process resumes where the previous one stopped
//! instead of receiving a fresh quota.

pub mod bucket;
pub mod persist;

pub use bucket::TokenBucketLimiter;

// std
use std::env;
// self
use crate::_prelude::*;

/// Errors raised for limiter misuse; exhausted capacity is a delay, never an error.
#[derive(Clone, Debug, PartialEq, ThisError)]
pub enum LimiterError {
	/// The configuration violates a limiter invariant.
	#[error("Rate limiter configuration is invalid: {reason}.")]
	InvalidConfig {
		/// Human-readable reason.
		reason: String,
	},
	/// A single request asked for more than the bucket can ever hold.
	#[error("Cannot acquire {amount} from a bucket with capacity {max_capacity}.")]
	AmountExceedsCapacity {
		/// Requested amount.
		amount: f64,
		/// Bucket capacity.
		max_capacity: f64,
	},
	/// The requested amount is not a positive finite number.
	#[error("Acquire amount must be positive and finite, got {amount}.")]
	InvalidAmount {
		/// Requested amount.
		amount: f64,
	},
}

/// Static configuration for one limiter instance.
#[derive(Clone, Debug, PartialEq)]
pub struct RateLimiterConfig {
	/// Bucket capacity (requests per window).
	pub max_capacity: f64,
	/// Rolling window over which the full capacity drains.
	pub window: Duration,
	/// Capacity withheld on first use when no persisted level exists.
	pub starting_deficit: f64,
	/// File holding the persisted fill level.
	pub persistence_path: PathBuf,
}
impl RateLimiterConfig {
	/// Capacity of the status polling bucket.
	pub const STATUS_MAX_CAPACITY: f64 = 400.;
	/// Starting deficit of the status polling bucket.
	pub const STATUS_STARTING_DEFICIT: f64 = 50.;
	/// Capacity of the refresh-status bucket.
	pub const REFRESH_MAX_CAPACITY: f64 = 20.;
	/// Starting deficit of the refresh-status bucket.
	pub const REFRESH_STARTING_DEFICIT: f64 = 5.;
	/// Window shared by both presets.
	pub const DEFAULT_WINDOW: Duration = Duration::DAY;

	/// Creates a configuration.
	pub fn new(
		max_capacity: f64,
		window: Duration,
		starting_deficit: f64,
		persistence_path: impl Into<PathBuf>,
	) -> Self {
		Self { max_capacity, window, starting_deficit, persistence_path: persistence_path.into() }
	}

	/// Bucket gating status, engine-status, and telemetry polls.
	pub fn status() -> Self {
		Self::new(
			Self::STATUS_MAX_CAPACITY,
			Self::DEFAULT_WINDOW,
			Self::STATUS_STARTING_DEFICIT,
			env::temp_dir().join("telematics_status_rate_limit"),
		)
	}

	/// Bucket gating vehicle refresh-status requests.
	pub fn refresh() -> Self {
		Self::new(
			Self::REFRESH_MAX_CAPACITY,
			Self::DEFAULT_WINDOW,
			Self::REFRESH_STARTING_DEFICIT,
			env::temp_dir().join("telematics_refresh_rate_limit"),
		)
	}

	/// Overrides the persistence path.
	pub fn with_persistence_path(mut self, path: impl Into<PathBuf>) -> Self {
		self.persistence_path = path.into();

		self
	}

	/// Fill level used when nothing usable is persisted.
	pub fn default_fill_level(&self) -> f64 {
		self.max_capacity - self.starting_deficit
	}

	/// Checks the limiter invariants.
	pub fn validate(&self) -> Result<(), LimiterError> {
		let invalid = |reason: &str| Err(LimiterError::InvalidConfig { reason: reason.into() });

		if !(self.max_capacity.is_finite() && self.max_capacity > 0.) {
			return invalid("max capacity must be positive and finite");
		}
		if !self.window.is_positive() {
			return invalid("window must be positive");
		}
		if !(0. ..=self.max_capacity).contains(&self.starting_deficit) {
			return invalid("starting deficit must lie between zero and max capacity");
		}

		Ok(())
	}

	/// Units of capacity that drain per second.
	pub(crate) fn drain_per_second(&self) -> f64 {
		self.max_capacity / self.window.as_seconds_f64()
	}
}

/// Contract for quotas consulted before an outbound call.
pub trait RateLimitPolicy
where
	Self: Send + Sync,
{
	/// Evaluates whether the call described by `context` may proceed right away.
	fn evaluate(&self, context: &RateLimitContext) -> Result<RateLimitDecision, LimiterError>;
}

/// Context shared with a [`RateLimitPolicy`] before an outbound call is made.
#[derive(Clone, Debug)]
pub struct RateLimitContext {
	/// Logical operation being attempted.
	pub operation: String,
	/// Capacity the call would consume.
	pub amount: f64,
	/// Timestamp observed before invoking the policy.
	pub observed_at: OffsetDateTime,
}
impl RateLimitContext {
	/// Creates a context for a single-unit call.
	pub fn new(operation: impl Into<String>) -> Self {
		Self { operation: operation.into(), amount: 1., observed_at: OffsetDateTime::now_utc() }
	}

	/// Overrides the capacity the call would consume.
	pub fn with_amount(mut self, amount: f64) -> Self {
		self.amount = amount;

		self
	}
}

/// Result emitted by a [`RateLimitPolicy`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
	/// The request may proceed immediately.
	Allow,
	/// The request should be delayed.
	Delay(RetryDirective),
}

/// Advises callers when to retry after a [`RateLimitDecision::Delay`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryDirective {
	/// Instant when enough capacity will have drained.
	pub earliest_retry_at: OffsetDateTime,
	/// Suggested wait.
	pub recommended_backoff: Duration,
	/// Optional descriptive string.
	pub reason: Option<String>,
}
impl RetryDirective {
	/// Creates a new directive with the provided timing metadata.
	pub fn new(earliest_retry_at: OffsetDateTime, recommended_backoff: Duration) -> Self {
		Self { earliest_retry_at, recommended_backoff, reason: None }
	}

	/// Adds a human-readable reason.
	pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
		self.reason = Some(reason.into());

		self
	}
}
