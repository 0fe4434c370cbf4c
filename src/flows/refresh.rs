//! Refresh-token rotation and the freshness check run before every token read.
//!
//! [`AuthSession::get_access_token`], [`AuthSession::get_guid`], and
//! [`AuthSession::get_id_info`] first make sure the held bundle is usable:
//!
//! 1. no bundle fails with [`Error::NotLoggedIn`];
//! 2. an expired bundle is refreshed, and any refresh failure becomes [`Error::TokenExpired`];
//! 3. otherwise the configured [`RefreshPolicy`](crate::flows::RefreshPolicy) may refresh
//!    early, in which case failures propagate unchanged.

mod metrics;

pub use metrics::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	auth::{IdTokenClaims, TokenBundle, UnixTime},
	flows::AuthSession,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

impl AuthSession {
	/// Rotates the held bundle through the `refresh_token` grant and installs the result.
	pub async fn refresh_tokens(&self) -> Result<TokenBundle> {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, "refresh_tokens");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let current = self.get_tokens().ok_or(Error::NotLoggedIn)?;

				self.refresh_metrics.record_attempt();

				match self.token_endpoint.refresh(&current.refresh_token).await {
					Ok(bundle) => {
						self.refresh_metrics.record_success();

						Ok(self.install_tokens(bundle))
					},
					Err(e) => {
						self.refresh_metrics.record_failure();

						Err(e)
					},
				}
			})
			.await;

		obs::record_result(KIND, &result);

		result
	}

	/// Returns a usable bundle, refreshing it first when required.
	pub async fn ensure_fresh(&self) -> Result<TokenBundle> {
		let current = self.get_tokens().ok_or(Error::NotLoggedIn)?;
		let now = UnixTime::now();

		if current.is_expired_at(now) {
			tracing::debug!(expires_at = %current.expires_at, "Access token expired; refreshing.");

			return self.refresh_tokens().await.map_err(Error::token_expired);
		}
		if self.config.refresh_policy().should_refresh(&current, now) {
			tracing::debug!(
				refresh_secs = self.config.refresh_secs,
				"Refreshing access token ahead of expiry."
			);

			return self.refresh_tokens().await;
		}

		Ok(current)
	}

	/// Returns the access token after the freshness check.
	pub async fn get_access_token(&self) -> Result<String> {
		Ok(self.ensure_fresh().await?.access_token.expose().to_owned())
	}

	/// Returns the account GUID after the freshness check.
	pub async fn get_guid(&self) -> Result<String> {
		Ok(self.ensure_fresh().await?.subject_id)
	}

	/// Returns the decoded identity claims after the freshness check.
	pub async fn get_id_info(&self) -> Result<IdTokenClaims> {
		Ok(self.ensure_fresh().await?.claims()?)
	}
}
