//! Vehicle operations exposed by [`ApiClient`].

// crates.io
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	dispatch::ApiClient,
	rate_limit::{RateLimitContext, RateLimitDecision, RateLimitPolicy},
	router::{self, GenerationStrategy, RemoteTarget, RoutedRequest},
};

impl ApiClient {
	/// Lists the vehicles registered to the account.
	pub async fn get_user_vehicle_list(&self) -> Result<Value> {
		self.execute(&RoutedRequest::get("v2/vehicle/guid")).await
	}

	/// Returns the static detail record for a vehicle.
	pub async fn get_vehicle_detail(&self, vin: &str) -> Result<Value> {
		self.execute(&RoutedRequest::get("v1/one/vehicle").vin(vin)).await
	}

	/// Returns the latest health report.
	pub async fn get_vehicle_health_report(&self, vin: &str) -> Result<Value> {
		self.execute(&RoutedRequest::get("v1/vehiclehealth/report").vin(vin)).await
	}

	/// Returns the current health status.
	pub async fn get_vehicle_health_status(&self, vin: &str) -> Result<Value> {
		self.execute(&RoutedRequest::get("v1/vehiclehealth/status").vin(vin)).await
	}

	/// Returns the charge status of an electrified vehicle.
	pub async fn get_electric_status(&self, vin: &str) -> Result<Value> {
		self.execute(&RoutedRequest::get("v1/global/remote/electric/status").vin(vin)).await
	}

	/// Reads the remote status (doors, windows, locks) for the vehicle's generation.
	pub async fn get_vehicle_status(&self, vin: &str, generation: &str) -> Result<Value> {
		let Some(strategy) = router::strategy_for(generation) else {
			return Ok(router::unsupported_generation());
		};

		self.execute_gated(&strategy.status_request(vin), self.status_limiter.as_deref()).await
	}

	/// Reads the remote engine status for the vehicle's generation.
	pub async fn get_engine_status(&self, vin: &str, generation: &str) -> Result<Value> {
		let Some(strategy) = router::strategy_for(generation) else {
			return Ok(router::unsupported_generation());
		};

		self.execute_gated(&strategy.engine_status_request(vin), self.status_limiter.as_deref())
			.await
	}

	/// Reads telemetry (odometer, fuel, location) for the vehicle's generation.
	pub async fn get_telemetry(&self, vin: &str, generation: &str) -> Result<Value> {
		let Some(strategy) = router::strategy_for(generation) else {
			return Ok(router::unsupported_generation());
		};

		self.execute_gated(&strategy.telemetry_request(vin), self.status_limiter.as_deref()).await
	}

	/// Asks the vendor to wake the vehicle and upload a fresh status.
	///
	/// Waits on the refresh limiter when one is configured.
	pub async fn send_refresh_status(&self, vin: &str, generation: &str) -> Result<Value> {
		let Some(strategy) = router::strategy_for(generation) else {
			return Ok(router::unsupported_generation());
		};
		let request = self.refresh_request(strategy, vin).await?;

		self.execute_gated(&request, self.refresh_limiter.as_deref()).await
	}

	/// Like [`send_refresh_status`](Self::send_refresh_status), but returns `Ok(None)` instead
	/// of waiting when the refresh limiter has no capacity.
	pub async fn send_refresh_status_if_capacity(
		&self,
		vin: &str,
		generation: &str,
	) -> Result<Option<Value>> {
		if let Some(limiter) = &self.refresh_limiter {
			let decision = limiter.evaluate(&RateLimitContext::new("refresh"))?;

			if let RateLimitDecision::Delay(directive) = decision {
				tracing::debug!(
					vin,
					retry_at = %directive.earliest_retry_at,
					"Skipping status refresh; the refresh quota is exhausted."
				);

				return Ok(None);
			}
		}

		self.send_refresh_status(vin, generation).await.map(Some)
	}

	/// Sends a remote command (`door-lock`, `engine-start`, ...) encoded for the vehicle's
	/// generation.
	///
	/// `value` is only consulted for raw legacy codes (`DL`, `RES`, `HZ`). Unknown generations
	/// and commands the generation cannot encode come back as soft error payloads.
	pub async fn remote_request(
		&self,
		vin: &str,
		command: &str,
		value: Option<u8>,
		generation: &str,
	) -> Result<Value> {
		let Some(strategy) = router::strategy_for(generation) else {
			return Ok(router::unsupported_generation());
		};
		let Some(encoded) = strategy.encode_command(command, value) else {
			return Ok(router::unsupported_command());
		};
		let guid = self.session.get_guid().await?;
		let device_id = self.session.get_device_id();
		let target = RemoteTarget { vin, guid: &guid, device_id: device_id.as_str() };

		self.execute(&strategy.command_request(target, encoded)).await
	}

	async fn refresh_request(
		&self,
		strategy: &dyn GenerationStrategy,
		vin: &str,
	) -> Result<RoutedRequest> {
		let guid = self.session.get_guid().await?;
		let device_id = self.session.get_device_id();
		let target = RemoteTarget { vin, guid: &guid, device_id: device_id.as_str() };

		Ok(strategy.refresh_request(target))
	}
}
