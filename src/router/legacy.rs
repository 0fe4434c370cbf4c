//! Routing for the legacy (`17CY`) platform.

// crates.io
use serde_json::{Value, json};
// self
use crate::router::{Generation, GenerationStrategy, RemoteCommand, RemoteTarget, RoutedRequest};

const DEVICE_TYPE: &str = "Android";
const RAW_CODES: [&str; 3] = ["DL", "RES", "HZ"];

/// Strategy for `17CY` vehicles: legacy endpoints, commands sent as `{code, value}` pairs.
#[derive(Clone, Copy, Debug, Default)]
pub struct LegacyStrategy;
impl LegacyStrategy {
	/// Legacy `(code, value)` pair for a command, if the platform supports it.
	pub fn command_code(command: RemoteCommand) -> Option<(&'static str, u8)> {
		match command {
			RemoteCommand::DoorLock => Some(("DL", 1)),
			RemoteCommand::DoorUnlock => Some(("DL", 2)),
			RemoteCommand::EngineStart => Some(("RES", 1)),
			RemoteCommand::EngineStop => Some(("RES", 2)),
			RemoteCommand::HazardOn => Some(("HZ", 1)),
			RemoteCommand::HazardOff => Some(("HZ", 2)),
			_ => None,
		}
	}
}
impl GenerationStrategy for LegacyStrategy {
	fn generation(&self) -> Generation {
		Generation::SeventeenCy
	}

	fn status_request(&self, vin: &str) -> RoutedRequest {
		RoutedRequest::get("v2/legacy/remote/status").vin(vin).brand()
	}

	fn engine_status_request(&self, vin: &str) -> RoutedRequest {
		RoutedRequest::get("v1/legacy/remote/engine-status").vin(vin).brand()
	}

	fn refresh_request(&self, target: RemoteTarget<'_>) -> RoutedRequest {
		RoutedRequest::post(
			"v1/legacy/remote/refresh-status",
			json!({
				"guid": target.guid,
				"deviceId": target.device_id,
				"deviceType": DEVICE_TYPE,
				"vin": target.vin,
			}),
		)
		.vin(target.vin)
		.brand()
	}

	fn encode_command(&self, command: &str, value: Option<u8>) -> Option<Value> {
		let (code, value) = match RemoteCommand::parse(command) {
			Some(command) => Self::command_code(command)?,
			None => {
				let code = RAW_CODES.into_iter().find(|code| *code == command)?;

				(code, value.filter(|value| matches!(value, 1 | 2))?)
			},
		};

		Some(json!({ "code": code, "value": value }))
	}

	fn command_request(&self, target: RemoteTarget<'_>, command: Value) -> RoutedRequest {
		RoutedRequest::post(
			"v1/legacy/remote/command",
			json!({
				"guid": target.guid,
				"deviceId": target.device_id,
				"vin": target.vin,
				"command": command,
			}),
		)
		.vin(target.vin)
		.brand()
	}
}
