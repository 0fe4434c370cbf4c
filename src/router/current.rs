//! Routing for the current (`17CYPLUS`) platform.

// crates.io
use serde_json::{Value, json};
// self
use crate::router::{Generation, GenerationStrategy, RemoteCommand, RemoteTarget, RoutedRequest};

/// Strategy for `17CYPLUS` vehicles: global endpoints, commands sent as literal labels.
#[derive(Clone, Copy, Debug, Default)]
pub struct CurrentStrategy;
impl GenerationStrategy for CurrentStrategy {
	fn generation(&self) -> Generation {
		Generation::SeventeenCyPlus
	}

	fn status_request(&self, vin: &str) -> RoutedRequest {
		RoutedRequest::get("v1/global/remote/status").vin(vin)
	}

	fn engine_status_request(&self, vin: &str) -> RoutedRequest {
		RoutedRequest::get("v1/global/remote/engine-status").vin(vin)
	}

	fn refresh_request(&self, target: RemoteTarget<'_>) -> RoutedRequest {
		RoutedRequest::post(
			"v1/global/remote/refresh-status",
			json!({ "guid": target.guid, "deviceId": target.device_id, "vin": target.vin }),
		)
		.vin(target.vin)
	}

	fn encode_command(&self, command: &str, _value: Option<u8>) -> Option<Value> {
		RemoteCommand::parse(command).map(|command| Value::String(command.as_str().to_owned()))
	}

	fn command_request(&self, target: RemoteTarget<'_>, command: Value) -> RoutedRequest {
		RoutedRequest::post("v1/global/remote/command", json!({ "command": command }))
			.vin(target.vin)
	}
}
