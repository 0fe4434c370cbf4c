//! Maps logical vehicle operations onto the two vendor API generations.
//!
//! Vehicles report either the legacy `17CY` platform or the current `17CYPLUS` platform. The
//! same logical operation (read status, wake the vehicle, lock the doors) hits a different
//! endpoint, carries different headers, and encodes its body differently on each. Every
//! difference lives behind [`GenerationStrategy`]; routing is pure and performs no I/O.

pub mod current;
pub mod legacy;

pub use current::CurrentStrategy;
pub use legacy::LegacyStrategy;

// crates.io
use serde_json::Value;
// self
use crate::_prelude::*;

/// Error code carried by soft validation failures.
pub const SOFT_ERROR_CODE: &str = "400";
/// Message returned for an unknown generation string.
pub const UNSUPPORTED_GENERATION: &str = "Unsupported Vehicle Generation";
/// Message returned for a command the generation cannot encode.
pub const UNSUPPORTED_COMMAND: &str = "Unsupported Command";

/// Vendor API generation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Generation {
	/// Legacy platform (`17CY`).
	#[serde(rename = "17CY")]
	SeventeenCy,
	/// Current platform (`17CYPLUS`).
	#[default]
	#[serde(rename = "17CYPLUS")]
	SeventeenCyPlus,
}
impl Generation {
	/// Returns the wire label.
	pub const fn as_str(self) -> &'static str {
		match self {
			Generation::SeventeenCy => "17CY",
			Generation::SeventeenCyPlus => "17CYPLUS",
		}
	}

	/// Returns the routing strategy for this generation.
	pub fn strategy(self) -> &'static dyn GenerationStrategy {
		match self {
			Generation::SeventeenCy => &LegacyStrategy,
			Generation::SeventeenCyPlus => &CurrentStrategy,
		}
	}
}
impl Display for Generation {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for Generation {
	type Err = UnsupportedGeneration;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		[Generation::SeventeenCy, Generation::SeventeenCyPlus]
			.into_iter()
			.find(|generation| generation.as_str().eq_ignore_ascii_case(s.trim()))
			.ok_or_else(|| UnsupportedGeneration(s.to_owned()))
	}
}

/// Error returned when a generation label is not recognized.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Unsupported vehicle generation `{0}`.")]
pub struct UnsupportedGeneration(pub String);

/// Remote commands understood by at least one generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RemoteCommand {
	/// Lock all doors.
	DoorLock,
	/// Unlock all doors.
	DoorUnlock,
	/// Remote engine start.
	EngineStart,
	/// Remote engine stop.
	EngineStop,
	/// Hazard lights on.
	HazardOn,
	/// Hazard lights off.
	HazardOff,
	/// Close power windows.
	PowerWindowOn,
	/// Open power windows.
	PowerWindowOff,
	/// Apply stored climate settings.
	AcSettingsOn,
	/// Sound the horn.
	SoundHorn,
	/// Sound the buzzer.
	BuzzerWarning,
	/// Flash lights to locate the vehicle.
	FindVehicle,
	/// Start cabin ventilation.
	VentilationOn,
}
impl RemoteCommand {
	/// Every command, in wire-label order.
	pub const ALL: [RemoteCommand; 13] = [
		RemoteCommand::DoorLock,
		RemoteCommand::DoorUnlock,
		RemoteCommand::EngineStart,
		RemoteCommand::EngineStop,
		RemoteCommand::HazardOn,
		RemoteCommand::HazardOff,
		RemoteCommand::PowerWindowOn,
		RemoteCommand::PowerWindowOff,
		RemoteCommand::AcSettingsOn,
		RemoteCommand::SoundHorn,
		RemoteCommand::BuzzerWarning,
		RemoteCommand::FindVehicle,
		RemoteCommand::VentilationOn,
	];

	/// Returns the wire label (the literal token sent to the current generation).
	pub const fn as_str(self) -> &'static str {
		match self {
			RemoteCommand::DoorLock => "door-lock",
			RemoteCommand::DoorUnlock => "door-unlock",
			RemoteCommand::EngineStart => "engine-start",
			RemoteCommand::EngineStop => "engine-stop",
			RemoteCommand::HazardOn => "hazard-on",
			RemoteCommand::HazardOff => "hazard-off",
			RemoteCommand::PowerWindowOn => "power-window-on",
			RemoteCommand::PowerWindowOff => "power-window-off",
			RemoteCommand::AcSettingsOn => "ac-settings-on",
			RemoteCommand::SoundHorn => "sound-horn",
			RemoteCommand::BuzzerWarning => "buzzer-warning",
			RemoteCommand::FindVehicle => "find-vehicle",
			RemoteCommand::VentilationOn => "ventilation-on",
		}
	}

	/// Looks up a command by wire label.
	pub fn parse(label: &str) -> Option<Self> {
		Self::ALL.into_iter().find(|command| command.as_str() == label)
	}
}
impl Display for RemoteCommand {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Identity fields some request bodies embed.
#[derive(Clone, Copy, Debug)]
pub struct RemoteTarget<'a> {
	/// Vehicle identification number.
	pub vin: &'a str,
	/// Account GUID.
	pub guid: &'a str,
	/// Installation device id.
	pub device_id: &'a str,
}

/// Fully routed request, relative to the API gateway.
#[derive(Clone, Debug, PartialEq)]
pub struct RoutedRequest {
	/// HTTP method.
	pub method: Method,
	/// Path relative to the gateway.
	pub path: &'static str,
	/// Extra headers merged over the dispatcher's auth headers.
	pub headers: Vec<(String, String)>,
	/// Optional JSON body.
	pub body: Option<Value>,
}
impl RoutedRequest {
	/// Starts a `GET` request.
	pub fn get(path: &'static str) -> Self {
		Self { method: Method::GET, path, headers: Vec::new(), body: None }
	}

	/// Starts a `POST` request with a JSON body.
	pub fn post(path: &'static str, body: Value) -> Self {
		Self { method: Method::POST, path, headers: Vec::new(), body: Some(body) }
	}

	/// Adds a header.
	pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));

		self
	}

	/// Adds the `VIN` header.
	pub fn vin(self, vin: &str) -> Self {
		self.header("VIN", vin)
	}

	/// Adds the `X-BRAND: T` header the legacy and telemetry endpoints expect.
	pub fn brand(self) -> Self {
		self.header("X-BRAND", "T")
	}
}

/// Per-generation routing of logical operations.
pub trait GenerationStrategy
where
	Self: Send + Sync,
{
	/// Generation this strategy serves.
	fn generation(&self) -> Generation;

	/// Remote status read.
	fn status_request(&self, vin: &str) -> RoutedRequest;

	/// Remote engine status read.
	fn engine_status_request(&self, vin: &str) -> RoutedRequest;

	/// Telemetry read (odometer, fuel, tires, location).
	fn telemetry_request(&self, vin: &str) -> RoutedRequest {
		RoutedRequest::get("v2/telemetry")
			.vin(vin)
			.header("GENERATION", self.generation().as_str())
			.brand()
	}

	/// Asks the vendor to wake the vehicle and upload a fresh status.
	fn refresh_request(&self, target: RemoteTarget<'_>) -> RoutedRequest;

	/// Encodes a command label (and optional raw value) into the generation's command shape.
	///
	/// Returns `None` when the generation cannot express the command.
	fn encode_command(&self, command: &str, value: Option<u8>) -> Option<Value>;

	/// Wraps an encoded command into the generation's command request.
	fn command_request(&self, target: RemoteTarget<'_>, command: Value) -> RoutedRequest;

	/// Encodes and wraps a command in one step.
	fn route_command(
		&self,
		target: RemoteTarget<'_>,
		command: &str,
		value: Option<u8>,
	) -> Option<RoutedRequest> {
		self.encode_command(command, value).map(|encoded| self.command_request(target, encoded))
	}
}

/// Resolves a generation label to its strategy.
pub fn strategy_for(generation: &str) -> Option<&'static dyn GenerationStrategy> {
	generation.parse::<Generation>().ok().map(Generation::strategy)
}

/// Vendor-style soft error payload.
pub fn soft_error(message: &str) -> Value {
	serde_json::json!({ "error": { "code": SOFT_ERROR_CODE, "message": message } })
}

/// Soft error returned for unknown generations.
pub fn unsupported_generation() -> Value {
	soft_error(UNSUPPORTED_GENERATION)
}

/// Soft error returned for commands the generation cannot encode.
pub fn unsupported_command() -> Value {
	soft_error(UNSUPPORTED_COMMAND)
}
