//! Vendor-facing configuration.
//!
//! [`VendorDescriptor`] carries the validated endpoint set (authenticate, authorize, token,
//! API gateway), the OAuth client registration, and the static API key. Flows and the
//! dispatcher read everything vendor-specific from the descriptor so tests can point the
//! whole client at a mock server.

pub mod descriptor;

pub use descriptor::*;
