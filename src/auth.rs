//! Auth-domain models: token bundles, identity-token claims, and the per-install device id.

pub mod claims;
pub mod device;
pub mod token;

pub use claims::*;
pub use device::*;
pub use token::{bundle::*, secret::*};
