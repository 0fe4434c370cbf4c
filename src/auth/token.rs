//! Token bundle snapshots and the redacting secret wrapper.

pub mod bundle;
pub mod secret;
