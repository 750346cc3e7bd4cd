//! WarmInitOrch - device add and warm (hitless) reinitialization.
//!
//! A warm init replaces the driver and optionally the serdes firmware under
//! a running dataplane. It is split into a begin and an end phase that the
//! controller calls separately; between them the device sits in
//! `WarmInitInProgress` while the platform reprograms the hardware.

mod orch;
mod types;

pub use orch::WarmInitOrch;
pub use types::{WarmInitRequest, WarmInitStats, WarmInitStatsSnapshot};
