//! eams-robber — the enrollment polling loop.
//!
//! Keeps a prioritized list of target sections and, on every tick, tries
//! to enroll in each one that currently has a free seat.
//!
//! # Architecture
//!
//! ```text
//! Robber
//!   ├── TargetRegistry (mutex-guarded, shared with the caller)
//!   ├── Background tick task (watch-channel shutdown)
//!   │   ├── snapshot → stable sort by priority (desc)
//!   │   ├── AvailabilityProber::probe() → SeatCount
//!   │   └── EnrollmentDriver::try_add() → committed | rejected
//!   └── try_enroll / try_drop for one-off manual attempts
//! ```
//!
//! # Failure policy
//!
//! A probe or enrollment failure for one target is logged and the tick
//! moves on to the next target. Failed targets stay registered and are
//! retried on the next tick. Only lifecycle misuse (`AlreadyRunning`,
//! `NotRunning`) and the one-off `try_*` calls return errors.

pub mod error;
pub mod prober;
pub mod protocol;
pub mod registry;
pub mod robber;

#[cfg(test)]
mod test_support;

pub use eams_core::{SeatCount, Target};
pub use error::{RobberError, RobberResult};
pub use prober::AvailabilityProber;
pub use protocol::{AttemptState, EnrollmentDriver, PollSettings};
pub use registry::TargetRegistry;
pub use robber::{Robber, RobberSettings, TickReport};
