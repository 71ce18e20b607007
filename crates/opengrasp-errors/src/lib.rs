//! Shared error taxonomy for OpenGrasp.
//!
//! Device and pairing failures are recoverable by design: a device that
//! cannot be opened or matched with a gripper body definition is dropped
//! from the session and the remaining devices continue unaffected.

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used)]

pub mod common;
pub mod device;

pub use common::ErrorSeverity;
pub use device::{BodyLoadError, DeviceError};
