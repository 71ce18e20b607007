//! OpenGrasp Engine - Multi-Device Haptic-Physics Coupling
//!
//! This crate couples physical haptic input devices to simulated gripper
//! bodies in a shared physics simulation. Each device runs its own
//! haptics loop thread; one physics loop thread advances the shared
//! integrator. The loops communicate only through short per-device locks
//! and an advisory completion barrier, so no loop ever blocks on another
//! loop's full tick.

#![deny(static_mut_refs)]
#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

pub mod body;
pub mod coordinator;
pub mod coupling;
pub mod device;
pub mod modes;
pub mod ports;
pub mod rt;
pub mod session;
pub mod testkit;

pub use body::CoupledBody;
pub use coordinator::{BarrierMode, ControlAction, Coordinator, Direction};
pub use coupling::{CouplingSnapshot, DeviceCoupling};
pub use device::DeviceHandle;
pub use modes::{InteractionMode, InteractionModeMachine};
pub use ports::{BodyLoader, DevicePort, HapticDevice, PhysicsWorld, RigidBody};
pub use rt::LoopState;
pub use session::{Session, SessionConfig, SessionError};

// The math and parameter types flow through the public API; re-export the
// crates that define them.
pub use opengrasp_coupling::{CouplingGains, GainParam, Pose, Wrench};
pub use opengrasp_device_types::{DeviceModel, DeviceSpec, DeviceTuning};
pub use opengrasp_scheduler::PaceStrategy;
