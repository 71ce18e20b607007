//! Port traits for the engine's external collaborators.
//!
//! These traits are the only surface through which the engine touches
//! device drivers, the physics integrator, and the body-group loader.
//! Implementations live with the hosting process; the engine never links
//! a vendor SDK or a physics backend directly.

use nalgebra::{Rotation3, Vector3};
use opengrasp_coupling::Pose;
use opengrasp_device_types::DeviceSpec;
use opengrasp_errors::{BodyLoadError, DeviceError};

/// One physical haptic input device.
///
/// Sampling methods are called only from the device's own haptics-loop
/// thread. `set_wrench` is on the per-tick hot path and must not block or
/// allocate.
pub trait HapticDevice: Send {
    /// Current stylus/grip position in device coordinates.
    fn position(&mut self) -> Vector3<f64>;

    /// Current stylus/grip orientation.
    fn rotation(&mut self) -> Rotation3<f64>;

    /// Linear velocity in device coordinates.
    fn linear_velocity(&mut self) -> Vector3<f64>;

    /// Angular velocity in device coordinates.
    fn angular_velocity(&mut self) -> Vector3<f64>;

    /// Sensed gripper/pinch angle in radians, if the hardware has one.
    fn gripper_angle(&mut self) -> Option<f64>;

    /// Level state of a button. Out-of-range indices read as released.
    fn button(&mut self, index: usize) -> bool;

    /// Command a force/torque output on the device.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::WriteFailed`] if the driver rejects the
    /// write; the caller counts the failure and keeps ticking.
    fn set_wrench(&mut self, force: Vector3<f64>, torque: Vector3<f64>)
    -> Result<(), DeviceError>;

    /// Release the device. Called once at session teardown.
    fn close(&mut self);
}

/// Device discovery and opening.
pub trait DevicePort: Send {
    /// Number of devices currently enumerable.
    fn count(&self) -> usize;

    /// Specification of the device at `index`, if present.
    fn specification(&self, index: usize) -> Option<DeviceSpec>;

    /// Open the device at `index` for exclusive use.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError`] if the device cannot be opened; the caller
    /// drops that device and continues pairing the rest.
    fn open(&mut self, index: usize) -> Result<Box<dyn HapticDevice>, DeviceError>;
}

/// One dynamic body owned by the physics engine.
///
/// Force/torque accumulators follow the integrator's convention: applied
/// wrenches accumulate until [`clear_wrench`](Self::clear_wrench).
pub trait RigidBody: Send {
    /// Current pose in simulation coordinates.
    fn pose(&self) -> Pose;

    /// Accumulate a force for the next integration step.
    fn apply_force(&mut self, force: Vector3<f64>);

    /// Accumulate a torque for the next integration step.
    fn apply_torque(&mut self, torque: Vector3<f64>);

    /// Clear the force/torque accumulators.
    fn clear_wrench(&mut self);

    /// Drive the body's actuator (jaw) toward `angle` over `dt` seconds.
    fn set_actuator_angle(&mut self, angle: f64, dt: f64);
}

/// The shared physics integrator.
///
/// Mutated only by the physics-loop thread.
pub trait PhysicsWorld: Send {
    /// Advance the simulation by `dt` seconds.
    fn advance(&mut self, dt: f64);

    /// Accumulated simulation time in seconds.
    fn simulation_time(&self) -> f64;

    /// Enable or disable gravity.
    fn set_gravity_enabled(&mut self, enabled: bool);
}

/// Loader for per-device gripper body definitions.
pub trait BodyLoader {
    /// Instantiate the gripper body for a device model.
    ///
    /// # Errors
    ///
    /// Returns [`BodyLoadError`] when no definition matches the model or
    /// instantiation fails; the affected device is dropped from the
    /// session.
    fn load(
        &mut self,
        instance_name: &str,
        device_model: &str,
    ) -> Result<Box<dyn RigidBody>, BodyLoadError>;
}
