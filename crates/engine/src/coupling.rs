//! One device paired with one simulated gripper body.

use crate::device::DeviceHandle;
use nalgebra::Vector3;
use opengrasp_coupling::{CouplingGains, GainParam, Pose, constants};
use opengrasp_device_types::{DeviceModel, DeviceTuning};
use opengrasp_scheduler::RateReader;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Fields shared between a coupling's haptics thread and the physics
/// thread. The lock around this struct is held only for field copies —
/// never across a tick.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SharedState {
    /// Device-driven reference pose the body is pulled toward
    pub target: Pose,
    /// Body pose as of the last physics step
    pub body_pose: Pose,
    /// Jaw actuator angle, normalized to `[0, 1]`
    pub actuator_angle: f64,
    /// Adjustable coupling gains
    pub gains: CouplingGains,
}

/// Read-only copy of a coupling's shared state, for display.
#[derive(Debug, Clone, Copy)]
pub struct CouplingSnapshot {
    /// Device-driven reference pose
    pub target: Pose,
    /// Body pose as of the last physics step
    pub body_pose: Pose,
    /// Jaw actuator angle
    pub actuator_angle: f64,
    /// Current gains
    pub gains: CouplingGains,
}

/// One device/body pair: the per-device unit run by one haptics loop.
///
/// The device handle is locked by its haptics thread for the lifetime of
/// the loop; everyone else reads through [`SharedState`] snapshots, the
/// published rate, and the tick-completion flag.
pub struct DeviceCoupling {
    name: String,
    model: DeviceModel,
    tuning: DeviceTuning,
    /// Unscaled reference-frame origin assigned at pairing (grid layout).
    origin: Vector3<f64>,
    pub(crate) device: Mutex<DeviceHandle>,
    pub(crate) shared: Mutex<SharedState>,
    tick_complete: AtomicBool,
    rate: RateReader,
}

impl std::fmt::Debug for DeviceCoupling {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceCoupling")
            .field("name", &self.name)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl DeviceCoupling {
    pub(crate) fn new(
        name: impl Into<String>,
        device: DeviceHandle,
        tuning: DeviceTuning,
        gains: CouplingGains,
        origin: Vector3<f64>,
    ) -> Self {
        let model = device.model();
        let rate = device.rate_reader();
        Self {
            name: name.into(),
            model,
            tuning,
            origin,
            device: Mutex::new(device),
            shared: Mutex::new(SharedState {
                target: Pose::identity(),
                body_pose: Pose::identity(),
                actuator_angle: constants::DEFAULT_JAW_ANGLE,
                gains,
            }),
            tick_complete: AtomicBool::new(false),
            rate,
        }
    }

    /// Pair name (matches the device's instance name).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Device model of the paired device.
    pub fn model(&self) -> DeviceModel {
        self.model
    }

    /// Tuning applied at pairing time.
    pub fn tuning(&self) -> &DeviceTuning {
        &self.tuning
    }

    /// Unscaled reference-frame origin assigned at pairing.
    pub fn origin(&self) -> Vector3<f64> {
        self.origin
    }

    /// Measured haptics-loop rate for this device, Hz.
    pub fn device_rate_hz(&self) -> f64 {
        self.rate.frequency_hz()
    }

    /// Copy of the shared state for display.
    pub fn snapshot(&self) -> CouplingSnapshot {
        let shared = self.shared.lock();
        CouplingSnapshot {
            target: shared.target,
            body_pose: shared.body_pose,
            actuator_angle: shared.actuator_angle,
            gains: shared.gains,
        }
    }

    /// Whether this coupling's haptics loop has completed a tick since
    /// the flag was last cleared.
    pub fn tick_complete(&self) -> bool {
        self.tick_complete.load(Ordering::Acquire)
    }

    pub(crate) fn set_tick_complete(&self) {
        self.tick_complete.store(true, Ordering::Release);
    }

    pub(crate) fn clear_tick_complete(&self) {
        self.tick_complete.store(false, Ordering::Release);
    }

    /// Adjust one gain, clamped at zero; returns the resulting value.
    pub(crate) fn adjust_gain(&self, param: GainParam, offset: f64) -> f64 {
        self.shared.lock().gains.adjust(param, offset)
    }

    /// Offset the jaw actuator angle, clamped to `[0, 1]`; returns the
    /// resulting angle.
    pub(crate) fn offset_actuator(&self, offset: f64) -> f64 {
        let mut shared = self.shared.lock();
        shared.actuator_angle = (shared.actuator_angle + offset).clamp(0.0, 1.0);
        shared.actuator_angle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::ScriptedDevice;
    use opengrasp_device_types::DeviceSpec;

    fn coupling() -> DeviceCoupling {
        let (device, _script) = ScriptedDevice::new();
        let spec = DeviceSpec {
            model_name: "Generic".into(),
            max_linear_stiffness: 1000.0,
            max_force: 10.0,
            sensed_gripper: false,
        };
        let handle = crate::device::DeviceHandle::new(Box::new(device), spec, "Device1");
        DeviceCoupling::new(
            "Device1",
            handle,
            DeviceTuning::default(),
            CouplingGains::default(),
            Vector3::zeros(),
        )
    }

    #[test]
    fn test_tick_flag_round_trip() {
        let coupling = coupling();
        assert!(!coupling.tick_complete());
        coupling.set_tick_complete();
        assert!(coupling.tick_complete());
        coupling.clear_tick_complete();
        assert!(!coupling.tick_complete());
    }

    #[test]
    fn test_actuator_offset_clamps() {
        let coupling = coupling();
        assert_eq!(coupling.snapshot().actuator_angle, 0.5);
        assert_eq!(coupling.offset_actuator(0.4), 0.9);
        assert_eq!(coupling.offset_actuator(0.4), 1.0);
        assert_eq!(coupling.offset_actuator(-3.0), 0.0);
        assert_eq!(coupling.offset_actuator(-0.1), 0.0);
    }

    #[test]
    fn test_adjust_gain_clamps_at_zero() {
        let coupling = coupling();
        assert_eq!(coupling.adjust_gain(GainParam::AngularDamping, -50.0), 0.0);
        assert_eq!(coupling.adjust_gain(GainParam::AngularDamping, 2.0), 2.0);
        assert_eq!(coupling.snapshot().gains.angular_damping, 2.0);
    }
}
