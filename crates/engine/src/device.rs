//! Per-device state: cached pose, edge-detected buttons, wrench output.

use crate::ports::HapticDevice;
use nalgebra::Vector3;
use opengrasp_coupling::{Pose, Wrench};
use opengrasp_device_types::{DeviceModel, DeviceSpec, MAX_BUTTONS};
use opengrasp_errors::DeviceError;
use opengrasp_scheduler::{RateCounter, RateReader};

/// Wraps one open haptic device with the state the haptics loop needs:
/// the last sampled pose, the rising/falling edge latches, the per-device
/// force-enable flag, and a sample-rate counter.
///
/// A `DeviceHandle` is touched by exactly one haptics-loop thread.
/// Cross-thread consumers read the published rate through the
/// [`RateReader`] and pose snapshots through the coupling's shared state,
/// never through this handle.
pub struct DeviceHandle {
    raw: Box<dyn HapticDevice>,
    name: String,
    spec: DeviceSpec,
    model: DeviceModel,
    pose: Pose,
    rising: [bool; MAX_BUTTONS],
    falling: [bool; MAX_BUTTONS],
    force_enabled: bool,
    rate: RateCounter,
    rate_reader: RateReader,
}

impl std::fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("force_enabled", &self.force_enabled)
            .finish_non_exhaustive()
    }
}

impl DeviceHandle {
    /// Wrap an opened device.
    pub fn new(raw: Box<dyn HapticDevice>, spec: DeviceSpec, name: impl Into<String>) -> Self {
        let model = DeviceModel::from_model_name(&spec.model_name);
        let (rate, rate_reader) = RateCounter::new();
        Self {
            raw,
            name: name.into(),
            spec,
            model,
            pose: Pose::identity(),
            rising: [false; MAX_BUTTONS],
            falling: [false; MAX_BUTTONS],
            force_enabled: true,
            rate,
            rate_reader,
        }
    }

    /// Instance name (e.g. `Device1`).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parsed device model.
    pub fn model(&self) -> DeviceModel {
        self.model
    }

    /// Driver-reported specification.
    pub fn spec(&self) -> &DeviceSpec {
        &self.spec
    }

    /// Reader for the measured haptics-loop rate.
    pub fn rate_reader(&self) -> RateReader {
        self.rate_reader.clone()
    }

    /// Record one haptics tick for rate measurement.
    pub fn signal_rate(&mut self) {
        self.rate.signal();
    }

    /// Sample position and rotation from the hardware and cache them.
    pub fn sample(&mut self) -> Pose {
        self.pose = Pose::new(self.raw.position(), self.raw.rotation());
        self.pose
    }

    /// Last sampled pose.
    pub fn pose(&self) -> Pose {
        self.pose
    }

    /// Linear velocity from the hardware.
    pub fn linear_velocity(&mut self) -> Vector3<f64> {
        self.raw.linear_velocity()
    }

    /// Angular velocity from the hardware.
    pub fn angular_velocity(&mut self) -> Vector3<f64> {
        self.raw.angular_velocity()
    }

    /// Sensed gripper angle, if the hardware reports one.
    pub fn gripper_angle(&mut self) -> Option<f64> {
        if self.spec.sensed_gripper {
            self.raw.gripper_angle()
        } else {
            None
        }
    }

    /// Level state of a button.
    pub fn is_pressed(&mut self, index: usize) -> bool {
        if index >= MAX_BUTTONS {
            return false;
        }
        self.raw.button(index)
    }

    /// Rising-edge detection: fires exactly once per press.
    ///
    /// The latch flips high when the edge is reported and clears only
    /// after a poll sees the button released again, so each press yields
    /// one edge no matter how irregular the polling is, as long as one
    /// poll lands between a press and its release.
    pub fn rising_edge(&mut self, index: usize) -> bool {
        if index >= MAX_BUTTONS {
            return false;
        }
        let level = self.raw.button(index);
        if self.rising[index] != level {
            if !self.rising[index] {
                self.rising[index] = true;
                return true;
            }
            self.rising[index] = false;
        }
        false
    }

    /// Falling-edge detection: fires exactly once per release.
    ///
    /// The symmetric construction to [`rising_edge`](Self::rising_edge),
    /// on its own latch array.
    pub fn falling_edge(&mut self, index: usize) -> bool {
        if index >= MAX_BUTTONS {
            return false;
        }
        let level = self.raw.button(index);
        if self.falling[index] != level {
            if self.falling[index] {
                self.falling[index] = false;
                return true;
            }
            self.falling[index] = true;
        }
        false
    }

    /// Enable or disable this device's force output.
    pub fn set_force_enabled(&mut self, enabled: bool) {
        self.force_enabled = enabled;
    }

    /// Whether this device's force output is enabled.
    pub fn force_enabled(&self) -> bool {
        self.force_enabled
    }

    /// Write a wrench to the device.
    ///
    /// The wrench is zeroed (but still written, so stale forces are
    /// flushed) when either the global flag or this device's flag is off.
    ///
    /// # Errors
    ///
    /// Propagates the driver's write failure.
    pub fn apply_wrench(&mut self, wrench: &Wrench, global_enabled: bool) -> Result<(), DeviceError> {
        let (force, torque) = if global_enabled && self.force_enabled {
            (wrench.force, wrench.torque)
        } else {
            (Vector3::zeros(), Vector3::zeros())
        };
        self.raw.set_wrench(force, torque)
    }

    /// Release the underlying device.
    pub fn close(&mut self) {
        self.raw.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::ScriptedDevice;
    use proptest::prelude::*;

    fn test_spec() -> DeviceSpec {
        DeviceSpec {
            model_name: "Generic Test Device".into(),
            max_linear_stiffness: 1000.0,
            max_force: 10.0,
            sensed_gripper: false,
        }
    }

    fn scripted_handle() -> (DeviceHandle, crate::testkit::DeviceScript) {
        let (device, script) = ScriptedDevice::new();
        (
            DeviceHandle::new(Box::new(device), test_spec(), "Device1"),
            script,
        )
    }

    #[test]
    fn test_rising_edge_fires_once_per_press() {
        let (mut handle, script) = scripted_handle();

        script.set_button(0, true);
        assert!(handle.rising_edge(0));
        // Held: no further edges, however often we poll.
        for _ in 0..10 {
            assert!(!handle.rising_edge(0));
        }
        script.set_button(0, false);
        assert!(!handle.rising_edge(0));

        // A second press fires again.
        script.set_button(0, true);
        assert!(handle.rising_edge(0));
    }

    #[test]
    fn test_falling_edge_fires_once_per_release() {
        let (mut handle, script) = scripted_handle();

        script.set_button(2, true);
        assert!(!handle.falling_edge(2));
        script.set_button(2, false);
        assert!(handle.falling_edge(2));
        for _ in 0..10 {
            assert!(!handle.falling_edge(2));
        }
    }

    #[test]
    fn test_edges_with_sparse_polling() {
        // A press that is only polled once while down and once while up
        // still yields exactly one rising edge.
        let (mut handle, script) = scripted_handle();

        script.set_button(1, true);
        // (many unpolled ticks pass)
        assert!(handle.rising_edge(1));
        script.set_button(1, false);
        // (many unpolled ticks pass)
        assert!(!handle.rising_edge(1));
        script.set_button(1, true);
        assert!(handle.rising_edge(1));
    }

    #[test]
    fn test_out_of_range_button_reads_released() {
        let (mut handle, _script) = scripted_handle();
        assert!(!handle.is_pressed(MAX_BUTTONS));
        assert!(!handle.rising_edge(MAX_BUTTONS + 5));
        assert!(!handle.falling_edge(usize::MAX));
    }

    #[test]
    fn test_wrench_zeroed_when_disabled() {
        let (mut handle, script) = scripted_handle();
        let wrench = Wrench {
            force: Vector3::new(1.0, 2.0, 3.0),
            torque: Vector3::new(0.1, 0.2, 0.3),
        };

        handle.set_force_enabled(false);
        assert!(handle.apply_wrench(&wrench, true).is_ok());
        let (force, _) = script.last_wrench();
        assert_eq!(force, Vector3::zeros());

        handle.set_force_enabled(true);
        assert!(handle.apply_wrench(&wrench, false).is_ok());
        let (force, _) = script.last_wrench();
        assert_eq!(force, Vector3::zeros());

        assert!(handle.apply_wrench(&wrench, true).is_ok());
        let (force, torque) = script.last_wrench();
        assert_eq!(force, wrench.force);
        assert_eq!(torque, wrench.torque);
    }

    #[test]
    fn test_gripper_angle_requires_sensing() {
        let (device, script) = ScriptedDevice::new();
        script.set_gripper_angle(0.7);
        let mut spec = test_spec();
        spec.sensed_gripper = false;
        let mut handle = DeviceHandle::new(Box::new(device), spec, "Device1");
        assert_eq!(handle.gripper_angle(), None);

        let (device, script) = ScriptedDevice::new();
        script.set_gripper_angle(0.7);
        let mut spec = test_spec();
        spec.sensed_gripper = true;
        let mut handle = DeviceHandle::new(Box::new(device), spec, "Device2");
        assert_eq!(handle.gripper_angle(), Some(0.7));
    }

    proptest! {
        /// Every press/release cycle yields exactly one rising and one
        /// falling edge, provided each phase is polled at least once.
        /// Extra polls within a phase are jitter and must not add edges.
        #[test]
        fn edges_exactly_once_under_poll_jitter(
            cycles in prop::collection::vec((1usize..5, 1usize..5), 1..20),
        ) {
            let (mut handle, script) = scripted_handle();
            let mut rising_seen = 0usize;
            let mut falling_seen = 0usize;

            for (polls_down, polls_up) in &cycles {
                script.set_button(0, true);
                for _ in 0..*polls_down {
                    if handle.rising_edge(0) {
                        rising_seen += 1;
                    }
                    if handle.falling_edge(0) {
                        falling_seen += 1;
                    }
                }
                script.set_button(0, false);
                for _ in 0..*polls_up {
                    if handle.rising_edge(0) {
                        rising_seen += 1;
                    }
                    if handle.falling_edge(0) {
                        falling_seen += 1;
                    }
                }
            }

            prop_assert_eq!(rising_seen, cycles.len());
            prop_assert_eq!(falling_seen, cycles.len());
        }
    }
}
