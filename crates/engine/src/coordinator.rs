//! Session-wide coordination: device pairing, aggregate gain operations,
//! the shared mode machine, and the per-tick completion barrier.

use crate::body::CoupledBody;
use crate::coupling::DeviceCoupling;
use crate::device::DeviceHandle;
use crate::modes::{InteractionMode, InteractionModeMachine};
use crate::ports::{BodyLoader, DevicePort};
use nalgebra::{Rotation3, Vector3};
use opengrasp_atomic::LoopCounters;
use opengrasp_coupling::{CouplingGains, GainParam, constants::steps};
use opengrasp_device_types::{DeviceModel, MAX_DEVICES, tuning_for};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

/// How strongly the physics loop synchronizes with the haptics loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BarrierMode {
    /// Best effort: the physics loop steps whether or not every haptics
    /// loop has ticked. Per-field locks keep the data race benign; a
    /// stale reference pose for one step is accepted for latency.
    #[default]
    Advisory,
    /// The physics loop waits until every active haptics loop has
    /// completed a tick since the last physics step (bounded by session
    /// shutdown).
    Strict,
}

/// Direction of a host-surface gain adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Increase by the parameter's standard step
    Increase,
    /// Decrease by the parameter's standard step
    Decrease,
}

impl Direction {
    fn signed(self, step: f64) -> f64 {
        match self {
            Direction::Increase => step,
            Direction::Decrease => -step,
        }
    }
}

/// Discrete control-surface actions delivered by the hosting process.
///
/// The host maps its own input events (keys, UI) to these; the engine
/// stays input-agnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlAction {
    /// Toggle gravity in the shared physics world
    SetGravity(bool),
    /// Adjust one coupling parameter across all devices
    AdjustGain(GainParam, Direction),
    /// Pass device rotation through directly instead of composing with
    /// the camera frame
    SetCameraFrameRotation(bool),
    /// Advance the interaction mode
    NextMode,
    /// Return to the previous interaction mode
    PreviousMode,
}

/// Owns the paired device couplings, the interaction-mode machine, and
/// the session-global flags every loop reads.
pub struct Coordinator {
    couplings: Vec<Arc<DeviceCoupling>>,
    modes: Mutex<InteractionModeMachine>,
    camera_rotation: Mutex<Rotation3<f64>>,
    use_camera_frame_rotation: AtomicBool,
    force_feedback: AtomicBool,
    counters: Arc<LoopCounters>,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("devices", &self.couplings.len())
            .finish_non_exhaustive()
    }
}

impl Coordinator {
    /// Discover up to `max_devices` devices and pair each with a freshly
    /// loaded gripper body.
    ///
    /// A device whose open or body load fails is dropped from the active
    /// set; the session continues with the rest. Returns the coordinator
    /// and the loaded bodies, index-aligned with
    /// [`couplings`](Self::couplings).
    pub fn pair_devices(
        port: &mut dyn DevicePort,
        loader: &mut dyn BodyLoader,
        max_devices: usize,
    ) -> (Self, Vec<CoupledBody>) {
        let counters = Arc::new(LoopCounters::new());
        let available = port.count();
        let to_load = available.min(max_devices).min(MAX_DEVICES);
        info!(available, loading = to_load, "pairing haptic devices");

        let mut couplings = Vec::with_capacity(to_load);
        let mut bodies = Vec::with_capacity(to_load);

        for index in 0..to_load {
            let Some(spec) = port.specification(index) else {
                warn!(index, "device has no specification, skipping");
                counters.inc_device_dropped();
                continue;
            };
            let mut raw = match port.open(index) {
                Ok(device) => device,
                Err(err) => {
                    warn!(index, model = %spec.model_name, %err, "failed to open device");
                    counters.inc_device_dropped();
                    continue;
                }
            };

            let model = DeviceModel::from_model_name(&spec.model_name);
            let tuning = tuning_for(model);
            if model != DeviceModel::Generic {
                info!(model = %spec.model_name, "recognized device, applying model tuning");
            }

            let device_name = format!("Device{}", index + 1);
            let instance = format!("Gripper{}", index + 1);
            let body = match loader.load(&instance, &spec.model_name) {
                Ok(body) => body,
                Err(err) => {
                    warn!(model = %spec.model_name, %err, "no gripper body, dropping device");
                    raw.close();
                    counters.inc_device_dropped();
                    continue;
                }
            };

            let mut gains = CouplingGains::default();
            if let Some(k) = tuning.linear_haptic_gain {
                gains.linear_haptic = k;
            }
            if let Some(k) = tuning.angular_haptic_gain {
                gains.angular_haptic = k;
            }
            gains.limit_haptic_gain(spec.max_linear_stiffness, tuning.workspace_scale);

            let mut handle = DeviceHandle::new(raw, spec, device_name.clone());
            handle.set_force_enabled(tuning.force_feedback_on_start);

            let body = CoupledBody::new(instance, body);
            // Bodies that spawn at the origin get a grid slot so multiple
            // grippers never stack on top of each other.
            let origin = if body.pose().position == Vector3::zeros() {
                let column = (index / 2) as f64 * 0.8;
                let side = if index % 2 == 1 { 0.4 } else { -0.4 };
                Vector3::new(column, side, 0.0) / tuning.workspace_scale
            } else {
                Vector3::zeros()
            };

            couplings.push(Arc::new(DeviceCoupling::new(
                device_name,
                handle,
                tuning,
                gains,
                origin,
            )));
            bodies.push(body);
        }

        info!(paired = couplings.len(), "device pairing complete");

        (
            Self {
                couplings,
                modes: Mutex::new(InteractionModeMachine::new()),
                camera_rotation: Mutex::new(Rotation3::identity()),
                use_camera_frame_rotation: AtomicBool::new(true),
                force_feedback: AtomicBool::new(true),
                counters,
            },
            bodies,
        )
    }

    /// Number of active device couplings.
    pub fn device_count(&self) -> usize {
        self.couplings.len()
    }

    /// The active couplings.
    pub fn couplings(&self) -> &[Arc<DeviceCoupling>] {
        &self.couplings
    }

    /// Shared loop counters.
    pub fn counters(&self) -> Arc<LoopCounters> {
        Arc::clone(&self.counters)
    }

    /// Adjust one coupling parameter across all devices by a signed
    /// offset, clamped at zero from below.
    ///
    /// Returns the resulting value of the last device (for on-screen
    /// feedback) and updates the shared status string. With no devices
    /// the offset is returned unchanged and no status is written.
    pub fn adjust_all(&self, param: GainParam, offset: f64) -> f64 {
        let mut last = offset;
        for coupling in &self.couplings {
            last = coupling.adjust_gain(param, offset);
        }
        if !self.couplings.is_empty() {
            self.modes
                .lock()
                .set_status(format!("{} = {:.4}", param.label(), last));
        }
        last
    }

    /// Adjust one parameter by its standard host-surface step.
    pub fn nudge(&self, param: GainParam, direction: Direction) -> f64 {
        self.adjust_all(param, direction.signed(key_step(param)))
    }

    /// Advance the shared interaction mode.
    pub fn next_mode(&self) -> InteractionMode {
        self.counters.inc_mode_change();
        self.modes.lock().next()
    }

    /// Return to the previous interaction mode.
    pub fn previous_mode(&self) -> InteractionMode {
        self.counters.inc_mode_change();
        self.modes.lock().previous()
    }

    /// Current interaction mode.
    pub fn current_mode(&self) -> InteractionMode {
        self.modes.lock().current()
    }

    /// Current mode index.
    pub fn mode_index(&self) -> usize {
        self.modes.lock().index()
    }

    /// Transient status string describing the last button action.
    pub fn status(&self) -> String {
        self.modes.lock().status().to_string()
    }

    pub(crate) fn update_clutch_status(
        &self,
        clutch_held: bool,
        camera_held: bool,
        any_falling_edge: bool,
    ) {
        let mut modes = self.modes.lock();
        if clutch_held {
            modes.set_clutch_display(true);
            modes.set_status("Clutch Pressed");
        }
        if camera_held {
            modes.set_camera_display(true);
            modes.set_status("Cam Pressed");
        }
        if any_falling_edge {
            modes.clear_status();
        }
    }

    /// Whether all active haptics loops have completed a tick since the
    /// flags were last cleared. Vacuously true with no devices.
    pub fn all_ticks_complete(&self) -> bool {
        self.couplings.iter().all(|c| c.tick_complete())
    }

    /// How many haptics loops have completed a tick since the last clear.
    pub fn completed_tick_count(&self) -> usize {
        self.couplings.iter().filter(|c| c.tick_complete()).count()
    }

    /// Clear every coupling's completion flag.
    pub fn clear_tick_flags(&self) {
        for coupling in &self.couplings {
            coupling.clear_tick_complete();
        }
    }

    /// Publish the active camera rotation (from the hosting renderer).
    pub fn set_camera_rotation(&self, rotation: Rotation3<f64>) {
        *self.camera_rotation.lock() = rotation;
    }

    /// The camera rotation haptics loops compose device motion with.
    pub fn camera_rotation(&self) -> Rotation3<f64> {
        *self.camera_rotation.lock()
    }

    /// Set whether device rotation passes through directly.
    pub fn set_camera_frame_rotation(&self, enabled: bool) {
        self.use_camera_frame_rotation
            .store(enabled, Ordering::Release);
    }

    /// Whether device rotation passes through directly.
    pub fn camera_frame_rotation(&self) -> bool {
        self.use_camera_frame_rotation.load(Ordering::Acquire)
    }

    /// Globally enable or disable force output to every device.
    pub fn set_force_feedback(&self, enabled: bool) {
        self.force_feedback.store(enabled, Ordering::Release);
    }

    /// Whether force output is globally enabled.
    pub fn force_feedback_enabled(&self) -> bool {
        self.force_feedback.load(Ordering::Acquire)
    }

    /// Close every paired device. Called after the loops have joined.
    pub(crate) fn close_devices(&self) {
        for coupling in &self.couplings {
            coupling.device.lock().close();
        }
    }
}

fn key_step(param: GainParam) -> f64 {
    match param {
        GainParam::LinearHaptic => steps::KEY_LINEAR_HAPTIC,
        GainParam::AngularHaptic => steps::KEY_ANGULAR_HAPTIC,
        GainParam::LinearStiffness => steps::KEY_LINEAR_STIFFNESS,
        GainParam::AngularStiffness => steps::KEY_ANGULAR_STIFFNESS,
        GainParam::LinearDamping => steps::KEY_LINEAR_DAMPING,
        GainParam::AngularDamping => steps::KEY_ANGULAR_DAMPING,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{ScriptedPort, StaticLoader};

    fn paired(devices: usize) -> (Coordinator, Vec<CoupledBody>) {
        let mut port = ScriptedPort::with_generic_devices(devices);
        let mut loader = StaticLoader::new();
        Coordinator::pair_devices(&mut port, &mut loader, MAX_DEVICES)
    }

    #[test]
    fn test_pairing_counts() {
        let (coordinator, bodies) = paired(3);
        assert_eq!(coordinator.device_count(), 3);
        assert_eq!(bodies.len(), 3);
    }

    #[test]
    fn test_body_load_failure_drops_only_that_device() {
        let mut port = ScriptedPort::with_generic_devices(2);
        port.set_model_name(1, "Falcon");
        let mut loader = StaticLoader::new();
        loader.fail_model("Falcon");

        let (coordinator, bodies) = Coordinator::pair_devices(&mut port, &mut loader, MAX_DEVICES);
        assert_eq!(coordinator.device_count(), 1);
        assert_eq!(bodies.len(), 1);
        assert_eq!(coordinator.counters().snapshot().devices_dropped, 1);
    }

    #[test]
    fn test_open_failure_drops_only_that_device() {
        let mut port = ScriptedPort::with_generic_devices(2);
        port.fail_open(0);
        let mut loader = StaticLoader::new();

        let (coordinator, _bodies) = Coordinator::pair_devices(&mut port, &mut loader, MAX_DEVICES);
        assert_eq!(coordinator.device_count(), 1);
        assert_eq!(coordinator.counters().snapshot().devices_dropped, 1);
    }

    #[test]
    fn test_max_devices_cap() {
        let mut port = ScriptedPort::with_generic_devices(4);
        let mut loader = StaticLoader::new();
        let (coordinator, _bodies) = Coordinator::pair_devices(&mut port, &mut loader, 2);
        assert_eq!(coordinator.device_count(), 2);
    }

    #[test]
    fn test_adjust_all_returns_last_and_sets_status() {
        let (coordinator, _bodies) = paired(2);
        let value = coordinator.adjust_all(GainParam::LinearStiffness, 50.0);
        assert_eq!(value, 250.0);
        assert_eq!(coordinator.status(), "K_lc = 250.0000");

        // +x then -x restores the original value away from the clamp.
        coordinator.adjust_all(GainParam::LinearStiffness, -50.0);
        for coupling in coordinator.couplings() {
            assert_eq!(coupling.snapshot().gains.linear_stiffness, 200.0);
        }
    }

    #[test]
    fn test_adjust_all_with_no_devices_returns_offset() {
        let (coordinator, _bodies) = paired(0);
        assert_eq!(coordinator.adjust_all(GainParam::LinearDamping, 1.5), 1.5);
        assert_eq!(coordinator.status(), "");
    }

    #[test]
    fn test_nudge_uses_key_steps() {
        let (coordinator, _bodies) = paired(1);
        let value = coordinator.nudge(GainParam::LinearHaptic, Direction::Increase);
        assert!((value - 0.07).abs() < 1e-12);
        let value = coordinator.nudge(GainParam::LinearHaptic, Direction::Decrease);
        assert!((value - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_barrier_queries() {
        let (coordinator, _bodies) = paired(2);
        assert!(!coordinator.all_ticks_complete());
        assert_eq!(coordinator.completed_tick_count(), 0);

        coordinator.couplings()[0].set_tick_complete();
        assert!(!coordinator.all_ticks_complete());
        assert_eq!(coordinator.completed_tick_count(), 1);

        coordinator.couplings()[1].set_tick_complete();
        assert!(coordinator.all_ticks_complete());

        coordinator.clear_tick_flags();
        assert_eq!(coordinator.completed_tick_count(), 0);
    }

    #[test]
    fn test_empty_session_barrier_is_vacuously_complete() {
        let (coordinator, _bodies) = paired(0);
        assert!(coordinator.all_ticks_complete());
    }

    #[test]
    fn test_mode_delegation() {
        let (coordinator, _bodies) = paired(1);
        assert_eq!(coordinator.mode_index(), 0);
        coordinator.previous_mode();
        assert_eq!(coordinator.mode_index(), 7);
        coordinator.next_mode();
        assert_eq!(coordinator.mode_index(), 0);
        assert_eq!(coordinator.counters().snapshot().mode_changes, 2);
    }

    #[test]
    fn test_mtm_pairing_disables_force_feedback_at_start() {
        let mut port = ScriptedPort::with_generic_devices(1);
        port.set_model_name(0, "MTM-R");
        let mut loader = StaticLoader::new();
        let (coordinator, _bodies) = Coordinator::pair_devices(&mut port, &mut loader, MAX_DEVICES);

        let coupling = &coordinator.couplings()[0];
        assert_eq!(coupling.model(), DeviceModel::MtmRight);
        assert!(!coupling.device.lock().force_enabled());
        assert_eq!(coupling.snapshot().gains.linear_haptic, 0.04);
        assert_eq!(coupling.snapshot().gains.angular_haptic, 0.0);
    }

    #[test]
    fn test_grid_origins_spread_devices() {
        let (coordinator, _bodies) = paired(3);
        let origins: Vec<_> = coordinator
            .couplings()
            .iter()
            .map(|c| c.origin())
            .collect();
        assert_ne!(origins[0], origins[1]);
        assert_ne!(origins[1], origins[2]);
        assert_ne!(origins[0], origins[2]);
    }
}
