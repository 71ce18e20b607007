//! Virtual implementations of the engine's ports, for tests and demos.
//!
//! A `ScriptedDevice` is driven from the test thread through its
//! [`DeviceScript`] handle while the session loops run against it; the
//! world and body doubles expose similar inspection handles.

use crate::ports::{BodyLoader, DevicePort, HapticDevice, PhysicsWorld, RigidBody};
use nalgebra::{Rotation3, Vector3};
use opengrasp_coupling::Pose;
use opengrasp_device_types::{DeviceSpec, MAX_BUTTONS};
use opengrasp_errors::{BodyLoadError, DeviceError};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

const WRENCH_HISTORY: usize = 4096;

#[derive(Debug)]
struct ScriptState {
    position: Vector3<f64>,
    rotation: Rotation3<f64>,
    linear_velocity: Vector3<f64>,
    angular_velocity: Vector3<f64>,
    gripper_angle: f64,
    buttons: [bool; MAX_BUTTONS],
    wrenches: Vec<(Vector3<f64>, Vector3<f64>)>,
    fail_writes: bool,
    closed: bool,
}

impl Default for ScriptState {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            rotation: Rotation3::identity(),
            linear_velocity: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
            gripper_angle: 0.5,
            buttons: [false; MAX_BUTTONS],
            wrenches: Vec::new(),
            fail_writes: false,
            closed: false,
        }
    }
}

/// A haptic device whose state is scripted by the test.
pub struct ScriptedDevice {
    state: Arc<Mutex<ScriptState>>,
}

/// Test-side handle driving and inspecting a [`ScriptedDevice`].
#[derive(Clone)]
pub struct DeviceScript {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedDevice {
    /// Create a device and its script handle.
    pub fn new() -> (Self, DeviceScript) {
        let state = Arc::new(Mutex::new(ScriptState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            DeviceScript { state },
        )
    }
}

impl HapticDevice for ScriptedDevice {
    fn position(&mut self) -> Vector3<f64> {
        self.state.lock().position
    }

    fn rotation(&mut self) -> Rotation3<f64> {
        self.state.lock().rotation
    }

    fn linear_velocity(&mut self) -> Vector3<f64> {
        self.state.lock().linear_velocity
    }

    fn angular_velocity(&mut self) -> Vector3<f64> {
        self.state.lock().angular_velocity
    }

    fn gripper_angle(&mut self) -> Option<f64> {
        Some(self.state.lock().gripper_angle)
    }

    fn button(&mut self, index: usize) -> bool {
        let state = self.state.lock();
        index < MAX_BUTTONS && state.buttons[index]
    }

    fn set_wrench(
        &mut self,
        force: Vector3<f64>,
        torque: Vector3<f64>,
    ) -> Result<(), DeviceError> {
        let mut state = self.state.lock();
        if state.fail_writes {
            return Err(DeviceError::WriteFailed("scripted".into()));
        }
        if state.wrenches.len() < WRENCH_HISTORY {
            state.wrenches.push((force, torque));
        } else {
            // Keep the most recent write observable even after the
            // history fills.
            let last = state.wrenches.len() - 1;
            state.wrenches[last] = (force, torque);
        }
        Ok(())
    }

    fn close(&mut self) {
        self.state.lock().closed = true;
    }
}

impl DeviceScript {
    /// Move the scripted device.
    pub fn set_position(&self, position: Vector3<f64>) {
        self.state.lock().position = position;
    }

    /// Rotate the scripted device.
    pub fn set_rotation(&self, rotation: Rotation3<f64>) {
        self.state.lock().rotation = rotation;
    }

    /// Press or release a button.
    pub fn set_button(&self, index: usize, pressed: bool) {
        if index < MAX_BUTTONS {
            self.state.lock().buttons[index] = pressed;
        }
    }

    /// Set the sensed gripper angle.
    pub fn set_gripper_angle(&self, angle: f64) {
        self.state.lock().gripper_angle = angle;
    }

    /// Make subsequent wrench writes fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.state.lock().fail_writes = fail;
    }

    /// The most recent wrench written to the device.
    pub fn last_wrench(&self) -> (Vector3<f64>, Vector3<f64>) {
        self.state
            .lock()
            .wrenches
            .last()
            .copied()
            .unwrap_or((Vector3::zeros(), Vector3::zeros()))
    }

    /// How many wrench writes the device has accepted.
    pub fn wrench_count(&self) -> usize {
        self.state.lock().wrenches.len()
    }

    /// Whether the device was closed.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

struct PortEntry {
    spec: DeviceSpec,
    device: Option<Box<dyn HapticDevice>>,
    script: DeviceScript,
    fail_open: bool,
}

/// A device port over a fixed set of scripted devices.
pub struct ScriptedPort {
    entries: Vec<PortEntry>,
}

impl ScriptedPort {
    /// Port with `count` generic devices.
    pub fn with_generic_devices(count: usize) -> Self {
        let entries = (0..count)
            .map(|index| {
                let (device, script) = ScriptedDevice::new();
                PortEntry {
                    spec: DeviceSpec {
                        model_name: format!("Generic Device {index}"),
                        max_linear_stiffness: 1000.0,
                        max_force: 10.0,
                        sensed_gripper: false,
                    },
                    device: Some(Box::new(device)),
                    script,
                    fail_open: false,
                }
            })
            .collect();
        Self { entries }
    }

    /// Override the model name reported for one device.
    pub fn set_model_name(&mut self, index: usize, model_name: &str) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.spec.model_name = model_name.to_string();
        }
    }

    /// Mark one device as sensing its gripper angle.
    pub fn set_sensed_gripper(&mut self, index: usize, sensed: bool) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.spec.sensed_gripper = sensed;
        }
    }

    /// Make `open` fail for one device.
    pub fn fail_open(&mut self, index: usize) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.fail_open = true;
        }
    }

    /// The script handle for one device.
    pub fn script(&self, index: usize) -> Option<DeviceScript> {
        self.entries.get(index).map(|entry| entry.script.clone())
    }
}

impl DevicePort for ScriptedPort {
    fn count(&self) -> usize {
        self.entries.len()
    }

    fn specification(&self, index: usize) -> Option<DeviceSpec> {
        self.entries.get(index).map(|entry| entry.spec.clone())
    }

    fn open(&mut self, index: usize) -> Result<Box<dyn HapticDevice>, DeviceError> {
        let entry = self
            .entries
            .get_mut(index)
            .ok_or(DeviceError::NotFound(index))?;
        if entry.fail_open {
            return Err(DeviceError::open_failed(
                index,
                entry.spec.model_name.clone(),
                "scripted open failure",
            ));
        }
        entry.device.take().ok_or(DeviceError::NotFound(index))
    }
}

#[derive(Debug, Default)]
struct WorldState {
    time: f64,
    advances: u64,
    gravity_enabled: bool,
}

/// A physics world double that only accumulates time.
pub struct TestWorld {
    state: Arc<Mutex<WorldState>>,
}

/// Test-side handle inspecting a [`TestWorld`] after it moves into the
/// physics thread.
#[derive(Clone)]
pub struct WorldHandle {
    state: Arc<Mutex<WorldState>>,
}

impl TestWorld {
    /// Create a world (gravity initially on) and its handle.
    pub fn new() -> (Self, WorldHandle) {
        let state = Arc::new(Mutex::new(WorldState {
            gravity_enabled: true,
            ..WorldState::default()
        }));
        (
            Self {
                state: Arc::clone(&state),
            },
            WorldHandle { state },
        )
    }
}

impl PhysicsWorld for TestWorld {
    fn advance(&mut self, dt: f64) {
        let mut state = self.state.lock();
        state.time += dt.max(0.0);
        state.advances += 1;
    }

    fn simulation_time(&self) -> f64 {
        self.state.lock().time
    }

    fn set_gravity_enabled(&mut self, enabled: bool) {
        self.state.lock().gravity_enabled = enabled;
    }
}

impl WorldHandle {
    /// Accumulated simulation time.
    pub fn simulation_time(&self) -> f64 {
        self.state.lock().time
    }

    /// Number of integration steps taken.
    pub fn advances(&self) -> u64 {
        self.state.lock().advances
    }

    /// Whether gravity is enabled.
    pub fn gravity_enabled(&self) -> bool {
        self.state.lock().gravity_enabled
    }
}

#[derive(Debug)]
struct BodyState {
    pose: Pose,
    force: Vector3<f64>,
    torque: Vector3<f64>,
    clear_count: u64,
    actuator_angle: f64,
}

/// A rigid body double with a fixed pose and observable accumulators.
pub struct TestBody {
    state: Arc<Mutex<BodyState>>,
}

/// Test-side handle inspecting a [`TestBody`].
#[derive(Clone)]
pub struct BodyHandle {
    state: Arc<Mutex<BodyState>>,
}

impl TestBody {
    /// Create a body at `pose` and its handle.
    pub fn new(pose: Pose) -> (Self, BodyHandle) {
        let state = Arc::new(Mutex::new(BodyState {
            pose,
            force: Vector3::zeros(),
            torque: Vector3::zeros(),
            clear_count: 0,
            actuator_angle: 0.5,
        }));
        (
            Self {
                state: Arc::clone(&state),
            },
            BodyHandle { state },
        )
    }
}

impl RigidBody for TestBody {
    fn pose(&self) -> Pose {
        self.state.lock().pose
    }

    fn apply_force(&mut self, force: Vector3<f64>) {
        self.state.lock().force += force;
    }

    fn apply_torque(&mut self, torque: Vector3<f64>) {
        self.state.lock().torque += torque;
    }

    fn clear_wrench(&mut self) {
        let mut state = self.state.lock();
        state.force = Vector3::zeros();
        state.torque = Vector3::zeros();
        state.clear_count += 1;
    }

    fn set_actuator_angle(&mut self, angle: f64, _dt: f64) {
        self.state.lock().actuator_angle = angle;
    }
}

impl BodyHandle {
    /// Move the body (tests simulate integration by teleporting).
    pub fn set_pose(&self, pose: Pose) {
        self.state.lock().pose = pose;
    }

    /// Currently accumulated force.
    pub fn force(&self) -> Vector3<f64> {
        self.state.lock().force
    }

    /// Currently accumulated torque.
    pub fn torque(&self) -> Vector3<f64> {
        self.state.lock().torque
    }

    /// How often the accumulators were cleared.
    pub fn clear_count(&self) -> u64 {
        self.state.lock().clear_count
    }

    /// Last actuator angle commanded.
    pub fn actuator_angle(&self) -> f64 {
        self.state.lock().actuator_angle
    }
}

/// A body loader over [`TestBody`] instances, with scriptable failures.
pub struct StaticLoader {
    fail_models: HashSet<String>,
    initial_pose: Pose,
    handles: Vec<BodyHandle>,
}

impl Default for StaticLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticLoader {
    /// Loader creating bodies at the identity pose.
    pub fn new() -> Self {
        Self {
            fail_models: HashSet::new(),
            initial_pose: Pose::identity(),
            handles: Vec::new(),
        }
    }

    /// Loader creating bodies at `pose`.
    pub fn with_body_pose(pose: Pose) -> Self {
        Self {
            initial_pose: pose,
            ..Self::new()
        }
    }

    /// Fail loads for a device model.
    pub fn fail_model(&mut self, model: &str) {
        self.fail_models.insert(model.to_string());
    }

    /// Handles for the bodies loaded so far, in load order.
    pub fn handles(&self) -> &[BodyHandle] {
        &self.handles
    }
}

impl BodyLoader for StaticLoader {
    fn load(
        &mut self,
        _instance_name: &str,
        device_model: &str,
    ) -> Result<Box<dyn RigidBody>, BodyLoadError> {
        if self.fail_models.contains(device_model) {
            return Err(BodyLoadError::NoDefinition(device_model.to_string()));
        }
        let (body, handle) = TestBody::new(self.initial_pose);
        self.handles.push(handle);
        Ok(Box::new(body))
    }
}
