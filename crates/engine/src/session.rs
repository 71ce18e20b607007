//! Session lifecycle and the two real-time loop drivers.
//!
//! A [`Session`] owns the physics world, the paired couplings, and the
//! loop threads: one haptics loop per device plus one physics loop. All
//! threads observe a shared running flag and exit at the top of their
//! next iteration; stopping never interrupts an in-flight tick.

use crate::body::CoupledBody;
use crate::coordinator::{BarrierMode, ControlAction, Coordinator};
use crate::coupling::DeviceCoupling;
use crate::modes::InteractionMode;
use crate::ports::{BodyLoader, DevicePort, PhysicsWorld};
use crate::rt::{LoopState, LoopStateCell};
use crossbeam::channel::{Receiver, Sender, bounded};
use opengrasp_coupling::{
    ClutchFrame, ClutchGates, GainParam, VirtualCoupling, Wrench,
    constants::{JAW_STEP, steps},
};
use opengrasp_device_types::MAX_DEVICES;
use opengrasp_scheduler::{DEFAULT_PHYSICS_HZ, PaceStrategy, RatePacer};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Runtime tunables accepted from the hosting process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Devices to pair, capped at [`MAX_DEVICES`]
    pub max_devices: usize,
    /// Fixed simulation timestep in seconds; `None` computes the step
    /// dynamically from wall-clock drift
    pub fixed_timestep: Option<f64>,
    /// Global force-feedback enable
    pub force_feedback: bool,
    /// How strongly the physics loop synchronizes with the haptics loops
    pub barrier: BarrierMode,
    /// How loops wait out the remainder of a period
    pub pace: PaceStrategy,
    /// Physics loop frequency when no fixed timestep is set
    pub physics_rate_hz: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_devices: MAX_DEVICES,
            fixed_timestep: None,
            force_feedback: true,
            barrier: BarrierMode::default(),
            pace: PaceStrategy::default(),
            physics_rate_hz: DEFAULT_PHYSICS_HZ,
        }
    }
}

impl SessionConfig {
    /// The fixed timestep, if one is set and usable.
    fn effective_fixed_timestep(&self) -> Option<f64> {
        self.fixed_timestep
            .filter(|dt| dt.is_finite() && *dt > 0.0)
    }
}

/// Session lifecycle errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The session has already been started; sessions are start-once
    #[error("Session already started")]
    AlreadyStarted,

    /// A loop thread could not be spawned
    #[error("Failed to spawn {loop_name} thread")]
    Spawn {
        /// Which loop failed to spawn
        loop_name: String,
        /// OS error
        #[source]
        source: std::io::Error,
    },
}

/// Commands forwarded to the physics thread, which owns the world.
#[derive(Debug, Clone, Copy)]
enum PhysicsCommand {
    SetGravity(bool),
}

/// A running (or runnable) coupling session.
///
/// Dropping a running session stops it.
pub struct Session {
    config: SessionConfig,
    coordinator: Arc<Coordinator>,
    world: Option<Box<dyn PhysicsWorld>>,
    bodies: Option<Vec<CoupledBody>>,
    running: Arc<AtomicBool>,
    sim_time_bits: Arc<AtomicU64>,
    physics_state: Arc<LoopStateCell>,
    haptics_states: Vec<Arc<LoopStateCell>>,
    physics_thread: Option<JoinHandle<()>>,
    haptics_threads: Vec<JoinHandle<()>>,
    command_tx: Option<Sender<PhysicsCommand>>,
    epoch: Instant,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("devices", &self.coordinator.device_count())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Pair devices with bodies and prepare a session.
    ///
    /// A session with zero successfully paired devices is degenerate but
    /// valid: the physics loop still runs with no device forces applied.
    pub fn new(
        world: Box<dyn PhysicsWorld>,
        port: &mut dyn DevicePort,
        loader: &mut dyn BodyLoader,
        config: SessionConfig,
    ) -> Self {
        let (coordinator, bodies) = Coordinator::pair_devices(port, loader, config.max_devices);
        coordinator.set_force_feedback(config.force_feedback);
        let haptics_states = coordinator
            .couplings()
            .iter()
            .map(|_| Arc::new(LoopStateCell::new()))
            .collect();

        Self {
            config,
            coordinator: Arc::new(coordinator),
            world: Some(world),
            bodies: Some(bodies),
            running: Arc::new(AtomicBool::new(false)),
            sim_time_bits: Arc::new(AtomicU64::new(0f64.to_bits())),
            physics_state: Arc::new(LoopStateCell::new()),
            haptics_states,
            physics_thread: None,
            haptics_threads: Vec::new(),
            command_tx: None,
            epoch: Instant::now(),
        }
    }

    /// The session coordinator.
    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    /// Whether the loops are running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Physics loop state.
    pub fn physics_state(&self) -> LoopState {
        self.physics_state.get()
    }

    /// State of the haptics loop for coupling `index`.
    pub fn haptics_state(&self, index: usize) -> Option<LoopState> {
        self.haptics_states.get(index).map(|cell| cell.get())
    }

    /// Wall-clock seconds since the session started.
    pub fn wall_time(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// Spawn the physics loop and one haptics loop per paired device.
    ///
    /// # Errors
    ///
    /// [`SessionError::AlreadyStarted`] if called twice;
    /// [`SessionError::Spawn`] if the OS refuses a thread.
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.running.load(Ordering::Acquire) {
            return Err(SessionError::AlreadyStarted);
        }
        let world = self.world.take().ok_or(SessionError::AlreadyStarted)?;
        let bodies = self.bodies.take().unwrap_or_default();

        info!(
            devices = self.coordinator.device_count(),
            "starting session loops"
        );
        self.epoch = Instant::now();
        self.running.store(true, Ordering::Release);

        let (command_tx, command_rx) = bounded(64);

        let physics_ctx = PhysicsContext {
            world,
            bodies,
            coordinator: Arc::clone(&self.coordinator),
            running: Arc::clone(&self.running),
            state: Arc::clone(&self.physics_state),
            command_rx,
            barrier: self.config.barrier,
            pace: self.config.pace,
            fixed_timestep: self.config.effective_fixed_timestep(),
            physics_rate_hz: self.config.physics_rate_hz,
            epoch: self.epoch,
            sim_time_bits: Arc::clone(&self.sim_time_bits),
        };
        let physics_thread = thread::Builder::new()
            .name("physics-loop".to_string())
            .spawn(move || physics_loop_main(physics_ctx))
            .map_err(|source| {
                self.running.store(false, Ordering::Release);
                SessionError::Spawn {
                    loop_name: "physics".to_string(),
                    source,
                }
            })?;
        self.physics_thread = Some(physics_thread);
        self.command_tx = Some(command_tx);

        for (index, coupling) in self.coordinator.couplings().iter().enumerate() {
            let haptics_ctx = HapticsContext {
                coupling: Arc::clone(coupling),
                coordinator: Arc::clone(&self.coordinator),
                running: Arc::clone(&self.running),
                state: Arc::clone(&self.haptics_states[index]),
                fixed_timestep: self.config.effective_fixed_timestep(),
                pace: self.config.pace,
                epoch: self.epoch,
                sim_time_bits: Arc::clone(&self.sim_time_bits),
            };
            let name = format!("haptics-{}", coupling.name());
            let handle = thread::Builder::new()
                .name(name)
                .spawn(move || haptics_loop_main(haptics_ctx))
                .map_err(|source| {
                    self.running.store(false, Ordering::Release);
                    SessionError::Spawn {
                        loop_name: format!("haptics-{}", coupling.name()),
                        source,
                    }
                })?;
            self.haptics_threads.push(handle);
        }

        info!("session loops started");
        Ok(())
    }

    /// Request shutdown, wait (bounded) for every loop to finish its
    /// in-flight tick, join the threads, and close the devices.
    pub fn stop(&mut self) {
        let was_running = self.running.swap(false, Ordering::AcqRel);
        if !was_running && self.physics_thread.is_none() && self.haptics_threads.is_empty() {
            return;
        }
        info!("stopping session");

        // Loops observe the flag at the top of their next iteration; give
        // them a bounded window to report finished before joining.
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            let physics_done = self.physics_thread.is_none()
                || self.physics_state.get() == LoopState::Stopped;
            let haptics_done = self
                .haptics_states
                .iter()
                .take(self.haptics_threads.len())
                .all(|cell| cell.get() == LoopState::Stopped);
            if physics_done && haptics_done {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }

        for handle in self.haptics_threads.drain(..) {
            if handle.join().is_err() {
                error!("haptics thread panicked");
            }
        }
        if let Some(handle) = self.physics_thread.take() {
            if handle.join().is_err() {
                error!("physics thread panicked");
            }
        }
        self.command_tx = None;
        self.coordinator.close_devices();
        info!("session stopped");
    }

    /// Apply a discrete control-surface action from the hosting process.
    pub fn dispatch(&self, action: ControlAction) {
        match action {
            ControlAction::SetGravity(enabled) => {
                if let Some(tx) = &self.command_tx {
                    if tx.try_send(PhysicsCommand::SetGravity(enabled)).is_err() {
                        warn!("physics command queue unavailable, gravity toggle dropped");
                    }
                }
            }
            ControlAction::AdjustGain(param, direction) => {
                let _ = self.coordinator.nudge(param, direction);
            }
            ControlAction::SetCameraFrameRotation(enabled) => {
                self.coordinator.set_camera_frame_rotation(enabled);
            }
            ControlAction::NextMode => {
                let _ = self.coordinator.next_mode();
            }
            ControlAction::PreviousMode => {
                let _ = self.coordinator.previous_mode();
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("session dropped while running, forcing stop");
            self.stop();
        }
    }
}

/// Everything the physics thread owns.
struct PhysicsContext {
    world: Box<dyn PhysicsWorld>,
    bodies: Vec<CoupledBody>,
    coordinator: Arc<Coordinator>,
    running: Arc<AtomicBool>,
    state: Arc<LoopStateCell>,
    command_rx: Receiver<PhysicsCommand>,
    barrier: BarrierMode,
    pace: PaceStrategy,
    fixed_timestep: Option<f64>,
    physics_rate_hz: f64,
    epoch: Instant,
    sim_time_bits: Arc<AtomicU64>,
}

fn physics_loop_main(mut ctx: PhysicsContext) {
    info!("physics loop started");
    ctx.state.set(LoopState::Running);

    let counters = ctx.coordinator.counters();
    let mut body_couplings: Vec<VirtualCoupling> = ctx
        .bodies
        .iter()
        .map(|_| VirtualCoupling::body_side())
        .collect();

    let rate_hz = ctx
        .fixed_timestep
        .map(|dt| 1.0 / dt)
        .unwrap_or(ctx.physics_rate_hz);
    let mut pacer = RatePacer::new(rate_hz, ctx.pace)
        .unwrap_or_else(|_| RatePacer::with_period(Duration::from_millis(1), ctx.pace));

    while ctx.running.load(Ordering::Acquire) {
        while let Ok(command) = ctx.command_rx.try_recv() {
            match command {
                PhysicsCommand::SetGravity(enabled) => {
                    info!(enabled, "gravity toggled");
                    ctx.world.set_gravity_enabled(enabled);
                }
            }
        }

        if ctx.barrier == BarrierMode::Strict {
            // Wait for every haptics loop to publish a fresh tick; the
            // running flag bounds the wait so shutdown cannot deadlock.
            while !ctx.coordinator.all_ticks_complete() && ctx.running.load(Ordering::Acquire) {
                std::hint::spin_loop();
            }
        }

        let dt = ctx.fixed_timestep.unwrap_or_else(|| {
            (ctx.epoch.elapsed().as_secs_f64() - ctx.world.simulation_time()).max(0.0)
        });

        for ((coupling, body), vc) in ctx
            .coordinator
            .couplings()
            .iter()
            .zip(ctx.bodies.iter_mut())
            .zip(body_couplings.iter_mut())
        {
            let body_pose = body.pose();
            let (target, gains, actuator_angle) = {
                let mut shared = coupling.shared.lock();
                shared.body_pose = body_pose;
                (shared.target, shared.gains, shared.actuator_angle)
            };

            let wrench = vc.wrench(&gains, &target, &body_pose, dt);
            body.clear_wrench();
            body.apply_wrench(&wrench);
            body.set_actuator_angle(actuator_angle, dt);
            vc.advance_ramps(dt);
        }

        ctx.world.advance(dt);
        ctx.sim_time_bits
            .store(ctx.world.simulation_time().to_bits(), Ordering::Relaxed);
        counters.inc_tick();
        ctx.coordinator.clear_tick_flags();

        if pacer.pace().overrun {
            counters.inc_missed_tick();
        }
    }

    ctx.state.set(LoopState::Draining);
    for body in &mut ctx.bodies {
        body.clear_wrench();
    }
    ctx.state.set(LoopState::Stopped);
    info!("physics loop stopped");
}

/// Everything one haptics thread owns.
struct HapticsContext {
    coupling: Arc<DeviceCoupling>,
    coordinator: Arc<Coordinator>,
    running: Arc<AtomicBool>,
    state: Arc<LoopStateCell>,
    fixed_timestep: Option<f64>,
    pace: PaceStrategy,
    epoch: Instant,
    sim_time_bits: Arc<AtomicU64>,
}

fn haptics_loop_main(ctx: HapticsContext) {
    let counters = ctx.coordinator.counters();
    let tuning = *ctx.coupling.tuning();
    let buttons = tuning.buttons;

    info!(device = ctx.coupling.name(), "haptics loop started");
    ctx.state.set(LoopState::Running);

    // The haptics thread owns the device for the life of the loop.
    let mut device = ctx.coupling.device.lock();

    let initial = device.sample();
    let mut clutch = ClutchFrame::new(tuning.workspace_scale, initial.rotation)
        .with_position_origin(ctx.coupling.origin());
    let mut vc = VirtualCoupling::device_side(&ctx.coupling.snapshot().gains);

    // Free-run at the device's natural rate unless a fixed timestep asks
    // for the same pacing discipline as the physics loop.
    let mut pacer = ctx
        .fixed_timestep
        .and_then(|dt| RatePacer::new(1.0 / dt, ctx.pace).ok());

    while ctx.running.load(Ordering::Acquire) {
        device.signal_rate();

        let sim_time = f64::from_bits(ctx.sim_time_bits.load(Ordering::Relaxed));
        let wall = ctx.epoch.elapsed().as_secs_f64();
        let dt = ctx.fixed_timestep.unwrap_or_else(|| (wall - sim_time).max(0.0));

        let pose = device.sample();

        if let Some(pinch) = buttons.pinch {
            if device.is_pressed(pinch) {
                device.set_force_enabled(true);
            }
        }
        let sensed_angle = device.gripper_angle();

        if device.rising_edge(buttons.mode_next) {
            let _ = ctx.coordinator.next_mode();
        }
        if device.rising_edge(buttons.mode_prev) {
            let _ = ctx.coordinator.previous_mode();
        }

        let primary_rising = device.rising_edge(buttons.primary);
        let primary_falling = device.falling_edge(buttons.primary);
        let secondary_rising = device.rising_edge(buttons.secondary);
        let secondary_falling = device.falling_edge(buttons.secondary);

        let mut gates = ClutchGates::default();
        match ctx.coordinator.current_mode() {
            InteractionMode::CameraClutch => {
                gates.reposition = device.is_pressed(buttons.primary);
                gates.camera = device.is_pressed(buttons.secondary);
                ctx.coordinator.update_clutch_status(
                    gates.reposition,
                    gates.camera,
                    primary_falling || secondary_falling,
                );
            }
            InteractionMode::GripperJaw => {
                if primary_rising {
                    let _ = ctx.coupling.offset_actuator(JAW_STEP);
                }
                if secondary_rising {
                    let _ = ctx.coupling.offset_actuator(-JAW_STEP);
                }
            }
            InteractionMode::LinearStiffness => {
                adjust_on_edges(
                    &ctx.coordinator,
                    GainParam::LinearStiffness,
                    steps::BTN_LINEAR_STIFFNESS,
                    primary_rising,
                    secondary_rising,
                );
            }
            InteractionMode::AngularStiffness => {
                adjust_on_edges(
                    &ctx.coordinator,
                    GainParam::AngularStiffness,
                    steps::BTN_ANGULAR_STIFFNESS,
                    primary_rising,
                    secondary_rising,
                );
            }
            InteractionMode::LinearDamping => {
                adjust_on_edges(
                    &ctx.coordinator,
                    GainParam::LinearDamping,
                    steps::BTN_LINEAR_DAMPING,
                    primary_rising,
                    secondary_rising,
                );
            }
            InteractionMode::AngularDamping => {
                adjust_on_edges(
                    &ctx.coordinator,
                    GainParam::AngularDamping,
                    steps::BTN_ANGULAR_DAMPING,
                    primary_rising,
                    secondary_rising,
                );
            }
            InteractionMode::LinearDeviceGain => {
                adjust_on_edges(
                    &ctx.coordinator,
                    GainParam::LinearHaptic,
                    steps::BTN_LINEAR_HAPTIC,
                    primary_rising,
                    secondary_rising,
                );
            }
            InteractionMode::AngularDeviceGain => {
                adjust_on_edges(
                    &ctx.coordinator,
                    GainParam::AngularHaptic,
                    steps::BTN_ANGULAR_HAPTIC,
                    primary_rising,
                    secondary_rising,
                );
            }
        }

        let settling = ctx.epoch.elapsed().as_secs_f64() < tuning.settle_time_s;
        let camera = ctx.coordinator.camera_rotation();
        let pass_through = ctx.coordinator.camera_frame_rotation();

        let (prev_target, body_pose, gains) = {
            let shared = ctx.coupling.shared.lock();
            (shared.target, shared.body_pose, shared.gains)
        };

        let target = clutch.update(&pose, &camera, gates, pass_through, settling, &prev_target);
        let wrench = vc.wrench(&gains, &target, &body_pose, dt);

        let force_feedback = ctx.coordinator.force_feedback_enabled();
        if device.apply_wrench(&wrench, force_feedback).is_err() {
            counters.inc_device_write_error();
        }

        {
            let mut shared = ctx.coupling.shared.lock();
            shared.target = target;
            if let Some(angle) = sensed_angle {
                shared.actuator_angle = angle;
            }
        }

        ctx.coupling.set_tick_complete();
        vc.advance_ramps(dt);

        if let Some(pacer) = pacer.as_mut() {
            pacer.pace();
        }
    }

    // Leave the device at rest rather than holding the last wrench.
    let _ = device.apply_wrench(&Wrench::zero(), false);
    drop(device);

    ctx.state.set(LoopState::Stopped);
    info!(device = ctx.coupling.name(), "haptics loop stopped");
}

fn adjust_on_edges(
    coordinator: &Coordinator,
    param: GainParam,
    step: f64,
    increase: bool,
    decrease: bool,
) {
    if increase {
        let _ = coordinator.adjust_all(param, step);
    }
    if decrease {
        let _ = coordinator.adjust_all(param, -step);
    }
}
