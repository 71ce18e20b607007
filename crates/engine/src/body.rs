//! Simulated gripper body wrapper.

use crate::ports::RigidBody;
use opengrasp_coupling::{Pose, Wrench};

/// One simulated gripper body, owned by the physics loop.
///
/// The wrapper owns the loader-provided [`RigidBody`] handle; the rest of
/// the engine sees only the pose snapshots the physics loop publishes
/// into the coupling's shared state.
pub struct CoupledBody {
    name: String,
    body: Box<dyn RigidBody>,
}

impl std::fmt::Debug for CoupledBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoupledBody")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl CoupledBody {
    /// Wrap a loaded body.
    pub fn new(name: impl Into<String>, body: Box<dyn RigidBody>) -> Self {
        Self {
            name: name.into(),
            body,
        }
    }

    /// Instance name (e.g. `Gripper1`).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current pose from the integrator.
    pub fn pose(&self) -> Pose {
        self.body.pose()
    }

    /// Accumulate a wrench for the next integration step.
    pub fn apply_wrench(&mut self, wrench: &Wrench) {
        self.body.apply_force(wrench.force);
        self.body.apply_torque(wrench.torque);
    }

    /// Clear the force/torque accumulators.
    pub fn clear_wrench(&mut self) {
        self.body.clear_wrench();
    }

    /// Drive the jaw actuator toward `angle` over `dt` seconds.
    pub fn set_actuator_angle(&mut self, angle: f64, dt: f64) {
        self.body.set_actuator_angle(angle, dt);
    }
}
