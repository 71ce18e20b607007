//! Virtual-coupling math for OpenGrasp.
//!
//! A virtual coupling is a spring-damper binding a haptic device's
//! reported pose to a simulated gripper body's pose. The same law is
//! evaluated at two sites: the physics loop computes the body-side wrench
//! (authoritative for the integrator) and each haptics loop computes the
//! device-side wrench (what the operator feels). Both sites ramp their
//! gains in over several seconds so a (re)connecting device never sees a
//! force step.

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used)]

pub mod clutch;
pub mod constants;
pub mod wrench;

pub use clutch::{ClutchFrame, ClutchGates};
pub use wrench::{CouplingErrors, SpringDamperState, VirtualCoupling, Wrench, axis_angle};

use nalgebra::{Rotation3, Vector3};
use serde::{Deserialize, Serialize};

/// A rigid pose: position plus rotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    /// Position in the relevant frame
    pub position: Vector3<f64>,
    /// Orientation in the relevant frame
    pub rotation: Rotation3<f64>,
}

impl Pose {
    /// Pose at the origin with identity orientation.
    pub fn identity() -> Self {
        Self {
            position: Vector3::zeros(),
            rotation: Rotation3::identity(),
        }
    }

    /// Pose from explicit parts.
    pub fn new(position: Vector3<f64>, rotation: Rotation3<f64>) -> Self {
        Self { position, rotation }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

/// The six adjustable coupling parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GainParam {
    /// `K_lh`, linear device-side gain
    LinearHaptic,
    /// `K_ah`, angular device-side gain
    AngularHaptic,
    /// `K_lc`, linear controller stiffness
    LinearStiffness,
    /// `K_ac`, angular controller stiffness
    AngularStiffness,
    /// `B_lc`, linear controller damping
    LinearDamping,
    /// `B_ac`, angular controller damping
    AngularDamping,
}

impl GainParam {
    /// Short display label used in status messages.
    pub fn label(&self) -> &'static str {
        match self {
            GainParam::LinearHaptic => "K_lh",
            GainParam::AngularHaptic => "K_ah",
            GainParam::LinearStiffness => "K_lc",
            GainParam::AngularStiffness => "K_ac",
            GainParam::LinearDamping => "B_lc",
            GainParam::AngularDamping => "B_ac",
        }
    }
}

/// Spring-damper gain set for one device/body pair.
///
/// # Examples
///
/// ```
/// use opengrasp_coupling::{CouplingGains, GainParam};
///
/// let mut gains = CouplingGains::default();
/// assert_eq!(gains.get(GainParam::LinearStiffness), 200.0);
///
/// // Adjustments clamp at zero from below rather than going negative.
/// gains.adjust(GainParam::LinearDamping, -100.0);
/// assert_eq!(gains.get(GainParam::LinearDamping), 0.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CouplingGains {
    /// Linear device-side gain, `K_lh`
    pub linear_haptic: f64,
    /// Angular device-side gain, `K_ah`
    pub angular_haptic: f64,
    /// Linear controller stiffness, `K_lc`
    pub linear_stiffness: f64,
    /// Angular controller stiffness, `K_ac`
    pub angular_stiffness: f64,
    /// Linear controller damping, `B_lc`
    pub linear_damping: f64,
    /// Angular controller damping, `B_ac`. Adjustable but not applied to
    /// torque output; the asymmetry matches the reference controller.
    pub angular_damping: f64,
}

impl Default for CouplingGains {
    fn default() -> Self {
        Self {
            linear_haptic: constants::DEFAULT_LINEAR_HAPTIC_GAIN,
            angular_haptic: constants::DEFAULT_ANGULAR_HAPTIC_GAIN,
            linear_stiffness: constants::DEFAULT_LINEAR_STIFFNESS,
            angular_stiffness: constants::DEFAULT_ANGULAR_STIFFNESS,
            linear_damping: constants::DEFAULT_LINEAR_DAMPING,
            angular_damping: constants::DEFAULT_ANGULAR_DAMPING,
        }
    }
}

impl CouplingGains {
    /// Read one parameter.
    pub fn get(&self, param: GainParam) -> f64 {
        match param {
            GainParam::LinearHaptic => self.linear_haptic,
            GainParam::AngularHaptic => self.angular_haptic,
            GainParam::LinearStiffness => self.linear_stiffness,
            GainParam::AngularStiffness => self.angular_stiffness,
            GainParam::LinearDamping => self.linear_damping,
            GainParam::AngularDamping => self.angular_damping,
        }
    }

    fn get_mut(&mut self, param: GainParam) -> &mut f64 {
        match param {
            GainParam::LinearHaptic => &mut self.linear_haptic,
            GainParam::AngularHaptic => &mut self.angular_haptic,
            GainParam::LinearStiffness => &mut self.linear_stiffness,
            GainParam::AngularStiffness => &mut self.angular_stiffness,
            GainParam::LinearDamping => &mut self.linear_damping,
            GainParam::AngularDamping => &mut self.angular_damping,
        }
    }

    /// Add a signed offset to one parameter, clamping at zero from below.
    ///
    /// Returns the resulting value.
    pub fn adjust(&mut self, param: GainParam, offset: f64) -> f64 {
        let value = self.get_mut(param);
        if *value + offset <= 0.0 {
            *value = 0.0;
        } else {
            *value += offset;
        }
        *value
    }

    /// Clamp `K_lh` so the rendered device stiffness `K_lh · K_lc` cannot
    /// exceed what the hardware tolerates in the scaled workspace.
    pub fn limit_haptic_gain(&mut self, max_linear_stiffness: f64, workspace_scale: f64) {
        if self.linear_stiffness <= 0.0 || workspace_scale <= 0.0 {
            return;
        }
        let ceiling = max_linear_stiffness / workspace_scale / self.linear_stiffness;
        self.linear_haptic = self.linear_haptic.min(ceiling);
    }
}

/// One linearly ramped activation gain.
///
/// The value climbs from zero toward its target at a rate proportional to
/// the target magnitude, never overshoots, and never resets mid-session.
/// Retargeting keeps the current value; the next [`advance`](Self::advance)
/// snaps it down if the new target is lower.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GainRamp {
    value: f64,
    target: f64,
    climb: f64,
}

impl GainRamp {
    /// Ramp starting at zero.
    pub fn new(target: f64, climb: f64) -> Self {
        Self {
            value: 0.0,
            target: target.max(0.0),
            climb: climb.max(0.0),
        }
    }

    /// Ramp that already reached its target.
    pub fn settled(target: f64, climb: f64) -> Self {
        let mut ramp = Self::new(target, climb);
        ramp.value = ramp.target;
        ramp
    }

    /// Current ramp value.
    #[inline]
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Target the ramp is climbing toward.
    #[inline]
    pub fn target(&self) -> f64 {
        self.target
    }

    /// Change the target without disturbing the current value.
    pub fn retarget(&mut self, target: f64) {
        self.target = target.max(0.0);
    }

    /// Jump the value straight to the target.
    pub fn settle(&mut self) {
        self.value = self.target;
    }

    /// Advance the ramp by `dt` seconds.
    pub fn advance(&mut self, dt: f64) {
        if dt <= 0.0 {
            return;
        }
        if self.value < self.target {
            self.value = (self.value + self.climb * self.target * dt).min(self.target);
        } else {
            self.value = self.target;
        }
    }

    /// Whether the ramp has reached its target.
    pub fn is_settled(&self) -> bool {
        self.value >= self.target
    }
}
