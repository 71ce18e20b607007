//! Clutch and camera-reposition frame mapping.
//!
//! Two button-gated freezes share one mechanism: while the gating button
//! is held, the device pose is captured every tick so the reference pose
//! stops advancing; on the press edge the current reference pose becomes
//! the new origin, so motion after release is relative to where the
//! operator left off rather than snapping back.

use crate::Pose;
use nalgebra::{Rotation3, Vector3};

/// Held-state of the two gating buttons for one tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClutchGates {
    /// Camera-reposition clutch held
    pub camera: bool,
    /// Workspace-recenter clutch held
    pub reposition: bool,
}

/// Maps device motion into a simulation-space reference pose, with
/// clutch re-basing and workspace scaling.
#[derive(Debug, Clone)]
pub struct ClutchFrame {
    workspace_scale: f64,
    /// Reference origin; position is stored unscaled.
    ref_origin: Pose,
    /// Device pose captured while a clutch is engaged.
    device_clutched: Pose,
    camera_armed: bool,
    reposition_armed: bool,
}

impl ClutchFrame {
    /// Create a frame for a device whose current rotation is
    /// `initial_device_rotation`, so the mapping starts aligned.
    pub fn new(workspace_scale: f64, initial_device_rotation: Rotation3<f64>) -> Self {
        Self {
            workspace_scale,
            ref_origin: Pose::new(Vector3::zeros(), initial_device_rotation),
            device_clutched: Pose::identity(),
            camera_armed: false,
            reposition_armed: false,
        }
    }

    /// Place the (unscaled) reference origin, e.g. for multi-device grid
    /// layout at session start.
    pub fn with_position_origin(mut self, origin: Vector3<f64>) -> Self {
        self.ref_origin.position = origin;
        self
    }

    /// Device-to-simulation position scale.
    pub fn workspace_scale(&self) -> f64 {
        self.workspace_scale
    }

    /// Advance the mapping one tick and return the new reference pose
    /// (position already workspace-scaled).
    ///
    /// `settling` freezes the clutched device position at the live
    /// position, used during the startup settle window so transients in
    /// the first device samples cannot fling the body.
    pub fn update(
        &mut self,
        device: &Pose,
        camera: &Rotation3<f64>,
        gates: ClutchGates,
        pass_through_rotation: bool,
        settling: bool,
        current_target: &Pose,
    ) -> Pose {
        if settling {
            self.device_clutched.position = device.position;
        }

        if gates.camera {
            if self.camera_armed {
                self.camera_armed = false;
                self.rebase(current_target);
            }
            self.device_clutched = *device;
        } else {
            self.camera_armed = true;
        }

        if gates.reposition {
            if self.reposition_armed {
                self.reposition_armed = false;
                self.rebase(current_target);
            }
            self.device_clutched = *device;
        } else {
            self.reposition_armed = true;
        }

        let position = (self.ref_origin.position
            + camera * (device.position - self.device_clutched.position))
            * self.workspace_scale;

        let rotation = if pass_through_rotation {
            device.rotation
        } else {
            self.ref_origin.rotation
                * camera
                * self.device_clutched.rotation.inverse()
                * device.rotation
                * camera.inverse()
        };

        Pose::new(position, rotation)
    }

    fn rebase(&mut self, current_target: &Pose) {
        self.ref_origin.position = current_target.position / self.workspace_scale;
        self.ref_origin.rotation = current_target.rotation;
    }
}
