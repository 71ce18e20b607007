//! Device discovery, pairing, and body-load error types.

use crate::common::ErrorSeverity;

/// Errors raised while enumerating, opening, or talking to a haptic device.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DeviceError {
    /// No device present at the requested index
    #[error("No device at index {0}")]
    NotFound(usize),

    /// Device enumeration succeeded but the open call failed
    #[error("Failed to open device {index} ({model}): {reason}")]
    OpenFailed {
        /// Enumeration index of the device
        index: usize,
        /// Reported device model
        model: String,
        /// Driver-reported failure reason
        reason: String,
    },

    /// A wrench write to the device failed
    #[error("Wrench write to device {0} failed")]
    WriteFailed(String),

    /// Button index outside the device's button range
    #[error("Button index {index} out of range (device has {count})")]
    ButtonOutOfRange {
        /// Requested button index
        index: usize,
        /// Buttons the device actually has
        count: usize,
    },
}

impl DeviceError {
    /// Get the error severity.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            DeviceError::NotFound(_) => ErrorSeverity::Error,
            DeviceError::OpenFailed { .. } => ErrorSeverity::Error,
            DeviceError::WriteFailed(_) => ErrorSeverity::Warning,
            DeviceError::ButtonOutOfRange { .. } => ErrorSeverity::Warning,
        }
    }

    /// Check if this error drops the device from the active set.
    ///
    /// Open failures skip the device at pairing time; write failures and
    /// range errors are tolerated tick-to-tick.
    pub fn drops_device(&self) -> bool {
        matches!(
            self,
            DeviceError::NotFound(_) | DeviceError::OpenFailed { .. }
        )
    }

    /// Create an open-failed error.
    pub fn open_failed(
        index: usize,
        model: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        DeviceError::OpenFailed {
            index,
            model: model.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while loading the simulated gripper body for a device.
///
/// A body-load failure drops only the affected device; the session
/// continues with the reduced set.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BodyLoadError {
    /// No body-group definition matches the device model
    #[error("No gripper body definition for device model '{0}'")]
    NoDefinition(String),

    /// Definition found but the body could not be instantiated
    #[error("Failed to instantiate body '{instance}': {reason}")]
    InstantiationFailed {
        /// Instance name the loader was asked to create
        instance: String,
        /// Loader-reported failure reason
        reason: String,
    },
}

impl BodyLoadError {
    /// Get the error severity.
    pub fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Error
    }
}
