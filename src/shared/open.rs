// This is free and unencumbered software released into the public domain.

use super::{CameraError, DeviceService};

/// Returns the device service for the current platform.
pub fn default_device() -> Result<Box<dyn DeviceService>, CameraError> {
    cfg_if::cfg_if! {
        if #[cfg(all(feature = "android", target_os = "android"))] {
            Ok(Box::new(super::drivers::camera2::Camera2DeviceService::new()?))
        } else if #[cfg(feature = "simulated")] {
            Ok(Box::new(super::drivers::simulated::SimulatedDevice::new()))
        } else {
            Err(CameraError::NoDriver)
        }
    }
}
