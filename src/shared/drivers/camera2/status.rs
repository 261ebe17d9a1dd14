// This is free and unencumbered software released into the public domain.

use crate::shared::CameraError;
use derive_more::Display;
use ndk_sys::camera_status_t;

pub type CameraResult<T = ()> = core::result::Result<T, CameraStatus>;

/// A failed NDK camera call.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
#[display("camera status {}", _0.0)]
pub struct CameraStatus(pub(crate) camera_status_t);

impl core::error::Error for CameraStatus {}

impl From<camera_status_t> for CameraStatus {
    fn from(input: camera_status_t) -> Self {
        Self(input)
    }
}

impl CameraStatus {
    pub fn code(&self) -> i32 {
        self.0.0 as i32
    }

    pub(crate) fn check(status: camera_status_t) -> CameraResult {
        if status == camera_status_t::ACAMERA_OK {
            Ok(())
        } else {
            Err(status.into())
        }
    }

    pub(crate) fn into_error(self, context: &'static str) -> CameraError {
        if self.0 == camera_status_t::ACAMERA_ERROR_PERMISSION_DENIED {
            return CameraError::PermissionDenied;
        }
        CameraError::driver(context, self)
    }
}
