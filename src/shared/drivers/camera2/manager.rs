// This is free and unencumbered software released into the public domain.

use super::{CameraDevice, CameraMetadata, CameraResult, CameraStatus, DeviceContext};
use alloc::{boxed::Box, ffi::CString};
use core::{ffi::CStr, ptr::null_mut};
use ndk_sys::{
    ACameraManager, ACameraManager_create, ACameraManager_delete,
    ACameraManager_deleteCameraIdList, ACameraManager_getCameraCharacteristics,
    ACameraManager_getCameraIdList, ACameraManager_openCamera, camera_status_t,
};
use scopeguard::defer;

#[derive(Debug)]
pub struct CameraManager {
    pub(crate) handle: *mut ACameraManager,
}

impl Drop for CameraManager {
    fn drop(&mut self) {
        unsafe {
            ACameraManager_delete(self.handle);
            self.handle = null_mut();
        }
    }
}

impl CameraManager {
    pub fn new() -> Self {
        Self {
            handle: unsafe { ACameraManager_create() },
        }
    }

    pub fn camera_ids(&self) -> CameraResult<Vec<String>> {
        let mut list_ptr = null_mut();
        CameraStatus::check(unsafe { ACameraManager_getCameraIdList(self.handle, &mut list_ptr) })?;

        defer! {
            unsafe { ACameraManager_deleteCameraIdList(list_ptr); }
        }

        let list = unsafe { &*list_ptr };
        if list.numCameras < 1 {
            return Ok(Vec::new());
        }

        let ids = unsafe { core::slice::from_raw_parts(list.cameraIds, list.numCameras as usize) };
        Ok(ids
            .iter()
            .map(|p| unsafe { CStr::from_ptr(*p) }.to_string_lossy().into_owned())
            .collect())
    }

    pub fn characteristics(&self, id: &str) -> CameraResult<CameraMetadata> {
        let id = camera_id(id)?;
        let mut metadata = CameraMetadata::default();
        CameraStatus::check(unsafe {
            ACameraManager_getCameraCharacteristics(self.handle, id.as_ptr(), &mut metadata.handle)
        })?;
        Ok(metadata)
    }

    /// Opens the camera. The NDK opens synchronously; later disconnects
    /// and errors are reported through `context`.
    pub fn open_camera(&self, id: &str, context: Box<DeviceContext>) -> CameraResult<CameraDevice> {
        let id = camera_id(id)?;
        let mut device = CameraDevice::new(context);
        CameraStatus::check(unsafe {
            ACameraManager_openCamera(
                self.handle,
                id.as_ptr(),
                &mut device.state_callbacks,
                &mut device.handle,
            )
        })?;
        Ok(device)
    }
}

fn camera_id(id: &str) -> CameraResult<CString> {
    CString::new(id).map_err(|_| camera_status_t::ACAMERA_ERROR_INVALID_PARAMETER.into())
}
