// This is free and unencumbered software released into the public domain.

//! Android NDK camera back-end.

mod capture;
pub use capture::*;

mod device;
pub use device::*;

mod manager;
pub use manager::*;

mod metadata;
pub use metadata::*;

mod status;
pub use status::*;

mod window;
pub use window::*;

use crate::shared::{
    CameraCharacteristics, CameraError, CameraId, CaptureRequest, CaptureSession, Connection,
    DeviceCallbacks, DeviceHandle, DeviceService, RenderTarget, SessionCallbacks,
};
use alloc::{borrow::Cow, boxed::Box};
use asimov_module::tracing::{debug, info, warn};
use ndk_sys::android_get_device_api_level;
use std::collections::BTreeMap;

#[link(name = "camera2ndk")]
unsafe extern "C" {}

#[link(name = "android")]
unsafe extern "C" {}

struct OpenCamera {
    device: CameraDevice,
    capture: Option<(DeviceHandle, CameraCaptureSession)>,
}

/// [`DeviceService`] over the NDK camera manager.
///
/// The preview window is taken from a [`WindowSlot`] each time a capture
/// session is built.
pub struct Camera2DeviceService {
    manager: CameraManager,
    window: WindowSlot,
    api_level: u32,
    next_handle: u64,
    cameras: BTreeMap<DeviceHandle, OpenCamera>,
    requests: BTreeMap<DeviceHandle, PreviewRequest>,
}

// SAFETY: the service is owned by the camera worker and only used from it;
// the NDK objects it holds may be used from any single thread at a time.
unsafe impl Send for Camera2DeviceService {}

impl core::fmt::Debug for Camera2DeviceService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Camera2DeviceService")
            .field("api_level", &self.api_level)
            .field("open", &self.cameras.len())
            .finish_non_exhaustive()
    }
}

impl dogma::Named for Camera2DeviceService {
    fn name(&self) -> Cow<'_, str> {
        "camera2".into()
    }
}

impl Camera2DeviceService {
    /// Uses the process-wide [`WindowSlot::shared`] slot.
    pub fn new() -> Result<Self, CameraError> {
        Self::with_window_slot(WindowSlot::shared())
    }

    pub fn with_window_slot(window: WindowSlot) -> Result<Self, CameraError> {
        let api_level = unsafe { android_get_device_api_level() } as u32;
        let manager = CameraManager::new();
        if manager.handle.is_null() {
            return Err(CameraError::NoDriver);
        }
        debug!(api_level, "camera2 manager created");
        Ok(Self {
            manager,
            window,
            api_level,
            next_handle: 0,
            cameras: BTreeMap::new(),
            requests: BTreeMap::new(),
        })
    }

    pub fn window_slot(&self) -> &WindowSlot {
        &self.window
    }

    fn next_handle(&mut self) -> DeviceHandle {
        self.next_handle += 1;
        DeviceHandle(self.next_handle)
    }

    fn camera(&mut self, connection: &Connection) -> Result<&mut OpenCamera, CameraError> {
        self.cameras
            .get_mut(&connection.handle)
            .ok_or(CameraError::NotConnected)
    }
}

impl DeviceService for Camera2DeviceService {
    fn camera_ids(&self) -> Result<Vec<String>, CameraError> {
        self.manager
            .camera_ids()
            .map_err(|status| status.into_error("listing cameras"))
    }

    fn characteristics(&self, camera: CameraId) -> Result<CameraCharacteristics, CameraError> {
        self.manager
            .characteristics(camera.platform_id())
            .and_then(|metadata| metadata.characteristics())
            .map_err(|status| status.into_error("reading camera characteristics"))
    }

    fn open(&mut self, camera: CameraId, callbacks: DeviceCallbacks) -> Result<(), CameraError> {
        if !self.camera_ids()?.iter().any(|id| id == camera.platform_id()) {
            return Err(CameraError::NoCamera);
        }
        let handle = self.next_handle();
        let context = Box::new(DeviceContext {
            callbacks: callbacks.clone(),
            handle,
        });
        let device = self
            .manager
            .open_camera(camera.platform_id(), context)
            .map_err(|status| status.into_error("opening camera"))?;
        info!(%camera, %handle, "camera device opened");
        self.cameras.insert(
            handle,
            OpenCamera {
                device,
                capture: None,
            },
        );
        callbacks.on_opened(handle);
        Ok(())
    }

    fn close(&mut self, connection: &Connection) -> Result<(), CameraError> {
        let Some(mut camera) = self.cameras.remove(&connection.handle) else {
            return Err(CameraError::NotConnected);
        };
        drop(camera.capture.take());
        camera.device.close();
        camera.device.callbacks().on_closed(connection.handle);
        Ok(())
    }

    fn create_capture_session(
        &mut self,
        connection: &Connection,
        targets: &[RenderTarget],
        callbacks: SessionCallbacks,
    ) -> Result<(), CameraError> {
        if targets.len() != 1 {
            return Err(CameraError::unsupported("exactly one render target"));
        }
        let window = self.window.get().ok_or(CameraError::SurfaceUnavailable)?;
        let handle = self.next_handle();
        let camera = self.camera(connection)?;
        drop(camera.capture.take());

        match CameraCaptureSession::open(&camera.device, window) {
            Ok(session) => {
                camera.capture = Some((handle, session));
                callbacks.on_configured(CaptureSession { handle });
            },
            Err(status) => {
                warn!(%status, "capture session configuration failed");
                callbacks.on_configure_failed();
            },
        }
        Ok(())
    }

    fn create_repeating_preview_request(
        &mut self,
        connection: &Connection,
        target: &RenderTarget,
    ) -> Result<CaptureRequest, CameraError> {
        let window = self.window.get().ok_or(CameraError::SurfaceUnavailable)?;
        let handle = self.next_handle();
        let camera = self.camera(connection)?;
        let request = PreviewRequest::new(&camera.device, window)
            .map_err(|status| status.into_error("creating preview request"))?;
        self.requests.insert(handle, request);
        Ok(CaptureRequest {
            handle,
            target: target.clone(),
        })
    }

    fn set_repeating_request(
        &mut self,
        session: &CaptureSession,
        request: CaptureRequest,
    ) -> Result<(), CameraError> {
        let preview = self
            .requests
            .remove(&request.handle)
            .ok_or_else(|| CameraError::other("unknown capture request"))?;
        let capture = self
            .cameras
            .values_mut()
            .filter_map(|camera| camera.capture.as_mut())
            .find(|(handle, _)| *handle == session.handle)
            .map(|(_, capture)| capture)
            .ok_or(CameraError::NotConnected)?;
        capture
            .set_repeating_request(preview)
            .map_err(|status| status.into_error("starting repeating request"))
    }
}
