// This is free and unencumbered software released into the public domain.

//! Capture pipeline wrappers: session outputs, output targets, capture
//! sessions and capture requests.

use super::{CameraDevice, CameraResult, CameraStatus, NativeWindow};
use asimov_module::tracing::trace;
use core::{ffi::c_void, ptr::null_mut};
use ndk_sys::{
    ACameraCaptureSession, ACameraCaptureSession_close,
    ACameraCaptureSession_setRepeatingRequest, ACameraCaptureSession_stateCallbacks,
    ACameraCaptureSession_stopRepeating, ACameraDevice_createCaptureRequest,
    ACameraDevice_createCaptureSession, ACameraDevice_request_template, ACameraOutputTarget,
    ACameraOutputTarget_create, ACameraOutputTarget_free, ACaptureRequest,
    ACaptureRequest_addTarget, ACaptureRequest_free, ACaptureSessionOutput,
    ACaptureSessionOutputContainer, ACaptureSessionOutputContainer_add,
    ACaptureSessionOutputContainer_create, ACaptureSessionOutputContainer_free,
    ACaptureSessionOutput_create, ACaptureSessionOutput_free,
};

#[derive(Debug)]
pub struct CaptureSessionOutput {
    pub(crate) handle: *mut ACaptureSessionOutput,
}

impl Drop for CaptureSessionOutput {
    fn drop(&mut self) {
        unsafe { ACaptureSessionOutput_free(self.handle) };
        self.handle = null_mut();
    }
}

impl CaptureSessionOutput {
    pub fn new(window: &NativeWindow) -> CameraResult<Self> {
        // https://developer.android.com/ndk/reference/group/camera#acapturesessionoutput_create
        let mut result = Self { handle: null_mut() };
        CameraStatus::check(unsafe {
            ACaptureSessionOutput_create(window.handle, &mut result.handle)
        })?;
        Ok(result)
    }
}

#[derive(Debug)]
pub struct CaptureSessionOutputContainer {
    pub(crate) handle: *mut ACaptureSessionOutputContainer,
}

impl Drop for CaptureSessionOutputContainer {
    fn drop(&mut self) {
        unsafe { ACaptureSessionOutputContainer_free(self.handle) };
        self.handle = null_mut();
    }
}

impl CaptureSessionOutputContainer {
    pub fn new() -> CameraResult<Self> {
        let mut result = Self { handle: null_mut() };
        CameraStatus::check(unsafe { ACaptureSessionOutputContainer_create(&mut result.handle) })?;
        Ok(result)
    }

    pub fn add(&mut self, output: &CaptureSessionOutput) -> CameraResult {
        CameraStatus::check(unsafe {
            ACaptureSessionOutputContainer_add(self.handle, output.handle)
        })
    }
}

#[derive(Debug)]
pub struct CameraOutputTarget {
    pub(crate) handle: *mut ACameraOutputTarget,
}

impl Drop for CameraOutputTarget {
    fn drop(&mut self) {
        unsafe { ACameraOutputTarget_free(self.handle) };
        self.handle = null_mut();
    }
}

impl CameraOutputTarget {
    pub fn new(window: &NativeWindow) -> CameraResult<Self> {
        // https://developer.android.com/ndk/reference/group/camera#acameraoutputtarget_create
        let mut result = Self { handle: null_mut() };
        CameraStatus::check(unsafe {
            ACameraOutputTarget_create(window.handle, &mut result.handle)
        })?;
        Ok(result)
    }
}

/// A preview request streaming into one window.
#[derive(Debug)]
pub struct PreviewRequest {
    pub(crate) handle: *mut ACaptureRequest,
    // The request references both; drop order matters.
    _target: CameraOutputTarget,
    _window: NativeWindow,
}

impl Drop for PreviewRequest {
    fn drop(&mut self) {
        unsafe { ACaptureRequest_free(self.handle) };
        self.handle = null_mut();
    }
}

impl PreviewRequest {
    pub fn new(device: &CameraDevice, window: NativeWindow) -> CameraResult<Self> {
        let target = CameraOutputTarget::new(&window)?;
        let mut handle = null_mut();
        CameraStatus::check(unsafe {
            ACameraDevice_createCaptureRequest(
                device.handle,
                ACameraDevice_request_template::TEMPLATE_PREVIEW,
                &mut handle,
            )
        })?;
        let request = Self {
            handle,
            _target: target,
            _window: window,
        };
        CameraStatus::check(unsafe {
            ACaptureRequest_addTarget(request.handle, request._target.handle)
        })?;
        Ok(request)
    }
}

unsafe extern "C" fn on_session_ready(_context: *mut c_void, session: *mut ACameraCaptureSession) {
    trace!(?session, "capture session ready");
}

unsafe extern "C" fn on_session_active(_context: *mut c_void, session: *mut ACameraCaptureSession) {
    trace!(?session, "capture session active");
}

unsafe extern "C" fn on_session_closed(_context: *mut c_void, session: *mut ACameraCaptureSession) {
    trace!(?session, "capture session closed");
}

/// A configured capture session and everything it streams into.
#[derive(Debug)]
pub struct CameraCaptureSession {
    handle: *mut ACameraCaptureSession,
    request: Option<PreviewRequest>,
    _outputs: CaptureSessionOutputContainer,
    _output: CaptureSessionOutput,
    _window: NativeWindow,
}

impl Drop for CameraCaptureSession {
    fn drop(&mut self) {
        if self.request.is_some() {
            unsafe { ACameraCaptureSession_stopRepeating(self.handle) };
        }
        unsafe { ACameraCaptureSession_close(self.handle) };
        self.handle = null_mut();
        self.request = None;
    }
}

impl CameraCaptureSession {
    /// Creates a session with `window` as its only output. Any previous
    /// session of `device` is closed by the NDK.
    pub fn open(device: &CameraDevice, window: NativeWindow) -> CameraResult<Self> {
        let output = CaptureSessionOutput::new(&window)?;
        let mut outputs = CaptureSessionOutputContainer::new()?;
        outputs.add(&output)?;

        let state_callbacks = ACameraCaptureSession_stateCallbacks {
            context: null_mut(),
            onClosed: Some(on_session_closed),
            onReady: Some(on_session_ready),
            onActive: Some(on_session_active),
        };
        let mut handle = null_mut();
        CameraStatus::check(unsafe {
            ACameraDevice_createCaptureSession(
                device.handle,
                outputs.handle,
                &state_callbacks,
                &mut handle,
            )
        })?;

        Ok(Self {
            handle,
            request: None,
            _outputs: outputs,
            _output: output,
            _window: window,
        })
    }

    /// Wraps the NDK's `ACameraCaptureSession_setRepeatingRequest`.
    pub fn set_repeating_request(&mut self, request: PreviewRequest) -> CameraResult {
        let mut requests = request.handle;
        CameraStatus::check(unsafe {
            ACameraCaptureSession_setRepeatingRequest(
                self.handle,
                null_mut(),
                1,
                &mut requests,
                null_mut(),
            )
        })?;
        self.request = Some(request);
        Ok(())
    }
}
