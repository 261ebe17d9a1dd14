// This is free and unencumbered software released into the public domain.

//! In-process stand-ins for the platform camera, preview surface, display
//! and host screen. Used by the preview binary on desktop targets and by the
//! test suite.

use crate::shared::{
    CameraCharacteristics, CameraError, CameraId, CaptureRequest, CaptureSession, Connection,
    DeviceCallbacks, DeviceHandle, DeviceService, DisplayService, HostLifecycle, LifecycleEvent,
    LifecycleHandler, PreviewSurface, RenderTarget, Rotation, SessionCallbacks, Size, Transform,
    ViewAttachment,
};
use alloc::{borrow::Cow, sync::Arc};
use std::{
    collections::{BTreeMap, VecDeque},
    sync::{Mutex, MutexGuard},
};

/// A call the session made into the simulated device.
#[derive(Clone, Debug, PartialEq)]
pub enum DeviceCall {
    Open {
        camera: CameraId,
        generation: u64,
    },
    Close {
        connection: Connection,
    },
    CreateCaptureSession {
        connection: Connection,
        targets: Vec<RenderTarget>,
    },
    CreateRepeatingRequest {
        connection: Connection,
        target: RenderTarget,
    },
    SetRepeatingRequest {
        session: CaptureSession,
        request: DeviceHandle,
    },
}

enum Pending {
    Opened(DeviceCallbacks, DeviceHandle),
    Closed(DeviceCallbacks, DeviceHandle),
    Configured(SessionCallbacks, CaptureSession),
    ConfigureFailed(SessionCallbacks),
}

impl Pending {
    fn deliver(self) {
        match self {
            Pending::Opened(callbacks, handle) => callbacks.on_opened(handle),
            Pending::Closed(callbacks, handle) => callbacks.on_closed(handle),
            Pending::Configured(callbacks, session) => callbacks.on_configured(session),
            Pending::ConfigureFailed(callbacks) => callbacks.on_configure_failed(),
        }
    }
}

#[derive(Default)]
struct DeviceState {
    calls: Vec<DeviceCall>,
    next_handle: u64,
    manual: bool,
    fail_configure: bool,
    /// Connections the device considers open, with the callbacks of the
    /// open request that produced them.
    open: BTreeMap<DeviceHandle, DeviceCallbacks>,
    /// Every connection ever handed out, closed or not.
    opened: BTreeMap<DeviceHandle, DeviceCallbacks>,
    max_open: usize,
    pending: VecDeque<Pending>,
}

impl DeviceState {
    fn next_handle(&mut self) -> DeviceHandle {
        self.next_handle += 1;
        DeviceHandle(self.next_handle)
    }
}

/// Inspection and control handle shared with a [`SimulatedDevice`].
#[derive(Clone, Default)]
pub struct SimulatedDeviceHandle {
    state: Arc<Mutex<DeviceState>>,
}

impl core::fmt::Debug for SimulatedDeviceHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = self.lock();
        f.debug_struct("SimulatedDeviceHandle")
            .field("calls", &state.calls.len())
            .field("open", &state.open.len())
            .field("pending", &state.pending.len())
            .finish()
    }
}

impl SimulatedDeviceHandle {
    fn lock(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn calls(&self) -> Vec<DeviceCall> {
        self.lock().calls.clone()
    }

    pub fn capture_sessions(&self) -> Vec<RenderTarget> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                DeviceCall::CreateCaptureSession { targets, .. } => targets.first().cloned(),
                _ => None,
            })
            .collect()
    }

    /// Number of connections currently open on the device.
    pub fn open_connections(&self) -> usize {
        self.lock().open.len()
    }

    /// Largest number of connections that were ever open at the same time.
    pub fn max_open_connections(&self) -> usize {
        self.lock().max_open
    }

    /// Makes every following capture-session request fail to configure.
    pub fn fail_configure(&self, fail: bool) {
        self.lock().fail_configure = fail;
    }

    pub fn pending(&self) -> usize {
        self.lock().pending.len()
    }

    /// Delivers the oldest withheld callback. Returns false if none is left.
    pub fn deliver_next(&self) -> bool {
        let next = self.lock().pending.pop_front();
        match next {
            Some(pending) => {
                pending.deliver();
                true
            },
            None => false,
        }
    }

    /// Delivers the most recently withheld callback, ahead of older ones.
    pub fn deliver_newest(&self) -> bool {
        let newest = self.lock().pending.pop_back();
        match newest {
            Some(pending) => {
                pending.deliver();
                true
            },
            None => false,
        }
    }

    pub fn deliver_all(&self) -> usize {
        let mut delivered = 0;
        while self.deliver_next() {
            delivered += 1;
        }
        delivered
    }

    fn last_open(&self) -> Option<(DeviceCallbacks, DeviceHandle)> {
        self.lock()
            .open
            .iter()
            .next_back()
            .map(|(handle, callbacks)| (callbacks.clone(), *handle))
    }

    /// Reports the most recently opened connection as disconnected. The
    /// connection still has to be closed by its owner.
    pub fn disconnect(&self) -> bool {
        match self.last_open() {
            Some((callbacks, handle)) => {
                callbacks.on_disconnected(handle);
                true
            },
            None => false,
        }
    }

    /// Reports a device error on the most recently opened connection.
    pub fn error(&self, code: i32) -> bool {
        match self.last_open() {
            Some((callbacks, handle)) => {
                callbacks.on_error(Some(handle), code);
                true
            },
            None => false,
        }
    }

    fn opened(&self, handle: DeviceHandle) -> Option<DeviceCallbacks> {
        self.lock().opened.get(&handle).cloned()
    }

    /// Reports `handle` as disconnected, even if it was closed already.
    pub fn disconnect_connection(&self, handle: DeviceHandle) -> bool {
        match self.opened(handle) {
            Some(callbacks) => {
                callbacks.on_disconnected(handle);
                true
            },
            None => false,
        }
    }

    /// Reports a device error on `handle`, even if it was closed already.
    pub fn error_connection(&self, handle: DeviceHandle, code: i32) -> bool {
        match self.opened(handle) {
            Some(callbacks) => {
                callbacks.on_error(Some(handle), code);
                true
            },
            None => false,
        }
    }
}

/// A camera service with a back (sensor at 90 degrees) and a front (sensor
/// at 270 degrees) camera.
///
/// By default every callback fires synchronously from inside the request.
/// In manual mode callbacks are withheld until the handle delivers them.
#[derive(Debug, Default)]
pub struct SimulatedDevice {
    handle: SimulatedDeviceHandle,
}

impl dogma::Named for SimulatedDevice {
    fn name(&self) -> Cow<'_, str> {
        "simulated".into()
    }
}

impl SimulatedDevice {
    pub const OUTPUT_SIZES: [Size; 4] = [
        Size::new(1920, 1080),
        Size::new(1280, 720),
        Size::new(640, 480),
        Size::new(320, 240),
    ];

    pub fn new() -> Self {
        Self::default()
    }

    pub fn manual() -> Self {
        let device = Self::default();
        device.handle.lock().manual = true;
        device
    }

    pub fn handle(&self) -> SimulatedDeviceHandle {
        self.handle.clone()
    }

    fn schedule(&self, pending: Pending) {
        let mut state = self.handle.lock();
        if state.manual {
            state.pending.push_back(pending);
        } else {
            drop(state);
            pending.deliver();
        }
    }
}

impl DeviceService for SimulatedDevice {
    fn camera_ids(&self) -> Result<Vec<String>, CameraError> {
        Ok(CameraId::ALL
            .iter()
            .map(|id| id.platform_id().to_string())
            .collect())
    }

    fn characteristics(&self, camera: CameraId) -> Result<CameraCharacteristics, CameraError> {
        let sensor_orientation = match camera {
            CameraId::Back => Rotation::R90,
            CameraId::Front => Rotation::R270,
        };
        Ok(CameraCharacteristics::new(
            sensor_orientation,
            Self::OUTPUT_SIZES.to_vec(),
        ))
    }

    fn open(&mut self, camera: CameraId, callbacks: DeviceCallbacks) -> Result<(), CameraError> {
        let handle = {
            let mut state = self.handle.lock();
            state.calls.push(DeviceCall::Open {
                camera,
                generation: callbacks.generation(),
            });
            let handle = state.next_handle();
            state.open.insert(handle, callbacks.clone());
            state.opened.insert(handle, callbacks.clone());
            state.max_open = state.max_open.max(state.open.len());
            handle
        };
        self.schedule(Pending::Opened(callbacks, handle));
        Ok(())
    }

    fn close(&mut self, connection: &Connection) -> Result<(), CameraError> {
        let callbacks = {
            let mut state = self.handle.lock();
            state.calls.push(DeviceCall::Close {
                connection: *connection,
            });
            state.open.remove(&connection.handle)
        };
        let Some(callbacks) = callbacks else {
            return Err(CameraError::NotConnected);
        };
        self.schedule(Pending::Closed(callbacks, connection.handle));
        Ok(())
    }

    fn create_capture_session(
        &mut self,
        connection: &Connection,
        targets: &[RenderTarget],
        callbacks: SessionCallbacks,
    ) -> Result<(), CameraError> {
        let (session, fail) = {
            let mut state = self.handle.lock();
            state.calls.push(DeviceCall::CreateCaptureSession {
                connection: *connection,
                targets: targets.to_vec(),
            });
            if !state.open.contains_key(&connection.handle) {
                return Err(CameraError::NotConnected);
            }
            let session = CaptureSession {
                handle: state.next_handle(),
            };
            (session, state.fail_configure)
        };
        self.schedule(if fail {
            Pending::ConfigureFailed(callbacks)
        } else {
            Pending::Configured(callbacks, session)
        });
        Ok(())
    }

    fn create_repeating_preview_request(
        &mut self,
        connection: &Connection,
        target: &RenderTarget,
    ) -> Result<CaptureRequest, CameraError> {
        let mut state = self.handle.lock();
        state.calls.push(DeviceCall::CreateRepeatingRequest {
            connection: *connection,
            target: target.clone(),
        });
        Ok(CaptureRequest {
            handle: state.next_handle(),
            target: target.clone(),
        })
    }

    fn set_repeating_request(
        &mut self,
        session: &CaptureSession,
        request: CaptureRequest,
    ) -> Result<(), CameraError> {
        self.handle.lock().calls.push(DeviceCall::SetRepeatingRequest {
            session: *session,
            request: request.handle,
        });
        Ok(())
    }
}

#[derive(Debug, Default)]
struct SurfaceState {
    size: Option<Size>,
    buffer_size: Option<Size>,
    transform: Transform,
    releases: usize,
}

/// A preview surface whose availability and size the caller controls.
#[derive(Debug, Default)]
pub struct SimulatedSurface {
    state: Mutex<SurfaceState>,
}

impl SimulatedSurface {
    /// A surface that does not exist yet.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_size(width: u32, height: u32) -> Self {
        let surface = Self::new();
        surface.set_size(Some(Size::new(width, height)));
        surface
    }

    fn lock(&self) -> MutexGuard<'_, SurfaceState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// `None` makes the surface unavailable.
    pub fn set_size(&self, size: Option<Size>) {
        self.lock().size = size;
    }

    pub fn buffer_size(&self) -> Option<Size> {
        self.lock().buffer_size
    }

    pub fn transform(&self) -> Transform {
        self.lock().transform
    }

    pub fn releases(&self) -> usize {
        self.lock().releases
    }
}

impl PreviewSurface for SimulatedSurface {
    fn is_available(&self) -> bool {
        self.lock().size.is_some()
    }

    fn size(&self) -> Option<Size> {
        self.lock().size
    }

    fn set_default_buffer_size(&self, size: Size) {
        self.lock().buffer_size = Some(size);
    }

    fn set_transform(&self, transform: Transform) {
        self.lock().transform = transform;
    }

    fn release(&self) -> Result<(), CameraError> {
        let mut state = self.lock();
        state.releases += 1;
        if state.releases > 1 {
            return Err(CameraError::other("surface already released"));
        }
        state.size = None;
        Ok(())
    }
}

/// Displays whose rotation the caller sets; unknown displays are upright.
#[derive(Debug, Default)]
pub struct SimulatedDisplay {
    rotations: Mutex<BTreeMap<u32, Rotation>>,
}

impl SimulatedDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_rotation(&self, display_id: u32, rotation: Rotation) {
        self.rotations
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(display_id, rotation);
    }
}

impl DisplayService for SimulatedDisplay {
    fn rotation(&self, display_id: u32) -> Rotation {
        self.rotations
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(&display_id)
            .copied()
            .unwrap_or_default()
    }
}

/// A host screen that fans lifecycle events out to its observers.
#[derive(Default)]
pub struct SimulatedHost {
    observers: Mutex<Vec<LifecycleHandler>>,
    attach_listeners: Mutex<Vec<LifecycleHandler>>,
}

impl core::fmt::Debug for SimulatedHost {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SimulatedHost").finish_non_exhaustive()
    }
}

impl SimulatedHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispatch(&self, event: LifecycleEvent) {
        let listeners = match event {
            LifecycleEvent::Start | LifecycleEvent::Stop | LifecycleEvent::Destroy => {
                &self.observers
            },
            LifecycleEvent::ViewAttached { .. } | LifecycleEvent::ViewDetached => {
                &self.attach_listeners
            },
        };
        let handlers = listeners.lock().unwrap_or_else(|p| p.into_inner()).clone();
        for handler in handlers {
            handler(event);
        }
    }
}

impl HostLifecycle for SimulatedHost {
    fn add_observer(&self, handler: LifecycleHandler) {
        self.observers
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(handler);
    }
}

impl ViewAttachment for SimulatedHost {
    fn add_attach_listener(&self, handler: LifecycleHandler) {
        self.attach_listeners
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(handler);
    }
}
