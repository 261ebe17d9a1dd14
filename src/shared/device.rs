// This is free and unencumbered software released into the public domain.

//! The device service contract: how the session talks to the platform camera
//! subsystem, and how the platform talks back.

use crate::shared::{CameraCharacteristics, CameraError, CameraId, RenderTarget};
use alloc::sync::Arc;
use derive_more::Display;

/// Opaque token a device service hands out for its native objects.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[display("#{_0}")]
pub struct DeviceHandle(pub u64);

/// An open camera device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Connection {
    pub camera: CameraId,
    pub handle: DeviceHandle,
}

/// A configured pipeline from a connection to its render targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CaptureSession {
    pub handle: DeviceHandle,
}

/// A preview request, ready to be submitted as a repeating request.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptureRequest {
    pub handle: DeviceHandle,
    pub target: RenderTarget,
}

/// Everything the platform can report back, tagged with the generation of
/// the request it answers.
#[derive(Clone, Debug, PartialEq)]
pub enum DeviceEvent {
    Opened {
        generation: u64,
        connection: Connection,
    },
    Closed {
        generation: u64,
        connection: Connection,
    },
    Disconnected {
        generation: u64,
        connection: Connection,
    },
    Error {
        generation: u64,
        connection: Option<Connection>,
        code: i32,
    },
    Configured {
        generation: u64,
        session: CaptureSession,
    },
    ConfigureFailed {
        generation: u64,
    },
}

pub type DeviceEventSink = Arc<dyn Fn(DeviceEvent) + Send + Sync + 'static>;

/// Device state callbacks handed to [`DeviceService::open`].
///
/// Each call forwards a [`DeviceEvent`] to the camera worker; drivers may
/// call these from any thread.
#[derive(Clone)]
pub struct DeviceCallbacks {
    generation: u64,
    camera: CameraId,
    sink: DeviceEventSink,
}

impl core::fmt::Debug for DeviceCallbacks {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DeviceCallbacks")
            .field("generation", &self.generation)
            .field("camera", &self.camera)
            .finish_non_exhaustive()
    }
}

impl DeviceCallbacks {
    pub fn new(generation: u64, camera: CameraId, sink: DeviceEventSink) -> Self {
        Self {
            generation,
            camera,
            sink,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn camera(&self) -> CameraId {
        self.camera
    }

    fn connection(&self, handle: DeviceHandle) -> Connection {
        Connection {
            camera: self.camera,
            handle,
        }
    }

    pub fn on_opened(&self, handle: DeviceHandle) {
        (self.sink)(DeviceEvent::Opened {
            generation: self.generation,
            connection: self.connection(handle),
        });
    }

    /// Completion signal for [`DeviceService::close`].
    pub fn on_closed(&self, handle: DeviceHandle) {
        (self.sink)(DeviceEvent::Closed {
            generation: self.generation,
            connection: self.connection(handle),
        });
    }

    pub fn on_disconnected(&self, handle: DeviceHandle) {
        (self.sink)(DeviceEvent::Disconnected {
            generation: self.generation,
            connection: self.connection(handle),
        });
    }

    pub fn on_error(&self, handle: Option<DeviceHandle>, code: i32) {
        (self.sink)(DeviceEvent::Error {
            generation: self.generation,
            connection: handle.map(|h| self.connection(h)),
            code,
        });
    }
}

/// Capture-session state callbacks handed to
/// [`DeviceService::create_capture_session`].
#[derive(Clone)]
pub struct SessionCallbacks {
    generation: u64,
    sink: DeviceEventSink,
}

impl core::fmt::Debug for SessionCallbacks {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionCallbacks")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl SessionCallbacks {
    pub fn new(generation: u64, sink: DeviceEventSink) -> Self {
        Self { generation, sink }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn on_configured(&self, session: CaptureSession) {
        (self.sink)(DeviceEvent::Configured {
            generation: self.generation,
            session,
        });
    }

    pub fn on_configure_failed(&self) {
        (self.sink)(DeviceEvent::ConfigureFailed {
            generation: self.generation,
        });
    }
}

/// The platform camera subsystem, as seen from the camera worker.
///
/// Implementations are owned by the worker and only ever called from it.
/// Results of `open`, `close` and `create_capture_session` arrive later
/// through the callbacks; an `Err` return means the request never started.
pub trait DeviceService: dogma::Named + Send {
    fn camera_ids(&self) -> Result<Vec<String>, CameraError>;

    fn characteristics(&self, camera: CameraId) -> Result<CameraCharacteristics, CameraError>;

    fn open(&mut self, camera: CameraId, callbacks: DeviceCallbacks) -> Result<(), CameraError>;

    /// Must eventually fire [`DeviceCallbacks::on_closed`] for the connection.
    fn close(&mut self, connection: &Connection) -> Result<(), CameraError>;

    fn create_capture_session(
        &mut self,
        connection: &Connection,
        targets: &[RenderTarget],
        callbacks: SessionCallbacks,
    ) -> Result<(), CameraError>;

    fn create_repeating_preview_request(
        &mut self,
        connection: &Connection,
        target: &RenderTarget,
    ) -> Result<CaptureRequest, CameraError>;

    /// Streams `request` until replaced or the session closes. No completion
    /// callback is delivered.
    fn set_repeating_request(
        &mut self,
        session: &CaptureSession,
        request: CaptureRequest,
    ) -> Result<(), CameraError>;
}
