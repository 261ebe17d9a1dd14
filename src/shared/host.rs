// This is free and unencumbered software released into the public domain.

//! Contracts for the host-provided collaborators: the preview surface, the
//! display service, the screen lifecycle, permissions and the UI task queue.

use crate::shared::{CameraError, Rotation, Size, Transform};
use alloc::sync::Arc;

/// The live-updating UI surface the preview is rendered into.
///
/// Implemented by the host; calls may arrive from the camera worker.
pub trait PreviewSurface: Send + Sync {
    fn is_available(&self) -> bool;

    /// Current view size, if the surface exists.
    fn size(&self) -> Option<Size>;

    /// Sets the size of the buffers the camera will produce into the surface.
    fn set_default_buffer_size(&self, size: Size);

    fn set_transform(&self, transform: Transform);

    /// Releases the underlying surface resource.
    fn release(&self) -> Result<(), CameraError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceEvent {
    Available { width: u32, height: u32 },
    SizeChanged { width: u32, height: u32 },
    Destroyed,
    Updated,
}

/// Supplies the current rotation of a display.
pub trait DisplayService: Send + Sync {
    fn rotation(&self, display_id: u32) -> Rotation;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayEvent {
    Changed { display_id: u32 },
}

/// Host screen lifecycle and view attachment notifications.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleEvent {
    Start,
    Stop,
    Destroy,
    ViewAttached { display_id: u32 },
    ViewDetached,
}

pub type LifecycleHandler = Arc<dyn Fn(LifecycleEvent) + Send + Sync + 'static>;

/// Delivers `Start`, `Stop` and `Destroy`.
pub trait HostLifecycle {
    fn add_observer(&self, handler: LifecycleHandler);
}

/// Delivers `ViewAttached` and `ViewDetached`.
pub trait ViewAttachment {
    fn add_attach_listener(&self, handler: LifecycleHandler);
}

/// Permission check plus the callback asking the host to obtain it.
#[derive(Clone)]
pub struct Permissions {
    is_granted: Arc<dyn Fn() -> bool + Send + Sync>,
    request: Arc<dyn Fn() + Send + Sync>,
}

impl core::fmt::Debug for Permissions {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Permissions")
            .field("granted", &self.is_granted())
            .finish()
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Self::granted()
    }
}

impl Permissions {
    pub fn new(
        is_granted: impl Fn() -> bool + Send + Sync + 'static,
        request: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        Self {
            is_granted: Arc::new(is_granted),
            request: Arc::new(request),
        }
    }

    /// Permissions that are always granted, for hosts without a permission model.
    pub fn granted() -> Self {
        Self::new(|| true, || {})
    }

    pub fn is_granted(&self) -> bool {
        (self.is_granted)()
    }

    pub fn request(&self) {
        (self.request)()
    }
}

pub type UiTask = Box<dyn FnOnce() + Send + 'static>;

/// The host's UI-thread task queue.
pub trait UiExecutor: Send + Sync {
    fn post(&self, task: UiTask);
}

/// Runs tasks inline on the calling thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImmediateExecutor;

impl UiExecutor for ImmediateExecutor {
    fn post(&self, task: UiTask) {
        task()
    }
}
