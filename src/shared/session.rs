// This is free and unencumbered software released into the public domain.

use crate::shared::{
    CameraError, CameraId, Connection, DeviceEvent, DeviceService, DisplayEvent, DisplayService,
    HostLifecycle, ImmediateExecutor, LifecycleEvent, LifecycleHandler, Permissions,
    PreviewSurface, RenderTarget, Rotation, SessionConfig, SurfaceEvent, UiExecutor,
    ViewAttachment, Worker, WorkerSender,
};
use alloc::sync::Arc;
use asimov_module::tracing::{debug, info, warn};
use derive_more::Display;
use dogma::Named as _;
use std::{
    sync::{
        Mutex,
        atomic::{AtomicBool, Ordering},
        mpsc::{SyncSender, sync_channel},
    },
    time::Duration,
};

mod state;
use state::SessionCore;

#[derive(Clone, Copy, Debug, Default, Display, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    #[display("idle")]
    Idle,
    #[display("opening")]
    Opening,
    #[display("connected")]
    Connected,
    #[display("preview-running")]
    PreviewRunning,
    #[display("closing")]
    Closing,
    #[display("failed({code})")]
    Failed { code: i32 },
    #[display("released")]
    Released,
}

/// Snapshot of the worker-owned state, refreshed after every command.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionStatus {
    pub state: SessionState,
    pub camera: CameraId,
    pub connection: Option<Connection>,
    pub rotation: Rotation,
    pub target: Option<RenderTarget>,
    /// Number of capture sessions requested so far.
    pub capture_generation: u64,
}

impl SessionStatus {
    /// Fails once the device reported an error or the session was released.
    pub fn check(&self) -> Result<(), CameraError> {
        match self.state {
            SessionState::Failed { code } => Err(CameraError::device(code)),
            SessionState::Released => Err(CameraError::Released),
            _ => Ok(()),
        }
    }
}

#[derive(Debug)]
pub(crate) enum Command {
    Open,
    Close,
    Switch(CameraId),
    Release,
    ViewAttached { display_id: u32 },
    ViewDetached,
    Surface(SurfaceEvent),
    Display(DisplayEvent),
    Device(DeviceEvent),
    Settle {
        ack: SyncSender<()>,
        mark: Option<u64>,
    },
}

/// Display service for hosts that never rotate.
struct NaturalOrientation;

impl DisplayService for NaturalOrientation {
    fn rotation(&self, _display_id: u32) -> Rotation {
        Rotation::R0
    }
}

pub struct CameraSessionBuilder {
    device: Box<dyn DeviceService>,
    surface: Option<Arc<dyn PreviewSurface>>,
    display: Arc<dyn DisplayService>,
    permissions: Permissions,
    ui: Arc<dyn UiExecutor>,
    config: SessionConfig,
}

impl CameraSessionBuilder {
    pub fn surface(mut self, surface: Arc<dyn PreviewSurface>) -> Self {
        self.surface = Some(surface);
        self
    }

    pub fn display(mut self, display: Arc<dyn DisplayService>) -> Self {
        self.display = display;
        self
    }

    pub fn permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn ui_executor(mut self, ui: Arc<dyn UiExecutor>) -> Self {
        self.ui = ui;
        self
    }

    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<Arc<CameraSession>, CameraError> {
        let surface = self
            .surface
            .ok_or_else(|| CameraError::invalid_config("a preview surface is required"))?;

        let status = Arc::new(Mutex::new(SessionStatus {
            camera: self.config.camera,
            ..Default::default()
        }));

        let device = self.device;
        let display = self.display;
        let core_config = self.config.clone();
        let core_status = Arc::clone(&status);
        debug!(device = %device.name(), camera = %self.config.camera, "starting camera session");

        let worker = Worker::spawn(
            self.config.thread_name.clone(),
            move |tx| SessionCore::new(core_config, device, surface, display, tx, core_status),
            SessionCore::handle,
        )?;

        Ok(Arc::new(CameraSession {
            tx: worker.sender(),
            worker: Mutex::new(worker),
            camera: Mutex::new(self.config.camera),
            status,
            permissions: self.permissions,
            ui: self.ui,
            registered: AtomicBool::new(false),
        }))
    }

    /// Builds the session and registers it with the host lifecycle.
    pub fn attach(
        self,
        lifecycle: &dyn HostLifecycle,
        view: &dyn ViewAttachment,
    ) -> Result<Arc<CameraSession>, CameraError> {
        let session = self.build()?;
        session.register_for_lifecycle(lifecycle, view)?;
        Ok(session)
    }
}

/// One logical camera connection, owned by the hosting screen.
///
/// Every operation returns immediately; the work runs on the camera worker
/// and results surface through [`CameraSession::status`].
pub struct CameraSession {
    tx: WorkerSender<Command>,
    worker: Mutex<Worker<Command>>,
    camera: Mutex<CameraId>,
    status: Arc<Mutex<SessionStatus>>,
    permissions: Permissions,
    ui: Arc<dyn UiExecutor>,
    registered: AtomicBool,
}

impl core::fmt::Debug for CameraSession {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CameraSession")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl CameraSession {
    pub fn builder(device: Box<dyn DeviceService>) -> CameraSessionBuilder {
        CameraSessionBuilder {
            device,
            surface: None,
            display: Arc::new(NaturalOrientation),
            permissions: Permissions::granted(),
            ui: Arc::new(ImmediateExecutor),
            config: SessionConfig::default(),
        }
    }

    /// Subscribes this session to host start/stop/destroy and view
    /// attach/detach. Allowed once per session.
    pub fn register_for_lifecycle(
        self: &Arc<Self>,
        lifecycle: &dyn HostLifecycle,
        view: &dyn ViewAttachment,
    ) -> Result<(), CameraError> {
        if self.registered.swap(true, Ordering::SeqCst) {
            return Err(CameraError::AlreadyRegistered);
        }
        let weak = Arc::downgrade(self);
        let handler: LifecycleHandler = Arc::new(move |event: LifecycleEvent| {
            if let Some(session) = weak.upgrade() {
                session.on_lifecycle(event);
            }
        });
        lifecycle.add_observer(Arc::clone(&handler));
        view.add_attach_listener(handler);
        Ok(())
    }

    /// Opens the selected camera. Camera permission must already be granted.
    pub fn open(&self) {
        self.post_from_ui(Command::Open);
    }

    /// Closes the current connection, if any.
    pub fn close(&self) {
        self.post_from_ui(Command::Close);
    }

    /// Flips between the back and front camera and reopens. The new camera
    /// is only opened once the old connection has finished closing.
    pub fn switch_camera(&self) -> CameraId {
        let next = {
            let mut camera = self.camera.lock().unwrap_or_else(|p| p.into_inner());
            *camera = camera.toggle();
            *camera
        };
        info!(camera = %next, "camera switch requested");
        self.post_from_ui(Command::Switch(next));
        next
    }

    /// Tears the session down: closes the camera, releases the preview
    /// surface and stops the worker once queued work is done. Idempotent.
    pub fn release(&self) {
        self.post(Command::Release);
    }

    /// The camera most recently selected by the caller.
    pub fn camera(&self) -> CameraId {
        *self.camera.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn status(&self) -> SessionStatus {
        self.status.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn on_lifecycle(&self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::Start => {
                if self.permissions.is_granted() {
                    self.open();
                } else {
                    info!("camera permission missing, asking host");
                    self.permissions.request();
                }
            },
            LifecycleEvent::Stop => self.close(),
            LifecycleEvent::Destroy => self.release(),
            LifecycleEvent::ViewAttached { display_id } => {
                self.post(Command::ViewAttached { display_id })
            },
            LifecycleEvent::ViewDetached => self.post(Command::ViewDetached),
        }
    }

    /// Feeds a preview-surface notification in. The returned flag answers
    /// whether the session consumed the surface on `Destroyed`; it never does.
    pub fn on_surface(&self, event: SurfaceEvent) -> bool {
        match event {
            SurfaceEvent::Updated => {},
            event => self.post(Command::Surface(event)),
        }
        false
    }

    pub fn on_display(&self, event: DisplayEvent) {
        self.post(Command::Display(event));
    }

    /// Waits until the worker has nothing left to do, or `timeout` passes.
    pub fn settle(&self, timeout: Duration) -> bool {
        let (ack, done) = sync_channel(1);
        if self.tx.post(Command::Settle { ack, mark: None }).is_err() {
            return true;
        }
        done.recv_timeout(timeout).is_ok()
    }

    fn post(&self, command: Command) {
        if let Err(err) = self.tx.post(command) {
            warn!(%err, "camera worker unavailable");
        }
    }

    fn post_from_ui(&self, command: Command) {
        let tx = self.tx.clone();
        self.ui.post(Box::new(move || {
            if let Err(err) = tx.post(command) {
                warn!(%err, "camera worker unavailable");
            }
        }));
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        let _ = self.tx.post(Command::Release);
        self.worker
            .get_mut()
            .unwrap_or_else(|p| p.into_inner())
            .shutdown();
    }
}
