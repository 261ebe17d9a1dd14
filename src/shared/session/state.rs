// This is free and unencumbered software released into the public domain.

use super::{Command, SessionState, SessionStatus};
use crate::shared::{
    CameraId, CaptureSession, Connection, DeviceCallbacks, DeviceEvent, DeviceEventSink,
    DeviceService, DisplayEvent, DisplayService, Flow, PreviewSurface, RenderTarget, Rotation,
    SessionCallbacks, SessionConfig, Size, SurfaceEvent, WorkerSender,
};
use alloc::sync::Arc;
use asimov_module::tracing::{debug, error, info, warn};
use std::sync::{Mutex, mpsc::SyncSender};

struct ActiveCapture {
    generation: u64,
    target: RenderTarget,
    session: Option<CaptureSession>,
}

/// Connection and capture-session state. Lives on the camera worker and is
/// only touched from there.
pub(super) struct SessionCore {
    config: SessionConfig,
    device: Box<dyn DeviceService>,
    surface: Arc<dyn PreviewSurface>,
    display: Arc<dyn DisplayService>,
    tx: WorkerSender<Command>,
    sink: DeviceEventSink,
    status: Arc<Mutex<SessionStatus>>,

    camera: CameraId,
    state: SessionState,
    /// Bumped on every open; device callbacks carrying another value are stale.
    generation: u64,
    connection: Option<Connection>,
    /// Open again once the pending close completes.
    reopen: bool,
    /// A close arrived while the open was in flight; its connection is closed
    /// as soon as it is delivered.
    cancelled_open: bool,
    capture_generation: u64,
    capture: Option<ActiveCapture>,
    /// Surface events are only acted upon once a camera has opened.
    surface_listening: bool,
    /// Display of the attached view; rotation changes are ignored while detached.
    display_id: Option<u32>,
    rotation: Rotation,
    surface_released: bool,
    handled: u64,
}

impl SessionCore {
    pub(super) fn new(
        config: SessionConfig,
        device: Box<dyn DeviceService>,
        surface: Arc<dyn PreviewSurface>,
        display: Arc<dyn DisplayService>,
        tx: WorkerSender<Command>,
        status: Arc<Mutex<SessionStatus>>,
    ) -> Self {
        let sink_tx = tx.clone();
        let sink: DeviceEventSink = Arc::new(move |event: DeviceEvent| {
            if sink_tx.post(Command::Device(event)).is_err() {
                debug!("camera worker gone, dropping device callback");
            }
        });
        let rotation = display.rotation(config.display_id);
        Self {
            camera: config.camera,
            config,
            device,
            surface,
            display,
            tx,
            sink,
            status,
            state: SessionState::Idle,
            generation: 0,
            connection: None,
            reopen: false,
            cancelled_open: false,
            capture_generation: 0,
            capture: None,
            surface_listening: false,
            display_id: None,
            rotation,
            surface_released: false,
            handled: 0,
        }
    }

    pub(super) fn handle(&mut self, command: Command) -> Flow {
        if let Command::Settle { ack, mark } = command {
            self.settle(ack, mark);
            return Flow::Continue;
        }

        if self.config.diagnostics {
            info!(state = %self.state, ?command, "camera command");
        }
        self.handled += 1;

        let flow = match command {
            Command::Open => {
                self.open();
                Flow::Continue
            },
            Command::Close => {
                self.close();
                Flow::Continue
            },
            Command::Switch(camera) => {
                self.switch(camera);
                Flow::Continue
            },
            Command::Release => self.release(),
            Command::ViewAttached { display_id } => {
                self.display_id = Some(display_id);
                self.rotation = self.display.rotation(display_id);
                debug!(display_id, rotation = %self.rotation, "view attached");
                Flow::Continue
            },
            Command::ViewDetached => {
                self.display_id = None;
                debug!("view detached");
                Flow::Continue
            },
            Command::Surface(event) => {
                self.on_surface_event(event);
                Flow::Continue
            },
            Command::Display(event) => {
                self.on_display_event(event);
                Flow::Continue
            },
            Command::Device(event) => self.on_device_event(event),
            Command::Settle { .. } => Flow::Continue,
        };

        self.publish();
        flow
    }

    /// Acks once a full pass over the queue saw nothing but this marker.
    fn settle(&mut self, ack: SyncSender<()>, mark: Option<u64>) {
        if self.state == SessionState::Released || mark == Some(self.handled) {
            let _ = ack.try_send(());
            return;
        }
        let retry = Command::Settle {
            ack: ack.clone(),
            mark: Some(self.handled),
        };
        if self.tx.post(retry).is_err() {
            let _ = ack.try_send(());
        }
    }

    fn open(&mut self) {
        match self.state {
            SessionState::Released => {
                warn!(camera = %self.camera, "open ignored, session released")
            },
            SessionState::Opening | SessionState::Connected | SessionState::PreviewRunning => {
                debug!(camera = %self.camera, "camera already open")
            },
            SessionState::Closing => {
                debug!(camera = %self.camera, "open deferred until close completes");
                self.reopen = true;
            },
            SessionState::Idle | SessionState::Failed { .. } => {
                // A failed device may still hold its connection.
                if self.begin_close() {
                    self.reopen = true;
                } else {
                    self.start_open();
                }
            },
        }
    }

    fn start_open(&mut self) {
        self.reopen = false;
        self.cancelled_open = false;
        self.generation += 1;
        let callbacks = DeviceCallbacks::new(self.generation, self.camera, Arc::clone(&self.sink));
        match self.device.open(self.camera, callbacks) {
            Ok(()) => {
                info!(camera = %self.camera, generation = self.generation, "opening camera");
                self.state = SessionState::Opening;
            },
            Err(err) => {
                error!(camera = %self.camera, %err, "failed to open camera");
                self.state = SessionState::Idle;
            },
        }
    }

    fn close(&mut self) {
        self.reopen = false;
        match self.state {
            SessionState::Released | SessionState::Closing | SessionState::Idle => {},
            SessionState::Opening => {
                // No other open is issued before the pending one is closed.
                self.cancelled_open = true;
                self.state = SessionState::Closing;
                debug!(camera = %self.camera, "pending open cancelled");
            },
            SessionState::Connected
            | SessionState::PreviewRunning
            | SessionState::Failed { .. } => {
                if !self.begin_close() {
                    self.state = SessionState::Idle;
                }
            },
        }
    }

    /// Drops the capture session and closes the connection, if any. Returns
    /// true when a close is now in flight.
    fn begin_close(&mut self) -> bool {
        self.capture = None;
        self.surface_listening = false;
        let Some(connection) = self.connection.take() else {
            return false;
        };
        match self.device.close(&connection) {
            Ok(()) => {
                info!(camera = %connection.camera, handle = %connection.handle, "closing camera");
                self.state = SessionState::Closing;
                true
            },
            Err(err) => {
                error!(camera = %connection.camera, %err, "failed to close camera");
                self.state = SessionState::Idle;
                false
            },
        }
    }

    /// Closes the connection a cancelled open delivered. Without a close in
    /// flight the session goes idle and reopens if asked to.
    fn close_cancelled(&mut self, connection: Option<Connection>) {
        self.cancelled_open = false;
        if let Some(connection) = connection {
            match self.device.close(&connection) {
                Ok(()) => {
                    info!(handle = %connection.handle, "closing cancelled camera connection");
                    return;
                },
                Err(err) => error!(%err, "failed to close cancelled camera connection"),
            }
        }
        self.state = SessionState::Idle;
        if self.reopen {
            self.start_open();
        }
    }

    fn switch(&mut self, camera: CameraId) {
        if self.state == SessionState::Released {
            warn!(%camera, "switch ignored, session released");
            return;
        }
        info!(from = %self.camera, to = %camera, "switching camera");
        self.camera = camera;
        self.close();
        self.open();
    }

    fn release(&mut self) -> Flow {
        if self.state == SessionState::Released {
            debug!("camera session already released");
            return Flow::Drain;
        }
        info!(camera = %self.camera, "releasing camera session");

        self.reopen = false;
        self.cancelled_open = false;
        self.generation += 1;
        self.capture = None;
        self.surface_listening = false;
        self.display_id = None;

        if let Some(connection) = self.connection.take() {
            if let Err(err) = self.device.close(&connection) {
                warn!(camera = %connection.camera, %err, "failed to close camera on release");
            }
        }
        if !self.surface_released {
            self.surface_released = true;
            if let Err(err) = self.surface.release() {
                warn!(%err, "failed to release preview surface");
            }
        }

        self.state = SessionState::Released;
        Flow::Drain
    }

    fn on_device_event(&mut self, event: DeviceEvent) -> Flow {
        match event {
            DeviceEvent::Opened {
                generation,
                connection,
            } => self.on_opened(generation, connection),
            DeviceEvent::Closed {
                generation,
                connection,
            } => self.on_closed(generation, connection),
            DeviceEvent::Disconnected {
                generation,
                connection,
            } => return self.on_disconnected(generation, connection),
            DeviceEvent::Error {
                generation,
                connection,
                code,
            } => self.on_error(generation, connection, code),
            DeviceEvent::Configured {
                generation,
                session,
            } => self.on_configured(generation, session),
            DeviceEvent::ConfigureFailed { generation } => self.on_configure_failed(generation),
        }
        Flow::Continue
    }

    fn is_current(&self, generation: u64) -> bool {
        generation == self.generation && self.state != SessionState::Released
    }

    fn on_opened(&mut self, generation: u64, connection: Connection) {
        if self.is_current(generation) && self.cancelled_open {
            self.close_cancelled(Some(connection));
            return;
        }
        if !self.is_current(generation) || self.state != SessionState::Opening {
            warn!(
                camera = %connection.camera,
                handle = %connection.handle,
                generation,
                "closing stray camera connection"
            );
            if let Err(err) = self.device.close(&connection) {
                warn!(%err, "failed to close stray camera connection");
            }
            return;
        }

        info!(camera = %connection.camera, handle = %connection.handle, "camera opened");
        self.connection = Some(connection);
        self.state = SessionState::Connected;
        self.surface_listening = true;

        if self.surface.is_available() {
            self.build_capture_session(None);
        } else {
            debug!("waiting for preview surface");
        }
    }

    fn on_closed(&mut self, generation: u64, connection: Connection) {
        if !self.is_current(generation) || self.state != SessionState::Closing {
            debug!(handle = %connection.handle, generation, "ignoring close completion");
            return;
        }
        info!(camera = %connection.camera, "camera closed");
        self.state = SessionState::Idle;
        if self.reopen {
            self.start_open();
        }
    }

    fn on_disconnected(&mut self, generation: u64, connection: Connection) -> Flow {
        if !self.is_current(generation) {
            debug!(handle = %connection.handle, generation, "ignoring stale disconnect");
            return Flow::Continue;
        }
        match self.state {
            SessionState::Closing if self.cancelled_open => {
                self.close_cancelled(Some(connection));
                Flow::Continue
            },
            SessionState::Closing | SessionState::Idle => {
                debug!(handle = %connection.handle, "closed camera disconnected");
                Flow::Continue
            },
            _ => {
                warn!(camera = %connection.camera, "camera disconnected");
                self.connection = Some(connection);
                self.release()
            },
        }
    }

    fn on_error(&mut self, generation: u64, connection: Option<Connection>, code: i32) {
        if !self.is_current(generation) {
            warn!(code, generation, "ignoring error from superseded camera request");
            return;
        }
        match self.state {
            SessionState::Closing if self.cancelled_open => {
                warn!(code, "cancelled camera open failed");
                self.close_cancelled(connection);
            },
            // The close in flight still completes through `on_closed`.
            SessionState::Closing | SessionState::Idle => {
                warn!(camera = %self.camera, code, "camera error while closing");
            },
            _ => {
                error!(camera = %self.camera, code, "camera device error");
                if let Some(connection) = connection {
                    self.connection = Some(connection);
                }
                self.state = SessionState::Failed { code };
            },
        }
    }

    fn on_configured(&mut self, generation: u64, session: CaptureSession) {
        let Some(connection) = self.connection else {
            debug!(generation, "capture session configured without a connection");
            return;
        };
        let Some(capture) = self
            .capture
            .as_mut()
            .filter(|capture| capture.generation == generation)
        else {
            debug!(generation, "ignoring superseded capture session");
            return;
        };
        capture.session = Some(session);
        let target = capture.target.clone();

        let result = self
            .device
            .create_repeating_preview_request(&connection, &target)
            .and_then(|request| self.device.set_repeating_request(&session, request));

        match result {
            Ok(()) => {
                info!(camera = %connection.camera, size = %target.buffer_size, "preview running");
                if self.state == SessionState::Connected {
                    self.state = SessionState::PreviewRunning;
                }
            },
            Err(err) => error!(camera = %connection.camera, %err, "failed to start preview"),
        }
    }

    fn on_configure_failed(&mut self, generation: u64) {
        match self.capture.as_mut() {
            Some(capture) if capture.generation == generation => {
                warn!(camera = %self.camera, "capture session configuration failed");
                capture.session = None;
            },
            _ => debug!(generation, "ignoring superseded configuration failure"),
        }
    }

    fn on_surface_event(&mut self, event: SurfaceEvent) {
        match event {
            SurfaceEvent::Available { width, height }
            | SurfaceEvent::SizeChanged { width, height } => {
                if !self.surface_listening {
                    debug!(?event, "no camera open, surface event ignored");
                    return;
                }
                debug!(?event, "preview surface changed");
                self.build_capture_session(Some(Size::new(width, height)));
            },
            SurfaceEvent::Destroyed => debug!("preview surface destroyed"),
            SurfaceEvent::Updated => {},
        }
    }

    fn on_display_event(&mut self, event: DisplayEvent) {
        let DisplayEvent::Changed { display_id } = event;
        if self.display_id != Some(display_id) {
            return;
        }
        let rotation = self.display.rotation(display_id);
        if Rotation::is_flip(self.rotation, rotation) {
            info!(
                from = %self.rotation,
                to = %rotation,
                "display flipped, rebuilding capture session"
            );
            self.build_capture_session(None);
        }
        self.rotation = rotation;
    }

    /// Replaces the capture session with one targeting the surface as it is
    /// now. No-op unless a camera is connected and the surface is available.
    fn build_capture_session(&mut self, size_hint: Option<Size>) {
        if !matches!(
            self.state,
            SessionState::Connected | SessionState::PreviewRunning
        ) {
            debug!(state = %self.state, "not connected, skipping capture session");
            return;
        }
        let Some(connection) = self.connection else {
            debug!("no open camera, skipping capture session");
            return;
        };
        if !self.surface.is_available() {
            debug!("preview surface unavailable, skipping capture session");
            return;
        }
        let Some(surface_size) = size_hint
            .or_else(|| self.surface.size())
            .filter(|size| !size.is_empty())
        else {
            debug!("preview surface has no size yet");
            return;
        };

        let characteristics = match self.device.characteristics(connection.camera) {
            Ok(characteristics) => characteristics,
            Err(err) => {
                error!(camera = %connection.camera, %err, "failed to read camera characteristics");
                return;
            },
        };
        let rotation = self
            .display
            .rotation(self.display_id.unwrap_or(self.config.display_id));
        let target = RenderTarget::compute(
            connection.camera,
            surface_size,
            &characteristics,
            rotation,
            &self.config,
        );
        self.surface.set_default_buffer_size(target.buffer_size);
        self.surface.set_transform(target.transform);

        self.capture_generation += 1;
        let generation = self.capture_generation;
        let callbacks = SessionCallbacks::new(generation, Arc::clone(&self.sink));
        self.state = SessionState::Connected;

        match self.device.create_capture_session(
            &connection,
            core::slice::from_ref(&target),
            callbacks,
        ) {
            Ok(()) => {
                debug!(
                    camera = %connection.camera,
                    surface = %target.surface_size,
                    buffer = %target.buffer_size,
                    rotation = %target.rotation,
                    generation,
                    "creating capture session"
                );
                self.capture = Some(ActiveCapture {
                    generation,
                    target,
                    session: None,
                });
            },
            Err(err) => {
                error!(camera = %connection.camera, %err, "failed to create capture session");
                self.capture = None;
            },
        }
    }

    fn publish(&self) {
        let mut status = self.status.lock().unwrap_or_else(|p| p.into_inner());
        *status = SessionStatus {
            state: self.state,
            camera: self.camera,
            connection: self.connection,
            rotation: self.rotation,
            target: self.capture.as_ref().map(|c| c.target.clone()),
            capture_generation: self.capture_generation,
        };
    }
}
