// This is free and unencumbered software released into the public domain.

#![cfg(feature = "simulated")]

use asimov_camera_preview::shared::{
    CameraError, CameraId, CameraSession, DisplayEvent, LifecycleEvent, Rotation, SessionConfig,
    SessionState, Size, SurfaceEvent,
    drivers::simulated::{
        DeviceCall, SimulatedDevice, SimulatedDeviceHandle, SimulatedDisplay, SimulatedSurface,
    },
};
use std::{sync::Arc, time::Duration};

const SETTLE: Duration = Duration::from_secs(5);

struct Fixture {
    session: Arc<CameraSession>,
    device: SimulatedDeviceHandle,
    surface: Arc<SimulatedSurface>,
    display: Arc<SimulatedDisplay>,
}

impl Fixture {
    fn new(device: SimulatedDevice) -> Self {
        let handle = device.handle();
        let surface = Arc::new(SimulatedSurface::new());
        let display = Arc::new(SimulatedDisplay::new());
        let session = CameraSession::builder(Box::new(device))
            .surface(surface.clone())
            .display(display.clone())
            .config(SessionConfig::new(CameraId::Back))
            .build()
            .unwrap();
        Self {
            session,
            device: handle,
            surface,
            display,
        }
    }

    fn settle(&self) {
        assert!(self.session.settle(SETTLE), "camera worker did not settle");
    }

    fn show_surface(&self, width: u32, height: u32) {
        self.surface.set_size(Some(Size::new(width, height)));
        self.session.on_surface(SurfaceEvent::Available { width, height });
        self.settle();
    }

    fn resize_surface(&self, width: u32, height: u32) {
        self.surface.set_size(Some(Size::new(width, height)));
        self.session
            .on_surface(SurfaceEvent::SizeChanged { width, height });
        self.settle();
    }

    fn rotate_display(&self, rotation: Rotation) {
        self.display.set_rotation(0, rotation);
        self.session
            .on_display(DisplayEvent::Changed { display_id: 0 });
        self.settle();
    }

    /// Opens the back camera and shows a portrait surface.
    fn running(device: SimulatedDevice) -> Self {
        let fixture = Self::new(device);
        fixture
            .session
            .on_lifecycle(LifecycleEvent::ViewAttached { display_id: 0 });
        fixture.session.open();
        fixture.settle();
        fixture.show_surface(1080, 1920);
        fixture
    }

    fn opens_and_closes(&self) -> Vec<String> {
        self.device
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                DeviceCall::Open { camera, .. } => Some(format!("open {camera}")),
                DeviceCall::Close { connection } => Some(format!("close {}", connection.camera)),
                _ => None,
            })
            .collect()
    }
}

#[test]
fn available_surface_builds_exactly_one_capture_session() {
    let fixture = Fixture::running(SimulatedDevice::new());

    let sessions = fixture.device.capture_sessions();
    assert_eq!(sessions.len(), 1);
    let target = &sessions[0];
    assert_eq!(target.camera, CameraId::Back);
    assert_eq!(target.surface_size, Size::new(1080, 1920));
    assert_eq!(target.rotation, Rotation::R0);
    assert_eq!(target.buffer_size, Size::new(1920, 1080));

    let status = fixture.session.status();
    assert_eq!(status.state, SessionState::PreviewRunning);
    assert_eq!(status.capture_generation, 1);
    assert_eq!(fixture.surface.buffer_size(), Some(Size::new(1920, 1080)));

    let repeating = fixture
        .device
        .calls()
        .iter()
        .filter(|call| matches!(call, DeviceCall::SetRepeatingRequest { .. }))
        .count();
    assert_eq!(repeating, 1);
}

#[test]
fn surface_before_open_is_picked_up_once_connected() {
    let fixture = Fixture::new(SimulatedDevice::new());
    fixture.show_surface(1080, 1920);
    assert!(fixture.device.capture_sessions().is_empty());

    fixture.session.open();
    fixture.settle();
    assert_eq!(fixture.device.capture_sessions().len(), 1);
}

#[test]
fn resize_replaces_the_capture_session() {
    let fixture = Fixture::running(SimulatedDevice::new());
    fixture.resize_surface(1920, 1080);

    let sessions = fixture.device.capture_sessions();
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[1].surface_size, Size::new(1920, 1080));

    let status = fixture.session.status();
    assert_eq!(status.capture_generation, 2);
    assert_eq!(
        status.target.map(|target| target.surface_size),
        Some(Size::new(1920, 1080))
    );
}

#[test]
fn no_capture_session_without_connection_or_surface() {
    let fixture = Fixture::new(SimulatedDevice::new());
    fixture.resize_surface(1080, 1920);
    assert!(fixture.device.capture_sessions().is_empty());

    fixture.surface.set_size(None);
    fixture.session.open();
    fixture.settle();
    assert_eq!(fixture.session.status().state, SessionState::Connected);
    assert!(fixture.device.capture_sessions().is_empty());
}

#[test]
fn switch_closes_before_opening_the_other_camera() {
    let fixture = Fixture::running(SimulatedDevice::new());

    assert_eq!(fixture.session.switch_camera(), CameraId::Front);
    fixture.settle();

    assert_eq!(
        fixture.opens_and_closes(),
        ["open back", "close back", "open front"]
    );
    assert_eq!(fixture.device.max_open_connections(), 1);

    let status = fixture.session.status();
    assert_eq!(status.camera, CameraId::Front);
    assert_eq!(status.state, SessionState::PreviewRunning);
    assert_eq!(
        fixture.device.capture_sessions().last().map(|t| t.camera),
        Some(CameraId::Front)
    );

    assert_eq!(fixture.session.switch_camera(), CameraId::Back);
    fixture.settle();
    assert_eq!(fixture.session.camera(), CameraId::Back);
    assert_eq!(fixture.device.max_open_connections(), 1);
}

#[test]
fn switch_waits_for_close_completion() {
    let fixture = Fixture::new(SimulatedDevice::manual());
    fixture.session.open();
    fixture.settle();
    fixture.device.deliver_all();
    fixture.settle();
    assert_eq!(fixture.session.status().state, SessionState::Connected);

    fixture.session.switch_camera();
    fixture.settle();
    assert_eq!(fixture.session.status().state, SessionState::Closing);
    assert_eq!(fixture.opens_and_closes(), ["open back", "close back"]);

    // Close completion, then the reopen it triggers.
    while fixture.device.deliver_all() > 0 {
        fixture.settle();
    }
    assert_eq!(
        fixture.opens_and_closes(),
        ["open back", "close back", "open front"]
    );
    assert_eq!(fixture.session.status().state, SessionState::Connected);
    assert_eq!(fixture.device.max_open_connections(), 1);
}

#[test]
fn repeated_open_close_keeps_a_single_connection() {
    let fixture = Fixture::new(SimulatedDevice::new());
    for _ in 0..5 {
        fixture.session.open();
        fixture.session.open();
        fixture.settle();
        fixture.session.close();
        fixture.session.open();
        fixture.settle();
    }
    assert_eq!(fixture.device.max_open_connections(), 1);
    assert_eq!(fixture.device.open_connections(), 1);
}

#[test]
fn late_open_after_close_is_closed_again() {
    let fixture = Fixture::new(SimulatedDevice::manual());
    fixture.session.open();
    fixture.session.close();
    fixture.settle();
    assert_eq!(fixture.session.status().state, SessionState::Closing);

    while fixture.device.deliver_all() > 0 {
        fixture.settle();
    }
    let status = fixture.session.status();
    assert_eq!(status.state, SessionState::Idle);
    assert_eq!(status.connection, None);
    assert_eq!(fixture.opens_and_closes(), ["open back", "close back"]);
    assert_eq!(fixture.device.open_connections(), 0);
}

#[test]
fn switch_during_pending_open_waits_for_it() {
    let fixture = Fixture::new(SimulatedDevice::manual());
    fixture.session.open();
    fixture.settle();
    assert_eq!(fixture.session.status().state, SessionState::Opening);

    fixture.session.switch_camera();
    fixture.settle();
    assert_eq!(fixture.opens_and_closes(), ["open back"]);
    assert_eq!(fixture.device.max_open_connections(), 1);

    while fixture.device.deliver_all() > 0 {
        fixture.settle();
    }
    assert_eq!(
        fixture.opens_and_closes(),
        ["open back", "close back", "open front"]
    );
    assert_eq!(fixture.device.max_open_connections(), 1);

    let status = fixture.session.status();
    assert_eq!(status.state, SessionState::Connected);
    assert_eq!(status.connection.map(|c| c.camera), Some(CameraId::Front));
}

#[test]
fn error_while_closing_does_not_lose_the_reopen() {
    let fixture = Fixture::new(SimulatedDevice::manual());
    fixture.session.open();
    fixture.settle();
    fixture.device.deliver_all();
    fixture.settle();
    let back = fixture.session.status().connection.unwrap();

    fixture.session.switch_camera();
    fixture.settle();
    assert_eq!(fixture.session.status().state, SessionState::Closing);

    assert!(fixture.device.error_connection(back.handle, 2));
    fixture.settle();
    assert_eq!(fixture.session.status().state, SessionState::Closing);

    while fixture.device.deliver_all() > 0 {
        fixture.settle();
    }
    let status = fixture.session.status();
    assert_eq!(status.state, SessionState::Connected);
    assert_eq!(status.connection.map(|c| c.camera), Some(CameraId::Front));
    assert_eq!(
        fixture.opens_and_closes(),
        ["open back", "close back", "open front"]
    );
}

#[test]
fn superseded_configuration_is_ignored() {
    let fixture = Fixture::new(SimulatedDevice::manual());
    fixture.session.open();
    fixture.settle();
    fixture.device.deliver_all();
    fixture.settle();

    // Resized before the first capture session finished configuring.
    fixture.show_surface(1080, 1920);
    fixture.resize_surface(1920, 1080);
    assert_eq!(fixture.device.pending(), 2);
    fixture.device.deliver_all();
    fixture.settle();

    let calls = fixture.device.calls();
    let repeating: Vec<_> = calls
        .iter()
        .filter_map(|call| match call {
            DeviceCall::CreateRepeatingRequest { target, .. } => Some(target.surface_size),
            _ => None,
        })
        .collect();
    assert_eq!(repeating, [Size::new(1920, 1080)]);
    let started = calls
        .iter()
        .filter(|call| matches!(call, DeviceCall::SetRepeatingRequest { .. }))
        .count();
    assert_eq!(started, 1);

    let status = fixture.session.status();
    assert_eq!(status.state, SessionState::PreviewRunning);
    assert_eq!(status.capture_generation, 2);
}

#[test]
fn superseded_configuration_failure_is_ignored() {
    let fixture = Fixture::new(SimulatedDevice::manual());
    fixture.session.open();
    fixture.settle();
    fixture.device.deliver_all();
    fixture.settle();

    fixture.device.fail_configure(true);
    fixture.show_surface(1080, 1920);
    fixture.device.fail_configure(false);
    fixture.resize_surface(1920, 1080);

    assert!(fixture.device.deliver_newest());
    fixture.settle();
    assert_eq!(fixture.session.status().state, SessionState::PreviewRunning);

    assert_eq!(fixture.device.deliver_all(), 1);
    fixture.settle();
    let status = fixture.session.status();
    assert_eq!(status.state, SessionState::PreviewRunning);
    assert_eq!(status.capture_generation, 2);
}

#[test]
fn disconnect_of_a_closed_connection_is_ignored() {
    let fixture = Fixture::running(SimulatedDevice::new());
    let back = fixture.session.status().connection.unwrap();

    fixture.session.switch_camera();
    fixture.settle();
    assert!(fixture.device.disconnect_connection(back.handle));
    fixture.settle();

    let status = fixture.session.status();
    assert_eq!(status.state, SessionState::PreviewRunning);
    assert_eq!(status.camera, CameraId::Front);
    assert_eq!(fixture.surface.releases(), 0);
    assert_eq!(fixture.device.open_connections(), 1);
}

#[test]
fn device_error_keeps_connection_and_builds_nothing() {
    let fixture = Fixture::new(SimulatedDevice::new());
    fixture.session.open();
    fixture.settle();
    let connection = fixture.session.status().connection;
    assert!(connection.is_some());

    assert!(fixture.device.error(4));
    fixture.settle();

    let status = fixture.session.status();
    assert_eq!(status.state, SessionState::Failed { code: 4 });
    assert_eq!(status.connection, connection);
    assert!(matches!(status.check(), Err(CameraError::Device { code: 4 })));

    fixture.show_surface(1080, 1920);
    assert!(fixture.device.capture_sessions().is_empty());

    // Reopening closes the failed connection first.
    fixture.session.open();
    fixture.settle();
    let status = fixture.session.status();
    assert_eq!(status.state, SessionState::PreviewRunning);
    assert!(status.check().is_ok());
    assert_eq!(fixture.device.max_open_connections(), 1);
}

#[test]
fn quarter_turn_does_not_rebuild_but_half_turn_does() {
    let fixture = Fixture::running(SimulatedDevice::new());

    fixture.rotate_display(Rotation::R90);
    assert_eq!(fixture.device.capture_sessions().len(), 1);
    assert_eq!(fixture.session.status().rotation, Rotation::R90);

    fixture.rotate_display(Rotation::R270);
    let sessions = fixture.device.capture_sessions();
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[1].rotation, Rotation::R270);

    fixture.rotate_display(Rotation::R0);
    assert_eq!(fixture.device.capture_sessions().len(), 2);
}

#[test]
fn half_turn_while_detached_does_not_rebuild() {
    let fixture = Fixture::running(SimulatedDevice::new());
    fixture.session.on_lifecycle(LifecycleEvent::ViewDetached);
    fixture.settle();

    fixture.rotate_display(Rotation::R180);
    assert_eq!(fixture.device.capture_sessions().len(), 1);
    let status = fixture.session.status();
    assert_eq!(status.rotation, Rotation::R0);
    assert_eq!(status.capture_generation, 1);
}

#[test]
fn rotation_of_other_displays_is_ignored() {
    let fixture = Fixture::running(SimulatedDevice::new());
    fixture.display.set_rotation(1, Rotation::R180);
    fixture
        .session
        .on_display(DisplayEvent::Changed { display_id: 1 });
    fixture.settle();
    assert_eq!(fixture.device.capture_sessions().len(), 1);
}

#[test]
fn release_is_idempotent() {
    let fixture = Fixture::running(SimulatedDevice::new());

    fixture.session.release();
    fixture.session.release();
    fixture.settle();

    assert_eq!(fixture.surface.releases(), 1);
    assert_eq!(fixture.device.open_connections(), 0);
    let status = fixture.session.status();
    assert_eq!(status.state, SessionState::Released);
    assert!(matches!(status.check(), Err(CameraError::Released)));

    fixture.session.open();
    fixture.settle();
    assert_eq!(fixture.device.open_connections(), 0);
}

#[test]
fn disconnect_releases_the_session() {
    let fixture = Fixture::running(SimulatedDevice::new());
    assert!(fixture.device.disconnect());
    fixture.settle();

    assert_eq!(fixture.session.status().state, SessionState::Released);
    assert_eq!(fixture.device.open_connections(), 0);
    assert_eq!(fixture.surface.releases(), 1);
}

#[test]
fn configure_failure_leaves_preview_stopped() {
    let device = SimulatedDevice::new();
    device.handle().fail_configure(true);
    let fixture = Fixture::running(device);

    let status = fixture.session.status();
    assert_eq!(status.state, SessionState::Connected);
    assert_eq!(fixture.device.capture_sessions().len(), 1);
}

#[test]
fn dropping_the_session_releases_it() {
    let fixture = Fixture::running(SimulatedDevice::new());
    let Fixture {
        session,
        device,
        surface,
        ..
    } = fixture;
    drop(session);
    assert_eq!(surface.releases(), 1);
    assert_eq!(device.open_connections(), 0);
}

#[test]
fn build_requires_a_surface() {
    let err = CameraSession::builder(Box::new(SimulatedDevice::new()))
        .build()
        .unwrap_err();
    assert!(matches!(err, CameraError::InvalidConfig(_)));
}
