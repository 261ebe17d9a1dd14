// This is free and unencumbered software released into the public domain.

#![cfg(feature = "simulated")]

use asimov_camera_preview::shared::{
    CameraError, CameraSession, LifecycleEvent, Permissions, SessionState, Size, SurfaceEvent,
    UiExecutor, UiTask,
    drivers::simulated::{SimulatedDevice, SimulatedHost, SimulatedSurface},
};
use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

const SETTLE: Duration = Duration::from_secs(5);

/// Queues UI tasks until the test runs them.
#[derive(Default)]
struct QueuedExecutor {
    tasks: Mutex<Vec<UiTask>>,
}

impl QueuedExecutor {
    fn run_all(&self) -> usize {
        let tasks: Vec<UiTask> = self.tasks.lock().unwrap().drain(..).collect();
        let count = tasks.len();
        tasks.into_iter().for_each(|task| task());
        count
    }
}

impl UiExecutor for QueuedExecutor {
    fn post(&self, task: UiTask) {
        self.tasks.lock().unwrap().push(task);
    }
}

#[test]
fn host_lifecycle_drives_the_session() {
    let device = SimulatedDevice::new();
    let calls = device.handle();
    let surface = Arc::new(SimulatedSurface::with_size(1080, 1920));
    let host = SimulatedHost::new();

    let session = CameraSession::builder(Box::new(device))
        .surface(surface.clone())
        .attach(&host, &host)
        .unwrap();

    host.dispatch(LifecycleEvent::ViewAttached { display_id: 0 });
    host.dispatch(LifecycleEvent::Start);
    assert!(session.settle(SETTLE));
    assert_eq!(session.status().state, SessionState::PreviewRunning);
    assert_eq!(calls.capture_sessions().len(), 1);

    host.dispatch(LifecycleEvent::Stop);
    assert!(session.settle(SETTLE));
    assert_eq!(session.status().state, SessionState::Idle);
    assert_eq!(calls.open_connections(), 0);

    host.dispatch(LifecycleEvent::Start);
    assert!(session.settle(SETTLE));
    assert_eq!(session.status().state, SessionState::PreviewRunning);
    assert_eq!(calls.capture_sessions().len(), 2);

    host.dispatch(LifecycleEvent::ViewDetached);
    host.dispatch(LifecycleEvent::Destroy);
    assert!(session.settle(SETTLE));
    assert_eq!(session.status().state, SessionState::Released);
    assert_eq!(surface.releases(), 1);
    assert_eq!(calls.open_connections(), 0);
}

#[test]
fn missing_permission_asks_the_host() {
    let requests = Arc::new(AtomicUsize::new(0));
    let device = SimulatedDevice::new();
    let calls = device.handle();
    let host = SimulatedHost::new();

    let requested = Arc::clone(&requests);
    let session = CameraSession::builder(Box::new(device))
        .surface(Arc::new(SimulatedSurface::with_size(1080, 1920)))
        .permissions(Permissions::new(
            || false,
            move || {
                requested.fetch_add(1, Ordering::SeqCst);
            },
        ))
        .attach(&host, &host)
        .unwrap();

    host.dispatch(LifecycleEvent::Start);
    assert!(session.settle(SETTLE));

    assert_eq!(requests.load(Ordering::SeqCst), 1);
    assert!(calls.calls().is_empty());
    assert_eq!(session.status().state, SessionState::Idle);
}

#[test]
fn registration_is_allowed_once() {
    let host = SimulatedHost::new();
    let session = CameraSession::builder(Box::new(SimulatedDevice::new()))
        .surface(Arc::new(SimulatedSurface::new()))
        .attach(&host, &host)
        .unwrap();

    let err = session.register_for_lifecycle(&host, &host).unwrap_err();
    assert!(matches!(err, CameraError::AlreadyRegistered));
}

#[test]
fn lifecycle_events_after_drop_are_ignored() {
    let host = SimulatedHost::new();
    let surface = Arc::new(SimulatedSurface::new());
    let session = CameraSession::builder(Box::new(SimulatedDevice::new()))
        .surface(surface.clone())
        .attach(&host, &host)
        .unwrap();
    drop(session);

    host.dispatch(LifecycleEvent::Start);
    host.dispatch(LifecycleEvent::Destroy);
    assert_eq!(surface.releases(), 1);
}

#[test]
fn open_and_close_go_through_the_ui_queue() {
    let ui = Arc::new(QueuedExecutor::default());
    let device = SimulatedDevice::new();
    let calls = device.handle();
    let session = CameraSession::builder(Box::new(device))
        .surface(Arc::new(SimulatedSurface::new()))
        .ui_executor(ui.clone())
        .build()
        .unwrap();

    session.open();
    assert!(session.settle(SETTLE));
    assert!(calls.calls().is_empty());

    assert_eq!(ui.run_all(), 1);
    assert!(session.settle(SETTLE));
    assert_eq!(session.status().state, SessionState::Connected);

    session.close();
    assert_eq!(ui.run_all(), 1);
    assert!(session.settle(SETTLE));
    assert_eq!(session.status().state, SessionState::Idle);
}

#[test]
fn surface_events_report_not_consumed() {
    let session = CameraSession::builder(Box::new(SimulatedDevice::new()))
        .surface(Arc::new(SimulatedSurface::new()))
        .build()
        .unwrap();

    assert!(!session.on_surface(SurfaceEvent::Destroyed));
    assert!(!session.on_surface(SurfaceEvent::Updated));
    let Size { width, height } = Size::new(640, 480);
    assert!(!session.on_surface(SurfaceEvent::Available { width, height }));
}
