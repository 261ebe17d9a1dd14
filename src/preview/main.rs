// This is free and unencumbered software released into the public domain.

#[cfg(not(feature = "std"))]
compile_error!("asimov-camera-preview requires the 'std' feature");

#[cfg(not(feature = "simulated"))]
compile_error!("asimov-camera-preview requires the 'simulated' feature for its host screen");

use asimov_camera_preview::{
    cli::{handle_error, info_user, warn_user},
    shared::{
        CameraError, CameraId, CameraSession, DisplayEvent, DisplayService as _, LifecycleEvent,
        Permissions, Rotation, SessionConfig, SessionStatus, Size, SurfaceEvent, default_device,
        drivers::simulated::{SimulatedDisplay, SimulatedHost, SimulatedSurface},
    },
};
use asimov_module::SysexitsError::{self, *};
use clap::{Parser, ValueEnum};
use clientele::StandardOptions;
use dogma::Named as _;
use std::{
    error::Error as StdError,
    io::{self, Write},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

const DISPLAY_ID: u32 = 0;
const POLL_INTERVAL: Duration = Duration::from_millis(50);
const SETTLE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Jsonl,
}

/// Hosts a camera preview session and reports its state changes.
#[derive(Debug, Parser)]
struct Options {
    #[clap(flatten)]
    flags: StandardOptions,

    /// Camera to open first (`back` or `front`)
    #[arg(long, default_value_t = CameraId::Back)]
    camera: CameraId,

    /// Size of the preview view, as WIDTHxHEIGHT
    #[arg(short, long, default_value = "1080x1920")]
    size: Size,

    /// Switch cameras every N seconds
    #[arg(long, value_name = "SECS")]
    switch_every: Option<f64>,

    /// Rotate the display by a quarter turn every N seconds
    #[arg(long, value_name = "SECS")]
    rotate_every: Option<f64>,

    /// Stop after N seconds instead of waiting for Ctrl-C
    #[arg(long, value_name = "SECS")]
    duration: Option<f64>,

    /// Pretend the camera permission was denied
    #[arg(long)]
    deny_permission: bool,

    #[arg(short = 'o', long, value_enum, default_value_t)]
    output: OutputFormat,
}

pub fn main() -> Result<SysexitsError, Box<dyn StdError>> {
    asimov_module::dotenv().ok();
    let args = asimov_module::args_os()?;
    let options = Options::parse_from(args);

    if options.flags.version {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        return Ok(EX_OK);
    }

    if options.flags.license {
        print!("{}", include_str!("../../UNLICENSE"));
        return Ok(EX_OK);
    }

    #[cfg(feature = "tracing")]
    asimov_module::init_tracing_subscriber(&options.flags).expect("failed to initialize logging");

    let exit_code = match run_preview(&options) {
        Ok(()) => EX_OK,
        Err(err) => handle_error(&err, &options.flags),
    };

    Ok(exit_code)
}

/// Periodic action on the host screen.
struct Ticker {
    every: Option<Duration>,
    next: Instant,
}

impl Ticker {
    fn new(seconds: Option<f64>, start: Instant) -> Result<Self, CameraError> {
        let every = seconds
            .map(|s| {
                Duration::try_from_secs_f64(s)
                    .ok()
                    .filter(|d| !d.is_zero())
                    .ok_or_else(|| CameraError::invalid_config(format!("invalid interval: {s}")))
            })
            .transpose()?;
        Ok(Self {
            every,
            next: start + every.unwrap_or_default(),
        })
    }

    fn due(&mut self, now: Instant) -> bool {
        match self.every {
            Some(every) if now >= self.next => {
                self.next = now + every;
                true
            },
            _ => false,
        }
    }
}

fn run_preview(opts: &Options) -> Result<(), CameraError> {
    if opts.size.is_empty() {
        return Err(CameraError::invalid_config("preview size must not be empty"));
    }

    let quit = Arc::new(AtomicBool::new(false));
    {
        let quit2 = Arc::clone(&quit);
        ctrlc::set_handler(move || {
            quit2.store(true, Ordering::SeqCst);
        })
        .map_err(|e| CameraError::driver("installing the Ctrl-C handler", e))?;
    }

    let device = default_device()?;
    info_user(&opts.flags, &format!("using camera service: {}", device.name()));
    match device.camera_ids() {
        Ok(ids) if ids.is_empty() => warn_user(&opts.flags, "no cameras reported"),
        Ok(ids) => info_user(&opts.flags, &format!("cameras: {}", ids.join(", "))),
        Err(err) => warn_user(&opts.flags, &format!("failed to list cameras: {err}")),
    }

    let host = SimulatedHost::new();
    let surface = Arc::new(SimulatedSurface::new());
    let display = Arc::new(SimulatedDisplay::new());

    let permissions = if opts.deny_permission {
        Permissions::new(
            || false,
            || eprintln!("WARN: camera permission denied; the preview will not start"),
        )
    } else {
        Permissions::granted()
    };

    let config = SessionConfig::new(opts.camera)
        .with_display(DISPLAY_ID)
        .with_diagnostics(opts.flags.debug || opts.flags.verbose >= 3);

    let session = CameraSession::builder(device)
        .surface(surface.clone())
        .display(display.clone())
        .permissions(permissions)
        .config(config)
        .attach(&host, &host)?;

    let mut out = Reporter::new(opts.output);

    host.dispatch(LifecycleEvent::ViewAttached {
        display_id: DISPLAY_ID,
    });
    host.dispatch(LifecycleEvent::Start);
    surface.set_size(Some(opts.size));
    session.on_surface(SurfaceEvent::Available {
        width: opts.size.width,
        height: opts.size.height,
    });
    session.settle(SETTLE_TIMEOUT);
    out.report(&session.status())
        .map_err(|e| CameraError::driver("writing status", e))?;

    let start = Instant::now();
    let deadline = opts
        .duration
        .and_then(|s| Duration::try_from_secs_f64(s).ok())
        .map(|d| start + d);
    let mut switch = Ticker::new(opts.switch_every, start)?;
    let mut rotate = Ticker::new(opts.rotate_every, start)?;
    let mut rotation = display.rotation(DISPLAY_ID);
    let mut outcome = Ok(());

    while !quit.load(Ordering::SeqCst) {
        let now = Instant::now();
        if deadline.is_some_and(|d| now >= d) {
            break;
        }

        if switch.due(now) {
            let camera = session.switch_camera();
            info_user(&opts.flags, &format!("switching to the {camera} camera"));
        }

        if rotate.due(now) {
            rotation = Rotation::from_quarter_turns(rotation.quarter_turns() + 1);
            display.set_rotation(DISPLAY_ID, rotation);
            session.on_display(DisplayEvent::Changed {
                display_id: DISPLAY_ID,
            });
        }

        let status = session.status();
        if let Err(err) = out.report(&status) {
            if err.kind() == io::ErrorKind::BrokenPipe {
                break;
            }
            return Err(CameraError::driver("writing status", err));
        }
        if let Err(err) = status.check() {
            outcome = Err(err);
            break;
        }
        std::thread::sleep(POLL_INTERVAL);
    }

    info_user(&opts.flags, "stopping camera preview");
    host.dispatch(LifecycleEvent::Stop);
    host.dispatch(LifecycleEvent::Destroy);
    session.settle(SETTLE_TIMEOUT);
    let _ = out.report(&session.status());
    outcome
}

/// Prints a line whenever the session status changes.
struct Reporter {
    format: OutputFormat,
    last: Option<SessionStatus>,
}

impl Reporter {
    fn new(format: OutputFormat) -> Self {
        Self { format, last: None }
    }

    fn report(&mut self, status: &SessionStatus) -> io::Result<()> {
        if self.last.as_ref() == Some(status) {
            return Ok(());
        }
        self.last = Some(status.clone());

        let line = match self.format {
            OutputFormat::Text => {
                let mut line = format!(
                    "{} camera={} rotation={}",
                    status.state, status.camera, status.rotation
                );
                if let Some(target) = &status.target {
                    line.push_str(&format!(
                        " surface={} buffer={} captures={}",
                        target.surface_size, target.buffer_size, status.capture_generation
                    ));
                }
                line
            },
            OutputFormat::Jsonl => serde_json::json!({
                "state": status.state.to_string(),
                "camera": status.camera.to_string(),
                "rotation": status.rotation.degrees(),
                "connection": status.connection.map(|c| c.handle.0),
                "surface": status.target.as_ref().map(|t| t.surface_size.to_string()),
                "buffer": status.target.as_ref().map(|t| t.buffer_size.to_string()),
                "captures": status.capture_generation,
            })
            .to_string(),
        };

        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{line}")
    }
}
