// This is free and unencumbered software released into the public domain.

mod camera_id;
pub use camera_id::*;

mod config;
pub use config::*;

mod device;
pub use device::*;

pub mod drivers {
    #[cfg(feature = "simulated")]
    pub mod simulated;

    #[cfg(all(feature = "android", target_os = "android"))]
    pub mod camera2;
}

mod error;
pub use error::*;

mod geometry;
pub use geometry::*;

mod host;
pub use host::*;

mod open;
pub use open::*;

mod render_target;
pub use render_target::*;

mod rotation;
pub use rotation::*;

mod session;
pub use session::*;

mod worker;
pub use worker::*;
