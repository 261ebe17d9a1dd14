// This is free and unencumbered software released into the public domain.

//! Camera preview session: binds a host screen's lifecycle and rendering
//! surface to a platform camera device.
//!
//! All device calls, and every device callback, run on one dedicated
//! "camera" worker thread that owns the connection and capture-session
//! state. The host feeds lifecycle, surface and display events into a
//! [`shared::CameraSession`], which sequences open/close/switch and rebuilds
//! the capture session whenever the render target changes.

extern crate alloc;

pub mod cli;
pub mod shared;
