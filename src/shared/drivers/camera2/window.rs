// This is free and unencumbered software released into the public domain.

use alloc::sync::Arc;
use core::ptr::null_mut;
use ndk_sys::{ANativeWindow, ANativeWindow_acquire, ANativeWindow_release};
use std::sync::{Mutex, OnceLock};

/// An owned reference to a native window.
#[derive(Debug)]
pub struct NativeWindow {
    pub(crate) handle: *mut ANativeWindow,
}

// SAFETY: ANativeWindow references are reference counted and thread safe.
unsafe impl Send for NativeWindow {}

impl Drop for NativeWindow {
    fn drop(&mut self) {
        if !self.handle.is_null() {
            unsafe { ANativeWindow_release(self.handle) };
            self.handle = null_mut();
        }
    }
}

impl Clone for NativeWindow {
    fn clone(&self) -> Self {
        unsafe { Self::acquire(self.handle) }
    }
}

impl NativeWindow {
    /// Takes a new reference to `handle`.
    ///
    /// # Safety
    /// `handle` must point to a live `ANativeWindow`.
    pub unsafe fn acquire(handle: *mut ANativeWindow) -> Self {
        unsafe { ANativeWindow_acquire(handle) };
        Self { handle }
    }
}

/// Where the host publishes the window backing its preview surface.
#[derive(Clone, Debug, Default)]
pub struct WindowSlot(Arc<Mutex<Option<NativeWindow>>>);

impl WindowSlot {
    /// The process-wide slot used by [`Camera2DeviceService::new`].
    ///
    /// [`Camera2DeviceService::new`]: super::Camera2DeviceService::new
    pub fn shared() -> Self {
        static SHARED: OnceLock<WindowSlot> = OnceLock::new();
        SHARED.get_or_init(WindowSlot::default).clone()
    }

    /// Publishes the preview window, e.g. from `ANativeWindow_fromSurface`.
    ///
    /// # Safety
    /// `handle` must point to a live `ANativeWindow`.
    pub unsafe fn set(&self, handle: *mut ANativeWindow) {
        let window = unsafe { NativeWindow::acquire(handle) };
        *self.0.lock().unwrap_or_else(|p| p.into_inner()) = Some(window);
    }

    pub fn clear(&self) {
        self.0.lock().unwrap_or_else(|p| p.into_inner()).take();
    }

    pub fn get(&self) -> Option<NativeWindow> {
        self.0.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}
