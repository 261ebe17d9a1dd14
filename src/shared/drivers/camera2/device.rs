// This is free and unencumbered software released into the public domain.

use crate::shared::{DeviceCallbacks, DeviceHandle};
use alloc::boxed::Box;
use asimov_module::tracing::warn;
use core::{
    ffi::{c_int, c_void},
    ptr::null_mut,
};
use ndk_sys::{ACameraDevice, ACameraDevice_StateCallbacks, ACameraDevice_close};

/// Routes NDK device callbacks back to the session that opened the device.
#[derive(Debug)]
pub struct DeviceContext {
    pub(crate) callbacks: DeviceCallbacks,
    pub(crate) handle: DeviceHandle,
}

unsafe extern "C" fn on_disconnected(context: *mut c_void, _device: *mut ACameraDevice) {
    let Some(context) = (unsafe { (context as *const DeviceContext).as_ref() }) else {
        return;
    };
    context.callbacks.on_disconnected(context.handle);
}

unsafe extern "C" fn on_error(context: *mut c_void, _device: *mut ACameraDevice, error: c_int) {
    let Some(context) = (unsafe { (context as *const DeviceContext).as_ref() }) else {
        return;
    };
    warn!(handle = %context.handle, error, "camera device reported an error");
    context.callbacks.on_error(Some(context.handle), error);
}

#[derive(Debug)]
pub struct CameraDevice {
    pub(crate) handle: *mut ACameraDevice,
    pub(crate) state_callbacks: ACameraDevice_StateCallbacks,
    // Must outlive `handle`; the NDK holds a raw pointer to it.
    context: Box<DeviceContext>,
}

impl CameraDevice {
    pub(crate) fn new(context: Box<DeviceContext>) -> Self {
        let context_ptr = &*context as *const DeviceContext as *mut c_void;
        Self {
            handle: null_mut(),
            state_callbacks: ACameraDevice_StateCallbacks {
                context: context_ptr,
                onDisconnected: Some(on_disconnected),
                onError: Some(on_error),
            },
            context,
        }
    }

    pub fn callbacks(&self) -> &DeviceCallbacks {
        &self.context.callbacks
    }

    /// Closes the device. Blocks until the NDK has released it.
    pub fn close(&mut self) {
        if !self.handle.is_null() {
            unsafe { ACameraDevice_close(self.handle) };
            self.handle = null_mut();
        }
    }
}

impl Drop for CameraDevice {
    fn drop(&mut self) {
        self.close()
    }
}
