// This is free and unencumbered software released into the public domain.

use crate::shared::{CameraId, Size};

#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Camera the session opens first.
    pub camera: CameraId,
    /// Name of the dedicated camera worker thread.
    pub thread_name: String,
    /// Display whose rotation is sampled until the view reports its own.
    pub display_id: u32,
    /// Largest preview buffer ever requested from the device.
    pub max_preview_size: Size,
    /// Preferred preview aspect ratio; defaults to the camera's largest output.
    pub aspect_ratio: Option<Size>,
    pub diagnostics: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            camera: CameraId::Back,
            thread_name: "camera".into(),
            display_id: 0,
            max_preview_size: Size::new(1920, 1080),
            aspect_ratio: None,
            diagnostics: false,
        }
    }
}

impl SessionConfig {
    pub fn new(camera: CameraId) -> Self {
        Self {
            camera,
            ..Default::default()
        }
    }

    pub fn with_camera(mut self, camera: CameraId) -> Self {
        self.camera = camera;
        self
    }

    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    pub fn with_display(mut self, display_id: u32) -> Self {
        self.display_id = display_id;
        self
    }

    pub fn with_max_preview_size(mut self, size: Size) -> Self {
        self.max_preview_size = size;
        self
    }

    pub fn with_aspect_ratio(mut self, aspect: Size) -> Self {
        self.aspect_ratio = (!aspect.is_empty()).then_some(aspect);
        self
    }

    pub fn with_diagnostics(mut self, enabled: bool) -> Self {
        self.diagnostics = enabled;
        self
    }
}
