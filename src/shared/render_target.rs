// This is free and unencumbered software released into the public domain.

use crate::shared::{CameraId, Rect, Rotation, SessionConfig, Size, Transform};

/// What the device service reports about one camera.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CameraCharacteristics {
    /// Clockwise angle the sensor image must be rotated by to appear
    /// upright on a display in its natural orientation.
    pub sensor_orientation: Rotation,
    /// Preview stream sizes, in sensor coordinates.
    pub output_sizes: Vec<Size>,
}

impl CameraCharacteristics {
    pub fn new(sensor_orientation: Rotation, output_sizes: impl Into<Vec<Size>>) -> Self {
        Self {
            sensor_orientation,
            output_sizes: output_sizes.into(),
        }
    }

    pub fn largest_output(&self) -> Option<Size> {
        self.output_sizes.iter().copied().max_by_key(|s| s.area())
    }
}

/// The rotation-aware presentation target a capture session streams into.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderTarget {
    pub camera: CameraId,
    /// Size of the host view the preview is shown in.
    pub surface_size: Size,
    /// Size of the buffers the camera produces, in sensor coordinates.
    pub buffer_size: Size,
    pub rotation: Rotation,
    pub sensor_orientation: Rotation,
    /// View transform that keeps the preview upright and undistorted.
    pub transform: Transform,
}

impl RenderTarget {
    pub fn compute(
        camera: CameraId,
        surface_size: Size,
        characteristics: &CameraCharacteristics,
        rotation: Rotation,
        config: &SessionConfig,
    ) -> Self {
        let view = if needs_dimension_swap(rotation, characteristics.sensor_orientation) {
            surface_size.transposed()
        } else {
            surface_size
        };

        let aspect = config
            .aspect_ratio
            .or_else(|| characteristics.largest_output())
            .unwrap_or(view);

        let buffer_size = choose_preview_size(
            &characteristics.output_sizes,
            view,
            config.max_preview_size,
            aspect,
        );

        Self {
            camera,
            surface_size,
            buffer_size,
            rotation,
            sensor_orientation: characteristics.sensor_orientation,
            transform: preview_transform(surface_size, buffer_size, rotation),
        }
    }
}

/// True when the sensor and the display disagree on portrait/landscape, in
/// which case the view size must be transposed before matching it against
/// sensor output sizes.
pub fn needs_dimension_swap(display: Rotation, sensor: Rotation) -> bool {
    display.is_sideways() != sensor.is_sideways()
}

/// Picks the smallest size that covers `view` and matches `aspect`, else the
/// largest matching size that does not, else the first choice within `max`,
/// else `view` itself. No choice larger than `max` is ever picked.
pub fn choose_preview_size(choices: &[Size], view: Size, max: Size, aspect: Size) -> Size {
    let (big_enough, not_big_enough): (Vec<Size>, Vec<Size>) = choices
        .iter()
        .copied()
        .filter(|option| option.fits_within(max) && option.has_aspect(aspect))
        .partition(|option| option.covers(view));

    if let Some(best) = big_enough.into_iter().min_by_key(|s| s.area()) {
        return best;
    }
    if let Some(best) = not_big_enough.into_iter().max_by_key(|s| s.area()) {
        return best;
    }
    choices
        .iter()
        .copied()
        .find(|option| option.fits_within(max))
        .unwrap_or(view)
}

/// Transform for a view of size `view` showing buffers of size `preview`
/// while the display is at `rotation`.
pub fn preview_transform(view: Size, preview: Size, rotation: Rotation) -> Transform {
    let view_rect = Rect::from_size(view);
    let center = view_rect.center();

    match rotation {
        Rotation::R90 | Rotation::R270 => {
            if preview.is_empty() {
                return Transform::identity();
            }
            let buffer_rect = Rect::from_size(preview.transposed()).centered_on(center);
            let scale = f32::max(
                view.height as f32 / preview.height as f32,
                view.width as f32 / preview.width as f32,
            );
            Transform::rect_to_rect_fill(view_rect, buffer_rect)
                .then_scale_about(scale, scale, center)
                .then_rotate_about(90 * (rotation.quarter_turns() as i32 - 2), center)
        },
        Rotation::R180 => Transform::identity().then_rotate_about(180, center),
        Rotation::R0 => Transform::identity(),
    }
}
