// This is free and unencumbered software released into the public domain.

use crate::shared::CameraError;
use core::str::FromStr;
use derive_more::Display;

#[derive(Clone, Copy, Debug, Default, Display, PartialEq, Eq, Hash)]
#[display("{width}x{height}")]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn area(self) -> u64 {
        self.width as u64 * self.height as u64
    }

    #[must_use]
    pub fn transposed(self) -> Self {
        Self::new(self.height, self.width)
    }

    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn fits_within(self, bound: Size) -> bool {
        self.width <= bound.width && self.height <= bound.height
    }

    pub fn covers(self, other: Size) -> bool {
        self.width >= other.width && self.height >= other.height
    }

    /// True when `self` has the same aspect ratio as `aspect`.
    pub fn has_aspect(self, aspect: Size) -> bool {
        !aspect.is_empty()
            && self.height as u64 * aspect.width as u64 == self.width as u64 * aspect.height as u64
    }
}

impl FromStr for Size {
    type Err = CameraError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let s = input.trim().replace('×', "x");
        let parts: Vec<&str> = s.split('x').map(|t| t.trim()).collect();
        if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
            return Err(CameraError::invalid_config(format!(
                "invalid size '{s}', use WxH (e.g., 1920x1080)"
            )));
        }
        let width = parts[0]
            .parse()
            .map_err(|_| CameraError::invalid_config(format!("invalid width: {}", parts[0])))?;
        let height = parts[1]
            .parse()
            .map_err(|_| CameraError::invalid_config(format!("invalid height: {}", parts[1])))?;
        Ok(Size::new(width, height))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Rect {
    pub fn from_size(size: Size) -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            right: size.width as f32,
            bottom: size.height as f32,
        }
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.left + self.right) / 2.0,
            (self.top + self.bottom) / 2.0,
        )
    }

    #[must_use]
    pub fn offset(self, dx: f32, dy: f32) -> Self {
        Self {
            left: self.left + dx,
            top: self.top + dy,
            right: self.right + dx,
            bottom: self.bottom + dy,
        }
    }

    /// Moves the rect so its centre lands on `center`.
    #[must_use]
    pub fn centered_on(self, center: Point) -> Self {
        let current = self.center();
        self.offset(center.x - current.x, center.y - current.y)
    }
}

/// A 2-D affine transform, applied to a point as
/// `(a*x + c*y + tx, b*x + d*y + ty)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub tx: f32,
    pub ty: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    pub const fn identity() -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            tx: 0.0,
            ty: 0.0,
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    /// Maps `src` onto `dst`, scaling each axis independently.
    pub fn rect_to_rect_fill(src: Rect, dst: Rect) -> Self {
        if src.width() == 0.0 || src.height() == 0.0 {
            return Self::identity();
        }
        let sx = dst.width() / src.width();
        let sy = dst.height() / src.height();
        Self {
            a: sx,
            b: 0.0,
            c: 0.0,
            d: sy,
            tx: dst.left - src.left * sx,
            ty: dst.top - src.top * sy,
        }
    }

    /// Returns `other ∘ self`: the result applies `self` first.
    #[must_use]
    pub fn then(self, other: Transform) -> Self {
        Self {
            a: other.a * self.a + other.c * self.b,
            b: other.b * self.a + other.d * self.b,
            c: other.a * self.c + other.c * self.d,
            d: other.b * self.c + other.d * self.d,
            tx: other.a * self.tx + other.c * self.ty + other.tx,
            ty: other.b * self.tx + other.d * self.ty + other.ty,
        }
    }

    #[must_use]
    pub fn then_translate(self, dx: f32, dy: f32) -> Self {
        self.then(Self {
            tx: dx,
            ty: dy,
            ..Self::identity()
        })
    }

    #[must_use]
    pub fn then_scale_about(self, sx: f32, sy: f32, pivot: Point) -> Self {
        self.then_translate(-pivot.x, -pivot.y)
            .then(Self {
                a: sx,
                d: sy,
                ..Self::identity()
            })
            .then_translate(pivot.x, pivot.y)
    }

    /// Rotates clockwise in screen coordinates (y grows downwards).
    #[must_use]
    pub fn then_rotate_about(self, degrees: i32, pivot: Point) -> Self {
        let (sin, cos) = match degrees.rem_euclid(360) {
            0 => (0.0, 1.0),
            90 => (1.0, 0.0),
            180 => (0.0, -1.0),
            270 => (-1.0, 0.0),
            other => (other as f32).to_radians().sin_cos(),
        };
        self.then_translate(-pivot.x, -pivot.y)
            .then(Self {
                a: cos,
                b: sin,
                c: -sin,
                d: cos,
                tx: 0.0,
                ty: 0.0,
            })
            .then_translate(pivot.x, pivot.y)
    }

    pub fn map_point(&self, p: Point) -> Point {
        Point::new(
            self.a * p.x + self.c * p.y + self.tx,
            self.b * p.x + self.d * p.y + self.ty,
        )
    }

    /// Row-major 3x3 matrix, as consumed by platform view transforms.
    pub fn to_matrix(&self) -> [f32; 9] {
        [
            self.a, self.c, self.tx, //
            self.b, self.d, self.ty, //
            0.0, 0.0, 1.0,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: Point, expected: Point) {
        assert!(
            (actual.x - expected.x).abs() < 1e-3 && (actual.y - expected.y).abs() < 1e-3,
            "{actual:?} != {expected:?}"
        );
    }

    #[test]
    fn parses_sizes() {
        assert_eq!("1920x1080".parse::<Size>().unwrap(), Size::new(1920, 1080));
        assert_eq!(" 640 × 480 ".parse::<Size>().unwrap(), Size::new(640, 480));
        assert!("1920".parse::<Size>().is_err());
        assert!("ax480".parse::<Size>().is_err());
        assert_eq!(Size::new(4, 3).to_string(), "4x3");
    }

    #[test]
    fn aspect_comparison_ignores_scale() {
        assert!(Size::new(1920, 1080).has_aspect(Size::new(16, 9)));
        assert!(!Size::new(640, 480).has_aspect(Size::new(16, 9)));
        assert!(!Size::new(640, 480).has_aspect(Size::new(0, 0)));
    }

    #[test]
    fn rotation_about_center_is_clockwise() {
        let t = Transform::identity().then_rotate_about(90, Point::new(0.0, 0.0));
        assert_close(t.map_point(Point::new(1.0, 0.0)), Point::new(0.0, 1.0));

        let pivot = Point::new(50.0, 100.0);
        let half = Transform::identity().then_rotate_about(180, pivot);
        assert_close(half.map_point(Point::new(0.0, 0.0)), Point::new(100.0, 200.0));
        assert_close(half.map_point(pivot), pivot);
    }

    #[test]
    fn rect_to_rect_maps_corners() {
        let src = Rect::from_size(Size::new(100, 200));
        let dst = Rect::from_size(Size::new(50, 50)).offset(10.0, 20.0);
        let t = Transform::rect_to_rect_fill(src, dst);
        assert_close(t.map_point(Point::new(0.0, 0.0)), Point::new(10.0, 20.0));
        assert_close(t.map_point(Point::new(100.0, 200.0)), Point::new(60.0, 70.0));
    }

    #[test]
    fn composition_applies_left_to_right() {
        let t = Transform::identity()
            .then_translate(1.0, 0.0)
            .then_scale_about(2.0, 2.0, Point::new(0.0, 0.0));
        assert_close(t.map_point(Point::new(0.0, 0.0)), Point::new(2.0, 0.0));
    }
}
