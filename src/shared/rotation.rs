// This is free and unencumbered software released into the public domain.

use derive_more::Display;

/// Display rotation, in quarter turns clockwise from the natural orientation.
#[derive(Clone, Copy, Debug, Default, Display, PartialEq, Eq, Hash)]
pub enum Rotation {
    #[default]
    #[display("0")]
    R0,
    #[display("90")]
    R90,
    #[display("180")]
    R180,
    #[display("270")]
    R270,
}

impl Rotation {
    pub fn degrees(self) -> i32 {
        self.quarter_turns() as i32 * 90
    }

    pub fn quarter_turns(self) -> u32 {
        match self {
            Rotation::R0 => 0,
            Rotation::R90 => 1,
            Rotation::R180 => 2,
            Rotation::R270 => 3,
        }
    }

    pub fn from_quarter_turns(turns: u32) -> Self {
        match turns % 4 {
            0 => Rotation::R0,
            1 => Rotation::R90,
            2 => Rotation::R180,
            _ => Rotation::R270,
        }
    }

    /// Normalizes any multiple of 90 degrees, including negative ones.
    pub fn from_degrees(degrees: i32) -> Option<Self> {
        if degrees % 90 != 0 {
            return None;
        }
        Some(Self::from_quarter_turns((degrees / 90).rem_euclid(4) as u32))
    }

    /// True when the display is in a landscape rotation.
    pub fn is_sideways(self) -> bool {
        matches!(self, Rotation::R90 | Rotation::R270)
    }

    /// True exactly when going from `from` to `to` is a +180 or -180 degree
    /// change. Those leave the surface size untouched, so no size-changed
    /// event arrives and the capture session must be rebuilt by hand.
    pub fn is_flip(from: Rotation, to: Rotation) -> bool {
        (to.degrees() - from.degrees()).abs() == 180
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_half_turns_are_flips() {
        use Rotation::*;
        let all = [R0, R90, R180, R270];
        for from in all {
            for to in all {
                let delta = (to.degrees() - from.degrees()).rem_euclid(360);
                assert_eq!(Rotation::is_flip(from, to), delta == 180, "{from} -> {to}");
            }
        }
        assert!(Rotation::is_flip(R90, R270));
        assert!(Rotation::is_flip(R270, R90));
        assert!(!Rotation::is_flip(R0, R90));
        assert!(!Rotation::is_flip(R270, R0));
    }

    #[test]
    fn degrees_normalize() {
        assert_eq!(Rotation::from_degrees(-90), Some(Rotation::R270));
        assert_eq!(Rotation::from_degrees(450), Some(Rotation::R90));
        assert_eq!(Rotation::from_degrees(45), None);
        assert_eq!(Rotation::R270.degrees(), 270);
    }
}
