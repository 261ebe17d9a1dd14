// This is free and unencumbered software released into the public domain.

use crate::shared::CameraError;
use core::str::FromStr;
use derive_more::Display;

/// Which of the two fixed cameras a session targets.
#[derive(Clone, Copy, Debug, Default, Display, PartialEq, Eq, Hash)]
pub enum CameraId {
    #[default]
    #[display("back")]
    Back,
    #[display("front")]
    Front,
}

impl CameraId {
    pub const ALL: [CameraId; 2] = [CameraId::Back, CameraId::Front];

    /// Returns the other camera.
    #[must_use]
    pub fn toggle(self) -> Self {
        match self {
            CameraId::Back => CameraId::Front,
            CameraId::Front => CameraId::Back,
        }
    }

    pub fn index(self) -> u32 {
        match self {
            CameraId::Back => 0,
            CameraId::Front => 1,
        }
    }

    /// The identifier the platform camera service knows this camera by.
    pub fn platform_id(self) -> &'static str {
        match self {
            CameraId::Back => "0",
            CameraId::Front => "1",
        }
    }

    pub fn from_index(index: u32) -> Option<Self> {
        match index {
            0 => Some(CameraId::Back),
            1 => Some(CameraId::Front),
            _ => None,
        }
    }
}

impl FromStr for CameraId {
    type Err = CameraError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "back" | "0" => Ok(CameraId::Back),
            "front" | "1" => Ok(CameraId::Front),
            other => Err(CameraError::invalid_config(format!(
                "unknown camera '{other}', expected back or front"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_alternates_between_the_two_cameras() {
        let mut id = CameraId::Back;
        for _ in 0..5 {
            let next = id.toggle();
            assert_ne!(next, id);
            assert!(CameraId::ALL.contains(&next));
            id = next;
        }
        assert_eq!(id, CameraId::Front);
    }

    #[test]
    fn indices_match_platform_ids() {
        for id in CameraId::ALL {
            assert_eq!(id.platform_id(), id.index().to_string());
            assert_eq!(CameraId::from_index(id.index()), Some(id));
        }
        assert_eq!(CameraId::from_index(2), None);
    }

    #[test]
    fn parses_names_and_indices() {
        assert_eq!("front".parse::<CameraId>().unwrap(), CameraId::Front);
        assert_eq!(" BACK ".parse::<CameraId>().unwrap(), CameraId::Back);
        assert_eq!("1".parse::<CameraId>().unwrap(), CameraId::Front);
        assert!("side".parse::<CameraId>().is_err());
        assert_eq!(CameraId::Front.to_string(), "front");
    }
}
