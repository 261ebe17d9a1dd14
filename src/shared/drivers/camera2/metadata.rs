// This is free and unencumbered software released into the public domain.

use super::{CameraResult, CameraStatus};
use crate::shared::{CameraCharacteristics, Rotation, Size};
use core::{mem::zeroed, ptr::null_mut};
use ndk_sys::{
    ACameraMetadata, ACameraMetadata_const_entry, ACameraMetadata_free,
    ACameraMetadata_getConstEntry, acamera_metadata_tag,
};

/// `AIMAGE_FORMAT_PRIVATE`, the format of surface-texture outputs.
const FORMAT_PRIVATE: i32 = 0x22;

#[derive(Debug)]
pub struct CameraMetadata {
    pub(crate) handle: *mut ACameraMetadata,
}

impl Default for CameraMetadata {
    fn default() -> Self {
        Self { handle: null_mut() }
    }
}

impl Drop for CameraMetadata {
    fn drop(&mut self) {
        if !self.handle.is_null() {
            unsafe { ACameraMetadata_free(self.handle) };
            self.handle = null_mut();
        }
    }
}

impl CameraMetadata {
    fn entry(&self, tag: acamera_metadata_tag) -> CameraResult<&[i32]> {
        let mut entry: ACameraMetadata_const_entry = unsafe { zeroed() };
        CameraStatus::check(unsafe {
            ACameraMetadata_getConstEntry(self.handle, tag.0, &mut entry)
        })?;
        if entry.count == 0 {
            return Ok(&[]);
        }
        Ok(unsafe { core::slice::from_raw_parts(entry.data.i32_, entry.count as usize) })
    }

    pub fn sensor_orientation(&self) -> CameraResult<Rotation> {
        let degrees = self
            .entry(acamera_metadata_tag::ACAMERA_SENSOR_ORIENTATION)?
            .first()
            .copied()
            .unwrap_or_default();
        Ok(Rotation::from_degrees(degrees).unwrap_or_default())
    }

    /// Output sizes usable for a preview surface.
    pub fn preview_sizes(&self) -> CameraResult<Vec<Size>> {
        let configs =
            self.entry(acamera_metadata_tag::ACAMERA_SCALER_AVAILABLE_STREAM_CONFIGURATIONS)?;
        // (format, width, height, is_input) quadruples
        Ok(configs
            .chunks_exact(4)
            .filter(|c| c[0] == FORMAT_PRIVATE && c[3] == 0)
            .map(|c| Size::new(c[1] as u32, c[2] as u32))
            .collect())
    }

    pub fn characteristics(&self) -> CameraResult<CameraCharacteristics> {
        Ok(CameraCharacteristics::new(
            self.sensor_orientation()?,
            self.preview_sizes()?,
        ))
    }
}
