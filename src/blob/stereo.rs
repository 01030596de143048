//! Visionary-S (stereo) frames
//!
//! Binary layout after the common dataset header: a planar z map (u16 per
//! pixel), an RGBA image (u32 per pixel) and a confidence map (u16 per
//! pixel), followed by the CRC / length-copy footer.

use super::{DataSetHeader, FrameInfo, FrameMetadata, LeCursor};
use crate::error::{Error, Result};
use std::sync::Arc;

/// One stereo frame
#[derive(Debug, Clone, Default)]
pub struct StereoFrame {
    pub info: FrameInfo,
    /// Planar depth in z-scale units
    pub z_map: Vec<u16>,
    /// Color image, one RGBA word per pixel
    pub rgba_map: Vec<u32>,
    pub confidence_map: Vec<u16>,
}

pub(super) fn parse_binary(
    metadata: &Arc<FrameMetadata>,
    buf: &[u8],
    frame: &mut StereoFrame,
) -> Result<()> {
    if metadata.width < 1 || metadata.height < 1 {
        return Err(Error::MalformedFrame("invalid image size".to_string()));
    }
    if metadata.distance_byte_depth != 2
        || metadata.intensity_byte_depth != 4
        || metadata.confidence_byte_depth != 2
    {
        return Err(Error::MalformedFrame(format!(
            "unsupported stereo pixel depths {}/{}/{}",
            metadata.distance_byte_depth,
            metadata.intensity_byte_depth,
            metadata.confidence_byte_depth
        )));
    }

    let num_pixels = metadata.num_pixels();
    let mut cursor = LeCursor::new(buf);

    let header = DataSetHeader::parse(&mut cursor)?;
    if header.length as usize > buf.len() {
        return Err(Error::MalformedFrame(
            "depth map length exceeds the binary segment".to_string(),
        ));
    }

    cursor.u16_map(&mut frame.z_map, num_pixels, "z map")?;
    cursor.u32_map(&mut frame.rgba_map, num_pixels, "rgba map")?;
    cursor.u16_map(&mut frame.confidence_map, num_pixels, "confidence map")?;

    header.finish(&mut cursor)?;

    frame.info.metadata = Arc::clone(metadata);
    frame.info.timestamp = header.timestamp;
    frame.info.frame_number = header
        .frame_number
        .unwrap_or(frame.info.frame_number.wrapping_add(1));
    Ok(())
}
