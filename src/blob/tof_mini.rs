//! Visionary-T Mini frames
//!
//! Same depth map triple as the bigger ToF family, but the distance unit is
//! fixed at 0.25 mm per LSB and individual maps can be absent (their XML
//! type is empty, giving a zero byte depth).

use super::{DataSetHeader, FrameInfo, FrameMetadata, LeCursor};
use crate::error::{Error, Result};
use std::sync::Arc;

/// One ToF-Mini frame
#[derive(Debug, Clone, Default)]
pub struct TofMiniFrame {
    pub info: FrameInfo,
    /// Radial distance, 0.25 mm per LSB
    pub distance_map: Vec<u16>,
    pub intensity_map: Vec<u16>,
    /// Per-pixel state flags (0 = valid measurement)
    pub state_map: Vec<u16>,
}

pub(super) fn parse_binary(
    metadata: &Arc<FrameMetadata>,
    buf: &[u8],
    frame: &mut TofMiniFrame,
) -> Result<()> {
    if metadata.width < 1 || metadata.height < 1 {
        return Err(Error::MalformedFrame("invalid image size".to_string()));
    }

    frame.info.metadata = Arc::clone(metadata);

    if !metadata.has_depth_map {
        frame.distance_map.clear();
        frame.intensity_map.clear();
        frame.state_map.clear();
        return Ok(());
    }

    let num_pixels = metadata.num_pixels();
    let mut cursor = LeCursor::new(buf);

    let header = DataSetHeader::parse(&mut cursor)?;
    if header.length as usize > buf.len() {
        return Err(Error::MalformedFrame(
            "depth map length exceeds the binary segment".to_string(),
        ));
    }

    read_map(
        &mut cursor,
        &mut frame.distance_map,
        num_pixels,
        metadata.distance_byte_depth,
        "distance map",
    )?;
    read_map(
        &mut cursor,
        &mut frame.intensity_map,
        num_pixels,
        metadata.intensity_byte_depth,
        "intensity map",
    )?;
    read_map(
        &mut cursor,
        &mut frame.state_map,
        num_pixels,
        metadata.confidence_byte_depth,
        "state map",
    )?;

    header.finish(&mut cursor)?;

    frame.info.timestamp = header.timestamp;
    frame.info.frame_number = header
        .frame_number
        .unwrap_or(frame.info.frame_number.wrapping_add(1));
    Ok(())
}

/// Read one map, clearing it when its byte depth is zero (map not streamed).
fn read_map(
    cursor: &mut LeCursor<'_>,
    map: &mut Vec<u16>,
    num_pixels: usize,
    byte_depth: usize,
    what: &str,
) -> Result<()> {
    match byte_depth {
        0 => {
            map.clear();
            Ok(())
        }
        2 => cursor.u16_map(map, num_pixels, what),
        other => Err(Error::MalformedFrame(format!(
            "unsupported {} byte depth {}",
            what, other
        ))),
    }
}
