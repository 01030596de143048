//! Visionary-T (time-of-flight) frames
//!
//! Up to three binary sub-datasets per blob, each with the common header and
//! footer. The depth map (radial distance / intensity / confidence, u16 per
//! pixel) is always first when present; a polar scan and a cartesian point
//! list follow when the XML announces them.

use super::{DataSetHeader, FrameInfo, FrameMetadata, LeCursor};
use crate::endian::read_le;
use crate::error::{Error, Result};
use std::sync::Arc;

/// One point of the cartesian dataset
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointXYZC {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub intensity: f32,
}

/// Polar scan carried alongside the depth map
#[derive(Debug, Clone, Default)]
pub struct PolarScan {
    /// Angle of the first beam (degrees)
    pub start_angle: f32,
    /// Angular spacing between beams (degrees)
    pub angular_resolution: f32,
    pub distance: Vec<f32>,
    pub confidence: Vec<f32>,
}

/// One time-of-flight frame
#[derive(Debug, Clone, Default)]
pub struct TofFrame {
    pub info: FrameInfo,
    /// Radial distance in z-scale units
    pub distance_map: Vec<u16>,
    pub intensity_map: Vec<u16>,
    pub confidence_map: Vec<u16>,
    /// Polar dataset; empty vectors when the device does not stream it
    pub polar: PolarScan,
    /// Cartesian dataset; empty when not streamed
    pub cartesian: Vec<PointXYZC>,
}

pub(super) fn parse_binary(
    metadata: &Arc<FrameMetadata>,
    buf: &[u8],
    frame: &mut TofFrame,
) -> Result<()> {
    if metadata.width < 1 || metadata.height < 1 {
        return Err(Error::MalformedFrame("invalid image size".to_string()));
    }

    let mut cursor = LeCursor::new(buf);
    // Sum of the per-dataset lengths, bounded by the whole binary segment.
    let mut datasets_length = 0usize;

    frame.info.metadata = Arc::clone(metadata);

    if metadata.has_depth_map {
        if metadata.distance_byte_depth != 2
            || metadata.intensity_byte_depth != 2
            || metadata.confidence_byte_depth != 2
        {
            return Err(Error::MalformedFrame(format!(
                "unsupported depth map pixel depths {}/{}/{}",
                metadata.distance_byte_depth,
                metadata.intensity_byte_depth,
                metadata.confidence_byte_depth
            )));
        }
        let num_pixels = metadata.num_pixels();

        let header = DataSetHeader::parse(&mut cursor)?;
        datasets_length += header.length as usize;
        if datasets_length > buf.len() {
            return Err(Error::MalformedFrame(
                "depth map length exceeds the binary segment".to_string(),
            ));
        }

        cursor.u16_map(&mut frame.distance_map, num_pixels, "distance map")?;
        cursor.u16_map(&mut frame.intensity_map, num_pixels, "intensity map")?;
        cursor.u16_map(&mut frame.confidence_map, num_pixels, "confidence map")?;

        header.finish(&mut cursor)?;

        frame.info.timestamp = header.timestamp;
        frame.info.frame_number = header
            .frame_number
            .unwrap_or(frame.info.frame_number.wrapping_add(1));
    } else {
        frame.distance_map.clear();
        frame.intensity_map.clear();
        frame.confidence_map.clear();
    }

    if metadata.has_polar_2d {
        let length = cursor.u32("polar dataset header")?;
        datasets_length += length as usize;
        if datasets_length > buf.len() {
            return Err(Error::MalformedFrame(
                "polar dataset length exceeds the binary segment".to_string(),
            ));
        }
        frame.info.timestamp = cursor.u64("polar dataset header")?;

        cursor.skip(2, "device id")?;
        cursor.skip(4, "scan counter")?;
        cursor.skip(4, "system counter")?;
        cursor.skip(4, "scan frequency")?;
        cursor.skip(4, "measurement frequency")?;

        frame.polar.start_angle = cursor.f32("first beam angle")?;
        frame.polar.angular_resolution = cursor.f32("angular resolution")?;
        cursor.skip(4, "polar scale")?;
        cursor.skip(4, "polar offset")?;

        let beams = metadata.polar_length as usize;
        cursor.f32_map(&mut frame.polar.distance, beams, "polar distances")?;

        // RSSI block mirrors the four angle/scale fields; only the
        // confidence values that follow are kept.
        cursor.skip(4 * 4, "rssi description")?;
        cursor.f32_map(&mut frame.polar.confidence, beams, "polar confidence")?;

        cursor.skip(4, "polar crc")?;
        let length_copy = cursor.u32("polar footer")?;
        if length_copy != length {
            return Err(Error::MalformedFrame(format!(
                "polar length copy {} does not match header length {}",
                length_copy, length
            )));
        }
    } else {
        frame.polar.distance.clear();
        frame.polar.confidence.clear();
    }

    if metadata.has_cartesian {
        let length = cursor.u32("cartesian dataset header")?;
        datasets_length += length as usize;
        if datasets_length > buf.len() {
            return Err(Error::MalformedFrame(
                "cartesian dataset length exceeds the binary segment".to_string(),
            ));
        }
        frame.info.timestamp = cursor.u64("cartesian dataset header")?;
        cursor.skip(2, "cartesian version")?;

        let num_points = cursor.u32("cartesian point count")? as usize;
        let bytes = cursor.bytes(num_points * 16, "cartesian points")?;
        frame.cartesian.clear();
        frame.cartesian.reserve(num_points);
        for chunk in bytes.chunks_exact(16) {
            frame.cartesian.push(PointXYZC {
                x: read_le(&chunk[0..]),
                y: read_le(&chunk[4..]),
                z: read_le(&chunk[8..]),
                intensity: read_le(&chunk[12..]),
            });
        }

        cursor.skip(4, "cartesian crc")?;
        let length_copy = cursor.u32("cartesian footer")?;
        if length_copy != length {
            return Err(Error::MalformedFrame(format!(
                "cartesian length copy {} does not match header length {}",
                length_copy, length
            )));
        }
    } else {
        frame.cartesian.clear();
    }

    Ok(())
}
