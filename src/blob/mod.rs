//! Blob frame stream decoding
//!
//! The camera delivers frames as "blobs" on a dedicated TCP channel: a
//! framed package carrying an XML metadata segment followed by one or more
//! binary sub-datasets. The XML describes the image geometry, the camera
//! model and which binary datasets are present; it only changes when the
//! device is reconfigured, so each segment carries a change counter and the
//! parsed metadata is cached until the counter moves.
//!
//! ```text
//! ┌─────────────┬──────────────┬────────────────┬───────────────┬──────────────────┐
//! │ 02 02 02 02 │ length:u32be │ version:u16be  │ type:u8=0x62  │ segment data     │
//! └─────────────┴──────────────┴────────────────┴───────────────┴──────────────────┘
//! ```
//!
//! Segment data:
//!
//! ```text
//! blob_id:u16be  num_segments:u16be  (offset:u32be change_counter:u32be){num}
//! payload...
//! ```
//!
//! Offsets are relative to the first payload byte (right after the last
//! change counter). Segment 0 is the XML, segment 1 the binary data, and
//! segment 2 marks the end of segment 1. All binary sub-dataset content is
//! little-endian, unlike the big-endian framing around it.

mod metadata;
pub use metadata::FrameMetadata;

mod stereo;
pub use stereo::StereoFrame;

mod tof;
pub use tof::{PointXYZC, PolarScan, TofFrame};

mod tof_mini;
pub use tof_mini::TofMiniFrame;

mod stream;
pub use stream::BlobClient;

use crate::endian::{read_be, read_le};
use crate::error::{Error, Result};
use std::sync::Arc;

/// Device family, selecting the metadata schema and binary layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceFamily {
    /// Visionary-S stereo cameras (planar z map + RGBA)
    Stereo,
    /// Visionary-T time-of-flight cameras (radial distance, optional polar
    /// and cartesian datasets)
    Tof,
    /// Visionary-T Mini (radial distance, fixed 0.25 mm scale)
    TofMini,
}

/// Fields shared by every frame family
#[derive(Debug, Clone)]
pub struct FrameInfo {
    /// Metadata parsed from the blob's XML segment; shared between frames
    /// while the change counter stands still
    pub metadata: Arc<FrameMetadata>,
    /// Frame number: device-assigned for dataset version 2, locally
    /// incremented for version 1
    pub frame_number: u32,
    /// Packed device timestamp (see [`timestamp_ms`])
    pub timestamp: u64,
}

impl Default for FrameInfo {
    fn default() -> Self {
        FrameInfo {
            metadata: Arc::new(FrameMetadata::default()),
            frame_number: 0,
            timestamp: 0,
        }
    }
}

/// One decoded camera frame
#[derive(Debug, Clone)]
pub enum Frame {
    Stereo(StereoFrame),
    Tof(TofFrame),
    TofMini(TofMiniFrame),
}

impl Frame {
    /// Empty frame buffer for a family, ready to be parsed into
    pub fn new(family: DeviceFamily) -> Frame {
        match family {
            DeviceFamily::Stereo => Frame::Stereo(StereoFrame::default()),
            DeviceFamily::Tof => Frame::Tof(TofFrame::default()),
            DeviceFamily::TofMini => Frame::TofMini(TofMiniFrame::default()),
        }
    }

    pub fn family(&self) -> DeviceFamily {
        match self {
            Frame::Stereo(_) => DeviceFamily::Stereo,
            Frame::Tof(_) => DeviceFamily::Tof,
            Frame::TofMini(_) => DeviceFamily::TofMini,
        }
    }

    pub fn info(&self) -> &FrameInfo {
        match self {
            Frame::Stereo(f) => &f.info,
            Frame::Tof(f) => &f.info,
            Frame::TofMini(f) => &f.info,
        }
    }

    pub fn metadata(&self) -> &Arc<FrameMetadata> {
        &self.info().metadata
    }

    pub fn frame_number(&self) -> u32 {
        self.info().frame_number
    }

    /// Packed device timestamp
    pub fn timestamp(&self) -> u64 {
        self.info().timestamp
    }

    /// Device timestamp as UTC milliseconds
    pub fn timestamp_ms(&self) -> u64 {
        timestamp_ms(self.info().timestamp)
    }
}

// ============================================================================
// Packed timestamp
// ============================================================================

// Bit layout (MSB to LSB):
// 5 unused | 12 year | 4 month | 5 day | 11 tz offset | 5 hour | 6 minute |
// 6 second | 10 millisecond
const TS_MILLISECOND_MASK: u64 = 0x3FF;
const TS_SECOND_SHIFT: u32 = 10;
const TS_MINUTE_SHIFT: u32 = 16;
const TS_HOUR_SHIFT: u32 = 22;
const TS_DAY_SHIFT: u32 = 38;
const TS_MONTH_SHIFT: u32 = 43;
const TS_YEAR_SHIFT: u32 = 47;

/// Decode the packed device timestamp into UTC milliseconds.
pub fn timestamp_ms(packed: u64) -> u64 {
    let millisecond = packed & TS_MILLISECOND_MASK;
    let second = (packed >> TS_SECOND_SHIFT) & 0x3F;
    let minute = (packed >> TS_MINUTE_SHIFT) & 0x3F;
    let hour = (packed >> TS_HOUR_SHIFT) & 0x1F;
    let day = (packed >> TS_DAY_SHIFT) & 0x1F;
    let month = (packed >> TS_MONTH_SHIFT) & 0x0F;
    let year = (packed >> TS_YEAR_SHIFT) & 0xFFF;

    let days = days_from_civil(year as i64, month as u32, day as u32);
    let seconds = days * 86_400 + (hour * 3600 + minute * 60 + second) as i64;
    (seconds * 1000) as u64 + millisecond
}

/// Days since 1970-01-01 for a proleptic Gregorian date.
fn days_from_civil(year: i64, month: u32, day: u32) -> i64 {
    let year = if month <= 2 { year - 1 } else { year };
    let era = if year >= 0 { year } else { year - 399 } / 400;
    let yoe = (year - era * 400) as i64;
    let mp = i64::from(if month > 2 { month - 3 } else { month + 9 });
    let doy = (153 * mp + 2) / 5 + day as i64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

// ============================================================================
// Little-endian cursor over a binary sub-dataset
// ============================================================================

/// Bounds-checked little-endian reader used by the family parsers
pub(crate) struct LeCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> LeCursor<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> LeCursor<'a> {
        LeCursor { buf, pos: 0 }
    }

    fn short(what: &str) -> Error {
        Error::MalformedFrame(format!("not enough data for {}", what))
    }

    pub(crate) fn bytes(&mut self, len: usize, what: &str) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| Self::short(what))?;
        let bytes = &self.buf[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    pub(crate) fn skip(&mut self, len: usize, what: &str) -> Result<()> {
        self.bytes(len, what).map(drop)
    }

    pub(crate) fn u16(&mut self, what: &str) -> Result<u16> {
        Ok(read_le(self.bytes(2, what)?))
    }

    pub(crate) fn u32(&mut self, what: &str) -> Result<u32> {
        Ok(read_le(self.bytes(4, what)?))
    }

    pub(crate) fn u64(&mut self, what: &str) -> Result<u64> {
        Ok(read_le(self.bytes(8, what)?))
    }

    pub(crate) fn f32(&mut self, what: &str) -> Result<f32> {
        Ok(read_le(self.bytes(4, what)?))
    }

    /// Fill `map` with `count` u16 values.
    pub(crate) fn u16_map(&mut self, map: &mut Vec<u16>, count: usize, what: &str) -> Result<()> {
        let bytes = self.bytes(count * 2, what)?;
        map.clear();
        map.extend(bytes.chunks_exact(2).map(read_le::<u16>));
        Ok(())
    }

    /// Fill `map` with `count` u32 values.
    pub(crate) fn u32_map(&mut self, map: &mut Vec<u32>, count: usize, what: &str) -> Result<()> {
        let bytes = self.bytes(count * 4, what)?;
        map.clear();
        map.extend(bytes.chunks_exact(4).map(read_le::<u32>));
        Ok(())
    }

    /// Fill `map` with `count` f32 values.
    pub(crate) fn f32_map(&mut self, map: &mut Vec<f32>, count: usize, what: &str) -> Result<()> {
        let bytes = self.bytes(count * 4, what)?;
        map.clear();
        map.extend(bytes.chunks_exact(4).map(read_le::<f32>));
        Ok(())
    }
}

/// Common header of every binary sub-dataset
pub(crate) struct DataSetHeader {
    pub length: u32,
    pub timestamp: u64,
    /// Device-assigned frame number for dataset version >= 2
    pub frame_number: Option<u32>,
}

impl DataSetHeader {
    /// Parse `length`, timestamp, version and (for version >= 2) the frame
    /// number, data quality and device status fields.
    pub(crate) fn parse(cursor: &mut LeCursor<'_>) -> Result<DataSetHeader> {
        let length = cursor.u32("dataset header")?;
        let timestamp = cursor.u64("dataset header")?;
        let version = cursor.u16("dataset header")?;

        let frame_number = if version > 1 {
            let number = cursor.u32("extended dataset header")?;
            cursor.skip(1, "data quality")?;
            cursor.skip(1, "device status")?;
            Some(number)
        } else {
            None
        };

        Ok(DataSetHeader {
            length,
            timestamp,
            frame_number,
        })
    }

    /// Consume the CRC and length-copy footer, rejecting a mismatched copy.
    pub(crate) fn finish(&self, cursor: &mut LeCursor<'_>) -> Result<()> {
        cursor.skip(4, "dataset crc")?;
        let length_copy = cursor.u32("dataset footer")?;
        if length_copy != self.length {
            return Err(Error::MalformedFrame(format!(
                "dataset length copy {} does not match header length {}",
                length_copy, self.length
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Segment table and decoder
// ============================================================================

/// Decoder for one device family with the metadata cache
pub struct Decoder {
    family: DeviceFamily,
    metadata: Arc<FrameMetadata>,
    change_counter: u32,
    have_metadata: bool,
    xml_parses: u64,
}

impl Decoder {
    pub fn new(family: DeviceFamily) -> Decoder {
        Decoder {
            family,
            metadata: Arc::new(FrameMetadata::default()),
            change_counter: 0,
            have_metadata: false,
            xml_parses: 0,
        }
    }

    pub fn family(&self) -> DeviceFamily {
        self.family
    }

    /// Decode one blob's segment data (everything after the packet type
    /// byte) into `frame`. The frame buffers are reused across calls.
    pub fn parse_segments(&mut self, data: &[u8], frame: &mut Frame) -> Result<()> {
        if data.len() < 4 {
            return Err(Error::MalformedFrame(
                "segment data shorter than its own header".to_string(),
            ));
        }
        // blob id (unused), then the segment count
        let num_segments = read_be::<u16>(&data[2..]) as usize;
        if num_segments < 3 {
            return Err(Error::MalformedFrame(format!(
                "expected at least 3 segments, got {}",
                num_segments
            )));
        }

        let table_len = num_segments * 8;
        let payload_start = 4 + table_len;
        if data.len() < payload_start {
            return Err(Error::MalformedFrame(
                "segment table exceeds the received data".to_string(),
            ));
        }

        let mut offsets = Vec::with_capacity(num_segments);
        let mut counters = Vec::with_capacity(num_segments);
        for i in 0..num_segments {
            let entry = &data[4 + i * 8..];
            offsets.push(read_be::<u32>(entry) as usize);
            counters.push(read_be::<u32>(&entry[4..]));
        }

        let payload = &data[payload_start..];
        let xml = segment(payload, offsets[0], offsets[1], "XML segment")?;
        let binary = segment(payload, offsets[1], offsets[2], "binary segment")?;

        self.apply_xml(xml, counters[0])?;

        let metadata = Arc::clone(&self.metadata);
        match (self.family, frame) {
            (DeviceFamily::Stereo, Frame::Stereo(f)) => stereo::parse_binary(&metadata, binary, f),
            (DeviceFamily::Tof, Frame::Tof(f)) => tof::parse_binary(&metadata, binary, f),
            (DeviceFamily::TofMini, Frame::TofMini(f)) => {
                tof_mini::parse_binary(&metadata, binary, f)
            }
            _ => Err(Error::Other(
                "frame buffer does not match the decoder's device family".to_string(),
            )),
        }
    }

    /// Parse the XML segment unless the change counter matches the cache.
    fn apply_xml(&mut self, xml: &[u8], change_counter: u32) -> Result<()> {
        if self.have_metadata && self.change_counter == change_counter {
            return Ok(());
        }

        let text = std::str::from_utf8(xml)
            .map_err(|_| Error::MalformedFrame("XML segment is not UTF-8".to_string()))?;
        let metadata = metadata::parse_xml(text, self.family)?;

        log::debug!(
            "blob metadata refreshed (change counter {}): {}x{}",
            change_counter,
            metadata.width,
            metadata.height
        );

        self.metadata = Arc::new(metadata);
        self.change_counter = change_counter;
        self.have_metadata = true;
        self.xml_parses += 1;
        Ok(())
    }
}

fn segment<'a>(payload: &'a [u8], start: usize, end: usize, what: &str) -> Result<&'a [u8]> {
    if start > end || end > payload.len() {
        return Err(Error::MalformedFrame(format!(
            "{} bounds {}..{} exceed payload of {} bytes",
            what,
            start,
            end,
            payload.len()
        )));
    }
    Ok(&payload[start..end])
}

#[cfg(test)]
pub(crate) mod testdata;
