//! Blob XML metadata
//!
//! Segment 0 of every blob is an XML document describing the record: image
//! geometry, camera matrix and distortion model, the scale of the distance
//! values, and which binary datasets follow. The schemas differ slightly per
//! family (`DataSetStereo` vs `DataSetDepthMap`, `Z` vs `Distance`), so
//! parsing dispatches on [`DeviceFamily`].

use super::DeviceFamily;
use crate::error::{Error, Result};
use roxmltree::{Document, Node};

/// Distance unit of the ToF-Mini family, fixed by the device
const TOF_MINI_DISTANCE_UNIT: f32 = 0.25;

/// Camera and record description parsed from the XML segment
#[derive(Debug, Clone, PartialEq)]
pub struct FrameMetadata {
    /// Frame width in pixels
    pub width: usize,
    /// Frame height in pixels
    pub height: usize,

    /// Camera matrix
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,

    /// Camera distortion parameters
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
    pub k3: f64,

    /// Camera-to-world transform, row-major 4x4
    pub cam2world: [f64; 16],

    /// Focal-to-ray-cross correction offset for depth values (mm)
    pub f2rc: f64,

    /// Bytes per pixel of the distance / z map (0 when absent)
    pub distance_byte_depth: usize,
    /// Bytes per pixel of the intensity / RGBA map
    pub intensity_byte_depth: usize,
    /// Bytes per pixel of the confidence / state map
    pub confidence_byte_depth: usize,

    /// Factor converting distance values to millimeters
    pub z_scale: f32,

    /// Which binary datasets follow the XML
    pub has_depth_map: bool,
    pub has_polar_2d: bool,
    pub has_cartesian: bool,

    /// Number of beams in the polar dataset
    pub polar_length: u8,
}

impl Default for FrameMetadata {
    fn default() -> Self {
        FrameMetadata {
            width: 0,
            height: 0,
            fx: 0.0,
            fy: 0.0,
            cx: 0.0,
            cy: 0.0,
            k1: 0.0,
            k2: 0.0,
            p1: 0.0,
            p2: 0.0,
            k3: 0.0,
            cam2world: [0.0; 16],
            f2rc: 0.0,
            distance_byte_depth: 0,
            intensity_byte_depth: 0,
            confidence_byte_depth: 0,
            z_scale: 0.0,
            has_depth_map: false,
            has_polar_2d: false,
            has_cartesian: false,
            polar_length: 0,
        }
    }
}

impl FrameMetadata {
    /// Pixels per map
    pub fn num_pixels(&self) -> usize {
        self.width * self.height
    }
}

/// Parse the XML segment for one device family.
pub fn parse_xml(xml: &str, family: DeviceFamily) -> Result<FrameMetadata> {
    let doc = Document::parse(xml)?;
    let root = doc.root_element();
    if root.tag_name().name() != "SickRecord" {
        return Err(Error::MalformedFrame(format!(
            "unexpected metadata root element <{}>",
            root.tag_name().name()
        )));
    }

    let data_sets = child(root, "DataSets");
    match family {
        DeviceFamily::Stereo => parse_stereo(data_sets),
        DeviceFamily::Tof => parse_tof(data_sets),
        DeviceFamily::TofMini => parse_tof_mini(data_sets),
    }
}

fn parse_stereo(data_sets: Option<Node>) -> Result<FrameMetadata> {
    let stream = data_sets
        .and_then(|n| child(n, "DataSetStereo"))
        .and_then(|n| child(n, "FormatDescriptionDepthMap"))
        .and_then(|n| child(n, "DataStream"))
        .ok_or_else(|| Error::MalformedFrame("missing stereo data stream description".to_string()))?;

    let mut meta = FrameMetadata {
        has_depth_map: true,
        ..FrameMetadata::default()
    };
    parse_data_stream(stream, &mut meta, "Z")?;
    meta.z_scale = 10f32.powi(decimal_exponent(stream, "Z"));
    Ok(meta)
}

fn parse_tof(data_sets: Option<Node>) -> Result<FrameMetadata> {
    let mut meta = FrameMetadata::default();

    let Some(data_sets) = data_sets else {
        return Ok(meta);
    };
    meta.has_depth_map = child(data_sets, "DataSetDepthMap").is_some();
    meta.has_polar_2d = child(data_sets, "DataSetPolar2D").is_some();
    meta.has_cartesian = child(data_sets, "DataSetCartesian").is_some();

    if let Some(stream) = child(data_sets, "DataSetDepthMap")
        .and_then(|n| child(n, "FormatDescriptionDepthMap"))
        .and_then(|n| child(n, "DataStream"))
    {
        parse_data_stream(stream, &mut meta, "Distance")?;
        meta.z_scale = 10f32.powi(decimal_exponent(stream, "Distance"));
    }

    if let Some(stream) = child(data_sets, "DataSetPolar2D")
        .and_then(|n| child(n, "FormatDescription"))
        .and_then(|n| child(n, "DataStream"))
    {
        meta.polar_length = stream
            .attribute("datalength")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0);
    }

    if meta.has_cartesian {
        let ok = child(data_sets, "DataSetCartesian")
            .and_then(|n| child(n, "FormatDescriptionCartesian"))
            .and_then(|n| child(n, "DataStream"))
            .map(|stream| {
                text_of(stream, "Length") == "uint32"
                    && text_of(stream, "X") == "float32"
                    && text_of(stream, "Y") == "float32"
                    && text_of(stream, "Z") == "float32"
                    && text_of(stream, "Intensity") == "float32"
            })
            .unwrap_or(false);
        if !ok {
            log::warn!("cartesian dataset does not have the expected format, ignoring it");
            meta.has_cartesian = false;
        }
    }

    Ok(meta)
}

fn parse_tof_mini(data_sets: Option<Node>) -> Result<FrameMetadata> {
    let mut meta = FrameMetadata::default();

    let Some(data_sets) = data_sets else {
        return Ok(meta);
    };
    meta.has_depth_map = child(data_sets, "DataSetDepthMap").is_some();

    if let Some(stream) = child(data_sets, "DataSetDepthMap")
        .and_then(|n| child(n, "FormatDescriptionDepthMap"))
        .and_then(|n| child(n, "DataStream"))
    {
        parse_data_stream(stream, &mut meta, "Distance")?;
    }

    // Scaling is fixed on this family; the XML carries no exponent.
    meta.z_scale = TOF_MINI_DISTANCE_UNIT;
    Ok(meta)
}

/// Shared `DataStream` content: geometry, camera model, byte depths.
/// `distance_tag` is `Z` on stereo devices and `Distance` elsewhere.
fn parse_data_stream(stream: Node, meta: &mut FrameMetadata, distance_tag: &str) -> Result<()> {
    meta.width = text_usize(stream, "Width");
    meta.height = text_usize(stream, "Height");

    if let Some(transform) = child(stream, "CameraToWorldTransform") {
        for (slot, value) in meta
            .cam2world
            .iter_mut()
            .zip(transform.children().filter(|n| n.is_element()))
        {
            *slot = value
                .text()
                .and_then(|t| t.trim().parse().ok())
                .unwrap_or(0.0);
        }
    }

    if let Some(matrix) = child(stream, "CameraMatrix") {
        meta.fx = text_f64(matrix, "FX");
        meta.fy = text_f64(matrix, "FY");
        meta.cx = text_f64(matrix, "CX");
        meta.cy = text_f64(matrix, "CY");
    }

    if let Some(distortion) = child(stream, "CameraDistortionParams") {
        meta.k1 = text_f64(distortion, "K1");
        meta.k2 = text_f64(distortion, "K2");
        meta.p1 = text_f64(distortion, "P1");
        meta.p2 = text_f64(distortion, "P2");
        meta.k3 = text_f64(distortion, "K3");
    }

    meta.f2rc = text_f64(stream, "FocalToRayCross");

    meta.distance_byte_depth = item_length(&text_of(stream, distance_tag));
    meta.intensity_byte_depth = item_length(&text_of(stream, "Intensity"));
    meta.confidence_byte_depth = item_length(&text_of(stream, "Confidence"));

    Ok(())
}

/// Byte length of a data type named in the XML ("uint16" -> 2, ...)
fn item_length(data_type: &str) -> usize {
    match data_type.to_ascii_lowercase().as_str() {
        "uint8" => 1,
        "uint16" => 2,
        "uint32" => 4,
        "uint64" => 8,
        _ => 0,
    }
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

fn text_of(node: Node, name: &str) -> String {
    child(node, name)
        .and_then(|n| n.text())
        .map(|t| t.trim().to_string())
        .unwrap_or_default()
}

fn text_f64(node: Node, name: &str) -> f64 {
    text_of(node, name).parse().unwrap_or(0.0)
}

fn text_usize(node: Node, name: &str) -> usize {
    text_of(node, name).parse().unwrap_or(0)
}

fn decimal_exponent(stream: Node, distance_tag: &str) -> i32 {
    child(stream, distance_tag)
        .and_then(|n| n.attribute("decimalexponent"))
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}
