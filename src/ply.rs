//! Polygon File Format (PLY) export
//!
//! Writes point clouds as ASCII or binary-little-endian PLY, optionally with
//! per-point color (taken from an RGBA map) and intensity columns. Clouds
//! produced by [`PointCloudConverter`](crate::pointcloud::PointCloudConverter)
//! mark invalid pixels as NaN; three policies control how those appear in
//! the file.
//!
//! The vertex count in the header always matches the number of points
//! actually emitted, including under the skip policy, for both output
//! formats.

use crate::error::Result;
use crate::pointcloud::PointXYZ;
use std::io::Write;

/// How NaN points are represented in the file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidPointPolicy {
    /// Emit them as NaN coordinates
    AsNan,
    /// Emit them with all coordinates zeroed
    AsZero,
    /// Leave them out entirely
    Skip,
}

/// PLY writer configuration
pub struct PlyWriter {
    binary: bool,
    policy: InvalidPointPolicy,
}

impl PlyWriter {
    pub fn new(binary: bool, policy: InvalidPointPolicy) -> PlyWriter {
        PlyWriter { binary, policy }
    }

    /// Write `points` to `out`.
    ///
    /// Colors are used when `rgba` has one word per point (the low three
    /// bytes become red, green, blue); intensities are normalized from
    /// their u16 range to 0..1 floats.
    pub fn write<W: Write>(
        &self,
        out: &mut W,
        points: &[PointXYZ],
        rgba: Option<&[u32]>,
        intensity: Option<&[u16]>,
    ) -> Result<()> {
        let colors = rgba.filter(|map| map.len() == points.len());
        let intensities = intensity.filter(|map| map.len() == points.len());

        // A point is invalid iff its z is NaN; x and y derive from z.
        let vertex_count = match self.policy {
            InvalidPointPolicy::Skip => points.iter().filter(|p| !p.z.is_nan()).count(),
            _ => points.len(),
        };

        writeln!(out, "ply")?;
        writeln!(
            out,
            "format {} 1.0",
            if self.binary {
                "binary_little_endian"
            } else {
                "ascii"
            }
        )?;
        writeln!(out, "element vertex {}", vertex_count)?;
        writeln!(out, "property float x")?;
        writeln!(out, "property float y")?;
        writeln!(out, "property float z")?;
        if colors.is_some() {
            writeln!(out, "property uchar red")?;
            writeln!(out, "property uchar green")?;
            writeln!(out, "property uchar blue")?;
        }
        if intensities.is_some() {
            writeln!(out, "property float intensity")?;
        }
        writeln!(out, "end_header")?;

        for (i, point) in points.iter().enumerate() {
            let invalid = point.z.is_nan();
            let point = match self.policy {
                InvalidPointPolicy::Skip if invalid => continue,
                InvalidPointPolicy::AsZero if invalid => PointXYZ {
                    x: zeroed(point.x),
                    y: zeroed(point.y),
                    z: zeroed(point.z),
                },
                _ => *point,
            };

            if self.binary {
                out.write_all(&point.x.to_le_bytes())?;
                out.write_all(&point.y.to_le_bytes())?;
                out.write_all(&point.z.to_le_bytes())?;
                if let Some(map) = colors {
                    let [r, g, b, _a] = map[i].to_le_bytes();
                    out.write_all(&[r, g, b])?;
                }
                if let Some(map) = intensities {
                    let value = map[i] as f32 / 65535.0;
                    out.write_all(&value.to_le_bytes())?;
                }
            } else {
                write!(out, "{} {} {}", point.x, point.y, point.z)?;
                if let Some(map) = colors {
                    let [r, g, b, _a] = map[i].to_le_bytes();
                    write!(out, " {} {} {}", r, g, b)?;
                }
                if let Some(map) = intensities {
                    write!(out, " {}", map[i] as f32 / 65535.0)?;
                }
                writeln!(out)?;
            }
        }

        Ok(())
    }
}

fn zeroed(v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v
    }
}
