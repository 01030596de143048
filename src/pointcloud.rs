//! Depth map to point cloud conversion
//!
//! The camera model from the blob metadata (camera matrix + radial
//! distortion) turns each pixel into a direction ray; multiplying by the
//! pixel's distance value yields camera-frame coordinates in meters. The
//! per-pixel rays only depend on the metadata, so they are precomputed once
//! per converter and reused for every frame.
//!
//! Stereo devices deliver planar depth (z along the optical axis), the ToF
//! families radial distance along the ray; the two need different ray
//! normalizations.

use crate::blob::{Frame, FrameMetadata};
use crate::error::{Error, Result};
use std::sync::Arc;

/// One cartesian point in meters, camera frame unless transformed
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointXYZ {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Interpretation of the per-pixel distance value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthKind {
    /// Distance along the optical axis (stereo z maps)
    Planar,
    /// Distance along the viewing ray (time-of-flight maps)
    Radial,
}

/// Pixel values marking an invalid measurement
const INVALID_MIN: u16 = 0;
const INVALID_MAX: u16 = 0xFFFF;

/// Converter with the precomputed per-pixel rays for one metadata set
pub struct PointCloudConverter {
    metadata: Arc<FrameMetadata>,
    depth_kind: DepthKind,
    rays: Vec<PointXYZ>,
}

impl PointCloudConverter {
    /// Precompute the ray table for `metadata`.
    pub fn new(metadata: Arc<FrameMetadata>, depth_kind: DepthKind) -> Result<PointCloudConverter> {
        if metadata.width < 1 || metadata.height < 1 {
            return Err(Error::Other("invalid image size".to_string()));
        }

        let mut rays = Vec::with_capacity(metadata.num_pixels());

        for row in 0..metadata.height {
            // Image coordinates have their origin top-left with y downward;
            // camera coordinates look out of the sensor with x left and y
            // up, hence the cx/cy flips.
            let yp = (metadata.cy - row as f64) / metadata.fy;
            let yp2 = yp * yp;

            for col in 0..metadata.width {
                let xp = (metadata.cx - col as f64) / metadata.fx;

                // Radial distortion correction.
                let r2 = xp * xp + yp2;
                let r4 = r2 * r2;
                let k = 1.0 + metadata.k1 * r2 + metadata.k2 * r4;

                let x = (xp * k) as f32;
                let y = (yp * k) as f32;
                let z = 1.0f32;

                // Normalize so that ray * distance-in-mm gives meters.
                let s0 = match depth_kind {
                    DepthKind::Radial => (x * x + y * y + z * z).sqrt() as f64 * 1000.0,
                    DepthKind::Planar => 1000.0,
                };

                rays.push(PointXYZ {
                    x: (x as f64 / s0) as f32,
                    y: (y as f64 / s0) as f32,
                    z: (z as f64 / s0) as f32,
                });
            }
        }

        Ok(PointCloudConverter {
            metadata,
            depth_kind,
            rays,
        })
    }

    /// Converter matching a frame's family and metadata.
    pub fn for_frame(frame: &Frame) -> Result<PointCloudConverter> {
        let kind = match frame {
            Frame::Stereo(_) => DepthKind::Planar,
            Frame::Tof(_) | Frame::TofMini(_) => DepthKind::Radial,
        };
        PointCloudConverter::new(Arc::clone(frame.metadata()), kind)
    }

    pub fn depth_kind(&self) -> DepthKind {
        self.depth_kind
    }

    /// Convert a distance map into a camera-frame point cloud.
    ///
    /// Invalid pixels (0 or 0xFFFF) become NaN points so the cloud stays
    /// aligned with the image grid.
    pub fn convert(&self, map: &[u16], cloud: &mut Vec<PointXYZ>) -> Result<()> {
        if map.len() != self.rays.len() {
            return Err(Error::Other(format!(
                "distance map has {} pixels, expected {}",
                map.len(),
                self.rays.len()
            )));
        }

        let f2rc_m = (self.metadata.f2rc / 1000.0) as f32;
        let scale = self.metadata.z_scale;
        let invalid = PointXYZ {
            x: f32::NAN,
            y: f32::NAN,
            z: f32::NAN,
        };

        cloud.clear();
        cloud.reserve(map.len());
        for (&value, ray) in map.iter().zip(&self.rays) {
            if value == INVALID_MIN || value == INVALID_MAX {
                cloud.push(invalid);
            } else {
                let distance = value as f32 * scale;
                cloud.push(PointXYZ {
                    x: ray.x * distance,
                    y: ray.y * distance,
                    z: ray.z * distance - f2rc_m,
                });
            }
        }
        Ok(())
    }

    /// Convert a frame's distance map (the z map on stereo devices).
    pub fn convert_frame(&self, frame: &Frame, cloud: &mut Vec<PointXYZ>) -> Result<()> {
        let map = match frame {
            Frame::Stereo(f) => &f.z_map,
            Frame::Tof(f) => &f.distance_map,
            Frame::TofMini(f) => &f.distance_map,
        };
        self.convert(map, cloud)
    }

    /// Apply the camera-to-world transform in place.
    pub fn transform_to_world(&self, cloud: &mut [PointXYZ]) {
        let m = &self.metadata.cam2world;
        // Translation column arrives in millimeters.
        let tx = m[3] / 1000.0;
        let ty = m[7] / 1000.0;
        let tz = m[11] / 1000.0;

        for point in cloud.iter_mut() {
            let x = point.x as f64;
            let y = point.y as f64;
            let z = point.z as f64;

            point.x = (x * m[0] + y * m[1] + z * m[2] + tx) as f32;
            point.y = (x * m[4] + y * m[5] + z * m[6] + ty) as f32;
            point.z = (x * m[8] + y * m[9] + z * m[10] + tz) as f32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_metadata(width: usize, height: usize) -> Arc<FrameMetadata> {
        Arc::new(FrameMetadata {
            width,
            height,
            fx: 100.0,
            fy: 100.0,
            cx: width as f64 / 2.0,
            cy: height as f64 / 2.0,
            z_scale: 1.0,
            cam2world: [
                1.0, 0.0, 0.0, 1000.0, //
                0.0, 1.0, 0.0, 0.0, //
                0.0, 0.0, 1.0, 0.0, //
                0.0, 0.0, 0.0, 1.0,
            ],
            ..FrameMetadata::default()
        })
    }

    #[test]
    fn test_planar_center_pixel_depth() {
        let converter =
            PointCloudConverter::new(flat_metadata(2, 2), DepthKind::Planar).unwrap();
        // 1000 units at scale 1.0 = 1000 mm = 1 m along the axis.
        let map = vec![1000u16; 4];
        let mut cloud = Vec::new();
        converter.convert(&map, &mut cloud).unwrap();

        assert_eq!(cloud.len(), 4);
        for point in &cloud {
            assert!((point.z - 1.0).abs() < 1e-3);
        }
    }

    #[test]
    fn test_invalid_pixels_become_nan() {
        let converter =
            PointCloudConverter::new(flat_metadata(2, 2), DepthKind::Radial).unwrap();
        let map = vec![0u16, 500, 0xFFFF, 500];
        let mut cloud = Vec::new();
        converter.convert(&map, &mut cloud).unwrap();

        assert!(cloud[0].z.is_nan());
        assert!(!cloud[1].z.is_nan());
        assert!(cloud[2].x.is_nan());
        assert!(!cloud[3].z.is_nan());
    }

    #[test]
    fn test_radial_ray_length() {
        let converter =
            PointCloudConverter::new(flat_metadata(4, 4), DepthKind::Radial).unwrap();
        // With radial normalization every valid point lies at exactly
        // distance * scale from the origin (f2rc is zero here).
        let map = vec![2000u16; 16];
        let mut cloud = Vec::new();
        converter.convert(&map, &mut cloud).unwrap();

        for point in &cloud {
            let norm = (point.x * point.x + point.y * point.y + point.z * point.z).sqrt();
            assert!((norm - 2.0).abs() < 1e-3, "norm was {}", norm);
        }
    }

    #[test]
    fn test_world_transform_translates() {
        let converter =
            PointCloudConverter::new(flat_metadata(2, 2), DepthKind::Planar).unwrap();
        let mut cloud = vec![PointXYZ {
            x: 0.5,
            y: 0.25,
            z: 2.0,
        }];
        converter.transform_to_world(&mut cloud);
        // Identity rotation plus a 1 m x translation.
        assert!((cloud[0].x - 1.5).abs() < 1e-6);
        assert!((cloud[0].y - 0.25).abs() < 1e-6);
        assert!((cloud[0].z - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_map_size_mismatch_rejected() {
        let converter =
            PointCloudConverter::new(flat_metadata(2, 2), DepthKind::Planar).unwrap();
        let mut cloud = Vec::new();
        assert!(converter.convert(&[1, 2, 3], &mut cloud).is_err());
    }
}
