// Raw elevation grid decoded from a single-channel heightmap image.

use std::path::Path;

use log::info;

use super::error::TerrainError;

/// Row-major elevation samples, already multiplied by the height scale.
///
/// Immutable after construction. Both dimensions are at least 2 so every
/// sample belongs to at least one grid cell.
#[derive(Debug, Clone)]
pub struct Heightfield {
    width: u32,
    height: u32,
    samples: Vec<f32>,
}

impl Heightfield {
    /// Decode an image file and reduce it to 8-bit luminance.
    /// Each luminance byte becomes one elevation sample.
    pub fn load(path: &Path, height_scale: f32) -> Result<Self, TerrainError> {
        let img = image::open(path).map_err(|source| TerrainError::ImageDecode {
            path: path.to_path_buf(),
            source,
        })?;

        let gray = img.into_luma8();
        let (width, height) = gray.dimensions();
        let field = Self::from_luma8(width, height, gray.as_raw(), height_scale)?;

        info!(
            "Loaded heightmap {:?}: {}x{} samples, max elevation {:.2}",
            path,
            width,
            height,
            field.max_elevation()
        );
        Ok(field)
    }

    /// Build from 8-bit samples: each byte maps to `byte / 255 * height_scale`.
    pub fn from_luma8(
        width: u32,
        height: u32,
        bytes: &[u8],
        height_scale: f32,
    ) -> Result<Self, TerrainError> {
        let samples = bytes
            .iter()
            .map(|&b| b as f32 / 255.0 * height_scale)
            .collect();
        Self::from_samples(width, height, samples)
    }

    /// Build from elevations that are already in world units.
    pub fn from_samples(width: u32, height: u32, samples: Vec<f32>) -> Result<Self, TerrainError> {
        if width < 2 || height < 2 {
            return Err(TerrainError::GridTooSmall { width, height });
        }
        let expected = (width as usize) * (height as usize);
        if samples.len() != expected {
            return Err(TerrainError::SampleCount {
                expected,
                actual: samples.len(),
            });
        }
        Ok(Self { width, height, samples })
    }

    pub fn width(&self) -> u32 { self.width }
    pub fn height(&self) -> u32 { self.height }

    /// Elevation at integer grid coordinates. Caller guarantees bounds.
    #[inline]
    pub fn get(&self, x: u32, z: u32) -> f32 {
        self.samples[(z * self.width + x) as usize]
    }

    /// Largest sample; 0.0 for an all-flat field.
    pub fn max_elevation(&self) -> f32 {
        self.samples.iter().copied().fold(0.0, f32::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_are_normalized_then_scaled() {
        let field = Heightfield::from_luma8(2, 2, &[0, 51, 255, 102], 10.0).unwrap();
        assert_eq!(field.get(0, 0), 0.0);
        assert!((field.get(1, 0) - 2.0).abs() < 1e-5);
        assert!((field.get(0, 1) - 10.0).abs() < 1e-5);
        assert!((field.get(1, 1) - 4.0).abs() < 1e-5);
        assert!((field.max_elevation() - 10.0).abs() < 1e-5);
    }

    #[test]
    fn rejects_degenerate_grids() {
        assert!(matches!(
            Heightfield::from_samples(1, 4, vec![0.0; 4]),
            Err(TerrainError::GridTooSmall { width: 1, height: 4 })
        ));
        assert!(matches!(
            Heightfield::from_samples(3, 3, vec![0.0; 8]),
            Err(TerrainError::SampleCount { expected: 9, actual: 8 })
        ));
    }

    #[test]
    fn load_decodes_png_luminance() {
        let path = std::env::temp_dir().join(format!("heightfield_{}.png", std::process::id()));
        let img = image::GrayImage::from_raw(3, 2, vec![0, 255, 0, 0, 0, 255]).unwrap();
        img.save(&path).unwrap();

        let field = Heightfield::load(&path, 5.0).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!((field.width(), field.height()), (3, 2));
        assert!((field.get(1, 0) - 5.0).abs() < 1e-5);
        assert!((field.get(2, 1) - 5.0).abs() < 1e-5);
        assert_eq!(field.get(0, 1), 0.0);
    }

    #[test]
    fn load_reports_decode_failure() {
        let path = std::env::temp_dir().join(format!("not_an_image_{}.png", std::process::id()));
        std::fs::write(&path, b"definitely not a png").unwrap();

        let result = Heightfield::load(&path, 1.0);
        std::fs::remove_file(&path).ok();

        assert!(matches!(result, Err(TerrainError::ImageDecode { .. })));
    }
}
