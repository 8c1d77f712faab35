// Image loading module
// Decodes image files or raw bytes into display-ready pixel buffers

use crate::geometry::Size;
use image::DynamicImage;
use log::debug;
use std::fs;
use std::io::{self, Cursor};
use std::path::Path;
use thiserror::Error;

/// Reasons an image could not be turned into an [`ImageData`]
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("File not found: {}", .0.display())]
    NotFound(std::path::PathBuf),

    #[error("Failed to read image file: {0}")]
    Read(#[from] io::Error),

    #[error("Unrecognized image format")]
    UnknownFormat,

    #[error("Failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("Image has no pixels")]
    Empty,
}

/// Decoded image ready for display
#[derive(Debug, Clone)]
pub struct ImageData {
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Pixel data, BGRA order (ARGB8888 little-endian, what wl_shm expects)
    pub bgra_data: Vec<u8>,
    /// Progressively half-sized versions for filtered downscaling
    pub mipmaps: Vec<MipmapLevel>,
}

/// A single mipmap level
#[derive(Debug, Clone)]
pub struct MipmapLevel {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// Borrowed view of one level of the mip chain (level 0 is the full image)
#[derive(Debug, Clone, Copy)]
pub struct LevelRef<'a> {
    pub width: u32,
    pub height: u32,
    pub data: &'a [u8],
}

impl ImageData {
    /// Build from tightly packed BGRA pixels, generating the mip chain
    pub fn from_bgra(width: u32, height: u32, bgra_data: Vec<u8>) -> Self {
        let mipmaps = generate_mipmaps(width, height, &bgra_data);
        Self {
            width,
            height,
            bgra_data,
            mipmaps,
        }
    }

    /// Natural pixel size
    pub fn size(&self) -> Size {
        Size::from((self.width, self.height))
    }

    /// All levels, full resolution first
    pub fn levels(&self) -> impl Iterator<Item = LevelRef<'_>> {
        std::iter::once(LevelRef {
            width: self.width,
            height: self.height,
            data: &self.bgra_data,
        })
        .chain(self.mipmaps.iter().map(|m| LevelRef {
            width: m.width,
            height: m.height,
            data: &m.data,
        }))
    }

    /// Pick the smallest level that is still at least as wide as the target,
    /// so downscaling never samples below the displayed resolution.
    pub fn level_for_width(&self, target_width: f32) -> LevelRef<'_> {
        let mut best = LevelRef {
            width: self.width,
            height: self.height,
            data: &self.bgra_data,
        };
        for level in self.levels().skip(1) {
            if (level.width as f32) < target_width {
                break;
            }
            best = level;
        }
        best
    }
}

/// Decode an image file from disk
pub fn decode_file(path: &Path) -> Result<ImageData, DecodeError> {
    if !path.exists() {
        return Err(DecodeError::NotFound(path.to_path_buf()));
    }
    let data = fs::read(path)?;
    debug!("Read {} bytes from {}", data.len(), path.display());
    decode_bytes(&data)
}

/// Decode an image from raw bytes, auto-detecting the format
pub fn decode_bytes(data: &[u8]) -> Result<ImageData, DecodeError> {
    let img = load_from_bytes(data)?;

    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    if width == 0 || height == 0 {
        return Err(DecodeError::Empty);
    }

    // Convert RGBA to BGRA (Wayland expects ARGB/BGRA in little-endian)
    let mut bgra_data = rgba.into_raw();
    for pixel in bgra_data.chunks_exact_mut(4) {
        pixel.swap(0, 2);
    }

    Ok(ImageData::from_bgra(width, height, bgra_data))
}

fn load_from_bytes(data: &[u8]) -> Result<DynamicImage, DecodeError> {
    let format = image::guess_format(data).map_err(|_| DecodeError::UnknownFormat)?;
    image::load(Cursor::new(data), format).map_err(DecodeError::Decode)
}

/// Generate mipmap levels (progressively half-sized versions)
fn generate_mipmaps(width: u32, height: u32, data: &[u8]) -> Vec<MipmapLevel> {
    let mut mipmaps: Vec<MipmapLevel> = Vec::new();
    let mut current_width = width;
    let mut current_height = height;

    // Generate up to 8 levels or until size is too small
    while current_width > 64 && current_height > 64 && mipmaps.len() < 8 {
        let next_width = current_width / 2;
        let next_height = current_height / 2;

        if next_width < 32 || next_height < 32 {
            break;
        }

        let src = mipmaps.last().map_or(data, |m| &m.data[..]);
        let next_data = downsample(src, current_width, current_height, next_width, next_height);

        mipmaps.push(MipmapLevel {
            width: next_width,
            height: next_height,
            data: next_data,
        });

        current_width = next_width;
        current_height = next_height;
    }

    mipmaps
}

/// Box filter (2x2 average), clamping at the right/bottom edge
fn downsample(src: &[u8], width: u32, height: u32, next_width: u32, next_height: u32) -> Vec<u8> {
    let mut out = vec![0u8; (next_width * next_height * 4) as usize];

    for y in 0..next_height {
        for x in 0..next_width {
            let mut sum = [0u32; 4];
            for dy in 0..2 {
                for dx in 0..2 {
                    let sx = (x * 2 + dx).min(width - 1);
                    let sy = (y * 2 + dy).min(height - 1);
                    let idx = ((sy * width + sx) * 4) as usize;
                    for (c, acc) in sum.iter_mut().enumerate() {
                        *acc += src[idx + c] as u32;
                    }
                }
            }

            let dst_idx = ((y * next_width + x) * 4) as usize;
            for (c, acc) in sum.iter().enumerate() {
                out[dst_idx + c] = (acc / 4) as u8;
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use tempfile::tempdir;

    fn png_bytes(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba(color));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn decodes_png_bytes_into_bgra() {
        let img = decode_bytes(&png_bytes(3, 2, [10, 20, 30, 255])).unwrap();
        assert_eq!((img.width, img.height), (3, 2));
        assert_eq!(img.bgra_data.len(), 3 * 2 * 4);
        assert_eq!(&img.bgra_data[..4], &[30, 20, 10, 255]);
        assert!(img.mipmaps.is_empty());
    }

    #[test]
    fn decodes_file_from_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pic.png");
        fs::write(&path, png_bytes(4, 4, [0, 0, 0, 255])).unwrap();
        let img = decode_file(&path).unwrap();
        assert_eq!(img.size(), Size::new(4.0, 4.0));
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempdir().unwrap();
        let err = decode_file(&dir.path().join("nope.png")).unwrap_err();
        assert!(matches!(err, DecodeError::NotFound(_)));
        assert!(err.to_string().contains("nope.png"));
    }

    #[test]
    fn garbage_bytes_are_rejected() {
        let err = decode_bytes(b"definitely not an image").unwrap_err();
        assert!(matches!(err, DecodeError::UnknownFormat));
    }

    #[test]
    fn truncated_png_fails_to_decode() {
        let bytes = png_bytes(16, 16, [1, 2, 3, 4]);
        let err = decode_bytes(&bytes[..bytes.len() / 2]).unwrap_err();
        assert!(matches!(err, DecodeError::Decode(_)));
    }

    #[test]
    fn mip_chain_halves_until_small() {
        let img = ImageData::from_bgra(256, 128, vec![200; 256 * 128 * 4]);
        let sizes: Vec<_> = img.mipmaps.iter().map(|m| (m.width, m.height)).collect();
        assert_eq!(sizes, vec![(128, 64)]);
        assert!(img.mipmaps[0].data.iter().all(|&b| b == 200));
    }

    #[test]
    fn level_selection_never_goes_below_target() {
        let img = ImageData::from_bgra(1024, 1024, vec![0; 1024 * 1024 * 4]);
        assert_eq!(img.level_for_width(2000.0).width, 1024);
        assert_eq!(img.level_for_width(1024.0).width, 1024);
        assert_eq!(img.level_for_width(300.0).width, 512);
        assert_eq!(img.level_for_width(256.0).width, 256);
        assert_eq!(img.level_for_width(1.0).width, 64);
    }
}
