// CPU rendering module
// Paints the current image into an ARGB8888 shared-memory canvas

use crate::geometry::Rect;
use crate::image_loader::{ImageData, LevelRef};

/// Opaque black in BGRA byte order
const BACKGROUND: [u8; 4] = [0, 0, 0, 255];

/// Largest surface either backend paints, per side
pub const MAX_SURFACE_SIZE: u32 = 4096;

/// Clamp a window size to what gets painted. The view is laid out for this
/// size too, so the image stays centered in what is actually drawn.
pub fn surface_size(width: u32, height: u32) -> (u32, u32) {
    (width.clamp(1, MAX_SURFACE_SIZE), height.clamp(1, MAX_SURFACE_SIZE))
}

/// Source column/row lookup for one destination pixel
#[derive(Debug, Clone, Copy)]
struct Sample {
    i0: u32,
    i1: u32,
    frac: f32,
}

/// Clear the canvas to black and draw `image` into `dest`.
///
/// Sampling is bilinear from the mip level closest to (but not below) the
/// displayed size. Pixels are composited over the black background, so the
/// output is fully opaque. Parts of `dest` outside the canvas are clipped.
pub fn render_frame(canvas: &mut [u8], width: u32, height: u32, image: Option<&ImageData>, dest: Rect) {
    for pixel in canvas.chunks_exact_mut(4) {
        pixel.copy_from_slice(&BACKGROUND);
    }

    let Some(image) = image else {
        return;
    };
    if dest.is_empty() {
        return;
    }

    let level = image.level_for_width(dest.width);
    let columns = sample_axis(dest.x, dest.width, level.width, width);
    let rows = sample_axis(dest.y, dest.height, level.height, height);

    for (y, row) in rows {
        let dst_row = (y * width * 4) as usize;
        for &(x, col) in &columns {
            let dst_idx = dst_row + (x * 4) as usize;
            if dst_idx + 3 < canvas.len() {
                let px = bilinear(&level, col, row);
                canvas[dst_idx..dst_idx + 4].copy_from_slice(&over_black(px));
            }
        }
    }
}

/// Map each destination pixel along one axis that falls inside the
/// destination span to its source sample position.
fn sample_axis(start: f32, extent: f32, src_len: u32, dst_len: u32) -> Vec<(u32, Sample)> {
    let first = start.floor().max(0.0) as u32;
    let last = (start + extent).ceil().clamp(0.0, dst_len as f32) as u32;
    let scale = src_len as f32 / extent;
    let max_index = (src_len - 1) as f32;

    (first..last)
        .filter_map(|i| {
            let center = i as f32 + 0.5;
            if center < start || center >= start + extent {
                return None;
            }
            let src = ((center - start) * scale - 0.5).clamp(0.0, max_index);
            let i0 = src.floor() as u32;
            Some((
                i,
                Sample {
                    i0,
                    i1: (i0 + 1).min(src_len - 1),
                    frac: src - i0 as f32,
                },
            ))
        })
        .collect()
}

fn bilinear(level: &LevelRef<'_>, col: Sample, row: Sample) -> [u8; 4] {
    let get_pixel = |px: u32, py: u32| -> [f32; 4] {
        let idx = ((py * level.width + px) * 4) as usize;
        match level.data.get(idx..idx + 4) {
            Some(p) => [p[0] as f32, p[1] as f32, p[2] as f32, p[3] as f32],
            None => [0.0; 4],
        }
    };

    let p00 = get_pixel(col.i0, row.i0);
    let p10 = get_pixel(col.i1, row.i0);
    let p01 = get_pixel(col.i0, row.i1);
    let p11 = get_pixel(col.i1, row.i1);

    let mut out = [0u8; 4];
    for (c, value) in out.iter_mut().enumerate() {
        let v0 = p00[c] * (1.0 - col.frac) + p10[c] * col.frac;
        let v1 = p01[c] * (1.0 - col.frac) + p11[c] * col.frac;
        let v = v0 * (1.0 - row.frac) + v1 * row.frac;
        *value = v.round().clamp(0.0, 255.0) as u8;
    }
    out
}

fn over_black(px: [u8; 4]) -> [u8; 4] {
    let alpha = px[3] as u32;
    let scale = |c: u8| ((c as u32 * alpha + 127) / 255) as u8;
    [scale(px[0]), scale(px[1]), scale(px[2]), 255]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, bgra: [u8; 4]) -> ImageData {
        let data = bgra.repeat((width * height) as usize);
        ImageData::from_bgra(width, height, data)
    }

    fn pixel(canvas: &[u8], width: u32, x: u32, y: u32) -> [u8; 4] {
        let idx = ((y * width + x) * 4) as usize;
        canvas[idx..idx + 4].try_into().unwrap()
    }

    #[test]
    fn surface_size_clamps_both_sides() {
        assert_eq!(surface_size(800, 600), (800, 600));
        assert_eq!(surface_size(5120, 1440), (MAX_SURFACE_SIZE, 1440));
        assert_eq!(surface_size(0, 9000), (1, MAX_SURFACE_SIZE));
    }

    #[test]
    fn empty_viewer_is_black() {
        let mut canvas = vec![7u8; 4 * 4 * 4];
        render_frame(&mut canvas, 4, 4, None, Rect::default());
        assert!(canvas.chunks_exact(4).all(|p| p == BACKGROUND));
    }

    #[test]
    fn image_lands_inside_dest_rect_only() {
        let img = solid(2, 2, [0, 0, 255, 255]);
        let mut canvas = vec![0u8; 10 * 10 * 4];
        render_frame(&mut canvas, 10, 10, Some(&img), Rect::new(2.0, 3.0, 4.0, 4.0));

        assert_eq!(pixel(&canvas, 10, 2, 3), [0, 0, 255, 255]);
        assert_eq!(pixel(&canvas, 10, 5, 6), [0, 0, 255, 255]);
        assert_eq!(pixel(&canvas, 10, 1, 3), BACKGROUND);
        assert_eq!(pixel(&canvas, 10, 6, 3), BACKGROUND);
        assert_eq!(pixel(&canvas, 10, 2, 7), BACKGROUND);
    }

    #[test]
    fn offscreen_parts_are_clipped() {
        let img = solid(4, 4, [255, 255, 255, 255]);
        let mut canvas = vec![0u8; 8 * 8 * 4];
        render_frame(&mut canvas, 8, 8, Some(&img), Rect::new(-20.0, -20.0, 24.0, 24.0));

        assert_eq!(pixel(&canvas, 8, 0, 0), [255, 255, 255, 255]);
        assert_eq!(pixel(&canvas, 8, 3, 3), [255, 255, 255, 255]);
        assert_eq!(pixel(&canvas, 8, 4, 4), BACKGROUND);
    }

    #[test]
    fn fully_offscreen_draws_nothing() {
        let img = solid(4, 4, [255, 255, 255, 255]);
        let mut canvas = vec![0u8; 8 * 8 * 4];
        render_frame(&mut canvas, 8, 8, Some(&img), Rect::new(100.0, 100.0, 10.0, 10.0));
        assert!(canvas.chunks_exact(4).all(|p| p == BACKGROUND));
    }

    #[test]
    fn translucent_pixels_blend_over_black() {
        let img = solid(1, 1, [200, 100, 50, 128]);
        let mut canvas = vec![0u8; 4];
        render_frame(&mut canvas, 1, 1, Some(&img), Rect::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(pixel(&canvas, 1, 0, 0), [100, 50, 25, 255]);
    }

    #[test]
    fn upscaling_interpolates_between_pixels() {
        // Two columns: black then white, stretched to 4 pixels
        let img = ImageData::from_bgra(2, 1, vec![0, 0, 0, 255, 255, 255, 255, 255]);
        let mut canvas = vec![0u8; 4 * 4];
        render_frame(&mut canvas, 4, 1, Some(&img), Rect::new(0.0, 0.0, 4.0, 1.0));

        let reds: Vec<u8> = (0..4).map(|x| pixel(&canvas, 4, x, 0)[2]).collect();
        assert_eq!(reds[0], 0);
        assert_eq!(reds[3], 255);
        assert!(reds[1] > 0 && reds[1] < reds[2] && reds[2] < 255, "{reds:?}");
    }

    #[test]
    fn large_downscale_reads_from_mip_chain() {
        let img = solid(512, 512, [10, 20, 30, 255]);
        assert!(!img.mipmaps.is_empty());
        let mut canvas = vec![0u8; 64 * 64 * 4];
        render_frame(&mut canvas, 64, 64, Some(&img), Rect::new(0.0, 0.0, 64.0, 64.0));
        assert_eq!(pixel(&canvas, 64, 31, 31), [10, 20, 30, 255]);
    }
}
