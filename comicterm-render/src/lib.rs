//! Page raster preparation: decode, fit-and-zoom scaling, pan clamping and
//! cropping to the viewport, plus the glyph-ramp fallback for terminals
//! without graphics support.

use anyhow::{Context, Result};
use comicterm_core::PageImage;
use image::imageops::FilterType;
use tracing::debug;

/// Dark-to-light glyph ramp for text rendering. Brightness maps linearly
/// onto the ramp index.
const GLYPH_RAMP: &[u8] =
    br#" .'`^",:;Il!i><~+_-?][}{1)(|/tfjrxnuvczXYUJCLQ0OZmwqpdbkhao*#MW&8%B@$"#;

/// The crop of a scaled page that fits the viewport, together with the pan
/// offsets that were actually honored after clamping.
pub struct VisibleRegion {
    pub image: PageImage,
    pub pan_x: i32,
    pub pan_y: i32,
}

/// Decodes a page and produces the viewport-sized crop for it.
///
/// The page is scaled uniformly so it fits `target_w` x `target_h` at zoom
/// 1.0, then multiplied by `zoom`. Pan offsets are clamped so the crop never
/// extends past the scaled image; the clamped values are returned so the
/// caller can write them back into its view state.
pub fn compute_visible_region(
    bytes: &[u8],
    target_w: u32,
    target_h: u32,
    zoom: f32,
    pan_x: i32,
    pan_y: i32,
) -> Result<VisibleRegion> {
    let decoded = image::load_from_memory(bytes)
        .context("failed to decode page image")?
        .to_rgb8();
    let (w, h) = decoded.dimensions();

    let scale = (target_w as f32 / w as f32).min(target_h as f32 / h as f32) * zoom;
    let new_w = ((w as f32 * scale) as u32).max(1);
    let new_h = ((h as f32 * scale) as u32).max(1);

    let max_pan_x = new_w.saturating_sub(target_w) as i32;
    let max_pan_y = new_h.saturating_sub(target_h) as i32;
    let pan_x = pan_x.clamp(-max_pan_x, 0);
    let pan_y = pan_y.clamp(-max_pan_y, 0);

    let scaled = image::imageops::resize(&decoded, new_w, new_h, FilterType::Triangle);

    let crop_x = pan_x.unsigned_abs();
    let crop_y = pan_y.unsigned_abs();
    let crop_w = (new_w - crop_x).min(target_w);
    let crop_h = (new_h - crop_y).min(target_h);
    let cropped = image::imageops::crop_imm(&scaled, crop_x, crop_y, crop_w, crop_h).to_image();

    debug!(
        src_w = w,
        src_h = h,
        crop_w,
        crop_h,
        zoom,
        "prepared visible region"
    );

    Ok(VisibleRegion {
        image: PageImage {
            width: crop_w,
            height: crop_h,
            pixels: cropped.into_raw(),
        },
        pan_x,
        pan_y,
    })
}

/// Renders a page as lines of ramp glyphs sized for a `cols` x `rows`
/// terminal. The output leaves a margin for the status line and caps at
/// 80x40 glyphs.
pub fn text_art(bytes: &[u8], cols: u16, rows: u16) -> Result<Vec<String>> {
    let decoded = image::load_from_memory(bytes)
        .context("failed to decode page image")?
        .to_luma8();

    let target_w = u32::from(cols.saturating_sub(4)).clamp(1, 80);
    let target_h = u32::from(rows.saturating_sub(4)).clamp(1, 40);
    let resized = image::imageops::resize(&decoded, target_w, target_h, FilterType::Triangle);

    let ramp_max = (GLYPH_RAMP.len() - 1) as u32;
    let mut lines = Vec::with_capacity(target_h as usize);
    for row in resized.rows() {
        let line: String = row
            .map(|px| {
                let idx = (u32::from(px.0[0]) * ramp_max) / 255;
                GLYPH_RAMP[idx as usize] as char
            })
            .collect();
        lines.push(line);
    }
    Ok(lines)
}
