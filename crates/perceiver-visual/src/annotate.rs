//! Cursor highlighting for the screenshot sent to the model.

use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_circle_mut, draw_line_segment_mut};

use crate::errors::VisualError;
use crate::models::{CursorColor, CursorObservation};

const RING_RADIUS: i32 = 30;
const RING_THICKNESS: i32 = 3;
const CROSSHAIR_HALF: f32 = 40.0;
const JPEG_QUALITY: u8 = 90;

fn ring_color(color: CursorColor) -> Rgb<u8> {
    match color {
        CursorColor::Red => Rgb([255, 0, 0]),
        CursorColor::Green => Rgb([0, 200, 0]),
        CursorColor::Blue => Rgb([0, 0, 255]),
        CursorColor::NotFound | CursorColor::Unknown => Rgb([255, 200, 0]),
    }
}

/// Draw a highlight ring and crosshair around a detected cursor and return
/// the re-encoded JPEG. Missing cursors are rejected so callers keep the
/// original bytes.
pub fn annotate_cursor(screenshot: &[u8], cursor: &CursorObservation) -> Result<Vec<u8>, VisualError> {
    if !cursor.color.is_visible() {
        return Err(VisualError::InvalidInput(
            "no cursor to annotate".to_string(),
        ));
    }
    let mut canvas: RgbImage = image::load_from_memory(screenshot)?.to_rgb8();
    let color = ring_color(cursor.color);
    let (cx, cy) = (cursor.position.x, cursor.position.y);

    for offset in 0..RING_THICKNESS {
        draw_hollow_circle_mut(&mut canvas, (cx, cy), RING_RADIUS + offset, color);
    }
    let (fx, fy) = (cx as f32, cy as f32);
    for shift in [-1.0f32, 0.0, 1.0] {
        draw_line_segment_mut(
            &mut canvas,
            (fx - CROSSHAIR_HALF, fy + shift),
            (fx + CROSSHAIR_HALF, fy + shift),
            color,
        );
        draw_line_segment_mut(
            &mut canvas,
            (fx + shift, fy - CROSSHAIR_HALF),
            (fx + shift, fy + CROSSHAIR_HALF),
            color,
        );
    }

    let mut out = Vec::new();
    DynamicImage::ImageRgb8(canvas)
        .write_to(&mut std::io::Cursor::new(&mut out), ImageOutputFormat::Jpeg(JPEG_QUALITY))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Point;
    use image::{GenericImageView, ImageBuffer};

    fn blank_png() -> Vec<u8> {
        let img = ImageBuffer::from_pixel(200, 200, Rgb([255u8, 255, 255]));
        let mut buf = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_annotation_keeps_dimensions() {
        let cursor = CursorObservation::new(CursorColor::Green, Point::new(100, 100));
        let jpeg = annotate_cursor(&blank_png(), &cursor).unwrap();
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.dimensions(), (200, 200));
    }

    #[test]
    fn test_missing_cursor_is_rejected() {
        let cursor = CursorObservation::not_found(Point::new(100, 100));
        assert!(annotate_cursor(&blank_png(), &cursor).is_err());
    }
}
