//! Drawing rasterization and local inspection
//!
//! The judge only accepts images, so vector submissions are rendered onto a
//! white canvas and encoded as PNG. Raster submissions are decoded once to
//! count ink and re-encoded only when they are not already PNG.

use crate::error::GameError;
use crate::types::{DrawingData, Point, Stroke};
use image::{ImageFormat, ImageReader, Limits, Rgba, RgbaImage};
use std::io::Cursor;

/// Largest canvas side accepted
pub const MAX_CANVAS_SIDE: u32 = 4096;

/// Widest pen accepted, in pixels
pub const MAX_PEN_WIDTH: f32 = 64.0;

/// Rough wire size of one stroke point, used for the payload precondition
pub const POINT_WIRE_BYTES: usize = 8;

const INK: Rgba<u8> = Rgba([20, 20, 20, 255]);
const PAPER: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// A drawing ready to send to the judge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedDrawing {
    /// PNG bytes
    pub png: Vec<u8>,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Pixels counted as ink
    pub ink_pixels: u64,
}

/// Approximate submitted payload size without encoding anything
#[must_use]
pub fn payload_size(data: &DrawingData) -> usize {
    match data {
        DrawingData::Strokes { strokes, .. } => strokes
            .iter()
            .map(|s| s.points.len().saturating_mul(POINT_WIRE_BYTES))
            .sum(),
        DrawingData::Raster { bytes } => bytes.len(),
    }
}

/// Render or decode a drawing into PNG form
///
/// # Errors
/// `InvalidInput` for bad canvas sizes or undecodable raster data
pub fn encode(data: &DrawingData) -> Result<EncodedDrawing, GameError> {
    match data {
        DrawingData::Strokes {
            width,
            height,
            strokes,
        } => {
            let image = render_strokes(*width, *height, strokes)?;
            let ink_pixels = count_ink(&image);
            Ok(EncodedDrawing {
                png: encode_png(&image)?,
                width: *width,
                height: *height,
                ink_pixels,
            })
        }
        DrawingData::Raster { bytes } => {
            let format = image::guess_format(bytes)
                .map_err(|_| GameError::invalid("drawing is not a PNG or JPEG image"))?;
            let rgba = decode_bounded(bytes, format)?;
            let ink_pixels = count_ink(&rgba);
            let png = if format == ImageFormat::Png {
                bytes.clone()
            } else {
                encode_png(&rgba)?
            };
            Ok(EncodedDrawing {
                png,
                width: rgba.width(),
                height: rgba.height(),
                ink_pixels,
            })
        }
    }
}

/// Decode raster bytes, refusing images larger than [`MAX_CANVAS_SIDE`]
fn decode_bounded(bytes: &[u8], format: ImageFormat) -> Result<RgbaImage, GameError> {
    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_CANVAS_SIDE);
    limits.max_image_height = Some(MAX_CANVAS_SIDE);

    let mut reader = ImageReader::with_format(Cursor::new(bytes), format);
    reader.limits(limits);
    let decoded = reader.decode().map_err(|e| match e {
        image::ImageError::Limits(_) => GameError::invalid(format!(
            "image larger than {MAX_CANVAS_SIDE}x{MAX_CANVAS_SIDE}"
        )),
        e => GameError::invalid(format!("could not decode drawing: {e}")),
    })?;
    Ok(decoded.to_rgba8())
}

/// Render strokes onto a white canvas
///
/// # Errors
/// `InvalidInput` if the canvas is empty or larger than [`MAX_CANVAS_SIDE`],
/// or a pen is wider than [`MAX_PEN_WIDTH`]
pub fn render_strokes(width: u32, height: u32, strokes: &[Stroke]) -> Result<RgbaImage, GameError> {
    if width == 0 || height == 0 {
        return Err(GameError::invalid("canvas has zero size"));
    }
    if width > MAX_CANVAS_SIDE || height > MAX_CANVAS_SIDE {
        return Err(GameError::invalid(format!(
            "canvas larger than {MAX_CANVAS_SIDE}x{MAX_CANVAS_SIDE}"
        )));
    }

    if let Some(stroke) = strokes
        .iter()
        .find(|s| !s.width.is_finite() || s.width > MAX_PEN_WIDTH)
    {
        return Err(GameError::invalid(format!(
            "pen width {} exceeds {MAX_PEN_WIDTH}",
            stroke.width
        )));
    }

    let mut image = RgbaImage::from_pixel(width, height, PAPER);
    for stroke in strokes {
        let radius = (stroke.width.max(1.0)) / 2.0;
        match stroke.points.as_slice() {
            [] => {}
            [only] => stamp(&mut image, *only, radius),
            points => {
                for pair in points.windows(2) {
                    draw_segment(&mut image, pair[0], pair[1], radius);
                }
            }
        }
    }
    Ok(image)
}

/// Count ink pixels: opaque and darker than near-white
#[must_use]
pub fn count_ink(image: &RgbaImage) -> u64 {
    let count = image
        .pixels()
        .filter(|p| {
            let [r, g, b, a] = p.0;
            a >= 128 && u16::from(r) + u16::from(g) + u16::from(b) < 750
        })
        .count();
    count as u64
}

fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, GameError> {
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| GameError::invalid(format!("could not encode drawing: {e}")))?;
    Ok(buf)
}

/// Clamp a point to the canvas, leaving room for the pen
fn clamp_to_canvas(point: Point, width: u32, height: u32, radius: f32) -> Point {
    Point::new(
        point.x.clamp(-radius, width as f32 + radius),
        point.y.clamp(-radius, height as f32 + radius),
    )
}

fn draw_segment(image: &mut RgbaImage, from: Point, to: Point, radius: f32) {
    if !(from.x.is_finite() && from.y.is_finite() && to.x.is_finite() && to.y.is_finite()) {
        return;
    }
    let (width, height) = image.dimensions();
    let from = clamp_to_canvas(from, width, height, radius);
    let to = clamp_to_canvas(to, width, height, radius);
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let length = (dx * dx + dy * dy).sqrt();
    let max_steps = 2 * (width + height);
    let steps = ((length / 0.5).ceil().max(1.0) as u32).min(max_steps);
    for i in 0..=steps {
        let t = i as f32 / steps as f32;
        stamp(image, Point::new(from.x + dx * t, from.y + dy * t), radius);
    }
}

fn stamp(image: &mut RgbaImage, center: Point, radius: f32) {
    if !center.x.is_finite() || !center.y.is_finite() {
        return;
    }
    let (width, height) = image.dimensions();
    let min_x = (center.x - radius).floor().max(0.0) as u32;
    let min_y = (center.y - radius).floor().max(0.0) as u32;
    let max_x = ((center.x + radius).ceil().max(0.0) as u32).min(width.saturating_sub(1));
    let max_y = ((center.y + radius).ceil().max(0.0) as u32).min(height.saturating_sub(1));
    if min_x > max_x || min_y > max_y {
        return;
    }
    let r2 = radius * radius;
    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let px = x as f32 + 0.5 - center.x;
            let py = y as f32 + 0.5 - center.y;
            if px * px + py * py <= r2 + 0.25 {
                image.put_pixel(x, y, INK);
            }
        }
    }
}
