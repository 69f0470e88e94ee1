use chrono::NaiveDateTime;
use image::{Rgb, RgbImage};

use super::compress::encode_jpeg;
use super::font::{self, GLYPH_HEIGHT};
use super::PhotoError;

pub const TIMESTAMP_FORMAT: &str = "%d %b %Y %H:%M";
const NO_POSITION: &str = "Location unavailable";
const ELLIPSIS: &str = "...";

const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const INFO_BOX_ALPHA: f32 = 0.55;
const BRAND_BOX_ALPHA: f32 = 0.5;
/// Glyph height as a share of image width.
const TEXT_HEIGHT_RATIO: f32 = 0.025;

/// Provenance lines burned into a photo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatermarkText {
    pub location_name: String,
    /// Capture time on the facility clock (configured offset, else host timezone).
    pub captured_at: NaiveDateTime,
    /// Resolved address or formatted coordinates.
    pub position_line: Option<String>,
    pub brand: String,
}

impl WatermarkText {
    /// Info block lines, top to bottom.
    pub fn lines(&self) -> [String; 3] {
        [
            self.location_name.clone(),
            self.captured_at.format(TIMESTAMP_FORMAT).to_string(),
            self.position_line
                .clone()
                .unwrap_or_else(|| NO_POSITION.to_string()),
        ]
    }
}

/// The drawing surface reused across every watermark in a batch.
#[derive(Debug)]
pub struct WatermarkCanvas {
    surface: RgbImage,
    quality: u8,
}

impl WatermarkCanvas {
    pub fn new(quality: u8) -> Self {
        Self {
            surface: RgbImage::new(0, 0),
            quality,
        }
    }

    /// Renders `photo` onto the surface, overlays the info block bottom-left
    /// and the brand label top-right, and re-encodes as JPEG.
    pub fn compose(&mut self, photo: &[u8], text: &WatermarkText) -> Result<Vec<u8>, PhotoError> {
        if photo.is_empty() {
            return Err(PhotoError::Empty);
        }
        self.surface = image::load_from_memory(photo)
            .map_err(PhotoError::Decode)?
            .into_rgb8();

        let layout = Layout::for_width(self.surface.width());
        self.draw_info_block(&layout, &text.lines());
        self.draw_brand_label(&layout, &text.brand);

        encode_jpeg(&self.surface, self.quality)
    }

    fn draw_info_block(&mut self, layout: &Layout, lines: &[String; 3]) {
        let (width, height) = self.surface.dimensions();
        let scale = layout.scale;
        let max_text = width.saturating_sub(2 * (layout.margin + layout.padding));
        let lines: Vec<String> = lines
            .iter()
            .map(|line| truncate_to_width(line, max_text, scale))
            .collect();

        let line_height = GLYPH_HEIGHT * scale;
        let text_width = lines
            .iter()
            .map(|line| font::text_width(line, scale))
            .max()
            .unwrap_or(0);
        let box_width = text_width + 2 * layout.padding;
        let box_height =
            lines.len() as u32 * line_height + (lines.len() as u32 - 1) * layout.line_gap + 2 * layout.padding;

        let x = layout.margin;
        let y = height.saturating_sub(layout.margin + box_height);
        blend_rect(&mut self.surface, x, y, box_width, box_height, INFO_BOX_ALPHA);

        let mut cursor = y + layout.padding;
        for line in &lines {
            font::draw_text(&mut self.surface, x + layout.padding, cursor, line, scale, TEXT_COLOR);
            cursor += line_height + layout.line_gap;
        }
    }

    fn draw_brand_label(&mut self, layout: &Layout, brand: &str) {
        if brand.trim().is_empty() {
            return;
        }
        let width = self.surface.width();
        let scale = layout.brand_scale;
        let padding = 3 * scale;
        let max_text = width.saturating_sub(2 * (layout.margin + padding));
        let label = truncate_to_width(brand, max_text, scale);

        let box_width = font::text_width(&label, scale) + 2 * padding;
        let box_height = GLYPH_HEIGHT * scale + 2 * padding;
        let x = width.saturating_sub(layout.margin + box_width);
        let y = layout.margin;
        blend_rect(&mut self.surface, x, y, box_width, box_height, BRAND_BOX_ALPHA);
        font::draw_text(&mut self.surface, x + padding, y + padding, &label, scale, TEXT_COLOR);
    }
}

/// Pixel metrics derived from image width so text stays legible at any size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Layout {
    scale: u32,
    brand_scale: u32,
    margin: u32,
    padding: u32,
    line_gap: u32,
}

impl Layout {
    fn for_width(width: u32) -> Self {
        let scale = ((width as f32 * TEXT_HEIGHT_RATIO) / GLYPH_HEIGHT as f32)
            .round()
            .max(1.0) as u32;
        Self {
            scale,
            brand_scale: (scale * 3 / 4).max(1),
            margin: 2 * scale,
            padding: 3 * scale,
            line_gap: 3 * scale,
        }
    }
}

fn truncate_to_width(text: &str, max_width: u32, scale: u32) -> String {
    if font::text_width(text, scale) <= max_width {
        return text.to_string();
    }
    let mut kept = String::new();
    for c in text.chars() {
        let candidate = format!("{kept}{c}{ELLIPSIS}");
        if font::text_width(&candidate, scale) > max_width {
            break;
        }
        kept.push(c);
    }
    format!("{}{ELLIPSIS}", kept.trim_end())
}

/// Darkens a rectangle towards black, clipped to the image.
fn blend_rect(image: &mut RgbImage, x: u32, y: u32, width: u32, height: u32, alpha: f32) {
    let (image_width, image_height) = image.dimensions();
    let x_end = x.saturating_add(width).min(image_width);
    let y_end = y.saturating_add(height).min(image_height);
    let keep = 1.0 - alpha.clamp(0.0, 1.0);

    for py in y..y_end {
        for px in x..x_end {
            let pixel = image.get_pixel_mut(px, py);
            for channel in pixel.0.iter_mut() {
                *channel = (f32::from(*channel) * keep).round() as u8;
            }
        }
    }
}
