//! Fixed-pitch text layout and blank page rasterizing shared by the built-in
//! backends

use crate::document::{Rect, Surface};
use image::Rgba;

const MARGIN: f64 = 36.0;
const LINE_HEIGHT: f64 = 14.0;
const GLYPH_WIDTH: f64 = 7.0;

/// Areas of the lines of `text`, top to bottom
pub(crate) fn line_rects<'a>(text: &'a str) -> impl Iterator<Item = (Rect, &'a str)> + 'a {
    text.lines().enumerate().map(|(row, line)| {
        let y1 = MARGIN + row as f64 * LINE_HEIGHT;
        let width = line.chars().count() as f64 * GLYPH_WIDTH;
        (Rect::new(MARGIN, y1, MARGIN + width, y1 + LINE_HEIGHT), line)
    })
}

/// Areas of every occurrence of `needle` in `text`
pub(crate) fn find_matches(text: &str, needle: &str, case_sensitive: bool) -> Vec<Rect> {
    if needle.is_empty() {
        return Vec::new();
    }

    let needle = if case_sensitive {
        needle.to_string()
    } else {
        needle.to_lowercase()
    };
    let needle_width = needle.chars().count() as f64 * GLYPH_WIDTH;

    let mut matches = Vec::new();
    for (area, line) in line_rects(text) {
        let haystack = if case_sensitive {
            line.to_string()
        } else {
            line.to_lowercase()
        };
        for (offset, _) in haystack.match_indices(&needle) {
            let column = haystack[..offset].chars().count() as f64;
            let x1 = area.x1 + column * GLYPH_WIDTH;
            matches.push(Rect::new(x1, area.y1, x1 + needle_width, area.y2));
        }
    }
    matches
}

/// White page with a light gray frame
pub(crate) fn blank_page(width: u32, height: u32) -> Surface {
    let mut image = Surface::from_pixel(width, height, Rgba([255, 255, 255, 255]));

    if width >= 4 && height >= 4 {
        draw_border(&mut image, Rgba([220, 220, 220, 255]));
    }

    image
}

pub(crate) fn draw_border(image: &mut Surface, color: Rgba<u8>) {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return;
    }
    for x in 0..width {
        image.put_pixel(x, 0, color);
        image.put_pixel(x, height - 1, color);
    }
    for y in 0..height {
        image.put_pixel(0, y, color);
        image.put_pixel(width - 1, y, color);
    }
}
