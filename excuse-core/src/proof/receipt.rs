//! Informal receipt-style PNG for non-document proof kinds.
//!
//! Unlike the certificate, the receipt prints the excuse verbatim. The exact
//! string is also stored in an iTXt chunk so it survives rasterization.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use ::image::{Rgb, RgbImage};
use font8x8::{UnicodeFonts, BASIC_FONTS};

use super::{wrap_words, ProofError};
use crate::models::ProofKind;

pub const WIDTH: u32 = 500;
pub const HEIGHT: u32 = 300;
pub const HEADER_HEIGHT: u32 = 40;

/// iTXt keyword holding the verbatim excuse.
pub const TEXT_KEYWORD: &str = "Description";

const HEADER_COLOR: Rgb<u8> = Rgb([30, 144, 255]);
const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

const BORDER_INSET: u32 = 5;
const BORDER_WIDTH: u32 = 2;
const GLYPH_SIZE: u32 = 8;
const TEXT_LEFT: u32 = 20;
const TEXT_TOP: u32 = 60;
const LINE_SPACING: u32 = 4;

pub fn render(excuse_text: &str, kind: ProofKind, path: &Path) -> Result<(), ProofError> {
    let canvas = paint(excuse_text, kind);
    write_png(&canvas, excuse_text, path)
}

/// Paint the receipt: header bar with title, border, then the wrapped excuse.
pub fn paint(excuse_text: &str, kind: ProofKind) -> RgbImage {
    let mut canvas = RgbImage::from_pixel(WIDTH, HEIGHT, WHITE);

    fill_rect(&mut canvas, 0, 0, WIDTH, HEADER_HEIGHT, HEADER_COLOR);
    draw_text(&mut canvas, 10, 16, &format!("{} Proof", kind.label()), WHITE);

    for t in 0..BORDER_WIDTH {
        let (x0, y0) = (BORDER_INSET + t, BORDER_INSET + t);
        let (x1, y1) = (WIDTH - BORDER_INSET - t, HEIGHT - BORDER_INSET - t);
        fill_rect(&mut canvas, x0, y0, x1 - x0 + 1, 1, BLACK);
        fill_rect(&mut canvas, x0, y1, x1 - x0 + 1, 1, BLACK);
        fill_rect(&mut canvas, x0, y0, 1, y1 - y0 + 1, BLACK);
        fill_rect(&mut canvas, x1, y0, 1, y1 - y0 + 1, BLACK);
    }

    let mut y = TEXT_TOP;
    for line in body_lines(excuse_text) {
        draw_text(&mut canvas, TEXT_LEFT, y, &line, BLACK);
        y += GLYPH_SIZE + LINE_SPACING;
    }

    canvas
}

/// Lines of the excuse as laid out in the body. Explicit newlines are kept.
pub fn body_lines(excuse_text: &str) -> Vec<String> {
    let max_chars = ((WIDTH - 2 * TEXT_LEFT) / GLYPH_SIZE) as usize;
    excuse_text
        .lines()
        .flat_map(|paragraph| wrap_words(paragraph, max_chars))
        .collect()
}

fn write_png(canvas: &RgbImage, excuse_text: &str, path: &Path) -> Result<(), ProofError> {
    let writer = BufWriter::new(File::create(path)?);

    let mut encoder = png::Encoder::new(writer, canvas.width(), canvas.height());
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.add_itxt_chunk(TEXT_KEYWORD.to_string(), excuse_text.to_string())?;

    let mut writer = encoder.write_header()?;
    writer.write_image_data(canvas.as_raw())?;
    writer.finish()?;
    Ok(())
}

/// Clipped to the canvas.
fn fill_rect(canvas: &mut RgbImage, x: u32, y: u32, w: u32, h: u32, color: Rgb<u8>) {
    let x_end = (x + w).min(canvas.width());
    let y_end = (y + h).min(canvas.height());
    for py in y..y_end {
        for px in x..x_end {
            canvas.put_pixel(px, py, color);
        }
    }
}

/// 8×8 bitmap glyphs; characters outside the basic set render as '?'.
fn draw_text(canvas: &mut RgbImage, x: u32, y: u32, text: &str, color: Rgb<u8>) {
    let mut cursor = x;
    for c in text.chars() {
        if cursor + GLYPH_SIZE > canvas.width() {
            break;
        }
        let glyph = BASIC_FONTS
            .get(c)
            .or_else(|| BASIC_FONTS.get('?'))
            .unwrap_or([0; 8]);
        for (row, bits) in glyph.iter().enumerate() {
            for col in 0..GLYPH_SIZE {
                if bits & (1 << col) != 0 {
                    let (px, py) = (cursor + col, y + row as u32);
                    if px < canvas.width() && py < canvas.height() {
                        canvas.put_pixel(px, py, color);
                    }
                }
            }
        }
        cursor += GLYPH_SIZE;
    }
}
