//! One-page certificate PDF for document-style proof kinds.
//!
//! The excuse text is only used to pick a canned diagnosis sentence; it is
//! never printed on the page.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use chrono::{NaiveDate, Utc};
use printpdf::path::{PaintMode, WindingOrder};
use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Line, Mm, PdfDocument, PdfLayerReference, Point, Polygon,
    Pt, Rgb,
};

use super::{wrap_words, ProofError};
use crate::models::ProofKind;

const PAGE_WIDTH: f32 = 612.0;
const PAGE_HEIGHT: f32 = 792.0;
const MARGIN: f32 = 50.0;

const LABEL_COLUMN: f32 = 100.0;
const ROW_PADDING: f32 = 6.0;
const LINE_HEIGHT: f32 = 12.0;
const BODY_SIZE: f32 = 10.0;
/// Rough Helvetica advance at `BODY_SIZE`, used only for wrapping.
const BODY_CHAR_WIDTH: f32 = 5.0;

pub const INSTITUTION: &str = "Sunrise Medical Center";
pub const ADDRESS: &str = "123 Health Ave, Wellness City, Care State";
pub const PATIENT: &str = "John Doe";
pub const SIGNATORY: &str = "Dr. Emily Smith, MD";

pub const FALLBACK_DIAGNOSIS: &str =
    "Patient required medical attention for unspecified minor illness.";

/// Keyword groups in priority order; the first group with a hit wins.
const DIAGNOSES: &[(&[&str], &str)] = &[
    (&["headache"], "Patient reports acute migraine symptoms requiring rest."),
    (
        &["stomach", "food"],
        "Patient experiencing gastroenteritis symptoms after suspected food reaction.",
    ),
    (
        &["cold", "flu"],
        "Symptoms consistent with viral upper respiratory infection (common cold).",
    ),
    (
        &["nurse", "allergic"],
        "Possible allergic reaction observed. Antihistamines recommended.",
    ),
    (&["fever"], "Fever reported. Advised to rest and monitor for escalation."),
    (
        &["clinic", "medical"],
        "Attended urgent care clinic for health concerns. Follow-up required.",
    ),
    (
        &["vomit", "nausea"],
        "Acute nausea and vomiting symptoms. Advised rest and hydration.",
    ),
];

/// Map free-form excuse text to a canned diagnosis sentence.
pub fn diagnosis_for(excuse_text: &str) -> &'static str {
    let lowered = excuse_text.to_lowercase();
    DIAGNOSES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lowered.contains(k)))
        .map(|(_, sentence)| *sentence)
        .unwrap_or(FALLBACK_DIAGNOSIS)
}

/// Everything printed on the certificate, before any drawing happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateLayout {
    pub institution: &'static str,
    pub address: &'static str,
    pub title: String,
    pub rows: Vec<(&'static str, String)>,
    pub signatory: &'static str,
}

impl CertificateLayout {
    pub fn new(excuse_text: &str, kind: ProofKind, date: NaiveDate) -> Self {
        Self {
            institution: INSTITUTION,
            address: ADDRESS,
            title: format!("{} Report", kind.label()),
            rows: vec![
                ("Date", date.format("%Y-%m-%d").to_string()),
                ("Patient", PATIENT.to_string()),
                ("Details", diagnosis_for(excuse_text).to_string()),
            ],
            signatory: SIGNATORY,
        }
    }

    /// Every string that ends up on the page.
    pub fn texts(&self) -> Vec<&str> {
        let mut texts = vec![self.institution, self.address, self.title.as_str()];
        for (label, value) in &self.rows {
            texts.push(label);
            texts.push(value.as_str());
        }
        texts.push(self.signatory);
        texts
    }
}

pub fn render(excuse_text: &str, kind: ProofKind, path: &Path) -> Result<(), ProofError> {
    let layout = CertificateLayout::new(excuse_text, kind, Utc::now().date_naive());
    write_pdf(&layout, path)
}

pub fn write_pdf(layout: &CertificateLayout, path: &Path) -> Result<(), ProofError> {
    let (doc, page, layer) = PdfDocument::new(
        layout.title.as_str(),
        pt(PAGE_WIDTH),
        pt(PAGE_HEIGHT),
        "Certificate",
    );
    let canvas = doc.get_page(page).get_layer(layer);

    let regular = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_err)?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(pdf_err)?;

    let right = PAGE_WIDTH - MARGIN;

    // Header
    canvas.set_fill_color(rgb(0.0, 0.0, 0.545));
    canvas.use_text(layout.institution, 18.0, pt(MARGIN), pt(PAGE_HEIGHT - 50.0), &bold);
    canvas.use_text(layout.address, BODY_SIZE, pt(MARGIN), pt(PAGE_HEIGHT - 65.0), &regular);
    canvas.set_outline_color(rgb(0.0, 0.0, 0.0));
    canvas.set_outline_thickness(1.0);
    stroke_line(&canvas, (MARGIN, PAGE_HEIGHT - 70.0), (right, PAGE_HEIGHT - 70.0));

    // Title
    canvas.set_fill_color(rgb(0.0, 0.0, 0.0));
    canvas.use_text(layout.title.as_str(), 14.0, pt(MARGIN), pt(PAGE_HEIGHT - 100.0), &bold);

    draw_table(&canvas, layout, PAGE_HEIGHT - 130.0, &regular, &bold);

    // Signature
    canvas.set_outline_color(rgb(0.0, 0.0, 0.0));
    canvas.set_outline_thickness(1.0);
    stroke_line(&canvas, (MARGIN, PAGE_HEIGHT - 300.0), (200.0, PAGE_HEIGHT - 300.0));
    canvas.set_fill_color(rgb(0.0, 0.0, 0.0));
    canvas.use_text(layout.signatory, BODY_SIZE, pt(MARGIN), pt(PAGE_HEIGHT - 315.0), &regular);

    let mut writer = BufWriter::new(File::create(path)?);
    doc.save(&mut writer).map_err(pdf_err)?;
    Ok(())
}

/// Label/value table with a shaded first row, grey inner grid and black box.
fn draw_table(
    canvas: &PdfLayerReference,
    layout: &CertificateLayout,
    top: f32,
    regular: &IndirectFontRef,
    bold: &IndirectFontRef,
) {
    let left = MARGIN;
    let split = MARGIN + LABEL_COLUMN;
    let right = PAGE_WIDTH - MARGIN;
    let max_chars = ((right - split - 2.0 * ROW_PADDING) / BODY_CHAR_WIDTH) as usize;

    let rows: Vec<(&str, Vec<String>)> = layout
        .rows
        .iter()
        .map(|(label, value)| (*label, wrap_words(value, max_chars)))
        .collect();

    let heights: Vec<f32> = rows
        .iter()
        .map(|(_, lines)| lines.len().max(1) as f32 * LINE_HEIGHT + 2.0 * ROW_PADDING)
        .collect();
    let bottom = top - heights.iter().sum::<f32>();

    if let Some(first) = heights.first() {
        canvas.set_fill_color(rgb(0.827, 0.827, 0.827));
        fill_rect(canvas, left, top - first, right, top);
    }

    canvas.set_fill_color(rgb(0.0, 0.0, 0.0));
    let mut y = top;
    for ((label, lines), height) in rows.iter().zip(&heights) {
        let baseline = y - ROW_PADDING - BODY_SIZE;
        canvas.use_text(*label, BODY_SIZE, pt(left + ROW_PADDING), pt(baseline), bold);
        for (i, line) in lines.iter().enumerate() {
            let line_y = baseline - i as f32 * LINE_HEIGHT;
            canvas.use_text(line.as_str(), BODY_SIZE, pt(split + ROW_PADDING), pt(line_y), regular);
        }
        y -= height;
    }

    canvas.set_outline_color(rgb(0.5, 0.5, 0.5));
    canvas.set_outline_thickness(0.5);
    let mut y = top;
    for height in heights.iter().take(heights.len().saturating_sub(1)) {
        y -= height;
        stroke_line(canvas, (left, y), (right, y));
    }
    stroke_line(canvas, (split, top), (split, bottom));

    canvas.set_outline_color(rgb(0.0, 0.0, 0.0));
    canvas.set_outline_thickness(1.0);
    canvas.add_line(Line {
        points: vec![
            (point(left, top), false),
            (point(right, top), false),
            (point(right, bottom), false),
            (point(left, bottom), false),
        ],
        is_closed: true,
    });
}

fn stroke_line(canvas: &PdfLayerReference, from: (f32, f32), to: (f32, f32)) {
    canvas.add_line(Line {
        points: vec![(point(from.0, from.1), false), (point(to.0, to.1), false)],
        is_closed: false,
    });
}

fn fill_rect(canvas: &PdfLayerReference, x0: f32, y0: f32, x1: f32, y1: f32) {
    canvas.add_polygon(Polygon {
        rings: vec![vec![
            (point(x0, y0), false),
            (point(x1, y0), false),
            (point(x1, y1), false),
            (point(x0, y1), false),
        ]],
        mode: PaintMode::Fill,
        winding_order: WindingOrder::NonZero,
    });
}

fn pt(value: f32) -> Mm {
    Mm::from(Pt(value))
}

fn point(x: f32, y: f32) -> Point {
    Point::new(pt(x), pt(y))
}

fn rgb(r: f32, g: f32, b: f32) -> Color {
    Color::Rgb(Rgb::new(r, g, b, None))
}

fn pdf_err(e: impl std::fmt::Display) -> ProofError {
    ProofError::Pdf(e.to_string())
}
