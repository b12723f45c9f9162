mod engine;
mod font;
mod render;

use anyhow::{Result, anyhow};

use crate::color::Rgb;

pub use engine::{
    OcrProvider, Tesseract, assemble_paragraphs, assemble_sentences, distance, distribute_text,
    list_tesseract_languages,
};
pub use font::{OverlayFont, resolve_overlay_font};
pub use render::{BoxOverlay, image_format_from_path, render_bbox_svg, render_svg, render_svg_bytes};

pub(crate) use engine::expand_within;

/// Minimum confidence a word needs to take part in sentence assembly.
pub const DEFAULT_SENTENCE_THRESHOLD: f32 = 50.0;
/// Spacing factor, relative to a paragraph's first line height, that keeps
/// a following line in the same paragraph.
pub const DEFAULT_BLOCK_THRESHOLD: f32 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct BBoxPx {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl BBoxPx {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.w)
    }

    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.h)
    }
}

/// Hierarchy tag of a tesseract detection row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum OcrLevel {
    Page,
    Block,
    Paragraph,
    Line,
    Word,
}

impl OcrLevel {
    pub fn from_code(code: u32) -> Result<Self> {
        match code {
            1 => Ok(OcrLevel::Page),
            2 => Ok(OcrLevel::Block),
            3 => Ok(OcrLevel::Paragraph),
            4 => Ok(OcrLevel::Line),
            5 => Ok(OcrLevel::Word),
            other => Err(anyhow!("unknown ocr level {}", other)),
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            OcrLevel::Page => 1,
            OcrLevel::Block => 2,
            OcrLevel::Paragraph => 3,
            OcrLevel::Line => 4,
            OcrLevel::Word => 5,
        }
    }
}

/// One raw detection, in the order the OCR engine emitted it.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct WordBox {
    pub text: String,
    pub level: OcrLevel,
    pub bbox: BBoxPx,
    pub conf: f32,
}

impl WordBox {
    pub fn word(text: impl Into<String>, bbox: BBoxPx, conf: f32) -> Self {
        Self {
            text: text.into(),
            level: OcrLevel::Word,
            bbox,
            conf,
        }
    }

    pub fn line_marker(bbox: BBoxPx) -> Self {
        Self {
            text: String::new(),
            level: OcrLevel::Line,
            bbox,
            conf: -1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SentenceRecord {
    pub text: String,
    pub bbox: BBoxPx,
    pub font_size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct LineSlot {
    pub bbox: BBoxPx,
    pub font_size: u32,
}

/// Sentences judged to form one paragraph. Every contributing sentence keeps
/// its own slot so colors can be sampled and text placed line by line.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ParagraphRecord {
    pub text: String,
    pub bbox: BBoxPx,
    pub lines: Vec<LineSlot>,
}

impl ParagraphRecord {
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn line_positions(&self) -> impl Iterator<Item = BBoxPx> + '_ {
        self.lines.iter().map(|line| line.bbox)
    }

    pub fn line_font_sizes(&self) -> impl Iterator<Item = u32> + '_ {
        self.lines.iter().map(|line| line.font_size)
    }

    pub fn line_widths(&self) -> Vec<u32> {
        self.lines.iter().map(|line| line.bbox.w).collect()
    }
}

/// One line of translated text to paint over the source image.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RenderInstruction {
    pub bbox: BBoxPx,
    pub text: String,
    pub background: Rgb,
    pub font_color: Rgb,
    pub font_size: u32,
}

pub struct OverlayStyle {
    pub font_weight: f32,
    pub font: Option<OverlayFont>,
}
