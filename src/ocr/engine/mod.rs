mod geom;
mod layout;
mod paragraph;
mod parse;
mod sentence;
mod tesseract;

use anyhow::{Context, Result};
use std::io::Write;
use tracing::debug;

use crate::ocr::WordBox;

pub use geom::distance;
pub use layout::distribute_text;
pub use paragraph::assemble_paragraphs;
pub use sentence::assemble_sentences;
pub use tesseract::list_tesseract_languages;

pub(crate) use geom::expand_within;

/// Anything that turns an encoded image into a flat, scan-ordered detection list.
pub trait OcrProvider {
    fn detect(&self, image_bytes: &[u8]) -> Result<Vec<WordBox>>;
}

#[derive(Debug, Clone)]
pub struct Tesseract {
    languages: String,
    psm: u32,
}

impl Tesseract {
    pub fn new(languages: impl Into<String>) -> Self {
        Self {
            languages: languages.into(),
            psm: 3,
        }
    }

    pub fn with_psm(mut self, psm: u32) -> Self {
        self.psm = psm;
        self
    }
}

impl OcrProvider for Tesseract {
    fn detect(&self, image_bytes: &[u8]) -> Result<Vec<WordBox>> {
        let image = image::load_from_memory(image_bytes)
            .with_context(|| "failed to decode image for OCR")?;
        let languages = tesseract::normalize_ocr_languages(&self.languages)?;

        let mut tmp = tempfile::Builder::new()
            .suffix(".png")
            .tempfile()
            .with_context(|| "failed to create temp file for OCR")?;
        image
            .write_to(&mut tmp, image::ImageFormat::Png)
            .with_context(|| "failed to write temp image for OCR")?;
        tmp.flush().ok();

        let tsv = tesseract::run_tesseract_tsv(tmp.path(), &languages, self.psm)?;
        let words = parse::parse_tsv_words(&tsv)?;
        debug!("tesseract returned {} detections", words.len());
        Ok(words)
    }
}
