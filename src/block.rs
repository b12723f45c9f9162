use anyhow::{Result, anyhow, bail};
use image::RgbImage;

use crate::color::{ColorEstimator, ColorPair, estimate_pair};
use crate::ocr::{ParagraphRecord, RenderInstruction, distribute_text};
use crate::translations::TranslateOptions;
use crate::translator::TextTranslator;

/// A paragraph together with its sampled colors and translated lines. This
/// is the unit that gets rendered.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Block {
    paragraph: ParagraphRecord,
    colors: Vec<ColorPair>,
    translated_lines: Vec<String>,
}

impl Block {
    pub fn new(paragraph: ParagraphRecord) -> Self {
        Self {
            paragraph,
            colors: Vec::new(),
            translated_lines: Vec::new(),
        }
    }

    pub fn paragraph(&self) -> &ParagraphRecord {
        &self.paragraph
    }

    pub fn text(&self) -> &str {
        &self.paragraph.text
    }

    pub fn line_count(&self) -> usize {
        self.paragraph.line_count()
    }

    pub fn colors(&self) -> &[ColorPair] {
        &self.colors
    }

    pub fn translated_lines(&self) -> &[String] {
        &self.translated_lines
    }

    /// One color pair for a single-line block, sampled around the whole
    /// paragraph; one per line otherwise.
    pub fn estimate_colors(
        &mut self,
        image: &RgbImage,
        estimator: &dyn ColorEstimator,
        weight: u8,
    ) -> Result<()> {
        self.colors = if self.line_count() > 1 {
            self.paragraph
                .line_positions()
                .map(|bbox| estimate_pair(estimator, image, &bbox, weight))
                .collect::<Result<Vec<_>>>()?
        } else {
            vec![estimate_pair(estimator, image, &self.paragraph.bbox, weight)?]
        };
        Ok(())
    }

    pub async fn translate(
        &mut self,
        translator: &dyn TextTranslator,
        options: &TranslateOptions,
    ) -> Result<()> {
        let translated = translator.translate(&self.paragraph.text, options).await?;
        self.apply_translation(&translated);
        Ok(())
    }

    /// Stores `translated`, spreading it across the original lines when the
    /// paragraph spans more than one.
    pub fn apply_translation(&mut self, translated: &str) {
        self.translated_lines = if self.line_count() > 1 {
            distribute_text(translated, self.line_count(), &self.paragraph.line_widths())
        } else {
            vec![translated.trim().to_string()]
        };
    }

    pub fn render_instructions(&self) -> Result<Vec<RenderInstruction>> {
        if self.colors.is_empty() {
            bail!("block '{}' has no colors", self.paragraph.text);
        }
        if self.translated_lines.is_empty() {
            bail!("block '{}' has not been translated", self.paragraph.text);
        }

        if self.line_count() > 1 {
            self.paragraph
                .lines
                .iter()
                .enumerate()
                .map(|(index, line)| {
                    let colors = self
                        .colors
                        .get(index)
                        .ok_or_else(|| anyhow!("missing colors for line {}", index + 1))?;
                    let text = self
                        .translated_lines
                        .get(index)
                        .ok_or_else(|| anyhow!("missing translation for line {}", index + 1))?;
                    Ok(RenderInstruction {
                        bbox: line.bbox,
                        text: text.clone(),
                        background: colors.background,
                        font_color: colors.font,
                        font_size: line.font_size,
                    })
                })
                .collect()
        } else {
            let font_size = self.paragraph.line_font_sizes().next().unwrap_or(0);
            Ok(vec![RenderInstruction {
                bbox: self.paragraph.bbox,
                text: self.translated_lines.join(" "),
                background: self.colors[0].background,
                font_color: self.colors[0].font,
                font_size,
            }])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb;
    use crate::ocr::{BBoxPx, LineSlot};
    use crate::translator::TranslateFuture;

    struct FixedColors(Vec<Rgb>);

    impl ColorEstimator for FixedColors {
        fn dominant_colors(&self, _roi: &RgbImage) -> Result<Vec<Rgb>> {
            Ok(self.0.clone())
        }
    }

    struct Prefix;

    impl TextTranslator for Prefix {
        fn translate<'a>(
            &'a self,
            text: &'a str,
            options: &'a TranslateOptions,
        ) -> TranslateFuture<'a> {
            Box::pin(async move { Ok(format!("[{}] {}", options.lang, text)) })
        }
    }

    fn paragraph(lines: &[(u32, u32, u32, u32)]) -> ParagraphRecord {
        let slots = lines
            .iter()
            .map(|&(x, y, w, h)| LineSlot {
                bbox: BBoxPx::new(x, y, w, h),
                font_size: h,
            })
            .collect::<Vec<_>>();
        ParagraphRecord {
            text: "one two three four".to_string(),
            bbox: BBoxPx::new(10, 10, 100, 50),
            lines: slots,
        }
    }

    fn white_on_black() -> FixedColors {
        FixedColors(vec![Rgb::new(0, 0, 0), Rgb::new(240, 240, 240)])
    }

    #[test]
    fn single_line_block_samples_once() {
        let image = RgbImage::new(200, 100);
        let mut block = Block::new(paragraph(&[(10, 10, 100, 20)]));
        block.estimate_colors(&image, &white_on_black(), 30).unwrap();
        assert_eq!(block.colors().len(), 1);
        assert_eq!(block.colors()[0].font, Rgb::new(255, 255, 255));
    }

    #[test]
    fn multi_line_block_samples_each_line() {
        let image = RgbImage::new(200, 100);
        let mut block = Block::new(paragraph(&[(10, 10, 100, 20), (10, 35, 60, 20)]));
        block.estimate_colors(&image, &white_on_black(), 30).unwrap();
        assert_eq!(block.colors().len(), 2);
    }

    #[tokio::test]
    async fn multi_line_translation_is_reflowed() {
        let mut block = Block::new(paragraph(&[(10, 10, 30, 20), (10, 35, 70, 20)]));
        block
            .translate(&Prefix, &TranslateOptions::new("en", "ko"))
            .await
            .unwrap();
        assert_eq!(
            block.translated_lines(),
            &["[ko]".to_string(), "one two three four".to_string()]
        );
    }

    #[test]
    fn instructions_follow_line_slots() {
        let image = RgbImage::new(200, 100);
        let mut block = Block::new(paragraph(&[(10, 10, 50, 20), (10, 35, 50, 16)]));
        block.estimate_colors(&image, &white_on_black(), 30).unwrap();
        block.apply_translation("a b c d");

        let instructions = block.render_instructions().unwrap();
        assert_eq!(instructions.len(), 2);
        assert_eq!(instructions[0].text, "a b");
        assert_eq!(instructions[1].text, "c d");
        assert_eq!(instructions[1].bbox, BBoxPx::new(10, 35, 50, 16));
        assert_eq!(instructions[1].font_size, 16);
        assert_eq!(instructions[1].background, Rgb::new(0, 0, 0));
    }

    #[test]
    fn single_line_instruction_uses_paragraph_box() {
        let image = RgbImage::new(200, 100);
        let mut block = Block::new(paragraph(&[(10, 10, 100, 20)]));
        block.estimate_colors(&image, &white_on_black(), 30).unwrap();
        block.apply_translation("  하나 둘  ");

        let instructions = block.render_instructions().unwrap();
        assert_eq!(instructions.len(), 1);
        assert_eq!(instructions[0].bbox, BBoxPx::new(10, 10, 100, 50));
        assert_eq!(instructions[0].text, "하나 둘");
        assert_eq!(instructions[0].font_size, 20);
    }

    #[test]
    fn incomplete_block_cannot_render() {
        let mut block = Block::new(paragraph(&[(10, 10, 100, 20)]));
        assert!(block.render_instructions().is_err());
        block.apply_translation("done");
        assert!(block.render_instructions().is_err());
    }
}
