use anyhow::{Context, Result};
use image::RgbImage;
use tracing::{debug, info};

use crate::block::Block;
use crate::color::{ColorEstimator, DEFAULT_COLOR_WEIGHT};
use crate::ocr::{
    DEFAULT_BLOCK_THRESHOLD, DEFAULT_SENTENCE_THRESHOLD, ParagraphRecord, RenderInstruction,
    WordBox, assemble_paragraphs, assemble_sentences,
};
use crate::translations::TranslateOptions;
use crate::translator::TextTranslator;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub sentence: f32,
    pub block: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            sentence: DEFAULT_SENTENCE_THRESHOLD,
            block: DEFAULT_BLOCK_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub thresholds: Thresholds,
    pub color_weight: u8,
    pub translate: TranslateOptions,
}

impl PipelineOptions {
    pub fn new(translate: TranslateOptions) -> Self {
        Self {
            thresholds: Thresholds::default(),
            color_weight: DEFAULT_COLOR_WEIGHT,
            translate,
        }
    }
}

/// Rebuilds paragraphs from raw detections: words into sentences, sentences
/// into paragraphs.
pub fn recollect(words: &[WordBox], thresholds: Thresholds) -> Vec<ParagraphRecord> {
    let sentences = assemble_sentences(words, thresholds.sentence);
    let paragraphs = assemble_paragraphs(&sentences, thresholds.block);
    debug!(
        "recollected {} detections into {} sentences and {} paragraphs",
        words.len(),
        sentences.len(),
        paragraphs.len()
    );
    paragraphs
}

#[derive(Debug, Clone)]
pub struct TranslationRun {
    pub blocks: Vec<Block>,
    pub instructions: Vec<RenderInstruction>,
}

pub struct ImageTranslator {
    estimator: Box<dyn ColorEstimator>,
    translator: Box<dyn TextTranslator>,
    options: PipelineOptions,
}

impl ImageTranslator {
    pub fn new(
        estimator: Box<dyn ColorEstimator>,
        translator: Box<dyn TextTranslator>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            estimator,
            translator,
            options,
        }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Runs color estimation, translation and re-flow for every paragraph,
    /// one block at a time and in reading order. The first failing block
    /// aborts the run.
    pub async fn process(&self, image: &RgbImage, words: &[WordBox]) -> Result<TranslationRun> {
        let paragraphs = recollect(words, self.options.thresholds);
        info!("processing {} blocks", paragraphs.len());

        let mut blocks = Vec::with_capacity(paragraphs.len());
        let mut instructions = Vec::new();
        for (index, paragraph) in paragraphs.into_iter().enumerate() {
            let mut block = Block::new(paragraph);
            block
                .estimate_colors(image, self.estimator.as_ref(), self.options.color_weight)
                .with_context(|| format!("failed to estimate colors for block {}", index + 1))?;
            block
                .translate(self.translator.as_ref(), &self.options.translate)
                .await
                .with_context(|| format!("failed to translate block {}", index + 1))?;
            debug!(
                "block {}: '{}' -> {:?}",
                index + 1,
                block.text(),
                block.translated_lines()
            );
            instructions.extend(block.render_instructions()?);
            blocks.push(block);
        }

        Ok(TranslationRun {
            blocks,
            instructions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{KMeansColorEstimator, Rgb};
    use crate::ocr::BBoxPx;
    use crate::translator::TranslateFuture;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        calls: Mutex<Vec<String>>,
    }

    impl TextTranslator for Recording {
        fn translate<'a>(
            &'a self,
            text: &'a str,
            _options: &'a TranslateOptions,
        ) -> TranslateFuture<'a> {
            Box::pin(async move {
                let mut calls = self.calls.lock().map_err(|_| anyhow::anyhow!("poisoned"))?;
                calls.push(text.to_string());
                Ok(text.to_uppercase())
            })
        }
    }

    struct Failing;

    impl TextTranslator for Failing {
        fn translate<'a>(
            &'a self,
            _text: &'a str,
            _options: &'a TranslateOptions,
        ) -> TranslateFuture<'a> {
            Box::pin(async { Err(anyhow::anyhow!("service unavailable")) })
        }
    }

    fn words() -> Vec<WordBox> {
        vec![
            WordBox::line_marker(BBoxPx::new(10, 10, 70, 12)),
            WordBox::word("Hello", BBoxPx::new(10, 10, 30, 12), 90.0),
            WordBox::word("World", BBoxPx::new(45, 10, 35, 12), 88.0),
            WordBox::line_marker(BBoxPx::new(10, 200, 60, 12)),
            WordBox::word("Far", BBoxPx::new(10, 200, 25, 12), 91.0),
            WordBox::word("away", BBoxPx::new(40, 200, 30, 12), 93.0),
        ]
    }

    fn canvas() -> RgbImage {
        RgbImage::from_pixel(120, 240, image::Rgb([250, 250, 250]))
    }

    #[test]
    fn recollect_splits_distant_lines() {
        let paragraphs = recollect(&words(), Thresholds::default());
        let texts = paragraphs
            .iter()
            .map(|paragraph| paragraph.text.as_str())
            .collect::<Vec<_>>();
        assert_eq!(texts, vec!["Hello World", "Far away"]);
        assert_eq!(paragraphs[0].bbox, BBoxPx::new(10, 10, 70, 12));
    }

    #[tokio::test]
    async fn translates_each_block_once_in_order() {
        let translator = ImageTranslator::new(
            Box::new(KMeansColorEstimator::default()),
            Box::new(Recording::default()),
            PipelineOptions::new(TranslateOptions::new("en", "ko")),
        );
        let run = translator.process(&canvas(), &words()).await.unwrap();

        assert_eq!(run.blocks.len(), 2);
        assert_eq!(run.instructions.len(), 2);
        assert_eq!(run.instructions[0].text, "HELLO WORLD");
        assert_eq!(run.instructions[1].text, "FAR AWAY");
        assert_eq!(run.instructions[0].background, Rgb::new(250, 250, 250));
        assert_eq!(run.instructions[0].font_color, Rgb::new(220, 220, 220));
    }

    #[tokio::test]
    async fn translator_failure_aborts_the_run() {
        let translator = ImageTranslator::new(
            Box::new(KMeansColorEstimator::default()),
            Box::new(Failing),
            PipelineOptions::new(TranslateOptions::new("en", "ko")),
        );
        let err = translator.process(&canvas(), &words()).await.unwrap_err();
        assert!(format!("{err:#}").contains("service unavailable"));
    }

    #[tokio::test]
    async fn no_detections_yield_an_empty_run() {
        let translator = ImageTranslator::new(
            Box::new(KMeansColorEstimator::default()),
            Box::new(Failing),
            PipelineOptions::new(TranslateOptions::new("en", "ko")),
        );
        let run = translator.process(&canvas(), &[]).await.unwrap();
        assert!(run.blocks.is_empty());
        assert!(run.instructions.is_empty());
    }
}
