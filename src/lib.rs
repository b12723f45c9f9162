use anyhow::{Context, Result, anyhow};
use std::path::Path;
use tracing::{info, warn};

pub mod block;
pub mod color;
pub mod logging;
pub mod ocr;
pub mod output;
pub mod pipeline;
mod providers;
pub mod settings;
#[cfg(test)]
mod test_util;
pub mod translations;
mod translator;

pub use block::Block;
pub use color::{ColorEstimator, ColorPair, KMeansColorEstimator, Rgb};
pub use pipeline::{ImageTranslator, PipelineOptions, Thresholds, TranslationRun, recollect};
pub use providers::{
    ChatProvider, LibreTranslate, Provider, ProviderFuture, ProviderKind, ProviderResponse,
    ProviderUsage, ToolRequest, ToolSpec, TranslatorSelection,
};
pub use translations::TranslateOptions;
pub use translator::{AnyTranslator, ExecutionOutput, TextTranslator, TranslateFuture, Translator};

use ocr::{OcrProvider, OverlayFont, OverlayStyle, Tesseract};
use output::OutputPaths;

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub input: Option<String>,
    pub output: Option<String>,
    pub source_lang: Option<String>,
    pub lang: Option<String>,
    pub font: Option<String>,
    pub translator: Option<String>,
    pub key: Option<String>,
    pub settings_path: Option<String>,
    pub debug_ocr: bool,
    pub show_ocr_languages: bool,
}

#[cfg(target_os = "macos")]
fn overlay_fallback_fonts() -> &'static [&'static str] {
    &["Apple SD Gothic Neo", "Hiragino Sans", "sans-serif"]
}

#[cfg(target_os = "windows")]
fn overlay_fallback_fonts() -> &'static [&'static str] {
    &["Gulim", "Malgun Gothic", "Arial Unicode MS", "sans-serif"]
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn overlay_fallback_fonts() -> &'static [&'static str] {
    &["Noto Sans CJK KR", "NanumGothic", "Noto Sans", "sans-serif"]
}

/// Translates the text inside one image and writes the result. Returns a
/// short report listing what was written.
pub async fn run(config: Config) -> Result<String> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let settings = settings::load_settings(settings_path)?;

    if config.show_ocr_languages {
        return Ok(ocr::list_tesseract_languages()?.join("\n"));
    }

    let input = config
        .input
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| anyhow!("no input image given"))?;
    let input_path = Path::new(input);
    let image_bytes = std::fs::read(input_path)
        .with_context(|| format!("failed to read image: {}", input_path.display()))?;
    let decoded = image::load_from_memory(&image_bytes)
        .with_context(|| format!("failed to decode image: {}", input_path.display()))?;
    let image_mime = image::guess_format(&image_bytes)
        .map(|format| format.to_mime_type())
        .unwrap_or("image/png");
    let rgb = decoded.to_rgb8();

    let options = TranslateOptions::new(
        config
            .source_lang
            .clone()
            .unwrap_or_else(|| settings.source_lang.clone()),
        config
            .lang
            .clone()
            .unwrap_or_else(|| settings.target_lang.clone()),
    );
    if options.lang.trim().is_empty() {
        return Err(anyhow!("target language is empty"));
    }

    let translator_arg = config.translator.as_deref().or(settings.translator.as_deref());
    let selection =
        providers::resolve_translator_selection(translator_arg, config.key.as_deref())?;
    let translator = AnyTranslator::from_selection(
        selection,
        config.key.as_deref(),
        settings.libre_url.as_deref(),
    )?;
    info!("translating {} with {}", input_path.display(), translator.label());

    let words = Tesseract::new(settings.ocr_languages.clone())
        .detect(&image_bytes)
        .with_context(|| "OCR failed")?;

    let pipeline_options = PipelineOptions {
        thresholds: Thresholds {
            sentence: settings.sentence_threshold,
            block: settings.block_threshold,
        },
        color_weight: settings.color_weight,
        translate: options,
    };
    let image_translator = ImageTranslator::new(
        Box::new(KMeansColorEstimator::new(settings.color_clusters)),
        Box::new(translator),
        pipeline_options,
    );
    let run = image_translator.process(&rgb, &words).await?;

    let paths = OutputPaths::resolve(input_path, config.output.as_deref().map(Path::new));
    paths.ensure_parent()?;
    let mut written = Vec::new();

    if config.debug_ocr {
        let paragraphs = run
            .blocks
            .iter()
            .map(|block| block.paragraph().clone())
            .collect::<Vec<_>>();
        let overlay =
            ocr::BoxOverlay::from_detections(&words, &paragraphs, settings.sentence_threshold);
        let svg = ocr::render_bbox_svg(
            &image_bytes,
            image_mime,
            rgb.width(),
            rgb.height(),
            &overlay,
        )?;
        let bytes = ocr::render_svg_bytes(&svg, image::ImageFormat::Png, None)?;
        let boxes_path = paths.boxes();
        std::fs::write(&boxes_path, bytes).with_context(|| {
            format!("failed to write ocr debug image: {}", boxes_path.display())
        })?;
        let json_path = paths.paragraphs();
        let json = serde_json::to_vec_pretty(&paragraphs)?;
        std::fs::write(&json_path, json)
            .with_context(|| format!("failed to write ocr debug json: {}", json_path.display()))?;
        written.push(boxes_path.display().to_string());
        written.push(json_path.display().to_string());
    }

    let font_path = config
        .font
        .as_deref()
        .or(settings.font_path.as_deref())
        .map(Path::new);
    let resolved_font = match ocr::resolve_overlay_font(
        font_path,
        settings.font_family.as_deref(),
        overlay_fallback_fonts(),
    ) {
        Ok(font) => Some(font),
        Err(err) if font_path.is_some() => return Err(err),
        Err(err) => {
            warn!("no overlay font found, using renderer default: {}", err);
            None
        }
    };
    let style = OverlayStyle {
        font_weight: settings.font_weight,
        font: resolved_font.clone(),
    };
    let svg = ocr::render_svg(
        &image_bytes,
        image_mime,
        rgb.width(),
        rgb.height(),
        &run.instructions,
        &style,
    )?;
    let format = ocr::image_format_from_path(paths.image());
    let bytes = ocr::render_svg_bytes(
        &svg,
        format,
        resolved_font.as_ref().map(OverlayFont::data),
    )?;
    std::fs::write(paths.image(), bytes)
        .with_context(|| format!("failed to write output: {}", paths.image().display()))?;
    written.insert(0, paths.image().display().to_string());

    Ok(format!(
        "translated {} blocks\n{}",
        run.blocks.len(),
        written.join("\n")
    ))
}
