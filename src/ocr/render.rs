use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use resvg::render;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use tiny_skia::Pixmap;
use usvg::{Options, Tree, fontdb};

use super::{
    BBoxPx, OcrLevel, OverlayFont, OverlayStyle, ParagraphRecord, RenderInstruction, WordBox,
};

const DEFAULT_ASCENT: f32 = 0.8;

/// Paints every instruction over the embedded source image: the line box is
/// filled with its background color, then the text is drawn from the box's
/// top-left corner in the font color.
pub fn render_svg(
    image_bytes: &[u8],
    image_mime: &str,
    width: u32,
    height: u32,
    instructions: &[RenderInstruction],
    style: &OverlayStyle,
) -> Result<String> {
    let mut svg = open_svg(image_bytes, image_mime, width, height);
    let font_family = style.font.as_ref().map(OverlayFont::family);
    let ascent = style
        .font
        .as_ref()
        .map(OverlayFont::ascent)
        .unwrap_or(DEFAULT_ASCENT);

    for instruction in instructions {
        let BBoxPx { x, y, w, h } = instruction.bbox;
        let base_size = if instruction.font_size > 0 {
            instruction.font_size
        } else {
            h
        };
        let font_size = (base_size as f32 * style.font_weight).floor().max(1.0);

        svg.push_str(&format!(
            r#"<rect x="{x}" y="{y}" width="{w}" height="{h}" fill="{fill}"/>"#,
            fill = instruction.background.to_hex()
        ));
        if instruction.text.trim().is_empty() {
            continue;
        }
        let family_attr = font_family
            .map(|family| format!(r#" font-family="{}""#, escape_xml(family)))
            .unwrap_or_default();
        svg.push_str(&format!(
            r#"<text x="{x}" y="{baseline}" font-size="{size}" fill="{color}"{family_attr} xml:space="preserve">{text}</text>"#,
            baseline = y as f32 + font_size * ascent,
            size = font_size,
            color = instruction.font_color.to_hex(),
            text = escape_xml(&instruction.text)
        ));
    }

    svg.push_str("</svg>");
    Ok(svg)
}

/// Boxes drawn by the OCR debug overlay.
#[derive(Debug, Clone, Default)]
pub struct BoxOverlay {
    pub words: Vec<BBoxPx>,
    pub lines: Vec<BBoxPx>,
    pub paragraphs: Vec<BBoxPx>,
}

impl BoxOverlay {
    pub fn from_detections(
        words: &[WordBox],
        paragraphs: &[ParagraphRecord],
        sentence_threshold: f32,
    ) -> Self {
        Self {
            words: words
                .iter()
                .filter(|word| {
                    word.level == OcrLevel::Word
                        && word.conf > sentence_threshold
                        && !word.text.is_empty()
                })
                .map(|word| word.bbox)
                .collect(),
            lines: paragraphs
                .iter()
                .flat_map(|paragraph| paragraph.line_positions())
                .collect(),
            paragraphs: paragraphs.iter().map(|paragraph| paragraph.bbox).collect(),
        }
    }
}

pub fn render_bbox_svg(
    image_bytes: &[u8],
    image_mime: &str,
    width: u32,
    height: u32,
    overlay: &BoxOverlay,
) -> Result<String> {
    let mut svg = open_svg(image_bytes, image_mime, width, height);
    for bbox in &overlay.words {
        push_outline(&mut svg, bbox, 0, "#00ff00");
    }
    for bbox in &overlay.lines {
        push_outline(&mut svg, bbox, 1, "#0000ff");
    }
    for bbox in &overlay.paragraphs {
        push_outline(&mut svg, bbox, 3, "#ff0000");
    }
    svg.push_str("</svg>");
    Ok(svg)
}

fn open_svg(image_bytes: &[u8], image_mime: &str, width: u32, height: u32) -> String {
    let encoded = BASE64.encode(image_bytes);
    let data_uri = format!("data:{};base64,{}", image_mime, encoded);

    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = width,
        h = height
    ));
    svg.push_str(&format!(
        r#"<image href="{uri}" xlink:href="{uri}" x="0" y="0" width="{w}" height="{h}" preserveAspectRatio="none"/>"#,
        uri = data_uri,
        w = width,
        h = height
    ));
    svg
}

fn push_outline(svg: &mut String, bbox: &BBoxPx, outset: u32, stroke: &str) {
    let x = bbox.x as i64 - outset as i64;
    let y = bbox.y as i64 - outset as i64;
    let w = bbox.w + outset * 2;
    let h = bbox.h + outset * 2;
    svg.push_str(&format!(
        r#"<rect x="{x}" y="{y}" width="{w}" height="{h}" fill="none" stroke="{stroke}" stroke-width="1"/>"#
    ));
}

pub fn render_svg_bytes(
    svg: &str,
    format: image::ImageFormat,
    font_data: Option<&[u8]>,
) -> Result<Vec<u8>> {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    if let Some(data) = font_data {
        db.load_font_data(data.to_vec());
    }
    let options = Options {
        fontdb: Arc::new(db),
        ..Options::default()
    };
    let tree = Tree::from_str(svg, &options).with_context(|| "failed to parse SVG")?;
    let size = tree.size().to_int_size();
    let mut pixmap =
        Pixmap::new(size.width(), size.height()).ok_or_else(|| anyhow!("empty SVG size"))?;
    let mut pixmap_mut = pixmap.as_mut();
    render(&tree, tiny_skia::Transform::identity(), &mut pixmap_mut);
    let image = image::RgbaImage::from_raw(size.width(), size.height(), pixmap.data().to_vec())
        .ok_or_else(|| anyhow!("failed to build image buffer from SVG"))?;
    let image = match format {
        image::ImageFormat::Jpeg => image::DynamicImage::ImageRgb8(
            image::DynamicImage::ImageRgba8(image).to_rgb8(),
        ),
        _ => image::DynamicImage::ImageRgba8(image),
    };
    let mut bytes = Vec::new();
    let mut cursor = Cursor::new(&mut bytes);
    image
        .write_to(&mut cursor, format)
        .with_context(|| "failed to encode image from SVG")?;
    Ok(bytes)
}

pub fn image_format_from_path(path: &Path) -> image::ImageFormat {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => image::ImageFormat::Jpeg,
        Some("gif") => image::ImageFormat::Gif,
        Some("webp") => image::ImageFormat::WebP,
        Some("bmp") => image::ImageFormat::Bmp,
        Some("tif") | Some("tiff") => image::ImageFormat::Tiff,
        _ => image::ImageFormat::Png,
    }
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb;

    fn style() -> OverlayStyle {
        OverlayStyle {
            font_weight: 1.2,
            font: Some(OverlayFont::named("Gulim", 0.8)),
        }
    }

    #[test]
    fn render_fills_background_and_draws_text() {
        let instructions = vec![RenderInstruction {
            bbox: BBoxPx::new(10, 20, 100, 20),
            text: "안녕 <월드>".to_string(),
            background: Rgb::new(255, 255, 255),
            font_color: Rgb::new(0, 0, 0),
            font_size: 20,
        }];
        let svg = render_svg(b"img", "image/png", 200, 100, &instructions, &style()).unwrap();
        assert!(svg.contains(r##"<rect x="10" y="20" width="100" height="20" fill="#ffffff"/>"##));
        assert!(svg.contains(r#"font-size="24""#));
        assert!(svg.contains(r##"fill="#000000" font-family="Gulim""##));
        assert!(svg.contains("안녕 &lt;월드&gt;"));
        assert!(svg.ends_with("</svg>"));
    }

    #[test]
    fn blank_lines_only_clear_the_background() {
        let instructions = vec![RenderInstruction {
            bbox: BBoxPx::new(0, 0, 10, 10),
            text: String::new(),
            background: Rgb::new(1, 2, 3),
            font_color: Rgb::new(0, 0, 0),
            font_size: 10,
        }];
        let svg = render_svg(b"img", "image/png", 10, 10, &instructions, &style()).unwrap();
        assert!(svg.contains("#010203"));
        assert!(!svg.contains("<text"));
    }

    #[test]
    fn bbox_overlay_outsets_lines_and_paragraphs() {
        let overlay = BoxOverlay {
            words: vec![BBoxPx::new(10, 10, 30, 12)],
            lines: vec![BBoxPx::new(10, 10, 70, 12)],
            paragraphs: vec![BBoxPx::new(10, 10, 70, 12)],
        };
        let svg = render_bbox_svg(b"img", "image/png", 100, 100, &overlay).unwrap();
        assert!(svg.contains(r##"<rect x="10" y="10" width="30" height="12" fill="none" stroke="#00ff00""##));
        assert!(svg.contains(r##"<rect x="9" y="9" width="72" height="14" fill="none" stroke="#0000ff""##));
        assert!(svg.contains(r##"<rect x="7" y="7" width="76" height="18" fill="none" stroke="#ff0000""##));
    }

    #[test]
    fn output_format_follows_extension() {
        assert_eq!(
            image_format_from_path(Path::new("out/result.JPG")),
            image::ImageFormat::Jpeg
        );
        assert_eq!(
            image_format_from_path(Path::new("result")),
            image::ImageFormat::Png
        );
    }
}
