use anyhow::{Context, Result, anyhow};

use crate::ocr::{BBoxPx, OcrLevel, WordBox};

const TSV_MIN_COLUMNS: usize = 11;

/// Parses tesseract's `tsv` output into detections, keeping every level and
/// the original scan order. A malformed row is an error: the assemblers rely
/// on the full stream, line markers included.
pub(crate) fn parse_tsv_words(tsv: &str) -> Result<Vec<WordBox>> {
    let mut words = Vec::new();

    for (idx, row) in tsv.lines().enumerate() {
        if idx == 0 || row.trim().is_empty() {
            continue;
        }
        let cols = row.split('\t').collect::<Vec<_>>();
        if cols.len() < TSV_MIN_COLUMNS {
            return Err(anyhow!(
                "tesseract tsv row {} has {} columns, expected at least {}",
                idx + 1,
                cols.len(),
                TSV_MIN_COLUMNS
            ));
        }
        let level = OcrLevel::from_code(parse_col(&cols, 0, idx)?)
            .with_context(|| format!("invalid level in tsv row {}", idx + 1))?;
        let left: u32 = parse_col(&cols, 6, idx)?;
        let top: u32 = parse_col(&cols, 7, idx)?;
        let width: u32 = parse_col(&cols, 8, idx)?;
        let height: u32 = parse_col(&cols, 9, idx)?;
        let conf: f32 = parse_col(&cols, 10, idx)?;
        if left.checked_add(width).is_none() || top.checked_add(height).is_none() {
            return Err(anyhow!(
                "tesseract tsv row {} has a box outside the pixel range",
                idx + 1
            ));
        }
        let text = cols.get(11).map(|value| value.trim()).unwrap_or_default();

        words.push(WordBox {
            text: text.to_string(),
            level,
            bbox: BBoxPx {
                x: left,
                y: top,
                w: width,
                h: height,
            },
            conf,
        });
    }

    Ok(words)
}

fn parse_col<T>(cols: &[&str], col: usize, row: usize) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    cols[col].trim().parse::<T>().with_context(|| {
        format!(
            "invalid value '{}' in tsv row {} column {}",
            cols[col],
            row + 1,
            col + 1
        )
    })
}
