use crate::ocr::{BBoxPx, LineSlot, ParagraphRecord, SentenceRecord};

use super::geom::distance;

#[derive(Debug, Clone)]
struct ParagraphAcc {
    texts: Vec<String>,
    bbox: BBoxPx,
    lines: Vec<LineSlot>,
    // Height of the first line; never updated on merge.
    base_height: u32,
}

impl ParagraphAcc {
    fn seed(sentence: &SentenceRecord) -> Self {
        Self {
            texts: vec![sentence.text.clone()],
            bbox: sentence.bbox,
            lines: vec![LineSlot {
                bbox: sentence.bbox,
                font_size: sentence.font_size,
            }],
            base_height: sentence.bbox.h,
        }
    }

    fn accepts(&self, sentence: &SentenceRecord, threshold: f32) -> bool {
        let base = self.base_height as f32;
        let candidate = &sentence.bbox;
        if (candidate.h as f32) * threshold < base {
            return false;
        }
        let anchor = (self.bbox.x as f32, self.bbox.bottom() as f32);
        let dist = distance(anchor, (candidate.x as f32, candidate.y as f32));
        dist <= base * threshold
    }

    fn push(&mut self, sentence: &SentenceRecord) {
        self.texts.push(sentence.text.clone());
        self.bbox = extend_below(&self.bbox, &sentence.bbox);
        self.lines.push(LineSlot {
            bbox: sentence.bbox,
            font_size: sentence.font_size,
        });
    }

    fn into_record(self) -> ParagraphRecord {
        ParagraphRecord {
            text: self.texts.join(" "),
            bbox: self.bbox,
            lines: self.lines,
        }
    }
}

// The paragraph top stays at its first line; left, right and bottom grow.
fn extend_below(paragraph: &BBoxPx, line: &BBoxPx) -> BBoxPx {
    let x = paragraph.x.min(line.x);
    let right = paragraph.right().max(line.right());
    let bottom = paragraph.bottom().max(line.bottom());
    BBoxPx {
        x,
        y: paragraph.y,
        w: right - x,
        h: bottom.saturating_sub(paragraph.y),
    }
}

#[derive(Debug, Default)]
struct ParagraphState {
    current: Option<ParagraphAcc>,
    done: Vec<ParagraphRecord>,
}

impl ParagraphState {
    fn step(mut self, sentence: &SentenceRecord, threshold: f32) -> Self {
        match self.current.take() {
            Some(mut acc) if acc.accepts(sentence, threshold) => {
                acc.push(sentence);
                self.current = Some(acc);
            }
            Some(acc) => {
                self.done.push(acc.into_record());
                self.current = Some(ParagraphAcc::seed(sentence));
            }
            None => self.current = Some(ParagraphAcc::seed(sentence)),
        }
        self
    }

    fn finish(mut self) -> Vec<ParagraphRecord> {
        if let Some(acc) = self.current.take() {
            self.done.push(acc.into_record());
        }
        self.done
    }
}

/// Groups consecutive sentences into paragraphs.
///
/// A sentence joins the running paragraph when its top-left corner lies
/// within `base_height * threshold` of the paragraph's bottom-left corner and
/// its height is not disproportionately smaller than the paragraph's first
/// line (`h * threshold >= base_height`).
pub fn assemble_paragraphs(sentences: &[SentenceRecord], threshold: f32) -> Vec<ParagraphRecord> {
    sentences
        .iter()
        .fold(ParagraphState::default(), |state, sentence| {
            state.step(sentence, threshold)
        })
        .finish()
}
