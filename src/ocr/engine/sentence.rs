use crate::ocr::{BBoxPx, OcrLevel, SentenceRecord, WordBox};

use super::geom::union_bbox;

#[derive(Debug, Clone)]
struct SentenceAcc {
    words: Vec<String>,
    bbox: BBoxPx,
    heights: Vec<u32>,
}

impl SentenceAcc {
    fn start(word: &str, bbox: BBoxPx) -> Self {
        Self {
            words: vec![word.to_string()],
            bbox,
            heights: vec![bbox.h],
        }
    }

    fn push(&mut self, word: &str, bbox: &BBoxPx) {
        self.words.push(word.to_string());
        self.bbox = union_bbox(&self.bbox, bbox);
        self.heights.push(bbox.h);
    }

    /// A word starts a new sentence when the gap to it is wider than the word itself.
    fn is_detached(&self, bbox: &BBoxPx) -> bool {
        self.bbox.right() + bbox.w < bbox.x
    }

    /// Hands the accumulator back when it holds one character or less; such
    /// a fragment keeps absorbing the following words.
    fn into_record(self) -> Result<SentenceRecord, Self> {
        let text = self.words.join(" ").trim().to_string();
        if text.chars().count() <= 1 {
            return Err(self);
        }
        Ok(SentenceRecord {
            text,
            bbox: self.bbox,
            font_size: weighted_font_size(&self.heights),
        })
    }
}

// sum(h * n) / n^2, truncated. Kept as-is: rendered sizes depend on it.
fn weighted_font_size(heights: &[u32]) -> u32 {
    let n = heights.len() as u64;
    if n == 0 {
        return 0;
    }
    let weighted: u64 = heights.iter().map(|h| *h as u64 * n).sum();
    (weighted / (n * n)) as u32
}

#[derive(Debug, Default)]
struct SentenceState {
    current: Option<SentenceAcc>,
    done: Vec<SentenceRecord>,
}

impl SentenceState {
    fn flush(mut self) -> Self {
        if let Some(acc) = self.current.take() {
            match acc.into_record() {
                Ok(record) => self.done.push(record),
                Err(fragment) => self.current = Some(fragment),
            }
        }
        self
    }

    fn finish(mut self) -> Vec<SentenceRecord> {
        if let Some(record) = self.current.take().and_then(|acc| acc.into_record().ok()) {
            self.done.push(record);
        }
        self.done
    }

    fn step(self, word: &WordBox, threshold: f32) -> Self {
        match word.level {
            OcrLevel::Line => self.flush(),
            OcrLevel::Word => {
                let text = word.text.trim();
                if word.conf <= threshold || text.is_empty() {
                    return self;
                }
                let detached = self
                    .current
                    .as_ref()
                    .is_some_and(|acc| acc.is_detached(&word.bbox));
                let mut state = if detached { self.flush() } else { self };
                match state.current.as_mut() {
                    Some(acc) => acc.push(text, &word.bbox),
                    None => state.current = Some(SentenceAcc::start(text, word.bbox)),
                }
                state
            }
            _ => self,
        }
    }
}

/// Groups scan-ordered OCR detections into line-level sentences.
///
/// Line markers close the running sentence; words below `threshold`
/// confidence are skipped. A fragment of one character or less is never
/// emitted on its own: it carries over into the next word, and is dropped
/// if the stream ends first.
pub fn assemble_sentences(words: &[WordBox], threshold: f32) -> Vec<SentenceRecord> {
    words
        .iter()
        .fold(SentenceState::default(), |state, word| {
            state.step(word, threshold)
        })
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(text: &str, x: u32, y: u32, w: u32, h: u32, conf: f32) -> WordBox {
        WordBox::word(text, BBoxPx::new(x, y, w, h), conf)
    }

    fn marker() -> WordBox {
        WordBox::line_marker(BBoxPx::new(0, 0, 0, 0))
    }

    #[test]
    fn adjacent_words_merge_into_one_sentence() {
        let words = vec![
            word("Hello", 10, 10, 30, 12, 90.0),
            word("World", 45, 10, 35, 12, 88.0),
        ];
        let sentences = assemble_sentences(&words, 50.0);
        assert_eq!(sentences.len(), 1);
        assert_eq!(sentences[0].text, "Hello World");
        assert_eq!(sentences[0].bbox.x, 10);
        assert_eq!(sentences[0].bbox.w, 70);
        assert_eq!(sentences[0].font_size, 12);
    }

    #[test]
    fn wide_gap_starts_new_sentence() {
        let words = vec![
            word("Price", 10, 10, 40, 12, 90.0),
            word("tag", 200, 10, 30, 12, 90.0),
        ];
        let sentences = assemble_sentences(&words, 50.0);
        let texts: Vec<&str> = sentences.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["Price", "tag"]);
    }

    #[test]
    fn line_marker_flushes_sentence() {
        let words = vec![
            marker(),
            word("first", 10, 10, 30, 12, 90.0),
            word("line", 44, 10, 25, 12, 90.0),
            marker(),
            word("second", 10, 30, 40, 12, 90.0),
        ];
        let sentences = assemble_sentences(&words, 50.0);
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[0].text, "first line");
        assert_eq!(sentences[1].text, "second");
        assert_eq!(sentences[1].bbox, BBoxPx::new(10, 30, 40, 12));
    }

    #[test]
    fn low_confidence_and_blank_words_are_skipped() {
        let words = vec![
            word("ok", 10, 10, 20, 12, 90.0),
            word("noise", 32, 10, 20, 12, 50.0),
            word("   ", 54, 10, 20, 12, 99.0),
            word("yes", 45, 10, 20, 12, 51.0),
        ];
        let sentences = assemble_sentences(&words, 50.0);
        assert_eq!(sentences.len(), 1);
        assert_eq!(sentences[0].text, "ok yes");
    }

    #[test]
    fn single_character_carries_over_a_line_marker() {
        let words = vec![
            word("I", 10, 10, 5, 12, 90.0),
            marker(),
            word("am", 10, 30, 20, 12, 90.0),
        ];
        let sentences = assemble_sentences(&words, 50.0);
        assert_eq!(sentences.len(), 1);
        assert_eq!(sentences[0].text, "I am");
        assert_eq!(sentences[0].bbox, BBoxPx::new(10, 10, 20, 32));
    }

    #[test]
    fn single_character_carries_over_a_gap() {
        let words = vec![
            word("a", 10, 10, 5, 12, 90.0),
            word("note", 100, 10, 30, 12, 90.0),
            word("here", 300, 10, 30, 12, 90.0),
        ];
        let sentences = assemble_sentences(&words, 50.0);
        let texts: Vec<&str> = sentences.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["a note", "here"]);
    }

    #[test]
    fn trailing_single_character_is_dropped() {
        let words = vec![
            word("menu", 10, 10, 40, 12, 90.0),
            marker(),
            word("~", 10, 30, 4, 12, 90.0),
        ];
        let sentences = assemble_sentences(&words, 50.0);
        assert_eq!(sentences.len(), 1);
        assert_eq!(sentences[0].text, "menu");
    }

    #[test]
    fn bbox_is_union_of_contributing_words() {
        let words = vec![
            word("tall", 10, 12, 20, 14, 90.0),
            word("taller", 32, 8, 30, 22, 90.0),
            word("low", 64, 20, 15, 6, 90.0),
        ];
        let sentences = assemble_sentences(&words, 50.0);
        assert_eq!(sentences.len(), 1);
        assert_eq!(sentences[0].bbox, BBoxPx::new(10, 8, 69, 22));
        for word in &words {
            let b = sentences[0].bbox;
            assert!(b.x <= word.bbox.x && b.y <= word.bbox.y);
            assert!(b.right() >= word.bbox.right() && b.bottom() >= word.bbox.bottom());
        }
    }

    #[test]
    fn font_size_uses_weighted_formula() {
        assert_eq!(weighted_font_size(&[12, 12]), 12);
        assert_eq!(weighted_font_size(&[10, 13]), 11);
        assert_eq!(weighted_font_size(&[]), 0);
    }

    #[test]
    fn empty_input_yields_no_sentences() {
        assert!(assemble_sentences(&[], 50.0).is_empty());
    }
}
