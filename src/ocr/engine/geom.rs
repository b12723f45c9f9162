use crate::ocr::BBoxPx;

/// Euclidean distance between two points.
pub fn distance(p1: (f32, f32), p2: (f32, f32)) -> f32 {
    let dx = p2.0 - p1.0;
    let dy = p2.1 - p1.1;
    (dx * dx + dy * dy).sqrt()
}

pub(super) fn union_bbox(a: &BBoxPx, b: &BBoxPx) -> BBoxPx {
    let x1 = a.x.min(b.x);
    let y1 = a.y.min(b.y);
    let x2 = a.right().max(b.right());
    let y2 = a.bottom().max(b.bottom());
    BBoxPx {
        x: x1,
        y: y1,
        w: x2 - x1,
        h: y2 - y1,
    }
}

/// Grows `bbox` by `margin` on every side, clipped to a `width` x `height`
/// canvas. Returns `None` when nothing of the grown box lies on the canvas.
pub(crate) fn expand_within(bbox: &BBoxPx, margin: u32, width: u32, height: u32) -> Option<BBoxPx> {
    let x1 = bbox.x.saturating_sub(margin);
    let y1 = bbox.y.saturating_sub(margin);
    let x2 = bbox.right().saturating_add(margin).min(width);
    let y2 = bbox.bottom().saturating_add(margin).min(height);
    if x2 <= x1 || y2 <= y1 {
        return None;
    }
    Some(BBoxPx {
        x: x1,
        y: y1,
        w: x2 - x1,
        h: y2 - y1,
    })
}
