use anyhow::{Result, anyhow, bail};
use image::RgbImage;

use crate::ocr::{BBoxPx, expand_within};

/// Margins tried, in order, when cutting the sampling region around a box.
pub const ROI_MARGINS: [u32; 3] = [5, 1, 0];
pub const DEFAULT_COLOR_WEIGHT: u8 = 30;
pub const DEFAULT_CLUSTERS: usize = 5;

const MAX_KMEANS_ITERATIONS: usize = 20;
const MAX_SAMPLES: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// BT.601 luma in 0..=255.
    pub fn luma(&self) -> f32 {
        0.299 * self.r as f32 + 0.587 * self.g as f32 + 0.114 * self.b as f32
    }

    fn map(self, f: impl Fn(u8) -> u8) -> Self {
        Self::new(f(self.r), f(self.g), f(self.b))
    }
}

impl From<image::Rgb<u8>> for Rgb {
    fn from(pixel: image::Rgb<u8>) -> Self {
        let [r, g, b] = pixel.0;
        Self::new(r, g, b)
    }
}

/// Ranks the colors of a region by prevalence. Index 0 is taken as the
/// background and index 1 as the text color.
pub trait ColorEstimator: Send + Sync {
    fn dominant_colors(&self, roi: &RgbImage) -> Result<Vec<Rgb>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ColorPair {
    pub background: Rgb,
    pub font: Rgb,
}

/// Region to sample for `bbox`: the first margin that still lands inside
/// the image, otherwise the raw box clipped to the image.
pub fn find_roi(width: u32, height: u32, bbox: &BBoxPx) -> Result<BBoxPx> {
    for margin in ROI_MARGINS {
        if let Some(roi) = expand_within(bbox, margin, width, height) {
            return Ok(roi);
        }
    }
    let x = bbox.x.min(width);
    let y = bbox.y.min(height);
    let roi = BBoxPx::new(
        x,
        y,
        bbox.right().min(width) - x,
        bbox.bottom().min(height) - y,
    );
    if roi.w == 0 || roi.h == 0 {
        bail!(
            "empty color sampling region at ({}, {}, {}, {}) in {}x{} image",
            bbox.x,
            bbox.y,
            bbox.w,
            bbox.h,
            width,
            height
        );
    }
    Ok(roi)
}

/// Samples the region around `bbox`, takes the two most prevalent colors and
/// pushes the text color away from the background by `weight`.
pub fn estimate_pair(
    estimator: &dyn ColorEstimator,
    image: &RgbImage,
    bbox: &BBoxPx,
    weight: u8,
) -> Result<ColorPair> {
    let roi = find_roi(image.width(), image.height(), bbox)?;
    let crop = image::imageops::crop_imm(image, roi.x, roi.y, roi.w, roi.h).to_image();
    let ranked = estimator.dominant_colors(&crop)?;
    let background = *ranked
        .first()
        .ok_or_else(|| anyhow!("color estimator returned no colors"))?;
    let font = ranked.get(1).copied().unwrap_or(background);
    Ok(ColorPair {
        background,
        font: correct_font_color(font, background, weight),
    })
}

/// Darkens the text color on light backgrounds and brightens it on dark ones.
pub fn correct_font_color(font: Rgb, background: Rgb, weight: u8) -> Rgb {
    if background.luma() >= 128.0 {
        font.map(|c| c.saturating_sub(weight))
    } else {
        font.map(|c| c.saturating_add(weight))
    }
}

/// Deterministic k-means over the region's pixels.
#[derive(Debug, Clone)]
pub struct KMeansColorEstimator {
    clusters: usize,
    max_iterations: usize,
    max_samples: usize,
}

impl Default for KMeansColorEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_CLUSTERS)
    }
}

impl KMeansColorEstimator {
    pub fn new(clusters: usize) -> Self {
        Self {
            clusters: clusters.max(1),
            max_iterations: MAX_KMEANS_ITERATIONS,
            max_samples: MAX_SAMPLES,
        }
    }
}

impl ColorEstimator for KMeansColorEstimator {
    fn dominant_colors(&self, roi: &RgbImage) -> Result<Vec<Rgb>> {
        let samples = sample_pixels(roi, self.max_samples);
        if samples.is_empty() {
            bail!("cannot cluster an empty region");
        }
        let mut centroids = initialize_centroids(&samples, self.clusters.min(samples.len()));
        let k = centroids.len();
        let mut assignments = vec![usize::MAX; samples.len()];

        for _ in 0..self.max_iterations {
            let mut changed = false;
            for (point, slot) in samples.iter().zip(assignments.iter_mut()) {
                let nearest = nearest_centroid(point, &centroids);
                if *slot != nearest {
                    *slot = nearest;
                    changed = true;
                }
            }
            if !changed {
                break;
            }

            let mut sums = vec![[0.0f32; 3]; k];
            let mut counts = vec![0usize; k];
            for (point, &cluster) in samples.iter().zip(assignments.iter()) {
                for (acc, value) in sums[cluster].iter_mut().zip(point) {
                    *acc += value;
                }
                counts[cluster] += 1;
            }
            for ((centroid, sum), &count) in centroids.iter_mut().zip(&sums).zip(&counts) {
                // an empty cluster keeps its last position
                if count > 0 {
                    *centroid = sum.map(|value| value / count as f32);
                }
            }
        }

        let mut counts = vec![0usize; k];
        for &cluster in &assignments {
            counts[cluster] += 1;
        }
        let mut ranked = centroids
            .iter()
            .zip(counts)
            .filter(|(_, count)| *count > 0)
            .map(|(centroid, count)| (count, to_rgb(centroid)))
            .collect::<Vec<_>>();
        ranked.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(ranked.into_iter().map(|(_, color)| color).collect())
    }
}

fn sample_pixels(roi: &RgbImage, max_samples: usize) -> Vec<[f32; 3]> {
    let total = (roi.width() as usize) * (roi.height() as usize);
    let stride = total.div_ceil(max_samples.max(1)).max(1);
    roi.pixels()
        .step_by(stride)
        .map(|pixel| pixel.0.map(f32::from))
        .collect()
}

fn squared_distance(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let diff = x - y;
            diff * diff
        })
        .sum()
}

fn nearest_centroid(point: &[f32; 3], centroids: &[[f32; 3]]) -> usize {
    let mut best = 0;
    let mut best_distance = f32::INFINITY;
    for (index, centroid) in centroids.iter().enumerate() {
        let distance = squared_distance(point, centroid);
        if distance < best_distance {
            best = index;
            best_distance = distance;
        }
    }
    best
}

/// Farthest-point seeding starting from the first sample.
fn initialize_centroids(samples: &[[f32; 3]], k: usize) -> Vec<[f32; 3]> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(samples[0]);

    while centroids.len() < k {
        let mut farthest = None;
        let mut farthest_distance = 0.0;
        for point in samples {
            let distance = centroids
                .iter()
                .map(|centroid| squared_distance(point, centroid))
                .fold(f32::INFINITY, f32::min);
            if distance > farthest_distance {
                farthest = Some(*point);
                farthest_distance = distance;
            }
        }
        match farthest {
            Some(point) => centroids.push(point),
            // fewer distinct colors than clusters
            None => break,
        }
    }

    centroids
}

fn to_rgb(centroid: &[f32; 3]) -> Rgb {
    let [r, g, b] = centroid.map(|value| value.round().clamp(0.0, 255.0) as u8);
    Rgb::new(r, g, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Rgb = Rgb::new(255, 255, 255);
    const BLACK: Rgb = Rgb::new(0, 0, 0);

    /// White canvas with a black bar covering the middle rows.
    fn text_like(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |_, y| {
            if y >= height / 3 && y < height / 3 + height / 4 {
                image::Rgb([0, 0, 0])
            } else {
                image::Rgb([255, 255, 255])
            }
        })
    }

    #[test]
    fn roi_uses_widest_margin_that_fits() {
        let roi = find_roi(100, 100, &BBoxPx::new(10, 10, 20, 10)).unwrap();
        assert_eq!(roi, BBoxPx::new(5, 5, 30, 20));
    }

    #[test]
    fn roi_is_clipped_at_image_edges() {
        let roi = find_roi(40, 30, &BBoxPx::new(2, 25, 38, 5)).unwrap();
        assert_eq!(roi, BBoxPx::new(0, 20, 40, 10));
    }

    #[test]
    fn roi_outside_the_image_is_an_error() {
        assert!(find_roi(40, 30, &BBoxPx::new(60, 60, 10, 10)).is_err());
    }

    #[test]
    fn background_ranks_before_text() {
        let ranked = KMeansColorEstimator::default()
            .dominant_colors(&text_like(60, 24))
            .unwrap();
        assert_eq!(ranked[0], WHITE);
        assert_eq!(ranked[1], BLACK);
        assert_eq!(ranked.len(), 2);
    }

    #[test]
    fn clustering_is_deterministic() {
        let image = RgbImage::from_fn(50, 50, |x, y| image::Rgb([(x * 5) as u8, (y * 5) as u8, 90]));
        let estimator = KMeansColorEstimator::default();
        let first = estimator.dominant_colors(&image).unwrap();
        let second = estimator.dominant_colors(&image).unwrap();
        assert_eq!(first, second);
        assert!(first.len() <= DEFAULT_CLUSTERS);
    }

    #[test]
    fn single_color_region_uses_background_for_text() {
        let image = RgbImage::from_pixel(20, 20, image::Rgb([200, 200, 200]));
        let pair = estimate_pair(
            &KMeansColorEstimator::default(),
            &image,
            &BBoxPx::new(5, 5, 5, 5),
            DEFAULT_COLOR_WEIGHT,
        )
        .unwrap();
        assert_eq!(pair.background, Rgb::new(200, 200, 200));
        assert_eq!(pair.font, Rgb::new(170, 170, 170));
    }

    #[test]
    fn font_color_moves_away_from_background() {
        assert_eq!(
            correct_font_color(Rgb::new(20, 40, 250), WHITE, 30),
            Rgb::new(0, 10, 220)
        );
        assert_eq!(
            correct_font_color(Rgb::new(200, 240, 10), BLACK, 30),
            Rgb::new(230, 255, 40)
        );
    }

    #[test]
    fn hex_is_lowercase_rgb() {
        assert_eq!(Rgb::new(255, 8, 171).to_hex(), "#ff08ab");
    }
}
