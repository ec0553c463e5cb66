use anyhow::Result;
use std::f64::consts::PI;

use super::preprocessing::apply_blur;
use crate::models::{Blob, Channel, ProcessedImage};
use crate::render::{colorize_channel, colorize_gray, draw_blobs, side_by_side, Colormap, Renderer};

/// Difference-of-Gaussians detector settings
#[derive(Debug, Clone)]
pub struct BlobOptions {
    pub min_sigma: f64,
    /// Upper bound on blob scale
    pub max_sigma: f64,
    /// Ratio between successive Gaussian scales
    pub sigma_ratio: f64,
    /// Minimum DoG response, on the `[0, 1]` float image
    pub threshold: f64,
    /// Overlap fraction above which the smaller of two blobs is dropped
    pub overlap: f64,
    pub cmap: Colormap,
}

impl BlobOptions {
    pub fn new() -> Self {
        Self {
            min_sigma: 1.0,
            max_sigma: 30.0,
            sigma_ratio: 1.6,
            threshold: 0.1,
            overlap: 0.5,
            cmap: Colormap::Jet,
        }
    }

    pub fn with_max_sigma(mut self, max_sigma: f64) -> Self {
        self.max_sigma = max_sigma;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_min_sigma(mut self, min_sigma: f64) -> Self {
        self.min_sigma = min_sigma;
        self
    }

    pub fn with_overlap(mut self, overlap: f64) -> Self {
        self.overlap = overlap;
        self
    }

    pub fn with_cmap(mut self, cmap: Colormap) -> Self {
        self.cmap = cmap;
        self
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("min_sigma", self.min_sigma),
            ("max_sigma", self.max_sigma),
            ("sigma_ratio", self.sigma_ratio),
            ("threshold", self.threshold),
        ] {
            if !value.is_finite() {
                anyhow::bail!("{} must be finite, got {}", name, value);
            }
        }
        if !(self.min_sigma > 0.0) {
            anyhow::bail!("min_sigma must be positive, got {}", self.min_sigma);
        }
        if !(self.max_sigma >= self.min_sigma) {
            anyhow::bail!(
                "max_sigma ({}) must not be below min_sigma ({})",
                self.max_sigma,
                self.min_sigma
            );
        }
        if !(self.sigma_ratio > 1.0) {
            anyhow::bail!("sigma_ratio must exceed 1, got {}", self.sigma_ratio);
        }
        if !(0.0..=1.0).contains(&self.overlap) {
            anyhow::bail!("overlap must lie in [0, 1], got {}", self.overlap);
        }
        Ok(())
    }

    /// Gaussian scales `min_sigma * sigma_ratio^i` for `i` in `0..=k`
    pub fn sigma_list(&self) -> Vec<f64> {
        let k = ((self.max_sigma / self.min_sigma).ln() / self.sigma_ratio.ln() + 1.0).floor() as i32;
        (0..=k)
            .map(|i| self.min_sigma * self.sigma_ratio.powi(i))
            .collect()
    }
}

impl Default for BlobOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Detect blobs on the processed image and render them over both images.
///
/// Renders three panels: the original alone, the processed image with
/// circles, and the original with circles.
pub fn detect_blobs(
    original: &Channel,
    processed: &ProcessedImage,
    options: &BlobOptions,
    renderer: &mut dyn Renderer,
) -> Result<Vec<Blob>> {
    if original.dimensions() != processed.dimensions() {
        anyhow::bail!(
            "Original ({:?}) and processed ({:?}) images differ in size",
            original.dimensions(),
            processed.dimensions()
        );
    }

    let blobs = blob_dog(&processed.to_float(), options)?;
    log::info!("{} blobs detected.", blobs.len());

    let plain = colorize_channel(original, options.cmap);
    let mut marked_processed = colorize_gray(&processed.rescaled, options.cmap);
    let mut marked_original = plain.clone();
    draw_blobs(&mut marked_processed, &blobs);
    draw_blobs(&mut marked_original, &blobs);
    renderer.show(
        "blobs",
        &side_by_side(&[plain, marked_processed, marked_original]),
    )?;

    Ok(blobs)
}

#[derive(Debug, Clone, Copy)]
struct Peak {
    row: usize,
    col: usize,
    scale: usize,
    response: f32,
}

/// Difference-of-Gaussians blob detection.
///
/// Blobs come back strongest response first, after overlap pruning.
pub fn blob_dog(image: &Channel, options: &BlobOptions) -> Result<Vec<Blob>> {
    options.validate()?;

    let sigmas = options.sigma_list();
    log::debug!("DoG scales: {:?}", sigmas);

    let blurred: Vec<Channel> = sigmas
        .iter()
        .map(|&sigma| apply_blur(image, sigma as f32))
        .collect();

    // 1 / (ratio - 1) turns each DoG layer into a scale-normalised Laplacian
    let norm = (1.0 / (options.sigma_ratio - 1.0)) as f32;
    let dog: Vec<Vec<f32>> = blurred
        .windows(2)
        .map(|pair| {
            pair[0]
                .as_raw()
                .iter()
                .zip(pair[1].as_raw())
                .map(|(fine, coarse)| (fine - coarse) * norm)
                .collect()
        })
        .collect();

    let (w, h) = image.dimensions();
    let peaks = find_peaks(&dog, w as usize, h as usize, options.threshold as f32);
    log::debug!("{} local maxima above threshold", peaks.len());

    let candidates = peaks
        .into_iter()
        .map(|p| Blob::from_sigma(p.row as f64, p.col as f64, sigmas[p.scale]))
        .collect();

    Ok(prune_blobs(candidates, options.overlap))
}

/// Local maxima of the (row, col, scale) cube over a 3x3x3 neighbourhood
/// with clamped edges, keeping responses strictly above `threshold`
fn find_peaks(dog: &[Vec<f32>], width: usize, height: usize, threshold: f32) -> Vec<Peak> {
    let scales = dog.len();
    let at = |s: usize, r: usize, c: usize| dog[s][r * width + c];
    let mut peaks = Vec::new();

    for row in 0..height {
        for col in 0..width {
            for scale in 0..scales {
                let response = at(scale, row, col);
                if !(response > threshold) {
                    continue;
                }

                let is_max = neighbours(scale, scales).all(|s| {
                    neighbours(row, height).all(|r| {
                        neighbours(col, width).all(|c| at(s, r, c) <= response)
                    })
                });
                if is_max {
                    peaks.push(Peak {
                        row,
                        col,
                        scale,
                        response,
                    });
                }
            }
        }
    }

    // stable, so equal responses keep scan order
    peaks.sort_by(|a, b| b.response.total_cmp(&a.response));
    peaks
}

fn neighbours(i: usize, len: usize) -> std::ops::RangeInclusive<usize> {
    i.saturating_sub(1)..=(i + 1).min(len - 1)
}

/// Drop the smaller blob of every pair whose disks overlap more than `overlap`
fn prune_blobs(blobs: Vec<Blob>, overlap: f64) -> Vec<Blob> {
    if blobs.len() < 2 {
        return blobs;
    }

    let reach = 2.0 * blobs.iter().map(|b| b.radius).fold(0.0, f64::max);
    let mut keep = vec![true; blobs.len()];

    for i in 0..blobs.len() {
        for j in (i + 1)..blobs.len() {
            if !keep[i] || !keep[j] {
                continue;
            }
            let (a, b) = (&blobs[i], &blobs[j]);
            if (a.row - b.row).hypot(a.col - b.col) > reach {
                continue;
            }
            if blob_overlap(a, b) > overlap {
                if a.radius > b.radius {
                    keep[j] = false;
                } else {
                    keep[i] = false;
                }
            }
        }
    }

    blobs
        .into_iter()
        .zip(keep)
        .filter_map(|(blob, kept)| kept.then_some(blob))
        .collect()
}

/// Fraction of the smaller disk covered by the other one
pub fn blob_overlap(a: &Blob, b: &Blob) -> f64 {
    let (r1, r2) = (a.radius, b.radius);
    let d = (a.row - b.row).hypot(a.col - b.col);

    if d > r1 + r2 {
        0.0
    } else if d <= (r1 - r2).abs() {
        1.0
    } else {
        disk_overlap(d, r1, r2)
    }
}

fn disk_overlap(d: f64, r1: f64, r2: f64) -> f64 {
    let ratio1 = ((d * d + r1 * r1 - r2 * r2) / (2.0 * d * r1)).clamp(-1.0, 1.0);
    let ratio2 = ((d * d + r2 * r2 - r1 * r1) / (2.0 * d * r2)).clamp(-1.0, 1.0);

    let a = -d + r2 + r1;
    let b = d - r2 + r1;
    let c = d + r2 - r1;
    let e = d + r2 + r1;
    let area = r1 * r1 * ratio1.acos() + r2 * r2 * ratio2.acos() - 0.5 * (a * b * c * e).abs().sqrt();

    area / (PI * r1.min(r2).powi(2))
}
