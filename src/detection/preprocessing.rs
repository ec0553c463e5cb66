use anyhow::Result;
use image::{GrayImage, Luma};
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::{grayscale_open, Mask};

use crate::models::{Channel, ProcessedImage};
use crate::render::{colorize_gray, Colormap, Renderer};

/// Contrast stretch and top-hat settings
#[derive(Debug, Clone)]
pub struct SuppressOptions {
    /// Lower percentile mapped to black
    pub lower_thresh: f64,
    /// Upper percentile mapped to white
    pub upper_thresh: f64,
    /// Disk radius for the white top-hat; 0 leaves the image untouched
    pub filter_size: u8,
    pub cmap: Colormap,
}

impl SuppressOptions {
    pub fn new() -> Self {
        Self {
            lower_thresh: 2.0,
            upper_thresh: 98.0,
            filter_size: 0,
            cmap: Colormap::Jet,
        }
    }

    pub fn with_percentiles(mut self, lower: f64, upper: f64) -> Self {
        self.lower_thresh = lower;
        self.upper_thresh = upper;
        self
    }

    pub fn with_filter_size(mut self, filter_size: u8) -> Self {
        self.filter_size = filter_size;
        self
    }

    pub fn with_cmap(mut self, cmap: Colormap) -> Self {
        self.cmap = cmap;
        self
    }

    fn validate(&self) -> Result<()> {
        let (lo, hi) = (self.lower_thresh, self.upper_thresh);
        if !(0.0..=100.0).contains(&lo) || !(0.0..=100.0).contains(&hi) {
            anyhow::bail!("Percentiles must lie in [0, 100], got ({}, {})", lo, hi);
        }
        if lo >= hi {
            anyhow::bail!(
                "Lower percentile must be below the upper one, got ({}, {})",
                lo,
                hi
            );
        }
        Ok(())
    }
}

impl Default for SuppressOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Stretch the channel's percentile window to the full 8-bit range, then find
/// small bright patches with a white top-hat.
///
/// Returns the stretched image; the top-hat response travels alongside it and
/// `rescaled - tophat` is what gets rendered.
pub fn adjust_image(
    channel: &Channel,
    options: &SuppressOptions,
    renderer: &mut dyn Renderer,
) -> Result<ProcessedImage> {
    options.validate()?;

    let samples = channel.as_raw();
    let low = percentile(samples, options.lower_thresh)?;
    let high = percentile(samples, options.upper_thresh)?;
    log::debug!(
        "Percentiles p{}={:.4}, p{}={:.4}",
        options.lower_thresh,
        low,
        options.upper_thresh,
        high
    );

    let rescaled = rescale_intensity(channel, (low, high));
    let tophat = white_tophat(&rescaled, options.filter_size);

    let processed = ProcessedImage {
        rescaled,
        tophat,
        in_range: (low, high),
    };
    renderer.show(
        "background",
        &colorize_gray(&processed.background_removed(), options.cmap),
    )?;

    Ok(processed)
}

/// `q`-th percentile with linear interpolation between the closest ranks
pub fn percentile(values: &[f32], q: f64) -> Result<f32> {
    if values.is_empty() {
        anyhow::bail!("Cannot take a percentile of an empty image");
    }
    if !(0.0..=100.0).contains(&q) {
        anyhow::bail!("Percentile must lie in [0, 100], got {}", q);
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let below = rank.floor() as usize;
    let above = rank.ceil() as usize;
    let frac = (rank - below as f64) as f32;

    Ok(sorted[below] + (sorted[above] - sorted[below]) * frac)
}

/// Clip to `in_range` and stretch linearly onto `[0, 255]`.
///
/// Values are truncated to integers, not rounded. A degenerate window
/// (`low >= high`) maps every pixel to 0.
pub fn rescale_intensity(channel: &Channel, in_range: (f32, f32)) -> GrayImage {
    let (low, high) = in_range;
    let span = high - low;
    let (w, h) = channel.dimensions();

    GrayImage::from_fn(w, h, |x, y| {
        if span <= 0.0 {
            return Luma([0]);
        }
        let v = channel.get_pixel(x, y)[0].clamp(low, high);
        Luma([((v - low) / span * 255.0) as u8])
    })
}

/// Image minus its grayscale opening by a disk of `radius`
pub fn white_tophat(image: &GrayImage, radius: u8) -> GrayImage {
    let opened = grayscale_open(image, &Mask::disk(radius));
    let mut out = image.clone();
    for (dst, open) in out.pixels_mut().zip(opened.pixels()) {
        dst[0] = dst[0].saturating_sub(open[0]);
    }
    out
}

/// Gaussian smoothing of a float channel
pub fn apply_blur(channel: &Channel, sigma: f32) -> Channel {
    gaussian_blur_f32(channel, sigma)
}
