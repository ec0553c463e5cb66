use image::{GrayImage, ImageBuffer, Luma};
use std::f64::consts::SQRT_2;
use std::path::PathBuf;

/// Single-channel intensity image with samples normalised to `[0, 1]`
pub type Channel = ImageBuffer<Luma<f32>, Vec<f32>>;

/// One channel of a source image plus the stem used to name its outputs
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub channel: Channel,
    /// File name without its final extension (`a.b.jpg` -> `a.b`)
    pub stem: String,
    pub source: PathBuf,
}

impl LoadedImage {
    pub fn width(&self) -> u32 {
        self.channel.width()
    }

    pub fn height(&self) -> u32 {
        self.channel.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.channel.dimensions()
    }
}

/// Contrast-stretched channel together with its white top-hat response
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    /// Channel stretched so the percentile window covers `[0, 255]`
    pub rescaled: GrayImage,
    /// Small bright structures found by the top-hat filter
    pub tophat: GrayImage,
    /// Intensities (in `[0, 1]` source units) at the lower/upper percentiles
    pub in_range: (f32, f32),
}

impl ProcessedImage {
    pub fn dimensions(&self) -> (u32, u32) {
        self.rescaled.dimensions()
    }

    /// Rescaled image with the top-hat structures subtracted
    pub fn background_removed(&self) -> GrayImage {
        let mut out = self.rescaled.clone();
        for (dst, th) in out.pixels_mut().zip(self.tophat.pixels()) {
            dst[0] = dst[0].saturating_sub(th[0]);
        }
        out
    }

    /// Rescaled image as floats in `[0, 1]`, the input the blob detector works on
    pub fn to_float(&self) -> Channel {
        let (w, h) = self.rescaled.dimensions();
        ImageBuffer::from_fn(w, h, |x, y| Luma([self.rescaled.get_pixel(x, y)[0] as f32 / 255.0]))
    }
}

/// A detected bright region in image-pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Blob {
    pub row: f64,
    pub col: f64,
    pub radius: f64,
}

impl Blob {
    /// Build a blob from the detector's scale, using radius = sigma * sqrt(2)
    pub fn from_sigma(row: f64, col: f64, sigma: f64) -> Self {
        Self {
            row,
            col,
            radius: sigma * SQRT_2,
        }
    }

    pub fn sigma(&self) -> f64 {
        self.radius / SQRT_2
    }

    /// Center as `(x, y)`
    pub fn center(&self) -> (f64, f64) {
        (self.col, self.row)
    }
}

/// Outcome of one load -> suppress -> detect run
#[derive(Debug, Clone)]
pub struct CountResult {
    pub stem: String,
    pub source: PathBuf,
    pub blobs: Vec<Blob>,
}

impl CountResult {
    pub fn count(&self) -> usize {
        self.blobs.len()
    }
}
