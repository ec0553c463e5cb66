use anyhow::Result;
use image::{GrayImage, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_circle_mut;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::models::{Blob, Channel};

const BLOB_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const BLOB_LINE_WIDTH: i32 = 2;
const PANEL_GAP: u32 = 8;

/// Receives figures produced along the pipeline for visual inspection.
///
/// The computational functions never display anything themselves; they hand
/// finished RGB figures to whichever renderer the caller supplies.
pub trait Renderer {
    fn show(&mut self, name: &str, figure: &RgbImage) -> Result<()>;
}

/// Renderer that drops every figure
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRender;

impl Renderer for NoRender {
    fn show(&mut self, _name: &str, _figure: &RgbImage) -> Result<()> {
        Ok(())
    }
}

/// Writes each figure as a numbered PNG (`01_channel.png`, `02_background.png`, ...)
#[derive(Debug, Clone)]
pub struct PngRenderer {
    output_dir: PathBuf,
    shown: usize,
}

impl PngRenderer {
    /// The directory must be empty or non-existent
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self> {
        let output_dir = output_dir.into();
        if output_dir.exists() {
            let entries = std::fs::read_dir(&output_dir)?;
            if entries.count() > 0 {
                anyhow::bail!("Render directory is not empty: {}", output_dir.display());
            }
        } else {
            std::fs::create_dir_all(&output_dir)?;
        }

        Ok(Self {
            output_dir,
            shown: 0,
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

impl Renderer for PngRenderer {
    fn show(&mut self, name: &str, figure: &RgbImage) -> Result<()> {
        self.shown += 1;
        let filename = format!(
            "{:02}_{}.png",
            self.shown,
            name.to_lowercase().replace(' ', "_")
        );
        let path = self.output_dir.join(&filename);
        figure
            .save(&path)
            .map_err(|e| anyhow::anyhow!("Failed to save figure {}: {}", path.display(), e))?;
        log::debug!("Saved figure {}", path.display());
        Ok(())
    }
}

/// Colour map used to display single-channel intensities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Colormap {
    #[default]
    Jet,
    Gray,
    Hot,
}

impl Colormap {
    /// Map an intensity in `[0, 1]` to a colour
    pub fn apply(&self, value: f32) -> Rgb<u8> {
        let v = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
        let (r, g, b) = match self {
            Colormap::Gray => (v, v, v),
            Colormap::Jet => (
                (1.5 - (4.0 * v - 3.0).abs()).clamp(0.0, 1.0),
                (1.5 - (4.0 * v - 2.0).abs()).clamp(0.0, 1.0),
                (1.5 - (4.0 * v - 1.0).abs()).clamp(0.0, 1.0),
            ),
            Colormap::Hot => (
                (3.0 * v).clamp(0.0, 1.0),
                (3.0 * v - 1.0).clamp(0.0, 1.0),
                (3.0 * v - 2.0).clamp(0.0, 1.0),
            ),
        };
        Rgb([to_u8(r), to_u8(g), to_u8(b)])
    }

    pub fn name(&self) -> &'static str {
        match self {
            Colormap::Jet => "jet",
            Colormap::Gray => "gray",
            Colormap::Hot => "hot",
        }
    }
}

impl FromStr for Colormap {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "jet" => Ok(Colormap::Jet),
            "gray" | "grey" => Ok(Colormap::Gray),
            "hot" => Ok(Colormap::Hot),
            other => anyhow::bail!("Unknown colormap '{}' (expected jet, gray or hot)", other),
        }
    }
}

impl std::fmt::Display for Colormap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

fn to_u8(v: f32) -> u8 {
    (v * 255.0).round() as u8
}

/// Colourise a float channel, stretching its own min..max to the full map
pub fn colorize_channel(channel: &Channel, cmap: Colormap) -> RgbImage {
    let (lo, hi) = channel
        .pixels()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), p| {
            (lo.min(p[0]), hi.max(p[0]))
        });
    let span = hi - lo;
    let (w, h) = channel.dimensions();
    RgbImage::from_fn(w, h, |x, y| {
        let v = channel.get_pixel(x, y)[0];
        let norm = if span > 0.0 { (v - lo) / span } else { 0.0 };
        cmap.apply(norm)
    })
}

/// Colourise an 8-bit image over its full `[0, 255]` range
pub fn colorize_gray(image: &GrayImage, cmap: Colormap) -> RgbImage {
    let (w, h) = image.dimensions();
    RgbImage::from_fn(w, h, |x, y| cmap.apply(image.get_pixel(x, y)[0] as f32 / 255.0))
}

/// Draw every blob as an unfilled red circle
pub fn draw_blobs(figure: &mut RgbImage, blobs: &[Blob]) {
    for blob in blobs {
        let center = (blob.col.round() as i32, blob.row.round() as i32);
        let radius = blob.radius.round() as i32;
        for offset in 0..BLOB_LINE_WIDTH {
            draw_hollow_circle_mut(figure, center, radius + offset, BLOB_COLOR);
        }
    }
}

/// Lay panels out left to right on a white background
pub fn side_by_side(panels: &[RgbImage]) -> RgbImage {
    let height = panels.iter().map(|p| p.height()).max().unwrap_or(0);
    let width = panels.iter().map(|p| p.width()).sum::<u32>()
        + PANEL_GAP * (panels.len().saturating_sub(1) as u32);

    let mut canvas = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
    let mut x = 0i64;
    for panel in panels {
        image::imageops::overlay(&mut canvas, panel, x, 0);
        x += (panel.width() + PANEL_GAP) as i64;
    }
    canvas
}
