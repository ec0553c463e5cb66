use anyhow::{Context, Result};
use image::{DynamicImage, ImageBuffer, ImageReader, Luma};
use std::path::Path;

use crate::models::{Channel, LoadedImage};
use crate::render::{colorize_channel, Colormap, Renderer};

/// Image read when no path is given
pub const DEFAULT_IMAGE: &str = "Drd2_Adult_S_conf_25X_CPU1_cryo_NAV.jpg";

/// Options for reading one channel out of an image file
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub channel: usize,
    pub cmap: Colormap,
    pub show: bool,
}

impl LoadOptions {
    pub fn new() -> Self {
        Self {
            channel: 1,
            cmap: Colormap::Jet,
            show: true,
        }
    }

    pub fn with_channel(mut self, channel: usize) -> Self {
        self.channel = channel;
        self
    }

    pub fn with_cmap(mut self, cmap: Colormap) -> Self {
        self.cmap = cmap;
        self
    }

    pub fn with_show(mut self, show: bool) -> Self {
        self.show = show;
        self
    }
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Read an image, keep one channel and hand it to the renderer if requested.
///
/// `None` falls back to [`DEFAULT_IMAGE`] in the current directory.
pub fn load_image(
    path: Option<&Path>,
    options: &LoadOptions,
    renderer: &mut dyn Renderer,
) -> Result<LoadedImage> {
    let path = path.unwrap_or_else(|| Path::new(DEFAULT_IMAGE));
    let stem = file_stem(path)?;

    log::debug!("Loading image: {}", path.display());
    let img = ImageReader::open(path)
        .with_context(|| format!("Failed to open image {}", path.display()))?
        .with_guessed_format()
        .with_context(|| format!("Failed to read image {}", path.display()))?
        .decode()
        .map_err(|e| anyhow::anyhow!("Failed to decode image {}: {}", path.display(), e))?;

    log::debug!(
        "Image loaded: {}x{}, {:?}",
        img.width(),
        img.height(),
        img.color()
    );

    let channel = extract_channel(&img, options.channel)?;

    if options.show {
        renderer.show("channel", &colorize_channel(&channel, options.cmap))?;
    }

    Ok(LoadedImage {
        channel,
        stem,
        source: path.to_path_buf(),
    })
}

/// File name without its final extension; directory components are dropped
pub fn file_stem(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Cannot derive a file stem from {}", path.display()))
}

/// Pull one channel out of a decoded image, normalised to `[0, 1]`.
///
/// Grey images have one channel (two with alpha); colour images three or four.
pub fn extract_channel(img: &DynamicImage, channel: usize) -> Result<Channel> {
    let depth = img.color().channel_count() as usize;
    if channel >= depth {
        anyhow::bail!(
            "Channel index {} out of range for image with {} channel(s)",
            channel,
            depth
        );
    }

    let (w, h) = (img.width(), img.height());
    let out = if depth <= 2 {
        let la = img.to_luma_alpha32f();
        ImageBuffer::from_fn(w, h, |x, y| Luma([la.get_pixel(x, y)[channel]]))
    } else {
        let rgba = img.to_rgba32f();
        ImageBuffer::from_fn(w, h, |x, y| Luma([rgba.get_pixel(x, y)[channel]]))
    };

    Ok(out)
}
