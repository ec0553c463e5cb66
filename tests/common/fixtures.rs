#![allow(dead_code)]

use blobcount::{Channel, Renderer};
use image::{ImageBuffer, Luma, Rgb, RgbImage};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use tempfile::TempDir;

/// Bright spot centres `(row, col)` used by [`spots_image`]
pub const SPOT_CENTERS: [(u32, u32); 2] = [(30, 30), (90, 85)];

/// Saves `img` as `name` inside a fresh temp directory.
/// Returns the directory (keep alive) and the image path.
pub fn save_rgb(img: &RgbImage, name: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let path = dir.path().join(name);
    img.save(&path).expect("Failed to save test image");
    (dir, path)
}

/// 120x120 RGB image: dim background with two Gaussian spots in the green channel
pub fn spots_image() -> RgbImage {
    ImageBuffer::from_fn(120, 120, |x, y| {
        let mut g = 10.0f32;
        for &(row, col) in &SPOT_CENTERS {
            let dx = x as f32 - col as f32;
            let dy = y as f32 - row as f32;
            g += 245.0 * (-(dx * dx + dy * dy) / (2.0 * 3.0 * 3.0)).exp();
        }
        Rgb([5u8, g.min(255.0) as u8, 5u8])
    })
}

/// RGB image where every pixel has the same value
pub fn flat_image(width: u32, height: u32, value: u8) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb([value, value, value]))
}

/// Float channel with a left-to-right ramp from 0 to 1
pub fn ramp_channel(width: u32, height: u32) -> Channel {
    ImageBuffer::from_fn(width, height, |x, _| {
        Luma([x as f32 / (width - 1) as f32])
    })
}

/// Float channel with every sample equal to `value`
pub fn flat_channel(width: u32, height: u32, value: f32) -> Channel {
    ImageBuffer::from_pixel(width, height, Luma([value]))
}

/// Renderer that remembers the name and size of every figure it was shown.
/// Clones share the same record.
#[derive(Clone, Default)]
pub struct RecordingRenderer {
    pub shown: Rc<RefCell<Vec<(String, (u32, u32))>>>,
}

impl RecordingRenderer {
    pub fn names(&self) -> Vec<String> {
        self.shown.borrow().iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn size_of(&self, name: &str) -> Option<(u32, u32)> {
        self.shown
            .borrow()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, size)| *size)
    }
}

impl Renderer for RecordingRenderer {
    fn show(&mut self, name: &str, figure: &RgbImage) -> anyhow::Result<()> {
        self.shown
            .borrow_mut()
            .push((name.to_string(), figure.dimensions()));
        Ok(())
    }
}
