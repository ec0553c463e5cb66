pub mod blobs;
pub mod loader;
pub mod preprocessing;

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::markers::MarkerFile;
use crate::models::CountResult;
use crate::render::{NoRender, Renderer};
use blobs::BlobOptions;
use loader::LoadOptions;
use preprocessing::SuppressOptions;

/// Runs load -> background suppression -> blob detection on one image
pub struct BlobCounter {
    pub load: LoadOptions,
    pub suppress: SuppressOptions,
    pub blobs: BlobOptions,
    renderer: Box<dyn Renderer>,
}

impl BlobCounter {
    pub fn new() -> Self {
        Self {
            load: LoadOptions::default(),
            suppress: SuppressOptions::default(),
            blobs: BlobOptions::default(),
            renderer: Box::new(NoRender),
        }
    }

    pub fn with_load_options(mut self, load: LoadOptions) -> Self {
        self.load = load;
        self
    }

    pub fn with_suppress_options(mut self, suppress: SuppressOptions) -> Self {
        self.suppress = suppress;
        self
    }

    pub fn with_blob_options(mut self, blobs: BlobOptions) -> Self {
        self.blobs = blobs;
        self
    }

    /// Send every intermediate figure to `renderer`
    pub fn with_renderer(mut self, renderer: Box<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Count blobs in the image at `path` (or the default image)
    pub fn count(&mut self, path: Option<&Path>) -> Result<CountResult> {
        let loaded = loader::load_image(path, &self.load, self.renderer.as_mut())?;
        log::info!(
            "Loaded {} ({}x{}, channel {})",
            loaded.source.display(),
            loaded.width(),
            loaded.height(),
            self.load.channel
        );

        let processed =
            preprocessing::adjust_image(&loaded.channel, &self.suppress, self.renderer.as_mut())?;

        let blobs = blobs::detect_blobs(
            &loaded.channel,
            &processed,
            &self.blobs,
            self.renderer.as_mut(),
        )?;

        Ok(CountResult {
            stem: loaded.stem,
            source: loaded.source,
            blobs,
        })
    }

    /// Count blobs and write `<stem>.xml`.
    ///
    /// Without `out_dir` the marker file lands next to the image.
    pub fn count_and_export(
        &mut self,
        path: Option<&Path>,
        out_dir: Option<&Path>,
    ) -> Result<(CountResult, PathBuf)> {
        let result = self.count(path)?;
        let dir = match out_dir {
            Some(dir) => dir.to_path_buf(),
            None => result
                .source
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
        };

        let written = MarkerFile::from_coords(&result.stem, &result.blobs)?.write_to_dir(&dir)?;
        Ok((result, written))
    }
}

impl Default for BlobCounter {
    fn default() -> Self {
        Self::new()
    }
}
