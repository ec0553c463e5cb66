mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from blobcount for tests
pub use blobcount::{
    Blob, BlobCounter, BlobOptions, Channel, Colormap, LoadOptions, MarkerFile, NoRender,
    PngRenderer, Renderer, SuppressOptions,
};
