pub mod detection;
pub mod markers;
pub mod models;
pub mod render;

pub use detection::blobs::{blob_dog, detect_blobs, BlobOptions};
pub use detection::loader::{load_image, LoadOptions, DEFAULT_IMAGE};
pub use detection::preprocessing::{adjust_image, SuppressOptions};
pub use detection::BlobCounter;
pub use markers::{save_for_imagej, Coordinate, Marker, MarkerFile, MarkerType};
pub use models::{Blob, Channel, CountResult, LoadedImage, ProcessedImage};
pub use render::{Colormap, NoRender, PngRenderer, Renderer};
