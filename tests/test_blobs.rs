//! Integration tests for difference-of-Gaussians blob detection.
//!
//! Tests cover:
//! - Finding synthetic spots at their true positions
//! - radius = sigma * sqrt(2) for every blob
//! - Flat images yielding no blobs (and still rendering)
//! - Parameter validation and overlap geometry

mod common;

use blobcount::detection::blobs::blob_overlap;
use blobcount::{adjust_image, blob_dog, detect_blobs, load_image};
use std::f64::consts::SQRT_2;

use common::*;

fn small_scales() -> BlobOptions {
    BlobOptions::new().with_max_sigma(10.0)
}

/// Full-range stretch keeps the synthetic spots Gaussian instead of clipped
fn full_range() -> SuppressOptions {
    SuppressOptions::new().with_percentiles(0.0, 100.0)
}

#[test]
fn test_detects_synthetic_spots() -> anyhow::Result<()> {
    // 1. Load the green channel of a two-spot image
    let (_dir, path) = save_rgb(&spots_image(), "spots.png");
    let loaded = load_image(Some(path.as_path()), &LoadOptions::new(), &mut NoRender)?;

    // 2. Suppress background and detect
    let processed = adjust_image(&loaded.channel, &full_range(), &mut NoRender)?;
    let blobs = detect_blobs(&loaded.channel, &processed, &small_scales(), &mut NoRender)?;

    // 3. Every spot is found, and nothing else
    assert_eq!(blobs.len(), SPOT_CENTERS.len(), "blobs: {:?}", blobs);
    for &(row, col) in &SPOT_CENTERS {
        assert!(
            blobs.iter().any(|b| {
                (b.row - row as f64).abs() <= 2.0 && (b.col - col as f64).abs() <= 2.0
            }),
            "no blob near ({}, {}): {:?}",
            row,
            col,
            blobs
        );
    }

    Ok(())
}

#[test]
fn test_radius_is_sigma_times_sqrt2() -> anyhow::Result<()> {
    let (_dir, path) = save_rgb(&spots_image(), "spots.png");
    let loaded = load_image(Some(path.as_path()), &LoadOptions::new(), &mut NoRender)?;
    let processed = adjust_image(&loaded.channel, &SuppressOptions::new(), &mut NoRender)?;

    let options = small_scales();
    let sigmas = options.sigma_list();
    let blobs = blob_dog(&processed.to_float(), &options)?;
    assert!(!blobs.is_empty());

    for blob in &blobs {
        assert!(blob.radius >= 0.0);
        assert!(
            sigmas.iter().any(|s| blob.radius == s * SQRT_2),
            "radius {} is not a detector scale times sqrt(2)",
            blob.radius
        );
    }

    Ok(())
}

#[test]
fn test_sigma_list_follows_ratio() {
    let sigmas = BlobOptions::new().sigma_list();

    // ln(30) / ln(1.6) + 1 = 8.24 -> k = 8 -> nine scales
    assert_eq!(sigmas.len(), 9);
    assert_eq!(sigmas[0], 1.0);
    assert!((sigmas[1] - 1.6).abs() < 1e-12);
    assert!(sigmas.windows(2).all(|w| w[1] > w[0]));

    let tighter = BlobOptions::new().with_max_sigma(10.0).sigma_list();
    assert_eq!(tighter.len(), 6);
}

#[test]
fn test_flat_image_has_no_blobs() -> anyhow::Result<()> {
    let channel = flat_channel(40, 30, 0.5);
    let processed = adjust_image(&channel, &SuppressOptions::new(), &mut NoRender)?;

    let mut renderer = RecordingRenderer::default();
    let blobs = detect_blobs(&channel, &processed, &small_scales(), &mut renderer)?;

    assert!(blobs.is_empty());
    // Figure still drawn: three 40-wide panels with two 8px gaps
    assert_eq!(renderer.size_of("blobs"), Some((3 * 40 + 2 * 8, 30)));

    Ok(())
}

#[test]
fn test_threshold_parameter_is_honoured() -> anyhow::Result<()> {
    let (_dir, path) = save_rgb(&spots_image(), "spots.png");
    let loaded = load_image(Some(path.as_path()), &LoadOptions::new(), &mut NoRender)?;
    let processed = adjust_image(&loaded.channel, &SuppressOptions::new(), &mut NoRender)?;

    // Normalised DoG responses on a [0, 1] image stay far below 100
    let options = small_scales().with_threshold(100.0);
    let blobs = detect_blobs(&loaded.channel, &processed, &options, &mut NoRender)?;
    assert!(blobs.is_empty());

    Ok(())
}

#[test]
fn test_mismatched_images_are_rejected() -> anyhow::Result<()> {
    let processed = adjust_image(&ramp_channel(20, 20), &SuppressOptions::new(), &mut NoRender)?;
    let other = ramp_channel(21, 20);

    assert!(detect_blobs(&other, &processed, &small_scales(), &mut NoRender).is_err());

    Ok(())
}

#[test]
fn test_invalid_options_are_rejected() {
    let channel = ramp_channel(10, 10);

    assert!(blob_dog(&channel, &BlobOptions::new().with_min_sigma(0.0)).is_err());
    assert!(blob_dog(&channel, &BlobOptions::new().with_max_sigma(0.5)).is_err());
    assert!(blob_dog(&channel, &BlobOptions::new().with_overlap(1.5)).is_err());
    assert!(blob_dog(&channel, &BlobOptions::new().with_max_sigma(f64::INFINITY)).is_err());
    assert!(blob_dog(&channel, &BlobOptions::new().with_max_sigma(f64::NAN)).is_err());
    assert!(blob_dog(&channel, &BlobOptions::new().with_threshold(f64::INFINITY)).is_err());
}

#[test]
fn test_blob_overlap_geometry() {
    let a = Blob::from_sigma(10.0, 10.0, 2.0);
    let far = Blob::from_sigma(10.0, 30.0, 2.0);
    let inside = Blob::from_sigma(10.5, 10.0, 1.0);
    let partial = Blob::from_sigma(10.0, 13.0, 2.0);

    assert_eq!(blob_overlap(&a, &a), 1.0);
    assert_eq!(blob_overlap(&a, &far), 0.0);
    assert_eq!(blob_overlap(&a, &inside), 1.0);

    let frac = blob_overlap(&a, &partial);
    assert!(frac > 0.0 && frac < 1.0, "partial overlap was {}", frac);
    assert!((frac - blob_overlap(&partial, &a)).abs() < 1e-12);
}
