use clap::Parser;
use std::path::PathBuf;

use blobcount::{
    BlobCounter, BlobOptions, Colormap, LoadOptions, NoRender, PngRenderer, Renderer,
    SuppressOptions,
};

#[derive(Parser)]
#[command(name = "blobcount")]
#[command(about = "Count bright blobs in a microscopy image and export ImageJ Cell Counter markers")]
struct Cli {
    /// Path to input image file (defaults to the bundled sample name)
    #[arg(value_name = "IMAGE")]
    image_path: Option<PathBuf>,

    /// Channel to analyse
    #[arg(short, long, default_value_t = 1)]
    channel: usize,

    /// Lower percentile for contrast stretching
    #[arg(long, default_value_t = 2.0)]
    lower: f64,

    /// Upper percentile for contrast stretching
    #[arg(long, default_value_t = 98.0)]
    upper: f64,

    /// Disk radius for the white top-hat filter (0 disables it)
    #[arg(long, default_value_t = 0)]
    filter_size: u8,

    /// Largest blob scale to search for
    #[arg(long, default_value_t = 30.0)]
    max_sigma: f64,

    /// Minimum blob response
    #[arg(long, default_value_t = 0.1)]
    threshold: f64,

    /// Colormap for rendered figures (jet, gray, hot)
    #[arg(long, default_value = "jet")]
    cmap: Colormap,

    /// Save figures as PNGs to directory (must be empty)
    #[arg(long, value_name = "DIR")]
    render_dir: Option<PathBuf>,

    /// Directory for the marker file (defaults to the image's directory)
    #[arg(long, value_name = "DIR")]
    out_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let renderer: Box<dyn Renderer> = match &args.render_dir {
        Some(dir) => Box::new(PngRenderer::new(dir)?),
        None => Box::new(NoRender),
    };

    let mut counter = BlobCounter::new()
        .with_load_options(
            LoadOptions::new()
                .with_channel(args.channel)
                .with_cmap(args.cmap)
                .with_show(args.render_dir.is_some()),
        )
        .with_suppress_options(
            SuppressOptions::new()
                .with_percentiles(args.lower, args.upper)
                .with_filter_size(args.filter_size)
                .with_cmap(args.cmap),
        )
        .with_blob_options(
            BlobOptions::new()
                .with_max_sigma(args.max_sigma)
                .with_threshold(args.threshold)
                .with_cmap(args.cmap),
        )
        .with_renderer(renderer);

    let (result, written) =
        counter.count_and_export(args.image_path.as_deref(), args.out_dir.as_deref())?;

    println!("\n=== Blob Detection Results ===");
    println!("Image: {}", result.source.display());
    println!("Total blobs detected: {}", result.count());

    if args.verbose && !result.blobs.is_empty() {
        println!("\nDetected blobs:");
        for (i, blob) in result.blobs.iter().enumerate() {
            println!(
                "  Blob {} at ({:.0}, {:.0}) - radius: {:.1}",
                i + 1,
                blob.col,
                blob.row,
                blob.radius
            );
        }
    }

    println!("\nMarkers saved to {}", written.display());

    Ok(())
}
