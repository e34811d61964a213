use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use photobooth::booth::{Photobooth, SnapRequest};
use photobooth::capture::RawFrame;
use photobooth::config::BoothConfig;
use photobooth::core::{DataUrl, EncodedImage};
use photobooth::session::CacheKey;
use photobooth::upload::PrepareOptions;
use serde_json::json;
use tracing::{Level, info, warn};

/// Run one guest through the booth:
/// capture, AI transform, before/after GIF, uploads and QR codes.
#[derive(Parser, Debug)]
#[command(name = "photobooth")]
#[command(about = "📸 Turn a camera frame into a restyled photo, a GIF and download QR codes")]
#[command(long_about = "Runs the photobooth pipeline end to end on an image file.
The still is cropped to 9:16 (or 16:9 with --landscape), sent to the AI transform,
fitted back to the capture size, paired with the original in a GIF, and uploaded.
Results land in the output directory.")]
struct Args {
    /// Camera frame to process
    #[arg(help = "Input image (PNG, JPEG, WebP or GIF)")]
    input: PathBuf,

    #[arg(short, long, default_value = "booth-output", help = "Directory for the GIF, QR codes and result.json")]
    output_dir: PathBuf,

    #[arg(short, long, default_value = "default", help = "Prompt mode; 'custom' uses --custom-prompt")]
    mode: String,

    #[arg(short, long, default_value = "Restyle this photo as a vivid comic book panel",
          help = "Prompt sent to the AI transform")]
    prompt: String,

    #[arg(long, help = "User prompt for the 'custom' mode")]
    custom_prompt: Option<String>,

    /// Camera sensor is mounted sideways
    #[arg(long, help = "Rotate the frame 90° before fitting it to the session aspect")]
    rotate: bool,

    #[arg(long, help = "Capture 16:9 stills instead of 9:16")]
    landscape: bool,

    #[arg(long, help = "Keep the camera's orientation instead of mirroring like a selfie")]
    no_mirror: bool,

    #[arg(long, help = "AI transform endpoint (overrides PHOTOBOOTH_TRANSFORM_URL)")]
    transform_url: Option<String>,

    #[arg(long, help = "Upload endpoint (overrides PHOTOBOOTH_UPLOAD_URL); local storage when unset")]
    upload_url: Option<String>,

    #[arg(long, help = "Watermark PNG (overrides WATERMARK_FILE_PATH)")]
    watermark: Option<PathBuf>,

    #[arg(long, help = "Model requested from the AI transform")]
    model: Option<String>,

    #[arg(short, long, help = "Enable debug logging")]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = BoothConfig::from_env()?;
    apply_overrides(&mut config, &args);
    config.validate().map_err(anyhow::Error::msg)?;

    let level = if config.debug_logs { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).with_target(false).init();

    let booth = Photobooth::builder().from_config(&config)?.build()?;

    let bytes = tokio::fs::read(&args.input)
        .await
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let frame = RawFrame::from_encoded(&EncodedImage::sniff(bytes))?;

    let request = match args.custom_prompt.clone() {
        Some(custom) if args.mode == photobooth::booth::CUSTOM_MODE => SnapRequest::custom(custom),
        _ => SnapRequest::new(args.mode.clone(), args.prompt.clone()),
    };
    let id = booth.snap_frame(frame, args.rotate, request).await?;

    let session = booth.session();
    if let Some(message) = session.photo(id).and_then(|photo| photo.error) {
        anyhow::bail!("{}", message);
    }

    if booth.make_gif().await.is_none() {
        warn!("GIF could not be assembled");
    }
    let ready = booth.prepare_downloads(Some(id), PrepareOptions::default()).await;

    tokio::fs::create_dir_all(&args.output_dir)
        .await
        .with_context(|| format!("Failed to create {}", args.output_dir.display()))?;

    let mut files = Vec::new();
    if let Some(output) = session.output(id) {
        let name = format!("photo.{}", output.extension());
        write_file(&args.output_dir, &name, output.bytes()).await?;
        files.push(name);
    }
    if let Some(gif) = session.gif() {
        write_file(&args.output_dir, "photo.gif", gif.bytes()).await?;
        files.push("photo.gif".to_string());
    }
    let qr_codes = session.qr_codes();
    for (name, qr) in [("qr-photo.png", &qr_codes.photo), ("qr-gif.png", &qr_codes.gif)] {
        if let Some(qr) = qr {
            write_data_url(&args.output_dir, name, qr).await?;
            files.push(name.to_string());
        }
    }

    let result = json!({
        "photoId": id,
        "ready": ready,
        "status": session.prepared_status(id),
        "meta": session.meta(id),
        "photoUrl": session.cloud_url(CacheKey::Photo(id)),
        "gifUrl": session.cloud_url(CacheKey::Gif),
        "files": files,
    });
    let json = serde_json::to_vec_pretty(&result)?;
    write_file(&args.output_dir, "result.json", &json).await?;

    info!(
        ready,
        output_dir = %args.output_dir.display(),
        "Session complete"
    );
    if !ready {
        anyhow::bail!("Downloads could not be prepared");
    }
    Ok(())
}

/// Command-line flags win over the environment.
fn apply_overrides(config: &mut BoothConfig, args: &Args) {
    if let Some(url) = &args.transform_url {
        config.transform_url = Some(url.clone());
    }
    if let Some(url) = &args.upload_url {
        config.upload_url = Some(url.clone());
    }
    if let Some(path) = &args.watermark {
        config.watermark_path = path.clone();
    }
    if let Some(model) = &args.model {
        config.model = model.clone();
    }
    if args.landscape {
        config.portrait = false;
    }
    if args.no_mirror {
        config.mirror = false;
    }
    if args.debug {
        config.debug_logs = true;
    }
}

async fn write_data_url(dir: &Path, name: &str, url: &DataUrl) -> Result<()> {
    let bytes = url.decode()?;
    write_file(dir, name, &bytes).await
}

async fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> Result<()> {
    let path = dir.join(name);
    tokio::fs::write(&path, bytes)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}
