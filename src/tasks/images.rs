// src/tasks/images.rs

use std::io::Cursor;

use anyhow::{anyhow, Result};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ImageFormat};
use tracing::{debug, info};

use crate::config::ImagesConfig;
use crate::graph::{BoxFuture, Settlement};
use crate::tasks::{Task, TaskContext};
use crate::watch::PatternSet;

/// Mirrors images into `dest`, re-encoding PNG and JPEG files when that
/// makes them smaller.
pub struct ImagesTask {
    config: ImagesConfig,
}

/// What happened to one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageAction {
    Optimised { before: usize, after: usize },
    Copied,
}

impl ImagesTask {
    pub fn new(config: ImagesConfig) -> Self {
        Self { config }
    }
}

impl Task for ImagesTask {
    fn run<'a>(&'a self, ctx: &'a TaskContext) -> BoxFuture<'a, Settlement> {
        Box::pin(async move {
            let files = match PatternSet::new(&self.config.src)
                .and_then(|p| p.expand(ctx.fs.as_ref(), &ctx.root))
            {
                Ok(files) => files,
                Err(err) => return Settlement::fatal("images", err),
            };

            let dest_dir = ctx.resolve(&self.config.dest);
            let mut processed = 0usize;
            let mut saved = 0usize;
            let mut errors = Vec::new();

            for file in &files {
                let dest = dest_dir.join(file.rel_to_base());

                // Only newer sources.
                if let (Some(src_time), Some(dest_time)) =
                    (ctx.fs.modified(&file.path), ctx.fs.modified(&dest))
                {
                    if dest_time >= src_time {
                        debug!(file = %file.rel, "unchanged; skipping");
                        continue;
                    }
                }

                let bytes = match ctx.fs.read(&file.path) {
                    Ok(b) => b,
                    Err(err) => return Settlement::fatal("images", err),
                };

                let quality = self.config.jpeg_quality;
                let result = tokio::task::spawn_blocking(move || optimise(bytes, quality)).await;
                let (output, action) = match result {
                    Ok(Ok(res)) => res,
                    Ok(Err(err)) => {
                        errors.push(format!("{}: {err:#}", file.rel));
                        continue;
                    }
                    Err(join_err) => {
                        return Settlement::fatal("images", anyhow!("image worker failed: {join_err}"))
                    }
                };

                if let Err(err) = ctx.fs.write(&dest, &output) {
                    return Settlement::fatal("images", err);
                }
                if let ImageAction::Optimised { before, after } = action {
                    saved += before - after;
                    debug!(file = %file.rel, before, after, "optimised");
                }
                processed += 1;
            }

            if !errors.is_empty() {
                return Settlement::recovered("imagemin", errors.join("\n"));
            }

            info!(files = processed, saved_bytes = saved, "images processed");
            if processed > 0 {
                ctx.reload.reload();
            }
            Settlement::Success
        })
    }
}

/// Re-encode PNG/JPEG data; other formats pass through unchanged.
///
/// The smaller of the original and the re-encoded bytes is returned.
pub fn optimise(bytes: Vec<u8>, jpeg_quality: u8) -> Result<(Vec<u8>, ImageAction)> {
    let format = match image::guess_format(&bytes) {
        Ok(f @ (ImageFormat::Png | ImageFormat::Jpeg)) => f,
        _ => return Ok((bytes, ImageAction::Copied)),
    };

    let img = image::load_from_memory_with_format(&bytes, format)?;
    let encoded = encode(&img, format, jpeg_quality)?;

    if encoded.len() < bytes.len() {
        let before = bytes.len();
        let after = encoded.len();
        Ok((encoded, ImageAction::Optimised { before, after }))
    } else {
        Ok((bytes, ImageAction::Copied))
    }
}

fn encode(img: &DynamicImage, format: ImageFormat, jpeg_quality: u8) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    match format {
        ImageFormat::Png => {
            let encoder =
                PngEncoder::new_with_quality(&mut out, CompressionType::Best, FilterType::Adaptive);
            img.write_with_encoder(encoder)?;
        }
        _ => {
            let encoder = JpegEncoder::new_with_quality(&mut out, jpeg_quality);
            DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(encoder)?;
        }
    }
    Ok(out.into_inner())
}
