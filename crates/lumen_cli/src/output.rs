//! Writing the framebuffer to disk.

use anyhow::{Context, Result};
use clap::ValueEnum;
use lumen_renderer::{color_to_rgba, Framebuffer, CHANNELS};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// 8-bit RGBA PNG, gamma 2, top row first
    Png,
    /// Raw little-endian RGBA32F framebuffer dump in buffer order (bottom
    /// row first), no header
    Raw,
}

impl OutputFormat {
    /// Guess the format from a file extension, PNG unless it reads `.raw`.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("raw") => OutputFormat::Raw,
            _ => OutputFormat::Png,
        }
    }
}

pub fn write(framebuffer: &Framebuffer, path: &Path, format: OutputFormat) -> Result<()> {
    let written = match format {
        OutputFormat::Png => write_png(framebuffer, path),
        OutputFormat::Raw => write_raw(framebuffer, path),
    };
    written.with_context(|| format!("Failed to write {}", path.display()))?;

    log::info!(
        "Wrote {}x{} {:?} image to {}",
        framebuffer.width(),
        framebuffer.height(),
        format,
        path.display()
    );
    Ok(())
}

fn write_png(framebuffer: &Framebuffer, path: &Path) -> Result<()> {
    let data = framebuffer.snapshot();
    let row_len = framebuffer.width() as usize * CHANNELS;

    // Image files store the top row first, the framebuffer the bottom one
    let bytes: Vec<u8> = data
        .chunks_exact(row_len.max(1))
        .rev()
        .flat_map(|row| row.chunks_exact(CHANNELS))
        .flat_map(|px| color_to_rgba([px[0], px[1], px[2], px[3]]))
        .collect();

    let image = image::RgbaImage::from_raw(framebuffer.width(), framebuffer.height(), bytes)
        .context("Framebuffer size does not match its dimensions")?;
    image.save_with_format(path, image::ImageFormat::Png)?;
    Ok(())
}

fn write_raw(framebuffer: &Framebuffer, path: &Path) -> Result<()> {
    std::fs::write(path, le_bytes(framebuffer.snapshot()))?;
    Ok(())
}

/// Float samples as little-endian bytes.
#[cfg(target_endian = "little")]
fn le_bytes(data: Vec<f32>) -> Vec<u8> {
    bytemuck::cast_slice::<f32, u8>(&data).to_vec()
}

#[cfg(target_endian = "big")]
fn le_bytes(data: Vec<f32>) -> Vec<u8> {
    data.into_iter().flat_map(f32::to_le_bytes).collect()
}
