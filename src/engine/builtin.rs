use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageFormat, ImageReader, Limits, Rgb, RgbImage};
use log::{debug, info, warn};

use super::{verify_weights, ColorizationEngine};
use crate::configuration::ModelVariant;
use crate::error_handling::types::EngineError;
use crate::storage::ArtifactStore;

/// Side, in pixels, of the chroma map per unit of render factor.
pub const RENDER_BASE: u32 = 16;

/// Largest accepted width or height of a decoded image. Together with the
/// allocation cap it bounds the engine's memory by pixel count, since a
/// highly compressible file can declare far more pixels than its size suggests.
pub const MAX_IMAGE_SIDE: u32 = 8192;

/// Largest single buffer the decoder may allocate.
pub const MAX_DECODE_ALLOC: u64 = 256 * 1024 * 1024;

fn decode_limits() -> Limits {
    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_IMAGE_SIDE);
    limits.max_image_height = Some(MAX_IMAGE_SIDE);
    limits.max_alloc = Some(MAX_DECODE_ALLOC);
    limits
}

/// Luminance-indexed colour ramp. Only the chroma of a stop is used; the
/// luminance always comes from the source image.
#[derive(Debug, Clone)]
struct Palette {
    stops: Vec<(f32, [f32; 3])>,
    saturation: f32,
}

impl Palette {
    fn for_variant(variant: ModelVariant) -> Self {
        match variant {
            ModelVariant::Artistic => Palette {
                stops: vec![
                    (0.0, [38.0, 30.0, 64.0]),
                    (0.3, [92.0, 58.0, 44.0]),
                    (0.6, [176.0, 138.0, 96.0]),
                    (0.85, [148.0, 182.0, 206.0]),
                    (1.0, [250.0, 244.0, 230.0]),
                ],
                saturation: 1.0,
            },
            ModelVariant::Stable => Palette {
                stops: vec![
                    (0.0, [34.0, 38.0, 46.0]),
                    (0.45, [120.0, 104.0, 86.0]),
                    (0.8, [170.0, 178.0, 180.0]),
                    (1.0, [242.0, 238.0, 230.0]),
                ],
                saturation: 0.65,
            },
        }
    }

    fn sample(&self, luma: u8) -> Rgb<u8> {
        let t = luma as f32 / 255.0;
        let upper = self
            .stops
            .iter()
            .position(|(at, _)| *at >= t)
            .unwrap_or(self.stops.len() - 1);
        let rgb = if upper == 0 {
            self.stops[0].1
        } else {
            let (t0, c0) = self.stops[upper - 1];
            let (t1, c1) = self.stops[upper];
            let w = if t1 > t0 { (t - t0) / (t1 - t0) } else { 0.0 };
            [
                c0[0] + (c1[0] - c0[0]) * w,
                c0[1] + (c1[1] - c0[1]) * w,
                c0[2] + (c1[2] - c0[2]) * w,
            ]
        };
        Rgb([to_u8(rgb[0]), to_u8(rgb[1]), to_u8(rgb[2])])
    }
}

/// In-process colorizer.
///
/// The chroma map is rendered on a `render_factor * RENDER_BASE` square
/// canvas, smoothed, resized back to the source dimensions and recombined
/// with the untouched full-resolution luminance. Cost grows with the square
/// of the render factor, independently of the input size.
pub struct BuiltinEngine {
    variant: ModelVariant,
    palette: Palette,
    store: ArtifactStore,
    processed: u64,
}

impl BuiltinEngine {
    pub fn new(variant: ModelVariant, weights: &Path, store: ArtifactStore) -> Result<Self, EngineError> {
        let size = verify_weights(weights)?;
        info!(
            "Loaded {} weights from {} ({} byte(s))",
            variant.as_str(),
            weights.display(),
            size
        );

        Ok(Self {
            variant,
            palette: Palette::for_variant(variant),
            store,
            processed: 0,
        })
    }

    fn colorize(&self, image: &DynamicImage, render_factor: u32) -> RgbImage {
        let luma: GrayImage = image.to_luma8();
        let (width, height) = luma.dimensions();
        let render_factor = render_factor.max(1);
        let render_size = render_factor * RENDER_BASE;

        let small = imageops::resize(&luma, render_size, render_size, FilterType::Triangle);
        let tint = RgbImage::from_fn(render_size, render_size, |x, y| {
            self.palette.sample(small.get_pixel(x, y)[0])
        });
        let tint = imageops::blur(&tint, render_factor as f32 / 8.0);
        let tint = imageops::resize(&tint, width, height, FilterType::CatmullRom);

        let saturation = self.palette.saturation;
        RgbImage::from_fn(width, height, |x, y| {
            let y_full = luma.get_pixel(x, y)[0] as f32;
            let (cb, cr) = chroma(tint.get_pixel(x, y));
            Rgb(to_rgb(y_full, cb * saturation, cr * saturation))
        })
    }
}

impl ColorizationEngine for BuiltinEngine {
    fn name(&self) -> &'static str {
        "builtin"
    }

    fn transform(&mut self, input: &Path, render_factor: u32) -> Result<PathBuf, EngineError> {
        let io_error = |source: std::io::Error| EngineError::Io {
            path: input.to_path_buf(),
            source,
        };
        let mut reader = ImageReader::open(input)
            .map_err(io_error)?
            .with_guessed_format()
            .map_err(io_error)?;
        reader.limits(decode_limits());
        let image = reader.decode().map_err(|e| {
            warn!("Refusing to colorize {}: {}", input.display(), e);
            EngineError::from(e)
        })?;
        debug!(
            "Colorizing {} ({}x{}) with {} model, render_factor={}",
            input.display(),
            image.width(),
            image.height(),
            self.variant.as_str(),
            render_factor
        );

        let colorized = self.colorize(&image, render_factor);
        let mut encoded = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(colorized).write_to(&mut encoded, ImageFormat::Png)?;

        let output = self.store.allocate_output_path(".png");
        self.store.write_output(&output, encoded.get_ref())?;
        self.processed += 1;
        debug!("Builtin engine has processed {} image(s)", self.processed);

        Ok(output)
    }
}

/// Chroma of an RGB pixel, centred on zero (BT.601).
fn chroma(pixel: &Rgb<u8>) -> (f32, f32) {
    let [r, g, b] = pixel.0.map(|c| c as f32);
    let cb = -0.168_736 * r - 0.331_264 * g + 0.5 * b;
    let cr = 0.5 * r - 0.418_688 * g - 0.081_312 * b;
    (cb, cr)
}

fn to_rgb(y: f32, cb: f32, cr: f32) -> [u8; 3] {
    [
        to_u8(y + 1.402 * cr),
        to_u8(y - 0.344_136 * cb - 0.714_136 * cr),
        to_u8(y + 1.772 * cb),
    ]
}

fn to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
