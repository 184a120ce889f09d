//! Image to input tensor conversion.
//!
//! The image is resized to the exact target size (aspect ratio is not preserved), coerced to
//! 8-bit RGB and scaled to `[0, 1]`. The result is a `(1, height, width, 3)` f32 tensor.

use std::fmt;
use std::io::Cursor;
use std::path::Path;
use std::str::FromStr;

use image::imageops::FilterType;
use image::{ColorType, DynamicImage, RgbImage};
use serde::Deserialize;
use tract_core::prelude::*;

use crate::errors::{ClassifyError, Result};

pub const DEFAULT_SIZE: u32 = 224;

/// Spatial size of the model input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct TargetSize {
    pub height: u32,
    pub width: u32,
}

impl TargetSize {
    pub fn square(side: u32) -> TargetSize {
        TargetSize { height: side, width: side }
    }

    /// Shape of the batched NHWC tensor.
    pub fn input_shape(&self) -> [usize; 4] {
        [1, self.height as usize, self.width as usize, 3]
    }
}

impl Default for TargetSize {
    fn default() -> TargetSize {
        TargetSize::square(DEFAULT_SIZE)
    }
}

impl fmt::Display for TargetSize {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}x{}", self.height, self.width)
    }
}

/// Resampling filter used for the resize step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
    Nearest,
    Triangle,
    #[default]
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl Filter {
    fn as_image_filter(self) -> FilterType {
        match self {
            Filter::Nearest => FilterType::Nearest,
            Filter::Triangle => FilterType::Triangle,
            Filter::CatmullRom => FilterType::CatmullRom,
            Filter::Gaussian => FilterType::Gaussian,
            Filter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

impl FromStr for Filter {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Filter, String> {
        match &*s.to_ascii_lowercase() {
            "nearest" => Ok(Filter::Nearest),
            "triangle" | "bilinear" => Ok(Filter::Triangle),
            "catmullrom" | "bicubic" => Ok(Filter::CatmullRom),
            "gaussian" => Ok(Filter::Gaussian),
            "lanczos3" | "lanczos" => Ok(Filter::Lanczos3),
            _ => Err(format!("unknown resize filter {s:?}")),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PreprocessOptions {
    pub target_size: TargetSize,
    pub filter: Filter,
}

impl PreprocessOptions {
    pub fn with_target_size(self, target_size: TargetSize) -> PreprocessOptions {
        PreprocessOptions { target_size, ..self }
    }

    pub fn with_filter(self, filter: Filter) -> PreprocessOptions {
        PreprocessOptions { filter, ..self }
    }

    pub fn validate(&self) -> Result<()> {
        if self.target_size.height == 0 || self.target_size.width == 0 {
            return Err(ClassifyError::Config(format!(
                "target size must be non-empty, got {}",
                self.target_size
            )));
        }
        Ok(())
    }
}

/// Decodes an image file, guessing the format from its content rather than its extension.
pub fn decode_path(path: impl AsRef<Path>) -> Result<DynamicImage> {
    let path = path.as_ref();
    let decode = || -> std::result::Result<DynamicImage, image::ImageError> {
        image::io::Reader::open(path)?.with_guessed_format()?.decode()
    };
    decode()
        .map_err(|source| ClassifyError::Decode { origin: path.display().to_string(), source })
}

pub fn decode_bytes(bytes: &[u8]) -> Result<DynamicImage> {
    let decode = || -> std::result::Result<DynamicImage, image::ImageError> {
        image::io::Reader::new(Cursor::new(bytes)).with_guessed_format()?.decode()
    };
    decode().map_err(|source| ClassifyError::Decode {
        origin: format!("<{} bytes in memory>", bytes.len()),
        source,
    })
}

/// Converts a decoded image into the model input tensor.
pub fn preprocess(image: &DynamicImage, options: &PreprocessOptions) -> Result<Tensor> {
    options.validate()?;
    let TargetSize { height, width } = options.target_size;
    let resized = image.resize_exact(width, height, options.filter.as_image_filter());
    let rgb = to_rgb(&resized)?;
    debug_assert_eq!(rgb.dimensions(), (width, height));
    let tensor: Tensor = tract_ndarray::Array4::from_shape_fn(
        (1, height as usize, width as usize, 3),
        |(_, y, x, c)| rgb[(x as u32, y as u32)][c] as f32 / 255.0,
    )
    .into();
    Ok(tensor)
}

pub fn preprocess_path(path: impl AsRef<Path>, options: &PreprocessOptions) -> Result<Tensor> {
    preprocess(&decode_path(path)?, options)
}

pub fn preprocess_bytes(bytes: &[u8], options: &PreprocessOptions) -> Result<Tensor> {
    preprocess(&decode_bytes(bytes)?, options)
}

fn to_rgb(image: &DynamicImage) -> Result<RgbImage> {
    match image.color() {
        ColorType::L8
        | ColorType::La8
        | ColorType::Rgb8
        | ColorType::Rgba8
        | ColorType::L16
        | ColorType::La16
        | ColorType::Rgb16
        | ColorType::Rgba16
        | ColorType::Rgb32F
        | ColorType::Rgba32F => Ok(image.to_rgb8()),
        // ColorType is non_exhaustive; only modes added by later image releases land here.
        mode => Err(ClassifyError::UnsupportedMode { mode }),
    }
}
