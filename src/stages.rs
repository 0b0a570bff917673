//! Pipeline stage logic: grayscale reduction, ASCII quantization, downscale.
//!
//! The functions here are pure and shared by all three execution regimes.
//! The graph regime wraps them in actors (`grayscale_actor`,
//! `ascii_actor`); the threaded regimes call the image-level helpers
//! directly.

use crate::actor::{Actor11, ActorError};
use crate::image::{try_buffer, AsciiArt, GrayImage, ImageError, RgbImage};
use std::fmt;

/// Red luminosity weight. The three weights sum to exactly 1.
pub const RED_WEIGHT: f64 = 0.3125;
/// Green luminosity weight.
pub const GREEN_WEIGHT: f64 = 0.5625;
/// Blue luminosity weight.
pub const BLUE_WEIGHT: f64 = 0.125;

/// Symbols from darkest to brightest.
pub const ASCII_RAMP: [char; 16] = [
    ' ', '.', ':', '-', '=', '+', '/', 't', 'z', 'U', 'w', '*', '0', '#', '%', '@',
];

/// Gray level of one pixel, exact.
pub fn gray(r: u8, g: u8, b: u8) -> f64 {
    RED_WEIGHT * f64::from(r) + GREEN_WEIGHT * f64::from(g) + BLUE_WEIGHT * f64::from(b)
}

/// Gray level truncated toward zero, the form stored in shared memory.
pub fn gray_byte(r: u8, g: u8, b: u8) -> u8 {
    // Never above 255.0 since the weights sum to 1.
    gray(r, g, b) as u8
}

/// Errors from [`Quantizer::new`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QuantizerError {
    /// Levels must be in `1..=16`.
    Levels(u16),
    /// Divisor must be finite and positive.
    Divisor(f64),
}

impl fmt::Display for QuantizerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuantizerError::Levels(n) => {
                write!(f, "{n} levels requested, 1..={} supported", ASCII_RAMP.len())
            }
            QuantizerError::Divisor(d) => write!(f, "divisor {d} must be finite and positive"),
        }
    }
}

impl std::error::Error for QuantizerError {}

/// Maps a gray level to a ramp symbol via `floor(levels * value / divisor)`.
///
/// Two granularities are in use: [`Quantizer::SIXTEEN`] (16 levels over
/// 256, the default, equal to `byte / 16`) and [`Quantizer::FIFTEEN`]
/// (15 levels over 255, which reaches the last symbol only at 255).
/// Indices are clamped into the ramp, so out-of-range inputs saturate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantizer {
    levels: u16,
    divisor: f64,
}

impl Quantizer {
    /// 16 levels, divisor 256.
    pub const SIXTEEN: Quantizer = Quantizer {
        levels: 16,
        divisor: 256.0,
    };

    /// 15 levels, divisor 255.
    pub const FIFTEEN: Quantizer = Quantizer {
        levels: 15,
        divisor: 255.0,
    };

    /// Custom granularity.
    pub fn new(levels: u16, divisor: f64) -> Result<Self, QuantizerError> {
        if levels == 0 || usize::from(levels) > ASCII_RAMP.len() {
            return Err(QuantizerError::Levels(levels));
        }
        if !divisor.is_finite() || divisor <= 0.0 {
            return Err(QuantizerError::Divisor(divisor));
        }
        Ok(Self { levels, divisor })
    }

    /// Preset for a level count (16 or 15).
    pub fn for_levels(levels: u16) -> Result<Self, QuantizerError> {
        match levels {
            16 => Ok(Self::SIXTEEN),
            15 => Ok(Self::FIFTEEN),
            other => Err(QuantizerError::Levels(other)),
        }
    }

    /// Level count.
    pub fn levels(&self) -> u16 {
        self.levels
    }

    /// Divisor.
    pub fn divisor(&self) -> f64 {
        self.divisor
    }

    /// Ramp index for `value`; NaN and negatives map to 0.
    pub fn index(&self, value: f64) -> usize {
        let scaled = (f64::from(self.levels) * value / self.divisor).floor();
        if scaled.is_nan() || scaled <= 0.0 {
            0
        } else {
            (scaled as usize).min(ASCII_RAMP.len() - 1)
        }
    }

    /// Ramp symbol for `value`.
    pub fn symbol(&self, value: f64) -> char {
        ASCII_RAMP[self.index(value)]
    }
}

impl Default for Quantizer {
    fn default() -> Self {
        Self::SIXTEEN
    }
}

/// Exact gray levels of every pixel, row-major.
pub fn grayscale_levels(image: &RgbImage) -> Vec<f64> {
    image.pixels().map(|(r, g, b)| gray(r, g, b)).collect()
}

/// Byte grayscale image.
pub fn gray_image(image: &RgbImage) -> Result<GrayImage, ImageError> {
    let mut pixels = try_buffer(image.width() * image.height(), 0u8)?;
    for (dst, (r, g, b)) in pixels.iter_mut().zip(image.pixels()) {
        *dst = gray_byte(r, g, b);
    }
    GrayImage::new(image.width(), image.height(), pixels)
}

/// ASCII art of a byte grayscale image.
pub fn ascii_art(image: &GrayImage, quantizer: &Quantizer) -> Result<AsciiArt, ImageError> {
    let symbols = image
        .pixels()
        .iter()
        .map(|&p| quantizer.symbol(f64::from(p)))
        .collect();
    AsciiArt::new(image.width(), image.height(), symbols)
}

/// ASCII art from exact gray levels.
pub fn ascii_from_levels(
    width: usize,
    height: usize,
    levels: &[f64],
    quantizer: &Quantizer,
) -> Result<AsciiArt, ImageError> {
    let symbols = levels.iter().map(|&v| quantizer.symbol(v)).collect();
    AsciiArt::new(width, height, symbols)
}

/// Halve both dimensions; each output pixel is the truncated mean of a
/// 2x2 block. A trailing odd row or column is dropped.
pub fn resize_half(image: &GrayImage) -> Result<GrayImage, ImageError> {
    let (w, h) = (image.width() / 2, image.height() / 2);
    let mut out = try_buffer(w * h, 0u8)?;
    let src = image.pixels();
    let stride = image.width();
    for y in 0..h {
        for x in 0..w {
            let (sx, sy) = (2 * x, 2 * y);
            let sum = u16::from(src[sy * stride + sx])
                + u16::from(src[sy * stride + sx + 1])
                + u16::from(src[(sy + 1) * stride + sx])
                + u16::from(src[(sy + 1) * stride + sx + 1]);
            out[y * w + x] = (sum / 4) as u8;
        }
    }
    GrayImage::new(w, h, out)
}

/// Actor consuming one RGB triplet and producing its exact gray level.
pub fn grayscale_actor(
    name: &str,
) -> Result<Actor11<u8, f64, impl FnMut(&[u8], &mut Vec<f64>) + Send>, ActorError> {
    Actor11::new(name, 3, 1, |rgb: &[u8], out: &mut Vec<f64>| {
        out.push(gray(rgb[0], rgb[1], rgb[2]))
    })
}

/// Actor mapping one gray level to one ramp symbol.
pub fn ascii_actor(
    name: &str,
    quantizer: Quantizer,
) -> Result<Actor11<f64, char, impl FnMut(&[f64], &mut Vec<char>) + Send>, ActorError> {
    Actor11::new(name, 1, 1, move |level: &[f64], out: &mut Vec<char>| {
        out.push(quantizer.symbol(level[0]))
    })
}
