//! Image containers flowing through the pipelines.

use std::fmt;

/// Errors building images or image sequences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    /// Width or height is zero.
    EmptyImage,
    /// Data length does not match the dimensions.
    DataLength {
        /// Length implied by the dimensions.
        expected: usize,
        /// Length supplied.
        found: usize,
    },
    /// Sequences need at least one image.
    EmptySequence,
    /// All images in a sequence must share one size.
    SizeMismatch {
        /// Index of the offending image.
        index: usize,
        /// Size of the first image.
        expected: (usize, usize),
        /// Size of the offending image.
        found: (usize, usize),
    },
    /// Pixel storage could not be reserved.
    Allocation {
        /// Bytes requested.
        bytes: usize,
    },
}

impl fmt::Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageError::EmptyImage => write!(f, "image has a zero dimension"),
            ImageError::DataLength { expected, found } => {
                write!(f, "image data holds {found} values, {expected} expected")
            }
            ImageError::EmptySequence => write!(f, "image sequence is empty"),
            ImageError::SizeMismatch {
                index,
                expected,
                found,
            } => write!(
                f,
                "image {index} is {}x{}, sequence is {}x{}",
                found.0, found.1, expected.0, expected.1
            ),
            ImageError::Allocation { bytes } => write!(f, "cannot allocate {bytes} bytes"),
        }
    }
}

impl std::error::Error for ImageError {}

fn checked_len(width: usize, height: usize, per_pixel: usize) -> Result<usize, ImageError> {
    if width == 0 || height == 0 {
        return Err(ImageError::EmptyImage);
    }
    width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(per_pixel))
        .ok_or(ImageError::Allocation { bytes: usize::MAX })
}

pub(crate) fn try_buffer<T: Clone>(len: usize, fill: T) -> Result<Vec<T>, ImageError> {
    let mut v = Vec::new();
    v.try_reserve_exact(len).map_err(|_| ImageError::Allocation {
        bytes: len.saturating_mul(std::mem::size_of::<T>()),
    })?;
    v.resize(len, fill);
    Ok(v)
}

/// RGB image, triplet-interleaved row-major bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbImage {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl RgbImage {
    /// Wrap `data` (`3 * width * height` bytes).
    pub fn new(width: usize, height: usize, data: Vec<u8>) -> Result<Self, ImageError> {
        let expected = checked_len(width, height, 3)?;
        if data.len() != expected {
            return Err(ImageError::DataLength {
                expected,
                found: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Build from pixel triplets.
    pub fn from_pixels(
        width: usize,
        height: usize,
        pixels: &[(u8, u8, u8)],
    ) -> Result<Self, ImageError> {
        let data = pixels.iter().flat_map(|&(r, g, b)| [r, g, b]).collect();
        Self::new(width, height, data)
    }

    /// Width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Interleaved samples.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Pixels in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = (u8, u8, u8)> + '_ {
        self.data.chunks_exact(3).map(|p| (p[0], p[1], p[2]))
    }
}

/// Single-channel 8-bit image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrayImage {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
}

impl GrayImage {
    /// Wrap `pixels` (`width * height` bytes, row-major).
    pub fn new(width: usize, height: usize, pixels: Vec<u8>) -> Result<Self, ImageError> {
        let expected = checked_len(width, height, 1)?;
        if pixels.len() != expected {
            return Err(ImageError::DataLength {
                expected,
                found: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Row-major levels.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Level at column `x`, row `y`.
    pub fn get(&self, x: usize, y: usize) -> Option<u8> {
        if x >= self.width {
            return None;
        }
        self.pixels.get(y * self.width + x).copied()
    }
}

/// Character image, printed one row per line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsciiArt {
    width: usize,
    height: usize,
    symbols: Vec<char>,
}

impl AsciiArt {
    /// Wrap `symbols` (`width * height`, row-major).
    pub fn new(width: usize, height: usize, symbols: Vec<char>) -> Result<Self, ImageError> {
        let expected = checked_len(width, height, 1)?;
        if symbols.len() != expected {
            return Err(ImageError::DataLength {
                expected,
                found: symbols.len(),
            });
        }
        Ok(Self {
            width,
            height,
            symbols,
        })
    }

    /// Width in characters.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in lines.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Rows as strings.
    pub fn rows(&self) -> impl Iterator<Item = String> + '_ {
        self.symbols
            .chunks_exact(self.width)
            .map(|row| row.iter().collect())
    }

    /// Symbols in row-major order.
    pub fn symbols(&self) -> &[char] {
        &self.symbols
    }
}

impl fmt::Display for AsciiArt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.symbols.chunks_exact(self.width) {
            for c in row {
                write!(f, "{c}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Same-size images served one per period, cycling forever.
#[derive(Debug, Clone)]
pub struct ImageSequence {
    images: Vec<RgbImage>,
    next: usize,
}

impl ImageSequence {
    /// Sequence over `images`, which must be non-empty and equally sized.
    pub fn new(images: Vec<RgbImage>) -> Result<Self, ImageError> {
        let first = images.first().ok_or(ImageError::EmptySequence)?;
        let expected = (first.width, first.height);
        if let Some((index, img)) = images
            .iter()
            .enumerate()
            .find(|(_, img)| (img.width, img.height) != expected)
        {
            return Err(ImageError::SizeMismatch {
                index,
                expected,
                found: (img.width, img.height),
            });
        }
        Ok(Self { images, next: 0 })
    }

    /// Width shared by all images.
    pub fn width(&self) -> usize {
        self.images[0].width
    }

    /// Height shared by all images.
    pub fn height(&self) -> usize {
        self.images[0].height
    }

    /// Distinct images before the sequence repeats.
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// Never true; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Next image, wrapping to the first after the last.
    pub fn next_image(&mut self) -> &RgbImage {
        let i = self.next;
        self.next = (self.next + 1) % self.images.len();
        &self.images[i]
    }
}
