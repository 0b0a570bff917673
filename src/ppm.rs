//! Plain (`P3`) PPM reading and writing.
//!
//! The reader splits input into words on whitespace; `#` starts a comment
//! that runs to the end of the line, also in the middle of a word. Words
//! after the last expected sample are ignored.

use crate::image::{GrayImage, ImageError, RgbImage};
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Largest sample value a plain PPM may declare.
pub const MAX_SAMPLE_VALUE: u32 = 65535;

/// Samples reserved before any are read.
const INITIAL_SAMPLE_RESERVE: usize = 1 << 20;

/// Errors reading or writing PPM data.
#[derive(Debug)]
pub enum FormatError {
    /// Underlying I/O failure.
    Io(io::Error),
    /// The first word is not `P3`.
    BadMagic(String),
    /// Width, height or max value is missing, zero or out of range.
    InvalidHeader {
        /// Header field name.
        field: &'static str,
        /// Word found, empty if input ended.
        word: String,
    },
    /// A sample word is not a number.
    NonNumeric {
        /// Sample index.
        index: usize,
        /// Offending word.
        word: String,
    },
    /// A sample exceeds the declared max value.
    SampleOverflow {
        /// Sample index.
        index: usize,
        /// Sample value.
        value: u32,
        /// Declared max.
        max: u32,
    },
    /// The input ended before all samples were read.
    SampleCount {
        /// Samples implied by the header.
        expected: usize,
        /// Samples present.
        found: usize,
    },
    /// Decoded data does not form a valid image.
    Image(ImageError),
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::Io(e) => write!(f, "i/o error: {e}"),
            FormatError::BadMagic(word) => write!(f, "not a plain PPM file (magic '{word}')"),
            FormatError::InvalidHeader { field, word } => {
                write!(f, "invalid {field} '{word}'")
            }
            FormatError::NonNumeric { index, word } => {
                write!(f, "sample {index} is not a number: '{word}'")
            }
            FormatError::SampleOverflow { index, value, max } => {
                write!(f, "sample {index} is {value}, above max value {max}")
            }
            FormatError::SampleCount { expected, found } => {
                write!(f, "{found} samples found, dimensions require {expected}")
            }
            FormatError::Image(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for FormatError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FormatError::Io(e) => Some(e),
            FormatError::Image(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for FormatError {
    fn from(e: io::Error) -> Self {
        FormatError::Io(e)
    }
}

impl From<ImageError> for FormatError {
    fn from(e: ImageError) -> Self {
        FormatError::Image(e)
    }
}

/// Decoded PPM contents with samples at their declared scale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PpmImage {
    /// Width in pixels.
    pub width: usize,
    /// Height in pixels.
    pub height: usize,
    /// Declared max sample value.
    pub max_value: u32,
    /// Interleaved R, G, B samples.
    pub samples: Vec<u32>,
}

impl PpmImage {
    /// 8-bit RGB image, rescaling samples from `0..=max_value` to `0..=255`.
    pub fn to_rgb(&self) -> Result<RgbImage, FormatError> {
        let data = self
            .samples
            .iter()
            .map(|&s| {
                if self.max_value == 255 {
                    s as u8
                } else {
                    ((u64::from(s) * 255 + u64::from(self.max_value) / 2)
                        / u64::from(self.max_value)) as u8
                }
            })
            .collect();
        Ok(RgbImage::new(self.width, self.height, data)?)
    }

    /// PPM of an RGB image, max value 255.
    pub fn from_rgb(image: &RgbImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            max_value: 255,
            samples: image.data().iter().map(|&b| u32::from(b)).collect(),
        }
    }

    /// PPM of a grayscale image, each level repeated on R, G and B.
    pub fn from_gray(image: &GrayImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            max_value: 255,
            samples: image
                .pixels()
                .iter()
                .flat_map(|&p| [u32::from(p); 3])
                .collect(),
        }
    }
}

struct Words<R> {
    reader: R,
    line: String,
    pending: Vec<String>,
}

impl<R: BufRead> Words<R> {
    fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
            pending: Vec::new(),
        }
    }

    fn next_word(&mut self) -> Result<Option<String>, io::Error> {
        while self.pending.is_empty() {
            self.line.clear();
            if self.reader.read_line(&mut self.line)? == 0 {
                return Ok(None);
            }
            let content = self.line.split('#').next().unwrap_or_default();
            // Reversed so `pop` yields words in order.
            self.pending
                .extend(content.split_whitespace().rev().map(str::to_owned));
        }
        Ok(self.pending.pop())
    }
}

fn header_field<R: BufRead>(
    words: &mut Words<R>,
    field: &'static str,
    max: u32,
) -> Result<u32, FormatError> {
    let word = words.next_word()?.unwrap_or_default();
    match word.parse::<u32>() {
        Ok(v) if v != 0 && v <= max => Ok(v),
        _ => Err(FormatError::InvalidHeader { field, word }),
    }
}

fn reserve_samples(samples: &mut Vec<u32>, additional: usize) -> Result<(), FormatError> {
    samples.try_reserve(additional).map_err(|_| {
        FormatError::Image(ImageError::Allocation {
            bytes: (samples.len() + additional).saturating_mul(4),
        })
    })
}

/// Parse a plain PPM.
pub fn read_ppm<R: BufRead>(reader: R) -> Result<PpmImage, FormatError> {
    let mut words = Words::new(reader);
    let magic = words.next_word()?.unwrap_or_default();
    if magic != "P3" {
        return Err(FormatError::BadMagic(magic));
    }
    let width = header_field(&mut words, "width", u32::MAX)? as usize;
    let height = header_field(&mut words, "height", u32::MAX)? as usize;
    let max_value = header_field(&mut words, "max value", MAX_SAMPLE_VALUE)?;

    let expected = width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(3))
        .ok_or(ImageError::Allocation { bytes: usize::MAX })?;
    // The header is untrusted: reserve a bounded prefix and grow as samples arrive.
    let mut samples: Vec<u32> = Vec::new();
    reserve_samples(&mut samples, expected.min(INITIAL_SAMPLE_RESERVE))?;
    while samples.len() < expected {
        if samples.len() == samples.capacity() {
            let additional = (expected - samples.len()).min(samples.len().max(1));
            reserve_samples(&mut samples, additional)?;
        }
        let Some(word) = words.next_word()? else {
            return Err(FormatError::SampleCount {
                expected,
                found: samples.len(),
            });
        };
        let index = samples.len();
        let value = word
            .parse::<u32>()
            .map_err(|_| FormatError::NonNumeric { index, word })?;
        if value > max_value {
            return Err(FormatError::SampleOverflow {
                index,
                value,
                max: max_value,
            });
        }
        samples.push(value);
    }
    Ok(PpmImage {
        width,
        height,
        max_value,
        samples,
    })
}

/// Parse a plain PPM file.
pub fn read_ppm_file(path: impl AsRef<Path>) -> Result<PpmImage, FormatError> {
    let file = File::open(path)?;
    read_ppm(BufReader::new(file))
}

/// Serialize as plain PPM, one tab-separated pixel per line.
pub fn write_ppm<W: Write>(mut writer: W, image: &PpmImage) -> Result<(), FormatError> {
    writeln!(writer, "P3")?;
    writeln!(writer, "{} {}", image.width, image.height)?;
    writeln!(writer, "{}", image.max_value)?;
    writeln!(writer, "# R\tG\tB")?;
    for px in image.samples.chunks(3) {
        let mut fields = px.iter();
        if let Some(first) = fields.next() {
            write!(writer, "{first}")?;
        }
        for v in fields {
            write!(writer, "\t{v}")?;
        }
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write a plain PPM file.
pub fn write_ppm_file(path: impl AsRef<Path>, image: &PpmImage) -> Result<(), FormatError> {
    let file = File::create(path)?;
    write_ppm(BufWriter::new(file), image)
}
