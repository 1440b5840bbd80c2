//! Contains various types needed across the crate.

use crate::{Result, SegmentError, MAX_COLORS, MAX_PIXELS, MIN_COLORS};
use palette::{cast::ComponentsAs, Srgba};
use std::fmt::Display;

/// This type is used to specify the exact number of colors `k` in the output.
///
/// This is a simple new type wrapper around `u16` with the invariant that it must be
/// in the range [`MIN_COLORS`]`..=`[`MAX_COLORS`].
///
/// # Examples
/// Out of range values given to [`ColorCount::from_clamped`] or `From<u8>` are silently clamped.
/// Use `try_into` to reject them instead.
/// ```
/// # use blobify::{ColorCount, SegmentError};
/// # fn main() -> Result<(), SegmentError> {
/// let k = ColorCount::from(16);
/// assert_eq!(ColorCount::from(0).into_inner(), 2);
/// assert_eq!(ColorCount::from_clamped(1024), ColorCount::MAX);
/// let k: ColorCount = 128u16.try_into()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ColorCount(u16);

impl ColorCount {
    /// The smallest supported color count (given by [`MIN_COLORS`]).
    pub const MIN: Self = Self(MIN_COLORS);

    /// The largest supported color count (given by [`MAX_COLORS`]).
    pub const MAX: Self = Self(MAX_COLORS);

    /// The color count used when none is specified.
    pub const DEFAULT: Self = Self(10);

    /// Gets the inner `u16` value.
    #[must_use]
    pub const fn into_inner(self) -> u16 {
        self.0
    }

    /// Gets the inner value as a `usize` for lengths and indexing.
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Creates a [`ColorCount`] by clamping the given `u16` into [`MIN_COLORS`]`..=`[`MAX_COLORS`].
    #[must_use]
    pub const fn from_clamped(value: u16) -> Self {
        if value < MIN_COLORS {
            Self::MIN
        } else if value > MAX_COLORS {
            Self::MAX
        } else {
            Self(value)
        }
    }
}

impl Default for ColorCount {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<ColorCount> for u16 {
    fn from(val: ColorCount) -> Self {
        val.into_inner()
    }
}

impl From<u8> for ColorCount {
    fn from(value: u8) -> Self {
        Self::from_clamped(value.into())
    }
}

impl TryFrom<u16> for ColorCount {
    type Error = SegmentError;

    fn try_from(value: u16) -> Result<Self> {
        if (MIN_COLORS..=MAX_COLORS).contains(&value) {
            Ok(Self(value))
        } else {
            Err(SegmentError::OutOfRange {
                value: value.into(),
                min: MIN_COLORS.into(),
                max: MAX_COLORS.into(),
            })
        }
    }
}

impl Display for ColorCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.into_inner())
    }
}

/// Validates that `len` bytes hold exactly `width * height` RGBA pixels,
/// returning the number of pixels.
pub(crate) fn check_rgba_len(len: usize, width: u32, height: u32) -> Result<usize> {
    if width == 0 || height == 0 {
        return Err(SegmentError::EmptyImage);
    }

    let pixels = width as usize * height as usize;
    let expected = pixels.saturating_mul(4);
    if pixels > MAX_PIXELS as usize || len != expected {
        Err(SegmentError::BufferSize { expected, actual: len })
    } else {
        Ok(pixels)
    }
}

/// A raster stored as three parallel `f32` channel planes (red, green, blue).
///
/// Pixels are in row-major order, so pixel `(x, y)` is at index `y * width + x`.
/// Alpha is dropped on input; the output of the pipeline is always fully opaque.
#[derive(Debug, Clone, PartialEq)]
pub struct Planes {
    /// The width of the raster.
    width: u32,
    /// The height of the raster.
    height: u32,
    /// The red, green, and blue channels.
    channels: [Vec<f32>; 3],
}

impl Planes {
    /// Splits an RGBA byte buffer into channel planes.
    ///
    /// # Errors
    /// Returns [`SegmentError::EmptyImage`] if either dimension is zero and
    /// [`SegmentError::BufferSize`] if `rgba.len() != width * height * 4`.
    pub fn from_rgba(rgba: &[u8], width: u32, height: u32) -> Result<Self> {
        let len = check_rgba_len(rgba.len(), width, height)?;
        let pixels: &[Srgba<u8>] = rgba.components_as();

        let mut channels = [
            Vec::with_capacity(len),
            Vec::with_capacity(len),
            Vec::with_capacity(len),
        ];

        for pixel in pixels {
            channels[0].push(f32::from(pixel.red));
            channels[1].push(f32::from(pixel.green));
            channels[2].push(f32::from(pixel.blue));
        }

        Ok(Self { width, height, channels })
    }

    /// Returns the width of the raster.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Returns the height of the raster.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Returns `(width, height)`.
    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Returns the number of pixels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels[0].len()
    }

    /// Whether the raster has no pixels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the color of the pixel at index `i`.
    #[must_use]
    #[inline]
    pub fn color(&self, i: usize) -> [f32; 3] {
        let [r, g, b] = &self.channels;
        [r[i], g[i], b[i]]
    }

    /// Returns the three channel planes.
    #[must_use]
    pub fn channels(&self) -> [&[f32]; 3] {
        let [r, g, b] = &self.channels;
        [r, g, b]
    }

    /// Returns the three channel planes mutably.
    pub fn channels_mut(&mut self) -> [&mut [f32]; 3] {
        let [r, g, b] = &mut self.channels;
        [r, g, b]
    }
}
