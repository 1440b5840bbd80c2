//! Contains the types and functions for the high level pipeline builder API.

mod pipeline;
#[cfg(feature = "image")]
mod resample;

pub use pipeline::SegmentPipeline;
#[cfg(feature = "image")]
pub use resample::{processing_dimensions, segment_file, segment_image, segment_image_background};

use crate::{ColorCount, Params};

/// The default cap on the largest image side before processing.
pub const DEFAULT_MAX_DIMENSION: u32 = 512;

/// A builder struct to specify the parameters for a segmentation run.
///
/// # Examples
/// ```
/// # use blobify::SegmentOptions;
/// let options = SegmentOptions::new()
///     .colors(6)
///     .blur_radius(4)
///     .min_region_size(50)
///     .seed(Some(42));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SegmentOptions {
    /// The numeric parameters passed to every stage.
    pub(crate) params: Params,
    /// The cap on the largest image side before processing.
    pub(crate) max_dimension: Option<u32>,
    /// The seed value for the random number generator.
    pub(crate) seed: Option<u64>,
}

impl Default for SegmentOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentOptions {
    /// Creates a new [`SegmentOptions`] with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            params: Params::DEFAULT,
            max_dimension: Some(DEFAULT_MAX_DIMENSION),
            seed: None,
        }
    }

    /// Sets the half-width of the box blur window.
    ///
    /// The default radius is `6`.
    #[must_use]
    pub fn blur_radius(mut self, radius: u32) -> Self {
        self.params.blur_radius = radius;
        self
    }

    /// Sets the number of box blur passes. More passes approach a gaussian blur.
    ///
    /// The default is `3` passes.
    #[must_use]
    pub fn blur_passes(mut self, passes: u32) -> Self {
        self.params.blur_passes = passes;
        self
    }

    /// Sets the exact number of colors in the output.
    ///
    /// The default is [`ColorCount::DEFAULT`].
    #[must_use]
    pub fn colors(mut self, colors: impl Into<ColorCount>) -> Self {
        self.params.colors = colors.into();
        self
    }

    /// Sets the number of colors, clamping it into the supported range.
    #[must_use]
    pub fn colors_clamped(mut self, colors: u16) -> Self {
        self.params.colors = ColorCount::from_clamped(colors);
        self
    }

    /// Sets the half-width of the mode filter window.
    ///
    /// The default radius is `3`.
    #[must_use]
    pub fn mode_radius(mut self, radius: u32) -> Self {
        self.params.mode_radius = radius;
        self
    }

    /// Sets the number of mode filter sweeps.
    ///
    /// The default is `3` passes.
    #[must_use]
    pub fn mode_passes(mut self, passes: u32) -> Self {
        self.params.mode_passes = passes;
        self
    }

    /// Sets the pixel count below which a region is merged into its largest neighbor.
    /// A value of `1` or less disables merging.
    ///
    /// The default is `100` pixels.
    #[must_use]
    pub fn min_region_size(mut self, size: u32) -> Self {
        self.params.min_region_size = size;
        self
    }

    /// Sets the cap on the largest image side before processing,
    /// or `None` to always process at full resolution.
    ///
    /// This only affects [`segment_image`], since the other entry points take the pixels as given.
    /// A cap of `0` is treated as `1`.
    ///
    /// The default cap is [`DEFAULT_MAX_DIMENSION`].
    #[must_use]
    pub fn max_dimension(mut self, max: Option<u32>) -> Self {
        self.max_dimension = max.map(|m| m.max(1));
        self
    }

    /// Sets the maximum number of k-means rounds.
    ///
    /// The default is [`MAX_ITERATIONS`](crate::kmeans::MAX_ITERATIONS).
    #[must_use]
    pub fn max_iterations(mut self, iterations: u32) -> Self {
        self.params.max_iterations = iterations;
        self
    }

    /// Sets the seed value for the random number generator.
    ///
    /// With `None`, every run draws a fresh seed.
    /// The default is `None`.
    #[must_use]
    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Returns the numeric parameters of a run.
    #[must_use]
    pub const fn params(&self) -> &Params {
        &self.params
    }

    /// Returns the cap on the largest image side.
    #[must_use]
    pub const fn get_max_dimension(&self) -> Option<u32> {
        self.max_dimension
    }

    /// Returns the seed, if one was set.
    #[must_use]
    pub const fn get_seed(&self) -> Option<u64> {
        self.seed
    }
}
