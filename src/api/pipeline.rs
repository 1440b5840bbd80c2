//! Contains the [`SegmentPipeline`] builder struct for the high level API.

use crate::{
    segment,
    types::check_rgba_len,
    worker::{self, CancelToken, Progress},
    Planes, Result, SegmentOptions, Segmented,
};
use rand::Rng;
#[cfg(feature = "image")]
use {crate::SegmentError, image::RgbaImage};

/// A builder struct to specify options for segmenting an image into flat color blobs.
///
/// # Examples
/// To start, create a [`SegmentPipeline`] from an RGBA buffer or, with the `image` feature,
/// from an [`RgbaImage`]:
/// ```no_run
/// # use blobify::SegmentPipeline;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let img = image::open("some image")?.into_rgba8();
/// let mut pipeline = SegmentPipeline::try_from(&img)?;
/// # Ok(())
/// # }
/// ```
///
/// Then set the options and run the pipeline:
/// ```
/// # use blobify::{SegmentOptions, SegmentPipeline, SegmentError};
/// # fn main() -> Result<(), SegmentError> {
/// # let rgba = vec![0; 8 * 8 * 4];
/// let mut pipeline = SegmentPipeline::new(&rgba, 8, 8)?;
/// pipeline.options(SegmentOptions::new().colors(4).seed(Some(1)));
/// let segmented = pipeline.run()?;
/// assert_eq!(segmented.rgba.len(), rgba.len());
/// # Ok(())
/// # }
/// ```
///
/// Or, on the shared background worker, with cancellation and progress reporting:
/// ```no_run
/// # use blobify::{SegmentPipeline, SegmentError, worker::CancelToken};
/// # fn main() -> Result<(), SegmentError> {
/// # let rgba = vec![0; 8 * 8 * 4];
/// # let pipeline = SegmentPipeline::new(&rgba, 8, 8)?;
/// let token = CancelToken::new();
/// let segmented = pipeline.run_background(&token, |p| println!("{:.0}%", p.fraction() * 100.0))?;
/// # Ok(())
/// # }
/// ```
#[must_use]
#[derive(Debug, Clone)]
pub struct SegmentPipeline<'a> {
    /// The input pixels in RGBA order.
    pub(crate) rgba: &'a [u8],
    /// The dimensions of the image.
    pub(crate) dimensions: (u32, u32),
    /// The options for a run.
    pub(crate) options: SegmentOptions,
}

impl<'a> SegmentPipeline<'a> {
    /// Creates a new [`SegmentPipeline`] with default options.
    ///
    /// # Errors
    /// Returns [`SegmentError::EmptyImage`](crate::SegmentError::EmptyImage) if `width` or `height` is zero and
    /// [`SegmentError::BufferSize`](crate::SegmentError::BufferSize) if `rgba.len() != width * height * 4`.
    pub fn new(rgba: &'a [u8], width: u32, height: u32) -> Result<Self> {
        check_rgba_len(rgba.len(), width, height)?;
        Ok(Self {
            rgba,
            dimensions: (width, height),
            options: SegmentOptions::new(),
        })
    }

    /// Sets the options used by every run.
    ///
    /// The default is [`SegmentOptions::new`].
    pub fn options(&mut self, options: SegmentOptions) -> &mut Self {
        self.options = options;
        self
    }

    /// Returns the dimensions of the input image.
    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    /// Splits the input into channel planes.
    fn planes(&self) -> Result<Planes> {
        let (width, height) = self.dimensions;
        Planes::from_rgba(self.rgba, width, height)
    }

    /// Runs the pipeline on the calling thread.
    ///
    /// The random number generator is seeded from the configured seed or from entropy.
    ///
    /// # Errors
    /// The input was validated on construction, so this does not fail in practice.
    pub fn run(&self) -> Result<Segmented> {
        let seed = worker::resolve_seed(self.options.seed);
        worker::segment_seeded(self.planes()?, &self.options.params, seed, &CancelToken::new())
    }

    /// Runs the pipeline on the calling thread using the given random number generator
    /// instead of the configured seed.
    ///
    /// # Errors
    /// The input was validated on construction, so this does not fail in practice.
    pub fn run_with_rng(&self, rng: &mut impl Rng) -> Result<Segmented> {
        segment(self.planes()?, &self.options.params, rng, &CancelToken::new())
    }

    /// Runs the pipeline on the shared background worker and blocks until it finishes.
    ///
    /// `on_progress` is called at each [`Progress`] milestone that is reached.
    /// Given the same seed, the output is identical to [`SegmentPipeline::run`].
    ///
    /// # Errors
    /// Returns [`SegmentError::Aborted`](crate::SegmentError::Aborted) if `cancel` fires before the result is ready
    /// and [`SegmentError::Failed`](crate::SegmentError::Failed) if the run failed on the worker.
    pub fn run_background(
        &self,
        cancel: &CancelToken,
        mut on_progress: impl FnMut(Progress),
    ) -> Result<Segmented> {
        let planes = self.planes()?;
        let seed = worker::resolve_seed(self.options.seed);
        let segmented =
            worker::run_background(planes, self.options.params, seed, cancel, &mut on_progress)?;
        on_progress(Progress::Done);
        Ok(segmented)
    }
}

#[cfg(feature = "image")]
impl<'a> TryFrom<&'a RgbaImage> for SegmentPipeline<'a> {
    type Error = SegmentError;

    fn try_from(image: &'a RgbaImage) -> Result<Self> {
        Self::new(image.as_raw(), image.width(), image.height())
    }
}

#[cfg(feature = "image")]
impl<'a> SegmentPipeline<'a> {
    /// Runs the pipeline and returns the segmented image.
    ///
    /// # Errors
    /// See [`SegmentPipeline::run`].
    pub fn segmented_rgbaimage(&self) -> Result<RgbaImage> {
        let Segmented { width, height, rgba, .. } = self.run()?;

        #[allow(clippy::expect_used)]
        {
            // the output always holds width * height RGBA pixels
            Ok(RgbaImage::from_vec(width, height, rgba).expect("large enough buffer"))
        }
    }
}
