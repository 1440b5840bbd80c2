//! Segmenting an image at a capped processing resolution.

use crate::{
    worker::{self, CancelToken, Progress},
    Planes, Result, SegmentError, SegmentOptions, Segmented,
};

use image::{
    imageops::{self, FilterType},
    RgbaImage,
};
use log::{debug, info};
use std::path::Path;

/// Returns the dimensions to process an image at so that neither side exceeds `max_dimension`.
///
/// Both sides are scaled by the same factor and rounded, but never below `1`.
/// Images already within the cap (or with no cap) keep their dimensions.
#[must_use]
pub fn processing_dimensions(width: u32, height: u32, max_dimension: Option<u32>) -> (u32, u32) {
    let Some(max) = max_dimension else {
        return (width, height);
    };

    let largest = width.max(height);
    if largest <= max {
        return (width, height);
    }

    let scale = f64::from(max.max(1)) / f64::from(largest);

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let scaled = |side: u32| ((f64::from(side) * scale).round() as u32).max(1);

    (scaled(width), scaled(height))
}

/// Downscales `image` to its processing resolution, runs `run` on it,
/// and upscales the result back to the original resolution.
fn segment_resampled(
    image: &RgbaImage,
    options: &SegmentOptions,
    run: impl FnOnce(Planes, u64) -> Result<Segmented>,
) -> Result<(RgbaImage, u32)> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(SegmentError::EmptyImage);
    }

    let (proc_width, proc_height) = processing_dimensions(width, height, options.max_dimension);

    let resized;
    let input = if (proc_width, proc_height) == (width, height) {
        image
    } else {
        debug!("downscaling {width}x{height} to {proc_width}x{proc_height} for processing");
        resized = imageops::resize(image, proc_width, proc_height, FilterType::Triangle);
        &resized
    };

    let planes = Planes::from_rgba(input.as_raw(), proc_width, proc_height)?;
    let seed = worker::resolve_seed(options.seed);
    let Segmented { rgba, regions, .. } = run(planes, seed)?;

    #[allow(clippy::expect_used)]
    let output = {
        // the output always holds proc_width * proc_height RGBA pixels
        RgbaImage::from_vec(proc_width, proc_height, rgba).expect("large enough buffer")
    };

    let output = if (proc_width, proc_height) == (width, height) {
        output
    } else {
        imageops::resize(&output, width, height, FilterType::Nearest)
    };

    Ok((output, regions))
}

/// Segments `image` using `options` and returns the result at the original resolution,
/// along with the number of surviving regions.
///
/// If the image is larger than the configured maximum dimension,
/// it is first downscaled (with a triangle filter) for processing.
/// The result is then upscaled back with nearest neighbor sampling,
/// which keeps the region edges hard.
///
/// # Errors
/// Returns [`SegmentError::EmptyImage`] if the image has no pixels.
pub fn segment_image(image: &RgbaImage, options: &SegmentOptions) -> Result<(RgbaImage, u32)> {
    segment_resampled(image, options, |planes, seed| {
        worker::segment_seeded(planes, &options.params, seed, &CancelToken::new())
    })
}

/// Like [`segment_image`], but runs on the shared background worker.
///
/// `on_progress` is called at each [`Progress`] milestone that is reached,
/// with [`Progress::Done`] reported once the output has been upscaled.
/// Given the same seed, the output is identical to [`segment_image`].
///
/// # Errors
/// Returns [`SegmentError::EmptyImage`] if the image has no pixels,
/// [`SegmentError::Aborted`] if `cancel` fires before the result is ready,
/// and [`SegmentError::Failed`] if the run failed on the worker.
pub fn segment_image_background(
    image: &RgbaImage,
    options: &SegmentOptions,
    cancel: &CancelToken,
    mut on_progress: impl FnMut(Progress),
) -> Result<(RgbaImage, u32)> {
    let output = segment_resampled(image, options, |planes, seed| {
        worker::run_background(planes, options.params, seed, cancel, &mut on_progress)
    })?;
    on_progress(Progress::Done);
    Ok(output)
}

/// Reads the image at `input`, segments it with [`segment_image`], and writes the result to `output`.
///
/// The image formats available depend on the features enabled on the `image` crate.
/// Returns the number of surviving regions.
///
/// # Errors
/// Returns [`SegmentError::Image`] if the input cannot be decoded
/// or the output cannot be encoded, and otherwise the same errors as [`segment_image`].
pub fn segment_file(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    options: &SegmentOptions,
) -> Result<u32> {
    let (input, output) = (input.as_ref(), output.as_ref());
    let image = image::open(input)?.into_rgba8();
    let (segmented, regions) = segment_image(&image, options)?;
    segmented.save(output)?;
    info!("wrote {} with {regions} regions", output.display());
    Ok(regions)
}
