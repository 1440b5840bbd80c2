//! The full segmentation pipeline as a single function over owned buffers.

use crate::{
    blur, composite,
    kmeans::{self, MAX_ITERATIONS},
    merge, mode_filter, regions,
    worker::CancelToken,
    ColorCount, Planes, Result,
};

use log::{debug, info};
use palette::Srgb;
use rand::Rng;
use std::time::Instant;

/// The numeric parameters of one segmentation run.
///
/// The defaults are:
/// - `blur_radius`: `6`
/// - `blur_passes`: `3`
/// - `colors`: [`ColorCount::DEFAULT`]
/// - `mode_radius`: `3`
/// - `mode_passes`: `3`
/// - `min_region_size`: `100`
/// - `max_iterations`: [`MAX_ITERATIONS`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Params {
    /// The half-width of the box blur window.
    pub blur_radius: u32,
    /// The number of box blur passes.
    pub blur_passes: u32,
    /// The exact number of colors to cluster into.
    pub colors: ColorCount,
    /// The half-width of the mode filter window.
    pub mode_radius: u32,
    /// The number of mode filter sweeps.
    pub mode_passes: u32,
    /// Regions with fewer pixels than this are merged into their largest neighbor.
    pub min_region_size: u32,
    /// The maximum number of k-means rounds.
    pub max_iterations: u32,
}

impl Params {
    /// The default parameters.
    pub const DEFAULT: Self = Self {
        blur_radius: 6,
        blur_passes: 3,
        colors: ColorCount::DEFAULT,
        mode_radius: 3,
        mode_passes: 3,
        min_region_size: 100,
        max_iterations: MAX_ITERATIONS,
    };
}

impl Default for Params {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// The result of a segmentation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segmented {
    /// The width of the output raster.
    pub width: u32,
    /// The height of the output raster.
    pub height: u32,
    /// The output pixels in RGBA order, all fully opaque.
    pub rgba: Vec<u8>,
    /// The number of regions left after merging.
    pub regions: u32,
    /// The `k` cluster colors. Every output pixel has one of these colors.
    pub palette: Vec<Srgb<u8>>,
}

/// Runs the whole pipeline on `planes`:
/// blur, k-means, mode filter, region extraction, region merging, and compositing.
///
/// `rng` is only used for k-means++ seeding, so a seeded generator gives identical
/// output for identical input and parameters.
///
/// `cancel` is checked between stages, between blur and mode filter passes,
/// and between k-means seeding draws and rounds.
///
/// # Errors
/// Returns [`SegmentError::Aborted`](crate::SegmentError::Aborted) if `cancel` fires before the run completes.
/// No partial output is returned in that case.
pub fn segment(
    mut planes: Planes,
    params: &Params,
    rng: &mut impl Rng,
    cancel: &CancelToken,
) -> Result<Segmented> {
    let start = Instant::now();
    let (width, height) = planes.dimensions();
    let Params {
        blur_radius,
        blur_passes,
        colors,
        mode_radius,
        mode_passes,
        min_region_size,
        max_iterations,
    } = *params;

    cancel.checkpoint()?;

    let time = Instant::now();
    for _ in 0..blur_passes {
        blur::box_blur(&mut planes, blur_radius);
        cancel.checkpoint()?;
    }
    debug!(
        "blurred {width}x{height} with radius {blur_radius} x {blur_passes} passes in {}ms",
        time.elapsed().as_millis()
    );

    let time = Instant::now();
    let kmeans::KmeansOutput { centroids, assignments, iterations, .. } =
        kmeans::indexed_palette(&planes, colors, max_iterations, rng, cancel)?;
    drop(planes);
    debug!(
        "clustered into {colors} colors after {iterations} rounds in {}ms",
        time.elapsed().as_millis()
    );

    let time = Instant::now();
    let mut indices = assignments;
    for _ in 0..mode_passes {
        indices = mode_filter::mode_filter(indices, width, height, colors, mode_radius, 1);
        cancel.checkpoint()?;
    }
    debug!(
        "mode filtered with radius {mode_radius} x {mode_passes} passes in {}ms",
        time.elapsed().as_millis()
    );

    let palette = centroids.to_srgb();
    let snapped = indices
        .iter()
        .map(|&i| palette[usize::from(i)])
        .collect::<Vec<_>>();
    drop(indices);

    let time = Instant::now();
    let mut map = regions::extract(&snapped, width, height);
    drop(snapped);
    let extracted = map.num_regions();
    cancel.checkpoint()?;

    let merged = merge::merge_small_regions(&mut map, min_region_size);
    debug!(
        "found {extracted} regions, merged {merged} below {min_region_size} pixels in {}ms",
        time.elapsed().as_millis()
    );
    cancel.checkpoint()?;

    let (rgba, regions) = composite::composite(&map);

    info!(
        "segmented {width}x{height} into {regions} regions in {}ms",
        start.elapsed().as_millis()
    );

    Ok(Segmented { width, height, rgba, regions, palette })
}
