//! Connected region labelling of a flat color raster.
//!
//! A region is a maximal set of 4-connected (up, down, left, right) pixels that share
//! exactly the same color. Diagonal neighbors are never connected.

use palette::Srgb;

/// A connected set of same-colored pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    /// The exact color shared by every pixel of the region.
    pub color: Srgb<u8>,
    /// The number of pixels currently labelled with this region.
    ///
    /// This drops to zero once the region is merged into another one.
    pub count: u32,
}

/// A per-pixel region label map alongside the regions it refers to.
///
/// Region identifiers are indices into [`RegionMap::regions`]. They are dense and allocated
/// in raster order of first discovery, starting at `0`, and are never reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionMap {
    /// The width of the raster.
    pub(crate) width: u32,
    /// The height of the raster.
    pub(crate) height: u32,
    /// The region identifier of each pixel.
    pub(crate) labels: Vec<u32>,
    /// The regions, indexed by identifier.
    pub(crate) regions: Vec<Region>,
}

impl RegionMap {
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

    /// Returns the region identifier of each pixel.
    #[must_use]
    pub fn labels(&self) -> &[u32] {
        &self.labels
    }

    /// Returns every region ever allocated, including merged (empty) ones.
    #[must_use]
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Returns the number of allocated region identifiers.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn num_regions(&self) -> u32 {
        self.regions.len() as u32
    }

    /// Returns the sum of all region pixel counts, which always equals the number of pixels.
    #[must_use]
    pub fn total_count(&self) -> u64 {
        self.regions.iter().map(|r| u64::from(r.count)).sum()
    }
}

/// Marks a pixel that has not been assigned a region yet.
const UNLABELLED: u32 = u32::MAX;

/// Labels the 4-connected regions of exactly equal color in `colors`.
///
/// `colors` must have a length of `width * height`.
///
/// The fill frontier is a stack, so pixels are visited depth-first.
/// The visiting order only affects which identifier a region receives, never which pixels it contains.
#[must_use]
pub fn extract(colors: &[Srgb<u8>], width: u32, height: u32) -> RegionMap {
    let (w, h) = (width as usize, height as usize);
    debug_assert_eq!(colors.len(), w * h);

    let mut labels = vec![UNLABELLED; colors.len()];
    let mut regions = Vec::new();
    let mut stack = Vec::new();

    for seed in 0..colors.len() {
        if labels[seed] != UNLABELLED {
            continue;
        }

        #[allow(clippy::cast_possible_truncation)]
        let id = regions.len() as u32;
        let color = colors[seed];
        let mut count = 0;

        stack.push(seed);
        while let Some(i) = stack.pop() {
            if labels[i] != UNLABELLED || colors[i] != color {
                continue;
            }

            labels[i] = id;
            count += 1;

            let x = i % w;
            let y = i / w;
            if x > 0 {
                stack.push(i - 1);
            }
            if x + 1 < w {
                stack.push(i + 1);
            }
            if y > 0 {
                stack.push(i - w);
            }
            if y + 1 < h {
                stack.push(i + w);
            }
        }

        regions.push(Region { color, count });
    }

    RegionMap { width, height, labels, regions }
}
