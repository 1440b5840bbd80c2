// The seeding used here is k-means++ as described in:
//
// Arthur, D. & Vassilvitskii, S. k-means++: The Advantages of Careful Seeding.
// Proceedings of the Eighteenth Annual ACM-SIAM Symposium on Discrete Algorithms, 1027–1035, 2007.
//
// except that the first centroid is chosen deterministically as the pixel closest to the mean color.
// The clustering itself is plain Lloyd's algorithm over every pixel.

//! Color quantization via k-means clustering with k-means++ seeding.
//!
//! All distances are squared euclidean distances over raw `0..=255` channel values.
//! The random number generator is only used during seeding, so supplying a seeded
//! generator makes the whole stage deterministic.

use crate::{worker::CancelToken, ColorCount, Planes, Result, SegmentError, MAX_COLORS};

use log::{debug, trace};
use ordered_float::OrderedFloat;
use palette::Srgb;
use rand::Rng;

/// The default maximum number of k-means rounds.
pub const MAX_ITERATIONS: u32 = 30;

/// Clustering stops once fewer than this fraction of pixels change cluster in a round.
pub const CONVERGENCE_FRACTION: f64 = 0.001;

/// A list of centroid colors, each with three `f32` channels.
///
/// This is a new type wrapper around `Vec<[f32; 3]>` with the invariant that
/// it holds between `1` and [`MAX_COLORS`] centroids.
#[derive(Debug, Clone, PartialEq)]
#[repr(transparent)]
pub struct Centroids(Vec<[f32; 3]>);

impl Centroids {
    /// Gets the inner centroid colors.
    #[must_use]
    pub fn into_inner(self) -> Vec<[f32; 3]> {
        self.0
    }

    /// Returns the centroid colors as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[[f32; 3]] {
        &self.0
    }

    /// Returns the number of centroids.
    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub fn num_colors(&self) -> u16 {
        self.0.len() as u16
    }

    /// Snaps each centroid to an 8-bit color by clamping to `0.0..=255.0` and rounding.
    #[must_use]
    pub fn to_srgb(&self) -> Vec<Srgb<u8>> {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        fn snap(c: f32) -> u8 {
            c.clamp(0.0, 255.0).round() as u8
        }

        self.0
            .iter()
            .map(|&[r, g, b]| Srgb::new(snap(r), snap(g), snap(b)))
            .collect()
    }
}

impl From<Centroids> for Vec<[f32; 3]> {
    fn from(value: Centroids) -> Self {
        value.into_inner()
    }
}

impl TryFrom<Vec<[f32; 3]>> for Centroids {
    type Error = SegmentError;

    fn try_from(colors: Vec<[f32; 3]>) -> Result<Self> {
        if (1..=usize::from(MAX_COLORS)).contains(&colors.len()) {
            Ok(Self(colors))
        } else {
            #[allow(clippy::cast_possible_truncation)]
            Err(SegmentError::OutOfRange {
                value: colors.len() as u32,
                min: 1,
                max: MAX_COLORS.into(),
            })
        }
    }
}

/// Squared euclidean distance between two points, accumulated in `f64`.
#[inline]
fn squared_distance(x: [f32; 3], y: [f32; 3]) -> f64 {
    let mut dist = 0.0;
    for c in 0..3 {
        let d = f64::from(x[c]) - f64::from(y[c]);
        dist += d * d;
    }
    dist
}

/// Returns the index of the centroid nearest to `color`.
///
/// Centroids are scanned in order and only a strictly smaller distance replaces the current best,
/// so ties go to the lowest index.
#[inline]
fn nearest(centroids: &[[f32; 3]], color: [f32; 3]) -> u8 {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (i, &centroid) in centroids.iter().enumerate() {
        let d = squared_distance(color, centroid);
        if d < best_distance {
            best_distance = d;
            best = i;
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    {
        best as u8
    }
}

/// Picks an index with probability proportional to its weight.
///
/// Draws a target in `0.0..total` and subtracts weights in order until the target crosses zero.
/// Zero weights are never picked. If floating point drift keeps the target from crossing zero,
/// the last index with a positive weight is used. A `total` of zero picks index `0`.
fn weighted_pick(weights: &[f64], total: f64, rng: &mut impl Rng) -> usize {
    if total <= 0.0 {
        return 0;
    }

    let mut target = rng.gen::<f64>() * total;
    let mut last_positive = 0;
    for (i, &w) in weights.iter().enumerate() {
        if w > 0.0 {
            last_positive = i;
            target -= w;
            if target <= 0.0 {
                return i;
            }
        }
    }

    last_positive
}

/// Chooses `k` initial centroids using k-means++ seeding.
///
/// The first centroid is the pixel closest to the mean color (the first such pixel on ties).
/// Each following centroid is a pixel sampled with probability proportional to
/// its squared distance to the nearest centroid chosen so far.
///
/// `cancel` is checked before each sampled centroid.
///
/// # Errors
/// Returns [`SegmentError::Aborted`] if `cancel` fires during seeding.
pub fn kmeans_plus_plus(
    planes: &Planes,
    k: ColorCount,
    rng: &mut impl Rng,
    cancel: &CancelToken,
) -> Result<Centroids> {
    let n = planes.len();
    let k = k.as_usize();
    let mut centroids = Vec::with_capacity(k);

    if n == 0 {
        centroids.resize(k, [0.0; 3]);
        return Ok(Centroids(centroids));
    }

    let mut mean = [0.0f64; 3];
    for (m, channel) in mean.iter_mut().zip(planes.channels()) {
        *m = channel.iter().copied().map(f64::from).sum::<f64>();
    }
    #[allow(clippy::cast_precision_loss)]
    let mean = mean.map(|m| m / n as f64);

    let (first, _) = (0..n)
        .map(|i| {
            let color = planes.color(i);
            let d = (0..3)
                .map(|c| {
                    let diff = f64::from(color[c]) - mean[c];
                    diff * diff
                })
                .sum::<f64>();
            (i, OrderedFloat(d))
        })
        .min_by_key(|&(_, d)| d)
        .unwrap_or((0, OrderedFloat(0.0)));

    let first = planes.color(first);
    centroids.push(first);

    let mut nearest_distance = Vec::with_capacity(n);
    let mut total = 0.0;
    for i in 0..n {
        let d = squared_distance(planes.color(i), first);
        nearest_distance.push(d);
        total += d;
    }

    for _ in 1..k {
        cancel.checkpoint()?;
        let chosen = weighted_pick(&nearest_distance, total, rng);
        let centroid = planes.color(chosen);
        centroids.push(centroid);

        total = 0.0;
        for (i, nearest) in nearest_distance.iter_mut().enumerate() {
            let d = squared_distance(planes.color(i), centroid);
            if d < *nearest {
                *nearest = d;
            }
            total += *nearest;
        }
    }

    Ok(Centroids(centroids))
}

/// The output of k-means clustering.
#[derive(Debug, Clone, PartialEq)]
pub struct KmeansOutput {
    /// The final centroid colors.
    pub centroids: Centroids,
    /// The index of the assigned centroid for each pixel.
    pub assignments: Vec<u8>,
    /// The number of pixels assigned to each centroid. Counts may be zero.
    pub counts: Vec<u32>,
    /// The number of rounds that were run.
    pub iterations: u32,
}

/// The working state of Lloyd's algorithm.
struct State<'a> {
    /// The pixels being clustered.
    planes: &'a Planes,
    /// The current centroid colors.
    centroids: Vec<[f32; 3]>,
    /// The current cluster of each pixel.
    assignments: Vec<u8>,
    /// Per-cluster channel sums.
    sums: Vec<[f64; 3]>,
    /// Per-cluster pixel counts.
    counts: Vec<u32>,
}

impl<'a> State<'a> {
    /// Creates a new state with every pixel initially assigned to cluster `0`.
    fn new(planes: &'a Planes, centroids: Centroids) -> Self {
        let k = centroids.0.len();
        Self {
            planes,
            centroids: centroids.into_inner(),
            assignments: vec![0; planes.len()],
            sums: vec![[0.0; 3]; k],
            counts: vec![0; k],
        }
    }

    /// Assigns every pixel to its nearest centroid, returning how many pixels changed cluster.
    fn assign(&mut self) -> usize {
        let Self { planes, centroids, assignments, .. } = self;
        let mut changed = 0;
        for (i, assignment) in assignments.iter_mut().enumerate() {
            let best = nearest(centroids, planes.color(i));
            if *assignment != best {
                *assignment = best;
                changed += 1;
            }
        }
        changed
    }

    /// Moves each centroid to the mean of its assigned pixels.
    ///
    /// Centroids without any assigned pixels keep their previous position.
    fn update(&mut self) {
        let Self { planes, centroids, assignments, sums, counts } = self;

        sums.fill([0.0; 3]);
        counts.fill(0);

        for (i, &a) in assignments.iter().enumerate() {
            let a = usize::from(a);
            let color = planes.color(i);
            for c in 0..3 {
                sums[a][c] += f64::from(color[c]);
            }
            counts[a] += 1;
        }

        for ((centroid, sum), &count) in centroids.iter_mut().zip(&*sums).zip(&*counts) {
            if count == 0 {
                continue;
            }
            let count = f64::from(count);
            #[allow(clippy::cast_possible_truncation)]
            {
                *centroid = sum.map(|s| (s / count) as f32);
            }
        }
    }

    /// Finishes clustering and returns the output.
    fn into_output(self, iterations: u32) -> KmeansOutput {
        let Self { centroids, assignments, counts, .. } = self;
        KmeansOutput {
            centroids: Centroids(centroids),
            assignments,
            counts,
            iterations,
        }
    }
}

/// Runs Lloyd's algorithm starting from the given `initial_centroids`.
///
/// At most `max_iterations` rounds are run. Each round assigns every pixel to its nearest centroid
/// and then moves each non-empty centroid to the mean of its pixels.
/// Clustering stops early once the number of pixels that changed cluster in a round
/// drops below [`CONVERGENCE_FRACTION`] of the total.
///
/// `cancel` is checked before each round.
///
/// # Errors
/// Returns [`SegmentError::Aborted`] if `cancel` fires before clustering finishes.
pub fn indexed_palette_from(
    planes: &Planes,
    initial_centroids: Centroids,
    max_iterations: u32,
    cancel: &CancelToken,
) -> Result<KmeansOutput> {
    #[allow(clippy::cast_precision_loss)]
    let threshold = planes.len() as f64 * CONVERGENCE_FRACTION;

    let mut state = State::new(planes, initial_centroids);
    let mut iterations = 0;

    while iterations < max_iterations {
        cancel.checkpoint()?;
        let changed = state.assign();
        state.update();
        iterations += 1;

        trace!("k-means round {iterations}: {changed} pixels changed cluster");

        #[allow(clippy::cast_precision_loss)]
        let changed = changed as f64;
        if changed < threshold {
            break;
        }
    }

    debug!(
        "k-means finished after {iterations} rounds with {} clusters",
        state.centroids.len()
    );

    Ok(state.into_output(iterations))
}

/// Clusters the pixels of `planes` into exactly `k` colors.
///
/// Centroids are seeded with [`kmeans_plus_plus`] using `rng`
/// and then refined with [`indexed_palette_from`].
///
/// # Errors
/// Returns [`SegmentError::Aborted`] if `cancel` fires before clustering finishes.
pub fn indexed_palette(
    planes: &Planes,
    k: ColorCount,
    max_iterations: u32,
    rng: &mut impl Rng,
    cancel: &CancelToken,
) -> Result<KmeansOutput> {
    let initial_centroids = kmeans_plus_plus(planes, k, rng, cancel)?;
    indexed_palette_from(planes, initial_centroids, max_iterations, cancel)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::tests::*;
    use rand::{RngCore, SeedableRng};
    use rand_xoshiro::Xoroshiro128PlusPlus;

    fn none() -> CancelToken {
        CancelToken::new()
    }

    fn cluster(planes: &Planes, k: ColorCount, max_iterations: u32) -> KmeansOutput {
        indexed_palette(planes, k, max_iterations, &mut test_rng(), &none()).unwrap()
    }

    /// A generator that cancels `token` as soon as it is first drawn from.
    struct CancelOnDraw<'a> {
        inner: Xoroshiro128PlusPlus,
        token: &'a CancelToken,
        draws: u32,
    }

    impl CancelOnDraw<'_> {
        fn draw(&mut self) {
            self.draws += 1;
            self.token.cancel();
        }
    }

    impl RngCore for CancelOnDraw<'_> {
        fn next_u32(&mut self) -> u32 {
            self.draw();
            self.inner.next_u32()
        }

        fn next_u64(&mut self) -> u64 {
            self.draw();
            self.inner.next_u64()
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            self.draw();
            self.inner.fill_bytes(dest);
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand::Error> {
            self.draw();
            self.inner.try_fill_bytes(dest)
        }
    }

    fn sorted(centroids: &Centroids) -> Vec<[u8; 3]> {
        let mut colors = centroids
            .to_srgb()
            .into_iter()
            .map(|c| [c.red, c.green, c.blue])
            .collect::<Vec<_>>();
        colors.sort_unstable();
        colors
    }

    #[test]
    fn two_flat_halves_converge_exactly() {
        let planes = split_planes(4, 4);
        let output = cluster(&planes, ColorCount::MIN, MAX_ITERATIONS);

        assert_eq!(sorted(&output.centroids), vec![[0, 0, 0], [255, 255, 255]]);
        assert_eq!(output.counts, vec![8, 8]);

        for (i, &a) in output.assignments.iter().enumerate() {
            let expected = if i % 4 < 2 { [0.0; 3] } else { [255.0; 3] };
            assert_eq!(output.centroids.as_slice()[usize::from(a)], expected);
        }
    }

    #[test]
    fn first_seed_is_closest_to_mean() {
        // mean is (100, 100, 100); the middle pixel is closest
        let rgba = rgba_from_fn(3, 1, |x, _| match x {
            0 => [0, 0, 0],
            1 => [90, 100, 110],
            _ => [210, 200, 190],
        });
        let planes = Planes::from_rgba(&rgba, 3, 1).unwrap();
        let centroids =
            kmeans_plus_plus(&planes, ColorCount::MIN, &mut test_rng(), &none()).unwrap();
        assert_eq!(centroids.as_slice()[0], [90.0, 100.0, 110.0]);
        assert_eq!(centroids.num_colors(), 2);
    }

    #[test]
    fn seeding_never_picks_zero_weight_pixels() {
        let planes = split_planes(10, 3);
        for seed in 0..32 {
            let mut rng = Xoroshiro128PlusPlus::seed_from_u64(seed);
            let centroids =
                kmeans_plus_plus(&planes, ColorCount::MIN, &mut rng, &none()).unwrap();
            assert_ne!(centroids.as_slice()[0], centroids.as_slice()[1]);
        }
    }

    #[test]
    fn uniform_raster_duplicates_centroids() {
        let rgba = rgba_from_fn(5, 5, |_, _| [12, 34, 56]);
        let planes = Planes::from_rgba(&rgba, 5, 5).unwrap();
        let output = cluster(&planes, 4.into(), MAX_ITERATIONS);

        assert_eq!(output.centroids.num_colors(), 4);
        assert!(output.assignments.iter().all(|&a| a == 0));
        assert_eq!(output.counts, vec![25, 0, 0, 0]);
        assert!(output
            .centroids
            .to_srgb()
            .iter()
            .all(|&c| c == Srgb::new(12, 34, 56)));
    }

    #[test]
    fn ties_go_to_lowest_index() {
        let centroids = [[0.0, 0.0, 0.0], [10.0, 0.0, 0.0], [20.0, 0.0, 0.0]];
        assert_eq!(nearest(&centroids, [5.0, 0.0, 0.0]), 0);
        assert_eq!(nearest(&centroids, [15.0, 0.0, 0.0]), 1);
        assert_eq!(nearest(&centroids, [16.0, 0.0, 0.0]), 2);
    }

    #[test]
    fn empty_clusters_keep_their_position() {
        let planes = split_planes(4, 2);
        let initial = Centroids::try_from(vec![[0.0; 3], [255.0; 3], [-500.0; 3]]).unwrap();
        let output = indexed_palette_from(&planes, initial, MAX_ITERATIONS, &none()).unwrap();
        assert_eq!(output.centroids.as_slice()[2], [-500.0; 3]);
        assert_eq!(output.counts[2], 0);
        assert_eq!(output.centroids.to_srgb()[2], Srgb::new(0, 0, 0));
    }

    #[test]
    fn stable_assignment_stops_early() {
        let planes = split_planes(4, 4);
        let initial = Centroids::try_from(vec![[0.0; 3], [255.0; 3]]).unwrap();
        let output = indexed_palette_from(&planes, initial, MAX_ITERATIONS, &none()).unwrap();
        // round 1 moves the right half off of cluster 0, round 2 changes nothing
        assert_eq!(output.iterations, 2);
    }

    #[test]
    fn max_iterations_is_respected() {
        let rgba = noise_rgba(32, 32, 7);
        let planes = Planes::from_rgba(&rgba, 32, 32).unwrap();
        let output = cluster(&planes, 16.into(), 1);
        assert_eq!(output.iterations, 1);
        assert_eq!(output.counts.iter().sum::<u32>(), 32 * 32);
    }

    #[test]
    fn every_pixel_is_assigned_its_nearest_centroid() {
        let rgba = noise_rgba(24, 24, 3);
        let planes = Planes::from_rgba(&rgba, 24, 24).unwrap();
        let output = cluster(&planes, 8.into(), MAX_ITERATIONS);
        assert!(output.assignments.iter().all(|&a| a < 8));
        assert_eq!(output.counts.iter().sum::<u32>(), 24 * 24);
    }

    #[test]
    fn seeded_runs_are_identical() {
        let rgba = noise_rgba(16, 16, 11);
        let planes = Planes::from_rgba(&rgba, 16, 16).unwrap();
        let a = cluster(&planes, 6.into(), MAX_ITERATIONS);
        let b = cluster(&planes, 6.into(), MAX_ITERATIONS);
        assert_eq!(a, b);
    }

    #[test]
    fn weighted_pick_respects_weights() {
        let mut rng = test_rng();
        for _ in 0..100 {
            let i = weighted_pick(&[0.0, 3.0, 0.0, 1.0, 0.0], 4.0, &mut rng);
            assert!(i == 1 || i == 3);
        }
        assert_eq!(weighted_pick(&[0.0, 0.0], 0.0, &mut rng), 0);
    }

    #[test]
    fn near_ties_are_resolved_in_double_precision() {
        // in f32 both distances round to 16944.970703125
        let centroids = [[130.172_85, 0.0, 0.0], [63.408_203, 113.685_4, 0.0]];
        let black = [0.0; 3];
        assert!(squared_distance(black, centroids[1]) < squared_distance(black, centroids[0]));
        assert_eq!(nearest(&centroids, black), 1);
    }

    #[test]
    fn cancelling_during_seeding_stops_sampling() {
        let rgba = noise_rgba(32, 32, 5);
        let planes = Planes::from_rgba(&rgba, 32, 32).unwrap();
        let token = CancelToken::new();
        let mut rng = CancelOnDraw { inner: test_rng(), token: &token, draws: 0 };

        let result = indexed_palette(&planes, ColorCount::MAX, MAX_ITERATIONS, &mut rng, &token);
        assert!(matches!(result, Err(SegmentError::Aborted)));
        assert_eq!(rng.draws, 1);
    }

    #[test]
    fn cancelled_clustering_runs_no_rounds() {
        let planes = split_planes(4, 4);
        let initial = Centroids::try_from(vec![[0.0; 3], [255.0; 3]]).unwrap();
        let token = CancelToken::new();
        token.cancel();
        let result = indexed_palette_from(&planes, initial, MAX_ITERATIONS, &token);
        assert!(matches!(result, Err(SegmentError::Aborted)));
    }
}
