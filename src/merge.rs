//! Absorption of undersized regions into their largest neighbor.

use crate::regions::RegionMap;

/// Marks a region without any neighboring region.
const NO_NEIGHBOR: u32 = u32::MAX;

/// For every region with fewer than `min_size` pixels, finds the neighboring region
/// with the largest pixel count.
///
/// Neighbors are found by checking the 4-connected neighbors (left, right, up, down)
/// of every pixel of the small region in raster order. A neighbor only replaces the current
/// best with a strictly greater count, so on ties the first neighbor found is kept.
fn best_neighbors(map: &RegionMap, min_size: u32) -> Vec<u32> {
    let RegionMap { width, height, labels, regions } = map;
    let (w, h) = (*width as usize, *height as usize);

    let mut best = vec![NO_NEIGHBOR; regions.len()];

    for (i, &id) in labels.iter().enumerate() {
        let region = id as usize;
        if regions[region].count >= min_size {
            continue;
        }

        let x = i % w;
        let y = i / w;
        let neighbors = [
            (x > 0).then(|| i - 1),
            (x + 1 < w).then(|| i + 1),
            (y > 0).then(|| i - w),
            (y + 1 < h).then(|| i + w),
        ];

        for n in neighbors.into_iter().flatten() {
            let other = labels[n];
            if other == id {
                continue;
            }
            let current = best[region];
            if current == NO_NEIGHBOR
                || regions[other as usize].count > regions[current as usize].count
            {
                best[region] = other;
            }
        }
    }

    best
}

/// Merges every region with fewer than `min_size` pixels into its largest neighboring region.
///
/// The best neighbor of each small region is decided once, using the label map and counts from
/// before any merge. Merges are then applied in increasing region identifier order:
/// every pixel currently labelled with the small region is relabelled to its chosen neighbor,
/// the neighbor's count grows by the small region's count, and the small region's count drops to zero.
/// A region is only merged if its count is still below `min_size` when its turn comes,
/// and regions without any neighbor (e.g., one filling the whole raster) are left alone.
///
/// The total pixel count over all regions never changes.
/// A `min_size` of `1` or less leaves the map untouched.
///
/// Returns the number of regions that were merged away.
pub fn merge_small_regions(map: &mut RegionMap, min_size: u32) -> u32 {
    if min_size <= 1 || map.regions.is_empty() {
        return 0;
    }

    let best = best_neighbors(map, min_size);

    // `members[id]` holds the original identifiers whose pixels are currently labelled `id`.
    let mut members: Vec<Vec<u32>> = (0..map.num_regions()).map(|id| vec![id]).collect();
    let mut merged = 0;

    for (id, &target) in best.iter().enumerate() {
        if target == NO_NEIGHBOR || map.regions[id].count >= min_size {
            continue;
        }
        let target = target as usize;

        let mut moved = std::mem::take(&mut members[id]);
        if moved.len() > members[target].len() {
            std::mem::swap(&mut moved, &mut members[target]);
        }
        members[target].append(&mut moved);

        map.regions[target].count += map.regions[id].count;
        map.regions[id].count = 0;
        merged += 1;
    }

    let mut owner = vec![0; members.len()];
    for (id, originals) in members.iter().enumerate() {
        for &original in originals {
            #[allow(clippy::cast_possible_truncation)]
            {
                owner[original as usize] = id as u32;
            }
        }
    }

    for label in &mut map.labels {
        *label = owner[*label as usize];
    }

    merged
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::regions::extract;
    use palette::Srgb;

    fn map_from_pattern(pattern: &[&str]) -> RegionMap {
        let colors = pattern
            .iter()
            .flat_map(|row| row.chars())
            .map(|c| match c {
                'b' => Srgb::new(0, 0, 0),
                'w' => Srgb::new(255, 255, 255),
                'g' => Srgb::new(0, 255, 0),
                _ => Srgb::new(255, 0, 0),
            })
            .collect::<Vec<_>>();
        #[allow(clippy::cast_possible_truncation)]
        let (w, h) = (pattern[0].len() as u32, pattern.len() as u32);
        extract(&colors, w, h)
    }

    /// Recomputes every count from the label map.
    fn recount(map: &RegionMap) -> Vec<u32> {
        let mut counts = vec![0; map.regions().len()];
        for &l in map.labels() {
            counts[l as usize] += 1;
        }
        counts
    }

    #[test]
    fn min_size_of_one_is_identity() {
        let mut map = map_from_pattern(&["bwr", "rwb"]);
        let expected = map.clone();
        assert_eq!(merge_small_regions(&mut map, 1), 0);
        assert_eq!(map, expected);
        assert_eq!(merge_small_regions(&mut map, 0), 0);
        assert_eq!(map, expected);
    }

    #[test]
    fn speck_is_absorbed() {
        let mut map = map_from_pattern(&["bbb", "brb", "bbb"]);
        assert_eq!(merge_small_regions(&mut map, 2), 1);
        assert!(map.labels().iter().all(|&l| l == 0));
        assert_eq!(map.regions()[0].count, 9);
        assert_eq!(map.regions()[1].count, 0);
        assert_eq!(map.total_count(), 9);
    }

    #[test]
    fn largest_neighbor_wins() {
        // the red speck (2) touches black (0, 3 pixels) and white (1, 8 pixels)
        let mut map = map_from_pattern(&["bwww", "brww", "bwww"]);
        assert_eq!(merge_small_regions(&mut map, 2), 1);
        assert_eq!(map.labels()[5], 1);
        assert_eq!(map.regions()[1].count, 9);
        assert_eq!(map.regions()[2].count, 0);
    }

    #[test]
    fn ties_keep_first_neighbor_found() {
        // red touches black on the left and green on the right, both with 2 pixels
        let mut map = map_from_pattern(&["bbrgg"]);
        assert_eq!(merge_small_regions(&mut map, 2), 1);
        assert_eq!(map.labels(), &[0, 0, 0, 2, 2]);
        assert_eq!(map.regions()[0].count, 3);
    }

    #[test]
    fn regions_at_the_threshold_are_kept() {
        let mut map = map_from_pattern(&["brg", "brg", "brg"]);
        let expected = map.clone();
        assert_eq!(merge_small_regions(&mut map, 3), 0);
        assert_eq!(map, expected);
    }

    #[test]
    fn whole_raster_region_is_left_alone() {
        let mut map = map_from_pattern(&["bb", "bb"]);
        let expected = map.clone();
        assert_eq!(merge_small_regions(&mut map, 100), 0);
        assert_eq!(map, expected);
    }

    #[test]
    fn best_neighbor_uses_counts_from_before_merging() {
        // regions: b(0)=1, w(1)=1, r(2)=2
        // b's only neighbor is w; w's largest neighbor is r
        let mut map = map_from_pattern(&["bwrr"]);
        assert_eq!(merge_small_regions(&mut map, 3), 2);
        // b -> w, then w (holding b's pixel too) -> r
        assert_eq!(map.labels(), &[2, 2, 2, 2]);
        assert_eq!(map.regions()[2].count, 4);
        assert_eq!(map.total_count(), 4);
    }

    #[test]
    fn grown_region_is_not_merged() {
        // b(0)=1 merges into w(1)=1, which then holds 2 pixels and is no longer small
        let mut map = map_from_pattern(&["bwrrr"]);
        assert_eq!(merge_small_regions(&mut map, 2), 1);
        assert_eq!(map.labels(), &[1, 1, 2, 2, 2]);
        assert_eq!(map.regions()[1].count, 2);
    }

    #[test]
    fn counts_match_labels_after_merging() {
        let mut map = map_from_pattern(&[
            "bbbbwwwwrr",
            "bgbbwwrwrr",
            "bbbbwwwwrr",
            "rrgggggbbb",
            "rrgwggggbb",
        ]);
        merge_small_regions(&mut map, 4);
        assert_eq!(
            recount(&map),
            map.regions().iter().map(|r| r.count).collect::<Vec<_>>()
        );
        assert_eq!(map.total_count(), 50);
    }
}
