//! Writes the final RGBA buffer from a region label map.

use crate::regions::RegionMap;

use bitvec::vec::BitVec;
use palette::{cast::IntoComponents, Srgba, WithAlpha};

/// Returns the number of distinct region identifiers present in the label map.
#[must_use]
pub fn surviving_regions(map: &RegionMap) -> u32 {
    let mut present = BitVec::<usize>::repeat(false, map.regions().len());
    for &label in map.labels() {
        present.set(label as usize, true);
    }

    #[allow(clippy::cast_possible_truncation)]
    {
        present.count_ones() as u32
    }
}

/// Renders every pixel with the exact color of its region, at full opacity.
///
/// The returned buffer holds `width * height * 4` bytes in RGBA order.
#[must_use]
pub fn render_rgba(map: &RegionMap) -> Vec<u8> {
    let regions = map.regions();
    map.labels()
        .iter()
        .map(|&label| regions[label as usize].color.with_alpha(u8::MAX))
        .collect::<Vec<Srgba<u8>>>()
        .into_components()
}

/// Renders the RGBA buffer and counts the surviving regions.
#[must_use]
pub fn composite(map: &RegionMap) -> (Vec<u8>, u32) {
    (render_rgba(map), surviving_regions(map))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{merge::merge_small_regions, regions::extract};
    use palette::Srgb;

    #[test]
    fn renders_region_colors_opaque() {
        let colors = [Srgb::new(1, 2, 3), Srgb::new(4, 5, 6)];
        let map = extract(&colors, 2, 1);
        let (rgba, regions) = composite(&map);
        assert_eq!(rgba, vec![1, 2, 3, 255, 4, 5, 6, 255]);
        assert_eq!(regions, 2);
    }

    #[test]
    fn merged_regions_are_not_counted() {
        let black = Srgb::new(0, 0, 0);
        let red = Srgb::new(255, 0, 0);
        let colors = [black, black, black, black, red, black, black, black, black];
        let mut map = extract(&colors, 3, 3);
        assert_eq!(surviving_regions(&map), 2);

        merge_small_regions(&mut map, 2);
        let (rgba, regions) = composite(&map);
        assert_eq!(regions, 1);
        assert_eq!(map.num_regions(), 2);
        assert!(rgba.chunks_exact(4).all(|p| p == [0, 0, 0, 255]));
    }

    #[test]
    fn separate_regions_of_one_color_are_counted_separately() {
        let black = Srgb::new(0, 0, 0);
        let white = Srgb::new(255, 255, 255);
        let map = extract(&[black, white, black], 3, 1);
        assert_eq!(surviving_regions(&map), 3);
    }
}
