//! An iterative mode (majority vote) filter over a cluster index map.
//!
//! Each sweep replaces every index with the most frequent index inside the
//! `(2 * radius + 1)²` window around it. The window is clipped to the raster bounds,
//! so it shrinks near the edges. Sweeps are double buffered: a sweep only ever reads
//! the output of the previous sweep.
//!
//! Ties are resolved exactly like this: the pixel's own index is the starting candidate with
//! a vote count of zero, then indices are scanned in ascending order and replace the candidate
//! only with a strictly greater vote count. Since the window always contains the pixel itself,
//! the lowest index among those with the most votes wins.

use crate::{ColorCount, MAX_COLORS};

/// A histogram of index votes inside the current window.
type Votes = [u32; MAX_COLORS as usize];

/// Adds (or removes, if `add` is `false`) the votes of one window column.
#[inline]
fn tally_column(
    votes: &mut Votes,
    src: &[u8],
    width: usize,
    x: usize,
    rows: (usize, usize),
    add: bool,
) {
    let (y0, y1) = rows;
    for y in y0..=y1 {
        let vote = &mut votes[usize::from(src[y * width + x])];
        if add {
            *vote += 1;
        } else {
            *vote -= 1;
        }
    }
}

/// Picks the winning index for a pixel whose current index is `own`.
#[inline]
fn winner(votes: &Votes, k: usize, own: u8) -> u8 {
    let mut best = own;
    let mut best_votes = 0;
    for (c, &v) in votes[..k].iter().enumerate() {
        if v > best_votes {
            best_votes = v;
            #[allow(clippy::cast_possible_truncation)]
            {
                best = c as u8;
            }
        }
    }
    best
}

/// Runs a single sweep from `src` into `dst`.
///
/// The histogram slides along each row, adding the incoming column and removing the outgoing one.
fn sweep(src: &[u8], dst: &mut [u8], width: usize, height: usize, k: usize, radius: usize) {
    let mut votes: Votes = [0; MAX_COLORS as usize];

    for y in 0..height {
        let rows = (y.saturating_sub(radius), (y + radius).min(height - 1));

        votes.fill(0);
        for x in 0..=radius.min(width - 1) {
            tally_column(&mut votes, src, width, x, rows, true);
        }

        for x in 0..width {
            let i = y * width + x;
            dst[i] = winner(&votes, k, src[i]);

            if x >= radius {
                tally_column(&mut votes, src, width, x - radius, rows, false);
            }
            if x + radius + 1 < width {
                tally_column(&mut votes, src, width, x + radius + 1, rows, true);
            }
        }
    }
}

/// Applies `passes` sweeps of the mode filter to `indices`, returning the filtered indices.
///
/// `indices` must have a length of `width * height`, and every index should be less than `k`.
/// Indices greater than or equal to `k` never win a vote,
/// but a pixel keeps such an index if no index below `k` appears in its window.
///
/// A `passes` of `0` returns `indices` unchanged.
#[must_use]
pub fn mode_filter(
    indices: Vec<u8>,
    width: u32,
    height: u32,
    k: ColorCount,
    radius: u32,
    passes: u32,
) -> Vec<u8> {
    let (width, height) = (width as usize, height as usize);
    debug_assert_eq!(indices.len(), width * height);

    if passes == 0 || indices.is_empty() {
        return indices;
    }

    let radius = radius as usize;
    let k = k.as_usize();

    let mut src = indices;
    let mut dst = vec![0; src.len()];
    for _ in 0..passes {
        sweep(&src, &mut dst, width, height, k, radius);
        std::mem::swap(&mut src, &mut dst);
    }

    src
}
