//! A separable box blur used to suppress photographic noise before clustering.
//!
//! Each pass blurs every row and then every column with a `(2 * radius + 1)`-wide
//! mean filter. Samples that fall outside of the raster reuse the nearest edge pixel
//! (replicate padding). Repeating the blur a few times approximates a Gaussian.
//!
//! Window sums are maintained as a running sum (add the incoming sample, subtract the outgoing one),
//! so the cost of a pass does not depend on the radius.

use crate::Planes;

/// Blurs a single line of `len` samples spaced `stride` apart, starting at `start`.
///
/// `line` is scratch space that receives a copy of the unblurred samples.
#[allow(clippy::cast_precision_loss)]
fn blur_line(
    data: &mut [f32],
    line: &mut Vec<f32>,
    start: usize,
    stride: usize,
    len: usize,
    radius: usize,
) {
    line.clear();
    line.extend((0..len).map(|i| data[start + i * stride]));

    let last = len - 1;
    let inv_diameter = 1.0 / (radius * 2 + 1) as f64;

    // window for index 0 spans -radius..=radius
    let mut sum = f64::from(line[0]) * radius as f64;
    for &v in &line[..=radius.min(last)] {
        sum += f64::from(v);
    }
    if radius > last {
        sum += f64::from(line[last]) * (radius - last) as f64;
    }

    for i in 0..len {
        #[allow(clippy::cast_possible_truncation)]
        {
            data[start + i * stride] = (sum * inv_diameter) as f32;
        }
        let incoming = line[(i + radius + 1).min(last)];
        let outgoing = line[i.saturating_sub(radius)];
        sum += f64::from(incoming) - f64::from(outgoing);
    }
}

/// Blurs every row of a single channel plane.
fn blur_horizontal(
    data: &mut [f32],
    width: usize,
    height: usize,
    radius: usize,
    line: &mut Vec<f32>,
) {
    for y in 0..height {
        blur_line(data, line, y * width, 1, width, radius);
    }
}

/// Blurs every column of a single channel plane.
fn blur_vertical(
    data: &mut [f32],
    width: usize,
    height: usize,
    radius: usize,
    line: &mut Vec<f32>,
) {
    for x in 0..width {
        blur_line(data, line, x, width, height, radius);
    }
}

/// Applies one horizontal and one vertical box blur pass with the given `radius` to every channel.
///
/// A `radius` of `0` leaves the planes unchanged.
pub fn box_blur(planes: &mut Planes, radius: u32) {
    if radius == 0 || planes.is_empty() {
        return;
    }

    let (width, height) = planes.dimensions();
    let (width, height) = (width as usize, height as usize);
    let radius = radius as usize;
    let mut line = Vec::with_capacity(width.max(height));

    for channel in planes.channels_mut() {
        blur_horizontal(channel, width, height, radius, &mut line);
        blur_vertical(channel, width, height, radius, &mut line);
    }
}

/// Applies [`box_blur`] `passes` times.
pub fn box_blur_passes(planes: &mut Planes, radius: u32, passes: u32) {
    for _ in 0..passes {
        box_blur(planes, radius);
    }
}
