//! A library for turning photographic rasters (e.g., satellite textures) into
//! posterized "flat color blob" rasters suitable as base color texture maps.
//!
//! The output has a small fixed number of uniform colors and blocky, hard-edged region boundaries.
//! Internally, an image goes through the following stages in order:
//! 1. [`blur`]: a separable box blur to suppress photographic noise.
//! 2. [`kmeans`]: k-means color clustering with k-means++ seeding, reducing the image to exactly `k` colors.
//! 3. [`mode_filter`]: an iterative majority-vote filter that snaps wavy cluster boundaries into blocky shapes.
//! 4. [`regions`]: 4-connected flood fill labelling of the resulting flat color raster.
//! 5. [`merge`]: absorption of undersized regions into their largest neighbor.
//! 6. [`composite`]: writing the final RGBA buffer and counting the surviving regions.
//!
//! # Features
//! `blobify` has several `cargo` features that can be turned off or on:
//! - `pipelines`: exposes builder structs that serve as the high-level API (more details below).
//! - `threads`: runs a whole segmentation on a background thread pool via [`rayon`].
//! - `image`: enables integration with the [`image`] crate.
//!
//! # High-Level API
//! To get started with the high-level API, see [`SegmentPipeline`] and [`SegmentOptions`].
//! ```no_run
//! # use blobify::{SegmentOptions, SegmentPipeline};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let img = image::open("some image")?.into_rgba8();
//!
//! let mut pipeline = SegmentPipeline::try_from(&img)?;
//! pipeline.options(
//!     SegmentOptions::new()
//!         .colors(8)
//!         .mode_passes(4)
//!         .min_region_size(64)
//!         .seed(Some(42)),
//! );
//!
//! let segmented = pipeline.segmented_rgbaimage()?;
//! # Ok(())
//! # }
//! ```
//!
//! Note that some of the options and functions above require certain features to be enabled.

#![deny(unsafe_code)]
#![warn(
    clippy::pedantic,
    clippy::cargo,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::todo,
    clippy::unimplemented,
    clippy::unwrap_used,
    clippy::unwrap_in_result,
    clippy::expect_used,
    clippy::unneeded_field_pattern,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::unnecessary_self_imports,
    clippy::str_to_string,
    clippy::string_to_string,
    clippy::string_slice,
    missing_docs,
    clippy::missing_docs_in_private_items,
    rustdoc::all,
    clippy::float_cmp_const,
    clippy::lossy_float_literal
)]
#![allow(
    clippy::doc_markdown,
    clippy::module_name_repetitions,
    clippy::many_single_char_names,
    clippy::missing_panics_doc,
    clippy::unreadable_literal,
    clippy::wildcard_imports
)]

mod error;
mod segment;
mod types;

#[cfg(feature = "pipelines")]
mod api;

pub mod blur;
pub mod composite;
pub mod kmeans;
pub mod merge;
pub mod mode_filter;
pub mod regions;
pub mod worker;

pub use error::*;
pub use segment::*;
pub use types::*;

#[cfg(feature = "pipelines")]
pub use api::*;

/// The maximum supported image size in number of pixels is `u32::MAX`.
pub const MAX_PIXELS: u32 = u32::MAX;

/// The minimum supported number of output colors is `2`.
pub const MIN_COLORS: u16 = 2;

/// The maximum supported number of output colors is `256`.
pub const MAX_COLORS: u16 = u8::MAX as u16 + 1;
