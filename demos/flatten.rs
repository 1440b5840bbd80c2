#![deny(unsafe_code, unsafe_op_in_unsafe_fn)]
#![warn(
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::todo,
    clippy::unimplemented,
    clippy::unneeded_field_pattern,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::unnecessary_self_imports,
    clippy::str_to_string,
    clippy::string_to_string,
    clippy::string_slice
)]

use std::{path::PathBuf, process::ExitCode};

use blobify::{
    segment_image, segment_image_background, worker::CancelToken, ColorCount, SegmentOptions,
};
use clap::Parser;

#[derive(Parser)]
pub struct Options {
    #[arg(short, long, default_value_t = ColorCount::default(), value_parser = parse_color_count)]
    k: ColorCount,

    #[arg(long, default_value_t = 6)]
    blur_radius: u32,

    #[arg(long, default_value_t = 3)]
    blur_passes: u32,

    #[arg(long, default_value_t = 3)]
    mode_radius: u32,

    #[arg(long, default_value_t = 3)]
    mode_passes: u32,

    #[arg(long, default_value_t = 100)]
    min_region_size: u32,

    /// Largest side to process at, 0 to process at full resolution.
    #[arg(long, default_value_t = 512)]
    max_dimension: u32,

    #[arg(long)]
    seed: Option<u64>,

    /// Run on the background worker and print progress.
    #[arg(long)]
    background: bool,

    #[arg(long)]
    verbose: bool,

    input: PathBuf,

    output: PathBuf,
}

fn parse_color_count(s: &str) -> Result<ColorCount, String> {
    let value: u16 = s.parse().map_err(|e| format!("{e}"))?;
    value.try_into().map_err(|e| format!("{e}"))
}

fn main() -> ExitCode {
    env_logger::init();

    let Options {
        k,
        blur_radius,
        blur_passes,
        mode_radius,
        mode_passes,
        min_region_size,
        max_dimension,
        seed,
        background,
        verbose,
        input,
        output,
    } = Options::parse();

    macro_rules! log {
        ($name: literal, $val: expr) => {
            if verbose {
                let time = std::time::Instant::now();
                let value = $val;
                println!("{} took {}ms", $name, time.elapsed().as_millis());
                value
            } else {
                $val
            }
        };
    }

    let image = match log!("read image", image::open(&input)) {
        Ok(image) => image.into_rgba8(),
        Err(err) => {
            eprintln!("failed to read {}: {err}", input.display());
            return ExitCode::FAILURE;
        }
    };

    let options = SegmentOptions::new()
        .colors(k)
        .blur_radius(blur_radius)
        .blur_passes(blur_passes)
        .mode_radius(mode_radius)
        .mode_passes(mode_passes)
        .min_region_size(min_region_size)
        .max_dimension((max_dimension > 0).then_some(max_dimension))
        .seed(seed);

    let result = if background {
        let token = CancelToken::new();
        log!(
            "segmentation",
            segment_image_background(&image, &options, &token, |p| {
                println!("{:>3.0}%", p.fraction() * 100.0);
            })
        )
    } else {
        log!("segmentation", segment_image(&image, &options))
    };

    let (segmented, regions) = match result {
        Ok(result) => result,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = log!("write image", segmented.save(&output)) {
        eprintln!("failed to write {}: {err}", output.display());
        return ExitCode::FAILURE;
    }

    println!("{regions} regions");
    ExitCode::SUCCESS
}
