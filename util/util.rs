#![allow(dead_code)]

use std::{
    path::{Path, PathBuf},
    sync::OnceLock,
};

use image::RgbaImage;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoroshiro128PlusPlus;

pub fn load_images(images: &[PathBuf]) -> Vec<(String, RgbaImage)> {
    images
        .iter()
        .map(|path| {
            image::open(path).map(|image| {
                (
                    path.file_name().unwrap().to_owned().into_string().unwrap(),
                    image.into_rgba8(),
                )
            })
        })
        .collect::<Result<_, _>>()
        .expect("loaded each image")
}

pub fn load_image_dir(dir: impl AsRef<Path>) -> Vec<(String, RgbaImage)> {
    let mut paths = std::fs::read_dir(dir)
        .expect("read img directory")
        .collect::<Result<Vec<_>, _>>()
        .expect("read each file")
        .iter()
        .map(std::fs::DirEntry::path)
        .collect::<Vec<_>>();

    paths.sort();

    load_images(&paths)
}

pub const TEXTURE_DIR: &str = "img/textures";

pub fn root_dir() -> PathBuf {
    // assume current exe path is something like: target/build/deps/current_exe
    let exe = std::env::current_exe().unwrap();
    exe.parent()
        .and_then(Path::parent)
        .and_then(Path::parent)
        .and_then(Path::parent)
        .unwrap()
        .to_owned()
}

/// A synthetic "terrain" texture: a few smooth color fields with per-pixel noise on top.
pub fn terrain(width: u32, height: u32, seed: u64) -> RgbaImage {
    let mut rng = Xoroshiro128PlusPlus::seed_from_u64(seed);
    let fields = [[34, 85, 40], [120, 105, 70], [60, 90, 130], [200, 195, 180]];
    RgbaImage::from_fn(width, height, |x, y| {
        let fx = f64::from(x) / f64::from(width);
        let fy = f64::from(y) / f64::from(height);
        let wave = (fx * 7.0).sin() + (fy * 5.0).cos() + (fx * fy * 11.0).sin();
        let field = fields[((wave + 3.0) / 6.0 * 3.999) as usize % fields.len()];
        let mut channel = |c: u8| c.saturating_add_signed(rng.gen_range(-24..=24));
        image::Rgba([channel(field[0]), channel(field[1]), channel(field[2]), u8::MAX])
    })
}

pub fn synthetic_images() -> Vec<(String, RgbaImage)> {
    [(256, 256), (512, 384), (1024, 1024)]
        .into_iter()
        .map(|(w, h)| (format!("terrain_{w}x{h}"), terrain(w, h, 42)))
        .collect()
}

static TEXTURE_IMAGES: OnceLock<Vec<(String, RgbaImage)>> = OnceLock::new();

/// Loads the images in [`TEXTURE_DIR`] if it exists, otherwise generates synthetic ones.
pub fn load_texture_images() -> Vec<(String, RgbaImage)> {
    let dir = root_dir().join(TEXTURE_DIR);
    if dir.is_dir() {
        load_image_dir(dir)
    } else {
        synthetic_images()
    }
}

pub fn texture_images() -> &'static [(String, RgbaImage)] {
    TEXTURE_IMAGES.get_or_init(load_texture_images)
}
