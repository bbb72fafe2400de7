#![allow(dead_code)]

use std::{
    fs,
    path::{Path, PathBuf},
};

use image::{ImageBuffer, Luma};
use ndarray::Array3;
use plate_pix2pix::plate_database::{
    assembler::PlateSample,
    magnification::Magnification,
    plate_dataset::PlateDatasetConfig,
    plate_filename::{ChannelLayout, PlateFileName, PlateSite},
};

pub const WELLS: [&str; 2] = ["B02", "C03"];
pub const HEIGHT: u32 = 48;
pub const WIDTH: u32 = 64;

/// Channel codes written into every pixel: z-slide `k` of the input is `k`,
/// target action `a` is `10 + a`.
pub fn target_code(action: u8) -> u32 {
    10 + action as u32
}

/// `code * 4096 + y * 64 + x`, unique per channel and pixel for images up to 64x64.
pub fn pixel_value(code: u32, y: u32, x: u32) -> u16 {
    (code * 4096 + y * 64 + x) as u16
}

/// Inverse of the `[0, 1]` scaling applied when loading 16 bit images.
pub fn raw_value(value: f32) -> u32 {
    (value * u16::MAX as f32).round() as u32
}

pub fn channel_code(value: f32) -> u32 {
    raw_value(value) / 4096
}

pub fn unique_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("plate_pix2pix_{}_{}", name, std::process::id()));
    if dir.exists() {
        fs::remove_dir_all(&dir).expect("failed to clear test directory");
    }
    fs::create_dir_all(&dir).expect("failed to create test directory");
    dir
}

pub fn touch(dir: &Path, name: &str) {
    fs::write(dir.join(name), b"").expect("failed to create file");
}

fn write_channel(path: &Path, code: u32, height: u32, width: u32) {
    let image: ImageBuffer<Luma<u16>, Vec<u16>> =
        ImageBuffer::from_fn(width, height, |x, y| Luma([pixel_value(code, y, x)]));
    image.save(path).expect("failed to write tif");
}

/// A synthetic 20x plate on disk, removed on drop.
pub struct TestPlate {
    pub root: PathBuf,
    pub layout: ChannelLayout,
}

impl TestPlate {
    pub fn new(name: &str) -> Self {
        Self::with_layout(name, ChannelLayout::Flat, HEIGHT, WIDTH)
    }

    pub fn with_layout(name: &str, layout: ChannelLayout, height: u32, width: u32) -> Self {
        let root = unique_dir(name);
        let magnification = Magnification::X20;
        let image_root = root.join(magnification.folder_name());
        let input_dir = layout.input_dir(&image_root);
        let target_dir = layout.target_dir(&image_root);
        fs::create_dir_all(&input_dir).expect("failed to create input directory");
        fs::create_dir_all(&target_dir).expect("failed to create target directory");

        let profile = magnification.profile();
        for well in WELLS {
            for site in profile.sites() {
                let site = PlateSite::new(well, site);
                for z_slide in 1..=profile.z_slides {
                    let name = PlateFileName::new(&site, 4, z_slide).file_name(".tif");
                    write_channel(&input_dir.join(name), z_slide as u32, height, width);
                }
                for action in 1..=3u8 {
                    let name = PlateFileName::new(&site, action, 1).file_name(".tif");
                    write_channel(&target_dir.join(name), target_code(action), height, width);
                }
            }
        }
        Self { root, layout }
    }

    /// Overwrites every channel file of `site` with images of another size.
    pub fn rewrite_site(&self, site: &PlateSite, height: u32, width: u32) {
        let image_root = self.image_root();
        let input_dir = self.layout.input_dir(&image_root);
        let target_dir = self.layout.target_dir(&image_root);
        for z_slide in 1..=Magnification::X20.profile().z_slides {
            let name = PlateFileName::new(site, 4, z_slide).file_name(".tif");
            write_channel(&input_dir.join(name), z_slide as u32, height, width);
        }
        for action in 1..=3u8 {
            let name = PlateFileName::new(site, action, 1).file_name(".tif");
            write_channel(&target_dir.join(name), target_code(action), height, width);
        }
    }

    pub fn image_root(&self) -> PathBuf {
        self.root.join(Magnification::X20.folder_name())
    }

    pub fn config(&self) -> PlateDatasetConfig {
        PlateDatasetConfig::new(self.root.clone())
            .with_magnification(Magnification::X20)
            .with_layout(self.layout)
            .with_train_ratio(0.75)
            .with_seed(Some(7))
            .with_crop_height(32)
            .with_crop_width(32)
            .with_crop_to_multiple_of(16)
    }
}

impl Drop for TestPlate {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

/// In-memory sample whose target equals the first three input channels.
pub fn ramp_sample(height: usize, width: usize) -> PlateSample {
    let input = Array3::from_shape_fn((height, width, 7), |(y, x, k)| {
        (y * width + x) as f32 / (height * width) as f32 + k as f32
    });
    let target = input.slice(ndarray::s![.., .., 0..3]).to_owned();
    PlateSample {
        site: PlateSite::new("B02", 1),
        input,
        target,
    }
}
