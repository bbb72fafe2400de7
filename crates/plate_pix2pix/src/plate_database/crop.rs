use ndarray::{Array3, s};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::assembler::PlateSample;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropSize {
    pub height: usize,
    pub width: usize,
}

impl CropSize {
    pub fn new(height: usize, width: usize) -> Self {
        Self { height, width }
    }

    pub fn fits(&self, (height, width): (usize, usize)) -> bool {
        self.height <= height && self.width <= width
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CropError {
    #[error("A crop of {:?} does not fit into the {:?} (height, width) image of {}", .crop, .source_dims, .site)]
    ExceedsSource {
        site: String,
        crop: CropSize,
        source_dims: (usize, usize),
    },
    #[error("Input {:?} and target {:?} of {} are not aligned", .input, .target, .site)]
    Misaligned {
        site: String,
        input: (usize, usize),
        target: (usize, usize),
    },
}

fn aligned_dims(sample: &PlateSample) -> Result<(usize, usize), CropError> {
    let (h, w, _) = sample.target.dim();
    if !sample.is_aligned() {
        return Err(CropError::Misaligned {
            site: sample.site.to_string(),
            input: sample.spatial_dims(),
            target: (h, w),
        });
    }
    Ok((h, w))
}

fn window(stack: &Array3<f32>, corner: (usize, usize), size: CropSize) -> Array3<f32> {
    stack
        .slice(s![
            corner.0..corner.0 + size.height,
            corner.1..corner.1 + size.width,
            ..
        ])
        .to_owned()
}

/// Cuts the same window, top-left at `corner = (row, column)`, out of both stacks.
pub fn crop_window(
    sample: PlateSample,
    corner: (usize, usize),
    size: CropSize,
) -> Result<PlateSample, CropError> {
    let dims = aligned_dims(&sample)?;
    if corner.0 + size.height > dims.0 || corner.1 + size.width > dims.1 {
        return Err(CropError::ExceedsSource {
            site: sample.site.to_string(),
            crop: size,
            source_dims: dims,
        });
    }
    Ok(PlateSample {
        input: window(&sample.input, corner, size),
        target: window(&sample.target, corner, size),
        site: sample.site,
    })
}

/// Draws a corner uniformly so that the window stays inside the image and crops.
pub fn random_crop<R: Rng + ?Sized>(
    sample: PlateSample,
    size: CropSize,
    rng: &mut R,
) -> Result<PlateSample, CropError> {
    let dims = aligned_dims(&sample)?;
    if !size.fits(dims) {
        return Err(CropError::ExceedsSource {
            site: sample.site.to_string(),
            crop: size,
            source_dims: dims,
        });
    }
    let corner = (
        rng.random_range(0..=dims.0 - size.height),
        rng.random_range(0..=dims.1 - size.width),
    );
    crop_window(sample, corner, size)
}

/// Trims both stacks, centered, to the largest height and width that are
/// multiples of `multiple`. A multiple of 0 or 1 leaves the sample untouched.
pub fn crop_to_multiple_of(sample: PlateSample, multiple: usize) -> Result<PlateSample, CropError> {
    let dims = aligned_dims(&sample)?;
    if multiple <= 1 {
        return Ok(sample);
    }
    let size = CropSize::new(dims.0 / multiple * multiple, dims.1 / multiple * multiple);
    if size.height == 0 || size.width == 0 {
        return Err(CropError::ExceedsSource {
            site: sample.site.to_string(),
            crop: CropSize::new(multiple, multiple),
            source_dims: dims,
        });
    }
    if size.height == dims.0 && size.width == dims.1 {
        return Ok(sample);
    }
    let corner = ((dims.0 - size.height) / 2, (dims.1 - size.width) / 2);
    crop_window(sample, corner, size)
}
