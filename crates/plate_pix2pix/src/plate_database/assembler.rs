use std::{
    io,
    path::{Path, PathBuf},
};

use image::ImageReader;
use log::debug;
use ndarray::{Array2, Array3, ArrayView2, Axis};
use thiserror::Error;

use super::{
    magnification::MagnificationProfile,
    plate_filename::{ChannelLayout, PlateFileName, PlateSite, normalize_extension},
};

/// Input and target stacks of one site, pixel aligned.
#[derive(Debug, Clone, PartialEq)]
pub struct PlateSample {
    pub site: PlateSite,
    /// brightfield z-slides, `[height, width, z_slides]`
    pub input: Array3<f32>,
    /// fluorescence action layers, `[height, width, actions]`
    pub target: Array3<f32>,
}

impl PlateSample {
    /// `(height, width)` of the input stack.
    pub fn spatial_dims(&self) -> (usize, usize) {
        let (h, w, _) = self.input.dim();
        (h, w)
    }

    pub fn is_aligned(&self) -> bool {
        let (h, w, _) = self.target.dim();
        self.spatial_dims() == (h, w)
    }
}

#[derive(Error, Debug)]
pub enum AssemblyError {
    #[error("Missing channel file {}", .0.display())]
    MissingChannelFile(PathBuf),
    #[error("failed to load {} due to {:?}", .path.display(), .source)]
    LoadingError { path: PathBuf, source: io::Error },
    #[error("Failed to decode {} due to {:?}", .path.display(), .source)]
    DecodingError {
        path: PathBuf,
        source: image::error::ImageError,
    },
    #[error("{} is {:?} (height, width) but the stack is {:?}", .path.display(), .found, .expected)]
    ChannelShapeMismatch {
        path: PathBuf,
        expected: (usize, usize),
        found: (usize, usize),
    },
    #[error("Input stack {:?} and target stack {:?} of {} are not aligned", .input, .target, .site)]
    StackMismatch {
        site: PlateSite,
        input: (usize, usize),
        target: (usize, usize),
    },
    #[error("Unable to build channel array due to {0}")]
    ShapeError(#[from] ndarray::ShapeError),
}

/// Builds the channel file names of a site and stacks the loaded images.
#[derive(Debug, Clone)]
pub struct ChannelAssembler {
    input_dir: PathBuf,
    target_dir: PathBuf,
    extension: String,
    z_slides: u8,
    input_action: u8,
    target_actions: Vec<u8>,
}

impl ChannelAssembler {
    pub fn new(
        image_root: &Path,
        layout: ChannelLayout,
        profile: MagnificationProfile,
        extension: &str,
        input_action: u8,
        target_actions: Vec<u8>,
    ) -> Self {
        Self {
            input_dir: layout.input_dir(image_root),
            target_dir: layout.target_dir(image_root),
            extension: normalize_extension(extension),
            z_slides: profile.z_slides,
            input_action,
            target_actions,
        }
    }

    pub fn input_path(&self, site: &PlateSite, z_slide: u8) -> PathBuf {
        self.input_dir.join(
            PlateFileName::new(site, self.input_action, z_slide).file_name(&self.extension),
        )
    }

    pub fn target_path(&self, site: &PlateSite, action: u8) -> PathBuf {
        self.target_dir
            .join(PlateFileName::new(site, action, 1).file_name(&self.extension))
    }

    /// One path per z-slide, ascending.
    pub fn input_paths(&self, site: &PlateSite) -> Vec<PathBuf> {
        (1..=self.z_slides)
            .map(|z_slide| self.input_path(site, z_slide))
            .collect()
    }

    /// One path per target action, in configured order.
    pub fn target_paths(&self, site: &PlateSite) -> Vec<PathBuf> {
        self.target_actions
            .iter()
            .map(|&action| self.target_path(site, action))
            .collect()
    }

    pub fn input_channels(&self) -> usize {
        self.z_slides as usize
    }

    pub fn target_channels(&self) -> usize {
        self.target_actions.len()
    }

    pub fn assemble(&self, site: &PlateSite) -> Result<PlateSample, AssemblyError> {
        debug!("assembling {}", site);
        let input = stack_channels(&self.input_paths(site))?;
        let target = stack_channels(&self.target_paths(site))?;
        let sample = PlateSample {
            site: site.clone(),
            input,
            target,
        };
        if !sample.is_aligned() {
            let (h, w, _) = sample.target.dim();
            return Err(AssemblyError::StackMismatch {
                site: sample.site.clone(),
                input: sample.spatial_dims(),
                target: (h, w),
            });
        }
        Ok(sample)
    }
}

/// Loads a single channel file as a `[height, width]` array with values in `[0, 1]`.
pub fn load_channel(path: &Path) -> Result<Array2<f32>, AssemblyError> {
    if !path.is_file() {
        return Err(AssemblyError::MissingChannelFile(path.to_path_buf()));
    }
    let image = ImageReader::open(path)
        .map_err(|source| AssemblyError::LoadingError {
            path: path.to_path_buf(),
            source,
        })?
        .decode()
        .map_err(|source| AssemblyError::DecodingError {
            path: path.to_path_buf(),
            source,
        })?;
    let luma = image.to_luma32f();
    let (width, height) = luma.dimensions();
    Ok(Array2::from_shape_vec(
        (height as usize, width as usize),
        luma.into_raw(),
    )?)
}

/// Loads every path in order and stacks them along the channel axis.
pub fn stack_channels(paths: &[PathBuf]) -> Result<Array3<f32>, AssemblyError> {
    let mut channels: Vec<Array2<f32>> = Vec::with_capacity(paths.len());
    for path in paths {
        let channel = load_channel(path)?;
        if let Some(first) = channels.first() {
            if first.dim() != channel.dim() {
                return Err(AssemblyError::ChannelShapeMismatch {
                    path: path.clone(),
                    expected: first.dim(),
                    found: channel.dim(),
                });
            }
        }
        channels.push(channel);
    }
    let views: Vec<ArrayView2<f32>> = channels.iter().map(|c| c.view()).collect();
    Ok(ndarray::stack(Axis(2), &views)?)
}
