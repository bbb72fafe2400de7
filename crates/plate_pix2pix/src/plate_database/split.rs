use std::{
    fs::{self, File},
    io,
    path::Path,
};

use log::info;
use rand::{Rng, seq::SliceRandom};
use ron::{
    de::{SpannedError, from_reader},
    ser::to_writer,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::plate_filename::PlateSite;

#[derive(Error, Debug)]
pub enum SplitError {
    #[error("The training ratio must be in [0, 1], got {0}")]
    InvalidRatio(f64),
    #[error("The path {} is not valid because {}", .path, .reason)]
    InvalidPath { path: String, reason: String },
    #[error("Unable to deserialize ron file due to {:?}", .0)]
    RonDeserializationError(#[from] SpannedError),
    #[error("Unable load ron file due to {:?}", .0)]
    RonFileLoadingError(#[from] io::Error),
    #[error("Unable to serialize ron file due to {:?}", .0)]
    RonSerializationError(#[from] ron::error::Error),
}

/// Disjoint training and validation subsets of a site universe.
///
/// Both lists keep the shuffled order they were cut from; samplers walk them
/// in exactly that order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SiteSplit {
    pub training: Vec<PlateSite>,
    pub validation: Vec<PlateSite>,
}

impl SiteSplit {
    /// Shuffles `universe` with `rng` and keeps the first
    /// `floor(len * train_ratio)` sites for training.
    ///
    /// A ratio of exactly 0 or 1 is accepted here and leaves one subset empty.
    pub fn partition<R: Rng + ?Sized>(
        mut universe: Vec<PlateSite>,
        train_ratio: f64,
        rng: &mut R,
    ) -> Result<Self, SplitError> {
        if !(0. ..=1.).contains(&train_ratio) {
            return Err(SplitError::InvalidRatio(train_ratio));
        }
        let train_amount = (universe.len() as f64 * train_ratio).floor() as usize;
        universe.shuffle(rng);
        let validation = universe.split_off(train_amount);
        info!(
            "split {} sites into {} training and {} validation sites",
            universe.len() + validation.len(),
            universe.len(),
            validation.len()
        );
        Ok(Self {
            training: universe,
            validation,
        })
    }

    pub fn universe_len(&self) -> usize {
        self.training.len() + self.validation.len()
    }

    pub fn save_to_ron(&self, path: &Path) -> Result<(), SplitError> {
        if path.exists() {
            if path.is_dir() {
                return Err(SplitError::InvalidPath {
                    path: format!("{:?}", path),
                    reason: "Invalid Path. Please enter a .ron path".into(),
                });
            }
            info!("Removing {:?}", path);
            fs::remove_file(path)?;
        }
        let file = File::create_new(path)?;
        to_writer(file, self)?;
        Ok(())
    }

    pub fn load_from_ron(path: &Path) -> Result<Self, SplitError> {
        if !path.exists() {
            return Err(SplitError::InvalidPath {
                path: format!("{:?}", path),
                reason: "The path does not exist".into(),
            });
        }
        if path.is_dir() {
            return Err(SplitError::InvalidPath {
                path: format!("{:?}", path),
                reason: "The path does not lead to a valid .ron file".into(),
            });
        }
        let file = File::open(path)?;
        Ok(from_reader(file)?)
    }
}
