//! Loading and sampling of microscopy plate images.
//!
//! Files follow the plate scanner naming scheme, one file per channel:
//! brightfield z-slides are the model input, fluorescence action layers the
//! target. Sites are split into training and validation subsets which are
//! walked by independent cyclic samplers.

pub mod assembler;
pub mod augmentation;
pub mod crop;
pub mod cyclic_sampler;
pub mod magnification;
pub mod plate_batcher;
pub mod plate_dataset;
pub mod plate_filename;
pub mod split;
