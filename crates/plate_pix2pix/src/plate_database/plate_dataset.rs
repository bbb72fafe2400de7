use std::{
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use burn::{config::Config, data::dataset::Dataset};
use log::{debug, info};
use rand::{Rng, SeedableRng, rngs::StdRng};
use thiserror::Error;

use super::{
    assembler::{AssemblyError, ChannelAssembler, PlateSample},
    augmentation::{Augmentation, AugmentationError, AugmentationOp},
    crop::{CropError, CropSize, crop_to_multiple_of, random_crop},
    cyclic_sampler::{CyclicSampler, SamplerError, SubsetKind},
    magnification::Magnification,
    plate_filename::{ChannelLayout, PlateFileIndex, PlateIndexError, PlateSite},
    split::{SiteSplit, SplitError},
};

#[derive(Config, Debug)]
pub struct PlateDatasetConfig {
    /// Directory that contains the `<magnification> images` folders.
    pub root: PathBuf,
    #[config(default = "Magnification::X60")]
    pub magnification: Magnification,
    #[config(default = "String::from(\".tif\")")]
    pub extension: String,
    #[config(default = "ChannelLayout::Flat")]
    pub layout: ChannelLayout,
    /// Share of the site universe used for training.
    #[config(default = 0.7)]
    pub train_ratio: f64,
    /// Seeds both the split shuffle and the augmentation draws.
    #[config(default = "None")]
    pub seed: Option<u64>,
    #[config(default = 256)]
    pub crop_height: usize,
    #[config(default = 256)]
    pub crop_width: usize,
    /// Loaded images are trimmed to multiples of this before branching.
    #[config(default = 32)]
    pub crop_to_multiple_of: usize,
    #[config(default = 4)]
    pub input_action: u8,
    #[config(default = "vec![1, 2, 3]")]
    pub target_actions: Vec<u8>,
    #[config(default = "Augmentation::default_ops()")]
    pub augmentation: Vec<AugmentationOp>,
}

impl PlateDatasetConfig {
    /// `<root>/<magnification> images`
    pub fn image_root(&self) -> PathBuf {
        self.root.join(self.magnification.folder_name())
    }

    pub fn crop_size(&self) -> CropSize {
        CropSize::new(self.crop_height, self.crop_width)
    }
}

#[derive(Debug, Error)]
pub enum PlateDatasetError {
    #[error("Indexing error: {0}")]
    IndexError(#[from] PlateIndexError),
    #[error("Split error: {0}")]
    SplitError(#[from] SplitError),
    #[error("Sampler error: {0}")]
    SamplerError(#[from] SamplerError),
    #[error("Assembly error: {0}")]
    AssemblyError(#[from] AssemblyError),
    #[error("Augmentation error: {0}")]
    AugmentationError(#[from] AugmentationError),
    #[error("Crop error: {0}")]
    CropError(#[from] CropError),
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

/// Pull based sample source over a split plate.
///
/// Every pull draws the next site of one subset, loads its channel stacks and
/// then post-processes them depending on the subset:
/// validation samples are returned as loaded, training samples are augmented
/// and randomly cropped to the configured tile size.
#[derive(Debug)]
pub struct PlateDataset {
    config: PlateDatasetConfig,
    assembler: ChannelAssembler,
    augmentation: Augmentation,
    split: SiteSplit,
    training: CyclicSampler,
    validation: CyclicSampler,
    rng: Mutex<StdRng>,
    is_validation: AtomicBool,
}

impl PlateDataset {
    /// Scans the image directory, builds the site universe and splits it.
    pub fn new(config: PlateDatasetConfig) -> Result<Self, PlateDatasetError> {
        let image_root = config.image_root();
        let index = PlateFileIndex::scan(&config.layout.input_dir(&image_root), &config.extension)?;
        let profile = config.magnification.profile();
        if index.wells().len() != profile.wells {
            info!(
                "found {} wells, the {} profile lists {}",
                index.wells().len(),
                config.magnification,
                profile.wells
            );
        }
        let universe = profile.site_universe(index.wells());
        let mut rng = seeded_rng(config.seed);
        let split = SiteSplit::partition(universe, config.train_ratio, &mut rng)?;
        Self::build(config, split, rng)
    }

    /// Builds the dataset from a stored split instead of scanning.
    pub fn with_split(config: PlateDatasetConfig, split: SiteSplit) -> Result<Self, PlateDatasetError> {
        let rng = seeded_rng(config.seed);
        Self::build(config, split, rng)
    }

    fn build(
        config: PlateDatasetConfig,
        split: SiteSplit,
        rng: StdRng,
    ) -> Result<Self, PlateDatasetError> {
        let training = CyclicSampler::new(SubsetKind::Training, split.training.clone())?;
        let validation = CyclicSampler::new(SubsetKind::Validation, split.validation.clone())?;
        let assembler = ChannelAssembler::new(
            &config.image_root(),
            config.layout,
            config.magnification.profile(),
            &config.extension,
            config.input_action,
            config.target_actions.clone(),
        );
        let dataset = Self {
            augmentation: Augmentation::new(config.augmentation.clone()),
            assembler,
            split,
            training,
            validation,
            rng: Mutex::new(rng),
            is_validation: AtomicBool::new(false),
            config,
        };
        dataset.check_sites()?;
        info!(
            "plate dataset ready: {} training / {} validation sites, tiles of {}x{}",
            dataset.training.len(),
            dataset.validation.len(),
            dataset.config.crop_height,
            dataset.config.crop_width
        );
        Ok(dataset)
    }

    /// Makes sure every channel file of both subsets exists and that the
    /// configured tile fits into every training site, in both orientations
    /// when the augmentation can transpose. Only image headers are read.
    fn check_sites(&self) -> Result<(), PlateDatasetError> {
        for site in self.split.training.iter().chain(self.split.validation.iter()) {
            let mut paths = self.assembler.input_paths(site);
            paths.extend(self.assembler.target_paths(site));
            if let Some(missing) = paths.into_iter().find(|p| !p.is_file()) {
                return Err(AssemblyError::MissingChannelFile(missing).into());
            }
        }
        let crop = self.config.crop_size();
        let multiple = self.config.crop_to_multiple_of;
        for site in &self.split.training {
            let path = self.assembler.input_path(site, 1);
            let (width, height) = image::image_dimensions(&path)
                .map_err(|source| AssemblyError::DecodingError { path, source })?;
            let (mut h, mut w) = (height as usize, width as usize);
            if multiple > 1 {
                h = h / multiple * multiple;
                w = w / multiple * multiple;
            }
            if !crop.fits((h, w)) || (self.augmentation.may_transpose() && !crop.fits((w, h))) {
                return Err(CropError::ExceedsSource {
                    site: site.to_string(),
                    crop,
                    source_dims: (h, w),
                }
                .into());
            }
        }
        Ok(())
    }

    pub fn set_validation(&self, is_validation: bool) {
        self.is_validation.store(is_validation, Ordering::SeqCst);
    }

    pub fn is_validation(&self) -> bool {
        self.is_validation.load(Ordering::SeqCst)
    }

    /// Pulls the next sample of the subset selected by the validation flag.
    pub fn next_sample(&self) -> Result<PlateSample, PlateDatasetError> {
        self.sample(SubsetKind::from_validation_flag(self.is_validation()))
    }

    /// Pulls the next sample of `kind`, advancing only that subset's cursor.
    pub fn sample(&self, kind: SubsetKind) -> Result<PlateSample, PlateDatasetError> {
        let site = self.sampler(kind).next_site();
        debug!("pulled {} from the {} subset", site, kind);
        self.load(&site, kind)
    }

    /// Loads `site` and applies the post-processing of `kind`.
    pub fn load(&self, site: &PlateSite, kind: SubsetKind) -> Result<PlateSample, PlateDatasetError> {
        let sample = crop_to_multiple_of(
            self.assembler.assemble(site)?,
            self.config.crop_to_multiple_of,
        )?;
        match kind {
            SubsetKind::Validation => Ok(sample),
            SubsetKind::Training => {
                // only the seed draw is serialized, the warp runs unlocked
                let seed = self
                    .rng
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .random::<u64>();
                let mut rng = StdRng::seed_from_u64(seed);
                let sample = self.augmentation.apply(sample, &mut rng)?;
                Ok(random_crop(sample, self.config.crop_size(), &mut rng)?)
            }
        }
    }

    pub fn sampler(&self, kind: SubsetKind) -> &CyclicSampler {
        match kind {
            SubsetKind::Training => &self.training,
            SubsetKind::Validation => &self.validation,
        }
    }

    pub fn subset(&self, kind: SubsetKind) -> &[PlateSite] {
        match kind {
            SubsetKind::Training => &self.split.training,
            SubsetKind::Validation => &self.split.validation,
        }
    }

    pub fn split(&self) -> &SiteSplit {
        &self.split
    }

    pub fn save_split(&self, path: &Path) -> Result<(), PlateDatasetError> {
        Ok(self.split.save_to_ron(path)?)
    }

    pub fn config(&self) -> &PlateDatasetConfig {
        &self.config
    }

    pub fn assembler(&self) -> &ChannelAssembler {
        &self.assembler
    }

    pub fn augmentation(&self) -> &Augmentation {
        &self.augmentation
    }

    /// A burn [`Dataset`] over one subset of this dataset.
    pub fn subset_view(self: &Arc<Self>, kind: SubsetKind) -> PlateSubsetView {
        PlateSubsetView {
            dataset: Arc::clone(self),
            kind,
        }
    }
}

/// Indexed access to one subset, for burn's data loaders.
///
/// `get(i)` loads the i-th site of the subset directly and does not touch the
/// cyclic cursors. Channel files are verified when the dataset is built; a
/// load that still fails panics with the error.
#[derive(Debug, Clone)]
pub struct PlateSubsetView {
    dataset: Arc<PlateDataset>,
    kind: SubsetKind,
}

impl PlateSubsetView {
    pub fn kind(&self) -> SubsetKind {
        self.kind
    }
}

impl Dataset<PlateSample> for PlateSubsetView {
    fn get(&self, index: usize) -> Option<PlateSample> {
        let site = self.dataset.subset(self.kind).get(index)?;
        match self.dataset.load(site, self.kind) {
            Ok(sample) => Some(sample),
            // burn ends the epoch at the first `None`, so a broken site aborts instead
            Err(e) => panic!("failed to load {} of the {} subset: {}", site, self.kind, e),
        }
    }

    fn len(&self) -> usize {
        self.dataset.subset(self.kind).len()
    }
}
