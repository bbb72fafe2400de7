use std::{
    fmt,
    path::{Path, PathBuf},
    sync::LazyLock,
};

use log::info;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use walkdir::WalkDir;

/// Literal token every plate image name starts with.
pub const PLATE_PREFIX: &str = "AssayPlate_Greiner_#655090_";

const WELL_PATTERN: &str = r"AssayPlate_Greiner_#655090_(?P<well>[^_]+)_";
const FILE_NAME_PATTERN: &str = r"^AssayPlate_Greiner_#655090_(?P<well>[^_]+)_T0001F(?P<site>\d{3})L01A0(?P<action>\d)Z0(?P<z_slide>\d)C0(?P<channel>\d)(?P<extension>\.\w+)?$";

static FILE_NAME_REGEX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(FILE_NAME_PATTERN).ok());

/// One imaged field of view: a well and a 1-based site inside it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlateSite {
    pub well: String,
    pub site: u32,
}

impl PlateSite {
    pub fn new(well: impl Into<String>, site: u32) -> Self {
        Self {
            well: well.into(),
            site,
        }
    }
}

impl fmt::Display for PlateSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/F{:03}", self.well, self.site)
    }
}

/// The variable fields of a plate image name.
///
/// `AssayPlate_Greiner_#655090_<well>_T0001F<site:3>L01A0<action>Z0<z_slide>C0<action><ext>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlateFileName {
    pub well: String,
    pub site: u32,
    pub action: u8,
    pub z_slide: u8,
}

impl PlateFileName {
    pub fn new(site: &PlateSite, action: u8, z_slide: u8) -> Self {
        Self {
            well: site.well.clone(),
            site: site.site,
            action,
            z_slide,
        }
    }

    pub fn file_name(&self, extension: &str) -> String {
        format!(
            "{}{}_T0001F{:03}L01A0{}Z0{}C0{}{}",
            PLATE_PREFIX,
            self.well,
            self.site,
            self.action,
            self.z_slide,
            self.action,
            normalize_extension(extension)
        )
    }

    /// Parses a complete file name. Returns `None` for anything that does not
    /// follow the grammar, including names whose action and channel disagree.
    pub fn parse(name: &str) -> Option<Self> {
        let captures = FILE_NAME_REGEX.as_ref()?.captures(name)?;
        let action: u8 = captures["action"].parse().ok()?;
        let channel: u8 = captures["channel"].parse().ok()?;
        if action != channel {
            return None;
        }
        Some(Self {
            well: captures["well"].to_string(),
            site: captures["site"].parse().ok()?,
            action,
            z_slide: captures["z_slide"].parse().ok()?,
        })
    }

    pub fn plate_site(&self) -> PlateSite {
        PlateSite::new(self.well.clone(), self.site)
    }
}

/// Makes sure the extension carries its leading dot.
pub fn normalize_extension(extension: &str) -> String {
    if extension.is_empty() || extension.starts_with('.') {
        extension.to_string()
    } else {
        format!(".{}", extension)
    }
}

/// Where input and target channel files live below `<root>/<magnification> images/`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelLayout {
    /// all channels share one directory
    #[default]
    Flat,
    /// inputs in `input/`, targets in `targets/`
    Separated,
}

impl ChannelLayout {
    pub fn input_dir(&self, image_root: &Path) -> PathBuf {
        match self {
            ChannelLayout::Flat => image_root.to_path_buf(),
            ChannelLayout::Separated => image_root.join("input"),
        }
    }

    pub fn target_dir(&self, image_root: &Path) -> PathBuf {
        match self {
            ChannelLayout::Flat => image_root.to_path_buf(),
            ChannelLayout::Separated => image_root.join("targets"),
        }
    }
}

#[derive(Error, Debug)]
pub enum PlateIndexError {
    #[error("The path {} is not valid because {}", .path, .reason)]
    InvalidPath { path: String, reason: String },
    #[error("No files with extension {} found in {}", .extension, .dir)]
    NoFilesFound { dir: String, extension: String },
    #[error("{} files found in {} but none matches the pattern {}", .files, .dir, .pattern)]
    NoWellsFound {
        dir: String,
        files: usize,
        pattern: String,
    },
    #[error("Invalid file name pattern: {0}")]
    PatternError(#[from] regex::Error),
}

/// Distinct wells found in a directory of plate images.
#[derive(Debug, Clone, PartialEq)]
pub struct PlateFileIndex {
    dir: PathBuf,
    file_count: usize,
    channel_file_count: usize,
    wells: Vec<String>,
}

impl PlateFileIndex {
    /// Scans the files directly inside `dir` that end with `extension`.
    ///
    /// Entries are visited sorted by name; wells are kept in order of first
    /// occurrence.
    pub fn scan(dir: &Path, extension: &str) -> Result<Self, PlateIndexError> {
        if !(dir.exists() && dir.is_dir()) {
            return Err(PlateIndexError::InvalidPath {
                path: format!("{:?}", dir),
                reason: "the image path does not exist or is not a directory".into(),
            });
        }
        let extension = normalize_extension(extension);
        let pattern = Regex::new(WELL_PATTERN)?;

        let mut file_count = 0;
        let mut channel_file_count = 0;
        let mut wells: Vec<String> = vec![];
        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .flat_map(Result::ok)
            .filter(|e| e.file_type().is_file())
        {
            let Some(name) = entry.file_name().to_str() else {
                info!(
                    "{:?} does not have a string representation and will be skipped",
                    entry.file_name()
                );
                continue;
            };
            if !name.ends_with(&extension) {
                continue;
            }
            file_count += 1;
            if PlateFileName::parse(name).is_some() {
                channel_file_count += 1;
            }
            if let Some(captures) = pattern.captures(name) {
                let well = &captures["well"];
                if !wells.iter().any(|w| w == well) {
                    wells.push(well.to_string());
                }
            }
        }

        if file_count == 0 {
            return Err(PlateIndexError::NoFilesFound {
                dir: format!("{:?}", dir),
                extension,
            });
        }
        if wells.is_empty() {
            return Err(PlateIndexError::NoWellsFound {
                dir: format!("{:?}", dir),
                files: file_count,
                pattern: WELL_PATTERN.into(),
            });
        }
        info!(
            "indexed {} files with {} wells in {:?}",
            file_count,
            wells.len(),
            dir
        );
        Ok(Self {
            dir: dir.to_path_buf(),
            file_count,
            channel_file_count,
            wells,
        })
    }

    pub fn wells(&self) -> &[String] {
        &self.wells
    }

    pub fn file_count(&self) -> usize {
        self.file_count
    }

    /// Files whose whole name follows the channel grammar.
    pub fn channel_file_count(&self) -> usize {
        self.channel_file_count
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
