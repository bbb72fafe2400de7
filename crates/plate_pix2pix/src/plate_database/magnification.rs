use std::{fmt, ops::RangeInclusive, str::FromStr};

use serde::{Deserialize, Serialize};

use super::plate_filename::PlateSite;

/// Optical magnification the plate was scanned with.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Magnification {
    #[serde(rename = "20x")]
    X20,
    #[serde(rename = "40x")]
    X40,
    #[serde(rename = "60x")]
    X60,
}

/// Static plate geometry for one magnification.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct MagnificationProfile {
    pub wells: usize,
    pub sites_per_well: u32,
    pub z_slides: u8,
}

impl Magnification {
    pub fn profile(&self) -> MagnificationProfile {
        match self {
            Magnification::X20 => MagnificationProfile {
                wells: 9,
                sites_per_well: 6,
                z_slides: 7,
            },
            Magnification::X40 => MagnificationProfile {
                wells: 9,
                sites_per_well: 8,
                z_slides: 7,
            },
            Magnification::X60 => MagnificationProfile {
                wells: 9,
                sites_per_well: 12,
                z_slides: 7,
            },
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Magnification::X20 => "20x",
            Magnification::X40 => "40x",
            Magnification::X60 => "60x",
        }
    }

    /// Name of the directory holding the images of this magnification,
    /// e.g. `60x images`.
    pub fn folder_name(&self) -> String {
        format!("{} images", self.as_str())
    }
}

impl fmt::Display for Magnification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Magnification {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "20x" => Ok(Self::X20),
            "40x" => Ok(Self::X40),
            "60x" => Ok(Self::X60),
            anything_else => Err(format!(
                "{} is not a supported magnification (expected 20x, 40x or 60x)",
                anything_else
            )),
        }
    }
}

impl MagnificationProfile {
    /// Site indices of a single well, `1..=sites_per_well`.
    pub fn sites(&self) -> RangeInclusive<u32> {
        1..=self.sites_per_well
    }

    /// Cartesian product of wells and sites, well-major and site-minor.
    pub fn site_universe(&self, wells: &[String]) -> Vec<PlateSite> {
        wells
            .iter()
            .flat_map(|well| {
                self.sites().map(move |site| PlateSite {
                    well: well.clone(),
                    site,
                })
            })
            .collect()
    }

    pub fn universe_len(&self) -> usize {
        self.wells * self.sites_per_well as usize
    }
}
