use std::{fmt, sync::Mutex};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::plate_filename::PlateSite;

/// Which half of a split a sample is drawn from.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubsetKind {
    Training,
    Validation,
}

impl SubsetKind {
    pub fn from_validation_flag(is_validation: bool) -> Self {
        if is_validation {
            Self::Validation
        } else {
            Self::Training
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            SubsetKind::Training => "training",
            SubsetKind::Validation => "validation",
        }
    }
}

impl fmt::Display for SubsetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SamplerError {
    #[error("The {} subset is empty; adjust the training ratio", .0)]
    EmptySubset(SubsetKind),
}

/// Round-robin cursor over a fixed list of sites.
///
/// The order never changes: after the last site the cursor wraps to the
/// first one. Concurrent callers are serialized on the cursor so every site
/// is handed out exactly once per round.
#[derive(Debug)]
pub struct CyclicSampler {
    kind: SubsetKind,
    sites: Vec<PlateSite>,
    cursor: Mutex<usize>,
}

impl CyclicSampler {
    pub fn new(kind: SubsetKind, sites: Vec<PlateSite>) -> Result<Self, SamplerError> {
        if sites.is_empty() {
            return Err(SamplerError::EmptySubset(kind));
        }
        Ok(Self {
            kind,
            sites,
            cursor: Mutex::new(0),
        })
    }

    pub fn next_site(&self) -> PlateSite {
        // the cursor is a plain index, a poisoned lock still holds a valid one
        let mut cursor = self.cursor.lock().unwrap_or_else(|e| e.into_inner());
        let site = self.sites[*cursor].clone();
        *cursor = (*cursor + 1) % self.sites.len();
        site
    }

    /// Index of the site the next call to [`Self::next_site`] returns.
    pub fn position(&self) -> usize {
        *self.cursor.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn kind(&self) -> SubsetKind {
        self.kind
    }

    pub fn sites(&self) -> &[PlateSite] {
        &self.sites
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}
