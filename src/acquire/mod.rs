//! Dataset acquisition: fetch a dataset archive and unpack it into a
//! directory.

pub mod archive;
pub mod kaggle;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::warn;

use crate::error::{Error, Result};

pub use archive::LocalArchiveSource;
pub use kaggle::KaggleSource;

/// File the EPA archive is expected to contain at its top level.
pub const PRIMARY_FILE: &str = "database.csv";

/// `owner/dataset-slug`, as the hosting API names datasets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatasetId {
    pub owner: String,
    pub slug: String,
}

impl FromStr for DatasetId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let valid = |part: &str| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
                && part != "."
                && part != ".."
        };
        match s.split_once('/') {
            Some((owner, slug)) if valid(owner) && valid(slug) => Ok(DatasetId {
                owner: owner.to_string(),
                slug: slug.to_string(),
            }),
            _ => Err(Error::InvalidDatasetId(s.to_string())),
        }
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.slug)
    }
}

impl DatasetId {
    /// Single path component usable as a directory name.
    pub fn dir_name(&self) -> String {
        format!("{}__{}", self.owner, self.slug)
    }
}

/// Something that can place a dataset's files into a directory.
pub trait DatasetSource: Send + Sync {
    /// Download (or copy) the dataset and extract it into `dest`, creating
    /// `dest` if needed. Existing files with the same names are overwritten.
    fn fetch(&self, id: &DatasetId, dest: &Path) -> Result<()>;
}

/// Fetch `id` into `dest` and return the path of the primary file.
///
/// A fetch that succeeds but yields no [`PRIMARY_FILE`] is reported as
/// [`Error::NotFound`], which callers treat as "no data" rather than a
/// failure.
pub fn acquire(source: &dyn DatasetSource, id: &DatasetId, dest: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dest).map_err(|e| Error::io(dest, e))?;
    source.fetch(id, dest)?;

    let primary = dest.join(PRIMARY_FILE);
    if primary.is_file() {
        return Ok(primary);
    }
    warn!(
        "{} not found after fetching {id}; CSV files present: [{}]",
        primary.display(),
        csv_files(dest).join(", ")
    );
    Err(Error::NotFound(primary))
}

fn csv_files(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n.to_ascii_lowercase().ends_with(".csv"))
        .collect();
    names.sort();
    names
}
