use std::fs::File;
use std::path::{Path, PathBuf};

use log::info;

use super::{DatasetId, DatasetSource};
use crate::error::{Error, Result};

/// Unpack a zip archive into `dest`, overwriting files of the same name.
pub fn extract_zip(archive: &Path, dest: &Path) -> Result<usize> {
    let file = File::open(archive).map_err(|e| Error::io(archive, e))?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| {
        Error::Acquisition(format!("{} is not a zip archive: {e}", archive.display()))
    })?;
    let entries = zip.len();
    zip.extract(dest)
        .map_err(|e| Error::Acquisition(format!("extracting {}: {e}", archive.display())))?;
    info!("extracted {entries} entries from {} into {}", archive.display(), dest.display());
    Ok(entries)
}

/// A dataset archive that is already on disk.
#[derive(Debug, Clone)]
pub struct LocalArchiveSource {
    pub path: PathBuf,
}

impl LocalArchiveSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        LocalArchiveSource { path: path.into() }
    }
}

impl DatasetSource for LocalArchiveSource {
    fn fetch(&self, id: &DatasetId, dest: &Path) -> Result<()> {
        if !self.path.is_file() {
            return Err(Error::Acquisition(format!(
                "archive for {id} not found at {}",
                self.path.display()
            )));
        }
        extract_zip(&self.path, dest).map(|_| ())
    }
}
