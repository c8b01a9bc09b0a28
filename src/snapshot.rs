//! On-disk snapshot store.
//!
//! Layout:
//! ```text
//!   <root>/<owner>__<slug>/
//!       gen-<unix_millis>-<seq>/
//!           database.csv            projected working file
//!           database_original.csv   untouched copy
//!           manifest.json           { dataset, state, created_unix_ms, columns }
//! ```
//!
//! Every acquisition writes a fresh generation directory, so a refresh never
//! touches files an earlier snapshot was loaded from. Once an acquisition
//! settles it prunes older settled generations only: a generation with no
//! manifest, or one still `extracted`, may belong to an acquisition running
//! concurrently and is left alone.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::acquire::{self, DatasetId, DatasetSource};
use crate::data::loader::load_csv;
use crate::data::model::Dataset;
use crate::data::projector::{project_file, ProjectionOutcome};
use crate::data::schema::Schema;
use crate::error::{Error, Result};

pub const MANIFEST_FILE: &str = "manifest.json";
const GENERATION_PREFIX: &str = "gen-";

static GENERATION_SEQ: AtomicU32 = AtomicU32::new(0);

/// How far a generation got. Recorded explicitly so an interrupted
/// acquisition is distinguishable from a finished one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotState {
    /// Archive extracted, projection not yet done.
    Extracted,
    /// Working file holds the projected columns.
    Projected,
    /// Acquisition stopped with an error; see [`Manifest::error`].
    Failed,
}

impl SnapshotState {
    /// Whether the acquisition that wrote this state has finished.
    pub fn is_settled(self) -> bool {
        matches!(self, SnapshotState::Projected | SnapshotState::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub dataset: String,
    pub state: SnapshotState,
    pub created_unix_ms: u64,
    pub columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// What the store holds for a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreStatus {
    NeverAcquired,
    /// Latest generation; `manifest` is `None` while the fetch is running or
    /// when the process died during it.
    Generation {
        dir: PathBuf,
        manifest: Option<Manifest>,
    },
}

/// A loaded, projected dataset and where it came from.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub dataset_id: DatasetId,
    pub dir: PathBuf,
    pub acquired_at: SystemTime,
    pub table: Dataset,
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        SnapshotStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dataset_dir(&self, id: &DatasetId) -> PathBuf {
        self.root.join(id.dir_name())
    }

    /// Fetch, project and load a new generation of `id`.
    ///
    /// Acquisition and projection errors propagate as-is. An archive without
    /// the primary file, or a projection with nothing to project, surfaces as
    /// [`Error::NotFound`]. A failed generation is kept with a `failed`
    /// manifest until the next acquisition settles, so repeated failures leave
    /// at most one failed directory behind.
    pub fn acquire(
        &self,
        source: &dyn DatasetSource,
        id: &DatasetId,
        schema: &Schema,
    ) -> Result<Snapshot> {
        let dir = self.new_generation(id)?;
        let created_unix_ms = unix_millis(SystemTime::now());
        info!("acquiring {id} into {}", dir.display());

        let mut manifest = Manifest {
            dataset: id.to_string(),
            state: SnapshotState::Extracted,
            created_unix_ms,
            columns: Vec::new(),
            error: None,
        };
        match self.populate(source, id, schema, &dir, &mut manifest) {
            Ok(table) => {
                self.prune(id, &dir, SnapshotState::is_settled);
                Ok(Snapshot {
                    dataset_id: id.clone(),
                    dir,
                    acquired_at: UNIX_EPOCH + Duration::from_millis(created_unix_ms),
                    table,
                })
            }
            Err(e) => {
                manifest.state = SnapshotState::Failed;
                manifest.error = Some(e.to_string());
                if let Err(write_err) = write_manifest(&dir, &manifest) {
                    warn!("recording failure of {}: {write_err}", dir.display());
                }
                // Older snapshots that did project stay as the last good copy.
                self.prune(id, &dir, |state| state == SnapshotState::Failed);
                Err(e)
            }
        }
    }

    fn populate(
        &self,
        source: &dyn DatasetSource,
        id: &DatasetId,
        schema: &Schema,
        dir: &Path,
        manifest: &mut Manifest,
    ) -> Result<Dataset> {
        let primary = acquire::acquire(source, id, dir)?;
        write_manifest(dir, manifest)?;

        match project_file(&primary, schema)? {
            ProjectionOutcome::Projected { .. } => {}
            ProjectionOutcome::SourceMissing => return Err(Error::NotFound(primary)),
        }
        manifest.state = SnapshotState::Projected;
        manifest.columns = schema.names().into_iter().map(String::from).collect();
        write_manifest(dir, manifest)?;

        load_csv(&primary, schema)
    }

    /// Latest generation of `id` and its manifest, if any.
    pub fn status(&self, id: &DatasetId) -> Result<StoreStatus> {
        let Some(dir) = self.generations(id)?.pop() else {
            return Ok(StoreStatus::NeverAcquired);
        };
        let manifest = read_manifest(&dir)?;
        Ok(StoreStatus::Generation { dir, manifest })
    }

    /// Generation directories of `id`, oldest first.
    pub fn generations(&self, id: &DatasetId) -> Result<Vec<PathBuf>> {
        let base = self.dataset_dir(id);
        let entries = match fs::read_dir(&base) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io(&base, e)),
        };
        let mut dirs: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(GENERATION_PREFIX))
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        dirs.sort();
        Ok(dirs)
    }

    fn new_generation(&self, id: &DatasetId) -> Result<PathBuf> {
        let base = self.dataset_dir(id);
        fs::create_dir_all(&base).map_err(|e| Error::io(&base, e))?;
        loop {
            let seq = GENERATION_SEQ.fetch_add(1, Ordering::Relaxed);
            let name = format!(
                "{GENERATION_PREFIX}{:016}-{seq:06}",
                unix_millis(SystemTime::now())
            );
            let dir = base.join(name);
            match fs::create_dir(&dir) {
                Ok(()) => return Ok(dir),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(Error::io(&dir, e)),
            }
        }
    }

    /// Remove generations of `id` older than `keep` whose manifest state
    /// satisfies `removable`. Generations without a manifest are never
    /// removed. Failures are logged only; a leftover directory does not
    /// affect the new snapshot.
    fn prune(&self, id: &DatasetId, keep: &Path, removable: impl Fn(SnapshotState) -> bool) {
        let dirs = match self.generations(id) {
            Ok(dirs) => dirs,
            Err(e) => {
                warn!("listing generations of {id} for pruning: {e}");
                return;
            }
        };
        for dir in dirs.into_iter().filter(|d| d.as_path() < keep) {
            match read_manifest(&dir) {
                Ok(Some(m)) if removable(m.state) => {}
                Ok(_) => continue,
                Err(e) => {
                    warn!("skipping {} while pruning: {e}", dir.display());
                    continue;
                }
            }
            match fs::remove_dir_all(&dir) {
                Ok(()) => debug!("pruned {}", dir.display()),
                Err(e) => warn!("could not prune {}: {e}", dir.display()),
            }
        }
    }
}

fn write_manifest(dir: &Path, manifest: &Manifest) -> Result<()> {
    let path = dir.join(MANIFEST_FILE);
    let text = serde_json::to_string_pretty(manifest)?;
    fs::write(&path, text).map_err(|e| Error::io(&path, e))
}

fn read_manifest(dir: &Path) -> Result<Option<Manifest>> {
    let path = dir.join(MANIFEST_FILE);
    match fs::read_to_string(&path) {
        Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::io(&path, e)),
    }
}

fn unix_millis(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
