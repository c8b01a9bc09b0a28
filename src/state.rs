use std::io::Write;
use std::sync::Arc;

use log::debug;

use crate::acquire::{DatasetId, DatasetSource, KaggleSource, LocalArchiveSource};
use crate::cache::SnapshotCache;
use crate::config::Config;
use crate::data::aggregate::{grouped_means, ranked_means, Direction, GroupMean};
use crate::data::filter::{self, TableQuery};
use crate::data::loader::write_csv;
use crate::data::model::Dataset;
use crate::data::schema::{
    Schema, ANNUAL_COST_FT1, FUEL_ECONOMY, FUEL_TYPE_1, FUEL_TYPE_2, MAKE, YEAR,
};
use crate::error::Result;
use crate::snapshot::{Snapshot, SnapshotStore, StoreStatus};

/// Number of makes shown in the cheapest/most expensive rankings.
pub const RANKING_SIZE: usize = 5;

// ---------------------------------------------------------------------------
// View results
// ---------------------------------------------------------------------------

/// The table page: filtered rows plus the choices for the fuel-type filters.
#[derive(Debug, Clone)]
pub struct TableView {
    pub rows: Dataset,
    pub total_rows: usize,
    pub fuel_types_1: Vec<String>,
    pub fuel_types_2: Vec<String>,
}

/// Data behind the original chart pages.
#[derive(Debug, Clone)]
pub struct Summary {
    pub by_fuel_type: Vec<GroupMean>,
    pub by_year: Vec<GroupMean>,
    pub cheapest_makes: Vec<GroupMean>,
    pub priciest_makes: Vec<GroupMean>,
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// Everything a front end needs: configuration, the dataset identifier and
/// the snapshot cache. Every view returns `Ok(None)` when there is no data.
pub struct AppState {
    pub dataset_id: DatasetId,
    cache: SnapshotCache,
}

impl AppState {
    /// Build from config: a local archive when one is configured, otherwise
    /// the Kaggle API with credentials from the environment.
    pub fn from_config(config: &Config) -> Result<Self> {
        let source: Box<dyn DatasetSource> = match &config.archive {
            Some(path) => Box::new(LocalArchiveSource::new(path)),
            None => Box::new(KaggleSource::from_env(&config.api_base)?),
        };
        Self::with_source(config, source, FUEL_ECONOMY)
    }

    pub fn with_source(
        config: &Config,
        source: Box<dyn DatasetSource>,
        schema: Schema,
    ) -> Result<Self> {
        let dataset_id: DatasetId = config.dataset.parse()?;
        let store = SnapshotStore::new(&config.data_dir);
        Ok(AppState {
            dataset_id,
            cache: SnapshotCache::new(store, source, schema, config.cache_ttl),
        })
    }

    /// Current snapshot, acquiring it if the cache has none.
    pub fn snapshot(&self) -> Result<Option<Arc<Snapshot>>> {
        self.cache.get(&self.dataset_id)
    }

    pub fn status(&self) -> Result<StoreStatus> {
        self.cache.store().status(&self.dataset_id)
    }

    /// Filtered table plus the distinct fuel types for the filter choices.
    pub fn table(&self, query: &TableQuery) -> Result<Option<TableView>> {
        let Some(snap) = self.snapshot()? else {
            return Ok(None);
        };
        let table = &snap.table;
        let rows = filter::apply(table, query)?;
        debug!("table query kept {} of {} rows", rows.len(), table.len());

        let choices = |col: &str| -> Result<Vec<String>> {
            Ok(table.distinct_values(col)?.iter().map(|v| v.to_string()).collect())
        };
        Ok(Some(TableView {
            total_rows: table.len(),
            fuel_types_1: choices(FUEL_TYPE_1)?,
            fuel_types_2: choices(FUEL_TYPE_2)?,
            rows,
        }))
    }

    /// Write the projected table as CSV. Returns `false` when there is no
    /// data and nothing was written.
    pub fn export_csv<W: Write>(&self, out: W) -> Result<bool> {
        let Some(snap) = self.snapshot()? else {
            return Ok(false);
        };
        write_csv(&snap.table, out)?;
        Ok(true)
    }

    pub fn means(&self, by: &str, value: &str) -> Result<Option<Vec<GroupMean>>> {
        let Some(snap) = self.snapshot()? else {
            return Ok(None);
        };
        grouped_means(&snap.table, by, value).map(Some)
    }

    pub fn ranking(
        &self,
        by: &str,
        value: &str,
        n: usize,
        direction: Direction,
    ) -> Result<Option<Vec<GroupMean>>> {
        let Some(snap) = self.snapshot()? else {
            return Ok(None);
        };
        ranked_means(&snap.table, by, value, n, direction).map(Some)
    }

    /// Mean annual fuel cost by fuel type and by year, and the five makes
    /// with the lowest and highest mean cost.
    pub fn summary(&self) -> Result<Option<Summary>> {
        let Some(snap) = self.snapshot()? else {
            return Ok(None);
        };
        let table = &snap.table;
        let makes = |direction| ranked_means(table, MAKE, ANNUAL_COST_FT1, RANKING_SIZE, direction);
        Ok(Some(Summary {
            by_fuel_type: grouped_means(table, FUEL_TYPE_1, ANNUAL_COST_FT1)?,
            by_year: grouped_means(table, YEAR, ANNUAL_COST_FT1)?,
            cheapest_makes: makes(Direction::Smallest)?,
            priciest_makes: makes(Direction::Largest)?,
        }))
    }
}
