use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};

use super::schema::Schema;
use crate::error::{Error, Result};

/// Name of the untouched copy kept next to the working file.
pub const ORIGINAL_SUFFIX: &str = "_original";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionOutcome {
    /// The working file now holds exactly the allow-listed columns.
    Projected { rows: usize },
    /// Neither the working file nor its untouched copy exists. Nothing was
    /// written.
    SourceMissing,
}

/// Path of the untouched copy for a working file:
/// `dir/database.csv` → `dir/database_original.csv`.
pub fn original_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}{ORIGINAL_SUFFIX}.{}", ext.to_string_lossy()),
        None => format!("{stem}{ORIGINAL_SUFFIX}"),
    };
    path.with_file_name(name)
}

/// Rewrite `path` so it keeps only the columns of `schema`, in schema order.
///
/// The first call copies the file to its untouched sibling (see
/// [`original_path`]); every call then re-derives the working file from that
/// copy, so repeated projection never double-trims.
pub fn project_file(path: &Path, schema: &Schema) -> Result<ProjectionOutcome> {
    let original = original_path(path);

    if !original.exists() {
        if !path.exists() {
            warn!(
                "nothing to project: neither {} nor {} exists",
                path.display(),
                original.display()
            );
            return Ok(ProjectionOutcome::SourceMissing);
        }
        fs::copy(path, &original).map_err(|e| Error::io(&original, e))?;
        info!("kept untouched copy at {}", original.display());
    }

    let mut reader = csv::Reader::from_path(&original)?;
    let headers = reader.headers()?.clone();

    let mut indices = Vec::with_capacity(schema.len());
    let mut missing = Vec::new();
    for col in schema.columns {
        match headers.iter().position(|h| h == col.name) {
            Some(i) => indices.push(i),
            None => missing.push(col.name.to_string()),
        }
    }
    if !missing.is_empty() {
        return Err(Error::MissingColumns(missing));
    }

    // Write beside the target and rename over it so readers never see a
    // partially written file.
    let tmp = path.with_extension("csv.tmp");
    let mut writer = csv::Writer::from_path(&tmp)?;
    writer.write_record(schema.columns.iter().map(|c| c.name))?;

    let mut rows = 0;
    for result in reader.records() {
        let record = result?;
        writer.write_record(indices.iter().map(|&i| record.get(i).unwrap_or("")))?;
        rows += 1;
    }
    writer.flush().map_err(|e| Error::io(&tmp, e))?;
    drop(writer);
    fs::rename(&tmp, path).map_err(|e| Error::io(path, e))?;

    info!(
        "projected {} to {} columns ({rows} rows)",
        path.display(),
        schema.len()
    );
    Ok(ProjectionOutcome::Projected { rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::schema::FUEL_ECONOMY;

    // Superset of the allow-list, shuffled, with extra columns.
    const RAW: &str = "\
Annual Fuel Cost (FT2),Cylinders,Make,Year,Model,\
Fuel Type 2,Fuel Type 1,Annual Fuel Cost (FT1),Drive
,6,Ford,2017,F150,,Regular Gasoline,2000,4WD
,0,Tesla,2017,Model 3,,Electricity,500,RWD
2600,4,Ford,2016,Focus FFV,E85,Regular Gasoline,1450,FWD
";

    const PROJECTED: &str = "\
Year,Make,Model,Fuel Type 1,Fuel Type 2,Annual Fuel Cost (FT1),Annual Fuel Cost (FT2)
2017,Ford,F150,Regular Gasoline,,2000,
2017,Tesla,Model 3,Electricity,,500,
2016,Ford,Focus FFV,Regular Gasoline,E85,1450,2600
";

    #[test]
    fn original_path_inserts_suffix_before_extension() {
        assert_eq!(
            original_path(Path::new("/data/database.csv")),
            PathBuf::from("/data/database_original.csv")
        );
        assert_eq!(
            original_path(Path::new("data/database")),
            PathBuf::from("data/database_original")
        );
    }

    #[test]
    fn keeps_allow_list_in_order_and_preserves_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("database.csv");
        fs::write(&path, RAW).unwrap();

        let outcome = project_file(&path, &FUEL_ECONOMY).unwrap();
        assert_eq!(outcome, ProjectionOutcome::Projected { rows: 3 });
        assert_eq!(fs::read_to_string(&path).unwrap(), PROJECTED);
        assert_eq!(fs::read_to_string(original_path(&path)).unwrap(), RAW);
        assert!(!path.with_extension("csv.tmp").exists());
    }

    #[test]
    fn projecting_twice_equals_projecting_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("database.csv");
        fs::write(&path, RAW).unwrap();

        project_file(&path, &FUEL_ECONOMY).unwrap();
        let once = fs::read_to_string(&path).unwrap();
        let outcome = project_file(&path, &FUEL_ECONOMY).unwrap();
        assert_eq!(outcome, ProjectionOutcome::Projected { rows: 3 });
        assert_eq!(fs::read_to_string(&path).unwrap(), once);
    }

    #[test]
    fn rederives_from_original_even_if_working_file_is_gone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("database.csv");
        fs::write(&path, RAW).unwrap();
        project_file(&path, &FUEL_ECONOMY).unwrap();

        fs::remove_file(&path).unwrap();
        project_file(&path, &FUEL_ECONOMY).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), PROJECTED);
    }

    #[test]
    fn missing_source_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("database.csv");

        let outcome = project_file(&path, &FUEL_ECONOMY).unwrap();
        assert_eq!(outcome, ProjectionOutcome::SourceMissing);
        assert!(!path.exists());
        assert!(!original_path(&path).exists());
    }

    #[test]
    fn missing_allow_listed_columns_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("database.csv");
        fs::write(&path, "Year,Make,Model\n2017,Ford,F150\n").unwrap();

        match project_file(&path, &FUEL_ECONOMY) {
            Err(Error::MissingColumns(cols)) => {
                assert_eq!(cols.len(), 4);
                assert_eq!(cols[0], "Fuel Type 1");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        // Working file untouched.
        assert_eq!(fs::read_to_string(&path).unwrap(), "Year,Make,Model\n2017,Ford,F150\n");
    }
}
