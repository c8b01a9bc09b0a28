use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::error;

use fuel_economy::config::{self, Config};
use fuel_economy::data::aggregate::{Direction, GroupMean};
use fuel_economy::data::filter::TableQuery;
use fuel_economy::data::model::Dataset;
use fuel_economy::data::schema::{ANNUAL_COST_FT1, FUEL_TYPE_1, MAKE};
use fuel_economy::snapshot::StoreStatus;
use fuel_economy::state::{AppState, RANKING_SIZE};

const NO_DATA: &str = "Data could not be loaded.";

#[derive(Parser)]
#[command(name = "fuel-economy")]
#[command(about = "Query the EPA fuel-economy dataset", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Remote dataset, owner/dataset-slug
    #[arg(
        long,
        global = true,
        env = "FUEL_ECONOMY_DATASET",
        default_value = config::DEFAULT_DATASET
    )]
    dataset: String,

    /// Directory snapshots are stored in
    #[arg(
        long,
        global = true,
        env = "FUEL_ECONOMY_DATA_DIR",
        default_value = config::DEFAULT_DATA_DIR
    )]
    data_dir: PathBuf,

    /// Kaggle API base URL
    #[arg(
        long,
        global = true,
        env = "FUEL_ECONOMY_API_BASE",
        default_value = config::DEFAULT_API_BASE
    )]
    api_base: String,

    /// Seconds a fetched snapshot is reused (0 fetches on every query)
    #[arg(
        long,
        global = true,
        env = "FUEL_ECONOMY_CACHE_TTL",
        default_value_t = config::DEFAULT_CACHE_TTL_SECS
    )]
    cache_ttl: u64,

    /// Read the dataset from a local zip archive instead of downloading it
    #[arg(long, global = true, env = "FUEL_ECONOMY_ARCHIVE")]
    archive: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Print the table, optionally searched and filtered
    Table {
        /// Case-insensitive search over make and model
        #[arg(long)]
        search: Option<String>,
        /// Exact "Fuel Type 1" value
        #[arg(long = "fuel1")]
        fuel_type_1: Option<String>,
        /// Exact "Fuel Type 2" value
        #[arg(long = "fuel2")]
        fuel_type_2: Option<String>,
        /// Print at most this many rows
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Write the projected table as CSV
    Export {
        /// Output file (stdout when omitted)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Mean of a numeric column per category, highest first
    Means {
        #[arg(long, default_value = FUEL_TYPE_1)]
        by: String,
        #[arg(long, default_value = ANNUAL_COST_FT1)]
        value: String,
    },
    /// Categories with the smallest (or largest) mean
    Rank {
        #[arg(long, default_value = MAKE)]
        by: String,
        #[arg(long, default_value = ANNUAL_COST_FT1)]
        value: String,
        #[arg(short = 'n', long, default_value_t = RANKING_SIZE)]
        count: usize,
        /// Rank by largest mean instead of smallest
        #[arg(long, default_value_t = false)]
        largest: bool,
    },
    /// Mean cost by fuel type and year, cheapest and priciest makes
    Summary,
    /// Show what the snapshot store holds
    Status,
}

impl Cli {
    fn config(&self) -> Config {
        Config {
            dataset: self.dataset.clone(),
            data_dir: self.data_dir.clone(),
            api_base: self.api_base.clone(),
            cache_ttl: Duration::from_secs(self.cache_ttl),
            archive: self.archive.clone(),
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => {
            eprintln!("{NO_DATA}");
            ExitCode::from(2)
        }
        Err(e) => {
            error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns `Ok(false)` when the dataset holds no usable data.
fn run(cli: &Cli) -> Result<bool> {
    let state = AppState::from_config(&cli.config()).context("setting up dataset source")?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match &cli.command {
        Command::Table {
            search,
            fuel_type_1,
            fuel_type_2,
            limit,
        } => {
            let query = TableQuery::fuel_economy(
                search.as_deref(),
                fuel_type_1.as_deref(),
                fuel_type_2.as_deref(),
            );
            let Some(view) = state.table(&query)? else {
                return Ok(false);
            };
            print_table(&mut out, &view.rows, *limit)?;
            writeln!(out, "({} of {} rows)", view.rows.len(), view.total_rows)?;
            writeln!(out, "Fuel Type 1: {}", view.fuel_types_1.join(" | "))?;
            writeln!(out, "Fuel Type 2: {}", view.fuel_types_2.join(" | "))?;
        }
        Command::Export { output } => match output {
            Some(path) => {
                let file = File::create(path)
                    .with_context(|| format!("creating {}", path.display()))?;
                if !state.export_csv(BufWriter::new(file))? {
                    fs::remove_file(path).ok();
                    return Ok(false);
                }
            }
            None => {
                if !state.export_csv(&mut out)? {
                    return Ok(false);
                }
            }
        },
        Command::Means { by, value } => {
            let Some(means) = state.means(by, value)? else {
                return Ok(false);
            };
            print_means(&mut out, &format!("mean {value} by {by}"), &means)?;
        }
        Command::Rank {
            by,
            value,
            count,
            largest,
        } => {
            let direction = if *largest { Direction::Largest } else { Direction::Smallest };
            let Some(means) = state.ranking(by, value, *count, direction)? else {
                return Ok(false);
            };
            let label = if *largest { "largest" } else { "smallest" };
            print_means(&mut out, &format!("{count} {label} mean {value} by {by}"), &means)?;
        }
        Command::Summary => {
            let Some(summary) = state.summary()? else {
                return Ok(false);
            };
            let sections = [
                ("Average annual fuel cost by fuel type", &summary.by_fuel_type),
                ("Average annual fuel cost by year", &summary.by_year),
                ("Makes with the lowest average annual fuel cost", &summary.cheapest_makes),
                ("Makes with the highest average annual fuel cost", &summary.priciest_makes),
            ];
            for (title, means) in sections {
                print_means(&mut out, title, means)?;
            }
        }
        Command::Status => match state.status()? {
            StoreStatus::NeverAcquired => writeln!(out, "{}: never acquired", state.dataset_id)?,
            StoreStatus::Generation { dir, manifest: None } => writeln!(
                out,
                "{}: fetch in progress or interrupted in {}",
                state.dataset_id,
                dir.display()
            )?,
            StoreStatus::Generation {
                dir,
                manifest: Some(m),
            } => {
                writeln!(out, "{}: {:?} in {}", m.dataset, m.state, dir.display())?;
                writeln!(out, "created: {} ms since epoch", m.created_unix_ms)?;
                if let Some(reason) = &m.error {
                    writeln!(out, "error: {reason}")?;
                }
                if !m.columns.is_empty() {
                    writeln!(out, "columns: {}", m.columns.join(", "))?;
                }
            }
        },
    }
    out.flush()?;
    Ok(true)
}

fn print_table<W: Write>(out: &mut W, table: &Dataset, limit: Option<usize>) -> io::Result<()> {
    writeln!(out, "{}", table.columns.join("\t"))?;
    for row in table.rows.iter().take(limit.unwrap_or(usize::MAX)) {
        let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        writeln!(out, "{}", cells.join("\t"))?;
    }
    Ok(())
}

fn print_means<W: Write>(out: &mut W, title: &str, means: &[GroupMean]) -> io::Result<()> {
    writeln!(out, "{title}")?;
    for m in means {
        writeln!(out, "  {:<32} {:>10.2}  (n={})", m.group.to_string(), m.mean, m.count)?;
    }
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_takes_fuel_filters() {
        let cli = Cli::try_parse_from([
            "fuel-economy",
            "table",
            "--search",
            "ford",
            "--fuel1",
            "Regular Gasoline",
            "--fuel2",
            "E85",
        ])
        .unwrap();
        match cli.command {
            Command::Table {
                search,
                fuel_type_1,
                fuel_type_2,
                limit,
            } => {
                assert_eq!(search.as_deref(), Some("ford"));
                assert_eq!(fuel_type_1.as_deref(), Some("Regular Gasoline"));
                assert_eq!(fuel_type_2.as_deref(), Some("E85"));
                assert_eq!(limit, None);
            }
            _ => panic!("expected the table command"),
        }
        assert!(Cli::try_parse_from(["fuel-economy", "table", "--fuel-type-1", "x"]).is_err());
    }

    #[test]
    fn global_options_follow_the_subcommand() {
        let cli = Cli::try_parse_from(["fuel-economy", "status", "--cache-ttl", "0"]).unwrap();
        assert!(matches!(cli.command, Command::Status));
        assert_eq!(cli.config().cache_ttl, Duration::ZERO);
    }
}
