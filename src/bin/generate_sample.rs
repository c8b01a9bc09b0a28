//! Writes `fuel-economy.zip`, a synthetic stand-in for the EPA archive, for
//! use with `fuel-economy --archive fuel-economy.zip`.

use std::fs::File;
use std::io::Write;

use anyhow::{Context, Result};
use zip::write::SimpleFileOptions;

use fuel_economy::acquire::PRIMARY_FILE;
use fuel_economy::data::schema::{
    ANNUAL_COST_FT1, ANNUAL_COST_FT2, FUEL_TYPE_1, FUEL_TYPE_2, MAKE, MODEL, YEAR,
};

/// splitmix64; deterministic so regenerated archives are identical.
struct SampleRng(u64);

impl SampleRng {
    fn next_u64(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next_u64() % n
    }
}

/// (make, models, fuel type 1, base annual cost)
const LINEUP: &[(&str, &[&str], &str, u32)] = &[
    ("Ford", &["F150 Pickup 2WD", "Focus FWD", "Mustang"], "Regular Gasoline", 2100),
    ("Toyota", &["Camry", "Prius", "Corolla"], "Regular Gasoline", 1450),
    ("BMW", &["M3", "X5 xDrive35i"], "Premium Gasoline", 2450),
    ("Tesla", &["Model S", "Model 3"], "Electricity", 600),
    ("Chevrolet", &["Silverado C15 2WD", "Volt"], "Regular Gasoline", 2000),
    ("Ram", &["1500 Pickup 4WD"], "Diesel", 2300),
    ("Honda", &["Civic", "Clarity"], "Regular Gasoline", 1400),
];

const DRIVES: &[&str] = &["Front-Wheel Drive", "Rear-Wheel Drive", "4-Wheel Drive"];

fn main() -> Result<()> {
    let mut rng = SampleRng(42);
    let mut csv = csv::Writer::from_writer(Vec::new());

    // Extra columns the projector is expected to drop, interleaved with the
    // retained ones.
    csv.write_record([
        "Vehicle ID",
        YEAR,
        MAKE,
        MODEL,
        "Class",
        "Drive",
        "Cylinders",
        FUEL_TYPE_1,
        FUEL_TYPE_2,
        "City MPG (FT1)",
        ANNUAL_COST_FT1,
        ANNUAL_COST_FT2,
    ])?;

    let mut rows = 0u32;
    for year in 2010..=2017 {
        for &(make, models, fuel, base_cost) in LINEUP {
            for &model in models {
                rows += 1;
                let flex = fuel == "Regular Gasoline" && rng.below(6) == 0;
                let cost = base_cost as u64 + rng.below(400) - (2017 - year as u64) * 5;
                let electric = fuel == "Electricity";
                let cylinders = if electric {
                    String::new()
                } else {
                    (4 + 2 * rng.below(3)).to_string()
                };
                let mpg = if electric { 110 + rng.below(30) } else { 14 + rng.below(30) };
                csv.write_record([
                    rows.to_string(),
                    year.to_string(),
                    make.to_string(),
                    model.to_string(),
                    "Midsize Cars".to_string(),
                    DRIVES[rng.below(DRIVES.len() as u64) as usize].to_string(),
                    cylinders,
                    fuel.to_string(),
                    if flex { "E85".to_string() } else { String::new() },
                    mpg.to_string(),
                    cost.to_string(),
                    if flex { (cost + 500).to_string() } else { String::new() },
                ])?;
            }
        }
    }
    let data = csv.into_inner().context("finishing CSV")?;

    let output_path = "fuel-economy.zip";
    let file = File::create(output_path).with_context(|| format!("creating {output_path}"))?;
    let mut zip = zip::ZipWriter::new(file);
    zip.start_file(PRIMARY_FILE, SimpleFileOptions::default())?;
    zip.write_all(&data)?;
    zip.finish()?;

    println!("Wrote {rows} vehicles to {output_path}");
    Ok(())
}
