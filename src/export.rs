// 💾 CSV Export
// Writes the filtered observations in long format for download

use crate::model::Observation;
use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;

pub const EXPORT_FILE_NAME: &str = "filtered_vehicle_data.csv";

#[derive(Serialize)]
struct ExportRow<'a> {
    #[serde(rename = "Maker")]
    maker: &'a str,
    year: i32,
    month: u32,
    #[serde(rename = "Vehicle Category")]
    category: &'static str,
    #[serde(rename = "Registrations")]
    registrations: u64,
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Quarter")]
    quarter: String,
}

impl<'a> From<&'a Observation> for ExportRow<'a> {
    fn from(o: &'a Observation) -> Self {
        ExportRow {
            maker: &o.maker,
            year: o.year(),
            month: o.month(),
            category: o.category.code(),
            registrations: o.registrations,
            date: o.period.first_day().to_string(),
            quarter: o.quarter().to_string(),
        }
    }
}

/// Write `observations` as CSV with a header row. Returns the number of data rows.
pub fn write_csv<W: Write>(writer: W, observations: &[Observation]) -> Result<usize> {
    let mut wtr = csv::Writer::from_writer(writer);
    for o in observations {
        wtr.serialize(ExportRow::from(o))
            .context("Failed to write export row")?;
    }
    // An empty export still carries the header
    if observations.is_empty() {
        wtr.write_record(["Maker", "year", "month", "Vehicle Category", "Registrations", "Date", "Quarter"])?;
    }
    wtr.flush().context("Failed to flush export")?;
    Ok(observations.len())
}

pub fn to_csv_bytes(observations: &[Observation]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_csv(&mut buf, observations)?;
    Ok(buf)
}
