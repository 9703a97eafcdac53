// 📂 Data Loader
// Discovers <year>/<year>-<MON>.csv files and parses them into registration records
//
// Problems with individual files or rows never abort a load: they become
// LoadWarnings on the Dataset and the offending file/row is skipped.

use crate::model::{Observation, RegistrationRecord, VehicleCategory};
use crate::period::{parse_month_abbrev, MonthKey};
use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord, Trim};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub const MAKER_COLUMN: &str = "Maker";

// ============================================================================
// WARNINGS
// ============================================================================

/// A recoverable problem found while loading. Shown to the user, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LoadWarning {
    #[error("Skipping file with unexpected name format: {file}")]
    UnexpectedName { file: String },

    #[error("Error processing file {file}: {reason}")]
    UnreadableFile { file: String, reason: String },

    #[error("Skipping unreadable path {path}: {reason}")]
    UnreadableEntry { path: String, reason: String },

    #[error("Skipping line {line} of {file}: {reason}")]
    MalformedRow { file: String, line: u64, reason: String },

    #[error("No data files were loaded from {base}. Expected folders like '2024' containing files named like '2024-JAN.csv'.")]
    NoData { base: String },
}

// ============================================================================
// DISCOVERY
// ============================================================================

/// A CSV file whose name and folder follow the `<year>/<year>-<MON>.csv` convention
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFile {
    pub path: PathBuf,
    pub period: MonthKey,
}

#[derive(Debug, Default)]
pub struct Discovery {
    /// Every `*.csv` file with a `-` in its name, accepted or not
    pub found: Vec<PathBuf>,
    pub accepted: Vec<DataFile>,
    pub warnings: Vec<LoadWarning>,
}

/// Parse a file name like `2024-JAN.csv` into its period.
///
/// Returns `None` when the name does not follow the convention.
pub fn parse_file_name(file_name: &str) -> Option<MonthKey> {
    let stem = file_name.strip_suffix(".csv")?;
    let mut parts = stem.split('-');
    let (year_str, month_str) = (parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let year: i32 = year_str.trim().parse().ok()?;
    let month = parse_month_abbrev(month_str.trim())?;
    MonthKey::new(year, month)
}

/// Walk `base` recursively and classify every candidate CSV file.
///
/// Symlinked directories are not followed. Entries that cannot be read become
/// warnings; only an unreadable `base` is an error.
pub fn discover(base: &Path) -> Result<Discovery> {
    fs::read_dir(base)
        .with_context(|| format!("Could not read data directories under {}", base.display()))?;

    let mut discovery = Discovery::default();
    let mut files = Vec::new();

    for entry in WalkDir::new(base).sort_by_file_name() {
        match entry {
            Ok(entry) if entry.path().is_file() => files.push(entry.into_path()),
            Ok(_) => {}
            Err(e) => {
                let path = e
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| base.display().to_string());
                warn!(path = %path, error = %e, "skipping unreadable entry");
                discovery.warnings.push(LoadWarning::UnreadableEntry {
                    path,
                    reason: e.to_string(),
                });
            }
        }
    }
    files.sort();

    for path in files {
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !file_name.ends_with(".csv") || !file_name.contains('-') {
            continue;
        }
        discovery.found.push(path.clone());

        let Some(period) = parse_file_name(file_name) else {
            warn!(file = %path.display(), "unexpected file name format");
            discovery.warnings.push(LoadWarning::UnexpectedName {
                file: file_name.to_string(),
            });
            continue;
        };

        let folder = path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .unwrap_or("");
        if folder != period.year.to_string() {
            debug!(file = %path.display(), folder, "year folder mismatch, ignoring");
            continue;
        }

        discovery.accepted.push(DataFile { path, period });
    }

    discovery
        .accepted
        .sort_by(|a, b| a.period.cmp(&b.period).then_with(|| a.path.cmp(&b.path)));

    Ok(discovery)
}

// ============================================================================
// CSV PARSING
// ============================================================================

/// Column positions resolved from the header row
struct Columns {
    maker: usize,
    counts: [usize; 3],
}

impl Columns {
    fn resolve(headers: &StringRecord) -> std::result::Result<Self, String> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
                .ok_or_else(|| format!("missing column '{}'", name))
        };

        Ok(Columns {
            maker: find(MAKER_COLUMN)?,
            counts: [
                find(VehicleCategory::TwoWheeler.code())?,
                find(VehicleCategory::ThreeWheeler.code())?,
                find(VehicleCategory::FourWheeler.code())?,
            ],
        })
    }
}

/// Parse a registration count cell. Blank means zero; thousands separators are allowed.
pub fn parse_count(cell: &str) -> std::result::Result<u64, String> {
    let cleaned: String = cell.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return Ok(0);
    }
    if let Ok(n) = cleaned.parse::<u64>() {
        return Ok(n);
    }
    match cleaned.parse::<f64>() {
        Ok(f) if f < 0.0 => Err(format!("negative count '{}'", cell.trim())),
        // u64::MAX as f64 rounds up to 2^64, so the bound is exclusive
        Ok(f) if f.is_finite() && f.fract() == 0.0 && f < u64::MAX as f64 => Ok(f as u64),
        Ok(f) if f.is_finite() && f.fract() == 0.0 => Err(format!("count out of range '{}'", cell.trim())),
        _ => Err(format!("non-numeric count '{}'", cell.trim())),
    }
}

fn parse_row(
    row: &StringRecord,
    columns: &Columns,
    period: MonthKey,
) -> std::result::Result<RegistrationRecord, String> {
    let cell = |idx: usize| {
        row.get(idx)
            .ok_or_else(|| format!("expected at least {} fields, found {}", idx + 1, row.len()))
    };

    let maker = cell(columns.maker)?.trim().to_string();
    if maker.is_empty() {
        return Err("empty maker name".to_string());
    }

    let [two, three, four] = columns.counts;
    Ok(RegistrationRecord {
        period,
        maker,
        two_wheeler: parse_count(cell(two)?)?,
        three_wheeler: parse_count(cell(three)?)?,
        four_wheeler: parse_count(cell(four)?)?,
    })
}

/// Parse one month's CSV content. Bad rows are reported and skipped.
///
/// Fails only when the header itself is unusable.
pub fn parse_registrations<R: Read>(
    reader: R,
    file: &str,
    period: MonthKey,
) -> Result<(Vec<RegistrationRecord>, Vec<LoadWarning>)> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .with_context(|| format!("Failed to read header of {}", file))?
        .clone();
    let columns = Columns::resolve(&headers).map_err(|e| anyhow::anyhow!(e))?;

    let mut records = Vec::new();
    let mut warnings = Vec::new();

    for (idx, result) in reader.records().enumerate() {
        // 1-indexed, plus the header row
        let line = result
            .as_ref()
            .ok()
            .and_then(|r| r.position())
            .map(|p| p.line())
            .unwrap_or(idx as u64 + 2);

        let parsed = result
            .map_err(|e| e.to_string())
            .and_then(|row| parse_row(&row, &columns, period));

        match parsed {
            Ok(record) => records.push(record),
            Err(reason) => {
                warn!(file, line, %reason, "skipping malformed row");
                warnings.push(LoadWarning::MalformedRow {
                    file: file.to_string(),
                    line,
                    reason,
                });
            }
        }
    }

    Ok((records, warnings))
}

// ============================================================================
// DATASET
// ============================================================================

/// Everything loaded from one data folder
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub base: PathBuf,
    pub records: Vec<RegistrationRecord>,
    pub observations: Vec<Observation>,
    pub files_found: Vec<PathBuf>,
    pub files_loaded: usize,
    pub warnings: Vec<LoadWarning>,
}

impl Dataset {
    /// Build a dataset from already-parsed records
    pub fn from_records(records: Vec<RegistrationRecord>) -> Self {
        let observations = records.iter().flat_map(|r| r.observations()).collect();
        Dataset {
            records,
            observations,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Years present, ascending
    pub fn years(&self) -> Vec<i32> {
        let years: BTreeSet<i32> = self.observations.iter().map(|o| o.year()).collect();
        years.into_iter().collect()
    }

    pub fn year_bounds(&self) -> Option<(i32, i32)> {
        let years = self.years();
        Some((*years.first()?, *years.last()?))
    }

    /// Makers present, sorted by name
    pub fn makers(&self) -> Vec<String> {
        let makers: BTreeSet<&str> = self.observations.iter().map(|o| o.maker.as_str()).collect();
        makers.into_iter().map(String::from).collect()
    }

    /// Categories with at least one non-zero observation, sorted
    pub fn categories(&self) -> Vec<VehicleCategory> {
        let cats: BTreeSet<VehicleCategory> = self.observations.iter().map(|o| o.category).collect();
        cats.into_iter().collect()
    }

    /// SHA-256 over the canonical record list. Equal fingerprints mean identical data.
    pub fn fingerprint(&self) -> String {
        let mut rows: Vec<&RegistrationRecord> = self.records.iter().collect();
        rows.sort_by(|a, b| {
            (a.period, &a.maker, a.two_wheeler, a.three_wheeler, a.four_wheeler).cmp(&(
                b.period,
                &b.maker,
                b.two_wheeler,
                b.three_wheeler,
                b.four_wheeler,
            ))
        });

        let mut hasher = Sha256::new();
        for r in rows {
            hasher.update(format!(
                "{}|{}|{}|{}|{}\n",
                r.period, r.maker, r.two_wheeler, r.three_wheeler, r.four_wheeler
            ));
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Load every conforming CSV file under `base`.
///
/// Errors only when `base` itself cannot be read. An empty result carries a
/// `LoadWarning::NoData`.
pub fn load_dataset(base: &Path) -> Result<Dataset> {
    info!(base = %base.display(), "searching for data");
    let discovery = discover(base)?;

    let mut warnings = discovery.warnings;
    let mut records = Vec::new();
    let mut files_loaded = 0;

    for data_file in &discovery.accepted {
        let file_label = data_file.path.display().to_string();
        let loaded = fs::File::open(&data_file.path)
            .with_context(|| format!("Failed to open file: {}", file_label))
            .and_then(|file| parse_registrations(file, &file_label, data_file.period));

        match loaded {
            Ok((rows, row_warnings)) => {
                debug!(file = %file_label, rows = rows.len(), "loaded");
                records.extend(rows);
                warnings.extend(row_warnings);
                files_loaded += 1;
            }
            Err(e) => {
                warn!(file = %file_label, error = %e, "skipping file");
                warnings.push(LoadWarning::UnreadableFile {
                    file: file_label,
                    reason: format!("{:#}", e),
                });
            }
        }
    }

    if files_loaded == 0 {
        warnings.push(LoadWarning::NoData {
            base: base.display().to_string(),
        });
    }

    let mut dataset = Dataset::from_records(records);
    dataset.base = base.to_path_buf();
    dataset.files_found = discovery.found;
    dataset.files_loaded = files_loaded;
    dataset.warnings = warnings;

    info!(
        files = dataset.files_loaded,
        records = dataset.records.len(),
        warnings = dataset.warnings.len(),
        "data loaded"
    );

    Ok(dataset)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_file(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn sample_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        write_file(
            dir.path(),
            "2023/2023-JAN.csv",
            "Maker,2W,3W,4W\nHero,100,0,0\nTata,0,5,40\n",
        );
        write_file(
            dir.path(),
            "2024/2024-jan.csv",
            "Maker,2W,3W,4W\nHero,150,0,0\nTata,0,10,50\n",
        );
        dir
    }

    #[test]
    fn test_parse_file_name() {
        assert_eq!(parse_file_name("2024-JAN.csv"), MonthKey::new(2024, 1));
        assert_eq!(parse_file_name("2023-Dec.csv"), MonthKey::new(2023, 12));
        assert_eq!(parse_file_name("2024-JANUARY.csv"), None);
        assert_eq!(parse_file_name("2024-JAN-v2.csv"), None);
        assert_eq!(parse_file_name("report-JAN.csv"), None);
        assert_eq!(parse_file_name("2024-JAN.txt"), None);
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("1,234"), Ok(1234));
        assert_eq!(parse_count(""), Ok(0));
        assert_eq!(parse_count(" 42 "), Ok(42));
        assert_eq!(parse_count("7.0"), Ok(7));
        assert!(parse_count("-3").is_err());
        assert!(parse_count("abc").is_err());
        assert!(parse_count("1.5").is_err());
        assert!(parse_count("1e20").is_err());
        assert!(parse_count("inf").is_err());
        assert_eq!(parse_count("1e3"), Ok(1000));
    }

    #[test]
    fn test_load_dataset_reads_convention() {
        let dir = sample_tree();
        let dataset = load_dataset(dir.path()).unwrap();

        assert_eq!(dataset.files_loaded, 2);
        assert_eq!(dataset.records.len(), 4);
        assert_eq!(dataset.years(), vec![2023, 2024]);
        assert_eq!(dataset.makers(), vec!["Hero".to_string(), "Tata".to_string()]);
        // Hero has one non-zero category, Tata two, per month
        assert_eq!(dataset.observations.len(), 6);
        assert!(dataset.warnings.is_empty());
    }

    #[test]
    fn test_year_folder_mismatch_is_ignored() {
        let dir = sample_tree();
        write_file(dir.path(), "2024/2023-FEB.csv", "Maker,2W,3W,4W\nHero,1,1,1\n");

        let dataset = load_dataset(dir.path()).unwrap();

        assert_eq!(dataset.files_loaded, 2);
        assert_eq!(dataset.files_found.len(), 3);
        assert!(dataset.warnings.is_empty());
    }

    #[test]
    fn test_bad_file_name_warns() {
        let dir = sample_tree();
        write_file(dir.path(), "2024/2024-January.csv", "Maker,2W,3W,4W\n");

        let dataset = load_dataset(dir.path()).unwrap();

        assert_eq!(dataset.files_loaded, 2);
        assert_eq!(
            dataset.warnings,
            vec![LoadWarning::UnexpectedName {
                file: "2024-January.csv".to_string()
            }]
        );
    }

    #[test]
    fn test_malformed_rows_skipped() {
        let dir = TempDir::new().unwrap();
        write_file(
            dir.path(),
            "2024/2024-MAR.csv",
            "Maker,2W,3W,4W\nHero,10,0,0\n,5,5,5\nBajaj,x,1,1\nTVS,-4,0,0\nShort,1\nOla,\"1,500\",0,0\n",
        );

        let dataset = load_dataset(dir.path()).unwrap();

        let makers: Vec<_> = dataset.records.iter().map(|r| r.maker.as_str()).collect();
        assert_eq!(makers, vec!["Hero", "Ola"]);
        assert_eq!(dataset.records[1].two_wheeler, 1500);

        let lines: Vec<u64> = dataset
            .warnings
            .iter()
            .filter_map(|w| match w {
                LoadWarning::MalformedRow { line, .. } => Some(*line),
                _ => None,
            })
            .collect();
        assert_eq!(lines, vec![3, 4, 5, 6]);
    }

    #[test]
    fn test_missing_column_skips_file() {
        let dir = sample_tree();
        write_file(dir.path(), "2024/2024-FEB.csv", "Maker,2W,4W\nHero,1,1\n");

        let dataset = load_dataset(dir.path()).unwrap();

        assert_eq!(dataset.files_loaded, 2);
        assert!(matches!(
            dataset.warnings.as_slice(),
            [LoadWarning::UnreadableFile { reason, .. }] if reason.contains("3W")
        ));
    }

    #[test]
    fn test_empty_folder_reports_no_data() {
        let dir = TempDir::new().unwrap();
        let dataset = load_dataset(dir.path()).unwrap();

        assert!(dataset.is_empty());
        assert!(matches!(dataset.warnings.as_slice(), [LoadWarning::NoData { .. }]));
    }

    #[test]
    fn test_missing_base_is_error() {
        let dir = TempDir::new().unwrap();
        assert!(load_dataset(&dir.path().join("nope")).is_err());
    }

    #[test]
    fn test_reload_is_identical() {
        let dir = sample_tree();
        let first = load_dataset(dir.path()).unwrap();
        let second = load_dataset(dir.path()).unwrap();

        assert_eq!(first.records, second.records);
        assert_eq!(first.observations, second.observations);
        assert_eq!(first.fingerprint(), second.fingerprint());
    }

    #[test]
    fn test_fingerprint_changes_with_data() {
        let dir = sample_tree();
        let before = load_dataset(dir.path()).unwrap().fingerprint();

        write_file(dir.path(), "2024/2024-FEB.csv", "Maker,2W,3W,4W\nHero,1,0,0\n");
        let after = load_dataset(dir.path()).unwrap().fingerprint();

        assert_ne!(before, after);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_directories_not_followed() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "2024/2024-JAN.csv", "Maker,2W,3W,4W\nHero,10,0,0\n");
        std::os::unix::fs::symlink(dir.path(), dir.path().join("loop")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("2024"), dir.path().join("2024-copy")).unwrap();

        let dataset = load_dataset(dir.path()).unwrap();

        assert_eq!(dataset.files_found.len(), 1);
        assert_eq!(dataset.records.len(), 1);
        assert!(dataset.warnings.is_empty());
    }

    #[test]
    fn test_out_of_range_count_is_malformed() {
        let dir = TempDir::new().unwrap();
        write_file(
            dir.path(),
            "2024/2024-JAN.csv",
            "Maker,2W,3W,4W\nHero,10,0,0\nBig,1e20,0,0\n",
        );

        let dataset = load_dataset(dir.path()).unwrap();

        assert_eq!(dataset.records.len(), 1);
        assert!(matches!(
            dataset.warnings.as_slice(),
            [LoadWarning::MalformedRow { line: 3, reason, .. }] if reason.contains("out of range")
        ));
    }
}
