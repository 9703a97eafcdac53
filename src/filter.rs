// 🔎 Dashboard Filters
// Year range, category and maker selections plus the analysis granularity

use crate::aggregate::top_makers;
use crate::loader::Dataset;
use crate::model::{Observation, VehicleCategory};
use crate::period::{MonthKey, QuarterKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    #[error("unknown analysis mode '{0}' (expected overall, quarterly or monthly)")]
    UnknownMode(String),
    #[error("{field} is required for {mode} analysis")]
    MissingField { field: &'static str, mode: &'static str },
    #[error("invalid {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
    #[error("year range {from}-{to} is reversed")]
    ReversedRange { from: i32, to: i32 },
    #[error("Dashboard cannot be displayed because no data was loaded.")]
    NoData,
}

// ============================================================================
// GRANULARITY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Granularity {
    /// Whole selected year range; growth for its latest quarter
    Overall,
    Quarterly { period: QuarterKey },
    Monthly { period: MonthKey },
}

impl Granularity {
    pub fn name(&self) -> &'static str {
        match self {
            Granularity::Overall => "Overall Trend",
            Granularity::Quarterly { .. } => "Quarterly",
            Granularity::Monthly { .. } => "Monthly",
        }
    }

    /// Cycle Overall → Quarterly → Monthly, anchored on `latest`
    pub fn next(&self, latest: MonthKey) -> Self {
        match self {
            Granularity::Overall => Granularity::Quarterly {
                period: latest.quarter(),
            },
            Granularity::Quarterly { .. } => Granularity::Monthly { period: latest },
            Granularity::Monthly { .. } => Granularity::Overall,
        }
    }

    /// Move the selected quarter/month one step; `forward = false` steps back.
    pub fn step(&self, forward: bool) -> Self {
        match *self {
            Granularity::Overall => Granularity::Overall,
            Granularity::Quarterly { period } => Granularity::Quarterly {
                period: if forward { period.plus(1) } else { period.minus(1) },
            },
            Granularity::Monthly { period } => Granularity::Monthly {
                period: if forward { period.plus(1) } else { period.minus(1) },
            },
        }
    }
}

// ============================================================================
// FILTER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardFilter {
    pub granularity: Granularity,
    /// Inclusive; used by the Overall mode only
    pub year_range: (i32, i32),
    pub categories: BTreeSet<VehicleCategory>,
    pub makers: BTreeSet<String>,
}

impl DashboardFilter {
    /// Years the observations must fall in
    pub fn effective_years(&self) -> (i32, i32) {
        match self.granularity {
            Granularity::Overall => self.year_range,
            Granularity::Quarterly { period } => (period.year, period.year),
            Granularity::Monthly { period } => (period.year, period.year),
        }
    }

    /// Category and maker selection only, ignoring period
    pub fn matches_selection(&self, o: &Observation) -> bool {
        self.categories.contains(&o.category) && self.makers.contains(&o.maker)
    }

    pub fn matches(&self, o: &Observation) -> bool {
        let (from, to) = self.effective_years();
        let in_period = match self.granularity {
            Granularity::Overall => true,
            Granularity::Quarterly { period } => o.quarter() == period,
            Granularity::Monthly { period } => o.period == period,
        };
        o.year() >= from && o.year() <= to && in_period && self.matches_selection(o)
    }

    pub fn apply(&self, observations: &[Observation]) -> Vec<Observation> {
        observations.iter().filter(|o| self.matches(o)).cloned().collect()
    }

    pub fn validate(&self) -> Result<(), FilterError> {
        let (from, to) = self.year_range;
        if from > to {
            return Err(FilterError::ReversedRange { from, to });
        }
        Ok(())
    }
}

// ============================================================================
// OPTIONS & DEFAULTS
// ============================================================================

/// Choices offered by the filter widgets
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterOptions {
    pub min_year: i32,
    pub max_year: i32,
    /// Descending, for the quarter/month year selectors
    pub available_years: Vec<i32>,
    pub categories: Vec<VehicleCategory>,
    pub makers: Vec<String>,
    pub default_makers: Vec<String>,
    pub latest_month: MonthKey,
}

impl FilterOptions {
    /// `None` for an empty dataset
    pub fn from_dataset(dataset: &Dataset, default_top_makers: usize) -> Option<Self> {
        let (min_year, max_year) = dataset.year_bounds()?;
        let latest_month = dataset.observations.iter().map(|o| o.period).max()?;

        let mut available_years = dataset.years();
        available_years.reverse();

        Some(FilterOptions {
            min_year,
            max_year,
            available_years,
            categories: dataset.categories(),
            makers: dataset.makers(),
            default_makers: top_makers(&dataset.observations, default_top_makers)
                .into_iter()
                .map(|m| m.maker)
                .collect(),
            latest_month,
        })
    }

    /// Everything selected except makers, which default to the top N
    pub fn default_filter(&self) -> DashboardFilter {
        DashboardFilter {
            granularity: Granularity::Overall,
            year_range: (self.min_year, self.max_year),
            categories: self.categories.iter().copied().collect(),
            makers: self.default_makers.iter().cloned().collect(),
        }
    }
}

// ============================================================================
// QUERY PARSING
// ============================================================================

/// Loosely-typed filter input, as it arrives from query strings or CLI flags.
/// Missing fields fall back to the defaults in `FilterOptions`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterQuery {
    pub mode: Option<String>,
    pub year: Option<i32>,
    pub quarter: Option<u32>,
    pub month: Option<u32>,
    pub from: Option<i32>,
    pub to: Option<i32>,
    /// Comma-separated category codes ("2W,4W")
    pub categories: Option<String>,
    /// Comma-separated maker names, `\,` for a comma inside a name; "*" selects all makers
    pub makers: Option<String>,
}

impl FilterQuery {
    pub fn resolve(&self, options: &FilterOptions) -> Result<DashboardFilter, FilterError> {
        let mut filter = options.default_filter();
        let year = self.year.unwrap_or(options.latest_month.year);
        filter.granularity = match self.mode.as_deref().map(str::to_lowercase).as_deref() {
            None | Some("") | Some("overall") => Granularity::Overall,
            Some("quarterly") => {
                let quarter = self.quarter.ok_or(FilterError::MissingField {
                    field: "quarter",
                    mode: "quarterly",
                })?;
                let period = QuarterKey::new(year, quarter).ok_or(FilterError::InvalidValue {
                    field: "quarter",
                    value: quarter.to_string(),
                })?;
                Granularity::Quarterly { period }
            }
            Some("monthly") => {
                let month = self.month.ok_or(FilterError::MissingField {
                    field: "month",
                    mode: "monthly",
                })?;
                let period = MonthKey::new(year, month).ok_or(FilterError::InvalidValue {
                    field: "month",
                    value: month.to_string(),
                })?;
                Granularity::Monthly { period }
            }
            Some(other) => return Err(FilterError::UnknownMode(other.to_string())),
        };

        filter.year_range = (
            self.from.unwrap_or(options.min_year),
            self.to.unwrap_or(options.max_year),
        );

        if let Some(list) = &self.categories {
            filter.categories = split_list(list)
                .into_iter()
                .map(|c| {
                    c.parse::<VehicleCategory>()
                        .map_err(|_| FilterError::InvalidValue { field: "category", value: c })
                })
                .collect::<Result<_, _>>()?;
        }

        if let Some(list) = &self.makers {
            filter.makers = if list.trim() == "*" {
                options.makers.iter().cloned().collect()
            } else {
                split_list(list).into_iter().collect()
            };
        }

        filter.validate()?;
        Ok(filter)
    }
}

/// Split a comma-separated list. `\,` is a literal comma and `\\` a backslash.
pub fn split_list(list: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut chars = list.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => current.extend(chars.next()),
            ',' => items.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    items.push(current);

    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

/// Escape one item so `split_list` returns it unchanged
pub fn escape_list_item(item: &str) -> String {
    item.replace('\\', "\\\\").replace(',', "\\,")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RegistrationRecord;

    fn rec(year: i32, month: u32, maker: &str, two: u64, four: u64) -> RegistrationRecord {
        RegistrationRecord {
            period: MonthKey::new(year, month).unwrap(),
            maker: maker.to_string(),
            two_wheeler: two,
            three_wheeler: 0,
            four_wheeler: four,
        }
    }

    fn dataset() -> Dataset {
        Dataset::from_records(vec![
            rec(2023, 5, "Hero", 500, 0),
            rec(2023, 5, "Maruti", 0, 400),
            rec(2024, 2, "Hero", 600, 0),
            rec(2024, 2, "Tata", 0, 100),
            rec(2024, 7, "Maruti", 0, 450),
            rec(2024, 7, "Ather", 30, 0),
        ])
    }

    #[test]
    fn test_options_defaults() {
        let options = FilterOptions::from_dataset(&dataset(), 2).unwrap();

        assert_eq!((options.min_year, options.max_year), (2023, 2024));
        assert_eq!(options.available_years, vec![2024, 2023]);
        assert_eq!(options.categories, vec![VehicleCategory::TwoWheeler, VehicleCategory::FourWheeler]);
        assert_eq!(options.default_makers, vec!["Hero".to_string(), "Maruti".to_string()]);
        assert_eq!(options.latest_month, MonthKey::new(2024, 7).unwrap());
    }

    #[test]
    fn test_empty_dataset_has_no_options() {
        assert!(FilterOptions::from_dataset(&Dataset::default(), 10).is_none());
    }

    #[test]
    fn test_apply_overall_year_range() {
        let ds = dataset();
        let options = FilterOptions::from_dataset(&ds, 10).unwrap();
        let mut filter = options.default_filter();
        filter.year_range = (2024, 2024);

        let kept = filter.apply(&ds.observations);
        assert_eq!(kept.len(), 4);
        assert!(kept.iter().all(|o| o.year() == 2024));
    }

    #[test]
    fn test_apply_quarterly_and_monthly() {
        let ds = dataset();
        let options = FilterOptions::from_dataset(&ds, 10).unwrap();
        let mut filter = options.default_filter();

        filter.granularity = Granularity::Quarterly {
            period: QuarterKey::new(2024, 3).unwrap(),
        };
        let kept = filter.apply(&ds.observations);
        assert_eq!(kept.len(), 2);

        filter.granularity = Granularity::Monthly {
            period: MonthKey::new(2024, 2).unwrap(),
        };
        let kept = filter.apply(&ds.observations);
        let makers: BTreeSet<_> = kept.iter().map(|o| o.maker.as_str()).collect();
        assert_eq!(makers, ["Hero", "Tata"].into_iter().collect());
    }

    #[test]
    fn test_empty_selection_selects_nothing() {
        let ds = dataset();
        let options = FilterOptions::from_dataset(&ds, 10).unwrap();
        let mut filter = options.default_filter();
        filter.categories.clear();

        assert!(filter.apply(&ds.observations).is_empty());
    }

    #[test]
    fn test_query_resolution() {
        let options = FilterOptions::from_dataset(&dataset(), 10).unwrap();

        let query = FilterQuery {
            mode: Some("Quarterly".to_string()),
            year: Some(2023),
            quarter: Some(2),
            categories: Some("4w".to_string()),
            makers: Some("Maruti, Tata".to_string()),
            ..Default::default()
        };
        let filter = query.resolve(&options).unwrap();

        assert_eq!(
            filter.granularity,
            Granularity::Quarterly { period: QuarterKey::new(2023, 2).unwrap() }
        );
        assert_eq!(filter.categories, [VehicleCategory::FourWheeler].into_iter().collect());
        assert_eq!(filter.makers.len(), 2);
    }

    #[test]
    fn test_query_defaults_and_wildcard() {
        let options = FilterOptions::from_dataset(&dataset(), 1).unwrap();

        let filter = FilterQuery::default().resolve(&options).unwrap();
        assert_eq!(filter, options.default_filter());
        assert_eq!(filter.makers.len(), 1);

        let all = FilterQuery {
            makers: Some("*".to_string()),
            ..Default::default()
        }
        .resolve(&options)
        .unwrap();
        assert_eq!(all.makers.len(), 4);
    }

    #[test]
    fn test_split_list_escapes() {
        assert_eq!(split_list("2W, 4W,"), vec!["2W", "4W"]);
        assert_eq!(split_list(r"Tata Motors\, Ltd,Hero"), vec!["Tata Motors, Ltd", "Hero"]);
        assert_eq!(split_list(r"A\\B"), vec![r"A\B"]);

        let names = ["Tata Motors, Ltd", r"Odd\Name", "Hero"];
        let joined = names.iter().map(|n| escape_list_item(n)).collect::<Vec<_>>().join(",");
        assert_eq!(split_list(&joined), names);
    }

    #[test]
    fn test_query_maker_with_comma() {
        let ds = Dataset::from_records(vec![rec(2024, 1, "Tata Motors, Ltd", 0, 70), rec(2024, 1, "Hero", 90, 0)]);
        let options = FilterOptions::from_dataset(&ds, 10).unwrap();

        let query = FilterQuery {
            makers: Some(escape_list_item("Tata Motors, Ltd")),
            ..Default::default()
        };
        let filter = query.resolve(&options).unwrap();

        assert_eq!(filter.makers, ["Tata Motors, Ltd".to_string()].into_iter().collect());
        let kept = filter.apply(&ds.observations);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].registrations, 70);
    }

    #[test]
    fn test_query_errors() {
        let options = FilterOptions::from_dataset(&dataset(), 10).unwrap();

        let bad_mode = FilterQuery { mode: Some("weekly".to_string()), ..Default::default() };
        assert_eq!(bad_mode.resolve(&options), Err(FilterError::UnknownMode("weekly".to_string())));

        let no_month = FilterQuery { mode: Some("monthly".to_string()), ..Default::default() };
        assert!(matches!(no_month.resolve(&options), Err(FilterError::MissingField { .. })));

        let bad_cat = FilterQuery { categories: Some("2W,9W".to_string()), ..Default::default() };
        assert!(matches!(bad_cat.resolve(&options), Err(FilterError::InvalidValue { .. })));

        let reversed = FilterQuery { from: Some(2024), to: Some(2023), ..Default::default() };
        assert_eq!(
            reversed.resolve(&options),
            Err(FilterError::ReversedRange { from: 2024, to: 2023 })
        );
    }

    #[test]
    fn test_granularity_cycle_and_step() {
        let latest = MonthKey::new(2024, 1).unwrap();
        let q = Granularity::Overall.next(latest);
        assert_eq!(q, Granularity::Quarterly { period: QuarterKey::new(2024, 1).unwrap() });
        assert_eq!(
            q.step(false),
            Granularity::Quarterly { period: QuarterKey::new(2023, 4).unwrap() }
        );
        assert_eq!(q.step(true), Granularity::Quarterly { period: QuarterKey::new(2024, 2).unwrap() });

        let m = q.next(latest);
        assert_eq!(m.step(false), Granularity::Monthly { period: MonthKey::new(2023, 12).unwrap() });
        assert_eq!(m.next(latest), Granularity::Overall);
    }
}
