// 📊 Dashboard
// Builds the complete view (metrics, charts, tables) for one filter selection.
// Both front ends (terminal and web) render a DashboardView and nothing else.

use crate::aggregate::{by_category, by_month, category_leader, top_makers, total};
use crate::config::Config;
use crate::filter::{DashboardFilter, FilterError, FilterOptions, FilterQuery};
use crate::growth::KeyMetrics;
use crate::loader::{load_dataset, Dataset, LoadWarning};
use crate::model::{Observation, VehicleCategory};
use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

pub const EMPTY_SELECTION_MESSAGE: &str = "No data available for the selected filters.";

// ============================================================================
// VIEW TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub period: String,
    pub registrations: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShareSlice {
    pub maker: String,
    pub registrations: u64,
    pub share_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotal {
    pub category: VehicleCategory,
    pub registrations: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryLeader {
    pub category: VehicleCategory,
    pub maker: Option<String>,
    pub registrations: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub filter: DashboardFilter,
    pub empty: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub metrics: Option<KeyMetrics>,
    pub trend: Vec<TrendPoint>,
    pub market_share: Vec<ShareSlice>,
    pub categories: Vec<CategoryTotal>,
    pub leaders: Vec<CategoryLeader>,
    pub warnings: Vec<LoadWarning>,
}

impl DashboardView {
    /// Build the view for `filter` over `dataset`.
    pub fn build(dataset: &Dataset, filter: &DashboardFilter, config: &Config) -> DashboardView {
        let filtered = filter.apply(&dataset.observations);

        if filtered.is_empty() {
            return DashboardView {
                filter: filter.clone(),
                empty: true,
                message: Some(EMPTY_SELECTION_MESSAGE.to_string()),
                metrics: None,
                trend: Vec::new(),
                market_share: Vec::new(),
                categories: Vec::new(),
                leaders: Vec::new(),
                warnings: dataset.warnings.clone(),
            };
        }

        DashboardView {
            filter: filter.clone(),
            empty: false,
            message: None,
            metrics: KeyMetrics::compute(&dataset.observations, filter),
            trend: trend(&filtered),
            market_share: market_share(&filtered, config.market_share_top),
            categories: by_category(&filtered)
                .into_iter()
                .map(|(category, registrations)| CategoryTotal { category, registrations })
                .collect(),
            leaders: filter
                .categories
                .iter()
                .map(|&category| {
                    let leader = category_leader(&filtered, category);
                    CategoryLeader {
                        category,
                        registrations: leader.as_ref().map(|l| l.registrations).unwrap_or(0),
                        maker: leader.map(|l| l.maker),
                    }
                })
                .collect(),
            warnings: dataset.warnings.clone(),
        }
    }
}

fn trend(filtered: &[Observation]) -> Vec<TrendPoint> {
    by_month(filtered)
        .into_iter()
        .map(|(period, registrations)| TrendPoint {
            date: period.first_day(),
            period: period.to_string(),
            registrations,
        })
        .collect()
}

fn market_share(filtered: &[Observation], top: usize) -> Vec<ShareSlice> {
    let grand_total = total(filtered);
    top_makers(filtered, top)
        .into_iter()
        .map(|m| ShareSlice {
            share_pct: if grand_total == 0 {
                0.0
            } else {
                m.registrations as f64 / grand_total as f64 * 100.0
            },
            maker: m.maker,
            registrations: m.registrations,
        })
        .collect()
}

// ============================================================================
// SESSION
// ============================================================================

/// A loaded dataset plus everything derived from it once per load
#[derive(Debug, Clone)]
pub struct Dashboard {
    pub config: Config,
    dataset: Dataset,
    options: Option<FilterOptions>,
}

impl Dashboard {
    pub fn new(dataset: Dataset, config: Config) -> Self {
        let options = FilterOptions::from_dataset(&dataset, config.top_makers);
        Dashboard { config, dataset, options }
    }

    /// Load `config.data_dir` and build a session over it
    pub fn load(config: Config) -> Result<Self> {
        let dataset = load_dataset(&config.data_dir)?;
        Ok(Dashboard::new(dataset, config))
    }

    /// Re-read the data folder. Returns whether the data changed.
    pub fn reload(&mut self) -> Result<bool> {
        let dataset = load_dataset(&self.config.data_dir)?;
        Ok(self.replace(dataset))
    }

    /// Swap in a freshly loaded dataset. Returns whether the data changed.
    pub fn replace(&mut self, dataset: Dataset) -> bool {
        let changed = dataset.fingerprint() != self.dataset.fingerprint();
        info!(changed, "data reloaded");

        *self = Dashboard::new(dataset, self.config.clone());
        changed
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn options(&self) -> Option<&FilterOptions> {
        self.options.as_ref()
    }

    pub fn default_filter(&self) -> Result<DashboardFilter, FilterError> {
        self.options
            .as_ref()
            .map(FilterOptions::default_filter)
            .ok_or(FilterError::NoData)
    }

    pub fn resolve(&self, query: &FilterQuery) -> Result<DashboardFilter, FilterError> {
        query.resolve(self.options.as_ref().ok_or(FilterError::NoData)?)
    }

    pub fn view(&self, filter: &DashboardFilter) -> DashboardView {
        DashboardView::build(&self.dataset, filter, &self.config)
    }

    pub fn filtered(&self, filter: &DashboardFilter) -> Vec<Observation> {
        filter.apply(&self.dataset.observations)
    }
}

// ============================================================================
// FORMATTING
// ============================================================================

/// 1234567 → "1,234,567"
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Two decimals with a percent sign; "n/a" when not applicable
pub fn format_percent(pct: Option<f64>) -> String {
    match pct {
        Some(p) => format!("{:.2}%", p),
        None => "n/a".to_string(),
    }
}

// ============================================================================
// TESTS
// ============================================================================
