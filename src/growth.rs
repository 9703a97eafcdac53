// 📈 Growth Metrics
// YoY / QoQ / MoM percentage change between aligned periods
//
// A growth rate against an empty comparison period is not applicable and is
// reported as None, never as 0% or infinity.

use crate::aggregate::total;
use crate::filter::{DashboardFilter, Granularity};
use crate::model::Observation;
use crate::period::{MonthKey, QuarterKey};
use serde::Serialize;

/// (current - previous) / previous * 100, or `None` when `previous` is zero.
pub fn growth_pct(current: u64, previous: u64) -> Option<f64> {
    if previous == 0 {
        return None;
    }
    Some((current as f64 - previous as f64) / previous as f64 * 100.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GrowthKind {
    #[serde(rename = "YoY")]
    YearOverYear,
    #[serde(rename = "QoQ")]
    QuarterOverQuarter,
    #[serde(rename = "MoM")]
    MonthOverMonth,
}

impl GrowthKind {
    pub fn label(&self) -> &'static str {
        match self {
            GrowthKind::YearOverYear => "YoY",
            GrowthKind::QuarterOverQuarter => "QoQ",
            GrowthKind::MonthOverMonth => "MoM",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrowthMetric {
    pub kind: GrowthKind,
    /// Period the metric describes ("2024Q2", "2024-03")
    pub period: String,
    pub comparison_period: String,
    pub current: u64,
    pub previous: u64,
    pub percent: Option<f64>,
}

impl GrowthMetric {
    fn new(kind: GrowthKind, period: String, comparison_period: String, current: u64, previous: u64) -> Self {
        GrowthMetric {
            kind,
            period,
            comparison_period,
            current,
            previous,
            percent: growth_pct(current, previous),
        }
    }
}

// ============================================================================
// KEY METRICS
// ============================================================================

/// Headline numbers shown above the charts
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyMetrics {
    pub heading: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    pub total_registrations: u64,
    pub growth: Vec<GrowthMetric>,
}

impl KeyMetrics {
    /// Compute the headline metrics for `filter` over the whole dataset.
    ///
    /// Overall mode compares quarters inside the filtered data. Quarterly and
    /// monthly modes look up their comparison periods in the whole dataset,
    /// restricted only by the category and maker selections.
    ///
    /// Returns `None` when the filter selects nothing.
    pub fn compute(all: &[Observation], filter: &DashboardFilter) -> Option<KeyMetrics> {
        let filtered = filter.apply(all);
        if filtered.is_empty() {
            return None;
        }

        let metrics = match filter.granularity {
            Granularity::Overall => Self::overall(&filtered, filter.year_range),
            Granularity::Quarterly { period } => Self::quarterly(all, &filtered, filter, period),
            Granularity::Monthly { period } => Self::monthly(all, &filtered, filter, period),
        };
        Some(metrics)
    }

    fn overall(filtered: &[Observation], (from, to): (i32, i32)) -> KeyMetrics {
        let latest = filtered
            .iter()
            .map(|o| o.quarter())
            .max()
            .unwrap_or(QuarterKey { year: to, quarter: 4 });

        let quarter_total = |q: QuarterKey| total(filtered.iter().filter(|o| o.quarter() == q));
        let current = quarter_total(latest);

        let heading = if from == to {
            format!("Key Metrics for {}", from)
        } else {
            format!("Key Metrics for {} - {}", from, to)
        };

        KeyMetrics {
            heading,
            caption: Some(
                "QoQ and YoY growth are calculated for the most recent quarter in the selected range."
                    .to_string(),
            ),
            total_registrations: total(filtered),
            growth: vec![
                GrowthMetric::new(
                    GrowthKind::QuarterOverQuarter,
                    latest.to_string(),
                    latest.minus(1).to_string(),
                    current,
                    quarter_total(latest.minus(1)),
                ),
                GrowthMetric::new(
                    GrowthKind::YearOverYear,
                    latest.to_string(),
                    latest.minus(4).to_string(),
                    current,
                    quarter_total(latest.minus(4)),
                ),
            ],
        }
    }

    fn quarterly(
        all: &[Observation],
        filtered: &[Observation],
        filter: &DashboardFilter,
        period: QuarterKey,
    ) -> KeyMetrics {
        let current = total(filtered);
        let selection_total = |q: QuarterKey| {
            total(all.iter().filter(|o| o.quarter() == q && filter.matches_selection(o)))
        };

        KeyMetrics {
            heading: format!("Key Metrics for {}", period.label()),
            caption: None,
            total_registrations: current,
            growth: vec![
                GrowthMetric::new(
                    GrowthKind::QuarterOverQuarter,
                    period.to_string(),
                    period.minus(1).to_string(),
                    current,
                    selection_total(period.minus(1)),
                ),
                GrowthMetric::new(
                    GrowthKind::YearOverYear,
                    period.to_string(),
                    period.minus(4).to_string(),
                    current,
                    selection_total(period.minus(4)),
                ),
            ],
        }
    }

    fn monthly(
        all: &[Observation],
        filtered: &[Observation],
        filter: &DashboardFilter,
        period: MonthKey,
    ) -> KeyMetrics {
        let current = total(filtered);
        let selection_total = |m: MonthKey| {
            total(all.iter().filter(|o| o.period == m && filter.matches_selection(o)))
        };

        KeyMetrics {
            heading: format!("Key Metrics for {} {}", period.month_name(), period.year),
            caption: None,
            total_registrations: current,
            growth: vec![
                GrowthMetric::new(
                    GrowthKind::MonthOverMonth,
                    period.to_string(),
                    period.minus(1).to_string(),
                    current,
                    selection_total(period.minus(1)),
                ),
                GrowthMetric::new(
                    GrowthKind::YearOverYear,
                    period.to_string(),
                    period.minus(12).to_string(),
                    current,
                    selection_total(period.minus(12)),
                ),
            ],
        }
    }

    pub fn metric(&self, kind: GrowthKind) -> Option<&GrowthMetric> {
        self.growth.iter().find(|g| g.kind == kind)
    }
}

// ============================================================================
// TESTS
// ============================================================================
