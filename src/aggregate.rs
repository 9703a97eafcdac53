// ➕ Aggregation
// Group-and-sum over observations by period, maker and category

use crate::model::{Observation, VehicleCategory};
use crate::period::{MonthKey, QuarterKey};
use serde::Serialize;
use std::collections::BTreeMap;

pub fn total<'a, I>(observations: I) -> u64
where
    I: IntoIterator<Item = &'a Observation>,
{
    observations
        .into_iter()
        .fold(0u64, |acc, o| acc.saturating_add(o.registrations))
}

pub fn by_month(observations: &[Observation]) -> BTreeMap<MonthKey, u64> {
    group_sum(observations, |o| o.period)
}

pub fn by_quarter(observations: &[Observation]) -> BTreeMap<QuarterKey, u64> {
    group_sum(observations, |o| o.quarter())
}

pub fn by_year(observations: &[Observation]) -> BTreeMap<i32, u64> {
    group_sum(observations, |o| o.year())
}

pub fn by_category(observations: &[Observation]) -> BTreeMap<VehicleCategory, u64> {
    group_sum(observations, |o| o.category)
}

pub fn by_maker(observations: &[Observation]) -> BTreeMap<String, u64> {
    let mut totals: BTreeMap<String, u64> = BTreeMap::new();
    for o in observations {
        add_to(totals.entry(o.maker.clone()).or_insert(0), o.registrations);
    }
    totals
}

fn group_sum<K, F>(observations: &[Observation], key: F) -> BTreeMap<K, u64>
where
    K: Ord,
    F: Fn(&Observation) -> K,
{
    let mut totals = BTreeMap::new();
    for o in observations {
        add_to(totals.entry(key(o)).or_insert(0), o.registrations);
    }
    totals
}

// Totals saturate at u64::MAX instead of wrapping
fn add_to(slot: &mut u64, registrations: u64) {
    *slot = slot.saturating_add(registrations);
}

/// A maker's total within some selection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MakerTotal {
    pub maker: String,
    pub registrations: u64,
}

/// Makers ranked by total registrations, largest first; ties by name.
pub fn top_makers(observations: &[Observation], n: usize) -> Vec<MakerTotal> {
    let mut ranked: Vec<MakerTotal> = by_maker(observations)
        .into_iter()
        .map(|(maker, registrations)| MakerTotal { maker, registrations })
        .collect();

    ranked.sort_by(|a, b| {
        b.registrations
            .cmp(&a.registrations)
            .then_with(|| a.maker.cmp(&b.maker))
    });
    ranked.truncate(n);
    ranked
}

/// Top maker for one category, `None` when the category has no registrations.
pub fn category_leader(observations: &[Observation], category: VehicleCategory) -> Option<MakerTotal> {
    let in_category: Vec<Observation> = observations
        .iter()
        .filter(|o| o.category == category)
        .cloned()
        .collect();
    top_makers(&in_category, 1).into_iter().next()
}
