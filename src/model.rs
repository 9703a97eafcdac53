// 🚗 Registration Model
// Raw per-maker monthly rows and their melted per-category observations

use crate::period::{MonthKey, QuarterKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// VEHICLE CATEGORY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VehicleCategory {
    #[serde(rename = "2W")]
    TwoWheeler,
    #[serde(rename = "3W")]
    ThreeWheeler,
    #[serde(rename = "4W")]
    FourWheeler,
}

impl VehicleCategory {
    pub const ALL: [VehicleCategory; 3] = [
        VehicleCategory::TwoWheeler,
        VehicleCategory::ThreeWheeler,
        VehicleCategory::FourWheeler,
    ];

    /// Column header / display label
    pub fn code(&self) -> &'static str {
        match self {
            VehicleCategory::TwoWheeler => "2W",
            VehicleCategory::ThreeWheeler => "3W",
            VehicleCategory::FourWheeler => "4W",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            VehicleCategory::TwoWheeler => "Two-wheeler",
            VehicleCategory::ThreeWheeler => "Three-wheeler",
            VehicleCategory::FourWheeler => "Four-wheeler",
        }
    }
}

impl fmt::Display for VehicleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for VehicleCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "2W" => Ok(VehicleCategory::TwoWheeler),
            "3W" => Ok(VehicleCategory::ThreeWheeler),
            "4W" => Ok(VehicleCategory::FourWheeler),
            other => Err(format!("unknown vehicle category: {}", other)),
        }
    }
}

// ============================================================================
// REGISTRATION RECORD
// ============================================================================

/// One CSV row: a maker's registrations for one month, split by category.
/// Identity is (year, month, maker).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRecord {
    pub period: MonthKey,
    pub maker: String,
    pub two_wheeler: u64,
    pub three_wheeler: u64,
    pub four_wheeler: u64,
}

impl RegistrationRecord {
    pub fn count(&self, category: VehicleCategory) -> u64 {
        match category {
            VehicleCategory::TwoWheeler => self.two_wheeler,
            VehicleCategory::ThreeWheeler => self.three_wheeler,
            VehicleCategory::FourWheeler => self.four_wheeler,
        }
    }

    pub fn total(&self) -> u64 {
        self.two_wheeler
            .saturating_add(self.three_wheeler)
            .saturating_add(self.four_wheeler)
    }

    /// Melt into per-category observations, dropping zero counts.
    pub fn observations(&self) -> impl Iterator<Item = Observation> + '_ {
        VehicleCategory::ALL.into_iter().filter_map(move |category| {
            let registrations = self.count(category);
            (registrations > 0).then(|| Observation {
                period: self.period,
                maker: self.maker.clone(),
                category,
                registrations,
            })
        })
    }
}

// ============================================================================
// OBSERVATION
// ============================================================================

/// Long-format row every aggregation works on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub period: MonthKey,
    pub maker: String,
    pub category: VehicleCategory,
    pub registrations: u64,
}

impl Observation {
    pub fn year(&self) -> i32 {
        self.period.year
    }

    pub fn month(&self) -> u32 {
        self.period.month
    }

    pub fn quarter(&self) -> QuarterKey {
        self.period.quarter()
    }
}
