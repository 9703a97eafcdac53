// Vehicle Registration Dashboard - Core Library
// Exposes all modules for use in the terminal dashboard, web server, and tests

pub mod period;
pub mod model;
pub mod loader;     // Folder convention + CSV parsing
pub mod aggregate;
pub mod filter;
pub mod growth;     // YoY / QoQ / MoM
pub mod dashboard;  // View assembly shared by both front ends
pub mod export;
pub mod config;
pub mod logging;

// Re-export commonly used types
pub use period::{MonthKey, QuarterKey};
pub use model::{Observation, RegistrationRecord, VehicleCategory};
pub use loader::{discover, load_dataset, parse_file_name, Dataset, Discovery, LoadWarning};
pub use aggregate::{by_category, by_maker, by_month, by_quarter, by_year, top_makers, MakerTotal};
pub use filter::{DashboardFilter, FilterError, FilterOptions, FilterQuery, Granularity};
pub use growth::{growth_pct, GrowthKind, GrowthMetric, KeyMetrics};
pub use dashboard::{format_count, format_percent, Dashboard, DashboardView};
pub use export::{write_csv, EXPORT_FILE_NAME};
pub use config::Config;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
