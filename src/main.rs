// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs::File;
use std::io;
use std::path::PathBuf;

use registration_dashboard::{
    export::write_csv, format_count, format_percent, logging, Config, Dashboard, DashboardView,
    FilterQuery,
};

#[derive(Parser)]
#[command(name = "registration-dashboard")]
#[command(about = "Vehicle registration growth dashboard (YoY / QoQ / MoM)", version)]
struct Cli {
    /// Config file (defaults to ./dashboard.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Folder containing the <year>/<year>-<MON>.csv files
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Number of makers selected by default
    #[arg(long, global = true)]
    top_makers: Option<usize>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive terminal dashboard (default)
    Ui,
    /// Print key metrics and tables for one filter selection
    Summary {
        #[command(flatten)]
        filter: FilterArgs,
        /// Print the view as JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Write the filtered data as CSV
    Export {
        #[command(flatten)]
        filter: FilterArgs,
        /// Output file (stdout when omitted)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Default)]
struct FilterArgs {
    /// overall | quarterly | monthly
    #[arg(long)]
    mode: Option<String>,
    #[arg(long)]
    year: Option<i32>,
    #[arg(long)]
    quarter: Option<u32>,
    #[arg(long)]
    month: Option<u32>,
    /// First year of the range (overall mode)
    #[arg(long)]
    from: Option<i32>,
    /// Last year of the range (overall mode)
    #[arg(long)]
    to: Option<i32>,
    /// Comma-separated categories, e.g. 2W,4W
    #[arg(long)]
    categories: Option<String>,
    /// Comma-separated makers (escape a comma in a name as \,), or * for all
    #[arg(long)]
    makers: Option<String>,
}

impl From<FilterArgs> for FilterQuery {
    fn from(args: FilterArgs) -> Self {
        FilterQuery {
            mode: args.mode,
            year: args.year,
            quarter: args.quarter,
            month: args.month,
            from: args.from,
            to: args.to,
            categories: args.categories,
            makers: args.makers,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // The TUI owns the terminal; stay quiet there unless RUST_LOG asks otherwise
    let interactive = matches!(cli.command, None | Some(Command::Ui));
    logging::init(if interactive { "off" } else { "info" });

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if let Some(n) = cli.top_makers {
        config.top_makers = n;
    }

    let dashboard = Dashboard::load(config)?;

    match cli.command {
        None | Some(Command::Ui) => run_ui_mode(dashboard),
        Some(Command::Summary { filter, json }) => run_summary(&dashboard, filter.into(), json),
        Some(Command::Export { filter, output }) => run_export(&dashboard, filter.into(), output),
    }
}

fn run_summary(dashboard: &Dashboard, query: FilterQuery, json: bool) -> Result<()> {
    let filter = dashboard.resolve(&query)?;
    let view = dashboard.view(&filter);

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    print_report(dashboard, &view);
    Ok(())
}

fn print_report(dashboard: &Dashboard, view: &DashboardView) {
    println!("🚗 Vehicle Registration Analysis");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let dataset = dashboard.dataset();
    println!(
        "📂 {} files found, {} loaded from {}",
        dataset.files_found.len(),
        dataset.files_loaded,
        dataset.base.display()
    );
    for warning in &view.warnings {
        println!("⚠️  {}", warning);
    }

    println!("\nMode: {}", view.filter.granularity.name());

    if view.empty {
        println!("\n{}", view.message.as_deref().unwrap_or_default());
        return;
    }

    if let Some(metrics) = &view.metrics {
        println!("\n📊 {}", metrics.heading);
        if let Some(caption) = &metrics.caption {
            println!("   {}", caption);
        }
        println!("   Total Registrations: {}", format_count(metrics.total_registrations));
        for g in &metrics.growth {
            println!(
                "   {} Growth ({} vs {}): {}",
                g.kind.label(),
                g.period,
                g.comparison_period,
                format_percent(g.percent)
            );
        }
    }

    println!("\n📈 Registration Trends");
    for point in &view.trend {
        println!("   {}  {:>14}", point.period, format_count(point.registrations));
    }

    println!("\n🏭 Top Manufacturers");
    for slice in &view.market_share {
        println!(
            "   {:<30} {:>14}  {:>6.2}%",
            slice.maker,
            format_count(slice.registrations),
            slice.share_pct
        );
    }

    println!("\n🚦 Registrations by Vehicle Category");
    for cat in &view.categories {
        println!("   {:<4} {:>14}", cat.category.code(), format_count(cat.registrations));
    }

    println!("\n🏆 Category Leaders");
    for leader in &view.leaders {
        match &leader.maker {
            Some(maker) => println!(
                "   {:<4} {} ({} registrations)",
                leader.category.code(),
                maker,
                format_count(leader.registrations)
            ),
            None => println!("   {:<4} no registrations for the selected manufacturers", leader.category.code()),
        }
    }
}

fn run_export(dashboard: &Dashboard, query: FilterQuery, output: Option<PathBuf>) -> Result<()> {
    let filter = dashboard.resolve(&query)?;
    let rows = dashboard.filtered(&filter);

    let written = match &output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            write_csv(file, &rows)?
        }
        None => write_csv(io::stdout().lock(), &rows)?,
    };

    if let Some(path) = output {
        eprintln!("✓ Wrote {} rows to {}", written, path.display());
    }
    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(dashboard: Dashboard) -> Result<()> {
    if dashboard.options().is_none() {
        for warning in &dashboard.dataset().warnings {
            eprintln!("⚠️  {}", warning);
        }
        eprintln!("❌ Dashboard cannot be displayed because no data was loaded.");
        std::process::exit(1);
    }

    let mut app = ui::App::new(dashboard)?;
    ui::run_ui(&mut app)?;

    println!("\n✅ Dashboard closed");
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_dashboard: Dashboard) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use the summary command, or the web UI: cargo run --bin dashboard-server --features server");
    std::process::exit(1);
}
