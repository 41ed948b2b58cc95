//! refdata CLI: query reference data and build point-in-time panels.
//!
//! Commands:
//! - `index-weights`: snapshot weights on one date, or a daily weight panel
//! - `index-members`: constituent list, or a daily 0/1 membership panel
//! - `industry`: raw classification records, or a daily industry panel
//! - `adj-factor`: raw adjustment factors, or a daily factor/ratio panel
//! - `daily`: daily bars
//! - `query`: any view with a raw filter expression
//! - `cache-status`: list cached panels
//!
//! Records come from a CSV store (`--data-dir`, one `{view}.csv` per view).
//! `--output` writes `.csv` or `.parquet`; otherwise the frame is printed.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use refdata_core::data::{
    CalendarProvider, CsvRecordFetcher, FieldList, Filter, StaticCalendar, WeekdayCalendar,
};
use refdata_core::domain::{SymbolList, TradingDate};
use refdata_core::panel::{DensePanel, PanelCache, PanelValue};
use refdata_core::service::AdjustMode;
use refdata_core::{DataService, IndustryKind, QueryOutcome, RefDataConfig};

type Service = DataService<CsvRecordFetcher, Box<dyn CalendarProvider>>;

#[derive(Parser)]
#[command(
    name = "refdata",
    about = "refdata CLI: point-in-time reference-data panels"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Directory holding one `{view}.csv` per view. Overrides the config file.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Trading calendar CSV. A weekday calendar is used when absent.
    #[arg(long, global = true)]
    calendar: Option<PathBuf>,

    /// TOML config file with `[service]` and `[source]` tables.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Panel cache directory. Overrides the config file.
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Write the result to a `.csv` or `.parquet` file instead of printing it.
    #[arg(long, global = true)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Index constituent weights.
    IndexWeights {
        /// Index code (e.g., 000300.SH).
        index: String,

        /// Snapshot date (YYYYMMDD or YYYY-MM-DD). Mutually exclusive with --start/--end.
        #[arg(long)]
        date: Option<String>,

        /// Start of the daily panel.
        #[arg(long)]
        start: Option<String>,

        /// End of the daily panel.
        #[arg(long)]
        end: Option<String>,
    },
    /// Index constituents over a date range.
    IndexMembers {
        /// Index code (e.g., 000905.SH).
        index: String,

        #[arg(long)]
        start: String,

        #[arg(long)]
        end: String,

        /// Emit the daily 0/1 membership panel instead of the symbol list.
        #[arg(long, default_value_t = false)]
        panel: bool,
    },
    /// Industry classification.
    Industry {
        /// Comma-separated symbols.
        symbols: String,

        /// Classification scheme: SW or ZZ.
        #[arg(long, default_value = "SW")]
        kind: String,

        /// Classification level, 1 to 4.
        #[arg(long, default_value_t = 1)]
        level: u8,

        /// Start of the daily panel. Without --start/--end the raw records are shown.
        #[arg(long)]
        start: Option<String>,

        #[arg(long)]
        end: Option<String>,
    },
    /// Price adjustment factors.
    AdjFactor {
        /// Comma-separated symbols.
        symbols: String,

        #[arg(long)]
        start: Option<String>,

        #[arg(long)]
        end: Option<String>,

        /// Emit the daily panel (requires --start and --end).
        #[arg(long, default_value_t = false)]
        daily: bool,

        /// Day-over-day ratios instead of absolute factors (with --daily).
        #[arg(long, default_value_t = false)]
        ratio: bool,
    },
    /// Daily bars.
    Daily {
        /// Comma-separated symbols.
        symbols: String,

        #[arg(long)]
        start: String,

        #[arg(long)]
        end: String,

        /// Comma-separated fields; empty for all.
        #[arg(long, default_value = "")]
        fields: String,

        /// Price adjustment: pre or post.
        #[arg(long)]
        adjust: Option<String>,
    },
    /// Query any view.
    Query {
        /// View name (e.g., lb.secDailyIndicator).
        view: String,

        /// Filter expression, `key=value&key=value`.
        #[arg(long, default_value = "")]
        filter: String,

        /// Comma-separated fields; empty for all.
        #[arg(long, default_value = "")]
        fields: String,

        #[arg(long)]
        order_by: Option<String>,
    },
    /// List cached panels.
    CacheStatus,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("refdata=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let global = cli.global;

    if let Commands::CacheStatus = cli.command {
        let config = load_config(&global)?;
        let dir = config
            .service
            .cache_dir
            .context("no cache directory: pass --cache-dir or set [service].cache_dir")?;
        return run_cache_status(&dir);
    }

    let service = build_service(&global)?;
    let output = global.output.as_deref();

    match cli.command {
        Commands::IndexWeights {
            index,
            date,
            start,
            end,
        } => match (date, start, end) {
            (Some(date), None, None) => {
                let outcome = service.index_weights(&index, parse_date(&date)?)?;
                emit_frame(outcome, output)
            }
            (None, Some(start), Some(end)) => {
                let outcome =
                    service.index_weights_daily(&index, parse_date(&start)?, parse_date(&end)?)?;
                emit_panel(outcome, output)
            }
            _ => bail!("pass either --date, or both --start and --end"),
        },
        Commands::IndexMembers {
            index,
            start,
            end,
            panel,
        } => {
            let (start, end) = (parse_date(&start)?, parse_date(&end)?);
            if panel {
                emit_panel(service.index_membership(&index, start, end)?, output)
            } else {
                let outcome = service.index_members(&index, start, end)?;
                report_warning(&outcome);
                let symbols: Vec<String> = outcome.data.iter().map(|e| e.to_string()).collect();
                let df = DataFrame::new(vec![Column::new("symbol".into(), symbols)])?;
                write_or_print(df, output)
            }
        }
        Commands::Industry {
            symbols,
            kind,
            level,
            start,
            end,
        } => {
            let symbols = SymbolList::parse(&symbols);
            let kind: IndustryKind = kind.parse()?;
            match (start, end) {
                (Some(start), Some(end)) => {
                    let outcome = service.industry_daily(
                        &symbols,
                        parse_date(&start)?,
                        parse_date(&end)?,
                        kind,
                        level,
                    )?;
                    emit_panel(outcome, output)
                }
                (None, None) => emit_frame(service.industry_raw(&symbols, kind, level)?, output),
                _ => bail!("--start and --end must be given together"),
            }
        }
        Commands::AdjFactor {
            symbols,
            start,
            end,
            daily,
            ratio,
        } => {
            let symbols = SymbolList::parse(&symbols);
            let start = start.as_deref().map(parse_date).transpose()?;
            let end = end.as_deref().map(parse_date).transpose()?;
            if ratio && !daily {
                bail!("--ratio requires --daily");
            }
            if daily {
                let (Some(start), Some(end)) = (start, end) else {
                    bail!("--daily requires --start and --end");
                };
                emit_panel(service.adj_factor_daily(&symbols, start, end, ratio)?, output)
            } else {
                emit_frame(service.adj_factor_raw(&symbols, start, end)?, output)
            }
        }
        Commands::Daily {
            symbols,
            start,
            end,
            fields,
            adjust,
        } => {
            let adjust = adjust.as_deref().map(str::parse::<AdjustMode>).transpose()?;
            let fields = FieldList::parse(&fields).with_required(&["symbol", "trade_date"]);
            let outcome = service.daily(
                &SymbolList::parse(&symbols),
                parse_date(&start)?,
                parse_date(&end)?,
                &fields,
                adjust,
            )?;
            emit_frame(outcome, output)
        }
        Commands::Query {
            view,
            filter,
            fields,
            order_by,
        } => {
            let outcome = service.query(
                &view,
                &Filter::parse(&filter),
                &FieldList::parse(&fields),
                order_by.as_deref(),
            )?;
            emit_frame(outcome, output)
        }
        Commands::CacheStatus => Ok(()),
    }
}

fn parse_date(s: &str) -> Result<TradingDate> {
    s.parse::<TradingDate>()
        .with_context(|| format!("bad date '{s}'"))
}

/// Config file (if any) with command-line overrides applied. Relative paths
/// in the file resolve against the file's directory.
fn load_config(global: &GlobalArgs) -> Result<RefDataConfig> {
    let mut config = match &global.config {
        Some(path) => {
            let mut config = RefDataConfig::from_file(path)?;
            let base = path.parent().unwrap_or(Path::new("."));
            if config.source.data_dir.is_relative() && !config.source.data_dir.as_os_str().is_empty() {
                config.source.data_dir = base.join(&config.source.data_dir);
            }
            if let Some(cal) = config.source.calendar.as_mut().filter(|c| c.is_relative()) {
                let resolved = base.join(&*cal);
                *cal = resolved;
            }
            config
        }
        None => RefDataConfig::default(),
    };
    if let Some(dir) = &global.data_dir {
        config.source.data_dir = dir.clone();
    }
    if let Some(cal) = &global.calendar {
        config.source.calendar = Some(cal.clone());
    }
    if let Some(dir) = &global.cache_dir {
        config.service.cache_dir = Some(dir.clone());
    }
    Ok(config)
}

fn build_service(global: &GlobalArgs) -> Result<Service> {
    let config = load_config(global)?;
    if config.source.data_dir.as_os_str().is_empty() {
        bail!("no data directory: pass --data-dir or set [source].data_dir");
    }
    if !config.source.data_dir.is_dir() {
        bail!("data directory does not exist: {}", config.source.data_dir.display());
    }

    let calendar: Box<dyn CalendarProvider> = match &config.source.calendar {
        Some(path) => {
            let cal = StaticCalendar::from_csv(path)?;
            info!(path = %path.display(), dates = cal.len(), "loaded trading calendar");
            Box::new(cal)
        }
        None => Box::new(WeekdayCalendar::new()),
    };
    let fetcher = CsvRecordFetcher::new(&config.source.data_dir);
    Ok(DataService::new(fetcher, calendar).with_config(config.service))
}

fn report_warning<T>(outcome: &QueryOutcome<T>) {
    if let Some(warning) = &outcome.warning {
        eprintln!("WARNING: {warning}");
    }
}

fn emit_frame(outcome: QueryOutcome<DataFrame>, output: Option<&Path>) -> Result<()> {
    report_warning(&outcome);
    write_or_print(outcome.data, output)
}

fn emit_panel<T: PanelValue>(outcome: QueryOutcome<DensePanel<T>>, output: Option<&Path>) -> Result<()> {
    report_warning(&outcome);
    let panel = outcome.data;
    println!(
        "Panel: {} dates x {} entities ({} filled)",
        panel.n_dates(),
        panel.n_entities(),
        panel.filled_count()
    );
    write_or_print(panel.to_dataframe()?, output)
}

fn write_or_print(mut df: DataFrame, output: Option<&Path>) -> Result<()> {
    let Some(path) = output else {
        println!("{df}");
        return Ok(());
    };
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    match ext {
        "csv" => CsvWriter::new(file).finish(&mut df)?,
        "parquet" => {
            ParquetWriter::new(file).finish(&mut df)?;
        }
        other => bail!("unsupported output extension '{other}': expected .csv or .parquet"),
    }
    println!("Wrote {} rows to {}", df.height(), path.display());
    Ok(())
}

fn run_cache_status(cache_dir: &Path) -> Result<()> {
    if !cache_dir.exists() {
        println!("Cache directory does not exist: {}", cache_dir.display());
        return Ok(());
    }
    let cache = PanelCache::new(cache_dir);
    let metas = cache.status()?;
    if metas.is_empty() {
        println!("Cache is empty: {}", cache_dir.display());
        return Ok(());
    }

    println!("Cache: {}", cache_dir.display());
    println!("Panels: {}", metas.len());
    println!();
    println!(
        "{:<22} {:<21} {:>6} {:>8}  {}",
        "Operation", "Date Range", "Dates", "Entities", "Parameters"
    );
    println!("{}", "-".repeat(80));
    for meta in &metas {
        let range = format!(
            "{} to {}",
            meta.first_date.as_deref().unwrap_or("-"),
            meta.last_date.as_deref().unwrap_or("-")
        );
        let params: Vec<String> = meta
            .key
            .params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        println!(
            "{:<22} {:<21} {:>6} {:>8}  {}",
            meta.key.operation,
            range,
            meta.n_dates,
            meta.n_entities,
            params.join(" ")
        );
    }
    Ok(())
}
