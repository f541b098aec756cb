mod config;
mod coordinator;
mod crawl;
mod dataset;
mod db;
mod fetch;
mod parser;
mod record;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand};

use config::{CrawlConfig, TABLE_NAME};
use dataset::Dataset;
use fetch::HttpFetcher;

#[derive(Parser)]
#[command(name = "carguide_scraper", about = "Guide Auto vehicle specification crawler")]
struct Cli {
    /// SQLite database file
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl every make and replace the Car_Guide table
    Run(CrawlArgs),
    /// Discover makes and their models only
    Models(CrawlArgs),
    /// Rows whose engine mentions a keyword (default: electric)
    Electric {
        #[arg(long, default_value = "electric")]
        needle: String,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
    /// First rows of one make, one column per line
    Preview {
        #[arg(short, long)]
        make: String,
        #[arg(short = 'n', long, default_value = "5")]
        limit: usize,
    },
    /// Dump the table as JSON lines
    Export {
        /// Output file (default: stdout)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Show table statistics
    Stats,
}

#[derive(Args)]
struct CrawlArgs {
    /// Only crawl these makes (repeatable, case-insensitive)
    #[arg(short, long = "make")]
    makes: Vec<String>,
    /// Skip makes missing from the built-in brand list
    #[arg(long)]
    known_only: bool,
    #[arg(long)]
    base_url: Option<String>,
    /// Oldest model year kept
    #[arg(long)]
    min_year: Option<u16>,
    /// Year page used as the model landing page
    #[arg(long, conflicts_with = "no_landing_year")]
    landing_year: Option<u16>,
    /// Use the model root as the landing page
    #[arg(long)]
    no_landing_year: bool,
    /// Concurrent makes during model discovery
    #[arg(long)]
    discovery_workers: Option<usize>,
    /// Concurrent makes during spec collection
    #[arg(long)]
    collection_workers: Option<usize>,
    #[arg(long)]
    discovery_delay_ms: Option<u64>,
    /// Pause after each trim page
    #[arg(long)]
    trim_delay_ms: Option<u64>,
    #[arg(long)]
    timeout_secs: Option<u64>,
    #[arg(long)]
    user_agent: Option<String>,
}

impl CrawlArgs {
    fn into_config(self, db: Option<PathBuf>) -> CrawlConfig {
        let mut cfg = CrawlConfig::default();
        cfg.makes = self.makes;
        cfg.known_only = self.known_only;
        if let Some(v) = self.base_url {
            cfg.base_url = v;
        }
        if let Some(v) = self.min_year {
            cfg.min_year = v;
        }
        if self.no_landing_year {
            cfg.landing_year = None;
        } else if let Some(v) = self.landing_year {
            cfg.landing_year = Some(v);
        }
        if let Some(v) = self.discovery_workers {
            cfg.discovery_workers = v;
        }
        if let Some(v) = self.collection_workers {
            cfg.collection_workers = v;
        }
        if let Some(v) = self.discovery_delay_ms {
            cfg.discovery_delay = Duration::from_millis(v);
        }
        if let Some(v) = self.trim_delay_ms {
            cfg.trim_delay = Duration::from_millis(v);
        }
        if let Some(v) = self.timeout_secs {
            cfg.request_timeout = Duration::from_secs(v);
        }
        if let Some(v) = self.user_agent {
            cfg.user_agent = v;
        }
        if let Some(v) = db {
            cfg.db_path = v;
        }
        cfg
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(io::stderr)
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let db_path = cli.db.clone().unwrap_or_else(|| PathBuf::from(config::DB_PATH));

    let result = match cli.command {
        Commands::Run(args) => {
            let cfg = Arc::new(args.into_config(cli.db));
            // sink must open before any page is fetched
            let conn = db::connect(&cfg.db_path)?;
            let fetcher = Arc::new(HttpFetcher::new(&cfg)?);

            println!("Crawling {} ...", cfg.make_index_url());
            let by_make = coordinator::crawl(fetcher, Arc::clone(&cfg)).await;
            let per_make: Vec<(String, usize)> =
                by_make.iter().map(|(m, r)| (m.clone(), r.len())).collect();

            let data = dataset::assemble(by_make);
            let written = db::replace_table(&conn, TABLE_NAME, &data)?;
            for (make, n) in &per_make {
                println!("  {:<20} {:>6} rows", make, n);
            }
            println!(
                "Saved {} rows from {} makes to table '{}' at {}",
                written,
                per_make.len(),
                TABLE_NAME,
                cfg.db_path.display()
            );
            Ok(())
        }
        Commands::Models(args) => {
            let cfg = Arc::new(args.into_config(cli.db));
            let fetcher = Arc::new(HttpFetcher::new(&cfg)?);
            let makes = crawl::discover_makes(fetcher.as_ref(), &cfg).await;
            let make_models = coordinator::discover_all_models(fetcher, cfg, makes).await;
            if make_models.is_empty() {
                println!("No models found.");
            } else {
                for (make, models) in &make_models {
                    println!("{} ({}): {}", make, models.len(), models.join(", "));
                }
                let total: usize = make_models.values().map(Vec::len).sum();
                println!("\n{} makes, {} models", make_models.len(), total);
            }
            Ok(())
        }
        Commands::Electric { needle, limit } => {
            let conn = db::open_read_only(&db_path)?;
            let rows = db::fetch_engine_like(&conn, TABLE_NAME, &needle, Some(limit))?;
            if rows.rows.is_empty() {
                println!("No rows with engine matching '{}'.", needle);
            } else {
                print_table(
                    &rows,
                    &["Make", "Model", "Year", "Trim", "Engine", "Range", "Battery", "MSRP"],
                );
            }
            Ok(())
        }
        Commands::Preview { make, limit } => {
            let conn = db::open_read_only(&db_path)?;
            let rows = db::fetch_make(&conn, TABLE_NAME, &make, limit)?;
            if rows.rows.is_empty() {
                println!("No rows for {}.", make);
            } else {
                print_transposed(&rows);
            }
            Ok(())
        }
        Commands::Export { out } => {
            let conn = db::open_read_only(&db_path)?;
            let data = db::fetch_all(&conn, TABLE_NAME)?;
            let n = match &out {
                Some(path) => data.write_json_lines(BufWriter::new(File::create(path)?))?,
                None => data.write_json_lines(io::stdout().lock())?,
            };
            if let Some(path) = out {
                println!("Exported {} rows to {}", n, path.display());
            }
            Ok(())
        }
        Commands::Stats => {
            let conn = db::open_read_only(&db_path)?;
            let s = db::get_stats(&conn, TABLE_NAME)?;
            println!("Rows:     {}", s.rows);
            println!("Makes:    {}", s.makes);
            println!("Models:   {}", s.models);
            println!("Electric: {}", s.electric);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        eprintln!("\nDone in {}", format_duration(elapsed));
    }

    result
}

/// Compact table of selected columns; absent columns are skipped.
fn print_table(data: &Dataset, wanted: &[&str]) {
    let cols: Vec<(usize, &str)> = wanted
        .iter()
        .filter_map(|c| data.column_index(c).map(|i| (i, *c)))
        .collect();

    let header: Vec<String> = cols.iter().map(|(_, c)| format!("{:<18}", c)).collect();
    println!("{}", header.join(" | "));
    println!("{}", "-".repeat(21 * cols.len()));
    for row in &data.rows {
        let line: Vec<String> = cols
            .iter()
            .map(|(i, _)| format!("{:<18}", truncate(&row[*i].to_string(), 18)))
            .collect();
        println!("{}", line.join(" | "));
    }
    println!("\n{} rows", data.rows.len());
}

/// One line per column, one field per row.
fn print_transposed(data: &Dataset) {
    let width = data.columns.iter().map(|c| c.len()).max().unwrap_or(0);
    let mut out = io::stdout().lock();
    for (i, col) in data.columns.iter().enumerate() {
        let cells: Vec<String> = data
            .rows
            .iter()
            .map(|r| format!("{:<24}", truncate(&r[i].to_string(), 24)))
            .collect();
        let _ = writeln!(out, "{:<width$}  {}", col, cells.join(" "), width = width);
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
