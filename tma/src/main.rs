//! TMA command line: stock pools, indicators, screens and monitors.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tma::collector::{Collector, EastmoneyCollector, KlineFreq, SnapshotFilters};
use tma::indicator::{IndicatorReport, ShareDayIndicator, ShareTarget};
use tma::monitor::{self, LimitBoardMonitor, LimitKind, LimitOutcome, LoopSettings, PoolMonitor};
use tma::notification::{Notifier, ServerChanClient};
use tma::pool::{StockPool, StockPoolEntry};
use tma::selector::{add_to_pool, screen_by_pb, MaRule, MaShareScreen, PbRange, ScreenResult};
use tma_common::config::Config;
use tma_common::logging::init_logging;
use tma_common::util::{format_percent, parse_duration_secs, truncate_with_ellipsis};

/// `tma` - Tools for Market A
#[derive(Parser, Debug)]
#[command(name = "tma")]
#[command(version, about = "Tiered stock pools, indicators and alerts for A-shares")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage a tiered stock pool
    Pool {
        /// Pool name (files are `{name}_pool.json` and `{name}_pool_hist.jsonl`)
        #[arg(long, default_value = "default")]
        name: String,

        #[command(subcommand)]
        pool_command: PoolCommands,
    },

    /// Compute indicators for one share
    Share {
        /// Ticker code (e.g., 600000)
        code: String,

        /// Comma-separated targets: basic, ma, lnd, bs, bsf
        #[arg(long, value_delimiter = ',', default_value = "basic,ma,lnd,bs,bsf")]
        targets: Vec<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Print K-lines for one share
    Kline {
        /// Ticker code
        code: String,

        /// Period: D, W, M, 5, 15, 30, 60
        #[arg(long, default_value = "D", value_parser = parse_freq)]
        freq: KlineFreq,

        /// First date (YYYY-MM-DD)
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Only print the most recent bars
        #[arg(long, default_value = "20")]
        tail: usize,
    },

    /// Report today's market status
    Market {
        /// Push the report through ServerChan
        #[arg(long)]
        push: bool,
    },

    /// Screen shares, optionally adding hits to a pool tier
    Screen {
        #[command(subcommand)]
        screen_command: ScreenCommands,
    },

    /// Run a polling monitor
    Monitor {
        #[command(subcommand)]
        monitor_command: MonitorCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ScreenCommands {
    /// Moving-average rules SS01..SS03
    Ma {
        /// Ticker codes; defaults to every traded share
        codes: Vec<String>,

        /// Comma-separated rules (SS01, SS02, SS03); defaults to all
        #[arg(long, value_delimiter = ',')]
        rules: Vec<String>,

        #[command(flatten)]
        feed: PoolFeed,
    },

    /// Price-to-book band, halted and ST shares excluded
    Pb {
        /// Lower PB bound (exclusive)
        #[arg(long, default_value = "0")]
        min: f64,

        /// Upper PB bound (exclusive)
        #[arg(long, default_value = "0.8")]
        max: f64,

        #[command(flatten)]
        feed: PoolFeed,
    },
}

impl ScreenCommands {
    fn feed(&self) -> &PoolFeed {
        match self {
            Self::Ma { feed, .. } | Self::Pb { feed, .. } => feed,
        }
    }
}

/// Where screen hits go
#[derive(Args, Debug, Clone)]
struct PoolFeed {
    /// Add hits to this pool
    #[arg(long)]
    pool: Option<String>,

    /// Tier for added hits (1, 2, 3)
    #[arg(long, default_value = "3")]
    level: i64,
}

#[derive(Subcommand, Debug)]
enum PoolCommands {
    /// Add codes to a tier
    Add {
        /// Ticker codes
        #[arg(required = true)]
        codes: Vec<String>,

        /// Tier (1, 2, 3)
        #[arg(long, default_value = "1")]
        level: i64,

        /// Selection reason
        #[arg(long, default_value = "manual")]
        reason: String,

        /// Entry time; defaults to now
        #[arg(long)]
        dt: Option<String>,
    },

    /// Remove a code from a tier, archiving it to history
    Remove {
        code: String,

        #[arg(long, default_value = "1")]
        level: i64,
    },

    /// Show the entries of a code in a tier
    Check {
        code: String,

        #[arg(long, default_value = "1")]
        level: i64,
    },

    /// List pool entries
    Show {
        /// Only this tier
        #[arg(long)]
        level: Option<i64>,
    },

    /// List archived entries
    History,

    /// Archive every entry and clear all tiers
    Empty {
        /// Keep the on-disk snapshot unchanged
        #[arg(long)]
        keep_snapshot: bool,
    },

    /// Share of a tier trading above yesterday's close
    Perf {
        #[arg(long, default_value = "1")]
        level: i64,
    },
}

#[derive(Subcommand, Debug)]
enum MonitorCommands {
    /// Alert when a limit board's queue thins out
    Limit {
        /// Ticker code
        code: String,

        /// Board kind: zt (limit-up) or dt (limit-down)
        kind: String,

        /// Alert threshold in 10k CNY
        #[arg(long)]
        threshold: Option<f64>,

        /// Time between polls ("1", "30s", "5m")
        #[arg(long, value_parser = parse_duration_secs)]
        interval: Option<u64>,
    },

    /// Log a tier's performance periodically
    Pool {
        #[arg(long, default_value = "default")]
        name: String,

        #[arg(long, default_value = "1")]
        level: i64,

        /// Time between polls ("1", "30s", "5m")
        #[arg(long, value_parser = parse_duration_secs)]
        interval: Option<u64>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load_with_env()?;

    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    );

    tracing::info!("TMA v{}", env!("CARGO_PKG_VERSION"));

    let collector = EastmoneyCollector::from_config(&config.collector);

    match cli.command {
        Commands::Pool { name, pool_command } => {
            let mut pool = StockPool::open(&name, &config)?;
            handle_pool(&mut pool, pool_command, &collector).await
        }
        Commands::Share {
            code,
            targets,
            json,
        } => {
            let targets = targets
                .iter()
                .map(|t| ShareTarget::parse(t))
                .collect::<tma_common::Result<Vec<_>>>()?;

            let indicator = ShareDayIndicator::new(&code, &config.indicator);
            let report = indicator.collect(&collector, &targets).await?;
            print_report(&report, json)
        }
        Commands::Kline {
            code,
            freq,
            start,
            tail,
        } => {
            let klines = collector.get_klines(&code, freq, start).await?;
            for k in &klines[klines.len().saturating_sub(tail)..] {
                println!(
                    "{}\t{:.2}\t{:.2}\t{:.2}\t{:.2}\t{:.0}",
                    k.date, k.open, k.high, k.low, k.close, k.volume
                );
            }
            Ok(())
        }
        Commands::Market { push } => {
            let (markdown, report) =
                monitor::market_status(&collector, &config.indicator).await?;
            println!("{}", markdown);
            print_failures(&report);

            if push {
                let notifier = ServerChanClient::new(&config.notification);
                notifier.push("实时市场状态", &markdown).await?;
            }
            Ok(())
        }
        Commands::Screen { screen_command } => {
            let feed = screen_command.feed().clone();
            let mut target = match &feed.pool {
                Some(name) => Some((StockPool::open(name, &config)?, tier(feed.level)?)),
                None => None,
            };

            let result = match screen_command {
                ScreenCommands::Ma { codes, rules, .. } => {
                    let rules = rules
                        .iter()
                        .map(|r| MaRule::parse(r))
                        .collect::<tma_common::Result<Vec<_>>>()?;
                    let codes = if codes.is_empty() {
                        collector
                            .get_market_snapshot(&SnapshotFilters::default())
                            .await?
                            .into_iter()
                            .map(|row| row.code)
                            .collect()
                    } else {
                        codes
                    };

                    MaShareScreen::new(&config.indicator, &rules)
                        .run(&collector, &codes)
                        .await?
                }
                ScreenCommands::Pb { min, max, .. } => {
                    screen_by_pb(&collector, PbRange::new(min, max)?).await?
                }
            };
            print_screen(&result);

            if let Some((pool, level)) = target.as_mut() {
                let added = add_to_pool(pool, &result.hits, *level)?;
                println!("Added {} entr(ies) to {}", added, pool.path().display());
            }
            Ok(())
        }
        Commands::Monitor { monitor_command } => match monitor_command {
            MonitorCommands::Limit {
                code,
                kind,
                threshold,
                interval,
            } => {
                let kind = LimitKind::parse(&kind)?;
                let settings =
                    LoopSettings::every(interval.unwrap_or(config.monitor.limit_interval_secs));
                let threshold = threshold.unwrap_or(config.monitor.limit_threshold_wan);
                let notifier = ServerChanClient::new(&config.notification);
                if !notifier.is_enabled() {
                    anyhow::bail!(
                        "ServerChan key not configured: set notification.sckey or TMA_SCKEY"
                    );
                }

                let monitor = LimitBoardMonitor::new(&code, kind, threshold, settings);
                match monitor.run(&collector, &notifier).await? {
                    LimitOutcome::Alerted { amount } => {
                        println!("{} alerted at {:.0} CNY", code, amount)
                    }
                    LimitOutcome::Finished => println!("{} watch finished", code),
                }
                Ok(())
            }
            MonitorCommands::Pool {
                name,
                level,
                interval,
            } => {
                let pool = StockPool::open(&name, &config)?;
                let level = tier(level)?;
                let settings =
                    LoopSettings::every(interval.unwrap_or(config.monitor.pool_interval_secs));

                let readings = PoolMonitor::new(level, settings)?
                    .run(&pool, &collector)
                    .await?;
                println!("{} readings collected", readings.len());
                Ok(())
            }
        },
    }
}

async fn handle_pool(
    pool: &mut StockPool,
    command: PoolCommands,
    collector: &EastmoneyCollector,
) -> Result<()> {
    match command {
        PoolCommands::Add {
            codes,
            level,
            reason,
            dt,
        } => {
            pool.add_many(&codes, &reason, tier(level)?, dt.as_deref())?;
            println!("Added {} code(s) to {}", codes.len(), pool.path().display());
        }
        PoolCommands::Remove { code, level } => {
            let removed = pool.remove(&code, tier(level)?)?;
            println!("Removed {} entr(ies) of {}", removed, code);
        }
        PoolCommands::Check { code, level } => {
            let entries = pool.check(&code, tier(level)?)?;
            if entries.is_empty() {
                println!("{} not in level {}", code, level);
            }
            print_entries(&entries);
        }
        PoolCommands::Show { level } => match level {
            Some(level) => print_entries(pool.entries(tier(level)?)?),
            None => {
                let all: Vec<StockPoolEntry> = pool.tiers().iter().cloned().collect();
                print_entries(&all);
            }
        },
        PoolCommands::History => {
            print_entries(&pool.restore_history()?);
        }
        PoolCommands::Empty { keep_snapshot } => {
            pool.empty(!keep_snapshot)?;
            println!("Archived to {}", pool.history_path().display());
        }
        PoolCommands::Perf { level } => {
            let perf = pool.check_performance(tier(level)?, collector).await?;
            println!(
                "up {} / down {} / total {} (up rate {})",
                perf.up_nums,
                perf.down_nums,
                perf.total_nums,
                format_percent(perf.up_rate)
            );
        }
    }
    Ok(())
}

fn parse_freq(s: &str) -> std::result::Result<KlineFreq, String> {
    KlineFreq::parse(s).ok_or_else(|| format!("Unknown period '{}'", s))
}

/// Validate a tier number from the command line
fn tier(level: i64) -> Result<u8> {
    let level = tma::pool::PoolLevel::try_from(level)?;
    Ok(level.as_u8())
}

fn print_entries(entries: &[StockPoolEntry]) {
    for entry in entries {
        println!(
            "{}\tL{}\t{}\t{}",
            entry.code,
            entry.level,
            entry.added_at,
            truncate_with_ellipsis(&entry.reason, 40)
        );
    }
}

fn print_screen(result: &ScreenResult) {
    for hit in &result.hits {
        println!(
            "{}\t{}\t{}\t{:.2}\t{}",
            hit.rule,
            hit.code,
            hit.name,
            hit.price,
            truncate_with_ellipsis(&hit.reason, 40)
        );
    }
    for failure in &result.failures {
        eprintln!("skipped {}: {}", failure.scope, failure.error);
    }
    println!("{}", result.summary());
}

fn print_report(report: &IndicatorReport, json: bool) -> Result<()> {
    if json {
        let text = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
        println!("{}", text);
    } else {
        print!("{}", report.indicators.render_table());
        print_failures(report);
    }
    Ok(())
}

fn print_failures(report: &IndicatorReport) {
    for failure in &report.failures {
        eprintln!("skipped {}: {}", failure.scope, failure.error);
    }
}
