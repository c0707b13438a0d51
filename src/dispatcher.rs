//! Routes parsed CLI commands to the collector, query layer and analysis.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, NaiveDateTime};
use std::path::Path;
use tracing::info;

use crate::analysis::{self, AnalysisOptions};
use crate::cli::formatters;
use crate::cli::{Cli, Commands};
use crate::collector::{self, CollectionReport};
use crate::config::Config;
use crate::db::{models::DATE_FORMAT, ScrapeStamp, SettlementRecord};
use crate::error::FuturesError;
use crate::query::{DateRange, FuturesStore};

/// Run one CLI invocation to completion
pub async fn dispatch(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    let db_path = config.resolve_db_path(cli.db.as_deref())?;
    let now = Local::now().naive_local();
    let json = cli.json;

    match cli.command {
        Commands::Collect { html_file, dry_run } => {
            dispatch_collect(&config, &db_path, html_file.as_deref(), dry_run, now, json).await
        }
        Commands::Latest { per_contract } => {
            let store = FuturesStore::open_read_only(&db_path)?;
            let records = if per_contract {
                store.latest_per_contract()?
            } else {
                store.latest_snapshot()?
            };
            print_records(&records, json);
            Ok(())
        }
        Commands::History { commodity, days } => {
            let store = FuturesStore::open_read_only(&db_path)?;
            let records = store.commodity_history(&commodity, days, now.date())?;
            info!(
                "{} rows for '{}' over the last {} days",
                records.len(),
                commodity,
                days
            );
            print_records(&records, json);
            Ok(())
        }
        Commands::Extract { from, to, csv } => {
            let range = DateRange {
                from: from.as_deref().map(parse_date).transpose()?,
                to: to.as_deref().map(parse_date).transpose()?,
            };
            let store = FuturesStore::open_read_only(&db_path)?;
            let records = store.full_extract(range)?;
            match csv {
                Some(path) => {
                    formatters::export_records_csv(&path, &records)?;
                    info!("Wrote {} rows to {:?}", records.len(), path);
                    if json {
                        println!(
                            "{}",
                            formatters::format_json(&serde_json::json!({
                                "rows": records.len(),
                                "path": path,
                            }))
                        );
                    } else {
                        println!("Wrote {} rows to {}", records.len(), path.display());
                    }
                }
                None => print_records(&records, json),
            }
            Ok(())
        }
        Commands::Query { sql } => {
            let store = FuturesStore::open_read_only(&db_path)?;
            let result = store.arbitrary(&sql)?;
            if json {
                println!("{}", formatters::format_json(&result));
            } else {
                println!("{}", formatters::format_query_table(&result));
                println!("({} rows)", result.len());
            }
            Ok(())
        }
        Commands::Commodities => {
            let store = FuturesStore::open_read_only(&db_path)?;
            let items = store.commodities()?;
            if json {
                println!("{}", formatters::format_json(&items));
            } else if items.is_empty() {
                println!("{}", formatters::format_empty("commodities"));
            } else {
                println!("{}", formatters::format_commodities_table(&items));
            }
            Ok(())
        }
        Commands::Batches => {
            let store = FuturesStore::open_read_only(&db_path)?;
            let items = store.batches()?;
            if json {
                println!("{}", formatters::format_json(&items));
            } else if items.is_empty() {
                println!("{}", formatters::format_empty("batches"));
            } else {
                println!("{}", formatters::format_batches_table(&items));
            }
            Ok(())
        }
        Commands::Analyze {
            commodity,
            days,
            repo,
            no_save,
            output_dir,
        } => {
            let options = AnalysisOptions {
                db_path,
                commodity,
                days,
                repo_path: repo.or_else(|| config.sync.repo_path.clone()),
                sync_policy: config.sync.on_failure,
                save: !no_save,
                output_dir: output_dir.unwrap_or_else(|| config.output_dir.clone()),
                now,
            };
            let set = analysis::run_analysis(&options)?;
            if json {
                let figures: serde_json::Map<String, serde_json::Value> = set
                    .figures
                    .iter()
                    .map(|(name, fig)| Ok((name.clone(), serde_json::to_value(fig)?)))
                    .collect::<Result<_, serde_json::Error>>()
                    .context("Failed to serialize charts")?;
                println!(
                    "{}",
                    formatters::format_json(&serde_json::json!({
                        "charts": figures,
                        "written": set.written,
                    }))
                );
            } else {
                println!("{}", formatters::format_chart_set(&set));
            }
            Ok(())
        }
    }
}

async fn dispatch_collect(
    config: &Config,
    db_path: &Path,
    html_file: Option<&Path>,
    dry_run: bool,
    now: NaiveDateTime,
    json: bool,
) -> Result<()> {
    let stamp = ScrapeStamp::from_datetime(now);

    let report: CollectionReport = match (html_file, dry_run) {
        (Some(file), true) => collector::preview_html(&read_page(file)?, &stamp)?.1,
        (Some(file), false) => collector::collect_html_into(&read_page(file)?, db_path, &stamp)?,
        (None, true) => collector::preview(config, now).await?.1,
        (None, false) => collector::collect(config, db_path, now).await?,
    };

    if json {
        println!("{}", formatters::format_json(&report));
    } else {
        print!("{}", formatters::format_collection_report(&report));
    }
    Ok(())
}

/// Saved copies of the page may be in any charset
fn read_page(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read HTML file {}", path.display()))?;
    Ok(crate::scraping::decode_body(&bytes, None))
}

fn parse_date(text: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(text, DATE_FORMAT).map_err(|e| {
        FuturesError::Query(format!("invalid date '{}' (expected YYYY-MM-DD): {}", text, e)).into()
    })
}

fn print_records(records: &[SettlementRecord], json: bool) {
    if json {
        println!("{}", formatters::format_json(records));
    } else if records.is_empty() {
        println!("{}", formatters::format_empty("settlement rows"));
    } else {
        println!("{}", formatters::format_records_table(records));
        println!("({} rows)", records.len());
    }
}
