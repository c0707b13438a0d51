//! Chart generation over the archive.
//!
//! Optionally refreshes a git working copy first, then reads the store and
//! renders every chart that has data, saving them as HTML when asked.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::charts::{self, Figure};
use crate::config::SyncPolicy;
use crate::query::{DateRange, FuturesStore, DEFAULT_HISTORY_DAYS};
use crate::sync;

/// Rolling window for the volatility chart, in observations
pub const VOLATILITY_WINDOW: usize = 30;

pub const INDEX_FILE: &str = "index.html";

#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    pub db_path: PathBuf,
    pub commodity: Option<String>,
    pub days: i64,
    /// Working copy to `git pull` before reading
    pub repo_path: Option<PathBuf>,
    pub sync_policy: SyncPolicy,
    pub save: bool,
    pub output_dir: PathBuf,
    /// Run time: end of the history window and file name suffix
    pub now: NaiveDateTime,
}

impl AnalysisOptions {
    pub fn new(db_path: PathBuf, now: NaiveDateTime) -> Self {
        Self {
            db_path,
            commodity: None,
            days: DEFAULT_HISTORY_DAYS,
            repo_path: None,
            sync_policy: SyncPolicy::default(),
            save: true,
            output_dir: PathBuf::from("charts"),
            now,
        }
    }
}

/// Charts produced by one run, in build order
#[derive(Debug, Default)]
pub struct ChartSet {
    pub figures: Vec<(String, Figure)>,
    /// Files written, index page last
    pub written: Vec<PathBuf>,
}

impl ChartSet {
    pub fn get(&self, name: &str) -> Option<&Figure> {
        self.figures
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, fig)| fig)
    }

    pub fn names(&self) -> Vec<&str> {
        self.figures.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.figures.is_empty()
    }

    fn push(&mut self, name: &str, figure: Option<Figure>) {
        if let Some(figure) = figure {
            self.figures.push((name.to_string(), figure));
        }
    }
}

pub fn run_analysis(options: &AnalysisOptions) -> Result<ChartSet> {
    if let Some(repo) = &options.repo_path {
        sync::sync_working_copy(repo, options.sync_policy)?;
    }

    let store = FuturesStore::open_read_only(&options.db_path)?;
    let commodity = options.commodity.as_deref();

    let records = match commodity {
        Some(c) => store.commodity_history(c, options.days, options.now.date())?,
        None => store.full_extract(DateRange::all())?,
    };
    let latest = store.latest_per_contract()?;
    info!(
        "Analyzing {} historical rows and {} current contracts",
        records.len(),
        latest.len()
    );

    let mut set = ChartSet::default();
    set.push("price_trends", charts::price_trend(&records, commodity));
    set.push("variation_heatmap", charts::variation_heatmap(&latest));
    set.push("volume_analysis", charts::settlement_bar(&latest));
    set.push("dashboard", charts::dashboard(&latest, commodity));
    if commodity.is_some() {
        set.push("yield_curve", charts::yield_curve(&records));
        set.push(
            "volatility",
            charts::volatility_chart(&records, VOLATILITY_WINDOW),
        );
    }

    if set.is_empty() {
        info!("No data to chart");
        return Ok(set);
    }

    if options.save {
        set.written = save_charts(&set.figures, &options.output_dir, options.now)?;
    }
    Ok(set)
}

/// Write each figure as `<name>_<YYYYmmdd_HHMMSS>.html` plus an index page
pub fn save_charts(
    figures: &[(String, Figure)],
    output_dir: &Path,
    now: NaiveDateTime,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory {:?}", output_dir))?;

    let suffix = now.format("%Y%m%d_%H%M%S").to_string();
    let mut written = Vec::with_capacity(figures.len() + 1);
    let mut entries = Vec::with_capacity(figures.len());

    for (name, figure) in figures {
        let file_name = format!("{}_{}.html", name, suffix);
        let path = output_dir.join(&file_name);
        figure.write_html(&path)?;
        entries.push((figure.title().to_string(), file_name));
        written.push(path);
    }

    let index_path = output_dir.join(INDEX_FILE);
    let index = charts::index_html(&entries, &now.format("%Y-%m-%d %H:%M:%S").to_string());
    std::fs::write(&index_path, index)
        .with_context(|| format!("Failed to write {:?}", index_path))?;
    written.push(index_path);

    info!("Saved {} charts to {:?}", figures.len(), output_dir);
    Ok(written)
}
