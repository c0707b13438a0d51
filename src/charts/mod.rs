//! Chart builders over settlement records.
//!
//! Each builder only groups or pivots its input; none of them query the
//! store. A builder returns `None` when its input has nothing to plot.

pub mod figure;

pub use figure::Figure;

use chrono::NaiveDate;
use itertools::Itertools;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};

use crate::analytics::{self, days_to_maturity, maturity_sort_key};
use crate::db::SettlementRecord;
use crate::utils::published_number_f64;

const RED_YELLOW_GREEN: &str = "RdYlGn";
const DASHBOARD_TOP_N: usize = 10;
const YIELD_CURVE_DATES: usize = 5;
const VOLATILITY_CONTRACTS: usize = 5;

fn matches_commodity(record: &SettlementRecord, filter: &str) -> bool {
    record
        .commodity
        .to_uppercase()
        .contains(&filter.to_uppercase())
}

/// Line chart of current prices over scrape time.
///
/// A commodity filter that matches a single commodity gives one series per
/// contract month. Otherwise there is one series per commodity and contract
/// month, since a substring filter can match several commodities.
pub fn price_trend(records: &[SettlementRecord], commodity: Option<&str>) -> Option<Figure> {
    let points: Vec<(&SettlementRecord, f64)> = records
        .iter()
        .filter(|r| commodity.map_or(true, |c| matches_commodity(r, c)))
        .filter_map(|r| Some((r, published_number_f64(&r.current_price)?)))
        .collect();
    let single_commodity =
        commodity.is_some() && points.iter().map(|(r, _)| &r.commodity).all_equal();

    let mut series: BTreeMap<String, Vec<(String, f64)>> = BTreeMap::new();
    for (record, price) in points {
        let key = if single_commodity {
            record.contract_month.clone()
        } else {
            record.contract_label()
        };
        let x = format!("{} {}", record.download_date, record.download_time);
        series.entry(key).or_default().push((x, price));
    }
    if series.is_empty() {
        return None;
    }

    let title = match commodity {
        Some(c) => format!("Price Trends - {}", c),
        None => "Price Trends".to_string(),
    };
    let mut fig = Figure::new(&title);

    let ordered = series.into_iter().sorted_by_key(|(key, _)| {
        let month = key.rsplit(' ').next().unwrap_or(key.as_str());
        (maturity_sort_key(month), key.clone())
    });
    for (name, mut points) in ordered {
        points.sort_by(|a, b| a.0.cmp(&b.0));
        let (x, y): (Vec<String>, Vec<f64>) = points.into_iter().unzip();
        fig.add_trace(json!({
            "type": "scatter",
            "mode": "lines+markers",
            "name": name,
            "x": x,
            "y": y,
            "hovertemplate": "<b>%{fullData.name}</b><br>Price: %{y:,.2f} BRL<br>Date: %{x}<extra></extra>",
        }));
    }

    fig.update_layout(json!({
        "xaxis": { "title": { "text": "Date" }, "type": "date" },
        "yaxis": { "title": { "text": "Price (BRL)" } },
        "hovermode": "x unified",
    }));
    Some(fig)
}

/// Commodity × contract month heatmap of the published daily variation
pub fn variation_heatmap(records: &[SettlementRecord]) -> Option<Figure> {
    if records.is_empty() {
        return None;
    }

    let commodities: Vec<String> = records
        .iter()
        .map(|r| r.commodity.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let months: Vec<String> = records
        .iter()
        .map(|r| r.contract_month.clone())
        .unique()
        .sorted_by_key(|m| maturity_sort_key(m))
        .collect();

    let mut cells: BTreeMap<(&str, &str), f64> = BTreeMap::new();
    for record in records {
        if let Some(v) = published_number_f64(&record.variation) {
            cells.insert((record.commodity.as_str(), record.contract_month.as_str()), v);
        }
    }
    if cells.is_empty() {
        return None;
    }

    let z: Vec<Vec<Option<f64>>> = commodities
        .iter()
        .map(|c| {
            months
                .iter()
                .map(|m| cells.get(&(c.as_str(), m.as_str())).copied())
                .collect()
        })
        .collect();

    let mut fig = Figure::new("Daily Variation Heatmap");
    fig.add_trace(json!({
        "type": "heatmap",
        "z": z,
        "x": months,
        "y": commodities,
        "colorscale": RED_YELLOW_GREEN,
        "zmid": 0,
        "hovertemplate": "<b>%{y}</b><br>Contract: %{x}<br>Variation: %{z:,.2f}<extra></extra>",
    }));
    fig.update_layout(json!({
        "xaxis": { "title": { "text": "Contract Month" } },
        "yaxis": { "title": { "text": "Commodity" } },
    }));
    Some(fig)
}

/// Summed settlement value per commodity, ascending
pub fn settlement_totals(records: &[SettlementRecord]) -> Vec<(String, f64)> {
    let mut totals: BTreeMap<String, f64> = BTreeMap::new();
    for record in records {
        if let Some(v) = published_number_f64(&record.settlement_value) {
            *totals.entry(record.commodity.clone()).or_default() += v;
        }
    }
    totals
        .into_iter()
        .sorted_by(|a, b| a.1.total_cmp(&b.1))
        .collect()
}

/// Horizontal bar chart of settlement value per commodity
pub fn settlement_bar(records: &[SettlementRecord]) -> Option<Figure> {
    let totals = settlement_totals(records);
    if totals.is_empty() {
        return None;
    }
    let height = (totals.len() * 30).max(400);
    let (names, values): (Vec<String>, Vec<f64>) = totals.into_iter().unzip();

    let mut fig = Figure::new("Settlement Values by Commodity (Latest Data)");
    fig.add_trace(json!({
        "type": "bar",
        "orientation": "h",
        "x": values,
        "y": names,
        "hovertemplate": "<b>%{y}</b><br>Settlement: %{x:,.2f} BRL<extra></extra>",
    }));
    fig.update_layout(json!({
        "height": height,
        "xaxis": { "title": { "text": "Settlement Value (BRL)" } },
        "yaxis": { "title": { "text": "Commodity" }, "tickfont": { "size": 10 } },
    }));
    Some(fig)
}

/// Four-panel overview of the latest snapshot
pub fn dashboard(latest: &[SettlementRecord], commodity: Option<&str>) -> Option<Figure> {
    if latest.is_empty() {
        return None;
    }

    let focus: Vec<&SettlementRecord> = match commodity {
        Some(c) => latest.iter().filter(|r| matches_commodity(r, c)).collect(),
        None => latest.iter().take(DASHBOARD_TOP_N).collect(),
    };

    let title = match commodity {
        Some(c) => format!("Futures Analysis Dashboard - {}", c),
        None => "Futures Analysis Dashboard".to_string(),
    };
    let mut fig = Figure::new(&title);

    // 1. Current prices by contract month, coloured by variation
    let prices: Vec<Option<f64>> = focus
        .iter()
        .map(|r| published_number_f64(&r.current_price))
        .collect();
    let colors: Vec<f64> = focus
        .iter()
        .map(|r| published_number_f64(&r.variation).unwrap_or(0.0))
        .collect();
    fig.add_trace(json!({
        "type": "scatter",
        "mode": "markers",
        "name": "Current Prices",
        "x": focus.iter().map(|r| r.contract_month.as_str()).collect::<Vec<_>>(),
        "y": prices,
        "text": focus.iter().map(|r| r.commodity.as_str()).collect::<Vec<_>>(),
        "marker": { "size": 8, "color": colors, "colorscale": RED_YELLOW_GREEN },
        "xaxis": "x",
        "yaxis": "y",
    }));

    // 2. Average variation per commodity
    let mut variations: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for record in latest {
        if let Some(v) = published_number_f64(&record.variation) {
            let entry = variations.entry(record.commodity.as_str()).or_default();
            entry.0 += v;
            entry.1 += 1;
        }
    }
    let averages: Vec<(&str, f64)> = variations
        .into_iter()
        .take(DASHBOARD_TOP_N)
        .map(|(c, (sum, n))| (c, sum / n as f64))
        .collect();
    fig.add_trace(json!({
        "type": "bar",
        "name": "Avg Variation",
        "x": averages.iter().map(|(c, _)| *c).collect::<Vec<_>>(),
        "y": averages.iter().map(|(_, v)| *v).collect::<Vec<_>>(),
        "marker": {
            "color": averages.iter().map(|(_, v)| *v).collect::<Vec<_>>(),
            "colorscale": RED_YELLOW_GREEN,
        },
        "xaxis": "x2",
        "yaxis": "y2",
    }));

    // 3. Settlement values
    let totals: Vec<(String, f64)> = settlement_totals(latest)
        .into_iter()
        .rev()
        .take(DASHBOARD_TOP_N)
        .collect();
    fig.add_trace(json!({
        "type": "bar",
        "name": "Settlement Values",
        "x": totals.iter().map(|(c, _)| c.as_str()).collect::<Vec<_>>(),
        "y": totals.iter().map(|(_, v)| *v).collect::<Vec<_>>(),
        "xaxis": "x3",
        "yaxis": "y3",
    }));

    // 4. Price distribution
    let all_prices: Vec<f64> = latest
        .iter()
        .filter_map(|r| published_number_f64(&r.current_price))
        .collect();
    fig.add_trace(json!({
        "type": "histogram",
        "name": "Price Distribution",
        "x": all_prices,
        "nbinsx": 20,
        "xaxis": "x4",
        "yaxis": "y4",
    }));

    let panel_titles = [
        ("x", "y", "Price Trends"),
        ("x2", "y2", "Daily Variations"),
        ("x3", "y3", "Settlement Values"),
        ("x4", "y4", "Price Distribution"),
    ];
    let annotations: Vec<Value> = panel_titles
        .iter()
        .map(|(x, y, text)| {
            json!({
                "text": text,
                "showarrow": false,
                "xref": format!("{} domain", x),
                "yref": format!("{} domain", y),
                "x": 0.5,
                "y": 1.12,
                "font": { "size": 14 },
            })
        })
        .collect();

    fig.update_layout(json!({
        "grid": { "rows": 2, "columns": 2, "pattern": "independent" },
        "height": 800,
        "showlegend": false,
        "annotations": annotations,
    }));
    Some(fig)
}

/// Price against days to maturity for up to five evenly spaced scrape dates
pub fn yield_curve(records: &[SettlementRecord]) -> Option<Figure> {
    let dates: Vec<NaiveDate> = records
        .iter()
        .filter_map(SettlementRecord::date)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if dates.is_empty() {
        return None;
    }

    let selected: Vec<NaiveDate> = if dates.len() > YIELD_CURVE_DATES {
        let last = (dates.len() - 1) as f64;
        (0..YIELD_CURVE_DATES)
            .map(|i| dates[(i as f64 * last / (YIELD_CURVE_DATES - 1) as f64).round() as usize])
            .dedup()
            .collect()
    } else {
        dates
    };

    let mut fig = Figure::new("Yield Curves Over Time");
    for date in selected {
        // Last run of the day per contract
        let mut per_contract: BTreeMap<String, &SettlementRecord> = BTreeMap::new();
        for record in records.iter().filter(|r| r.date() == Some(date)) {
            let key = record.contract_label();
            let newer = per_contract
                .get(&key)
                .map_or(true, |seen| record.download_time >= seen.download_time);
            if newer {
                per_contract.insert(key, record);
            }
        }

        let points: Vec<(i64, f64)> = per_contract
            .values()
            .filter_map(|r| {
                Some((
                    days_to_maturity(&r.contract_month, date)?,
                    published_number_f64(&r.current_price)?,
                ))
            })
            .sorted_by_key(|(days, _)| *days)
            .collect();
        if points.is_empty() {
            continue;
        }
        let (x, y): (Vec<i64>, Vec<f64>) = points.into_iter().unzip();
        fig.add_trace(json!({
            "type": "scatter",
            "mode": "lines+markers",
            "name": date.format("%Y-%m-%d").to_string(),
            "x": x,
            "y": y,
        }));
    }
    if fig.data.is_empty() {
        return None;
    }

    fig.update_layout(json!({
        "xaxis": { "title": { "text": "Days to Maturity" } },
        "yaxis": { "title": { "text": "Price" } },
        "legend": { "title": { "text": "Date" } },
    }));
    Some(fig)
}

/// Rolling annualized volatility for the most observed contracts
pub fn volatility_chart(records: &[SettlementRecord], window: usize) -> Option<Figure> {
    let series = analytics::daily_price_series(records);
    let top = series
        .into_iter()
        .sorted_by(|a, b| b.1.len().cmp(&a.1.len()).then_with(|| a.0.cmp(&b.0)))
        .take(VOLATILITY_CONTRACTS);

    let mut fig = Figure::new(&format!("{}-Day Historical Volatility", window));
    for (label, points) in top {
        let prices: Vec<f64> = points.iter().map(|(_, p)| *p).collect();
        let vol = analytics::historical_volatility(&prices, window);
        if vol.iter().all(Option::is_none) {
            continue;
        }
        fig.add_trace(json!({
            "type": "scatter",
            "mode": "lines",
            "name": label,
            "x": points.iter().map(|(d, _)| d.format("%Y-%m-%d").to_string()).collect::<Vec<_>>(),
            "y": vol,
        }));
    }
    if fig.data.is_empty() {
        return None;
    }

    fig.update_layout(json!({
        "xaxis": { "title": { "text": "Date" }, "type": "date" },
        "yaxis": { "title": { "text": "Annualized Volatility" } },
    }));
    Some(fig)
}

/// Landing page linking every chart written in one analysis run
pub fn index_html(entries: &[(String, String)], generated_at: &str) -> String {
    let items: String = entries
        .iter()
        .map(|(title, file)| {
            format!(
                "    <li><a href=\"{}\">{}</a></li>\n",
                figure::escape_html(file),
                figure::escape_html(title)
            )
        })
        .collect();
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>B3 Futures Charts</title>
</head>
<body>
<h1>B3 Futures Charts</h1>
<p>Generated {generated}</p>
<ul>
{items}</ul>
</body>
</html>
"#,
        generated = figure::escape_html(generated_at),
        items = items,
    )
}
