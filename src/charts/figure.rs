use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::Path;
use tracing::info;

/// plotly.js bundle loaded by the written HTML files
pub const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

/// A Plotly figure: traces plus layout, serialized exactly as plotly.js expects
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Figure {
    pub data: Vec<Value>,
    pub layout: Value,
}

impl Figure {
    pub fn new(title: &str) -> Self {
        Self {
            data: Vec::new(),
            layout: json!({
                "title": { "text": title },
                "template": "plotly_white",
            }),
        }
    }

    pub fn title(&self) -> &str {
        self.layout
            .pointer("/title/text")
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    pub fn add_trace(&mut self, trace: Value) -> &mut Self {
        self.data.push(trace);
        self
    }

    /// Shallow-merge keys into the layout
    pub fn update_layout(&mut self, patch: Value) -> &mut Self {
        if let (Value::Object(layout), Value::Object(patch)) = (&mut self.layout, patch) {
            layout.extend(patch);
        }
        self
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("Failed to serialize figure")
    }

    /// Self-contained interactive page for this figure
    pub fn to_html(&self) -> Result<String> {
        // A literal "</script>" inside the JSON would end the script element early
        let figure_json = self.to_json()?.replace("</", "<\\/");
        Ok(format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<script src="{cdn}"></script>
</head>
<body>
<div id="chart" style="width:100%;height:90vh;"></div>
<script>
const figure = {figure};
Plotly.newPlot("chart", figure.data, figure.layout, {{ responsive: true }});
</script>
</body>
</html>
"#,
            title = escape_html(self.title()),
            cdn = PLOTLY_CDN,
            figure = figure_json,
        ))
    }

    pub fn write_html(&self, path: &Path) -> Result<()> {
        let html = self.to_html()?;
        std::fs::write(path, html)
            .with_context(|| format!("Failed to write chart to {}", path.display()))?;
        info!("Chart saved to {}", path.display());
        Ok(())
    }
}

pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
