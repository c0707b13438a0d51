// Web scraping for the B3 settlement price page.
// Fetching lives here; the markup-specific parsing seam is `b3_settlements`.

pub mod b3_settlements;

pub use b3_settlements::parse_settlement_page;

use anyhow::{Context, Result};
use encoding_rs::{Encoding, UTF_8};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::FuturesError;

static META_CHARSET: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#"(?i)<meta[^>]+charset\s*=\s*["']?([A-Za-z0-9_\-]+)"#).ok());

/// HTTP fetcher for the settlement page. One request per run, no retries.
pub struct SettlementFetcher {
    client: Client,
    url: String,
}

impl SettlementFetcher {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            url: config.source_url.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// GET the page and decode it to text
    pub async fn fetch_page(&self) -> Result<String> {
        info!("Fetching settlement prices from {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| FuturesError::Fetch(format!("request to {} failed: {}", self.url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(
                FuturesError::Fetch(format!("{} returned HTTP {}", self.url, status)).into(),
            );
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FuturesError::Fetch(format!("reading body of {} failed: {}", self.url, e)))?;

        debug!("Received {} bytes ({:?})", bytes.len(), content_type);
        Ok(decode_body(&bytes, content_type.as_deref()))
    }
}

/// Decode a response body using the header charset, then a `<meta>` charset,
/// then UTF-8.
pub fn decode_body(bytes: &[u8], content_type: Option<&str>) -> String {
    let encoding = content_type
        .and_then(charset_from_content_type)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .or_else(|| sniff_meta_charset(bytes))
        .unwrap_or(UTF_8);

    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        debug!("Body had invalid {} sequences; replaced", used.name());
    }
    text.into_owned()
}

fn charset_from_content_type(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"').to_string())
    })
}

fn sniff_meta_charset(bytes: &[u8]) -> Option<&'static Encoding> {
    let head = &bytes[..bytes.len().min(2048)];
    let head = String::from_utf8_lossy(head);
    let re = META_CHARSET.as_ref()?;
    let label = re.captures(&head)?.get(1)?.as_str().to_string();
    Encoding::for_label(label.as_bytes())
}

/// Serve one canned HTTP response on a local port and return its URL
#[cfg(test)]
pub(crate) async fn serve_once(response: &'static str) -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });
    format!("http://{}/ajustes", addr)
}
