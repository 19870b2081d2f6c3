//! Retrieval sources and the prioritized fallback chain.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use reqwest::blocking::Client;
use reqwest::header::{CACHE_CONTROL, HeaderValue};
use tracing::{debug, info, warn};

use crate::domain::{SourceFormat, SourceSpec};
use crate::error::AppError;
use crate::io::table::looks_like_json;

/// Payloads shorter than this (after trimming) are rejected as truncated.
pub const MIN_PAYLOAD_LEN: usize = 16;

/// One place a raw payload can be retrieved from.
pub trait Source {
    fn describe(&self) -> String;
    fn fetch(&self) -> Result<String, AppError>;
}

/// Plain HTTP(S) GET with a cache-busting `t=<unix millis>` query parameter.
pub struct HttpSource {
    client: Client,
    url: String,
}

impl HttpSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

impl Source for HttpSource {
    fn describe(&self) -> String {
        self.url.clone()
    }

    fn fetch(&self) -> Result<String, AppError> {
        let stamp = Utc::now().timestamp_millis().to_string();
        let resp = self
            .client
            .get(&self.url)
            .query(&[("t", stamp.as_str())])
            .header(CACHE_CONTROL, HeaderValue::from_static("no-store"))
            .send()
            .map_err(|e| AppError::retrieval(format!("Request to {} failed: {e}", self.url)))?;

        if !resp.status().is_success() {
            return Err(AppError::retrieval(format!(
                "Request to {} failed with status {}.",
                self.url,
                resp.status()
            )));
        }

        resp.text()
            .map_err(|e| AppError::retrieval(format!("Failed to read body from {}: {e}", self.url)))
    }
}

/// A local file, read fresh on every fetch.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Source for FileSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn fetch(&self) -> Result<String, AppError> {
        fs::read_to_string(&self.path).map_err(|e| {
            AppError::retrieval(format!("Failed to read '{}': {e}", self.path.display()))
        })
    }
}

pub fn build_sources(specs: &[SourceSpec], timeout: Duration) -> Result<Vec<Box<dyn Source>>, AppError> {
    specs
        .iter()
        .map(|spec| -> Result<Box<dyn Source>, AppError> {
            Ok(match spec {
                SourceSpec::Http(url) => Box::new(HttpSource::new(url.clone(), timeout)?),
                SourceSpec::File(path) => Box::new(FileSource::new(path.clone())),
            })
        })
        .collect()
}

/// A payload that passed the sanity check, and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched {
    pub body: String,
    pub source: String,
}

/// Reject payloads that are obviously not data: too short, or delimited text
/// without a comma.
pub fn check_payload(body: &str, format: SourceFormat) -> Result<(), AppError> {
    let trimmed = body.trim();
    if trimmed.len() < MIN_PAYLOAD_LEN {
        return Err(AppError::retrieval(format!(
            "Payload too short ({} bytes).",
            trimmed.len()
        )));
    }
    let delimited = match format {
        SourceFormat::Csv => true,
        SourceFormat::Json => false,
        SourceFormat::Auto => !looks_like_json(trimmed),
    };
    if delimited && !trimmed.contains(',') {
        return Err(AppError::retrieval(
            "Payload does not contain the ',' field separator.",
        ));
    }
    Ok(())
}

/// Try `sources` in order; the first usable payload wins.
///
/// Strictly sequential. When every source fails, the error names how many
/// were tried and carries the last underlying failure.
pub fn fetch_first_usable(sources: &[Box<dyn Source>], format: SourceFormat) -> Result<Fetched, AppError> {
    if sources.is_empty() {
        return Err(AppError::config("No data sources configured."));
    }

    let mut last_error: Option<AppError> = None;
    for source in sources {
        let name = source.describe();
        debug!(source = %name, "fetching");
        let attempt = source
            .fetch()
            .and_then(|body| check_payload(&body, format).map(|()| body));
        match attempt {
            Ok(body) => {
                info!(source = %name, bytes = body.len(), "retrieved payload");
                return Ok(Fetched { body, source: name });
            }
            Err(e) => {
                warn!(source = %name, error = %e, "source unusable");
                last_error = Some(e);
            }
        }
    }

    let last = last_error.map(|e| e.to_string()).unwrap_or_default();
    Err(AppError::retrieval(format!(
        "All {} data source(s) failed. Last error: {last}",
        sources.len()
    )))
}
