//! Time-to-live cache over retrieval + ingestion.
//!
//! A *generation* is one successful fetch+parse. Within a generation every
//! `load` reuses the parsed catalog and only re-derives the range view.
//! A generation ends when its TTL elapses or on `invalidate()`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::data::source::{Source, fetch_first_usable};
use crate::domain::{Dataset, RangeWindow, ResolverKind, SeriesCatalog, SourceFormat};
use crate::error::AppError;
use crate::io::ingest::ingest_payload;
use crate::meta::ExplicitMapping;

/// How a retrieved payload is turned into a catalog.
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    pub format: SourceFormat,
    pub resolver: ResolverKind,
    pub mapping: ExplicitMapping,
}

pub struct FetchCache {
    sources: Vec<Box<dyn Source>>,
    options: IngestOptions,
    ttl: Duration,
    raw: Option<String>,
    fetched_at: Option<Instant>,
    parsed: Option<Arc<SeriesCatalog>>,
    generation: u64,
}

impl FetchCache {
    pub fn new(sources: Vec<Box<dyn Source>>, options: IngestOptions, ttl: Duration) -> Self {
        Self {
            sources,
            options,
            ttl,
            raw: None,
            fetched_at: None,
            parsed: None,
            generation: 0,
        }
    }

    /// Catalog filtered to `range` as of `today`.
    pub fn load(&mut self, range: RangeWindow, today: NaiveDate) -> Result<Dataset, AppError> {
        let catalog = self.catalog()?;
        Ok(Dataset::new(catalog, range, today))
    }

    /// The current generation's catalog, fetching and parsing if needed.
    ///
    /// On failure the cache is left empty: a failed refresh never falls back
    /// to the previous generation's data.
    pub fn catalog(&mut self) -> Result<Arc<SeriesCatalog>, AppError> {
        if let Some(parsed) = self.parsed.as_ref().filter(|_| self.is_fresh()) {
            debug!(generation = self.generation, "reusing cached catalog");
            return Ok(Arc::clone(parsed));
        }

        match self.refetch() {
            Ok(catalog) => Ok(catalog),
            Err(e) => {
                warn!(error = %e, "load failed, cache cleared");
                self.invalidate();
                Err(e)
            }
        }
    }

    fn refetch(&mut self) -> Result<Arc<SeriesCatalog>, AppError> {
        let fetched = fetch_first_usable(&self.sources, self.options.format)?;

        // Same bytes as the expired generation: keep its catalog.
        if let (Some(raw), Some(parsed)) = (&self.raw, &self.parsed) {
            if *raw == fetched.body {
                debug!(source = %fetched.source, "payload unchanged, catalog kept");
                let parsed = Arc::clone(parsed);
                self.fetched_at = Some(Instant::now());
                return Ok(parsed);
            }
        }

        let catalog = Arc::new(ingest_payload(
            &fetched.body,
            self.options.format,
            self.options.resolver,
            &self.options.mapping,
        )?);

        self.generation += 1;
        self.raw = Some(fetched.body);
        self.fetched_at = Some(Instant::now());
        self.parsed = Some(Arc::clone(&catalog));
        info!(
            generation = self.generation,
            source = %fetched.source,
            series = catalog.len(),
            "cache refreshed"
        );
        Ok(catalog)
    }

    /// Forget everything; the next `load` fetches and parses again.
    pub fn invalidate(&mut self) {
        self.raw = None;
        self.fetched_at = None;
        self.parsed = None;
    }

    pub fn is_fresh(&self) -> bool {
        self.fetched_at
            .is_some_and(|at| at.elapsed() < self.ttl)
    }

    pub fn age(&self) -> Option<Duration> {
        self.fetched_at.map(|at| at.elapsed())
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn raw(&self) -> Option<&str> {
        self.raw.as_deref()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::source::tests::FakeSource;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    const CSV: &str = "date,WRESBAL\n2024-01-01,100\n2024-01-02,105\n";

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()
    }

    fn cache_with(source: FakeSource, ttl: Duration) -> (FetchCache, Rc<Cell<usize>>) {
        let hits = Rc::clone(&source.hits);
        (FetchCache::new(vec![Box::new(source)], IngestOptions::default(), ttl), hits)
    }

    #[test]
    fn loads_within_ttl_reuse_the_parsed_catalog() {
        let (mut cache, hits) = cache_with(FakeSource::ok("feed", CSV), Duration::from_secs(300));

        let all = cache.load(RangeWindow::All, today()).unwrap();
        let month = cache.load(RangeWindow::OneMonth, today()).unwrap();

        assert_eq!(hits.get(), 1);
        assert_eq!(cache.generation(), 1);
        assert!(Arc::ptr_eq(&all.shared_catalog(), &month.shared_catalog()));
        assert_eq!(all.points("WRESBAL").len(), 2);
    }

    #[test]
    fn invalidate_forces_a_refetch() {
        let (mut cache, hits) = cache_with(FakeSource::ok("feed", CSV), Duration::from_secs(300));
        cache.load(RangeWindow::All, today()).unwrap();

        cache.invalidate();
        assert!(cache.raw().is_none());
        assert!(!cache.is_fresh());

        cache.load(RangeWindow::All, today()).unwrap();
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn expired_ttl_refetches_but_keeps_an_unchanged_catalog() {
        let (mut cache, hits) = cache_with(FakeSource::ok("feed", CSV), Duration::ZERO);
        let first = cache.catalog().unwrap();
        let second = cache.catalog().unwrap();

        assert_eq!(hits.get(), 2);
        assert_eq!(cache.generation(), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    /// Serves queued bodies in order.
    struct Sequence(RefCell<Vec<Result<String, String>>>);

    impl Source for Sequence {
        fn describe(&self) -> String {
            "sequence".to_string()
        }

        fn fetch(&self) -> Result<String, AppError> {
            self.0.borrow_mut().remove(0).map_err(AppError::retrieval)
        }
    }

    #[test]
    fn failed_refresh_does_not_serve_stale_data() {
        let source = Sequence(RefCell::new(vec![
            Ok(CSV.to_string()),
            Err("HTTP 500".to_string()),
            Ok(CSV.replace("105", "110")),
        ]));
        let mut cache = FetchCache::new(vec![Box::new(source)], IngestOptions::default(), Duration::ZERO);

        assert!(cache.catalog().is_ok());
        let err = cache.catalog().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Retrieval);
        assert!(cache.raw().is_none());

        let catalog = cache.catalog().unwrap();
        assert_eq!(catalog.get("WRESBAL").unwrap().points[1].value, 110.0);
        assert_eq!(cache.generation(), 2);
    }

    #[test]
    fn expired_ttl_with_a_failing_source_reports_the_failure() {
        let source = Sequence(RefCell::new(vec![Ok(CSV.to_string()), Err("timeout".to_string())]));
        let mut cache = FetchCache::new(vec![Box::new(source)], IngestOptions::default(), Duration::ZERO);

        let before = cache.load(RangeWindow::All, today()).unwrap();
        assert!(!cache.is_fresh());

        let err = cache.load(RangeWindow::All, today()).unwrap_err();
        assert!(err.message().contains("timeout"));
        assert!(cache.raw().is_none());
        assert_eq!(cache.generation(), 1);

        // Views handed out earlier still own their catalog.
        assert_eq!(before.points("WRESBAL").len(), 2);
        assert_eq!(before.points("WRESBAL")[1].value, 105.0);
    }

    #[test]
    fn format_errors_propagate_and_leave_the_cache_empty() {
        let (mut cache, hits) = cache_with(
            FakeSource::ok("feed", r#"{"meta": "no records here"}"#),
            Duration::from_secs(300),
        );
        let err = cache.catalog().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Format);
        assert!(cache.raw().is_none());
        assert_eq!(cache.generation(), 0);

        assert!(cache.catalog().is_err());
        assert_eq!(hits.get(), 2);
    }
}
