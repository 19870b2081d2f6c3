//! Shared load/refresh workflow used by both CLI and TUI front-ends.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! sources -> fetch cache -> catalog -> range view -> builder/dashboard upkeep
//!
//! The CLI and the TUI can then focus on presentation (printing vs widgets).
//! Everything that used to be process-wide (cache, builder, surfaces) lives in
//! one [`Session`] owned by the front-end.

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::builder::BuilderState;
use crate::dashboard::DashboardLayout;
use crate::data::{FetchCache, IngestOptions, build_sources};
use crate::domain::{Dataset, MonitorConfig, RangeWindow};
use crate::error::AppError;
use crate::meta::ExplicitMapping;
use crate::report::window;
use crate::surface::registry::SurfaceRegistry;

pub struct Session {
    cache: FetchCache,
    range: RangeWindow,
    dataset: Option<Dataset>,
    /// Cache generation the builder and layout were last reconciled against.
    seen_generation: u64,
    pub builder: BuilderState,
    pub layout: DashboardLayout,
    pub surfaces: SurfaceRegistry,
}

impl Session {
    pub fn new(cache: FetchCache, range: RangeWindow) -> Self {
        Self {
            cache,
            range,
            dataset: None,
            seen_generation: 0,
            builder: BuilderState::new(),
            layout: DashboardLayout::default(),
            surfaces: SurfaceRegistry::new(),
        }
    }

    /// Wire sources, mapping and cache from the run configuration.
    pub fn from_config(config: &MonitorConfig) -> Result<Self, AppError> {
        let sources = build_sources(&config.sources, config.http_timeout)?;
        let mut mapping = ExplicitMapping::builtin();
        if let Some(path) = &config.mapping_path {
            let extra = ExplicitMapping::from_json_file(path)?;
            info!(path = %path.display(), entries = extra.len(), "loaded mapping file");
            mapping = mapping.merge(extra);
        }
        let options = IngestOptions {
            format: config.format,
            resolver: config.resolver,
            mapping,
        };
        Ok(Self::new(FetchCache::new(sources, options, config.ttl), config.range))
    }

    pub fn load(&mut self) -> Result<&Dataset, AppError> {
        self.load_at(window::today())
    }

    /// Load (from cache when fresh) and window to the current range.
    ///
    /// A failure drops the current dataset; nothing stale stays on screen.
    pub fn load_at(&mut self, today: NaiveDate) -> Result<&Dataset, AppError> {
        let dataset = match self.cache.load(self.range, today) {
            Ok(dataset) => dataset,
            Err(e) => {
                warn!(error = %e, "session load failed");
                self.dataset = None;
                self.surfaces.destroy_all();
                return Err(e);
            }
        };

        if self.cache.generation() != self.seen_generation {
            self.seen_generation = self.cache.generation();
            self.layout.reconcile(dataset.catalog());
            let _ = self.builder.seed_defaults(dataset.catalog());
            // Miniature handles are keyed by series id, which may have changed.
            self.surfaces.destroy_all_minis();
        }

        Ok(&*self.dataset.insert(dataset))
    }

    /// Drop the cache and load again.
    pub fn refresh(&mut self) -> Result<&Dataset, AppError> {
        self.refresh_at(window::today())
    }

    pub fn refresh_at(&mut self, today: NaiveDate) -> Result<&Dataset, AppError> {
        self.cache.invalidate();
        self.load_at(today)
    }

    /// Re-window the loaded catalog. Never fetches.
    pub fn set_range(&mut self, range: RangeWindow) -> Option<&Dataset> {
        self.range = range;
        let current = self.dataset.as_ref()?;
        let next = current.with_range(range);
        Some(&*self.dataset.insert(next))
    }

    pub fn range(&self) -> RangeWindow {
        self.range
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }

    /// The loaded dataset, or an error when the last load failed or none ran.
    pub fn current(&self) -> Result<&Dataset, AppError> {
        self.dataset
            .as_ref()
            .ok_or_else(|| AppError::retrieval("No data loaded"))
    }

    pub fn cache(&self) -> &FetchCache {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::builder::SEED_PRIMARY;
    use crate::data::source::tests::FakeSource;
    use crate::report::{ChangeBasis, Change, metric_cards};

    const CSV: &str = "date,WRESBAL\n2024-01-01,100\n2024-01-02,105\n";

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn session(source: FakeSource) -> Session {
        let options = IngestOptions {
            mapping: ExplicitMapping::builtin(),
            ..IngestOptions::default()
        };
        let cache = FetchCache::new(vec![Box::new(source)], options, Duration::from_secs(300));
        Session::new(cache, RangeWindow::All)
    }

    #[test]
    fn csv_feed_end_to_end() {
        let mut s = session(FakeSource::ok("feed", CSV));
        let data = s.load_at(day(10)).unwrap();

        assert_eq!(data.catalog().ids().collect::<Vec<_>>(), vec!["WRESBAL"]);
        let points = data.points("WRESBAL");
        assert_eq!(points.len(), 2);

        let cards = metric_cards(data, ["WRESBAL"], ChangeBasis::Previous);
        assert_eq!(cards[0].latest, Some(105.0));
        assert_eq!(cards[0].change, Change { value: 5.0, pct: 5.0 });

        // One series: seeded with it alone, dashboard shows it.
        assert_eq!(s.builder.len(), 1);
        assert_eq!(s.layout.order(), ["WRESBAL"]);
    }

    #[test]
    fn set_range_rewindows_without_fetching() {
        let source = FakeSource::ok("feed", CSV);
        let hits = std::rc::Rc::clone(&source.hits);
        let mut s = session(source);
        assert!(s.set_range(RangeWindow::OneMonth).is_none());

        s.load_at(day(10)).unwrap();
        let month = s.set_range(RangeWindow::OneMonth).unwrap();
        assert_eq!(month.range(), RangeWindow::OneMonth);
        assert_eq!(hits.get(), 1);

        s.refresh_at(day(10)).unwrap();
        assert_eq!(hits.get(), 2);
        assert_eq!(s.dataset().unwrap().range(), RangeWindow::OneMonth);
    }

    #[test]
    fn failed_load_clears_the_dataset() {
        let mut s = session(FakeSource::failing("feed", "HTTP 503"));
        let err = s.load_at(day(10)).err().unwrap();
        assert!(err.message().contains("HTTP 503"));
        assert!(s.dataset().is_none());
        assert!(s.builder.is_empty());
    }

    #[test]
    fn seeding_prefers_reserves_and_bitcoin() {
        let json = r#"[
            {"date": "2024-01-01", "wresbal_oficjalny": 3200000, "btc_usd": 42000, "tga": 750000},
            {"date": "2024-01-02", "wresbal_oficjalny": 3250000, "btc_usd": 43000, "tga": 760000}
        ]"#;
        let mut s = session(FakeSource::ok("feed", json));
        s.load_at(day(10)).unwrap();
        assert_eq!(s.builder.len(), 2);
        assert_eq!(s.builder.bindings()[0].series_id, SEED_PRIMARY);
        assert_eq!(s.layout.order()[0], SEED_PRIMARY);
    }
}
