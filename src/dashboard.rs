//! Dashboard layout: which series get a metric card and miniature, and in what order.

use std::collections::BTreeSet;

use crate::domain::{SeriesCatalog, SeriesConfig};

/// Series ids shown first when they exist in the catalog.
pub const PREFERRED_ORDER: [&str; 12] = [
    "WRESBAL_MLN_USD",
    "TGA_MLN_USD",
    "IMPLIED_WRESBAL",
    "SOFRVOL",
    "TOTAL_IMPLIED_LIQ",
    "BITCOIN",
    "WRESBAL_ASSETS",
    "BANK_ASSETS",
    "ONRRP",
    "SOFR",
    "SPREAD",
    "SRF",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardLayout {
    order: Vec<String>,
    hidden: BTreeSet<String>,
}

impl DashboardLayout {
    /// Preferred ids that exist, then the rest in catalog order. Everything visible.
    pub fn from_catalog(catalog: &SeriesCatalog) -> Self {
        Self {
            order: default_order(catalog),
            hidden: BTreeSet::new(),
        }
    }

    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn is_visible(&self, id: &str) -> bool {
        !self.hidden.contains(id)
    }

    /// Keep the user's order for ids that survived re-ingestion, drop the ones
    /// that vanished, and append new ids in catalog order.
    pub fn reconcile(&mut self, catalog: &SeriesCatalog) {
        if self.order.is_empty() {
            *self = Self::from_catalog(catalog);
            return;
        }
        self.order.retain(|id| catalog.contains(id));
        self.hidden.retain(|id| catalog.contains(id));
        for id in catalog.ids() {
            if !self.order.iter().any(|o| o == id) {
                self.order.push(id.to_string());
            }
        }
    }

    /// Splice semantics: remove at `from`, insert at `to`.
    pub fn move_item(&mut self, from: usize, to: usize) -> bool {
        if from == to || from >= self.order.len() || to >= self.order.len() {
            return false;
        }
        let moved = self.order.remove(from);
        self.order.insert(to, moved);
        true
    }

    pub fn set_visible(&mut self, id: &str, visible: bool) {
        if visible {
            self.hidden.remove(id);
        } else if self.order.iter().any(|o| o == id) {
            self.hidden.insert(id.to_string());
        }
    }

    /// Returns the new visibility.
    pub fn toggle(&mut self, id: &str) -> bool {
        let visible = !self.is_visible(id);
        self.set_visible(id, visible);
        self.is_visible(id)
    }

    pub fn reset(&mut self, catalog: &SeriesCatalog) {
        *self = Self::from_catalog(catalog);
    }

    pub fn visible_ids(&self) -> impl Iterator<Item = &str> {
        self.order
            .iter()
            .filter(|id| self.is_visible(id))
            .map(String::as_str)
    }

    /// Configs of visible series, in layout order.
    pub fn visible_series<'a>(&self, catalog: &'a SeriesCatalog) -> Vec<&'a SeriesConfig> {
        self.visible_ids().filter_map(|id| catalog.config(id)).collect()
    }
}

fn default_order(catalog: &SeriesCatalog) -> Vec<String> {
    let mut order: Vec<String> = PREFERRED_ORDER
        .iter()
        .filter(|id| catalog.contains(id))
        .map(|id| id.to_string())
        .collect();
    for id in catalog.ids() {
        if !order.iter().any(|o| o == id) {
            order.push(id.to_string());
        }
    }
    order
}
