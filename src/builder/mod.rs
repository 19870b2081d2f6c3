//! Chart-builder state.
//!
//! An ordered list of bindings (series → axis, render type, color, inversion)
//! plus at most one selected series open for inline editing. The state knows
//! nothing about rendered surfaces: every mutation returns a [`Dirty`] marker
//! and callers re-project whatever surfaces read from it.

use serde::{Deserialize, Serialize};

use crate::domain::{Axis, RenderType, Rgb, SeriesCatalog, SeriesConfig};

/// Series the builder is seeded with when both exist.
pub const SEED_PRIMARY: &str = "WRESBAL_MLN_USD";
pub const SEED_SECONDARY: &str = "BITCOIN";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Binding {
    pub series_id: String,
    pub axis: Axis,
    #[serde(rename = "type")]
    pub render: RenderType,
    pub color: Rgb,
    pub invert_axis: bool,
}

/// Returned by every state change.
///
/// `charts` is false when only the editing selection moved, so chart surfaces
/// can keep their last projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "surfaces reading the builder state must be re-projected"]
pub struct Dirty {
    pub revision: u64,
    pub charts: bool,
}

/// One field of a binding to overwrite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BindingEdit {
    Axis(Axis),
    Render(RenderType),
    Color(Rgb),
    InvertAxis(bool),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuilderState {
    bindings: Vec<Binding>,
    selected: Option<String>,
    default_render: RenderType,
    revision: u64,
}

impl BuilderState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn get(&self, index: usize) -> Option<&Binding> {
        self.bindings.get(index)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn is_selected(&self, index: usize) -> bool {
        match (self.bindings.get(index), self.selected.as_deref()) {
            (Some(b), Some(sel)) => b.series_id == sel,
            _ => false,
        }
    }

    /// Render type given to bindings added from now on.
    pub fn default_render(&self) -> RenderType {
        self.default_render
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn contains(&self, series_id: &str) -> bool {
        self.bindings.iter().any(|b| b.series_id == series_id)
    }

    fn touch(&mut self, charts: bool) -> Dirty {
        self.revision += 1;
        Dirty {
            revision: self.revision,
            charts,
        }
    }

    /// Append a binding. Series already bound are not rejected.
    pub fn add(&mut self, series: &SeriesConfig, axis: Axis) -> Dirty {
        self.bindings.push(Binding {
            series_id: series.id.clone(),
            axis,
            render: self.default_render,
            color: series.color,
            invert_axis: false,
        });
        self.touch(true)
    }

    /// Remove the binding at `index`; clears the selection if it pointed at
    /// that binding's series.
    pub fn remove(&mut self, index: usize) -> Option<Dirty> {
        if index >= self.bindings.len() {
            return None;
        }
        let removed = self.bindings.remove(index);
        if self.selected.as_deref() == Some(removed.series_id.as_str()) {
            self.selected = None;
        }
        Some(self.touch(true))
    }

    /// Toggle the selection: selecting the selected series closes it,
    /// selecting another one replaces it. Unbound series are ignored.
    pub fn select(&mut self, series_id: &str) -> Option<Dirty> {
        if self.selected.as_deref() == Some(series_id) {
            self.selected = None;
        } else if self.contains(series_id) {
            self.selected = Some(series_id.to_string());
        } else {
            return None;
        }
        Some(self.touch(false))
    }

    pub fn clear_selection(&mut self) -> Option<Dirty> {
        self.selected.take()?;
        Some(self.touch(false))
    }

    /// Overwrite one field of one binding; nothing else changes.
    pub fn reconfigure(&mut self, index: usize, edit: BindingEdit) -> Option<Dirty> {
        let binding = self.bindings.get_mut(index)?;
        match edit {
            BindingEdit::Axis(axis) => binding.axis = axis,
            BindingEdit::Render(render) => binding.render = render,
            BindingEdit::Color(color) => binding.color = color,
            BindingEdit::InvertAxis(invert) => binding.invert_axis = invert,
        }
        Some(self.touch(true))
    }

    /// Set every binding's render type and the default for future additions.
    pub fn bulk_set_type(&mut self, render: RenderType) -> Dirty {
        for b in &mut self.bindings {
            b.render = render;
        }
        self.default_render = render;
        self.touch(true)
    }

    /// Move the binding at `from` so it ends up at index `to`.
    pub fn move_binding(&mut self, from: usize, to: usize) -> Option<Dirty> {
        if from >= self.bindings.len() || to >= self.bindings.len() {
            return None;
        }
        if from != to {
            let b = self.bindings.remove(from);
            self.bindings.insert(to, b);
        }
        Some(self.touch(true))
    }

    /// First-load defaults for an empty builder.
    ///
    /// Reserves (area, left) against Bitcoin (line, right) when the catalog
    /// has both; otherwise the first two series as lines, left then right.
    pub fn seed_defaults(&mut self, catalog: &SeriesCatalog) -> Option<Dirty> {
        if !self.bindings.is_empty() || catalog.is_empty() {
            return None;
        }

        let bind = |config: &SeriesConfig, axis, render| Binding {
            series_id: config.id.clone(),
            axis,
            render,
            color: config.color,
            invert_axis: false,
        };

        self.bindings = match (catalog.config(SEED_PRIMARY), catalog.config(SEED_SECONDARY)) {
            (Some(primary), Some(secondary)) => vec![
                bind(primary, Axis::Left, RenderType::Area),
                bind(secondary, Axis::Right, RenderType::Line),
            ],
            _ => catalog
                .configs()
                .take(2)
                .zip([Axis::Left, Axis::Right])
                .map(|(config, axis)| bind(config, axis, RenderType::Line))
                .collect(),
        };
        Some(self.touch(true))
    }
}
