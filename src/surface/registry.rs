//! Live surface handles and their resize observers.
//!
//! Each surface owns one handle. A handle is created `Pending` and becomes
//! `Ready` once its container has been measured (after the first layout pass).
//! Destroying a handle disconnects its resize observer before the handle is
//! dropped, so no callback outlives its container.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::surface::SurfaceKind;

pub type ObserverId = u64;

/// Container size in terminal cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    pub width: u16,
    pub height: u16,
}

impl Size {
    pub fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }

    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Used when a container measures as zero on first layout.
pub const FALLBACK_SIZE: Size = Size { width: 80, height: 20 };
pub const MINI_FALLBACK_SIZE: Size = Size { width: 24, height: 4 };

/// Registered resize observers, keyed by id.
#[derive(Debug, Default)]
pub struct ResizeBus {
    next_id: ObserverId,
    observers: BTreeMap<ObserverId, SurfaceKind>,
}

impl ResizeBus {
    pub fn observe(&mut self, kind: SurfaceKind) -> ObserverId {
        self.next_id += 1;
        self.observers.insert(self.next_id, kind);
        self.next_id
    }

    /// `false` if the observer was already gone.
    pub fn disconnect(&mut self, id: ObserverId) -> bool {
        self.observers.remove(&id).is_some()
    }

    pub fn is_connected(&self, id: ObserverId) -> bool {
        self.observers.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    /// Created, waiting for layout to settle before measuring.
    Pending,
    Ready(Size),
}

#[derive(Debug, Clone)]
pub struct SurfaceHandle {
    pub kind: SurfaceKind,
    pub observer: ObserverId,
    pub state: HandleState,
    /// Number of resize notifications applied.
    pub resizes: u32,
}

impl SurfaceHandle {
    pub fn size(&self) -> Option<Size> {
        match self.state {
            HandleState::Ready(size) => Some(size),
            HandleState::Pending => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct SurfaceRegistry {
    handles: HashMap<SurfaceKind, SurfaceHandle>,
    bus: ResizeBus,
}

impl SurfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fresh handle for `kind`, destroying any previous one first.
    pub fn init(&mut self, kind: SurfaceKind) -> &SurfaceHandle {
        self.destroy(&kind);
        let observer = self.bus.observe(kind.clone());
        debug!(surface = ?kind, observer, "surface created");
        self.handles.entry(kind.clone()).or_insert(SurfaceHandle {
            kind,
            observer,
            state: HandleState::Pending,
            resizes: 0,
        })
    }

    /// Create the handle only if it is not live yet.
    pub fn ensure(&mut self, kind: &SurfaceKind) {
        if !self.handles.contains_key(kind) {
            self.init(kind.clone());
        }
    }

    /// First measurement after layout: `Pending` → `Ready`.
    ///
    /// A zero-sized measurement falls back to a default size.
    pub fn settle(&mut self, kind: &SurfaceKind, measured: Size) -> Option<Size> {
        let handle = self.handles.get_mut(kind)?;
        if let HandleState::Ready(size) = handle.state {
            return Some(size);
        }
        let size = if !measured.is_empty() {
            measured
        } else if kind.is_mini() {
            MINI_FALLBACK_SIZE
        } else {
            FALLBACK_SIZE
        };
        handle.state = HandleState::Ready(size);
        Some(size)
    }

    /// Deliver a resize to `kind`'s observer. Zero sizes and surfaces with a
    /// disconnected observer are ignored.
    pub fn resize(&mut self, kind: &SurfaceKind, size: Size) -> bool {
        let Some(handle) = self.handles.get_mut(kind) else {
            return false;
        };
        if size.is_empty() || !self.bus.is_connected(handle.observer) {
            return false;
        }
        match handle.state {
            HandleState::Ready(current) if current == size => false,
            _ => {
                handle.state = HandleState::Ready(size);
                handle.resizes += 1;
                true
            }
        }
    }

    /// Disconnect the observer, then drop the handle.
    pub fn destroy(&mut self, kind: &SurfaceKind) -> bool {
        let Some(observer) = self.handles.get(kind).map(|h| h.observer) else {
            return false;
        };
        self.bus.disconnect(observer);
        self.handles.remove(kind);
        debug!(surface = ?kind, observer, "surface destroyed");
        true
    }

    pub fn destroy_all_minis(&mut self) -> usize {
        let minis: Vec<SurfaceKind> = self.handles.keys().filter(|k| k.is_mini()).cloned().collect();
        minis.iter().filter(|k| self.destroy(k)).count()
    }

    pub fn destroy_all(&mut self) {
        let all: Vec<SurfaceKind> = self.handles.keys().cloned().collect();
        for kind in &all {
            self.destroy(kind);
        }
    }

    pub fn get(&self, kind: &SurfaceKind) -> Option<&SurfaceHandle> {
        self.handles.get(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &SurfaceKind> {
        self.handles.keys()
    }

    pub fn is_live(&self, kind: &SurfaceKind) -> bool {
        self.handles.contains_key(kind)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn observer_count(&self) -> usize {
        self.bus.len()
    }
}
