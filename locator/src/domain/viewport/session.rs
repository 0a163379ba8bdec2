//! Caller-side gating in front of [`ViewportLoader`].

use std::sync::{Arc, Mutex, PoisonError};

use crate::domain::{GeoRect, ViewKey};

use super::{ViewportLoad, ViewportLoader};

/// Smallest zoom level at which viewport stops are loaded.
pub const DEFAULT_MIN_ZOOM: u8 = 16;

/// What a [`ViewportSession::refresh`] call did.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewportOutcome {
    /// Zoomed out too far to show individual stops.
    BelowMinZoom,
    /// The view does not overlap the region of interest.
    OutsideRegion,
    /// The quantized view matches the last successful load.
    Unchanged,
    /// The loader ran.
    Fetched(ViewportLoad),
}

/// Viewport change handler holding the last successfully loaded view.
pub struct ViewportSession {
    loader: Arc<ViewportLoader>,
    region: GeoRect,
    min_zoom: u8,
    last_loaded: Mutex<Option<ViewKey>>,
}

impl ViewportSession {
    /// Gate loads to views that overlap `region`.
    pub fn new(loader: Arc<ViewportLoader>, region: GeoRect) -> Self {
        Self {
            loader,
            region,
            min_zoom: DEFAULT_MIN_ZOOM,
            last_loaded: Mutex::new(None),
        }
    }

    /// Override the zoom below which viewports are not loaded.
    #[must_use]
    pub fn with_min_zoom(mut self, min_zoom: u8) -> Self {
        self.min_zoom = min_zoom;
        self
    }

    /// Handle a view change.
    ///
    /// The view key is remembered only after a load that returned stations
    /// (possibly none), so skipped, cancelled, or failed loads are retried on
    /// the next refresh of the same view.
    pub async fn refresh(&self, view: &GeoRect, zoom: u8) -> ViewportOutcome {
        if zoom < self.min_zoom {
            return ViewportOutcome::BelowMinZoom;
        }
        if !self.region.intersects(view) {
            return ViewportOutcome::OutsideRegion;
        }

        let key = view.view_key();
        if self.last_key().as_ref() == Some(&key) {
            return ViewportOutcome::Unchanged;
        }

        let load = self.loader.load(view).await;
        if matches!(load, ViewportLoad::Loaded(_)) {
            *self
                .last_loaded
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(key);
        }
        ViewportOutcome::Fetched(load)
    }

    /// Cancel any in-flight load, e.g. when the view is torn down.
    pub fn close(&self) {
        self.loader.cancel_in_flight();
    }

    fn last_key(&self) -> Option<ViewKey> {
        self.last_loaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
