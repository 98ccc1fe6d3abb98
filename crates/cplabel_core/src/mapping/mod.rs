//! Sample index mapping between absolute indices, pages and pixels.
//!
//! # Responsibility
//! - Split `N` samples into contiguous pages of `P` samples.
//! - Resolve a plotting-area pixel to exactly one sample of the current page,
//!   and a sample back to its pixel.
//!
//! # Invariants
//! - Page windows are disjoint, contiguous and cover `0..N`.
//! - A click always snaps to a real sample; positions between samples are
//!   never produced.
//! - Out-of-range or degenerate input yields `None`, never an error.

mod pager;

pub use pager::Pager;

use crate::config::LabelingConfig;

/// Horizontal pixel interval `[x0, x1]` of the plotting area.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotArea {
    x0: f64,
    x1: f64,
}

impl PlotArea {
    /// Returns `None` unless both bounds are finite and `x1 > x0`.
    pub fn new(x0: f64, x1: f64) -> Option<Self> {
        if x0.is_finite() && x1.is_finite() && x1 > x0 {
            Some(Self { x0, x1 })
        } else {
            None
        }
    }

    pub fn x0(&self) -> f64 {
        self.x0
    }

    pub fn x1(&self) -> f64 {
        self.x1
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn midpoint(&self) -> f64 {
        self.x0 + self.width() / 2.0
    }

    pub fn contains(&self, pixel_x: f64) -> bool {
        pixel_x >= self.x0 && pixel_x <= self.x1
    }
}

/// Pager plus plotting area: the full click-resolution context.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleMapper {
    pager: Pager,
    area: PlotArea,
}

impl SampleMapper {
    pub fn new(pager: Pager, area: PlotArea) -> Self {
        Self { pager, area }
    }

    /// Builds a mapper for `total` samples from a validated config.
    ///
    /// Returns `None` if the config's plot area is degenerate.
    pub fn from_config(total: usize, config: &LabelingConfig) -> Option<Self> {
        let area = PlotArea::new(config.plot_area.x0, config.plot_area.x1)?;
        Some(Self::new(Pager::new(total, config.page_size), area))
    }

    pub fn pager(&self) -> &Pager {
        &self.pager
    }

    pub fn pager_mut(&mut self) -> &mut Pager {
        &mut self.pager
    }

    pub fn area(&self) -> PlotArea {
        self.area
    }

    /// Resolves a pixel to the nearest absolute sample index on the current
    /// page. `None` when the pixel lies outside the plotting area or the
    /// page is empty.
    pub fn pixel_to_index(&self, pixel_x: f64) -> Option<usize> {
        if !pixel_x.is_finite() || !self.area.contains(pixel_x) {
            return None;
        }
        let bounds = self.pager.current_bounds()?;
        let samples = bounds.len();
        if samples == 0 {
            return None;
        }

        let ratio = ((pixel_x - self.area.x0) / self.area.width()).clamp(0.0, 1.0);
        let relative = (ratio * (samples - 1) as f64).round() as usize;
        Some(bounds.start + relative.min(samples - 1))
    }

    /// Inverse of `pixel_to_index`. `None` when `absolute_index` is not on
    /// the current page. A single-sample page maps to the area midpoint.
    pub fn index_to_pixel(&self, absolute_index: usize) -> Option<f64> {
        let bounds = self.pager.current_bounds()?;
        if !bounds.contains(&absolute_index) {
            return None;
        }
        let samples = bounds.len();
        if samples == 1 {
            return Some(self.area.midpoint());
        }

        let relative = (absolute_index - bounds.start) as f64;
        Some(self.area.x0 + relative / (samples - 1) as f64 * self.area.width())
    }
}
